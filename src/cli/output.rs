use serde::Serialize;

use super::generate::GenerationResult;
use super::OutputFormat;
use crate::model::{Diagnostic, SourceFile};

/// Format any serializable value as JSON.
pub fn format_json<T: Serialize>(value: &T, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Compact => serde_json::to_string(value).unwrap_or_default(),
        OutputFormat::Json | OutputFormat::Text => {
            serde_json::to_string_pretty(value).unwrap_or_default()
        }
    }
}

/// Format the outcome of a generation run.
///
/// In text mode a dry run prints every rendered BUILD file; a writing run
/// prints a one-line summary.
pub fn format_generation(result: &GenerationResult, wrote: bool, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Json | OutputFormat::Compact => format_json(result, format),
        OutputFormat::Text if wrote => {
            let written = result.files.iter().filter(|f| f.written).count();
            format!(
                "Generated {} rules in {} BUILD files ({} written, {} diagnostics, {}ms)",
                result.rules_generated,
                result.files.len(),
                written,
                result.diagnostics.len(),
                result.duration_ms,
            )
        }
        OutputFormat::Text => {
            let mut output = String::new();
            for (i, file) in result.files.iter().enumerate() {
                if i > 0 {
                    output.push('\n');
                }
                output.push_str(&format!("# {}\n", file.path));
                output.push_str(&file.content);
            }
            output.trim_end().to_string()
        }
    }
}

#[derive(Serialize)]
struct ExtractReport<'a> {
    file: &'a SourceFile,
    diagnostics: &'a [Diagnostic],
}

/// Format one extracted file.
pub fn format_source_file(
    file: &SourceFile,
    diagnostics: &[Diagnostic],
    format: &OutputFormat,
) -> String {
    match format {
        OutputFormat::Json | OutputFormat::Compact => {
            format_json(&ExtractReport { file, diagnostics }, format)
        }
        OutputFormat::Text => {
            let mut output = format!("{} ({})\n", file.path.display(), file.kind);
            let mut flags = Vec::new();
            if file.is_test {
                flags.push("test");
            }
            if file.is_test_only {
                flags.push("testonly");
            }
            if file.is_module {
                flags.push("module");
            }
            if !flags.is_empty() {
                output.push_str(&format!("  flags:    {}\n", flags.join(", ")));
            }
            for p in &file.provides {
                output.push_str(&format!("  provides: {}\n", p));
            }
            for r in &file.requires {
                output.push_str(&format!("  requires: {}\n", r));
            }
            for d in diagnostics {
                output.push_str(&format!("  warning:  {}\n", d));
            }
            output.trim_end().to_string()
        }
    }
}
