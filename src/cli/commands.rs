use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use tracing::debug;

use super::generate::{project_root, run_generate, GenerateOptions};
use super::output::{format_generation, format_source_file};
use super::OutputFormat;
use crate::parser::{file_info, ExtractContext};

/// Run generation over the project at `path` and format the outcome.
pub fn run_generate_command(
    path: &str,
    opts: &GenerateOptions,
    format: &OutputFormat,
) -> Result<String> {
    let root = project_root(path)?;
    debug!("generating for {}", root.display());
    let result = run_generate(&root, opts)?;
    Ok(format_generation(&result, opts.write, format))
}

/// Extract the declarations of a single file.
///
/// Synthetic identifiers are computed from the path as given, relative to
/// the current directory.
pub fn run_extract(
    project_path: &Path,
    file: &str,
    js_prefix: Option<&str>,
    format: &OutputFormat,
) -> Result<String> {
    let path = PathBuf::from(file);
    if !path.is_file() {
        bail!("{} is not a file", file);
    }
    let rel_path = display_rel(project_path, &path);
    let ctx = ExtractContext {
        rel_path: &rel_path,
        prefix: js_prefix,
    };
    let mut diagnostics = Vec::new();
    let info = file_info(&path, &ctx, &mut diagnostics);
    Ok(format_source_file(&info, &diagnostics, format))
}

fn display_rel(project_path: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(project_path).unwrap_or(path);
    rel.components()
        .filter_map(|c| match c {
            std::path::Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
