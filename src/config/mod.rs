use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::buildfile::{Directive, DEFAULT_BUILD_FILE_NAMES};
use crate::model::{Diagnostic, ImportSpec, Label, JS_LANG};
use crate::resolver::OverrideTable;

/// Name of the project configuration file, looked up in the project root.
pub const CONFIG_FILENAME: &str = "declgen.toml";

/// Contents of `declgen.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Prefix of synthetic import identifiers for the whole project.
    pub js_prefix: Option<String>,
    /// Glob patterns of paths to skip.
    pub exclude: Vec<String>,
    /// BUILD file names to read, in order. The first is used for new files.
    pub build_file_names: Vec<String>,
    /// Explicit identifier-to-label mappings.
    pub resolve: Vec<ResolveEntry>,
    pub external: ExternalConfig,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            js_prefix: None,
            exclude: Vec::new(),
            build_file_names: DEFAULT_BUILD_FILE_NAMES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            resolve: Vec::new(),
            external: ExternalConfig::default(),
        }
    }
}

/// A `[[resolve]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveEntry {
    #[serde(default = "default_lang")]
    pub lang: String,
    pub import: String,
    pub label: String,
}

fn default_lang() -> String {
    JS_LANG.to_string()
}

/// The `[external]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExternalConfig {
    /// TOML file replacing the built-in Closure Library table, relative to
    /// the project root.
    pub table: Option<PathBuf>,
}

/// Load `declgen.toml` from the project root, or defaults if there is none.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(CONFIG_FILENAME);
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Parse a project config from a TOML string.
pub fn parse_config(toml_str: &str) -> Result<ProjectConfig> {
    let config: ProjectConfig = toml::from_str(toml_str)?;
    Ok(config)
}

/// Configuration in effect for one directory. Each directory starts from a
/// copy of its parent's and applies its own BUILD file directives.
#[derive(Debug, Clone, Default)]
pub struct DirConfig {
    /// Prefix of synthetic import identifiers.
    pub prefix: String,
    /// Directory in which the prefix was set ("" for the root).
    pub prefix_rel: String,
    /// Whether a prefix was set explicitly. Without one, no synthetic
    /// identifiers are generated.
    pub prefix_set: bool,
    pub overrides: OverrideTable,
}

impl DirConfig {
    /// Configuration of the project root.
    ///
    /// `prefix_flag` comes from the command line and takes precedence over
    /// the config file.
    pub fn root(project: &ProjectConfig, prefix_flag: Option<&str>) -> Result<Self> {
        let mut config = DirConfig::default();
        if let Some(prefix) = prefix_flag.or(project.js_prefix.as_deref()) {
            config.set_prefix(prefix, "");
        }
        for entry in &project.resolve {
            let label = Label::parse_in(&entry.label, "").with_context(|| {
                format!("invalid label for resolve entry {:?}", entry.import)
            })?;
            config.overrides.insert(
                ImportSpec {
                    lang: entry.lang.clone(),
                    imp: entry.import.clone(),
                },
                label,
            );
        }
        Ok(config)
    }

    /// The prefix, if one has been set for this directory or an ancestor.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix_set.then_some(self.prefix.as_str())
    }

    fn set_prefix(&mut self, prefix: &str, rel: &str) {
        self.prefix = prefix.trim_matches('/').to_string();
        self.prefix_rel = rel.to_string();
        self.prefix_set = true;
    }

    /// Derive the configuration of directory `rel` from this one (its
    /// parent's) and the directives of its BUILD file.
    pub fn child(
        &self,
        rel: &str,
        directives: &[Directive],
        build_file: &Path,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> DirConfig {
        let mut config = self.clone();
        for directive in directives {
            if let Err(message) = config.apply(rel, directive) {
                let diagnostic = Diagnostic::InvalidDirective {
                    path: build_file.display().to_string(),
                    line: directive.line,
                    message,
                };
                tracing::warn!("{}", diagnostic);
                diagnostics.push(diagnostic);
            }
        }
        config
    }

    fn apply(&mut self, rel: &str, directive: &Directive) -> Result<(), String> {
        match directive.key.as_str() {
            "js_prefix" => {
                self.set_prefix(&directive.value, rel);
                Ok(())
            }
            "resolve" => {
                let parts: Vec<&str> = directive.value.split_whitespace().collect();
                let [lang, imp, label] = parts[..] else {
                    return Err(format!(
                        "resolve takes 3 arguments (lang, import, label), got {:?}",
                        directive.value
                    ));
                };
                let label = Label::parse_in(label, rel).map_err(|e| e.to_string())?;
                self.overrides.insert(
                    ImportSpec {
                        lang: lang.to_string(),
                        imp: imp.to_string(),
                    },
                    label,
                );
                Ok(())
            }
            other => Err(format!("unknown directive {:?}", other)),
        }
    }
}
