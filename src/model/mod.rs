use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Tag of the module system handled by this crate, used to scope index
/// entries and override directives.
pub const JS_LANG: &str = "js";

/// How a file should be treated, based on its name alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileKind {
    /// `.js` sources.
    Js,
    /// `.jsx` sources.
    Jsx,
    /// `.html` test fixtures.
    Html,
    /// Anything rules_closure cannot build.
    #[default]
    Unknown,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Js => "js",
            FileKind::Jsx => "jsx",
            FileKind::Html => "html",
            FileKind::Unknown => "unknown",
        }
    }

    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "js" => FileKind::Js,
            "jsx" => FileKind::Jsx,
            "html" => FileKind::Html,
            _ => FileKind::Unknown,
        }
    }

    /// True for kinds whose content is JavaScript and carries declarations.
    pub fn is_source(&self) -> bool {
        matches!(self, FileKind::Js | FileKind::Jsx)
    }
}

impl FromStr for FileKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "js" => Ok(FileKind::Js),
            "jsx" => Ok(FileKind::Jsx),
            "html" => Ok(FileKind::Html),
            "unknown" => Ok(FileKind::Unknown),
            _ => Err(format!("unknown file kind: {}", s)),
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything known about one source file: what its name says, and what its
/// declarations say.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Path on disk.
    pub path: PathBuf,
    /// Base name of the file.
    pub name: String,
    /// Path relative to the directory being generated; this is what goes
    /// into `srcs`. Differs from `name` only for group members that live in
    /// a subdirectory.
    pub src: String,
    pub kind: FileKind,
    /// The stem ends with `_test`.
    pub is_test: bool,
    /// The file contains a `goog.setTestOnly` statement.
    pub is_test_only: bool,
    /// The file declares itself with `goog.module` rather than `goog.provide`.
    pub is_module: bool,
    /// Identifiers this file provides, in file order.
    pub provides: Vec<String>,
    /// Identifiers this file requires, in file order. Not deduplicated.
    pub requires: Vec<String>,
}

/// Key of the resolution index: an identifier scoped to a module system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImportSpec {
    pub lang: String,
    pub imp: String,
}

impl ImportSpec {
    pub fn js(imp: impl Into<String>) -> Self {
        Self {
            lang: JS_LANG.to_string(),
            imp: imp.into(),
        }
    }
}

/// The provides and requires of one generated rule, aggregated over its
/// source files. Handed to the index builder and later back to the resolver
/// for the same rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredInterface {
    pub provides: Vec<String>,
    pub requires: Vec<String>,
    /// Whether other rules may depend on this one through the index.
    pub importable: bool,
}

impl DeclaredInterface {
    /// Interface of a library rule built from the given files.
    pub fn library<'a>(files: impl IntoIterator<Item = &'a SourceFile>) -> Self {
        let mut iface = Self {
            importable: true,
            ..Default::default()
        };
        for file in files {
            iface.merge(file);
        }
        iface
    }

    /// Interface of a test rule, which nothing may depend on.
    pub fn test(file: &SourceFile) -> Self {
        let mut iface = Self::default();
        iface.merge(file);
        iface
    }

    /// Fold a file's declarations in, skipping identifiers already present.
    pub fn merge(&mut self, file: &SourceFile) {
        for p in &file.provides {
            if !self.provides.contains(p) {
                self.provides.push(p.clone());
            }
        }
        for r in &file.requires {
            if !self.requires.contains(r) {
                self.requires.push(r.clone());
            }
        }
    }
}

pub mod diagnostic;
pub mod label;
pub mod rule;

pub use diagnostic::Diagnostic;
pub use label::Label;
pub use rule::{AttrValue, Rule};
