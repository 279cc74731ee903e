use serde::Serialize;
use thiserror::Error;

/// A problem found during generation. None of these stop the pass; they are
/// collected and reported alongside whatever could be generated.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A source file could not be read; only name-derived data is known.
    #[error("{path}: error reading js file: {message}")]
    ReadFailure { path: String, message: String },

    /// A file has relative imports but no `js_prefix` applies to it.
    #[error("{path}: relative imports ignored because no js_prefix is set; use the js_prefix directive or --js-prefix")]
    MissingPrefix { path: String },

    /// A test stem collected an unexpected set of files.
    #[error("{dir}: unexpected number of test sources for {stem:?}: {files:?}")]
    GroupingAnomaly {
        dir: String,
        stem: String,
        files: Vec<String>,
    },

    /// Several rules of one directory would share a name.
    #[error("{dir}: {files:?} would all generate a rule named {name:?}; none were generated")]
    NameConflict {
        dir: String,
        name: String,
        files: Vec<String>,
    },

    /// More than one rule provides the required identifier.
    #[error("rule {from} imports {imp:?} which matches multiple rules: {first} and {second}{}. # declgen:resolve may be used to disambiguate", more_suffix(.more))]
    AmbiguousImport {
        from: String,
        imp: String,
        first: String,
        second: String,
        more: usize,
    },

    /// A Closure Library identifier missing from the external table.
    #[error("rule {from} imports {imp:?}: closure library import not found")]
    ExternalNotFound { from: String, imp: String },

    /// A directive in an existing BUILD file could not be understood.
    #[error("{path}:{line}: invalid directive: {message}")]
    InvalidDirective {
        path: String,
        line: usize,
        message: String,
    },
}

fn more_suffix(more: &usize) -> String {
    if *more == 0 {
        String::new()
    } else {
        format!(" (and {} more)", more)
    }
}
