use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A reference to a build target: `@repo//pkg:name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Label {
    /// External repository name, empty for the main workspace.
    pub repo: String,
    /// Slash-separated package path, empty for the root package.
    pub pkg: String,
    pub name: String,
    /// Rendered without repository or package (`:name`).
    #[serde(default)]
    pub relative: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelError {
    #[error("empty label")]
    Empty,

    #[error("label {0:?} has an empty target name")]
    EmptyName(String),

    #[error("label {0:?} has an invalid repository name")]
    InvalidRepo(String),

    #[error("label {label:?} contains invalid character {ch:?}")]
    InvalidChar { label: String, ch: char },

    #[error("relative label {0:?} needs an enclosing package")]
    NeedsPackage(String),
}

impl Label {
    pub fn new(repo: impl Into<String>, pkg: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            pkg: pkg.into(),
            name: name.into(),
            relative: false,
        }
    }

    /// Parse a label, resolving `:name` and bare `name` forms against `pkg`.
    pub fn parse_in(s: &str, pkg: &str) -> Result<Self, LabelError> {
        if !s.starts_with('@') && !s.starts_with("//") {
            let name = s.strip_prefix(':').unwrap_or(s);
            check_chars(s, name)?;
            if name.is_empty() {
                return Err(LabelError::EmptyName(s.to_string()));
            }
            return Ok(Self::new("", pkg, name));
        }
        s.parse()
    }

    /// Render this label as seen from a rule in `repo`/`pkg`.
    pub fn rel(&self, repo: &str, pkg: &str) -> Label {
        if self.relative {
            return self.clone();
        }
        let same_repo = self.repo.is_empty() || self.repo == repo;
        if same_repo && self.pkg == pkg {
            return Label {
                repo: String::new(),
                pkg: String::new(),
                name: self.name.clone(),
                relative: true,
            };
        }
        if same_repo && !self.repo.is_empty() {
            return Label::new("", self.pkg.clone(), self.name.clone());
        }
        self.clone()
    }

    /// Last path component of the package, which is also the default name
    /// of a `//pkg` label.
    fn pkg_base(&self) -> &str {
        self.pkg.rsplit('/').next().unwrap_or("")
    }
}

fn check_chars(label: &str, part: &str) -> Result<(), LabelError> {
    const ALLOWED: &str = "!%-@^_\"#$&'()*-+,;<=>?[]{|}~/.";
    match part
        .chars()
        .find(|c| !(c.is_alphanumeric() || ALLOWED.contains(*c)))
    {
        Some(ch) => Err(LabelError::InvalidChar {
            label: label.to_string(),
            ch,
        }),
        None => Ok(()),
    }
}

impl FromStr for Label {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(LabelError::Empty);
        }

        let (repo, rest) = match s.strip_prefix('@') {
            Some(after_at) => {
                let (repo, rest) = after_at
                    .split_once("//")
                    .ok_or_else(|| LabelError::InvalidRepo(s.to_string()))?;
                let valid = !repo.is_empty()
                    && repo
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
                if !valid {
                    return Err(LabelError::InvalidRepo(s.to_string()));
                }
                (repo, rest)
            }
            None => match s.strip_prefix("//") {
                Some(rest) => ("", rest),
                None => return Err(LabelError::NeedsPackage(s.to_string())),
            },
        };

        let (pkg, name) = match rest.split_once(':') {
            Some((pkg, name)) => (pkg, name),
            None => (rest, rest.rsplit('/').next().unwrap_or(rest)),
        };
        check_chars(s, pkg)?;
        check_chars(s, name)?;
        if name.is_empty() {
            return Err(LabelError::EmptyName(s.to_string()));
        }

        Ok(Label::new(repo, pkg.trim_end_matches('/'), name))
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.relative {
            return write!(f, ":{}", self.name);
        }
        if !self.repo.is_empty() {
            write!(f, "@{}", self.repo)?;
        }
        if !self.pkg.is_empty() && self.pkg_base() == self.name {
            write!(f, "//{}", self.pkg)
        } else {
            write!(f, "//{}:{}", self.pkg, self.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_label() {
        let l: Label = "@io_bazel_rules_closure//closure/library/dom:query"
            .parse()
            .unwrap();
        assert_eq!(l.repo, "io_bazel_rules_closure");
        assert_eq!(l.pkg, "closure/library/dom");
        assert_eq!(l.name, "query");
    }

    #[test]
    fn test_parse_package_shorthand() {
        let l: Label = "//app/widgets".parse().unwrap();
        assert_eq!(l, Label::new("", "app/widgets", "widgets"));
    }

    #[test]
    fn test_parse_root_package() {
        let l: Label = "//:main".parse().unwrap();
        assert_eq!(l, Label::new("", "", "main"));
        assert_eq!(l.to_string(), "//:main");
    }

    #[test]
    fn test_parse_in_relative_forms() {
        assert_eq!(
            Label::parse_in(":util", "app").unwrap(),
            Label::new("", "app", "util")
        );
        assert_eq!(
            Label::parse_in("util", "app").unwrap(),
            Label::new("", "app", "util")
        );
        assert_eq!(
            Label::parse_in("//lib:x", "app").unwrap(),
            Label::new("", "lib", "x")
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<Label>(), Err(LabelError::Empty));
        assert!(matches!(
            "//app:".parse::<Label>(),
            Err(LabelError::EmptyName(_))
        ));
        assert!(matches!(
            "@//app:x".parse::<Label>(),
            Err(LabelError::InvalidRepo(_))
        ));
        assert!(matches!(
            "app:x".parse::<Label>(),
            Err(LabelError::NeedsPackage(_))
        ));
        assert!(matches!(
            "//app:x y".parse::<Label>(),
            Err(LabelError::InvalidChar { ch: ' ', .. })
        ));
    }

    #[test]
    fn test_display_uses_shorthand() {
        assert_eq!(Label::new("", "a/b", "b").to_string(), "//a/b");
        assert_eq!(Label::new("", "a/b", "c").to_string(), "//a/b:c");
        assert_eq!(Label::new("r", "a", "a").to_string(), "@r//a");
    }

    #[test]
    fn test_rel_same_package() {
        let l = Label::new("", "app", "util");
        assert_eq!(l.rel("", "app").to_string(), ":util");
    }

    #[test]
    fn test_rel_other_package() {
        let l = Label::new("", "lib/strings", "format");
        assert_eq!(l.rel("", "app").to_string(), "//lib/strings:format");
    }

    #[test]
    fn test_rel_external_repo_kept() {
        let l = Label::new("io_bazel_rules_closure", "closure/library/array", "array");
        assert_eq!(
            l.rel("", "app").to_string(),
            "@io_bazel_rules_closure//closure/library/array"
        );
    }

    #[test]
    fn test_rel_drops_own_repo() {
        let l = Label::new("main", "lib", "x");
        assert_eq!(l.rel("main", "app").to_string(), "//lib:x");
        assert_eq!(l.rel("main", "lib").to_string(), ":x");
    }
}
