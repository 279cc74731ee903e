use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ignore::WalkBuilder;

/// One directory of the project and the regular files directly inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirScan {
    /// Slash-separated path relative to the project root, "" for the root.
    pub rel: String,
    pub path: PathBuf,
    /// Base names, sorted.
    pub files: Vec<String>,
}

/// Configuration for directory discovery.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryConfig {
    /// Glob patterns to exclude.
    pub exclude: Vec<String>,
}

/// Default exclude patterns for VCS metadata, package managers and Bazel
/// output trees.
const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[".git/", "node_modules/", "bazel-*/"];

/// Walk the project, respecting .gitignore, and return every directory in
/// an order where a parent always precedes its children.
pub fn discover_dirs(root: &Path, config: &DiscoveryConfig) -> Result<Vec<DirScan>> {
    if !root.is_dir() {
        anyhow::bail!("{} is not a directory", root.display());
    }

    let mut builder = WalkBuilder::new(root);
    builder
        .hidden(false)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .parents(true);

    let mut overrides = ignore::overrides::OverrideBuilder::new(root);
    for pattern in DEFAULT_EXCLUDE_PATTERNS {
        overrides
            .add(&format!("!{}", pattern))
            .context("invalid default exclude pattern")?;
    }
    for pattern in &config.exclude {
        overrides
            .add(&format!("!{}", pattern))
            .context("invalid exclude pattern")?;
    }
    builder.overrides(overrides.build().context("failed to build overrides")?);

    let mut dirs: BTreeMap<String, DirScan> = BTreeMap::new();

    for entry in builder.build() {
        let entry = entry.context("error reading directory entry")?;
        let Some(file_type) = entry.file_type() else {
            continue;
        };
        let path = entry.path();
        let rel = relative_path(root, path);

        if file_type.is_dir() {
            dirs.entry(rel.clone()).or_insert_with(|| DirScan {
                rel,
                path: path.to_path_buf(),
                files: Vec::new(),
            });
        } else if file_type.is_file() {
            let (dir_rel, name) = match rel.rsplit_once('/') {
                Some((dir, name)) => (dir.to_string(), name.to_string()),
                None => (String::new(), rel.clone()),
            };
            let dir_path = path.parent().unwrap_or(root).to_path_buf();
            dirs.entry(dir_rel.clone())
                .or_insert_with(|| DirScan {
                    rel: dir_rel,
                    path: dir_path,
                    files: Vec::new(),
                })
                .files
                .push(name);
        }
    }

    let mut scans: Vec<DirScan> = dirs.into_values().collect();
    for scan in &mut scans {
        scan.files.sort();
    }
    // "a-b" sorts before "a/b" byte-wise; depth first keeps parents ahead.
    scans.sort_by(|a, b| depth(&a.rel).cmp(&depth(&b.rel)).then_with(|| a.rel.cmp(&b.rel)));
    Ok(scans)
}

/// The parent of a slash-separated relative directory, `None` for the root.
pub fn parent_rel(rel: &str) -> Option<&str> {
    if rel.is_empty() {
        return None;
    }
    Some(rel.rsplit_once('/').map(|(parent, _)| parent).unwrap_or(""))
}

fn depth(rel: &str) -> usize {
    if rel.is_empty() {
        0
    } else {
        rel.split('/').count()
    }
}

fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup_test_project() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        fs::create_dir_all(root.join("app/widgets")).unwrap();
        fs::write(root.join("app/main.js"), "goog.provide('corp.main');").unwrap();
        fs::write(root.join("app/BUILD"), "").unwrap();
        fs::write(root.join("app/widgets/list.jsx"), "").unwrap();
        fs::write(root.join("top.js"), "").unwrap();
        fs::create_dir_all(root.join("empty")).unwrap();

        // Initialize a git repo so the ignore crate respects .gitignore
        fs::create_dir(root.join(".git")).unwrap();
        fs::write(root.join(".gitignore"), "generated/\n*.log\n").unwrap();

        fs::create_dir_all(root.join("generated")).unwrap();
        fs::write(root.join("generated/out.js"), "").unwrap();
        fs::write(root.join("debug.log"), "some log").unwrap();

        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), "").unwrap();
        fs::create_dir_all(root.join("bazel-out/bin")).unwrap();
        fs::write(root.join("bazel-out/bin/x.js"), "").unwrap();

        dir
    }

    fn rels(scans: &[DirScan]) -> Vec<&str> {
        scans.iter().map(|s| s.rel.as_str()).collect()
    }

    #[test]
    fn test_discovers_directories_parent_first() {
        let dir = setup_test_project();
        let scans = discover_dirs(dir.path(), &DiscoveryConfig::default()).unwrap();
        assert_eq!(rels(&scans), vec!["", "app", "empty", "app/widgets"]);
    }

    #[test]
    fn test_lists_regular_files_sorted() {
        let dir = setup_test_project();
        let scans = discover_dirs(dir.path(), &DiscoveryConfig::default()).unwrap();
        let app = scans.iter().find(|s| s.rel == "app").unwrap();
        assert_eq!(app.files, vec!["BUILD", "main.js"]);
        assert!(app.path.ends_with("app"));

        let root = &scans[0];
        assert!(root.files.contains(&"top.js".to_string()));
        assert!(!root.files.contains(&"debug.log".to_string()));
    }

    #[test]
    fn test_empty_directory_included() {
        let dir = setup_test_project();
        let scans = discover_dirs(dir.path(), &DiscoveryConfig::default()).unwrap();
        let empty = scans.iter().find(|s| s.rel == "empty").unwrap();
        assert!(empty.files.is_empty());
    }

    #[test]
    fn test_respects_gitignore_and_defaults() {
        let dir = setup_test_project();
        let scans = discover_dirs(dir.path(), &DiscoveryConfig::default()).unwrap();
        assert!(!scans.iter().any(|s| s.rel.starts_with("generated")));
        assert!(!scans.iter().any(|s| s.rel.starts_with("node_modules")));
        assert!(!scans.iter().any(|s| s.rel.starts_with("bazel-out")));
        assert!(!scans.iter().any(|s| s.rel.starts_with(".git")));
    }

    #[test]
    fn test_exclude_pattern() {
        let dir = setup_test_project();
        let config = DiscoveryConfig {
            exclude: vec!["app/widgets/".to_string(), "*.jsx".to_string()],
        };
        let scans = discover_dirs(dir.path(), &config).unwrap();
        assert_eq!(rels(&scans), vec!["", "app", "empty"]);
    }

    #[test]
    fn test_sibling_with_dash_sorts_after_parent() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::create_dir_all(dir.path().join("a-c")).unwrap();
        let scans = discover_dirs(dir.path(), &DiscoveryConfig::default()).unwrap();
        assert_eq!(rels(&scans), vec!["", "a", "a-c", "a/b"]);
    }

    #[test]
    fn test_nonexistent_directory_returns_error() {
        let result = discover_dirs(
            Path::new("/nonexistent/path/that/surely/doesnt/exist"),
            &DiscoveryConfig::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_parent_rel() {
        assert_eq!(parent_rel(""), None);
        assert_eq!(parent_rel("app"), Some(""));
        assert_eq!(parent_rel("app/widgets"), Some("app"));
    }
}
