use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::buildfile::{self, BuildFile};
use crate::config::{load_project_config, DirConfig};
use crate::discovery::{discover_dirs, parent_rel, DiscoveryConfig};
use crate::generate::{group_directory, PriorGroup};
use crate::model::rule::MANAGED_KINDS;
use crate::model::{DeclaredInterface, Diagnostic, Label, Rule, SourceFile};
use crate::parser::{file_info, ExtractContext};
use crate::resolver::external::ExternalLibrary;
use crate::resolver::{resolve_rule, IndexBuilder, OverrideTable, ResolveContext};

/// Options of a generation run that do not come from `declgen.toml`.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Overrides `js_prefix` from the config file.
    pub js_prefix: Option<String>,
    /// Added to the config file's excludes.
    pub exclude: Vec<String>,
    /// Write BUILD files instead of only rendering them.
    pub write: bool,
}

/// One BUILD file produced by a run.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedFile {
    /// Path relative to the project root.
    pub path: String,
    pub rules: Vec<Rule>,
    pub content: String,
    /// The file on disk was created or changed.
    pub written: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    pub files: Vec<GeneratedFile>,
    pub diagnostics: Vec<Diagnostic>,
    pub directories_scanned: usize,
    pub rules_generated: usize,
    pub identifiers_indexed: usize,
    pub duration_ms: u128,
}

/// What pass 1 leaves behind for one directory.
struct DirOutput {
    rel: String,
    build_path: PathBuf,
    existing: Option<BuildFile>,
    rules: Vec<Rule>,
    interfaces: Vec<DeclaredInterface>,
    overrides: OverrideTable,
}

/// Generate BUILD files for every directory under `project_path`.
///
/// Pass 1 walks directories parent first, extracting and grouping files and
/// indexing the resulting libraries. Pass 2 resolves every rule against the
/// complete index.
pub fn run_generate(project_path: &Path, opts: &GenerateOptions) -> Result<GenerationResult> {
    let start = Instant::now();

    let project = load_project_config(project_path)?;
    let root_config = DirConfig::root(&project, opts.js_prefix.as_deref())?;
    let external = match &project.external.table {
        Some(table) => ExternalLibrary::load(&project_path.join(table))?,
        None => ExternalLibrary::closure_library(),
    };
    if external.is_empty() {
        warn!("external library table is empty; every matching import will be reported");
    } else {
        debug!("external library table has {} entries", external.len());
    }

    let discovery = DiscoveryConfig {
        exclude: project
            .exclude
            .iter()
            .chain(&opts.exclude)
            .cloned()
            .collect(),
    };
    let scans = discover_dirs(project_path, &discovery)?;
    let default_build_name = project
        .build_file_names
        .first()
        .map(String::as_str)
        .unwrap_or(buildfile::DEFAULT_BUILD_FILE_NAMES[0]);

    let mut diagnostics = Vec::new();
    let mut configs: HashMap<String, DirConfig> = HashMap::new();
    let mut claimed: HashSet<String> = HashSet::new();
    let mut outputs = Vec::with_capacity(scans.len());
    let mut index = IndexBuilder::new();

    for scan in &scans {
        let parent = parent_rel(&scan.rel)
            .and_then(|p| configs.get(p))
            .unwrap_or(&root_config);

        let build_path = buildfile::find_build_file(&scan.path, &project.build_file_names);
        let existing = match &build_path {
            Some(path) => Some(buildfile::load(path)?),
            None => None,
        };
        let build_path = build_path.unwrap_or_else(|| scan.path.join(default_build_name));

        let directives = existing
            .as_ref()
            .map(|b| b.directives.as_slice())
            .unwrap_or(&[]);
        let config = parent.child(&scan.rel, directives, &build_path, &mut diagnostics);
        let prior_groups = existing
            .as_ref()
            .map(PriorGroup::from_build_file)
            .unwrap_or_default();

        // Files in this directory not already claimed by an ancestor's group,
        // plus the subdirectory members of this directory's groups.
        let mut srcs: Vec<String> = scan
            .files
            .iter()
            .filter(|name| !claimed.contains(&join_rel(&scan.rel, name)))
            .cloned()
            .collect();
        for group in &prior_groups {
            for src in group.srcs.iter().filter(|s| is_subdir_member(s)) {
                let rel_path = join_rel(&scan.rel, src);
                if scan.path.join(src).is_file() && claimed.insert(rel_path) {
                    srcs.push(src.clone());
                }
            }
        }

        let mut files: Vec<SourceFile> = Vec::with_capacity(srcs.len());
        for src in srcs {
            let rel_path = join_rel(&scan.rel, &src);
            let ctx = ExtractContext {
                rel_path: &rel_path,
                prefix: config.prefix(),
            };
            let mut info = file_info(&scan.path.join(&src), &ctx, &mut diagnostics);
            info.src = src;
            files.push(info);
        }

        let generated = group_directory(&scan.rel, files, &prior_groups);
        diagnostics.extend(generated.diagnostics);
        for (rule, iface) in generated.rules.iter().zip(&generated.interfaces) {
            index.add_rule(&Label::new("", scan.rel.as_str(), rule.name.as_str()), iface);
        }

        outputs.push(DirOutput {
            rel: scan.rel.clone(),
            build_path,
            existing,
            rules: generated.rules,
            interfaces: generated.interfaces,
            overrides: config.overrides.clone(),
        });
        configs.insert(scan.rel.clone(), config);
    }

    let index = index.finish();
    info!(
        "indexed {} identifiers from {} directories",
        index.len(),
        scans.len()
    );

    let mut files = Vec::new();
    let mut rules_generated = 0;
    for mut out in outputs {
        let ctx = ResolveContext {
            index: &index,
            overrides: &out.overrides,
            external: &external,
        };
        for (rule, iface) in out.rules.iter_mut().zip(&out.interfaces) {
            let from = Label::new("", out.rel.as_str(), rule.name.as_str());
            diagnostics.extend(resolve_rule(rule, iface, &from, &ctx));
        }

        if out.rules.is_empty() && !has_managed_rules(out.existing.as_ref()) {
            continue;
        }
        rules_generated += out.rules.len();

        let content = buildfile::render(&out.rules, out.existing.as_ref());
        let written = if opts.write {
            buildfile::write_if_changed(&out.build_path, &content)?
        } else {
            false
        };
        let path = out
            .build_path
            .strip_prefix(project_path)
            .unwrap_or(&out.build_path)
            .to_string_lossy()
            .to_string();
        debug!("{}: {} rules{}", path, out.rules.len(), if written { ", written" } else { "" });
        files.push(GeneratedFile {
            path,
            rules: out.rules,
            content,
            written,
        });
    }

    info!(
        "generated {} rules in {} BUILD files with {} diagnostics",
        rules_generated,
        files.len(),
        diagnostics.len()
    );

    Ok(GenerationResult {
        files,
        diagnostics,
        directories_scanned: scans.len(),
        rules_generated,
        identifiers_indexed: index.len(),
        duration_ms: start.elapsed().as_millis(),
    })
}

/// Canonical project root for a user-supplied path.
pub fn project_root(path: &str) -> Result<PathBuf> {
    PathBuf::from(path)
        .canonicalize()
        .with_context(|| format!("cannot access project path {}", path))
}

fn has_managed_rules(build: Option<&BuildFile>) -> bool {
    build.is_some_and(|b| {
        b.rules
            .iter()
            .any(|r| MANAGED_KINDS.contains(&r.kind.as_str()))
    })
}

/// Whether a group source names a file below the group's directory. Paths
/// leaving the directory are skipped; their files belong to another scan.
fn is_subdir_member(src: &str) -> bool {
    src.contains('/')
        && src
            .split('/')
            .all(|part| !part.is_empty() && part != "." && part != "..")
}

fn join_rel(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}
