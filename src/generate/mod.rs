//! Unit grouping: turns the classified files of one directory into rule
//! skeletons and the declared interfaces that go with them.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use crate::buildfile::BuildFile;
use crate::model::rule::{is_library_kind, JSX_LIBRARY, JSX_TEST, JS_LIBRARY, JS_TEST};
use crate::model::{DeclaredInterface, Diagnostic, FileKind, Rule, SourceFile};

const PUBLIC_VISIBILITY: &str = "//visibility:public";

/// A multi-file library already defined in a directory's BUILD file. Its
/// membership wins over one-rule-per-file grouping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorGroup {
    pub kind: String,
    pub name: String,
    /// Paths relative to the directory; may reach into subdirectories.
    pub srcs: Vec<String>,
}

impl PriorGroup {
    /// Library rules with more than one source in `build`.
    pub fn from_build_file(build: &BuildFile) -> Vec<PriorGroup> {
        build
            .rules
            .iter()
            .filter(|r| is_library_kind(&r.kind) && r.srcs.len() > 1)
            .map(|r| PriorGroup {
                kind: r.kind.clone(),
                name: r.name.clone(),
                srcs: r.srcs.clone(),
            })
            .collect()
    }
}

/// Rules generated for one directory. `rules[i]` declares `interfaces[i]`.
#[derive(Debug, Default)]
pub struct GenerateResult {
    pub rules: Vec<Rule>,
    pub interfaces: Vec<DeclaredInterface>,
    pub diagnostics: Vec<Diagnostic>,
}

impl GenerateResult {
    fn push(&mut self, rule: Rule, iface: DeclaredInterface) {
        self.rules.push(rule);
        self.interfaces.push(iface);
    }
}

struct GroupAccumulator<'a> {
    prior: &'a PriorGroup,
    members: Vec<SourceFile>,
}

/// Partition the files of directory `dir` into rules.
///
/// Emits one library per ordinary source file, one test per test stem
/// (optionally with its html fixture) and one library per prior group that
/// still has members, in that order.
pub fn group_directory(
    dir: &str,
    mut files: Vec<SourceFile>,
    prior_groups: &[PriorGroup],
) -> GenerateResult {
    let mut result = GenerateResult::default();

    let mut groups: Vec<GroupAccumulator> = prior_groups
        .iter()
        .map(|prior| GroupAccumulator {
            prior,
            members: Vec::new(),
        })
        .collect();
    let mut group_of: HashMap<&str, usize> = HashMap::new();
    for (i, prior) in prior_groups.iter().enumerate() {
        for src in &prior.srcs {
            group_of.entry(src.as_str()).or_insert(i);
        }
    }

    // Sorting puts foo_test.html ahead of foo_test.js.
    files.sort_by(|a, b| a.src.cmp(&b.src));

    let mut tests: BTreeMap<String, Vec<SourceFile>> = BTreeMap::new();

    for file in files {
        if file.kind == FileKind::Unknown {
            continue;
        }

        if file.kind.is_source() {
            if let Some(&i) = group_of.get(file.src.as_str()) {
                groups[i].members.push(file);
                continue;
            }
        }

        if file.is_test {
            tests.entry(test_stem(&file.name).to_string()).or_default().push(file);
            continue;
        }

        match file.kind {
            FileKind::Js | FileKind::Jsx => {
                let iface = DeclaredInterface::library([&file]);
                result.push(generate_library(&file), iface);
            }
            _ => debug!("{}: {} is not part of any rule", dir, file.src),
        }
    }

    for (stem, bucket) in tests {
        match split_test_bucket(&bucket) {
            Some((js, html)) => {
                let iface = DeclaredInterface::test(js);
                let rule = match html {
                    Some(html) => generate_combined_test(js, html),
                    None => generate_test(js),
                };
                result.push(rule, iface);
            }
            None => {
                let diagnostic = Diagnostic::GroupingAnomaly {
                    dir: dir.to_string(),
                    files: bucket.iter().map(|f| f.src.clone()).collect(),
                    stem,
                };
                warn!("{}", diagnostic);
                result.diagnostics.push(diagnostic);
            }
        }
    }

    for group in groups {
        if group.members.is_empty() {
            debug!("{}: group {} has no remaining sources", dir, group.prior.name);
            continue;
        }
        let iface = DeclaredInterface::library(&group.members);
        result.push(generate_group(group.prior, &group.members), iface);
    }

    drop_name_conflicts(dir, &mut result);
    debug!("{}: generated {} rules", dir, result.rules.len());
    result
}

/// Remove every rule whose name another rule of the directory also took,
/// e.g. `foo.js` next to `foo.jsx`. Neither can be referenced unambiguously.
fn drop_name_conflicts(dir: &str, result: &mut GenerateResult) {
    let mut by_name: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, rule) in result.rules.iter().enumerate() {
        by_name.entry(rule.name.as_str()).or_default().push(i);
    }
    let mut conflicts = Vec::new();
    let mut dropped = vec![false; result.rules.len()];
    for (name, indices) in by_name.iter().filter(|(_, v)| v.len() > 1) {
        let files: Vec<String> = indices
            .iter()
            .flat_map(|&i| result.rules[i].attr_strings("srcs").iter().cloned())
            .collect();
        for &i in indices {
            dropped[i] = true;
        }
        conflicts.push(Diagnostic::NameConflict {
            dir: dir.to_string(),
            name: name.to_string(),
            files,
        });
    }
    if conflicts.is_empty() {
        return;
    }
    for diagnostic in conflicts {
        warn!("{}", diagnostic);
        result.diagnostics.push(diagnostic);
    }

    let rules = std::mem::take(&mut result.rules);
    let interfaces = std::mem::take(&mut result.interfaces);
    for ((rule, iface), dropped) in rules.into_iter().zip(interfaces).zip(dropped) {
        if !dropped {
            result.push(rule, iface);
        }
    }
}

/// `foo_test.js` -> `foo`.
fn test_stem(name: &str) -> &str {
    let stem = name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name);
    stem.strip_suffix("_test").unwrap_or(stem)
}

/// A valid bucket holds exactly one test source and at most one fixture.
fn split_test_bucket(bucket: &[SourceFile]) -> Option<(&SourceFile, Option<&SourceFile>)> {
    let (sources, fixtures): (Vec<&SourceFile>, Vec<&SourceFile>) =
        bucket.iter().partition(|f| f.kind.is_source());
    match (sources.as_slice(), fixtures.as_slice()) {
        ([js], []) => Some((*js, None)),
        ([js], [html]) => Some((*js, Some(*html))),
        _ => None,
    }
}

fn rule_name(src: &str) -> &str {
    let base = src.rsplit('/').next().unwrap_or(src);
    base.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(base)
}

fn library_kind(kind: FileKind) -> &'static str {
    match kind {
        FileKind::Jsx => JSX_LIBRARY,
        _ => JS_LIBRARY,
    }
}

fn test_kind(kind: FileKind) -> &'static str {
    match kind {
        FileKind::Jsx => JSX_TEST,
        _ => JS_TEST,
    }
}

fn generate_library(file: &SourceFile) -> Rule {
    let mut rule = Rule::new(library_kind(file.kind), rule_name(&file.src));
    rule.set_attr("srcs", vec![file.src.clone()]);
    rule.set_attr("visibility", vec![PUBLIC_VISIBILITY.to_string()]);
    if file.is_test_only {
        rule.set_attr("testonly", true);
    }
    rule
}

fn generate_test(js: &SourceFile) -> Rule {
    let mut rule = Rule::new(test_kind(js.kind), rule_name(&js.src));
    rule.set_attr("srcs", vec![js.src.clone()]);
    rule.set_attr("compilation_level", "ADVANCED");
    if !js.provides.is_empty() {
        rule.set_attr("entry_points", js.provides.clone());
    }
    rule.set_attr("visibility", vec![PUBLIC_VISIBILITY.to_string()]);
    rule
}

fn generate_combined_test(js: &SourceFile, html: &SourceFile) -> Rule {
    let mut rule = generate_test(js);
    rule.set_attr("html", html.src.as_str());
    rule
}

fn generate_group(prior: &PriorGroup, members: &[SourceFile]) -> Rule {
    let mut rule = Rule::new(prior.kind.as_str(), prior.name.as_str());
    rule.set_attr(
        "srcs",
        members.iter().map(|f| f.src.clone()).collect::<Vec<_>>(),
    );
    rule.set_attr("visibility", vec![PUBLIC_VISIBILITY.to_string()]);
    if members.iter().any(|f| f.is_test_only) {
        rule.set_attr("testonly", true);
    }
    rule
}
