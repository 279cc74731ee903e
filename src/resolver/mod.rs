use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, warn};

use crate::model::{DeclaredInterface, Diagnostic, ImportSpec, Label, Rule, JS_LANG};

pub mod external;

use external::ExternalLibrary;

/// Result of resolving one required identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A rule in the project, or the target of an override.
    Resolved(Label),
    /// A target of the external library.
    External(Label),
    /// The requiring rule provides the identifier itself.
    SelfImport,
    /// No dependency can be emitted.
    Unresolved(UnresolvedReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// Nothing provides the identifier. Expected for identifiers that are
    /// satisfied outside the build.
    NotFound,
    /// Several rules provide the identifier; all of them, in index order.
    Ambiguous(Vec<Label>),
    /// The identifier is in the external library's namespace but not in its
    /// table.
    ExternalNotFound,
}

/// Explicit identifier-to-label mappings, consulted before the index.
#[derive(Debug, Clone, Default)]
pub struct OverrideTable {
    entries: BTreeMap<ImportSpec, Label>,
}

impl OverrideTable {
    pub fn insert(&mut self, spec: ImportSpec, label: Label) {
        self.entries.insert(spec, label);
    }

    pub fn find(&self, lang: &str, imp: &str) -> Option<&Label> {
        self.entries.get(&ImportSpec {
            lang: lang.to_string(),
            imp: imp.to_string(),
        })
    }
}

/// Collects provided identifiers from every generated rule in the project.
#[derive(Debug, Default)]
pub struct IndexBuilder {
    entries: HashMap<ImportSpec, Vec<Label>>,
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record what the rule `label` provides. Rules that are not importable
    /// (tests) are skipped.
    pub fn add_rule(&mut self, label: &Label, iface: &DeclaredInterface) {
        if !iface.importable {
            return;
        }
        for imp in &iface.provides {
            let providers = self.entries.entry(ImportSpec::js(imp.clone())).or_default();
            if !providers.contains(label) {
                providers.push(label.clone());
            }
        }
    }

    /// Freeze the index. Resolution only starts once every directory has
    /// been added.
    pub fn finish(self) -> ResolutionIndex {
        ResolutionIndex {
            entries: self.entries,
        }
    }
}

/// Maps each provided identifier to every rule that provides it. Read-only.
#[derive(Debug, Default)]
pub struct ResolutionIndex {
    entries: HashMap<ImportSpec, Vec<Label>>,
}

impl ResolutionIndex {
    /// All rules providing `spec`, in the order they were added.
    pub fn find_rules(&self, spec: &ImportSpec) -> &[Label] {
        self.entries.get(spec).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries sorted by identifier.
    pub fn entries(&self) -> Vec<(&ImportSpec, &[Label])> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|(spec, labels)| (spec, labels.as_slice()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

/// Everything resolution consults besides the rule itself.
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    pub index: &'a ResolutionIndex,
    pub overrides: &'a OverrideTable,
    pub external: &'a ExternalLibrary,
}

/// Resolve one identifier required by the rule `from`.
///
/// Sources are tried in order: the external library, overrides, then the
/// project index.
pub fn resolve_import(imp: &str, from: &Label, ctx: &ResolveContext) -> Resolution {
    if ctx.external.matches(imp) {
        return match ctx.external.lookup(imp) {
            Some(label) => Resolution::External(label.clone()),
            None => Resolution::Unresolved(UnresolvedReason::ExternalNotFound),
        };
    }

    if let Some(label) = ctx.overrides.find(JS_LANG, imp) {
        return Resolution::Resolved(label.clone());
    }

    match ctx.index.find_rules(&ImportSpec::js(imp)) {
        [] => Resolution::Unresolved(UnresolvedReason::NotFound),
        [only] if only == from => Resolution::SelfImport,
        [only] => Resolution::Resolved(only.clone()),
        many => Resolution::Unresolved(UnresolvedReason::Ambiguous(many.to_vec())),
    }
}

/// Replace the `deps` of `rule` with the targets of everything its interface
/// requires. Problems are returned; they never stop the remaining
/// identifiers from resolving.
pub fn resolve_rule(
    rule: &mut Rule,
    iface: &DeclaredInterface,
    from: &Label,
    ctx: &ResolveContext,
) -> Vec<Diagnostic> {
    rule.del_attr("deps");

    let mut diagnostics = Vec::new();
    let mut seen = HashSet::new();
    let mut deps = Vec::new();

    for imp in &iface.requires {
        let label = match resolve_import(imp, from, ctx) {
            Resolution::Resolved(label) | Resolution::External(label) => label,
            Resolution::SelfImport => continue,
            Resolution::Unresolved(UnresolvedReason::NotFound) => {
                debug!("{}: {:?} not found", from, imp);
                continue;
            }
            Resolution::Unresolved(UnresolvedReason::Ambiguous(labels)) => {
                let diagnostic = Diagnostic::AmbiguousImport {
                    from: from.to_string(),
                    imp: imp.clone(),
                    first: labels[0].to_string(),
                    second: labels[1].to_string(),
                    more: labels.len() - 2,
                };
                warn!("{}", diagnostic);
                diagnostics.push(diagnostic);
                continue;
            }
            Resolution::Unresolved(UnresolvedReason::ExternalNotFound) => {
                let diagnostic = Diagnostic::ExternalNotFound {
                    from: from.to_string(),
                    imp: imp.clone(),
                };
                warn!("{}", diagnostic);
                diagnostics.push(diagnostic);
                continue;
            }
        };

        let dep = label.rel(&from.repo, &from.pkg).to_string();
        if seen.insert(dep.clone()) {
            deps.push(dep);
        }
    }

    if !deps.is_empty() {
        rule.set_attr("deps", deps);
    }
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::rule::JS_LIBRARY;

    fn iface(provides: &[&str], requires: &[&str]) -> DeclaredInterface {
        DeclaredInterface {
            provides: provides.iter().map(|s| s.to_string()).collect(),
            requires: requires.iter().map(|s| s.to_string()).collect(),
            importable: true,
        }
    }

    struct Fixture {
        index: ResolutionIndex,
        overrides: OverrideTable,
        external: ExternalLibrary,
    }

    impl Fixture {
        fn new(rules: &[(Label, DeclaredInterface)]) -> Self {
            let mut builder = IndexBuilder::new();
            for (label, iface) in rules {
                builder.add_rule(label, iface);
            }
            Self {
                index: builder.finish(),
                overrides: OverrideTable::default(),
                external: ExternalLibrary::closure_library(),
            }
        }

        fn ctx(&self) -> ResolveContext<'_> {
            ResolveContext {
                index: &self.index,
                overrides: &self.overrides,
                external: &self.external,
            }
        }
    }

    fn deps(rule: &Rule) -> Vec<String> {
        rule.attr_strings("deps").to_vec()
    }

    #[test]
    fn test_resolves_sibling_rule() {
        let a = Label::new("", "app", "a");
        let b = Label::new("", "app", "b");
        let fx = Fixture::new(&[
            (a.clone(), iface(&["corp.a"], &[])),
            (b.clone(), iface(&["corp.b"], &["corp.a"])),
        ]);

        let mut rule = Rule::new(JS_LIBRARY, "b");
        let diags = resolve_rule(&mut rule, &iface(&["corp.b"], &["corp.a"]), &b, &fx.ctx());
        assert!(diags.is_empty());
        assert_eq!(deps(&rule), vec![":a"]);
    }

    #[test]
    fn test_other_package_rendered_absolute() {
        let lib = Label::new("", "lib/strings", "format");
        let fx = Fixture::new(&[(lib, iface(&["corp.format"], &[]))]);

        let mut rule = Rule::new(JS_LIBRARY, "main");
        let from = Label::new("", "app", "main");
        resolve_rule(&mut rule, &iface(&[], &["corp.format"]), &from, &fx.ctx());
        assert_eq!(deps(&rule), vec!["//lib/strings:format"]);
    }

    #[test]
    fn test_self_import_elided() {
        let a = Label::new("", "app", "a");
        let fx = Fixture::new(&[(a.clone(), iface(&["corp.a"], &["corp.a"]))]);

        assert_eq!(
            resolve_import("corp.a", &a, &fx.ctx()),
            Resolution::SelfImport
        );
        let mut rule = Rule::new(JS_LIBRARY, "a");
        let diags = resolve_rule(&mut rule, &iface(&["corp.a"], &["corp.a"]), &a, &fx.ctx());
        assert!(diags.is_empty());
        assert!(rule.attr("deps").is_none());
    }

    #[test]
    fn test_ambiguity_reported_other_deps_kept() {
        let x1 = Label::new("", "one", "x");
        let x2 = Label::new("", "two", "x");
        let y = Label::new("", "three", "y");
        let fx = Fixture::new(&[
            (x1, iface(&["corp.x"], &[])),
            (x2, iface(&["corp.x"], &[])),
            (y, iface(&["corp.y"], &[])),
        ]);

        let from = Label::new("", "app", "main");
        let mut rule = Rule::new(JS_LIBRARY, "main");
        let diags = resolve_rule(
            &mut rule,
            &iface(&[], &["corp.x", "corp.y"]),
            &from,
            &fx.ctx(),
        );
        assert_eq!(deps(&rule), vec!["//three:y"]);
        assert_eq!(
            diags,
            vec![Diagnostic::AmbiguousImport {
                from: "//app:main".to_string(),
                imp: "corp.x".to_string(),
                first: "//one:x".to_string(),
                second: "//two:x".to_string(),
                more: 0,
            }]
        );
    }

    #[test]
    fn test_not_found_is_silent() {
        let fx = Fixture::new(&[]);
        let from = Label::new("", "app", "main");
        let mut rule = Rule::new(JS_LIBRARY, "main");
        let diags = resolve_rule(&mut rule, &iface(&[], &["corp.nowhere"]), &from, &fx.ctx());
        assert!(diags.is_empty());
        assert!(rule.attr("deps").is_none());
    }

    #[test]
    fn test_deduplicates_in_first_seen_order() {
        let shared = Label::new("", "lib", "shared");
        let other = Label::new("", "lib", "other");
        let fx = Fixture::new(&[
            (shared, iface(&["corp.s1", "corp.s2"], &[])),
            (other, iface(&["corp.o"], &[])),
        ]);

        let from = Label::new("", "app", "main");
        let mut rule = Rule::new(JS_LIBRARY, "main");
        resolve_rule(
            &mut rule,
            &iface(&[], &["corp.s1", "corp.o", "corp.s2", "goog.array", "goog.array"]),
            &from,
            &fx.ctx(),
        );
        assert_eq!(
            deps(&rule),
            vec![
                "//lib:shared",
                "//lib:other",
                "@io_bazel_rules_closure//closure/library/array",
            ]
        );
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let a = Label::new("", "app", "a");
        let fx = Fixture::new(&[(a, iface(&["corp.a"], &[]))]);
        let from = Label::new("", "app", "b");
        let required = iface(&["corp.b"], &["corp.a"]);

        let mut rule = Rule::new(JS_LIBRARY, "b");
        rule.set_attr("deps", vec![":stale".to_string()]);
        resolve_rule(&mut rule, &required, &from, &fx.ctx());
        let first = deps(&rule);
        resolve_rule(&mut rule, &required, &from, &fx.ctx());
        assert_eq!(first, vec![":a"]);
        assert_eq!(deps(&rule), first);
    }

    #[test]
    fn test_stale_deps_cleared_when_nothing_resolves() {
        let fx = Fixture::new(&[]);
        let from = Label::new("", "app", "b");
        let mut rule = Rule::new(JS_LIBRARY, "b");
        rule.set_attr("deps", vec![":stale".to_string()]);
        resolve_rule(&mut rule, &iface(&[], &["corp.gone"]), &from, &fx.ctx());
        assert!(rule.attr("deps").is_none());
    }

    #[test]
    fn test_override_beats_index_and_ambiguity() {
        let mut fx = Fixture::new(&[
            (Label::new("", "one", "x"), iface(&["corp.x"], &[])),
            (Label::new("", "two", "x"), iface(&["corp.x"], &[])),
        ]);
        fx.overrides
            .insert(ImportSpec::js("corp.x"), Label::new("", "pinned", "x"));

        let from = Label::new("", "app", "main");
        assert_eq!(
            resolve_import("corp.x", &from, &fx.ctx()),
            Resolution::Resolved(Label::new("", "pinned", "x"))
        );
    }

    #[test]
    fn test_override_scoped_to_language() {
        let mut fx = Fixture::new(&[]);
        fx.overrides.insert(
            ImportSpec {
                lang: "go".to_string(),
                imp: "corp.x".to_string(),
            },
            Label::new("", "pinned", "x"),
        );
        let from = Label::new("", "app", "main");
        assert_eq!(
            resolve_import("corp.x", &from, &fx.ctx()),
            Resolution::Unresolved(UnresolvedReason::NotFound)
        );
    }

    #[test]
    fn test_external_library_checked_before_overrides() {
        let mut fx = Fixture::new(&[]);
        fx.overrides
            .insert(ImportSpec::js("goog.array"), Label::new("", "mine", "array"));
        let from = Label::new("", "app", "main");
        assert_eq!(
            resolve_import("goog.array", &from, &fx.ctx()),
            Resolution::External(Label::new(
                "io_bazel_rules_closure",
                "closure/library/array",
                "array"
            ))
        );
    }

    #[test]
    fn test_external_miss_reported() {
        let fx = Fixture::new(&[]);
        let from = Label::new("", "app", "main");
        let mut rule = Rule::new(JS_LIBRARY, "main");
        let diags = resolve_rule(
            &mut rule,
            &iface(&[], &["goog.strings", "goog.string"]),
            &from,
            &fx.ctx(),
        );
        assert_eq!(
            diags,
            vec![Diagnostic::ExternalNotFound {
                from: "//app:main".to_string(),
                imp: "goog.strings".to_string(),
            }]
        );
        assert_eq!(
            deps(&rule),
            vec!["@io_bazel_rules_closure//closure/library/string"]
        );
    }

    #[test]
    fn test_tests_are_not_indexed() {
        let mut builder = IndexBuilder::new();
        let test_iface = DeclaredInterface {
            provides: vec!["corp.util".to_string()],
            requires: Vec::new(),
            importable: false,
        };
        builder.add_rule(&Label::new("", "app", "util_test"), &test_iface);
        let index = builder.finish();
        assert!(index.is_empty());
        assert!(index.find_rules(&ImportSpec::js("corp.util")).is_empty());
    }

    #[test]
    fn test_index_entries_sorted() {
        let fx = Fixture::new(&[
            (Label::new("", "b", "b"), iface(&["corp.b"], &[])),
            (Label::new("", "a", "a"), iface(&["corp.a"], &[])),
        ]);
        let ids: Vec<&str> = fx
            .index
            .entries()
            .iter()
            .map(|(spec, _)| spec.imp.as_str())
            .collect();
        assert_eq!(ids, vec!["corp.a", "corp.b"]);
        assert_eq!(fx.index.len(), 2);
    }
}
