//! The Closure Library: a well-known external module library whose targets
//! live in the rules_closure repository under a predictable naming scheme.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::Label;

pub const CLOSURE_PREFIX: &str = "goog.";
pub const CLOSURE_REPO: &str = "io_bazel_rules_closure";

/// Closure Library namespaces whose targets follow the naming convention.
const CLOSURE_NAMESPACES: &[&str] = &[
    "goog.Disposable",
    "goog.Promise",
    "goog.Timer",
    "goog.Uri",
    "goog.a11y.aria",
    "goog.a11y.aria.Role",
    "goog.a11y.aria.State",
    "goog.array",
    "goog.asserts",
    "goog.async.Debouncer",
    "goog.async.Deferred",
    "goog.async.Delay",
    "goog.async.Throttle",
    "goog.async.nextTick",
    "goog.async.run",
    "goog.color",
    "goog.crypt",
    "goog.crypt.Sha256",
    "goog.crypt.base64",
    "goog.date",
    "goog.date.Date",
    "goog.date.DateTime",
    "goog.date.Interval",
    "goog.debug",
    "goog.debug.Error",
    "goog.dom",
    "goog.dom.NodeType",
    "goog.dom.TagName",
    "goog.dom.classlist",
    "goog.dom.dataset",
    "goog.dom.forms",
    "goog.dom.safe",
    "goog.dom.selection",
    "goog.events",
    "goog.events.BrowserEvent",
    "goog.events.Event",
    "goog.events.EventHandler",
    "goog.events.EventTarget",
    "goog.events.EventType",
    "goog.events.KeyCodes",
    "goog.events.KeyHandler",
    "goog.events.Listenable",
    "goog.format",
    "goog.format.JsonPrettyPrinter",
    "goog.functions",
    "goog.fx.Animation",
    "goog.fx.dom",
    "goog.html.SafeHtml",
    "goog.html.SafeScript",
    "goog.html.SafeStyle",
    "goog.html.SafeUrl",
    "goog.html.TrustedResourceUrl",
    "goog.html.sanitizer.HtmlSanitizer",
    "goog.html.uncheckedconversions",
    "goog.i18n.DateTimeFormat",
    "goog.i18n.DateTimeSymbols",
    "goog.i18n.MessageFormat",
    "goog.i18n.NumberFormat",
    "goog.i18n.pluralRules",
    "goog.iter",
    "goog.json",
    "goog.labs.userAgent.browser",
    "goog.log",
    "goog.math",
    "goog.math.Box",
    "goog.math.Coordinate",
    "goog.math.Long",
    "goog.math.Rect",
    "goog.math.Size",
    "goog.module.ModuleManager",
    "goog.net.Cookies",
    "goog.net.ErrorCode",
    "goog.net.EventType",
    "goog.net.XhrIo",
    "goog.net.jsloader",
    "goog.object",
    "goog.positioning",
    "goog.soy",
    "goog.storage.Storage",
    "goog.storage.mechanism.HTML5LocalStorage",
    "goog.string",
    "goog.string.Const",
    "goog.string.StringBuffer",
    "goog.structs",
    "goog.structs.Map",
    "goog.structs.PriorityQueue",
    "goog.structs.Set",
    "goog.style",
    "goog.testing.MockClock",
    "goog.testing.MockControl",
    "goog.testing.PropertyReplacer",
    "goog.testing.asserts",
    "goog.testing.events",
    "goog.testing.jsunit",
    "goog.testing.recordFunction",
    "goog.testing.testSuite",
    "goog.ui.Component",
    "goog.ui.Control",
    "goog.ui.Dialog",
    "goog.ui.Menu",
    "goog.ui.MenuItem",
    "goog.ui.Popup",
    "goog.ui.Tooltip",
    "goog.uri.utils",
    "goog.userAgent",
    "goog.window",
];

/// Closure Library code vendored under third_party does not follow the
/// naming convention.
const CLOSURE_THIRD_PARTY: &[(&str, &str)] = &[(
    "goog.dom.query",
    "@io_bazel_rules_closure//third_party/closure/library/dojo/dom:query",
)];

/// A finite identifier-to-target table for one external library.
#[derive(Debug, Clone)]
pub struct ExternalLibrary {
    prefix: String,
    /// Keyed by the identifier with `prefix` removed.
    targets: BTreeMap<String, Label>,
}

/// On-disk form of a replacement table.
#[derive(Debug, Deserialize)]
struct TableFile {
    #[serde(default = "default_prefix")]
    prefix: String,
    targets: BTreeMap<String, String>,
}

fn default_prefix() -> String {
    CLOSURE_PREFIX.to_string()
}

impl ExternalLibrary {
    /// Build a table from full identifiers and their targets. Every
    /// identifier must start with `prefix`.
    pub fn new(
        prefix: impl Into<String>,
        entries: impl IntoIterator<Item = (String, Label)>,
    ) -> Result<Self> {
        let prefix = prefix.into();
        let mut targets = BTreeMap::new();
        for (imp, label) in entries {
            let key = imp
                .strip_prefix(prefix.as_str())
                .with_context(|| format!("{:?} does not start with {:?}", imp, prefix))?;
            targets.insert(key.to_string(), label);
        }
        Ok(Self { prefix, targets })
    }

    /// The built-in Closure Library table.
    pub fn closure_library() -> Self {
        let mut targets: BTreeMap<String, Label> = CLOSURE_NAMESPACES
            .iter()
            .filter_map(|ns| ns.strip_prefix(CLOSURE_PREFIX))
            .map(|rest| (rest.to_string(), closure_convention(rest)))
            .collect();
        for (imp, label) in CLOSURE_THIRD_PARTY {
            if let (Some(rest), Ok(label)) = (imp.strip_prefix(CLOSURE_PREFIX), label.parse()) {
                targets.insert(rest.to_string(), label);
            }
        }
        Self {
            prefix: CLOSURE_PREFIX.to_string(),
            targets,
        }
    }

    /// Load a replacement table from a TOML file:
    ///
    /// ```toml
    /// prefix = "goog."
    /// [targets]
    /// "goog.array" = "@io_bazel_rules_closure//closure/library/array"
    /// ```
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file: TableFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        let mut entries = Vec::with_capacity(file.targets.len());
        for (imp, label) in file.targets {
            let label: Label = label
                .parse()
                .with_context(|| format!("invalid label for {:?} in {}", imp, path.display()))?;
            entries.push((imp, label));
        }
        Self::new(file.prefix, entries)
    }

    /// Whether `imp` belongs to this library's namespace.
    pub fn matches(&self, imp: &str) -> bool {
        imp.starts_with(&self.prefix)
    }

    /// Target of an identifier for which `matches` holds.
    pub fn lookup(&self, imp: &str) -> Option<&Label> {
        let Some(rest) = imp.strip_prefix(self.prefix.as_str()) else {
            panic!("expected a {} import: {}", self.prefix, imp);
        };
        self.targets.get(rest)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// `array` -> `//closure/library/array:array`,
/// `events.EventTarget` -> `//closure/library/events:eventtarget`.
fn closure_convention(rest: &str) -> Label {
    let path = rest.replace('.', "/").to_lowercase();
    let (pkg, base) = match path.rsplit_once('/') {
        Some((dir, base)) => (dir.to_string(), base.to_string()),
        None => (path.clone(), path.clone()),
    };
    Label::new(CLOSURE_REPO, format!("closure/library/{}", pkg), base)
}
