use serde::{Deserialize, Serialize};

pub const JS_LIBRARY: &str = "closure_js_library";
pub const JSX_LIBRARY: &str = "closure_jsx_library";
pub const JS_TEST: &str = "closure_js_test";
pub const JSX_TEST: &str = "closure_jsx_test";

/// Rule kinds this crate generates and manages in BUILD files.
pub const MANAGED_KINDS: &[&str] = &[JS_LIBRARY, JSX_LIBRARY, JS_TEST, JSX_TEST];

pub fn is_library_kind(kind: &str) -> bool {
    kind == JS_LIBRARY || kind == JSX_LIBRARY
}

/// Value of a rule attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Str(String),
    List(Vec<String>),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            AttrValue::List(l) => Some(l),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Str(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Str(s)
    }
}

impl From<Vec<String>> for AttrValue {
    fn from(l: Vec<String>) -> Self {
        AttrValue::List(l)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

/// A build rule skeleton: a kind, a name, and attributes kept in the order
/// they were first set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub kind: String,
    pub name: String,
    attrs: Vec<(String, AttrValue)>,
}

impl Rule {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            attrs: Vec::new(),
        }
    }

    /// Set an attribute, replacing the value in place if it already exists.
    pub fn set_attr(&mut self, key: &str, value: impl Into<AttrValue>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.attrs.push((key.to_string(), value)),
        }
    }

    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// A list attribute, or an empty slice if unset or not a list.
    pub fn attr_strings(&self, key: &str) -> &[String] {
        self.attr(key).and_then(AttrValue::as_list).unwrap_or(&[])
    }

    pub fn attr_string(&self, key: &str) -> Option<&str> {
        self.attr(key).and_then(AttrValue::as_str)
    }

    pub fn del_attr(&mut self, key: &str) {
        self.attrs.retain(|(k, _)| k != key);
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v))
    }
}
