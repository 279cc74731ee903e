//! Reading and writing BUILD files.
//!
//! Only as much Starlark is understood as generation needs: `# declgen:`
//! directive comments, top-level calls with their `name` and `srcs`, and
//! the extent of top-level assignments. Calls and assignments this crate
//! does not manage are carried through verbatim when a file is rewritten.

use std::ops::Range;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;

use crate::model::rule::MANAGED_KINDS;
use crate::model::{AttrValue, Rule};

/// Repository-relative location of the rules_closure macros.
pub const CLOSURE_DEFS: &str = "@io_bazel_rules_closure//closure:defs.bzl";

/// Default BUILD file names, searched in order.
pub const DEFAULT_BUILD_FILE_NAMES: &[&str] = &["BUILD.bazel", "BUILD"];

/// A `# declgen:key value` comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub key: String,
    pub value: String,
    /// 1-based line number.
    pub line: usize,
}

/// A top-level call found in a BUILD file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingRule {
    pub kind: String,
    /// Value of the `name` attribute, empty if there is none.
    pub name: String,
    /// Strings of the `srcs` list attribute.
    pub srcs: Vec<String>,
    /// Positional string arguments, e.g. the file of a `load`.
    pub positional: Vec<String>,
    /// Byte range of the call in the file.
    pub span: Range<usize>,
}

/// A top-level assignment such as `DEFINES = [...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub target: String,
    /// Byte range of the whole statement.
    pub span: Range<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct BuildFile {
    pub path: PathBuf,
    pub directives: Vec<Directive>,
    pub rules: Vec<ExistingRule>,
    pub assignments: Vec<Assignment>,
    content: String,
}

impl BuildFile {
    /// Source text of an existing call.
    pub fn text_of(&self, rule: &ExistingRule) -> &str {
        &self.content[rule.span.clone()]
    }

    /// Calls this crate does not generate, including `load`s of other
    /// macro files. These survive a rewrite.
    pub fn foreign_rules(&self) -> impl Iterator<Item = &ExistingRule> {
        self.rules.iter().filter(|r| {
            if r.kind == "load" {
                return r.positional.first().map(String::as_str) != Some(CLOSURE_DEFS);
            }
            !MANAGED_KINDS.contains(&r.kind.as_str())
        })
    }

    /// Source text of foreign calls and top-level assignments, in file order.
    pub fn kept_statements(&self) -> Vec<&str> {
        let mut spans: Vec<Range<usize>> = self
            .foreign_rules()
            .map(|r| r.span.clone())
            .chain(self.assignments.iter().map(|a| a.span.clone()))
            .collect();
        spans.sort_by_key(|span| span.start);
        spans.into_iter().map(|span| &self.content[span]).collect()
    }

    /// Symbols of the rules_closure `load` that name kinds this crate does
    /// not manage, e.g. `closure_js_binary`.
    pub fn foreign_closure_symbols(&self) -> impl Iterator<Item = &str> {
        self.rules
            .iter()
            .filter(|r| {
                r.kind == "load" && r.positional.first().map(String::as_str) == Some(CLOSURE_DEFS)
            })
            .flat_map(|r| r.positional.iter().skip(1))
            .map(String::as_str)
            .filter(|symbol| !MANAGED_KINDS.contains(symbol))
    }
}

/// Locate the BUILD file of a directory, trying `names` in order.
pub fn find_build_file(dir: &Path, names: &[String]) -> Option<PathBuf> {
    names
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Read and parse a BUILD file.
pub fn load(path: &Path) -> Result<BuildFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse(path, content)
}

pub fn parse(path: &Path, content: String) -> Result<BuildFile> {
    let directives = parse_directives(&content)?;
    let tokens = tokenize(&content);
    let (rules, assignments) = parse_statements(&content, &tokens);
    Ok(BuildFile {
        path: path.to_path_buf(),
        directives,
        rules,
        assignments,
        content,
    })
}

fn parse_directives(content: &str) -> Result<Vec<Directive>> {
    let re = Regex::new(r"^\s*#\s*declgen:(\w+)(?:\s+(.*?))?\s*$")
        .context("invalid directive pattern")?;
    let directives = content
        .lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let caps = re.captures(line)?;
            Some(Directive {
                key: caps[1].to_string(),
                value: caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_default(),
                line: i + 1,
            })
        })
        .collect();
    Ok(directives)
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Str(String),
    Punct(char),
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    start: usize,
    end: usize,
}

fn tokenize(content: &str) -> Vec<Token> {
    let bytes = content.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            i += 1;
        } else if c == b'#' {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
        } else if c == b'"' || c == b'\'' {
            let start = i;
            let (value, end) = lex_string(content, i);
            tokens.push(Token {
                tok: Tok::Str(value),
                start,
                end,
            });
            i = end;
        } else if c.is_ascii_alphanumeric() || c == b'_' {
            let start = i;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            tokens.push(Token {
                tok: Tok::Ident(content[start..i].to_string()),
                start,
                end: i,
            });
        } else {
            let ch = content[i..].chars().next().unwrap_or('\0');
            tokens.push(Token {
                tok: Tok::Punct(ch),
                start: i,
                end: i + ch.len_utf8(),
            });
            i += ch.len_utf8();
        }
    }
    tokens
}

/// Lex a string literal starting at `start`; returns its value and the
/// offset just past the closing quote. Unterminated strings run to the end.
fn lex_string(content: &str, start: usize) -> (String, usize) {
    let bytes = content.as_bytes();
    let quote = bytes[start];
    let triple = bytes.len() >= start + 3 && bytes[start + 1] == quote && bytes[start + 2] == quote;
    let mut i = start + if triple { 3 } else { 1 };
    let mut value = String::new();
    while i < bytes.len() {
        let c = bytes[i];
        if c == b'\\' && i + 1 < bytes.len() {
            let escaped = content[i + 1..].chars().next().unwrap_or('\\');
            value.push(match escaped {
                'n' => '\n',
                't' => '\t',
                other => other,
            });
            i += 1 + escaped.len_utf8();
            continue;
        }
        if c == quote {
            if !triple {
                return (value, i + 1);
            }
            if bytes.len() >= i + 3 && bytes[i + 1] == quote && bytes[i + 2] == quote {
                return (value, i + 3);
            }
        }
        let ch = content[i..].chars().next().unwrap_or('\0');
        value.push(ch);
        i += ch.len_utf8();
    }
    (value, bytes.len())
}

/// Top-level calls and assignments. Calls nested in an assignment's value
/// belong to the assignment.
fn parse_statements(content: &str, tokens: &[Token]) -> (Vec<ExistingRule>, Vec<Assignment>) {
    let mut rules = Vec::new();
    let mut assignments = Vec::new();
    let mut depth = 0usize;
    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i].tok {
            Tok::Ident(kind)
                if depth == 0
                    && matches!(tokens.get(i + 1).map(|t| &t.tok), Some(Tok::Punct('(')))
                    && !matches!(
                        i.checked_sub(1).map(|p| &tokens[p].tok),
                        Some(Tok::Punct('=' | '.'))
                    ) =>
            {
                let (rule, close) = parse_call(tokens, kind, i);
                rules.push(rule);
                i = close + 1;
                continue;
            }
            Tok::Ident(target) if depth == 0 => {
                if let Some(value_at) = assignment_value(tokens, i) {
                    let last = statement_end(content, tokens, value_at);
                    assignments.push(Assignment {
                        target: target.clone(),
                        span: tokens[i].start..tokens[last].end,
                    });
                    i = last + 1;
                    continue;
                }
            }
            Tok::Punct('(' | '[' | '{') => depth += 1,
            Tok::Punct(')' | ']' | '}') => depth = depth.saturating_sub(1),
            _ => {}
        }
        i += 1;
    }
    (rules, assignments)
}

/// If the identifier at `at` starts an assignment (`x = `, `x += `), the
/// index of the first token of the value.
fn assignment_value(tokens: &[Token], at: usize) -> Option<usize> {
    let punct = |k: usize| match tokens.get(k).map(|t| &t.tok) {
        Some(Tok::Punct(c)) => Some(*c),
        _ => None,
    };
    let eq = match punct(at + 1)? {
        '=' => at + 1,
        '+' | '-' | '*' | '/' | '|' if punct(at + 2) == Some('=') => at + 2,
        _ => return None,
    };
    if punct(eq + 1) == Some('=') || eq + 1 >= tokens.len() {
        return None;
    }
    Some(eq + 1)
}

/// Index of the last token of the statement whose value starts at `from`:
/// the statement ends at the first newline outside brackets.
fn statement_end(content: &str, tokens: &[Token], from: usize) -> usize {
    let mut depth = 0usize;
    let mut i = from;
    loop {
        match tokens[i].tok {
            Tok::Punct('(' | '[' | '{') => depth += 1,
            Tok::Punct(')' | ']' | '}') => depth = depth.saturating_sub(1),
            _ => {}
        }
        let Some(next) = tokens.get(i + 1) else {
            return i;
        };
        if depth == 0 && content[tokens[i].end..next.start].contains('\n') {
            return i;
        }
        i += 1;
    }
}

/// Parse the call whose kind token is at `at`. Returns the rule and the
/// index of the closing parenthesis.
fn parse_call(tokens: &[Token], kind: &str, at: usize) -> (ExistingRule, usize) {
    let mut rule = ExistingRule {
        kind: kind.to_string(),
        name: String::new(),
        srcs: Vec::new(),
        positional: Vec::new(),
        span: tokens[at].start..tokens[at].end,
    };
    let mut depth = 1usize;
    let mut i = at + 2;
    while i < tokens.len() {
        match &tokens[i].tok {
            Tok::Ident(key)
                if depth == 1
                    && matches!(tokens.get(i + 1).map(|t| &t.tok), Some(Tok::Punct('=')))
                    && !matches!(tokens.get(i + 2).map(|t| &t.tok), Some(Tok::Punct('='))) =>
            {
                match (key.as_str(), tokens.get(i + 2).map(|t| &t.tok)) {
                    ("name", Some(Tok::Str(value))) => rule.name = value.clone(),
                    ("srcs", Some(Tok::Punct('['))) => rule.srcs = list_strings(tokens, i + 2),
                    _ => {}
                }
                i += 2;
                continue;
            }
            Tok::Str(value)
                if depth == 1
                    && matches!(
                        i.checked_sub(1).map(|p| &tokens[p].tok),
                        Some(Tok::Punct('(' | ','))
                    ) =>
            {
                rule.positional.push(value.clone());
            }
            Tok::Punct('(' | '[' | '{') => depth += 1,
            Tok::Punct(')' | ']' | '}') => {
                depth -= 1;
                if depth == 0 {
                    rule.span.end = tokens[i].end;
                    return (rule, i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    rule.span.end = tokens.last().map(|t| t.end).unwrap_or(rule.span.end);
    (rule, tokens.len())
}

/// Strings directly inside the list opening at `open`.
fn list_strings(tokens: &[Token], open: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    for token in &tokens[open..] {
        match &token.tok {
            Tok::Punct('(' | '[' | '{') => depth += 1,
            Tok::Punct(')' | ']' | '}') => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            Tok::Str(s) if depth == 1 => out.push(s.clone()),
            _ => {}
        }
    }
    out
}

/// Render a BUILD file holding `rules`.
///
/// Of the file being replaced, directives, foreign calls and top-level
/// assignments are kept, as are rules_closure symbols loaded for kinds this
/// crate does not manage. Other comments are not carried over.
pub fn render(rules: &[Rule], existing: Option<&BuildFile>) -> String {
    let mut sections: Vec<String> = Vec::new();

    if let Some(file) = existing {
        if !file.directives.is_empty() {
            let lines: Vec<String> = file
                .directives
                .iter()
                .map(|d| format!("# declgen:{} {}", d.key, d.value).trim_end().to_string())
                .collect();
            sections.push(lines.join("\n"));
        }
    }

    let mut symbols: Vec<&str> = rules.iter().map(|r| r.kind.as_str()).collect();
    if let Some(file) = existing {
        symbols.extend(file.foreign_closure_symbols());
    }
    symbols.sort_unstable();
    symbols.dedup();
    if !symbols.is_empty() {
        let quoted: Vec<String> = symbols.iter().map(|k| quote(k)).collect();
        sections.push(format!("load({}, {})", quote(CLOSURE_DEFS), quoted.join(", ")));
    }

    if let Some(file) = existing {
        sections.extend(file.kept_statements().into_iter().map(str::to_string));
    }

    for rule in rules {
        sections.push(render_rule(rule));
    }

    let mut out = sections.join("\n\n");
    out.push('\n');
    out
}

pub fn render_rule(rule: &Rule) -> String {
    let mut out = format!("{}(\n    name = {},\n", rule.kind, quote(&rule.name));
    for (key, value) in rule.attrs() {
        let rendered = match value {
            AttrValue::Bool(true) => "True".to_string(),
            AttrValue::Bool(false) => "False".to_string(),
            AttrValue::Str(s) => quote(s),
            AttrValue::List(items) if items.len() == 1 => format!("[{}]", quote(&items[0])),
            AttrValue::List(items) => {
                let mut list = String::from("[\n");
                for item in items {
                    list.push_str(&format!("        {},\n", quote(item)));
                }
                list.push_str("    ]");
                list
            }
        };
        out.push_str(&format!("    {} = {},\n", key, rendered));
    }
    out.push(')');
    out
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Write `content` to `path` unless it already holds exactly that.
pub fn write_if_changed(path: &Path, content: &str) -> Result<bool> {
    if let Ok(current) = std::fs::read_to_string(path) {
        if current == content {
            return Ok(false);
        }
    }
    std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(true)
}
