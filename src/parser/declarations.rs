//! Matches the Closure declaration grammar against a tree-sitter CST.
//!
//! Recognised top-level statements:
//!
//! ```text
//! goog.provide('a.b');
//! goog.module('a.b');
//! goog.require('a.b');
//! const x = goog.require('a.b');
//! const {x, y} = goog.require('a.b');
//! goog.setTestOnly();
//! import {x} from './x.js';
//! ```
//!
//! Statements nested inside functions or blocks are not declarations.

use anyhow::{Context, Result};
use tree_sitter::{Node, Parser};

/// The `goog.*` callees that name an identifier.
const DECLARATION_FORMS: &[&str] = &["provide", "module", "require"];

const TEST_ONLY_FORM: &str = "setTestOnly";

/// Byte range of a matched statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclKind {
    Provide(String),
    Module(String),
    Require(String),
    TestOnly,
    /// A static import; holds the specifier exactly as written.
    Import(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub kind: DeclKind,
    pub span: Span,
}

/// Parse `source` and return its declarations in file order.
///
/// tree-sitter recovers from syntax errors, so a partially broken file still
/// yields every declaration outside the damaged region.
pub fn scan(source: &[u8]) -> Result<Vec<Declaration>> {
    let mut parser = Parser::new();
    let language: tree_sitter::Language = tree_sitter_javascript::LANGUAGE.into();
    parser
        .set_language(&language)
        .context("failed to set parser language")?;
    let tree = parser
        .parse(source, None)
        .context("tree-sitter failed to parse")?;

    let mut matcher = Matcher {
        source,
        found: Vec::new(),
    };
    matcher.visit_statements(tree.root_node());
    Ok(matcher.found)
}

struct Matcher<'a> {
    source: &'a [u8],
    found: Vec<Declaration>,
}

impl<'a> Matcher<'a> {
    fn node_text(&self, node: Node) -> &'a str {
        node.utf8_text(self.source).unwrap_or("")
    }

    fn push(&mut self, kind: DeclKind, node: Node) {
        self.found.push(Declaration {
            kind,
            span: Span {
                start: node.start_byte(),
                end: node.end_byte(),
            },
        });
    }

    fn visit_statements(&mut self, node: Node) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "expression_statement" => {
                    if let Some(expr) = child.named_child(0) {
                        self.match_call(expr, child);
                    }
                }
                "lexical_declaration" | "variable_declaration" => {
                    self.match_declarators(child);
                }
                "import_statement" => {
                    self.match_import(child);
                }
                // Error recovery can leave statements, or bare calls, under
                // an ERROR node.
                "ERROR" => {
                    self.visit_statements(child);
                }
                "call_expression" => {
                    self.match_call(child, child);
                }
                _ => {}
            }
        }
    }

    /// `const x = goog.require(...)`, with any binding pattern on the left.
    fn match_declarators(&mut self, node: Node) {
        let mut cursor = node.walk();
        for declarator in node.named_children(&mut cursor) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            if let Some(value) = declarator.child_by_field_name("value") {
                self.match_call(value, node);
            }
        }
    }

    fn match_call(&mut self, call: Node, statement: Node) {
        if call.kind() != "call_expression" {
            return;
        }
        let Some(form) = self.goog_callee(call) else {
            return;
        };

        if form == TEST_ONLY_FORM {
            self.push(DeclKind::TestOnly, statement);
            return;
        }
        if !DECLARATION_FORMS.contains(&form) {
            return;
        }
        let Some(identifier) = self.first_string_argument(call) else {
            return;
        };
        let kind = match form {
            "provide" => DeclKind::Provide(identifier),
            "module" => DeclKind::Module(identifier),
            "require" => DeclKind::Require(identifier),
            other => unreachable!("unhandled declaration form: {}", other),
        };
        self.push(kind, statement);
    }

    /// For a call of the shape `goog.<name>(...)`, return `<name>`.
    fn goog_callee(&self, call: Node) -> Option<&'a str> {
        let function = call.child_by_field_name("function")?;
        if function.kind() != "member_expression" {
            return None;
        }
        let object = function.child_by_field_name("object")?;
        if object.kind() != "identifier" || self.node_text(object) != "goog" {
            return None;
        }
        let property = function.child_by_field_name("property")?;
        Some(self.node_text(property))
    }

    fn first_string_argument(&self, call: Node) -> Option<String> {
        let args = call.child_by_field_name("arguments")?;
        let first = args.named_child(0)?;
        if first.kind() != "string" {
            return None;
        }
        Some(strip_quotes(self.node_text(first)).to_string())
    }

    fn match_import(&mut self, node: Node) {
        let Some(source_node) = node.child_by_field_name("source") else {
            return;
        };
        let specifier = strip_quotes(self.node_text(source_node)).to_string();
        self.push(DeclKind::Import(specifier), node);
    }
}

fn strip_quotes(text: &str) -> &str {
    text.trim_matches(|c| c == '\'' || c == '"')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<DeclKind> {
        scan(source.as_bytes())
            .unwrap()
            .into_iter()
            .map(|d| d.kind)
            .collect()
    }

    #[test]
    fn test_plain_statements() {
        let found = kinds(
            "goog.provide('corp.foo');\ngoog.module(\"corp.bar\");\ngoog.require('corp');\n",
        );
        assert_eq!(
            found,
            vec![
                DeclKind::Provide("corp.foo".to_string()),
                DeclKind::Module("corp.bar".to_string()),
                DeclKind::Require("corp".to_string()),
            ]
        );
    }

    #[test]
    fn test_assignment_prefixes() {
        let found = kinds(
            "const str = goog.require('corp.string');\nvar dom = goog.require('corp.dom');\nlet a = goog.require('corp.a');\n",
        );
        assert_eq!(
            found,
            vec![
                DeclKind::Require("corp.string".to_string()),
                DeclKind::Require("corp.dom".to_string()),
                DeclKind::Require("corp.a".to_string()),
            ]
        );
    }

    #[test]
    fn test_destructuring_yields_one_require() {
        let found = kinds("const {\n  foo,\n  bar\n} = goog.require('corp.widgets');\n");
        assert_eq!(found, vec![DeclKind::Require("corp.widgets".to_string())]);
    }

    #[test]
    fn test_test_only_marker() {
        let found = kinds("goog.module('corp.t');\ngoog.setTestOnly();\n");
        assert_eq!(found[1], DeclKind::TestOnly);
    }

    #[test]
    fn test_nested_and_unrelated_calls_ignored() {
        let found = kinds(
            r#"
goog.module.declareLegacyNamespace();
const x = goog.module.get('corp.other');
function f() { goog.require('corp.inner'); }
foo.require('corp.notgoog');
goog.require(someVariable);
console.log('goog.require("corp.in.string")');
"#,
        );
        assert!(found.is_empty(), "unexpected declarations: {:?}", found);
    }

    #[test]
    fn test_comments_are_not_declarations() {
        let found = kinds("// goog.require('corp.commented');\n/* goog.provide('x'); */\n");
        assert!(found.is_empty());
    }

    #[test]
    fn test_imports() {
        let found = kinds(
            "import {\n  listDataShape,\n} from '../../shapes.js';\nimport './side-effect';\nimport React from 'react';\n",
        );
        assert_eq!(
            found,
            vec![
                DeclKind::Import("../../shapes.js".to_string()),
                DeclKind::Import("./side-effect".to_string()),
                DeclKind::Import("react".to_string()),
            ]
        );
    }

    #[test]
    fn test_jsx_content() {
        let found = kinds(
            "goog.module('corp.view');\nconst el = <div className=\"x\">hi</div>;\ngoog.require('corp.model');\n",
        );
        assert_eq!(
            found,
            vec![
                DeclKind::Module("corp.view".to_string()),
                DeclKind::Require("corp.model".to_string()),
            ]
        );
    }

    #[test]
    fn test_broken_file_still_yields_declarations() {
        let found = kinds("goog.provide('corp.ok');\nfunction (( {\ngoog.require('corp.dep');\n");
        assert!(found.contains(&DeclKind::Provide("corp.ok".to_string())));
    }

    #[test]
    fn test_spans_cover_statement() {
        let source = "goog.provide('a');\nconst b = goog.require('b');\n";
        let decls = scan(source.as_bytes()).unwrap();
        assert_eq!(&source[decls[0].span.start..decls[0].span.end], "goog.provide('a');");
        assert_eq!(
            &source[decls[1].span.start..decls[1].span.end],
            "const b = goog.require('b');"
        );
    }

    #[test]
    fn test_empty_source() {
        assert!(kinds("").is_empty());
    }
}
