//! Tree-Sitter Parser for Python Sources
//!
//! Thin wrapper around a tree-sitter `Parser` configured with the Python
//! grammar. Tree-sitter recovers from malformed input by inserting `ERROR`
//! and `MISSING` nodes; [`PythonParser::parse`] turns those into a hard
//! [`ParserError::Syntax`] so a malformed file fails the same way a strict
//! compiler front-end would.

use thiserror::Error;
use tree_sitter::{Language, Node, Parser, Tree};

// ============================================================================
// Parser Errors
// ============================================================================

/// Errors that can occur during parsing.
#[derive(Debug, Error)]
pub enum ParserError {
    /// Failed to set language
    #[error("Failed to set language: {0}")]
    LanguageSet(String),

    /// Tree-sitter produced no tree
    #[error("Failed to parse source code")]
    ParseFailed,

    /// The source contains a syntax error
    #[error("invalid syntax at line {line}, column {column}")]
    Syntax { line: usize, column: usize },
}

/// Tree-sitter language for Python.
pub fn python_language() -> Language {
    tree_sitter_python::LANGUAGE.into()
}

// ============================================================================
// Python Parser
// ============================================================================

/// A tree-sitter based Python parser.
pub struct PythonParser {
    parser: Parser,
}

impl PythonParser {
    /// Create a new parser.
    pub fn new() -> Result<Self, ParserError> {
        let mut parser = Parser::new();
        parser
            .set_language(&python_language())
            .map_err(|e| ParserError::LanguageSet(e.to_string()))?;

        Ok(Self { parser })
    }

    /// Parse source code into a syntax tree, rejecting trees with syntax errors.
    pub fn parse(&mut self, source: &str) -> Result<Tree, ParserError> {
        let tree = self.parse_lenient(source)?;
        if let Some((line, column)) = first_syntax_error(&tree.root_node()) {
            return Err(ParserError::Syntax { line, column });
        }
        Ok(tree)
    }

    /// Parse source code, keeping error-recovery nodes in the tree.
    pub fn parse_lenient(&mut self, source: &str) -> Result<Tree, ParserError> {
        self.parser
            .parse(source, None)
            .ok_or(ParserError::ParseFailed)
    }
}

/// Locate the first `ERROR` or `MISSING` node in document order.
///
/// Returns a 1-indexed line and 0-indexed column.
pub fn first_syntax_error(root: &Node) -> Option<(usize, usize)> {
    if !root.has_error() {
        return None;
    }
    if root.is_error() || root.is_missing() {
        let pos = root.start_position();
        return Some((pos.row + 1, pos.column));
    }
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        if let Some(found) = first_syntax_error(&child) {
            return Some(found);
        }
    }
    // has_error() was set but no child carries it; report the node itself
    let pos = root.start_position();
    Some((pos.row + 1, pos.column))
}

// ============================================================================
// Node Helpers
// ============================================================================

/// Source text of a node, or an empty string for non-UTF-8 spans.
pub fn node_text<'a>(node: &Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

/// Text of a named field when the field holds a plain identifier.
pub fn identifier_field<'a>(node: &Node, field: &str, source: &'a [u8]) -> Option<&'a str> {
    node.child_by_field_name(field)
        .filter(|n| n.kind() == "identifier")
        .map(|n| node_text(&n, source))
}
