//! Syntax Tree Extractor
//!
//! Recursively walks a parsed Python module and classifies declarations and
//! statements into graph nodes and edges:
//!
//! | Construct            | Node                          | Edge                         |
//! |----------------------|-------------------------------|------------------------------|
//! | `class A(B)`         | `Class:A in m`                | `Class:A in m` → `Class:B`   |
//! | `def f` in class `C` | `Method:f of Class:C in m`    | class → method               |
//! | `def f` elsewhere    | `Function:f in m`             | none                         |
//! | `raise E(...)`       | `Raises:E`                    | none                         |
//! | `g()` / `o.g()`      | none                          | class-or-module → `Call:g`   |
//! | `t = ...`            | `Variable:t in m`             | module → variable            |
//! | `import a` / `from`  | `Import:a in m`               | module → import              |
//! | `try/except E`       | `Try block in m`, `Handler..` | module → try → handler       |
//!
//! Every syntax node is visited exactly once. Kind-specific handlers recurse
//! into their own children; everything else recurses generically, so nested
//! constructs at any depth are reached.
//!
//! The traversal state (module name, enclosing scopes) lives in an explicit
//! [`TraversalContext`] passed down the recursion; the extractor itself only
//! holds the source bytes and the output accumulator.

use serde::{Deserialize, Serialize};
use tracing::trace;
use tree_sitter::Node;

use crate::graph::{
    call_site_label, class_ref_label, positional_id, GraphAccumulator, GraphNode, Relation,
};
use crate::parser::{identifier_field, node_text};

/// Exception name used when a raise or handler does not name a simple type.
pub const GENERIC_EXCEPTION: &str = "Exception";

// ============================================================================
// Scope Tracking
// ============================================================================

/// How enclosing classes are tracked while walking nested scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeMode {
    /// Explicit scope stack. A `def` is a method only when its innermost
    /// enclosing scope is a class, and leaving a nested class restores the
    /// outer one.
    #[default]
    Nested,
    /// Single "current class" slot, cleared after any class body. Nested
    /// classes lose their enclosing class, and functions nested inside a
    /// method are still labelled as methods of that class.
    Flat,
}

impl ScopeMode {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeMode::Nested => "nested",
            ScopeMode::Flat => "flat",
        }
    }
}

impl std::str::FromStr for ScopeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nested" => Ok(ScopeMode::Nested),
            "flat" => Ok(ScopeMode::Flat),
            _ => Err(format!("unknown scope mode '{}' (expected nested or flat)", s)),
        }
    }
}

/// Kind of an enclosing scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Class,
    Function,
}

/// An entry on the scope stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    /// Scope kind
    pub kind: ScopeKind,
    /// Unqualified name
    pub name: String,
    /// Node id of the class/function
    pub id: String,
    /// Display label of the class/function
    pub label: String,
}

/// Traversal state for one file.
///
/// Created per file, mutated when entering and leaving class and function
/// bodies, and dropped once the file is done.
#[derive(Debug, Clone)]
pub struct TraversalContext {
    module: String,
    mode: ScopeMode,
    scopes: Vec<Scope>,
    /// Flat mode only: the single current-class slot
    class_slot: Option<Scope>,
}

impl TraversalContext {
    /// Create a context for a module.
    pub fn new(module: impl Into<String>, mode: ScopeMode) -> Self {
        Self {
            module: module.into(),
            mode,
            scopes: Vec::new(),
            class_slot: None,
        }
    }

    /// Dotted module name
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Scope mode in effect
    pub fn mode(&self) -> ScopeMode {
        self.mode
    }

    /// Node id of the module
    pub fn module_id(&self) -> &str {
        &self.module
    }

    /// The class that owns calls made at this point, if any.
    pub fn current_class(&self) -> Option<&Scope> {
        match self.mode {
            ScopeMode::Nested => self
                .scopes
                .iter()
                .rev()
                .find(|s| s.kind == ScopeKind::Class),
            ScopeMode::Flat => self.class_slot.as_ref(),
        }
    }

    /// The class a `def` at this point belongs to, if it is a method.
    pub fn method_owner(&self) -> Option<&Scope> {
        match self.mode {
            ScopeMode::Nested => self.scopes.last().filter(|s| s.kind == ScopeKind::Class),
            ScopeMode::Flat => self.class_slot.as_ref(),
        }
    }

    /// Build the id of a declaration named `name` at the current lexical position.
    pub fn qualified_id(&self, name: &str) -> String {
        if self.scopes.is_empty() {
            return format!("{}::{}", self.module, name);
        }
        let path: Vec<&str> = self.scopes.iter().map(|s| s.name.as_str()).collect();
        format!("{}::{}.{}", self.module, path.join("."), name)
    }

    /// Enter a class or function body.
    pub fn enter(&mut self, scope: Scope) {
        if self.mode == ScopeMode::Flat && scope.kind == ScopeKind::Class {
            self.class_slot = Some(scope.clone());
        }
        self.scopes.push(scope);
    }

    /// Leave the innermost body.
    pub fn leave(&mut self) {
        if let Some(scope) = self.scopes.pop() {
            if self.mode == ScopeMode::Flat && scope.kind == ScopeKind::Class {
                self.class_slot = None;
            }
        }
    }

    /// Current nesting depth
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }
}

// ============================================================================
// Extractor
// ============================================================================

/// Walks one syntax tree and appends nodes and edges to an accumulator.
pub struct Extractor<'a> {
    source: &'a [u8],
    graph: &'a mut GraphAccumulator,
}

impl<'a> Extractor<'a> {
    /// Create an extractor over `source` writing into `graph`.
    pub fn new(source: &'a str, graph: &'a mut GraphAccumulator) -> Self {
        Self {
            source: source.as_bytes(),
            graph,
        }
    }

    /// Extract everything beneath `root`.
    pub fn extract(&mut self, root: &Node, ctx: &mut TraversalContext) {
        self.visit_children(root, ctx);
    }

    fn visit_children(&mut self, node: &Node, ctx: &mut TraversalContext) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(&child, ctx);
        }
    }

    fn visit(&mut self, node: &Node, ctx: &mut TraversalContext) {
        match node.kind() {
            "class_definition" => self.visit_class(node, ctx),
            "function_definition" => self.visit_function(node, ctx),
            kind => {
                match kind {
                    "raise_statement" => self.record_raise(node, ctx),
                    "call" => self.record_call(node, ctx),
                    "assignment" => self.record_assignment(node, ctx),
                    "import_statement" | "import_from_statement" | "future_import_statement" => {
                        self.record_imports(node, ctx)
                    }
                    "try_statement" => self.record_try(node, ctx),
                    _ => {}
                }
                self.visit_children(node, ctx);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------------

    fn visit_class(&mut self, node: &Node, ctx: &mut TraversalContext) {
        let Some(name) = identifier_field(node, "name", self.source) else {
            self.visit_children(node, ctx);
            return;
        };

        let id = ctx.qualified_id(name);
        let class = GraphNode::class(id.clone(), name, ctx.module(), line_of(node));
        let label = class.label.clone();
        trace!("class {} ({})", label, id);
        self.graph.push_node(class);

        if let Some(bases) = node.child_by_field_name("superclasses") {
            let mut cursor = bases.walk();
            for base in bases.named_children(&mut cursor) {
                let base = unwrap_parens(base);
                if base.kind() == "identifier" {
                    let base_name = node_text(&base, self.source);
                    self.graph
                        .push_edge(&id, &class_ref_label(base_name), Relation::Inherits);
                }
            }
        }

        ctx.enter(Scope {
            kind: ScopeKind::Class,
            name: name.to_string(),
            id,
            label,
        });
        self.visit_children(node, ctx);
        ctx.leave();
    }

    fn visit_function(&mut self, node: &Node, ctx: &mut TraversalContext) {
        let Some(name) = identifier_field(node, "name", self.source) else {
            self.visit_children(node, ctx);
            return;
        };

        let id = ctx.qualified_id(name);
        let line = line_of(node);
        let function = match ctx.method_owner() {
            Some(owner) => {
                let method = GraphNode::method(id.clone(), name, &owner.label, line);
                self.graph.push_edge(&owner.id, &id, Relation::Contains);
                method
            }
            None => GraphNode::function(id.clone(), name, ctx.module(), line),
        };
        let label = function.label.clone();
        self.graph.push_node(function);

        ctx.enter(Scope {
            kind: ScopeKind::Function,
            name: name.to_string(),
            id,
            label,
        });
        self.visit_children(node, ctx);
        ctx.leave();
    }

    // ------------------------------------------------------------------------
    // Statements and expressions
    // ------------------------------------------------------------------------

    fn record_raise(&mut self, node: &Node, ctx: &TraversalContext) {
        let exception = raised_exception_name(node, self.source);
        let id = positional_id(ctx.module(), "raise", node);
        self.graph
            .push_node(GraphNode::raise_site(id, &exception, line_of(node)));
    }

    fn record_call(&mut self, node: &Node, ctx: &TraversalContext) {
        let Some(callee) = callee_name(node, self.source) else {
            return;
        };
        let caller = match ctx.current_class() {
            Some(class) => class.id.as_str(),
            None => ctx.module_id(),
        };
        self.graph
            .push_edge(caller, &call_site_label(callee), Relation::Invokes);
    }

    fn record_assignment(&mut self, node: &Node, ctx: &TraversalContext) {
        // `x: int = 1` is an annotated assignment, not an assignment
        if node.child_by_field_name("type").is_some() {
            return;
        }
        let Some(target) = node.child_by_field_name("left") else {
            return;
        };
        let mut text = normalize_whitespace(node_text(&target, self.source));
        if text.is_empty() {
            return;
        }
        // `a, b = ...` is a tuple target
        if target.kind() == "pattern_list" {
            text = format!("({})", text);
        }
        let variable = GraphNode::variable(ctx.module(), &text, line_of(node));
        let variable_id = variable.id.clone();
        self.graph.push_node(variable);
        self.graph
            .push_edge(ctx.module_id(), &variable_id, Relation::Assigns);
    }

    fn record_imports(&mut self, node: &Node, ctx: &TraversalContext) {
        let line = line_of(node);
        for name in imported_names(node, self.source) {
            let import = GraphNode::import(ctx.module(), &name, line);
            let import_id = import.id.clone();
            self.graph.push_node(import);
            self.graph
                .push_edge(ctx.module_id(), &import_id, Relation::Imports);
        }
    }

    fn record_try(&mut self, node: &Node, ctx: &TraversalContext) {
        let module = ctx.module();
        let try_id = positional_id(module, "try", node);
        self.graph
            .push_node(GraphNode::try_block(try_id.clone(), module, line_of(node)));
        self.graph
            .push_edge(ctx.module_id(), &try_id, Relation::Handles);

        let mut cursor = node.walk();
        for clause in node.children(&mut cursor) {
            if !matches!(clause.kind(), "except_clause" | "except_group_clause") {
                continue;
            }
            let exception = handled_exception_name(&clause, self.source);
            let handler_id = positional_id(module, "handler", &clause);
            self.graph.push_node(GraphNode::handler(
                handler_id.clone(),
                &exception,
                module,
                line_of(&clause),
            ));
            self.graph
                .push_edge(&try_id, &handler_id, Relation::Handles);
        }
    }
}

// ============================================================================
// Name Resolution Helpers
// ============================================================================

fn line_of(node: &Node) -> usize {
    node.start_position().row + 1
}

/// First named child that is not a comment.
fn first_named_child<'t>(node: &Node<'t>) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node
        .named_children(&mut cursor)
        .find(|child| child.kind() != "comment");
    found
}

/// Strip grouping parentheses: `((E))` is `E`.
fn unwrap_parens(mut node: Node<'_>) -> Node<'_> {
    while node.kind() == "parenthesized_expression" {
        match first_named_child(&node) {
            Some(inner) => node = inner,
            None => break,
        }
    }
    node
}

/// Name of the exception raised by a `raise` statement.
///
/// `raise E` and `raise E(...)` yield `E`, with or without grouping
/// parentheses; anything else (bare `raise`, `raise mod.E`,
/// `raise make()()`) yields the generic name.
pub fn raised_exception_name(raise: &Node, source: &[u8]) -> String {
    let cause = raise.child_by_field_name("cause").map(|c| c.id());
    let Some(exc) = first_named_child(raise).filter(|n| Some(n.id()) != cause) else {
        return GENERIC_EXCEPTION.to_string();
    };
    let exc = unwrap_parens(exc);
    let name = match exc.kind() {
        "identifier" => Some(exc),
        "call" => exc
            .child_by_field_name("function")
            .map(unwrap_parens)
            .filter(|f| f.kind() == "identifier"),
        _ => None,
    };
    name.map(|n| node_text(&n, source).to_string())
        .unwrap_or_else(|| GENERIC_EXCEPTION.to_string())
}

/// Name of the callee of a call expression.
///
/// A plain name yields itself, an attribute access yields its final
/// component, any other shape yields `None`.
pub fn callee_name<'s>(call: &Node, source: &'s [u8]) -> Option<&'s str> {
    let function = unwrap_parens(call.child_by_field_name("function")?);
    match function.kind() {
        "identifier" => Some(node_text(&function, source)),
        "attribute" => identifier_field(&function, "attribute", source),
        _ => None,
    }
}

/// Exception type declared by an `except` clause.
pub fn handled_exception_name(clause: &Node, source: &[u8]) -> String {
    let mut cursor = clause.walk();
    let declared = clause
        .named_children(&mut cursor)
        .find(|child| !matches!(child.kind(), "block" | "comment"));
    let Some(mut declared) = declared else {
        return GENERIC_EXCEPTION.to_string();
    };
    // `except E as e` may wrap the type in an as_pattern
    if declared.kind() == "as_pattern" {
        match first_named_child(&declared) {
            Some(inner) => declared = inner,
            None => return GENERIC_EXCEPTION.to_string(),
        }
    }
    let declared = unwrap_parens(declared);
    if declared.kind() == "identifier" {
        node_text(&declared, source).to_string()
    } else {
        GENERIC_EXCEPTION.to_string()
    }
}

/// Names imported by an import statement, in source order.
///
/// Aliases are ignored (`import numpy as np` imports `numpy`); a wildcard
/// import yields `*`.
pub fn imported_names(import: &Node, source: &[u8]) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = import.walk();
    for child in import.children_by_field_name("name", &mut cursor) {
        let name_node = if child.kind() == "aliased_import" {
            child.child_by_field_name("name")
        } else {
            Some(child)
        };
        if let Some(name_node) = name_node {
            names.push(strip_whitespace(node_text(&name_node, source)));
        }
    }

    let mut cursor = import.walk();
    let has_wildcard = import
        .named_children(&mut cursor)
        .any(|child| child.kind() == "wildcard_import");
    if has_wildcard {
        names.push("*".to_string());
    }
    names
}

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
