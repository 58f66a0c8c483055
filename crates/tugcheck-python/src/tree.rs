//! Parsed module trees.
//!
//! A [`ModuleTree`] is an arena of [`Node`]s addressed by [`NodeId`]. Statement
//! lists and symbol tables hold ids, never nodes, so a class can appear both
//! in the module's statement list and in its symbol table without shared
//! ownership. Each tree owns its arena; ids from one tree mean nothing in
//! another.
//!
//! Trees are produced by a parser outside this crate (see
//! [`crate::pipeline::ModuleParser`]) through the builder methods
//! [`ModuleTree::add_statement`] and [`ModuleTree::alloc`]. Only the parts of
//! the syntax that stub merging inspects are modelled in detail; everything
//! else is an [`Node::Other`] statement or an [`Expr::Other`] expression.

use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Identifiers and Positions
// ============================================================================

/// Index of a node in its tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Create a new node ID.
    pub fn new(id: u32) -> Self {
        NodeId(id)
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node_{}", self.0)
    }
}

/// Line and column of a node (1-indexed line, 0 when unknown).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Position { line, column }
    }
}

/// Names defined in a scope, in name order.
pub type SymbolTable = BTreeMap<String, NodeId>;

// ============================================================================
// Types
// ============================================================================

/// A type annotation as written in the file. Never interpreted here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeAnnotation(pub String);

impl TypeAnnotation {
    pub fn new(text: impl Into<String>) -> Self {
        TypeAnnotation(text.into())
    }
}

impl fmt::Display for TypeAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Declared signature of a function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    /// One entry per argument, `None` where unannotated.
    pub arg_types: Vec<Option<TypeAnnotation>>,
    pub return_type: Option<TypeAnnotation>,
}

/// How an argument is passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgKind {
    /// `x`
    Positional,
    /// `x=...`
    Optional,
    /// `*args`
    Star,
    /// keyword-only `x`
    Named,
    /// keyword-only `x=...`
    NamedOptional,
    /// `**kwargs`
    StarStar,
}

// ============================================================================
// Expressions
// ============================================================================

/// Expressions, as far as merging needs to distinguish them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// `name`
    Name(String),
    /// `expr.name`
    Member { expr: Box<Expr>, name: String },
    /// `callee(args)`; `arg_names` is parallel to `args`, `None` for positional.
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        arg_names: Vec<Option<String>>,
    },
    /// `...`
    Ellipsis,
    /// Annotated declaration without a value (`x: int`).
    Missing,
    /// Numbers, strings and other constants, as written.
    Literal(String),
    /// Anything else, with a short description.
    Other(String),
}

impl Expr {
    pub fn name(name: impl Into<String>) -> Self {
        Expr::Name(name.into())
    }

    /// `self.<attr>` style attribute access.
    pub fn member(expr: Expr, name: impl Into<String>) -> Self {
        Expr::Member {
            expr: Box::new(expr),
            name: name.into(),
        }
    }

    /// A call with keyword arguments only.
    pub fn call_with_keywords<I, S>(callee: Expr, keywords: I) -> Self
    where
        I: IntoIterator<Item = (S, Expr)>,
        S: Into<String>,
    {
        let (arg_names, args) = keywords
            .into_iter()
            .map(|(name, value)| (Some(name.into()), value))
            .unzip();
        Expr::Call {
            callee: Box::new(callee),
            args,
            arg_names,
        }
    }

    /// True for values that stand for "no real default".
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Expr::Ellipsis | Expr::Missing)
    }

    /// Short kind name used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Name(_) => "Name",
            Expr::Member { .. } => "Member",
            Expr::Call { .. } => "Call",
            Expr::Ellipsis => "Ellipsis",
            Expr::Missing => "Missing",
            Expr::Literal(_) => "Literal",
            Expr::Other(_) => "Other",
        }
    }
}

// ============================================================================
// Statements and Definitions
// ============================================================================

/// A named variable in a symbol table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Var {
    pub name: String,
    pub ty: Option<TypeAnnotation>,
    pub pos: Position,
}

/// `lvalue [= lvalue ...] [: type] = rvalue`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentStmt {
    pub lvalues: Vec<Expr>,
    pub rvalue: Expr,
    pub ty: Option<TypeAnnotation>,
    pub unanalyzed_type: Option<TypeAnnotation>,
    pub pos: Position,
}

impl AssignmentStmt {
    /// Single-target assignment.
    pub fn new(target: Expr, rvalue: Expr, pos: Position) -> Self {
        AssignmentStmt {
            lvalues: vec![target],
            rvalue,
            ty: None,
            unanalyzed_type: None,
            pos,
        }
    }

    /// Set both the analyzed and the written annotation.
    pub fn annotated(mut self, ty: impl Into<String>) -> Self {
        let ty = TypeAnnotation::new(ty);
        self.unanalyzed_type = Some(ty.clone());
        self.ty = Some(ty);
        self
    }

    /// Target name if this assigns a single plain name.
    pub fn simple_name(&self) -> Option<&str> {
        match self.lvalues.as_slice() {
            [Expr::Name(name)] => Some(name),
            _ => None,
        }
    }

    /// Attribute name if this assigns a single `x.attr` target.
    pub fn member_name(&self) -> Option<&str> {
        match self.lvalues.as_slice() {
            [Expr::Member { name, .. }] => Some(name),
            _ => None,
        }
    }
}

/// `def name(args): body`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncDef {
    pub name: String,
    pub arg_names: Vec<String>,
    pub arg_kinds: Vec<ArgKind>,
    pub ty: Option<Signature>,
    pub unanalyzed_type: Option<Signature>,
    pub body: Vec<NodeId>,
    pub pos: Position,
}

impl FuncDef {
    /// Function with positional arguments and an empty body.
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        arg_names: impl IntoIterator<Item = S>,
        pos: Position,
    ) -> Self {
        let arg_names: Vec<String> = arg_names.into_iter().map(Into::into).collect();
        FuncDef {
            name: name.into(),
            arg_kinds: vec![ArgKind::Positional; arg_names.len()],
            arg_names,
            ty: None,
            unanalyzed_type: None,
            body: Vec::new(),
            pos,
        }
    }

    /// Set both the analyzed and the written signature.
    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.unanalyzed_type = Some(signature.clone());
        self.ty = Some(signature);
        self
    }
}

/// `class name: body`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDef {
    pub name: String,
    pub type_vars: Vec<String>,
    pub metaclass: Option<TypeAnnotation>,
    pub runtime_protocol: bool,
    /// Names defined in the class body. Owned by the class.
    pub names: SymbolTable,
    /// Body statements in declaration order.
    pub body: Vec<NodeId>,
    pub pos: Position,
}

impl ClassDef {
    pub fn new(name: impl Into<String>, pos: Position) -> Self {
        ClassDef {
            name: name.into(),
            type_vars: Vec::new(),
            metaclass: None,
            runtime_protocol: false,
            names: SymbolTable::new(),
            body: Vec::new(),
            pos,
        }
    }
}

/// A function with decorators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decorator {
    pub decorators: Vec<Expr>,
    /// The decorated [`FuncDef`].
    pub func: NodeId,
    pub pos: Position,
}

/// `if ...: body elif ...: body else: else_body`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfStmt {
    /// One block per `if`/`elif` branch.
    pub body: Vec<Vec<NodeId>>,
    pub else_body: Option<Vec<NodeId>>,
    pub pos: Position,
}

/// `import module` / `from module import names`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportStmt {
    pub module: String,
    /// Imported names; empty for a plain `import module`.
    pub names: Vec<String>,
    pub pos: Position,
}

/// Statements merging never looks into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtherStmt {
    pub description: String,
    pub pos: Position,
}

/// Kind of a node, for dispatch and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Var,
    Assignment,
    Func,
    Class,
    Decorated,
    If,
    Import,
    Other,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Var => "Var",
            NodeKind::Assignment => "Assignment",
            NodeKind::Func => "FuncDef",
            NodeKind::Class => "ClassDef",
            NodeKind::Decorated => "Decorator",
            NodeKind::If => "IfStmt",
            NodeKind::Import => "Import",
            NodeKind::Other => "Statement",
        };
        f.write_str(name)
    }
}

/// Every node kind a module tree can hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Var(Var),
    Assignment(AssignmentStmt),
    Func(FuncDef),
    Class(ClassDef),
    Decorated(Decorator),
    If(IfStmt),
    Import(ImportStmt),
    Other(OtherStmt),
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Var(_) => NodeKind::Var,
            Node::Assignment(_) => NodeKind::Assignment,
            Node::Func(_) => NodeKind::Func,
            Node::Class(_) => NodeKind::Class,
            Node::Decorated(_) => NodeKind::Decorated,
            Node::If(_) => NodeKind::If,
            Node::Import(_) => NodeKind::Import,
            Node::Other(_) => NodeKind::Other,
        }
    }

    pub fn position(&self) -> Position {
        match self {
            Node::Var(n) => n.pos,
            Node::Assignment(n) => n.pos,
            Node::Func(n) => n.pos,
            Node::Class(n) => n.pos,
            Node::Decorated(n) => n.pos,
            Node::If(n) => n.pos,
            Node::Import(n) => n.pos,
            Node::Other(n) => n.pos,
        }
    }

    /// Rewrite every child id through `f`.
    ///
    /// Used when copying a node into another tree's arena.
    pub fn remap_children(&mut self, f: &mut dyn FnMut(NodeId) -> NodeId) {
        match self {
            Node::Func(func) => {
                for id in &mut func.body {
                    *id = f(*id);
                }
            }
            Node::Class(class) => {
                for id in class.names.values_mut() {
                    *id = f(*id);
                }
                for id in &mut class.body {
                    *id = f(*id);
                }
            }
            Node::Decorated(decorated) => decorated.func = f(decorated.func),
            Node::If(stmt) => {
                for block in &mut stmt.body {
                    for id in block {
                        *id = f(*id);
                    }
                }
                if let Some(block) = &mut stmt.else_body {
                    for id in block {
                        *id = f(*id);
                    }
                }
            }
            Node::Var(_) | Node::Assignment(_) | Node::Import(_) | Node::Other(_) => {}
        }
    }
}

// ============================================================================
// Module Tree
// ============================================================================

/// Where a new statement goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Top level of the module.
    Module,
    /// Body of the given class.
    Class(NodeId),
    /// Body of the given function. Names defined here are local.
    Function(NodeId),
}

/// One parsed module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleTree {
    nodes: Vec<Node>,
    /// Top-level statements in order.
    pub defs: Vec<NodeId>,
    /// Import statements in order.
    pub imports: Vec<NodeId>,
    /// Top-level names.
    pub names: SymbolTable,
    /// Set once a stub has been merged into this tree.
    pub stub_merged: bool,
}

impl ModuleTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node for `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not allocated in this tree.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Mutable node for `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not allocated in this tree.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Node for `id`, or `None` if it belongs to another tree.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Add a node to the arena without placing it anywhere.
    pub fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId::new(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Top-level name lookup.
    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    /// Symbol table of a class node.
    pub fn class_names(&self, class: NodeId) -> Option<&SymbolTable> {
        match self.get(class)? {
            Node::Class(class) => Some(&class.names),
            _ => None,
        }
    }

    /// Append a statement to `scope` and register the names it defines.
    ///
    /// Functions, classes and decorated functions register under their own
    /// name. An assignment registers a [`Var`] for each plain-name target.
    /// Imports at module scope are also recorded in [`ModuleTree::imports`].
    /// Statements added to a function scope define no symbols.
    pub fn add_statement(&mut self, scope: Scope, node: Node) -> NodeId {
        let defined = self.defined_vars(&node);
        let named = match &node {
            Node::Func(func) => Some(func.name.clone()),
            Node::Class(class) => Some(class.name.clone()),
            Node::Decorated(decorated) => self.func_name(decorated.func).map(str::to_string),
            _ => None,
        };
        let is_import = matches!(node, Node::Import(_));
        let id = self.alloc(node);

        let mut symbols: Vec<(String, NodeId)> = Vec::new();
        if let Some(name) = named {
            symbols.push((name, id));
        }
        for var in defined {
            let name = var.name.clone();
            symbols.push((name, self.alloc(Node::Var(var))));
        }

        match scope {
            Scope::Module => {
                self.defs.push(id);
                if is_import {
                    self.imports.push(id);
                }
                self.names.extend(symbols);
            }
            Scope::Class(class) => {
                if let Node::Class(class) = self.node_mut(class) {
                    class.body.push(id);
                    class.names.extend(symbols);
                }
            }
            Scope::Function(func) => {
                if let Node::Func(func) = self.node_mut(func) {
                    func.body.push(id);
                }
            }
        }
        id
    }

    /// Allocate `func` and append it to `scope` wrapped in `decorators`.
    pub fn add_decorated(&mut self, scope: Scope, decorators: Vec<Expr>, func: FuncDef) -> NodeId {
        let pos = func.pos;
        let func = self.alloc(Node::Func(func));
        self.add_statement(
            scope,
            Node::Decorated(Decorator {
                decorators,
                func,
                pos,
            }),
        )
    }

    /// Name of the function `id`, looking through a decorator.
    pub fn func_name(&self, id: NodeId) -> Option<&str> {
        match self.get(id)? {
            Node::Func(func) => Some(&func.name),
            Node::Decorated(decorated) => self.func_name(decorated.func),
            _ => None,
        }
    }

    fn defined_vars(&self, node: &Node) -> Vec<Var> {
        let Node::Assignment(assignment) = node else {
            return Vec::new();
        };
        assignment
            .lvalues
            .iter()
            .filter_map(|lvalue| match lvalue {
                Expr::Name(name) => Some(Var {
                    name: name.clone(),
                    ty: assignment.ty.clone(),
                    pos: assignment.pos,
                }),
                _ => None,
            })
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
