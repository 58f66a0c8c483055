//! Merging a stub tree into its source tree.
//!
//! After [`merge_stub_into_source`] the source tree carries the stub's type
//! information and can be analyzed on its own:
//!
//! 1. Module symbol tables are merged. Names only the stub defines are copied
//!    into the source tree; names both define are merged node by node.
//! 2. Node pairs are merged by kind. Variables take the stub's type,
//!    functions take the stub's signature when argument names agree, classes
//!    take type variables, metaclass and protocol flag and then merge their
//!    own symbol tables and bodies, decorated functions merge when their
//!    decorator lists agree.
//! 3. Class bodies are reconciled member by member. `self.x` assignments in
//!    `__init__` (directly or one `if` level down) take the type declared for
//!    `x` in the stub class body.
//! 4. Stub-only imports, classes and aliases are prepended to the source
//!    statements so they resolve before anything that uses them.
//!
//! Conflicts are reported to a [`DiagnosticSink`] and merging carries on with
//! the next pair; a conflicting source node is left untouched.
//!
//! Nodes copied from the stub get new ids in the source arena. A copy is made
//! at most once per stub node, so a class reached both through the symbol
//! table and the statement list is one node in the result.

use std::collections::{BTreeMap, HashMap, HashSet};

use thiserror::Error;
use tugcheck_core::diagnostics::{Diagnostic, DiagnosticSink};

use crate::tree::{
    ClassDef, Decorator, Expr, FuncDef, ModuleTree, Node, NodeId, NodeKind, Position, SymbolTable,
};

/// Name of the constructor whose assignments are enriched.
pub const CONSTRUCTOR: &str = "__init__";

// ============================================================================
// Public Types
// ============================================================================

/// Errors that mean the merge could not be carried out at all.
///
/// Content conflicts are diagnostics, never errors.
#[derive(Debug, Error)]
pub enum MergeError {
    /// Two nodes of a kind that has no merge rule met in a symbol table.
    #[error("cannot merge source {source_kind} with stub {stub_kind}")]
    Unmergeable {
        source_kind: NodeKind,
        stub_kind: NodeKind,
    },

    /// The source tree already had a stub merged into it.
    #[error("a stub has already been merged into module {module}")]
    AlreadyMerged { module: String },
}

/// File and module diagnostics are attributed to: the source side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOrigin {
    pub path: String,
    pub module: String,
}

impl MergeOrigin {
    pub fn new(path: impl Into<String>, module: impl Into<String>) -> Self {
        MergeOrigin {
            path: path.into(),
            module: module.into(),
        }
    }
}

/// What a merge did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Stub-only names added to a source symbol table.
    pub symbols_added: usize,
    /// Stub statements prepended to the source statements.
    pub statements_promoted: usize,
    /// Stub imports appended to the source import list.
    pub imports_added: usize,
    /// Diagnostics reported.
    pub diagnostics: usize,
}

/// Merge `stub` into `src`, reporting conflicts to `sink`.
///
/// Returns [`MergeError::AlreadyMerged`] without touching anything if `src`
/// was already the target of a merge.
pub fn merge_stub_into_source(
    src: &mut ModuleTree,
    stub: &ModuleTree,
    sink: &dyn DiagnosticSink,
    origin: &MergeOrigin,
) -> Result<MergeSummary, MergeError> {
    if src.stub_merged {
        return Err(MergeError::AlreadyMerged {
            module: origin.module.clone(),
        });
    }

    let mut merger = Merger::new(src, stub, sink, origin);
    merger.merge_symbol_tables(Table::Module, &stub.names)?;
    merger.promote_stub_only_definitions();
    let summary = merger.summary;

    src.stub_merged = true;
    tracing::debug!(
        module = %origin.module,
        symbols_added = summary.symbols_added,
        statements_promoted = summary.statements_promoted,
        imports_added = summary.imports_added,
        diagnostics = summary.diagnostics,
        "merged stub into source"
    );
    Ok(summary)
}

// ============================================================================
// Merger
// ============================================================================

/// A symbol table in the source tree.
#[derive(Debug, Clone, Copy)]
enum Table {
    Module,
    Class(NodeId),
}

struct Merger<'a> {
    src: &'a mut ModuleTree,
    stub: &'a ModuleTree,
    sink: &'a dyn DiagnosticSink,
    origin: &'a MergeOrigin,
    /// Source positions of the pairs being merged, innermost last.
    positions: Vec<Position>,
    /// Stub node -> its copy in the source arena.
    transplanted: HashMap<NodeId, NodeId>,
    /// `(source, stub)` pairs already merged.
    merged_pairs: HashSet<(NodeId, NodeId)>,
    summary: MergeSummary,
}

impl<'a> Merger<'a> {
    fn new(
        src: &'a mut ModuleTree,
        stub: &'a ModuleTree,
        sink: &'a dyn DiagnosticSink,
        origin: &'a MergeOrigin,
    ) -> Self {
        Merger {
            src,
            stub,
            sink,
            origin,
            positions: Vec::new(),
            transplanted: HashMap::new(),
            merged_pairs: HashSet::new(),
            summary: MergeSummary::default(),
        }
    }

    // ------------------------------------------------------------------------
    // Reporting
    // ------------------------------------------------------------------------

    fn report(&mut self, message: String) {
        let pos = self.positions.last().copied().unwrap_or_default();
        self.report_at(pos, message);
    }

    fn report_at(&mut self, pos: Position, message: String) {
        tracing::trace!(line = pos.line, column = pos.column, "{}", message);
        self.sink.report(Diagnostic::error(
            &self.origin.path,
            &self.origin.module,
            pos.line,
            pos.column,
            message,
        ));
        self.summary.diagnostics += 1;
    }

    // ------------------------------------------------------------------------
    // Copying stub nodes
    // ------------------------------------------------------------------------

    /// Copy a stub node and everything below it into the source arena.
    fn transplant(&mut self, stub_id: NodeId) -> NodeId {
        if let Some(&id) = self.transplanted.get(&stub_id) {
            return id;
        }
        let stub = self.stub;
        let mut node = stub.node(stub_id).clone();
        node.remap_children(&mut |child| self.transplant(child));
        let id = self.src.alloc(node);
        self.transplanted.insert(stub_id, id);
        id
    }

    // ------------------------------------------------------------------------
    // Symbol tables
    // ------------------------------------------------------------------------

    fn table(&self, table: Table) -> Option<&SymbolTable> {
        match table {
            Table::Module => Some(&self.src.names),
            Table::Class(id) => self.src.class_names(id),
        }
    }

    fn table_mut(&mut self, table: Table) -> Option<&mut SymbolTable> {
        match table {
            Table::Module => Some(&mut self.src.names),
            Table::Class(id) => match self.src.node_mut(id) {
                Node::Class(class) => Some(&mut class.names),
                _ => None,
            },
        }
    }

    fn merge_symbol_tables(
        &mut self,
        target: Table,
        stub_names: &'a SymbolTable,
    ) -> Result<(), MergeError> {
        for (name, &stub_id) in stub_names {
            let existing = self.table(target).and_then(|names| names.get(name).copied());
            match existing {
                None => {
                    let id = self.transplant(stub_id);
                    if let Some(names) = self.table_mut(target) {
                        names.insert(name.clone(), id);
                        self.summary.symbols_added += 1;
                    }
                }
                Some(src_id) => {
                    if self.transplanted.get(&stub_id) != Some(&src_id) {
                        self.merge_nodes(src_id, stub_id)?;
                    }
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Node dispatch
    // ------------------------------------------------------------------------

    fn merge_nodes(&mut self, src_id: NodeId, stub_id: NodeId) -> Result<(), MergeError> {
        if !self.merged_pairs.insert((src_id, stub_id)) {
            return Ok(());
        }
        self.positions.push(self.src.node(src_id).position());
        let result = self.dispatch(src_id, stub_id);
        self.positions.pop();
        result
    }

    fn dispatch(&mut self, src_id: NodeId, stub_id: NodeId) -> Result<(), MergeError> {
        let stub = self.stub;
        let stub_node = stub.node(stub_id);
        let src_kind = self.src.node(src_id).kind();
        let stub_kind = stub_node.kind();
        if src_kind != stub_kind {
            self.report(format!(
                "conflict of source {} and stub {} definition (stub line {})",
                src_kind,
                stub_kind,
                stub_node.position().line
            ));
            return Ok(());
        }

        match stub_node {
            Node::Var(stub_var) => {
                if let Node::Var(var) = self.src.node_mut(src_id) {
                    var.ty = stub_var.ty.clone();
                }
            }
            Node::Assignment(stub_assign) => {
                let name = stub_assign
                    .simple_name()
                    .or_else(|| stub_assign.member_name())
                    .unwrap_or("<assignment>");
                if self.check_no_default(&stub_assign.rvalue, name) {
                    if let Node::Assignment(assign) = self.src.node_mut(src_id) {
                        assign.ty = stub_assign.ty.clone();
                        assign.unanalyzed_type = stub_assign.unanalyzed_type.clone();
                    }
                }
            }
            Node::Func(stub_func) => self.merge_func(src_id, stub_func),
            Node::Class(stub_class) => self.merge_class(src_id, stub_class)?,
            Node::Decorated(stub_decorated) => self.merge_decorated(src_id, stub_decorated)?,
            Node::If(_) | Node::Import(_) | Node::Other(_) => {
                return Err(MergeError::Unmergeable {
                    source_kind: src_kind,
                    stub_kind,
                });
            }
        }
        Ok(())
    }

    /// Report a stub value that is not a placeholder. True if the value is fine.
    fn check_no_default(&mut self, value: &Expr, name: &str) -> bool {
        if value.is_placeholder() {
            return true;
        }
        self.report(format!(
            "stub must not contain a default value, {} has {}",
            name,
            value.kind_name()
        ));
        false
    }

    fn merge_func(&mut self, src_id: NodeId, stub_func: &FuncDef) {
        let Node::Func(func) = self.src.node_mut(src_id) else {
            return;
        };
        if func.arg_names == stub_func.arg_names {
            func.ty = stub_func.ty.clone();
            func.arg_kinds = stub_func.arg_kinds.clone();
            func.unanalyzed_type = stub_func.unanalyzed_type.clone();
        } else {
            let message = format!(
                "argument conflict of source {:?} and stub (line {}) {:?}",
                func.arg_names, stub_func.pos.line, stub_func.arg_names
            );
            self.report(message);
        }
    }

    // ------------------------------------------------------------------------
    // Classes
    // ------------------------------------------------------------------------

    fn merge_class(&mut self, src_id: NodeId, stub_class: &'a ClassDef) -> Result<(), MergeError> {
        if let Node::Class(class) = self.src.node_mut(src_id) {
            class.type_vars = stub_class.type_vars.clone();
            class.metaclass = stub_class.metaclass.clone();
            class.runtime_protocol = stub_class.runtime_protocol;
        }
        self.merge_symbol_tables(Table::Class(src_id), &stub_class.names)?;
        self.reconcile_class_body(src_id, stub_class)
    }

    fn reconcile_class_body(
        &mut self,
        src_id: NodeId,
        stub_class: &'a ClassDef,
    ) -> Result<(), MergeError> {
        let stub = self.stub;
        let (mut assigns, mut funcs) = self.collect_assigns_and_funcs(&stub_class.body);

        let body = match self.src.node(src_id) {
            Node::Class(class) => class.body.clone(),
            _ => return Ok(()),
        };
        for entry in body {
            match self.src.node(entry) {
                Node::Func(func) => {
                    let is_constructor = func.name == CONSTRUCTOR;
                    if let Some(stub_id) = funcs.remove(func.name.as_str()) {
                        self.merge_nodes(entry, stub_id)?;
                    }
                    if is_constructor {
                        self.enrich_constructor(entry, &mut assigns);
                    }
                }
                Node::Assignment(assign) => {
                    if let Some(name) = assign.simple_name() {
                        if let Some(stub_id) = assigns.remove(name) {
                            self.merge_nodes(entry, stub_id)?;
                        }
                    }
                }
                Node::Decorated(_) => {
                    let stub_id = self
                        .src
                        .func_name(entry)
                        .and_then(|name| funcs.remove(name));
                    if let Some(stub_id) = stub_id {
                        self.merge_nodes(entry, stub_id)?;
                    }
                }
                Node::Var(_) | Node::Class(_) | Node::If(_) | Node::Import(_) | Node::Other(_) => {}
            }
        }

        for (name, stub_id) in assigns {
            self.report(format!(
                "no source definition for stub assignment {} (stub line {})",
                name,
                stub.node(stub_id).position().line
            ));
        }
        for (name, stub_id) in funcs {
            self.report(format!(
                "no source definition for stub function {} (stub line {})",
                name,
                stub.node(stub_id).position().line
            ));
        }
        Ok(())
    }

    /// Split a stub class body into plain-name assignments and functions.
    fn collect_assigns_and_funcs(
        &mut self,
        body: &'a [NodeId],
    ) -> (BTreeMap<&'a str, NodeId>, BTreeMap<&'a str, NodeId>) {
        let stub = self.stub;
        let mut assigns = BTreeMap::new();
        let mut funcs = BTreeMap::new();
        for &id in body {
            match stub.node(id) {
                Node::Assignment(assign) => match assign.lvalues.as_slice() {
                    [Expr::Name(name)] => {
                        assigns.insert(name.as_str(), id);
                    }
                    [other] => self.report(format!(
                        "l-values must be simple name expressions, found {}",
                        other.kind_name()
                    )),
                    _ => self.report("assignment has more than one l-value".to_string()),
                },
                Node::Func(func) => {
                    funcs.insert(func.name.as_str(), id);
                }
                Node::Decorated(_) => {
                    if let Some(name) = stub.func_name(id) {
                        funcs.insert(name, id);
                    }
                }
                Node::Var(_) | Node::Class(_) | Node::If(_) | Node::Import(_) | Node::Other(_) => {}
            }
        }
        (assigns, funcs)
    }

    /// Type `self.x = ...` assignments in a constructor from the stub's
    /// class-level declarations.
    ///
    /// Looks at the constructor's own statements and at the statements of
    /// each `if`/`elif` block, but not into `else` blocks or any deeper.
    fn enrich_constructor(&mut self, func_id: NodeId, assigns: &mut BTreeMap<&'a str, NodeId>) {
        let body = match self.src.node(func_id) {
            Node::Func(func) => func.body.clone(),
            _ => return,
        };
        for stmt in body {
            match self.src.node(stmt) {
                Node::Assignment(_) => self.enrich_member_assignment(stmt, assigns),
                Node::If(if_stmt) => {
                    let parts: Vec<NodeId> = if_stmt.body.iter().flatten().copied().collect();
                    for part in parts {
                        if matches!(self.src.node(part), Node::Assignment(_)) {
                            self.enrich_member_assignment(part, assigns);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn enrich_member_assignment(&mut self, id: NodeId, assigns: &mut BTreeMap<&'a str, NodeId>) {
        let stub = self.stub;
        let (name, pos) = match self.src.node(id) {
            Node::Assignment(assign) => match assign.member_name() {
                Some(name) => (name.to_string(), assign.pos),
                None => return,
            },
            _ => return,
        };

        match assigns.remove(name.as_str()) {
            Some(stub_id) => {
                if let (Node::Assignment(stub_assign), Node::Assignment(assign)) =
                    (stub.node(stub_id), self.src.node_mut(id))
                {
                    assign.ty = stub_assign.ty.clone();
                    assign.unanalyzed_type = stub_assign.unanalyzed_type.clone();
                }
            }
            None => self.report_at(pos, format!("no stub definition for class member {}", name)),
        }
    }

    // ------------------------------------------------------------------------
    // Decorators
    // ------------------------------------------------------------------------

    fn merge_decorated(
        &mut self,
        src_id: NodeId,
        stub_decorated: &'a Decorator,
    ) -> Result<(), MergeError> {
        let (src_decorators, src_func) = match self.src.node(src_id) {
            Node::Decorated(decorated) => (decorated.decorators.clone(), decorated.func),
            _ => return Ok(()),
        };

        let count = src_decorators.len().max(stub_decorated.decorators.len());
        for i in 0..count {
            let compatible = match (src_decorators.get(i), stub_decorated.decorators.get(i)) {
                (Some(Expr::Name(src_name)), Some(Expr::Name(stub_name))) => {
                    self.check_decorator_name(src_name, stub_name)
                }
                (
                    Some(Expr::Call {
                        callee: src_callee,
                        arg_names: src_arg_names,
                        ..
                    }),
                    Some(Expr::Call {
                        callee: stub_callee,
                        args: stub_args,
                        arg_names: stub_arg_names,
                    }),
                ) => match (&**src_callee, &**stub_callee) {
                    (Expr::Name(src_name), Expr::Name(stub_name)) => {
                        self.check_decorator_name(src_name, stub_name)
                            && self.check_decorator_arguments(
                                src_arg_names,
                                stub_arg_names,
                                stub_args,
                            )
                    }
                    (src_callee, stub_callee) => {
                        self.report_decorator_shape(Some(src_callee), Some(stub_callee));
                        false
                    }
                },
                (src, stub) => {
                    self.report_decorator_shape(src, stub);
                    false
                }
            };
            if !compatible {
                return Ok(());
            }
        }

        self.merge_nodes(src_func, stub_decorated.func)
    }

    fn report_decorator_shape(&mut self, src: Option<&Expr>, stub: Option<&Expr>) {
        self.report(format!(
            "conflict of source {} and stub {} decorator",
            src.map_or("absent", Expr::kind_name),
            stub.map_or("absent", Expr::kind_name)
        ));
    }

    fn check_decorator_name(&mut self, src_name: &str, stub_name: &str) -> bool {
        if src_name == stub_name {
            return true;
        }
        self.report(format!(
            "conflict of source {} and stub {} decorator name",
            src_name, stub_name
        ));
        false
    }

    fn check_decorator_arguments(
        &mut self,
        src_arg_names: &[Option<String>],
        stub_arg_names: &[Option<String>],
        stub_args: &[Expr],
    ) -> bool {
        let count = src_arg_names.len().max(stub_arg_names.len());
        for i in 0..count {
            let src_name = src_arg_names.get(i);
            let stub_name = stub_arg_names.get(i);
            if src_name != stub_name {
                self.report(format!(
                    "conflict of source {} and stub {} decorator argument name",
                    describe_arg_name(src_name),
                    describe_arg_name(stub_name)
                ));
                return false;
            }
        }

        let mut ok = true;
        for (name, value) in stub_arg_names.iter().zip(stub_args) {
            let name = describe_arg_name(Some(name));
            ok &= self.check_no_default(value, name);
        }
        ok
    }

    // ------------------------------------------------------------------------
    // Stub-only definitions
    // ------------------------------------------------------------------------

    /// Prepend stub imports, stub-only classes and stub-only aliases to the
    /// source statements, and type existing source assignments from the stub.
    fn promote_stub_only_definitions(&mut self) {
        let stub = self.stub;

        let mut src_definitions: HashMap<&str, NodeId> = HashMap::new();
        for &id in &self.src.defs {
            match self.src.node(id) {
                Node::Class(class) => {
                    src_definitions.insert(class.name.as_str(), id);
                }
                Node::Assignment(assign) => {
                    for lvalue in &assign.lvalues {
                        if let Expr::Name(name) = lvalue {
                            src_definitions.insert(name.as_str(), id);
                        }
                    }
                }
                _ => {}
            }
        }

        let mut promoted: Vec<NodeId> = Vec::new();
        let mut annotated: Vec<(NodeId, NodeId)> = Vec::new();
        for &id in &stub.defs {
            match stub.node(id) {
                Node::Import(_) => promoted.push(id),
                Node::Class(class) => {
                    if !src_definitions.contains_key(class.name.as_str()) {
                        promoted.push(id);
                    }
                }
                Node::Assignment(assign) => {
                    if let Some(name) = assign.simple_name() {
                        match src_definitions.get(name) {
                            None => promoted.push(id),
                            Some(&src_id) => annotated.push((src_id, id)),
                        }
                    }
                }
                _ => {}
            }
        }

        for (src_id, stub_id) in annotated {
            if let (Node::Assignment(assign), Node::Assignment(stub_assign)) =
                (self.src.node_mut(src_id), stub.node(stub_id))
            {
                assign.ty = stub_assign.ty.clone();
                assign.unanalyzed_type = stub_assign.unanalyzed_type.clone();
            }
        }

        let mut defs: Vec<NodeId> = promoted.into_iter().map(|id| self.transplant(id)).collect();
        self.summary.statements_promoted = defs.len();
        defs.append(&mut self.src.defs);
        self.src.defs = defs;

        let imports: Vec<NodeId> = stub.imports.iter().map(|&id| self.transplant(id)).collect();
        self.summary.imports_added = imports.len();
        self.src.imports.extend(imports);
    }
}

fn describe_arg_name(name: Option<&Option<String>>) -> &str {
    match name {
        Some(Some(name)) => name,
        Some(None) => "<positional>",
        None => "<absent>",
    }
}

// ============================================================================
// Tests
// ============================================================================
