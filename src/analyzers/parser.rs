//! Structural parsing of Python source.
//!
//! Walks the abstract syntax only; analyzed code is never executed. The
//! walk produces the unit's definition tree, its import references, the
//! set of identifiers it reads, decision-point counts per definition,
//! and the locations of syntactically unreachable statement sequences.

use crate::core::errors::{Error, Result};
use crate::core::{
    DefKind, Definition, ImportRef, ImportedName, ParseStatus, SourceUnit, StructuralRecord,
};
use rustpython_parser::ast;
use rustpython_parser::ast::Ranged;
use std::collections::BTreeSet;
use std::path::Path;

/// Byte-offset to 1-based line mapping for one source buffer.
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let mut starts = vec![0];
        for (i, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                starts.push(i + 1);
            }
        }
        Self { starts }
    }

    fn line_of(&self, offset: usize) -> usize {
        self.starts.partition_point(|&start| start <= offset)
    }
}

/// Scope carried down the walk. Immutable per definition; block nesting
/// travels separately so sibling blocks do not see each other's depth.
#[derive(Clone)]
struct Scope {
    /// Index of the innermost enclosing definition, if any.
    def: Option<usize>,
    /// Whether statements are directly inside a class body.
    class_body: bool,
    /// Receiver parameter name while inside a method body.
    receiver: Option<String>,
    def_depth: u32,
    prefix: String,
}

impl Scope {
    fn module() -> Self {
        Self {
            def: None,
            class_body: false,
            receiver: None,
            def_depth: 0,
            prefix: String::new(),
        }
    }
}

struct Walker<'a> {
    index: &'a LineIndex,
    defs: Vec<Definition>,
    imports: Vec<ImportRef>,
    referenced: BTreeSet<String>,
    unreachable: Vec<usize>,
}

/// Parse one source file into its structural record.
pub fn parse_unit(
    path: &Path,
    module: &str,
    is_package: bool,
    source: &str,
) -> Result<StructuralRecord> {
    let parsed = rustpython_parser::parse(
        source,
        rustpython_parser::Mode::Module,
        &path.to_string_lossy(),
    )
    .map_err(|e| Error::parse(path, e.to_string()))?;

    let index = LineIndex::new(source);
    let mut walker = Walker {
        index: &index,
        defs: Vec::new(),
        imports: Vec::new(),
        referenced: BTreeSet::new(),
        unreachable: Vec::new(),
    };

    if let ast::Mod::Module(body) = &parsed {
        walker.walk_block(&body.body, &Scope::module(), 0);
    }

    Ok(StructuralRecord {
        unit: SourceUnit {
            path: path.to_path_buf(),
            module: module.to_string(),
            is_package,
            bytes: source.len(),
            status: ParseStatus::Ok,
        },
        definitions: walker.defs,
        imports: walker.imports,
        referenced_names: walker.referenced,
        unreachable_lines: walker.unreachable,
    })
}

impl Walker<'_> {
    fn bump(&mut self, scope: &Scope, points: u32) {
        if let Some(i) = scope.def {
            self.defs[i].decision_points += points;
        }
    }

    fn note_nesting(&mut self, scope: &Scope, depth: u32) {
        if let Some(i) = scope.def {
            if depth > self.defs[i].max_nesting {
                self.defs[i].max_nesting = depth;
            }
        }
    }

    fn mark_receiver_use(&mut self, scope: &Scope) {
        if let Some(i) = scope.def {
            self.defs[i].touches_instance_state = true;
        }
    }

    fn line_at(&self, offset: usize) -> usize {
        self.index.line_of(offset)
    }

    fn end_line_at(&self, end_offset: usize) -> usize {
        self.index.line_of(end_offset.saturating_sub(1))
    }

    /// Walk a statement block. Statements after an unconditional
    /// terminator in the same block are recorded once per block.
    fn walk_block(&mut self, stmts: &[ast::Stmt], scope: &Scope, nesting: u32) {
        let mut terminated = false;
        let mut reported = false;
        for stmt in stmts {
            if terminated && !reported {
                self.unreachable.push(self.stmt_line(stmt));
                reported = true;
            }
            if is_terminator(stmt) {
                terminated = true;
            }
            self.walk_stmt(stmt, scope, nesting);
        }
    }

    fn stmt_line(&self, stmt: &ast::Stmt) -> usize {
        self.index.line_of(stmt.range().start().to_usize())
    }

    fn walk_stmt(&mut self, stmt: &ast::Stmt, scope: &Scope, nesting: u32) {
        match stmt {
            ast::Stmt::FunctionDef(def) => {
                self.walk_function(
                    def.name.as_str(),
                    &def.args,
                    &def.body,
                    &def.decorator_list,
                    def.returns.as_deref(),
                    (def.range.start().to_usize(), def.range.end().to_usize()),
                    scope,
                );
            }
            ast::Stmt::AsyncFunctionDef(def) => {
                self.walk_function(
                    def.name.as_str(),
                    &def.args,
                    &def.body,
                    &def.decorator_list,
                    def.returns.as_deref(),
                    (def.range.start().to_usize(), def.range.end().to_usize()),
                    scope,
                );
            }
            ast::Stmt::ClassDef(def) => {
                for base in &def.bases {
                    self.walk_expr(base, scope);
                }
                for keyword in &def.keywords {
                    self.walk_expr(&keyword.value, scope);
                }
                for decorator in &def.decorator_list {
                    self.walk_expr(decorator, scope);
                }
                let index = self.push_def(
                    DefKind::Class,
                    def.name.as_str(),
                    (def.range.start().to_usize(), def.range.end().to_usize()),
                    scope,
                );
                let inner = Scope {
                    def: Some(index),
                    class_body: true,
                    receiver: None,
                    def_depth: scope.def_depth + 1,
                    prefix: format!("{}{}.", scope.prefix, def.name.as_str()),
                };
                self.walk_block(&def.body, &inner, 0);
            }
            ast::Stmt::If(stmt) => {
                self.bump(scope, 1);
                self.note_nesting(scope, nesting + 1);
                self.walk_expr(&stmt.test, scope);
                self.walk_block(&stmt.body, scope, nesting + 1);
                self.walk_block(&stmt.orelse, scope, nesting + 1);
            }
            ast::Stmt::While(stmt) => {
                self.bump(scope, 1);
                self.note_nesting(scope, nesting + 1);
                self.walk_expr(&stmt.test, scope);
                self.walk_block(&stmt.body, scope, nesting + 1);
                self.walk_block(&stmt.orelse, scope, nesting + 1);
            }
            ast::Stmt::For(stmt) => {
                self.bump(scope, 1);
                self.note_nesting(scope, nesting + 1);
                self.walk_expr(&stmt.iter, scope);
                self.walk_block(&stmt.body, scope, nesting + 1);
                self.walk_block(&stmt.orelse, scope, nesting + 1);
            }
            ast::Stmt::AsyncFor(stmt) => {
                self.bump(scope, 1);
                self.note_nesting(scope, nesting + 1);
                self.walk_expr(&stmt.iter, scope);
                self.walk_block(&stmt.body, scope, nesting + 1);
                self.walk_block(&stmt.orelse, scope, nesting + 1);
            }
            ast::Stmt::Try(stmt) => {
                self.bump(scope, stmt.handlers.len() as u32);
                self.note_nesting(scope, nesting + 1);
                self.walk_block(&stmt.body, scope, nesting + 1);
                for handler in &stmt.handlers {
                    let ast::ExceptHandler::ExceptHandler(h) = handler;
                    if let Some(type_) = &h.type_ {
                        self.walk_expr(type_, scope);
                    }
                    self.walk_block(&h.body, scope, nesting + 1);
                }
                self.walk_block(&stmt.orelse, scope, nesting + 1);
                self.walk_block(&stmt.finalbody, scope, nesting + 1);
            }
            ast::Stmt::TryStar(stmt) => {
                self.bump(scope, stmt.handlers.len() as u32);
                self.note_nesting(scope, nesting + 1);
                self.walk_block(&stmt.body, scope, nesting + 1);
                for handler in &stmt.handlers {
                    let ast::ExceptHandler::ExceptHandler(h) = handler;
                    if let Some(type_) = &h.type_ {
                        self.walk_expr(type_, scope);
                    }
                    self.walk_block(&h.body, scope, nesting + 1);
                }
                self.walk_block(&stmt.orelse, scope, nesting + 1);
                self.walk_block(&stmt.finalbody, scope, nesting + 1);
            }
            ast::Stmt::With(stmt) => {
                self.note_nesting(scope, nesting + 1);
                for item in &stmt.items {
                    self.walk_expr(&item.context_expr, scope);
                }
                self.walk_block(&stmt.body, scope, nesting + 1);
            }
            ast::Stmt::AsyncWith(stmt) => {
                self.note_nesting(scope, nesting + 1);
                for item in &stmt.items {
                    self.walk_expr(&item.context_expr, scope);
                }
                self.walk_block(&stmt.body, scope, nesting + 1);
            }
            ast::Stmt::Match(stmt) => {
                self.bump(scope, stmt.cases.len() as u32);
                self.walk_expr(&stmt.subject, scope);
                for case in &stmt.cases {
                    if let Some(guard) = &case.guard {
                        self.walk_expr(guard, scope);
                    }
                    self.walk_block(&case.body, scope, nesting);
                }
            }
            ast::Stmt::Return(stmt) => {
                if let Some(value) = &stmt.value {
                    self.walk_expr(value, scope);
                }
            }
            ast::Stmt::Raise(stmt) => {
                if let Some(exc) = &stmt.exc {
                    self.walk_expr(exc, scope);
                }
                if let Some(cause) = &stmt.cause {
                    self.walk_expr(cause, scope);
                }
            }
            ast::Stmt::Assign(stmt) => {
                // Targets are bindings, not reads
                self.walk_expr(&stmt.value, scope);
            }
            ast::Stmt::AugAssign(stmt) => {
                // Augmented assignment reads its target
                self.walk_expr(&stmt.target, scope);
                self.walk_expr(&stmt.value, scope);
            }
            ast::Stmt::AnnAssign(stmt) => {
                self.walk_expr(&stmt.annotation, scope);
                if let Some(value) = &stmt.value {
                    self.walk_expr(value, scope);
                }
            }
            ast::Stmt::Delete(stmt) => {
                for target in &stmt.targets {
                    self.walk_expr(target, scope);
                }
            }
            ast::Stmt::Assert(stmt) => {
                self.walk_expr(&stmt.test, scope);
                if let Some(msg) = &stmt.msg {
                    self.walk_expr(msg, scope);
                }
            }
            ast::Stmt::Expr(stmt) => {
                self.walk_expr(&stmt.value, scope);
            }
            ast::Stmt::Import(stmt) => {
                let line = self.index.line_of(stmt.range.start().to_usize());
                for alias in &stmt.names {
                    self.imports.push(ImportRef {
                        module: alias.name.to_string(),
                        level: 0,
                        line,
                        names: vec![ImportedName {
                            name: alias.name.to_string(),
                            alias: alias.asname.as_ref().map(|a| a.to_string()),
                        }],
                        wildcard: false,
                        is_module_import: true,
                    });
                }
            }
            ast::Stmt::ImportFrom(stmt) => {
                let line = self.index.line_of(stmt.range.start().to_usize());
                let level = stmt.level.map(|l| l.to_usize() as u32).unwrap_or(0);
                let module = stmt
                    .module
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_default();
                let wildcard = stmt.names.iter().any(|a| a.name.as_str() == "*");
                let names = if wildcard {
                    Vec::new()
                } else {
                    stmt.names
                        .iter()
                        .map(|a| ImportedName {
                            name: a.name.to_string(),
                            alias: a.asname.as_ref().map(|n| n.to_string()),
                        })
                        .collect()
                };
                self.imports.push(ImportRef {
                    module,
                    level,
                    line,
                    names,
                    wildcard,
                    is_module_import: false,
                });
            }
            // Break, Continue, Pass, Global, Nonlocal, TypeAlias
            _ => {}
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn walk_function(
        &mut self,
        name: &str,
        args: &ast::Arguments,
        body: &[ast::Stmt],
        decorators: &[ast::Expr],
        returns: Option<&ast::Expr>,
        span: (usize, usize),
        scope: &Scope,
    ) {
        // Decorators, defaults and annotations sit outside the body and
        // attribute to the enclosing definition
        for decorator in decorators {
            self.walk_expr(decorator, scope);
        }
        for arg in args.posonlyargs.iter().chain(&args.args).chain(&args.kwonlyargs) {
            if let Some(annotation) = &arg.def.annotation {
                self.walk_expr(annotation, scope);
            }
            if let Some(default) = &arg.default {
                self.walk_expr(default, scope);
            }
        }
        if let Some(vararg) = &args.vararg {
            if let Some(annotation) = &vararg.annotation {
                self.walk_expr(annotation, scope);
            }
        }
        if let Some(kwarg) = &args.kwarg {
            if let Some(annotation) = &kwarg.annotation {
                self.walk_expr(annotation, scope);
            }
        }
        if let Some(returns) = returns {
            self.walk_expr(returns, scope);
        }

        let kind = if scope.class_body {
            DefKind::Method
        } else {
            DefKind::Function
        };
        let receiver = if kind == DefKind::Method {
            args.posonlyargs
                .first()
                .or_else(|| args.args.first())
                .map(|a| a.def.arg.to_string())
        } else {
            None
        };
        let index = self.push_def(kind, name, span, scope);
        let inner = Scope {
            def: Some(index),
            class_body: false,
            receiver,
            def_depth: scope.def_depth + 1,
            prefix: format!("{}{}.", scope.prefix, name),
        };
        self.walk_block(body, &inner, 0);
    }

    fn push_def(
        &mut self,
        kind: DefKind,
        name: &str,
        span: (usize, usize),
        scope: &Scope,
    ) -> usize {
        self.defs.push(Definition {
            kind,
            name: format!("{}{}", scope.prefix, name),
            start_line: self.line_at(span.0),
            end_line: self.end_line_at(span.1),
            depth: scope.def_depth,
            decision_points: 0,
            max_nesting: 0,
            parent: scope.def,
            touches_instance_state: false,
        });
        self.defs.len() - 1
    }

    fn walk_expr(&mut self, expr: &ast::Expr, scope: &Scope) {
        match expr {
            ast::Expr::Name(name) => {
                self.referenced.insert(name.id.to_string());
            }
            ast::Expr::Attribute(attr) => {
                if let ast::Expr::Name(base) = attr.value.as_ref() {
                    if scope.receiver.as_deref() == Some(base.id.as_str()) {
                        self.mark_receiver_use(scope);
                    }
                }
                self.walk_expr(&attr.value, scope);
            }
            ast::Expr::BoolOp(op) => {
                self.bump(scope, op.values.len().saturating_sub(1) as u32);
                for value in &op.values {
                    self.walk_expr(value, scope);
                }
            }
            ast::Expr::IfExp(cond) => {
                self.bump(scope, 1);
                self.walk_expr(&cond.test, scope);
                self.walk_expr(&cond.body, scope);
                self.walk_expr(&cond.orelse, scope);
            }
            ast::Expr::ListComp(comp) => {
                self.walk_generators(&comp.generators, scope);
                self.walk_expr(&comp.elt, scope);
            }
            ast::Expr::SetComp(comp) => {
                self.walk_generators(&comp.generators, scope);
                self.walk_expr(&comp.elt, scope);
            }
            ast::Expr::GeneratorExp(comp) => {
                self.walk_generators(&comp.generators, scope);
                self.walk_expr(&comp.elt, scope);
            }
            ast::Expr::DictComp(comp) => {
                self.walk_generators(&comp.generators, scope);
                self.walk_expr(&comp.key, scope);
                self.walk_expr(&comp.value, scope);
            }
            ast::Expr::Lambda(lambda) => {
                self.walk_expr(&lambda.body, scope);
            }
            ast::Expr::Call(call) => {
                self.walk_expr(&call.func, scope);
                for arg in &call.args {
                    self.walk_expr(arg, scope);
                }
                for keyword in &call.keywords {
                    self.walk_expr(&keyword.value, scope);
                }
            }
            ast::Expr::BinOp(op) => {
                self.walk_expr(&op.left, scope);
                self.walk_expr(&op.right, scope);
            }
            ast::Expr::UnaryOp(op) => {
                self.walk_expr(&op.operand, scope);
            }
            ast::Expr::Compare(cmp) => {
                self.walk_expr(&cmp.left, scope);
                for comparator in &cmp.comparators {
                    self.walk_expr(comparator, scope);
                }
            }
            ast::Expr::Subscript(sub) => {
                self.walk_expr(&sub.value, scope);
                self.walk_expr(&sub.slice, scope);
            }
            ast::Expr::Slice(slice) => {
                for part in [&slice.lower, &slice.upper, &slice.step].into_iter().flatten() {
                    self.walk_expr(part, scope);
                }
            }
            ast::Expr::Dict(dict) => {
                for key in dict.keys.iter().flatten() {
                    self.walk_expr(key, scope);
                }
                for value in &dict.values {
                    self.walk_expr(value, scope);
                }
            }
            ast::Expr::Set(set) => {
                for elt in &set.elts {
                    self.walk_expr(elt, scope);
                }
            }
            ast::Expr::List(list) => {
                for elt in &list.elts {
                    self.walk_expr(elt, scope);
                }
            }
            ast::Expr::Tuple(tuple) => {
                for elt in &tuple.elts {
                    self.walk_expr(elt, scope);
                }
            }
            ast::Expr::Starred(starred) => {
                self.walk_expr(&starred.value, scope);
            }
            ast::Expr::Await(inner) => {
                self.walk_expr(&inner.value, scope);
            }
            ast::Expr::Yield(inner) => {
                if let Some(value) = &inner.value {
                    self.walk_expr(value, scope);
                }
            }
            ast::Expr::YieldFrom(inner) => {
                self.walk_expr(&inner.value, scope);
            }
            ast::Expr::NamedExpr(walrus) => {
                // The target is a binding, only the value is a read
                self.walk_expr(&walrus.value, scope);
            }
            ast::Expr::JoinedStr(joined) => {
                for value in &joined.values {
                    self.walk_expr(value, scope);
                }
            }
            ast::Expr::FormattedValue(formatted) => {
                self.walk_expr(&formatted.value, scope);
                if let Some(spec) = &formatted.format_spec {
                    self.walk_expr(spec, scope);
                }
            }
            _ => {}
        }
    }

    fn walk_generators(&mut self, generators: &[ast::Comprehension], scope: &Scope) {
        for generator in generators {
            // One decision per `for` clause plus one per `if` filter
            self.bump(scope, 1 + generator.ifs.len() as u32);
            self.walk_expr(&generator.iter, scope);
            for if_clause in &generator.ifs {
                self.walk_expr(if_clause, scope);
            }
        }
    }
}

fn is_terminator(stmt: &ast::Stmt) -> bool {
    matches!(
        stmt,
        ast::Stmt::Return(_) | ast::Stmt::Raise(_) | ast::Stmt::Break(_) | ast::Stmt::Continue(_)
    )
}
