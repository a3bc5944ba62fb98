//! Tree builders for tests and embedding.
//!
//! Hand-writing checker output is noisy; these helpers build the common
//! shapes (guarded bodies, spawn statements, literals, resolved references)
//! with sensible bindings so tests read like the programs they model.

use crate::analysis::ast::*;
use crate::analysis::span::Span;
use crate::analysis::types::{FieldDecl, Ty, TypeDecl};

// ── Identifiers ──

pub fn ident(name: &str, binding: Option<Binding>) -> Ident {
    Ident { name: name.to_string(), binding, ty: None, span: Span::dummy() }
}

/// Reference to a declared top-level function.
pub fn func_ref(module: &str, name: &str) -> Expr {
    Expr::Ident(ident(
        name,
        Some(Binding::Callable {
            symbol: SymbolRef { site: DeclSite::function(module, name), type_args: Vec::new() },
        }),
    ))
}

/// Reference to an instantiated generic function, `name[args]`, where the
/// checker reports the instance with its type arguments attached.
pub fn generic_func_ref(module: &str, name: &str, type_args: Vec<Ty>) -> Expr {
    let target = Expr::Ident(ident(
        name,
        Some(Binding::Callable {
            symbol: SymbolRef { site: DeclSite::function(module, name), type_args: type_args.clone() },
        }),
    ));
    Expr::Instantiate(Instantiate { target: Box::new(target), type_args, span: Span::dummy() })
}

pub fn method_member(module: &str, owner: &str, name: &str) -> Ident {
    ident(
        name,
        Some(Binding::Callable {
            symbol: SymbolRef { site: DeclSite::method(module, owner, name), type_args: Vec::new() },
        }),
    )
}

pub fn field_member(module: &str, owner: &str, name: &str) -> Ident {
    ident(
        name,
        Some(Binding::Variable {
            symbol: SymbolRef { site: DeclSite::variable(module, Some(owner), name), type_args: Vec::new() },
        }),
    )
}

/// Local variable declared inside `scope` with static type `ty`.
pub fn local(module: &str, scope: &str, name: &str, ty: Ty) -> Expr {
    let mut id = ident(
        name,
        Some(Binding::Variable {
            symbol: SymbolRef { site: DeclSite::variable(module, Some(scope), name), type_args: Vec::new() },
        }),
    );
    id.ty = Some(ty);
    Expr::Ident(id)
}

pub fn builtin(name: &str) -> Expr {
    Expr::Ident(ident(name, Some(Binding::Builtin)))
}

pub fn type_name(module: &str, name: &str) -> Expr {
    Expr::Ident(ident(
        name,
        Some(Binding::TypeName { path: crate::analysis::types::TypePath::new(module, name) }),
    ))
}

pub fn module_ref(path: &str) -> Expr {
    let short = path.rsplit('/').next().unwrap_or(path);
    Expr::Ident(ident(short, Some(Binding::Module { path: path.to_string() })))
}

// ── Expressions ──

pub fn call(callee: Expr, args: Vec<Expr>) -> CallExpr {
    CallExpr { callee: Box::new(callee), args, ty: None, span: Span::dummy() }
}

pub fn typed_call(callee: Expr, args: Vec<Expr>, ty: Ty) -> Expr {
    let mut c = call(callee, args);
    c.ty = Some(ty);
    Expr::Call(c)
}

pub fn func_lit(body: Vec<Stmt>) -> Expr {
    Expr::FuncLit(FuncLit { body, span: Span::dummy() })
}

pub fn select(receiver: Expr, member: Ident) -> Expr {
    Expr::Selector(Selector { receiver: Box::new(receiver), member, span: Span::dummy() })
}

pub fn keyed_lit(ty: Ty, entries: Vec<(&str, Expr)>) -> Expr {
    let elements = entries
        .into_iter()
        .map(|(key, value)| Element::Keyed { key: Expr::Ident(ident(key, None)), value })
        .collect();
    Expr::CompositeLit(CompositeLit { ty, elements, span: Span::dummy() })
}

pub fn positional_lit(ty: Ty, values: Vec<Expr>) -> Expr {
    let elements = values.into_iter().map(|value| Element::Positional { value }).collect();
    Expr::CompositeLit(CompositeLit { ty, elements, span: Span::dummy() })
}

pub fn empty_lit(ty: Ty) -> Expr {
    Expr::CompositeLit(CompositeLit { ty, elements: Vec::new(), span: Span::dummy() })
}

pub fn paren(inner: Expr) -> Expr {
    Expr::Paren(ParenExpr { inner: Box::new(inner), span: Span::dummy() })
}

pub fn addr_of(inner: Expr) -> Expr {
    Expr::Unary(UnaryExpr { op: UnaryOp::AddrOf, operand: Box::new(inner), span: Span::dummy() })
}

pub fn lit(value: &str) -> Expr {
    Expr::Lit(LitExpr { value: value.to_string(), span: Span::dummy() })
}

// ── Statements ──

pub fn expr_stmt(expr: Expr) -> Stmt {
    Stmt::Expr(ExprStmt { expr, span: Span::dummy() })
}

pub fn defer(callee: Expr) -> Stmt {
    Stmt::Defer(DeferStmt { call: call(callee, Vec::new()), span: Span::dummy() })
}

/// `defer func() { if r := <primitive>(); r != nil { report(r) } }()`
pub fn guard_with(primitive: &str) -> Stmt {
    let capture = Stmt::Let(LetStmt {
        names: vec![ident("r", None)],
        values: vec![Expr::Call(call(builtin(primitive), Vec::new()))],
        span: Span::dummy(),
    });
    let check = Stmt::If(IfStmt {
        init: Some(Box::new(capture)),
        cond: Expr::Binary(BinaryExpr {
            lhs: Box::new(Expr::Ident(ident("r", None))),
            op: "!=".into(),
            rhs: Box::new(lit("nil")),
            span: Span::dummy(),
        }),
        then_body: vec![expr_stmt(Expr::Call(call(func_ref("log", "Print"), vec![lit("recovered")])))],
        else_body: None,
        span: Span::dummy(),
    });
    defer(func_lit(vec![check]))
}

pub fn guard() -> Stmt {
    guard_with("recover")
}

/// A call that may fault.
pub fn risky() -> Stmt {
    expr_stmt(Expr::Call(call(func_ref("fmt", "Println"), vec![lit("may fault")])))
}

pub fn spawn_at(callee: Expr, line: usize) -> Stmt {
    Stmt::Spawn(SpawnStmt { call: call(callee, Vec::new()), span: Span::at(line, 2) })
}

pub fn spawn(callee: Expr) -> Stmt {
    spawn_at(callee, 1)
}

// ── Declarations ──

pub fn function(name: &str, body: Vec<Stmt>) -> CallableDecl {
    CallableDecl {
        name: name.to_string(),
        receiver: None,
        generic_params: Vec::new(),
        body: Some(body),
        span: Span::dummy(),
    }
}

pub fn generic_function(name: &str, params: &[&str], body: Vec<Stmt>) -> CallableDecl {
    let mut decl = function(name, body);
    decl.generic_params = params.iter().map(|p| p.to_string()).collect();
    decl
}

pub fn method(owner: &str, name: &str, body: Vec<Stmt>) -> CallableDecl {
    let mut decl = function(name, body);
    decl.receiver = Some(ReceiverDecl { type_name: owner.to_string(), type_params: Vec::new(), pointer: false });
    decl
}

/// Struct whose fields all hold callables, in the given order.
pub fn struct_type(module: &str, name: &str, fields: &[&str]) -> TypeDecl {
    TypeDecl {
        module: module.to_string(),
        name: name.to_string(),
        generic_params: Vec::new(),
        underlying: anonymous_struct(fields),
        span: Span::dummy(),
    }
}

pub fn anonymous_struct(fields: &[&str]) -> Ty {
    Ty::Struct {
        fields: fields
            .iter()
            .map(|f| FieldDecl { name: f.to_string(), ty: Ty::Func })
            .collect(),
    }
}

pub fn interface_type(module: &str, name: &str, methods: &[&str]) -> TypeDecl {
    TypeDecl {
        module: module.to_string(),
        name: name.to_string(),
        generic_params: Vec::new(),
        underlying: Ty::Interface { methods: methods.iter().map(|m| m.to_string()).collect() },
        span: Span::dummy(),
    }
}

/// Single-file unit.
pub fn unit(module: &str, callables: Vec<CallableDecl>, types: Vec<TypeDecl>) -> Unit {
    Unit {
        module: module.to_string(),
        imports: Vec::new(),
        types,
        files: vec![SourceFile { path: format!("{}/main.go", module), source: None, callables }],
    }
}
