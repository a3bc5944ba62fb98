use crate::analysis::span::Span;
use crate::analysis::types::{Ty, TypeDecl, TypePath, TypeTable};
use serde::{Deserialize, Serialize};

/// One type-checked compilation unit (a module with all of its files)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub module: String,
    /// Module paths this unit depends on
    #[serde(default)]
    pub imports: Vec<String>,
    /// Named types resolved by the checker, including imported ones
    #[serde(default)]
    pub types: Vec<TypeDecl>,
    #[serde(default)]
    pub files: Vec<SourceFile>,
}

impl Unit {
    pub fn new(module: &str) -> Self {
        Self { module: module.to_string(), imports: Vec::new(), types: Vec::new(), files: Vec::new() }
    }

    /// Every declared callable of the unit together with the file it lives in.
    pub fn callables(&self) -> impl Iterator<Item = (&SourceFile, &CallableDecl)> {
        self.files
            .iter()
            .flat_map(|file| file.callables.iter().map(move |decl| (file, decl)))
    }

    pub fn type_table(&self) -> TypeTable {
        TypeTable::from_decls(&self.types)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    /// Original text, only used to render excerpts
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub callables: Vec<CallableDecl>,
}

// ── Declarations ──

/// A declared function or method
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallableDecl {
    pub name: String,
    #[serde(default)]
    pub receiver: Option<ReceiverDecl>,
    #[serde(default)]
    pub generic_params: Vec<String>,
    /// `None` for declarations implemented outside the language
    #[serde(default)]
    pub body: Option<Vec<Stmt>>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverDecl {
    pub type_name: String,
    #[serde(default)]
    pub type_params: Vec<String>,
    #[serde(default)]
    pub pointer: bool,
}

// ── Symbols ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Method,
    /// Local variable, parameter or struct field
    Variable,
}

/// Where a symbol was declared, as reported by the checker
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeclSite {
    pub module: String,
    /// Receiver type for methods, enclosing declaration for variables
    #[serde(default)]
    pub owner: Option<String>,
    pub name: String,
    pub kind: SymbolKind,
}

impl DeclSite {
    pub fn function(module: &str, name: &str) -> Self {
        Self { module: module.to_string(), owner: None, name: name.to_string(), kind: SymbolKind::Function }
    }

    pub fn method(module: &str, owner: &str, name: &str) -> Self {
        Self {
            module: module.to_string(),
            owner: Some(owner.to_string()),
            name: name.to_string(),
            kind: SymbolKind::Method,
        }
    }

    pub fn variable(module: &str, owner: Option<&str>, name: &str) -> Self {
        Self {
            module: module.to_string(),
            owner: owner.map(str::to_string),
            name: name.to_string(),
            kind: SymbolKind::Variable,
        }
    }

    /// Site of a callable declared in `module`.
    pub fn of_callable(module: &str, decl: &CallableDecl) -> Self {
        match &decl.receiver {
            Some(recv) => Self::method(module, &recv.type_name, &decl.name),
            None => Self::function(module, &decl.name),
        }
    }
}

/// Reference to a declared symbol, possibly through an instantiation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolRef {
    pub site: DeclSite,
    #[serde(default)]
    pub type_args: Vec<Ty>,
}

/// What an identifier resolved to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Binding {
    Callable { symbol: SymbolRef },
    Variable { symbol: SymbolRef },
    TypeName { path: TypePath },
    /// Import qualifier
    Module { path: String },
    Builtin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ident {
    pub name: String,
    /// `None` when the checker had no information for this name
    #[serde(default)]
    pub binding: Option<Binding>,
    #[serde(default)]
    pub ty: Option<Ty>,
    #[serde(default)]
    pub span: Span,
}

// ── Statements ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Stmt {
    Expr(ExprStmt),
    /// Scoped-exit registration
    Defer(DeferStmt),
    Spawn(SpawnStmt),
    Let(LetStmt),
    Assign(AssignStmt),
    If(IfStmt),
    Loop(LoopStmt),
    Switch(SwitchStmt),
    Block(BlockStmt),
    Return(ReturnStmt),
    Other(OtherStmt),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Expr(s) => s.span,
            Stmt::Defer(s) => s.span,
            Stmt::Spawn(s) => s.span,
            Stmt::Let(s) => s.span,
            Stmt::Assign(s) => s.span,
            Stmt::If(s) => s.span,
            Stmt::Loop(s) => s.span,
            Stmt::Switch(s) => s.span,
            Stmt::Block(s) => s.span,
            Stmt::Return(s) => s.span,
            Stmt::Other(s) => s.span,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Stmt::Expr(_) => "expr",
            Stmt::Defer(_) => "defer",
            Stmt::Spawn(_) => "spawn",
            Stmt::Let(_) => "let",
            Stmt::Assign(_) => "assign",
            Stmt::If(_) => "if",
            Stmt::Loop(_) => "loop",
            Stmt::Switch(_) => "switch",
            Stmt::Block(_) => "block",
            Stmt::Return(_) => "return",
            Stmt::Other(_) => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExprStmt {
    pub expr: Expr,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeferStmt {
    pub call: CallExpr,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnStmt {
    pub call: CallExpr,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LetStmt {
    pub names: Vec<Ident>,
    #[serde(default)]
    pub values: Vec<Expr>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignStmt {
    pub targets: Vec<Expr>,
    pub values: Vec<Expr>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfStmt {
    #[serde(default)]
    pub init: Option<Box<Stmt>>,
    pub cond: Expr,
    pub then_body: Vec<Stmt>,
    #[serde(default)]
    pub else_body: Option<Vec<Stmt>>,
    #[serde(default)]
    pub span: Span,
}

/// Any loop form; `header` holds init/condition/range expressions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopStmt {
    #[serde(default)]
    pub header: Vec<Expr>,
    pub body: Vec<Stmt>,
    #[serde(default)]
    pub span: Span,
}

/// Switch, type switch or select
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchStmt {
    #[serde(default)]
    pub subject: Option<Expr>,
    pub arms: Vec<SwitchArm>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchArm {
    #[serde(default)]
    pub patterns: Vec<Expr>,
    pub body: Vec<Stmt>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockStmt {
    pub body: Vec<Stmt>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnStmt {
    #[serde(default)]
    pub values: Vec<Expr>,
    #[serde(default)]
    pub span: Span,
}

/// break, continue, goto, labels, channel sends without calls, ...
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtherStmt {
    #[serde(default)]
    pub span: Span,
}

// ── Expressions ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    Ident(Ident),
    /// Inline task body: func() { ... }
    FuncLit(FuncLit),
    /// Explicit type-argument application: f[int]
    Instantiate(Instantiate),
    /// receiver.member
    Selector(Selector),
    CompositeLit(CompositeLit),
    Call(CallExpr),
    Index(IndexExpr),
    Paren(ParenExpr),
    Unary(UnaryExpr),
    Binary(BinaryExpr),
    Lit(LitExpr),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Ident(e) => e.span,
            Expr::FuncLit(e) => e.span,
            Expr::Instantiate(e) => e.span,
            Expr::Selector(e) => e.span,
            Expr::CompositeLit(e) => e.span,
            Expr::Call(e) => e.span,
            Expr::Index(e) => e.span,
            Expr::Paren(e) => e.span,
            Expr::Unary(e) => e.span,
            Expr::Binary(e) => e.span,
            Expr::Lit(e) => e.span,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Ident(_) => "identifier",
            Expr::FuncLit(_) => "function literal",
            Expr::Instantiate(_) => "instantiation",
            Expr::Selector(_) => "selector",
            Expr::CompositeLit(_) => "composite literal",
            Expr::Call(_) => "call",
            Expr::Index(_) => "index",
            Expr::Paren(_) => "parenthesized",
            Expr::Unary(_) => "unary",
            Expr::Binary(_) => "binary",
            Expr::Lit(_) => "literal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncLit {
    pub body: Vec<Stmt>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instantiate {
    pub target: Box<Expr>,
    #[serde(default)]
    pub type_args: Vec<Ty>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selector {
    pub receiver: Box<Expr>,
    pub member: Ident,
    #[serde(default)]
    pub span: Span,
}

/// Inline value construction: T{a, b} or T{x: a, y: b}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeLit {
    pub ty: Ty,
    #[serde(default)]
    pub elements: Vec<Element>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Element {
    Keyed { key: Expr, value: Expr },
    Positional { value: Expr },
}

impl Element {
    pub fn value(&self) -> &Expr {
        match self {
            Element::Keyed { value, .. } | Element::Positional { value } => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallExpr {
    pub callee: Box<Expr>,
    #[serde(default)]
    pub args: Vec<Expr>,
    /// Result type; `None` when the checker could not type the call
    #[serde(default)]
    pub ty: Option<Ty>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexExpr {
    pub base: Box<Expr>,
    pub index: Box<Expr>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParenExpr {
    pub inner: Box<Expr>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    AddrOf,
    Deref,
    Neg,
    Not,
    Recv,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnaryExpr {
    pub op: UnaryOp,
    pub operand: Box<Expr>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryExpr {
    pub lhs: Box<Expr>,
    pub op: String,
    pub rhs: Box<Expr>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LitExpr {
    pub value: String,
    #[serde(default)]
    pub span: Span,
}
