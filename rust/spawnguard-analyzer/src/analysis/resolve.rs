//! Call-target resolution: reduce the target of a spawn to a verdict.
//!
//! A target expression is first classified into a [`CallTarget`], one variant
//! per recognised shape. Each shape either ends in the guard detector (inline
//! bodies), ends in exactly one fact lookup (identifiers and members that name
//! a declaration), or descends into a strictly smaller sub-expression
//! (instantiations, fields of composite literals). Resolution therefore always
//! terminates.
//!
//! Every shape that is not understood resolves to [`Verdict::Unsafe`]:
//! flagging a safe spawn is acceptable, missing an unsafe one is not.
//! Calls through an interface-typed value are reported as
//! [`Verdict::Unknown`], which the validator treats as unsafe.

use crate::analysis::ast::*;
use crate::analysis::facts::{CallableId, FactStore};
use crate::analysis::guard::GuardDetector;
use crate::analysis::types::{FieldDecl, TypeTable};

use std::fmt;
use tracing::{debug, warn};

// ── Verdicts ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Safe,
    Unsafe,
    /// The concrete callee depends on a runtime value.
    Unknown,
}

impl Verdict {
    pub fn is_safe(self) -> bool {
        matches!(self, Verdict::Safe)
    }

    fn from_guard(guarded: bool) -> Self {
        if guarded {
            Verdict::Safe
        } else {
            Verdict::Unsafe
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Safe => write!(f, "safe"),
            Verdict::Unsafe => write!(f, "unsafe"),
            Verdict::Unknown => write!(f, "unknown"),
        }
    }
}

// ── Target shapes ───────────────────────────────────────────────────

/// Recognised shapes of a call target.
#[derive(Debug, Clone, Copy)]
pub enum CallTarget<'a> {
    /// `func() { ... }`
    InlineBody(&'a FuncLit),
    /// A declared function or a variable holding a callable
    Ident(&'a Ident),
    /// `f[T1, T2]`
    Instantiation(&'a Instantiate),
    /// `receiver.member`
    Member { receiver: Receiver<'a>, member: &'a Ident },
    Other(&'a Expr),
}

/// Recognised shapes of a selector's receiver.
#[derive(Debug, Clone, Copy)]
pub enum Receiver<'a> {
    Literal(&'a CompositeLit),
    CallResult(&'a CallExpr),
    Ident(&'a Ident),
    Other(&'a Expr),
}

impl<'a> CallTarget<'a> {
    pub fn classify(expr: &'a Expr) -> Self {
        match expr {
            Expr::FuncLit(f) => CallTarget::InlineBody(f),
            Expr::Ident(id) => CallTarget::Ident(id),
            Expr::Instantiate(inst) => CallTarget::Instantiation(inst),
            Expr::Selector(sel) => CallTarget::Member {
                receiver: Receiver::classify(&sel.receiver),
                member: &sel.member,
            },
            Expr::Paren(p) => CallTarget::classify(&p.inner),
            Expr::CompositeLit(_)
            | Expr::Call(_)
            | Expr::Index(_)
            | Expr::Unary(_)
            | Expr::Binary(_)
            | Expr::Lit(_) => CallTarget::Other(expr),
        }
    }
}

impl<'a> Receiver<'a> {
    /// Parentheses, `&` and `*` do not change which member is selected.
    pub fn classify(expr: &'a Expr) -> Self {
        match expr {
            Expr::Paren(p) => Receiver::classify(&p.inner),
            Expr::Unary(u) if matches!(u.op, UnaryOp::AddrOf | UnaryOp::Deref) => {
                Receiver::classify(&u.operand)
            }
            Expr::CompositeLit(lit) => Receiver::Literal(lit),
            Expr::Call(call) => Receiver::CallResult(call),
            Expr::Ident(id) => Receiver::Ident(id),
            Expr::FuncLit(_)
            | Expr::Instantiate(_)
            | Expr::Selector(_)
            | Expr::Index(_)
            | Expr::Unary(_)
            | Expr::Binary(_)
            | Expr::Lit(_) => Receiver::Other(expr),
        }
    }
}

// ── Resolver ────────────────────────────────────────────────────────

/// Maps call-target expressions to verdicts using facts committed so far.
pub struct CallableResolver<'a> {
    detector: &'a GuardDetector,
    facts: &'a dyn FactStore,
    types: &'a TypeTable,
}

impl<'a> CallableResolver<'a> {
    pub fn new(detector: &'a GuardDetector, facts: &'a dyn FactStore, types: &'a TypeTable) -> Self {
        Self { detector, facts, types }
    }

    pub fn resolve(&self, expr: &Expr) -> Verdict {
        self.resolve_target(CallTarget::classify(expr))
    }

    pub fn resolve_target(&self, target: CallTarget<'_>) -> Verdict {
        match target {
            CallTarget::InlineBody(lit) => Verdict::from_guard(self.detector.installs_guard(&lit.body)),
            CallTarget::Ident(id) => self.resolve_ident(id),
            CallTarget::Instantiation(inst) => self.resolve_instantiation(inst),
            CallTarget::Member { receiver, member } => self.resolve_member(receiver, member),
            CallTarget::Other(expr) => {
                debug!(kind = expr.kind_name(), line = expr.span().line, "unsupported call target");
                Verdict::Unsafe
            }
        }
    }

    /// Terminal case: one fact lookup, no look into the target's body.
    fn resolve_ident(&self, id: &Ident) -> Verdict {
        match &id.binding {
            Some(Binding::Callable { symbol }) | Some(Binding::Variable { symbol }) => {
                let key = CallableId::canonical(&symbol.site);
                if self.facts.is_safe(&key) {
                    Verdict::Safe
                } else {
                    debug!(callable = %key, "no safety fact");
                    Verdict::Unsafe
                }
            }
            Some(Binding::Builtin) | Some(Binding::TypeName { .. }) | Some(Binding::Module { .. }) => {
                debug!(name = %id.name, "identifier does not name a declared callable");
                Verdict::Unsafe
            }
            None => {
                warn!(name = %id.name, line = id.span.line, "missing type information for call target");
                Verdict::Unsafe
            }
        }
    }

    fn resolve_instantiation(&self, inst: &Instantiate) -> Verdict {
        match inst.target.as_ref() {
            Expr::Ident(id) => self.resolve_ident(id),
            // pkg.Generic[T] and parenthesised forms
            target @ (Expr::Selector(_) | Expr::Paren(_)) => self.resolve(target),
            other => {
                debug!(kind = other.kind_name(), "instantiation of an unsupported expression");
                Verdict::Unsafe
            }
        }
    }

    fn resolve_member(&self, receiver: Receiver<'_>, member: &Ident) -> Verdict {
        match receiver {
            Receiver::Literal(lit) => self.resolve_literal_member(lit, member),
            Receiver::CallResult(call) => self.resolve_call_member(call, member),
            Receiver::Ident(id) => self.resolve_ident_member(id, member),
            Receiver::Other(expr) => {
                debug!(kind = expr.kind_name(), member = %member.name, "unsupported selector receiver");
                Verdict::Unsafe
            }
        }
    }

    fn resolve_literal_member(&self, lit: &CompositeLit, member: &Ident) -> Verdict {
        // Nothing initialised: the selection has to be a method.
        if lit.elements.is_empty() {
            return self.resolve_ident(member);
        }

        let Some(fields) = self.types.struct_fields(&lit.ty) else {
            match self.types.underlying(&lit.ty) {
                Some(other) => debug!(ty = %other, member = %member.name, "member of a non-struct literal"),
                None => warn!(ty = %lit.ty, "cannot resolve composite literal type"),
            }
            return self.resolve_ident(member);
        };

        match &lit.elements[0] {
            Element::Keyed { .. } => self.resolve_keyed_member(lit, member),
            Element::Positional { .. } => self.resolve_positional_member(lit, fields, member),
        }
    }

    fn resolve_keyed_member(&self, lit: &CompositeLit, member: &Ident) -> Verdict {
        for element in &lit.elements {
            match element {
                Element::Keyed { key: Expr::Ident(key), value } => {
                    if key.name == member.name {
                        return self.resolve(value);
                    }
                }
                Element::Keyed { key, .. } => {
                    debug!(kind = key.kind_name(), "skipping non-identifier key");
                }
                Element::Positional { .. } => {
                    warn!(line = lit.span.line, "composite literal mixes keyed and positional elements");
                    return Verdict::Unsafe;
                }
            }
        }
        // No field initialised under that name: a method of the literal's type.
        self.resolve_ident(member)
    }

    fn resolve_positional_member(&self, lit: &CompositeLit, fields: &[FieldDecl], member: &Ident) -> Verdict {
        if lit.elements.iter().any(|e| matches!(e, Element::Keyed { .. })) {
            warn!(line = lit.span.line, "composite literal mixes keyed and positional elements");
            return Verdict::Unsafe;
        }
        let Some(index) = fields.iter().position(|f| f.name == member.name) else {
            return self.resolve_ident(member);
        };
        match lit.elements.get(index) {
            Some(element) => self.resolve(element.value()),
            None => {
                warn!(
                    field = %member.name,
                    given = lit.elements.len(),
                    "positional literal has fewer elements than fields"
                );
                Verdict::Unsafe
            }
        }
    }

    fn resolve_call_member(&self, call: &CallExpr, member: &Ident) -> Verdict {
        let Some(ty) = &call.ty else {
            warn!(line = call.span.line, member = %member.name, "call result has no type information");
            return Verdict::Unsafe;
        };
        match self.types.is_interface(ty) {
            Some(true) => {
                debug!(ty = %ty, member = %member.name, "member selected through an interface");
                Verdict::Unknown
            }
            // Concrete result: the member's declaration is fixed by the type.
            Some(false) => self.resolve_ident(member),
            None => {
                warn!(ty = %ty, "cannot resolve call result type");
                Verdict::Unsafe
            }
        }
    }

    fn resolve_ident_member(&self, recv: &Ident, member: &Ident) -> Verdict {
        match &recv.binding {
            // pkg.Func and T.method name a declaration directly.
            Some(Binding::Module { .. }) | Some(Binding::TypeName { .. }) => {
                return self.resolve_ident(member);
            }
            Some(Binding::Callable { .. }) | Some(Binding::Variable { .. }) | Some(Binding::Builtin) | None => {}
        }

        // Treated as a literal of the static type; the current value is not tracked.
        let Some(ty) = &recv.ty else {
            debug!(name = %recv.name, "receiver has no static type");
            return self.resolve_ident(member);
        };
        match self.types.is_interface(ty) {
            Some(true) => {
                debug!(receiver = %recv.name, ty = %ty, member = %member.name, "member selected through an interface");
                Verdict::Unknown
            }
            Some(false) | None => self.resolve_ident(member),
        }
    }
}
