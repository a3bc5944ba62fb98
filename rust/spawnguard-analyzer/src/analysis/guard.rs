//! Guard detection. Does a callable body intercept its own faults?
//!
//! A body is guarded when one of its top-level scoped-exit registrations
//! (`defer`) refers to the fault-capture primitive somewhere inside the
//! registered callable. Other statement kinds are not searched, and nested
//! spawn statements are skipped because a guard inside a spawned sub-task
//! only protects that sub-task.
//!
//! Two behaviours are kept on purpose:
//!
//! - A body made only of calls to safe callables is not itself safe.
//! - The guard's position is not checked; a registration after a risky call
//!   still marks the whole body as guarded.

use crate::analysis::ast::*;
use crate::analysis::span::Span;
use tracing::trace;

/// Name of the primitive that absorbs an in-flight fault.
pub const DEFAULT_FAULT_CAPTURE: &str = "recover";

#[derive(Debug, Clone)]
pub struct GuardDetector {
    fault_capture: String,
}

impl Default for GuardDetector {
    fn default() -> Self {
        Self::new(DEFAULT_FAULT_CAPTURE)
    }
}

impl GuardDetector {
    pub fn new(fault_capture: impl Into<String>) -> Self {
        Self { fault_capture: fault_capture.into() }
    }

    pub fn fault_capture(&self) -> &str {
        &self.fault_capture
    }

    pub fn installs_guard(&self, body: &[Stmt]) -> bool {
        self.find_guard(body).is_some()
    }

    /// Span of the first top-level registration that captures faults.
    pub fn find_guard(&self, body: &[Stmt]) -> Option<Span> {
        for stmt in body {
            match stmt {
                Stmt::Defer(d) => {
                    if self.expr_references(&d.call.callee) {
                        return Some(d.span);
                    }
                }
                other => {
                    trace!(kind = other.kind_name(), "not searching statement for a guard");
                }
            }
        }
        None
    }

    fn is_primitive(&self, id: &Ident) -> bool {
        id.name == self.fault_capture
            && matches!(id.binding, None | Some(Binding::Builtin))
    }

    fn block_references(&self, body: &[Stmt]) -> bool {
        body.iter().any(|s| self.stmt_references(s))
    }

    fn stmt_references(&self, stmt: &Stmt) -> bool {
        match stmt {
            // Each spawned task carries its own guard.
            Stmt::Spawn(_) => false,
            Stmt::Expr(s) => self.expr_references(&s.expr),
            Stmt::Defer(d) => self.call_references(&d.call),
            Stmt::Let(l) => l.values.iter().any(|v| self.expr_references(v)),
            Stmt::Assign(a) => a
                .targets
                .iter()
                .chain(a.values.iter())
                .any(|e| self.expr_references(e)),
            Stmt::If(i) => {
                i.init.as_deref().is_some_and(|s| self.stmt_references(s))
                    || self.expr_references(&i.cond)
                    || self.block_references(&i.then_body)
                    || i.else_body.as_deref().is_some_and(|b| self.block_references(b))
            }
            Stmt::Loop(l) => {
                l.header.iter().any(|e| self.expr_references(e)) || self.block_references(&l.body)
            }
            Stmt::Switch(s) => {
                s.subject.as_ref().is_some_and(|e| self.expr_references(e))
                    || s.arms.iter().any(|arm| {
                        arm.patterns.iter().any(|p| self.expr_references(p))
                            || self.block_references(&arm.body)
                    })
            }
            Stmt::Block(b) => self.block_references(&b.body),
            Stmt::Return(r) => r.values.iter().any(|v| self.expr_references(v)),
            Stmt::Other(_) => false,
        }
    }

    fn call_references(&self, call: &CallExpr) -> bool {
        self.expr_references(&call.callee) || call.args.iter().any(|a| self.expr_references(a))
    }

    fn expr_references(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Ident(id) => self.is_primitive(id),
            Expr::FuncLit(f) => self.block_references(&f.body),
            Expr::Instantiate(i) => self.expr_references(&i.target),
            // The member name is a field or method, never the primitive.
            Expr::Selector(s) => self.expr_references(&s.receiver),
            Expr::CompositeLit(c) => c.elements.iter().any(|el| match el {
                Element::Keyed { key: Expr::Ident(_), value } => self.expr_references(value),
                Element::Keyed { key, value } => {
                    self.expr_references(key) || self.expr_references(value)
                }
                Element::Positional { value } => self.expr_references(value),
            }),
            Expr::Call(c) => self.call_references(c),
            Expr::Index(i) => self.expr_references(&i.base) || self.expr_references(&i.index),
            Expr::Paren(p) => self.expr_references(&p.inner),
            Expr::Unary(u) => self.expr_references(&u.operand),
            Expr::Binary(b) => self.expr_references(&b.lhs) || self.expr_references(&b.rhs),
            Expr::Lit(_) => false,
        }
    }
}
