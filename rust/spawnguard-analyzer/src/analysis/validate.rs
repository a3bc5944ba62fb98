//! Spawn validation: one report per spawn whose target is not provably safe.
//!
//! Spawns are found anywhere in a declaration, including inside function
//! literals and inside other spawned bodies, and are reported in source
//! order. Reports are never merged, even for repeated spawns of the same
//! target.

use crate::analysis::ast::*;
use crate::analysis::resolve::{CallableResolver, Verdict};
use crate::analysis::span::Span;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const SPAWN_MESSAGE: &str = "spawned task does not install a fault guard";

/// Receiver of validation findings.
pub trait DiagnosticSink {
    fn report(&mut self, file: &str, span: Span, message: &str);
}

/// A flagged spawn statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnReport {
    pub file: String,
    pub span: Span,
    pub message: String,
}

impl DiagnosticSink for Vec<SpawnReport> {
    fn report(&mut self, file: &str, span: Span, message: &str) {
        self.push(SpawnReport { file: file.to_string(), span, message: message.to_string() });
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationSummary {
    pub spawns: usize,
    pub flagged: usize,
}

pub fn validate_unit(unit: &Unit, resolver: &CallableResolver<'_>, sink: &mut dyn DiagnosticSink) -> ValidationSummary {
    let mut summary = ValidationSummary::default();

    for file in &unit.files {
        for decl in &file.callables {
            let Some(body) = &decl.body else {
                continue;
            };
            let mut spawns = Vec::new();
            collect_block(body, &mut spawns);

            for spawn in spawns {
                summary.spawns += 1;
                let verdict = resolver.resolve(&spawn.call.callee);
                debug!(
                    file = %file.path,
                    line = spawn.span.line,
                    target = spawn.call.callee.kind_name(),
                    %verdict,
                    "resolved spawn target"
                );
                if verdict != Verdict::Safe {
                    summary.flagged += 1;
                    sink.report(&file.path, spawn.span, SPAWN_MESSAGE);
                }
            }
        }
    }

    summary
}

// ── Spawn collection ────────────────────────────────────────────────

/// Every spawn statement in `body`, outermost first, in source order.
pub fn collect_spawns(body: &[Stmt]) -> Vec<&SpawnStmt> {
    let mut out = Vec::new();
    collect_block(body, &mut out);
    out
}

fn collect_block<'a>(body: &'a [Stmt], out: &mut Vec<&'a SpawnStmt>) {
    for stmt in body {
        collect_stmt(stmt, out);
    }
}

fn collect_stmt<'a>(stmt: &'a Stmt, out: &mut Vec<&'a SpawnStmt>) {
    match stmt {
        Stmt::Spawn(s) => {
            out.push(s);
            collect_call(&s.call, out);
        }
        Stmt::Expr(s) => collect_expr(&s.expr, out),
        Stmt::Defer(d) => collect_call(&d.call, out),
        Stmt::Let(l) => {
            for v in &l.values {
                collect_expr(v, out);
            }
        }
        Stmt::Assign(a) => {
            for e in a.targets.iter().chain(a.values.iter()) {
                collect_expr(e, out);
            }
        }
        Stmt::If(i) => {
            if let Some(init) = &i.init {
                collect_stmt(init, out);
            }
            collect_expr(&i.cond, out);
            collect_block(&i.then_body, out);
            if let Some(else_body) = &i.else_body {
                collect_block(else_body, out);
            }
        }
        Stmt::Loop(l) => {
            for e in &l.header {
                collect_expr(e, out);
            }
            collect_block(&l.body, out);
        }
        Stmt::Switch(s) => {
            if let Some(subject) = &s.subject {
                collect_expr(subject, out);
            }
            for arm in &s.arms {
                for p in &arm.patterns {
                    collect_expr(p, out);
                }
                collect_block(&arm.body, out);
            }
        }
        Stmt::Block(b) => collect_block(&b.body, out),
        Stmt::Return(r) => {
            for v in &r.values {
                collect_expr(v, out);
            }
        }
        Stmt::Other(_) => {}
    }
}

fn collect_call<'a>(call: &'a CallExpr, out: &mut Vec<&'a SpawnStmt>) {
    collect_expr(&call.callee, out);
    for arg in &call.args {
        collect_expr(arg, out);
    }
}

fn collect_expr<'a>(expr: &'a Expr, out: &mut Vec<&'a SpawnStmt>) {
    match expr {
        Expr::FuncLit(f) => collect_block(&f.body, out),
        Expr::Instantiate(i) => collect_expr(&i.target, out),
        Expr::Selector(s) => collect_expr(&s.receiver, out),
        Expr::CompositeLit(c) => {
            for el in &c.elements {
                if let Element::Keyed { key, .. } = el {
                    collect_expr(key, out);
                }
                collect_expr(el.value(), out);
            }
        }
        Expr::Call(c) => collect_call(c, out),
        Expr::Index(i) => {
            collect_expr(&i.base, out);
            collect_expr(&i.index, out);
        }
        Expr::Paren(p) => collect_expr(&p.inner, out),
        Expr::Unary(u) => collect_expr(&u.operand, out),
        Expr::Binary(b) => {
            collect_expr(&b.lhs, out);
            collect_expr(&b.rhs, out);
        }
        Expr::Ident(_) | Expr::Lit(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::facts::{CallableId, FactStore, MemoryFactStore, SafetyFact};
    use crate::analysis::guard::GuardDetector;
    use crate::analysis::types::TypeTable;
    use crate::testing::*;

    fn run(unit: &Unit, store: &MemoryFactStore) -> (ValidationSummary, Vec<SpawnReport>) {
        let detector = GuardDetector::default();
        let types = unit.type_table();
        let resolver = CallableResolver::new(&detector, store, &types);
        let mut reports = Vec::new();
        let summary = validate_unit(unit, &resolver, &mut reports);
        (summary, reports)
    }

    #[test]
    fn nested_spawns_are_each_validated() {
        // spawn func() { guard; spawn func() { risky } }
        let inner = spawn_at(func_lit(vec![risky()]), 3);
        let outer = spawn_at(func_lit(vec![guard(), inner]), 2);
        let unit = unit("app", vec![function("f", vec![outer])], vec![]);

        let (summary, reports) = run(&unit, &MemoryFactStore::new());
        assert_eq!(summary, ValidationSummary { spawns: 2, flagged: 1 });
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].span.line, 3);
        assert_eq!(reports[0].message, SPAWN_MESSAGE);
    }

    #[test]
    fn spawns_inside_branches_loops_and_closures_are_found() {
        let in_if = Stmt::If(IfStmt {
            init: None,
            cond: lit("ok"),
            then_body: vec![spawn_at(func_ref("app", "work"), 2)],
            else_body: Some(vec![spawn_at(func_ref("app", "work"), 3)]),
            span: Span::dummy(),
        });
        let in_loop = Stmt::Loop(LoopStmt {
            header: vec![],
            body: vec![spawn_at(func_ref("app", "work"), 4)],
            span: Span::dummy(),
        });
        let in_closure = Stmt::Let(LetStmt {
            names: vec![ident("start", None)],
            values: vec![func_lit(vec![spawn_at(func_ref("app", "work"), 5)])],
            span: Span::dummy(),
        });
        let body = vec![in_if, in_loop, in_closure];
        let lines: Vec<usize> = collect_spawns(&body).iter().map(|s| s.span.line).collect();
        assert_eq!(lines, vec![2, 3, 4, 5]);
    }

    #[test]
    fn repeated_spawns_of_same_target_are_reported_separately() {
        let body = vec![
            spawn_at(func_ref("app", "work"), 1),
            spawn_at(func_ref("app", "work"), 2),
            spawn_at(func_ref("app", "work"), 3),
        ];
        let unit = unit("app", vec![function("f", body)], vec![]);
        let (_, reports) = run(&unit, &MemoryFactStore::new());
        assert_eq!(reports.iter().map(|r| r.span.line).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn safe_reference_is_not_reported() {
        let mut store = MemoryFactStore::new();
        store.export_fact(
            CallableId::canonical(&DeclSite::function("app", "work")),
            SafetyFact::GuaranteedSafe,
        );
        let unit = unit("app", vec![function("f", vec![spawn(func_ref("app", "work"))])], vec![]);
        let (summary, reports) = run(&unit, &store);
        assert_eq!(summary.spawns, 1);
        assert!(reports.is_empty());
    }

    #[test]
    fn unknown_verdicts_are_reported() {
        let types = vec![interface_type("app", "runner", &["run"])];
        let target = select(
            typed_call(type_name("app", "runner"), vec![], crate::analysis::types::Ty::named("app", "runner")),
            method_member("app", "runner", "run"),
        );
        let unit = unit("app", vec![function("f", vec![spawn(target)])], types);
        let table = TypeTable::from_decls(&unit.types);
        assert_eq!(table.len(), 1);
        let (_, reports) = run(&unit, &MemoryFactStore::new());
        assert_eq!(reports.len(), 1);
    }
}
