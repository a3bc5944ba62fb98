//! Annotation pass: commit a safety fact for every guarded declaration.
//!
//! Runs over a whole unit before validation so that spawns may refer to
//! callables declared later in the same unit.

use crate::analysis::ast::{DeclSite, Unit};
use crate::analysis::facts::{CallableId, FactStore, SafetyFact};
use crate::analysis::guard::GuardDetector;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationSummary {
    /// Declarations with a body that were inspected
    pub examined: usize,
    /// Identities that received a fact, in declaration order
    pub annotated: Vec<CallableId>,
}

pub fn annotate_unit(unit: &Unit, detector: &GuardDetector, facts: &mut dyn FactStore) -> AnnotationSummary {
    let mut summary = AnnotationSummary::default();

    for (file, decl) in unit.callables() {
        let Some(body) = &decl.body else {
            continue;
        };
        summary.examined += 1;

        let Some(guard_span) = detector.find_guard(body) else {
            continue;
        };
        let id = CallableId::canonical(&DeclSite::of_callable(&unit.module, decl));
        debug!(callable = %id, file = %file.path, line = guard_span.line, "committing safety fact");
        facts.export_fact(id.clone(), SafetyFact::GuaranteedSafe);
        summary.annotated.push(id);
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::facts::MemoryFactStore;
    use crate::testing::*;

    #[test]
    fn guarded_declarations_get_facts() {
        let unit = unit(
            "app",
            vec![
                function("guarded", vec![guard(), risky()]),
                function("unguarded", vec![risky()]),
                method("worker", "safe", vec![guard()]),
                method("worker", "unsafe", vec![risky()]),
            ],
            vec![],
        );
        let mut store = MemoryFactStore::new();
        let summary = annotate_unit(&unit, &GuardDetector::default(), &mut store);

        assert_eq!(summary.examined, 4);
        assert_eq!(
            summary.annotated,
            vec![
                CallableId::canonical(&DeclSite::function("app", "guarded")),
                CallableId::canonical(&DeclSite::method("app", "worker", "safe")),
            ]
        );
        assert_eq!(store.len(), 2);
        assert!(!store.is_safe(&CallableId::canonical(&DeclSite::function("app", "unguarded"))));
    }

    #[test]
    fn generic_declarations_use_origin_identity() {
        let mut generic_method = method("pair[T, S]", "safe", vec![guard()]);
        if let Some(recv) = generic_method.receiver.as_mut() {
            recv.type_params = vec!["T".into(), "S".into()];
        }
        let unit = unit(
            "app",
            vec![generic_function("spawnable", &["T"], vec![guard()]), generic_method],
            vec![],
        );
        let mut store = MemoryFactStore::new();
        annotate_unit(&unit, &GuardDetector::default(), &mut store);

        assert!(store.is_safe(&CallableId::canonical(&DeclSite::function("app", "spawnable"))));
        assert!(store.is_safe(&CallableId::canonical(&DeclSite::method("app", "pair", "safe"))));
    }

    #[test]
    fn bodiless_declarations_are_skipped() {
        let mut external = function("asm_entry", vec![]);
        external.body = None;
        let unit = unit("app", vec![external], vec![]);
        let mut store = MemoryFactStore::new();
        let summary = annotate_unit(&unit, &GuardDetector::default(), &mut store);
        assert_eq!(summary.examined, 0);
        assert!(store.is_empty());
    }

    #[test]
    fn calls_to_safe_callables_do_not_make_a_body_safe() {
        let unit = unit(
            "app",
            vec![
                function("guarded", vec![guard()]),
                function("only_safe_calls", vec![
                    expr_stmt(crate::analysis::ast::Expr::Call(call(func_ref("app", "guarded"), vec![]))),
                    expr_stmt(crate::analysis::ast::Expr::Call(call(func_ref("app", "guarded"), vec![]))),
                ]),
            ],
            vec![],
        );
        let mut store = MemoryFactStore::new();
        annotate_unit(&unit, &GuardDetector::default(), &mut store);
        assert!(!store.is_safe(&CallableId::canonical(&DeclSite::function("app", "only_safe_calls"))));
    }
}
