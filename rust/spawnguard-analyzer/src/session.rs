//! Analysis sessions: run annotation then validation over units, in import
//! order, sharing one fact store.

use crate::analysis::annotate::annotate_unit;
use crate::analysis::ast::Unit;
use crate::analysis::facts::{CallableId, FactArchive, FactError, FactStore, MemoryFactStore};
use crate::analysis::guard::GuardDetector;
use crate::analysis::resolve::CallableResolver;
use crate::analysis::validate::{validate_unit, SpawnReport};
use crate::{AnalysisError, AnalyzerOptions};

use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info, warn};

/// Result of analysing one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitReport {
    pub module: String,
    /// Declarations with a body
    pub examined: usize,
    /// Callables that received a safety fact
    pub annotated: Vec<CallableId>,
    pub spawns: usize,
    /// Flagged spawns, in source order per file
    pub findings: Vec<SpawnReport>,
}

impl UnitReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Outcome for one unit of a batch, reported in analysis order.
#[derive(Debug)]
pub struct UnitOutcome {
    /// Position of the unit in the slice given to [`Session::analyze_all`]
    pub index: usize,
    pub module: String,
    pub result: Result<UnitReport, AnalysisError>,
}

pub struct Session<S: FactStore = MemoryFactStore> {
    options: AnalyzerOptions,
    detector: GuardDetector,
    facts: S,
}

impl Session<MemoryFactStore> {
    pub fn new(options: AnalyzerOptions) -> Self {
        Self::with_store(options, MemoryFactStore::new())
    }

    /// Snapshot of the facts held for `module`.
    pub fn export_archive(&self, module: &str) -> FactArchive {
        FactArchive::collect(module, &self.facts)
    }
}

impl<S: FactStore> Session<S> {
    pub fn with_store(options: AnalyzerOptions, facts: S) -> Self {
        let detector = GuardDetector::new(options.fault_capture.clone());
        Self { options, detector, facts }
    }

    pub fn options(&self) -> &AnalyzerOptions {
        &self.options
    }

    pub fn facts(&self) -> &S {
        &self.facts
    }

    pub fn into_facts(self) -> S {
        self.facts
    }

    /// Load the facts of a previously analysed module.
    pub fn import_archive(&mut self, archive: &FactArchive) -> Result<usize, AnalysisError> {
        let loaded = archive
            .load_into(&mut self.facts)
            .map_err(|source| AnalysisError::FactImport { module: archive.module.clone(), source })?;
        debug!(module = %archive.module, loaded, "imported fact archive");
        Ok(loaded)
    }

    /// Annotate every declaration of `unit`, then validate its spawns.
    pub fn analyze_unit(&mut self, unit: &Unit) -> UnitReport {
        let annotation = annotate_unit(unit, &self.detector, &mut self.facts);

        let types = unit.type_table();
        let resolver = CallableResolver::new(&self.detector, &self.facts, &types);
        let mut findings: Vec<SpawnReport> = Vec::new();
        let validation = validate_unit(unit, &resolver, &mut findings);

        info!(
            module = %unit.module,
            examined = annotation.examined,
            annotated = annotation.annotated.len(),
            spawns = validation.spawns,
            flagged = validation.flagged,
            "analysed unit"
        );

        UnitReport {
            module: unit.module.clone(),
            examined: annotation.examined,
            annotated: annotation.annotated,
            spawns: validation.spawns,
            findings,
        }
    }

    /// Analyse a batch in dependency order.
    ///
    /// Imports that are not part of the batch are requested from `load` once
    /// each; `Ok(None)` means no facts exist for that module. A unit whose
    /// import fails is reported as failed and skipped, the rest continue.
    pub fn analyze_all<F>(&mut self, units: &[Unit], mut load: F) -> Result<Vec<UnitOutcome>, AnalysisError>
    where
        F: FnMut(&str) -> Result<Option<FactArchive>, FactError>,
    {
        let order = dependency_order(units)?;
        let batch: HashSet<&str> = units.iter().map(|u| u.module.as_str()).collect();
        let mut loaded: HashSet<String> = HashSet::new();
        let mut outcomes = Vec::with_capacity(units.len());

        for index in order {
            let unit = &units[index];
            let result = self
                .import_dependencies(unit, &batch, &mut loaded, &mut load)
                .map(|()| self.analyze_unit(unit));
            if let Err(ref err) = result {
                warn!(module = %unit.module, error = %err, "skipping unit");
            }
            outcomes.push(UnitOutcome { index, module: unit.module.clone(), result });
        }

        Ok(outcomes)
    }

    fn import_dependencies<F>(
        &mut self,
        unit: &Unit,
        batch: &HashSet<&str>,
        loaded: &mut HashSet<String>,
        load: &mut F,
    ) -> Result<(), AnalysisError>
    where
        F: FnMut(&str) -> Result<Option<FactArchive>, FactError>,
    {
        for import in &unit.imports {
            if batch.contains(import.as_str()) || loaded.contains(import) {
                continue;
            }
            let archive = load(import)
                .map_err(|source| AnalysisError::FactImport { module: import.clone(), source })?;
            match archive {
                Some(archive) if archive.module != *import => {
                    return Err(AnalysisError::FactImport {
                        module: import.clone(),
                        source: FactError::ModuleMismatch {
                            expected: import.clone(),
                            found: archive.module.clone(),
                        },
                    });
                }
                Some(archive) => {
                    self.import_archive(&archive)?;
                }
                None => debug!(module = %import, "no facts recorded for import"),
            }
            loaded.insert(import.clone());
        }
        Ok(())
    }
}

// ── Ordering ────────────────────────────────────────────────────────

/// Indices of `units` with every unit after the units it imports.
///
/// Kahn's algorithm; among units that are ready at the same time the
/// lexicographically smallest module goes first. Imports of modules outside
/// the batch are ignored.
pub fn dependency_order(units: &[Unit]) -> Result<Vec<usize>, AnalysisError> {
    let mut by_module: HashMap<&str, usize> = HashMap::new();
    for (idx, unit) in units.iter().enumerate() {
        if by_module.insert(unit.module.as_str(), idx).is_some() {
            return Err(AnalysisError::DuplicateUnit(unit.module.clone()));
        }
    }

    let mut in_degree = vec![0usize; units.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); units.len()];
    for (idx, unit) in units.iter().enumerate() {
        let deps: BTreeSet<usize> = unit
            .imports
            .iter()
            .filter_map(|m| by_module.get(m.as_str()).copied())
            .collect();
        for dep in deps {
            in_degree[idx] += 1;
            dependents[dep].push(idx);
        }
    }

    let mut ready: BTreeSet<(&str, usize)> = units
        .iter()
        .enumerate()
        .filter(|(idx, _)| in_degree[*idx] == 0)
        .map(|(idx, u)| (u.module.as_str(), idx))
        .collect();

    let mut order = Vec::with_capacity(units.len());
    while let Some((_, idx)) = ready.pop_first() {
        order.push(idx);
        for &dependent in &dependents[idx] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.insert((units[dependent].module.as_str(), dependent));
            }
        }
    }

    if order.len() != units.len() {
        let mut stuck: Vec<String> = units
            .iter()
            .enumerate()
            .filter(|(idx, _)| in_degree[*idx] > 0)
            .map(|(_, u)| u.module.clone())
            .collect();
        stuck.sort();
        return Err(AnalysisError::ImportCycle(stuck));
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ast::DeclSite;
    use crate::testing::*;

    fn with_imports(mut u: Unit, imports: &[&str]) -> Unit {
        u.imports = imports.iter().map(|s| s.to_string()).collect();
        u
    }

    fn empty(module: &str, imports: &[&str]) -> Unit {
        with_imports(Unit::new(module), imports)
    }

    fn modules(units: &[Unit], order: &[usize]) -> Vec<String> {
        order.iter().map(|&i| units[i].module.clone()).collect()
    }

    #[test]
    fn order_puts_imports_first() {
        let units = vec![empty("app", &["lib", "fmt"]), empty("lib", &["util"]), empty("util", &[])];
        let order = dependency_order(&units).unwrap();
        assert_eq!(modules(&units, &order), vec!["util", "lib", "app"]);
    }

    #[test]
    fn order_breaks_ties_lexicographically() {
        let units = vec![empty("zeta", &[]), empty("alpha", &[]), empty("mid", &["zeta", "alpha"])];
        let order = dependency_order(&units).unwrap();
        assert_eq!(modules(&units, &order), vec!["alpha", "zeta", "mid"]);
    }

    #[test]
    fn order_rejects_cycles() {
        let units = vec![empty("a", &["b"]), empty("b", &["a"]), empty("c", &[])];
        match dependency_order(&units) {
            Err(AnalysisError::ImportCycle(members)) => assert_eq!(members, vec!["a", "b"]),
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn order_rejects_duplicate_modules() {
        let units = vec![empty("a", &[]), empty("a", &[])];
        assert!(matches!(dependency_order(&units), Err(AnalysisError::DuplicateUnit(m)) if m == "a"));
    }

    #[test]
    fn facts_flow_to_later_units() {
        let lib = unit("lib", vec![function("serve", vec![guard(), risky()])], vec![]);
        let app = with_imports(
            unit("app", vec![function("main", vec![spawn(func_ref("lib", "serve"))])], vec![]),
            &["lib"],
        );
        // app listed first; ordering must still analyse lib before it
        let units = vec![app, lib];
        let mut session = Session::new(AnalyzerOptions::default());
        let outcomes = session.analyze_all(&units, |_| Ok(None)).unwrap();

        assert_eq!(outcomes.iter().map(|o| o.module.as_str()).collect::<Vec<_>>(), vec!["lib", "app"]);
        let app_report = outcomes[1].result.as_ref().unwrap();
        assert!(app_report.is_clean());
        assert_eq!(app_report.spawns, 1);
    }

    #[test]
    fn archives_round_trip_between_sessions() {
        let lib = unit("lib", vec![function("serve", vec![guard()])], vec![]);
        let mut first = Session::new(AnalyzerOptions::default());
        first.analyze_unit(&lib);
        let json = first.export_archive("lib").to_json().unwrap();

        let app = with_imports(
            unit("app", vec![function("main", vec![spawn(func_ref("lib", "serve"))])], vec![]),
            &["lib"],
        );
        let mut second = Session::new(AnalyzerOptions::default());
        let mut requested = Vec::new();
        let outcomes = second
            .analyze_all(std::slice::from_ref(&app), |module| {
                requested.push(module.to_string());
                FactArchive::from_json(&json).map(Some)
            })
            .unwrap();

        assert_eq!(requested, vec!["lib"]);
        assert!(outcomes[0].result.as_ref().unwrap().is_clean());
        assert!(second.facts().is_safe(&CallableId::canonical(&DeclSite::function("lib", "serve"))));
    }

    #[test]
    fn failed_import_skips_only_that_unit() {
        let broken = with_imports(
            unit("broken", vec![function("main", vec![spawn(func_lit(vec![risky()]))])], vec![]),
            &["vendor"],
        );
        let fine = unit("fine", vec![function("main", vec![spawn(func_lit(vec![risky()]))])], vec![]);
        let units = vec![broken, fine];

        let mut session = Session::new(AnalyzerOptions::default());
        let outcomes = session
            .analyze_all(&units, |_| {
                let archive = FactArchive {
                    format: crate::analysis::facts::ARCHIVE_FORMAT,
                    module: "vendor".into(),
                    entries: vec![crate::analysis::facts::FactEntry {
                        callable: CallableId::canonical(&DeclSite::function("vendor", "run")),
                        fact: "isSafe".into(),
                    }],
                };
                Ok(Some(archive))
            })
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        let broken = outcomes.iter().find(|o| o.module == "broken").unwrap();
        assert!(matches!(
            broken.result,
            Err(AnalysisError::FactImport { ref module, source: FactError::Format { .. } }) if module == "vendor"
        ));
        let fine = outcomes.iter().find(|o| o.module == "fine").unwrap();
        assert_eq!(fine.result.as_ref().unwrap().findings.len(), 1);
    }

    #[test]
    fn archive_for_wrong_module_is_rejected() {
        let app = with_imports(Unit::new("app"), &["lib"]);
        let mut session = Session::new(AnalyzerOptions::default());
        let outcomes = session
            .analyze_all(std::slice::from_ref(&app), |_| {
                Ok(Some(FactArchive::collect("other", &MemoryFactStore::new())))
            })
            .unwrap();
        assert!(matches!(
            outcomes[0].result,
            Err(AnalysisError::FactImport { source: FactError::ModuleMismatch { .. }, .. })
        ));
    }

    #[test]
    fn archived_variable_fact_never_marks_a_spawn_safe() {
        use crate::analysis::ast::{Binding, Expr, SymbolRef};
        use crate::analysis::facts::{FactEntry, ARCHIVE_FORMAT};

        let handler = Expr::Ident(ident(
            "Handler",
            Some(Binding::Variable {
                symbol: SymbolRef { site: DeclSite::variable("lib", None, "Handler"), type_args: Vec::new() },
            }),
        ));
        let app = with_imports(unit("app", vec![function("main", vec![spawn(handler)])], vec![]), &["lib"]);

        let mut session = Session::new(AnalyzerOptions::default());
        let outcomes = session
            .analyze_all(std::slice::from_ref(&app), |_| {
                Ok(Some(FactArchive {
                    format: ARCHIVE_FORMAT,
                    module: "lib".into(),
                    entries: vec![FactEntry {
                        callable: CallableId::canonical(&DeclSite::variable("lib", None, "Handler")),
                        fact: "GuaranteedSafe".into(),
                    }],
                }))
            })
            .unwrap();
        assert!(matches!(
            outcomes[0].result,
            Err(AnalysisError::FactImport { source: FactError::NotCallable { .. }, .. })
        ));
        assert!(session.facts().is_empty());

        // without the rejected archive the spawn is still flagged
        let report = session.analyze_unit(&app);
        assert_eq!(report.findings.len(), 1);
    }

    #[test]
    fn session_with_custom_store() {
        #[derive(Default)]
        struct Counting {
            inner: MemoryFactStore,
            writes: usize,
        }
        impl FactStore for Counting {
            fn export_fact(&mut self, id: CallableId, fact: crate::analysis::facts::SafetyFact) {
                self.writes += 1;
                self.inner.export_fact(id, fact);
            }
            fn import_fact(&self, id: &CallableId) -> Option<crate::analysis::facts::SafetyFact> {
                self.inner.import_fact(id)
            }
        }

        let u = unit("app", vec![function("a", vec![guard()]), function("b", vec![guard()])], vec![]);
        let mut session = Session::with_store(AnalyzerOptions::default(), Counting::default());
        let report = session.analyze_unit(&u);
        assert_eq!(report.annotated.len(), 2);
        assert_eq!(session.into_facts().writes, 2);
    }
}
