//! Safety facts: per-callable "guaranteed safe" markers shared across units.
//!
//! A fact is only ever recorded for a callable whose body installs a guard.
//! Absence of a fact means the callable is unsafe; no negative facts exist.
//!
//! Facts survive between separate invocations through [`FactArchive`], a JSON
//! document holding one opaque token per callable of a single module.

use crate::analysis::ast::{DeclSite, SymbolKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Current archive layout version.
pub const ARCHIVE_FORMAT: u32 = 1;

// ── Identity ────────────────────────────────────────────────────────

/// Canonical, instantiation-independent identity of a declared symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallableId {
    pub module: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub name: String,
    pub kind: SymbolKind,
}

impl CallableId {
    /// Canonicalize a declaration site. Type arguments never reach the key and
    /// an owner written as an instantiation (`*Pair[int, string]`) collapses to
    /// its origin name (`Pair`).
    pub fn canonical(site: &DeclSite) -> Self {
        Self {
            module: site.module.clone(),
            owner: site.owner.as_deref().map(origin_name),
            name: site.name.clone(),
            kind: site.kind,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.kind, SymbolKind::Function | SymbolKind::Method)
    }
}

impl fmt::Display for CallableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.owner {
            Some(owner) => write!(f, "{}.{}.{}", self.module, owner, self.name),
            None => write!(f, "{}.{}", self.module, self.name),
        }
    }
}

fn origin_name(owner: &str) -> String {
    let bare = owner.trim().trim_start_matches('*').trim_start();
    let origin = match bare.find('[') {
        Some(idx) => &bare[..idx],
        None => bare,
    };
    origin.trim_end().to_string()
}

// ── Facts ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SafetyFact {
    /// The callable installs a guard before any fault can escape it.
    GuaranteedSafe,
}

impl SafetyFact {
    pub const TOKEN: &'static [u8] = b"GuaranteedSafe";

    pub fn encode(&self) -> Vec<u8> {
        match self {
            SafetyFact::GuaranteedSafe => Self::TOKEN.to_vec(),
        }
    }

    /// Decode a persisted token. Anything but the exact marker is rejected.
    pub fn decode(data: &[u8]) -> Result<Self, FactError> {
        if data == Self::TOKEN {
            Ok(SafetyFact::GuaranteedSafe)
        } else {
            Err(FactError::Format {
                found: String::from_utf8_lossy(data).into_owned(),
            })
        }
    }
}

impl fmt::Display for SafetyFact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.encode()))
    }
}

#[derive(Debug, Error)]
pub enum FactError {
    #[error("invalid safety fact token {found:?}")]
    Format { found: String },
    #[error("unsupported fact archive format {found} (expected {expected})")]
    Version { found: u32, expected: u32 },
    #[error("fact archive for module '{module}' contains foreign entry '{callable}'")]
    ForeignEntry { module: String, callable: String },
    #[error("fact archive entry '{callable}' does not name a function or method")]
    NotCallable { callable: String },
    #[error("fact archive describes module '{found}', expected '{expected}'")]
    ModuleMismatch { expected: String, found: String },
    #[error("fact archive is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cannot read fact archive: {0}")]
    Io(#[from] std::io::Error),
}

// ── Store ───────────────────────────────────────────────────────────

/// Key/value table of safety facts passed between unit-processing calls.
pub trait FactStore {
    /// Record a positive fact. Re-exporting an existing fact is a no-op.
    fn export_fact(&mut self, id: CallableId, fact: SafetyFact);

    fn import_fact(&self, id: &CallableId) -> Option<SafetyFact>;

    fn is_safe(&self, id: &CallableId) -> bool {
        matches!(self.import_fact(id), Some(SafetyFact::GuaranteedSafe))
    }
}

/// Ordered in-memory fact store.
#[derive(Debug, Clone, Default)]
pub struct MemoryFactStore {
    facts: BTreeMap<CallableId, SafetyFact>,
}

impl MemoryFactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CallableId, &SafetyFact)> {
        self.facts.iter()
    }

    /// Whether any fact belongs to `module`.
    pub fn has_module(&self, module: &str) -> bool {
        self.facts.keys().any(|id| id.module == module)
    }
}

impl FactStore for MemoryFactStore {
    fn export_fact(&mut self, id: CallableId, fact: SafetyFact) {
        self.facts.entry(id).or_insert(fact);
    }

    fn import_fact(&self, id: &CallableId) -> Option<SafetyFact> {
        self.facts.get(id).copied()
    }
}

// ── Persistence ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactEntry {
    pub callable: CallableId,
    pub fact: String,
}

/// Serialized facts of one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactArchive {
    pub format: u32,
    pub module: String,
    #[serde(default)]
    pub entries: Vec<FactEntry>,
}

impl FactArchive {
    /// Snapshot every fact the store holds for `module`.
    pub fn collect(module: &str, store: &MemoryFactStore) -> Self {
        let entries = store
            .iter()
            .filter(|(id, _)| id.module == module)
            .map(|(id, fact)| FactEntry {
                callable: id.clone(),
                fact: fact.to_string(),
            })
            .collect();
        Self { format: ARCHIVE_FORMAT, module: module.to_string(), entries }
    }

    pub fn to_json(&self) -> Result<String, FactError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, FactError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Decode every entry. Fails on the first malformed one so that a
    /// partially trusted archive never reaches a store.
    pub fn decode(&self) -> Result<Vec<(CallableId, SafetyFact)>, FactError> {
        if self.format != ARCHIVE_FORMAT {
            return Err(FactError::Version { found: self.format, expected: ARCHIVE_FORMAT });
        }
        self.entries
            .iter()
            .map(|entry| {
                if entry.callable.module != self.module {
                    return Err(FactError::ForeignEntry {
                        module: self.module.clone(),
                        callable: entry.callable.to_string(),
                    });
                }
                if !entry.callable.is_callable() {
                    return Err(FactError::NotCallable { callable: entry.callable.to_string() });
                }
                let fact = SafetyFact::decode(entry.fact.as_bytes())?;
                Ok((entry.callable.clone(), fact))
            })
            .collect()
    }

    /// Decode and commit into `store`, returning the number of facts loaded.
    pub fn load_into(&self, store: &mut dyn FactStore) -> Result<usize, FactError> {
        let decoded = self.decode()?;
        let count = decoded.len();
        for (id, fact) in decoded {
            store.export_fact(id, fact);
        }
        Ok(count)
    }
}
