//! Broker identity canonicalisation.
//!
//! [`canonicalize`] is a pure function. [`NameCanonicalizer`] is the one
//! stateful component in the ledger: it remembers, per key, the display name
//! chosen on first sight and every raw spelling seen since. Results depend on
//! the order identities are registered in, so callers must register in input
//! order. Nothing here iterates a hash map.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Key given to identities with no letters or digits at all.
pub const UNKNOWN_KEY: &str = "unknown";

/// Display name used when the first spelling of [`UNKNOWN_KEY`] was blank.
const UNKNOWN_DISPLAY: &str = "Unknown";

// ── CanonicalKey ──────────────────────────────────────────────────────────────

/// Lower-cased identity with everything but letters and digits removed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_KEY
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Map a raw identity to its canonical key. Total: every input has a key.
///
/// # Examples
///
/// ```
/// use ledger_core::canonical::canonicalize;
///
/// assert_eq!(canonicalize("LinDuo ").as_str(), "linduo");
/// assert_eq!(canonicalize("Lin-Duo").as_str(), "linduo");
/// assert_eq!(canonicalize("").as_str(), "unknown");
/// ```
pub fn canonicalize(raw: &str) -> CanonicalKey {
    // Lowercasing can emit combining marks ('İ' -> "i\u{307}"), so filter after.
    let key: String = raw
        .chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric())
        .collect();

    if key.is_empty() {
        CanonicalKey(UNKNOWN_KEY.to_string())
    } else {
        CanonicalKey(key)
    }
}

// ── Output types ──────────────────────────────────────────────────────────────

/// The resolved identity for one raw spelling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalIdentity {
    pub key: CanonicalKey,
    pub display_name: String,
}

/// A key that has been recorded under more than one raw spelling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateCluster {
    pub key: CanonicalKey,
    pub display_name: String,
    /// Distinct raw spellings, in first-seen order.
    pub variants: Vec<String>,
}

// ── NameCanonicalizer ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct KeyEntry {
    display_name: String,
    variants: Vec<String>,
}

/// Accumulates raw identity spellings per canonical key.
///
/// Not synchronised. `register` mutates the table; wrap the canonicalizer in
/// a [`SharedCanonicalizer`] to register from several threads.
#[derive(Debug, Clone, Default)]
pub struct NameCanonicalizer {
    entries: BTreeMap<CanonicalKey, KeyEntry>,
    aliases: HashMap<CanonicalKey, String>,
}

impl NameCanonicalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a canonicalizer with an explicit alias table.
    ///
    /// Each pair maps a raw spelling to the display name it should report.
    /// The source spelling is canonicalised, so one alias covers every
    /// spelling of that key. The target's own key becomes the resolved key,
    /// which is how two different keys are deliberately merged.
    pub fn with_aliases<I, S, T>(aliases: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: AsRef<str>,
        T: Into<String>,
    {
        let aliases = aliases
            .into_iter()
            .map(|(from, to)| (canonicalize(from.as_ref()), to.into()))
            .collect();
        Self {
            entries: BTreeMap::new(),
            aliases,
        }
    }

    /// Record `raw` and return the identity it resolves to.
    ///
    /// The first spelling registered for a key becomes that key's display
    /// name, unless an alias overrides it.
    pub fn register(&mut self, raw: &str) -> CanonicalIdentity {
        let key = canonicalize(raw);

        let entry = self.entries.entry(key.clone()).or_insert_with(|| {
            debug!("New identity key \"{}\" from \"{}\"", key, raw);
            KeyEntry {
                display_name: initial_display_name(&key, raw),
                variants: Vec::new(),
            }
        });

        if !entry.variants.iter().any(|v| v == raw) {
            entry.variants.push(raw.to_string());
        }

        match self.aliases.get(&key) {
            Some(alias) => CanonicalIdentity {
                key: canonicalize(alias),
                display_name: alias.clone(),
            },
            None => CanonicalIdentity {
                key,
                display_name: entry.display_name.clone(),
            },
        }
    }

    /// Resolve `raw` against what has been registered so far, without
    /// recording it. `None` when its key has never been registered.
    pub fn lookup(&self, raw: &str) -> Option<CanonicalIdentity> {
        let key = canonicalize(raw);
        let entry = self.entries.get(&key)?;
        Some(match self.aliases.get(&key) {
            Some(alias) => CanonicalIdentity {
                key: canonicalize(alias),
                display_name: alias.clone(),
            },
            None => CanonicalIdentity {
                key,
                display_name: entry.display_name.clone(),
            },
        })
    }

    /// Every key with more than one distinct raw spelling, ascending by key.
    ///
    /// This is an audit report. It never renames anything.
    pub fn find_duplicate_clusters(&self) -> Vec<DuplicateCluster> {
        self.entries
            .iter()
            .filter(|(_, e)| e.variants.len() > 1)
            .map(|(key, e)| DuplicateCluster {
                key: key.clone(),
                display_name: e.display_name.clone(),
                variants: e.variants.clone(),
            })
            .collect()
    }

    pub fn display_name(&self, key: &CanonicalKey) -> Option<&str> {
        self.entries.get(key).map(|e| e.display_name.as_str())
    }

    pub fn variants(&self, key: &CanonicalKey) -> Option<&[String]> {
        self.entries.get(key).map(|e| e.variants.as_slice())
    }

    /// Number of distinct keys registered.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget every registered spelling. The alias table is kept.
    pub fn reset(&mut self) {
        self.entries.clear();
    }
}

fn initial_display_name(key: &CanonicalKey, raw: &str) -> String {
    if key.is_unknown() && !raw.chars().any(char::is_alphanumeric) {
        UNKNOWN_DISPLAY.to_string()
    } else {
        raw.to_string()
    }
}

// ── SharedCanonicalizer ───────────────────────────────────────────────────────

/// A [`NameCanonicalizer`] behind a mutex.
///
/// Each call takes the lock for its own duration only. The guard is dropped
/// on every return path.
#[derive(Debug, Clone, Default)]
pub struct SharedCanonicalizer {
    inner: Arc<Mutex<NameCanonicalizer>>,
}

impl SharedCanonicalizer {
    pub fn new(canonicalizer: NameCanonicalizer) -> Self {
        Self {
            inner: Arc::new(Mutex::new(canonicalizer)),
        }
    }

    pub fn register(&self, raw: &str) -> CanonicalIdentity {
        self.inner.lock().register(raw)
    }

    pub fn lookup(&self, raw: &str) -> Option<CanonicalIdentity> {
        self.inner.lock().lookup(raw)
    }

    pub fn find_duplicate_clusters(&self) -> Vec<DuplicateCluster> {
        self.inner.lock().find_duplicate_clusters()
    }

    pub fn reset(&self) {
        self.inner.lock().reset();
    }

    /// A point-in-time copy of the table.
    pub fn snapshot(&self) -> NameCanonicalizer {
        self.inner.lock().clone()
    }
}
