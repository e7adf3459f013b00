//! The flat configuration namespace shared by all resources.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Separator joining nested key segments, e.g. `database__pool__size`.
pub const KEY_SEPARATOR: &str = "__";

/// Kind of resource that contributed to a flat map
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConfigOrigin {
    JsonFile,
    TomlFile,
    EnvFile,
    SystemEnv,
    Custom,
}

/// A contributing source with provenance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceRecord {
    /// Origin of this source
    pub origin: ConfigOrigin,

    /// File path (None for the process environment)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of raw file bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,

    /// Number of distinct keys written by this source
    pub keys: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FlatEntry {
    value: String,
    seq: u64,
    origin: Option<Arc<str>>,
}

/// Flattened key/value namespace built by replaying resources in order.
///
/// Entries written by case-insensitive resources are kept apart from exact
/// entries, under their lower-cased key, and match lookups in any case. When
/// an exact and a folded entry both match a lookup the most recent write wins.
#[derive(Debug, Clone, Default)]
pub struct FlatMap {
    exact: BTreeMap<String, FlatEntry>,
    folded: BTreeMap<String, FlatEntry>,
    writes: u64,
    current_origin: Option<Arc<str>>,
    sources: Vec<SourceRecord>,
}

impl FlatMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a case-sensitive entry.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.write(key.into(), value.into(), false);
    }

    /// Insert an entry whose key is lower-cased and matched case-insensitively.
    pub fn insert_folded(&mut self, key: &str, value: impl Into<String>) {
        self.write(key.to_lowercase(), value.into(), true);
    }

    /// Insert honoring a resource's case option.
    pub fn insert_with_case(&mut self, key: &str, value: impl Into<String>, case_insensitive: bool) {
        if case_insensitive {
            self.insert_folded(key, value);
        } else {
            self.insert(key, value);
        }
    }

    fn write(&mut self, key: String, value: String, folded: bool) {
        self.writes += 1;
        let entry = FlatEntry {
            value,
            seq: self.writes,
            origin: self.current_origin.clone(),
        };
        if folded {
            self.folded.insert(key, entry);
        } else {
            self.exact.insert(key, entry);
        }
    }

    fn lookup(&self, key: &str) -> Option<&FlatEntry> {
        latest(self.exact.get(key), self.folded.get(&key.to_lowercase()))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.lookup(key).map(|entry| entry.value.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Description of the resource that wrote the value visible under `key`.
    pub fn origin_of(&self, key: &str) -> Option<&str> {
        self.lookup(key).and_then(|entry| entry.origin.as_deref())
    }

    /// Remainders of every key under `prefix`, paired with their values.
    ///
    /// Folded entries are compared against the lower-cased prefix.
    pub fn entries_under<'m>(&'m self, prefix: &str) -> Vec<(&'m str, &'m str)> {
        let lowered = prefix.to_lowercase();
        let exact = self
            .exact
            .iter()
            .filter_map(|(key, entry)| Some((key.strip_prefix(prefix)?, entry)));
        let folded = self
            .folded
            .iter()
            .filter_map(|(key, entry)| Some((key.strip_prefix(lowered.as_str())?, entry)));

        merge_latest(exact.chain(folded))
            .into_iter()
            .map(|(rest, entry)| (rest, entry.value.as_str()))
            .collect()
    }

    /// Visible entries in key order. A key written both exactly and folded
    /// shows its latest value.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        let all = self
            .exact
            .iter()
            .chain(self.folded.iter())
            .map(|(key, entry)| (key.as_str(), entry));

        merge_latest(all)
            .into_iter()
            .map(|(key, entry)| (key, entry.value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.folded.is_empty()
    }

    /// Total number of writes so far, overwrites included.
    pub fn write_count(&self) -> u64 {
        self.writes
    }

    /// Tag subsequent writes with the given resource description.
    pub fn set_origin(&mut self, origin: Option<&str>) {
        self.current_origin = origin.map(Arc::from);
    }

    pub fn record_source(&mut self, record: SourceRecord) {
        self.sources.push(record);
    }

    pub fn sources(&self) -> &[SourceRecord] {
        &self.sources
    }

    /// Plain key/value copy of the namespace.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FlatMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = FlatMap::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

fn latest<'m>(a: Option<&'m FlatEntry>, b: Option<&'m FlatEntry>) -> Option<&'m FlatEntry> {
    match (a, b) {
        (Some(a), Some(b)) => Some(if a.seq >= b.seq { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn merge_latest<'m>(
    entries: impl Iterator<Item = (&'m str, &'m FlatEntry)>,
) -> BTreeMap<&'m str, &'m FlatEntry> {
    let mut merged: BTreeMap<&str, &FlatEntry> = BTreeMap::new();
    for (key, entry) in entries {
        let slot = merged.entry(key).or_insert(entry);
        if entry.seq > slot.seq {
            *slot = entry;
        }
    }
    merged
}

/// Join key segments with [`KEY_SEPARATOR`].
pub fn join_key(segments: &[&str]) -> String {
    segments.join(KEY_SEPARATOR)
}
