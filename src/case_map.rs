use std::collections::BTreeMap;

/// Ordered string map with ASCII-case-insensitive keys.
///
/// The first spelling inserted for a key is the one handed back by
/// iteration, so directory listings keep the case the file was written
/// with while lookups accept any case. Iteration order is lexicographic
/// over the folded key, which keeps listings deterministic.
#[derive(Debug, Clone, Default)]
pub struct CaseInsensitiveMap<V> {
    entries: BTreeMap<String, (String, V)>,
}

impl<V> CaseInsensitiveMap<V> {
    pub fn new() -> Self {
        CaseInsensitiveMap {
            entries: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, key: &str, value: V) -> Option<V> {
        self.entries
            .insert(key.to_ascii_lowercase(), (key.to_string(), value))
            .map(|(_, old)| old)
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries
            .get(&key.to_ascii_lowercase())
            .map(|(_, value)| value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&key.to_ascii_lowercase())
    }

    /// Returns the value for `key`, inserting a default (under the given
    /// spelling) if it is not present yet.
    pub fn or_default(&mut self, key: &str) -> &mut V
    where
        V: Default,
    {
        &mut self
            .entries
            .entry(key.to_ascii_lowercase())
            .or_insert_with(|| (key.to_string(), V::default()))
            .1
    }

    /// Iterates `(original_key, value)` in folded-key lexicographic order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries
            .values()
            .map(|(original, value)| (original.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
