/// Keyed accumulator where the first value offered for a key is kept and every
/// later offer for the same key is ignored. Entries iterate in first-insertion order.
///
/// Used for both lifting the agent identity to document level and collapsing
/// bilingual `dataCollectFromUser` keys.
#[derive(Debug, Clone)]
pub struct FirstWriteWins<K, V> {
    entries: Vec<(K, V)>,
}

impl<K: PartialEq, V> FirstWriteWins<K, V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Offers `value` under `key`. Returns `true` if it was stored, `false` if the
    /// key already held a value.
    pub fn offer(&mut self, key: K, value: V) -> bool {
        if self.contains(&key) {
            return false;
        }
        self.entries.push((key, value));
        true
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn into_entries(self) -> impl Iterator<Item = (K, V)> {
        self.entries.into_iter()
    }
}

impl<K: PartialEq, V> Default for FirstWriteWins<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
