//! A dictionary that can hold multiple values per key.
//!
//! Submitted form data repeats keys for multi-valued fields (for example a
//! many-to-many selection), so each key maps to a list of values.

/// An insertion-ordered dictionary that maps keys to lists of values.
///
/// [`get`](MultiValueDict::get) returns the **last** value for a key, while
/// [`get_list`](MultiValueDict::get_list) returns all values. Keys iterate in
/// the order they were first inserted.
///
/// # Examples
///
/// ```
/// use stapler_core::utils::MultiValueDict;
///
/// let mut d = MultiValueDict::new();
/// d.append("country".to_string(), "1");
/// d.append("country".to_string(), "2");
///
/// assert_eq!(d.get(&"country".to_string()), Some(&"2"));
/// assert_eq!(d.get_list(&"country".to_string()), Some(&vec!["1", "2"]));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiValueDict<K: PartialEq, V> {
    entries: Vec<(K, Vec<V>)>,
}

impl<K: PartialEq, V> Default for MultiValueDict<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: PartialEq, V> MultiValueDict<K, V> {
    /// Creates an empty `MultiValueDict`.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn position(&self, key: &K) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }

    /// Returns a reference to the **last** value associated with the key.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.get_list(key).and_then(|v| v.last())
    }

    /// Returns a reference to all values associated with the key.
    pub fn get_list(&self, key: &K) -> Option<&Vec<V>> {
        self.position(key).map(|i| &self.entries[i].1)
    }

    /// Sets the value for a key, replacing any existing values.
    pub fn set(&mut self, key: K, value: V) {
        match self.position(&key) {
            Some(i) => self.entries[i].1 = vec![value],
            None => self.entries.push((key, vec![value])),
        }
    }

    /// Appends a value to the list for the given key.
    pub fn append(&mut self, key: K, value: V) {
        match self.position(&key) {
            Some(i) => self.entries[i].1.push(value),
            None => self.entries.push((key, vec![value])),
        }
    }

    /// Removes a key and returns its values.
    pub fn remove(&mut self, key: &K) -> Option<Vec<V>> {
        self.position(key).map(|i| self.entries.remove(i).1)
    }

    /// Returns an iterator over the keys, in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(k, _)| k)
    }

    /// Returns the number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the dictionary contains no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if the dictionary contains the specified key.
    pub fn contains_key(&self, key: &K) -> bool {
        self.position(key).is_some()
    }

    /// Returns an iterator over `(key, value-list)` pairs, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &Vec<V>)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }
}

impl<K: PartialEq, V> IntoIterator for MultiValueDict<K, V> {
    type Item = (K, Vec<V>);
    type IntoIter = std::vec::IntoIter<(K, Vec<V>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
