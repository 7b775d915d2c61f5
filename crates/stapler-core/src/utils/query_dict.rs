//! Submitted form data.
//!
//! [`QueryDict`] wraps [`MultiValueDict`] to provide an immutable-by-default
//! dictionary for urlencoded form submissions.

use super::MultiValueDict;
use crate::error::{StaplerError, StaplerResult};

/// An immutable-by-default dictionary for query string and form data.
///
/// The [`copy`](QueryDict::copy) method returns a mutable clone.
///
/// # Examples
///
/// ```
/// use stapler_core::QueryDict;
///
/// let qd = QueryDict::parse("bike__name=Propel&bike__price=300");
/// assert_eq!(qd.get("bike__name"), Some("Propel"));
///
/// let bike = qd.remap_keys(|k| k.strip_prefix("bike__").map(String::from));
/// assert_eq!(bike.get("price"), Some("300"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct QueryDict {
    data: MultiValueDict<String, String>,
    mutable: bool,
}

impl QueryDict {
    /// Creates a new, empty, immutable `QueryDict`.
    pub const fn new() -> Self {
        Self {
            data: MultiValueDict::new(),
            mutable: false,
        }
    }

    /// Creates a new, empty, mutable `QueryDict`.
    pub const fn new_mutable() -> Self {
        Self {
            data: MultiValueDict::new(),
            mutable: true,
        }
    }

    /// Builds an immutable `QueryDict` from `(key, value)` pairs.
    ///
    /// Repeated keys accumulate values, as in a form submission.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut data = MultiValueDict::new();
        for (k, v) in pairs {
            data.append(k.into(), v.into());
        }
        Self {
            data,
            mutable: false,
        }
    }

    /// Parses a urlencoded string (e.g., `"key1=val1&key2=val2"`) into an immutable `QueryDict`.
    ///
    /// Handles percent-encoding and supports multiple values per key.
    pub fn parse(query_string: &str) -> Self {
        let mut data = MultiValueDict::new();

        for pair in query_string.split('&') {
            if pair.is_empty() {
                continue;
            }

            let (key, value) = pair
                .find('=')
                .map_or((pair, ""), |eq_pos| (&pair[..eq_pos], &pair[eq_pos + 1..]));

            data.append(percent_decode(key), percent_decode(value));
        }

        Self {
            data,
            mutable: false,
        }
    }

    /// Returns the last value for the given key, or `None` if not present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(&key.to_string()).map(String::as_str)
    }

    /// Returns all values for the given key, or `None` if not present.
    pub fn get_list(&self, key: &str) -> Option<&Vec<String>> {
        self.data.get_list(&key.to_string())
    }

    /// Sets a single value for the given key, replacing any existing values.
    ///
    /// # Errors
    ///
    /// Returns [`StaplerError::SuspiciousOperation`] if this `QueryDict` is immutable.
    pub fn set(&mut self, key: &str, value: &str) -> StaplerResult<()> {
        self.ensure_mutable()?;
        self.data.set(key.to_string(), value.to_string());
        Ok(())
    }

    /// Appends a value to the list for the given key.
    ///
    /// # Errors
    ///
    /// Returns [`StaplerError::SuspiciousOperation`] if this `QueryDict` is immutable.
    pub fn append(&mut self, key: &str, value: &str) -> StaplerResult<()> {
        self.ensure_mutable()?;
        self.data.append(key.to_string(), value.to_string());
        Ok(())
    }

    fn ensure_mutable(&self) -> StaplerResult<()> {
        if self.mutable {
            Ok(())
        } else {
            Err(StaplerError::SuspiciousOperation(
                "This QueryDict instance is immutable".to_string(),
            ))
        }
    }

    /// Returns a mutable copy of this `QueryDict`.
    #[must_use]
    pub fn copy(&self) -> Self {
        Self {
            data: self.data.clone(),
            mutable: true,
        }
    }

    /// Returns a new immutable `QueryDict` holding the entries whose key
    /// `remap` maps to `Some(new_key)`, with all of their values.
    ///
    /// `self` is left untouched.
    #[must_use]
    pub fn remap_keys(&self, remap: impl Fn(&str) -> Option<String>) -> Self {
        let mut data = MultiValueDict::new();
        for (key, values) in self.data.iter() {
            if let Some(new_key) = remap(key) {
                for value in values {
                    data.append(new_key.clone(), value.clone());
                }
            }
        }
        Self {
            data,
            mutable: false,
        }
    }

    /// Encodes this `QueryDict` as a urlencoded string, sorted by pair.
    pub fn urlencode(&self) -> String {
        let mut parts = Vec::new();

        for (key, values) in self.data.iter() {
            for value in values {
                parts.push(format!("{}={}", percent_encode(key), percent_encode(value)));
            }
        }

        parts.sort();
        parts.join("&")
    }

    /// Returns `true` if this `QueryDict` is mutable.
    pub const fn is_mutable(&self) -> bool {
        self.mutable
    }

    /// Returns the number of distinct keys.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the `QueryDict` contains no keys.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if the specified key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(&key.to_string())
    }

    /// Returns an iterator over the keys, in submission order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.keys()
    }

    /// Returns a reference to the underlying `MultiValueDict`.
    pub const fn data(&self) -> &MultiValueDict<String, String> {
        &self.data
    }
}

/// Decodes a percent-encoded string.
fn percent_decode(input: &str) -> String {
    // '+' is a space in form encoding
    let plus_decoded = input.replace('+', " ");
    percent_encoding::percent_decode_str(&plus_decoded)
        .decode_utf8_lossy()
        .into_owned()
}

/// Percent-encodes a string for use in a urlencoded body.
fn percent_encode(input: &str) -> String {
    percent_encoding::utf8_percent_encode(input, percent_encoding::NON_ALPHANUMERIC).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let qd = QueryDict::parse("key=value");
        assert_eq!(qd.get("key"), Some("value"));
        assert_eq!(qd.len(), 1);
    }

    #[test]
    fn test_parse_multiple_values() {
        let qd = QueryDict::parse("countries=1&countries=2&countries=3");
        assert_eq!(qd.get("countries"), Some("3"));
        assert_eq!(
            qd.get_list("countries"),
            Some(&vec!["1".to_string(), "2".to_string(), "3".to_string()])
        );
    }

    #[test]
    fn test_parse_empty_string() {
        assert!(QueryDict::parse("").is_empty());
    }

    #[test]
    fn test_parse_no_value() {
        let qd = QueryDict::parse("key");
        assert_eq!(qd.get("key"), Some(""));
    }

    #[test]
    fn test_parse_percent_and_plus() {
        let qd = QueryDict::parse("revenue=30000%2C-&name=Oltre+xr4");
        assert_eq!(qd.get("revenue"), Some("30000,-"));
        assert_eq!(qd.get("name"), Some("Oltre xr4"));
    }

    #[test]
    fn test_parse_skips_empty_pairs() {
        let qd = QueryDict::parse("a=1&&b=2&");
        assert_eq!(qd.len(), 2);
    }

    #[test]
    fn test_from_pairs_accumulates() {
        let qd = QueryDict::from_pairs([("a", "1"), ("b", "2"), ("a", "3")]);
        assert_eq!(qd.get_list("a"), Some(&vec!["1".to_string(), "3".to_string()]));
        assert!(!qd.is_mutable());
    }

    #[test]
    fn test_immutable_set_fails() {
        let mut qd = QueryDict::parse("key=value");
        assert!(qd.set("key", "new_value").is_err());
        assert!(qd.append("key", "extra").is_err());
    }

    #[test]
    fn test_copy_returns_mutable() {
        let qd = QueryDict::parse("key=value");
        let mut mutable = qd.copy();
        assert!(mutable.set("key", "new").is_ok());
        assert_eq!(mutable.get("key"), Some("new"));
        assert_eq!(qd.get("key"), Some("value"));
    }

    #[test]
    fn test_remap_keys_keeps_all_values() {
        let qd = QueryDict::parse("bike__countries=1&bike__countries=2&manufacturer__name=Giant");
        let bike = qd.remap_keys(|k| k.strip_prefix("bike__").map(String::from));
        assert_eq!(bike.len(), 1);
        assert_eq!(
            bike.get_list("countries"),
            Some(&vec!["1".to_string(), "2".to_string()])
        );
        assert!(!bike.contains_key("manufacturer__name"));
        // Source is unchanged
        assert_eq!(qd.len(), 2);
    }

    #[test]
    fn test_urlencode_special_chars() {
        let qd = QueryDict::from_pairs([("name", "hello world")]);
        assert_eq!(qd.urlencode(), "name=hello%20world");
    }
}
