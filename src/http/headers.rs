//! Ordered, multi-valued, case-insensitive HTTP header storage.

use crate::errors::ErrorKind;

/// A single request or response's header block.
///
/// Lookup is case-insensitive, but the original display case of a header
/// name (whichever case it was first set or received in) is preserved for
/// serialization.
#[derive(Debug, Default, Clone)]
pub struct Headers {
    /// Lowercased names, in first-insertion order.
    order: Vec<String>,
    /// lowercased name -> values, in the order they were added.
    values: Vec<(String, Vec<String>)>,
    /// lowercased name -> original-case display name.
    display: Vec<(String, String)>,
    max_line_size: usize,
    max_headers: usize,
}

impl Headers {
    pub(crate) fn new(max_line_size: usize, max_headers: usize) -> Self {
        Headers {
            order: Vec::new(),
            values: Vec::new(),
            display: Vec::new(),
            max_line_size,
            max_headers,
        }
    }

    /// Unbounded headers, for responses assembled by the server itself.
    pub(crate) fn unbounded() -> Self {
        Headers::new(usize::MAX, usize::MAX)
    }

    pub(crate) fn clear(&mut self) {
        self.order.clear();
        self.values.clear();
        self.display.clear();
    }

    fn index_of(&self, lower: &str) -> Option<usize> {
        self.values.iter().position(|(name, _)| name == lower)
    }

    /// Parses one raw `Name: value\r\n` line and adds it.
    ///
    /// Rejects lines missing the `\r\n` terminator or the colon separator
    /// with [`ErrorKind::InvalidHeader`]. Enforces `max_line_size` and
    /// `max_headers`, surfacing [`ErrorKind::HeaderTooLarge`] with a phrase
    /// of the form `"<Field> Header Too Large"`.
    pub(crate) fn add(&mut self, raw_line: &str) -> Result<(), ErrorKind> {
        let Some(stripped) = raw_line.strip_suffix("\r\n") else {
            return Err(ErrorKind::InvalidHeader);
        };
        if raw_line.len() > self.max_line_size {
            return Err(ErrorKind::HeaderTooLarge("Field Header Too Large"));
        }
        let Some(colon) = stripped.find(':') else {
            return Err(ErrorKind::InvalidHeader);
        };
        let name = stripped[..colon].trim();
        let value = stripped[colon + 1..].trim();
        if name.is_empty() {
            return Err(ErrorKind::InvalidHeader);
        }
        self.set(name, value, false)
    }

    /// Sets `name` to `value`. With `overwrite=false`, appends to any
    /// existing value list (preserving multi-value headers such as
    /// `Set-Cookie`); with `overwrite=true`, replaces all prior values.
    pub(crate) fn set(&mut self, name: &str, value: &str, overwrite: bool) -> Result<(), ErrorKind> {
        let lower = name.to_ascii_lowercase();
        if self.index_of(&lower).is_none() {
            if self.order.len() >= self.max_headers {
                return Err(ErrorKind::HeaderTooLarge("Too Many Headers"));
            }
            self.order.push(lower.clone());
            self.display.push((lower.clone(), name.to_string()));
            self.values.push((lower.clone(), Vec::new()));
        }
        let idx = self.index_of(&lower).unwrap();
        if overwrite {
            self.values[idx].1.clear();
        }
        self.values[idx].1.push(value.to_string());
        Ok(())
    }

    /// Removes every value for `name`.
    pub(crate) fn remove(&mut self, name: &str) {
        let lower = name.to_ascii_lowercase();
        self.order.retain(|n| n != &lower);
        self.display.retain(|(n, _)| n != &lower);
        self.values.retain(|(n, _)| n != &lower);
    }

    /// Returns the last value set for `name`, matching a plain HTTP client's
    /// expectation of "the" value of a header that may have been folded.
    pub fn get(&self, name: &str) -> Option<&str> {
        let lower = name.to_ascii_lowercase();
        self.index_of(&lower)
            .and_then(|i| self.values[i].1.last())
            .map(|s| s.as_str())
    }

    /// Returns every value set for `name`, in insertion order.
    pub fn get_list(&self, name: &str) -> &[String] {
        let lower = name.to_ascii_lowercase();
        self.index_of(&lower)
            .map(|i| self.values[i].1.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(&name.to_ascii_lowercase()).is_some()
    }

    /// Number of distinct (lowercased) header names.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Serializes every value of `name` as `"Name: value\r\n"` lines, under
    /// the original display case, concatenated.
    pub(crate) fn retrieve(&self, name: &str) -> String {
        let lower = name.to_ascii_lowercase();
        let Some(i) = self.index_of(&lower) else {
            return String::new();
        };
        let display = self
            .display
            .iter()
            .find(|(n, _)| n == &lower)
            .map(|(_, d)| d.as_str())
            .unwrap_or(name);
        let mut out = String::new();
        for value in &self.values[i].1 {
            out.push_str(display);
            out.push_str(": ");
            out.push_str(value);
            out.push_str("\r\n");
        }
        out
    }

    /// Serializes the full header block, insertion order, terminated with the
    /// blank line that separates headers from the body.
    pub(crate) fn serialize(&self) -> String {
        let mut out = String::new();
        for lower in &self.order {
            out.push_str(&self.retrieve(lower));
        }
        out.push_str("\r\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers() -> Headers {
        Headers::new(4096, 64)
    }

    #[test]
    fn get_matches_last_of_get_list() {
        let mut h = headers();
        h.set("X-Foo", "1", false).unwrap();
        h.set("X-Foo", "2", false).unwrap();
        assert_eq!(h.get("x-foo"), Some("2"));
        assert_eq!(h.get_list("X-FOO"), ["1", "2"]);
    }

    #[test]
    fn len_counts_distinct_lowercased_keys() {
        let mut h = headers();
        h.set("A", "1", false).unwrap();
        h.set("a", "2", false).unwrap();
        h.set("B", "3", false).unwrap();
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn iteration_order_is_first_insertion_order() {
        let mut h = headers();
        h.set("Zebra", "1", false).unwrap();
        h.set("Apple", "2", false).unwrap();
        assert_eq!(h.order, vec!["zebra", "apple"]);
    }

    #[test]
    fn retrieve_preserves_original_case() {
        let mut h = headers();
        h.set("Content-Type", "text/plain", true).unwrap();
        assert_eq!(h.retrieve("content-type"), "Content-Type: text/plain\r\n");
    }

    #[test]
    fn add_rejects_missing_terminator() {
        let mut h = headers();
        assert!(matches!(h.add("X-Foo: bar"), Err(ErrorKind::InvalidHeader)));
    }

    #[test]
    fn add_rejects_missing_colon() {
        let mut h = headers();
        assert!(matches!(
            h.add("not-a-header\r\n"),
            Err(ErrorKind::InvalidHeader)
        ));
    }

    #[test]
    fn add_parses_and_trims() {
        let mut h = headers();
        h.add("X-Foo:   bar  \r\n").unwrap();
        assert_eq!(h.get("x-foo"), Some("bar"));
    }

    #[test]
    fn too_many_headers_errors() {
        let mut h = Headers::new(4096, 1);
        h.set("A", "1", false).unwrap();
        assert!(matches!(
            h.set("B", "2", false),
            Err(ErrorKind::HeaderTooLarge(_))
        ));
    }

    #[test]
    fn overwrite_replaces_prior_values() {
        let mut h = headers();
        h.set("X", "1", false).unwrap();
        h.set("X", "2", false).unwrap();
        h.set("X", "3", true).unwrap();
        assert_eq!(h.get_list("X"), ["3"]);
    }
}
