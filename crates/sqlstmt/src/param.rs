//! Placeholder table: named parameter storage for rendered statements.

use std::collections::BTreeMap;

use crate::value::Value;

/// Ordered placeholder → value table with a monotonic counter.
///
/// Generated names look like `:p0`, `:p1`, ... and are unique across a
/// whole rendered statement, including merged sub-selects, because the
/// counter is handed to the nested render via [`Params::fork`] and taken
/// back via [`Params::absorb`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Params {
    entries: Vec<(String, Value)>,
    next: usize,
}

impl Params {
    /// Create a new empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh placeholder for `value` and return its name.
    pub fn allocate(&mut self, value: Value) -> String {
        let name = format!(":p{}", self.next);
        self.next += 1;
        self.entries.push((name.clone(), value));
        name
    }

    /// Store a caller-named parameter. An existing entry with the same name
    /// is overwritten in place.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// An empty table that continues numbering where this one stops.
    pub fn fork(&self) -> Self {
        Self {
            entries: Vec::new(),
            next: self.next,
        }
    }

    /// Take over a forked table's counter and allocations.
    pub fn absorb(&mut self, child: Params) {
        self.next = self.next.max(child.next);
        for (name, value) in child.entries {
            self.set(name, value);
        }
    }

    /// Look up a value by placeholder name (with or without the leading `:`).
    pub fn get(&self, name: &str) -> Option<&Value> {
        let name = name.strip_prefix(':').unwrap_or(name);
        self.entries
            .iter()
            .find(|(n, _)| n.strip_prefix(':').unwrap_or(n) == name)
            .map(|(_, v)| v)
    }

    /// Number of stored parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The next counter value a [`Params::allocate`] call would use.
    pub fn next_index(&self) -> usize {
        self.next
    }

    /// Iterate over `(name, value)` in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Parameters keyed by name, in a stable (sorted) order.
    pub fn snapshot(&self) -> BTreeMap<&str, &Value> {
        self.iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_is_monotonic() {
        let mut params = Params::new();
        assert_eq!(params.allocate(Value::Int(1)), ":p0");
        assert_eq!(params.allocate(Value::Int(2)), ":p1");
        assert_eq!(params.len(), 2);
        assert_eq!(params.get(":p1"), Some(&Value::Int(2)));
        assert_eq!(params.get("p0"), Some(&Value::Int(1)));
    }

    #[test]
    fn fork_and_absorb_never_collide() {
        let mut parent = Params::new();
        parent.allocate(Value::Int(1));

        let mut child = parent.fork();
        assert!(child.is_empty());
        assert_eq!(child.allocate(Value::Int(2)), ":p1");
        assert_eq!(child.allocate(Value::Int(3)), ":p2");

        parent.absorb(child);
        assert_eq!(parent.allocate(Value::Int(4)), ":p3");
        let names: Vec<_> = parent.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec![":p0", ":p1", ":p2", ":p3"]);
    }

    #[test]
    fn set_overwrites_by_name() {
        let mut params = Params::new();
        params.set(":id", Value::Int(1));
        params.set(":id", Value::Int(2));
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("id"), Some(&Value::Int(2)));
    }

    #[test]
    fn snapshot_is_sorted() {
        let mut params = Params::new();
        params.set(":z", Value::Null);
        params.set(":a", Value::Bool(true));
        let keys: Vec<_> = params.snapshot().into_keys().collect();
        assert_eq!(keys, vec![":a", ":z"]);
    }
}
