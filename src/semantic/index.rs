use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;

/// Where a transaction id was first seen.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Location {
    /// Label of the source text, usually a file path. Empty for anonymous text.
    pub source: String,
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(source: impl Into<String>, line: usize, column: usize) -> Self {
        Location {
            source: source.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.source.is_empty() {
            write!(f, "line {}, column {}", self.line, self.column)
        } else {
            write!(f, "{} line {}, column {}", self.source, self.line, self.column)
        }
    }
}

///
/// `txn:` id → first location, built fresh for each validation pass.
///
/// Seed it with the ids of the files that come before the one being
/// validated (archives, earlier files of an import batch) so duplicates across
/// files are detected too.
///
#[derive(Debug, Default, Clone)]
pub struct TxnIndex {
    ids: HashMap<String, Location>,
}

impl TxnIndex {
    pub fn new() -> Self {
        TxnIndex::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Location> {
        self.ids.get(id)
    }

    /// Records `id`, or returns the location it was first recorded at.
    pub fn insert(&mut self, id: &str, location: Location) -> Option<Location> {
        match self.ids.entry(id.to_string()) {
            Entry::Occupied(entry) => Some(entry.get().clone()),
            Entry::Vacant(entry) => {
                entry.insert(location);
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_location_wins() {
        let mut index = TxnIndex::new();
        assert_eq!(index.insert("a", Location::new("x.transactions", 1, 1)), None);
        assert_eq!(
            index.insert("a", Location::new("y.transactions", 9, 1)),
            Some(Location::new("x.transactions", 1, 1))
        );
        assert!(index.contains("a"));
        assert_eq!(index.len(), 1);
        assert_eq!(
            index.get("a").map(|l| l.to_string()),
            Some("x.transactions line 1, column 1".to_string())
        );
    }
}
