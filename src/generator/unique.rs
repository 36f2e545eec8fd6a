//! Uniqueness trackers for single-column and composite unique constraints.
//!
//! Values are tracked by their string form. NULL never collides.

use super::SqlValue;
use ahash::AHashSet;

/// Separator for composite keys, not expected inside generated data
const TUPLE_SEPARATOR: char = '\u{0}';

/// Seen values of one unique column
#[derive(Debug, Default)]
pub struct UniqueTracker {
    seen: AHashSet<String>,
}

impl UniqueTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value`, returning false when it was already seen
    pub fn try_add(&mut self, value: &SqlValue) -> bool {
        if value.is_null() {
            return true;
        }
        self.seen.insert(value.key())
    }

    pub fn contains(&self, value: &SqlValue) -> bool {
        !value.is_null() && self.seen.contains(&value.key())
    }

    /// Seed with values already persisted in the table
    pub fn preload<'a>(&mut self, values: impl IntoIterator<Item = &'a SqlValue>) {
        for value in values {
            self.try_add(value);
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Seen tuples of one multi-column unique index
#[derive(Debug)]
pub struct CompositeTracker {
    /// Index name, for diagnostics
    pub name: String,
    /// Column names in index order
    pub columns: Vec<String>,
    /// Positions of the indexed columns in a generated row
    positions: Vec<usize>,
    seen: AHashSet<String>,
}

impl CompositeTracker {
    pub fn new(name: impl Into<String>, columns: Vec<String>, positions: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            columns,
            positions,
            seen: AHashSet::new(),
        }
    }

    /// Joined key of the tracked values, `None` if any of them is NULL
    fn tuple_key<'a>(&self, values: impl Iterator<Item = &'a SqlValue>) -> Option<String> {
        let mut key = String::new();
        for (i, value) in values.enumerate() {
            if value.is_null() {
                return None;
            }
            if i > 0 {
                key.push(TUPLE_SEPARATOR);
            }
            key.push_str(&value.key());
        }
        Some(key)
    }

    fn row_key(&self, row: &[SqlValue]) -> Option<String> {
        self.tuple_key(self.positions.iter().map(|&p| &row[p]))
    }

    /// Whether `row` may be accepted
    pub fn accepts(&self, row: &[SqlValue]) -> bool {
        match self.row_key(row) {
            Some(key) => !self.seen.contains(&key),
            None => true,
        }
    }

    /// Record an accepted row; rows with a NULL in the tuple are not recorded
    pub fn record(&mut self, row: &[SqlValue]) {
        if let Some(key) = self.row_key(row) {
            self.seen.insert(key);
        }
    }

    /// Seed with tuples already persisted, each in index column order
    pub fn preload(&mut self, tuples: &[Vec<SqlValue>]) {
        for tuple in tuples {
            if let Some(key) = self.tuple_key(tuple.iter()) {
                self.seen.insert(key);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
