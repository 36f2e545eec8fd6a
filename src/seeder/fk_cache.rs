//! Run-scoped cache of referenced-column values.
//!
//! Keys are `table.column` of the referenced side, lowercased. An entry is
//! dropped as soon as the last table in seeding order that consumes it has
//! been seeded.

use crate::generator::SqlValue;
use crate::schema::Schema;
use ahash::AHashMap;
use std::sync::Arc;

/// Cache key for a referenced column
pub fn cache_key(table: &str, column: &str) -> String {
    format!("{}.{}", table, column).to_lowercase()
}

/// Position in `order` of the last table referencing each cache key
pub fn compute_last_consumers(schema: &Schema, order: &[String]) -> AHashMap<String, usize> {
    let mut last = AHashMap::new();
    for (i, name) in order.iter().enumerate() {
        let Some(table) = schema.get_table(name) else {
            continue;
        };
        for (_, fk) in table.fk_columns() {
            last.insert(cache_key(&fk.referenced_table, &fk.referenced_column), i);
        }
    }
    last
}

#[derive(Debug, Default)]
pub struct FkCache {
    entries: AHashMap<String, Arc<Vec<SqlValue>>>,
    last_consumer: AHashMap<String, usize>,
}

impl FkCache {
    pub fn new(last_consumer: AHashMap<String, usize>) -> Self {
        Self {
            entries: AHashMap::new(),
            last_consumer,
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<Vec<SqlValue>>> {
        self.entries.get(key).cloned()
    }

    pub fn insert(&mut self, key: String, values: Vec<SqlValue>) -> Arc<Vec<SqlValue>> {
        let values = Arc::new(values);
        self.entries.insert(key, Arc::clone(&values));
        values
    }

    /// Whether a table after position `index` still reads `key`
    pub fn needed_after(&self, key: &str, index: usize) -> bool {
        self.last_consumer.get(key).is_some_and(|&last| last > index)
    }

    /// Drop entries whose last consumer is the table at `index`
    pub fn evict_consumed_by(&mut self, index: usize) -> usize {
        let before = self.entries.len();
        let last_consumer = &self.last_consumer;
        self.entries
            .retain(|key, _| last_consumer.get(key) != Some(&index));
        before - self.entries.len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
