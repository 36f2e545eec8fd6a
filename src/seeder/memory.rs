//! In-memory [`SeedTarget`] used for dry runs of the pipeline and in tests.
//!
//! It also answers test queries: a query "returns" every row of the table
//! named after its first `FROM`.

use super::indexes::IndexDef;
use super::reservoir::Reservoir;
use super::target::SeedTarget;
use crate::generator::{Row, SqlValue};
use crate::workload::QueryRunner;
use ahash::{AHashMap, AHashSet};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::Mutex;

static FROM_TABLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bFROM\s+`?(\w+)`?").unwrap());

type StoredRow = AHashMap<String, SqlValue>;

#[derive(Debug, Default)]
struct State {
    tables: AHashMap<String, Vec<StoredRow>>,
    statements: Vec<String>,
    queries: Vec<String>,
    finished: bool,
}

/// Tables held as lists of rows keyed by lowercase column name
#[derive(Debug, Default)]
pub struct MemoryTarget {
    state: Mutex<State>,
    indexes: AHashMap<String, Vec<IndexDef>>,
    fk_sets: AHashMap<String, Vec<Vec<String>>>,
    local_infile: bool,
    failing_table: Option<String>,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self {
            local_infile: true,
            ..Default::default()
        }
    }

    /// Pre-populate a table
    pub fn with_rows(mut self, table: &str, columns: &[&str], rows: Vec<Row>) -> Self {
        let stored = self
            .state
            .get_mut()
            .tables
            .entry(table.to_lowercase())
            .or_default();
        for row in rows {
            stored.push(
                columns
                    .iter()
                    .map(|c| c.to_lowercase())
                    .zip(row)
                    .collect(),
            );
        }
        self
    }

    pub fn with_indexes(mut self, table: &str, indexes: Vec<IndexDef>) -> Self {
        self.indexes.insert(table.to_lowercase(), indexes);
        self
    }

    pub fn with_fk_sets(mut self, table: &str, sets: Vec<Vec<String>>) -> Self {
        self.fk_sets.insert(table.to_lowercase(), sets);
        self
    }

    pub fn with_local_infile(mut self, enabled: bool) -> Self {
        self.local_infile = enabled;
        self
    }

    /// Every write to `table`, and every query reading it, fails
    pub fn failing_on(mut self, table: &str) -> Self {
        self.failing_table = Some(table.to_lowercase());
        self
    }

    /// Values of one column, in insertion order
    pub async fn column_values(&self, table: &str, column: &str) -> Vec<SqlValue> {
        let state = self.state.lock().await;
        let column = column.to_lowercase();
        state
            .tables
            .get(&table.to_lowercase())
            .map(|rows| {
                rows.iter()
                    .map(|r| r.get(&column).cloned().unwrap_or(SqlValue::Null))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub async fn row_count(&self, table: &str) -> usize {
        let state = self.state.lock().await;
        state
            .tables
            .get(&table.to_lowercase())
            .map_or(0, Vec::len)
    }

    /// Statements passed to [`SeedTarget::execute`], in order
    pub async fn statements(&self) -> Vec<String> {
        self.state.lock().await.statements.clone()
    }

    /// Queries passed to [`QueryRunner::run_query`], in order
    pub async fn queries(&self) -> Vec<String> {
        self.state.lock().await.queries.clone()
    }

    pub async fn is_finished(&self) -> bool {
        self.state.lock().await.finished
    }

    async fn store(&self, table: &str, columns: &[String], rows: &[Row]) -> anyhow::Result<()> {
        let key = table.to_lowercase();
        if self.failing_table.as_deref() == Some(key.as_str()) {
            anyhow::bail!("simulated write failure on {}", table);
        }
        let names: Vec<String> = columns.iter().map(|c| c.to_lowercase()).collect();
        let mut state = self.state.lock().await;
        let stored = state.tables.entry(key).or_default();
        for row in rows {
            stored.push(names.iter().cloned().zip(row.iter().cloned()).collect());
        }
        Ok(())
    }
}

#[async_trait]
impl SeedTarget for MemoryTarget {
    async fn local_infile_enabled(&self) -> anyhow::Result<bool> {
        Ok(self.local_infile)
    }

    async fn truncate(&self, table: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        state.tables.remove(&table.to_lowercase());
        state.statements.push(format!("TRUNCATE TABLE `{}`", table));
        Ok(())
    }

    async fn count_rows(&self, table: &str) -> anyhow::Result<u64> {
        Ok(self.row_count(table).await as u64)
    }

    async fn max_integer(&self, table: &str, column: &str) -> anyhow::Result<Option<i64>> {
        Ok(self
            .column_values(table, column)
            .await
            .iter()
            .filter_map(SqlValue::as_i64)
            .max())
    }

    async fn scan_column(
        &self,
        table: &str,
        column: &str,
        reservoir: &mut Reservoir<SqlValue>,
    ) -> anyhow::Result<()> {
        let mut seen = AHashSet::new();
        for value in self.column_values(table, column).await {
            if !value.is_null() && seen.insert(value.key()) {
                reservoir.consider(value);
            }
        }
        Ok(())
    }

    async fn fetch_pairs(
        &self,
        table: &str,
        key_column: &str,
        value_column: &str,
    ) -> anyhow::Result<Vec<(SqlValue, SqlValue)>> {
        let keys = self.column_values(table, key_column).await;
        let values = self.column_values(table, value_column).await;
        Ok(keys.into_iter().zip(values).collect())
    }

    async fn fetch_tuples(
        &self,
        table: &str,
        columns: &[String],
    ) -> anyhow::Result<Vec<Vec<SqlValue>>> {
        let state = self.state.lock().await;
        let names: Vec<String> = columns.iter().map(|c| c.to_lowercase()).collect();
        let mut seen = AHashSet::new();
        let mut tuples = Vec::new();
        for row in state.tables.get(&table.to_lowercase()).into_iter().flatten() {
            let tuple: Vec<SqlValue> = names
                .iter()
                .map(|n| row.get(n).cloned().unwrap_or(SqlValue::Null))
                .collect();
            let key: Vec<String> = tuple.iter().map(SqlValue::key).collect();
            if seen.insert(key) {
                tuples.push(tuple);
            }
        }
        Ok(tuples)
    }

    async fn secondary_indexes(&self, table: &str) -> anyhow::Result<Vec<IndexDef>> {
        Ok(self
            .indexes
            .get(&table.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }

    async fn fk_column_sets(&self, table: &str) -> anyhow::Result<Vec<Vec<String>>> {
        Ok(self
            .fk_sets
            .get(&table.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }

    async fn execute(&self, sql: &str) -> anyhow::Result<()> {
        self.state.lock().await.statements.push(sql.to_string());
        Ok(())
    }

    async fn insert_rows(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Row],
    ) -> anyhow::Result<()> {
        self.store(table, columns, rows).await
    }

    async fn load_rows(&self, table: &str, columns: &[String], rows: &[Row]) -> anyhow::Result<()> {
        self.store(table, columns, rows).await
    }

    async fn finish(&self) -> anyhow::Result<()> {
        self.state.lock().await.finished = true;
        Ok(())
    }
}

#[async_trait]
impl QueryRunner for MemoryTarget {
    async fn run_query(&self, sql: &str) -> anyhow::Result<usize> {
        let table = FROM_TABLE_RE
            .captures(sql)
            .map(|caps| caps[1].to_lowercase());
        let mut state = self.state.lock().await;
        state.queries.push(sql.to_string());
        let Some(table) = table else {
            return Ok(0);
        };
        if self.failing_table.as_deref() == Some(table.as_str()) {
            anyhow::bail!("simulated query failure on {}", table);
        }
        Ok(state.tables.get(&table).map_or(0, Vec::len))
    }

    async fn sample_rows(
        &self,
        table: &str,
        columns: &[String],
        limit: usize,
    ) -> anyhow::Result<Vec<Vec<SqlValue>>> {
        let state = self.state.lock().await;
        let names: Vec<String> = columns.iter().map(|c| c.to_lowercase()).collect();
        Ok(state
            .tables
            .get(&table.to_lowercase())
            .into_iter()
            .flatten()
            .take(limit)
            .map(|row| {
                names
                    .iter()
                    .map(|n| row.get(n).cloned().unwrap_or(SqlValue::Null))
                    .collect()
            })
            .collect())
    }
}
