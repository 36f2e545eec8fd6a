//! Database access needed by the orchestrator.

use super::indexes::IndexDef;
use super::reservoir::Reservoir;
use crate::generator::{Row, SqlValue};
use async_trait::async_trait;

/// Bulk-insert strategy for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertMode {
    /// Parameterized multi-row `INSERT`
    #[default]
    Insert,
    /// Tab-separated rows streamed through `LOAD DATA LOCAL INFILE`
    LoadData,
}

/// A database the seeder can fill.
///
/// Implementations must be usable from several worker tasks at once.
#[async_trait]
pub trait SeedTarget: Send + Sync {
    /// Whether the server accepts `LOAD DATA LOCAL INFILE`
    async fn local_infile_enabled(&self) -> anyhow::Result<bool>;

    async fn truncate(&self, table: &str) -> anyhow::Result<()>;

    async fn count_rows(&self, table: &str) -> anyhow::Result<u64>;

    /// `MAX(column)`, `None` for an empty table
    async fn max_integer(&self, table: &str, column: &str) -> anyhow::Result<Option<i64>>;

    /// Stream the distinct non-NULL values of a column into `reservoir`
    async fn scan_column(
        &self,
        table: &str,
        column: &str,
        reservoir: &mut Reservoir<SqlValue>,
    ) -> anyhow::Result<()>;

    /// `(key_column, value_column)` pairs of every row
    async fn fetch_pairs(
        &self,
        table: &str,
        key_column: &str,
        value_column: &str,
    ) -> anyhow::Result<Vec<(SqlValue, SqlValue)>>;

    /// Distinct tuples over `columns`
    async fn fetch_tuples(&self, table: &str, columns: &[String])
        -> anyhow::Result<Vec<Vec<SqlValue>>>;

    /// Non-primary indexes, columns in index order
    async fn secondary_indexes(&self, table: &str) -> anyhow::Result<Vec<IndexDef>>;

    /// Column sets of the table's foreign-key constraints
    async fn fk_column_sets(&self, table: &str) -> anyhow::Result<Vec<Vec<String>>>;

    async fn execute(&self, sql: &str) -> anyhow::Result<()>;

    /// Insert rows whose values follow `columns`
    async fn insert_rows(&self, table: &str, columns: &[String], rows: &[Row])
        -> anyhow::Result<()>;

    /// Bulk-load rows whose values follow `columns`
    async fn load_rows(&self, table: &str, columns: &[String], rows: &[Row]) -> anyhow::Result<()>;

    /// Undo session settings applied for bulk loading
    async fn finish(&self) -> anyhow::Result<()>;

    async fn write_rows(
        &self,
        mode: InsertMode,
        table: &str,
        columns: &[String],
        rows: &[Row],
    ) -> anyhow::Result<()> {
        match mode {
            InsertMode::Insert => self.insert_rows(table, columns, rows).await,
            InsertMode::LoadData => self.load_rows(table, columns, rows).await,
        }
    }
}
