//! [`SeedTarget`] over a `mysql_async` connection pool.

use super::indexes::{quote_ident, IndexColumn, IndexDef};
use super::load_data::{encode_rows, load_statement};
use super::reservoir::Reservoir;
use super::target::SeedTarget;
use crate::generator::{Row, SqlValue};
use crate::schema::{introspect, Schema};
use crate::workload::QueryRunner;
use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use futures::StreamExt;
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder, Params, Pool, PoolConstraints, PoolOpts, Value};

/// Connections kept on top of one per worker
pub const POOL_HEADROOM: usize = 2;

/// MySQL's limit on placeholders in one prepared statement
pub const MAX_PLACEHOLDERS: usize = 65_535;

/// Chunk size for streaming LOAD DATA payloads
const INFILE_CHUNK: usize = 1 << 20;

const SESSION_INIT: [&str; 2] = ["SET FOREIGN_KEY_CHECKS=0", "SET UNIQUE_CHECKS=0"];

/// Rows per INSERT statement that keep `rows * columns` within the
/// placeholder limit
pub fn rows_per_statement(columns: usize) -> usize {
    (MAX_PLACEHOLDERS / columns.max(1)).max(1)
}

#[derive(Debug, Clone)]
pub struct MySqlTarget {
    pool: Pool,
}

impl MySqlTarget {
    /// Build a pool sized for `workers` concurrent writers. Every pooled
    /// session has FK and unique checks disabled.
    pub fn connect(dsn: &str, workers: usize) -> anyhow::Result<Self> {
        let opts = Opts::from_url(dsn).context("invalid MySQL DSN")?;
        let constraints = PoolConstraints::new(1, workers.max(1) + POOL_HEADROOM)
            .ok_or_else(|| anyhow::anyhow!("invalid pool size for {} workers", workers))?;
        let builder = OptsBuilder::from_opts(opts)
            .pool_opts(PoolOpts::default().with_constraints(constraints))
            .init(SESSION_INIT.iter().map(|s| s.to_string()).collect());

        Ok(Self {
            pool: Pool::new(builder),
        })
    }

    pub async fn load_schema(&self) -> anyhow::Result<Schema> {
        let mut conn = self.conn().await?;
        introspect::load_schema(&mut conn).await
    }

    async fn conn(&self) -> anyhow::Result<Conn> {
        self.pool
            .get_conn()
            .await
            .context("acquiring MySQL connection")
    }

    async fn insert_chunk(
        &self,
        conn: &mut Conn,
        table: &str,
        columns: &[String],
        rows: &[Row],
    ) -> anyhow::Result<()> {
        let row_placeholder = format!("({})", vec!["?"; columns.len()].join(", "));
        let sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            quote_ident(table),
            column_list(columns),
            vec![row_placeholder.as_str(); rows.len()].join(", ")
        );

        let params: Vec<Value> = rows.iter().flatten().map(to_mysql_value).collect();
        conn.exec_drop(sql, Params::Positional(params)).await?;
        Ok(())
    }
}

fn column_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ")
}

#[async_trait]
impl SeedTarget for MySqlTarget {
    async fn local_infile_enabled(&self) -> anyhow::Result<bool> {
        let mut conn = self.conn().await?;
        let value: Option<i64> = conn.query_first("SELECT @@local_infile").await?;
        Ok(value == Some(1))
    }

    async fn truncate(&self, table: &str) -> anyhow::Result<()> {
        self.execute(&format!("TRUNCATE TABLE {}", quote_ident(table)))
            .await
    }

    async fn count_rows(&self, table: &str) -> anyhow::Result<u64> {
        let mut conn = self.conn().await?;
        let count: Option<u64> = conn
            .query_first(format!("SELECT COUNT(*) FROM {}", quote_ident(table)))
            .await?;
        Ok(count.unwrap_or(0))
    }

    async fn max_integer(&self, table: &str, column: &str) -> anyhow::Result<Option<i64>> {
        let mut conn = self.conn().await?;
        let max: Option<Option<i64>> = conn
            .query_first(format!(
                "SELECT MAX({}) FROM {}",
                quote_ident(column),
                quote_ident(table)
            ))
            .await?;
        Ok(max.flatten())
    }

    async fn scan_column(
        &self,
        table: &str,
        column: &str,
        reservoir: &mut Reservoir<SqlValue>,
    ) -> anyhow::Result<()> {
        let mut conn = self.conn().await?;
        let sql = format!(
            "SELECT DISTINCT {col} FROM {table} WHERE {col} IS NOT NULL",
            col = quote_ident(column),
            table = quote_ident(table)
        );
        let mut result = conn.exec_iter(sql, ()).await?;
        result
            .for_each(|mut row| {
                if let Some(value) = row.take::<Value, _>(0) {
                    reservoir.consider(from_mysql_value(value));
                }
            })
            .await?;
        Ok(())
    }

    async fn fetch_pairs(
        &self,
        table: &str,
        key_column: &str,
        value_column: &str,
    ) -> anyhow::Result<Vec<(SqlValue, SqlValue)>> {
        let mut conn = self.conn().await?;
        let sql = format!(
            "SELECT {}, {} FROM {}",
            quote_ident(key_column),
            quote_ident(value_column),
            quote_ident(table)
        );
        let mut pairs = Vec::new();
        let mut result = conn.exec_iter(sql, ()).await?;
        result
            .for_each(|mut row| {
                let key = row.take::<Value, _>(0).unwrap_or(Value::NULL);
                let value = row.take::<Value, _>(1).unwrap_or(Value::NULL);
                pairs.push((from_mysql_value(key), from_mysql_value(value)));
            })
            .await?;
        Ok(pairs)
    }

    async fn fetch_tuples(
        &self,
        table: &str,
        columns: &[String],
    ) -> anyhow::Result<Vec<Vec<SqlValue>>> {
        let mut conn = self.conn().await?;
        let sql = format!(
            "SELECT DISTINCT {} FROM {}",
            column_list(columns),
            quote_ident(table)
        );
        let width = columns.len();
        let mut tuples = Vec::new();
        let mut result = conn.exec_iter(sql, ()).await?;
        result
            .for_each(|mut row| {
                let tuple = (0..width)
                    .map(|i| from_mysql_value(row.take::<Value, _>(i).unwrap_or(Value::NULL)))
                    .collect();
                tuples.push(tuple);
            })
            .await?;
        Ok(tuples)
    }

    async fn secondary_indexes(&self, table: &str) -> anyhow::Result<Vec<IndexDef>> {
        let mut conn = self.conn().await?;
        let rows: Vec<(String, i64, String, Option<u32>)> = conn
            .exec(
                "SELECT INDEX_NAME, NON_UNIQUE, COLUMN_NAME, SUB_PART
                 FROM information_schema.STATISTICS
                 WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND INDEX_NAME <> 'PRIMARY'
                 ORDER BY INDEX_NAME, SEQ_IN_INDEX",
                (table,),
            )
            .await?;

        let mut indexes: Vec<IndexDef> = Vec::new();
        for (name, non_unique, column, sub_part) in rows {
            let column = IndexColumn {
                name: column,
                sub_part,
            };
            match indexes.last_mut() {
                Some(ix) if ix.name == name => ix.columns.push(column),
                _ => indexes.push(IndexDef {
                    name,
                    unique: non_unique == 0,
                    columns: vec![column],
                }),
            }
        }
        Ok(indexes)
    }

    async fn fk_column_sets(&self, table: &str) -> anyhow::Result<Vec<Vec<String>>> {
        let mut conn = self.conn().await?;
        let rows: Vec<(String, String)> = conn
            .exec(
                "SELECT CONSTRAINT_NAME, COLUMN_NAME
                 FROM information_schema.KEY_COLUMN_USAGE
                 WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
                   AND REFERENCED_TABLE_NAME IS NOT NULL
                 ORDER BY CONSTRAINT_NAME, ORDINAL_POSITION",
                (table,),
            )
            .await?;

        let mut sets: Vec<(String, Vec<String>)> = Vec::new();
        for (constraint, column) in rows {
            match sets.last_mut() {
                Some((name, columns)) if *name == constraint => columns.push(column),
                _ => sets.push((constraint, vec![column])),
            }
        }
        Ok(sets.into_iter().map(|(_, columns)| columns).collect())
    }

    async fn execute(&self, sql: &str) -> anyhow::Result<()> {
        let mut conn = self.conn().await?;
        conn.query_drop(sql).await?;
        Ok(())
    }

    async fn insert_rows(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Row],
    ) -> anyhow::Result<()> {
        if rows.is_empty() || columns.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn().await?;
        for chunk in rows.chunks(rows_per_statement(columns.len())) {
            self.insert_chunk(&mut conn, table, columns, chunk).await?;
        }
        Ok(())
    }

    async fn load_rows(&self, table: &str, columns: &[String], rows: &[Row]) -> anyhow::Result<()> {
        if rows.is_empty() || columns.is_empty() {
            return Ok(());
        }
        let payload = encode_rows(rows).freeze();
        let chunks: Vec<std::io::Result<Bytes>> = (0..payload.len())
            .step_by(INFILE_CHUNK)
            .map(|start| Ok(payload.slice(start..(start + INFILE_CHUNK).min(payload.len()))))
            .collect();

        let mut conn = self.conn().await?;
        conn.set_infile_handler(async move {
            Ok::<_, mysql_async::Error>(futures::stream::iter(chunks).boxed())
        });
        conn.query_drop(load_statement(table, columns)).await?;
        Ok(())
    }

    /// Close the pool. The relaxed FK and unique checks are session
    /// variables, so they end with the pooled sessions; the server-wide
    /// settings are never touched.
    async fn finish(&self) -> anyhow::Result<()> {
        self.pool.clone().disconnect().await?;
        Ok(())
    }
}

#[async_trait]
impl QueryRunner for MySqlTarget {
    async fn run_query(&self, sql: &str) -> anyhow::Result<usize> {
        let mut conn = self.conn().await?;
        let mut rows = 0;
        conn.query_iter(sql)
            .await?
            .for_each_and_drop(|_| rows += 1)
            .await?;
        Ok(rows)
    }

    async fn sample_rows(
        &self,
        table: &str,
        columns: &[String],
        limit: usize,
    ) -> anyhow::Result<Vec<Vec<SqlValue>>> {
        let mut conn = self.conn().await?;
        let sql = format!(
            "SELECT {} FROM {} LIMIT {}",
            column_list(columns),
            quote_ident(table),
            limit
        );
        let width = columns.len();
        let mut rows = Vec::new();
        let mut result = conn.exec_iter(sql, ()).await?;
        result
            .for_each(|mut row| {
                rows.push(
                    (0..width)
                        .map(|i| from_mysql_value(row.take::<Value, _>(i).unwrap_or(Value::NULL)))
                        .collect(),
                );
            })
            .await?;
        Ok(rows)
    }
}

/// Bind a generated value as a statement parameter
pub fn to_mysql_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::NULL,
        SqlValue::Int(n) => Value::Int(*n),
        SqlValue::UInt(n) => Value::UInt(*n),
        SqlValue::Float(v) => Value::Double(*v),
        SqlValue::Bool(b) => Value::Int(*b as i64),
        SqlValue::Decimal(s) | SqlValue::String(s) | SqlValue::Time(s) => {
            Value::Bytes(s.as_bytes().to_vec())
        }
        SqlValue::Bytes(b) => Value::Bytes(b.clone()),
        SqlValue::Date(d) => date_value(d, 0, 0, 0, 0),
        SqlValue::DateTime(dt) => date_value(
            &dt.date(),
            dt.hour() as u8,
            dt.minute() as u8,
            dt.second() as u8,
            dt.nanosecond() / 1_000,
        ),
    }
}

fn date_value(date: &NaiveDate, hour: u8, minute: u8, second: u8, micros: u32) -> Value {
    Value::Date(
        date.year().clamp(0, 9999) as u16,
        date.month() as u8,
        date.day() as u8,
        hour,
        minute,
        second,
        micros,
    )
}

/// Convert a fetched value (binary protocol) back into the generator's model
pub fn from_mysql_value(value: Value) -> SqlValue {
    match value {
        Value::NULL => SqlValue::Null,
        Value::Int(n) => SqlValue::Int(n),
        Value::UInt(n) => SqlValue::UInt(n),
        Value::Float(v) => SqlValue::Float(v as f64),
        Value::Double(v) => SqlValue::Float(v),
        Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(s) => SqlValue::String(s),
            Err(e) => SqlValue::Bytes(e.into_bytes()),
        },
        Value::Date(y, m, d, h, mi, s, us) => {
            let date = NaiveDate::from_ymd_opt(y as i32, m as u32, d as u32);
            let time = NaiveTime::from_hms_micro_opt(h as u32, mi as u32, s as u32, us);
            match (date, time) {
                (Some(date), Some(time)) if time == NaiveTime::MIN => SqlValue::Date(date),
                (Some(date), Some(time)) => SqlValue::DateTime(NaiveDateTime::new(date, time)),
                _ => SqlValue::String(format!(
                    "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                    y, m, d, h, mi, s
                )),
            }
        }
        Value::Time(negative, days, h, mi, s, _) => {
            let hours = days * 24 + h as u32;
            SqlValue::Time(format!(
                "{}{:02}:{:02}:{:02}",
                if negative { "-" } else { "" },
                hours,
                mi,
                s
            ))
        }
    }
}
