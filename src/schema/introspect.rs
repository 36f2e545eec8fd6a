//! Schema facts read from MySQL's `information_schema`.
//!
//! Columns, native foreign keys and unique indexes of the current database
//! are fetched with three queries and folded into a [`Schema`].

use super::{Column, Schema, Table, UniqueIndex};
use ahash::AHashMap;
use mysql_async::prelude::*;
use mysql_async::{Conn, Row};
use std::collections::BTreeMap;

const COLUMNS_QUERY: &str = "
    SELECT c.TABLE_NAME, c.COLUMN_NAME, c.DATA_TYPE, c.COLUMN_TYPE, c.IS_NULLABLE,
           c.COLUMN_KEY, c.EXTRA, c.CHARACTER_MAXIMUM_LENGTH, c.NUMERIC_PRECISION,
           c.NUMERIC_SCALE
    FROM information_schema.COLUMNS c
    JOIN information_schema.TABLES t
      ON t.TABLE_SCHEMA = c.TABLE_SCHEMA AND t.TABLE_NAME = c.TABLE_NAME
    WHERE c.TABLE_SCHEMA = DATABASE() AND t.TABLE_TYPE = 'BASE TABLE'
    ORDER BY c.TABLE_NAME, c.ORDINAL_POSITION";

const FOREIGN_KEYS_QUERY: &str = "
    SELECT TABLE_NAME, COLUMN_NAME, REFERENCED_TABLE_NAME, REFERENCED_COLUMN_NAME
    FROM information_schema.KEY_COLUMN_USAGE
    WHERE TABLE_SCHEMA = DATABASE() AND REFERENCED_TABLE_NAME IS NOT NULL
    ORDER BY TABLE_NAME, CONSTRAINT_NAME, ORDINAL_POSITION";

const UNIQUE_INDEXES_QUERY: &str = "
    SELECT TABLE_NAME, INDEX_NAME, COLUMN_NAME
    FROM information_schema.STATISTICS
    WHERE TABLE_SCHEMA = DATABASE() AND NON_UNIQUE = 0 AND INDEX_NAME <> 'PRIMARY'
    ORDER BY TABLE_NAME, INDEX_NAME, SEQ_IN_INDEX";

/// One row of `information_schema.COLUMNS`
#[derive(Debug, Clone, Default)]
pub struct ColumnRow {
    pub table: String,
    pub name: String,
    pub data_type: String,
    pub column_type: String,
    pub nullable: bool,
    /// `PRI`, `UNI`, `MUL` or empty
    pub key: String,
    pub extra: String,
    pub char_max_length: Option<u64>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
}

/// One FK column from `KEY_COLUMN_USAGE`
#[derive(Debug, Clone)]
pub struct ForeignKeyRow {
    pub table: String,
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

/// One column of a unique index from `STATISTICS`
#[derive(Debug, Clone)]
pub struct UniqueIndexRow {
    pub table: String,
    pub index: String,
    pub column: String,
}

/// Load every base table of the connection's current database
pub async fn load_schema(conn: &mut Conn) -> anyhow::Result<Schema> {
    let columns = conn
        .query::<Row, _>(COLUMNS_QUERY)
        .await?
        .into_iter()
        .map(column_row)
        .collect::<anyhow::Result<Vec<_>>>()?;

    let foreign_keys = conn
        .query::<Row, _>(FOREIGN_KEYS_QUERY)
        .await?
        .into_iter()
        .map(|row| {
            Ok(ForeignKeyRow {
                table: required(&row, 0, "TABLE_NAME")?,
                column: required(&row, 1, "COLUMN_NAME")?,
                referenced_table: required(&row, 2, "REFERENCED_TABLE_NAME")?,
                referenced_column: required(&row, 3, "REFERENCED_COLUMN_NAME")?,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let unique_indexes = conn
        .query::<Row, _>(UNIQUE_INDEXES_QUERY)
        .await?
        .into_iter()
        .map(|row| {
            Ok(UniqueIndexRow {
                table: required(&row, 0, "TABLE_NAME")?,
                index: required(&row, 1, "INDEX_NAME")?,
                column: required(&row, 2, "COLUMN_NAME")?,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    tracing::debug!(
        columns = columns.len(),
        foreign_keys = foreign_keys.len(),
        unique_index_columns = unique_indexes.len(),
        "loaded schema metadata"
    );

    Ok(build_schema(columns, foreign_keys, unique_indexes))
}

fn required(row: &Row, idx: usize, name: &str) -> anyhow::Result<String> {
    row.get::<Option<String>, _>(idx)
        .flatten()
        .ok_or_else(|| anyhow::anyhow!("information_schema: missing {}", name))
}

fn optional<T: FromValue>(row: &Row, idx: usize) -> Option<T> {
    row.get::<Option<T>, _>(idx).flatten()
}

fn column_row(row: Row) -> anyhow::Result<ColumnRow> {
    Ok(ColumnRow {
        table: required(&row, 0, "TABLE_NAME")?,
        name: required(&row, 1, "COLUMN_NAME")?,
        data_type: required(&row, 2, "DATA_TYPE")?,
        column_type: required(&row, 3, "COLUMN_TYPE")?,
        nullable: required(&row, 4, "IS_NULLABLE")?.eq_ignore_ascii_case("YES"),
        key: optional(&row, 5).unwrap_or_default(),
        extra: optional(&row, 6).unwrap_or_default(),
        char_max_length: optional(&row, 7),
        precision: optional(&row, 8),
        scale: optional(&row, 9),
    })
}

/// Fold catalog rows into a schema. Rows are expected in catalog order
/// (ordinal position, sequence in index).
pub fn build_schema(
    columns: Vec<ColumnRow>,
    foreign_keys: Vec<ForeignKeyRow>,
    unique_indexes: Vec<UniqueIndexRow>,
) -> Schema {
    let mut tables: Vec<Table> = Vec::new();
    let mut positions: AHashMap<String, usize> = AHashMap::new();

    for row in columns {
        let pos = *positions
            .entry(row.table.to_lowercase())
            .or_insert_with(|| {
                tables.push(Table::new(row.table.clone(), Vec::new()));
                tables.len() - 1
            });
        tables[pos].columns.push(to_column(row));
    }

    for fk in foreign_keys {
        let Some(&pos) = positions.get(&fk.table.to_lowercase()) else {
            continue;
        };
        if let Some(column) = tables[pos].get_column_mut(&fk.column) {
            *column = column
                .clone()
                .references(&fk.referenced_table, &fk.referenced_column);
        }
    }

    let mut grouped: BTreeMap<(usize, String), Vec<String>> = BTreeMap::new();
    for row in unique_indexes {
        let Some(&pos) = positions.get(&row.table.to_lowercase()) else {
            continue;
        };
        grouped.entry((pos, row.index)).or_default().push(row.column);
    }
    for ((pos, name), columns) in grouped {
        tables[pos].unique_indexes.push(UniqueIndex { name, columns });
    }

    Schema::from_tables(tables)
}

fn to_column(row: ColumnRow) -> Column {
    let mut column = Column::new(row.name, &row.column_type);
    column.data_type = row.data_type.to_lowercase();
    column.is_nullable = row.nullable;
    column.is_primary_key = row.key.eq_ignore_ascii_case("PRI");
    column.is_unique = row.key.eq_ignore_ascii_case("UNI");

    let extra = row.extra.to_lowercase();
    column.is_auto_increment = extra.contains("auto_increment");
    column.is_generated =
        extra.contains("virtual generated") || extra.contains("stored generated");

    if column.col_type.is_string() && column.max_length.is_none() {
        column.max_length = row.char_max_length;
    }
    if column.precision.is_none() {
        column.precision = row.precision;
    }
    if column.scale.is_none() {
        column.scale = row.scale;
    }
    column
}
