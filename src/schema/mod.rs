//! Schema facts consumed by the seeding pipeline.
//!
//! This module provides:
//! - Data models for tables, columns, foreign keys and unique indexes
//! - MySQL type classification used by the row generators
//! - Attachment of configuration-declared ("logical") foreign keys
//! - Dependency resolution over the FK graph (see [`graph`])

mod graph;
pub mod introspect;

pub use graph::*;

use ahash::AHashMap;
use anyhow::bail;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;

static ENUM_VALUE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"'([^']*)'").unwrap());

/// Unique identifier for a table within a schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub u32);

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TableId({})", self.0)
    }
}

/// MySQL data type classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    TinyInt,
    SmallInt,
    MediumInt,
    Int,
    BigInt,
    /// `tinyint(1)` / `bool` / `boolean`
    Bool,
    Float,
    Double,
    Decimal,
    Char,
    VarChar,
    TinyText,
    /// TEXT, MEDIUMTEXT, LONGTEXT
    Text,
    Date,
    DateTime,
    Timestamp,
    Time,
    Year,
    Json,
    /// BLOB family, BINARY, VARBINARY
    Binary,
    Bit,
    Enum,
    Set,
    Other(String),
}

impl ColumnType {
    /// Classify a MySQL column type string such as `int(10) unsigned` or `varchar(255)`
    pub fn from_sql_type(column_type: &str) -> Self {
        let type_lower = column_type.to_lowercase();
        let base_type = type_lower
            .split(|c: char| c == '(' || c.is_whitespace())
            .next()
            .unwrap_or(&type_lower)
            .trim();

        match base_type {
            "tinyint" if type_lower.starts_with("tinyint(1)") => ColumnType::Bool,
            "bool" | "boolean" => ColumnType::Bool,
            "tinyint" => ColumnType::TinyInt,
            "smallint" => ColumnType::SmallInt,
            "mediumint" => ColumnType::MediumInt,
            "int" | "integer" => ColumnType::Int,
            "bigint" => ColumnType::BigInt,
            "float" => ColumnType::Float,
            "double" | "real" => ColumnType::Double,
            "decimal" | "numeric" | "dec" | "fixed" => ColumnType::Decimal,
            "char" => ColumnType::Char,
            "varchar" => ColumnType::VarChar,
            "tinytext" => ColumnType::TinyText,
            "text" | "mediumtext" | "longtext" => ColumnType::Text,
            "date" => ColumnType::Date,
            "datetime" => ColumnType::DateTime,
            "timestamp" => ColumnType::Timestamp,
            "time" => ColumnType::Time,
            "year" => ColumnType::Year,
            "json" => ColumnType::Json,
            "blob" | "tinyblob" | "mediumblob" | "longblob" | "binary" | "varbinary" => {
                ColumnType::Binary
            }
            "bit" => ColumnType::Bit,
            "enum" => ColumnType::Enum,
            "set" => ColumnType::Set,
            _ => ColumnType::Other(column_type.to_string()),
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ColumnType::TinyInt
                | ColumnType::SmallInt
                | ColumnType::MediumInt
                | ColumnType::Int
                | ColumnType::BigInt
        )
    }

    pub fn is_string(&self) -> bool {
        matches!(
            self,
            ColumnType::Char | ColumnType::VarChar | ColumnType::TinyText | ColumnType::Text
        )
    }

    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            ColumnType::Date | ColumnType::DateTime | ColumnType::Timestamp
        )
    }

    /// Floating point and fixed point numbers
    pub fn is_fractional(&self) -> bool {
        matches!(
            self,
            ColumnType::Float | ColumnType::Double | ColumnType::Decimal
        )
    }
}

/// Foreign key attached to a single column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    /// Referenced table name
    pub referenced_table: String,
    /// Referenced column name
    pub referenced_column: String,
    /// Declared in configuration rather than by the catalog
    pub logical: bool,
}

impl ForeignKey {
    /// Cache key for the referenced column (`table.column`)
    pub fn target_key(&self) -> String {
        format!("{}.{}", self.referenced_table, self.referenced_column)
    }
}

/// Column definition within a table
#[derive(Debug, Clone)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Lowercase data type (`int`, `varchar`, ...)
    pub data_type: String,
    /// Full column type (`int(10) unsigned`, `enum('a','b')`, ...)
    pub column_type: String,
    /// Classified type
    pub col_type: ColumnType,
    pub is_nullable: bool,
    pub is_auto_increment: bool,
    /// Generated/computed column, never written to
    pub is_generated: bool,
    pub is_primary_key: bool,
    /// Single-column unique constraint
    pub is_unique: bool,
    pub is_unsigned: bool,
    pub max_length: Option<u64>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    /// Members of an ENUM or SET type
    pub enum_values: Vec<String>,
    pub foreign_key: Option<ForeignKey>,
}

impl Column {
    /// Build a column from its full MySQL type string.
    ///
    /// Length, precision and scale are taken from the type's parenthesised
    /// arguments; introspection overwrites them with catalog values.
    pub fn new(name: impl Into<String>, column_type: &str) -> Self {
        let type_lower = column_type.to_lowercase();
        let data_type = type_lower
            .split(|c: char| c == '(' || c.is_whitespace())
            .next()
            .unwrap_or_default()
            .to_string();
        let col_type = ColumnType::from_sql_type(column_type);

        let enum_values = if matches!(col_type, ColumnType::Enum | ColumnType::Set) {
            parse_enum_values(column_type)
        } else {
            Vec::new()
        };

        let args: Vec<u64> = type_args(&type_lower)
            .map(|args| {
                args.split(',')
                    .filter_map(|a| a.trim().parse::<u64>().ok())
                    .collect()
            })
            .unwrap_or_default();

        let (max_length, precision, scale) = match col_type {
            ColumnType::Char | ColumnType::VarChar | ColumnType::Binary => {
                (args.first().copied(), None, None)
            }
            ColumnType::Decimal | ColumnType::Float | ColumnType::Double => (
                None,
                args.first().map(|&p| p as u32),
                args.get(1).map(|&s| s as u32),
            ),
            _ => (None, None, None),
        };

        Self {
            name: name.into(),
            data_type,
            column_type: column_type.to_string(),
            col_type,
            is_nullable: false,
            is_auto_increment: false,
            is_generated: false,
            is_primary_key: false,
            is_unique: false,
            is_unsigned: type_lower.contains("unsigned"),
            max_length,
            precision,
            scale,
            enum_values,
            foreign_key: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.is_nullable = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.is_auto_increment = true;
        self
    }

    pub fn generated(mut self) -> Self {
        self.is_generated = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    /// Attach a foreign key to `table.column`
    pub fn references(mut self, table: &str, column: &str) -> Self {
        self.foreign_key = Some(ForeignKey {
            referenced_table: table.to_string(),
            referenced_column: column.to_string(),
            logical: false,
        });
        self
    }

    /// Whether the seeder writes this column at all
    pub fn is_writable(&self) -> bool {
        !self.is_auto_increment && !self.is_generated
    }
}

/// Extract the members of an `enum(...)` or `set(...)` type
pub fn parse_enum_values(column_type: &str) -> Vec<String> {
    ENUM_VALUE_RE
        .captures_iter(column_type)
        .map(|c| c[1].to_string())
        .collect()
}

fn type_args(type_lower: &str) -> Option<&str> {
    let start = type_lower.find('(')?;
    let end = type_lower[start..].find(')')? + start;
    Some(&type_lower[start + 1..end])
}

/// Unique index spanning one or more columns (primary key excluded)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueIndex {
    pub name: String,
    pub columns: Vec<String>,
}

/// Table definition
#[derive(Debug, Clone)]
pub struct Table {
    /// Table name
    pub name: String,
    /// Column definitions in declaration order
    pub columns: Vec<Column>,
    /// Unique indexes, excluding the primary key
    pub unique_indexes: Vec<UniqueIndex>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
            unique_indexes: Vec::new(),
        }
    }

    pub fn with_unique_index(mut self, name: &str, columns: &[&str]) -> Self {
        self.unique_indexes.push(UniqueIndex {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    /// Get a column by name (case-insensitive)
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    fn get_column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns
            .iter_mut()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Primary key columns in declaration order
    pub fn primary_key_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.is_primary_key)
    }

    /// Columns carrying a foreign key
    pub fn fk_columns(&self) -> impl Iterator<Item = (&Column, &ForeignKey)> {
        self.columns
            .iter()
            .filter_map(|c| c.foreign_key.as_ref().map(|fk| (c, fk)))
    }

    /// Columns the seeder writes (no auto-increment, no generated columns)
    pub fn writable_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.is_writable())
    }

    /// Unique indexes with more than one column
    pub fn composite_unique_indexes(&self) -> impl Iterator<Item = &UniqueIndex> {
        self.unique_indexes.iter().filter(|u| u.columns.len() > 1)
    }
}

/// Complete set of known tables
#[derive(Debug, Default, Clone)]
pub struct Schema {
    /// Map from lowercase table name to table ID
    ids: AHashMap<String, TableId>,
    /// Tables indexed by TableId
    tables: Vec<Table>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tables(tables: impl IntoIterator<Item = Table>) -> Self {
        let mut schema = Self::new();
        for table in tables {
            schema.add_table(table);
        }
        schema
    }

    /// Add a table, returning its ID. A table with the same name is replaced.
    pub fn add_table(&mut self, table: Table) -> TableId {
        let key = table.name.to_lowercase();
        if let Some(&id) = self.ids.get(&key) {
            self.tables[id.0 as usize] = table;
            return id;
        }
        let id = TableId(self.tables.len() as u32);
        self.ids.insert(key, id);
        self.tables.push(table);
        id
    }

    /// Get table ID by name (case-insensitive)
    pub fn get_table_id(&self, name: &str) -> Option<TableId> {
        self.ids.get(&name.to_lowercase()).copied()
    }

    pub fn table(&self, id: TableId) -> &Table {
        &self.tables[id.0 as usize]
    }

    /// Get table by name (case-insensitive)
    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.get_table_id(name).map(|id| self.table(id))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Iterate over all tables in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter()
    }

    /// Attach logical foreign keys declared as `table -> column -> "RefTable.RefColumn"`.
    ///
    /// A logical reference replaces any catalog FK on the same column.
    pub fn apply_references(
        &mut self,
        references: &BTreeMap<String, BTreeMap<String, String>>,
    ) -> anyhow::Result<()> {
        for (table_name, columns) in references {
            let Some(id) = self.get_table_id(table_name) else {
                bail!("references: unknown table '{}'", table_name);
            };
            for (column_name, target) in columns {
                let Some((ref_table, ref_column)) = target.split_once('.') else {
                    bail!(
                        "references: {}.{} must be \"Table.Column\", got '{}'",
                        table_name,
                        column_name,
                        target
                    );
                };
                let Some(ref_id) = self.get_table_id(ref_table) else {
                    bail!(
                        "references: {}.{} points at unknown table '{}'",
                        table_name,
                        column_name,
                        ref_table
                    );
                };
                let ref_table_name = self.table(ref_id).name.clone();
                if self.table(ref_id).get_column(ref_column).is_none() {
                    bail!(
                        "references: {}.{} points at unknown column '{}'",
                        table_name,
                        column_name,
                        target
                    );
                }

                let table = &mut self.tables[id.0 as usize];
                let Some(column) = table.get_column_mut(column_name) else {
                    bail!(
                        "references: table '{}' has no column '{}'",
                        table_name,
                        column_name
                    );
                };
                column.foreign_key = Some(ForeignKey {
                    referenced_table: ref_table_name,
                    referenced_column: ref_column.to_string(),
                    logical: true,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_type_classification() {
        assert_eq!(ColumnType::from_sql_type("tinyint(1)"), ColumnType::Bool);
        assert_eq!(ColumnType::from_sql_type("tinyint(4)"), ColumnType::TinyInt);
        assert_eq!(
            ColumnType::from_sql_type("int(10) unsigned"),
            ColumnType::Int
        );
        assert_eq!(ColumnType::from_sql_type("longtext"), ColumnType::Text);
        assert_eq!(ColumnType::from_sql_type("varbinary(16)"), ColumnType::Binary);
        assert!(matches!(
            ColumnType::from_sql_type("geometry"),
            ColumnType::Other(_)
        ));
    }

    #[test]
    fn test_column_new_parses_type_arguments() {
        let c = Column::new("price", "decimal(8,3)");
        assert_eq!(c.precision, Some(8));
        assert_eq!(c.scale, Some(3));

        let c = Column::new("code", "varchar(12)");
        assert_eq!(c.max_length, Some(12));
        assert_eq!(c.data_type, "varchar");

        let c = Column::new("qty", "int unsigned");
        assert!(c.is_unsigned);
    }

    #[test]
    fn test_parse_enum_values() {
        let c = Column::new("status", "enum('active','banned','')");
        assert_eq!(c.enum_values, vec!["active", "banned", ""]);
    }

    #[test]
    fn test_apply_references() {
        let mut schema = Schema::from_tables([
            Table::new("teams", vec![Column::new("id", "int").primary_key()]),
            Table::new(
                "users",
                vec![
                    Column::new("id", "int").primary_key(),
                    Column::new("team_ref", "int"),
                ],
            ),
        ]);

        let mut refs = BTreeMap::new();
        refs.insert(
            "users".to_string(),
            BTreeMap::from([("team_ref".to_string(), "Teams.id".to_string())]),
        );
        schema.apply_references(&refs).unwrap();

        let fk = schema
            .get_table("users")
            .unwrap()
            .get_column("team_ref")
            .unwrap()
            .foreign_key
            .clone()
            .unwrap();
        assert_eq!(fk.referenced_table, "teams");
        assert!(fk.logical);
    }

    #[test]
    fn test_apply_references_rejects_malformed_target() {
        let mut schema = Schema::from_tables([Table::new(
            "users",
            vec![Column::new("team_ref", "int")],
        )]);
        let mut refs = BTreeMap::new();
        refs.insert(
            "users".to_string(),
            BTreeMap::from([("team_ref".to_string(), "teams".to_string())]),
        );
        assert!(schema.apply_references(&refs).is_err());
    }
}
