//! Cross-table FK correlation detection.
//!
//! A table with FK columns `company_id -> company.id` and
//! `voucher_id -> voucher.id`, where `voucher.company_id -> company.id`,
//! must pick `company_id` as the company of the chosen voucher. The voucher
//! column drives; the company column is derived through a lookup built from
//! the voucher table.

use super::SqlValue;
use crate::schema::{Schema, Table};
use ahash::{AHashMap, AHashSet};

/// A derived FK column and where its value comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FkCorrelation {
    /// Column whose value is looked up
    pub derived_column: String,
    /// Column whose picked parent row decides the derived value
    pub driver_column: String,
    /// Table the driver references
    pub parent_table: String,
    /// Column of `parent_table` the driver references
    pub parent_key_column: String,
    /// Column of `parent_table` that references the derived column's target
    pub parent_fk_column: String,
}

/// Driver value (by string form) to derived value
#[derive(Debug, Clone, Default)]
pub struct FkLookup {
    pub derived_column: String,
    pub driver_column: String,
    pub mapping: AHashMap<String, SqlValue>,
}

impl FkLookup {
    /// Build from `(parent key, parent fk)` pairs
    pub fn from_pairs(
        correlation: &FkCorrelation,
        pairs: impl IntoIterator<Item = (SqlValue, SqlValue)>,
    ) -> Self {
        let mapping = pairs
            .into_iter()
            .filter(|(key, _)| !key.is_null())
            .map(|(key, value)| (key.key(), value))
            .collect();
        Self {
            derived_column: correlation.derived_column.clone(),
            driver_column: correlation.driver_column.clone(),
            mapping,
        }
    }

    /// Derived value for a driver value, NULL when unknown
    pub fn derive(&self, driver: &SqlValue) -> SqlValue {
        if driver.is_null() {
            return SqlValue::Null;
        }
        self.mapping
            .get(&driver.key())
            .cloned()
            .unwrap_or(SqlValue::Null)
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}

/// Pair up FK columns of `table` whose parents link to each other.
///
/// A column is derived at most once, a derived column never drives, and a
/// column referencing the same target as its would-be driver is skipped.
pub fn detect_fk_correlations(table: &Table, schema: &Schema) -> Vec<FkCorrelation> {
    let fk_columns: Vec<_> = table.fk_columns().collect();
    if fk_columns.len() < 2 {
        return Vec::new();
    }

    let mut result = Vec::new();
    let mut derived: AHashSet<&str> = AHashSet::new();
    let mut drivers: AHashSet<&str> = AHashSet::new();

    for &(col_a, fk_a) in &fk_columns {
        if drivers.contains(col_a.name.as_str()) {
            continue;
        }
        for &(col_b, fk_b) in &fk_columns {
            if col_a.name == col_b.name || derived.contains(col_b.name.as_str()) {
                continue;
            }
            if fk_a.referenced_table.eq_ignore_ascii_case(&fk_b.referenced_table)
                && fk_a.referenced_column.eq_ignore_ascii_case(&fk_b.referenced_column)
            {
                continue;
            }
            let Some(parent_b) = schema.get_table(&fk_b.referenced_table) else {
                continue;
            };

            let link = parent_b.fk_columns().find(|(_, pfk)| {
                pfk.referenced_table.eq_ignore_ascii_case(&fk_a.referenced_table)
                    && pfk.referenced_column.eq_ignore_ascii_case(&fk_a.referenced_column)
            });

            if let Some((parent_col, _)) = link {
                result.push(FkCorrelation {
                    derived_column: col_a.name.clone(),
                    driver_column: col_b.name.clone(),
                    parent_table: parent_b.name.clone(),
                    parent_key_column: fk_b.referenced_column.clone(),
                    parent_fk_column: parent_col.name.clone(),
                });
                derived.insert(col_a.name.as_str());
                drivers.insert(col_b.name.as_str());
                break;
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;

    fn schema() -> Schema {
        Schema::from_tables([
            Table::new("company", vec![Column::new("id", "int").primary_key()]),
            Table::new(
                "voucher",
                vec![
                    Column::new("id", "int").primary_key(),
                    Column::new("companyId", "int").references("company", "id"),
                ],
            ),
            Table::new(
                "child",
                vec![
                    Column::new("id", "int").primary_key(),
                    Column::new("companyId", "int").references("company", "id"),
                    Column::new("voucherId", "int").references("voucher", "id"),
                ],
            ),
        ])
    }

    #[test]
    fn test_detects_company_through_voucher() {
        let schema = schema();
        let found = detect_fk_correlations(schema.get_table("child").unwrap(), &schema);
        assert_eq!(
            found,
            vec![FkCorrelation {
                derived_column: "companyId".into(),
                driver_column: "voucherId".into(),
                parent_table: "voucher".into(),
                parent_key_column: "id".into(),
                parent_fk_column: "companyId".into(),
            }]
        );
    }

    #[test]
    fn test_same_target_columns_are_not_paired() {
        let schema = Schema::from_tables([
            Table::new("users", vec![Column::new("id", "int").primary_key()]),
            Table::new(
                "messages",
                vec![
                    Column::new("sender", "int").references("users", "id"),
                    Column::new("recipient", "int").references("users", "id"),
                ],
            ),
        ]);
        let t = schema.get_table("messages").unwrap();
        assert!(detect_fk_correlations(t, &schema).is_empty());
    }

    #[test]
    fn test_lookup_derives_by_string_form() {
        let corr = FkCorrelation {
            derived_column: "companyId".into(),
            driver_column: "voucherId".into(),
            parent_table: "voucher".into(),
            parent_key_column: "id".into(),
            parent_fk_column: "companyId".into(),
        };
        let lookup = FkLookup::from_pairs(
            &corr,
            [(SqlValue::Int(7), SqlValue::Int(3)), (SqlValue::Null, SqlValue::Int(1))],
        );
        assert_eq!(lookup.len(), 1);
        assert_eq!(lookup.derive(&SqlValue::UInt(7)), SqlValue::Int(3));
        assert_eq!(lookup.derive(&SqlValue::Int(8)), SqlValue::Null);
        assert_eq!(lookup.derive(&SqlValue::Null), SqlValue::Null);
    }
}
