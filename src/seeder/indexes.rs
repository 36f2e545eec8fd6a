//! Secondary-index deferral.
//!
//! Maintaining secondary indexes row by row dominates bulk-insert cost, so
//! they can be dropped before a table is filled and re-created afterwards in
//! a single `ALTER TABLE`. An index that is the only one able to back a
//! foreign key cannot be dropped (MySQL rejects it) and stays in place.

use serde::Serialize;

/// One column of an index, with its optional prefix length
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexColumn {
    pub name: String,
    pub sub_part: Option<u32>,
}

impl IndexColumn {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sub_part: None,
        }
    }

    pub fn prefixed(name: impl Into<String>, sub_part: u32) -> Self {
        Self {
            name: name.into(),
            sub_part: Some(sub_part),
        }
    }
}

/// A non-primary index as read from `information_schema.STATISTICS`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexDef {
    pub name: String,
    pub unique: bool,
    /// Columns in index order
    pub columns: Vec<IndexColumn>,
}

impl IndexDef {
    /// Whether this index can back an FK over `fk_columns`: the FK columns
    /// must be a left prefix of the index columns (case-insensitive).
    pub fn backs(&self, fk_columns: &[String]) -> bool {
        !fk_columns.is_empty()
            && fk_columns.len() <= self.columns.len()
            && fk_columns
                .iter()
                .zip(&self.columns)
                .all(|(fk, ix)| fk.eq_ignore_ascii_case(&ix.name))
    }
}

/// Indexes that may be dropped without orphaning a foreign key.
///
/// For every FK column set, the first index able to back it is kept.
pub fn droppable_indexes(indexes: &[IndexDef], fk_column_sets: &[Vec<String>]) -> Vec<IndexDef> {
    let mut keep = vec![false; indexes.len()];
    for fk in fk_column_sets {
        let already_backed = indexes
            .iter()
            .zip(&keep)
            .any(|(ix, &kept)| kept && ix.backs(fk));
        if already_backed {
            continue;
        }
        if let Some(pos) = indexes.iter().position(|ix| ix.backs(fk)) {
            keep[pos] = true;
        }
    }

    indexes
        .iter()
        .zip(keep)
        .filter(|(_, kept)| !kept)
        .map(|(ix, _)| ix.clone())
        .collect()
}

/// `ALTER TABLE` dropping every index in one statement
pub fn build_drop_statement(table: &str, indexes: &[IndexDef]) -> Option<String> {
    if indexes.is_empty() {
        return None;
    }
    let clauses: Vec<String> = indexes
        .iter()
        .map(|ix| format!("DROP INDEX {}", quote_ident(&ix.name)))
        .collect();
    Some(format!(
        "ALTER TABLE {} {}",
        quote_ident(table),
        clauses.join(", ")
    ))
}

/// `ALTER TABLE` re-creating every index in one statement, preserving
/// uniqueness and prefix lengths
pub fn build_restore_statement(table: &str, indexes: &[IndexDef]) -> Option<String> {
    if indexes.is_empty() {
        return None;
    }
    let clauses: Vec<String> = indexes
        .iter()
        .map(|ix| {
            let columns: Vec<String> = ix
                .columns
                .iter()
                .map(|c| match c.sub_part {
                    Some(len) => format!("{}({})", quote_ident(&c.name), len),
                    None => quote_ident(&c.name),
                })
                .collect();
            format!(
                "ADD {}INDEX {} ({})",
                if ix.unique { "UNIQUE " } else { "" },
                quote_ident(&ix.name),
                columns.join(", ")
            )
        })
        .collect();
    Some(format!(
        "ALTER TABLE {} {}",
        quote_ident(table),
        clauses.join(", ")
    ))
}

/// Backtick-quote a MySQL identifier
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(name: &str, unique: bool, columns: &[&str]) -> IndexDef {
        IndexDef {
            name: name.into(),
            unique,
            columns: columns.iter().map(|c| IndexColumn::new(*c)).collect(),
        }
    }

    #[test]
    fn test_left_prefix_match() {
        let ix = index("ix", false, &["company_id", "created_at"]);
        assert!(ix.backs(&["COMPANY_ID".to_string()]));
        assert!(!ix.backs(&["created_at".to_string()]));
        assert!(!ix.backs(&[]));
    }

    #[test]
    fn test_quote_ident_escapes_backticks() {
        assert_eq!(quote_ident("we`ird"), "`we``ird`");
    }
}
