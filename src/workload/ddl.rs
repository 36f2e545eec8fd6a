//! DDL scripts that set up the tables of a test run.

use crate::seeder::indexes::quote_ident;
use crate::seeder::SeedTarget;
use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

static CREATE_TABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?`?(\w+)`?").unwrap()
});

/// Statements of a DDL file and the tables it creates, in file order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DdlScript {
    pub statements: Vec<String>,
    pub tables: Vec<String>,
}

impl DdlScript {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading schema file {}", path.display()))?;
        let script = Self::parse(&content);
        if script.tables.is_empty() {
            anyhow::bail!("no CREATE TABLE statements in {}", path.display());
        }
        Ok(script)
    }

    /// Split on `;`. Statements are not expected to contain semicolons
    /// inside string literals.
    pub fn parse(content: &str) -> Self {
        let mut script = DdlScript::default();
        for statement in content.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            if let Some(caps) = CREATE_TABLE_RE.captures(statement) {
                script.tables.push(caps[1].to_string());
            }
            script.statements.push(statement.to_string());
        }
        script
    }

    pub fn contains(&self, table: &str) -> bool {
        self.tables.iter().any(|t| t.eq_ignore_ascii_case(table))
    }

    /// Drop leftovers of the script's tables (children first), then run the
    /// script. The target's sessions must have FK checks disabled, as
    /// [`MySqlTarget`](crate::seeder::MySqlTarget) sessions do.
    pub async fn create_tables<T: SeedTarget + ?Sized>(&self, target: &T) -> anyhow::Result<()> {
        for table in self.tables.iter().rev() {
            target
                .execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)))
                .await?;
        }

        for statement in &self.statements {
            debug!(statement = %statement, "executing DDL");
            target
                .execute(statement)
                .await
                .with_context(|| format!("executing DDL: {}", first_line(statement)))?;
        }
        Ok(())
    }

    /// Drop the script's tables. Failures are logged, not returned.
    pub async fn drop_tables<T: SeedTarget + ?Sized>(&self, target: &T) {
        for table in self.tables.iter().rev() {
            let sql = format!("DROP TABLE IF EXISTS {}", quote_ident(table));
            if let Err(e) = target.execute(&sql).await {
                warn!(table = %table, error = %e, "could not drop table");
            }
        }
    }
}

fn first_line(statement: &str) -> &str {
    statement.lines().next().unwrap_or(statement)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_collects_tables_in_order() {
        let script = DdlScript::parse(
            "CREATE TABLE users (id INT PRIMARY KEY);\n\
             create table if not exists `orders` (id INT, user_id INT);\n\
             CREATE INDEX idx ON orders (user_id);\n\n",
        );
        assert_eq!(script.tables, vec!["users", "orders"]);
        assert_eq!(script.statements.len(), 3);
        assert!(script.contains("ORDERS"));
        assert!(!script.contains("items"));
    }

    #[test]
    fn test_parse_skips_empty_statements() {
        let script = DdlScript::parse(" ;\n; ");
        assert!(script.statements.is_empty());
        assert!(script.tables.is_empty());
    }
}
