//! Order command: show the resolved seeding order.

use super::session;
use crate::schema::Resolution;
use crate::seeder::{best_effort, SeedTarget};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
struct OrderedTable<'a> {
    name: &'a str,
    parents: &'a [String],
    auto_included: bool,
}

pub async fn run(
    dsn: Option<String>,
    config: Option<PathBuf>,
    tables: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let session = session::open(config, dsn, Some(1)).await?;
    let resolution = session.resolve(tables.as_deref());
    best_effort("close connections", session.target.finish()).await;
    let resolution = resolution?;

    let ordered = ordered_tables(&resolution);
    if json {
        println!("{}", serde_json::to_string_pretty(&ordered)?);
        return Ok(());
    }

    eprintln!("Seeding order ({} tables):\n", ordered.len());
    for (i, table) in ordered.iter().enumerate() {
        let mut line = format!("  {:>3}. {}", i + 1, table.name);
        if !table.parents.is_empty() {
            line.push_str(&format!(" <- {}", table.parents.join(", ")));
        }
        if table.auto_included {
            line.push_str(" (auto-included)");
        }
        println!("{}", line);
    }
    Ok(())
}

fn ordered_tables(resolution: &Resolution) -> Vec<OrderedTable<'_>> {
    resolution
        .order
        .iter()
        .map(|name| OrderedTable {
            name,
            parents: resolution.relations.parents(name),
            auto_included: resolution.auto_included.contains(name),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{resolve, Column, Schema, Table};

    #[test]
    fn test_ordered_tables_lists_parents() {
        let schema = Schema::from_tables([
            Table::new("company", vec![Column::new("id", "int").primary_key()]),
            Table::new(
                "employee",
                vec![
                    Column::new("id", "int").primary_key(),
                    Column::new("company_id", "int").references("company", "id"),
                ],
            ),
        ]);
        let resolution = resolve(&schema, &["employee".to_string()]).unwrap();
        let ordered = ordered_tables(&resolution);

        assert_eq!(ordered.len(), 2);
        assert_eq!(ordered[0].name, "company");
        assert!(ordered[0].auto_included);
        assert_eq!(ordered[1].name, "employee");
        assert_eq!(ordered[1].parents, ["company".to_string()]);
        assert!(!ordered[1].auto_included);
    }
}
