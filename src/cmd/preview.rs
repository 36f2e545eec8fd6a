//! Preview command: show generation strategies and sample rows for one table.

use super::session;
use crate::generator::{Row, SqlValue, DEFAULT_NULL_PROBABILITY, DEFAULT_UNIQUE_RETRIES};
use crate::seeder::{self, best_effort, FkCache, SeedOptions, SeedTarget};
use serde_json::{json, Map, Value};
use std::path::PathBuf;

/// Parent values sampled per FK column when previewing
const PREVIEW_FK_SAMPLE: usize = 1000;

pub async fn run(
    table: String,
    dsn: Option<String>,
    config: Option<PathBuf>,
    rows: usize,
    seed: Option<u64>,
    json: bool,
) -> anyhow::Result<()> {
    let session = session::open(config, dsn, Some(1)).await?;
    let Some(table) = session.schema.get_table(&table) else {
        best_effort("close connections", session.target.finish()).await;
        anyhow::bail!("table '{}' not found in schema", table);
    };

    let defaults = &session.config.options;
    let options = SeedOptions {
        fk_sample_size: defaults.fk_sample_size.unwrap_or(PREVIEW_FK_SAMPLE),
        null_probability: defaults
            .null_probability
            .unwrap_or(DEFAULT_NULL_PROBABILITY),
        unique_retries: defaults.unique_retries.unwrap_or(DEFAULT_UNIQUE_RETRIES),
        seed: seed.or(defaults.seed),
        tables: session.config.tables.clone(),
        ..SeedOptions::default()
    };

    let mut cache = FkCache::default();
    let built = seeder::build_generator(
        &session.target,
        &session.schema,
        table,
        &mut cache,
        &options,
        false,
    )
    .await;
    best_effort("close connections", session.target.finish()).await;
    let (mut generator, correlations) = built?;

    let strategies = generator.describe();
    let sample = generator.generate_batch(rows)?;

    if json {
        let output = json!({
            "table": table.name,
            "fk_correlations": correlations,
            "columns": strategies
                .iter()
                .map(|(column, strategy)| json!({ "name": column, "strategy": strategy }))
                .collect::<Vec<_>>(),
            "rows": sample
                .iter()
                .map(|row| row_to_json(&strategies, row))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    eprintln!("Table: {}\n", table.name);
    let width = strategies.iter().map(|(c, _)| c.len()).max().unwrap_or(0);
    for (column, strategy) in &strategies {
        eprintln!("  {:<width$}  {}", column, strategy, width = width);
    }
    if correlations > 0 {
        eprintln!("\n  {} FK correlation(s) in use", correlations);
    }

    eprintln!("\nSample rows:");
    let header: Vec<&str> = strategies.iter().map(|(c, _)| c.as_str()).collect();
    println!("{}", header.join("\t"));
    for row in &sample {
        let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        println!("{}", cells.join("\t"));
    }
    Ok(())
}

fn row_to_json(columns: &[(String, String)], row: &Row) -> Value {
    let mut object = Map::with_capacity(row.len());
    for ((column, _), value) in columns.iter().zip(row) {
        let value = match value {
            SqlValue::Null => Value::Null,
            SqlValue::Int(v) => json!(v),
            SqlValue::UInt(v) => json!(v),
            SqlValue::Bool(v) => json!(v),
            other => Value::String(other.to_string()),
        };
        object.insert(column.clone(), value);
    }
    Value::Object(object)
}
