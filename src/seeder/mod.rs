//! Seeding Orchestrator.
//!
//! Tables are processed strictly in resolved order. For each table:
//!
//! 1. Decide the rows to add (truncate, or top up to the planned count)
//! 2. Optionally drop secondary indexes that no FK depends on
//! 3. Gather FK candidate values from the run cache or by sampling the parent
//! 4. Build lookups for cross-table FK correlations
//! 5. Pre-load persisted unique values (incremental runs)
//! 6. Generate and write rows through the producer/worker pipeline
//! 7. Restore dropped indexes, also when step 6 failed
//! 8. Cache the table's primary-key values for later tables
//! 9. Evict cache entries no later table reads

pub mod fk_cache;
pub mod indexes;
pub mod load_data;
pub mod memory;
pub mod mysql;
pub mod pipeline;
pub mod reservoir;
pub mod target;

pub use fk_cache::{cache_key, compute_last_consumers, FkCache};
pub use indexes::{build_drop_statement, build_restore_statement, droppable_indexes, IndexDef};
pub use mysql::MySqlTarget;
pub use reservoir::Reservoir;
pub use target::{InsertMode, SeedTarget};

use crate::config::{self, TableConfig};
use crate::generator::{
    derive_rng, detect_fk_correlations, FkLookup, GeneratorSetup, RowGenerator,
    DEFAULT_NULL_PROBABILITY, DEFAULT_UNIQUE_RETRIES, PRIMARY_KEY_INDEX,
};
use crate::plan::RowPlan;
use crate::progress;
use crate::schema::{Column, Schema, Table};
use pipeline::PipelineOptions;
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_WORKERS: usize = 4;

#[derive(Debug, Error)]
pub enum SeedError {
    /// Checked before anything is written
    #[error("{0}")]
    Precondition(String),
    #[error("{table}: insert failed: {source}")]
    Insert {
        table: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Options of one seeding run
#[derive(Debug, Clone)]
pub struct SeedOptions {
    pub batch_size: usize,
    pub workers: usize,
    pub mode: InsertMode,
    pub defer_indexes: bool,
    /// Max values sampled per referenced column, 0 = unbounded
    pub fk_sample_size: usize,
    /// Truncate instead of topping up
    pub clear: bool,
    pub null_probability: f64,
    pub unique_retries: usize,
    pub seed: Option<u64>,
    pub progress: bool,
    /// Per-table generation settings
    pub tables: BTreeMap<String, TableConfig>,
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            workers: DEFAULT_WORKERS,
            mode: InsertMode::Insert,
            defer_indexes: false,
            fk_sample_size: 0,
            clear: false,
            null_probability: DEFAULT_NULL_PROBABILITY,
            unique_retries: DEFAULT_UNIQUE_RETRIES,
            seed: None,
            progress: false,
            tables: BTreeMap::new(),
        }
    }
}

impl SeedOptions {
    pub fn table_config(&self, table: &str) -> TableConfig {
        config::lookup(&self.tables, table).cloned().unwrap_or_default()
    }
}

/// Statistics of a seeding run
#[derive(Debug, Default, Serialize)]
pub struct SeedStats {
    pub tables: Vec<TableSeedStats>,
    pub tables_seeded: usize,
    pub tables_skipped: usize,
    pub total_inserted: u64,
    pub elapsed_ms: u128,
}

/// Per-table statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct TableSeedStats {
    pub name: String,
    pub target_rows: u64,
    pub existing_rows: u64,
    pub inserted_rows: u64,
    /// Already at or above target
    pub skipped: bool,
    pub deferred_indexes: usize,
    pub fk_correlations: usize,
}

/// Run a cleanup step whose failure must not hide the run's own outcome.
/// Errors are logged and dropped.
pub async fn best_effort<F>(what: &str, step: F)
where
    F: Future<Output = anyhow::Result<()>>,
{
    if let Err(e) = step.await {
        warn!(step = what, error = format!("{e:#}"), "best-effort cleanup failed");
    }
}

/// Seed every table of `order` with the counts of `plan`
pub async fn run<T: SeedTarget + 'static>(
    target: Arc<T>,
    schema: &Schema,
    order: &[String],
    plan: &RowPlan,
    options: &SeedOptions,
) -> anyhow::Result<SeedStats> {
    let started = Instant::now();

    if options.mode == InsertMode::LoadData && !target.local_infile_enabled().await? {
        return Err(SeedError::Precondition(
            "LOAD DATA LOCAL INFILE requires local_infile=ON on the server. \
             Run SET GLOBAL local_infile=1; (or add local-infile=1 to my.cnf)"
                .to_string(),
        )
        .into());
    }
    for name in order {
        if schema.get_table(name).is_none() {
            return Err(SeedError::Precondition(format!("no schema facts for table '{}'", name)).into());
        }
    }

    let mut stats = SeedStats::default();
    let result = seed_tables(&target, schema, order, plan, options, &mut stats).await;
    best_effort("close connections", target.finish()).await;
    result?;

    stats.elapsed_ms = started.elapsed().as_millis();
    Ok(stats)
}

async fn seed_tables<T: SeedTarget + 'static>(
    target: &Arc<T>,
    schema: &Schema,
    order: &[String],
    plan: &RowPlan,
    options: &SeedOptions,
    stats: &mut SeedStats,
) -> anyhow::Result<()> {
    let mut cache = FkCache::new(compute_last_consumers(schema, order));

    for (index, name) in order.iter().enumerate() {
        let Some(table) = schema.get_table(name) else {
            continue;
        };
        let target_rows = plan.get(&table.name);

        let table_stats =
            seed_table(target, schema, table, target_rows, options, &mut cache).await?;

        cache_primary_keys(target.as_ref(), table, index, options, &mut cache).await?;
        let evicted = cache.evict_consumed_by(index);
        if evicted > 0 {
            debug!(table = %table.name, evicted, "evicted FK cache entries");
        }

        if table_stats.skipped {
            stats.tables_skipped += 1;
        } else {
            stats.tables_seeded += 1;
        }
        stats.total_inserted += table_stats.inserted_rows;
        stats.tables.push(table_stats);
    }
    Ok(())
}

async fn seed_table<T: SeedTarget + 'static>(
    target: &Arc<T>,
    schema: &Schema,
    table: &Table,
    target_rows: u64,
    options: &SeedOptions,
    cache: &mut FkCache,
) -> anyhow::Result<TableSeedStats> {
    let mut stats = TableSeedStats {
        name: table.name.clone(),
        target_rows,
        ..Default::default()
    };

    if options.clear {
        target.truncate(&table.name).await?;
        info!(table = %table.name, "truncated");
    } else {
        stats.existing_rows = target.count_rows(&table.name).await?;
        if stats.existing_rows >= target_rows {
            stats.skipped = true;
            info!(
                table = %table.name,
                existing = stats.existing_rows,
                target = target_rows,
                "already at target, skipping"
            );
            return Ok(stats);
        }
    }
    let rows = target_rows - stats.existing_rows;

    let dropped = if options.defer_indexes {
        defer_indexes(target.as_ref(), &table.name).await?
    } else {
        Vec::new()
    };
    stats.deferred_indexes = dropped.len();

    let outcome = fill_table(target, schema, table, rows, stats.existing_rows > 0, options, cache).await;

    if let Some(sql) = build_restore_statement(&table.name, &dropped) {
        debug!(table = %table.name, %sql, "restoring indexes");
        if outcome.is_ok() {
            target.execute(&sql).await?;
        } else {
            best_effort("restore deferred indexes", target.execute(&sql)).await;
        }
    }

    let (inserted, correlations) = outcome?;
    stats.inserted_rows = inserted;
    stats.fk_correlations = correlations;
    info!(
        table = %table.name,
        target = target_rows,
        existing = stats.existing_rows,
        inserted,
        "seeded"
    );
    Ok(stats)
}

/// Drop the table's droppable secondary indexes, returning them
async fn defer_indexes<T: SeedTarget>(target: &T, table: &str) -> anyhow::Result<Vec<IndexDef>> {
    let indexes = target.secondary_indexes(table).await?;
    if indexes.is_empty() {
        return Ok(Vec::new());
    }
    let fk_sets = target.fk_column_sets(table).await?;
    let droppable = droppable_indexes(&indexes, &fk_sets);
    let kept = indexes.len() - droppable.len();
    if kept > 0 {
        debug!(table, kept, "keeping FK-backing indexes");
    }
    if let Some(sql) = build_drop_statement(table, &droppable) {
        debug!(table, %sql, "dropping indexes");
        target.execute(&sql).await?;
    }
    Ok(droppable)
}

async fn fill_table<T: SeedTarget + 'static>(
    target: &Arc<T>,
    schema: &Schema,
    table: &Table,
    rows: u64,
    incremental: bool,
    options: &SeedOptions,
    cache: &mut FkCache,
) -> anyhow::Result<(u64, usize)> {
    let (generator, correlations) =
        build_generator(target.as_ref(), schema, table, cache, options, incremental).await?;

    if generator.columns().is_empty() {
        warn!(table = %table.name, "no writable columns, skipping");
        return Ok((0, correlations));
    }

    let bar = options
        .progress
        .then(|| progress::table_bar(&table.name, rows));
    let inserted = pipeline::run(
        Arc::clone(target),
        generator,
        rows,
        PipelineOptions {
            batch_size: options.batch_size,
            workers: options.workers,
            mode: options.mode,
        },
        bar.clone(),
    )
    .await?;
    if let Some(bar) = bar {
        bar.finish();
    }
    Ok((inserted, correlations))
}

/// Prepare a generator for `table`: FK candidates (through `cache`), FK
/// correlation lookups, sequence starts and, when `preload` is set, the
/// unique values already persisted.
///
/// Returns the generator and the number of FK correlations in use.
pub async fn build_generator<T: SeedTarget>(
    target: &T,
    schema: &Schema,
    table: &Table,
    cache: &mut FkCache,
    options: &SeedOptions,
    preload: bool,
) -> anyhow::Result<(RowGenerator, usize)> {
    let mut setup = GeneratorSetup {
        table_config: options.table_config(&table.name),
        null_probability: options.null_probability,
        unique_retries: options.unique_retries,
        seed: options.seed,
        ..Default::default()
    };

    for (column, fk) in table.fk_columns() {
        if !column.is_writable() {
            continue;
        }
        let key = cache_key(&fk.referenced_table, &fk.referenced_column);
        let values = match cache.get(&key) {
            Some(values) => values,
            None => {
                let mut reservoir =
                    Reservoir::new(options.fk_sample_size, derive_rng(options.seed, &key));
                target
                    .scan_column(&fk.referenced_table, &fk.referenced_column, &mut reservoir)
                    .await?;
                debug!(
                    table = %table.name,
                    column = %column.name,
                    seen = reservoir.total_seen(),
                    kept = reservoir.len(),
                    "sampled FK values"
                );
                cache.insert(key, reservoir.into_items())
            }
        };
        setup.fk_values.insert(column.name.clone(), values);
    }

    let correlations = detect_fk_correlations(table, schema);
    for corr in &correlations {
        let pairs = target
            .fetch_pairs(&corr.parent_table, &corr.parent_key_column, &corr.parent_fk_column)
            .await?;
        let lookup = FkLookup::from_pairs(corr, pairs);
        debug!(
            table = %table.name,
            derived = %corr.derived_column,
            driver = %corr.driver_column,
            via = format!("{}.{}", corr.parent_table, corr.parent_fk_column),
            entries = lookup.len(),
            "correlating FK columns"
        );
        setup.fk_lookups.push(lookup);
    }

    for column in table.writable_columns() {
        if is_sequenced(column) {
            let max = target.max_integer(&table.name, &column.name).await?;
            setup
                .sequence_starts
                .insert(column.name.clone(), max.unwrap_or(0) + 1);
        }
    }

    if preload {
        preload_uniques(target, table, &mut setup).await?;
    }

    let generator = RowGenerator::new(table, setup)?;
    Ok((generator, correlations.len()))
}

/// Integer keys without a parent are filled from a counter past the
/// current maximum
fn is_sequenced(column: &Column) -> bool {
    column.col_type.is_integer()
        && column.foreign_key.is_none()
        && (column.is_primary_key || column.is_unique)
}

async fn preload_uniques<T: SeedTarget>(
    target: &T,
    table: &Table,
    setup: &mut GeneratorSetup,
) -> anyhow::Result<()> {
    let single_pk = table.primary_key_columns().count() == 1;
    for column in table.writable_columns() {
        if (column.is_unique || (column.is_primary_key && single_pk)) && !is_sequenced(column) {
            let mut all = Reservoir::new(0, derive_rng(None, &column.name));
            target.scan_column(&table.name, &column.name, &mut all).await?;
            if !all.is_empty() {
                setup
                    .existing_uniques
                    .insert(column.name.clone(), all.into_items());
            }
        }
    }

    let pk: Vec<String> = table.primary_key_columns().map(|c| c.name.clone()).collect();
    let composite_pk = (pk.len() > 1).then(|| (PRIMARY_KEY_INDEX.to_string(), pk));
    let composites = table
        .composite_unique_indexes()
        .map(|u| (u.name.clone(), u.columns.clone()))
        .chain(composite_pk);
    for (name, columns) in composites {
        let tuples = target.fetch_tuples(&table.name, &columns).await?;
        if !tuples.is_empty() {
            setup.existing_composites.insert(name, tuples);
        }
    }
    Ok(())
}

/// Cache primary-key values a later table references
async fn cache_primary_keys<T: SeedTarget>(
    target: &T,
    table: &Table,
    index: usize,
    options: &SeedOptions,
    cache: &mut FkCache,
) -> anyhow::Result<()> {
    for column in table.primary_key_columns() {
        let key = cache_key(&table.name, &column.name);
        if !cache.needed_after(&key, index) {
            continue;
        }
        let mut reservoir = Reservoir::new(options.fk_sample_size, derive_rng(options.seed, &key));
        target
            .scan_column(&table.name, &column.name, &mut reservoir)
            .await?;
        debug!(table = %table.name, column = %column.name, cached = reservoir.len(), "cached primary key values");
        cache.insert(key, reservoir.into_items());
    }
    Ok(())
}
