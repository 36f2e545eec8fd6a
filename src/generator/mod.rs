//! Row Generation Engine.
//!
//! A [`RowGenerator`] owns everything needed to synthesize rows for one table
//! during one seeding pass: a value strategy per column, sequence counters,
//! uniqueness trackers and correlation state. Strategy selection per column
//! (first match wins):
//!
//! 1. FK with available parent values: pick from the parent values
//! 2. Integer primary key, or unique integer that is not an FK: sequential
//!    counter
//! 3. ENUM / SET: pick from the members
//! 4. Configured template
//! 5. Name heuristic
//! 6. Type-based fallback
//!
//! Nullable non-key columns additionally return NULL at the configured rate.
//! Independent columns retry their own unique values; members of correlation
//! groups and FK clusters are checked once the whole row is built.

pub mod correlation;
pub mod distribution;
pub mod fake;
pub mod fk_correlation;
pub mod template;
pub mod typed;
mod unique;
mod value;

pub use correlation::CorrelationConfig;
pub use distribution::{Distribution, ValuePicker};
pub use fk_correlation::{detect_fk_correlations, FkLookup};
pub use unique::{CompositeTracker, UniqueTracker};
pub use value::{format_float, SqlValue, DATETIME_FORMAT, DATE_FORMAT};

use crate::config::TableConfig;
use crate::schema::{Column, Table};
use ahash::AHashMap;
use self::correlation::{CorrelationGroup, FkCluster};
use self::fake::FakeKind;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use self::template::{TemplateContext, TemplateEngine};
use thiserror::Error;

pub const DEFAULT_NULL_PROBABILITY: f64 = 0.1;
pub const DEFAULT_UNIQUE_RETRIES: usize = 100;

/// Name of the synthetic composite tracker for multi-column primary keys
pub const PRIMARY_KEY_INDEX: &str = "PRIMARY";

/// One generated row, in [`RowGenerator::columns`] order
pub type Row = Vec<SqlValue>;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(
        "{table}: unique values exhausted for ({columns}) after {attempts} attempts; \
         the value space is too small for the requested row count"
    )]
    UniqueExhausted {
        table: String,
        columns: String,
        attempts: usize,
    },
    #[error("{table}: {message}")]
    Config { table: String, message: String },
    #[error("{table}.{column}: template error: {source}")]
    Template {
        table: String,
        column: String,
        source: minijinja::Error,
    },
}

/// Inputs gathered by the orchestrator before a table is generated
#[derive(Debug, Clone)]
pub struct GeneratorSetup {
    /// Column name -> candidate parent values
    pub fk_values: AHashMap<String, Arc<Vec<SqlValue>>>,
    /// Column name -> first value of its sequence
    pub sequence_starts: AHashMap<String, i64>,
    /// Column name -> values already persisted, for single-column uniques
    pub existing_uniques: AHashMap<String, Vec<SqlValue>>,
    /// Index name -> tuples already persisted, in index column order
    pub existing_composites: AHashMap<String, Vec<Vec<SqlValue>>>,
    /// Cross-table FK correlations with their lookup maps
    pub fk_lookups: Vec<FkLookup>,
    pub table_config: TableConfig,
    pub null_probability: f64,
    pub unique_retries: usize,
    /// Deterministic RNG seed, combined with the table name
    pub seed: Option<u64>,
}

impl Default for GeneratorSetup {
    fn default() -> Self {
        Self {
            fk_values: AHashMap::new(),
            sequence_starts: AHashMap::new(),
            existing_uniques: AHashMap::new(),
            existing_composites: AHashMap::new(),
            fk_lookups: Vec::new(),
            table_config: TableConfig::default(),
            null_probability: DEFAULT_NULL_PROBABILITY,
            unique_retries: DEFAULT_UNIQUE_RETRIES,
            seed: None,
        }
    }
}

#[derive(Debug)]
enum Strategy {
    Pick(ValuePicker),
    Sequence(i64),
    /// Name of a compiled template
    Template(String),
    Fake(FakeKind),
    Typed,
}

/// Independent generator for a single column
#[derive(Debug)]
pub(crate) struct ColumnGen {
    strategy: Strategy,
    null_probability: f64,
    unique: Option<UniqueTracker>,
    retries: usize,
}

impl ColumnGen {
    fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            null_probability: 0.0,
            unique: None,
            retries: 1,
        }
    }

    pub(crate) fn next(
        &mut self,
        table: &str,
        column: &Column,
        rng: &mut StdRng,
        templates: &TemplateEngine,
    ) -> Result<SqlValue, GenerateError> {
        let attempts = if self.unique.is_some() {
            self.retries.max(1)
        } else {
            1
        };

        for _ in 0..attempts {
            let value = if self.null_probability > 0.0 && rng.random::<f64>() < self.null_probability
            {
                SqlValue::Null
            } else {
                fit(column, self.base(table, column, rng, templates)?)
            };

            match &mut self.unique {
                None => return Ok(value),
                Some(tracker) => {
                    if tracker.try_add(&value) {
                        return Ok(value);
                    }
                }
            }
        }

        Err(GenerateError::UniqueExhausted {
            table: table.to_string(),
            columns: column.name.clone(),
            attempts,
        })
    }

    fn base(
        &mut self,
        table: &str,
        column: &Column,
        rng: &mut StdRng,
        templates: &TemplateEngine,
    ) -> Result<SqlValue, GenerateError> {
        Ok(match &mut self.strategy {
            Strategy::Pick(picker) => picker.pick(rng),
            Strategy::Sequence(next) => {
                let v = *next;
                *next += 1;
                SqlValue::Int(v)
            }
            Strategy::Template(name) => {
                let rendered = templates.render(name, &TemplateContext::new()).map_err(|e| {
                    GenerateError::Template {
                        table: table.to_string(),
                        column: column.name.clone(),
                        source: e,
                    }
                })?;
                SqlValue::String(rendered)
            }
            Strategy::Fake(kind) => kind.generate(&column.col_type, rng),
            Strategy::Typed => typed::type_fallback(column, rng),
        })
    }

    fn describe(&self, column: &Column) -> String {
        let mut desc = match &self.strategy {
            Strategy::Pick(_) => match &column.foreign_key {
                Some(fk) => format!("fk -> {}", fk.target_key()),
                None => format!("enum [{}]", column.enum_values.join(", ")),
            },
            Strategy::Sequence(next) => format!("sequential from {}", next),
            Strategy::Template(_) => "template".to_string(),
            Strategy::Fake(kind) => format!("heuristic: {}", kind.label()),
            Strategy::Typed => format!("type-based: {}", column.data_type),
        };
        if self.unique.is_some() {
            desc.push_str(", unique");
        }
        if self.null_probability > 0.0 {
            desc.push_str(&format!(", null {:.0}%", self.null_probability * 100.0));
        }
        desc
    }
}

/// Truncate strings to the column's declared length
fn fit(column: &Column, value: SqlValue) -> SqlValue {
    match column.max_length {
        Some(max) if column.col_type.is_string() => value.truncated(max as usize),
        _ => value,
    }
}

/// Single-column unique constraint on a group or cluster member
#[derive(Debug)]
struct MemberUnique {
    position: usize,
    tracker: UniqueTracker,
}

/// How a column's value is obtained for each row
#[derive(Debug)]
enum Slot {
    Column(ColumnGen),
    /// Member of a same-table correlation group
    Grouped(usize),
    /// Member of an FK correlation cluster
    Correlated(usize),
}

/// Generates rows for one table
#[derive(Debug)]
pub struct RowGenerator {
    table: String,
    columns: Vec<Column>,
    slots: Vec<Slot>,
    groups: Vec<CorrelationGroup>,
    clusters: Vec<FkCluster>,
    member_uniques: Vec<MemberUnique>,
    composites: Vec<CompositeTracker>,
    templates: TemplateEngine,
    rng: StdRng,
    retries: usize,
}

impl RowGenerator {
    pub fn new(table: &Table, setup: GeneratorSetup) -> Result<Self, GenerateError> {
        let name = table.name.clone();
        let columns: Vec<Column> = table.writable_columns().cloned().collect();
        let position = |col: &str| {
            columns
                .iter()
                .position(|c| c.name.eq_ignore_ascii_case(col))
        };
        let config_error = |message: String| GenerateError::Config {
            table: name.clone(),
            message,
        };

        let mut rng = derive_rng(setup.seed, &name);
        let mut templates = TemplateEngine::new();
        let cfg = &setup.table_config;
        let single_pk = table.primary_key_columns().count() == 1;

        // Same-table correlation groups
        let mut grouped: AHashMap<usize, usize> = AHashMap::new();
        let mut groups = Vec::with_capacity(cfg.correlations.len());
        for (g, group_cfg) in cfg.correlations.iter().enumerate() {
            let mut members = Vec::with_capacity(group_cfg.columns.len());
            for col in &group_cfg.columns {
                let idx = position(col).ok_or_else(|| {
                    config_error(format!(
                        "correlation: column '{}' not found (or auto-increment/generated)",
                        col
                    ))
                })?;
                if grouped.insert(idx, g).is_some() {
                    return Err(config_error(format!(
                        "correlation: column '{}' is in more than one group",
                        col
                    )));
                }
                members.push(&columns[idx]);
            }
            let null_probability = members
                .iter()
                .filter(|c| c.is_nullable && !c.is_primary_key)
                .map(|c| cfg.null_probability_for(&c.name, setup.null_probability))
                .fold(0.0, f64::max);
            groups.push(CorrelationGroup::new(
                &name,
                g,
                group_cfg,
                members,
                null_probability,
                &mut templates,
            )?);
        }

        // Cross-table FK clusters, one per driver column
        let mut clustered: AHashMap<usize, usize> = AHashMap::new();
        let mut cluster_lookups: Vec<(usize, Vec<FkLookup>)> = Vec::new();
        for lookup in &setup.fk_lookups {
            let (Some(driver), Some(derived)) =
                (position(&lookup.driver_column), position(&lookup.derived_column))
            else {
                continue;
            };
            if grouped.contains_key(&driver) || grouped.contains_key(&derived) {
                continue;
            }
            if !has_values(&setup, &columns[driver]) {
                continue;
            }
            let c = match clustered.get(&driver) {
                Some(&c) => c,
                None => {
                    cluster_lookups.push((driver, Vec::new()));
                    let c = cluster_lookups.len() - 1;
                    clustered.insert(driver, c);
                    c
                }
            };
            if clustered.contains_key(&derived) {
                continue;
            }
            clustered.insert(derived, c);
            cluster_lookups[c].1.push(lookup.clone());
        }
        let mut clusters = Vec::with_capacity(cluster_lookups.len());
        for (driver, lookups) in cluster_lookups {
            let column = &columns[driver];
            let values = lookup_values(&setup, column).unwrap_or_default();
            let picker =
                ValuePicker::new(values, &cfg.distribution_for(&column.name), &mut rng);
            let mut driver_gen = ColumnGen::new(Strategy::Pick(picker));
            if let Some(tracker) = unique_tracker(column, single_pk, &setup) {
                driver_gen.unique = Some(tracker);
                driver_gen.retries = setup.unique_retries.max(1);
            }
            clusters.push(FkCluster::new(driver, column.name.clone(), driver_gen, lookups));
        }

        let mut slots = Vec::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            let slot = if let Some(&g) = grouped.get(&i) {
                Slot::Grouped(g)
            } else if let Some(&c) = clustered.get(&i) {
                Slot::Correlated(c)
            } else {
                Slot::Column(build_column_gen(
                    &name,
                    column,
                    single_pk,
                    &setup,
                    &mut templates,
                    &mut rng,
                )?)
            };
            slots.push(slot);
        }

        // The cluster driver retries on its own, like an independent column
        let mut member_uniques = Vec::new();
        for (i, slot) in slots.iter().enumerate() {
            let is_member = match slot {
                Slot::Column(_) => false,
                Slot::Grouped(_) => true,
                Slot::Correlated(c) => clusters[*c].driver_index != i,
            };
            if !is_member {
                continue;
            }
            if let Some(tracker) = unique_tracker(&columns[i], single_pk, &setup) {
                member_uniques.push(MemberUnique {
                    position: i,
                    tracker,
                });
            }
        }

        let composites = build_composites(table, &columns, &setup);

        Ok(Self {
            table: name,
            columns,
            slots,
            groups,
            clusters,
            member_uniques,
            composites,
            templates,
            rng,
            retries: setup.unique_retries.max(1),
        })
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Names of the generated columns, in row order
    pub fn columns(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Strategy description per generated column
    pub fn describe(&self) -> Vec<(String, String)> {
        self.columns
            .iter()
            .zip(&self.slots)
            .enumerate()
            .map(|(i, (column, slot))| {
                let mut desc = match slot {
                    Slot::Column(gen) => gen.describe(column),
                    Slot::Grouped(g) => format!("correlation group #{}", g + 1),
                    Slot::Correlated(c) if self.clusters[*c].driver_index == i => {
                        let target = column
                            .foreign_key
                            .as_ref()
                            .map(|fk| fk.target_key())
                            .unwrap_or_default();
                        let mut desc = format!("fk -> {}, drives correlated columns", target);
                        if self.clusters[*c].driver_is_unique() {
                            desc.push_str(", unique");
                        }
                        desc
                    }
                    Slot::Correlated(c) => format!(
                        "derived from {}",
                        self.columns[self.clusters[*c].driver_index].name
                    ),
                };
                if self.member_uniques.iter().any(|u| u.position == i) {
                    desc.push_str(", unique");
                }
                (column.name.clone(), desc)
            })
            .collect()
    }

    /// Generate one row satisfying every unique constraint.
    ///
    /// A row repeating a group member's unique value or a composite-unique
    /// tuple is regenerated, up to the retry budget.
    pub fn generate_row(&mut self) -> Result<Row, GenerateError> {
        let Self {
            table,
            columns,
            slots,
            groups,
            clusters,
            member_uniques,
            composites,
            templates,
            rng,
            retries,
        } = self;

        let table: &str = table;
        let mut rejected = String::new();
        for _ in 0..*retries {
            groups.iter_mut().for_each(CorrelationGroup::reset);
            clusters.iter_mut().for_each(FkCluster::reset);

            let mut row = Vec::with_capacity(columns.len());
            for (column, slot) in columns.iter().zip(slots.iter_mut()) {
                let value = match slot {
                    Slot::Column(gen) => gen.next(table, column, rng, templates)?,
                    Slot::Grouped(g) => {
                        let v = groups[*g].value(table, &column.name, rng, templates)?;
                        fit(column, v)
                    }
                    Slot::Correlated(c) => {
                        let cluster = &mut clusters[*c];
                        let driver = &columns[cluster.driver_index];
                        cluster.value(table, driver, &column.name, rng, templates)?
                    }
                };
                row.push(value);
            }

            let clash = member_uniques
                .iter()
                .find(|u| u.tracker.contains(&row[u.position]))
                .map(|u| columns[u.position].name.clone())
                .or_else(|| {
                    composites
                        .iter()
                        .find(|t| !t.accepts(&row))
                        .map(|t| t.columns.join(", "))
                });
            match clash {
                Some(label) => rejected = label,
                None => {
                    for unique in member_uniques.iter_mut() {
                        unique.tracker.try_add(&row[unique.position]);
                    }
                    for tracker in composites.iter_mut() {
                        tracker.record(&row);
                    }
                    return Ok(row);
                }
            }
        }

        Err(GenerateError::UniqueExhausted {
            table: table.to_string(),
            columns: rejected,
            attempts: *retries,
        })
    }

    /// Generate `n` rows
    pub fn generate_batch(&mut self, n: usize) -> Result<Vec<Row>, GenerateError> {
        (0..n).map(|_| self.generate_row()).collect()
    }
}

/// RNG for `salt` (usually a table name): derived from `seed` when given,
/// entropy-seeded otherwise
pub fn derive_rng(seed: Option<u64>, salt: &str) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed ^ fnv1a(salt)),
        None => StdRng::from_os_rng(),
    }
}

fn fnv1a(s: &str) -> u64 {
    s.bytes().fold(0xcbf2_9ce4_8422_2325, |h, b| {
        (h ^ b as u64).wrapping_mul(0x0100_0000_01b3)
    })
}

fn lookup_values(setup: &GeneratorSetup, column: &Column) -> Option<Arc<Vec<SqlValue>>> {
    setup
        .fk_values
        .get(&column.name)
        .or_else(|| {
            setup
                .fk_values
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(&column.name))
                .map(|(_, v)| v)
        })
        .cloned()
}

fn has_values(setup: &GeneratorSetup, column: &Column) -> bool {
    column.foreign_key.is_some()
        && lookup_values(setup, column).is_some_and(|v| !v.is_empty())
}

fn build_column_gen(
    table: &str,
    column: &Column,
    single_pk: bool,
    setup: &GeneratorSetup,
    templates: &mut TemplateEngine,
    rng: &mut StdRng,
) -> Result<ColumnGen, GenerateError> {
    let cfg = &setup.table_config;
    let distribution = cfg.distribution_for(&column.name);
    let is_fk = column.foreign_key.is_some();
    let sequence_start = || setup.sequence_starts.get(&column.name).copied().unwrap_or(1);

    let strategy = if has_values(setup, column) {
        let values = lookup_values(setup, column).unwrap_or_default();
        Strategy::Pick(ValuePicker::new(values, &distribution, rng))
    } else if column.is_primary_key && column.col_type.is_integer() {
        Strategy::Sequence(sequence_start())
    } else if column.is_unique && !is_fk && column.col_type.is_integer() {
        Strategy::Sequence(sequence_start())
    } else if !column.enum_values.is_empty() {
        let values = column
            .enum_values
            .iter()
            .map(|v| SqlValue::String(v.clone()))
            .collect();
        Strategy::Pick(ValuePicker::new(Arc::new(values), &distribution, rng))
    } else if let Some(source) = cfg.template_for(&column.name) {
        let name = format!("column:{}", column.name);
        templates
            .add(&name, source)
            .map_err(|e| GenerateError::Template {
                table: table.to_string(),
                column: column.name.clone(),
                source: e,
            })?;
        Strategy::Template(name)
    } else if let Some(kind) = FakeKind::for_column(column) {
        Strategy::Fake(kind)
    } else {
        Strategy::Typed
    };

    if is_fk && !has_values(setup, column) {
        tracing::warn!(
            table,
            column = %column.name,
            "no parent values available for foreign key, falling back to generated values"
        );
    }

    let mut gen = ColumnGen::new(strategy);
    if column.is_nullable && !column.is_primary_key {
        gen.null_probability = cfg.null_probability_for(&column.name, setup.null_probability);
    }

    if !matches!(gen.strategy, Strategy::Sequence(_)) {
        if let Some(tracker) = unique_tracker(column, single_pk, setup) {
            gen.unique = Some(tracker);
            gen.retries = setup.unique_retries.max(1);
        }
    }

    Ok(gen)
}

/// Tracker for a single-column unique constraint, seeded with persisted
/// values. Composite primary keys are tracked per row instead.
fn unique_tracker(column: &Column, single_pk: bool, setup: &GeneratorSetup) -> Option<UniqueTracker> {
    if !(column.is_unique || (column.is_primary_key && single_pk)) {
        return None;
    }
    let mut tracker = UniqueTracker::new();
    if let Some(existing) = setup.existing_uniques.get(&column.name) {
        tracker.preload(existing);
    }
    Some(tracker)
}

/// Composite trackers for multi-column unique indexes and primary keys whose
/// columns are all generated
fn build_composites(table: &Table, columns: &[Column], setup: &GeneratorSetup) -> Vec<CompositeTracker> {
    let positions = |names: &[String]| -> Option<Vec<usize>> {
        names
            .iter()
            .map(|n| columns.iter().position(|c| c.name.eq_ignore_ascii_case(n)))
            .collect()
    };

    let pk: Vec<String> = table.primary_key_columns().map(|c| c.name.clone()).collect();
    let pk_index = (pk.len() > 1).then(|| (PRIMARY_KEY_INDEX.to_string(), pk));

    table
        .composite_unique_indexes()
        .map(|u| (u.name.clone(), u.columns.clone()))
        .chain(pk_index)
        .filter_map(|(name, cols)| {
            let pos = positions(&cols)?;
            let mut tracker = CompositeTracker::new(name.clone(), cols, pos);
            if let Some(existing) = setup.existing_composites.get(&name) {
                tracker.preload(existing);
            }
            Some(tracker)
        })
        .collect()
}
