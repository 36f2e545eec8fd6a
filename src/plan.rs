//! Target row counts per table.
//!
//! Root tables get the base count. A child table gets its largest parent's
//! count multiplied by a random children-per-parent factor, capped at the
//! per-table maximum. An explicit per-table override always wins.

use crate::schema::TableRelations;
use ahash::AHashMap;
use rand::Rng;
use std::collections::BTreeMap;

pub const DEFAULT_ROWS: u64 = 1000;
pub const DEFAULT_MIN_CHILDREN: u64 = 10;
pub const DEFAULT_MAX_CHILDREN: u64 = 100;
pub const DEFAULT_MAX_ROWS: u64 = 10_000_000;

/// Planning inputs shared by every table in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanParams {
    /// Row count for tables without in-set parents
    pub base_rows: u64,
    pub min_children: u64,
    pub max_children: u64,
    /// Upper bound for derived counts
    pub max_rows: u64,
}

impl Default for PlanParams {
    fn default() -> Self {
        Self {
            base_rows: DEFAULT_ROWS,
            min_children: DEFAULT_MIN_CHILDREN,
            max_children: DEFAULT_MAX_CHILDREN,
            max_rows: DEFAULT_MAX_ROWS,
        }
    }
}

/// Planned target row count per table
#[derive(Debug, Clone, Default)]
pub struct RowPlan {
    counts: AHashMap<String, u64>,
}

impl RowPlan {
    pub fn get(&self, table: &str) -> u64 {
        self.counts.get(table).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl FromIterator<(String, u64)> for RowPlan {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        Self {
            counts: iter.into_iter().collect(),
        }
    }
}

/// Compute target row counts for tables in processing order.
///
/// `overrides` is keyed by table name, matched case-insensitively.
pub fn plan_row_counts<R: Rng + ?Sized>(
    order: &[String],
    relations: &TableRelations,
    params: &PlanParams,
    overrides: &BTreeMap<String, u64>,
    rng: &mut R,
) -> RowPlan {
    let (low, high) = if params.min_children <= params.max_children {
        (params.min_children, params.max_children)
    } else {
        (params.max_children, params.min_children)
    };

    let mut counts: AHashMap<String, u64> = AHashMap::with_capacity(order.len());

    for table in order {
        let overridden = overrides
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(table))
            .map(|(_, &rows)| rows);

        let rows = match overridden {
            Some(rows) => rows,
            None if relations.is_root(table) => params.base_rows,
            None => {
                let largest_parent = relations
                    .parents(table)
                    .iter()
                    .map(|p| counts.get(p).copied().unwrap_or(params.base_rows))
                    .max()
                    .unwrap_or(params.base_rows);
                let multiplier = rng.random_range(low..=high);
                largest_parent
                    .saturating_mul(multiplier)
                    .min(params.max_rows)
            }
        };

        counts.insert(table.clone(), rows);
    }

    RowPlan { counts }
}
