//! Query timing against freshly seeded tables.
//!
//! The `test` command creates the tables of a DDL script, seeds them and runs
//! the config's test queries repeatedly, reporting latency per query.
//! `compare` does the same for several configs and lays the results side by
//! side.

pub mod ddl;
pub mod query;

pub use ddl::DdlScript;
pub use query::{is_template, QueryTemplates, SAMPLE_ROW_LIMIT};

use crate::config::TestCase;
use crate::generator::SqlValue;
use crate::progress::query_bar;
use async_trait::async_trait;
use serde::{Serialize, Serializer};
use std::fmt::Write as _;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Runs test queries and feeds `sample_row`
#[async_trait]
pub trait QueryRunner: Send + Sync {
    /// Execute `sql` and drain every result set. Returns the number of rows
    /// in the first one.
    async fn run_query(&self, sql: &str) -> anyhow::Result<usize>;

    /// Up to `limit` rows of `columns` from `table`
    async fn sample_rows(
        &self,
        table: &str,
        columns: &[String],
        limit: usize,
    ) -> anyhow::Result<Vec<Vec<SqlValue>>>;
}

/// Latency summary of one test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimingStats {
    #[serde(rename = "avg_ms", serialize_with = "as_millis")]
    pub avg: Duration,
    #[serde(rename = "min_ms", serialize_with = "as_millis")]
    pub min: Duration,
    #[serde(rename = "max_ms", serialize_with = "as_millis")]
    pub max: Duration,
    #[serde(rename = "p95_ms", serialize_with = "as_millis")]
    pub p95: Duration,
}

impl TimingStats {
    pub fn from_timings(timings: &[Duration]) -> Option<Self> {
        if timings.is_empty() {
            return None;
        }
        let mut sorted = timings.to_vec();
        sorted.sort_unstable();
        let total: Duration = sorted.iter().sum();
        Some(Self {
            avg: total / sorted.len() as u32,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            p95: percentile(&sorted, 95.0),
        })
    }
}

fn as_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64() * 1000.0)
}

/// Nearest-rank percentile of ascending `sorted`
pub fn percentile(sorted: &[Duration], pct: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let rank = (pct / 100.0 * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// Outcome of one test query
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    pub name: String,
    pub query: String,
    /// Completed runs
    pub runs: usize,
    /// Rows returned by the first run
    pub rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing: Option<TimingStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Run every test `test.runs()` times, timing each execution. A failing run
/// stops its test; the remaining tests still run.
pub async fn run_tests<R: QueryRunner + ?Sized>(
    runner: &R,
    tests: &[TestCase],
    progress: bool,
) -> Vec<TestResult> {
    let templates = QueryTemplates::prepare(runner, tests).await;
    let mut results = Vec::with_capacity(tests.len());

    for (index, test) in tests.iter().enumerate() {
        let runs = test.runs();
        let bar = progress.then(|| query_bar(&test.name, runs as u64));
        let mut timings = Vec::with_capacity(runs);
        let mut rows = 0;
        let mut error = None;

        for run in 0..runs {
            let outcome = async {
                let sql = templates.render(index, test)?;
                let started = Instant::now();
                let count = runner.run_query(&sql).await?;
                anyhow::Ok((started.elapsed(), count))
            }
            .await;

            match outcome {
                Ok((elapsed, count)) => {
                    if run == 0 {
                        rows = count;
                    }
                    timings.push(elapsed);
                }
                Err(e) => {
                    error = Some(format!("{:#}", e));
                    break;
                }
            }
            if let Some(bar) = &bar {
                bar.inc(1);
            }
        }
        if let Some(bar) = bar {
            bar.finish_and_clear();
        }

        let timing = match &error {
            Some(e) => {
                warn!(test = %test.name, error = %e, "test query failed");
                None
            }
            None => TimingStats::from_timings(&timings),
        };
        if let Some(stats) = &timing {
            info!(test = %test.name, runs = timings.len(), avg = %format_duration(stats.avg), "test query done");
        }

        results.push(TestResult {
            name: test.name.clone(),
            query: test.query.clone(),
            runs: timings.len(),
            rows,
            timing,
            error,
        });
    }
    results
}

/// `850.00µs`, `12.34ms`, `1.235s`
pub fn format_duration(d: Duration) -> String {
    if d < Duration::from_millis(1) {
        format!("{:.2}µs", d.as_secs_f64() * 1e6)
    } else if d < Duration::from_secs(1) {
        format!("{:.2}ms", d.as_secs_f64() * 1e3)
    } else {
        format!("{:.3}s", d.as_secs_f64())
    }
}

/// Test results as an aligned table
pub fn format_report(results: &[TestResult]) -> String {
    let mut rows = vec![
        cells(["Test", "Avg", "Min", "Max", "p95", "Rows", "Runs"]),
        cells(["----", "---", "---", "---", "---", "----", "----"]),
    ];
    for result in results {
        let mut row = vec![result.name.clone()];
        match (&result.error, &result.timing) {
            (Some(e), _) => row.push(format!("ERROR: {}", e)),
            (None, Some(t)) => {
                row.extend(timing_cells(t));
                row.push(result.rows.to_string());
                row.push(result.runs.to_string());
            }
            (None, None) => row.push("-".to_string()),
        }
        rows.push(row);
    }

    let mut out = String::from("=== Performance Test Results ===\n");
    out.push_str(&align(&rows, "  "));
    out
}

/// One config's part in a comparison
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigRun {
    pub label: String,
    pub schema_file: String,
    /// Planned rows over all seeded tables
    pub rows: u64,
    pub tables: usize,
    pub elapsed_ms: u64,
    pub results: Vec<TestResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Side-by-side report: configs first, then one table per test
pub fn format_comparison(runs: &[ConfigRun]) -> String {
    let mut out = String::from("=== Schema Comparison Report ===\n\nConfigs:\n");
    for run in runs {
        let _ = match &run.error {
            Some(e) => writeln!(out, "  {:<15} {} (ERROR: {})", run.label, run.schema_file, e),
            None => writeln!(
                out,
                "  {:<15} {} ({} rows, {} tables, {})",
                run.label,
                run.schema_file,
                run.rows,
                run.tables,
                format_duration(Duration::from_millis(run.elapsed_ms))
            ),
        };
    }

    let mut names: Vec<&str> = Vec::new();
    for result in runs.iter().flat_map(|r| &r.results) {
        if !names.contains(&result.name.as_str()) {
            names.push(&result.name);
        }
    }
    if names.is_empty() {
        out.push_str("\nNo test results to compare.\n");
        return out;
    }

    for name in names {
        let _ = writeln!(out, "\n--- {} ---", name);
        let mut rows = vec![cells(["Config", "Avg", "Min", "Max", "p95", "Rows"])];
        for run in runs {
            let mut row = vec![run.label.clone()];
            let result = run.results.iter().find(|r| r.name == name);
            match result.filter(|_| run.error.is_none()) {
                Some(TestResult { error: Some(e), .. }) => row.push(format!("ERROR: {}", e)),
                Some(TestResult {
                    timing: Some(t),
                    rows: count,
                    ..
                }) => {
                    row.extend(timing_cells(t));
                    row.push(count.to_string());
                }
                _ => row.extend(cells(["-", "-", "-", "-", "-"])),
            }
            rows.push(row);
        }
        out.push_str(&align(&rows, "  "));
    }
    out
}

fn cells<const N: usize>(values: [&str; N]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn timing_cells(t: &TimingStats) -> [String; 4] {
    [
        format_duration(t.avg),
        format_duration(t.min),
        format_duration(t.max),
        format_duration(t.p95),
    ]
}

/// Left-align cells in columns two spaces apart. The last cell of a row is
/// never padded.
fn align(rows: &[Vec<String>], indent: &str) -> String {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let widths: Vec<usize> = (0..columns)
        .map(|c| {
            rows.iter()
                .filter(|row| c + 1 < row.len())
                .map(|row| row[c].chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    for row in rows {
        out.push_str(indent);
        for (c, cell) in row.iter().enumerate() {
            if c + 1 < row.len() {
                let _ = write!(out, "{:<width$}  ", cell, width = widths[c]);
            } else {
                out.push_str(cell);
            }
        }
        out.push('\n');
    }
    out
}
