//! Templated test queries.
//!
//! A query containing `{{` or `{%` is compiled once and rendered before every
//! run. On top of the fake-data functions of column templates it can call
//! `sample_row("table", "col", ...)`, which returns a random existing row as
//! a map, so lookups hit real keys:
//!
//! ```text
//! {% set u = sample_row("users", "id", "email") %}
//! SELECT * FROM orders WHERE user_id = {{ u.id }}
//! ```
//!
//! Rows are prefetched before the runs start, so table and column names must
//! be string literals.

use super::QueryRunner;
use crate::config::TestCase;
use crate::generator::template::{to_template_value, TemplateContext, TemplateEngine};
use ahash::AHashMap;
use anyhow::Context;
use minijinja::value::Rest;
use minijinja::{ErrorKind, Value};
use once_cell::sync::Lazy;
use rand::Rng;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Rows fetched per `sample_row` call site
pub const SAMPLE_ROW_LIMIT: usize = 1000;

static SAMPLE_ROW_CALL_RE: Lazy<regex::Regex> =
    Lazy::new(|| regex::Regex::new(r"sample_row\s*\(([^)]*)\)").unwrap());
static STRING_ARG_RE: Lazy<regex::Regex> =
    Lazy::new(|| regex::Regex::new(r#""([^"]*)"|'([^']*)'"#).unwrap());
static IDENT_RE: Lazy<regex::Regex> =
    Lazy::new(|| regex::Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Whether `query` needs rendering
pub fn is_template(query: &str) -> bool {
    query.contains("{{") || query.contains("{%")
}

/// Table and columns of one `sample_row` call
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SampleKey {
    pub table: String,
    pub columns: Vec<String>,
}

impl SampleKey {
    /// Validate the arguments of a `sample_row` call. Names end up in SQL
    /// unquoted, so only plain identifiers pass.
    pub fn new(args: &[String]) -> anyhow::Result<Self> {
        let (table, columns) = match args.split_first() {
            Some((table, columns)) if !columns.is_empty() => (table, columns),
            _ => anyhow::bail!("sample_row needs a table and at least one column"),
        };
        if let Some(bad) = args.iter().find(|a| !IDENT_RE.is_match(a)) {
            anyhow::bail!("sample_row: invalid identifier '{}'", bad);
        }
        Ok(Self {
            table: table.clone(),
            columns: columns.to_vec(),
        })
    }
}

impl fmt::Display for SampleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.table, self.columns.join(", "))
    }
}

/// `sample_row` calls in `query`, deduplicated
pub fn sample_row_calls(query: &str) -> anyhow::Result<Vec<SampleKey>> {
    let mut keys: Vec<SampleKey> = Vec::new();
    for call in SAMPLE_ROW_CALL_RE.captures_iter(query) {
        let args: Vec<String> = STRING_ARG_RE
            .captures_iter(&call[1])
            .filter_map(|c| c.get(1).or_else(|| c.get(2)))
            .map(|m| m.as_str().to_string())
            .collect();
        let key = SampleKey::new(&args)?;
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    Ok(keys)
}

type SampleRows = AHashMap<SampleKey, Vec<Value>>;

/// Compiled queries of one test run, addressed by test index
pub struct QueryTemplates {
    engine: TemplateEngine,
    failed: AHashMap<usize, String>,
}

impl fmt::Debug for QueryTemplates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryTemplates")
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}

impl QueryTemplates {
    /// Compile the templated queries of `tests` and prefetch the rows their
    /// `sample_row` calls read. A test whose template cannot be prepared is
    /// remembered as failed; the others are unaffected.
    pub async fn prepare<R: QueryRunner + ?Sized>(runner: &R, tests: &[TestCase]) -> Self {
        let mut engine = TemplateEngine::new();
        let mut failed = AHashMap::new();
        let mut samples = SampleRows::new();

        for (i, test) in tests.iter().enumerate() {
            if !is_template(&test.query) {
                continue;
            }
            let prepared = async {
                engine
                    .add(&template_name(i), &test.query)
                    .context("invalid template")?;
                for key in sample_row_calls(&test.query)? {
                    if samples.contains_key(&key) {
                        continue;
                    }
                    let rows = fetch_samples(runner, &key).await?;
                    debug!(sample = %key, rows = rows.len(), "prefetched sample rows");
                    samples.insert(key, rows);
                }
                anyhow::Ok(())
            }
            .await;

            if let Err(e) = prepared {
                failed.insert(i, format!("{:#}", e));
            }
        }

        register_sample_row(&mut engine, Arc::new(samples));
        Self { engine, failed }
    }

    /// The SQL for the next run of test `index`
    pub fn render(&self, index: usize, test: &TestCase) -> anyhow::Result<String> {
        if let Some(error) = self.failed.get(&index) {
            anyhow::bail!("{}", error);
        }
        if !is_template(&test.query) {
            return Ok(test.query.clone());
        }
        let sql = self
            .engine
            .render(&template_name(index), &TemplateContext::new())
            .context("rendering query template")?;
        Ok(sql)
    }
}

fn template_name(index: usize) -> String {
    format!("test-{}", index)
}

async fn fetch_samples<R: QueryRunner + ?Sized>(
    runner: &R,
    key: &SampleKey,
) -> anyhow::Result<Vec<Value>> {
    let rows = runner
        .sample_rows(&key.table, &key.columns, SAMPLE_ROW_LIMIT)
        .await
        .with_context(|| format!("sampling {}", key))?;
    Ok(rows
        .iter()
        .map(|row| {
            let map: BTreeMap<String, Value> = key
                .columns
                .iter()
                .cloned()
                .zip(row.iter().map(to_template_value))
                .collect();
            Value::from(map)
        })
        .collect())
}

fn register_sample_row(engine: &mut TemplateEngine, samples: Arc<SampleRows>) {
    engine.env_mut().add_function(
        "sample_row",
        move |args: Rest<String>| -> Result<Value, minijinja::Error> {
            let key = SampleKey::new(&args)
                .map_err(|e| minijinja::Error::new(ErrorKind::InvalidOperation, e.to_string()))?;
            let rows = samples.get(&key).ok_or_else(|| {
                minijinja::Error::new(
                    ErrorKind::InvalidOperation,
                    format!("sample_row: {} was not prefetched, pass names as string literals", key),
                )
            })?;
            if rows.is_empty() {
                return Err(minijinja::Error::new(
                    ErrorKind::InvalidOperation,
                    format!("sample_row: no rows in {}", key.table),
                ));
            }
            Ok(rows[rand::rng().random_range(0..rows.len())].clone())
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_template() {
        assert!(is_template("SELECT {{ int(1, 2) }}"));
        assert!(is_template("{% set x = 1 %}SELECT {{ x }}"));
        assert!(!is_template("SELECT '{' FROM t"));
    }

    #[test]
    fn test_sample_row_calls_are_deduplicated() {
        let keys = sample_row_calls(
            r#"{% set a = sample_row("users", "id") %}{% set b = sample_row('users', 'id') %}
               {{ sample_row("orders", "id", "total").id }}"#,
        )
        .unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].table, "users");
        assert_eq!(keys[1].columns, vec!["id", "total"]);
    }

    #[test]
    fn test_sample_row_rejects_bad_arguments() {
        assert!(sample_row_calls(r#"{{ sample_row("users") }}"#).is_err());
        let err = sample_row_calls(r#"{{ sample_row("users; DROP", "id") }}"#).unwrap_err();
        assert!(err.to_string().contains("invalid identifier"));
    }
}
