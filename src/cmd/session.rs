//! Connection, schema and table selection shared by the subcommands.

use crate::config::SeedYamlConfig;
use crate::schema::{resolve, Resolution, Schema};
use crate::seeder::{MySqlTarget, DEFAULT_WORKERS};
use anyhow::Context;
use std::path::{Path, PathBuf};

pub struct Session {
    pub config: SeedYamlConfig,
    pub target: MySqlTarget,
    pub schema: Schema,
}

/// Load the config file (if any), connect and read the schema with logical
/// references attached.
///
/// The DSN comes from `--dsn` / `SEED_DSN` (already merged by clap), then
/// `options.dsn` of the config file.
pub async fn open(
    config: Option<PathBuf>,
    dsn: Option<String>,
    workers: Option<usize>,
) -> anyhow::Result<Session> {
    let config = load_config(config.as_deref())?;
    let dsn = resolve_dsn(dsn, &config)?;
    connect(config, &dsn, workers).await
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<SeedYamlConfig> {
    match path {
        Some(path) => SeedYamlConfig::load(path),
        None => Ok(SeedYamlConfig::default()),
    }
}

pub fn resolve_dsn(dsn: Option<String>, config: &SeedYamlConfig) -> anyhow::Result<String> {
    dsn.or_else(|| config.options.dsn.clone()).ok_or_else(|| {
        anyhow::anyhow!("no database given: pass --dsn, set SEED_DSN or set options.dsn in the config file")
    })
}

/// Open a pool sized for the seed workers and read the schema
pub async fn connect(
    config: SeedYamlConfig,
    dsn: &str,
    workers: Option<usize>,
) -> anyhow::Result<Session> {
    let workers = workers
        .or(config.options.workers)
        .unwrap_or(DEFAULT_WORKERS);

    let target = MySqlTarget::connect(dsn, workers)?;
    let mut schema = target
        .load_schema()
        .await
        .context("reading schema from information_schema")?;
    if schema.is_empty() {
        anyhow::bail!("the database has no tables");
    }
    schema.apply_references(&config.references())?;

    Ok(Session {
        config,
        target,
        schema,
    })
}

impl Session {
    /// Resolve the tables to seed: `--tables`, then `options.seed_tables`,
    /// then every table
    pub fn resolve(&self, tables: Option<&str>) -> anyhow::Result<Resolution> {
        let all: Vec<String> = self.schema.iter().map(|t| t.name.clone()).collect();
        self.resolve_within(tables, &all)
    }

    /// Like [`Session::resolve`], but defaulting to `all`
    pub fn resolve_within(&self, tables: Option<&str>, all: &[String]) -> anyhow::Result<Resolution> {
        let requested: Vec<String> = if let Some(list) = tables {
            split_tables(list)
        } else if !self.config.options.seed_tables.is_empty() {
            self.config.options.seed_tables.clone()
        } else {
            all.to_vec()
        };
        Ok(resolve(&self.schema, &requested)?)
    }
}

pub(super) fn split_tables(list: &str) -> Vec<String> {
    list.split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_tables() {
        assert_eq!(split_tables("users, orders,,items "), vec!["users", "orders", "items"]);
    }
}
