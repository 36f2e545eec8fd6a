//! Compare command CLI handler.
//!
//! Runs the test pipeline once per config and prints the timings side by
//! side. Takes either one comparison file (configs plus per-label queries) or
//! two or more seed configs, whose tests are matched by name.

use super::seed::SeedSettings;
use super::test::{execute, RunOutcome, RunSpec};
use crate::config::{CompareConfig, SeedYamlConfig, TestCase};
use crate::workload::{format_comparison, ConfigRun};
use ahash::AHashSet;
use clap::Args;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Args, Debug, Default)]
pub struct CompareArgs {
    /// A comparison file, or two or more seed configs
    #[arg(required = true)]
    pub configs: Vec<PathBuf>,

    /// MySQL DSN [default: SEED_DSN, then the first config's options.dsn]
    #[arg(long, env = "SEED_DSN")]
    pub dsn: Option<String>,

    /// Tables to seed in every run (comma-separated)
    #[arg(short, long)]
    pub tables: Option<String>,

    #[command(flatten)]
    pub settings: SeedSettings,

    /// Show progress bars
    #[arg(short, long)]
    pub progress: bool,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

/// One config to run
#[derive(Debug, Clone, PartialEq)]
struct Entry {
    label: String,
    file: PathBuf,
    /// Queries from the comparison file; `None` runs the config's own tests
    tests: Option<Vec<TestCase>>,
}

pub async fn run(args: CompareArgs) -> anyhow::Result<()> {
    let entries = entries(&args.configs)?;
    let configs: Vec<anyhow::Result<SeedYamlConfig>> = entries
        .iter()
        .map(|e| SeedYamlConfig::load(&e.file))
        .collect();

    let dsn = args
        .dsn
        .clone()
        .or_else(|| {
            configs
                .iter()
                .flatten()
                .find_map(|c| c.options.dsn.clone())
        })
        .ok_or_else(|| {
            anyhow::anyhow!("no database given: pass --dsn, set SEED_DSN or set options.dsn in a config")
        })?;

    let total = entries.len();
    let mut runs = Vec::with_capacity(total);
    for (i, (entry, config)) in entries.into_iter().zip(configs).enumerate() {
        if !args.json {
            eprintln!("[{}/{}] Running: {}", i + 1, total, entry.label);
        }
        let run = run_entry(entry, config, &dsn, &args).await;
        if !args.json {
            match &run.error {
                Some(e) => eprintln!("[{}/{}] Error: {} ({})\n", i + 1, total, run.label, e),
                None => eprintln!(
                    "[{}/{}] Complete: {} ({} tables, {} tests)\n",
                    i + 1,
                    total,
                    run.label,
                    run.tables,
                    run.results.len()
                ),
            }
        }
        runs.push(run);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&runs)?);
    } else {
        print!("{}", format_comparison(&runs));
    }
    Ok(())
}

/// Run one config; failures end up in the returned record
async fn run_entry(
    entry: Entry,
    config: anyhow::Result<SeedYamlConfig>,
    dsn: &str,
    args: &CompareArgs,
) -> ConfigRun {
    let mut run = ConfigRun {
        label: entry.label.clone(),
        ..Default::default()
    };
    let started = Instant::now();

    match execute_entry(entry, config, dsn, args, &mut run).await {
        Ok(outcome) => {
            run.rows = outcome.planned_rows;
            run.tables = outcome.tables;
            run.results = outcome.results;
        }
        Err(e) => run.error = Some(format!("{:#}", e)),
    }
    run.elapsed_ms = started.elapsed().as_millis() as u64;
    run
}

async fn execute_entry(
    entry: Entry,
    config: anyhow::Result<SeedYamlConfig>,
    dsn: &str,
    args: &CompareArgs,
    run: &mut ConfigRun,
) -> anyhow::Result<RunOutcome> {
    let config = config?;
    let schema_file = config
        .options
        .schema
        .clone()
        .ok_or_else(|| anyhow::anyhow!("{}: options.schema is required", entry.file.display()))?;
    run.schema_file = schema_file.display().to_string();

    let tests = entry.tests.unwrap_or_else(|| config.tests.clone());
    let spec = RunSpec {
        dsn,
        schema_file: &schema_file,
        tables: args.tables.as_deref(),
        settings: &args.settings,
        progress: args.progress && !args.json,
    };
    execute(config, &tests, &spec).await
}

/// Work out what to run from the positional arguments
fn entries(paths: &[PathBuf]) -> anyhow::Result<Vec<Entry>> {
    match paths {
        [single] if CompareConfig::is_compare_file(single) => {
            let compare = CompareConfig::load(single)?;
            Ok(compare
                .configs
                .iter()
                .map(|c| Entry {
                    label: c.label.clone(),
                    file: c.file.clone(),
                    tests: Some(compare.test_cases_for(&c.label)),
                })
                .collect())
        }
        [] | [_] => anyhow::bail!(
            "compare needs a comparison file with a 'configs' list, or at least two seed configs"
        ),
        _ => {
            let mut labels = AHashSet::new();
            paths
                .iter()
                .map(|path| {
                    let label = label_for(path);
                    if !labels.insert(label.clone()) {
                        anyhow::bail!("two configs share the label '{}'", label);
                    }
                    Ok(Entry {
                        label,
                        file: path.clone(),
                        tests: None,
                    })
                })
                .collect()
        }
    }
}

/// File name without extension
fn label_for(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_label_is_file_stem() {
        assert_eq!(label_for(Path::new("configs/narrow.yaml")), "narrow");
        assert_eq!(label_for(Path::new("wide")), "wide");
    }

    #[test]
    fn test_seed_configs_become_entries() {
        let paths = vec![PathBuf::from("a/narrow.yaml"), PathBuf::from("b/wide.yml")];
        let entries = entries(&paths).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].label, "narrow");
        assert_eq!(entries[1].file, PathBuf::from("b/wide.yml"));
        assert!(entries.iter().all(|e| e.tests.is_none()));
    }

    #[test]
    fn test_duplicate_labels_rejected() {
        let paths = vec![PathBuf::from("a/seed.yaml"), PathBuf::from("b/seed.yaml")];
        assert!(entries(&paths).is_err());
    }

    #[test]
    fn test_single_seed_config_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("seed.yaml");
        fs::write(&path, "tests:\n  - { name: t, query: SELECT 1 }\n").unwrap();
        assert!(entries(&[path]).is_err());
    }

    #[test]
    fn test_comparison_file_resolves_paths_and_queries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("compare.yaml");
        fs::write(
            &path,
            r#"
configs:
  - { label: narrow, file: narrow.yaml }
  - { label: wide, file: /abs/wide.yaml }
tests:
  - name: lookup
    repeat: 3
    queries:
      narrow: SELECT 1
"#,
        )
        .unwrap();

        let entries = entries(&[path]).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].file, dir.path().join("narrow.yaml"));
        assert_eq!(entries[1].file, PathBuf::from("/abs/wide.yaml"));

        let narrow = entries[0].tests.as_ref().unwrap();
        assert_eq!(narrow.len(), 1);
        assert_eq!(narrow[0].runs(), 3);
        assert_eq!(entries[1].tests.as_deref(), Some(&[][..]));
    }
}
