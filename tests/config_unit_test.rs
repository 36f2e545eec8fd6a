//! Unit tests for YAML configuration loading.

use sql_seeder::config::SeedYamlConfig;
use sql_seeder::generator::Distribution;
use sql_seeder::schema::{Column, Schema, Table};
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

mod config_tests {
    use super::*;

    #[test]
    fn test_load_from_file() {
        let file = write_config(
            r#"
options:
  seed_tables: [orders]
  workers: 8
  fk_sample_size: 5000
  seed: 42
tables:
  orders:
    distributions:
      customer_id: { type: zipf }
      channel: { type: normal, mean: 0.2 }
"#,
        );

        let config = SeedYamlConfig::load(file.path()).unwrap();
        assert_eq!(config.options.seed_tables, vec!["orders".to_string()]);
        assert_eq!(config.options.workers, Some(8));
        assert_eq!(config.options.fk_sample_size, Some(5000));
        assert_eq!(config.options.seed, Some(42));

        let orders = config.get_table_config("orders").unwrap();
        assert_eq!(orders.distribution_for("customer_id"), Distribution::Zipf { s: 1.0 });
        assert_eq!(
            orders.distribution_for("channel"),
            Distribution::Normal {
                mean: 0.2,
                stddev: 0.15
            }
        );
    }

    #[test]
    fn test_zero_rows_is_not_an_override() {
        let config = SeedYamlConfig::parse(
            r#"
tables:
  users: { rows: 0 }
  orders: { rows: 25 }
  items: {}
"#,
        )
        .unwrap();

        let overrides = config.row_overrides();
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides.get("orders"), Some(&25));
        assert!(!overrides.contains_key("users"));
    }

    #[test]
    fn test_schema_path_is_relative_to_config() {
        let file = write_config("options:\n  schema: ddl/schema.sql\n");
        let config = SeedYamlConfig::load(file.path()).unwrap();
        assert_eq!(
            config.options.schema,
            Some(file.path().parent().unwrap().join("ddl/schema.sql"))
        );

        let absolute = write_config("options:\n  schema: /srv/schema.sql\n");
        let config = SeedYamlConfig::load(absolute.path()).unwrap();
        assert_eq!(config.options.schema, Some("/srv/schema.sql".into()));
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = SeedYamlConfig::load(std::path::Path::new("/nonexistent/seed.yaml")).unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/seed.yaml"));
    }

    #[test]
    fn test_invalid_yaml() {
        let file = write_config("options: [not, a, map]\n");
        assert!(SeedYamlConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_per_column_probability_validated() {
        let yaml = "tables:\n  users:\n    null_probability: { bio: -0.1 }\n";
        let err = SeedYamlConfig::parse(yaml).unwrap_err();
        assert!(err.to_string().contains("users.null_probability.bio"));
    }

    #[test]
    fn test_empty_correlation_group_rejected() {
        let yaml = "tables:\n  users:\n    correlations:\n      - columns: []\n        source: person\n";
        assert!(SeedYamlConfig::parse(yaml).is_err());
    }

    #[test]
    fn test_references_attach_logical_foreign_keys() {
        let config = SeedYamlConfig::parse(
            "tables:\n  orders:\n    references: { buyer: Users.id }\n",
        )
        .unwrap();
        let mut schema = Schema::from_tables([
            Table::new("users", vec![Column::new("id", "int").primary_key()]),
            Table::new("orders", vec![Column::new("buyer", "int")]),
        ]);

        schema.apply_references(&config.references()).unwrap();

        let buyer = schema.get_table("orders").unwrap().get_column("buyer").unwrap();
        let fk = buyer.foreign_key.as_ref().unwrap();
        assert_eq!(fk.referenced_table, "users");
        assert_eq!(fk.referenced_column, "id");
        assert!(fk.logical);
    }

    #[test]
    fn test_reference_to_unknown_column_fails() {
        let config =
            SeedYamlConfig::parse("tables:\n  orders:\n    references: { buyer: users.uuid }\n")
                .unwrap();
        let mut schema = Schema::from_tables([
            Table::new("users", vec![Column::new("id", "int").primary_key()]),
            Table::new("orders", vec![Column::new("buyer", "int")]),
        ]);
        assert!(schema.apply_references(&config.references()).is_err());
    }
}
