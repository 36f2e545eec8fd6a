//! Unit tests for the seeding orchestrator and its helpers.

use sql_seeder::generator::SqlValue;
use sql_seeder::plan::RowPlan;
use sql_seeder::schema::{resolve, Column, Schema, Table};
use sql_seeder::seeder::indexes::IndexColumn;
use sql_seeder::seeder::memory::MemoryTarget;
use sql_seeder::seeder::{
    self, compute_last_consumers, FkCache, IndexDef, InsertMode, SeedError, SeedOptions,
};
use std::sync::Arc;

fn company_schema() -> Schema {
    Schema::from_tables([
        Table::new(
            "company",
            vec![
                Column::new("id", "int").primary_key(),
                Column::new("name", "varchar(100)"),
            ],
        ),
        Table::new(
            "employee",
            vec![
                Column::new("id", "int").primary_key(),
                Column::new("company_id", "int").references("company", "id"),
                Column::new("email", "varchar(255)").unique(),
            ],
        ),
    ])
}

fn order(schema: &Schema) -> Vec<String> {
    resolve(schema, &["employee".to_string()]).unwrap().order
}

fn plan(company: u64, employee: u64) -> RowPlan {
    [("company".to_string(), company), ("employee".to_string(), employee)]
        .into_iter()
        .collect()
}

fn options() -> SeedOptions {
    SeedOptions {
        batch_size: 4,
        workers: 3,
        seed: Some(11),
        ..Default::default()
    }
}

fn ints(values: &[SqlValue]) -> Vec<i64> {
    values.iter().map(|v| v.as_i64().unwrap()).collect()
}

fn company_rows(ids: std::ops::RangeInclusive<i64>) -> Vec<Vec<SqlValue>> {
    ids.map(|id| vec![SqlValue::Int(id), SqlValue::from(format!("Company {}", id))])
        .collect()
}

mod fk_cache_tests {
    use super::*;

    #[test]
    fn test_last_consumer_is_latest_reader() {
        let schema = Schema::from_tables([
            Table::new("users", vec![Column::new("id", "int").primary_key()]),
            Table::new(
                "posts",
                vec![
                    Column::new("id", "int").primary_key(),
                    Column::new("user_id", "int").references("users", "id"),
                ],
            ),
            Table::new(
                "comments",
                vec![
                    Column::new("post_id", "int").references("Posts", "ID"),
                    Column::new("user_id", "int").references("users", "id"),
                ],
            ),
        ]);
        let order: Vec<String> = ["users", "posts", "comments"].map(String::from).to_vec();

        let last = compute_last_consumers(&schema, &order);
        assert_eq!(last.get("users.id"), Some(&2));
        assert_eq!(last.get("posts.id"), Some(&2));
        assert_eq!(last.len(), 2);
    }

    #[test]
    fn test_entries_evicted_after_last_consumer() {
        let schema = company_schema();
        let mut cache = FkCache::new(compute_last_consumers(&schema, &order(&schema)));

        assert!(cache.needed_after("company.id", 0));
        assert!(!cache.needed_after("company.id", 1));
        assert!(!cache.needed_after("employee.id", 0));

        cache.insert("company.id".to_string(), vec![SqlValue::Int(1)]);
        assert_eq!(cache.evict_consumed_by(0), 0);
        assert!(cache.contains("company.id"));
        assert_eq!(cache.evict_consumed_by(1), 1);
        assert!(cache.is_empty());
    }
}

mod run_tests {
    use super::*;

    #[tokio::test]
    async fn test_full_run_keeps_references_valid() {
        let schema = company_schema();
        let target = Arc::new(MemoryTarget::new());

        let stats = seeder::run(Arc::clone(&target), &schema, &order(&schema), &plan(5, 23), &options())
            .await
            .unwrap();

        assert_eq!(stats.total_inserted, 28);
        assert_eq!(stats.tables_seeded, 2);
        assert_eq!(stats.tables_skipped, 0);
        assert_eq!(stats.tables[0].name, "company");
        assert!(target.is_finished().await);

        let mut company_ids = ints(&target.column_values("company", "id").await);
        company_ids.sort_unstable();
        assert_eq!(company_ids, vec![1, 2, 3, 4, 5]);

        for company in ints(&target.column_values("employee", "company_id").await) {
            assert!((1..=5).contains(&company));
        }

        let emails = target.column_values("employee", "email").await;
        let distinct: std::collections::HashSet<String> =
            emails.iter().map(|e| e.to_string()).collect();
        assert_eq!(distinct.len(), 23);
    }

    #[tokio::test]
    async fn test_table_at_target_is_skipped_but_still_referenced() {
        let schema = company_schema();
        let target = Arc::new(MemoryTarget::new().with_rows("company", &["id", "name"], company_rows(40..=44)));

        let stats = seeder::run(Arc::clone(&target), &schema, &order(&schema), &plan(5, 10), &options())
            .await
            .unwrap();

        assert_eq!(stats.tables_skipped, 1);
        assert!(stats.tables[0].skipped);
        assert_eq!(stats.tables[0].inserted_rows, 0);
        assert_eq!(target.row_count("company").await, 5);
        assert_eq!(target.row_count("employee").await, 10);

        for company in ints(&target.column_values("employee", "company_id").await) {
            assert!((40..=44).contains(&company), "company_id {}", company);
        }
    }

    #[tokio::test]
    async fn test_top_up_continues_key_sequence() {
        let schema = company_schema();
        let target = Arc::new(MemoryTarget::new().with_rows("company", &["id", "name"], company_rows(1..=3)));

        let stats = seeder::run(Arc::clone(&target), &schema, &order(&schema), &plan(5, 0), &options())
            .await
            .unwrap();

        assert_eq!(stats.tables[0].existing_rows, 3);
        assert_eq!(stats.tables[0].inserted_rows, 2);
        let mut ids = ints(&target.column_values("company", "id").await);
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_clear_truncates_first() {
        let schema = company_schema();
        let target = Arc::new(MemoryTarget::new().with_rows("company", &["id", "name"], company_rows(1..=9)));
        let options = SeedOptions {
            clear: true,
            ..options()
        };

        seeder::run(Arc::clone(&target), &schema, &order(&schema), &plan(2, 4), &options)
            .await
            .unwrap();

        assert_eq!(target.row_count("company").await, 2);
        assert_eq!(target.row_count("employee").await, 4);
        let statements = target.statements().await;
        assert_eq!(statements[0], "TRUNCATE TABLE `company`");
    }

    #[tokio::test]
    async fn test_load_data_mode() {
        let schema = company_schema();
        let target = Arc::new(MemoryTarget::new());
        let options = SeedOptions {
            mode: InsertMode::LoadData,
            ..options()
        };

        let stats = seeder::run(Arc::clone(&target), &schema, &order(&schema), &plan(3, 6), &options)
            .await
            .unwrap();
        assert_eq!(stats.total_inserted, 9);
    }

    #[tokio::test]
    async fn test_load_data_requires_local_infile() {
        let schema = company_schema();
        let target = Arc::new(MemoryTarget::new().with_local_infile(false));
        let options = SeedOptions {
            mode: InsertMode::LoadData,
            ..options()
        };

        let err = seeder::run(Arc::clone(&target), &schema, &order(&schema), &plan(3, 6), &options)
            .await
            .unwrap_err();

        assert!(matches!(err.downcast_ref::<SeedError>(), Some(SeedError::Precondition(_))));
        assert!(err.to_string().contains("local_infile"));
        assert_eq!(target.row_count("company").await, 0);
    }

    #[tokio::test]
    async fn test_unknown_table_in_order() {
        let schema = company_schema();
        let target = Arc::new(MemoryTarget::new());
        let order = vec!["company".to_string(), "ghost".to_string()];

        let err = seeder::run(target, &schema, &order, &plan(1, 1), &options())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[tokio::test]
    async fn test_failed_insert_restores_deferred_indexes() {
        let schema = company_schema();
        let target = Arc::new(
            MemoryTarget::new()
                .with_indexes(
                    "employee",
                    vec![
                        IndexDef {
                            name: "idx_company".into(),
                            unique: false,
                            columns: vec![IndexColumn::new("company_id")],
                        },
                        IndexDef {
                            name: "uq_email".into(),
                            unique: true,
                            columns: vec![IndexColumn::prefixed("email", 64)],
                        },
                    ],
                )
                .with_fk_sets("employee", vec![vec!["company_id".to_string()]])
                .failing_on("employee"),
        );
        let options = SeedOptions {
            defer_indexes: true,
            ..options()
        };

        let err = seeder::run(Arc::clone(&target), &schema, &order(&schema), &plan(3, 50), &options)
            .await
            .unwrap_err();

        let Some(SeedError::Insert { table, .. }) = err.downcast_ref::<SeedError>() else {
            panic!("expected an insert error, got {:#}", err);
        };
        assert_eq!(table, "employee");
        assert_eq!(
            target.statements().await,
            vec![
                "ALTER TABLE `employee` DROP INDEX `uq_email`".to_string(),
                "ALTER TABLE `employee` ADD UNIQUE INDEX `uq_email` (`email`(64))".to_string(),
            ]
        );
        assert_eq!(target.row_count("company").await, 3);
        assert_eq!(target.row_count("employee").await, 0);
        assert!(target.is_finished().await);
    }

    #[tokio::test]
    async fn test_build_generator_samples_parent_values() {
        let schema = company_schema();
        let target = MemoryTarget::new().with_rows("company", &["id", "name"], company_rows(1..=100));
        let options = SeedOptions {
            fk_sample_size: 10,
            ..options()
        };
        let mut cache = FkCache::default();
        let employee = schema.get_table("employee").unwrap();

        let (mut generator, correlations) =
            seeder::build_generator(&target, &schema, employee, &mut cache, &options, false)
                .await
                .unwrap();

        assert_eq!(correlations, 0);
        assert_eq!(cache.get("company.id").unwrap().len(), 10);
        let sampled: Vec<i64> = ints(&cache.get("company.id").unwrap());
        let company = generator.columns().iter().position(|c| c == "company_id").unwrap();
        for row in generator.generate_batch(100).unwrap() {
            assert!(sampled.contains(&row[company].as_i64().unwrap()));
        }
    }
}
