//! Integration tests for the sequential migrator.
//!
//! Most tests run against the in-memory target. The PostgreSQL test at the end
//! requires a running server; set TEST_POSTGRES_URL to run it.

use notisync_schema::db::{
    MemoryTarget, MigrationTarget, Migrator, PgTarget, PoolOptions, SchemaInspector, compare,
    connect,
};
use notisync_schema::error::SchemaError;
use notisync_schema::migrations::catalog::{RULE_TYPE_CHECK, USER_RULES};
use notisync_schema::migrations::{Direction, find, schema_at};

fn allowed_rule_types(target: &MemoryTarget) -> Vec<String> {
    target.schema().table(USER_RULES).unwrap().checks[RULE_TYPE_CHECK]
        .allowed_values
        .clone()
}

#[tokio::test]
async fn test_up_applies_everything_from_empty() {
    let mut migrator = Migrator::new(MemoryTarget::new());

    let steps = migrator.up(None).await.unwrap();
    assert_eq!(steps.len(), 2);
    assert!(steps.iter().all(|s| s.direction == Direction::Up));

    let status = migrator.status().await.unwrap();
    assert_eq!(status.current_version, 2);
    assert!(status.is_up_to_date());
    assert_eq!(migrator.target().schema(), &schema_at(2).unwrap());
    assert_eq!(allowed_rule_types(migrator.target()).len(), 5);
}

#[tokio::test]
async fn test_up_is_idempotent() {
    let mut migrator = Migrator::new(MemoryTarget::new());
    migrator.up(None).await.unwrap();

    let steps = migrator.up(None).await.unwrap();
    assert!(steps.is_empty());
    assert_eq!(migrator.current_version().await.unwrap(), 2);
}

#[tokio::test]
async fn test_up_to_intermediate_version() {
    let mut migrator = Migrator::new(MemoryTarget::new());
    migrator.up(Some(1)).await.unwrap();

    let status = migrator.status().await.unwrap();
    assert_eq!(status.current_version, 1);
    assert_eq!(status.pending.len(), 1);
    assert_eq!(status.pending[0].name, "add_rule_types");
}

#[tokio::test]
async fn test_down_reverts_one_step_by_default() {
    let mut migrator = Migrator::new(MemoryTarget::new());
    migrator.up(None).await.unwrap();

    let steps = migrator.down(None).await.unwrap();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].version, 2);
    assert_eq!(steps[0].direction, Direction::Down);
    assert_eq!(
        steps[0].changes,
        vec![
            "drop index idx_user_rules_is_active",
            "drop index idx_user_rules_priority",
            "drop column user_rules.updated_at",
            "drop column user_rules.priority",
            "drop constraint user_rules_rule_type_check on user_rules",
            "add constraint user_rules_rule_type_check on user_rules.rule_type (3 values)",
        ]
    );

    assert_eq!(migrator.current_version().await.unwrap(), 1);
    assert_eq!(migrator.target().schema(), &schema_at(1).unwrap());
    assert_eq!(
        allowed_rule_types(migrator.target()),
        vec!["app_filter", "keyword_filter", "time_based"]
    );
}

#[tokio::test]
async fn test_down_to_zero_empties_the_database() {
    let mut migrator = Migrator::new(MemoryTarget::new());
    migrator.up(None).await.unwrap();

    let steps = migrator.down(Some(0)).await.unwrap();
    let versions: Vec<u32> = steps.iter().map(|s| s.version).collect();
    assert_eq!(versions, vec![2, 1]);
    assert!(migrator.target().schema().tables.is_empty());

    // Nothing left to revert.
    assert!(migrator.down(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_wrong_direction_targets_are_rejected() {
    let mut migrator = Migrator::new(MemoryTarget::new());
    migrator.up(Some(1)).await.unwrap();

    let err = migrator.down(Some(2)).await.unwrap_err();
    assert!(matches!(err, SchemaError::InvalidInput { .. }));

    migrator.up(None).await.unwrap();
    let err = migrator.up(Some(1)).await.unwrap_err();
    assert!(matches!(err, SchemaError::InvalidInput { .. }));
}

#[tokio::test]
async fn test_unknown_target_is_rejected() {
    let mut migrator = Migrator::new(MemoryTarget::new());
    let err = migrator.up(Some(9)).await.unwrap_err();
    assert!(matches!(err, SchemaError::InvalidInput { .. }));
    assert_eq!(migrator.current_version().await.unwrap(), 0);
}

#[tokio::test]
async fn test_ledger_gap_is_drift() {
    let target = MemoryTarget::with_state(schema_at(2).unwrap(), &[(2, "add_rule_types")]);
    let mut migrator = Migrator::new(target);

    let err = migrator.status().await.unwrap_err();
    assert!(matches!(err, SchemaError::Drift { .. }));
    assert!(err.to_string().contains("gap"));
    assert!(migrator.up(None).await.is_err());
}

#[tokio::test]
async fn test_unknown_ledger_version_is_drift() {
    let target = MemoryTarget::with_state(
        schema_at(2).unwrap(),
        &[(1, "create_user_rules"), (2, "add_rule_types"), (3, "add_rule_tags")],
    );
    let err = Migrator::new(target).status().await.unwrap_err();
    assert!(matches!(err, SchemaError::Drift { .. }));
    assert!(err.to_string().contains("not in the catalog"));
}

#[tokio::test]
async fn test_renamed_ledger_entry_is_drift() {
    let target = MemoryTarget::with_state(schema_at(1).unwrap(), &[(1, "create_rules")]);
    let err = Migrator::new(target).status().await.unwrap_err();
    assert!(matches!(err, SchemaError::Drift { .. }));
}

#[tokio::test]
async fn test_failed_down_keeps_ledger_version() {
    // Database at v2 whose rule_type constraint was dropped by hand.
    let mut schema = schema_at(2).unwrap();
    schema
        .table_mut(USER_RULES)
        .unwrap()
        .checks
        .remove(RULE_TYPE_CHECK);
    let target = MemoryTarget::with_state(
        schema.clone(),
        &[(1, "create_user_rules"), (2, "add_rule_types")],
    );
    let mut migrator = Migrator::new(target);

    let err = migrator.down(None).await.unwrap_err();
    assert!(matches!(err, SchemaError::Schema { .. }));
    assert_eq!(migrator.current_version().await.unwrap(), 2);
    assert_eq!(migrator.target().schema(), &schema);
}

#[tokio::test]
async fn test_direct_target_apply_records_ledger() {
    let mut target = MemoryTarget::new();
    target.ensure_ledger().await.unwrap();
    target.apply(find(1).unwrap(), Direction::Up).await.unwrap();

    let applied = target.applied().await.unwrap();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].version, 1);
}

/// Full cycle against PostgreSQL.
/// Set TEST_POSTGRES_URL to a disposable database to run this test.
#[tokio::test]
async fn test_postgres_up_down_cycle() {
    let url = match std::env::var("TEST_POSTGRES_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping test: TEST_POSTGRES_URL not set");
            return;
        }
    };

    let pool = connect(&url, &PoolOptions::default()).await.unwrap();
    let mut migrator = Migrator::new(PgTarget::new(pool.clone()));

    migrator.down(Some(0)).await.unwrap();
    migrator.up(None).await.unwrap();
    assert_eq!(migrator.current_version().await.unwrap(), 2);

    let expected = schema_at(2).unwrap();
    let live = SchemaInspector::describe_table(&pool, USER_RULES).await.unwrap();
    let differences = compare(expected.table(USER_RULES).unwrap(), &live);
    assert!(differences.is_empty(), "{:?}", differences);

    migrator.down(None).await.unwrap();
    let live = SchemaInspector::describe_table(&pool, USER_RULES).await.unwrap();
    assert_eq!(
        live.checks[RULE_TYPE_CHECK],
        vec!["app_filter", "keyword_filter", "time_based"]
    );
    assert!(!live.columns.iter().any(|c| c == "priority"));

    migrator.down(Some(0)).await.unwrap();
}
