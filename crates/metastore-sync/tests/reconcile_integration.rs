//! Integration tests for table reconciliation.
//!
//! These tests run the reconciler and bulk driver against in-memory
//! catalogs and verify the exact sequence of target calls, the resulting
//! catalog state, and that a second run converges.

use metastore_core::model::{SPARK_SQL_PATH_PARAM, SPARK_SQL_PROVIDER_PARAM};
use metastore_core::{diff, IdentityLocation, PartitionCollection, Transformable};
use metastore_sync::prelude::*;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Fixtures
// =============================================================================

fn values(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| (*s).to_string()).collect()
}

fn orders_table(db: &str, location: &str) -> Table {
    Table::new(db, "orders", location)
        .column(Column::new("id", "bigint"))
        .column(Column::new("amount", "decimal(10,2)"))
        .partition_key(Column::new("ds", "string"))
}

/// Production catalog: `sales.orders` with two monthly partitions.
fn production() -> MemoryCatalog {
    MemoryCatalog::new()
        .database(Database::new("sales", "s3://repo/main/sales"))
        .table(
            orders_table("sales", "s3://repo/main/sales/orders"),
            vec![
                Partition::new(["2024-01"], "s3://repo/main/sales/orders/ds=2024-01"),
                Partition::new(["2024-02"], "s3://repo/main/sales/orders/ds=2024-02"),
            ],
        )
}

/// Branch catalog holding a stale copy of `sales.orders`.
fn stale_branch() -> MemoryCatalog {
    MemoryCatalog::new()
        .database(Database::new("sales", "s3://repo/dev/sales"))
        .table(
            orders_table("sales", "s3://repo/dev/sales/orders"),
            vec![
                Partition::new(["2023-12"], "s3://repo/dev/sales/orders/ds=2023-12"),
                Partition::new(["2024-01"], "s3://repo/dev/sales/orders/old/ds=2024-01"),
            ],
        )
}

fn dev_options() -> TransformOptions {
    TransformOptions::new("sales", "orders")
}

// =============================================================================
// Merge
// =============================================================================

#[tokio::test]
async fn diff_classifies_stale_branch() {
    let source = production();
    let target = stale_branch();

    let meta = get_diff(
        &source,
        &target,
        "sales",
        "orders",
        "sales",
        "orders",
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(meta.columns_diff.is_empty());
    let kinds: Vec<(DifferenceKind, &str)> = meta
        .partition_diff
        .iter()
        .map(|d| (d.kind, d.key.as_str()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (DifferenceKind::Removed, "2023-12"),
            (DifferenceKind::Altered, "2024-01"),
            (DifferenceKind::Added, "2024-02"),
        ]
    );
}

#[tokio::test]
async fn merge_applies_changes_in_order() {
    let source = production();
    let target = stale_branch();
    let reconciler = Reconciler::new(&source, &target);

    reconciler
        .copy_or_merge("sales", "orders", None, &dev_options(), &BranchLocation::new("dev"))
        .await
        .unwrap();

    let (db, name) = ("sales".to_string(), "orders".to_string());
    assert_eq!(
        target.calls(),
        vec![
            CatalogCall::AlterTable {
                db: db.clone(),
                table: name.clone(),
            },
            CatalogCall::AddPartitions {
                db: db.clone(),
                table: name.clone(),
                values: vec![values(&["2024-02"])],
            },
            CatalogCall::AlterPartitions {
                db: db.clone(),
                table: name.clone(),
                values: vec![values(&["2024-01"])],
            },
            CatalogCall::DropPartition {
                db,
                table: name,
                values: values(&["2023-12"]),
            },
        ]
    );

    let partitions = target.get_partitions("sales", "orders").await.unwrap();
    let locations: Vec<&str> = partitions.iter().map(|p| p.sd.location.as_str()).collect();
    assert_eq!(
        locations,
        vec![
            "s3://repo/dev/sales/orders/ds=2024-01",
            "s3://repo/dev/sales/orders/ds=2024-02",
        ]
    );
}

#[tokio::test]
async fn merge_converges() {
    let source = production();
    let target = stale_branch();
    let reconciler = Reconciler::new(&source, &target);
    let transformer = BranchLocation::new("dev");

    reconciler
        .copy_or_merge("sales", "orders", None, &dev_options(), &transformer)
        .await
        .unwrap();

    // Transformed source and target now agree partition by partition.
    let mut expected = source.get_partitions("sales", "orders").await.unwrap();
    for partition in &mut expected {
        partition.update(&dev_options(), &transformer, false).unwrap();
    }
    let actual = target.get_partitions("sales", "orders").await.unwrap();
    assert!(diff(
        &PartitionCollection::new(expected),
        &PartitionCollection::new(actual)
    )
    .is_empty());

    // A rerun only issues the unconditional table and batch calls.
    target.clear_calls();
    reconciler
        .copy_or_merge("sales", "orders", None, &dev_options(), &transformer)
        .await
        .unwrap();
    let calls = target.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|call| match call {
        CatalogCall::AddPartitions { values, .. } | CatalogCall::AlterPartitions { values, .. } =>
            values.is_empty(),
        CatalogCall::AlterTable { .. } => true,
        _ => false,
    }));
}

#[tokio::test]
async fn identity_merge_leaves_no_diff() {
    let source = production();
    let target = stale_branch();
    let reconciler = Reconciler::new(&source, &target);

    reconciler
        .copy_or_merge("sales", "orders", None, &dev_options(), &IdentityLocation)
        .await
        .unwrap();

    let meta = get_diff(
        &source,
        &target,
        "sales",
        "orders",
        "sales",
        "orders",
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    assert!(meta.is_empty(), "{meta:?}");
}

#[tokio::test]
async fn failed_merge_recovers_on_rerun() {
    let source = production();
    let target = stale_branch();
    target.fail_on(CatalogOp::DropPartition);
    let reconciler = Reconciler::new(&source, &target);
    let transformer = BranchLocation::new("dev");

    let err = reconciler
        .copy_or_merge("sales", "orders", None, &dev_options(), &transformer)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Client);
    assert!(err.to_string().contains("sales.orders[2023-12]"));
    assert_eq!(target.get_partitions("sales", "orders").await.unwrap().len(), 3);

    target.clear_failure();
    target.clear_calls();
    reconciler
        .copy_or_merge("sales", "orders", None, &dev_options(), &transformer)
        .await
        .unwrap();

    assert_eq!(
        target.calls().last(),
        Some(&CatalogCall::DropPartition {
            db: "sales".into(),
            table: "orders".into(),
            values: values(&["2023-12"]),
        })
    );
    assert_eq!(target.get_partitions("sales", "orders").await.unwrap().len(), 2);
}

// =============================================================================
// Copy
// =============================================================================

#[tokio::test]
async fn copy_creates_table_with_one_batch() {
    let source = production();
    let target = MemoryCatalog::new().database(Database::new("sales_dev", "s3://repo/dev/sales"));
    let reconciler = Reconciler::new(&source, &target);

    reconciler
        .copy_or_merge(
            "sales",
            "orders",
            None,
            &TransformOptions::new("sales_dev", "orders_copy").serde("parquet"),
            &BranchLocation::new("dev"),
        )
        .await
        .unwrap();

    let calls = target.calls();
    assert_eq!(calls.len(), 2);
    assert!(matches!(&calls[0], CatalogCall::CreateTable { db, table }
        if db == "sales_dev" && table == "orders_copy"));
    assert!(matches!(&calls[1], CatalogCall::AddPartitions { values, .. } if values.len() == 2));

    let table = target.get_table("sales_dev", "orders_copy").await.unwrap();
    assert_eq!(table.sd.serde_info.name, "parquet");
    assert_eq!(table.partition_keys.len(), 1);
    let partitions = target.get_partitions("sales_dev", "orders_copy").await.unwrap();
    assert!(partitions.iter().all(|p| p.sd.serde_info.name == "parquet"
        && p.table_name == "orders_copy"));
}

#[tokio::test]
async fn copy_repairs_spark_placeholder() {
    let mut table = Table::new("sales", "events", "s3://repo/main/sales/events-__PLACEHOLDER__")
        .parameter(SPARK_SQL_PROVIDER_PARAM, "delta");
    table
        .sd
        .serde_info
        .parameters
        .insert(SPARK_SQL_PATH_PARAM.to_string(), "s3://repo/main/sales/events".into());
    let source = MemoryCatalog::new()
        .database(Database::new("sales", "s3://repo/main/sales"))
        .table(table, vec![]);
    let target = MemoryCatalog::new().database(Database::new("sales", "s3://repo/dev/sales"));
    let reconciler = Reconciler::new(&source, &target);

    reconciler
        .copy_or_merge(
            "sales",
            "events",
            None,
            &TransformOptions::new("sales", "events").fix_spark_placeholder(true),
            &BranchLocation::new("dev"),
        )
        .await
        .unwrap();

    let copied = target.get_table("sales", "events").await.unwrap();
    assert_eq!(copied.sd.location, "s3://repo/dev/sales/events");
    assert_eq!(
        copied.sd.serde_info.parameters[SPARK_SQL_PATH_PARAM],
        "s3://repo/dev/sales/events"
    );
}

#[tokio::test]
async fn empty_partition_selection_copies_table() {
    let source = production();
    let target = MemoryCatalog::new().database(Database::new("sales", "s3://repo/dev/sales"));
    let reconciler = Reconciler::new(&source, &target);
    let none: Vec<String> = Vec::new();

    reconciler
        .copy_or_merge("sales", "orders", Some(&none), &dev_options(), &IdentityLocation)
        .await
        .unwrap();

    assert!(matches!(
        target.calls().first(),
        Some(CatalogCall::CreateTable { .. })
    ));
}

// =============================================================================
// Bulk
// =============================================================================

#[tokio::test]
async fn bulk_continues_past_failing_table() {
    let source = production()
        .table(Table::new("sales", "payments", "not-a-uri"), vec![])
        .table(Table::new("sales", "returns", "s3://repo/main/sales/returns"), vec![]);
    let target = MemoryCatalog::new();
    let options = BulkOptions::new().continue_on_error(true);

    let report = BulkDriver::new(&source, &target, options)
        .copy_or_merge_all("dev", "")
        .await
        .unwrap();

    assert_eq!(report.tables_synced, vec!["sales.orders", "sales.returns"]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].table, "sales.payments");
    assert_eq!(report.failures[0].error.kind(), ErrorKind::Transform);
    assert!(!target.has_table("sales", "payments").await.unwrap());
}

#[tokio::test]
async fn bulk_stops_at_failing_table_by_default() {
    let source = production()
        .table(Table::new("sales", "payments", "not-a-uri"), vec![])
        .table(Table::new("sales", "returns", "s3://repo/main/sales/returns"), vec![]);
    let target = MemoryCatalog::new();

    let err = BulkDriver::new(&source, &target, BulkOptions::new())
        .copy_or_merge_all("dev", "")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transform);
    assert!(target.has_table("sales", "orders").await.unwrap());
    assert!(!target.has_table("sales", "returns").await.unwrap());
}

#[tokio::test]
async fn bulk_rerun_merges_into_existing_database() {
    let source = production();
    let target = MemoryCatalog::new();
    let driver = BulkDriver::new(&source, &target, BulkOptions::new());

    driver.copy_or_merge_all("dev", "").await.unwrap();
    target.clear_calls();
    let report = driver.copy_or_merge_all("dev", "").await.unwrap();

    assert_eq!(report.tables_synced, vec!["sales.orders"]);
    assert!(matches!(
        target.calls().first(),
        Some(CatalogCall::CreateDatabase { .. })
    ));
    assert!(matches!(
        target.calls().get(1),
        Some(CatalogCall::AlterTable { .. })
    ));
}

// =============================================================================
// Snapshots
// =============================================================================

#[tokio::test]
async fn snapshot_round_trip_preserves_merge_result() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dev.json");
    let source = production();
    let target = stale_branch();

    Reconciler::new(&source, &target)
        .copy_or_merge("sales", "orders", None, &dev_options(), &BranchLocation::new("dev"))
        .await
        .unwrap();
    target.save(&path).await.unwrap();

    let reloaded = MemoryCatalog::load(&path).await.unwrap();
    assert_eq!(
        reloaded.get_partitions("sales", "orders").await.unwrap(),
        target.get_partitions("sales", "orders").await.unwrap()
    );
    assert_eq!(
        reloaded.get_table("sales", "orders").await.unwrap(),
        target.get_table("sales", "orders").await.unwrap()
    );
}
