//! Bulk reconciliation of every matching database and table.

use metastore_core::{BranchLocation, ImportLocation, LocationTransformer, TransformOptions};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::client::{Client, ReadClient};
use crate::error::{ErrorKind, Result, SyncError};
use crate::reconciler::{guarded, Reconciler};

/// Options for a bulk run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkOptions {
    /// Hive-style pattern selecting source databases. Empty selects all.
    pub schema_filter: String,
    /// Hive-style pattern selecting tables in each database. Empty selects all.
    pub table_filter: String,
    /// Log and skip a failing table instead of aborting the run.
    pub continue_on_error: bool,
    /// Repair Spark placeholder locations.
    pub fix_spark_placeholder: bool,
}

impl BulkOptions {
    /// Creates options selecting every database and table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the database pattern.
    #[must_use]
    pub fn schema_filter(mut self, pattern: impl Into<String>) -> Self {
        self.schema_filter = pattern.into();
        self
    }

    /// Sets the table pattern.
    #[must_use]
    pub fn table_filter(mut self, pattern: impl Into<String>) -> Self {
        self.table_filter = pattern.into();
        self
    }

    /// Sets whether per-table failures are skipped.
    #[must_use]
    pub fn continue_on_error(mut self, enabled: bool) -> Self {
        self.continue_on_error = enabled;
        self
    }

    /// Sets whether Spark placeholder locations are repaired.
    #[must_use]
    pub fn fix_spark_placeholder(mut self, enabled: bool) -> Self {
        self.fix_spark_placeholder = enabled;
        self
    }
}

/// A table that failed during a bulk run with `continue_on_error` set.
#[derive(Debug)]
pub struct TableFailure {
    /// Source table as `db.table`.
    pub table: String,
    /// Why it failed.
    pub error: SyncError,
}

/// Outcome of a bulk run.
#[derive(Debug, Default)]
pub struct BulkReport {
    /// Target databases visited.
    pub databases: Vec<String>,
    /// Tables reconciled successfully, as target `db.table`.
    pub tables_synced: Vec<String>,
    /// Tables skipped after a failure.
    pub failures: Vec<TableFailure>,
}

impl BulkReport {
    /// Returns whether every table was reconciled.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Drives a [`Reconciler`] across databases and tables.
pub struct BulkDriver<'a, S: ?Sized, T: ?Sized> {
    reconciler: Reconciler<'a, S, T>,
    options: BulkOptions,
}

impl<'a, S, T> BulkDriver<'a, S, T>
where
    S: ReadClient + ?Sized,
    T: Client + ?Sized,
{
    /// Creates a driver copying from `source` into `target`.
    pub fn new(source: &'a S, target: &'a T, options: BulkOptions) -> Self {
        Self {
            reconciler: Reconciler::new(source, target),
            options,
        }
    }

    /// Uses `cancel` to abort the run.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.reconciler = self.reconciler.with_cancellation(cancel);
        self
    }

    /// Copies or merges every matching table onto `branch`, mapping
    /// `dbfs:/` locations under `dbfs_root` first.
    pub async fn copy_or_merge_all(&self, branch: &str, dbfs_root: &str) -> Result<BulkReport> {
        let transformer = BranchLocation::new(branch).with_dbfs_root(dbfs_root);
        self.apply_all(&transformer).await
    }

    /// Registers every matching table against its imported location in
    /// `repository` on `branch`.
    pub async fn import_all(
        &self,
        repository: &str,
        branch: &str,
        dbfs_root: &str,
    ) -> Result<BulkReport> {
        let transformer = ImportLocation::new(repository, branch).with_dbfs_root(dbfs_root);
        self.apply_all(&transformer).await
    }

    /// Reconciles every matching database and table with `transformer`.
    ///
    /// Database failures other than an existing target database abort the
    /// run. Table failures abort it unless `continue_on_error` is set, in
    /// which case they are logged and reported. Cancellation always aborts.
    pub async fn apply_all(&self, transformer: &dyn LocationTransformer) -> Result<BulkReport> {
        let source = self.reconciler.source();
        let target = self.reconciler.target();
        let cancel = self.reconciler.cancellation();
        let databases = guarded(
            cancel,
            "get_databases",
            &self.options.schema_filter,
            source.get_databases(&self.options.schema_filter),
        )
        .await?;
        info!(
            databases = databases.len(),
            schema_filter = %self.options.schema_filter,
            table_filter = %self.options.table_filter,
            "Starting bulk reconciliation"
        );

        let mut report = BulkReport::default();
        for database in databases {
            let from_db = database.name;
            let to_db = target.normalize_db_name(&from_db);
            match self.reconciler.copy_db(&from_db, &to_db, transformer).await {
                Ok(()) => {}
                Err(SyncError::SchemaExists(_)) => {
                    info!(database = %to_db, "Database exists, reusing");
                }
                Err(e) => return Err(e),
            }

            let tables = guarded(
                cancel,
                "get_tables",
                &from_db,
                source.get_tables(&from_db, &self.options.table_filter),
            )
            .await?;
            for table in tables {
                let table_name = table.table_name.clone();
                let source_name = format!("{from_db}.{table_name}");
                let target_name = format!("{to_db}.{table_name}");
                info!(from = %source_name, to = %target_name, "Reconciling table");

                let options = TransformOptions::new(&to_db, &table_name)
                    .serde(&table_name)
                    .fix_spark_placeholder(self.options.fix_spark_placeholder);
                let result = self
                    .reconciler
                    .copy_or_merge_from_values(&from_db, table, &options, transformer)
                    .await;
                match result {
                    Ok(()) => report.tables_synced.push(target_name),
                    Err(e) if e.kind() == ErrorKind::Cancelled => return Err(e),
                    Err(e) if self.options.continue_on_error => {
                        warn!(table = %source_name, error = %e, "Skipping failed table");
                        report.failures.push(TableFailure {
                            table: source_name,
                            error: e,
                        });
                    }
                    Err(e) => return Err(e),
                }
            }
            report.databases.push(to_db);
        }

        info!(
            tables = report.tables_synced.len(),
            failures = report.failures.len(),
            "Bulk reconciliation finished"
        );
        Ok(report)
    }
}
