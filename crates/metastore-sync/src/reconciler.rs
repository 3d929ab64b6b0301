//! Table and database reconciliation.
//!
//! The [`Reconciler`] makes a target catalog's view of a table match a
//! transformed view of the source catalog:
//!
//! - **Copy** when the target table does not exist: create it, then add every
//!   transformed partition in one batch.
//! - **Merge** when it does: diff transformed source partitions against the
//!   target's, then alter the table, add new partitions, alter changed ones,
//!   and finally drop stale partitions one at a time.
//! - **Copy partition** when a single partition tuple is requested.
//!
//! Every client call is preceded by a cancellation check and raced against
//! the cancellation token. A failure aborts the table immediately and leaves
//! whatever was already applied in place; running the reconciliation again
//! converges through the same diff.

use std::future::Future;

use metastore_core::{
    diff, diff_with, ColumnCollection, Database, DifferenceKind, Entity, LocationTransformer,
    MetaDiff, Partition, PartitionCollection, SymlinkLocation, Table, TransformOptions,
    Transformable,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::{Client, ReadClient};
use crate::error::{ClientError, ClientResult, Result, SyncError};

/// Runs `call` unless `cancel` fires first, attaching `operation` and
/// `target` to any failure.
pub(crate) async fn guarded<T, F>(
    cancel: &CancellationToken,
    operation: &'static str,
    target: &str,
    call: F,
) -> Result<T>
where
    F: Future<Output = ClientResult<T>>,
{
    if cancel.is_cancelled() {
        return Err(SyncError::Cancelled(target.to_string()));
    }
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(SyncError::Cancelled(target.to_string())),
        result = call => result.map_err(|e| SyncError::client(operation, target, e)),
    }
}

fn qualified(db: &str, table: &str) -> String {
    format!("{db}.{table}")
}

/// `db.table[v1/v2]` identity of one partition.
fn partition_name(table_name: &str, values: &[String]) -> String {
    format!("{table_name}[{}]", values.join("/"))
}

/// Partitions bucketed by the action the target needs.
#[derive(Debug, Default)]
struct MergePlan {
    add: Vec<Partition>,
    alter: Vec<Partition>,
    remove: Vec<Partition>,
}

/// Reconciles tables and databases from a source catalog into a target
/// catalog.
pub struct Reconciler<'a, S: ?Sized, T: ?Sized> {
    source: &'a S,
    target: &'a T,
    cancel: CancellationToken,
}

impl<'a, S, T> Reconciler<'a, S, T>
where
    S: ReadClient + ?Sized,
    T: Client + ?Sized,
{
    /// Creates a reconciler reading from `source` and writing to `target`.
    pub fn new(source: &'a S, target: &'a T) -> Self {
        Self {
            source,
            target,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `cancel` to abort in-flight reconciliation.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns the cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns the source catalog.
    #[must_use]
    pub fn source(&self) -> &'a S {
        self.source
    }

    /// Returns the target catalog.
    #[must_use]
    pub fn target(&self) -> &'a T {
        self.target
    }

    /// Reconciles `from_db.from_table` into the table named by `options`.
    ///
    /// With `partition` set only that partition is copied. Otherwise the
    /// table is copied if the target lacks it and merged if it has it.
    pub async fn copy_or_merge(
        &self,
        from_db: &str,
        from_table: &str,
        partition: Option<&[String]>,
        options: &TransformOptions,
        transformer: &dyn LocationTransformer,
    ) -> Result<()> {
        let (to_db, to_table) = (&options.target_db, &options.target_table);
        debug!(
            from_db,
            from_table,
            to_db = %to_db,
            to_table = %to_table,
            set_symlink = options.set_symlink,
            serde = ?options.serde,
            partition_len = partition.map_or(0, <[String]>::len),
            "Reconciling table"
        );

        if let Some(values) = partition.filter(|values| !values.is_empty()) {
            debug!("CopyPartition");
            return self
                .copy_partition(from_db, from_table, values, options, transformer)
                .await;
        }

        let source_name = qualified(from_db, from_table);
        let target_name = qualified(to_db, to_table);
        let has_table = guarded(
            &self.cancel,
            "has_table",
            &target_name,
            self.target.has_table(to_db, to_table),
        )
        .await?;

        let table = guarded(
            &self.cancel,
            "get_table",
            &source_name,
            self.source.get_table(from_db, from_table),
        )
        .await?;
        let partitions = guarded(
            &self.cancel,
            "get_partitions",
            &source_name,
            self.source.get_partitions(from_db, from_table),
        )
        .await?;

        if has_table {
            debug!("Merge");
            self.merge(table, PartitionCollection::new(partitions), options, transformer)
                .await
        } else {
            debug!("Copy");
            self.copy(table, partitions, options, transformer).await
        }
    }

    /// Reconciles an already fetched source table into the table named by
    /// `options`, reading only its partitions from the source.
    pub async fn copy_or_merge_from_values(
        &self,
        from_db: &str,
        table: Table,
        options: &TransformOptions,
        transformer: &dyn LocationTransformer,
    ) -> Result<()> {
        let (to_db, to_table) = (&options.target_db, &options.target_table);
        let has_table = guarded(
            &self.cancel,
            "has_table",
            &qualified(to_db, to_table),
            self.target.has_table(to_db, to_table),
        )
        .await?;
        let partitions = guarded(
            &self.cancel,
            "get_partitions",
            &qualified(from_db, &table.table_name),
            self.source.get_partitions(from_db, &table.table_name),
        )
        .await?;

        if has_table {
            self.merge(table, PartitionCollection::new(partitions), options, transformer)
                .await
        } else {
            self.copy(table, partitions, options, transformer).await
        }
    }

    /// Creates the target table and adds every partition in one batch.
    pub async fn copy(
        &self,
        mut table: Table,
        mut partitions: Vec<Partition>,
        options: &TransformOptions,
        transformer: &dyn LocationTransformer,
    ) -> Result<()> {
        let target_name = qualified(&options.target_db, &options.target_table);
        let is_spark_sql = table.is_spark_sql_table();
        table
            .update(options, transformer, is_spark_sql)
            .map_err(|e| SyncError::transform(&target_name, e))?;
        for partition in &mut partitions {
            partition
                .update(options, transformer, is_spark_sql)
                .map_err(|e| {
                    SyncError::transform(partition_name(&target_name, &partition.values), e)
                })?;
        }

        guarded(
            &self.cancel,
            "create_table",
            &target_name,
            self.target.create_table(&table),
        )
        .await?;
        guarded(
            &self.cancel,
            "add_partitions",
            &target_name,
            self.target
                .add_partitions(&options.target_db, &options.target_table, &partitions),
        )
        .await?;

        info!(
            table = %target_name,
            partitions = partitions.len(),
            "Copied table"
        );
        Ok(())
    }

    /// Merges the source table and its partitions into the existing target
    /// table.
    ///
    /// Target calls are issued as: alter table, add partitions, alter
    /// partitions, then one drop per removed partition.
    pub async fn merge(
        &self,
        mut table: Table,
        partitions: PartitionCollection,
        options: &TransformOptions,
        transformer: &dyn LocationTransformer,
    ) -> Result<()> {
        let (to_db, to_table) = (&options.target_db, &options.target_table);
        let target_name = qualified(to_db, to_table);
        let is_spark_sql = table.is_spark_sql_table();
        table
            .update(options, transformer, is_spark_sql)
            .map_err(|e| SyncError::transform(&target_name, e))?;

        // Diff what the target should hold, not the raw source.
        let mut transformed = partitions.into_inner();
        for partition in &mut transformed {
            partition
                .update(options, transformer, is_spark_sql)
                .map_err(|e| {
                    SyncError::transform(partition_name(&target_name, &partition.values), e)
                })?;
        }
        let source_partitions = PartitionCollection::new(transformed);

        let target_partitions = guarded(
            &self.cancel,
            "get_partitions",
            &target_name,
            self.target.get_partitions(to_db, to_table),
        )
        .await?;
        let target_partitions = PartitionCollection::new(target_partitions);

        let mut plan = MergePlan::default();
        diff_with(&source_partitions, &target_partitions, |difference| {
            let partition = match difference.value {
                Entity::Partition(partition) => partition,
                other => {
                    return Err(SyncError::TypeMismatch {
                        target: target_name.clone(),
                        expected: "partition",
                        found: other.kind_name(),
                    })
                }
            };
            match difference.kind {
                DifferenceKind::Added => plan.add.push(partition),
                DifferenceKind::Altered => plan.alter.push(partition),
                DifferenceKind::Removed => plan.remove.push(partition),
            }
            Ok(())
        })?;

        debug!(
            table = %target_name,
            add = plan.add.len(),
            alter = plan.alter.len(),
            remove = plan.remove.len(),
            "Merge plan"
        );

        guarded(
            &self.cancel,
            "alter_table",
            &target_name,
            self.target.alter_table(to_db, to_table, &table),
        )
        .await?;
        guarded(
            &self.cancel,
            "add_partitions",
            &target_name,
            self.target.add_partitions(to_db, to_table, &plan.add),
        )
        .await?;
        guarded(
            &self.cancel,
            "alter_partitions",
            &target_name,
            self.target.alter_partitions(to_db, to_table, &plan.alter),
        )
        .await?;
        // The catalog API drops a single partition per call.
        for partition in &plan.remove {
            guarded(
                &self.cancel,
                "drop_partition",
                &partition_name(&target_name, &partition.values),
                self.target.drop_partition(to_db, to_table, &partition.values),
            )
            .await?;
        }

        info!(
            table = %target_name,
            added = plan.add.len(),
            altered = plan.alter.len(),
            removed = plan.remove.len(),
            "Merged table"
        );
        Ok(())
    }

    /// Copies a single partition, adding it to the target or replacing the
    /// target's current version.
    pub async fn copy_partition(
        &self,
        from_db: &str,
        from_table: &str,
        values: &[String],
        options: &TransformOptions,
        transformer: &dyn LocationTransformer,
    ) -> Result<()> {
        let (to_db, to_table) = (&options.target_db, &options.target_table);
        let source_name = partition_name(&qualified(from_db, from_table), values);
        let target_name = partition_name(&qualified(to_db, to_table), values);

        let table = guarded(
            &self.cancel,
            "get_table",
            &source_name,
            self.source.get_table(from_db, from_table),
        )
        .await?;
        let mut partition = guarded(
            &self.cancel,
            "get_partition",
            &source_name,
            self.source.get_partition(from_db, from_table, values),
        )
        .await?
        .ok_or_else(|| {
            SyncError::client(
                "get_partition",
                &source_name,
                ClientError::NotFound(format!("partition {source_name}")),
            )
        })?;
        let existing = guarded(
            &self.cancel,
            "get_partition",
            &target_name,
            self.target.get_partition(to_db, to_table, values),
        )
        .await?;

        partition
            .update(options, transformer, table.is_spark_sql_table())
            .map_err(|e| SyncError::transform(&target_name, e))?;

        if existing.is_some() {
            guarded(
                &self.cancel,
                "alter_partition",
                &target_name,
                self.target.alter_partition(to_db, to_table, &partition),
            )
            .await
        } else {
            guarded(
                &self.cancel,
                "add_partition",
                &target_name,
                self.target.add_partition(to_db, to_table, &partition),
            )
            .await
        }
    }

    /// Creates `to_db` in the target from the source database `from_db`.
    ///
    /// An existing target database is reported as
    /// [`SyncError::SchemaExists`]; deciding whether that is fatal is left to
    /// the caller.
    pub async fn copy_db(
        &self,
        from_db: &str,
        to_db: &str,
        transformer: &dyn LocationTransformer,
    ) -> Result<()> {
        let mut database: Database = guarded(
            &self.cancel,
            "get_database",
            from_db,
            self.source.get_database(from_db),
        )
        .await?;
        database.name = to_db.to_string();
        database.location_uri = transformer
            .transform(&database.location_uri)
            .map_err(|e| SyncError::transform(to_db, e))?;
        if database.location_uri.is_empty() {
            database.location_uri = self.target.db_location(to_db);
        }

        let created = guarded(
            &self.cancel,
            "create_database",
            to_db,
            self.target.create_database(&database),
        )
        .await;
        match created {
            Ok(()) => {
                info!(database = to_db, location = %database.location_uri, "Created database");
                Ok(())
            }
            Err(SyncError::Client {
                source: ClientError::AlreadyExists(_),
                ..
            }) => Err(SyncError::SchemaExists(to_db.to_string())),
            Err(e) => Err(e),
        }
    }

    /// Reconciles a table into a symlink-exported target whose locations
    /// live under `location_prefix`.
    pub async fn copy_or_merge_to_symlink(
        &self,
        from_db: &str,
        from_table: &str,
        to_db: &str,
        to_table: &str,
        location_prefix: &str,
        fix_spark_placeholder: bool,
    ) -> Result<()> {
        let options = TransformOptions::new(to_db, to_table)
            .symlink(true)
            .fix_spark_placeholder(fix_spark_placeholder);
        let transformer = SymlinkLocation::new(location_prefix);
        self.copy_or_merge(from_db, from_table, None, &options, &transformer)
            .await
    }
}

/// Compares the schema and partitions of a source table with a target
/// table without modifying either catalog.
///
/// Source partitions are compared as if they already belonged to
/// `to_db.to_table`; locations and every other field are compared as-is.
pub async fn get_diff<S, T>(
    source: &S,
    target: &T,
    from_db: &str,
    from_table: &str,
    to_db: &str,
    to_table: &str,
    cancel: &CancellationToken,
) -> Result<MetaDiff>
where
    S: ReadClient + ?Sized,
    T: ReadClient + ?Sized,
{
    let source_name = qualified(from_db, from_table);
    let target_name = qualified(to_db, to_table);

    let source_table = guarded(
        cancel,
        "get_table",
        &source_name,
        source.get_table(from_db, from_table),
    )
    .await?;
    let target_table = guarded(
        cancel,
        "get_table",
        &target_name,
        target.get_table(to_db, to_table),
    )
    .await?;
    let columns_diff = diff(
        &ColumnCollection::new(source_table.sd.cols),
        &ColumnCollection::new(target_table.sd.cols),
    );

    let mut source_partitions = guarded(
        cancel,
        "get_partitions",
        &source_name,
        source.get_partitions(from_db, from_table),
    )
    .await?;
    for partition in &mut source_partitions {
        to_db.clone_into(&mut partition.db_name);
        to_table.clone_into(&mut partition.table_name);
    }
    let target_partitions = guarded(
        cancel,
        "get_partitions",
        &target_name,
        target.get_partitions(to_db, to_table),
    )
    .await?;
    let partition_diff = diff(
        &PartitionCollection::new(source_partitions),
        &PartitionCollection::new(target_partitions),
    );

    Ok(MetaDiff {
        partition_diff,
        columns_diff,
    })
}
