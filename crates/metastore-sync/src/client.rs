//! Catalog client capabilities.
//!
//! Reconciliation talks to catalogs only through these traits. A read-only
//! collaborator implements [`ReadClient`]; anything that can be written to
//! implements [`WriteClient`] as well, which makes it a [`Client`].
//!
//! Every call is a round trip to the backing service; implementations must
//! not assume calls are batched into a transaction.

use async_trait::async_trait;
use metastore_core::{Database, Partition, Table};

use crate::error::ClientResult;

/// Read access to a catalog.
#[async_trait]
pub trait ReadClient: Send + Sync {
    /// Fetches a table definition.
    async fn get_table(&self, db: &str, table: &str) -> ClientResult<Table>;

    /// Returns whether the table exists. A missing database is not an error.
    async fn has_table(&self, db: &str, table: &str) -> ClientResult<bool>;

    /// Lists every partition of a table.
    async fn get_partitions(&self, db: &str, table: &str) -> ClientResult<Vec<Partition>>;

    /// Fetches the partition with the given values, if present.
    async fn get_partition(
        &self,
        db: &str,
        table: &str,
        values: &[String],
    ) -> ClientResult<Option<Partition>>;

    /// Fetches a database.
    async fn get_database(&self, name: &str) -> ClientResult<Database>;

    /// Lists databases matching a Hive-style pattern.
    async fn get_databases(&self, pattern: &str) -> ClientResult<Vec<Database>>;

    /// Lists tables of `db` matching a Hive-style pattern.
    async fn get_tables(&self, db: &str, pattern: &str) -> ClientResult<Vec<Table>>;
}

/// Write access to a catalog.
#[async_trait]
pub trait WriteClient: Send + Sync {
    /// Creates a table from its definition.
    async fn create_table(&self, table: &Table) -> ClientResult<()>;

    /// Replaces the definition of an existing table.
    async fn alter_table(&self, db: &str, table: &str, new_table: &Table) -> ClientResult<()>;

    /// Adds partitions in a single batch.
    async fn add_partitions(
        &self,
        db: &str,
        table: &str,
        partitions: &[Partition],
    ) -> ClientResult<()>;

    /// Replaces existing partitions in a single batch.
    async fn alter_partitions(
        &self,
        db: &str,
        table: &str,
        partitions: &[Partition],
    ) -> ClientResult<()>;

    /// Replaces one existing partition.
    async fn alter_partition(&self, db: &str, table: &str, partition: &Partition)
        -> ClientResult<()>;

    /// Adds one partition.
    async fn add_partition(&self, db: &str, table: &str, partition: &Partition)
        -> ClientResult<()>;

    /// Drops the partition with the given values.
    async fn drop_partition(&self, db: &str, table: &str, values: &[String]) -> ClientResult<()>;

    /// Creates a database; fails with `AlreadyExists` if it is present.
    async fn create_database(&self, database: &Database) -> ClientResult<()>;

    /// Turns an arbitrary name into a valid database name for this catalog.
    fn normalize_db_name(&self, name: &str) -> String;

    /// Default storage location for a database named `db`.
    fn db_location(&self, db: &str) -> String;
}

/// A catalog that can be both read and written.
pub trait Client: ReadClient + WriteClient {}

impl<T: ReadClient + WriteClient + ?Sized> Client for T {}
