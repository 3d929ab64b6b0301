//! In-memory catalog.
//!
//! [`MemoryCatalog`] implements [`Client`](crate::client::Client) over a
//! mutex-guarded map of databases, tables and partitions. It behaves like a
//! Hive metastore for the operations reconciliation needs (duplicate
//! creations fail, missing objects are reported as not found, patterns use
//! Hive wildcard syntax) and records every mutating call it receives.
//!
//! Catalog state can be loaded from and saved to a JSON [`CatalogSnapshot`],
//! which is how the CLI uses it as a file-backed catalog.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metastore_core::{Database, Partition, Table};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{ReadClient, WriteClient};
use crate::error::{ClientError, ClientResult, Result};

/// Default warehouse root used to derive database locations.
pub const DEFAULT_WAREHOUSE: &str = "/user/hive/warehouse";

/// A catalog operation, used to address failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogOp {
    /// `get_table`.
    GetTable,
    /// `has_table`.
    HasTable,
    /// `get_partitions`.
    GetPartitions,
    /// `get_partition`.
    GetPartition,
    /// `get_database`.
    GetDatabase,
    /// `get_databases`.
    GetDatabases,
    /// `get_tables`.
    GetTables,
    /// `create_table`.
    CreateTable,
    /// `alter_table`.
    AlterTable,
    /// `add_partitions`.
    AddPartitions,
    /// `alter_partitions`.
    AlterPartitions,
    /// `alter_partition`.
    AlterPartition,
    /// `add_partition`.
    AddPartition,
    /// `drop_partition`.
    DropPartition,
    /// `create_database`.
    CreateDatabase,
}

/// A mutating call received by a [`MemoryCatalog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogCall {
    /// `create_database`.
    CreateDatabase {
        /// Database name.
        name: String,
    },
    /// `create_table`.
    CreateTable {
        /// Database name.
        db: String,
        /// Table name.
        table: String,
    },
    /// `alter_table`.
    AlterTable {
        /// Database name.
        db: String,
        /// Table name.
        table: String,
    },
    /// `add_partitions`.
    AddPartitions {
        /// Database name.
        db: String,
        /// Table name.
        table: String,
        /// Values of every partition in the batch.
        values: Vec<Vec<String>>,
    },
    /// `alter_partitions`.
    AlterPartitions {
        /// Database name.
        db: String,
        /// Table name.
        table: String,
        /// Values of every partition in the batch.
        values: Vec<Vec<String>>,
    },
    /// `alter_partition`.
    AlterPartition {
        /// Database name.
        db: String,
        /// Table name.
        table: String,
        /// Partition values.
        values: Vec<String>,
    },
    /// `add_partition`.
    AddPartition {
        /// Database name.
        db: String,
        /// Table name.
        table: String,
        /// Partition values.
        values: Vec<String>,
    },
    /// `drop_partition`.
    DropPartition {
        /// Database name.
        db: String,
        /// Table name.
        table: String,
        /// Partition values.
        values: Vec<String>,
    },
}

/// Serialized form of a catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    /// When the snapshot was written.
    #[serde(default)]
    pub exported_at: Option<DateTime<Utc>>,
    /// Databases with their tables.
    #[serde(default)]
    pub databases: Vec<DatabaseSnapshot>,
}

/// A database and its tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    /// Database definition.
    pub database: Database,
    /// Tables of the database.
    #[serde(default)]
    pub tables: Vec<TableSnapshot>,
}

/// A table and its partitions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSnapshot {
    /// Table definition.
    pub table: Table,
    /// Partitions of the table.
    #[serde(default)]
    pub partitions: Vec<Partition>,
}

#[derive(Debug, Default)]
struct TableEntry {
    table: Table,
    partitions: BTreeMap<Vec<String>, Partition>,
}

#[derive(Debug, Default)]
struct DatabaseEntry {
    database: Database,
    tables: BTreeMap<String, TableEntry>,
}

#[derive(Debug, Default)]
struct State {
    databases: BTreeMap<String, DatabaseEntry>,
    calls: Vec<CatalogCall>,
    fail_on: Option<CatalogOp>,
}

/// Thread-safe in-memory catalog.
#[derive(Debug)]
pub struct MemoryCatalog {
    state: Mutex<State>,
    warehouse: String,
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            warehouse: DEFAULT_WAREHOUSE.to_string(),
        }
    }

    /// Sets the warehouse root used by [`WriteClient::db_location`].
    #[must_use]
    pub fn with_warehouse(mut self, warehouse: impl Into<String>) -> Self {
        self.warehouse = warehouse.into().trim_end_matches('/').to_string();
        self
    }

    /// Adds a database, replacing any existing one with the same name.
    #[must_use]
    pub fn database(self, database: Database) -> Self {
        let name = database.name.clone();
        self.lock().databases.entry(name).or_default().database = database;
        self
    }

    /// Adds a table with its partitions, creating its database if needed.
    #[must_use]
    pub fn table(self, table: Table, partitions: Vec<Partition>) -> Self {
        {
            let mut state = self.lock();
            let db = state.databases.entry(table.db_name.clone()).or_default();
            if db.database.name.is_empty() {
                db.database.name.clone_from(&table.db_name);
            }
            let partitions = partitions
                .into_iter()
                .map(|p| {
                    let p = p.of(table.db_name.clone(), table.table_name.clone());
                    (p.values.clone(), p)
                })
                .collect();
            db.tables.insert(
                table.table_name.clone(),
                TableEntry { table, partitions },
            );
        }
        self
    }

    /// Makes every subsequent call of `op` fail with a backend error.
    pub fn fail_on(&self, op: CatalogOp) {
        self.lock().fail_on = Some(op);
    }

    /// Clears failure injection.
    pub fn clear_failure(&self) {
        self.lock().fail_on = None;
    }

    /// Returns the mutating calls received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<CatalogCall> {
        self.lock().calls.clone()
    }

    /// Forgets recorded calls.
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Builds a catalog from a snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: CatalogSnapshot) -> Self {
        let mut catalog = Self::new();
        for db in snapshot.databases {
            catalog = catalog.database(db.database);
            for table in db.tables {
                catalog = catalog.table(table.table, table.partitions);
            }
        }
        catalog
    }

    /// Captures the current catalog state.
    #[must_use]
    pub fn snapshot(&self) -> CatalogSnapshot {
        let state = self.lock();
        let databases = state
            .databases
            .values()
            .map(|db| DatabaseSnapshot {
                database: db.database.clone(),
                tables: db
                    .tables
                    .values()
                    .map(|t| TableSnapshot {
                        table: t.table.clone(),
                        partitions: t.partitions.values().cloned().collect(),
                    })
                    .collect(),
            })
            .collect();
        CatalogSnapshot {
            exported_at: Some(Utc::now()),
            databases,
        }
    }

    /// Loads a catalog from a JSON snapshot file. A missing file yields an
    /// empty catalog.
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Snapshot not found, starting empty");
                return Ok(Self::new());
            }
            Err(e) => return Err(e.into()),
        };
        let snapshot: CatalogSnapshot = serde_json::from_str(&contents)?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Writes the catalog to a JSON snapshot file.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(&self.snapshot())?;
        tokio::fs::write(path, contents).await?;
        debug!(path = %path.display(), "Snapshot written");
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Locks the state, failing if `op` is the injected failure.
    fn enter(&self, op: CatalogOp) -> ClientResult<MutexGuard<'_, State>> {
        let state = self.lock();
        if state.fail_on == Some(op) {
            return Err(ClientError::Backend(format!("injected failure on {op:?}")));
        }
        Ok(state)
    }

    /// Like [`Self::enter`], recording `call` first.
    fn enter_mut(&self, op: CatalogOp, call: CatalogCall) -> ClientResult<MutexGuard<'_, State>> {
        let mut state = self.lock();
        state.calls.push(call);
        if state.fail_on == Some(op) {
            return Err(ClientError::Backend(format!("injected failure on {op:?}")));
        }
        Ok(state)
    }
}

impl State {
    fn table(&self, db: &str, table: &str) -> ClientResult<&TableEntry> {
        self.databases
            .get(db)
            .and_then(|d| d.tables.get(table))
            .ok_or_else(|| ClientError::NotFound(format!("table {db}.{table}")))
    }

    fn table_mut(&mut self, db: &str, table: &str) -> ClientResult<&mut TableEntry> {
        self.databases
            .get_mut(db)
            .and_then(|d| d.tables.get_mut(table))
            .ok_or_else(|| ClientError::NotFound(format!("table {db}.{table}")))
    }
}

fn partition_values(partitions: &[Partition]) -> Vec<Vec<String>> {
    partitions.iter().map(|p| p.values.clone()).collect()
}

fn partition_name(db: &str, table: &str, values: &[String]) -> String {
    format!("partition {db}.{table}[{}]", values.join("/"))
}

/// Compiles a Hive-style pattern: `*` matches anything, `|` separates
/// alternatives, matching is case-insensitive. An empty pattern matches all.
pub fn compile_pattern(pattern: &str) -> ClientResult<Regex> {
    if pattern.is_empty() {
        return Regex::new(".*").map_err(|e| ClientError::Backend(e.to_string()));
    }
    let alternatives: Vec<String> = pattern
        .split('|')
        .map(|alt| {
            alt.trim()
                .split('*')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(".*")
        })
        .collect();
    let expr = format!("(?i)^(?:{})$", alternatives.join("|"));
    Regex::new(&expr).map_err(|e| ClientError::Backend(format!("invalid pattern '{pattern}': {e}")))
}

#[async_trait]
impl ReadClient for MemoryCatalog {
    async fn get_table(&self, db: &str, table: &str) -> ClientResult<Table> {
        let state = self.enter(CatalogOp::GetTable)?;
        Ok(state.table(db, table)?.table.clone())
    }

    async fn has_table(&self, db: &str, table: &str) -> ClientResult<bool> {
        let state = self.enter(CatalogOp::HasTable)?;
        Ok(state.table(db, table).is_ok())
    }

    async fn get_partitions(&self, db: &str, table: &str) -> ClientResult<Vec<Partition>> {
        let state = self.enter(CatalogOp::GetPartitions)?;
        Ok(state.table(db, table)?.partitions.values().cloned().collect())
    }

    async fn get_partition(
        &self,
        db: &str,
        table: &str,
        values: &[String],
    ) -> ClientResult<Option<Partition>> {
        let state = self.enter(CatalogOp::GetPartition)?;
        Ok(state.table(db, table)?.partitions.get(values).cloned())
    }

    async fn get_database(&self, name: &str) -> ClientResult<Database> {
        let state = self.enter(CatalogOp::GetDatabase)?;
        state
            .databases
            .get(name)
            .map(|d| d.database.clone())
            .ok_or_else(|| ClientError::NotFound(format!("database {name}")))
    }

    async fn get_databases(&self, pattern: &str) -> ClientResult<Vec<Database>> {
        let matcher = compile_pattern(pattern)?;
        let state = self.enter(CatalogOp::GetDatabases)?;
        Ok(state
            .databases
            .values()
            .filter(|d| matcher.is_match(&d.database.name))
            .map(|d| d.database.clone())
            .collect())
    }

    async fn get_tables(&self, db: &str, pattern: &str) -> ClientResult<Vec<Table>> {
        let matcher = compile_pattern(pattern)?;
        let state = self.enter(CatalogOp::GetTables)?;
        let entry = state
            .databases
            .get(db)
            .ok_or_else(|| ClientError::NotFound(format!("database {db}")))?;
        Ok(entry
            .tables
            .values()
            .filter(|t| matcher.is_match(&t.table.table_name))
            .map(|t| t.table.clone())
            .collect())
    }
}

#[async_trait]
impl WriteClient for MemoryCatalog {
    async fn create_table(&self, table: &Table) -> ClientResult<()> {
        let mut state = self.enter_mut(
            CatalogOp::CreateTable,
            CatalogCall::CreateTable {
                db: table.db_name.clone(),
                table: table.table_name.clone(),
            },
        )?;
        let db = state
            .databases
            .get_mut(&table.db_name)
            .ok_or_else(|| ClientError::NotFound(format!("database {}", table.db_name)))?;
        if db.tables.contains_key(&table.table_name) {
            return Err(ClientError::AlreadyExists(format!(
                "table {}.{}",
                table.db_name, table.table_name
            )));
        }
        db.tables.insert(
            table.table_name.clone(),
            TableEntry {
                table: table.clone(),
                partitions: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn alter_table(&self, db: &str, table: &str, new_table: &Table) -> ClientResult<()> {
        let mut state = self.enter_mut(
            CatalogOp::AlterTable,
            CatalogCall::AlterTable {
                db: db.to_string(),
                table: table.to_string(),
            },
        )?;
        state.table_mut(db, table)?.table = new_table.clone();
        Ok(())
    }

    async fn add_partitions(
        &self,
        db: &str,
        table: &str,
        partitions: &[Partition],
    ) -> ClientResult<()> {
        let mut state = self.enter_mut(
            CatalogOp::AddPartitions,
            CatalogCall::AddPartitions {
                db: db.to_string(),
                table: table.to_string(),
                values: partition_values(partitions),
            },
        )?;
        let entry = state.table_mut(db, table)?;
        if let Some(existing) = partitions
            .iter()
            .find(|p| entry.partitions.contains_key(&p.values))
        {
            return Err(ClientError::AlreadyExists(partition_name(
                db,
                table,
                &existing.values,
            )));
        }
        for partition in partitions {
            entry
                .partitions
                .insert(partition.values.clone(), partition.clone().of(db, table));
        }
        Ok(())
    }

    async fn alter_partitions(
        &self,
        db: &str,
        table: &str,
        partitions: &[Partition],
    ) -> ClientResult<()> {
        let mut state = self.enter_mut(
            CatalogOp::AlterPartitions,
            CatalogCall::AlterPartitions {
                db: db.to_string(),
                table: table.to_string(),
                values: partition_values(partitions),
            },
        )?;
        let entry = state.table_mut(db, table)?;
        if let Some(missing) = partitions
            .iter()
            .find(|p| !entry.partitions.contains_key(&p.values))
        {
            return Err(ClientError::NotFound(partition_name(
                db,
                table,
                &missing.values,
            )));
        }
        for partition in partitions {
            entry
                .partitions
                .insert(partition.values.clone(), partition.clone().of(db, table));
        }
        Ok(())
    }

    async fn alter_partition(
        &self,
        db: &str,
        table: &str,
        partition: &Partition,
    ) -> ClientResult<()> {
        let mut state = self.enter_mut(
            CatalogOp::AlterPartition,
            CatalogCall::AlterPartition {
                db: db.to_string(),
                table: table.to_string(),
                values: partition.values.clone(),
            },
        )?;
        let entry = state.table_mut(db, table)?;
        match entry.partitions.get_mut(&partition.values) {
            Some(existing) => {
                *existing = partition.clone().of(db, table);
                Ok(())
            }
            None => Err(ClientError::NotFound(partition_name(
                db,
                table,
                &partition.values,
            ))),
        }
    }

    async fn add_partition(
        &self,
        db: &str,
        table: &str,
        partition: &Partition,
    ) -> ClientResult<()> {
        let mut state = self.enter_mut(
            CatalogOp::AddPartition,
            CatalogCall::AddPartition {
                db: db.to_string(),
                table: table.to_string(),
                values: partition.values.clone(),
            },
        )?;
        let entry = state.table_mut(db, table)?;
        if entry.partitions.contains_key(&partition.values) {
            return Err(ClientError::AlreadyExists(partition_name(
                db,
                table,
                &partition.values,
            )));
        }
        entry
            .partitions
            .insert(partition.values.clone(), partition.clone().of(db, table));
        Ok(())
    }

    async fn drop_partition(&self, db: &str, table: &str, values: &[String]) -> ClientResult<()> {
        let mut state = self.enter_mut(
            CatalogOp::DropPartition,
            CatalogCall::DropPartition {
                db: db.to_string(),
                table: table.to_string(),
                values: values.to_vec(),
            },
        )?;
        state
            .table_mut(db, table)?
            .partitions
            .remove(values)
            .map(|_| ())
            .ok_or_else(|| ClientError::NotFound(partition_name(db, table, values)))
    }

    async fn create_database(&self, database: &Database) -> ClientResult<()> {
        let mut state = self.enter_mut(
            CatalogOp::CreateDatabase,
            CatalogCall::CreateDatabase {
                name: database.name.clone(),
            },
        )?;
        if state.databases.contains_key(&database.name) {
            return Err(ClientError::AlreadyExists(format!(
                "database {}",
                database.name
            )));
        }
        state.databases.insert(
            database.name.clone(),
            DatabaseEntry {
                database: database.clone(),
                tables: BTreeMap::new(),
            },
        );
        Ok(())
    }

    fn normalize_db_name(&self, name: &str) -> String {
        name.to_lowercase().replace('-', "_")
    }

    fn db_location(&self, db: &str) -> String {
        format!("{}/{db}.db", self.warehouse)
    }
}
