//! Copy and merge Hive-style metastore tables into versioned branches.
//!
//! `metastore-sync` reconciles a target catalog with a source catalog:
//! - Tables missing from the target are copied with all their partitions
//! - Existing tables are merged through a partition diff, so reruns converge
//! - Single partitions and whole databases can be copied on their own
//! - A bulk driver walks every matching database and table
//!
//! # Architecture
//!
//! - **Client** - Async read/write traits over a catalog service
//! - **Reconciler** - Per-table copy, merge and partition copy
//! - **Driver** - Bulk runs with an optional continue-on-error policy
//! - **Memory** - An in-memory catalog, also usable as a JSON file catalog
//!
//! # Example
//!
//! ```rust,no_run
//! use metastore_sync::prelude::*;
//!
//! # async fn run() -> metastore_sync::error::Result<()> {
//! let source = MemoryCatalog::new().table(
//!     Table::new("sales", "orders", "s3://repo/main/sales/orders"),
//!     vec![Partition::new(["2024-01"], "s3://repo/main/sales/orders/ds=2024-01")],
//! );
//! let target = MemoryCatalog::new();
//!
//! Reconciler::new(&source, &target)
//!     .copy_or_merge(
//!         "sales",
//!         "orders",
//!         None,
//!         &TransformOptions::new("sales", "orders"),
//!         &BranchLocation::new("dev"),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Copy or merge one table onto a branch
//! metastore-sync --source prod.json --target dev.json copy \
//!     --from-db sales --from-table orders --to-branch dev
//!
//! # Copy every table of matching databases, skipping failures
//! metastore-sync --source prod.json --target dev.json copy-all \
//!     --schema-filter 'sales*' --to-branch dev --continue-on-error
//!
//! # Show what a merge would change
//! metastore-sync --source prod.json --target dev.json diff \
//!     --from-db sales --from-table orders
//! ```

pub mod client;
pub mod driver;
pub mod error;
pub mod memory;
pub mod reconciler;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::client::{Client, ReadClient, WriteClient};
    pub use crate::driver::{BulkDriver, BulkOptions, BulkReport, TableFailure};
    pub use crate::error::{ClientError, ErrorKind, Result, SyncError};
    pub use crate::memory::{CatalogCall, CatalogOp, CatalogSnapshot, MemoryCatalog};
    pub use crate::reconciler::{get_diff, Reconciler};
    pub use metastore_core::{
        BranchLocation, Column, Database, Difference, DifferenceKind, ImportLocation,
        LocationTransformer, MetaDiff, Partition, SymlinkLocation, Table, TransformOptions,
    };
}
