//! # metastore-core
//!
//! Building blocks for replicating Hive-style catalog metadata into versioned
//! branches.
//!
//! This crate is synchronous and performs no I/O. It provides:
//! - The catalog entity model (databases, tables, partitions, columns)
//! - Key-sorted [`OrderedCollection`]s of partitions and columns
//! - A single-pass merge-join [`diff`](diff::diff) classifying entries as
//!   added, removed or altered
//! - The entity transformer rewriting locations, serde and dialect fields
//!   for a target catalog
//! - Branch, import and symlink [`LocationTransformer`]s
//!
//! ## Diffing partitions
//!
//! ```rust
//! use metastore_core::{diff, DifferenceKind, Partition, PartitionCollection};
//!
//! let source = PartitionCollection::new(vec![
//!     Partition::new(["2024-02"], "s3://repo/dev/orders/ds=2024-02"),
//!     Partition::new(["2024-01"], "s3://repo/dev/orders/ds=2024-01"),
//! ]);
//! let target = PartitionCollection::new(vec![
//!     Partition::new(["2024-01"], "s3://repo/dev/orders/ds=2024-01"),
//! ]);
//!
//! let differences = diff(&source, &target);
//! assert_eq!(differences.len(), 1);
//! assert_eq!(differences[0].kind, DifferenceKind::Added);
//! assert_eq!(differences[0].key, "2024-02");
//! ```

pub mod collection;
pub mod diff;
pub mod error;
pub mod location;
pub mod model;
pub mod transform;

pub use collection::{
    CatalogEntity, ColumnCollection, Entity, KeyOrder, OrderedCollection, PartitionCollection,
};
pub use diff::{diff, diff_with, Difference, DifferenceKind, MetaDiff};
pub use error::TransformError;
pub use location::{BranchLocation, ImportLocation, SymlinkLocation};
pub use model::{Column, Database, Partition, SerDeInfo, StorageDescriptor, Table};
pub use transform::{IdentityLocation, LocationTransformer, TransformOptions, Transformable};
