//! Merge-join diff over two key-sorted collections.
//!
//! Walks a source and a target [`OrderedCollection`] with one cursor each
//! and classifies every key exactly once, in ascending key order:
//!
//! - key only in source: [`DifferenceKind::Added`]
//! - key only in target: [`DifferenceKind::Removed`]
//! - key in both, values differ: [`DifferenceKind::Altered`] carrying the
//!   source value
//!
//! Equal entries produce nothing. Both inputs must be sorted by the same key,
//! which `OrderedCollection` guarantees.

use std::convert::Infallible;

use serde::{Deserialize, Serialize};

use crate::collection::{CatalogEntity, Entity, KeyOrder, OrderedCollection};

/// Classification of a single difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifferenceKind {
    /// Present in the source only.
    Added,
    /// Present in the target only.
    Removed,
    /// Present in both with different values.
    Altered,
}

impl std::fmt::Display for DifferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Removed => write!(f, "removed"),
            Self::Altered => write!(f, "altered"),
        }
    }
}

/// One classified difference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Difference {
    /// What changed.
    pub kind: DifferenceKind,
    /// The source entity for `Added`/`Altered`, the target entity for
    /// `Removed`.
    pub value: Entity,
    /// Rendered identity key of `value`.
    pub key: String,
}

impl Difference {
    fn new<T: CatalogEntity>(kind: DifferenceKind, entity: &T) -> Self {
        Self {
            kind,
            key: entity.key_string(),
            value: entity.clone().into_entity(),
        }
    }
}

/// Comparison of a source table against a target table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaDiff {
    /// Partition differences in partition value order.
    pub partition_diff: Vec<Difference>,
    /// Column differences in column name order.
    pub columns_diff: Vec<Difference>,
}

impl MetaDiff {
    /// Returns true if neither partitions nor columns differ.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.partition_diff.is_empty() && self.columns_diff.is_empty()
    }
}

/// Diffs `source` against `target`, invoking `callback` once per difference
/// in key order.
///
/// The first callback error stops the walk and is returned as-is.
pub fn diff_with<T, E, F>(
    source: &OrderedCollection<T>,
    target: &OrderedCollection<T>,
    mut callback: F,
) -> Result<(), E>
where
    T: CatalogEntity,
    F: FnMut(Difference) -> Result<(), E>,
{
    let (left, right) = (source.as_slice(), target.as_slice());
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        match source.compare_at(i, target, j) {
            KeyOrder::Equal => {
                if left[i] != right[j] {
                    callback(Difference::new(DifferenceKind::Altered, &left[i]))?;
                }
                i += 1;
                j += 1;
            }
            KeyOrder::SourceOnly => {
                callback(Difference::new(DifferenceKind::Added, &left[i]))?;
                i += 1;
            }
            KeyOrder::TargetOnly => {
                callback(Difference::new(DifferenceKind::Removed, &right[j]))?;
                j += 1;
            }
        }
    }
    for entity in &left[i..] {
        callback(Difference::new(DifferenceKind::Added, entity))?;
    }
    for entity in &right[j..] {
        callback(Difference::new(DifferenceKind::Removed, entity))?;
    }
    Ok(())
}

/// Diffs `source` against `target`, collecting every difference.
#[must_use]
pub fn diff<T: CatalogEntity>(
    source: &OrderedCollection<T>,
    target: &OrderedCollection<T>,
) -> Vec<Difference> {
    let mut differences = Vec::new();
    let collected: Result<(), Infallible> = diff_with(source, target, |difference| {
        differences.push(difference);
        Ok(())
    });
    match collected {
        Ok(()) => differences,
        Err(never) => match never {},
    }
}
