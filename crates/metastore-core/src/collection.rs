//! Key-sorted collections of catalog entities.
//!
//! The diff engine walks two collections in lockstep, so both sides must be
//! sorted by the same key. [`OrderedCollection`] enforces that on
//! construction; callers are responsible for key uniqueness.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::model::{Column, Partition};

/// A catalog entity carried by a [`Difference`](crate::diff::Difference).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum Entity {
    /// A table partition.
    Partition(Partition),
    /// A table column.
    Column(Column),
}

impl Entity {
    /// Returns the entity kind name.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Partition(_) => "partition",
            Self::Column(_) => "column",
        }
    }
}

/// An entity that can be placed in an [`OrderedCollection`].
pub trait CatalogEntity: Clone + PartialEq {
    /// Identity key; ordering of the collection.
    type Key: Ord + ?Sized;

    /// Returns the identity key.
    fn key(&self) -> &Self::Key;

    /// Returns the identity key rendered for reporting.
    fn key_string(&self) -> String;

    /// Wraps the entity for a type-erased difference.
    fn into_entity(self) -> Entity;
}

impl CatalogEntity for Column {
    type Key = str;

    fn key(&self) -> &str {
        &self.name
    }

    fn key_string(&self) -> String {
        self.name.clone()
    }

    fn into_entity(self) -> Entity {
        Entity::Column(self)
    }
}

impl CatalogEntity for Partition {
    type Key = [String];

    /// Partition tuples compare element-wise.
    fn key(&self) -> &[String] {
        &self.values
    }

    fn key_string(&self) -> String {
        self.values.join("/")
    }

    fn into_entity(self) -> Entity {
        Entity::Partition(self)
    }
}

/// Relative position of two collection cursors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrder {
    /// Both cursors point at the same key.
    Equal,
    /// The source key sorts first: it is absent from the target.
    SourceOnly,
    /// The target key sorts first: it is absent from the source.
    TargetOnly,
}

impl From<Ordering> for KeyOrder {
    fn from(ordering: Ordering) -> Self {
        match ordering {
            Ordering::Equal => Self::Equal,
            Ordering::Less => Self::SourceOnly,
            Ordering::Greater => Self::TargetOnly,
        }
    }
}

/// Read-only, key-sorted view over entities of one kind.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedCollection<T: CatalogEntity> {
    items: Vec<T>,
}

/// Partitions sorted by their value tuple.
pub type PartitionCollection = OrderedCollection<Partition>;

/// Columns sorted by name.
pub type ColumnCollection = OrderedCollection<Column>;

impl<T: CatalogEntity> OrderedCollection<T> {
    /// Builds a collection, sorting `items` by key.
    #[must_use]
    pub fn new(mut items: Vec<T>) -> Self {
        items.sort_by(|a, b| a.key().cmp(b.key()));
        Self { items }
    }

    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the collection holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Entity at position `i`.
    #[must_use]
    pub fn get(&self, i: usize) -> Option<&T> {
        self.items.get(i)
    }

    /// Key of the entity at position `i`.
    #[must_use]
    pub fn key_at(&self, i: usize) -> Option<&T::Key> {
        self.items.get(i).map(T::key)
    }

    /// Compares the key at `i` in this collection with the key at `j` in
    /// `target`.
    ///
    /// # Panics
    ///
    /// Panics if either position is out of bounds.
    #[must_use]
    pub fn compare_at(&self, i: usize, target: &Self, j: usize) -> KeyOrder {
        self.items[i].key().cmp(target.items[j].key()).into()
    }

    /// Entities in key order.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Iterates entities in key order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Consumes the collection, returning the sorted entities.
    #[must_use]
    pub fn into_inner(self) -> Vec<T> {
        self.items
    }
}

impl<T: CatalogEntity> Default for OrderedCollection<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: CatalogEntity> From<Vec<T>> for OrderedCollection<T> {
    fn from(items: Vec<T>) -> Self {
        Self::new(items)
    }
}

impl<T: CatalogEntity> FromIterator<T> for OrderedCollection<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a, T: CatalogEntity> IntoIterator for &'a OrderedCollection<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
