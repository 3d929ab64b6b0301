//! Catalog entity types.
//!
//! These mirror the Hive metastore object model closely enough to round-trip
//! through any metastore-compatible client: databases own tables, tables own
//! partitions, and both tables and partitions describe their on-disk layout
//! through a [`StorageDescriptor`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Table parameter set by Spark SQL on the tables it creates.
pub const SPARK_SQL_PROVIDER_PARAM: &str = "spark.sql.sources.provider";

/// Serde parameter where Spark SQL keeps its own copy of the table location.
pub const SPARK_SQL_PATH_PARAM: &str = "path";

/// Suffix Spark SQL appends to the metastore location of data source tables.
pub const SPARK_PLACEHOLDER_SUFFIX: &str = "-__PLACEHOLDER__";

/// Input format used when a table is exported as symlink manifests.
pub const SYMLINK_INPUT_FORMAT: &str = "org.apache.hadoop.hive.ql.io.SymlinkTextInputFormat";

/// A database (schema) in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Database {
    /// Database name.
    pub name: String,
    /// Optional free-form description.
    #[serde(default)]
    pub description: String,
    /// Root storage location of the database.
    #[serde(default)]
    pub location_uri: String,
    /// Extra database properties.
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl Database {
    /// Creates a database with the given name and location.
    #[must_use]
    pub fn new(name: impl Into<String>, location_uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location_uri: location_uri.into(),
            ..Self::default()
        }
    }
}

/// A single column of a table schema.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Column {
    /// Column name; identifies the column when diffing.
    pub name: String,
    /// Hive type string (`string`, `bigint`, `map<string,int>`...).
    #[serde(rename = "type")]
    pub type_name: String,
    /// Optional column comment.
    #[serde(default)]
    pub comment: String,
}

impl Column {
    /// Creates a column.
    #[must_use]
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            comment: String::new(),
        }
    }
}

/// Serialization library descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SerDeInfo {
    /// Serde name.
    #[serde(default)]
    pub name: String,
    /// Fully qualified serialization library class.
    #[serde(default)]
    pub serialization_lib: String,
    /// Serde properties.
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

/// Physical layout of a table or partition.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StorageDescriptor {
    /// Ordered column list.
    #[serde(default)]
    pub cols: Vec<Column>,
    /// Storage location.
    #[serde(default)]
    pub location: String,
    /// Input format class.
    #[serde(default)]
    pub input_format: String,
    /// Output format class.
    #[serde(default)]
    pub output_format: String,
    /// Whether the data is compressed.
    #[serde(default)]
    pub compressed: bool,
    /// Serialization descriptor.
    #[serde(default)]
    pub serde_info: SerDeInfo,
}

impl StorageDescriptor {
    /// Creates a descriptor pointing at `location`.
    #[must_use]
    pub fn at(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            ..Self::default()
        }
    }
}

/// A table definition.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Table {
    /// Owning database.
    pub db_name: String,
    /// Table name.
    pub table_name: String,
    /// Table owner.
    #[serde(default)]
    pub owner: String,
    /// Table type (`EXTERNAL_TABLE`, `MANAGED_TABLE`...).
    #[serde(default)]
    pub table_type: String,
    /// Storage descriptor.
    #[serde(default)]
    pub sd: StorageDescriptor,
    /// Partition key columns.
    #[serde(default)]
    pub partition_keys: Vec<Column>,
    /// Table properties.
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl Table {
    /// Creates a table in `db_name` stored at `location`.
    #[must_use]
    pub fn new(
        db_name: impl Into<String>,
        table_name: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            db_name: db_name.into(),
            table_name: table_name.into(),
            sd: StorageDescriptor::at(location),
            ..Self::default()
        }
    }

    /// Appends a column to the storage descriptor.
    #[must_use]
    pub fn column(mut self, column: Column) -> Self {
        self.sd.cols.push(column);
        self
    }

    /// Adds a partition key column.
    #[must_use]
    pub fn partition_key(mut self, column: Column) -> Self {
        self.partition_keys.push(column);
        self
    }

    /// Sets a table property.
    #[must_use]
    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Returns true if the table was created by Spark SQL.
    #[must_use]
    pub fn is_spark_sql_table(&self) -> bool {
        self.parameters.contains_key(SPARK_SQL_PROVIDER_PARAM)
    }
}

/// A partition of a table, identified by its value tuple.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Partition {
    /// Partition key values, in partition key order.
    pub values: Vec<String>,
    /// Owning database.
    #[serde(default)]
    pub db_name: String,
    /// Owning table.
    #[serde(default)]
    pub table_name: String,
    /// Storage descriptor.
    #[serde(default)]
    pub sd: StorageDescriptor,
    /// Partition properties.
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl Partition {
    /// Creates a partition with the given values stored at `location`.
    #[must_use]
    pub fn new<I, S>(values: I, location: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
            sd: StorageDescriptor::at(location),
            ..Self::default()
        }
    }

    /// Sets the owning table.
    #[must_use]
    pub fn of(mut self, db_name: impl Into<String>, table_name: impl Into<String>) -> Self {
        self.db_name = db_name.into();
        self.table_name = table_name.into();
        self
    }
}
