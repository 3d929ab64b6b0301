//! Rewriting tables and partitions for their target catalog.
//!
//! A transform pass retargets an entity at a destination database/table,
//! rewrites its storage location through a [`LocationTransformer`], and
//! applies the serde, Spark SQL and symlink corrections configured in
//! [`TransformOptions`]. Identity keys (partition values, column names) are
//! never touched, so a transformed source can be diffed against the target.

use crate::error::Result;
use crate::model::{
    Partition, StorageDescriptor, Table, SPARK_PLACEHOLDER_SUFFIX, SPARK_SQL_PATH_PARAM,
    SYMLINK_INPUT_FORMAT,
};

/// Maps a source storage location to its target location.
pub trait LocationTransformer: Send + Sync {
    /// Returns the rewritten location.
    fn transform(&self, location: &str) -> Result<String>;
}

impl<F> LocationTransformer for F
where
    F: Fn(&str) -> Result<String> + Send + Sync,
{
    fn transform(&self, location: &str) -> Result<String> {
        self(location)
    }
}

/// Leaves every location untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityLocation;

impl LocationTransformer for IdentityLocation {
    fn transform(&self, location: &str) -> Result<String> {
        Ok(location.to_string())
    }
}

/// Configuration of one transform pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformOptions {
    /// Destination database name.
    pub target_db: String,
    /// Destination table name.
    pub target_table: String,
    /// Serde name to force on the target, if any.
    pub serde: Option<String>,
    /// Export as symlink manifests instead of registering the data directly.
    pub set_symlink: bool,
    /// Replace the Spark SQL placeholder location with the real data path.
    pub fix_spark_placeholder: bool,
}

impl TransformOptions {
    /// Creates options targeting `target_db.target_table`.
    #[must_use]
    pub fn new(target_db: impl Into<String>, target_table: impl Into<String>) -> Self {
        Self {
            target_db: target_db.into(),
            target_table: target_table.into(),
            ..Self::default()
        }
    }

    /// Forces the serde name. Empty names are ignored.
    #[must_use]
    pub fn serde(mut self, serde: impl Into<String>) -> Self {
        let serde = serde.into();
        self.serde = if serde.is_empty() { None } else { Some(serde) };
        self
    }

    /// Enables symlink export.
    #[must_use]
    pub fn symlink(mut self, enabled: bool) -> Self {
        self.set_symlink = enabled;
        self
    }

    /// Enables the Spark SQL placeholder fix.
    #[must_use]
    pub fn fix_spark_placeholder(mut self, enabled: bool) -> Self {
        self.fix_spark_placeholder = enabled;
        self
    }
}

/// An entity that can be rewritten for a target catalog.
pub trait Transformable {
    /// Rewrites the entity in place.
    ///
    /// `is_spark_sql` must reflect the owning table, since partitions carry
    /// no dialect marker of their own.
    fn update(
        &mut self,
        options: &TransformOptions,
        transformer: &dyn LocationTransformer,
        is_spark_sql: bool,
    ) -> Result<()>;
}

impl Transformable for Table {
    fn update(
        &mut self,
        options: &TransformOptions,
        transformer: &dyn LocationTransformer,
        is_spark_sql: bool,
    ) -> Result<()> {
        self.db_name.clone_from(&options.target_db);
        self.table_name.clone_from(&options.target_table);
        rewrite_storage(&mut self.sd, options, transformer, is_spark_sql)
    }
}

impl Transformable for Partition {
    fn update(
        &mut self,
        options: &TransformOptions,
        transformer: &dyn LocationTransformer,
        is_spark_sql: bool,
    ) -> Result<()> {
        self.db_name.clone_from(&options.target_db);
        self.table_name.clone_from(&options.target_table);
        rewrite_storage(&mut self.sd, options, transformer, is_spark_sql)
    }
}

fn rewrite_storage(
    sd: &mut StorageDescriptor,
    options: &TransformOptions,
    transformer: &dyn LocationTransformer,
    is_spark_sql: bool,
) -> Result<()> {
    sd.location = transformer.transform(&sd.location)?;

    if let Some(serde) = &options.serde {
        sd.serde_info.name.clone_from(serde);
    }

    if is_spark_sql {
        // Spark SQL reads its own copy of the location from the serde properties.
        if let Some(path) = sd.serde_info.parameters.get_mut(SPARK_SQL_PATH_PARAM) {
            *path = transformer.transform(path)?;
        }
        if options.fix_spark_placeholder && sd.location.ends_with(SPARK_PLACEHOLDER_SUFFIX) {
            sd.location = match sd.serde_info.parameters.get(SPARK_SQL_PATH_PARAM) {
                Some(path) => path.clone(),
                None => sd
                    .location
                    .trim_end_matches(SPARK_PLACEHOLDER_SUFFIX)
                    .to_string(),
            };
        }
    }

    if options.set_symlink {
        sd.input_format = SYMLINK_INPUT_FORMAT.to_string();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransformError;
    use crate::model::SPARK_SQL_PROVIDER_PARAM;

    fn to_dev(location: &str) -> Result<String> {
        Ok(location.replace("/main/", "/dev/"))
    }

    fn spark_table(location: &str, path: &str) -> Table {
        let mut table =
            Table::new("src_db", "events", location).parameter(SPARK_SQL_PROVIDER_PARAM, "parquet");
        table
            .sd
            .serde_info
            .parameters
            .insert(SPARK_SQL_PATH_PARAM.to_string(), path.to_string());
        table
    }

    #[test]
    fn retargets_and_rewrites_location() {
        let mut table = Table::new("src_db", "events", "s3://repo/main/events");
        let options = TransformOptions::new("dst_db", "events_dev");

        table.update(&options, &to_dev, false).unwrap();

        assert_eq!(table.db_name, "dst_db");
        assert_eq!(table.table_name, "events_dev");
        assert_eq!(table.sd.location, "s3://repo/dev/events");
    }

    #[test]
    fn partition_values_are_preserved() {
        let mut partition =
            Partition::new(["2024", "01"], "s3://repo/main/events/y=2024/m=01").of("a", "b");
        let options = TransformOptions::new("dst_db", "events");

        partition.update(&options, &to_dev, false).unwrap();

        assert_eq!(partition.values, vec!["2024", "01"]);
        assert_eq!(partition.table_name, "events");
        assert_eq!(partition.sd.location, "s3://repo/dev/events/y=2024/m=01");
    }

    #[test]
    fn serde_overwrite_only_when_set() {
        let mut table = Table::new("db", "t", "s3://repo/main/t");
        table.sd.serde_info.name = "original".to_string();

        table
            .update(&TransformOptions::new("db", "t").serde(""), &IdentityLocation, false)
            .unwrap();
        assert_eq!(table.sd.serde_info.name, "original");

        table
            .update(&TransformOptions::new("db", "t").serde("t"), &IdentityLocation, false)
            .unwrap();
        assert_eq!(table.sd.serde_info.name, "t");
    }

    #[test]
    fn spark_path_follows_location() {
        let mut table = spark_table("s3://repo/main/events", "s3://repo/main/events");

        table
            .update(&TransformOptions::new("db", "events"), &to_dev, true)
            .unwrap();

        assert_eq!(
            table.sd.serde_info.parameters[SPARK_SQL_PATH_PARAM],
            "s3://repo/dev/events"
        );
    }

    #[test]
    fn spark_path_ignored_for_hive_tables() {
        let mut table = spark_table("s3://repo/main/events", "s3://repo/main/events");

        table
            .update(&TransformOptions::new("db", "events"), &to_dev, false)
            .unwrap();

        assert_eq!(
            table.sd.serde_info.parameters[SPARK_SQL_PATH_PARAM],
            "s3://repo/main/events"
        );
    }

    #[test]
    fn placeholder_replaced_by_spark_path() {
        let mut table = spark_table(
            "s3://repo/main/events-__PLACEHOLDER__",
            "s3://repo/main/events",
        );
        let options = TransformOptions::new("db", "events").fix_spark_placeholder(true);

        table.update(&options, &to_dev, true).unwrap();

        assert_eq!(table.sd.location, "s3://repo/dev/events");
    }

    #[test]
    fn placeholder_kept_without_fix() {
        let mut table = spark_table(
            "s3://repo/main/events-__PLACEHOLDER__",
            "s3://repo/main/events",
        );

        table
            .update(&TransformOptions::new("db", "events"), &to_dev, true)
            .unwrap();

        assert_eq!(table.sd.location, "s3://repo/dev/events-__PLACEHOLDER__");
    }

    #[test]
    fn symlink_sets_input_format() {
        let mut partition = Partition::new(["x"], "s3://repo/main/t/x");

        partition
            .update(
                &TransformOptions::new("db", "t").symlink(true),
                &IdentityLocation,
                false,
            )
            .unwrap();

        assert_eq!(partition.sd.input_format, SYMLINK_INPUT_FORMAT);
    }

    #[test]
    fn transformer_failure_aborts() {
        let failing = |location: &str| -> Result<String> {
            Err(TransformError::rejected(location, "bad pattern"))
        };
        let mut table = Table::new("db", "t", "s3://repo/main/t");

        let err = table
            .update(&TransformOptions::new("other", "t").serde("s"), &failing, false)
            .unwrap_err();

        assert!(matches!(err, TransformError::Rejected { .. }));
        assert!(table.sd.serde_info.name.is_empty());
    }
}
