//! Storage location rewriting.
//!
//! Branch-aware locations have the shape `scheme://<repository>/<branch>/<path>`.
//! The helpers here substitute the branch, map Databricks `dbfs:/` paths onto
//! object storage, build symlink manifest locations, and translate external
//! locations into their imported counterpart. The transformer structs compose
//! them into [`LocationTransformer`]s.

use crate::error::{Result, TransformError};
use crate::transform::LocationTransformer;

/// Databricks file system prefix.
pub const DBFS_PREFIX: &str = "dbfs:/";

const SCHEME_SEPARATOR: &str = "://";

/// Splits `scheme://host/path` into `(scheme, host, path)`.
fn split_uri(location: &str) -> Result<(&str, &str, &str)> {
    let (scheme, rest) = location
        .split_once(SCHEME_SEPARATOR)
        .ok_or_else(|| TransformError::InvalidLocation(location.to_string()))?;
    if scheme.is_empty() {
        return Err(TransformError::InvalidLocation(location.to_string()));
    }
    let (host, path) = rest.split_once('/').unwrap_or((rest, ""));
    if host.is_empty() {
        return Err(TransformError::InvalidLocation(location.to_string()));
    }
    Ok((scheme, host, path))
}

/// Replaces the branch segment of `scheme://repository/branch/path`.
pub fn replace_branch_name(location: &str, branch: &str) -> Result<String> {
    let missing = || TransformError::MissingBranch {
        location: location.to_string(),
        branch: branch.to_string(),
    };
    let (scheme, repository, path) = split_uri(location).map_err(|_| missing())?;
    let (current, rest) = path.split_once('/').unwrap_or((path, ""));
    if current.is_empty() {
        return Err(missing());
    }
    if rest.is_empty() && !path.ends_with('/') {
        return Ok(format!("{scheme}{SCHEME_SEPARATOR}{repository}/{branch}"));
    }
    Ok(format!("{scheme}{SCHEME_SEPARATOR}{repository}/{branch}/{rest}"))
}

/// Maps a `dbfs:/` location under `dbfs_root`. Other locations, or an empty
/// root, are returned unchanged.
#[must_use]
pub fn handle_dbfs_location(location: &str, dbfs_root: &str) -> String {
    match location.strip_prefix(DBFS_PREFIX) {
        Some(rest) if !dbfs_root.is_empty() => format!("{dbfs_root}{rest}"),
        _ => location.to_string(),
    }
}

/// Location of the symlink manifests for `scheme://repository/branch/path`
/// under `prefix`.
pub fn symlink_location(location: &str, prefix: &str) -> Result<String> {
    let (_, repository, path) = split_uri(location)?;
    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_matches('/');
    if path.is_empty() {
        return Ok(format!("{prefix}/{repository}"));
    }
    Ok(format!("{prefix}/{repository}/{path}"))
}

/// Rewrites an external `scheme://bucket/path` location to where the same
/// object lives once imported into `repository` on `branch`.
pub fn imported_location(location: &str, repository: &str, branch: &str) -> Result<String> {
    let (scheme, bucket, path) = split_uri(location)?;
    if path.is_empty() {
        return Ok(format!("{scheme}{SCHEME_SEPARATOR}{repository}/{branch}/{bucket}"));
    }
    Ok(format!(
        "{scheme}{SCHEME_SEPARATOR}{repository}/{branch}/{bucket}/{path}"
    ))
}

/// Rewrites locations onto another branch of the same repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchLocation {
    /// Destination branch.
    pub branch: String,
    /// Root replacing `dbfs:/`, if any.
    pub dbfs_root: String,
}

impl BranchLocation {
    /// Creates a transformer targeting `branch`.
    #[must_use]
    pub fn new(branch: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            dbfs_root: String::new(),
        }
    }

    /// Sets the root replacing `dbfs:/`.
    #[must_use]
    pub fn with_dbfs_root(mut self, dbfs_root: impl Into<String>) -> Self {
        self.dbfs_root = dbfs_root.into();
        self
    }
}

impl LocationTransformer for BranchLocation {
    fn transform(&self, location: &str) -> Result<String> {
        if location.is_empty() {
            return Ok(String::new());
        }
        let location = handle_dbfs_location(location, &self.dbfs_root);
        replace_branch_name(&location, &self.branch)
    }
}

/// Rewrites external locations into an imported repository branch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportLocation {
    /// Destination repository.
    pub repository: String,
    /// Destination branch.
    pub branch: String,
    /// Root replacing `dbfs:/`, if any.
    pub dbfs_root: String,
}

impl ImportLocation {
    /// Creates a transformer importing into `repository` on `branch`.
    #[must_use]
    pub fn new(repository: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            branch: branch.into(),
            dbfs_root: String::new(),
        }
    }

    /// Sets the root replacing `dbfs:/`.
    #[must_use]
    pub fn with_dbfs_root(mut self, dbfs_root: impl Into<String>) -> Self {
        self.dbfs_root = dbfs_root.into();
        self
    }
}

impl LocationTransformer for ImportLocation {
    fn transform(&self, location: &str) -> Result<String> {
        if location.is_empty() {
            return Ok(String::new());
        }
        let location = handle_dbfs_location(location, &self.dbfs_root);
        imported_location(&location, &self.repository, &self.branch)
    }
}

/// Points locations at their symlink manifests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymlinkLocation {
    /// Manifest root.
    pub prefix: String,
}

impl SymlinkLocation {
    /// Creates a transformer writing under `prefix`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl LocationTransformer for SymlinkLocation {
    fn transform(&self, location: &str) -> Result<String> {
        if location.is_empty() {
            return Ok(String::new());
        }
        symlink_location(location, &self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_branch_segment() {
        assert_eq!(
            replace_branch_name("s3://repo/main/tables/orders", "dev").unwrap(),
            "s3://repo/dev/tables/orders"
        );
        assert_eq!(
            replace_branch_name("s3a://repo/main", "dev").unwrap(),
            "s3a://repo/dev"
        );
        assert_eq!(
            replace_branch_name("s3://repo/main/", "dev").unwrap(),
            "s3://repo/dev/"
        );
    }

    #[test]
    fn missing_branch_is_an_error() {
        assert!(matches!(
            replace_branch_name("s3://repo", "dev"),
            Err(TransformError::MissingBranch { .. })
        ));
        assert!(matches!(
            replace_branch_name("/local/path", "dev"),
            Err(TransformError::MissingBranch { .. })
        ));
    }

    #[test]
    fn dbfs_prefix_translation() {
        assert_eq!(
            handle_dbfs_location("dbfs:/user/hive/warehouse/t", "s3://repo/main/"),
            "s3://repo/main/user/hive/warehouse/t"
        );
        assert_eq!(
            handle_dbfs_location("dbfs:/user/hive/warehouse/t", ""),
            "dbfs:/user/hive/warehouse/t"
        );
        assert_eq!(
            handle_dbfs_location("s3://repo/main/t", "s3://other/"),
            "s3://repo/main/t"
        );
    }

    #[test]
    fn symlink_location_under_prefix() {
        assert_eq!(
            symlink_location("s3://repo/main/orders/ds=1", "s3://bucket/symlinks/").unwrap(),
            "s3://bucket/symlinks/repo/main/orders/ds=1"
        );
        assert!(symlink_location("not-a-uri", "s3://bucket").is_err());
    }

    #[test]
    fn imported_location_nests_bucket() {
        assert_eq!(
            imported_location("s3://warehouse/orders/ds=1", "repo", "import").unwrap(),
            "s3://repo/import/warehouse/orders/ds=1"
        );
    }

    #[test]
    fn branch_transformer_passes_empty_location() {
        let transformer = BranchLocation::new("dev");
        assert_eq!(transformer.transform("").unwrap(), "");
    }

    #[test]
    fn symlink_transformer_passes_empty_location() {
        let transformer = SymlinkLocation::new("s3://bucket/_symlinks");
        assert_eq!(transformer.transform("").unwrap(), "");
        assert!(symlink_location("", "s3://bucket/_symlinks").is_err());
    }

    #[test]
    fn branch_transformer_applies_dbfs_root_first() {
        let transformer = BranchLocation::new("dev").with_dbfs_root("s3://repo/main/");
        assert_eq!(
            transformer.transform("dbfs:/warehouse/t").unwrap(),
            "s3://repo/dev/warehouse/t"
        );
    }

    #[test]
    fn import_transformer() {
        let transformer = ImportLocation::new("repo", "main");
        assert_eq!(
            transformer.transform("gs://data/t").unwrap(),
            "gs://repo/main/data/t"
        );
    }
}
