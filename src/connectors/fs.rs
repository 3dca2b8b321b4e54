//! Filesystem-backed object listing.
//!
//! Each bucket is a directory under the storage root and object keys are the
//! `/`-joined relative paths of the files inside it.

use super::{ConnectorError, ConnectorResult, ObjectLister};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FsObjectLister {
    root: PathBuf,
}

impl FsObjectLister {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn collect_keys(bucket_root: &Path, prefix: &str) -> ConnectorResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut pending = vec![bucket_root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let path = entry.path();
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    if let Some(key) = object_key(bucket_root, &path) {
                        if key.starts_with(prefix) {
                            keys.push(key);
                        }
                    }
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}

#[async_trait]
impl ObjectLister for FsObjectLister {
    async fn list_keys(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> ConnectorResult<Vec<String>> {
        let bucket_root = self.root.join(bucket);
        if !tokio::fs::try_exists(&bucket_root).await? {
            return Err(ConnectorError::BucketNotFound(bucket.to_string()));
        }

        let keys = Self::collect_keys(&bucket_root, prefix).await?;
        let keys = match delimiter.filter(|d| !d.is_empty()) {
            Some(delimiter) => roll_up(prefix, keys, delimiter),
            None => keys,
        };

        debug!(bucket, prefix, count = keys.len(), "Listed objects");
        Ok(keys)
    }
}

/// Relative path as a `/`-separated key; `None` for non-UTF-8 names
fn object_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts = relative
        .components()
        .map(|component| match component {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join("/"))
}

/// Collapse keys containing `delimiter` after `prefix` into their common prefix
fn roll_up(prefix: &str, keys: Vec<String>, delimiter: &str) -> Vec<String> {
    let mut out: Vec<String> = keys
        .into_iter()
        .map(|key| match key[prefix.len()..].find(delimiter) {
            Some(idx) => key[..prefix.len() + idx + delimiter.len()].to_string(),
            None => key,
        })
        .collect();
    out.sort();
    out.dedup();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, key: &str) {
        let path = root.join(key);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"id,amount\n").unwrap();
    }

    fn seeded() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let bucket = dir.path().join("landing");
        touch(&bucket, "2024/01/05/sales_a.csv");
        touch(&bucket, "2024/01/05/sales_b.csv");
        touch(&bucket, "2024/01/05/extra/manifest.json");
        touch(&bucket, "2024/01/06/sales_a.csv");
        std::fs::create_dir_all(bucket.join("2024/01/07")).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_lists_keys_under_prefix_sorted() {
        let dir = seeded();
        let lister = FsObjectLister::new(dir.path());

        let keys = lister.list_keys("landing", "2024/01/05", None).await.unwrap();
        assert_eq!(
            keys,
            vec![
                "2024/01/05/extra/manifest.json".to_string(),
                "2024/01/05/sales_a.csv".to_string(),
                "2024/01/05/sales_b.csv".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_partition_lists_nothing() {
        let dir = seeded();
        let lister = FsObjectLister::new(dir.path());

        assert!(lister
            .list_keys("landing", "2024/01/07", None)
            .await
            .unwrap()
            .is_empty());
        assert!(lister
            .list_keys("landing", "2023/12/31", Some(""))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_delimiter_rolls_up_common_prefixes() {
        let dir = seeded();
        let lister = FsObjectLister::new(dir.path());

        let keys = lister
            .list_keys("landing", "2024/01/05/", Some("/"))
            .await
            .unwrap();
        assert_eq!(
            keys,
            vec![
                "2024/01/05/extra/".to_string(),
                "2024/01/05/sales_a.csv".to_string(),
                "2024/01/05/sales_b.csv".to_string(),
            ]
        );

        let top = lister.list_keys("landing", "", Some("/")).await.unwrap();
        assert_eq!(top, vec!["2024/".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_bucket_is_an_error() {
        let dir = seeded();
        let lister = FsObjectLister::new(dir.path());

        let err = lister.list_keys("absent", "2024", None).await.unwrap_err();
        assert!(matches!(err, ConnectorError::BucketNotFound(name) if name == "absent"));
    }
}
