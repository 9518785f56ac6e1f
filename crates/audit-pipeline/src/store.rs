// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::error::{StoreError, StoreOperation};

/// Access to the bucket holding shipped log objects.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Keys under `prefix`, in a stable order.
    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    async fn read_object(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Server-side copy within the same bucket.
    async fn copy_object(&self, source_key: &str, dest_key: &str) -> Result<(), StoreError>;

    async fn delete_object(&self, key: &str) -> Result<(), StoreError>;
}

/// Object store backed by a directory, one file per key. Keys use `/` as separator.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store rooted at `base/bucket`.
    pub fn for_bucket(base: impl AsRef<Path>, bucket: &str) -> Self {
        Self::new(base.as_ref().join(bucket))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn io_error(operation: StoreOperation, key: &str, source: std::io::Error) -> StoreError {
        if source.kind() == std::io::ErrorKind::NotFound && operation != StoreOperation::List {
            return StoreError::NotFound(key.to_string());
        }
        StoreError::Io {
            operation,
            key: key.to_string(),
            source,
        }
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut pending = vec![(self.root.clone(), String::new())];

        while let Some((dir, key_prefix)) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| Self::io_error(StoreOperation::List, prefix, e))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| Self::io_error(StoreOperation::List, prefix, e))?
            {
                let name = entry.file_name().to_string_lossy().into_owned();
                let key = format!("{key_prefix}{name}");
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| Self::io_error(StoreOperation::List, &key, e))?;
                if file_type.is_dir() {
                    pending.push((entry.path(), format!("{key}/")));
                } else if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }

        keys.sort();
        debug!("STORE | Listed {} objects under '{prefix}'", keys.len());
        Ok(keys)
    }

    async fn read_object(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(key)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| Self::io_error(StoreOperation::Read, key, e))
    }

    async fn copy_object(&self, source_key: &str, dest_key: &str) -> Result<(), StoreError> {
        let source = self.path_for(source_key)?;
        let dest = self.path_for(dest_key)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::io_error(StoreOperation::Copy, dest_key, e))?;
        }
        tokio::fs::copy(&source, &dest)
            .await
            .map_err(|e| Self::io_error(StoreOperation::Copy, source_key, e))?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| Self::io_error(StoreOperation::Delete, key, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_with(files: &[(&str, &str)]) -> (tempfile::TempDir, FsObjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::for_bucket(dir.path(), "eks-logs");
        tokio::fs::create_dir_all(store.root()).await.unwrap();
        for (key, body) in files {
            let path = store.root().join(key);
            tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
            tokio::fs::write(path, body).await.unwrap();
        }
        (dir, store)
    }

    #[tokio::test]
    async fn test_list_objects_is_recursive_sorted_and_prefixed() {
        let (_dir, store) = store_with(&[
            ("pod-logs/b/2.log", "{}"),
            ("pod-logs/a.log", "{}"),
            ("pod-logs/b/1.log", "{}"),
            ("other/c.log", "{}"),
        ])
        .await;

        let keys = store.list_objects("pod-logs").await.unwrap();
        assert_eq!(
            keys,
            vec!["pod-logs/a.log", "pod-logs/b/1.log", "pod-logs/b/2.log"]
        );

        let all = store.list_objects("").await.unwrap();
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn test_list_missing_bucket_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::for_bucket(dir.path(), "missing");
        let result = store.list_objects("pod-logs").await;
        assert!(matches!(
            result,
            Err(StoreError::Io {
                operation: StoreOperation::List,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_read_copy_delete() {
        let (_dir, store) = store_with(&[("pod-logs/a.log", "{\"a\":1}")]).await;

        let body = store.read_object("pod-logs/a.log").await.unwrap();
        assert_eq!(body, b"{\"a\":1}");

        store
            .copy_object("pod-logs/a.log", "backup_pod-logs/a.log")
            .await
            .unwrap();
        store.delete_object("pod-logs/a.log").await.unwrap();

        assert!(matches!(
            store.read_object("pod-logs/a.log").await,
            Err(StoreError::NotFound(_))
        ));
        let backup = store.read_object("backup_pod-logs/a.log").await.unwrap();
        assert_eq!(backup, b"{\"a\":1}");
    }

    #[tokio::test]
    async fn test_keys_cannot_escape_root() {
        let (_dir, store) = store_with(&[]).await;
        for key in ["", "../secret", "/etc/passwd", "pod-logs/../../x"] {
            assert!(
                matches!(store.read_object(key).await, Err(StoreError::InvalidKey(_))),
                "{key} should be rejected"
            );
        }
    }
}
