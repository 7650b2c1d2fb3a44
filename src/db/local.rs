// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Local key-value fallback storage.

use crate::db::KeyValueStore;
use async_trait::async_trait;
use dashmap::DashMap;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// One file per key inside a data directory.
///
/// The directory is created on first write. Values are readable by the
/// owner only, since the stored sign-in holds a refresh token.
///
/// I/O errors are logged and swallowed; a directory that cannot be created
/// or read behaves like empty storage.
#[derive(Debug, Clone)]
pub struct FileKvStore {
    dir: PathBuf,
}

impl FileKvStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file(&self, key: &str) -> PathBuf {
        // Keys are fixed identifiers; anything else is flattened
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }

    /// Write-then-rename so a crash never leaves a half-written value.
    async fn write_private(&self, path: &Path, value: &str) -> io::Result<()> {
        let mut dir = fs::DirBuilder::new();
        dir.recursive(true);
        #[cfg(unix)]
        dir.mode(0o700);
        dir.create(&self.dir).await?;

        let tmp = path.with_extension("json.tmp");
        // A leftover temp file would keep its old permissions
        match fs::remove_file(&tmp).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
            _ => {}
        }

        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options.open(&tmp).await?;
        file.write_all(value.as_bytes()).await?;
        file.flush().await?;
        drop(file);

        fs::rename(&tmp, path).await
    }
}

#[async_trait]
impl KeyValueStore for FileKvStore {
    async fn get(&self, key: &str) -> Option<String> {
        match fs::read_to_string(self.file(key)).await {
            Ok(value) => Some(value),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(key, error = %e, "Local storage read failed");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str) {
        if let Err(e) = self.write_private(&self.file(key), value).await {
            tracing::warn!(key, error = %e, "Local storage write failed");
        }
    }

    async fn remove(&self, key: &str) {
        match fs::remove_file(self.file(key)).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(key, error = %e, "Local storage remove failed"),
        }
    }
}

/// In-memory storage (tests and ephemeral sessions).
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    values: DashMap<String, String>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|v| v.value().clone())
    }

    async fn set(&self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    async fn remove(&self, key: &str) {
        self.values.remove(key);
    }
}
