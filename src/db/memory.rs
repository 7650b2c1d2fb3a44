// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory document store with the same semantics as Firestore.
//!
//! Backs tests of remote mode and can record the last delete target.

use crate::db::{Document, DocumentStore, StoreError, WriteMode};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: DashMap<String, Value>,
    next_id: AtomicU64,
    failing: AtomicBool,
    deleted: Mutex<Vec<String>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with a transport error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Paths passed to `delete_document`, oldest first.
    pub fn deleted_paths(&self) -> Vec<String> {
        self.deleted
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }

    /// Raw stored document, bypassing failure injection.
    pub fn get(&self, path: &str) -> Option<Value> {
        self.documents.get(path).map(|d| d.value().clone())
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn read_document(&self, path: &str) -> Result<Option<Value>, StoreError> {
        self.check()?;
        Ok(self.get(path))
    }

    async fn write_document(
        &self,
        path: &str,
        data: &Value,
        mode: WriteMode,
    ) -> Result<(), StoreError> {
        self.check()?;
        let Some(incoming) = data.as_object() else {
            return Err(StoreError::Decode("Documents must be JSON objects".to_string()));
        };

        let mut entry = self
            .documents
            .entry(path.to_string())
            .or_insert_with(|| Value::Object(Default::default()));

        match (mode, entry.value_mut()) {
            (WriteMode::Merge, Value::Object(existing)) => {
                for (k, v) in incoming {
                    existing.insert(k.clone(), v.clone());
                }
            }
            (_, slot) => *slot = data.clone(),
        }
        Ok(())
    }

    async fn read_collection(&self, path: &str) -> Result<Vec<Document>, StoreError> {
        self.check()?;
        let prefix = format!("{}/", path);
        let mut documents: Vec<Document> = self
            .documents
            .iter()
            .filter_map(|item| {
                let id = item.key().strip_prefix(&prefix)?;
                if id.contains('/') {
                    return None;
                }
                Some(Document {
                    id: id.to_string(),
                    data: item.value().clone(),
                })
            })
            .collect();
        documents.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(documents)
    }

    async fn add_to_collection(&self, path: &str, data: &Value) -> Result<String, StoreError> {
        self.check()?;
        let id = format!("doc{:06}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.documents.insert(format!("{}/{}", path, id), data.clone());
        Ok(id)
    }

    async fn delete_document(&self, path: &str) -> Result<(), StoreError> {
        self.check()?;
        self.documents.remove(path);
        if let Ok(mut deleted) = self.deleted.lock() {
            deleted.push(path.to_string());
        }
        Ok(())
    }
}
