// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Storage layer: the remote document store, the local key-value fallback,
//! and live subscriptions on top of the document store.

pub mod firestore;
pub mod local;
pub mod memory;
pub mod subscription;

pub use firestore::{FirestoreDb, TokenSource};
pub use local::{FileKvStore, MemoryKvStore};
pub use memory::MemoryDocumentStore;
pub use subscription::{subscribe_collection, subscribe_document, Refresher, Subscription};

use async_trait::async_trait;
use serde_json::Value;

/// Document paths, namespaced per authenticated identity.
pub mod paths {
    pub const USERS: &str = "users";

    /// `users/{uid}/data/profile`
    pub fn profile(uid: &str) -> String {
        format!("{}/{}/data/profile", USERS, uid)
    }

    /// `users/{uid}/logs`
    pub fn logs(uid: &str) -> String {
        format!("{}/{}/logs", USERS, uid)
    }

    /// `users/{uid}/logs/{log_id}`
    pub fn log(uid: &str, log_id: &str) -> String {
        format!("{}/{}", logs(uid), log_id)
    }
}

/// Local key-value layout.
pub mod keys {
    pub const PROFILE: &str = "smartfit_profile";
    pub const LOGS: &str = "smartfit_logs";
    pub const LANG: &str = "smartfit_lang";
    /// Persisted remote sign-in (refresh token), used only in remote mode
    pub const AUTH: &str = "smartfit_auth";
}

/// Storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Not signed in")]
    Unauthenticated,

    #[error("Store request failed: {0}")]
    Transport(String),

    #[error("Store returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Malformed store data: {0}")]
    Decode(String),
}

/// A document read from a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

/// How a document write treats fields missing from the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Only the top-level fields present in the payload are written
    Merge,
    /// The stored document becomes exactly the payload
    Replace,
}

/// Remote document database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read one document; `None` if it does not exist.
    async fn read_document(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Create or overwrite a document.
    async fn write_document(
        &self,
        path: &str,
        data: &Value,
        mode: WriteMode,
    ) -> Result<(), StoreError>;

    /// Read every document in a collection, in store order.
    async fn read_collection(&self, path: &str) -> Result<Vec<Document>, StoreError>;

    /// Add a document with a store-assigned id and return that id.
    async fn add_to_collection(&self, path: &str, data: &Value) -> Result<String, StoreError>;

    /// Delete a document. Deleting a missing document is not an error.
    async fn delete_document(&self, path: &str) -> Result<(), StoreError>;
}

/// Local key-value storage.
///
/// Implementations never fail outward: the host may deny storage access, in
/// which case reads return `None` and writes are dropped (and logged).
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: &str);
    async fn remove(&self, key: &str);
}
