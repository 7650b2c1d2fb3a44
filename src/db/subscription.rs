// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Live subscriptions on top of a [`DocumentStore`].
//!
//! A subscription re-reads its document or collection every interval (or
//! on request through [`Subscription::refresh`]) and invokes the callback
//! whenever the content differs from what it last delivered. Dropping the
//! handle stops the background task.

use crate::db::{Document, DocumentStore, StoreError};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

const PENDING_REFRESHES: usize = 8;

/// Requests an immediate re-read from a running subscription.
///
/// Cloneable so a caller can wait for the re-read without holding on to
/// the [`Subscription`] itself.
#[derive(Debug, Clone)]
pub struct Refresher {
    requests: mpsc::Sender<oneshot::Sender<()>>,
}

impl Refresher {
    /// Re-read now and wait until any change has been delivered to the
    /// callback. Returns early if the subscription has been released.
    pub async fn refresh(&self) {
        let (ack, done) = oneshot::channel();
        if self.requests.send(ack).await.is_ok() {
            let _ = done.await;
        }
    }
}

/// Handle to a running subscription. Released on drop.
#[derive(Debug)]
pub struct Subscription {
    refresher: Refresher,
    handle: JoinHandle<()>,
}

impl Subscription {
    pub fn refresher(&self) -> Refresher {
        self.refresher.clone()
    }

    /// See [`Refresher::refresh`].
    pub async fn refresh(&self) {
        self.refresher.refresh().await;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Subscribe to a single document.
///
/// With `initial` set the caller already holds the current content, so the
/// first read happens after one interval.
pub fn subscribe_document<F>(
    store: Arc<dyn DocumentStore>,
    path: String,
    interval: Duration,
    initial: Option<Option<Value>>,
    on_change: F,
) -> Subscription
where
    F: Fn(Option<Value>) + Send + Sync + 'static,
{
    let label = path.clone();
    spawn_poll(
        label,
        interval,
        initial,
        move || {
            let store = store.clone();
            let path = path.clone();
            async move { store.read_document(&path).await }
        },
        on_change,
    )
}

/// Subscribe to every document of a collection.
pub fn subscribe_collection<F>(
    store: Arc<dyn DocumentStore>,
    path: String,
    interval: Duration,
    initial: Option<Vec<Document>>,
    on_change: F,
) -> Subscription
where
    F: Fn(Vec<Document>) + Send + Sync + 'static,
{
    let label = path.clone();
    spawn_poll(
        label,
        interval,
        initial,
        move || {
            let store = store.clone();
            let path = path.clone();
            async move { store.read_collection(&path).await }
        },
        on_change,
    )
}

fn spawn_poll<T, Fetch, Fut, F>(
    label: String,
    interval: Duration,
    initial: Option<T>,
    fetch: Fetch,
    on_change: F,
) -> Subscription
where
    T: Clone + PartialEq + Send + 'static,
    Fetch: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, StoreError>> + Send,
    F: Fn(T) + Send + Sync + 'static,
{
    let (requests, mut pending) = mpsc::channel::<oneshot::Sender<()>>(PENDING_REFRESHES);

    let handle = tokio::spawn(async move {
        let mut skip_wait = initial.is_none();
        let mut last = initial;
        let mut waiting = Vec::new();

        loop {
            if !skip_wait {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    Some(ack) = pending.recv() => waiting.push(ack),
                }
            }
            skip_wait = false;
            // Requests queued so far are all answered by this read
            while let Ok(ack) = pending.try_recv() {
                waiting.push(ack);
            }

            match fetch().await {
                Ok(current) => {
                    if last.as_ref() != Some(&current) {
                        tracing::debug!(path = %label, "Subscription delivered update");
                        on_change(current.clone());
                        last = Some(current);
                    }
                }
                Err(e) => {
                    tracing::warn!(path = %label, error = %e, "Subscription refresh failed");
                }
            }

            for ack in waiting.drain(..) {
                let _ = ack.send(());
            }
        }
    });

    Subscription {
        refresher: Refresher { requests },
        handle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryDocumentStore, WriteMode};
    use serde_json::json;
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_document_subscription_delivers_changes() {
        let store = Arc::new(MemoryDocumentStore::new());
        let seen: Arc<Mutex<Vec<Option<Value>>>> = Arc::default();
        let sink = seen.clone();

        let sub = subscribe_document(
            store.clone(),
            "users/u/data/profile".to_string(),
            Duration::from_secs(3600),
            None,
            move |doc| sink.lock().unwrap().push(doc),
        );

        sub.refresh().await;
        assert_eq!(seen.lock().unwrap().clone(), vec![None]);

        store
            .write_document("users/u/data/profile", &json!({"name": "Ana"}), WriteMode::Merge)
            .await
            .unwrap();
        sub.refresh().await;
        assert_eq!(
            seen.lock().unwrap().last().cloned(),
            Some(Some(json!({"name": "Ana"})))
        );

        // Unchanged content is not delivered twice
        sub.refresh().await;
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_waits_for_delivery() {
        let store = Arc::new(MemoryDocumentStore::new());
        let seen: Arc<Mutex<Vec<usize>>> = Arc::default();
        let sink = seen.clone();

        let sub = subscribe_collection(
            store.clone(),
            "users/u/logs".to_string(),
            Duration::from_secs(3600),
            Some(Vec::new()),
            move |docs| sink.lock().unwrap().push(docs.len()),
        );
        let refresher = sub.refresher();

        store
            .add_to_collection("users/u/logs", &json!({"type": "workout"}))
            .await
            .unwrap();
        refresher.refresh().await;
        assert_eq!(seen.lock().unwrap().clone(), vec![1]);

        // A released subscription never leaves the caller waiting
        drop(sub);
        tokio::time::timeout(Duration::from_secs(1), refresher.refresh())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_drop_releases_task() {
        let store = Arc::new(MemoryDocumentStore::new());
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();

        let sub = subscribe_collection(
            store,
            "users/u/logs".to_string(),
            Duration::from_millis(10),
            None,
            move |_| *counter.lock().unwrap() += 1,
        );
        tokio::time::sleep(Duration::from_millis(30)).await;
        drop(sub);

        let after_drop = *calls.lock().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*calls.lock().unwrap(), after_drop);
    }
}
