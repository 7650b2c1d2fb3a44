// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Persistence facade.
//!
//! One [`Session`] per process mediates between callers and either the
//! remote document store (remote mode) or the local key-value store (local
//! mode). The mode is decided once at startup:
//!
//! 1. No remote credentials: status `missing_keys`, nothing else happens.
//! 2. Remote backend built: follow identity changes. A signed-in identity
//!    gets its profile and logs loaded and live-subscribed; no identity
//!    means status `auth`.
//! 3. Remote backend could not be built: local mode for the rest of the
//!    process lifetime, with a fixed pseudo-identity.
//!
//! State changes are published as [`SessionEvent`]s on a broadcast channel.

use crate::config::Config;
use crate::db::{
    keys, paths, subscribe_collection, subscribe_document, Document, DocumentStore, FirestoreDb,
    KeyValueStore, StoreError, Subscription, WriteMode,
};
use crate::i18n::Locale;
use crate::models::{LogEntry, Profile, WeightUnit};
use crate::services::identity::{AuthError, FirebaseAuth, Identity, IdentityProvider};
use crate::services::targets::{calculate_targets, Targets};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Pseudo-identity used in local mode.
pub const LOCAL_USER_ID: &str = "local-user";

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Initializing,
    Remote,
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Loading,
    Auth,
    Ready,
    MissingKeys,
}

/// Change notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum SessionEvent {
    StatusChanged { status: Status, mode: Mode },
    ProfileChanged(Option<Profile>),
    LogsChanged(Vec<LogEntry>),
}

/// How a local profile save treats fields missing from the new profile.
///
/// The remote store always merges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProfileWritePolicy {
    /// The stored profile becomes exactly the saved one
    #[default]
    Replace,
    /// Shallow-merge into the stored profile, like the remote store
    Merge,
}

impl FromStr for ProfileWritePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replace" => Ok(Self::Replace),
            "merge" => Ok(Self::Merge),
            other => Err(format!("Unknown profile write policy: {}", other)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session is not ready")]
    NotReady,

    #[error("Log entry id is required")]
    MissingId,

    #[error("Log entry not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Could not encode data: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Status summary for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub status: Status,
    pub mode: Mode,
    pub user_id: Option<String>,
    pub needs_onboarding: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub write_policy: ProfileWritePolicy,
    /// How often live subscriptions re-read the remote store
    pub sync_interval: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            write_policy: ProfileWritePolicy::Replace,
            sync_interval: Duration::from_secs(5),
        }
    }
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            write_policy: config.profile_write_policy,
            sync_interval: config.sync_interval,
        }
    }
}

// ─── Backend Selection ───────────────────────────────────────────

/// Remote document store plus the identity provider that scopes it.
#[derive(Clone)]
pub struct RemoteBackend {
    pub store: Arc<dyn DocumentStore>,
    pub identity: Arc<dyn IdentityProvider>,
}

/// Outcome of trying to build the remote backend.
pub enum Backend {
    MissingKeys,
    Remote(RemoteBackend),
    Unavailable(String),
}

impl Backend {
    /// Build the Firebase backend from configuration.
    ///
    /// Never fails: missing credentials and construction errors are
    /// reported as the corresponding variant.
    pub async fn connect(config: &Config, local: Arc<dyn KeyValueStore>) -> Backend {
        let (Some(api_key), Some(project_id)) = (
            config.firebase_api_key.as_deref(),
            config.firebase_project_id.as_deref(),
        ) else {
            return Backend::MissingKeys;
        };

        let http = match reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
        {
            Ok(http) => http,
            Err(e) => return Backend::Unavailable(format!("HTTP client: {}", e)),
        };

        let auth = Arc::new(FirebaseAuth::new(http.clone(), api_key, local));
        let store = match FirestoreDb::new(http, project_id, auth.clone()) {
            Ok(store) => store,
            Err(e) => return Backend::Unavailable(e.to_string()),
        };
        if let Err(e) = store.probe().await {
            return Backend::Unavailable(e.to_string());
        }

        auth.restore().await;
        Backend::Remote(RemoteBackend {
            store: Arc::new(store),
            identity: auth,
        })
    }
}

// ─── Session ─────────────────────────────────────────────────────

struct LiveSubscriptions {
    profile: Subscription,
    logs: Subscription,
}

struct State {
    mode: Mode,
    status: Status,
    identity: Option<Identity>,
    profile: Option<Profile>,
    logs: Vec<LogEntry>,
    /// Local log elements this build cannot read, written back unchanged
    unreadable_local_logs: Vec<Value>,
    locale: Locale,
    subscriptions: Option<LiveSubscriptions>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            mode: Mode::Initializing,
            status: Status::Loading,
            identity: None,
            profile: None,
            logs: Vec::new(),
            unreadable_local_logs: Vec::new(),
            locale: Locale::default(),
            subscriptions: None,
        }
    }
}

enum Target {
    Remote(RemoteBackend, String),
    Local,
}

pub struct Session {
    state: RwLock<State>,
    local: Arc<dyn KeyValueStore>,
    remote: Option<RemoteBackend>,
    options: SessionOptions,
    events: broadcast::Sender<SessionEvent>,
    /// Serialises identity transitions
    transition: tokio::sync::Mutex<()>,
    watcher: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Session {
    fn drop(&mut self) {
        let watcher = self
            .watcher
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = watcher {
            handle.abort();
        }
    }
}

impl Session {
    /// Run the startup protocol and return the live session.
    pub async fn start(
        backend: Backend,
        local: Arc<dyn KeyValueStore>,
        options: SessionOptions,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let remote = match &backend {
            Backend::Remote(remote) => Some(remote.clone()),
            _ => None,
        };

        let session = Arc::new(Self {
            state: RwLock::new(State::default()),
            local,
            remote,
            options,
            events,
            transition: tokio::sync::Mutex::new(()),
            watcher: std::sync::Mutex::new(None),
        });

        let locale = session
            .local
            .get(keys::LANG)
            .await
            .and_then(|code| code.parse().ok())
            .unwrap_or_default();
        session.write().locale = locale;

        match backend {
            Backend::MissingKeys => {
                tracing::warn!("Remote backend credentials missing");
                session.set_status(Status::MissingKeys, None);
            }
            Backend::Unavailable(reason) => {
                tracing::warn!(reason = %reason, "Remote backend unavailable, using local storage");
                session.enter_local_mode().await;
            }
            Backend::Remote(remote) => {
                let mut changes = remote.identity.identity_changes();
                let current = changes.borrow_and_update().clone();
                session.on_identity(current).await;
                session.watch_identity(changes);
            }
        }

        session
    }

    // ─── Observation ─────────────────────────────────────────────

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn status(&self) -> Status {
        self.read().status
    }

    pub fn mode(&self) -> Mode {
        self.read().mode
    }

    pub fn identity(&self) -> Option<Identity> {
        self.read().identity.clone()
    }

    pub fn profile(&self) -> Option<Profile> {
        self.read().profile.clone()
    }

    /// Log entries, newest first.
    pub fn logs(&self) -> Vec<LogEntry> {
        self.read().logs.clone()
    }

    pub fn targets(&self) -> Targets {
        calculate_targets(self.read().profile.as_ref())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.read();
        SessionSnapshot {
            status: state.status,
            mode: state.mode,
            user_id: state.identity.as_ref().map(|i| i.uid.clone()),
            needs_onboarding: Profile::needs_onboarding(state.profile.as_ref()),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status() == Status::Ready
    }

    // ─── Profile ─────────────────────────────────────────────────

    /// Save the profile. Returns the profile as now held in memory.
    pub async fn save_profile(&self, mut profile: Profile) -> Result<Profile, SessionError> {
        if profile.unit.is_none() {
            profile.unit = Some(WeightUnit::Kg);
        }

        match self.target()? {
            Target::Remote(remote, uid) => {
                let data = profile.to_merge_document()?;
                let previous = self.profile();
                let optimistic = match &previous {
                    Some(existing) => existing.merged_with(&profile),
                    None => profile,
                };
                self.replace_profile(Some(optimistic.clone()));

                let written = remote
                    .store
                    .write_document(&paths::profile(&uid), &data, WriteMode::Merge)
                    .await;
                if let Err(e) = written {
                    tracing::error!(uid = %uid, error = %e, "Profile write failed");
                    self.replace_profile(previous);
                    return Err(e.into());
                }
                self.refresh_profile().await;
                Ok(self.profile().unwrap_or(optimistic))
            }
            Target::Local => {
                let stored = match self.options.write_policy {
                    ProfileWritePolicy::Replace => profile,
                    ProfileWritePolicy::Merge => match self.profile() {
                        Some(existing) => existing.merged_with(&profile),
                        None => profile,
                    },
                };
                self.local
                    .set(keys::PROFILE, &serde_json::to_string(&stored)?)
                    .await;
                self.replace_profile(Some(stored.clone()));
                Ok(stored)
            }
        }
    }

    // ─── Log Entries ─────────────────────────────────────────────

    /// Add a log entry. Weight entries also update the profile's current
    /// weight.
    pub async fn add_log_entry(&self, mut entry: LogEntry) -> Result<LogEntry, SessionError> {
        match self.target()? {
            Target::Remote(remote, uid) => {
                entry.id = None;
                let data = serde_json::to_value(&entry)?;
                let id = remote
                    .store
                    .add_to_collection(&paths::logs(&uid), &data)
                    .await
                    .inspect_err(|e| tracing::error!(uid = %uid, error = %e, "Log add failed"))?;
                tracing::debug!(uid = %uid, log_id = %id, kind = entry.type_name(), "Log entry added");
                entry.id = Some(id);
                self.refresh_logs().await;
            }
            Target::Local => {
                let logs = {
                    let mut state = self.write();
                    entry.id = Some(next_local_id(&state.logs));
                    state.logs.insert(0, entry.clone());
                    state.logs.clone()
                };
                self.persist_local_logs(&logs).await?;
                self.emit(SessionEvent::LogsChanged(logs));
            }
        }

        if let Some(kg) = entry.weight_kg().filter(|kg| *kg > 0.0) {
            let mut profile = self.profile().unwrap_or_default();
            profile.current_weight = Some(kg);
            self.save_profile(profile).await?;
        }

        Ok(entry)
    }

    /// Replace an existing entry, matched by id.
    pub async fn update_log_entry(&self, entry: LogEntry) -> Result<LogEntry, SessionError> {
        let id = entry.id().ok_or(SessionError::MissingId)?.to_string();

        match self.target()? {
            Target::Remote(remote, uid) => {
                let mut data = serde_json::to_value(&entry)?;
                if let Value::Object(fields) = &mut data {
                    fields.remove("id");
                }
                remote
                    .store
                    .write_document(&paths::log(&uid, &id), &data, WriteMode::Replace)
                    .await
                    .inspect_err(|e| {
                        tracing::error!(uid = %uid, log_id = %id, error = %e, "Log update failed")
                    })?;
                self.refresh_logs().await;
            }
            Target::Local => {
                let logs = {
                    let mut state = self.write();
                    let slot = state
                        .logs
                        .iter_mut()
                        .find(|l| l.id() == Some(id.as_str()))
                        .ok_or_else(|| SessionError::NotFound(id.clone()))?;
                    *slot = entry.clone();
                    state.logs.clone()
                };
                self.persist_local_logs(&logs).await?;
                self.emit(SessionEvent::LogsChanged(logs));
            }
        }

        Ok(entry)
    }

    /// Delete one entry by id. Other entries are untouched.
    pub async fn delete_log_entry(&self, id: &str) -> Result<(), SessionError> {
        if id.is_empty() {
            return Err(SessionError::MissingId);
        }

        match self.target()? {
            Target::Remote(remote, uid) => {
                remote
                    .store
                    .delete_document(&paths::log(&uid, id))
                    .await
                    .inspect_err(|e| {
                        tracing::error!(uid = %uid, log_id = %id, error = %e, "Log delete failed")
                    })?;
                self.refresh_logs().await;
            }
            Target::Local => {
                let logs = {
                    let mut state = self.write();
                    state.logs.retain(|l| l.id() != Some(id));
                    state.logs.clone()
                };
                self.persist_local_logs(&logs).await?;
                self.emit(SessionEvent::LogsChanged(logs));
            }
        }
        Ok(())
    }

    // ─── Identity ────────────────────────────────────────────────

    /// Sign in with email and password. `None` without an identity provider.
    pub async fn sign_in(
        self: &Arc<Self>,
        email: &str,
        password: &str,
    ) -> Result<Option<Identity>, SessionError> {
        let Some(remote) = self.remote.clone() else {
            tracing::debug!("Sign-in ignored without an identity provider");
            return Ok(None);
        };
        let identity = remote.identity.sign_in_with_password(email, password).await?;
        self.on_identity(Some(identity.clone())).await;
        Ok(Some(identity))
    }

    pub async fn sign_up(
        self: &Arc<Self>,
        email: &str,
        password: &str,
    ) -> Result<Option<Identity>, SessionError> {
        let Some(remote) = self.remote.clone() else {
            tracing::debug!("Sign-up ignored without an identity provider");
            return Ok(None);
        };
        let identity = remote.identity.create_account(email, password).await?;
        self.on_identity(Some(identity.clone())).await;
        Ok(Some(identity))
    }

    pub async fn sign_in_as_guest(self: &Arc<Self>) -> Result<Option<Identity>, SessionError> {
        let Some(remote) = self.remote.clone() else {
            tracing::debug!("Guest sign-in ignored without an identity provider");
            return Ok(None);
        };
        let identity = remote.identity.sign_in_anonymously().await?;
        self.on_identity(Some(identity.clone())).await;
        Ok(Some(identity))
    }

    /// Sign out, releasing subscriptions and clearing the profile and logs.
    pub async fn sign_out(self: &Arc<Self>) -> Result<(), SessionError> {
        let Some(remote) = self.remote.clone() else {
            return Ok(());
        };
        remote.identity.sign_out().await?;
        self.on_identity(None).await;
        Ok(())
    }

    // ─── Local Preferences ───────────────────────────────────────

    pub fn locale(&self) -> Locale {
        self.read().locale
    }

    pub async fn set_locale(&self, locale: Locale) {
        self.write().locale = locale;
        self.local.set(keys::LANG, locale.code()).await;
    }

    /// Erase the locally stored profile and logs.
    pub async fn reset_local_data(&self) {
        self.local.remove(keys::PROFILE).await;
        self.local.remove(keys::LOGS).await;
        tracing::info!("Local data erased");

        let cleared = {
            let mut state = self.write();
            state.unreadable_local_logs.clear();
            if state.mode == Mode::Local {
                state.profile = None;
                state.logs.clear();
                true
            } else {
                false
            }
        };
        if cleared {
            self.emit(SessionEvent::ProfileChanged(None));
            self.emit(SessionEvent::LogsChanged(Vec::new()));
        }
    }

    // ─── Internals ───────────────────────────────────────────────

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: SessionEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    fn set_status(&self, status: Status, mode: Option<Mode>) {
        let (status, mode) = {
            let mut state = self.write();
            if let Some(mode) = mode {
                state.mode = mode;
            }
            state.status = status;
            (state.status, state.mode)
        };
        tracing::info!(status = ?status, mode = ?mode, "Session status changed");
        self.emit(SessionEvent::StatusChanged { status, mode });
    }

    fn replace_profile(&self, profile: Option<Profile>) {
        self.write().profile = profile.clone();
        self.emit(SessionEvent::ProfileChanged(profile));
    }

    fn target(&self) -> Result<Target, SessionError> {
        let state = self.read();
        if state.status != Status::Ready {
            return Err(SessionError::NotReady);
        }
        match (state.mode, &self.remote, &state.identity) {
            (Mode::Local, _, _) => Ok(Target::Local),
            (Mode::Remote, Some(remote), Some(identity)) => {
                Ok(Target::Remote(remote.clone(), identity.uid.clone()))
            }
            _ => Err(SessionError::NotReady),
        }
    }

    async fn enter_local_mode(&self) {
        let profile = self.local.get(keys::PROFILE).await.and_then(|raw| {
            serde_json::from_str::<Option<Profile>>(&raw)
                .inspect_err(|e| tracing::warn!(error = %e, "Ignoring unreadable local profile"))
                .ok()
                .flatten()
        });
        let (logs, unreadable) = self
            .local
            .get(keys::LOGS)
            .await
            .map(|raw| decode_local_logs(&raw))
            .unwrap_or_default();

        tracing::info!(
            has_profile = profile.is_some(),
            log_count = logs.len(),
            unreadable = unreadable.len(),
            "Loaded local data"
        );

        {
            let mut state = self.write();
            state.identity = Some(Identity {
                uid: LOCAL_USER_ID.to_string(),
                email: None,
                anonymous: true,
            });
            state.profile = profile.clone();
            state.logs = logs.clone();
            state.unreadable_local_logs = unreadable;
        }
        self.emit(SessionEvent::ProfileChanged(profile));
        self.emit(SessionEvent::LogsChanged(logs));
        self.set_status(Status::Ready, Some(Mode::Local));
    }

    async fn persist_local_logs(&self, logs: &[LogEntry]) -> Result<(), SessionError> {
        let mut items = logs
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        items.extend(self.read().unreadable_local_logs.iter().cloned());
        self.local.set(keys::LOGS, &serde_json::to_string(&items)?).await;
        Ok(())
    }

    fn watch_identity(self: &Arc<Self>, mut changes: watch::Receiver<Option<Identity>>) {
        let weak = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                changes.borrow_and_update();
                let Some(session) = weak.upgrade() else {
                    break;
                };
                session.follow_provider().await;
            }
        });
        *self.watcher.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    /// Apply an identity change. Repeated notifications for the identity
    /// already loaded are ignored.
    async fn on_identity(self: &Arc<Self>, identity: Option<Identity>) {
        let _transition = self.transition.lock().await;
        self.apply_identity(identity).await;
    }

    /// Apply the provider's current identity. Read under the transition
    /// lock so a queued notification never replays an older identity.
    async fn follow_provider(self: &Arc<Self>) {
        let _transition = self.transition.lock().await;
        let Some(remote) = self.remote.clone() else {
            return;
        };
        self.apply_identity(remote.identity.current()).await;
    }

    async fn apply_identity(self: &Arc<Self>, identity: Option<Identity>) {
        let Some(remote) = self.remote.clone() else {
            return;
        };

        let Some(identity) = identity else {
            let had_identity = {
                let mut state = self.write();
                state.subscriptions = None;
                state.profile = None;
                state.logs.clear();
                state.identity.take().is_some()
            };
            if had_identity {
                tracing::info!("Identity cleared");
                self.emit(SessionEvent::ProfileChanged(None));
                self.emit(SessionEvent::LogsChanged(Vec::new()));
            }
            self.set_status(Status::Auth, None);
            return;
        };

        {
            let state = self.read();
            let same_user = state.identity.as_ref().map(|i| &i.uid) == Some(&identity.uid);
            if same_user && state.status == Status::Ready {
                return;
            }
        }

        let uid = identity.uid.clone();
        {
            let mut state = self.write();
            state.subscriptions = None;
            state.identity = Some(identity);
        }
        self.set_status(Status::Loading, Some(Mode::Remote));

        let initial_profile = match remote.store.read_document(&paths::profile(&uid)).await {
            Ok(doc) => Some(doc),
            Err(e) => {
                tracing::warn!(uid = %uid, error = %e, "Initial profile read failed");
                None
            }
        };
        let initial_logs = match remote.store.read_collection(&paths::logs(&uid)).await {
            Ok(docs) => Some(docs),
            Err(e) => {
                tracing::warn!(uid = %uid, error = %e, "Initial log read failed");
                None
            }
        };

        let profile = initial_profile.clone().flatten().and_then(decode_profile);
        let logs = initial_logs.clone().map(decode_remote_logs).unwrap_or_default();
        let subscriptions = self.live_subscriptions(&remote, &uid, initial_profile, initial_logs);
        {
            let mut state = self.write();
            state.profile = profile;
            state.logs = logs;
            state.subscriptions = Some(subscriptions);
        }
        self.emit(SessionEvent::ProfileChanged(self.profile()));
        self.emit(SessionEvent::LogsChanged(self.logs()));
        tracing::info!(uid = %uid, "Remote data loaded");
        self.set_status(Status::Ready, Some(Mode::Remote));
    }

    fn live_subscriptions(
        self: &Arc<Self>,
        remote: &RemoteBackend,
        uid: &str,
        initial_profile: Option<Option<Value>>,
        initial_logs: Option<Vec<Document>>,
    ) -> LiveSubscriptions {
        let interval = self.options.sync_interval;

        let weak = Arc::downgrade(self);
        let owner = uid.to_string();
        let profile = subscribe_document(
            remote.store.clone(),
            paths::profile(uid),
            interval,
            initial_profile,
            move |doc| {
                if let Some(session) = weak.upgrade() {
                    session.apply_remote_profile(&owner, doc);
                }
            },
        );

        let weak = Arc::downgrade(self);
        let owner = uid.to_string();
        let logs = subscribe_collection(
            remote.store.clone(),
            paths::logs(uid),
            interval,
            initial_logs,
            move |docs| {
                if let Some(session) = weak.upgrade() {
                    session.apply_remote_logs(&owner, docs);
                }
            },
        );

        LiveSubscriptions { profile, logs }
    }

    fn owns(&self, uid: &str) -> bool {
        self.read().identity.as_ref().map(|i| i.uid.as_str()) == Some(uid)
    }

    fn apply_remote_profile(&self, uid: &str, doc: Option<Value>) {
        if !self.owns(uid) {
            return;
        }
        self.replace_profile(doc.and_then(decode_profile));
    }

    fn apply_remote_logs(&self, uid: &str, docs: Vec<Document>) {
        if !self.owns(uid) {
            return;
        }
        let logs = decode_remote_logs(docs);
        self.write().logs = logs.clone();
        self.emit(SessionEvent::LogsChanged(logs));
    }

    /// Pull our own write back through the live profile subscription.
    async fn refresh_profile(&self) {
        let refresher = self.read().subscriptions.as_ref().map(|s| s.profile.refresher());
        if let Some(refresher) = refresher {
            refresher.refresh().await;
        }
    }

    async fn refresh_logs(&self) {
        let refresher = self.read().subscriptions.as_ref().map(|s| s.logs.refresher());
        if let Some(refresher) = refresher {
            refresher.refresh().await;
        }
    }
}

/// Millisecond timestamp id, bumped until unique within `logs`.
fn next_local_id(logs: &[LogEntry]) -> String {
    let mut candidate = Utc::now().timestamp_millis();
    loop {
        let id = candidate.to_string();
        if !logs.iter().any(|l| l.id() == Some(id.as_str())) {
            return id;
        }
        candidate += 1;
    }
}

fn decode_profile(value: Value) -> Option<Profile> {
    serde_json::from_value(value)
        .inspect_err(|e| tracing::warn!(error = %e, "Ignoring malformed profile document"))
        .ok()
}

/// Remote log documents, newest first.
fn decode_remote_logs(docs: Vec<Document>) -> Vec<LogEntry> {
    let mut logs: Vec<LogEntry> = docs
        .into_iter()
        .filter_map(|doc| {
            let mut entry: LogEntry = serde_json::from_value(doc.data)
                .inspect_err(|e| {
                    tracing::warn!(log_id = %doc.id, error = %e, "Skipping malformed log document")
                })
                .ok()?;
            entry.id = Some(doc.id);
            Some(entry)
        })
        .collect();
    logs.sort_by_key(|l| std::cmp::Reverse(l.date.to_datetime()));
    logs
}

/// Local log array, split into readable entries and the raw elements that
/// could not be decoded.
fn decode_local_logs(raw: &str) -> (Vec<LogEntry>, Vec<Value>) {
    let Ok(items) = serde_json::from_str::<Vec<Value>>(raw) else {
        tracing::warn!("Ignoring unreadable local logs");
        return Default::default();
    };

    let mut logs = Vec::with_capacity(items.len());
    let mut unreadable = Vec::new();
    for item in items {
        match LogEntry::deserialize(&item) {
            Ok(entry) => logs.push(entry),
            Err(e) => {
                tracing::warn!(error = %e, "Keeping unreadable local log as-is");
                unreadable.push(item);
            }
        }
    }
    (logs, unreadable)
}
