// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity provider: Firebase Authentication over its REST API.
//!
//! Handles:
//! - Email/password sign-in and account creation
//! - Anonymous (guest) sign-in
//! - ID token refresh before expiry
//! - Persisting the sign-in across restarts (refresh token in local storage)

use crate::db::{keys, KeyValueStore, StoreError, TokenSource};
use crate::i18n::{self, Locale, Message};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

const IDENTITY_TOOLKIT_HOST: &str = "https://identitytoolkit.googleapis.com";
const SECURE_TOKEN_HOST: &str = "https://securetoken.googleapis.com";

/// Margin before ID token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Minimum password length accepted by the provider.
const MIN_PASSWORD_LEN: usize = 6;

/// Opaque signed-in identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub anonymous: bool,
}

/// Authentication errors, each with a short user-facing message.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email already in use")]
    EmailInUse,

    #[error("Password too weak")]
    WeakPassword,

    #[error("Identity provider error: {0}")]
    Provider(String),

    #[error("Identity provider unreachable: {0}")]
    Transport(String),
}

impl AuthError {
    /// Message shown inline on the auth form.
    pub fn user_message(&self, locale: Locale) -> String {
        match self {
            AuthError::InvalidCredentials => i18n::text(locale, Message::InvalidCredentials).into(),
            AuthError::EmailInUse => i18n::text(locale, Message::EmailInUse).into(),
            AuthError::WeakPassword => i18n::text(locale, Message::WeakPassword).into(),
            AuthError::Provider(msg) => msg.clone(),
            AuthError::Transport(_) => i18n::text(locale, Message::AuthFailed).into(),
        }
    }

    /// Map a Firebase error code ("WEAK_PASSWORD : Password should be...").
    fn from_provider_code(message: &str) -> Self {
        let code = message.split(':').next().unwrap_or_default().trim();
        match code {
            "INVALID_LOGIN_CREDENTIALS" | "INVALID_PASSWORD" | "EMAIL_NOT_FOUND"
            | "INVALID_EMAIL" | "USER_DISABLED" => AuthError::InvalidCredentials,
            "EMAIL_EXISTS" => AuthError::EmailInUse,
            "WEAK_PASSWORD" => AuthError::WeakPassword,
            _ => AuthError::Provider(message.to_string()),
        }
    }
}

/// External identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in_anonymously(&self) -> Result<Identity, AuthError>;

    async fn sign_in_with_password(&self, email: &str, password: &str)
        -> Result<Identity, AuthError>;

    async fn create_account(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Identity-change notifications; the current value is the signed-in
    /// identity, if any.
    fn identity_changes(&self) -> watch::Receiver<Option<Identity>>;

    fn current(&self) -> Option<Identity> {
        self.identity_changes().borrow().clone()
    }
}

// ─── Firebase REST Implementation ────────────────────────────────

/// Tokens for the signed-in user, persisted under [`keys::AUTH`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Credentials {
    identity: Identity,
    id_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
    local_id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
    user_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

/// Firebase Authentication client.
pub struct FirebaseAuth {
    http: reqwest::Client,
    api_key: String,
    auth_base: String,
    token_base: String,
    storage: Arc<dyn KeyValueStore>,
    credentials: Mutex<Option<Credentials>>,
    changes: watch::Sender<Option<Identity>>,
}

impl FirebaseAuth {
    /// Create a client. For local development with the emulator, set
    /// FIREBASE_AUTH_EMULATOR_HOST.
    pub fn new(http: reqwest::Client, api_key: &str, storage: Arc<dyn KeyValueStore>) -> Self {
        let (auth_base, token_base) = match std::env::var("FIREBASE_AUTH_EMULATOR_HOST") {
            Ok(host) if !host.is_empty() => {
                tracing::info!(host = %host, "Using Firebase Auth Emulator");
                (
                    format!("http://{}/identitytoolkit.googleapis.com", host),
                    format!("http://{}/securetoken.googleapis.com", host),
                )
            }
            _ => (
                IDENTITY_TOOLKIT_HOST.to_string(),
                SECURE_TOKEN_HOST.to_string(),
            ),
        };

        let (changes, _) = watch::channel(None);
        Self {
            http,
            api_key: api_key.to_string(),
            auth_base,
            token_base,
            storage,
            credentials: Mutex::new(None),
            changes,
        }
    }

    /// Restore a persisted sign-in, if any.
    ///
    /// A stored refresh token that no longer works is discarded and the
    /// user is left signed out.
    pub async fn restore(&self) {
        let Some(raw) = self.storage.get(keys::AUTH).await else {
            return;
        };
        let stored: Credentials = match serde_json::from_str(&raw) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable stored sign-in");
                self.storage.remove(keys::AUTH).await;
                return;
            }
        };

        match self.refresh(&stored).await {
            Ok(fresh) => {
                tracing::info!(uid = %fresh.identity.uid, "Restored previous sign-in");
                self.install(Some(fresh)).await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Stored sign-in could not be refreshed");
                self.storage.remove(keys::AUTH).await;
            }
        }
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/v1/accounts:{}?key={}", self.auth_base, method, self.api_key)
    }

    async fn install(&self, credentials: Option<Credentials>) {
        let identity = credentials.as_ref().map(|c| c.identity.clone());
        match &credentials {
            Some(c) => match serde_json::to_string(c) {
                Ok(raw) => self.storage.set(keys::AUTH, &raw).await,
                Err(e) => tracing::warn!(error = %e, "Could not persist sign-in"),
            },
            None => self.storage.remove(keys::AUTH).await,
        }
        *self.credentials.lock().await = credentials;
        self.changes.send_replace(identity);
    }

    /// POST to an Identity Toolkit method and map error codes.
    async fn call<B: Serialize + ?Sized>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<SignInResponse, AuthError> {
        let response = self
            .http
            .post(self.endpoint(method))
            .json(body)
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
                .unwrap_or(body);
            tracing::debug!(method, message = %message, "Identity provider rejected request");
            return Err(AuthError::from_provider_code(&message));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::Provider(format!("Malformed sign-in response: {}", e)))
    }

    async fn signed_in(&self, response: SignInResponse, anonymous: bool) -> Identity {
        let credentials = Credentials {
            identity: Identity {
                uid: response.local_id,
                email: response.email.filter(|e| !e.is_empty()),
                anonymous,
            },
            id_token: response.id_token,
            refresh_token: response.refresh_token,
            expires_at: expiry(&response.expires_in),
        };
        let identity = credentials.identity.clone();
        tracing::info!(uid = %identity.uid, anonymous, "Signed in");
        self.install(Some(credentials)).await;
        identity
    }

    async fn refresh(&self, current: &Credentials) -> Result<Credentials, AuthError> {
        let response = self
            .http
            .post(format!("{}/v1/token?key={}", self.token_base, self.api_key))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", current.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Transport(format!("Token refresh request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Provider(format!("HTTP {}: {}", status, body)));
        }

        let refreshed: RefreshResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Provider(format!("Malformed refresh response: {}", e)))?;

        if refreshed.user_id != current.identity.uid {
            return Err(AuthError::Provider("Refresh returned another user".to_string()));
        }

        Ok(Credentials {
            identity: current.identity.clone(),
            id_token: refreshed.id_token,
            refresh_token: refreshed.refresh_token,
            expires_at: expiry(&refreshed.expires_in),
        })
    }
}

/// Expiry instant from an `expires_in` seconds string (default one hour).
fn expiry(expires_in: &str) -> DateTime<Utc> {
    Utc::now() + Duration::seconds(expires_in.trim().parse().unwrap_or(3600))
}

#[async_trait]
impl IdentityProvider for FirebaseAuth {
    async fn sign_in_anonymously(&self) -> Result<Identity, AuthError> {
        let response = self
            .call("signUp", &serde_json::json!({ "returnSecureToken": true }))
            .await?;
        Ok(self.signed_in(response, true).await)
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, AuthError> {
        let body = PasswordRequest {
            email,
            password,
            return_secure_token: true,
        };
        let response = self.call("signInWithPassword", &body).await?;
        Ok(self.signed_in(response, false).await)
    }

    async fn create_account(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let body = PasswordRequest {
            email,
            password,
            return_secure_token: true,
        };
        let response = self.call("signUp", &body).await?;
        Ok(self.signed_in(response, false).await)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.install(None).await;
        tracing::info!("Signed out");
        Ok(())
    }

    fn identity_changes(&self) -> watch::Receiver<Option<Identity>> {
        self.changes.subscribe()
    }
}

#[async_trait]
impl TokenSource for FirebaseAuth {
    async fn id_token(&self) -> Result<String, StoreError> {
        let mut guard = self.credentials.lock().await;
        let Some(current) = guard.as_ref() else {
            return Err(StoreError::Unauthenticated);
        };

        if current.expires_at - Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) > Utc::now() {
            return Ok(current.id_token.clone());
        }

        tracing::debug!(uid = %current.identity.uid, "Refreshing ID token");
        let fresh = self.refresh(current).await.map_err(|e| {
            tracing::warn!(error = %e, "ID token refresh failed");
            StoreError::Unauthenticated
        })?;
        let token = fresh.id_token.clone();
        if let Ok(raw) = serde_json::to_string(&fresh) {
            self.storage.set(keys::AUTH, &raw).await;
        }
        *guard = Some(fresh);
        Ok(token)
    }
}

// ─── In-Memory Implementation ────────────────────────────────────

/// Identity provider with an in-memory account table (tests and demos).
pub struct MemoryIdentityProvider {
    accounts: DashMap<String, (String, String)>,
    next_uid: AtomicU64,
    changes: watch::Sender<Option<Identity>>,
}

impl Default for MemoryIdentityProvider {
    fn default() -> Self {
        let (changes, _) = watch::channel(None);
        Self {
            accounts: DashMap::new(),
            next_uid: AtomicU64::new(0),
            changes,
        }
    }
}

impl MemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn new_uid(&self, prefix: &str) -> String {
        format!("{}{}", prefix, self.next_uid.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn publish(&self, identity: Identity) -> Identity {
        self.changes.send_replace(Some(identity.clone()));
        identity
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn sign_in_anonymously(&self) -> Result<Identity, AuthError> {
        let uid = self.new_uid("guest-");
        Ok(self.publish(Identity {
            uid,
            email: None,
            anonymous: true,
        }))
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, AuthError> {
        let uid = match self.accounts.get(email) {
            Some(entry) if entry.value().0 == password => entry.value().1.clone(),
            _ => return Err(AuthError::InvalidCredentials),
        };
        Ok(self.publish(Identity {
            uid,
            email: Some(email.to_string()),
            anonymous: false,
        }))
    }

    async fn create_account(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }
        let uid = self.new_uid("user-");
        match self.accounts.entry(email.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => return Err(AuthError::EmailInUse),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert((password.to_string(), uid.clone()));
            }
        }
        Ok(self.publish(Identity {
            uid,
            email: Some(email.to_string()),
            anonymous: false,
        }))
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.changes.send_replace(None);
        Ok(())
    }

    fn identity_changes(&self) -> watch::Receiver<Option<Identity>> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_code_mapping() {
        assert!(matches!(
            AuthError::from_provider_code("INVALID_LOGIN_CREDENTIALS"),
            AuthError::InvalidCredentials
        ));
        assert!(matches!(
            AuthError::from_provider_code("EMAIL_EXISTS"),
            AuthError::EmailInUse
        ));
        assert!(matches!(
            AuthError::from_provider_code("WEAK_PASSWORD : Password should be at least 6 characters"),
            AuthError::WeakPassword
        ));
        assert!(matches!(
            AuthError::from_provider_code("OPERATION_NOT_ALLOWED"),
            AuthError::Provider(_)
        ));
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(
            AuthError::InvalidCredentials.user_message(Locale::En),
            "Invalid email or password."
        );
        assert_eq!(
            AuthError::Provider("OPERATION_NOT_ALLOWED".to_string()).user_message(Locale::En),
            "OPERATION_NOT_ALLOWED"
        );
    }

    #[tokio::test]
    async fn test_memory_provider_accounts() {
        let provider = MemoryIdentityProvider::new();
        let mut changes = provider.identity_changes();

        assert!(matches!(
            provider.create_account("a@example.com", "123").await,
            Err(AuthError::WeakPassword)
        ));

        let created = provider
            .create_account("a@example.com", "secret1")
            .await
            .unwrap();
        assert!(changes.has_changed().unwrap());
        assert_eq!(changes.borrow_and_update().clone(), Some(created.clone()));

        assert!(matches!(
            provider.create_account("a@example.com", "secret2").await,
            Err(AuthError::EmailInUse)
        ));
        assert!(matches!(
            provider.sign_in_with_password("a@example.com", "wrong").await,
            Err(AuthError::InvalidCredentials)
        ));

        let again = provider
            .sign_in_with_password("a@example.com", "secret1")
            .await
            .unwrap();
        assert_eq!(again.uid, created.uid);

        provider.sign_out().await.unwrap();
        assert_eq!(provider.current(), None);
    }

    #[test]
    fn test_expiry_parsing() {
        let soon = expiry("3600");
        let later = Utc::now() + Duration::seconds(3500);
        assert!(soon > later);
        assert!(expiry("garbage") > later);
    }
}
