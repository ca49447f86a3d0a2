//! Identity provider client for Nhost's hosted auth service.
//!
//! Talks to the auth REST API at `https://{subdomain}.auth.{region}.nhost.run/v1`
//! and keeps the current session in memory (and in local storage when one is
//! attached) so `is_authenticated` survives restarts until the access token
//! expires.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::provider::IdentityProvider;
use super::types::{
    AuthChangeEvent, AuthErrorPayload, AuthResponse, AuthSession, SignOutResponse, SignUpOptions,
};
use crate::storage::KeyValueStorage;

// ============================================================================
// Constants
// ============================================================================

/// Local storage key for the provider's own session.
pub const SESSION_KEY: &str = "nhostSession";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Buffered session events per subscriber.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredSession {
    session: AuthSession,
    expires_at: DateTime<Utc>,
}

impl StoredSession {
    fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct SessionBody {
    session: Option<AuthSession>,
}

pub struct NhostClient {
    client: Client,
    base_url: String,
    storage: Option<Arc<dyn KeyValueStorage>>,
    session: RwLock<Option<StoredSession>>,
    events: broadcast::Sender<AuthChangeEvent>,
}

impl NhostClient {
    pub fn new(subdomain: &str, region: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            client,
            base_url: Self::auth_url(subdomain, region),
            storage: None,
            session: RwLock::new(None),
            events,
        })
    }

    pub fn auth_url(subdomain: &str, region: &str) -> String {
        format!("https://{}.auth.{}.nhost.run/v1", subdomain, region)
    }

    /// Point the client at a different auth endpoint (self-hosted or local).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Persist the session in `storage` and restore any session saved there.
    pub fn with_storage(mut self, storage: Arc<dyn KeyValueStorage>) -> Self {
        let restored = Self::restore_session(storage.as_ref());
        *self.session.get_mut().unwrap_or_else(PoisonError::into_inner) = restored;
        self.storage = Some(storage);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Bearer token of the current session, if it has not expired.
    pub fn access_token(&self) -> Option<String> {
        let session = self.session.read().unwrap_or_else(PoisonError::into_inner);
        session
            .as_ref()
            .filter(|s| !s.is_expired())
            .map(|s| s.session.access_token.clone())
    }

    fn restore_session(storage: &dyn KeyValueStorage) -> Option<StoredSession> {
        let raw = match storage.get_item(SESSION_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read stored session");
                return None;
            }
        };

        match serde_json::from_str::<StoredSession>(&raw) {
            Ok(stored) => {
                debug!(expired = stored.is_expired(), "Restored stored session");
                Some(stored)
            }
            Err(e) => {
                warn!(error = %e, "Ignoring malformed stored session");
                None
            }
        }
    }

    fn set_session(&self, session: AuthSession) {
        let stored = StoredSession {
            expires_at: session.expires_at(Utc::now()),
            session,
        };

        if let Some(ref storage) = self.storage {
            let saved = serde_json::to_string(&stored)
                .map_err(anyhow::Error::from)
                .and_then(|raw| storage.set_item(SESSION_KEY, &raw).map_err(Into::into));
            if let Err(e) = saved {
                warn!(error = %e, "Failed to persist session");
            }
        }

        let event = AuthChangeEvent::SignedIn(stored.session.clone());
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(stored);
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn clear_session(&self) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = None;

        if let Some(ref storage) = self.storage {
            if let Err(e) = storage.remove_item(SESSION_KEY) {
                warn!(error = %e, "Failed to remove stored session");
            }
        }

        let _ = self.events.send(AuthChangeEvent::SignedOut);
    }

    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    async fn error_payload(response: reqwest::Response) -> AuthErrorPayload {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        serde_json::from_str::<AuthErrorPayload>(&body).unwrap_or_else(|_| {
            AuthErrorPayload::new(
                status.as_u16(),
                status.canonical_reason().unwrap_or("unknown-error"),
                Self::truncate_body(&body),
            )
        })
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        bearer: Option<&str>,
    ) -> Result<reqwest::Response, AuthErrorPayload> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.post(&url).json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AuthErrorPayload::network(e.to_string()))?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::error_payload(response).await)
        }
    }

    async fn session_response(&self, path: &str, body: serde_json::Value) -> AuthResponse {
        let response = match self.post(path, &body, None).await {
            Ok(response) => response,
            Err(error) => {
                warn!(path = path, status = error.status, error = %error.error, "Auth request failed");
                return AuthResponse::failure(error);
            }
        };

        let status = response.status().as_u16();
        match response.json::<SessionBody>().await {
            Ok(SessionBody {
                session: Some(session),
            }) => {
                info!(user_id = %session.user.id, "Signed in");
                self.set_session(session.clone());
                AuthResponse::success(Some(session))
            }
            Ok(SessionBody { session: None }) => {
                debug!(path = path, "Auth request succeeded without a session");
                AuthResponse::success(None)
            }
            Err(e) => AuthResponse::failure(AuthErrorPayload::new(
                status,
                "invalid-response",
                e.to_string(),
            )),
        }
    }
}

#[async_trait]
impl IdentityProvider for NhostClient {
    async fn sign_in(&self, email: &str, password: &str) -> AuthResponse {
        let body = json!({ "email": email, "password": password });
        self.session_response("/signin/email-password", body).await
    }

    async fn sign_up(&self, email: &str, password: &str, options: SignUpOptions) -> AuthResponse {
        let body = json!({ "email": email, "password": password, "options": options });
        self.session_response("/signup/email-password", body).await
    }

    async fn sign_out(&self) -> SignOutResponse {
        let current = self
            .session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut error = None;
        if let Some(stored) = current {
            if let Some(ref refresh_token) = stored.session.refresh_token {
                let body = json!({ "refreshToken": refresh_token });
                let bearer = Some(stored.session.access_token.as_str());
                if let Err(e) = self.post("/signout", &body, bearer).await {
                    warn!(status = e.status, error = %e.error, "Sign-out request failed");
                    error = Some(e);
                }
            }
        }

        // The local session goes away even when the server call fails
        self.clear_session();
        info!("Signed out");
        SignOutResponse { error }
    }

    fn is_authenticated(&self) -> bool {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| !s.is_expired())
            .unwrap_or(false)
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChangeEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuthUser;
    use crate::storage::MemoryStorage;
    use chrono::Duration as ChronoDuration;

    fn session(expires_in: i64) -> AuthSession {
        AuthSession {
            access_token: "access".to_string(),
            access_token_expires_in: expires_in,
            refresh_token: Some("refresh".to_string()),
            user: AuthUser::new("u1", "ada@example.com"),
        }
    }

    fn storage_with(stored: &StoredSession) -> Arc<MemoryStorage> {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set_item(SESSION_KEY, &serde_json::to_string(stored).unwrap())
            .unwrap();
        storage
    }

    #[test]
    fn test_auth_url() {
        assert_eq!(
            NhostClient::auth_url("mpukoxooxvgkvcueukvt", "eu-central-1"),
            "https://mpukoxooxvgkvcueukvt.auth.eu-central-1.nhost.run/v1"
        );
    }

    #[test]
    fn test_with_base_url_trims_trailing_slash() {
        let client = NhostClient::new("sub", "local")
            .unwrap()
            .with_base_url("http://localhost:1337/v1/");
        assert_eq!(client.base_url(), "http://localhost:1337/v1");
    }

    #[test]
    fn test_restores_live_session_from_storage() {
        let stored = StoredSession {
            session: session(900),
            expires_at: Utc::now() + ChronoDuration::minutes(15),
        };
        let client = NhostClient::new("sub", "local")
            .unwrap()
            .with_storage(storage_with(&stored));

        assert!(client.is_authenticated());
        assert_eq!(client.access_token().as_deref(), Some("access"));
    }

    #[test]
    fn test_expired_session_is_not_authenticated() {
        let stored = StoredSession {
            session: session(900),
            expires_at: Utc::now() - ChronoDuration::minutes(1),
        };
        let client = NhostClient::new("sub", "local")
            .unwrap()
            .with_storage(storage_with(&stored));

        assert!(!client.is_authenticated());
        assert_eq!(client.access_token(), None);
    }

    #[test]
    fn test_malformed_stored_session_is_ignored() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_item(SESSION_KEY, "{not json").unwrap();

        let client = NhostClient::new("sub", "local").unwrap().with_storage(storage);
        assert!(!client.is_authenticated());
    }

    #[test]
    fn test_session_body_parses_provider_shape() {
        let raw = r#"{
            "session": {
                "accessToken": "jwt",
                "accessTokenExpiresIn": 900,
                "refreshToken": "r1",
                "user": {
                    "id": "u1",
                    "email": "ada@example.com",
                    "displayName": "Ada",
                    "metadata": {},
                    "avatarUrl": ""
                }
            },
            "mfa": null
        }"#;

        let body: SessionBody = serde_json::from_str(raw).unwrap();
        let session = body.session.unwrap();
        assert_eq!(session.access_token_expires_in, 900);
        assert_eq!(session.user.display_name, "Ada");
    }

    #[test]
    fn test_session_body_accepts_null_metadata() {
        let raw = r#"{
            "session": {
                "accessToken": "jwt",
                "accessTokenExpiresIn": 900,
                "refreshToken": "r1",
                "user": { "id": "u1", "email": "ada@example.com", "metadata": null }
            }
        }"#;

        let body: SessionBody = serde_json::from_str(raw).unwrap();
        assert!(body.session.unwrap().user.metadata.is_empty());
    }

    #[test]
    fn test_out_of_range_lifetime_does_not_panic() {
        let client = NhostClient::new("sub", "local").unwrap();
        let mut rx = client.subscribe();

        client.set_session(session(i64::MAX / 10));

        assert!(client.is_authenticated());
        assert!(matches!(rx.try_recv(), Ok(AuthChangeEvent::SignedIn(_))));
    }

    #[test]
    fn test_set_session_persists_and_publishes() {
        let storage = Arc::new(MemoryStorage::new());
        let client = NhostClient::new("sub", "local")
            .unwrap()
            .with_storage(storage.clone());
        let mut rx = client.subscribe();

        client.set_session(session(900));

        assert!(client.is_authenticated());
        assert!(storage.get_item(SESSION_KEY).unwrap().is_some());
        assert!(matches!(rx.try_recv(), Ok(AuthChangeEvent::SignedIn(_))));
    }

    #[tokio::test]
    async fn test_sign_out_without_session_still_publishes() {
        let client = NhostClient::new("sub", "local").unwrap();
        let mut rx = client.subscribe();

        let response = client.sign_out().await;

        assert_eq!(response.error, None);
        assert!(matches!(rx.try_recv(), Ok(AuthChangeEvent::SignedOut)));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_reported_inline() {
        let client = NhostClient::new("sub", "local")
            .unwrap()
            .with_base_url("http://127.0.0.1:9");
        let mut rx = client.subscribe();

        let response = client.sign_in("ada@example.com", "secret").await;

        assert!(response.session.is_none());
        let error = response.error.unwrap();
        assert_eq!(error.status, 0);
        assert_eq!(error.error, "network-error");
        assert!(!client.is_authenticated());
        assert!(rx.try_recv().is_err());
    }
}
