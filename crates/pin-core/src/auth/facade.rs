use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::provider::IdentityProvider;
use super::types::{AuthChangeEvent, AuthResponse, SignOutResponse, SignUpOptions};
use crate::models::AuthUser;
use crate::storage::KeyValueStorage;

/// Local storage key holding the user snapshot.
pub const AUTH_DATA_KEY: &str = "auth_data";

/// Authentication state for the app.
///
/// Wraps an `IdentityProvider` and mirrors the signed-in user into local
/// storage. `is_authenticated` asks the provider every time, while `user`
/// reads the local snapshot; the two can disagree (e.g. after the access
/// token expires) and are left that way.
///
/// The snapshot is written only by `handle_auth_event` and `init_auth_data`.
pub struct AuthFacade {
    provider: Arc<dyn IdentityProvider>,
    storage: Arc<dyn KeyValueStorage>,
    user: RwLock<Option<AuthUser>>,
}

impl AuthFacade {
    pub fn new(provider: Arc<dyn IdentityProvider>, storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            provider,
            storage,
            user: RwLock::new(None),
        }
    }

    /// Load the snapshot persisted by a previous run.
    ///
    /// An unreadable or malformed snapshot is logged and treated as signed out.
    pub fn init_auth_data(&self) {
        let stored = match self.storage.get_item(AUTH_DATA_KEY) {
            Ok(stored) => stored,
            Err(e) => {
                error!(error = %e, "Failed to read stored auth data");
                None
            }
        };

        let user = stored.and_then(|raw| match serde_json::from_str::<AuthUser>(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                error!(error = %e, "Failed to parse stored auth data");
                None
            }
        });

        debug!(has_user = user.is_some(), "Auth data initialized");
        self.set_user(user);
    }

    pub fn is_authenticated(&self) -> bool {
        self.provider.is_authenticated()
    }

    pub fn user(&self) -> Option<AuthUser> {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Last cached snapshot; may be stale relative to the provider.
    pub fn get_auth_data(&self) -> Option<AuthUser> {
        self.user()
    }

    pub fn provider(&self) -> &Arc<dyn IdentityProvider> {
        &self.provider
    }

    fn set_user(&self, user: Option<AuthUser>) {
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = user;
    }

    /// Apply a session change from the provider.
    pub fn handle_auth_event(&self, event: &AuthChangeEvent) {
        match event {
            AuthChangeEvent::SignedIn(session) => {
                let user = session.user.clone().with_last_login(Utc::now());

                match serde_json::to_string(&user) {
                    Ok(raw) => {
                        if let Err(e) = self.storage.set_item(AUTH_DATA_KEY, &raw) {
                            error!(error = %e, "Failed to persist auth data");
                        }
                    }
                    Err(e) => error!(error = %e, "Failed to serialize auth data"),
                }

                info!(user_id = %user.id, "Auth snapshot updated");
                self.set_user(Some(user));
            }
            AuthChangeEvent::SignedOut => {
                self.set_user(None);
                if let Err(e) = self.storage.remove_item(AUTH_DATA_KEY) {
                    error!(error = %e, "Failed to remove auth data");
                }
                info!("Auth snapshot cleared");
            }
        }
    }

    /// Apply every event from `events` until the provider goes away.
    pub async fn listen(self: Arc<Self>, mut events: broadcast::Receiver<AuthChangeEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => self.handle_auth_event(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped = skipped, "Auth listener fell behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        debug!("Auth listener stopped");
    }

    /// Apply events already delivered, without waiting for more.
    pub fn drain_events(&self, events: &mut broadcast::Receiver<AuthChangeEvent>) {
        loop {
            match events.try_recv() {
                Ok(event) => self.handle_auth_event(&event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped = skipped, "Auth listener fell behind");
                }
                Err(_) => break,
            }
        }
    }

    pub async fn sign_in_with_email(&self, email: &str, password: &str) -> AuthResponse {
        self.provider.sign_in(email, password).await
    }

    pub async fn sign_up_with_email(
        &self,
        email: &str,
        password: &str,
        options: SignUpOptions,
    ) -> AuthResponse {
        self.provider.sign_up(email, password, options).await
    }

    pub async fn sign_out(&self) -> SignOutResponse {
        self.provider.sign_out().await
    }
}
