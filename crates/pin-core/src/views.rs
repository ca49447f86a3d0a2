//! Read-only projections of auth state for display.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::auth::AuthFacade;
use crate::models::AuthUser;

const UNEXPECTED_ERROR: &str = "An unexpected error occurred";

/// Display-friendly view of the cached user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub id: String,
    pub email: String,
    pub name: String,
    pub avatar: Option<String>,
    pub last_login: Option<String>,
    pub metadata: Map<String, Value>,
}

impl UserData {
    pub fn from_user(user: &AuthUser) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.display_name.clone(),
            avatar: user.avatar_url().map(str::to_string),
            last_login: user
                .metadata
                .get(crate::models::user::LAST_LOGIN_KEY)
                .and_then(Value::as_str)
                .map(str::to_string),
            metadata: user.metadata.clone(),
        }
    }
}

pub fn user_data(auth: &AuthFacade) -> Option<UserData> {
    auth.user().as_ref().map(UserData::from_user)
}

/// True when a user snapshot is cached, regardless of the live session.
pub fn is_logged_in(auth: &AuthFacade) -> bool {
    auth.user().is_some()
}

/// Transient error and loading flags for an auth form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthErrorState {
    pub error: String,
    pub is_loading: bool,
}

impl AuthErrorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle_error(&mut self, e: &dyn std::error::Error) {
        let message = e.to_string();
        self.error = if message.is_empty() {
            UNEXPECTED_ERROR.to_string()
        } else {
            message
        };
    }

    pub fn clear_error(&mut self) {
        self.error.clear();
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.is_loading = loading;
    }

    pub fn has_error(&self) -> bool {
        !self.error.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthChangeEvent, AuthErrorPayload, AuthSession, NhostClient};
    use crate::storage::MemoryStorage;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_user_data_projection() {
        let mut user = AuthUser::new("u1", "ada@example.com");
        user.display_name = "Ada".to_string();
        user.metadata
            .insert("avatar_url".to_string(), json!("https://example.com/a.png"));
        let user = user.with_last_login(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap());

        let data = UserData::from_user(&user);
        assert_eq!(data.name, "Ada");
        assert_eq!(data.avatar.as_deref(), Some("https://example.com/a.png"));
        assert_eq!(data.last_login.as_deref(), Some("2024-01-02T03:04:05.000Z"));
        assert_eq!(data.metadata.len(), 2);
    }

    #[test]
    fn test_user_data_without_avatar() {
        let data = UserData::from_user(&AuthUser::new("u1", "ada@example.com"));
        assert_eq!(data.avatar, None);
        assert_eq!(data.last_login, None);
    }

    #[test]
    fn test_accessors_follow_facade_snapshot() {
        let provider = Arc::new(NhostClient::new("sub", "local").unwrap());
        let auth = AuthFacade::new(provider, Arc::new(MemoryStorage::new()));
        assert!(!is_logged_in(&auth));
        assert_eq!(user_data(&auth), None);

        auth.handle_auth_event(&AuthChangeEvent::SignedIn(AuthSession {
            access_token: "token".to_string(),
            access_token_expires_in: 900,
            refresh_token: None,
            user: AuthUser::new("u1", "ada@example.com"),
        }));

        assert!(is_logged_in(&auth));
        let data = user_data(&auth).unwrap();
        assert_eq!(data.email, "ada@example.com");
        assert!(data.last_login.is_some());
    }

    #[test]
    fn test_error_state_flow() {
        let mut state = AuthErrorState::new();
        state.set_loading(true);
        state.handle_error(&AuthErrorPayload::new(
            401,
            "invalid-email-password",
            "Incorrect email or password",
        ));

        assert!(state.is_loading);
        assert_eq!(state.error, "Incorrect email or password");

        state.clear_error();
        state.set_loading(false);
        assert!(!state.has_error());
        assert!(!state.is_loading);
    }

    #[test]
    fn test_empty_error_message_falls_back() {
        let mut state = AuthErrorState::new();
        state.handle_error(&AuthErrorPayload::new(500, "unknown", ""));
        assert_eq!(state.error, "An unexpected error occurred");
    }
}
