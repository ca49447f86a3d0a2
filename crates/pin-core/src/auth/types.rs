use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::models::AuthUser;

/// Session issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub access_token: String,
    /// Lifetime of `access_token` in seconds.
    pub access_token_expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: AuthUser,
}

impl AuthSession {
    /// Expiry of `access_token` when issued at `issued_at`.
    ///
    /// Lifetimes outside chrono's range saturate: too long never expires,
    /// too negative is already expired.
    pub fn expires_at(&self, issued_at: DateTime<Utc>) -> DateTime<Utc> {
        let secs = self.access_token_expires_in;
        match TimeDelta::try_seconds(secs).and_then(|d| issued_at.checked_add_signed(d)) {
            Some(expiry) => expiry,
            None => {
                warn!(expires_in = secs, "Access token lifetime out of range");
                if secs > 0 {
                    DateTime::<Utc>::MAX_UTC
                } else {
                    issued_at
                }
            }
        }
    }
}

/// Error payload returned inline by the identity provider.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct AuthErrorPayload {
    pub status: u16,
    pub error: String,
    pub message: String,
}

impl AuthErrorPayload {
    pub fn new(status: u16, error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            message: message.into(),
        }
    }

    /// Transport-level failure; no HTTP status was received.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(0, "network-error", message)
    }
}

/// Result of sign-in and sign-up: a session, an error, or neither
/// (sign-up awaiting email verification).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub session: Option<AuthSession>,
    pub error: Option<AuthErrorPayload>,
}

impl AuthResponse {
    pub fn success(session: Option<AuthSession>) -> Self {
        Self {
            session,
            error: None,
        }
    }

    pub fn failure(error: AuthErrorPayload) -> Self {
        Self {
            session: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignOutResponse {
    pub error: Option<AuthErrorPayload>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

/// Session change published by the identity provider.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthChangeEvent {
    SignedIn(AuthSession),
    SignedOut,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn session(expires_in: i64) -> AuthSession {
        AuthSession {
            access_token: "token".to_string(),
            access_token_expires_in: expires_in,
            refresh_token: None,
            user: AuthUser::new("u1", "ada@example.com"),
        }
    }

    #[test]
    fn test_expires_at_adds_lifetime() {
        let issued = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            session(900).expires_at(issued),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 15, 0).unwrap()
        );
    }

    #[test]
    fn test_huge_lifetime_saturates_instead_of_panicking() {
        let issued = Utc::now();
        assert_eq!(
            session(i64::MAX / 10).expires_at(issued),
            DateTime::<Utc>::MAX_UTC
        );
        assert_eq!(session(i64::MAX).expires_at(issued), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_huge_negative_lifetime_is_already_expired() {
        let issued = Utc::now();
        assert_eq!(session(i64::MIN).expires_at(issued), issued);
    }

    #[test]
    fn test_error_payload_displays_message() {
        let error = AuthErrorPayload::new(
            401,
            "invalid-email-password",
            "Incorrect email or password",
        );
        assert_eq!(error.to_string(), "Incorrect email or password");
        assert_eq!(AuthErrorPayload::network("refused").error, "network-error");
    }
}
