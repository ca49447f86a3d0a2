use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Metadata key stamped on every sign-in.
pub const LAST_LOGIN_KEY: &str = "lastLogin";

/// Metadata key holding the user's avatar.
pub const AVATAR_URL_KEY: &str = "avatar_url";

/// User record as returned by the identity provider.
///
/// Only the fields the app reads are typed; everything else the provider
/// sends is kept in `extra` so the stored snapshot round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, deserialize_with = "null_as_empty_map")]
    #[cfg_attr(feature = "ts", ts(type = "Record<string, unknown>"))]
    pub metadata: Map<String, Value>,
    #[serde(flatten)]
    #[cfg_attr(feature = "ts", ts(skip))]
    pub extra: Map<String, Value>,
}

/// The provider sends `"metadata": null` for users without metadata.
fn null_as_empty_map<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Map<String, Value>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl AuthUser {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            display_name: String::new(),
            metadata: Map::new(),
            extra: Map::new(),
        }
    }

    /// Copy of this user with `metadata.lastLogin` set to `at`.
    pub fn with_last_login(mut self, at: DateTime<Utc>) -> Self {
        self.metadata.insert(
            LAST_LOGIN_KEY.to_string(),
            Value::String(at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        self
    }

    pub fn last_login(&self) -> Option<DateTime<Utc>> {
        self.metadata
            .get(LAST_LOGIN_KEY)
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn avatar_url(&self) -> Option<&str> {
        self.metadata.get(AVATAR_URL_KEY).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_deserialize_provider_user_keeps_unknown_fields() {
        let raw = json!({
            "id": "u1",
            "email": "ada@example.com",
            "displayName": "Ada",
            "metadata": { "avatar_url": "https://example.com/a.png" },
            "locale": "en",
            "emailVerified": true
        });

        let user: AuthUser = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(user.display_name, "Ada");
        assert_eq!(user.avatar_url(), Some("https://example.com/a.png"));
        assert_eq!(user.extra.get("locale"), Some(&json!("en")));

        let back = serde_json::to_value(&user).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let user: AuthUser = serde_json::from_value(json!({ "id": "u1" })).unwrap();
        assert_eq!(user.email, "");
        assert!(user.metadata.is_empty());
        assert!(user.last_login().is_none());
    }

    #[test]
    fn test_null_metadata_becomes_empty() {
        let user: AuthUser =
            serde_json::from_value(json!({ "id": "u1", "metadata": null })).unwrap();
        assert!(user.metadata.is_empty());
        assert!(user.extra.is_empty());

        let user = user.with_last_login(Utc::now());
        assert!(user.last_login().is_some());
    }

    #[test]
    fn test_with_last_login_stamps_iso_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let user = AuthUser::new("u1", "ada@example.com").with_last_login(at);

        assert_eq!(
            user.metadata.get(LAST_LOGIN_KEY),
            Some(&json!("2024-03-01T12:30:00.000Z"))
        );
        assert_eq!(user.last_login(), Some(at));
    }

    #[test]
    fn test_with_last_login_keeps_existing_metadata() {
        let mut user = AuthUser::new("u1", "ada@example.com");
        user.metadata.insert("plan".to_string(), json!("pro"));

        let user = user.with_last_login(Utc::now());
        assert_eq!(user.metadata.get("plan"), Some(&json!("pro")));
        assert!(user.last_login().is_some());
    }
}
