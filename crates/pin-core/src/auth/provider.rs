use async_trait::async_trait;
use tokio::sync::broadcast;

use super::types::{AuthChangeEvent, AuthResponse, SignOutResponse, SignUpOptions};

/// Client of a hosted identity provider.
///
/// Operations never fail with a Rust error: provider and transport failures
/// come back in the payload's `error` field. Successful sign-in and sign-out
/// are also published to `subscribe` receivers.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> AuthResponse;

    async fn sign_up(&self, email: &str, password: &str, options: SignUpOptions) -> AuthResponse;

    async fn sign_out(&self) -> SignOutResponse;

    /// Live check against the provider's current session.
    fn is_authenticated(&self) -> bool;

    fn subscribe(&self) -> broadcast::Receiver<AuthChangeEvent>;
}
