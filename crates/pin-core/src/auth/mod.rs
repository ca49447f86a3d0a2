//! Authentication module for managing the signed-in user.
//!
//! This module provides:
//! - `IdentityProvider`: the seam to a hosted identity service
//! - `NhostClient`: the Nhost implementation of that seam
//! - `AuthFacade`: app-facing auth state with a locally persisted user snapshot
//!
//! Provider errors are returned inline in response payloads, never raised.

pub mod facade;
pub mod nhost;
pub mod provider;
pub mod types;

pub use facade::{AuthFacade, AUTH_DATA_KEY};
pub use nhost::NhostClient;
pub use provider::IdentityProvider;
pub use types::{
    AuthChangeEvent, AuthErrorPayload, AuthResponse, AuthSession, SignOutResponse, SignUpOptions,
};
