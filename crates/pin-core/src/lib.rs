//! Core library for pin.
//!
//! - `auth`: identity provider seam, Nhost client and the auth facade
//! - `cache`: SQLite option database for offline reference data
//! - `routing`: auth-aware navigation rules
//! - `views`: display projections of auth state
//! - `storage`: local key-value storage for small records
//! - `config`: application configuration

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod routing;
pub mod storage;
pub mod views;

pub use auth::{AuthFacade, IdentityProvider, NhostClient};
pub use cache::OptionsDb;
pub use config::Config;
pub use error::{CacheError, StorageError};
pub use routing::{RouteDecision, RouteGuard};
