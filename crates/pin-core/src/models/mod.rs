//! Data models shared by the auth facade and the option cache.
//!
//! - `AuthUser`: the identity provider's user record, mirrored locally
//! - `AttributeOption`, `OptionValue`: reference data kept offline

pub mod options;
pub mod user;

pub use options::{AttributeOption, OptionValue};
pub use user::AuthUser;
