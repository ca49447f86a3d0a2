//! Local option database for offline access to reference data.
//!
//! This module provides `OptionsDb`, a SQLite-backed store with two fixed
//! tables:
//! - `attributes`: attribute categories keyed by `value`
//! - `options`: attribute values keyed by an auto-assigned `id`
//!
//! Each save replaces the whole table in one transaction.

pub mod db;

pub use db::{DbStatus, OptionsDb, DB_NAME, DB_VERSION};
