//! Swatchbook catalog library.
//!
//! Content resolution, material reconciliation and account identity for a
//! product catalog backed by a remote content service, with a local fallback
//! store when the service is unreachable or unconfigured.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod content;
pub mod db;
pub mod materials;
pub mod media;
pub mod models;
pub mod rate_limit;
pub mod services;
pub mod state;
pub mod store;

pub use state::Swatchbook;
