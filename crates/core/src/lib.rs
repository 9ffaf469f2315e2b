//! Swatchbook Core - Shared types library.
//!
//! This crate provides common types used across all Swatchbook components:
//! - `swatchbook` - Content resolution, material reconciliation and accounts
//! - `cli` - Command-line tools wired against the library
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no storage.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for document IDs, normalized emails and account tiers

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
