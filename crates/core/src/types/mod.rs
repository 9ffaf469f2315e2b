//! Core types for Swatchbook.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod tier;

pub use email::{Email, EmailError};
pub use id::*;
pub use tier::{Tier, TierError};
