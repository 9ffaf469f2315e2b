//! Business logic services.

pub mod accounts;
