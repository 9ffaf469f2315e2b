//! Repositories over the persistence facade.

pub mod accounts;
