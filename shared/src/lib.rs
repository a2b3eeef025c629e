//! Shared types and models for the Stock & Batch Management Platform
//!
//! This crate contains the domain model and the pure derivation logic
//! (batch status machine, allocation selection, alert rules) shared between
//! the backend services and any external callers of the core.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
