//! Stock & Batch Management Platform - core services
//!
//! Batch-aware stock tracking for perishable and serialized goods: an
//! append-only movement ledger, a batch status state machine, FIFO-by-expiry
//! allocation, and deduplicated alerting. The HTTP/CLI transport in front of
//! this crate constructs the services with its own connection pool and maps
//! `AppError::code()` to its own status codes.

pub mod config;
pub mod error;
pub mod services;

pub use config::Config;
pub use error::{AppError, AppResult};
