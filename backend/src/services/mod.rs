//! Business logic services for the Stock & Batch Management Platform

pub mod alert;
pub mod batch;
pub mod movement;
pub mod product;
mod sequence;

pub use alert::AlertService;
pub use batch::BatchService;
pub use movement::MovementService;
pub use product::ProductService;
