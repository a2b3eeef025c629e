//! Domain models for the Stock & Batch Management Platform

mod alert;
mod allocation;
mod batch;
mod movement;
mod product;

pub use alert::*;
pub use allocation::*;
pub use batch::*;
pub use movement::*;
pub use product::*;
