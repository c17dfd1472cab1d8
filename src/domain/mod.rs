//! Domain layer types and invariants.

pub mod entities;
pub mod error;
pub mod forum;
pub mod trending;
pub mod types;
pub mod views;
