//! Domain layer types and invariants.

pub mod certificates;
pub mod codes;
pub mod entities;
pub mod error;
pub mod types;
