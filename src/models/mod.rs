//! Data models

pub mod transaction;
pub mod prediction;

pub use transaction::*;
pub use prediction::*;
