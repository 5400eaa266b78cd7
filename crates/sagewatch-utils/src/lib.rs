//! # Sagewatch Utils
//!
//! Infrastructure helpers shared by the API adapters and the CLI:
//! human-readable formatting, platform error-type parsing and warning
//! de-duplication.

pub mod dedup;
pub mod errors;
pub mod formatters;
pub mod parsers;

// Re-export common types for convenience
pub use dedup::*;
pub use errors::*;
pub use formatters::*;
pub use parsers::*;
