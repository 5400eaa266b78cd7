//! # Sagewatch API
//!
//! Resource aggregation for SageMaker: the HTTP adapters that list live
//! resources, the failure classifier, the bounded retry loop and the
//! concurrent aggregator that combines the three resource kinds.

pub mod aggregate;
pub mod classify;
pub mod client;
pub mod errors;
pub mod provider;
pub mod providers;
pub mod retry;
pub mod signing;

// Re-export common types for convenience
pub use aggregate::*;
pub use classify::*;
pub use client::*;
pub use errors::*;
pub use provider::*;
pub use providers::*;
pub use retry::*;
pub use signing::Credentials;

// Re-export core types that API consumers will need
pub use sagewatch_core::{ResourceKind, ResourceRecord};
