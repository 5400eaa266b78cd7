use crate::errors::Result;
use async_trait::async_trait;
use sagewatch_core::{ResourceKind, ResourceRecord};

/// A source of live resources of a single kind.
///
/// Implementations return only billable (in-service) records and leave
/// retries to the caller; every failure is surfaced as-is so it can be
/// classified.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// The kind of resource this provider lists.
    fn kind(&self) -> ResourceKind;

    /// List the live resources of this provider's kind.
    async fn list(&self) -> Result<Vec<ResourceRecord>>;
}
