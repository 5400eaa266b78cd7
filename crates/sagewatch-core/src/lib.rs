//! # Sagewatch Core
//!
//! Core domain logic for monitoring live SageMaker compute and its cost.
//!
//! This crate contains pure business logic with no I/O dependencies:
//! - Resource records and the raw API shapes they are mapped from
//! - Price tables and the lookup seam used by the cost engine
//! - Cost projection (hourly, elapsed, monthly, storage)
//! - Error definitions
//!
//! Monetary values are never rounded here; rounding is a display concern.

pub mod cost;
pub mod errors;
pub mod models;
pub mod pricing;

// Re-export commonly used types
pub use cost::{
    calculate_canvas_cost, calculate_cost, calculate_endpoint_cost, calculate_notebook_cost,
    calculate_studio_cost, CostFigure, CostSummary, HOURS_PER_MONTH,
};
pub use errors::{CoreError, Result};
pub use models::{
    ApiAppDetails, ApiEndpointSummary, ApiNotebookInstanceSummary, ResourceKind, ResourceRecord,
    IN_SERVICE, UNKNOWN_INSTANCE_TYPE,
};
pub use pricing::{PriceCategory, PriceLookup, PriceTable, StoragePrices};
