pub mod cli;
pub mod commands;
pub mod config;
pub mod display;
pub mod errors;
pub mod report;

// Re-export main public types
pub use config::Config;
pub use errors::{ConfigError, Result, SageWatchError};
pub use report::{Report, ReportRow};
