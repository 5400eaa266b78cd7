pub mod monitor;

pub use monitor::{handle_monitor, MonitorArgs};
