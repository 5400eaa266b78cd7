use chrono::Duration;

/// Decimal places money is shown with.
pub const COST_DECIMALS: i32 = 4;

/// Trait for formatting different types of data
pub trait Formatter<T> {
    fn format(&self, input: T) -> String;
}

/// Running-time formatter, e.g. `2h30m`.
pub struct RunningTimeFormatter;

impl Formatter<Duration> for RunningTimeFormatter {
    /// Round to the nearest minute and render as hours and minutes
    fn format(&self, running_time: Duration) -> String {
        let seconds = running_time.num_seconds().max(0);
        let minutes = (seconds + 30) / 60;
        format!("{}h{}m", minutes / 60, minutes % 60)
    }
}

/// Money formatter. Rounding happens here and nowhere earlier.
pub struct CostFormatter;

impl CostFormatter {
    /// Round a dollar amount to the display precision
    pub fn round(&self, amount: f64) -> f64 {
        let scale = 10f64.powi(COST_DECIMALS);
        (amount * scale).round() / scale
    }
}

impl Formatter<f64> for CostFormatter {
    fn format(&self, amount: f64) -> String {
        format!("${:.*}", COST_DECIMALS as usize, self.round(amount))
    }
}

// Convenience functions
pub fn format_running_time(running_time: Duration) -> String {
    RunningTimeFormatter.format(running_time)
}

pub fn format_cost(amount: f64) -> String {
    CostFormatter.format(amount)
}

pub fn round_cost(amount: f64) -> f64 {
    CostFormatter.round(amount)
}
