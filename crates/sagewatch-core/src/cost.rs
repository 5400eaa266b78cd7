//! Cost projection for polled resources.
//!
//! Every calculator is a pure function of the record, a price source and the
//! evaluation instant. Nothing is rounded here.

use crate::models::{ResourceKind, ResourceRecord};
use crate::pricing::{PriceCategory, PriceLookup};
use chrono::{DateTime, Duration, Utc};

/// Average hours in a month (365 * 24 / 12).
pub const HOURS_PER_MONTH: f64 = 730.0;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Cost figures for one resource, evaluated at a single instant.
#[derive(Debug, Clone, PartialEq)]
pub struct CostFigure {
    pub running_time: Duration,
    pub hourly_rate: f64,
    pub current_cost: f64,
    pub projected_monthly_cost: f64,
    /// Attached storage in GB; notebooks only.
    pub storage_size_gb: Option<f64>,
    /// Monthly storage cost; notebooks only.
    pub storage_cost: Option<f64>,
}

impl CostFigure {
    fn from_rate(hourly_rate: f64, running_time: Duration) -> Self {
        Self {
            running_time,
            hourly_rate,
            current_cost: current_cost(hourly_rate, running_time),
            projected_monthly_cost: projected_monthly_cost(hourly_rate),
            storage_size_gb: None,
            storage_cost: None,
        }
    }
}

fn running_hours(running_time: Duration) -> f64 {
    running_time.num_milliseconds().max(0) as f64 / MILLIS_PER_HOUR
}

fn current_cost(hourly_rate: f64, running_time: Duration) -> f64 {
    hourly_rate * running_hours(running_time)
}

fn projected_monthly_cost(hourly_rate: f64) -> f64 {
    hourly_rate * HOURS_PER_MONTH
}

fn storage_cost(size_gb: f64, price_per_gb_month: f64) -> f64 {
    size_gb * price_per_gb_month
}

fn rate_or_zero<P>(prices: &P, category: PriceCategory, instance_type: &str) -> f64
where
    P: PriceLookup + ?Sized,
{
    prices.hourly_rate(category, instance_type).unwrap_or(0.0)
}

/// Endpoint cost: per-instance rate multiplied by the instance count.
pub fn calculate_endpoint_cost<P>(record: &ResourceRecord, prices: &P, now: DateTime<Utc>) -> CostFigure
where
    P: PriceLookup + ?Sized,
{
    let rate = rate_or_zero(prices, PriceCategory::Endpoint, &record.instance_type);
    let hourly_rate = rate * f64::from(record.instance_count.max(1));
    CostFigure::from_rate(hourly_rate, record.running_time(now))
}

/// Notebook cost: compute rate plus separately billed block storage.
pub fn calculate_notebook_cost<P>(record: &ResourceRecord, prices: &P, now: DateTime<Utc>) -> CostFigure
where
    P: PriceLookup + ?Sized,
{
    let hourly_rate = rate_or_zero(prices, PriceCategory::Notebook, &record.instance_type);
    let size_gb = f64::from(record.volume_size_gb.unwrap_or(0));

    let mut figure = CostFigure::from_rate(hourly_rate, record.running_time(now));
    figure.storage_size_gb = Some(size_gb);
    figure.storage_cost = Some(storage_cost(size_gb, prices.storage_rate()));
    figure
}

pub fn calculate_studio_cost<P>(record: &ResourceRecord, prices: &P, now: DateTime<Utc>) -> CostFigure
where
    P: PriceLookup + ?Sized,
{
    let hourly_rate = rate_or_zero(prices, PriceCategory::Studio, &record.instance_type);
    CostFigure::from_rate(hourly_rate, record.running_time(now))
}

pub fn calculate_canvas_cost<P>(record: &ResourceRecord, prices: &P, now: DateTime<Utc>) -> CostFigure
where
    P: PriceLookup + ?Sized,
{
    let hourly_rate = rate_or_zero(prices, PriceCategory::Canvas, &record.instance_type);
    CostFigure::from_rate(hourly_rate, record.running_time(now))
}

/// Pick the calculator matching the record's kind (and app flavour).
pub fn calculate_cost<P>(record: &ResourceRecord, prices: &P, now: DateTime<Utc>) -> CostFigure
where
    P: PriceLookup + ?Sized,
{
    match record.kind {
        ResourceKind::Endpoint => calculate_endpoint_cost(record, prices, now),
        ResourceKind::Notebook => calculate_notebook_cost(record, prices, now),
        ResourceKind::App => match record.price_category() {
            PriceCategory::Canvas => calculate_canvas_cost(record, prices, now),
            _ => calculate_studio_cost(record, prices, now),
        },
    }
}

/// Totals across a report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostSummary {
    pub hourly_rate: f64,
    pub current_cost: f64,
    pub projected_monthly_cost: f64,
    pub storage_cost: f64,
}

impl CostSummary {
    pub fn from_figures<'a, I>(figures: I) -> Self
    where
        I: IntoIterator<Item = &'a CostFigure>,
    {
        figures
            .into_iter()
            .fold(CostSummary::default(), |mut summary, figure| {
                summary.hourly_rate += figure.hourly_rate;
                summary.current_cost += figure.current_cost;
                summary.projected_monthly_cost += figure.projected_monthly_cost;
                summary.storage_cost += figure.storage_cost.unwrap_or(0.0);
                summary
            })
    }
}
