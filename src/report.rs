//! Cost report assembled from one aggregation run.
//!
//! All figures are computed against a single evaluation instant. Money stays
//! unrounded until it is rendered, either here for JSON or in the table view.

use chrono::{DateTime, Utc};
use sagewatch_core::{calculate_cost, CostFigure, CostSummary, PriceLookup, ResourceRecord};
use sagewatch_utils::{format_running_time, round_cost};
use serde::Serialize;
use serde_json::{json, Value};

pub const NO_RESOURCES_MESSAGE: &str = "No resources found";
pub const INCOMPLETE_MESSAGE: &str = "Resource listing incomplete";

/// One resource together with its cost figure.
#[derive(Debug, Clone)]
pub struct ReportRow {
    pub record: ResourceRecord,
    pub cost: CostFigure,
}

#[derive(Debug, Clone)]
pub struct Report {
    pub region: String,
    pub generated_at: DateTime<Utc>,
    pub rows: Vec<ReportRow>,
    pub warnings: Vec<String>,
    pub totals: CostSummary,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResourceJson<'a> {
    #[serde(rename = "type")]
    kind: String,
    name: String,
    status: &'a str,
    instance_type: &'a str,
    instance_count: u32,
    creation_time: String,
    running_time: String,
    hourly_rate: f64,
    current_cost: f64,
    projected_monthly_cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    storage_size_gb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    storage_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_profile: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    app_type: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TotalsJson {
    hourly_rate: f64,
    current_cost: f64,
    projected_monthly_cost: f64,
    storage_cost: f64,
}

impl Report {
    /// Price every record at `now` and total the results.
    pub fn build<P>(
        region: impl Into<String>,
        resources: Vec<ResourceRecord>,
        warnings: Vec<String>,
        prices: &P,
        now: DateTime<Utc>,
    ) -> Self
    where
        P: PriceLookup + ?Sized,
    {
        let rows: Vec<ReportRow> = resources
            .into_iter()
            .map(|record| {
                let cost = calculate_cost(&record, prices, now);
                ReportRow { record, cost }
            })
            .collect();

        let totals = CostSummary::from_figures(rows.iter().map(|row| &row.cost));

        Self {
            region: region.into(),
            generated_at: now,
            rows,
            warnings,
            totals,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether every resource kind was listed. A kind whose retries ran out
    /// leaves a warning behind and its resources unknown.
    pub fn is_complete(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Notice shown instead of a table when there are no rows.
    pub fn empty_message(&self) -> &'static str {
        if self.is_complete() {
            NO_RESOURCES_MESSAGE
        } else {
            INCOMPLETE_MESSAGE
        }
    }

    /// JSON document for `--json`.
    pub fn to_json(&self) -> Value {
        if self.is_empty() {
            return json!({
                "resources": [],
                "warnings": self.warnings,
                "metadata": {
                    "region": self.region,
                    "message": self.empty_message(),
                    "complete": self.is_complete(),
                }
            });
        }

        let resources: Vec<ResourceJson> = self.rows.iter().map(resource_json).collect();
        let totals = TotalsJson {
            hourly_rate: round_cost(self.totals.hourly_rate),
            current_cost: round_cost(self.totals.current_cost),
            projected_monthly_cost: round_cost(self.totals.projected_monthly_cost),
            storage_cost: round_cost(self.totals.storage_cost),
        };

        json!({
            "region": self.region,
            "generatedAt": self.generated_at.to_rfc3339(),
            "resources": resources,
            "warnings": self.warnings,
            "complete": self.is_complete(),
            "totals": totals,
        })
    }
}

fn resource_json(row: &ReportRow) -> ResourceJson<'_> {
    let record = &row.record;
    let cost = &row.cost;

    ResourceJson {
        kind: record.kind.to_string(),
        name: record.display_name(),
        status: &record.status,
        instance_type: &record.instance_type,
        instance_count: record.instance_count,
        creation_time: record.creation_time.to_rfc3339(),
        running_time: format_running_time(cost.running_time),
        hourly_rate: round_cost(cost.hourly_rate),
        current_cost: round_cost(cost.current_cost),
        projected_monthly_cost: round_cost(cost.projected_monthly_cost),
        storage_size_gb: cost.storage_size_gb,
        storage_cost: cost.storage_cost.map(round_cost),
        user_profile: record.owner.as_deref(),
        app_type: record.app_type.as_deref(),
    }
}
