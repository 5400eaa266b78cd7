use crate::errors::CoreError;
use crate::pricing::PriceCategory;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status the platform reports for a running, billable resource.
pub const IN_SERVICE: &str = "InService";

/// Instance type reported when the cheap listing call does not expose it.
pub const UNKNOWN_INSTANCE_TYPE: &str = "unknown";

/// The three categories of live resources that are polled.
///
/// The declaration order is the fixed priority order used whenever results
/// from several kinds are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Endpoint,
    Notebook,
    App,
}

impl ResourceKind {
    /// All kinds in priority order.
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::Endpoint,
        ResourceKind::Notebook,
        ResourceKind::App,
    ];

    /// Plural noun used in log lines and error messages ("failed to list ...").
    pub fn plural(&self) -> &'static str {
        match self {
            ResourceKind::Endpoint => "endpoints",
            ResourceKind::Notebook => "notebooks",
            ResourceKind::App => "studio apps",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResourceKind::Endpoint => "Endpoint",
            ResourceKind::Notebook => "Notebook",
            ResourceKind::App => "App",
        };
        f.write_str(label)
    }
}

impl FromStr for ResourceKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "endpoint" | "endpoints" => Ok(ResourceKind::Endpoint),
            "notebook" | "notebooks" => Ok(ResourceKind::Notebook),
            "app" | "apps" | "studio" => Ok(ResourceKind::App),
            other => Err(CoreError::ParseError(format!(
                "Unknown resource kind: {}",
                other
            ))),
        }
    }
}

/// One polled resource instance, uniform across resource kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub kind: ResourceKind,
    pub name: String,
    pub status: String,
    pub instance_type: String,
    pub instance_count: u32,
    pub creation_time: DateTime<Utc>,
    /// Attached block storage; notebooks only.
    pub volume_size_gb: Option<u32>,
    /// Owning user profile; apps only.
    pub owner: Option<String>,
    /// Application flavour ("JupyterServer", "KernelGateway", "Canvas", ...); apps only.
    pub app_type: Option<String>,
}

impl ResourceRecord {
    /// Create a record with the fields every kind carries.
    pub fn new(
        kind: ResourceKind,
        name: impl Into<String>,
        status: impl Into<String>,
        instance_type: impl Into<String>,
        creation_time: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            status: status.into(),
            instance_type: instance_type.into(),
            instance_count: 1,
            creation_time,
            volume_size_gb: None,
            owner: None,
            app_type: None,
        }
    }

    /// Whether the record can be shown to a user at all.
    pub fn has_name(&self) -> bool {
        !self.name.trim().is_empty()
    }

    /// Time elapsed since creation, never negative.
    pub fn running_time(&self, now: DateTime<Utc>) -> Duration {
        let elapsed = now.signed_duration_since(self.creation_time);
        if elapsed < Duration::zero() {
            Duration::zero()
        } else {
            elapsed
        }
    }

    /// Name as presented to the operator. Apps are identified by
    /// `<profile>/<app type>` when the profile is known.
    pub fn display_name(&self) -> String {
        match (self.kind, &self.owner, &self.app_type) {
            (ResourceKind::App, Some(owner), Some(app_type)) if !owner.is_empty() => {
                format!("{}/{}", owner, app_type)
            }
            _ => self.name.clone(),
        }
    }

    /// Which price table applies to this record.
    pub fn price_category(&self) -> PriceCategory {
        match self.kind {
            ResourceKind::Endpoint => PriceCategory::Endpoint,
            ResourceKind::Notebook => PriceCategory::Notebook,
            ResourceKind::App => match &self.app_type {
                Some(app_type) if app_type.eq_ignore_ascii_case("canvas") => {
                    PriceCategory::Canvas
                }
                _ => PriceCategory::Studio,
            },
        }
    }

    pub fn is_in_service(&self) -> bool {
        self.status == IN_SERVICE
    }
}

// Raw API response structures for parsing.
// Timestamps arrive as epoch seconds (possibly fractional).

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct ApiEndpointSummary {
    #[serde(default)]
    pub endpoint_name: String,
    #[serde(default)]
    pub endpoint_arn: Option<String>,
    #[serde(default)]
    pub creation_time: Option<f64>,
    #[serde(default)]
    pub endpoint_status: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct ApiNotebookInstanceSummary {
    #[serde(default)]
    pub notebook_instance_name: String,
    #[serde(default)]
    pub notebook_instance_status: Option<String>,
    #[serde(default)]
    pub instance_type: Option<String>,
    #[serde(default)]
    pub creation_time: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(rename_all = "PascalCase")]
pub struct ApiResourceSpec {
    #[serde(default)]
    pub instance_type: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct ApiAppDetails {
    #[serde(default)]
    pub domain_id: Option<String>,
    #[serde(default)]
    pub user_profile_name: Option<String>,
    #[serde(default)]
    pub space_name: Option<String>,
    #[serde(default)]
    pub app_type: Option<String>,
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub creation_time: Option<f64>,
    #[serde(default)]
    pub resource_spec: Option<ApiResourceSpec>,
}

/// Convert an epoch-seconds timestamp. A missing or out-of-range value is
/// treated as "created just now" so it never produces a phantom cost.
fn creation_time_or_now(epoch_seconds: Option<f64>) -> DateTime<Utc> {
    epoch_seconds
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .and_then(|secs| {
            let whole = secs.trunc() as i64;
            let nanos = ((secs - secs.trunc()) * 1e9) as u32;
            DateTime::from_timestamp(whole, nanos)
        })
        .unwrap_or_else(Utc::now)
}

impl From<ApiEndpointSummary> for ResourceRecord {
    fn from(api_response: ApiEndpointSummary) -> Self {
        // The listing call carries no production-variant details.
        ResourceRecord::new(
            ResourceKind::Endpoint,
            api_response.endpoint_name,
            api_response.endpoint_status,
            UNKNOWN_INSTANCE_TYPE,
            creation_time_or_now(api_response.creation_time),
        )
    }
}

impl From<ApiNotebookInstanceSummary> for ResourceRecord {
    fn from(api_response: ApiNotebookInstanceSummary) -> Self {
        ResourceRecord::new(
            ResourceKind::Notebook,
            api_response.notebook_instance_name,
            api_response.notebook_instance_status.unwrap_or_default(),
            api_response
                .instance_type
                .unwrap_or_else(|| UNKNOWN_INSTANCE_TYPE.to_string()),
            creation_time_or_now(api_response.creation_time),
        )
    }
}

impl From<ApiAppDetails> for ResourceRecord {
    fn from(api_response: ApiAppDetails) -> Self {
        let instance_type = api_response
            .resource_spec
            .and_then(|spec| spec.instance_type)
            .unwrap_or_default();

        let mut record = ResourceRecord::new(
            ResourceKind::App,
            api_response.app_name.unwrap_or_default(),
            api_response.status.unwrap_or_default(),
            instance_type,
            creation_time_or_now(api_response.creation_time),
        );
        record.owner = api_response.user_profile_name;
        record.app_type = api_response.app_type;
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_endpoint_summary_conversion() {
        let raw: ApiEndpointSummary = serde_json::from_value(json!({
            "EndpointName": "fraud-scorer",
            "EndpointArn": "arn:aws:sagemaker:us-east-1:123:endpoint/fraud-scorer",
            "CreationTime": 1_700_000_000.5,
            "EndpointStatus": "InService"
        }))
        .unwrap();

        let record = ResourceRecord::from(raw);
        assert_eq!(record.kind, ResourceKind::Endpoint);
        assert_eq!(record.name, "fraud-scorer");
        assert_eq!(record.instance_type, UNKNOWN_INSTANCE_TYPE);
        assert_eq!(record.instance_count, 1);
        assert_eq!(record.creation_time.timestamp(), 1_700_000_000);
        assert!(record.is_in_service());
    }

    #[test]
    fn test_unnamed_summaries_still_parse() {
        let endpoints: Vec<ApiEndpointSummary> = serde_json::from_value(json!([
            { "EndpointName": "ok", "EndpointStatus": "InService", "CreationTime": 1_700_000_000 },
            { "EndpointStatus": "InService" }
        ]))
        .unwrap();
        let records: Vec<ResourceRecord> = endpoints.into_iter().map(ResourceRecord::from).collect();
        assert!(records[0].has_name());
        assert!(!records[1].has_name());
        assert!(records[1].is_in_service());

        let notebooks: Vec<ApiNotebookInstanceSummary> = serde_json::from_value(json!([
            { "NotebookInstanceStatus": "InService", "InstanceType": "ml.t3.medium" }
        ]))
        .unwrap();
        let record = ResourceRecord::from(notebooks[0].clone());
        assert_eq!(record.kind, ResourceKind::Notebook);
        assert!(!record.has_name());
    }

    #[test]
    fn test_app_conversion_tolerates_missing_fields() {
        let raw: ApiAppDetails = serde_json::from_value(json!({
            "DomainId": "d-123",
            "AppType": "Canvas",
            "Status": "InService"
        }))
        .unwrap();

        let record = ResourceRecord::from(raw);
        assert_eq!(record.kind, ResourceKind::App);
        assert!(!record.has_name());
        assert_eq!(record.instance_type, "");
        assert_eq!(record.price_category(), PriceCategory::Canvas);
    }

    #[test]
    fn test_app_display_name_uses_profile() {
        let raw: ApiAppDetails = serde_json::from_value(json!({
            "UserProfileName": "alice",
            "AppType": "JupyterServer",
            "AppName": "default",
            "Status": "InService",
            "CreationTime": 1_700_000_000,
            "ResourceSpec": { "InstanceType": "ml.t3.medium" }
        }))
        .unwrap();

        let record = ResourceRecord::from(raw);
        assert_eq!(record.display_name(), "alice/JupyterServer");
        assert_eq!(record.instance_type, "ml.t3.medium");
        assert_eq!(record.price_category(), PriceCategory::Studio);
    }

    #[test]
    fn test_running_time_never_negative() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let mut record = ResourceRecord::new(
            ResourceKind::Notebook,
            "nb",
            IN_SERVICE,
            "ml.t3.medium",
            now + Duration::minutes(5),
        );
        assert_eq!(record.running_time(now), Duration::zero());

        record.creation_time = now - Duration::minutes(90);
        assert_eq!(record.running_time(now), Duration::minutes(90));
    }

    #[test]
    fn test_resource_kind_parsing() {
        assert_eq!("Endpoints".parse::<ResourceKind>().unwrap(), ResourceKind::Endpoint);
        assert_eq!("studio".parse::<ResourceKind>().unwrap(), ResourceKind::App);
        assert!("cluster".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_kind_priority_order() {
        let mut kinds = vec![ResourceKind::App, ResourceKind::Endpoint, ResourceKind::Notebook];
        kinds.sort();
        assert_eq!(kinds, ResourceKind::ALL.to_vec());
    }
}
