use crate::errors::{ApiError, HttpError, Result};
use crate::signing::{Credentials, RequestSigner};
use chrono::Utc;
use log::{debug, error, info, trace, warn};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, StatusCode};
use sagewatch_core::{ApiAppDetails, ApiEndpointSummary, ApiNotebookInstanceSummary};
use sagewatch_utils::parse_error_type;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use url::Url;

const JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const TARGET_PREFIX: &str = "SageMaker";
const SERVICE_NAME: &str = "sagemaker";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Error codes returned when the platform refuses the caller's identity.
pub const CREDENTIAL_REJECTION_CODES: &[&str] = &[
    "AccessDeniedException",
    "InvalidClientTokenId",
    "SignatureDoesNotMatch",
    "ExpiredToken",
    "UnrecognizedClientException",
];

/// Trait for providing configuration to the API client
/// This allows the main application to implement config without circular dependencies
pub trait ApiConfig {
    type Error;

    /// Region the client talks to
    fn region(&self) -> std::result::Result<String, Self::Error>;

    /// Override for the service endpoint (optional, defaults to the regional endpoint)
    fn endpoint_url(&self) -> std::result::Result<Option<String>, Self::Error> {
        Ok(None)
    }

    /// Credentials used to sign requests
    fn credentials(&self) -> std::result::Result<Option<Credentials>, Self::Error>;
}

/// Default regional endpoint for the SageMaker control plane.
pub fn default_endpoint(region: &str) -> String {
    format!("https://api.sagemaker.{}.amazonaws.com/", region)
}

/// Instance details reported by `DescribeEndpoint`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EndpointDescription {
    #[serde(default)]
    pub endpoint_name: Option<String>,
    #[serde(default)]
    pub endpoint_config_name: Option<String>,
    #[serde(default)]
    pub production_variants: Vec<ProductionVariantSummary>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProductionVariantSummary {
    #[serde(default)]
    pub variant_name: Option<String>,
    #[serde(default)]
    pub current_instance_count: Option<u32>,
}

/// Variant layout reported by `DescribeEndpointConfig`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EndpointConfigDescription {
    #[serde(default)]
    pub production_variants: Vec<ProductionVariant>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProductionVariant {
    #[serde(default)]
    pub variant_name: Option<String>,
    #[serde(default)]
    pub instance_type: Option<String>,
    #[serde(default)]
    pub initial_instance_count: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NotebookInstanceDescription {
    #[serde(default)]
    pub instance_type: Option<String>,
    #[serde(default, rename = "VolumeSizeInGB")]
    pub volume_size_in_gb: Option<u32>,
}

/// One page of a `List*` response.
trait Page: DeserializeOwned {
    type Item;

    fn into_parts(self) -> (Vec<Self::Item>, Option<String>);
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListEndpointsPage {
    #[serde(default)]
    endpoints: Vec<ApiEndpointSummary>,
    #[serde(default)]
    next_token: Option<String>,
}

impl Page for ListEndpointsPage {
    type Item = ApiEndpointSummary;

    fn into_parts(self) -> (Vec<Self::Item>, Option<String>) {
        (self.endpoints, self.next_token)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListNotebookInstancesPage {
    #[serde(default)]
    notebook_instances: Vec<ApiNotebookInstanceSummary>,
    #[serde(default)]
    next_token: Option<String>,
}

impl Page for ListNotebookInstancesPage {
    type Item = ApiNotebookInstanceSummary;

    fn into_parts(self) -> (Vec<Self::Item>, Option<String>) {
        (self.notebook_instances, self.next_token)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListAppsPage {
    #[serde(default)]
    apps: Vec<ApiAppDetails>,
    #[serde(default)]
    next_token: Option<String>,
}

impl Page for ListAppsPage {
    type Item = ApiAppDetails;

    fn into_parts(self) -> (Vec<Self::Item>, Option<String>) {
        (self.apps, self.next_token)
    }
}

/// Map a non-success response to an [`HttpError`].
///
/// The error code comes from the `x-amzn-ErrorType` header when present,
/// otherwise from the body's `__type` or `code` field. Without any code the
/// status decides.
pub fn parse_error_response(status: u16, error_type_header: Option<&str>, body: &str) -> HttpError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let field = |names: &[&str]| -> Option<String> {
        let object = parsed.as_ref()?.as_object()?;
        names
            .iter()
            .find_map(|name| object.get(*name).and_then(Value::as_str))
            .map(str::to_string)
    };

    let code = error_type_header
        .and_then(|raw| parse_error_type(raw).ok())
        .or_else(|| field(&["__type", "code", "Code"]).and_then(|raw| parse_error_type(&raw).ok()));

    let message = field(&["message", "Message"]).unwrap_or_else(|| body.trim().to_string());

    match code {
        Some(code) => HttpError::Service {
            status,
            code,
            message,
        },
        None => match StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR) {
            StatusCode::TOO_MANY_REQUESTS => HttpError::RateLimited,
            StatusCode::SERVICE_UNAVAILABLE => HttpError::ServiceUnavailable,
            StatusCode::REQUEST_TIMEOUT => HttpError::Timeout,
            _ => HttpError::HttpError { status, message },
        },
    }
}

fn transport_error(err: reqwest::Error) -> HttpError {
    if err.is_timeout() {
        HttpError::Timeout
    } else {
        HttpError::Request(err)
    }
}

/// HTTP client for the SageMaker control-plane API (JSON 1.1 protocol).
#[derive(Debug, Clone)]
pub struct SageMakerClient {
    client: Client,
    endpoint: Url,
    region: String,
    signer: Option<RequestSigner>,
}

impl SageMakerClient {
    /// Create a new API client
    pub fn new(
        region: impl Into<String>,
        endpoint_url: Option<String>,
        credentials: Option<Credentials>,
    ) -> Result<Self> {
        let region = region.into();
        if region.trim().is_empty() {
            return Err(ApiError::Config("region must not be empty".to_string()));
        }

        let custom_endpoint = endpoint_url.is_some();
        let endpoint = endpoint_url.unwrap_or_else(|| default_endpoint(&region));
        let endpoint = Url::parse(&endpoint).map_err(HttpError::from)?;

        let signer = match credentials {
            Some(credentials) => {
                debug!("  Access key: {}", credentials.masked_key_id());
                Some(RequestSigner::new(credentials, region.clone(), SERVICE_NAME))
            }
            None if custom_endpoint => {
                warn!("No credentials configured; sending unsigned requests to {}", endpoint);
                None
            }
            None => {
                return Err(ApiError::Config(
                    "no AWS credentials found; set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY \
                     or add a [credentials] section to the config file"
                        .to_string(),
                ))
            }
        };

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(HttpError::Request)?;

        debug!("Creating SageMakerClient");
        debug!("  Region: {}", region);
        debug!("  Endpoint: {}", endpoint);

        Ok(Self {
            client,
            endpoint,
            region,
            signer,
        })
    }

    /// Create API client from any configuration implementing ApiConfig trait
    pub fn from_config<C>(config: &C) -> std::result::Result<Self, C::Error>
    where
        C: ApiConfig,
        C::Error: From<ApiError>,
    {
        debug!("Creating SageMakerClient from config");
        let region = config.region()?;
        let endpoint_url = config.endpoint_url()?;
        let credentials = config.credentials()?;

        Ok(Self::new(region, endpoint_url, credentials)?)
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Invoke one API operation and decode its JSON output.
    pub async fn call<T>(&self, operation: &str, body: &Value) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let payload = serde_json::to_vec(body)?;
        let target = format!("{}.{}", TARGET_PREFIX, operation);

        debug!("HTTP POST {} to: {}", target, self.endpoint);
        trace!("Request body: {}", body);

        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .header("X-Amz-Target", &target);

        if let Some(signer) = &self.signer {
            let signed = signer.sign(
                "POST",
                &self.endpoint,
                &[("content-type", JSON_CONTENT_TYPE), ("x-amz-target", target.as_str())],
                &payload,
                Utc::now(),
            )?;
            for (name, value) in signed {
                request = request.header(name, value);
            }
        }

        let response = request.body(payload).send().await.map_err(|e| {
            error!("{} request failed: {:?}", target, e);
            transport_error(e)
        })?;

        debug!("Response status: {}", response.status());

        let response = self.handle_response(response).await?;
        let text = response.text().await.map_err(transport_error)?;
        trace!("Response body: {}", text);

        let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
        Ok(serde_json::from_str(text)?)
    }

    /// Handle HTTP response and convert errors
    async fn handle_response(&self, response: Response) -> Result<Response> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let error_type = response
            .headers()
            .get("x-amzn-ErrorType")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        debug!("Error response body: {}", body);

        let http_error = parse_error_response(status.as_u16(), error_type.as_deref(), &body);
        debug!("Request failed with status {}: {}", status, http_error);

        Err(ApiError::Http(http_error))
    }

    async fn list_all<P>(&self, operation: &str) -> Result<Vec<P::Item>>
    where
        P: Page,
    {
        let mut items = Vec::new();
        let mut next_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let mut body = Map::new();
            if let Some(token) = &next_token {
                body.insert("NextToken".to_string(), Value::String(token.clone()));
            }

            let page: P = self.call(operation, &Value::Object(body)).await?;
            let (mut batch, token) = page.into_parts();
            pages += 1;
            items.append(&mut batch);

            match token.filter(|token| !token.is_empty()) {
                Some(token) if next_token.as_deref() == Some(token.as_str()) => {
                    warn!("{} returned the same NextToken twice; stopping pagination", operation);
                    break;
                }
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        debug!("{} returned {} items over {} pages", operation, items.len(), pages);
        Ok(items)
    }

    /// List every endpoint, following pagination.
    pub async fn list_endpoints(&self) -> Result<Vec<ApiEndpointSummary>> {
        debug!("Fetching endpoints");
        let endpoints = self.list_all::<ListEndpointsPage>("ListEndpoints").await?;
        info!("Successfully fetched {} endpoints", endpoints.len());
        Ok(endpoints)
    }

    /// List every notebook instance, following pagination.
    pub async fn list_notebook_instances(&self) -> Result<Vec<ApiNotebookInstanceSummary>> {
        debug!("Fetching notebook instances");
        let notebooks = self
            .list_all::<ListNotebookInstancesPage>("ListNotebookInstances")
            .await?;
        info!("Successfully fetched {} notebook instances", notebooks.len());
        Ok(notebooks)
    }

    /// List every Studio app, following pagination.
    pub async fn list_apps(&self) -> Result<Vec<ApiAppDetails>> {
        debug!("Fetching studio apps");
        let apps = self.list_all::<ListAppsPage>("ListApps").await?;
        info!("Successfully fetched {} studio apps", apps.len());
        Ok(apps)
    }

    pub async fn describe_endpoint(&self, name: &str) -> Result<EndpointDescription> {
        debug!("Describing endpoint {}", name);
        self.call("DescribeEndpoint", &json!({ "EndpointName": name }))
            .await
    }

    pub async fn describe_endpoint_config(&self, name: &str) -> Result<EndpointConfigDescription> {
        debug!("Describing endpoint config {}", name);
        self.call("DescribeEndpointConfig", &json!({ "EndpointConfigName": name }))
            .await
    }

    pub async fn describe_notebook_instance(&self, name: &str) -> Result<NotebookInstanceDescription> {
        debug!("Describing notebook instance {}", name);
        self.call(
            "DescribeNotebookInstance",
            &json!({ "NotebookInstanceName": name }),
        )
        .await
    }

    /// Check that the configured credentials are accepted.
    ///
    /// Returns `Ok(false)` when the platform rejects the caller's identity;
    /// any other failure is returned as an error.
    pub async fn validate_configuration(&self) -> Result<bool> {
        debug!("Validating credentials with ListDomains");
        match self
            .call::<Value>("ListDomains", &json!({ "MaxResults": 1 }))
            .await
        {
            Ok(_) => {
                info!("Credentials accepted for region {}", self.region);
                Ok(true)
            }
            Err(err)
                if err
                    .code()
                    .map(|code| CREDENTIAL_REJECTION_CODES.contains(&code))
                    .unwrap_or(false) =>
            {
                warn!("Credentials rejected: {}", err);
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    const TARGET: &str = "x-amz-target";

    fn client_for(server: &MockServer) -> SageMakerClient {
        SageMakerClient::new("us-east-1", Some(server.url("/")), None).unwrap()
    }

    #[test]
    fn test_parse_error_prefers_header_type() {
        let err = parse_error_response(
            400,
            Some("ThrottlingException:http://internal.amazon.com/coral/com.amazon.coral.availability/"),
            r#"{"message":"Rate exceeded"}"#,
        );
        match err {
            HttpError::Service { code, message, .. } => {
                assert_eq!(code, "ThrottlingException");
                assert_eq!(message, "Rate exceeded");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_reads_body_type() {
        let err = parse_error_response(
            400,
            None,
            r#"{"__type":"com.amazon.coral.validate#ValidationException","Message":"bad input"}"#,
        );
        assert_eq!(err.code(), Some("ValidationException"));
        assert_eq!(err.to_string(), "ValidationException: bad input");
    }

    #[test]
    fn test_parse_error_falls_back_to_status() {
        assert!(matches!(parse_error_response(429, None, ""), HttpError::RateLimited));
        assert!(matches!(
            parse_error_response(503, None, "<html>down</html>"),
            HttpError::ServiceUnavailable
        ));
        assert!(matches!(parse_error_response(408, None, ""), HttpError::Timeout));
        match parse_error_response(500, None, "boom") {
            HttpError::HttpError { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_new_requires_credentials_for_default_endpoint() {
        let err = SageMakerClient::new("us-east-1", None, None).unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));

        let client = SageMakerClient::new("eu-west-1", Some("http://localhost:4566/".to_string()), None)
            .unwrap();
        assert_eq!(client.endpoint().as_str(), "http://localhost:4566/");

        let client = SageMakerClient::new(
            "eu-west-1",
            None,
            Some(Credentials::new("AKID", "secret", None)),
        )
        .unwrap();
        assert_eq!(
            client.endpoint().as_str(),
            "https://api.sagemaker.eu-west-1.amazonaws.com/"
        );
    }

    #[test]
    fn test_new_rejects_bad_input() {
        assert!(SageMakerClient::new("", Some("http://localhost/".to_string()), None).is_err());
        assert!(SageMakerClient::new("us-east-1", Some("not a url".to_string()), None).is_err());
    }

    #[tokio::test]
    async fn test_list_endpoints_follows_pagination() {
        let server = MockServer::start_async().await;

        let first = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/")
                    .header(TARGET, "SageMaker.ListEndpoints")
                    .json_body(json!({}));
                then.status(200).json_body(json!({
                    "Endpoints": [{ "EndpointName": "a", "EndpointStatus": "InService", "CreationTime": 1700000000.0 }],
                    "NextToken": "page-2"
                }));
            })
            .await;
        let second = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/")
                    .header(TARGET, "SageMaker.ListEndpoints")
                    .json_body(json!({ "NextToken": "page-2" }));
                then.status(200).json_body(json!({
                    "Endpoints": [{ "EndpointName": "b", "EndpointStatus": "Creating", "CreationTime": 1700000100.0 }]
                }));
            })
            .await;

        let endpoints = client_for(&server).list_endpoints().await.unwrap();

        let names: Vec<&str> = endpoints.iter().map(|e| e.endpoint_name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn test_repeated_next_token_stops_pagination() {
        let server = MockServer::start_async().await;
        let apps = server
            .mock_async(|when, then| {
                when.method(POST).header(TARGET, "SageMaker.ListApps");
                then.status(200).json_body(json!({
                    "Apps": [{ "AppName": "default", "Status": "InService" }],
                    "NextToken": "same"
                }));
            })
            .await;

        let listed = client_for(&server).list_apps().await.unwrap();

        assert_eq!(listed.len(), 2);
        apps.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn test_service_error_surfaces_code() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).header(TARGET, "SageMaker.ListNotebookInstances");
                then.status(400)
                    .json_body(json!({ "__type": "ThrottlingException", "message": "Rate exceeded" }));
            })
            .await;

        let err = client_for(&server).list_notebook_instances().await.unwrap_err();
        assert_eq!(err.code(), Some("ThrottlingException"));
    }

    #[tokio::test]
    async fn test_signed_requests_carry_authorization() {
        let server = MockServer::start_async().await;
        let domains = server
            .mock_async(|when, then| {
                when.method(POST)
                    .header(TARGET, "SageMaker.ListDomains")
                    .header("content-type", JSON_CONTENT_TYPE)
                    .header_exists("authorization")
                    .header_exists("x-amz-date")
                    .json_body(json!({ "MaxResults": 1 }));
                then.status(200).json_body(json!({ "Domains": [] }));
            })
            .await;

        let client = SageMakerClient::new(
            "us-west-2",
            Some(server.url("/")),
            Some(Credentials::new("AKID", "secret", None)),
        )
        .unwrap();
        assert!(client.validate_configuration().await.unwrap());
        domains.assert_async().await;
    }

    #[tokio::test]
    async fn test_validate_configuration_reports_rejected_credentials() {
        for code in ["InvalidClientTokenId", "AccessDeniedException", "ExpiredToken"] {
            let server = MockServer::start_async().await;
            server
                .mock_async(|when, then| {
                    when.method(POST).header(TARGET, "SageMaker.ListDomains");
                    then.status(403).json_body(json!({ "__type": code, "message": "nope" }));
                })
                .await;

            let client = client_for(&server);
            assert!(!client.validate_configuration().await.unwrap(), "{}", code);
        }
    }

    #[tokio::test]
    async fn test_validate_configuration_propagates_other_failures() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).header(TARGET, "SageMaker.ListDomains");
                then.status(400)
                    .json_body(json!({ "__type": "ThrottlingException", "message": "slow down" }));
            })
            .await;

        let err = client_for(&server).validate_configuration().await.unwrap_err();
        assert_eq!(err.code(), Some("ThrottlingException"));
    }

    #[tokio::test]
    async fn test_describe_notebook_reads_volume_size() {
        let server = MockServer::start_async().await;
        let describe = server
            .mock_async(|when, then| {
                when.method(POST)
                    .header(TARGET, "SageMaker.DescribeNotebookInstance")
                    .json_body(json!({ "NotebookInstanceName": "nb" }));
                then.status(200).json_body(json!({
                    "NotebookInstanceName": "nb",
                    "InstanceType": "ml.t3.medium",
                    "VolumeSizeInGB": 20
                }));
            })
            .await;

        let description = client_for(&server)
            .describe_notebook_instance("nb")
            .await
            .unwrap();
        assert_eq!(description.volume_size_in_gb, Some(20));
        describe.assert_async().await;
    }
}
