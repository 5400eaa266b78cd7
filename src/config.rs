use crate::errors::{ConfigError, Result, SageWatchError};
use log::{debug, warn};
use sagewatch_api::{Credentials, RetryPolicy};
use sagewatch_core::PriceTable;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Region used when nothing else names one.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Environment variables consulted during configuration, highest priority first
/// within each group.
const ENV_REGION: &[&str] = &["AWS_REGION", "AWS_DEFAULT_REGION"];
const ENV_ENDPOINT: &[&str] = &["AWS_ENDPOINT_URL_SAGEMAKER", "AWS_ENDPOINT_URL"];
const ENV_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
const ENV_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
const ENV_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";

/// Static credentials section
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CredentialsConfig {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
}

/// Retry tuning section; omitted keys keep their defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RetryConfig {
    pub max_attempts: Option<u32>,
    pub initial_interval_ms: Option<u64>,
    pub max_interval_ms: Option<u64>,
    pub multiplier: Option<f64>,
    pub jitter_factor: Option<f64>,
}

/// Pricing section
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PricingConfig {
    /// Path to a TOML or JSON price table
    pub file: Option<String>,
}

/// Contents of `config.toml`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigData {
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub detailed: Option<bool>,
    pub credentials: Option<CredentialsConfig>,
    pub retry: Option<RetryConfig>,
    pub pricing: Option<PricingConfig>,
}

/// Settings given on the command line; these win over everything else.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub pricing_file: Option<PathBuf>,
    pub detailed: bool,
}

/// Snapshot of the environment variables configuration reads.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    /// Read the relevant variables from the process environment.
    pub fn capture() -> Self {
        let credentials = [ENV_ACCESS_KEY_ID, ENV_SECRET_ACCESS_KEY, ENV_SESSION_TOKEN];
        let vars = ENV_REGION
            .iter()
            .chain(ENV_ENDPOINT.iter())
            .chain(credentials.iter())
            .filter_map(|key| std::env::var(key).ok().map(|value| (key.to_string(), value)))
            .collect();

        Self { vars }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }

    fn first(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.get(key))
    }
}

/// Resolved configuration: CLI flag > environment > config file > defaults
#[derive(Debug, Clone)]
pub struct Config {
    pub config_path: Option<PathBuf>,
    pub data: ConfigData,
    overrides: Overrides,
    env: Environment,
}

/// Implementation of the API config trait for the main Config struct
impl sagewatch_api::ApiConfig for Config {
    type Error = SageWatchError;

    fn region(&self) -> std::result::Result<String, Self::Error> {
        Ok(Config::region(self))
    }

    fn endpoint_url(&self) -> std::result::Result<Option<String>, Self::Error> {
        Ok(Config::endpoint_url(self))
    }

    fn credentials(&self) -> std::result::Result<Option<Credentials>, Self::Error> {
        Config::credentials(self)
    }
}

impl Config {
    /// Load configuration from `path`, or from the default location when no
    /// path is given. A missing default file is not an error.
    pub fn load(path: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let (config_path, data) = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.display().to_string()).into());
                }
                (Some(path.to_path_buf()), read_config_file(path)?)
            }
            None => match default_config_path() {
                Some(path) if path.exists() => (Some(path.clone()), read_config_file(&path)?),
                Some(path) => {
                    debug!("No config file at {}; using defaults", path.display());
                    (None, ConfigData::default())
                }
                None => (None, ConfigData::default()),
            },
        };

        let config = Self::from_parts(config_path, data, overrides, Environment::capture());
        if config.configured_region().is_none() {
            warn!("No region configured; defaulting to {}", DEFAULT_REGION);
        }
        Ok(config)
    }

    pub fn from_parts(
        config_path: Option<PathBuf>,
        data: ConfigData,
        overrides: Overrides,
        env: Environment,
    ) -> Self {
        Self {
            config_path,
            data,
            overrides,
            env,
        }
    }

    fn configured_region(&self) -> Option<String> {
        self.overrides
            .region
            .clone()
            .or_else(|| self.env.first(ENV_REGION))
            .or_else(|| self.data.region.clone())
            .filter(|region| !region.trim().is_empty())
    }

    /// Region to poll
    pub fn region(&self) -> String {
        self.configured_region()
            .unwrap_or_else(|| DEFAULT_REGION.to_string())
    }

    /// Custom service endpoint, if any
    pub fn endpoint_url(&self) -> Option<String> {
        self.overrides
            .endpoint_url
            .clone()
            .or_else(|| self.env.first(ENV_ENDPOINT))
            .or_else(|| self.data.endpoint_url.clone())
    }

    /// Whether to describe each resource for instance details
    pub fn detailed(&self) -> bool {
        self.overrides.detailed || self.data.detailed.unwrap_or(false)
    }

    /// Signing credentials: environment first, then the config file.
    ///
    /// A source that provides only half of the key pair is an error.
    pub fn credentials(&self) -> Result<Option<Credentials>> {
        let from_env = credential_pair(
            self.env.get(ENV_ACCESS_KEY_ID),
            self.env.get(ENV_SECRET_ACCESS_KEY),
            self.env.get(ENV_SESSION_TOKEN),
            "AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY",
        )?;
        if from_env.is_some() {
            debug!("Using credentials from the environment");
            return Ok(from_env);
        }

        match &self.data.credentials {
            Some(section) => credential_pair(
                section.access_key_id.clone(),
                section.secret_access_key.clone(),
                section.session_token.clone(),
                "credentials.access_key_id / credentials.secret_access_key",
            ),
            None => Ok(None),
        }
    }

    /// Retry policy with file overrides applied, validated.
    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        let mut policy = RetryPolicy::default();

        if let Some(retry) = &self.data.retry {
            if let Some(max_attempts) = retry.max_attempts {
                policy.max_attempts = max_attempts;
            }
            if let Some(ms) = retry.initial_interval_ms {
                policy.initial_interval = Duration::from_millis(ms);
            }
            if let Some(ms) = retry.max_interval_ms {
                policy.max_interval = Duration::from_millis(ms);
            }
            if let Some(multiplier) = retry.multiplier {
                policy.multiplier = multiplier;
            }
            if let Some(jitter_factor) = retry.jitter_factor {
                policy.jitter_factor = jitter_factor;
            }
        }

        policy.validate().map_err(|e| ConfigError::InvalidValue {
            field: "retry".to_string(),
            value: e.to_string(),
        })?;

        Ok(policy)
    }

    /// Path of the price file, if one is configured
    pub fn pricing_file(&self) -> Option<PathBuf> {
        self.overrides.pricing_file.clone().or_else(|| {
            self.data
                .pricing
                .as_ref()
                .and_then(|pricing| pricing.file.as_deref())
                .map(expand_path)
        })
    }

    /// Price table from the configured file, or the built-in defaults.
    pub fn price_table(&self) -> Result<PriceTable> {
        match self.pricing_file() {
            Some(path) => load_price_table(&path),
            None => Ok(PriceTable::default()),
        }
    }
}

fn credential_pair(
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
    session_token: Option<String>,
    source: &str,
) -> Result<Option<Credentials>> {
    match (access_key_id, secret_access_key) {
        (Some(id), Some(secret)) => Ok(Some(Credentials::new(id, secret, session_token))),
        (None, None) => Ok(None),
        _ => Err(ConfigError::MissingField(format!("{} must be set together", source)).into()),
    }
}

fn read_config_file(path: &Path) -> Result<ConfigData> {
    debug!("Loading config from {}", path.display());
    let content = fs::read_to_string(path)?;
    let data = toml::from_str(&content).map_err(|e| ConfigError::TomlError(e.to_string()))?;
    Ok(data)
}

/// Load and validate a price table. `.json` files are read as JSON,
/// everything else as TOML.
pub fn load_price_table(path: &Path) -> Result<PriceTable> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.display().to_string()).into());
    }

    debug!("Loading prices from {}", path.display());
    let content = fs::read_to_string(path)?;

    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let table: PriceTable = if is_json {
        serde_json::from_str(&content)?
    } else {
        toml::from_str(&content).map_err(|e| ConfigError::TomlError(e.to_string()))?
    };

    table.validate()?;
    Ok(table)
}

/// `<config_dir>/sagewatch/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sagewatch").join("config.toml"))
}

/// Expand a leading `~/` to the home directory
fn expand_path(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
