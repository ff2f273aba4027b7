use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::cli::CliConfig;
use super::constants::{
    AZURE_AUTHORITY_HOST, AZURE_IMDS_ENDPOINT, AZURE_MANAGEMENT_ENDPOINT,
    DEFAULT_DELIVERY_TIMEOUT_SECS, DEFAULT_HOST, DEFAULT_LOG_FLUSH_TIMEOUT_SECS,
    DEFAULT_MAX_CONCURRENCY, DEFAULT_PORT, DEFAULT_QUERY_TIMEOUT_SECS, ENV_AZURE_ACCESS_TOKEN,
    ENV_AZURE_CLIENT_ID, ENV_AZURE_CLIENT_SECRET, ENV_AZURE_TENANT_ID, ENV_CONFIG_BLOB_URI,
    ENV_NEW_RELIC_LICENSE_KEY, NEW_RELIC_EU_LOGS_URL, NEW_RELIC_EU_METRICS_URL,
    NEW_RELIC_US_LOGS_URL, NEW_RELIC_US_METRICS_URL, SETTINGS_FILE_NAME,
};
use super::secret::Secret;
use crate::domain::metrics::PipelineConfig;

// =============================================================================
// Enums
// =============================================================================

/// New Relic data center receiving metrics and logs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NewRelicRegion {
    #[default]
    Eu,
    Us,
}

impl NewRelicRegion {
    pub fn metrics_url(&self) -> &'static str {
        match self {
            Self::Eu => NEW_RELIC_EU_METRICS_URL,
            Self::Us => NEW_RELIC_US_METRICS_URL,
        }
    }

    pub fn logs_url(&self) -> &'static str {
        match self {
            Self::Eu => NEW_RELIC_EU_LOGS_URL,
            Self::Us => NEW_RELIC_US_LOGS_URL,
        }
    }
}

impl fmt::Display for NewRelicRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eu => write!(f, "eu"),
            Self::Us => write!(f, "us"),
        }
    }
}

/// Process log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compact => write!(f, "compact"),
            Self::Json => write!(f, "json"),
        }
    }
}

// =============================================================================
// File Config Structs (JSON deserialization)
// =============================================================================

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Secrets are never read from the settings file
#[derive(Debug, Default, Clone, Deserialize)]
pub struct NewRelicFileConfig {
    pub region: Option<NewRelicRegion>,
    pub metrics_url: Option<String>,
    pub logs_url: Option<String>,
    pub log_flush_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct AzureFileConfig {
    pub monitor_endpoint: Option<String>,
    pub authority_host: Option<String>,
    pub imds_endpoint: Option<String>,
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct PipelineFileConfig {
    pub max_concurrency: Option<usize>,
    pub query_timeout_secs: Option<u64>,
    pub delivery_timeout_secs: Option<u64>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub server: Option<ServerFileConfig>,
    pub new_relic: Option<NewRelicFileConfig>,
    pub azure: Option<AzureFileConfig>,
    pub pipeline: Option<PipelineFileConfig>,
    pub config_blob_uri: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading settings file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed settings file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in settings file (possible typos)"
            );
        }
    }
}

// =============================================================================
// Resolved Config
// =============================================================================

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct NewRelicConfig {
    pub license_key: Secret,
    pub region: NewRelicRegion,
    pub metrics_url: String,
    pub logs_url: String,
    /// Bound on each telemetry batch POST
    pub log_flush_timeout: Duration,
}

/// How Azure bearer tokens are obtained
#[derive(Debug, Clone)]
pub enum AzureAuthConfig {
    AccessToken(Secret),
    ClientSecret {
        tenant_id: String,
        client_id: String,
        client_secret: Secret,
    },
    /// System-assigned identity, or the user-assigned one named by `client_id`.
    /// `identity_endpoint` and `identity_header` are set by App Service; without
    /// them IMDS is used.
    ManagedIdentity {
        client_id: Option<String>,
        identity_endpoint: Option<String>,
        identity_header: Option<Secret>,
    },
}

#[derive(Debug, Clone)]
pub struct AzureConfig {
    pub monitor_endpoint: String,
    pub authority_host: String,
    pub imds_endpoint: String,
    /// `None` when client-secret settings are only partly given
    pub auth: Option<AzureAuthConfig>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub new_relic: NewRelicConfig,
    pub azure: AzureConfig,
    /// Where `config.json` lives (blob container URI, `file://` URI or path)
    pub config_location: String,
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");

        // 1. CLI-specified settings file OR local one, if present
        let settings_path = if let Some(ref path) = cli.config {
            if !path.exists() {
                anyhow::bail!("Settings file not found: {}", path.display());
            }
            Some(path.clone())
        } else {
            let local = PathBuf::from(SETTINGS_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        let file_config = match settings_path {
            Some(path) => {
                let config = FileConfig::load_from_file(&path)?;
                config.warn_unknown_fields();
                config
            }
            None => FileConfig::default(),
        };

        let config = Self::resolve(cli, file_config);
        config.validate()?;

        tracing::debug!(
            host = %config.server.host,
            port = config.server.port,
            region = %config.new_relic.region,
            max_concurrency = config.pipeline.max_concurrency,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Layer: defaults -> settings file -> CLI/env
    fn resolve(cli: &CliConfig, file_config: FileConfig) -> Self {
        let file_server = file_config.server.unwrap_or_default();
        let file_new_relic = file_config.new_relic.unwrap_or_default();
        let file_azure = file_config.azure.unwrap_or_default();
        let file_pipeline = file_config.pipeline.unwrap_or_default();

        let server = ServerConfig {
            host: cli
                .host
                .clone()
                .or(file_server.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: cli.port.or(file_server.port).unwrap_or(DEFAULT_PORT),
        };

        // explicit endpoints win over the region defaults
        let region = cli
            .new_relic_region
            .or(file_new_relic.region)
            .unwrap_or_default();
        let new_relic = NewRelicConfig {
            license_key: Secret::new(cli.new_relic_license_key.clone().unwrap_or_default()),
            region,
            metrics_url: cli
                .new_relic_metrics_url
                .clone()
                .or(file_new_relic.metrics_url)
                .unwrap_or_else(|| region.metrics_url().to_string()),
            logs_url: cli
                .new_relic_logs_url
                .clone()
                .or(file_new_relic.logs_url)
                .unwrap_or_else(|| region.logs_url().to_string()),
            log_flush_timeout: Duration::from_secs(
                cli.log_flush_timeout_secs
                    .or(file_new_relic.log_flush_timeout_secs)
                    .unwrap_or(DEFAULT_LOG_FLUSH_TIMEOUT_SECS),
            ),
        };

        let tenant_id = cli.azure_tenant_id.clone().or(file_azure.tenant_id);
        let client_id = cli.azure_client_id.clone().or(file_azure.client_id);
        let auth = match (
            non_empty(cli.azure_access_token.clone()),
            non_empty(tenant_id),
            non_empty(client_id),
            non_empty(cli.azure_client_secret.clone()),
        ) {
            (Some(token), ..) => Some(AzureAuthConfig::AccessToken(Secret::new(token))),
            (None, Some(tenant_id), Some(client_id), Some(secret)) => {
                Some(AzureAuthConfig::ClientSecret {
                    tenant_id,
                    client_id,
                    client_secret: Secret::new(secret),
                })
            }
            (None, None, client_id, None) => Some(AzureAuthConfig::ManagedIdentity {
                client_id,
                identity_endpoint: non_empty(cli.identity_endpoint.clone()),
                identity_header: non_empty(cli.identity_header.clone()).map(Secret::new),
            }),
            _ => None,
        };
        let azure = AzureConfig {
            monitor_endpoint: cli
                .azure_monitor_endpoint
                .clone()
                .or(file_azure.monitor_endpoint)
                .unwrap_or_else(|| AZURE_MANAGEMENT_ENDPOINT.to_string()),
            authority_host: file_azure
                .authority_host
                .unwrap_or_else(|| AZURE_AUTHORITY_HOST.to_string()),
            imds_endpoint: file_azure
                .imds_endpoint
                .unwrap_or_else(|| AZURE_IMDS_ENDPOINT.to_string()),
            auth,
        };

        let pipeline = PipelineConfig {
            max_concurrency: cli
                .max_concurrency
                .or(file_pipeline.max_concurrency)
                .unwrap_or(DEFAULT_MAX_CONCURRENCY),
            query_timeout: Duration::from_secs(
                cli.query_timeout_secs
                    .or(file_pipeline.query_timeout_secs)
                    .unwrap_or(DEFAULT_QUERY_TIMEOUT_SECS),
            ),
            delivery_timeout: Duration::from_secs(
                cli.delivery_timeout_secs
                    .or(file_pipeline.delivery_timeout_secs)
                    .unwrap_or(DEFAULT_DELIVERY_TIMEOUT_SECS),
            ),
        };

        Self {
            server,
            new_relic,
            azure,
            config_location: cli
                .config_blob_uri
                .clone()
                .or(file_config.config_blob_uri)
                .unwrap_or_default(),
            pipeline,
        }
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.new_relic.license_key.is_empty() {
            anyhow::bail!("Configuration error: {} is required", ENV_NEW_RELIC_LICENSE_KEY);
        }
        if self.config_location.trim().is_empty() {
            anyhow::bail!("Configuration error: {} is required", ENV_CONFIG_BLOB_URI);
        }
        if self.azure.auth.is_none() {
            anyhow::bail!(
                "Configuration error: incomplete Azure credentials; set {} alone, {}/{}/{} together, \
                 or none of them for managed identity ({} optional)",
                ENV_AZURE_ACCESS_TOKEN,
                ENV_AZURE_TENANT_ID,
                ENV_AZURE_CLIENT_ID,
                ENV_AZURE_CLIENT_SECRET,
                ENV_AZURE_CLIENT_ID
            );
        }

        if self.server.host.is_empty() {
            anyhow::bail!("Configuration error: server.host must not be empty");
        }
        if self.server.port == 0 {
            anyhow::bail!("Configuration error: server.port must be greater than 0");
        }

        for (key, url) in [
            ("new_relic.metrics_url", &self.new_relic.metrics_url),
            ("new_relic.logs_url", &self.new_relic.logs_url),
            ("azure.monitor_endpoint", &self.azure.monitor_endpoint),
            ("azure.authority_host", &self.azure.authority_host),
            ("azure.imds_endpoint", &self.azure.imds_endpoint),
        ] {
            reqwest::Url::parse(url)
                .with_context(|| format!("Configuration error: {} is not a valid URL", key))?;
        }

        if self.pipeline.max_concurrency == 0 {
            anyhow::bail!("Configuration error: pipeline.max_concurrency must be greater than 0");
        }
        if self.pipeline.query_timeout.is_zero() || self.pipeline.delivery_timeout.is_zero() {
            anyhow::bail!("Configuration error: pipeline timeouts must be greater than 0");
        }
        if self.new_relic.log_flush_timeout.is_zero() {
            anyhow::bail!("Configuration error: new_relic.log_flush_timeout_secs must be greater than 0");
        }

        if self.pipeline.max_concurrency > 256 {
            tracing::warn!(
                max_concurrency = self.pipeline.max_concurrency,
                "pipeline.max_concurrency is very high, Azure Monitor may throttle requests"
            );
        }

        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
