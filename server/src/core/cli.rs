use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::config::{LogFormat, NewRelicRegion};
use super::constants::{
    ENV_AZURE_ACCESS_TOKEN, ENV_AZURE_CLIENT_ID, ENV_AZURE_CLIENT_SECRET, ENV_AZURE_TENANT_ID,
    ENV_CONFIG_BLOB_URI, ENV_DELIVERY_TIMEOUT_SECS, ENV_HOST, ENV_IDENTITY_ENDPOINT,
    ENV_IDENTITY_HEADER, ENV_LOG_FLUSH_TIMEOUT_SECS, ENV_LOG_FORMAT, ENV_MAX_CONCURRENCY,
    ENV_NEW_RELIC_LICENSE_KEY, ENV_NEW_RELIC_REGION, ENV_PORT, ENV_QUERY_TIMEOUT_SECS,
    ENV_SETTINGS,
};

#[derive(Parser)]
#[command(name = "forward-metrics")]
#[command(
    version,
    about = "Forward Azure PostgreSQL flexible server metrics to New Relic",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Server host address
    #[arg(long, short = 'H', global = true, env = ENV_HOST)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short = 'p', global = true, env = ENV_PORT)]
    pub port: Option<u16>,

    /// Path to settings file
    #[arg(long, short = 'c', global = true, env = ENV_SETTINGS)]
    pub config: Option<PathBuf>,

    /// Log output format (compact or json)
    #[arg(long, global = true, env = ENV_LOG_FORMAT, value_parser = parse_log_format)]
    pub log_format: Option<LogFormat>,

    /// New Relic license key for metric and log ingestion
    #[arg(long, global = true, env = ENV_NEW_RELIC_LICENSE_KEY, hide_env_values = true)]
    pub new_relic_license_key: Option<String>,

    /// New Relic data center (eu or us)
    #[arg(long, global = true, env = ENV_NEW_RELIC_REGION, value_parser = parse_region)]
    pub new_relic_region: Option<NewRelicRegion>,

    /// Metric API endpoint (overrides the region default)
    #[arg(long, global = true)]
    pub new_relic_metrics_url: Option<String>,

    /// Log API endpoint (overrides the region default)
    #[arg(long, global = true)]
    pub new_relic_logs_url: Option<String>,

    /// Timeout for one Log API request, in seconds
    #[arg(long, global = true, env = ENV_LOG_FLUSH_TIMEOUT_SECS)]
    pub log_flush_timeout_secs: Option<u64>,

    /// Container URI holding config.json (blob URI, file:// URI or path)
    #[arg(long, global = true, env = ENV_CONFIG_BLOB_URI)]
    pub config_blob_uri: Option<String>,

    /// Azure Resource Manager endpoint
    #[arg(long, global = true)]
    pub azure_monitor_endpoint: Option<String>,

    /// Pre-acquired Azure bearer token
    #[arg(long, global = true, env = ENV_AZURE_ACCESS_TOKEN, hide_env_values = true)]
    pub azure_access_token: Option<String>,

    /// Azure AD tenant for the client-credentials flow
    #[arg(long, global = true, env = ENV_AZURE_TENANT_ID)]
    pub azure_tenant_id: Option<String>,

    /// Azure AD application (client) id
    #[arg(long, global = true, env = ENV_AZURE_CLIENT_ID)]
    pub azure_client_id: Option<String>,

    /// Azure AD client secret
    #[arg(long, global = true, env = ENV_AZURE_CLIENT_SECRET, hide_env_values = true)]
    pub azure_client_secret: Option<String>,

    /// Managed identity endpoint provided by App Service
    #[arg(long, global = true, env = ENV_IDENTITY_ENDPOINT, hide = true)]
    pub identity_endpoint: Option<String>,

    /// Managed identity header secret provided by App Service
    #[arg(long, global = true, env = ENV_IDENTITY_HEADER, hide = true, hide_env_values = true)]
    pub identity_header: Option<String>,

    /// Instances processed concurrently
    #[arg(long, global = true, env = ENV_MAX_CONCURRENCY)]
    pub max_concurrency: Option<usize>,

    /// Timeout for one Azure Monitor query, in seconds
    #[arg(long, global = true, env = ENV_QUERY_TIMEOUT_SECS)]
    pub query_timeout_secs: Option<u64>,

    /// Timeout for one Metric API delivery, in seconds
    #[arg(long, global = true, env = ENV_DELIVERY_TIMEOUT_SECS)]
    pub delivery_timeout_secs: Option<u64>,
}

/// Parse log format from CLI/env string
fn parse_log_format(s: &str) -> Result<LogFormat, String> {
    match s.to_lowercase().as_str() {
        "compact" => Ok(LogFormat::Compact),
        "json" => Ok(LogFormat::Json),
        _ => Err(format!(
            "Invalid log format '{}'. Valid options: compact, json",
            s
        )),
    }
}

/// Parse New Relic region from CLI/env string
fn parse_region(s: &str) -> Result<NewRelicRegion, String> {
    match s.to_lowercase().as_str() {
        "eu" => Ok(NewRelicRegion::Eu),
        "us" => Ok(NewRelicRegion::Us),
        _ => Err(format!("Invalid New Relic region '{}'. Valid options: eu, us", s)),
    }
}

#[derive(Subcommand, Clone, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Serve the HTTP trigger (default command)
    Serve,
    /// Execute a single forwarding run and exit
    Run,
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub config: Option<PathBuf>,
    pub log_format: Option<LogFormat>,
    pub new_relic_license_key: Option<String>,
    pub new_relic_region: Option<NewRelicRegion>,
    pub new_relic_metrics_url: Option<String>,
    pub new_relic_logs_url: Option<String>,
    pub log_flush_timeout_secs: Option<u64>,
    pub config_blob_uri: Option<String>,
    pub azure_monitor_endpoint: Option<String>,
    pub azure_access_token: Option<String>,
    pub azure_tenant_id: Option<String>,
    pub azure_client_id: Option<String>,
    pub azure_client_secret: Option<String>,
    pub identity_endpoint: Option<String>,
    pub identity_header: Option<String>,
    pub max_concurrency: Option<usize>,
    pub query_timeout_secs: Option<u64>,
    pub delivery_timeout_secs: Option<u64>,
}

impl From<Cli> for CliConfig {
    fn from(cli: Cli) -> Self {
        Self {
            host: cli.host,
            port: cli.port,
            config: cli.config,
            log_format: cli.log_format,
            new_relic_license_key: cli.new_relic_license_key,
            new_relic_region: cli.new_relic_region,
            new_relic_metrics_url: cli.new_relic_metrics_url,
            new_relic_logs_url: cli.new_relic_logs_url,
            log_flush_timeout_secs: cli.log_flush_timeout_secs,
            config_blob_uri: cli.config_blob_uri,
            azure_monitor_endpoint: cli.azure_monitor_endpoint,
            azure_access_token: cli.azure_access_token,
            azure_tenant_id: cli.azure_tenant_id,
            azure_client_id: cli.azure_client_id,
            azure_client_secret: cli.azure_client_secret,
            identity_endpoint: cli.identity_endpoint,
            identity_header: cli.identity_header,
            max_concurrency: cli.max_concurrency,
            query_timeout_secs: cli.query_timeout_secs,
            delivery_timeout_secs: cli.delivery_timeout_secs,
        }
    }
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Option<Commands>) {
    let mut cli = Cli::parse();
    let command = cli.command.take();
    (cli.into(), command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_subcommand_with_flags() {
        let cli = Cli::try_parse_from([
            "forward-metrics",
            "run",
            "--new-relic-region",
            "US",
            "--max-concurrency",
            "4",
        ])
        .unwrap();

        assert_eq!(cli.command, Some(Commands::Run));
        assert_eq!(cli.new_relic_region, Some(NewRelicRegion::Us));
        assert_eq!(cli.max_concurrency, Some(4));
    }

    #[test]
    fn test_parse_rejects_unknown_region() {
        let result = Cli::try_parse_from(["forward-metrics", "--new-relic-region", "apac"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_log_format() {
        assert_eq!(parse_log_format("JSON").unwrap(), LogFormat::Json);
        assert!(parse_log_format("pretty").is_err());
    }
}
