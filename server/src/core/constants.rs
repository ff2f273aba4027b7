// =============================================================================
// Application Identity
// =============================================================================

/// Application name as registered with the Functions host
pub const APP_NAME: &str = "ForwardMetrics";

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "forward_metrics";

// =============================================================================
// Configuration Files
// =============================================================================

/// Optional local settings file name
pub const SETTINGS_FILE_NAME: &str = "forward-metrics.json";

/// Name of the monitoring config document inside the config container
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Environment variable for settings file path
pub const ENV_SETTINGS: &str = "FORWARD_METRICS_CONFIG";

// =============================================================================
// Environment Variables - Process Secrets
// =============================================================================

/// New Relic license key used for both metric and log ingestion
pub const ENV_NEW_RELIC_LICENSE_KEY: &str = "NEW_RELIC_LICENSE_KEY";

/// Location of the container holding `config.json` (blob URI, `file://` URI or path)
pub const ENV_CONFIG_BLOB_URI: &str = "CONFIG_BLOB_URI";

// =============================================================================
// Environment Variables - Server
// =============================================================================

/// Environment variable for server host
pub const ENV_HOST: &str = "FORWARD_METRICS_HOST";

/// Port assigned by the Azure Functions custom handler host
pub const ENV_PORT: &str = "FUNCTIONS_CUSTOMHANDLER_PORT";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "FORWARD_METRICS_LOG";

/// Environment variable for log output format
pub const ENV_LOG_FORMAT: &str = "FORWARD_METRICS_LOG_FORMAT";

// =============================================================================
// Environment Variables - Pipeline
// =============================================================================

pub const ENV_NEW_RELIC_REGION: &str = "NEW_RELIC_REGION";
pub const ENV_MAX_CONCURRENCY: &str = "FORWARD_METRICS_MAX_CONCURRENCY";
pub const ENV_QUERY_TIMEOUT_SECS: &str = "FORWARD_METRICS_QUERY_TIMEOUT_SECS";
pub const ENV_DELIVERY_TIMEOUT_SECS: &str = "FORWARD_METRICS_DELIVERY_TIMEOUT_SECS";
pub const ENV_LOG_FLUSH_TIMEOUT_SECS: &str = "FORWARD_METRICS_LOG_FLUSH_TIMEOUT_SECS";

// =============================================================================
// Environment Variables - Azure
// =============================================================================

/// Pre-acquired bearer token (skips the client-credentials flow)
pub const ENV_AZURE_ACCESS_TOKEN: &str = "AZURE_ACCESS_TOKEN";
pub const ENV_AZURE_TENANT_ID: &str = "AZURE_TENANT_ID";
pub const ENV_AZURE_CLIENT_ID: &str = "AZURE_CLIENT_ID";
pub const ENV_AZURE_CLIENT_SECRET: &str = "AZURE_CLIENT_SECRET";

/// Local identity endpoint injected by App Service and Azure Functions
pub const ENV_IDENTITY_ENDPOINT: &str = "IDENTITY_ENDPOINT";
pub const ENV_IDENTITY_HEADER: &str = "IDENTITY_HEADER";

// =============================================================================
// Server Defaults
// =============================================================================

/// Default server host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port
pub const DEFAULT_PORT: u16 = 7071;

/// Trigger route, matching the function name
pub const TRIGGER_ROUTE: &str = "/api/ForwardMetrics";

/// Maximum time to wait for an in-flight run during shutdown
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Pipeline Defaults
// =============================================================================

/// Upper bound on concurrently processed instances
pub const DEFAULT_MAX_CONCURRENCY: usize = 16;

/// Timeout for a single backend metric query
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 60;

/// Timeout for a single ingestion POST
pub const DEFAULT_DELIVERY_TIMEOUT_SECS: u64 = 30;

/// Timeout for one telemetry batch sent to the Log API
pub const DEFAULT_LOG_FLUSH_TIMEOUT_SECS: u64 = 10;

/// Timeout for fetching and parsing `config.json`
pub const DEFAULT_CONFIG_FETCH_TIMEOUT_SECS: u64 = 30;

/// Lookback of every metric query
pub const QUERY_WINDOW_MINUTES: i64 = 5;

/// Aggregation granularity of every metric query
pub const QUERY_GRANULARITY_SECS: i64 = 10;

/// Metrics requested for every PostgreSQL flexible server
pub const POSTGRES_METRIC_NAMES: [&str; 7] = [
    "read_iops",
    "write_iops",
    "cpu_percent",
    "memory_percent",
    "read_throughput",
    "write_throughput",
    "connections_failed",
];

/// Prefix prepended to every forwarded metric name
pub const METRIC_NAME_PREFIX: &str = "azure.postgresserver.flexible.";

/// Metric type of every forwarded point
pub const METRIC_TYPE_GAUGE: &str = "gauge";

// =============================================================================
// Azure
// =============================================================================

/// Azure Resource Manager endpoint (Azure Monitor metrics live under it)
pub const AZURE_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";

/// OAuth2 scope for Azure Resource Manager
pub const AZURE_MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

/// OAuth2 scope for Azure Storage
pub const AZURE_STORAGE_SCOPE: &str = "https://storage.azure.com/.default";

/// Microsoft identity platform authority
pub const AZURE_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Azure Monitor metrics REST API version
pub const AZURE_MONITOR_API_VERSION: &str = "2018-01-01";

/// Blob service REST API version sent with token-authenticated reads
pub const AZURE_STORAGE_API_VERSION: &str = "2021-08-06";

/// Instance Metadata Service token endpoint (managed identity fallback)
pub const AZURE_IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

/// API version of the IMDS token endpoint
pub const AZURE_IMDS_API_VERSION: &str = "2018-02-01";

/// API version of the App Service identity endpoint
pub const AZURE_APP_SERVICE_IDENTITY_API_VERSION: &str = "2019-08-01";

/// Refresh cached tokens this many seconds before they expire
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Connect timeout of the shared HTTP client
pub const AZURE_HTTP_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// New Relic
// =============================================================================

pub const NEW_RELIC_EU_METRICS_URL: &str = "https://metric-api.eu.newrelic.com/metric/v1";
pub const NEW_RELIC_EU_LOGS_URL: &str = "https://log-api.eu.newrelic.com/log/v1";
pub const NEW_RELIC_US_METRICS_URL: &str = "https://metric-api.newrelic.com/metric/v1";
pub const NEW_RELIC_US_LOGS_URL: &str = "https://log-api.newrelic.com/log/v1";

/// Header carrying the license key on ingestion requests
pub const NEW_RELIC_API_KEY_HEADER: &str = "Api-Key";
