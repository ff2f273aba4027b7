//! Core application

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::api::{ApiServer, AppState};
use crate::core::banner;
use crate::core::cli::{self, CliConfig, Commands};
use crate::core::config::{AppConfig, AzureAuthConfig, LogFormat};
use crate::core::constants::{APP_NAME_LOWER, AZURE_HTTP_TIMEOUT_SECS, ENV_LOG};
use crate::core::shutdown::ShutdownService;
use crate::data::azure::{
    AzureCredential, AzureMonitorClient, ClientSecretCredential, ManagedIdentityCredential,
    ManagedIdentitySource,
};
use crate::data::config_source;
use crate::data::newrelic::{NewRelicClient, NewRelicSettings};
use crate::domain::inventory::ConfigReader;
use crate::domain::metrics::ForwardPipeline;
use crate::utils::time::{Clock, SystemClock};

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: AppConfig,
    pub pipeline: Arc<ForwardPipeline>,
    pub newrelic: NewRelicClient,
    pub clock: Arc<dyn Clock>,
    config_source: String,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();

        let (cli_config, command) = cli::parse();
        Self::init_logging(cli_config.log_format.unwrap_or_default());

        tracing::debug!("Application starting");
        tracing::trace!(command = ?command, "Parsed command");

        let app = Self::init(&cli_config)?;
        match command {
            Some(Commands::Run) => app.run_once().await,
            Some(Commands::Serve) | None => app.start_server().await,
        }
    }

    fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(AZURE_HTTP_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;

        let auth = config
            .azure
            .auth
            .clone()
            .context("Azure credentials are incomplete")?;
        let credential = Arc::new(match auth {
            AzureAuthConfig::AccessToken(token) => AzureCredential::Static(token),
            AzureAuthConfig::ClientSecret {
                tenant_id,
                client_id,
                client_secret,
            } => AzureCredential::ClientSecret(ClientSecretCredential::new(
                http.clone(),
                config.azure.authority_host.clone(),
                tenant_id,
                client_id,
                client_secret,
            )),
            AzureAuthConfig::ManagedIdentity {
                client_id,
                identity_endpoint,
                identity_header,
            } => {
                let source = match (identity_endpoint, identity_header) {
                    (Some(endpoint), Some(header)) => {
                        ManagedIdentitySource::AppService { endpoint, header }
                    }
                    _ => ManagedIdentitySource::Imds {
                        endpoint: config.azure.imds_endpoint.clone(),
                    },
                };
                tracing::debug!(?source, user_assigned = client_id.is_some(), "Using managed identity");
                AzureCredential::ManagedIdentity(ManagedIdentityCredential::new(
                    http.clone(),
                    source,
                    client_id,
                ))
            }
        });

        // A SAS query string already authorizes the blob read
        let blob_credential =
            (!config.config_location.contains('?')).then(|| Arc::clone(&credential));
        let source =
            config_source::from_location(&config.config_location, http.clone(), blob_credential)
                .context("Invalid config location")?;
        let config_source = source.describe();
        tracing::debug!(source = %config_source, "Config source selected");

        let newrelic = NewRelicClient::new(
            http.clone(),
            NewRelicSettings {
                metrics_url: config.new_relic.metrics_url.clone(),
                logs_url: config.new_relic.logs_url.clone(),
                api_key: config.new_relic.license_key.clone(),
            },
        )
        .with_log_timeout(config.new_relic.log_flush_timeout);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let backend = Arc::new(AzureMonitorClient::new(
            http,
            config.azure.monitor_endpoint.clone(),
            credential,
        ));
        let reader = ConfigReader::new(source, newrelic.clone(), clock.clone());
        let pipeline = Arc::new(ForwardPipeline::new(
            reader,
            backend,
            newrelic.clone(),
            clock.clone(),
            config.pipeline.clone(),
        ));

        Ok(Self {
            shutdown: ShutdownService::default(),
            config,
            pipeline,
            newrelic,
            clock,
            config_source,
        })
    }

    fn init_logging(format: LogFormat) {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        let builder = tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true);

        match format {
            LogFormat::Compact => builder
                .with_ansi(true)
                .compact()
                .with_env_filter(filter)
                .init(),
            LogFormat::Json => builder
                .with_ansi(false)
                .json()
                .with_env_filter(filter)
                .init(),
        }
    }

    async fn run_once(self) -> Result<()> {
        tracing::info!(source = %self.config_source, "Executing a single forwarding run");
        self.pipeline.run().await;
        Ok(())
    }

    async fn start_server(self) -> Result<()> {
        let state = AppState {
            pipeline: self.pipeline.clone(),
            newrelic: self.newrelic.clone(),
            clock: self.clock.clone(),
            shutdown: self.shutdown.clone(),
        };
        let server = ApiServer::bind(&self.config.server, state).await?;

        banner::print_banner(&self.config, &self.config_source);

        let shutdown = self.shutdown.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = server.serve(shutdown.wait()).await {
                tracing::error!(error = %e, "HTTP server error");
            }
            shutdown.trigger();
        });
        self.shutdown.register(handle).await;

        self.shutdown.install_signal_handlers();
        self.shutdown.wait().await;
        self.shutdown.shutdown().await;

        Ok(())
    }
}
