//! Lines Admin: internet lines management service.
//!
//! Main entry point that loads configuration, wires the backends and
//! starts the server.

use clap::{Parser, ValueEnum};
use lines_api::ApiServer;
use lines_core::config::AppConfig;
use lines_management::ManagementState;
use lines_platform::{AuthEvent, TracingMailer};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Parser, Debug)]
#[command(name = "lines-admin")]
#[command(about = "Admin service for internet subscription lines")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, env = "LINES_ADMIN_CONFIG")]
    config: Option<String>,

    /// Bind address (overrides config)
    #[arg(long, env = "LINES_ADMIN__API__HOST")]
    host: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "LINES_ADMIN__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Metrics port (overrides config)
    #[arg(long, env = "LINES_ADMIN__METRICS__PORT")]
    metrics_port: Option<u16>,

    #[arg(long, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "lines_admin=info,lines_management=info,tower_http=info".into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    info!("Lines Admin starting up");

    // Load configuration
    let mut config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) if cli.config.is_some() => return Err(e.into()),
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            AppConfig::default()
        }
    };

    // Apply CLI overrides
    if let Some(host) = cli.host {
        config.api.host = host;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(port) = cli.metrics_port {
        config.metrics.port = port;
    }

    info!(
        host = %config.api.host,
        http_port = config.api.http_port,
        metrics_port = config.metrics.port,
        admin_gate = config.admin.is_configured(),
        "Configuration loaded"
    );
    if !config.admin.is_configured() {
        warn!("No operator credentials configured; data routes are unreachable");
    }

    let state = ManagementState::from_config(&config, Arc::new(TracingMailer))?;

    // Log auth-state changes
    let mut auth_events = state.provider.subscribe();
    tokio::spawn(async move {
        while let Some(event) = auth_events.recv().await {
            match event {
                AuthEvent::SignedIn { session } => info!(user_id = %session.user.id, "Auth: signed in"),
                AuthEvent::SignedOut { user_id } => info!(user_id = %user_id, "Auth: signed out"),
                AuthEvent::UserUpdated { user_id } => info!(user_id = %user_id, "Auth: user updated"),
            }
        }
    });

    let api_server = ApiServer::new(config.clone(), state);

    // Start metrics exporter
    if let Err(e) = api_server.start_metrics().await {
        error!(error = %e, "Failed to start metrics exporter");
    }

    info!("Lines Admin is ready to serve traffic");

    api_server.start_http().await?;

    info!("Lines Admin shut down");
    Ok(())
}
