//! Helios FHIR Server (HFS)
//!
//! Serves every R4 resource type from the in-process reference backend.

use std::sync::Arc;

use clap::Parser;
use helios_interface::FhirVersion;
use helios_interface::backends::{MemoryBackend, PassThroughAuthorization};
use helios_rest::profile::FhirConfig;
use helios_rest::validation::{SubscriptionEndpoint, SubscriptionValidator};
use helios_rest::{ServerConfig, create_app, init_logging};
use tracing::info;

/// Command line of the `hfs` binary.
#[derive(Debug, Parser)]
#[command(name = "hfs")]
#[command(about = "FHIR RESTful façade with bundle transactions and multi-tenancy")]
struct Cli {
    #[command(flatten)]
    server: ServerConfig,

    /// Subscription endpoints allowed as rest-hook targets.
    ///
    /// A leading `^` makes the entry a regular expression. Under
    /// multi-tenancy, entries take the form `{tenantId}={endpoint}`.
    #[arg(
        long = "subscription-endpoint",
        env = "REST_SUBSCRIPTION_ENDPOINTS",
        value_delimiter = ','
    )]
    subscription_endpoints: Vec<String>,
}

/// Parses one allow-list entry.
fn parse_endpoint(entry: &str, multi_tenant: bool) -> anyhow::Result<SubscriptionEndpoint> {
    let entry = entry.trim();
    if multi_tenant {
        if let Some((tenant, endpoint)) = entry.split_once('=') {
            let is_tenant = !tenant.is_empty()
                && tenant
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
            if is_tenant {
                return Ok(SubscriptionEndpoint::parse(endpoint)?.for_tenant(tenant));
            }
        }
    }
    Ok(SubscriptionEndpoint::parse(entry)?)
}

/// Builds the R4 profile served by the reference backend.
fn build_profile(
    config: &ServerConfig,
    endpoints: Vec<SubscriptionEndpoint>,
) -> FhirConfig {
    let backend = Arc::new(MemoryBackend::new());
    let subscriptions = SubscriptionValidator::new(
        backend.clone(),
        backend.clone(),
        endpoints,
        config.enable_multi_tenancy,
    );

    FhirConfig::from_backend(
        FhirVersion::R4,
        backend,
        Arc::new(PassThroughAuthorization::default()),
    )
    .with_validator(Arc::new(subscriptions))
}

/// Starts the Axum HTTP server.
async fn serve(app: axum::Router, config: &ServerConfig) -> anyhow::Result<()> {
    let addr = config.socket_addr();
    info!(address = %addr, "Server listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.server;
    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    let endpoints = cli
        .subscription_endpoints
        .iter()
        .filter(|e| !e.trim().is_empty())
        .map(|e| parse_endpoint(e, config.enable_multi_tenancy))
        .collect::<anyhow::Result<Vec<_>>>()?;

    info!(
        port = config.port,
        host = %config.host,
        server_url = %config.server_url(),
        multi_tenancy = config.enable_multi_tenancy,
        subscription_endpoints = endpoints.len(),
        "Starting Helios FHIR Server"
    );

    let app = create_app(build_profile(&config, endpoints), config.clone());
    serve(app, &config).await
}
