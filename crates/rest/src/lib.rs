//! # helios-rest - FHIR RESTful façade
//!
//! This crate exposes a configurable set of FHIR resource types over HTTP
//! and delegates every data operation to pluggable backends (persistence,
//! search, history, bundle processing, authorization, validation) defined
//! in `helios-interface`.
//!
//! ## Features
//!
//! - **Generic CRUD**: create, read, vread, update, patch and delete for
//!   every configured resource type
//! - **Search and History**: type, instance and system level, rendered as
//!   `searchset` and `history` Bundles
//! - **Transactions**: `POST /` with a transaction Bundle, authorized as a
//!   whole and executed atomically by the bundle backend
//! - **Capabilities**: per-type interaction lists for STU3 and R4, generic
//!   and special resources
//! - **Multi-Tenant**: tenant resolution from token claims and
//!   `/tenant/{id}` URLs
//! - **Subscription Validation**: endpoint allow lists and the active
//!   subscription limit
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use helios_interface::FhirVersion;
//! use helios_interface::backends::{MemoryBackend, PassThroughAuthorization};
//! use helios_rest::{create_app, profile::FhirConfig, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let fhir = FhirConfig::from_backend(
//!         FhirVersion::R4,
//!         Arc::new(MemoryBackend::new()),
//!         Arc::new(PassThroughAuthorization::default()),
//!     );
//!     let app = create_app(fhir, ServerConfig::default());
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## API Endpoints
//!
//! | Interaction | HTTP Method | URL Pattern |
//! |------------|-------------|-------------|
//! | read | GET | `/[type]/[id]` |
//! | vread | GET | `/[type]/[id]/_history/[vid]` |
//! | update | PUT | `/[type]/[id]` |
//! | patch | PATCH | `/[type]/[id]` |
//! | delete | DELETE | `/[type]/[id]` |
//! | create | POST | `/[type]` |
//! | search | GET/POST | `/[type]?params` or `/[type]/_search` |
//! | search (system) | GET | `/?params` or `/_search?params` |
//! | history (instance) | GET | `/[type]/[id]/_history` |
//! | history (type) | GET | `/[type]/_history` |
//! | history (system) | GET | `/_history` |
//! | transaction | POST | `/` |
//! | US Core `$docref` (when declared) | GET/POST | `/DocumentReference/$docref` |
//!
//! With tenant-specific URLs enabled every endpoint is also available
//! below `/tenant/[tenantId]`.
//!
//! ## Error Handling
//!
//! All errors are returned as FHIR [OperationOutcome](https://hl7.org/fhir/operationoutcome.html)
//! resources; see [`error`] for the status mapping.
//!
//! ## Architecture
//!
//! - [`config`] - Server configuration
//! - [`profile`] - Backends and the resource types they serve
//! - [`capabilities`] - Which interactions each resource type offers
//! - [`tenant`] - Tenant resolution
//! - [`bundle`] - Transaction bundle parsing, processing and rendering
//! - [`validation`] - Resource validation, including Subscriptions
//! - [`handlers`] - HTTP request handlers for each interaction
//! - [`middleware`] - Server URL, identity and tenant middleware
//! - [`extractors`] - Axum extractors for FHIR-specific data
//! - [`responses`] - Response formatting and header generation
//! - [`routing`] - Route configuration

// Enforce documentation
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod bundle;
pub mod capabilities;
pub mod config;
pub mod error;
pub mod extractors;
pub mod fhir_types;
pub mod handlers;
pub mod middleware;
pub mod profile;
pub mod responses;
pub mod routing;
pub mod state;
pub mod tenant;
pub mod validation;

// Re-export commonly used types
pub use config::ServerConfig;
pub use error::{RestError, RestResult};
pub use state::AppState;

use axum::{Router, extract::DefaultBodyLimit, middleware::from_fn_with_state};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

use crate::profile::FhirConfig;

/// Creates the Axum application.
///
/// This function sets up the complete FHIR REST API with all handlers,
/// middleware, and configuration.
///
/// # Arguments
///
/// * `fhir` - The FHIR profile: version, backends and resource types
/// * `config` - Server configuration
pub fn create_app(fhir: FhirConfig, config: ServerConfig) -> Router {
    info!(
        fhir_version = %fhir.fhir_version,
        server_url = %config.server_url(),
        multi_tenancy = config.enable_multi_tenancy,
        "Creating REST API server"
    );

    let state = AppState::new(fhir, config.clone());

    // Layers run bottom-up: server URL, then identity, then tenant
    let router = routing::create_routes(state.clone())
        .layer(from_fn_with_state(
            state.clone(),
            middleware::tenant_middleware,
        ))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::identity_middleware,
        ))
        .layer(from_fn_with_state(state, middleware::server_url_middleware))
        .layer(DefaultBodyLimit::max(config.max_body_size));

    // Build middleware stack
    let service_builder = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            axum::http::StatusCode::REQUEST_TIMEOUT,
            std::time::Duration::from_secs(config.request_timeout),
        ));

    // Add CORS if enabled
    let router = if config.enable_cors {
        let cors = build_cors_layer(&config);
        router.layer(cors)
    } else {
        router
    };

    router.layer(service_builder)
}

/// Builds the CORS layer based on configuration.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let mut cors = CorsLayer::new();

    if config.cors_origins == "*" {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_origin(origins);
    }

    if config.cors_methods == "*" {
        cors = cors.allow_methods(Any);
    } else {
        let methods: Vec<_> = config
            .cors_methods
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_methods(methods);
    }

    if config.cors_headers == "*" {
        cors = cors.allow_headers(Any);
    } else {
        let headers: Vec<_> = config
            .cors_headers
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_headers(headers);
    }

    cors
}

/// Initializes the tracing subscriber for logging.
///
/// This should be called once at application startup. `RUST_LOG` takes
/// precedence over `level`.
///
/// # Arguments
///
/// * `level` - The log level (error, warn, info, debug, trace)
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "helios_rest={level},helios_hfs={level},tower_http=debug"
        ))
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}
