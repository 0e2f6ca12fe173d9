//! FHIR route configuration.
//!
//! Defines all routes for the FHIR RESTful API.

use axum::{
    Router,
    routing::{get, post},
};

use crate::handlers;
use crate::middleware::tenant_prefix::TENANT_SEGMENT;
use crate::state::AppState;

/// The FHIR routes, state not yet applied.
///
/// # Routes
///
/// ## System-level
/// - `POST /` - Transaction
/// - `GET /` and `GET /_search` - System search
/// - `GET /_history` - System history
///
/// ## Type-level
/// - `GET /{type}` - Search
/// - `POST /{type}` - Create
/// - `POST /{type}/_search` - Search (POST)
/// - `GET /{type}/_history` - Type history
///
/// ## Instance-level
/// - `GET /{type}/{id}` - Read
/// - `PUT /{type}/{id}` - Update
/// - `PATCH /{type}/{id}` - Patch
/// - `DELETE /{type}/{id}` - Delete
/// - `GET /{type}/{id}/_history` - Instance history
/// - `GET /{type}/{id}/_history/{vid}` - Version read
///
/// Types and interactions the server does not offer are answered with 404
/// by the handlers.
pub fn fhir_routes() -> Router<AppState> {
    Router::new()
        // System-level routes
        .route(
            "/",
            post(handlers::batch_handler).get(handlers::search_system_handler),
        )
        .route("/_search", get(handlers::search_system_handler))
        .route("/_history", get(handlers::history_system_handler))
        // Type-level routes
        .route(
            "/{resource_type}",
            get(handlers::search_get_handler).post(handlers::create_handler),
        )
        .route(
            "/{resource_type}/_search",
            post(handlers::search_post_handler),
        )
        .route(
            "/{resource_type}/_history",
            get(handlers::history_type_handler),
        )
        // Instance-level routes
        .route(
            "/{resource_type}/{id}",
            get(handlers::read_handler)
                .put(handlers::update_handler)
                .patch(handlers::patch_handler)
                .delete(handlers::delete_handler),
        )
        .route(
            "/{resource_type}/{id}/_history",
            get(handlers::history_instance_handler),
        )
        .route(
            "/{resource_type}/{id}/_history/{vid}",
            get(handlers::vread_handler),
        )
}

/// Creates all FHIR REST API routes.
///
/// The mounted operation definitions are served alongside. With
/// tenant-specific URLs every route is also served below
/// `/tenant/{tenant_id}`.
pub fn create_routes(state: AppState) -> Router {
    let routes = fhir_routes().merge(state.operations().routes());
    let routes = if state.config().use_tenant_specific_url {
        let prefix = format!("/{}/{{tenant_id}}", TENANT_SEGMENT);
        routes.clone().nest(&prefix, routes)
    } else {
        routes
    };
    routes.with_state(state)
}
