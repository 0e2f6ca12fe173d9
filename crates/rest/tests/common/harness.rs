//! REST API test harness.
//!
//! Provides infrastructure for testing the REST API endpoints against the
//! in-memory reference backend.

use std::sync::Arc;

use axum::http::{HeaderValue, header};
use axum_test::{TestRequest, TestServer};
use helios_interface::FhirVersion;
use helios_interface::backends::{MemoryBackend, PassThroughAuthorization};
use helios_interface::core::{Authorization, Persistence};
use serde_json::Value;

use helios_rest::profile::FhirConfig;
use helios_rest::{ServerConfig, create_app};

/// Server URL every harness is configured with.
pub const SERVER_URL: &str = "https://fhir.example.com";

/// Test harness for REST API testing.
///
/// # Example
///
/// ```rust,ignore
/// let harness = RestTestHarness::new();
/// harness.seed(None, fixtures::patient("123", "male")).await;
///
/// let response = harness.get("/Patient/123").await;
/// assert_eq!(response.status_code(), 200);
/// ```
pub struct RestTestHarness {
    /// The test server instance.
    pub server: TestServer,
    /// The storage backend.
    pub backend: Arc<MemoryBackend>,
    /// Server configuration.
    pub config: ServerConfig,
    token: Option<String>,
}

impl RestTestHarness {
    /// A single-tenant server granting everything.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts a customised harness.
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder {
            config: ServerConfig::for_testing(),
            authorization: Arc::new(PassThroughAuthorization::default()),
            customize: Box::new(|fhir, _| fhir),
        }
    }

    /// Sends every following request with `Authorization: Bearer {token}`.
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    /// Stores `resource` directly in the backend.
    pub async fn seed(&self, tenant_id: Option<&str>, resource: Value) -> Value {
        let resource_type = resource["resourceType"]
            .as_str()
            .expect("fixture without resourceType")
            .to_string();
        let id = resource["id"].as_str().map(String::from);
        self.backend
            .create_resource(tenant_id, &resource_type, resource, id.as_deref())
            .await
            .expect("Failed to seed resource")
    }

    /// Reads a resource straight from the backend.
    pub async fn stored(&self, tenant_id: Option<&str>, resource_type: &str, id: &str) -> Option<Value> {
        self.backend
            .read_resource(tenant_id, resource_type, id)
            .await
            .ok()
    }

    fn authorize(&self, request: TestRequest) -> TestRequest {
        match &self.token {
            Some(token) => request.add_header(
                header::AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token)).expect("token header"),
            ),
            None => request,
        }
    }

    /// Makes a GET request.
    pub async fn get(&self, path: &str) -> axum_test::TestResponse {
        self.authorize(self.server.get(path)).await
    }

    /// Makes a POST request with a JSON body.
    pub async fn post(&self, path: &str, body: Value) -> axum_test::TestResponse {
        self.authorize(self.server.post(path)).json(&body).await
    }

    /// Makes a PUT request with a JSON body.
    pub async fn put(&self, path: &str, body: Value) -> axum_test::TestResponse {
        self.authorize(self.server.put(path)).json(&body).await
    }

    /// Makes a PATCH request with a JSON merge patch body.
    pub async fn patch(&self, path: &str, body: Value) -> axum_test::TestResponse {
        self.authorize(self.server.patch(path)).json(&body).await
    }

    /// Makes a DELETE request.
    pub async fn delete(&self, path: &str) -> axum_test::TestResponse {
        self.authorize(self.server.delete(path)).await
    }

    /// Makes a form-encoded POST request.
    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> axum_test::TestResponse {
        self.authorize(self.server.post(path)).form(&form).await
    }
}

/// Builder for [`RestTestHarness`].
pub struct HarnessBuilder {
    config: ServerConfig,
    authorization: Arc<dyn Authorization>,
    customize: Box<dyn FnOnce(FhirConfig, Arc<MemoryBackend>) -> FhirConfig>,
}

impl HarnessBuilder {
    /// Replaces the server configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the authorization backend.
    pub fn authorization(mut self, authorization: impl Authorization + 'static) -> Self {
        self.authorization = Arc::new(authorization);
        self
    }

    /// Adjusts the FHIR profile before the app is built.
    ///
    /// The closure also receives the backend, for validators that need it.
    pub fn profile(
        mut self,
        customize: impl FnOnce(FhirConfig, Arc<MemoryBackend>) -> FhirConfig + 'static,
    ) -> Self {
        self.customize = Box::new(customize);
        self
    }

    /// Builds the app and the test server.
    pub fn build(self) -> RestTestHarness {
        let backend = Arc::new(MemoryBackend::new());
        let fhir = FhirConfig::from_backend(FhirVersion::R4, backend.clone(), self.authorization);
        let fhir = (self.customize)(fhir, backend.clone());

        let config = ServerConfig {
            base_url: SERVER_URL.to_string(),
            ..self.config
        };
        let app = create_app(fhir, config.clone());
        let server = TestServer::new(app).expect("Failed to create test server");

        RestTestHarness {
            server,
            backend,
            config,
            token: None,
        }
    }
}
