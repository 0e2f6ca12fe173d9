//! Transaction bundle processing.
//!
//! [`BundleHandler::process`] runs a submitted bundle through a fixed
//! pipeline. Each step either passes or fails the whole request; the
//! backend is only reached once every check has passed.
//!
//! 1. structural validation, then the configured validators
//! 2. bundle type (only `transaction`)
//! 3. classification and capability check
//! 4. normalization (search, vread, history and conditional entries rejected)
//! 5. entry ceiling
//! 6. authorization of the whole request list
//! 7. atomic dispatch to the [`BundleService`]
//! 8. per-entry read filtering, concurrently, with positional write-back
//! 9. rendering of the `transaction-response`

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use helios_interface::TypeOperation;
use helios_interface::core::{
    Authorization, BundleErrorKind, BundleService, TransactionRequest, Validator,
};
use serde_json::{Value, json};
use tracing::{debug, error, warn};

use super::{generator, parser};
use crate::capabilities::{CapabilityResolver, format_unsupported};
use crate::error::{RestError, RestResult};
use crate::extractors::RequestScope;
use crate::profile::FhirConfig;
use crate::validation::validate_resource;

/// Processes transaction bundles posted to the server root.
#[derive(Clone)]
pub struct BundleHandler {
    bundle_service: Arc<dyn BundleService>,
    authorization: Arc<dyn Authorization>,
    capabilities: Arc<CapabilityResolver>,
    validators: Vec<Arc<dyn Validator>>,
    max_entries: usize,
}

impl BundleHandler {
    /// Creates a handler for the backends of `config`.
    pub fn new(
        config: &FhirConfig,
        capabilities: Arc<CapabilityResolver>,
        max_entries: usize,
    ) -> Self {
        Self {
            bundle_service: config.bundle.clone(),
            authorization: config.authorization.clone(),
            capabilities,
            validators: config.validators.clone(),
            max_entries,
        }
    }

    /// Returns the entry ceiling.
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Processes a bundle of type `batch`.
    ///
    /// Batches are not supported; this always fails before any backend call.
    pub async fn process_batch(&self) -> RestResult<Value> {
        Err(RestError::bad_request(parser::ONLY_TRANSACTION_SUPPORTED))
    }

    /// Processes a submitted bundle and returns the `transaction-response`.
    pub async fn process(&self, payload: &Value, scope: &RequestScope) -> RestResult<Value> {
        let start_time = Utc::now();

        let bundle = parser::parse_structure(payload)?;
        if bundle.bundle_type != parser::RequestBundleType::Transaction {
            return self.process_batch().await;
        }
        validate_resource(
            &self.validators,
            "Bundle",
            payload,
            &scope.validator_context(TypeOperation::Create),
        )
        .await?;

        let classified = parser::classify_entries(&bundle, &scope.server_url)?;
        let unsupported = self
            .capabilities
            .unsupported_generic_operations(&parser::requested_operations(&classified));
        if !unsupported.is_empty() {
            return Err(RestError::bad_request(format_unsupported(&unsupported)));
        }

        let requests = parser::normalize(classified)?;
        if requests.len() > self.max_entries {
            return Err(RestError::bad_request(format!(
                "Maximum number of entries for a Bundle is {}. There are currently {} entries in this Bundle",
                self.max_entries,
                requests.len()
            )));
        }

        self.authorization
            .is_bundle_request_authorized(
                &scope.identity,
                &scope.context,
                &requests,
                &scope.server_url,
            )
            .await?;

        debug!(
            entries = requests.len(),
            tenant = ?scope.tenant(),
            "Dispatching transaction bundle"
        );
        let response = self
            .bundle_service
            .transaction(TransactionRequest {
                requests: requests.clone(),
                start_time,
                tenant_id: scope.tenant_id.clone(),
            })
            .await?;

        if !response.success {
            return Err(match response.error_kind {
                Some(BundleErrorKind::User) => RestError::bad_request(response.message),
                Some(BundleErrorKind::System) | None => {
                    error!(reason = %response.message, "Transaction failed in the bundle service");
                    RestError::internal(response.message)
                }
            });
        }

        let mut outcomes = response.batch_read_write_responses;
        if outcomes.len() != requests.len() {
            return Err(RestError::internal(format!(
                "Bundle service answered {} of {} entries",
                outcomes.len(),
                requests.len()
            )));
        }

        let read_indices: Vec<usize> = requests
            .iter()
            .enumerate()
            .filter(|(_, request)| request.operation.is_read_class())
            .map(|(index, _)| index)
            .collect();
        let filtered = join_all(read_indices.iter().map(|&index| {
            self.authorization.authorize_and_filter_read_response(
                &scope.identity,
                &scope.context,
                requests[index].operation,
                outcomes[index].resource.clone(),
                &scope.server_url,
            )
        }))
        .await;

        for (index, result) in read_indices.into_iter().zip(filtered) {
            match result {
                Ok(resource) => outcomes[index].resource = resource,
                Err(e) if e.is_unauthorized() => {
                    warn!(index, "Read entry withheld from the transaction response");
                    outcomes[index].resource = json!({});
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(generator::transaction_response(&scope.server_url, &outcomes))
    }
}
