//! Call-update dispatch adapters
//!
//! The pipeline hands translated responses to a [`CallUpdateDispatcher`].
//! In-process deployments route straight into the loopback driver; split
//! deployments post the update to the call-control service over HTTP.

use crate::domain::call::dispatch::CallUpdateDispatcher;
use crate::domain::call::event::FunctionArguments;
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::TransactionId;
use crate::infrastructure::telephony::driver::SipMediaApplicationDriver;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Wire form of a call update, shared by the HTTP dispatcher and the
/// `/update` route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateCallRequest {
    pub transaction_id: TransactionId,
    #[serde(flatten)]
    pub arguments: FunctionArguments,
}

/// Dispatches updates into the in-process loopback driver
pub struct DriverDispatcher {
    driver: Arc<SipMediaApplicationDriver>,
}

impl DriverDispatcher {
    pub fn new(driver: Arc<SipMediaApplicationDriver>) -> Self {
        Self { driver }
    }
}

#[async_trait]
impl CallUpdateDispatcher for DriverDispatcher {
    async fn update_call(
        &self,
        transaction_id: TransactionId,
        arguments: FunctionArguments,
    ) -> Result<()> {
        let actions = self.driver.update_call(transaction_id, arguments).await?;
        debug!(%transaction_id, actions = actions.len(), "Dispatched call update");
        Ok(())
    }
}

/// Dispatches updates to a remote call-control surface
pub struct HttpDispatcher {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpDispatcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/update", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl CallUpdateDispatcher for HttpDispatcher {
    async fn update_call(
        &self,
        transaction_id: TransactionId,
        arguments: FunctionArguments,
    ) -> Result<()> {
        let request = UpdateCallRequest {
            transaction_id,
            arguments,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| DomainError::Dispatch(e.to_string()))?;
        if !response.status().is_success() {
            return Err(DomainError::Dispatch(format!(
                "call update rejected with status {}",
                response.status()
            )));
        }
        Ok(())
    }
}
