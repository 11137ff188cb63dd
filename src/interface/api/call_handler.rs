//! Call-control HTTP handlers
//!
//! `/event` is the telephony platform's invocation surface; `/update` is
//! where pipelines (possibly running in another process) deliver translated
//! responses.

use crate::domain::call::action::SipMediaApplicationResponse;
use crate::domain::call::event::SipMediaApplicationEvent;
use crate::domain::call::machine::CallControlMachine;
use crate::domain::shared::error::DomainError;
use crate::infrastructure::telephony::{SipMediaApplicationDriver, UpdateCallRequest};
use crate::pipeline::PipelineLauncher;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    pub machine: Arc<CallControlMachine>,
    pub driver: Arc<SipMediaApplicationDriver>,
    pub launcher: Arc<PipelineLauncher>,
}

/// Domain errors mapped onto HTTP statuses
pub struct ApiError(DomainError);

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            DomainError::Validation(_) | DomainError::Serialization(_) => StatusCode::BAD_REQUEST,
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::AlreadyExists(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!(error = %self.0, status = %status, "Request failed");
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub async fn handle_event(
    State(state): State<AppState>,
    Json(event): Json<SipMediaApplicationEvent>,
) -> Result<Json<SipMediaApplicationResponse>, ApiError> {
    let response = state.machine.handle(&event).await?;
    Ok(Json(response))
}

pub async fn handle_update(
    State(state): State<AppState>,
    Json(request): Json<UpdateCallRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .driver
        .update_call(request.transaction_id, request.arguments)
        .await?;
    Ok(StatusCode::OK)
}
