//! Media-stream trigger and health handlers

use super::call_handler::AppState;
use crate::domain::shared::value_objects::{AttendeeId, MeetingId};
use crate::pipeline::PipelineContext;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Notification that an attendee's capture stream became readable
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallStreamRequest {
    pub meeting_id: MeetingId,
    pub attendee_id: AttendeeId,
    pub external_user_id: String,
    pub stream_arn: String,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
}

/// Accepts the stream notification and launches the pipeline in the
/// background; the caller does not wait for the call to finish
pub async fn handle_call_stream(
    State(state): State<AppState>,
    Json(request): Json<CallStreamRequest>,
) -> StatusCode {
    info!(
        meeting_id = %request.meeting_id,
        attendee_id = %request.attendee_id,
        stream_arn = %request.stream_arn,
        "Received stream notification"
    );
    state.launcher.launch(PipelineContext {
        meeting_id: request.meeting_id,
        attendee_id: request.attendee_id,
        external_user_id: request.external_user_id,
        stream_arn: request.stream_arn,
    });
    StatusCode::ACCEPTED
}

pub async fn health_check() -> &'static str {
    "OK"
}
