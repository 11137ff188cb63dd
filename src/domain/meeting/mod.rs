//! Meeting service port and meeting lifecycle events
//!
//! The meeting service is a managed capability consumed through a narrow
//! request/response contract: create a meeting with its first attendee, add
//! an attendee, delete the meeting at teardown.

use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::{AttendeeId, MeetingId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One attendee slot within a meeting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingAttendee {
    pub attendee_id: AttendeeId,
    /// Role label visible to meeting-lifecycle consumers
    pub external_user_id: String,
    /// Opaque credential a call leg presents to join the meeting
    pub join_token: String,
}

/// A created meeting and its attendees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingInfo {
    pub meeting_id: MeetingId,
    pub attendees: Vec<MeetingAttendee>,
}

/// Port for the external meeting service
#[async_trait]
pub trait MeetingClient: Send + Sync {
    /// Create a meeting with one initial attendee
    async fn create_meeting_with_attendee(&self, external_user_id: &str) -> Result<MeetingInfo>;

    /// Add an attendee to an existing meeting
    async fn create_attendee(
        &self,
        meeting_id: &MeetingId,
        external_user_id: &str,
    ) -> Result<MeetingAttendee>;

    /// Delete a meeting, dropping all its attendees
    async fn delete_meeting(&self, meeting_id: &MeetingId) -> Result<()>;
}

/// Meeting lifecycle notifications consumed by the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub enum MeetingEvent {
    MeetingStarted {
        meeting_id: MeetingId,
    },
    AttendeeJoined {
        meeting_id: MeetingId,
        attendee_id: AttendeeId,
        external_user_id: String,
    },
    AttendeeLeft {
        meeting_id: MeetingId,
        attendee_id: AttendeeId,
    },
    /// Per-attendee media capture became readable
    StreamStarted {
        meeting_id: MeetingId,
        attendee_id: AttendeeId,
        external_user_id: String,
        stream_arn: String,
        start_time: DateTime<Utc>,
    },
    StreamEnded {
        meeting_id: MeetingId,
        attendee_id: AttendeeId,
    },
}

/// Hook raised when a call's meeting is torn down
///
/// Lets the pipeline layer cancel the translation pipelines for both legs
/// instead of waiting for their media sources to close.
pub trait CallTeardown: Send + Sync {
    fn on_meeting_ended(&self, meeting_id: &MeetingId);
}
