//! Local meeting service adapter
//!
//! Tracks live meetings in memory and fans meeting lifecycle events out on
//! a broadcast channel. Stream notifications are injected by the media
//! layer through [`LocalMeetingClient::notify`], since media capture lives
//! outside the meeting service proper.

use crate::domain::meeting::{MeetingAttendee, MeetingClient, MeetingEvent, MeetingInfo};
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::{AttendeeId, MeetingId};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;
use std::collections::HashMap;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};

const EVENT_CHANNEL_CAPACITY: usize = 64;

pub struct LocalMeetingClient {
    meetings: Mutex<HashMap<MeetingId, MeetingInfo>>,
    events: broadcast::Sender<MeetingEvent>,
}

impl LocalMeetingClient {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            meetings: Mutex::new(HashMap::new()),
            events,
        }
    }

    /// Subscribe to meeting lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<MeetingEvent> {
        self.events.subscribe()
    }

    /// Publish an externally observed event, such as a media stream
    /// becoming readable
    pub fn notify(&self, event: MeetingEvent) {
        // No subscribers is fine; events are advisory
        let _ = self.events.send(event);
    }

    pub async fn live_meeting_count(&self) -> usize {
        self.meetings.lock().await.len()
    }

    fn new_join_token() -> String {
        let mut bytes = [0u8; 24];
        rand::thread_rng().fill_bytes(&mut bytes);
        STANDARD.encode(bytes)
    }
}

impl Default for LocalMeetingClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MeetingClient for LocalMeetingClient {
    async fn create_meeting_with_attendee(&self, external_user_id: &str) -> Result<MeetingInfo> {
        let meeting_id = MeetingId::new();
        let attendee = MeetingAttendee {
            attendee_id: AttendeeId::new(),
            external_user_id: external_user_id.to_string(),
            join_token: Self::new_join_token(),
        };
        let info = MeetingInfo {
            meeting_id,
            attendees: vec![attendee.clone()],
        };
        self.meetings.lock().await.insert(meeting_id, info.clone());
        info!(%meeting_id, external_user_id, "Created meeting");

        self.notify(MeetingEvent::MeetingStarted { meeting_id });
        self.notify(MeetingEvent::AttendeeJoined {
            meeting_id,
            attendee_id: attendee.attendee_id,
            external_user_id: attendee.external_user_id,
        });
        Ok(info)
    }

    async fn create_attendee(
        &self,
        meeting_id: &MeetingId,
        external_user_id: &str,
    ) -> Result<MeetingAttendee> {
        let mut meetings = self.meetings.lock().await;
        let meeting = meetings.get_mut(meeting_id).ok_or_else(|| {
            DomainError::NotFound(format!("meeting {meeting_id} is not live"))
        })?;
        let attendee = MeetingAttendee {
            attendee_id: AttendeeId::new(),
            external_user_id: external_user_id.to_string(),
            join_token: Self::new_join_token(),
        };
        meeting.attendees.push(attendee.clone());
        debug!(%meeting_id, external_user_id, attendee_id = %attendee.attendee_id, "Added attendee");
        drop(meetings);

        self.notify(MeetingEvent::AttendeeJoined {
            meeting_id: *meeting_id,
            attendee_id: attendee.attendee_id,
            external_user_id: attendee.external_user_id.clone(),
        });
        Ok(attendee)
    }

    async fn delete_meeting(&self, meeting_id: &MeetingId) -> Result<()> {
        let removed = self.meetings.lock().await.remove(meeting_id).ok_or_else(|| {
            DomainError::NotFound(format!("meeting {meeting_id} is not live"))
        })?;
        info!(%meeting_id, "Deleted meeting");
        for attendee in removed.attendees {
            self.notify(MeetingEvent::AttendeeLeft {
                meeting_id: *meeting_id,
                attendee_id: attendee.attendee_id,
            });
        }
        Ok(())
    }
}
