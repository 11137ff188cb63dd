//! Meeting-event orchestration
//!
//! Listens to meeting lifecycle events and drives the cross-call choreography
//! the control machine cannot do from inside a single transaction: placing
//! the outbound call once the inbound party has joined, and launching a
//! translation pipeline when an attendee's capture stream becomes readable.

use crate::domain::attendee::{AttendeeRecord, AttendeeStore, AttendeeType};
use crate::domain::call::event::FunctionArguments;
use crate::domain::meeting::{MeetingClient, MeetingEvent};
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::MeetingId;
use crate::infrastructure::meetings::LocalMeetingClient;
use crate::infrastructure::telephony::SipMediaApplicationDriver;
use crate::pipeline::{PipelineContext, PipelineLauncher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// The join event can outrun the attendee record write; poll briefly
const RECORD_POLL_ATTEMPTS: u32 = 20;
const RECORD_POLL_INTERVAL: Duration = Duration::from_millis(25);

pub struct MeetingOrchestrator {
    driver: Arc<SipMediaApplicationDriver>,
    meetings: Arc<LocalMeetingClient>,
    attendees: Arc<dyn AttendeeStore>,
    launcher: Arc<PipelineLauncher>,
}

impl MeetingOrchestrator {
    pub fn new(
        driver: Arc<SipMediaApplicationDriver>,
        meetings: Arc<LocalMeetingClient>,
        attendees: Arc<dyn AttendeeStore>,
        launcher: Arc<PipelineLauncher>,
    ) -> Self {
        Self {
            driver,
            meetings,
            attendees,
            launcher,
        }
    }

    /// Consume meeting events until the channel closes
    pub async fn run(&self, mut events: broadcast::Receiver<MeetingEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => self.handle(event).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Lagged behind meeting events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    pub async fn handle(&self, event: MeetingEvent) {
        match event {
            MeetingEvent::AttendeeJoined {
                meeting_id,
                external_user_id,
                ..
            } if external_user_id == AttendeeType::Inbound.as_str() => {
                if let Err(e) = self.place_outbound_call(&meeting_id).await {
                    error!(error = %e, %meeting_id, "Failed to place outbound call");
                }
            }
            MeetingEvent::StreamStarted {
                meeting_id,
                attendee_id,
                external_user_id,
                stream_arn,
                ..
            } => {
                self.launcher.launch(PipelineContext {
                    meeting_id,
                    attendee_id,
                    external_user_id,
                    stream_arn,
                });
            }
            other => debug!(event = ?other, "Ignoring meeting event"),
        }
    }

    async fn place_outbound_call(&self, meeting_id: &MeetingId) -> Result<()> {
        let inbound = self.wait_for_inbound_record(meeting_id).await?;
        let to_call_number = inbound.to_call_number.clone().ok_or_else(|| {
            DomainError::Validation(format!(
                "inbound record for meeting {meeting_id} has no dial target"
            ))
        })?;
        let to_call_language = inbound
            .to_call_language
            .clone()
            .unwrap_or_else(|| "passthru".to_string());

        let attendee = self
            .meetings
            .create_attendee(meeting_id, AttendeeType::Outbound.as_str())
            .await?;
        info!(
            %meeting_id,
            attendee_id = %attendee.attendee_id,
            %to_call_number,
            %to_call_language,
            "Placing outbound call"
        );

        let arguments = FunctionArguments::OutboundCall {
            attendee_id: attendee.attendee_id,
            meeting_id: *meeting_id,
            to_call_number: to_call_number.clone(),
            to_call_language,
        };
        let caller_id = inbound.called_number.clone().unwrap_or_default();
        self.driver
            .create_call(&caller_id, &to_call_number, arguments)
            .await?;
        Ok(())
    }

    async fn wait_for_inbound_record(&self, meeting_id: &MeetingId) -> Result<AttendeeRecord> {
        for attempt in 0..RECORD_POLL_ATTEMPTS {
            let records = self.attendees.query_by_meeting(meeting_id).await?;
            if let Some(inbound) = records
                .into_iter()
                .find(|r| r.attendee_type == AttendeeType::Inbound)
            {
                return Ok(inbound);
            }
            debug!(%meeting_id, attempt, "Inbound attendee record not visible yet");
            tokio::time::sleep(RECORD_POLL_INTERVAL).await;
        }
        Err(DomainError::NotFound(format!(
            "no inbound attendee record for meeting {meeting_id}"
        )))
    }
}
