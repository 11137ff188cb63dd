//! Call-control state machine
//!
//! Invoked once per telephony event. The transaction attributes come in on
//! the event and go out on the response; the machine itself is stateless
//! across invocations. External effects (meeting create/delete, record
//! writes, counter updates) go through the domain ports.

use crate::config::Config;
use crate::domain::attendee::{AttendeeRecord, AttendeeStore, AttendeeType, CallCountStore};
use crate::domain::call::action::{Action, SipMediaApplicationResponse};
use crate::domain::call::attributes::{CallTransaction, EnqueueOutcome, Utterance};
use crate::domain::call::event::{
    ActionType, FunctionArguments, InvocationEventType, ParticipantTag, SipMediaApplicationEvent,
};
use crate::domain::meeting::{CallTeardown, MeetingClient};
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::Language;
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct CallControlMachine {
    config: Arc<Config>,
    attendees: Arc<dyn AttendeeStore>,
    call_count: Arc<dyn CallCountStore>,
    meetings: Arc<dyn MeetingClient>,
    teardown: Option<Arc<dyn CallTeardown>>,
}

impl CallControlMachine {
    pub fn new(
        config: Arc<Config>,
        attendees: Arc<dyn AttendeeStore>,
        call_count: Arc<dyn CallCountStore>,
        meetings: Arc<dyn MeetingClient>,
    ) -> Self {
        Self {
            config,
            attendees,
            call_count,
            meetings,
            teardown: None,
        }
    }

    /// Attach the hook that cancels the call's pipelines at meeting teardown
    pub fn with_teardown(mut self, teardown: Arc<dyn CallTeardown>) -> Self {
        self.teardown = Some(teardown);
        self
    }

    /// Handle one telephony event: (event, persisted attributes) ->
    /// (actions, updated attributes)
    pub async fn handle(
        &self,
        event: &SipMediaApplicationEvent,
    ) -> Result<SipMediaApplicationResponse> {
        let mut tx = CallTransaction::from_wire(event.call_details.transaction_attributes.as_ref());
        info!(
            transaction_id = %event.call_details.transaction_id,
            event_type = ?event.invocation_event_type,
            "Handling telephony event"
        );

        let reported_action = event.action_data.as_ref().map(|data| data.action_type);

        let actions = match event.invocation_event_type {
            InvocationEventType::Ringing => Vec::new(),
            InvocationEventType::NewInboundCall => {
                self.on_new_inbound_call(event, &mut tx).await?
            }
            InvocationEventType::NewOutboundCall => self.on_new_outbound_call(event, &mut tx),
            InvocationEventType::ActionSuccessful => match reported_action {
                Some(ActionType::JoinMeeting) => self.on_join_meeting_successful(event, &mut tx),
                Some(ActionType::CallAndBridge) => {
                    record_leg_call_ids(event, &mut tx);
                    Vec::new()
                }
                Some(ActionType::Speak) => self.on_speak_completed(event, &mut tx),
                _ => Vec::new(),
            },
            InvocationEventType::ActionInterrupted => match reported_action {
                Some(ActionType::Speak) => self.on_speak_interrupted(event, &mut tx),
                _ => Vec::new(),
            },
            InvocationEventType::ActionFailed => match reported_action {
                // A failed playback is popped like a completed one so the
                // queue keeps draining
                Some(ActionType::Speak) => self.on_speak_completed(event, &mut tx),
                _ => Vec::new(),
            },
            InvocationEventType::CallUpdateRequested => self.on_call_update(event, &mut tx),
            InvocationEventType::Hangup => self.on_hangup(event, &mut tx).await,
            InvocationEventType::CallAnswered => self.on_call_answered(event, &mut tx).await?,
            InvocationEventType::Invalid => {
                warn!("Unrecognized invocation event type; no actions");
                Vec::new()
            }
        };

        Ok(SipMediaApplicationResponse::new(actions, tx.to_wire()))
    }

    async fn on_new_inbound_call(
        &self,
        event: &SipMediaApplicationEvent,
        tx: &mut CallTransaction,
    ) -> Result<Vec<Action>> {
        let participant = event.call_details.participants.first().ok_or_else(|| {
            DomainError::Validation("Inbound call event carries no participants".to_string())
        })?;
        let route = self.config.route_for(&participant.to);

        let meeting = self
            .meetings
            .create_meeting_with_attendee(AttendeeType::Inbound.as_str())
            .await?;
        let attendee = meeting.attendees.first().ok_or_else(|| {
            DomainError::Upstream("Meeting service returned no attendee".to_string())
        })?;

        self.attendees
            .put(AttendeeRecord {
                meeting_id: meeting.meeting_id,
                attendee_id: attendee.attendee_id,
                attendee_type: AttendeeType::Inbound,
                transaction_id: event.call_details.transaction_id,
                language: Language::EnUs,
                called_number: Some(participant.to.clone()),
                to_call_language: Some(route.language.clone()),
                to_call_number: Some(route.internal_phone_number.clone()),
            })
            .await?;

        if let Err(e) = self.call_count.add(1).await {
            error!(error = %e, "Failed to increment call count");
        }

        tx.meeting_id = Some(meeting.meeting_id);
        tx.attendee_type = Some(AttendeeType::Inbound);

        info!(
            meeting_id = %meeting.meeting_id,
            called_number = %participant.to,
            route_language = %route.language,
            "Inbound call admitted"
        );

        Ok(vec![Action::join_meeting(
            attendee.join_token.clone(),
            participant.call_id.clone(),
            meeting.meeting_id,
        )])
    }

    fn on_new_outbound_call(
        &self,
        event: &SipMediaApplicationEvent,
        tx: &mut CallTransaction,
    ) -> Vec<Action> {
        if let Some(FunctionArguments::OutboundCall {
            attendee_id,
            meeting_id,
            to_call_number,
            to_call_language,
        }) = event.arguments()
        {
            tx.attendee_id = Some(*attendee_id);
            tx.meeting_id = Some(*meeting_id);
            tx.to_call_number = Some(to_call_number.clone());
            tx.to_call_language = Some(to_call_language.clone());
        } else {
            warn!("NEW_OUTBOUND_CALL without outbound arguments");
        }
        tx.attendee_type = Some(AttendeeType::Outbound);
        Vec::new()
    }

    fn on_join_meeting_successful(
        &self,
        event: &SipMediaApplicationEvent,
        tx: &mut CallTransaction,
    ) -> Vec<Action> {
        record_leg_call_ids(event, tx);
        match &tx.call_id_leg_a {
            Some(leg) => vec![Action::speak(
                self.config.telephony.connecting_message.clone(),
                Language::EnUs,
                leg.clone(),
            )],
            None => {
                warn!("JoinMeeting succeeded but no leg A call id is known");
                Vec::new()
            }
        }
    }

    fn on_speak_completed(
        &self,
        event: &SipMediaApplicationEvent,
        tx: &mut CallTransaction,
    ) -> Vec<Action> {
        record_leg_call_ids(event, tx);
        let Some(next) = tx.complete_speak() else {
            return Vec::new();
        };
        match determine_call_leg(tx) {
            Some(leg) => vec![Action::speak(next.text, next.language, leg)],
            None => {
                warn!("Queued utterance has no call leg to play on");
                Vec::new()
            }
        }
    }

    fn on_speak_interrupted(
        &self,
        event: &SipMediaApplicationEvent,
        tx: &mut CallTransaction,
    ) -> Vec<Action> {
        record_leg_call_ids(event, tx);
        info!("Playback interrupted; head of queue will replay on next enqueue");
        tx.mark_interrupted();
        Vec::new()
    }

    fn on_call_update(
        &self,
        event: &SipMediaApplicationEvent,
        tx: &mut CallTransaction,
    ) -> Vec<Action> {
        let Some(FunctionArguments::Response {
            text,
            language,
            attendee_type,
        }) = event.arguments().cloned()
        else {
            warn!("CALL_UPDATE_REQUESTED without Response arguments");
            return Vec::new();
        };
        let Some(call_leg) = determine_call_leg(tx) else {
            warn!("No listening leg resolvable for call update; dropping utterance");
            return Vec::new();
        };

        let utterance = Utterance {
            text,
            language,
            attendee_type,
        };
        match tx.enqueue_response(utterance) {
            EnqueueOutcome::SpeakNow(utterance) => {
                info!(call_leg = %call_leg, language = %utterance.language, "Playing new response");
                vec![Action::speak(utterance.text, utterance.language, call_leg)]
            }
            EnqueueOutcome::Replay { interrupted, new } => {
                info!(call_leg = %call_leg, "Replaying interrupted response before the new one");
                vec![
                    Action::speak(interrupted.text, interrupted.language, call_leg.clone()),
                    Action::speak(new.text, new.language, call_leg),
                ]
            }
            EnqueueOutcome::Buffered => {
                info!("Playback in flight; response buffered");
                Vec::new()
            }
        }
    }

    async fn on_call_answered(
        &self,
        event: &SipMediaApplicationEvent,
        tx: &mut CallTransaction,
    ) -> Result<Vec<Action>> {
        let meeting_id = tx.meeting_id.ok_or_else(|| {
            DomainError::Validation("CALL_ANSWERED without a meeting id".to_string())
        })?;
        let attendee_id = tx.attendee_id.ok_or_else(|| {
            DomainError::Validation("CALL_ANSWERED without an attendee id".to_string())
        })?;

        // Unresolvable language names degrade to the default rather than
        // failing the call
        let language = tx
            .to_call_language
            .as_deref()
            .and_then(Language::from_spoken_name)
            .unwrap_or(Language::EnUs);

        self.attendees
            .put(AttendeeRecord {
                meeting_id,
                attendee_id,
                attendee_type: AttendeeType::Outbound,
                transaction_id: event.call_details.transaction_id,
                language,
                called_number: None,
                to_call_language: None,
                to_call_number: None,
            })
            .await?;

        let action = if let Some(trunk_target) = &self.config.telephony.external_trunk_number {
            let caller_id = event
                .call_details
                .participants
                .first()
                .map(|p| p.from.clone())
                .unwrap_or_else(|| self.config.telephony.caller_id_number.clone());
            Action::call_and_bridge_sip_trunk(caller_id, trunk_target.clone())
        } else {
            let target = tx.to_call_number.clone().ok_or_else(|| {
                DomainError::Validation("CALL_ANSWERED without a dial target".to_string())
            })?;
            Action::call_and_bridge_pstn(self.config.telephony.caller_id_number.clone(), target)
        };

        Ok(vec![action])
    }

    async fn on_hangup(
        &self,
        event: &SipMediaApplicationEvent,
        tx: &mut CallTransaction,
    ) -> Vec<Action> {
        let tag = event
            .action_data
            .as_ref()
            .and_then(|data| data.parameters.participant_tag)
            .unwrap_or(ParticipantTag::LegA);

        match tag {
            ParticipantTag::LegA => {
                if tx.attendee_type == Some(AttendeeType::Inbound) {
                    info!("Hangup from leg A; hanging up leg B and ending the meeting");
                    let actions = match &tx.call_id_leg_b {
                        Some(leg) => vec![Action::hangup(leg.clone())],
                        None => {
                            warn!("No leg B call id recorded; nothing to hang up");
                            Vec::new()
                        }
                    };
                    self.end_meeting(tx).await;
                    if let Err(e) = self.call_count.add(-1).await {
                        error!(error = %e, "Failed to decrement call count");
                    }
                    actions
                } else {
                    // The outbound transaction's own leg A hangup is not
                    // independently actionable
                    Vec::new()
                }
            }
            ParticipantTag::LegB => {
                info!("Hangup from leg B; hanging up leg A and ending the meeting");
                let actions = match &tx.call_id_leg_a {
                    Some(leg) => vec![Action::hangup(leg.clone())],
                    None => Vec::new(),
                };
                self.end_meeting(tx).await;
                actions
            }
        }
    }

    async fn end_meeting(&self, tx: &CallTransaction) {
        let Some(meeting_id) = tx.meeting_id else {
            warn!("Hangup without a meeting id; nothing to tear down");
            return;
        };
        if let Err(e) = self.meetings.delete_meeting(&meeting_id).await {
            error!(error = %e, %meeting_id, "Failed to delete meeting");
        }
        if let Some(teardown) = &self.teardown {
            teardown.on_meeting_ended(&meeting_id);
        }
    }
}

/// Record whichever leg call ids this invocation carries
fn record_leg_call_ids(event: &SipMediaApplicationEvent, tx: &mut CallTransaction) {
    if let Some(participant) = event.participant(ParticipantTag::LegA) {
        tx.call_id_leg_a = Some(participant.call_id.clone());
    }
    if let Some(participant) = event.participant(ParticipantTag::LegB) {
        tx.call_id_leg_b = Some(participant.call_id.clone());
    }
}

/// The leg a translated response plays on: the outbound attendee listens on
/// leg B, the inbound attendee on leg A
fn determine_call_leg(tx: &CallTransaction) -> Option<String> {
    match tx.attendee_type {
        Some(AttendeeType::Outbound) => tx.call_id_leg_b.clone(),
        _ => tx.call_id_leg_a.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteEntry;
    use crate::domain::call::event::{ActionData, ActionParameters, CallDetails, Participant};
    use crate::domain::shared::value_objects::TransactionId;
    use crate::infrastructure::meetings::LocalMeetingClient;
    use crate::infrastructure::store::memory::{InMemoryAttendeeStore, InMemoryCallCount};
    use std::collections::HashMap;

    struct World {
        machine: CallControlMachine,
        attendees: Arc<InMemoryAttendeeStore>,
        call_count: Arc<InMemoryCallCount>,
        meetings: Arc<LocalMeetingClient>,
    }

    fn build_world(config: Config) -> World {
        let attendees = Arc::new(InMemoryAttendeeStore::new());
        let call_count = Arc::new(InMemoryCallCount::new());
        let meetings = Arc::new(LocalMeetingClient::new());
        let machine = CallControlMachine::new(
            Arc::new(config),
            attendees.clone(),
            call_count.clone(),
            meetings.clone(),
        );
        World {
            machine,
            attendees,
            call_count,
            meetings,
        }
    }

    fn routed_config() -> Config {
        let mut config = Config::default();
        config.routing.insert(
            "+12025550199".to_string(),
            RouteEntry {
                language: "spanish".to_string(),
                internal_phone_number: "+12025550042".to_string(),
            },
        );
        config
    }

    fn inbound_event(transaction_id: TransactionId) -> SipMediaApplicationEvent {
        SipMediaApplicationEvent {
            invocation_event_type: InvocationEventType::NewInboundCall,
            call_details: CallDetails {
                transaction_id,
                participants: vec![Participant {
                    call_id: "leg-a-call".to_string(),
                    participant_tag: ParticipantTag::LegA,
                    from: "+12025550101".to_string(),
                    to: "+12025550199".to_string(),
                }],
                transaction_attributes: None,
            },
            action_data: None,
        }
    }

    fn hangup_event(
        tag: Option<ParticipantTag>,
        attributes: HashMap<String, String>,
    ) -> SipMediaApplicationEvent {
        SipMediaApplicationEvent {
            invocation_event_type: InvocationEventType::Hangup,
            call_details: CallDetails {
                transaction_id: TransactionId::new(),
                participants: vec![],
                transaction_attributes: Some(attributes),
            },
            action_data: Some(ActionData {
                action_type: ActionType::Hangup,
                parameters: ActionParameters {
                    participant_tag: tag,
                    ..Default::default()
                },
            }),
        }
    }

    #[tokio::test]
    async fn test_inbound_call_creates_meeting_and_joins() {
        let world = build_world(routed_config());
        let response = world
            .machine
            .handle(&inbound_event(TransactionId::new()))
            .await
            .unwrap();

        assert_eq!(response.actions.len(), 1);
        let meeting_id = match &response.actions[0] {
            Action::JoinMeeting {
                call_id,
                meeting_id,
                ..
            } => {
                assert_eq!(call_id, "leg-a-call");
                *meeting_id
            }
            other => panic!("Unexpected action: {:?}", other),
        };

        assert_eq!(world.call_count.current(), 1);

        let records = world.attendees.query_by_meeting(&meeting_id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].attendee_type, AttendeeType::Inbound);
        assert_eq!(records[0].language, Language::EnUs);
        assert_eq!(records[0].to_call_language.as_deref(), Some("spanish"));
        assert_eq!(records[0].to_call_number.as_deref(), Some("+12025550042"));

        let tx = CallTransaction::from_wire(Some(&response.transaction_attributes));
        assert_eq!(tx.meeting_id, Some(meeting_id));
        assert_eq!(tx.attendee_type, Some(AttendeeType::Inbound));
    }

    #[tokio::test]
    async fn test_unrouted_number_falls_back_to_passthru() {
        let world = build_world(Config::default());
        let response = world
            .machine
            .handle(&inbound_event(TransactionId::new()))
            .await
            .unwrap();

        let meeting_id = match &response.actions[0] {
            Action::JoinMeeting { meeting_id, .. } => *meeting_id,
            other => panic!("Unexpected action: {:?}", other),
        };
        let records = world.attendees.query_by_meeting(&meeting_id).await.unwrap();
        assert_eq!(records[0].to_call_language.as_deref(), Some("passthru"));
        assert_eq!(records[0].to_call_number.as_deref(), Some("+12025550199"));
    }

    #[tokio::test]
    async fn test_call_answered_bridges_via_trunk_when_configured() {
        let mut config = routed_config();
        config.telephony.external_trunk_number = Some("+13015550111".to_string());
        let world = build_world(config);

        let mut attributes = HashMap::new();
        attributes.insert(
            "MeetingId".to_string(),
            crate::domain::shared::value_objects::MeetingId::new().to_string(),
        );
        attributes.insert(
            "AttendeeId".to_string(),
            crate::domain::shared::value_objects::AttendeeId::new().to_string(),
        );
        attributes.insert("AttendeeType".to_string(), "OutboundCallAttendee".to_string());
        attributes.insert("ToCallNumber".to_string(), "+12025550042".to_string());
        attributes.insert("ToCallLanguage".to_string(), "spanish".to_string());

        let event = SipMediaApplicationEvent {
            invocation_event_type: InvocationEventType::CallAnswered,
            call_details: CallDetails {
                transaction_id: TransactionId::new(),
                participants: vec![Participant {
                    call_id: "out-leg-a".to_string(),
                    participant_tag: ParticipantTag::LegA,
                    from: "+18005551212".to_string(),
                    to: "+12025550042".to_string(),
                }],
                transaction_attributes: Some(attributes),
            },
            action_data: None,
        };

        let response = world.machine.handle(&event).await.unwrap();
        match &response.actions[0] {
            Action::CallAndBridge { endpoints, .. } => {
                assert_eq!(
                    endpoints[0].bridge_endpoint_type,
                    crate::domain::call::action::BridgeEndpointType::SipTrunk
                );
                assert_eq!(endpoints[0].uri, "+13015550111");
            }
            other => panic!("Unexpected action: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_hangup_without_participant_tag_defaults_to_leg_a() {
        let world = build_world(Config::default());
        let meeting = world
            .meetings
            .create_meeting_with_attendee("InboundCallAttendee")
            .await
            .unwrap();
        world.call_count.add(1).await.unwrap();

        let mut attributes = HashMap::new();
        attributes.insert("MeetingId".to_string(), meeting.meeting_id.to_string());
        attributes.insert("AttendeeType".to_string(), "InboundCallAttendee".to_string());
        attributes.insert("CallIdLegB".to_string(), "leg-b-call".to_string());

        let response = world
            .machine
            .handle(&hangup_event(None, attributes))
            .await
            .unwrap();
        assert_eq!(
            response.actions,
            vec![Action::hangup("leg-b-call")]
        );
        assert_eq!(world.call_count.current(), 0);
    }

    #[tokio::test]
    async fn test_outbound_leg_a_hangup_is_not_actionable() {
        let world = build_world(Config::default());
        let mut attributes = HashMap::new();
        attributes.insert("AttendeeType".to_string(), "OutboundCallAttendee".to_string());
        attributes.insert("CallIdLegB".to_string(), "leg-b-call".to_string());

        let response = world
            .machine
            .handle(&hangup_event(Some(ParticipantTag::LegA), attributes))
            .await
            .unwrap();
        assert!(response.actions.is_empty());
        assert_eq!(world.call_count.current(), 0);
    }
}
