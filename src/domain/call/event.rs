//! Typed telephony events delivered to the call-control state machine
//!
//! The telephony platform invokes call control with a JSON payload per
//! event. The loosely-typed `Arguments` bag of that payload is modelled here
//! as a tagged variant per function, so undefined-field mistakes fail at
//! compile time instead of at run time.

use crate::domain::attendee::AttendeeType;
use crate::domain::shared::value_objects::{AttendeeId, Language, MeetingId, TransactionId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Why call control is being invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvocationEventType {
    NewInboundCall,
    NewOutboundCall,
    Ringing,
    ActionSuccessful,
    ActionInterrupted,
    ActionFailed,
    Hangup,
    CallAnswered,
    CallUpdateRequested,
    #[serde(other)]
    Invalid,
}

/// Which side of the bridged call a participant is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticipantTag {
    #[serde(rename = "LEG-A")]
    LegA,
    #[serde(rename = "LEG-B")]
    LegB,
}

impl fmt::Display for ParticipantTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParticipantTag::LegA => write!(f, "LEG-A"),
            ParticipantTag::LegB => write!(f, "LEG-B"),
        }
    }
}

/// One connected party of the call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Participant {
    pub call_id: String,
    pub participant_tag: ParticipantTag,
    pub from: String,
    pub to: String,
}

/// Per-function payloads carried inside `ActionData`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Function")]
pub enum FunctionArguments {
    /// A translated utterance dispatched by the audio pipeline
    #[serde(rename_all = "PascalCase")]
    Response {
        text: String,
        language: Language,
        attendee_type: AttendeeType,
    },
    /// Arguments passed when the platform places the outbound leg
    #[serde(rename_all = "PascalCase")]
    OutboundCall {
        attendee_id: AttendeeId,
        meeting_id: MeetingId,
        to_call_number: String,
        to_call_language: String,
    },
}

/// Kind of action an ACTION_* event refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    Hangup,
    Speak,
    JoinMeeting,
    CallAndBridge,
    CallUpdateRequest,
    #[serde(other)]
    Unknown,
}

/// Parameters attached to the action an event reports on
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActionParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_tag: Option<ParticipantTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<FunctionArguments>,
}

/// The action a non-call event reports on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActionData {
    #[serde(rename = "Type")]
    pub action_type: ActionType,
    pub parameters: ActionParameters,
}

/// Call-level details common to all invocations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CallDetails {
    pub transaction_id: TransactionId,
    #[serde(default)]
    pub participants: Vec<Participant>,
    /// Per-call attributes round-tripped through the platform
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_attributes: Option<HashMap<String, String>>,
}

/// One invocation of the call-control state machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SipMediaApplicationEvent {
    pub invocation_event_type: InvocationEventType,
    pub call_details: CallDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_data: Option<ActionData>,
}

impl SipMediaApplicationEvent {
    /// The participant on the given leg, if present in this invocation
    pub fn participant(&self, tag: ParticipantTag) -> Option<&Participant> {
        self.call_details
            .participants
            .iter()
            .find(|p| p.participant_tag == tag)
    }

    /// Arguments of the reported action, if any
    pub fn arguments(&self) -> Option<&FunctionArguments> {
        self.action_data
            .as_ref()
            .and_then(|data| data.parameters.arguments.as_ref())
    }
}
