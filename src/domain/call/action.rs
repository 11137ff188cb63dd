//! Typed actions emitted by the call-control state machine
//!
//! Each action kind carries only its required fields. The serialized form
//! uses the platform's `Type`/`Parameters` envelope.

use crate::domain::shared::value_objects::{Language, MeetingId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Response schema version understood by the telephony platform
pub const SCHEMA_VERSION: &str = "1.0";

/// Seconds the platform waits for the bridged party to answer
const BRIDGE_TIMEOUT_SECONDS: u32 = 30;

/// How a bridge endpoint is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BridgeEndpointType {
    /// Direct PSTN dial-out
    #[serde(rename = "PSTN")]
    Pstn,
    /// Via the configured SIP trunk
    #[serde(rename = "SIP_TRUNK")]
    SipTrunk,
}

/// One target of a CallAndBridge action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BridgeEndpoint {
    pub bridge_endpoint_type: BridgeEndpointType,
    pub uri: String,
}

/// A control action for the telephony platform to execute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Type", content = "Parameters")]
pub enum Action {
    #[serde(rename_all = "PascalCase")]
    Hangup {
        sip_response_code: String,
        call_id: String,
    },
    #[serde(rename_all = "PascalCase")]
    Speak {
        text: String,
        call_id: String,
        engine: String,
        language_code: Language,
        text_type: String,
        voice_id: String,
    },
    #[serde(rename_all = "PascalCase")]
    JoinMeeting {
        join_token: String,
        call_id: String,
        meeting_id: MeetingId,
    },
    #[serde(rename_all = "PascalCase")]
    CallAndBridge {
        call_timeout_seconds: u32,
        caller_id_number: String,
        endpoints: Vec<BridgeEndpoint>,
    },
}

impl Action {
    pub fn hangup(call_id: impl Into<String>) -> Self {
        Action::Hangup {
            sip_response_code: "0".to_string(),
            call_id: call_id.into(),
        }
    }

    /// Speak `text` on the given leg with the voice matched to `language`
    pub fn speak(text: impl Into<String>, language: Language, call_id: impl Into<String>) -> Self {
        Action::Speak {
            text: text.into(),
            call_id: call_id.into(),
            engine: "neural".to_string(),
            language_code: language,
            text_type: "text".to_string(),
            voice_id: language.voice().to_string(),
        }
    }

    pub fn join_meeting(
        join_token: impl Into<String>,
        call_id: impl Into<String>,
        meeting_id: MeetingId,
    ) -> Self {
        Action::JoinMeeting {
            join_token: join_token.into(),
            call_id: call_id.into(),
            meeting_id,
        }
    }

    /// Bridge directly over the PSTN to `target`
    pub fn call_and_bridge_pstn(
        caller_id_number: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Action::CallAndBridge {
            call_timeout_seconds: BRIDGE_TIMEOUT_SECONDS,
            caller_id_number: caller_id_number.into(),
            endpoints: vec![BridgeEndpoint {
                bridge_endpoint_type: BridgeEndpointType::Pstn,
                uri: target.into(),
            }],
        }
    }

    /// Bridge through the configured SIP trunk to `target`
    pub fn call_and_bridge_sip_trunk(
        caller_id_number: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Action::CallAndBridge {
            call_timeout_seconds: BRIDGE_TIMEOUT_SECONDS,
            caller_id_number: caller_id_number.into(),
            endpoints: vec![BridgeEndpoint {
                bridge_endpoint_type: BridgeEndpointType::SipTrunk,
                uri: target.into(),
            }],
        }
    }
}

/// The full reply to one call-control invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SipMediaApplicationResponse {
    pub schema_version: String,
    pub actions: Vec<Action>,
    pub transaction_attributes: HashMap<String, String>,
}

impl SipMediaApplicationResponse {
    pub fn new(actions: Vec<Action>, transaction_attributes: HashMap<String, String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            actions,
            transaction_attributes,
        }
    }
}
