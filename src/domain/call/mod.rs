//! Call-control bounded context
//!
//! The call-control state machine is invoked once per telephony event. All
//! per-call state travels through the externally persisted transaction
//! attributes; nothing call-specific lives in process memory between
//! invocations.

pub mod action;
pub mod attributes;
pub mod dispatch;
pub mod event;
pub mod machine;

pub use action::{Action, BridgeEndpoint, BridgeEndpointType, SipMediaApplicationResponse};
pub use attributes::{CallTransaction, EnqueueOutcome, Utterance};
pub use dispatch::CallUpdateDispatcher;
pub use event::{
    ActionData, ActionParameters, ActionType, CallDetails, FunctionArguments,
    InvocationEventType, Participant, ParticipantTag, SipMediaApplicationEvent,
};
pub use machine::CallControlMachine;
