//! Loopback telephony driver
//!
//! Plays the role of the telephony platform against the call-control
//! machine: it holds each transaction's attributes between invocations,
//! delivers events with those attributes attached, and persists whatever
//! attributes come back. Each transaction has its own lock held across
//! `handle`, mirroring the platform's one-invocation-at-a-time guarantee
//! per call while distinct calls progress in parallel.

use crate::domain::call::action::Action;
use crate::domain::call::event::{
    ActionData, ActionParameters, ActionType, CallDetails, FunctionArguments,
    InvocationEventType, Participant, ParticipantTag, SipMediaApplicationEvent,
};
use crate::domain::call::machine::CallControlMachine;
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::TransactionId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
struct TransactionState {
    attributes: HashMap<String, String>,
    participants: Vec<Participant>,
}

type SharedTransaction = Arc<Mutex<TransactionState>>;

pub struct SipMediaApplicationDriver {
    machine: Arc<CallControlMachine>,
    transactions: Mutex<HashMap<TransactionId, SharedTransaction>>,
}

impl SipMediaApplicationDriver {
    pub fn new(machine: Arc<CallControlMachine>) -> Self {
        Self {
            machine,
            transactions: Mutex::new(HashMap::new()),
        }
    }

    /// A new call arriving from the network
    pub async fn inbound_call(
        &self,
        from: &str,
        to: &str,
    ) -> Result<(TransactionId, Vec<Action>)> {
        let transaction_id = TransactionId::new();
        let participant = Participant {
            call_id: new_call_id(),
            participant_tag: ParticipantTag::LegA,
            from: from.to_string(),
            to: to.to_string(),
        };
        self.admit(transaction_id, participant).await;
        let actions = self
            .deliver(transaction_id, InvocationEventType::NewInboundCall, None)
            .await?;
        Ok((transaction_id, actions))
    }

    /// Place an outbound call carrying `arguments`, then drive it through
    /// ringing, answer, and the resulting bridge
    pub async fn create_call(
        &self,
        from: &str,
        to: &str,
        arguments: FunctionArguments,
    ) -> Result<TransactionId> {
        let transaction_id = TransactionId::new();
        let participant = Participant {
            call_id: new_call_id(),
            participant_tag: ParticipantTag::LegA,
            from: from.to_string(),
            to: to.to_string(),
        };
        self.admit(transaction_id, participant).await;

        let action_data = ActionData {
            action_type: ActionType::Unknown,
            parameters: ActionParameters {
                arguments: Some(arguments),
                ..Default::default()
            },
        };
        self.deliver(
            transaction_id,
            InvocationEventType::NewOutboundCall,
            Some(action_data),
        )
        .await?;
        self.deliver(transaction_id, InvocationEventType::Ringing, None)
            .await?;
        let actions = self
            .deliver(transaction_id, InvocationEventType::CallAnswered, None)
            .await?;
        for action in &actions {
            if matches!(action, Action::CallAndBridge { .. }) {
                self.action_result(transaction_id, InvocationEventType::ActionSuccessful, action)
                    .await?;
            }
        }
        Ok(transaction_id)
    }

    /// Report the outcome of a previously returned action
    pub async fn action_result(
        &self,
        transaction_id: TransactionId,
        invocation_event_type: InvocationEventType,
        action: &Action,
    ) -> Result<Vec<Action>> {
        if invocation_event_type == InvocationEventType::ActionSuccessful {
            if let Action::CallAndBridge {
                caller_id_number,
                endpoints,
                ..
            } = action
            {
                let shared = self.transaction(transaction_id).await?;
                let mut state = shared.lock().await;
                let has_leg_b = state
                    .participants
                    .iter()
                    .any(|p| p.participant_tag == ParticipantTag::LegB);
                if !has_leg_b {
                    state.participants.push(Participant {
                        call_id: new_call_id(),
                        participant_tag: ParticipantTag::LegB,
                        from: caller_id_number.clone(),
                        to: endpoints
                            .first()
                            .map(|endpoint| endpoint.uri.clone())
                            .unwrap_or_default(),
                    });
                }
            }
        }

        let action_data = ActionData {
            action_type: action_type_of(action),
            parameters: parameters_of(action),
        };
        self.deliver(transaction_id, invocation_event_type, Some(action_data))
            .await
    }

    /// Deliver a translated response to the call's control machine
    pub async fn update_call(
        &self,
        transaction_id: TransactionId,
        arguments: FunctionArguments,
    ) -> Result<Vec<Action>> {
        let action_data = ActionData {
            action_type: ActionType::CallUpdateRequest,
            parameters: ActionParameters {
                arguments: Some(arguments),
                ..Default::default()
            },
        };
        self.deliver(
            transaction_id,
            InvocationEventType::CallUpdateRequested,
            Some(action_data),
        )
        .await
    }

    /// A party hanging up
    pub async fn hangup(
        &self,
        transaction_id: TransactionId,
        tag: ParticipantTag,
    ) -> Result<Vec<Action>> {
        let action_data = ActionData {
            action_type: ActionType::Hangup,
            parameters: ActionParameters {
                participant_tag: Some(tag),
                ..Default::default()
            },
        };
        self.deliver(transaction_id, InvocationEventType::Hangup, Some(action_data))
            .await
    }

    /// Current persisted attributes for a transaction
    pub async fn attributes(
        &self,
        transaction_id: TransactionId,
    ) -> Option<HashMap<String, String>> {
        let shared = self.transaction(transaction_id).await.ok()?;
        let state = shared.lock().await;
        Some(state.attributes.clone())
    }

    pub async fn participants(&self, transaction_id: TransactionId) -> Vec<Participant> {
        match self.transaction(transaction_id).await {
            Ok(shared) => shared.lock().await.participants.clone(),
            Err(_) => Vec::new(),
        }
    }

    async fn admit(&self, transaction_id: TransactionId, participant: Participant) {
        self.transactions.lock().await.insert(
            transaction_id,
            Arc::new(Mutex::new(TransactionState {
                attributes: HashMap::new(),
                participants: vec![participant],
            })),
        );
    }

    async fn transaction(&self, transaction_id: TransactionId) -> Result<SharedTransaction> {
        self.transactions
            .lock()
            .await
            .get(&transaction_id)
            .cloned()
            .ok_or_else(|| DomainError::NotFound(format!("transaction {}", transaction_id)))
    }

    async fn deliver(
        &self,
        transaction_id: TransactionId,
        invocation_event_type: InvocationEventType,
        action_data: Option<ActionData>,
    ) -> Result<Vec<Action>> {
        // The map lock is released before `handle`; only this transaction's
        // own lock spans the invocation
        let shared = self.transaction(transaction_id).await?;
        let mut state = shared.lock().await;
        let event = SipMediaApplicationEvent {
            invocation_event_type,
            call_details: CallDetails {
                transaction_id,
                participants: state.participants.clone(),
                transaction_attributes: if state.attributes.is_empty() {
                    None
                } else {
                    Some(state.attributes.clone())
                },
            },
            action_data,
        };
        let response = self.machine.handle(&event).await?;
        debug!(
            %transaction_id,
            event_type = ?invocation_event_type,
            actions = response.actions.len(),
            "Delivered event"
        );
        state.attributes = response.transaction_attributes;
        Ok(response.actions)
    }
}

fn new_call_id() -> String {
    format!("call-{}", Uuid::new_v4())
}

fn action_type_of(action: &Action) -> ActionType {
    match action {
        Action::Hangup { .. } => ActionType::Hangup,
        Action::Speak { .. } => ActionType::Speak,
        Action::JoinMeeting { .. } => ActionType::JoinMeeting,
        Action::CallAndBridge { .. } => ActionType::CallAndBridge,
    }
}

fn parameters_of(action: &Action) -> ActionParameters {
    let call_id = match action {
        Action::Hangup { call_id, .. }
        | Action::Speak { call_id, .. }
        | Action::JoinMeeting { call_id, .. } => Some(call_id.clone()),
        Action::CallAndBridge { .. } => None,
    };
    ActionParameters {
        call_id,
        ..Default::default()
    }
}
