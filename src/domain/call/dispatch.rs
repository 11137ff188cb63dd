//! Control-update port
//!
//! The audio pipeline's only channel back into call control: an asynchronous
//! in-call update addressed to the listener's transaction. Implementations
//! must succeed or raise; a silently dropped update is a lost utterance.

use crate::domain::call::event::FunctionArguments;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::TransactionId;
use async_trait::async_trait;

#[async_trait]
pub trait CallUpdateDispatcher: Send + Sync {
    /// Deliver `arguments` to the call transaction, producing a
    /// CALL_UPDATE_REQUESTED invocation of the state machine
    async fn update_call(
        &self,
        transaction_id: TransactionId,
        arguments: FunctionArguments,
    ) -> Result<()>;
}
