//! Tracking of in-flight pipelines per meeting

use crate::domain::meeting::CallTeardown;
use crate::domain::shared::value_objects::MeetingId;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Hands out one cancellation token per launched pipeline and cancels all
/// of a meeting's pipelines when its call ends
pub struct PipelineRegistry {
    pipelines: Mutex<HashMap<MeetingId, Vec<CancellationToken>>>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self {
            pipelines: Mutex::new(HashMap::new()),
        }
    }

    pub fn register(&self, meeting_id: MeetingId) -> CancellationToken {
        let token = CancellationToken::new();
        self.pipelines
            .lock()
            .unwrap()
            .entry(meeting_id)
            .or_default()
            .push(token.clone());
        token
    }

    /// Pipelines registered for a meeting that have not been cancelled
    pub fn active_count(&self, meeting_id: &MeetingId) -> usize {
        self.pipelines
            .lock()
            .unwrap()
            .get(meeting_id)
            .map(|tokens| tokens.iter().filter(|t| !t.is_cancelled()).count())
            .unwrap_or(0)
    }
}

impl Default for PipelineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CallTeardown for PipelineRegistry {
    fn on_meeting_ended(&self, meeting_id: &MeetingId) {
        let removed = self.pipelines.lock().unwrap().remove(meeting_id);
        if let Some(tokens) = removed {
            info!(%meeting_id, pipelines = tokens.len(), "Cancelling meeting pipelines");
            for token in tokens {
                token.cancel();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meeting_end_cancels_all_registered_tokens() {
        let registry = PipelineRegistry::new();
        let meeting_id = MeetingId::new();
        let first = registry.register(meeting_id);
        let second = registry.register(meeting_id);
        let unrelated = registry.register(MeetingId::new());
        assert_eq!(registry.active_count(&meeting_id), 2);

        registry.on_meeting_ended(&meeting_id);
        assert!(first.is_cancelled());
        assert!(second.is_cancelled());
        assert!(!unrelated.is_cancelled());
        assert_eq!(registry.active_count(&meeting_id), 0);
    }

    #[test]
    fn test_unknown_meeting_end_is_a_no_op() {
        let registry = PipelineRegistry::new();
        registry.on_meeting_ended(&MeetingId::new());
        assert_eq!(registry.active_count(&MeetingId::new()), 0);
    }
}
