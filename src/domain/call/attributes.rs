//! Per-call transaction attributes and the response queue
//!
//! `CallTransaction` is the only state a call has. It round-trips through
//! the telephony platform as a string map between invocations; the state
//! machine never holds it in process memory across calls. The response queue
//! of pending utterances rides inside the map as a JSON-encoded attribute.

use crate::domain::attendee::AttendeeType;
use crate::domain::shared::value_objects::{AttendeeId, Language, MeetingId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

const KEY_MEETING_ID: &str = "MeetingId";
const KEY_CALL_ID_LEG_A: &str = "CallIdLegA";
const KEY_CALL_ID_LEG_B: &str = "CallIdLegB";
const KEY_ATTENDEE_ID: &str = "AttendeeId";
const KEY_ATTENDEE_TYPE: &str = "AttendeeType";
const KEY_TO_CALL_NUMBER: &str = "ToCallNumber";
const KEY_TO_CALL_LANGUAGE: &str = "ToCallLanguage";
const KEY_CALL_RESPONSE: &str = "CallResponse";
const KEY_PREVIOUS_INTERRUPTION: &str = "PreviousInterruption";

/// One finalized, translated unit of speech queued for playback on a leg
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Utterance {
    pub text: String,
    pub language: Language,
    pub attendee_type: AttendeeType,
}

/// What the caller of `enqueue_response` must do next
#[derive(Debug, Clone, PartialEq)]
pub enum EnqueueOutcome {
    /// Nothing was playing; speak the new utterance now
    SpeakNow(Utterance),
    /// The last playback was cut short; speak the interrupted utterance,
    /// then the new one
    Replay {
        interrupted: Utterance,
        new: Utterance,
    },
    /// A playback is in flight; the utterance was buffered
    Buffered,
}

/// Ephemeral per-call state, persisted by the platform between invocations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallTransaction {
    pub meeting_id: Option<MeetingId>,
    pub call_id_leg_a: Option<String>,
    pub call_id_leg_b: Option<String>,
    pub attendee_id: Option<AttendeeId>,
    pub attendee_type: Option<AttendeeType>,
    pub to_call_number: Option<String>,
    pub to_call_language: Option<String>,
    /// FIFO of pending utterances; the head is the one being played
    pub response_queue: VecDeque<Utterance>,
    /// Whether the last playback was cut short before completion
    pub previous_interruption: bool,
}

impl CallTransaction {
    /// Rebuild the transaction from the platform's attribute map.
    ///
    /// Absent or garbled attributes yield their defaults rather than failing
    /// the call: the worst case is a lost queue, never an aborted invocation.
    pub fn from_wire(attributes: Option<&HashMap<String, String>>) -> Self {
        let Some(map) = attributes else {
            return Self::default();
        };

        let response_queue = map
            .get(KEY_CALL_RESPONSE)
            .and_then(|raw| serde_json::from_str::<Vec<Utterance>>(raw).ok())
            .map(VecDeque::from)
            .unwrap_or_default();

        Self {
            meeting_id: map.get(KEY_MEETING_ID).and_then(|s| s.parse().ok()),
            call_id_leg_a: map.get(KEY_CALL_ID_LEG_A).cloned(),
            call_id_leg_b: map.get(KEY_CALL_ID_LEG_B).cloned(),
            attendee_id: map.get(KEY_ATTENDEE_ID).and_then(|s| s.parse().ok()),
            attendee_type: map.get(KEY_ATTENDEE_TYPE).and_then(|s| s.parse().ok()),
            to_call_number: map.get(KEY_TO_CALL_NUMBER).cloned(),
            to_call_language: map.get(KEY_TO_CALL_LANGUAGE).cloned(),
            response_queue,
            previous_interruption: map
                .get(KEY_PREVIOUS_INTERRUPTION)
                .map(|s| s == "true")
                .unwrap_or(false),
        }
    }

    /// Flatten the transaction back into the platform's attribute map
    pub fn to_wire(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        if let Some(meeting_id) = &self.meeting_id {
            map.insert(KEY_MEETING_ID.to_string(), meeting_id.to_string());
        }
        if let Some(call_id) = &self.call_id_leg_a {
            map.insert(KEY_CALL_ID_LEG_A.to_string(), call_id.clone());
        }
        if let Some(call_id) = &self.call_id_leg_b {
            map.insert(KEY_CALL_ID_LEG_B.to_string(), call_id.clone());
        }
        if let Some(attendee_id) = &self.attendee_id {
            map.insert(KEY_ATTENDEE_ID.to_string(), attendee_id.to_string());
        }
        if let Some(attendee_type) = &self.attendee_type {
            map.insert(KEY_ATTENDEE_TYPE.to_string(), attendee_type.to_string());
        }
        if let Some(number) = &self.to_call_number {
            map.insert(KEY_TO_CALL_NUMBER.to_string(), number.clone());
        }
        if let Some(language) = &self.to_call_language {
            map.insert(KEY_TO_CALL_LANGUAGE.to_string(), language.clone());
        }
        // Always present, even as "[]", so readers can tell a drained queue
        // from one that was never created
        let queue: Vec<&Utterance> = self.response_queue.iter().collect();
        if let Ok(raw) = serde_json::to_string(&queue) {
            map.insert(KEY_CALL_RESPONSE.to_string(), raw);
        }
        map.insert(
            KEY_PREVIOUS_INTERRUPTION.to_string(),
            self.previous_interruption.to_string(),
        );
        map
    }

    /// Append a new utterance and decide what to play.
    ///
    /// FIFO per call: an empty queue means nothing is in flight and the new
    /// utterance plays immediately. If the previous playback was interrupted,
    /// the cut-off utterance is replayed ahead of the new one and the flag is
    /// cleared. Otherwise the utterance is buffered behind the in-flight one.
    pub fn enqueue_response(&mut self, utterance: Utterance) -> EnqueueOutcome {
        if self.response_queue.is_empty() {
            self.response_queue.push_back(utterance.clone());
            return EnqueueOutcome::SpeakNow(utterance);
        }

        if self.previous_interruption {
            self.previous_interruption = false;
            if let Some(interrupted) = self.response_queue.pop_front() {
                self.response_queue.push_back(utterance.clone());
                return EnqueueOutcome::Replay {
                    interrupted,
                    new: utterance,
                };
            }
        }

        self.response_queue.push_back(utterance);
        EnqueueOutcome::Buffered
    }

    /// Record the completion of the in-flight playback.
    ///
    /// Pops the finished utterance; when at least one more is queued behind
    /// it, returns the next one to speak.
    pub fn complete_speak(&mut self) -> Option<Utterance> {
        let queued = self.response_queue.len();
        self.response_queue.pop_front();
        if queued >= 2 {
            self.response_queue.front().cloned()
        } else {
            None
        }
    }

    /// Record that the in-flight playback was cut short.
    ///
    /// The head stays queued so the next enqueue can replay it.
    pub fn mark_interrupted(&mut self) {
        if !self.response_queue.is_empty() {
            self.previous_interruption = true;
        }
    }
}
