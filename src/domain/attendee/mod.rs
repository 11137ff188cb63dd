//! Attendee records and their storage ports
//!
//! One `AttendeeRecord` is written per call leg when the leg is established.
//! Records are written once and never mutated; the pipeline reads them to
//! resolve speaker/listener languages and the listener's transaction id.

use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::{AttendeeId, Language, MeetingId, TransactionId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of a call leg's attendee within the bridging meeting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttendeeType {
    /// The original PSTN caller side (leg A of the inbound transaction)
    #[serde(rename = "InboundCallAttendee")]
    Inbound,
    /// The bridged far-party side
    #[serde(rename = "OutboundCallAttendee")]
    Outbound,
}

impl AttendeeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendeeType::Inbound => "InboundCallAttendee",
            AttendeeType::Outbound => "OutboundCallAttendee",
        }
    }

    /// The role on the other side of the bridge
    pub fn complement(&self) -> Self {
        match self {
            AttendeeType::Inbound => AttendeeType::Outbound,
            AttendeeType::Outbound => AttendeeType::Inbound,
        }
    }
}

impl fmt::Display for AttendeeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AttendeeType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "InboundCallAttendee" => Ok(AttendeeType::Inbound),
            "OutboundCallAttendee" => Ok(AttendeeType::Outbound),
            other => Err(format!("Unknown attendee type: {}", other)),
        }
    }
}

/// Durable per-leg record, keyed by (meeting_id, attendee_id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendeeRecord {
    pub meeting_id: MeetingId,
    pub attendee_id: AttendeeId,
    pub attendee_type: AttendeeType,
    pub transaction_id: TransactionId,
    pub language: Language,
    /// Number the caller dialed (inbound leg only)
    pub called_number: Option<String>,
    /// Far party's language name from the routing table (inbound leg only)
    pub to_call_language: Option<String>,
    /// Far party's dial target (inbound leg only)
    pub to_call_number: Option<String>,
}

/// Storage port for attendee records
///
/// Defined in the domain layer as a trait (port) and implemented in the
/// infrastructure layer (adapter). Each leg writes only its own record, so
/// there are no concurrent-writer conflicts by construction.
#[async_trait]
pub trait AttendeeStore: Send + Sync {
    /// Persist a record (write-once)
    async fn put(&self, record: AttendeeRecord) -> Result<()>;

    /// All records for a meeting (at most two)
    async fn query_by_meeting(&self, meeting_id: &MeetingId) -> Result<Vec<AttendeeRecord>>;
}

/// Storage port for the live-call aggregate counter
///
/// A coarse capacity signal with no per-call identity. Implementations must
/// use an atomic add at the storage layer, never read-modify-write.
#[async_trait]
pub trait CallCountStore: Send + Sync {
    /// Atomically add `delta` and return the new value
    async fn add(&self, delta: i64) -> Result<i64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attendee_type_complement() {
        assert_eq!(AttendeeType::Inbound.complement(), AttendeeType::Outbound);
        assert_eq!(AttendeeType::Outbound.complement(), AttendeeType::Inbound);
    }

    #[test]
    fn test_attendee_type_round_trip() {
        let parsed: AttendeeType = "OutboundCallAttendee".parse().unwrap();
        assert_eq!(parsed, AttendeeType::Outbound);
        assert_eq!(parsed.as_str(), "OutboundCallAttendee");
        assert!("SomethingElse".parse::<AttendeeType>().is_err());
    }

}
