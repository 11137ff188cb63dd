//! In-memory adapters for the attendee and call-count stores

use crate::domain::attendee::{AttendeeRecord, AttendeeStore, CallCountStore};
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::{AttendeeId, MeetingId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

/// Attendee records keyed by (meeting, attendee). A second `put` for the
/// same key overwrites, which is how an outbound record picks up its
/// resolved language once the callee answers.
pub struct InMemoryAttendeeStore {
    records: RwLock<HashMap<(MeetingId, AttendeeId), AttendeeRecord>>,
}

impl InMemoryAttendeeStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryAttendeeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AttendeeStore for InMemoryAttendeeStore {
    async fn put(&self, record: AttendeeRecord) -> Result<()> {
        debug!(
            meeting_id = %record.meeting_id,
            attendee_id = %record.attendee_id,
            attendee_type = %record.attendee_type,
            "Storing attendee record"
        );
        self.records
            .write()
            .await
            .insert((record.meeting_id, record.attendee_id), record);
        Ok(())
    }

    async fn query_by_meeting(&self, meeting_id: &MeetingId) -> Result<Vec<AttendeeRecord>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|record| record.meeting_id == *meeting_id)
            .cloned()
            .collect())
    }
}

/// Atomic concurrent-call counter
pub struct InMemoryCallCount {
    count: AtomicI64,
}

impl InMemoryCallCount {
    pub fn new() -> Self {
        Self {
            count: AtomicI64::new(0),
        }
    }

    pub fn current(&self) -> i64 {
        self.count.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryCallCount {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CallCountStore for InMemoryCallCount {
    async fn add(&self, delta: i64) -> Result<i64> {
        Ok(self.count.fetch_add(delta, Ordering::SeqCst) + delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::attendee::AttendeeType;
    use crate::domain::shared::value_objects::{Language, TransactionId};

    fn record(meeting_id: MeetingId, attendee_type: AttendeeType) -> AttendeeRecord {
        AttendeeRecord {
            meeting_id,
            attendee_id: AttendeeId::new(),
            attendee_type,
            transaction_id: TransactionId::new(),
            language: Language::EnUs,
            called_number: None,
            to_call_language: None,
            to_call_number: None,
        }
    }

    #[tokio::test]
    async fn test_query_returns_only_matching_meeting() {
        let store = InMemoryAttendeeStore::new();
        let meeting_a = MeetingId::new();
        let meeting_b = MeetingId::new();
        store.put(record(meeting_a, AttendeeType::Inbound)).await.unwrap();
        store.put(record(meeting_a, AttendeeType::Outbound)).await.unwrap();
        store.put(record(meeting_b, AttendeeType::Inbound)).await.unwrap();

        let found = store.query_by_meeting(&meeting_a).await.unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|r| r.meeting_id == meeting_a));
    }

    #[tokio::test]
    async fn test_put_accepts_inbound_record_without_routing_info() {
        // Routing fields are copied through as-is; the write never guards them
        let store = InMemoryAttendeeStore::new();
        let meeting_id = MeetingId::new();
        store.put(record(meeting_id, AttendeeType::Inbound)).await.unwrap();

        let found = store.query_by_meeting(&meeting_id).await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].called_number.is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites_same_attendee() {
        let store = InMemoryAttendeeStore::new();
        let meeting_id = MeetingId::new();
        let mut first = record(meeting_id, AttendeeType::Outbound);
        first.language = Language::EnUs;
        let attendee_id = first.attendee_id;
        store.put(first).await.unwrap();

        let mut second = record(meeting_id, AttendeeType::Outbound);
        second.attendee_id = attendee_id;
        second.language = Language::EsUs;
        store.put(second).await.unwrap();

        let found = store.query_by_meeting(&meeting_id).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].language, Language::EsUs);
    }

    #[tokio::test]
    async fn test_call_count_add_and_subtract() {
        let counter = InMemoryCallCount::new();
        assert_eq!(counter.add(1).await.unwrap(), 1);
        assert_eq!(counter.add(1).await.unwrap(), 2);
        assert_eq!(counter.add(-1).await.unwrap(), 1);
        assert_eq!(counter.current(), 1);
    }
}
