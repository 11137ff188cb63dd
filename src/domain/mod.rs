//! Domain layer - Core business logic and rules
//!
//! This layer contains:
//! - The call-control state machine and its typed events/actions
//! - Durable attendee records and the ports they are stored through
//! - Ports for the external meeting, recognition and translation services

pub mod attendee;
pub mod call;
pub mod meeting;
pub mod shared;
pub mod translation;

// Re-export commonly used types
pub use shared::{DomainError, Result};
