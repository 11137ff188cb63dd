//! VoxBridge - Real-time voice translation for PSTN calls
//!
//! VoxBridge bridges a PSTN caller and a remote party through a meeting,
//! translating speech live in both directions. It is built from two
//! subsystems: a stateless call-control state machine driven by telephony
//! events, and a per-leg streaming audio-translation pipeline that feeds
//! translated utterances back into call control.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interface;
pub mod pipeline;

// Re-export commonly used types
pub use domain::shared::error::DomainError;
pub use domain::shared::result::Result;
