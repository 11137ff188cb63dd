//! Streaming audio-translation pipelines
//!
//! One pipeline runs per speaking leg: capture media is transcoded for the
//! recognizer, finalized transcript segments are translated into the
//! listener's language, and each translated utterance is dispatched as a
//! call update addressed to the listener's transaction.

pub mod registry;
pub mod worker;

pub use registry::PipelineRegistry;
pub use worker::{PipelineContext, PipelineLauncher, TranslationPipeline};
