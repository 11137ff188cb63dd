//! Ports for the streaming recognition and translation services

use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::Language;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Codec of the audio fed to the recognizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioEncoding {
    /// Ogg-framed Opus bitstream
    #[serde(rename = "ogg-opus")]
    OggOpus,
    /// Raw 16-bit little-endian PCM
    #[serde(rename = "pcm")]
    Pcm,
}

impl AudioEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioEncoding::OggOpus => "ogg-opus",
            AudioEncoding::Pcm => "pcm",
        }
    }
}

/// One hypothesis from the recognizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    /// Partial hypotheses may still be revised; only finalized segments are
    /// acted on
    pub is_partial: bool,
}

impl TranscriptSegment {
    pub fn partial(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_partial: true,
        }
    }

    pub fn finalized(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_partial: false,
        }
    }
}

/// Port for the streaming speech-recognition service
///
/// A session consumes the audio channel until it closes, emitting partial
/// and finalized segments, then closes its own output.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    async fn start_stream(
        &self,
        language: Language,
        encoding: AudioEncoding,
        sample_rate_hz: u32,
        audio: mpsc::Receiver<Bytes>,
    ) -> Result<mpsc::Receiver<TranscriptSegment>>;
}

/// Port for the text-translation service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, source: Language, target: Language) -> Result<String>;
}
