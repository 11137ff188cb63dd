//! Local speech and translation adapters
//!
//! Stand-ins for the managed recognition and translation services, used in
//! single-process deployments and tests. The recognizer drains its audio
//! stream and then plays back a scripted transcript; the translator works
//! from a phrase table.

use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::Language;
use crate::domain::translation::{AudioEncoding, SpeechRecognizer, TranscriptSegment, Translator};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, info};

const SEGMENT_CHANNEL_CAPACITY: usize = 16;

pub struct LocalRecognizer {
    script: Vec<TranscriptSegment>,
}

impl LocalRecognizer {
    pub fn new(script: Vec<TranscriptSegment>) -> Self {
        Self { script }
    }

    /// A script that emits a partial and then a finalized segment per line
    pub fn scripted(lines: &[&str]) -> Self {
        let mut script = Vec::with_capacity(lines.len() * 2);
        for line in lines {
            script.push(TranscriptSegment::partial(*line));
            script.push(TranscriptSegment::finalized(*line));
        }
        Self::new(script)
    }
}

#[async_trait]
impl SpeechRecognizer for LocalRecognizer {
    async fn start_stream(
        &self,
        language: Language,
        encoding: AudioEncoding,
        sample_rate_hz: u32,
        mut audio: mpsc::Receiver<Bytes>,
    ) -> Result<mpsc::Receiver<TranscriptSegment>> {
        info!(
            language = %language,
            encoding = encoding.as_str(),
            sample_rate_hz,
            "Starting recognition stream"
        );
        let (sender, receiver) = mpsc::channel(SEGMENT_CHANNEL_CAPACITY);
        let script = self.script.clone();
        tokio::spawn(async move {
            let mut audio_bytes = 0usize;
            while let Some(chunk) = audio.recv().await {
                audio_bytes += chunk.len();
            }
            debug!(audio_bytes, "Audio stream closed; emitting transcript");
            for segment in script {
                if sender.send(segment).await.is_err() {
                    break;
                }
            }
        });
        Ok(receiver)
    }
}

pub struct LocalTranslator {
    phrases: HashMap<(Language, Language), HashMap<String, String>>,
}

impl LocalTranslator {
    pub fn new() -> Self {
        Self {
            phrases: HashMap::new(),
        }
    }

    pub fn with_phrase(
        mut self,
        source: Language,
        target: Language,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        self.phrases
            .entry((source, target))
            .or_default()
            .insert(from.into(), to.into());
        self
    }
}

impl Default for LocalTranslator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Translator for LocalTranslator {
    async fn translate(&self, text: &str, source: Language, target: Language) -> Result<String> {
        if source == target {
            return Ok(text.to_string());
        }
        match self
            .phrases
            .get(&(source, target))
            .and_then(|table| table.get(text))
        {
            Some(translated) => Ok(translated.clone()),
            None => {
                debug!(text, %source, %target, "No phrase entry; passing text through");
                Ok(text.to_string())
            }
        }
    }
}
