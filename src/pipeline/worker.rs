//! The per-leg translation pipeline

use crate::config::PipelineConfig;
use crate::domain::attendee::AttendeeStore;
use crate::domain::call::dispatch::CallUpdateDispatcher;
use crate::domain::call::event::FunctionArguments;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::{AttendeeId, MeetingId};
use crate::domain::translation::{SpeechRecognizer, Translator};
use crate::infrastructure::media::{
    transcoder_for, MediaSource, OpusTranscodeConfig, StartSelector, StreamTranscoder,
};
use crate::pipeline::registry::PipelineRegistry;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Identifies the speaking leg a pipeline serves
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub meeting_id: MeetingId,
    pub attendee_id: AttendeeId,
    pub external_user_id: String,
    pub stream_arn: String,
}

pub struct TranslationPipeline {
    attendees: Arc<dyn AttendeeStore>,
    media: Arc<dyn MediaSource>,
    recognizer: Arc<dyn SpeechRecognizer>,
    translator: Arc<dyn Translator>,
    dispatcher: Arc<dyn CallUpdateDispatcher>,
    config: PipelineConfig,
}

impl TranslationPipeline {
    pub fn new(
        attendees: Arc<dyn AttendeeStore>,
        media: Arc<dyn MediaSource>,
        recognizer: Arc<dyn SpeechRecognizer>,
        translator: Arc<dyn Translator>,
        dispatcher: Arc<dyn CallUpdateDispatcher>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            attendees,
            media,
            recognizer,
            translator,
            dispatcher,
            config,
        }
    }

    /// Run the pipeline until the capture stream closes, the token is
    /// cancelled, or dispatch fails
    pub async fn run(&self, ctx: PipelineContext, cancel: CancellationToken) -> Result<()> {
        let records = self.attendees.query_by_meeting(&ctx.meeting_id).await?;
        let Some(speaker) = records.iter().find(|r| r.attendee_id == ctx.attendee_id) else {
            warn!(
                meeting_id = %ctx.meeting_id,
                attendee_id = %ctx.attendee_id,
                "No record for speaking attendee; skipping pipeline"
            );
            return Ok(());
        };
        let listener_type = speaker.attendee_type.complement();
        let Some(listener) = records.iter().find(|r| r.attendee_type == listener_type) else {
            warn!(
                meeting_id = %ctx.meeting_id,
                "Other party has not joined yet; skipping pipeline"
            );
            return Ok(());
        };

        let source_language = speaker.language;
        let target_language = listener.language;
        let listener_transaction = listener.transaction_id;
        info!(
            meeting_id = %ctx.meeting_id,
            attendee_id = %ctx.attendee_id,
            %source_language,
            %target_language,
            "Translation pipeline starting"
        );

        let transcode_config = OpusTranscodeConfig {
            sample_rate_hz: self.config.sample_rate_hz,
            ..Default::default()
        };
        let transcoder = transcoder_for(self.config.encoding, transcode_config)?;

        let media = self.media.open(&ctx.stream_arn, StartSelector::Now).await?;
        let (audio_tx, audio_rx) = mpsc::channel(self.config.channel_capacity);
        let mut segments = self
            .recognizer
            .start_stream(
                source_language,
                self.config.encoding,
                self.config.sample_rate_hz,
                audio_rx,
            )
            .await?;

        let feed = tokio::spawn(feed_audio(media, audio_tx, transcoder, cancel.clone()));

        let result = loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(meeting_id = %ctx.meeting_id, "Pipeline cancelled");
                    break Ok(());
                }
                segment = segments.recv() => {
                    let Some(segment) = segment else {
                        debug!(meeting_id = %ctx.meeting_id, "Transcript stream ended");
                        break Ok(());
                    };
                    if segment.is_partial {
                        continue;
                    }
                    if source_language == target_language {
                        debug!(text = %segment.text, "Both parties share a language; nothing to relay");
                        continue;
                    }
                    let translated = match self
                        .translator
                        .translate(&segment.text, source_language, target_language)
                        .await
                    {
                        Ok(translated) => translated,
                        Err(e) => {
                            error!(error = %e, text = %segment.text, "Translation failed; dropping segment");
                            continue;
                        }
                    };
                    // Addressed to the listener's leg, so the role sent along
                    // is the listener's
                    let arguments = FunctionArguments::Response {
                        text: translated,
                        language: target_language,
                        attendee_type: listener_type,
                    };
                    if let Err(e) = self.dispatcher.update_call(listener_transaction, arguments).await {
                        error!(error = %e, "Call update dispatch failed; stopping pipeline");
                        break Err(e);
                    }
                }
            }
        };
        feed.abort();
        result
    }
}

/// Feed capture chunks through the transcoder into the recognizer's audio
/// channel. Closing the channel tells the recognizer the speaker is done.
async fn feed_audio(
    mut media: mpsc::Receiver<Bytes>,
    audio: mpsc::Sender<Bytes>,
    mut transcoder: Box<dyn StreamTranscoder>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            chunk = media.recv() => {
                match chunk {
                    Some(chunk) => match transcoder.push(&chunk) {
                        Ok(out) if out.is_empty() => {}
                        Ok(out) => {
                            if audio.send(out).await.is_err() {
                                return;
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "Transcode failed; closing audio stream");
                            return;
                        }
                    },
                    None => {
                        if let Ok(out) = transcoder.finish() {
                            if !out.is_empty() {
                                let _ = audio.send(out).await;
                            }
                        }
                        return;
                    }
                }
            }
        }
    }
}

/// Spawns pipelines and ties their lifetime to the meeting
pub struct PipelineLauncher {
    pipeline: Arc<TranslationPipeline>,
    registry: Arc<PipelineRegistry>,
}

impl PipelineLauncher {
    pub fn new(pipeline: Arc<TranslationPipeline>, registry: Arc<PipelineRegistry>) -> Self {
        Self { pipeline, registry }
    }

    pub fn launch(&self, ctx: PipelineContext) -> tokio::task::JoinHandle<()> {
        let token = self.registry.register(ctx.meeting_id);
        let pipeline = self.pipeline.clone();
        info!(
            meeting_id = %ctx.meeting_id,
            attendee_id = %ctx.attendee_id,
            stream_arn = %ctx.stream_arn,
            "Launching translation pipeline"
        );
        tokio::spawn(async move {
            if let Err(e) = pipeline.run(ctx, token).await {
                error!(error = %e, "Translation pipeline failed");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::attendee::{AttendeeRecord, AttendeeType};
    use crate::domain::shared::error::DomainError;
    use crate::domain::shared::value_objects::{Language, TransactionId};
    use crate::domain::translation::{AudioEncoding, MockTranslator};
    use crate::infrastructure::media::ChannelMediaSource;
    use crate::infrastructure::store::memory::InMemoryAttendeeStore;
    use crate::infrastructure::translation::LocalRecognizer;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    struct RecordingDispatcher {
        updates: Mutex<Vec<(TransactionId, FunctionArguments)>>,
    }

    impl RecordingDispatcher {
        fn new() -> Self {
            Self {
                updates: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CallUpdateDispatcher for RecordingDispatcher {
        async fn update_call(
            &self,
            transaction_id: TransactionId,
            arguments: FunctionArguments,
        ) -> Result<()> {
            self.updates.lock().await.push((transaction_id, arguments));
            Ok(())
        }
    }

    fn record(
        meeting_id: MeetingId,
        attendee_type: AttendeeType,
        language: Language,
    ) -> AttendeeRecord {
        AttendeeRecord {
            meeting_id,
            attendee_id: AttendeeId::new(),
            attendee_type,
            transaction_id: TransactionId::new(),
            language,
            called_number: None,
            to_call_language: None,
            to_call_number: None,
        }
    }

    #[tokio::test]
    async fn test_translate_failure_drops_segment_and_continues() {
        let meeting_id = MeetingId::new();
        let speaker = record(meeting_id, AttendeeType::Inbound, Language::EnUs);
        let listener = record(meeting_id, AttendeeType::Outbound, Language::EsUs);
        let listener_transaction = listener.transaction_id;
        let ctx = PipelineContext {
            meeting_id,
            attendee_id: speaker.attendee_id,
            external_user_id: "InboundCallAttendee".to_string(),
            stream_arn: "stream-1".to_string(),
        };

        let attendees = Arc::new(InMemoryAttendeeStore::new());
        attendees.put(speaker).await.unwrap();
        attendees.put(listener).await.unwrap();

        let media = Arc::new(ChannelMediaSource::new(8));
        let sender = media.register("stream-1").await;
        sender.send(Bytes::from_static(&[0u8; 40])).await.unwrap();
        drop(sender);

        let mut translator = MockTranslator::new();
        translator
            .expect_translate()
            .withf(|text, _, _| text == "first line")
            .returning(|_, _, _| Err(DomainError::Upstream("translation outage".to_string())));
        translator
            .expect_translate()
            .withf(|text, _, _| text == "second line")
            .returning(|_, _, _| Ok("segunda linea".to_string()));

        let dispatcher = Arc::new(RecordingDispatcher::new());
        let pipeline = TranslationPipeline::new(
            attendees,
            media,
            Arc::new(LocalRecognizer::scripted(&["first line", "second line"])),
            Arc::new(translator),
            dispatcher.clone(),
            PipelineConfig::default(),
        );

        pipeline.run(ctx, CancellationToken::new()).await.unwrap();

        let updates = dispatcher.updates.lock().await;
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].0, listener_transaction);
        match &updates[0].1 {
            FunctionArguments::Response {
                text,
                language,
                attendee_type,
            } => {
                assert_eq!(text, "segunda linea");
                assert_eq!(*language, Language::EsUs);
                // Carries the role of the leg it will play on
                assert_eq!(*attendee_type, AttendeeType::Outbound);
            }
            other => panic!("Unexpected arguments: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_pcm_encoding_runs_the_same_pipeline() {
        let meeting_id = MeetingId::new();
        let speaker = record(meeting_id, AttendeeType::Inbound, Language::EnUs);
        let listener = record(meeting_id, AttendeeType::Outbound, Language::EsUs);
        let ctx = PipelineContext {
            meeting_id,
            attendee_id: speaker.attendee_id,
            external_user_id: "InboundCallAttendee".to_string(),
            stream_arn: "stream-1".to_string(),
        };

        let attendees = Arc::new(InMemoryAttendeeStore::new());
        attendees.put(speaker).await.unwrap();
        attendees.put(listener).await.unwrap();

        let media = Arc::new(ChannelMediaSource::new(8));
        let sender = media.register("stream-1").await;
        sender.send(Bytes::from_static(&[0u8; 40])).await.unwrap();
        drop(sender);

        let mut translator = MockTranslator::new();
        translator
            .expect_translate()
            .returning(|_, _, _| Ok("hola".to_string()));

        let dispatcher = Arc::new(RecordingDispatcher::new());
        let pipeline = TranslationPipeline::new(
            attendees,
            media,
            Arc::new(LocalRecognizer::scripted(&["hello"])),
            Arc::new(translator),
            dispatcher.clone(),
            PipelineConfig {
                encoding: AudioEncoding::Pcm,
                ..Default::default()
            },
        );

        pipeline.run(ctx, CancellationToken::new()).await.unwrap();
        assert_eq!(dispatcher.updates.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_listener_is_a_soft_skip() {
        let meeting_id = MeetingId::new();
        let speaker = record(meeting_id, AttendeeType::Inbound, Language::EnUs);
        let ctx = PipelineContext {
            meeting_id,
            attendee_id: speaker.attendee_id,
            external_user_id: "InboundCallAttendee".to_string(),
            stream_arn: "stream-1".to_string(),
        };

        let attendees = Arc::new(InMemoryAttendeeStore::new());
        attendees.put(speaker).await.unwrap();

        let pipeline = TranslationPipeline::new(
            attendees,
            Arc::new(ChannelMediaSource::new(8)),
            Arc::new(LocalRecognizer::scripted(&["unheard"])),
            Arc::new(MockTranslator::new()),
            Arc::new(RecordingDispatcher::new()),
            PipelineConfig::default(),
        );

        // No listener record and no registered stream, but the run is a
        // clean no-op because the listener check comes first
        pipeline
            .run(ctx, CancellationToken::new())
            .await
            .unwrap();
    }
}
