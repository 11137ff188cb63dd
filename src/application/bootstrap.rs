//! Single-process wiring of the bridge
//!
//! Builds the call-control machine, the loopback telephony driver, the
//! local adapters, and the pipeline layer around one configuration. The
//! recognizer and translator are injected so deployments and tests can
//! choose their backends.

use crate::config::Config;
use crate::domain::call::machine::CallControlMachine;
use crate::domain::translation::{SpeechRecognizer, Translator};
use crate::infrastructure::media::ChannelMediaSource;
use crate::infrastructure::meetings::LocalMeetingClient;
use crate::infrastructure::store::memory::{InMemoryAttendeeStore, InMemoryCallCount};
use crate::domain::call::dispatch::CallUpdateDispatcher;
use crate::infrastructure::telephony::{DriverDispatcher, HttpDispatcher, SipMediaApplicationDriver};
use crate::pipeline::{PipelineLauncher, PipelineRegistry, TranslationPipeline};
use std::sync::Arc;

pub struct App {
    pub config: Arc<Config>,
    pub machine: Arc<CallControlMachine>,
    pub driver: Arc<SipMediaApplicationDriver>,
    pub meetings: Arc<LocalMeetingClient>,
    pub attendees: Arc<InMemoryAttendeeStore>,
    pub call_count: Arc<InMemoryCallCount>,
    pub media: Arc<ChannelMediaSource>,
    pub registry: Arc<PipelineRegistry>,
    pub launcher: Arc<PipelineLauncher>,
}

impl App {
    pub fn build(
        config: Config,
        recognizer: Arc<dyn SpeechRecognizer>,
        translator: Arc<dyn Translator>,
    ) -> Self {
        let config = Arc::new(config);
        let attendees = Arc::new(InMemoryAttendeeStore::new());
        let call_count = Arc::new(InMemoryCallCount::new());
        let meetings = Arc::new(LocalMeetingClient::new());
        let media = Arc::new(ChannelMediaSource::new(config.pipeline.channel_capacity));
        let registry = Arc::new(PipelineRegistry::new());

        let machine = Arc::new(
            CallControlMachine::new(
                config.clone(),
                attendees.clone(),
                call_count.clone(),
                meetings.clone(),
            )
            .with_teardown(registry.clone()),
        );
        let driver = Arc::new(SipMediaApplicationDriver::new(machine.clone()));

        // Split deployments post updates to a remote call-control service
        let dispatcher: Arc<dyn CallUpdateDispatcher> =
            match &config.telephony.call_control_url {
                Some(base_url) => Arc::new(HttpDispatcher::new(base_url.clone())),
                None => Arc::new(DriverDispatcher::new(driver.clone())),
            };

        let pipeline = Arc::new(TranslationPipeline::new(
            attendees.clone(),
            media.clone(),
            recognizer,
            translator,
            dispatcher,
            config.pipeline.clone(),
        ));
        let launcher = Arc::new(PipelineLauncher::new(pipeline, registry.clone()));

        Self {
            config,
            machine,
            driver,
            meetings,
            attendees,
            call_count,
            media,
            registry,
            launcher,
        }
    }
}
