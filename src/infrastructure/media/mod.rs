pub mod source;
pub mod transcode;

pub use source::{ChannelMediaSource, MediaSource, StartSelector};
pub use transcode::{transcoder_for, OggOpusTranscoder, OpusTranscodeConfig, PcmTranscoder, StreamTranscoder};
