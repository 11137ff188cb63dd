//! Configuration management

use crate::domain::translation::AudioEncoding;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub telephony: TelephonyConfig,
    pub pipeline: PipelineConfig,
    /// Static called-number -> language routing table. New languages are
    /// additive configuration, not code changes.
    pub routing: HashMap<String, RouteEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelephonyConfig {
    /// Caller id presented on bridged dial-outs
    pub caller_id_number: String,
    /// When set, bridging goes through the SIP trunk to this number
    pub external_trunk_number: Option<String>,
    /// When set, call updates are posted to this remote call-control base
    /// URL instead of the in-process driver
    pub call_control_url: Option<String>,
    /// Played to the caller once the inbound leg has joined the meeting
    pub connecting_message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Bound of the channels between pipeline stages
    pub channel_capacity: usize,
    /// Sample rate fed to the streaming recognizer
    pub sample_rate_hz: u32,
    /// Codec the capture audio is repackaged into for the recognizer
    pub encoding: AudioEncoding,
}

/// One row of the routing table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteEntry {
    /// Spoken language name, e.g. "spanish" or "passthru"
    pub language: String,
    /// Dial target bridged for this called number
    pub internal_phone_number: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for TelephonyConfig {
    fn default() -> Self {
        Self {
            caller_id_number: "+18005551212".to_string(),
            external_trunk_number: None,
            call_control_url: None,
            connecting_message:
                "Connecting you to your party. Conversation may be delayed as translations occur."
                    .to_string(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 32,
            sample_rate_hz: 48_000,
            encoding: AudioEncoding::OggOpus,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Config = toml::from_str(&raw)?;
        Ok(config)
    }

    /// Resolve the route for a called number.
    ///
    /// Unknown numbers fall back to a passthru bridge of the same number, so
    /// a missing table row degrades to an untranslated call instead of a
    /// failed one.
    pub fn route_for(&self, called_number: &str) -> RouteEntry {
        self.routing.get(called_number).cloned().unwrap_or_else(|| RouteEntry {
            language: "passthru".to_string(),
            internal_phone_number: called_number.to_string(),
        })
    }
}
