//! Shared value objects used across multiple bounded contexts

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Meeting identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeetingId(Uuid);

impl MeetingId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for MeetingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MeetingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MeetingId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Attendee identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttendeeId(Uuid);

impl AttendeeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AttendeeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AttendeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AttendeeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Telephony transaction identifier
///
/// One transaction exists per call leg on the telephony platform; it is the
/// "mailbox" that in-call update requests are addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(Uuid);

impl TransactionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TransactionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Supported locale for recognition, translation and speech synthesis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "en-US")]
    EnUs,
    #[serde(rename = "de-DE")]
    DeDe,
    #[serde(rename = "pt-BR")]
    PtBr,
    #[serde(rename = "fr-FR")]
    FrFr,
    #[serde(rename = "es-US")]
    EsUs,
    #[serde(rename = "hi-IN")]
    HiIn,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::EnUs => "en-US",
            Language::DeDe => "de-DE",
            Language::PtBr => "pt-BR",
            Language::FrFr => "fr-FR",
            Language::EsUs => "es-US",
            Language::HiIn => "hi-IN",
        }
    }

    /// Synthesis voice used when speaking this language on a call leg
    pub fn voice(&self) -> &'static str {
        match self {
            Language::EnUs => "Joanna",
            Language::DeDe => "Vicki",
            Language::PtBr => "Camila",
            Language::FrFr => "Lea",
            Language::EsUs => "Lupe",
            Language::HiIn => "Kajal",
        }
    }

    /// Resolve a spoken language name from the routing table to a locale.
    ///
    /// The "passthru" route bridges without translation and maps to en-US.
    pub fn from_spoken_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "passthru" => Some(Language::EnUs),
            "german" => Some(Language::DeDe),
            "portuguese" => Some(Language::PtBr),
            "french" => Some(Language::FrFr),
            "spanish" => Some(Language::EsUs),
            "hindi" => Some(Language::HiIn),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "en-US" => Ok(Language::EnUs),
            "de-DE" => Ok(Language::DeDe),
            "pt-BR" => Ok(Language::PtBr),
            "fr-FR" => Ok(Language::FrFr),
            "es-US" => Ok(Language::EsUs),
            "hi-IN" => Ok(Language::HiIn),
            other => Err(format!("Unsupported language code: {}", other)),
        }
    }
}
