//! Episodic memory entry types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who spoke a remembered message, relative to the assistant's user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeakerRole {
    /// The user's own message.
    #[serde(rename = "self")]
    Own,
    /// Somebody else's message.
    #[serde(rename = "other")]
    Other,
}

impl std::fmt::Display for SpeakerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SpeakerRole::Own => "self",
            SpeakerRole::Other => "other",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for SpeakerRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "self" => Ok(SpeakerRole::Own),
            "other" => Ok(SpeakerRole::Other),
            other => Err(format!("unknown speaker role: {other}")),
        }
    }
}

/// Retention tier. Policy beyond the label belongs to the store's backing
/// engine, not to the import pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryTier {
    ShortTerm,
    LongTerm,
    Permanent,
}

impl std::fmt::Display for MemoryTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MemoryTier::ShortTerm => "short_term",
            MemoryTier::LongTerm => "long_term",
            MemoryTier::Permanent => "permanent",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for MemoryTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "short_term" => Ok(MemoryTier::ShortTerm),
            "long_term" => Ok(MemoryTier::LongTerm),
            "permanent" => Ok(MemoryTier::Permanent),
            other => Err(format!("unknown memory tier: {other}")),
        }
    }
}

/// Conversational context of a remembered message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryContext {
    pub talker: String,
    pub room_name: String,
}

/// A single remembered conversational event.
///
/// Created by the normalizer, never mutated afterwards; owned by the
/// memory store once submitted. Content is always non-empty and the
/// timestamp always parsed — records that cannot satisfy that never
/// become entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodicMemoryEntry {
    /// Unique id, minted at normalization time. Re-importing the same
    /// source record mints a new id — the pipeline does not dedup.
    pub id: String,
    pub speaker_role: SpeakerRole,
    pub content: String,
    pub context: MemoryContext,
    pub timestamp: DateTime<Utc>,
    pub tier: MemoryTier,
    /// Provenance label (e.g. "imported_chat").
    pub source: Option<String>,
    /// Server-side message id from the exporter, when present.
    pub server_id: Option<String>,
    /// Extra exporter fields carried along verbatim.
    pub metadata: serde_json::Value,
}

/// Filters for memory queries.
#[derive(Debug, Clone, Default)]
pub struct MemoryFilters {
    pub speaker_role: Option<SpeakerRole>,
    pub talker: Option<String>,
    pub room_name: Option<String>,
    pub since: Option<DateTime<Utc>>,
}
