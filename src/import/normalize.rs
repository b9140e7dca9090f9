//! Record normalization: raw chat record → episodic memory entry.

use crate::error::{Error, Result};
use crate::model::memory::{EpisodicMemoryEntry, MemoryContext, MemoryTier, SpeakerRole};
use crate::model::record::RawChatRecord;
use chrono::{DateTime, NaiveDateTime, Utc};
use uuid::Uuid;

/// Timestamp format the chat exporter writes.
const EXPORT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Message types that carry importable text. The exporter names types in
/// Chinese ("文本" = text); the ASCII spelling is accepted too.
const TEXT_TYPE_NAMES: [&str; 2] = ["文本", "text"];

/// Outcome of normalizing one record. Skips are counted, never fatal.
#[derive(Debug)]
pub enum Normalized {
    Entry(Box<EpisodicMemoryEntry>),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Non-text message type (image, voice, ...).
    UnsupportedType,
    /// Text record with no message content.
    EmptyContent,
    /// No talker on the record.
    MissingTalker,
    /// `CreateTime` missing or unparseable.
    BadTimestamp,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::UnsupportedType => "unsupported_type",
            SkipReason::EmptyContent => "empty_content",
            SkipReason::MissingTalker => "missing_talker",
            SkipReason::BadTimestamp => "bad_timestamp",
        }
    }
}

/// Validate and convert one raw record. Pure — no side effects.
///
/// `self_talker` is the configured identifier for the user's own messages;
/// a record is attributed to the user when the exporter flagged it as sent
/// or when the talker matches that identifier.
pub fn normalize(raw: &RawChatRecord, self_talker: &str) -> Normalized {
    if !TEXT_TYPE_NAMES.contains(&raw.type_name.as_str()) {
        return Normalized::Skipped(SkipReason::UnsupportedType);
    }

    let content = raw.message.trim();
    if content.is_empty() {
        return Normalized::Skipped(SkipReason::EmptyContent);
    }

    if raw.talker.is_empty() {
        return Normalized::Skipped(SkipReason::MissingTalker);
    }

    let timestamp = match parse_export_time(&raw.created_at) {
        Ok(ts) => ts,
        Err(_) => return Normalized::Skipped(SkipReason::BadTimestamp),
    };

    let speaker_role = if raw.is_sender || raw.talker == self_talker {
        SpeakerRole::Own
    } else {
        SpeakerRole::Other
    };

    Normalized::Entry(Box::new(EpisodicMemoryEntry {
        id: Uuid::new_v4().to_string(),
        speaker_role,
        content: content.to_string(),
        context: MemoryContext {
            talker: raw.talker.clone(),
            room_name: raw.room_name.clone(),
        },
        timestamp,
        tier: MemoryTier::LongTerm,
        source: Some("imported_chat".to_string()),
        server_id: raw.server_id.clone(),
        metadata: serde_json::json!({
            "original_id": raw.id,
            "media_source": raw.media_source,
            "extra": raw.extra,
        }),
    }))
}

/// Parse the exporter's local-time format, falling back to RFC 3339.
fn parse_export_time(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, EXPORT_TIME_FORMAT) {
        return Ok(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| Error::Parse(format!("unrecognized timestamp: {s:?}")))
}
