//! Raw chat record as exported by the chat-history backup tooling.

use serde::{Deserialize, Deserializer};

/// One exported chat message, exactly as it appears in the backup JSON.
///
/// Field names follow the export format (`msg`, `src`, `CreateTime`,
/// `MsgSvrID`). Records are immutable once received; all semantic
/// validation happens in the normalizer, which turns a record into either
/// an episodic memory entry or a counted skip.
#[derive(Debug, Clone, Deserialize)]
pub struct RawChatRecord {
    #[serde(default)]
    pub id: i64,

    /// Server-side message id, when the exporter had one.
    #[serde(rename = "MsgSvrID", default)]
    pub server_id: Option<String>,

    /// Message type as named by the exporter ("文本", "图片", ...).
    #[serde(default)]
    pub type_name: String,

    /// True when the user sent this message. The exporter writes 0/1.
    #[serde(default, deserialize_with = "bool_from_int_or_bool")]
    pub is_sender: bool,

    #[serde(default)]
    pub talker: String,

    #[serde(default)]
    pub room_name: String,

    #[serde(rename = "msg", default)]
    pub message: String,

    #[serde(rename = "src", default)]
    pub media_source: Option<String>,

    #[serde(default)]
    pub extra: serde_json::Value,

    #[serde(rename = "CreateTime", default)]
    pub created_at: String,
}

/// Accept both JSON booleans and the exporter's 0/1 integers.
fn bool_from_int_or_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrInt {
        Bool(bool),
        Int(i64),
    }

    Ok(match BoolOrInt::deserialize(deserializer)? {
        BoolOrInt::Bool(b) => b,
        BoolOrInt::Int(n) => n != 0,
    })
}
