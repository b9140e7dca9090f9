//! Chat-embedded directives.
//!
//! The assistant's command surface is not a process CLI: directives arrive
//! as chat lines (`import_chat <json>`, `sleep`, ...) and replies go back
//! into the conversation. A leading `@` is accepted.

use crate::error::{Error, Result};
use crate::import::{Importer, decode_records};
use std::path::PathBuf;

/// Default chunk size for file imports.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// A recognized chat directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// `import_chat <json>` — import records as one chunk.
    ImportChat { json: String },
    /// `batch_import_chat <batch_size> <json>`
    BatchImportChat { batch_size: usize, json: String },
    /// `import_chat_file <path> [batch=true|false] [batch_size=N]`
    ImportChatFile {
        path: PathBuf,
        batch: bool,
        batch_size: usize,
    },
    /// `sleep` / `sleep_short` — run a consolidation pass now.
    Sleep { short: bool },
}

impl Directive {
    /// Recognize a directive in a chat line.
    ///
    /// Returns `None` for ordinary conversation, `Some(Err(_))` for a
    /// directive with unusable arguments (the error text is the reply).
    pub fn parse(input: &str) -> Option<Result<Directive>> {
        let trimmed = input.trim();
        let body = trimmed.strip_prefix('@').unwrap_or(trimmed);
        let (head, rest) = match body.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (body, ""),
        };

        match head {
            "import_chat" => Some(if rest.is_empty() {
                Err(Error::Validation(
                    "usage: import_chat <json records>".to_string(),
                ))
            } else {
                Ok(Directive::ImportChat {
                    json: rest.to_string(),
                })
            }),
            "batch_import_chat" => Some(parse_batch_import(rest)),
            "import_chat_file" => Some(parse_file_import(rest)),
            "sleep" if rest.is_empty() => Some(Ok(Directive::Sleep { short: false })),
            "sleep_short" if rest.is_empty() => Some(Ok(Directive::Sleep { short: true })),
            _ => None,
        }
    }
}

fn parse_batch_import(rest: &str) -> Result<Directive> {
    let usage = "usage: batch_import_chat <batch_size> <json records>";
    let (size_str, json) = rest
        .split_once(char::is_whitespace)
        .ok_or_else(|| Error::Validation(usage.to_string()))?;
    let batch_size: usize = size_str
        .parse()
        .map_err(|_| Error::Validation(format!("batch size must be an integer — {usage}")))?;
    if batch_size == 0 {
        return Err(Error::Validation(format!(
            "batch size must be > 0 — {usage}"
        )));
    }
    Ok(Directive::BatchImportChat {
        batch_size,
        json: json.trim().to_string(),
    })
}

fn parse_file_import(rest: &str) -> Result<Directive> {
    let usage = "usage: import_chat_file <path> [batch=true|false] [batch_size=N]";
    let mut parts = rest.split_whitespace();
    let path = parts
        .next()
        .ok_or_else(|| Error::Validation(usage.to_string()))?;

    let mut batch = true;
    let mut batch_size = DEFAULT_BATCH_SIZE;
    for opt in parts {
        match opt.split_once('=') {
            Some(("batch", value)) => {
                batch = value
                    .parse()
                    .map_err(|_| Error::Validation(format!("bad batch option — {usage}")))?;
            }
            Some(("batch_size", value)) => {
                batch_size = value
                    .parse()
                    .map_err(|_| Error::Validation(format!("bad batch_size option — {usage}")))?;
                if batch_size == 0 {
                    return Err(Error::Validation(format!("batch_size must be > 0 — {usage}")));
                }
            }
            _ => return Err(Error::Validation(format!("unknown option {opt} — {usage}"))),
        }
    }

    Ok(Directive::ImportChatFile {
        path: PathBuf::from(path),
        batch,
        batch_size,
    })
}

/// Execute a directive and produce the chat reply.
///
/// Replies are always best-effort text; a failed import surfaces its
/// report or error message rather than aborting the conversation.
pub async fn handle(directive: Directive, importer: &Importer<'_>) -> String {
    match directive {
        Directive::ImportChat { json } => import_inline(importer, &json, None).await,
        Directive::BatchImportChat { batch_size, json } => {
            import_inline(importer, &json, Some(batch_size)).await
        }
        Directive::ImportChatFile {
            path,
            batch,
            batch_size,
        } => match importer.import_file(&path, batch, batch_size).await {
            Ok(report) => report.to_string(),
            Err(e) => format!("file import failed: {e}"),
        },
        Directive::Sleep { short } => match importer.store().consolidate(short).await {
            Ok(merged) => format!("consolidation complete: merged {merged} similar memories"),
            Err(e) => format!("consolidation failed: {e}"),
        },
    }
}

async fn import_inline(importer: &Importer<'_>, json: &str, batch_size: Option<usize>) -> String {
    let value: serde_json::Value = match serde_json::from_str(json) {
        Ok(value) => value,
        Err(e) => return format!("invalid JSON: {e}"),
    };
    let (records, undecodable) = match decode_records(value) {
        Ok(decoded) => decoded,
        Err(e) => return e.to_string(),
    };

    let result = match batch_size {
        Some(size) => importer.import(&records, size).await,
        None => importer.import_all(&records).await,
    };
    match result {
        Ok(mut report) => {
            report.total += undecodable;
            report.skipped += undecodable;
            report.to_string()
        }
        Err(e) => format!("import failed: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_conversation_is_not_a_directive() {
        assert!(Directive::parse("what did we talk about yesterday?").is_none());
        assert!(Directive::parse("sleep well!").is_none());
    }

    #[test]
    fn sleep_variants() {
        assert_eq!(
            Directive::parse("sleep").unwrap().unwrap(),
            Directive::Sleep { short: false }
        );
        assert_eq!(
            Directive::parse("@sleep_short").unwrap().unwrap(),
            Directive::Sleep { short: true }
        );
    }

    #[test]
    fn import_chat_requires_payload() {
        assert!(Directive::parse("import_chat").unwrap().is_err());
        assert_eq!(
            Directive::parse("@import_chat [{\"id\":1}]").unwrap().unwrap(),
            Directive::ImportChat {
                json: "[{\"id\":1}]".to_string()
            }
        );
    }

    #[test]
    fn batch_import_parses_size() {
        let directive = Directive::parse("batch_import_chat 20 []").unwrap().unwrap();
        assert_eq!(
            directive,
            Directive::BatchImportChat {
                batch_size: 20,
                json: "[]".to_string()
            }
        );
        assert!(Directive::parse("batch_import_chat zero []").unwrap().is_err());
        assert!(Directive::parse("batch_import_chat 0 []").unwrap().is_err());
    }

    #[test]
    fn file_import_options() {
        let directive = Directive::parse("import_chat_file /tmp/x.json batch=false")
            .unwrap()
            .unwrap();
        assert_eq!(
            directive,
            Directive::ImportChatFile {
                path: PathBuf::from("/tmp/x.json"),
                batch: false,
                batch_size: DEFAULT_BATCH_SIZE,
            }
        );

        let directive = Directive::parse("import_chat_file x.json batch_size=10")
            .unwrap()
            .unwrap();
        assert_eq!(
            directive,
            Directive::ImportChatFile {
                path: PathBuf::from("x.json"),
                batch: true,
                batch_size: 10,
            }
        );

        assert!(Directive::parse("import_chat_file x.json frobnicate=yes")
            .unwrap()
            .is_err());
    }
}
