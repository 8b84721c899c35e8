//! Incremental assembly of a streamed turn.
//!
//! Fragments arrive as arbitrary slices of one JSON document. Until the
//! document is complete it is usually invalid JSON, so the only thing read
//! early is a best-effort preview of the `narrative` field. The full parse
//! happens once, when the stream ends, and its narrative replaces the
//! preview.

use crate::gateway::{FragmentStream, GatewayError};
use crate::turn::TurnResult;
use futures::StreamExt;
use lazy_static::lazy_static;
use regex::Regex;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

lazy_static! {
    // Opening quote of the narrative value up to its closing quote or the
    // end of the buffer. A trailing lone backslash is kept in the span so
    // that an unfinished escape fails to decode.
    static ref NARRATIVE_PREFIX: Regex =
        Regex::new(r#"(?s)"narrative"\s*:\s*"((?:[^"\\]|\\.|\\$)*)"#)
            .expect("valid regex");
}

/// Errors from assembling a streamed turn.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("The stream failed: {0}")]
    Stream(#[from] GatewayError),

    #[error("The stream stalled for {0:?}")]
    Timeout(Duration),

    #[error("The response was not a valid turn: {0}")]
    Malformed(String),
}

/// Best-effort decode of the `narrative` value in a partial document.
///
/// Returns `None` when the key has not arrived yet or the captured text is
/// not decodable as a JSON string, e.g. it ends inside an escape sequence.
pub fn extract_narrative_preview(buffer: &str) -> Option<String> {
    let span = NARRATIVE_PREFIX.captures(buffer)?.get(1)?.as_str();
    serde_json::from_str::<String>(&format!("\"{span}\"")).ok()
}

/// Accumulates the fragments of one turn.
#[derive(Debug, Default)]
pub struct TurnAssembler {
    buffer: String,
    preview: Option<String>,
}

impl TurnAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment. Returns the new preview when it changed.
    ///
    /// If the buffer cannot be previewed right now the previous preview is
    /// kept.
    pub fn push(&mut self, fragment: &str) -> Option<&str> {
        self.buffer.push_str(fragment);

        let candidate = extract_narrative_preview(&self.buffer)?;
        if self.preview.as_deref() == Some(candidate.as_str()) {
            return None;
        }
        self.preview = Some(candidate);
        self.preview.as_deref()
    }

    pub fn preview(&self) -> Option<&str> {
        self.preview.as_deref()
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Parse the complete buffer.
    pub fn finish(self) -> Result<TurnResult, TurnError> {
        let mut result: TurnResult = serde_json::from_str(&self.buffer).map_err(|e| {
            warn!(bytes = self.buffer.len(), error = %e, "turn response did not parse");
            TurnError::Malformed(e.to_string())
        })?;

        if let Some(quest) = result.new_quest.as_mut() {
            quest.enforce_depth_limit();
        }
        Ok(result)
    }
}

/// Drive `stream` to completion, reporting preview updates as they arrive.
///
/// Each fragment must arrive within `idle_timeout` of the previous one.
pub async fn assemble<F>(
    mut stream: FragmentStream,
    idle_timeout: Duration,
    mut on_preview: F,
) -> Result<TurnResult, TurnError>
where
    F: FnMut(&str),
{
    let mut assembler = TurnAssembler::new();
    let mut fragments = 0usize;

    loop {
        let next = tokio::time::timeout(idle_timeout, stream.next())
            .await
            .map_err(|_| TurnError::Timeout(idle_timeout))?;

        match next {
            Some(Ok(fragment)) => {
                fragments += 1;
                if let Some(preview) = assembler.push(&fragment) {
                    on_preview(preview);
                }
            }
            Some(Err(e)) => return Err(TurnError::Stream(e)),
            None => break,
        }
    }

    debug!(fragments, bytes = assembler.buffer().len(), "turn stream finished");
    assembler.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    const FULL_TURN_TAIL: &str = r#"ld","newLocation":"Harbor","updatedInventory":[],"newObjective":"Find the ship","isGameOver":false}"#;

    fn fragment_stream(fragments: &[&str]) -> FragmentStream {
        let items: Vec<Result<String, GatewayError>> =
            fragments.iter().map(|f| Ok(f.to_string())).collect();
        Box::pin(stream::iter(items))
    }

    #[test]
    fn test_preview_before_key() {
        assert_eq!(extract_narrative_preview(""), None);
        assert_eq!(extract_narrative_preview(r#"{"narr"#), None);
        assert_eq!(extract_narrative_preview(r#"{"narrative": "#), None);
        assert_eq!(
            extract_narrative_preview(r#"{"narrative": ""#),
            Some(String::new())
        );
    }

    #[test]
    fn test_preview_decodes_escapes() {
        assert_eq!(
            extract_narrative_preview(r#"{"narrative":"She said \"run\"\nand"#),
            Some("She said \"run\"\nand".to_string())
        );
        assert_eq!(
            extract_narrative_preview(r#"{"narrative":"café","dialogue":[]"#),
            Some("café".to_string())
        );
    }

    #[test]
    fn test_preview_fails_inside_escape() {
        assert_eq!(extract_narrative_preview(r#"{"narrative":"one\"#), None);
        assert_eq!(extract_narrative_preview(r#"{"narrative":"caf\u00"#), None);
    }

    #[test]
    fn test_push_keeps_preview_through_broken_escape() {
        let mut assembler = TurnAssembler::new();
        assert_eq!(assembler.push(r#"{"narrative":"Run"#), Some("Run"));
        assert_eq!(assembler.push(r#"\"#), None);
        assert_eq!(assembler.preview(), Some("Run"));
        assert_eq!(assembler.push(r#"n"#), Some("Run\n"));
    }

    #[test]
    fn test_push_reports_only_changes() {
        let mut assembler = TurnAssembler::new();
        assert_eq!(assembler.push(r#"{"narrative":"Hi""#), Some("Hi"));
        assert_eq!(assembler.push(r#","newLocation":"#), None);
        assert_eq!(assembler.preview(), Some("Hi"));
    }

    #[test]
    fn test_finish_truncated_is_malformed() {
        let mut assembler = TurnAssembler::new();
        assembler.push(r#"{"narrative":"Hello","newLocation":"Har"#);
        assert!(matches!(assembler.finish(), Err(TurnError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_assemble_hello_world() {
        let stream = fragment_stream(&[r#"{"narrative":"Hel"#, "lo wor", FULL_TURN_TAIL]);
        let mut previews = Vec::new();

        let result = assemble(stream, Duration::from_secs(5), |p| previews.push(p.to_string()))
            .await
            .unwrap();

        assert_eq!(previews, vec!["Hel", "Hello wor", "Hello world"]);
        assert_eq!(result.narrative, "Hello world");
        assert_eq!(result.new_location, "Harbor");
    }

    #[tokio::test]
    async fn test_assemble_empty_stream_is_malformed() {
        let result = assemble(fragment_stream(&[]), Duration::from_secs(5), |_| {}).await;
        assert!(matches!(result, Err(TurnError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_assemble_stream_error() {
        let items: Vec<Result<String, GatewayError>> = vec![
            Ok(r#"{"narrative":"Hel"#.to_string()),
            Err(GatewayError::Service("overloaded".to_string())),
        ];
        let result = assemble(Box::pin(stream::iter(items)), Duration::from_secs(5), |_| {}).await;
        assert!(matches!(result, Err(TurnError::Stream(GatewayError::Service(_)))));
    }

    #[tokio::test]
    async fn test_assemble_idle_timeout() {
        let stalled: FragmentStream = Box::pin(stream::pending::<Result<String, GatewayError>>());
        let result = assemble(stalled, Duration::from_millis(20), |_| {}).await;
        assert!(matches!(result, Err(TurnError::Timeout(_))));
    }
}
