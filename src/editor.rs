//! Purpose: Fill in request details through the user's external editor.
//! Exports: `compose`, `compose_compact`, `parse`, `edit_request`.
//! Role: Collaborator layer; turns a request into an editable JSON buffer and back.
//! Invariants: The buffer is a single JSON object `{method, url, headers, body}`.
//! Invariants: `compose`/`parse` are pure so the round trip is testable without a TTY.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::error::{Error, ErrorKind};
use crate::request::{Method, RequestDetails};

const BUFFER_FILE_PREFIX: &str = "quill_request";

#[derive(Debug, Serialize, Deserialize)]
struct EditorBuffer {
    method: String,
    url: String,
    headers: BTreeMap<String, String>,
    body: Value,
}

impl EditorBuffer {
    fn from_request(req: &RequestDetails) -> Self {
        let body = if req.body.is_empty() {
            Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(&req.body).unwrap_or_else(|_| Value::String(req.body.clone()))
        };
        Self {
            method: req.method.as_str().to_string(),
            url: req.url.clone(),
            headers: req.headers.iter().cloned().collect(),
            body,
        }
    }

    fn into_request(self) -> Result<RequestDetails, Error> {
        let method = Method::parse(&self.method)?;
        let mut req = RequestDetails::new(method, self.url);
        for (name, value) in self.headers {
            req.header(name, value);
        }
        req.body = match self.body {
            Value::Null => String::new(),
            Value::Object(map) if map.is_empty() => String::new(),
            Value::String(text) => text,
            other => serde_json::to_string(&other).map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("failed to encode request body")
                    .with_source(err)
            })?,
        };
        Ok(req)
    }
}

/// Renders the pretty-printed buffer the editor opens on.
pub fn compose(req: &RequestDetails) -> Result<String, Error> {
    serde_json::to_string_pretty(&EditorBuffer::from_request(req)).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode editor buffer")
            .with_source(err)
    })
}

/// Single-line rendering for the last-request cache. The store format is
/// line-oriented, so the cached value must not contain `\n`.
pub fn compose_compact(req: &RequestDetails) -> Result<String, Error> {
    serde_json::to_string(&EditorBuffer::from_request(req)).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode request cache entry")
            .with_source(err)
    })
}

pub fn parse(text: &str) -> Result<RequestDetails, Error> {
    let buffer: EditorBuffer = serde_json::from_str(text).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("editor buffer is not valid JSON")
            .with_hint("Keep the buffer a single JSON object with method, url, headers, and body.")
            .with_source(err)
    })?;
    buffer.into_request()
}

/// Writes the buffer to a temp file, launches `$VISUAL`/`$EDITOR`
/// (fallback `vi`), and parses the edited result.
pub fn edit_request(req: &RequestDetails) -> Result<RequestDetails, Error> {
    let buffer = compose(req)?;
    let path = buffer_path();
    std::fs::write(&path, buffer).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to write editor buffer")
            .with_path(&path)
            .with_source(err)
    })?;

    let editor = editor_command();
    let status = Command::new(&editor).arg(&path).status().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message(format!("failed to launch editor \"{editor}\""))
            .with_source(err)
    })?;
    if !status.success() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message(format!("editor \"{editor}\" exited with failure"))
            .with_hint("Set $EDITOR to your preferred editor."));
    }

    let text = std::fs::read_to_string(&path).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read editor buffer back")
            .with_path(&path)
            .with_source(err)
    })?;
    let _ = std::fs::remove_file(&path);
    parse(&text)
}

// The temp dir is shared across users and processes; the PID keeps
// concurrent invocations from clobbering each other's buffers.
fn buffer_path() -> PathBuf {
    std::env::temp_dir().join(format!("{BUFFER_FILE_PREFIX}_{}.json", std::process::id()))
}

fn editor_command() -> String {
    std::env::var("VISUAL")
        .or_else(|_| std::env::var("EDITOR"))
        .unwrap_or_else(|_| "vi".to_string())
}

#[cfg(test)]
mod tests {
    use super::{compose, compose_compact, parse};
    use crate::request::{Method, RequestDetails};

    #[test]
    fn compose_renders_template_fields() {
        let req = RequestDetails::new(Method::Get, "http://example.com");
        let text = compose(&req).expect("compose");
        assert!(text.contains("\"method\": \"GET\""));
        assert!(text.contains("\"url\": \"http://example.com\""));
        assert!(text.contains("\"body\": {}"));
    }

    #[test]
    fn buffer_round_trips_headers_and_body() {
        let mut req = RequestDetails::new(Method::Post, "http://example.com/items");
        req.header("X-Trace", "abc");
        req.body = "{\"name\":\"widget\"}".to_string();

        let text = compose(&req).expect("compose");
        let parsed = parse(&text).expect("parse");
        assert_eq!(parsed.method, Method::Post);
        assert_eq!(parsed.url, "http://example.com/items");
        assert_eq!(parsed.headers, vec![("X-Trace".to_string(), "abc".to_string())]);
        assert_eq!(parsed.body, "{\"name\":\"widget\"}");
    }

    #[test]
    fn empty_body_object_means_no_body() {
        let text = r#"{"method":"GET","url":"http://example.com","headers":{},"body":{}}"#;
        let parsed = parse(text).expect("parse");
        assert_eq!(parsed.body, "");
    }

    #[test]
    fn string_body_passes_through_raw() {
        let text = r#"{"method":"POST","url":"http://example.com","headers":{},"body":"plain text"}"#;
        let parsed = parse(text).expect("parse");
        assert_eq!(parsed.body, "plain text");
    }

    #[test]
    fn parse_rejects_invalid_json() {
        let err = parse("not a buffer").expect_err("err");
        assert_eq!(err.kind(), crate::core::error::ErrorKind::Usage);
    }

    #[test]
    fn parse_rejects_unknown_method() {
        let text = r#"{"method":"TRACE","url":"http://example.com","headers":{},"body":{}}"#;
        let err = parse(text).expect_err("err");
        assert_eq!(err.kind(), crate::core::error::ErrorKind::Usage);
    }

    #[test]
    fn buffer_path_is_unique_per_process() {
        let path = super::buffer_path();
        let name = path.file_name().expect("file name").to_string_lossy().into_owned();
        assert!(name.starts_with("quill_request_"));
        assert!(name.contains(&std::process::id().to_string()));
        assert!(name.ends_with(".json"));
    }

    #[test]
    fn compact_rendering_is_single_line() {
        let mut req = RequestDetails::new(Method::Put, "http://example.com");
        req.body = "{\"a\":1}".to_string();
        let text = compose_compact(&req).expect("compact");
        assert!(!text.contains('\n'));
        let parsed = parse(&text).expect("parse");
        assert_eq!(parsed.method, Method::Put);
        assert_eq!(parsed.body, "{\"a\":1}");
    }
}
