// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The event schema shared between adapters and the orchestrator.
//!
//! Events are transmitted as single-line JSON objects with an `eventType`
//! discriminant and a `payload` object (see `spec.md` §3 / §6). Consumers
//! must tolerate unknown `eventType` values for forward compatibility, so
//! parsing is split into two stages: [`RawEvent`] always succeeds on any
//! well-formed JSON object, and [`Event::from_raw`] maps known tags into
//! the typed enum, returning `None` for anything it doesn't recognize.

use serde::{Deserialize, Serialize};

/// The terminal status of a test or a completed test file.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum TestStatus {
    #[serde(rename = "PASS")]
    Pass,
    #[serde(rename = "FAIL")]
    Fail,
    #[serde(rename = "SKIP")]
    Skip,
}

/// Optional error details attached to a failing test or group.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorDetails {
    pub fn synthetic(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }
}

/// A single event on the IPC bus.
///
/// New variants are additive (§9 "Tagged events instead of subtype
/// dispatch"); a reader that doesn't know a variant ignores it rather than
/// erroring out.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "eventType", content = "payload", rename_all = "camelCase")]
pub enum Event {
    StdoutChunk {
        file_path: String,
        chunk: String,
    },
    StderrChunk {
        file_path: String,
        chunk: String,
    },
    /// Emitted once per test file when it completes. Arrives after all
    /// output chunks for that file have been appended.
    TestFileResult {
        file_path: String,
        status: TestStatus,
    },
    /// A group (suite, nested describe block, or test package) has
    /// started. `suite_chain` is the full path from the root.
    GroupStarted {
        suite_chain: Vec<String>,
    },
    TestStarted {
        suite_chain: Vec<String>,
        test_name: String,
    },
    TestCompleted {
        suite_chain: Vec<String>,
        test_name: String,
        status: TestStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<ErrorDetails>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
    },
    GroupCompleted {
        suite_chain: Vec<String>,
        status: TestStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<ErrorDetails>,
    },
}

/// An event record as it appears on the wire, before the `eventType` tag
/// has been validated against known variants.
///
/// Deserializing a `RawEvent` never fails due to an unrecognized
/// `eventType` — only malformed JSON fails. This lets [`crate::reader`]
/// distinguish "line is not JSON" (a parse failure, logged and discarded)
/// from "line is JSON but names an event we don't understand" (silently
/// ignored, per spec.md §4.2).
#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "eventType")]
    event_type: String,
    #[serde(default)]
    payload: serde_json::Value,
}

impl Event {
    /// Parses a single IPC line into an event.
    ///
    /// Returns `Ok(None)` for well-formed JSON with an unrecognized
    /// `eventType` (forward-compat), and `Err` only when the line isn't a
    /// valid `RawEvent` at all.
    pub fn parse_line(line: &str) -> Result<Option<Event>, serde_json::Error> {
        let raw: RawEvent = serde_json::from_str(line)?;
        Ok(Self::from_raw(raw.event_type.as_str(), raw.payload))
    }

    fn from_raw(event_type: &str, payload: serde_json::Value) -> Option<Event> {
        // Re-nest the already-split tag/payload so `Event`'s derived
        // Deserialize (which expects the full `{"eventType":..,"payload":..}`
        // shape) can do the rest of the field validation for us.
        let reconstructed = serde_json::json!({
            "eventType": event_type,
            "payload": payload,
        });
        serde_json::from_value(reconstructed).ok()
    }

    /// The `filePath` a chunk or file-result event refers to, if any.
    pub fn file_path(&self) -> Option<&str> {
        match self {
            Event::StdoutChunk { file_path, .. }
            | Event::StderrChunk { file_path, .. }
            | Event::TestFileResult { file_path, .. } => Some(file_path),
            _ => None,
        }
    }

    /// Serializes this event to a single line (without the trailing
    /// newline), as written by [`crate::writer::IpcWriter`].
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn round_trips_known_event() {
        let event = Event::TestFileResult {
            file_path: "a".to_string(),
            status: TestStatus::Pass,
        };
        let line = event.to_line().unwrap();
        let parsed = Event::parse_line(&line).unwrap();
        assert_eq!(parsed, Some(event));
    }

    #[test]
    fn unknown_event_type_is_ignored_not_erred() {
        let line = r#"{"eventType":"futureThing","payload":{}}"#;
        assert_eq!(Event::parse_line(line).unwrap(), None);
    }

    #[test]
    fn malformed_json_is_an_error() {
        let line = r#"{"eventType":"testFil"#;
        assert!(Event::parse_line(line).is_err());
    }

    #[test]
    fn status_uses_upper_case_wire_form() {
        let event = Event::TestFileResult {
            file_path: "a".to_string(),
            status: TestStatus::Fail,
        };
        let line = event.to_line().unwrap();
        assert!(line.contains("\"FAIL\""));
    }
}
