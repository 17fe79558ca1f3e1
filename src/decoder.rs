use crate::error::{StreamError, StreamResult};
use crate::message::{Notice, Record, StreamMessage};
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_MAX_RECORD_BYTES: usize = 1024 * 1024;

/// Status timestamp format, e.g. `Wed Oct 10 20:19:24 +0000 2018`
const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

#[derive(Debug, Deserialize)]
struct RawStatus {
    id_str: Option<String>,
    id: Option<u64>,
    text: Option<String>,
    extended_tweet: Option<RawExtended>,
    user: RawUser,
    created_at: String,
}

#[derive(Debug, Deserialize)]
struct RawExtended {
    full_text: String,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    screen_name: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    location: Option<String>,
}

/// Splits a byte stream into newline-delimited records.
///
/// Partial records stay buffered until their delimiter arrives. A record
/// that grows past `max_record_bytes` without a delimiter is reported once
/// as malformed, then everything up to the next delimiter is dropped.
#[derive(Debug)]
pub struct LineDecoder {
    buffer: BytesMut,
    max_record_bytes: usize,
    discarding: bool,
}

impl LineDecoder {
    pub fn new(max_record_bytes: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            max_record_bytes: max_record_bytes.max(1),
            discarding: false,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Bytes held back waiting for a delimiter.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn next_record(&mut self) -> Option<Record> {
        loop {
            match self.buffer.iter().position(|b| *b == b'\n') {
                Some(pos) => {
                    let line = self.buffer.split_to(pos + 1);
                    if self.discarding {
                        // Tail of an oversized record, already reported
                        self.discarding = false;
                        continue;
                    }
                    return Some(parse_record(&line[..pos]));
                }
                None => {
                    if self.buffer.len() <= self.max_record_bytes {
                        return None;
                    }
                    self.buffer.clear();
                    if self.discarding {
                        return None;
                    }
                    self.discarding = true;
                    return Some(Record::Malformed(format!(
                        "record exceeds {} bytes",
                        self.max_record_bytes
                    )));
                }
            }
        }
    }
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RECORD_BYTES)
    }
}

/// Turn one connection's byte stream into a lazy stream of records.
///
/// The stream ends after its first error: `InactivityTimeout` when no bytes
/// arrive within `inactivity`, `Closed` when the body ends, or the
/// transport's own error.
pub fn records<S>(
    bytes: S,
    decoder: LineDecoder,
    inactivity: Duration,
) -> impl Stream<Item = StreamResult<Record>>
where
    S: Stream<Item = StreamResult<Bytes>> + Unpin,
{
    stream::unfold(Some((bytes, decoder)), move |state| async move {
        let Some((mut bytes, mut decoder)) = state else {
            return None;
        };
        loop {
            if let Some(record) = decoder.next_record() {
                return Some((Ok(record), Some((bytes, decoder))));
            }
            match tokio::time::timeout(inactivity, bytes.next()).await {
                Ok(Some(Ok(chunk))) => decoder.push(&chunk),
                Ok(Some(Err(e))) => return Some((Err(e), None)),
                Ok(None) => {
                    if decoder.buffered() > 0 {
                        debug!(
                            bytes = decoder.buffered(),
                            "Dropping partial record at end of stream"
                        );
                    }
                    return Some((Err(StreamError::Closed), None));
                }
                Err(_) => return Some((Err(StreamError::InactivityTimeout(inactivity)), None)),
            }
        }
    })
}

/// Parse a single record with its delimiter removed.
pub fn parse_record(line: &[u8]) -> Record {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    if line.iter().all(u8::is_ascii_whitespace) {
        return Record::KeepAlive;
    }

    let value: Value = match serde_json::from_slice(line) {
        Ok(value) => value,
        Err(e) => return Record::Malformed(format!("invalid JSON: {}", e)),
    };

    let Some(object) = value.as_object() else {
        return Record::Malformed("record is not a JSON object".to_string());
    };

    if object.contains_key("text") {
        return match parse_status(value) {
            Ok(message) => Record::Message(message),
            Err(reason) => Record::Malformed(reason),
        };
    }

    if let Some(delete) = object.get("delete") {
        let id = delete
            .pointer("/status/id_str")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Record::Notice(Notice::Delete { id });
    }

    if let Some(limit) = object.get("limit") {
        let undelivered = limit.get("track").and_then(Value::as_u64).unwrap_or(0);
        return Record::Notice(Notice::Limit { undelivered });
    }

    if let Some(disconnect) = object.get("disconnect") {
        let code = disconnect
            .get("code")
            .and_then(Value::as_u64)
            .and_then(|c| u32::try_from(c).ok())
            .unwrap_or(0);
        let reason = disconnect
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        return Record::Notice(Notice::Disconnect { code, reason });
    }

    if let Some(warning) = object.get("warning") {
        let message = warning
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Record::Notice(Notice::Warning { message });
    }

    Record::Notice(Notice::Other)
}

fn parse_status(value: Value) -> Result<StreamMessage, String> {
    let raw: RawStatus =
        serde_json::from_value(value).map_err(|e| format!("invalid status: {}", e))?;

    let id = raw
        .id_str
        .or_else(|| raw.id.map(|id| id.to_string()))
        .filter(|id| !id.is_empty())
        .ok_or_else(|| "status has no id".to_string())?;

    let text = match raw.extended_tweet {
        Some(extended) => extended.full_text,
        None => raw.text.ok_or_else(|| "status text is null".to_string())?,
    };

    let created_at = parse_created_at(&raw.created_at)
        .ok_or_else(|| format!("unparseable created_at: {}", raw.created_at))?;

    let display_name = raw
        .user
        .name
        .unwrap_or_else(|| raw.user.screen_name.clone());

    let location = raw
        .user
        .location
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty());

    Ok(StreamMessage {
        id,
        author: raw.user.screen_name,
        display_name,
        text,
        location,
        created_at,
    })
}

fn parse_created_at(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(s, CREATED_AT_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
