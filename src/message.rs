use chrono::{DateTime, Utc};

const PERMALINK_BASE: &str = "https://twitter.com";

/// A decoded status from the stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamMessage {
    pub id: String,
    pub author: String,
    pub display_name: String,
    pub text: String,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StreamMessage {
    pub fn permalink(&self) -> String {
        format!("{}/{}/status/{}", PERMALINK_BASE, self.author, self.id)
    }
}

/// One delimited record from the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Message(StreamMessage),
    KeepAlive,
    Notice(Notice),
    Malformed(String),
}

/// Protocol control records that carry no status.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Delete { id: String },
    Limit { undelivered: u64 },
    Disconnect { code: u32, reason: String },
    Warning { message: String },
    Other,
}
