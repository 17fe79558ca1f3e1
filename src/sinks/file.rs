use super::Sink;
use crate::message::StreamMessage;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

pub const SEPARATOR_WIDTH: usize = 80;

/// Appends one text record per message to a file.
///
/// The file is opened, written, and closed on every delivery so a failed
/// write never leaves a handle behind.
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Render the on-disk record for a message.
pub fn format_record(message: &StreamMessage) -> String {
    let header = match &message.location {
        Some(location) => format!(
            "@{} ({}) -- {}:",
            message.author, message.display_name, location
        ),
        None => format!("@{} ({}):", message.author, message.display_name),
    };

    format!(
        "{}\n\n{}\n\n{}\n\n{}\n",
        header,
        message.text,
        message.permalink(),
        "-".repeat(SEPARATOR_WIDTH)
    )
}

#[async_trait]
impl Sink for FileSink {
    fn name(&self) -> &str {
        "file"
    }

    async fn deliver(&self, message: &StreamMessage) -> Result<()> {
        let record = format_record(message);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open {}", self.path.display()))?;

        file.write_all(record.as_bytes())
            .await
            .with_context(|| format!("Failed to write to {}", self.path.display()))?;
        file.flush().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message(id: &str, location: Option<&str>) -> StreamMessage {
        StreamMessage {
            id: id.to_string(),
            author: "ferris".to_string(),
            display_name: "Ferris the Crab".to_string(),
            text: "I love rust programming 🦀".to_string(),
            location: location.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_format_record_with_location() {
        let record = format_record(&message("1", Some("The Ocean")));
        let expected = format!(
            "@ferris (Ferris the Crab) -- The Ocean:\n\nI love rust programming 🦀\n\nhttps://twitter.com/ferris/status/1\n\n{}\n",
            "-".repeat(80)
        );
        assert_eq!(record, expected);
    }

    #[test]
    fn test_format_record_without_location() {
        let record = format_record(&message("1", None));
        assert!(record.starts_with("@ferris (Ferris the Crab):\n\n"));
        assert!(record.ends_with(&format!("status/1\n\n{}\n", "-".repeat(80))));
    }

    #[tokio::test]
    async fn test_appends_never_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tweets.txt");
        std::fs::write(&path, "existing\n").unwrap();

        let sink = FileSink::new(&path);
        sink.deliver(&message("1", None)).await.unwrap();
        sink.deliver(&message("2", Some("Berlin"))).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let expected = format!(
            "existing\n{}{}",
            format_record(&message("1", None)),
            format_record(&message("2", Some("Berlin")))
        );
        assert_eq!(contents, expected);
    }

    #[tokio::test]
    async fn test_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new.txt");

        FileSink::new(&path).deliver(&message("1", None)).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_unwritable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path().join("missing").join("tweets.txt"));

        let err = sink.deliver(&message("1", None)).await.unwrap_err();
        assert!(err.to_string().contains("Failed to open"));
        assert_eq!(sink.name(), "file");
    }
}
