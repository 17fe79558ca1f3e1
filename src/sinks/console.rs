use super::Sink;
use crate::message::StreamMessage;
use anyhow::Result;
use async_trait::async_trait;
use std::io::Write;
use std::sync::Mutex;

/// Prints accepted messages as plain text blocks.
pub struct ConsoleSink {
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleSink {
    /// Console sink writing to stdout.
    pub fn new() -> Self {
        Self::with_writer(Box::new(std::io::stdout()))
    }

    pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    async fn deliver(&self, message: &StreamMessage) -> Result<()> {
        let block = format!(
            "@{}\n{}\n{}\n\n",
            message.author,
            message.text,
            message.permalink()
        );

        let mut out = self
            .out
            .lock()
            .map_err(|_| anyhow::anyhow!("console writer lock poisoned"))?;
        out.write_all(block.as_bytes())?;
        out.flush()?;
        Ok(())
    }
}
