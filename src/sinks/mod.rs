pub mod console;
pub mod file;
pub mod notify;

use crate::message::StreamMessage;
use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;

pub use console::ConsoleSink;
pub use file::FileSink;
pub use notify::{CommandNotifier, Notifier, NotifySink};

#[async_trait]
pub trait Sink: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, message: &StreamMessage) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Fans accepted messages out to every registered sink.
///
/// Sinks run one after another in registration order. A failing sink is
/// logged and skipped; the rest still get the message.
#[derive(Default)]
pub struct Dispatcher {
    sinks: Vec<Box<dyn Sink>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, sink: Box<dyn Sink>) {
        self.sinks.push(sink);
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Box<dyn Sink>) -> Self {
        self.register(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub async fn dispatch(&self, message: &StreamMessage) -> DispatchReport {
        let mut report = DispatchReport::default();
        for sink in &self.sinks {
            match sink.deliver(message).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    let error = format!("{:#}", e);
                    warn!(
                        sink = sink.name(),
                        message_id = %message.id,
                        error = %error,
                        "Sink delivery failed"
                    );
                    report.failed += 1;
                }
            }
        }
        report
    }
}
