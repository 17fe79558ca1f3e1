use crate::engine::{FilterEngine, Verdict};
use crate::error::StreamError;
use crate::message::StreamMessage;
use crate::sinks::notify::notify_detached;
use crate::sinks::{Dispatcher, Notifier};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Callbacks the supervisor drives for one stream.
#[async_trait]
pub trait MessageHandler: Send {
    async fn on_message(&mut self, message: StreamMessage);

    /// A connection attempt failed. `retry_in` is `None` when the
    /// supervisor is about to give up.
    async fn on_error(&mut self, _error: &StreamError, _retry_in: Option<Duration>) {}
}

/// Filter, dedup, then dispatch.
pub struct FilterPipeline {
    engine: FilterEngine,
    dispatcher: Dispatcher,
    notifier: Option<Arc<dyn Notifier>>,
}

impl FilterPipeline {
    pub fn new(engine: FilterEngine, dispatcher: Dispatcher) -> Self {
        Self {
            engine,
            dispatcher,
            notifier: None,
        }
    }

    /// Also report retried connection errors through `notifier`.
    #[must_use]
    pub fn with_error_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn engine(&self) -> &FilterEngine {
        &self.engine
    }
}

#[async_trait]
impl MessageHandler for FilterPipeline {
    async fn on_message(&mut self, message: StreamMessage) {
        match self.engine.evaluate(&message) {
            Verdict::Accepted => {
                let report = self.dispatcher.dispatch(&message).await;
                debug!(
                    message_id = %message.id,
                    author = %message.author,
                    delivered = report.delivered,
                    failed = report.failed,
                    "Message dispatched"
                );
            }
            Verdict::Duplicate => debug!(message_id = %message.id, "Duplicate suppressed"),
            Verdict::NoMatch => debug!(message_id = %message.id, "No keyword match"),
        }
    }

    async fn on_error(&mut self, error: &StreamError, retry_in: Option<Duration>) {
        debug!(
            error = %error,
            retrying = retry_in.is_some(),
            "Reporting stream error"
        );
        // The caller reports the final failure itself.
        if retry_in.is_none() {
            return;
        }
        if let Some(notifier) = &self.notifier {
            notify_detached(notifier.clone(), "ERROR".to_string(), error.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::DedupCache;
    use crate::filter::KeywordFilter;
    use crate::sinks::Sink;
    use chrono::Utc;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    struct CollectSink(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl Sink for CollectSink {
        fn name(&self) -> &str {
            "collect"
        }

        async fn deliver(&self, message: &StreamMessage) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(message.id.clone());
            Ok(())
        }
    }

    struct ChannelNotifier(mpsc::UnboundedSender<String>);

    #[async_trait]
    impl Notifier for ChannelNotifier {
        async fn notify(&self, title: &str, body: &str) -> anyhow::Result<()> {
            self.0.send(format!("{}: {}", title, body))?;
            Ok(())
        }
    }

    fn message(id: &str, text: &str) -> StreamMessage {
        StreamMessage {
            id: id.to_string(),
            author: "ferris".to_string(),
            display_name: "Ferris".to_string(),
            text: text.to_string(),
            location: None,
            created_at: Utc::now(),
        }
    }

    fn pipeline(delivered: Arc<Mutex<Vec<String>>>) -> FilterPipeline {
        FilterPipeline::new(
            FilterEngine::new(KeywordFilter::parse("rust").unwrap(), DedupCache::new(100)),
            Dispatcher::new().with_sink(Box::new(CollectSink(delivered))),
        )
    }

    #[tokio::test]
    async fn test_only_new_matches_dispatched() {
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = pipeline(delivered.clone());

        pipeline.on_message(message("1", "I love rust programming")).await;
        pipeline.on_message(message("1", "I love rust programming")).await;
        pipeline.on_message(message("2", "I love go programming")).await;
        pipeline.on_message(message("3", "Rust again")).await;

        assert_eq!(*delivered.lock().unwrap(), vec!["1", "3"]);
        let stats = pipeline.engine().stats();
        assert_eq!((stats.accepted, stats.duplicates, stats.unmatched), (2, 1, 1));
    }

    #[tokio::test]
    async fn test_errors_notified() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut pipeline = pipeline(Arc::new(Mutex::new(Vec::new())))
            .with_error_notifier(Arc::new(ChannelNotifier(tx)));

        pipeline
            .on_error(&StreamError::Closed, Some(Duration::from_secs(1)))
            .await;

        let note = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(note, "ERROR: stream closed by remote host");
    }

    #[tokio::test]
    async fn test_final_error_not_notified() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut pipeline = pipeline(Arc::new(Mutex::new(Vec::new())))
            .with_error_notifier(Arc::new(ChannelNotifier(tx)));

        pipeline
            .on_error(
                &StreamError::Auth {
                    status: 401,
                    body: "Unauthorized".to_string(),
                },
                None,
            )
            .await;
        pipeline
            .on_error(&StreamError::Closed, Some(Duration::from_secs(2)))
            .await;

        let note = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(note, "ERROR: stream closed by remote host");
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }
}
