use super::Sink;
use crate::message::StreamMessage;
use anyhow::Result;
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::debug;

/// Longest a single notification may run before it is abandoned.
pub const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Something that can pop up a short notification.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, title: &str, body: &str) -> Result<()>;
}

/// Runs an external command with the title and body appended as arguments,
/// e.g. `notify-send -a tweetfilter`.
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    program: String,
    args: Vec<String>,
}

impl CommandNotifier {
    /// Split `command` on whitespace. Quoting is not supported; use
    /// [`CommandNotifier::from_argv`] for arguments containing spaces.
    pub fn parse(command: &str) -> Result<Self> {
        Self::from_argv(command.split_whitespace().map(str::to_string))
    }

    /// Program followed by its arguments, taken verbatim.
    pub fn from_argv<I>(argv: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut parts = argv.into_iter();
        let program = parts
            .next()
            .filter(|program| !program.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("notify command is empty"))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

#[async_trait]
impl Notifier for CommandNotifier {
    async fn notify(&self, title: &str, body: &str) -> Result<()> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(title)
            .arg(body)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await?;

        if status.success() {
            Ok(())
        } else {
            Err(anyhow::anyhow!("{} exited with {}", self.program, status))
        }
    }
}

/// Fire-and-forget notification for every accepted message.
pub struct NotifySink {
    notifier: Arc<dyn Notifier>,
}

impl NotifySink {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

/// Send one notification, giving up after [`NOTIFY_TIMEOUT`].
///
/// Failures are logged at debug and otherwise ignored.
pub async fn notify_bounded(notifier: &dyn Notifier, title: &str, body: &str) {
    match tokio::time::timeout(NOTIFY_TIMEOUT, notifier.notify(title, body)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "Notification failed"),
        Err(_) => debug!(
            timeout_secs = NOTIFY_TIMEOUT.as_secs(),
            "Notification timed out"
        ),
    }
}

/// [`notify_bounded`] on a background task.
pub fn notify_detached(notifier: Arc<dyn Notifier>, title: String, body: String) -> JoinHandle<()> {
    tokio::spawn(async move { notify_bounded(notifier.as_ref(), &title, &body).await })
}

#[async_trait]
impl Sink for NotifySink {
    fn name(&self) -> &str {
        "notify"
    }

    async fn deliver(&self, message: &StreamMessage) -> Result<()> {
        let _ = notify_detached(
            self.notifier.clone(),
            format!("@{}", message.author),
            message.text.clone(),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct ChannelNotifier(mpsc::UnboundedSender<(String, String)>);

    #[async_trait]
    impl Notifier for ChannelNotifier {
        async fn notify(&self, title: &str, body: &str) -> Result<()> {
            self.0.send((title.to_string(), body.to_string()))?;
            Ok(())
        }
    }

    struct FailingNotifier;

    struct StuckNotifier;

    #[async_trait]
    impl Notifier for StuckNotifier {
        async fn notify(&self, _title: &str, _body: &str) -> Result<()> {
            futures::future::pending::<()>().await;
            Ok(())
        }
    }

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn notify(&self, _title: &str, _body: &str) -> Result<()> {
            Err(anyhow::anyhow!("no notification daemon"))
        }
    }

    fn message() -> StreamMessage {
        StreamMessage {
            id: "5".to_string(),
            author: "ferris".to_string(),
            display_name: "Ferris".to_string(),
            text: "rust 1.0 released".to_string(),
            location: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_notifies_handle_and_body() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = NotifySink::new(Arc::new(ChannelNotifier(tx)));

        sink.deliver(&message()).await.unwrap();

        let (title, body) = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(title, "@ferris");
        assert_eq!(body, "rust 1.0 released");
    }

    #[tokio::test]
    async fn test_notifier_failure_swallowed() {
        let sink = NotifySink::new(Arc::new(FailingNotifier));
        assert!(sink.deliver(&message()).await.is_ok());
    }

    #[test]
    fn test_parse_command() {
        let notifier = CommandNotifier::parse("notify-send -a tweetfilter").unwrap();
        assert_eq!(notifier.program, "notify-send");
        assert_eq!(notifier.args, vec!["-a", "tweetfilter"]);
        assert!(CommandNotifier::parse("   ").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_notifier_abandoned_after_timeout() {
        let started = tokio::time::Instant::now();
        let handle = notify_detached(
            Arc::new(StuckNotifier),
            "@ferris".to_string(),
            "rust".to_string(),
        );

        tokio::time::timeout(NOTIFY_TIMEOUT + Duration::from_secs(1), handle)
            .await
            .expect("notification task outlived its timeout")
            .unwrap();
        assert!(started.elapsed() >= NOTIFY_TIMEOUT);
    }

    #[test]
    fn test_argv_keeps_spaces_in_arguments() {
        let notifier = CommandNotifier::from_argv(vec![
            "notify-send".to_string(),
            "-a".to_string(),
            "tweet filter".to_string(),
        ])
        .unwrap();
        assert_eq!(notifier.program, "notify-send");
        assert_eq!(notifier.args, vec!["-a", "tweet filter"]);
        assert!(CommandNotifier::from_argv(Vec::<String>::new()).is_err());
        assert!(CommandNotifier::from_argv(vec![" ".to_string()]).is_err());
    }

    #[tokio::test]
    async fn test_missing_program_is_an_error() {
        let notifier = CommandNotifier::parse("tweetfilter-no-such-notifier-binary").unwrap();
        assert!(notifier.notify("title", "body").await.is_err());
    }
}
