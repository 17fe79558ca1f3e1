use crate::backoff::DEFAULT_JITTER;
use crate::decoder::DEFAULT_MAX_RECORD_BYTES;
use crate::dedup::DEFAULT_DEDUP_CAPACITY;
use crate::error::{StreamError, StreamResult};
use crate::sinks::CommandNotifier;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://stream.twitter.com/1.1/statuses/filter.json";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub stream: StreamConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub endpoint: String,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: f64,
    /// 0 retries forever
    pub max_consecutive_failures: u32,
    pub inactivity_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub max_record_bytes: usize,
    pub dedup_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            jitter: DEFAULT_JITTER,
            max_consecutive_failures: 10,
            inactivity_timeout_secs: 90,
            connect_timeout_secs: 10,
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
            dedup_capacity: DEFAULT_DEDUP_CAPACITY,
        }
    }
}

impl StreamConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub path: PathBuf,
    pub console: bool,
    pub notify_command: Option<NotifyCommand>,
}

/// `notify_command = "notify-send -a tweetfilter"` is split on whitespace;
/// `notify_command = ["notify-send", "-a", "tweet filter"]` is taken as-is.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum NotifyCommand {
    Line(String),
    Argv(Vec<String>),
}

impl NotifyCommand {
    pub fn notifier(&self) -> Result<CommandNotifier> {
        match self {
            NotifyCommand::Line(line) => CommandNotifier::parse(line),
            NotifyCommand::Argv(argv) => CommandNotifier::from_argv(argv.iter().cloned()),
        }
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub output: Option<PathBuf>,
    pub endpoint: Option<String>,
    pub max_consecutive_failures: Option<u32>,
    pub dedup_capacity: Option<usize>,
    pub notify_command: Option<String>,
    pub quiet: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("tweets.txt"),
            console: true,
            notify_command: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Load `<config_dir>/tweetfilter/config.toml` if present, else defaults.
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(path) = overrides.output {
            self.output.path = path;
        }
        if let Some(endpoint) = overrides.endpoint {
            self.stream.endpoint = endpoint;
        }
        if let Some(max_failures) = overrides.max_consecutive_failures {
            self.stream.max_consecutive_failures = max_failures;
        }
        if let Some(capacity) = overrides.dedup_capacity {
            self.stream.dedup_capacity = capacity;
        }
        if let Some(command) = overrides.notify_command {
            self.output.notify_command = Some(NotifyCommand::Line(command));
        }
        if overrides.quiet {
            self.output.console = false;
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tweetfilter").join("config.toml"))
    }

    pub fn validate(&self) -> StreamResult<()> {
        let stream = &self.stream;
        if stream.endpoint.trim().is_empty() {
            return Err(invalid("stream.endpoint must not be empty"));
        }
        if stream.base_delay_ms == 0 {
            return Err(invalid("stream.base_delay_ms must be greater than zero"));
        }
        if stream.max_delay_ms < stream.base_delay_ms {
            return Err(invalid("stream.max_delay_ms must be at least base_delay_ms"));
        }
        if !(0.0..=1.0).contains(&stream.jitter) {
            return Err(invalid("stream.jitter must be between 0 and 1"));
        }
        if stream.inactivity_timeout_secs == 0 {
            return Err(invalid(
                "stream.inactivity_timeout_secs must be greater than zero",
            ));
        }
        if stream.dedup_capacity == 0 {
            return Err(invalid("stream.dedup_capacity must be greater than zero"));
        }
        if stream.max_record_bytes == 0 {
            return Err(invalid("stream.max_record_bytes must be greater than zero"));
        }
        if self.output.path.as_os_str().is_empty() {
            return Err(invalid("output.path must not be empty"));
        }
        Ok(())
    }
}

fn invalid(reason: &str) -> StreamError {
    StreamError::Config(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.stream.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.stream.base_delay(), Duration::from_secs(1));
        assert_eq!(config.stream.dedup_capacity, 10_000);
        assert_eq!(config.output.path, PathBuf::from("tweets.txt"));
        assert!(config.output.console);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[stream]
base_delay_ms = 250
max_consecutive_failures = 0

[output]
path = "/var/log/matches.txt"
notify_command = "notify-send"
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.stream.base_delay(), Duration::from_millis(250));
        assert_eq!(config.stream.max_consecutive_failures, 0);
        assert_eq!(config.stream.max_delay(), Duration::from_secs(60));
        assert_eq!(config.stream.inactivity_timeout(), Duration::from_secs(90));
        assert_eq!(config.output.path, PathBuf::from("/var/log/matches.txt"));
        assert_eq!(
            config.output.notify_command,
            Some(NotifyCommand::Line("notify-send".to_string()))
        );
        assert!(config.output.console);
    }

    #[test]
    fn test_notify_command_as_array() {
        let config: Config = toml::from_str(
            r#"
[output]
notify_command = ["notify-send", "-a", "tweet filter"]
"#,
        )
        .unwrap();
        let command = config.output.notify_command.unwrap();
        assert_eq!(
            command,
            NotifyCommand::Argv(vec![
                "notify-send".to_string(),
                "-a".to_string(),
                "tweet filter".to_string(),
            ])
        );
        assert!(command.notifier().is_ok());
        assert!(NotifyCommand::Argv(Vec::new()).notifier().is_err());
    }

    #[test]
    fn test_overrides_take_precedence_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[stream]
endpoint = "https://file.example.com/filter.json"
max_consecutive_failures = 3
dedup_capacity = 50
base_delay_ms = 250

[output]
path = "from-file.txt"
console = true
notify_command = ["notify-send", "-a", "tweet filter"]
"#,
        )
        .unwrap();

        let mut config = Config::load(&path).unwrap();
        config.apply(Overrides {
            output: Some(PathBuf::from("from-cli.txt")),
            endpoint: Some("https://cli.example.com/filter.json".to_string()),
            max_consecutive_failures: Some(0),
            dedup_capacity: None,
            notify_command: Some("notify-send".to_string()),
            quiet: true,
        });

        assert_eq!(config.output.path, PathBuf::from("from-cli.txt"));
        assert_eq!(config.stream.endpoint, "https://cli.example.com/filter.json");
        assert_eq!(config.stream.max_consecutive_failures, 0);
        assert!(!config.output.console);
        assert_eq!(
            config.output.notify_command,
            Some(NotifyCommand::Line("notify-send".to_string()))
        );
        // Untouched by the command line
        assert_eq!(config.stream.dedup_capacity, 50);
        assert_eq!(config.stream.base_delay(), Duration::from_millis(250));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_overrides_keep_file_values() {
        let mut config = Config::default();
        config.stream.max_consecutive_failures = 4;
        config.apply(Overrides::default());
        assert_eq!(config.stream.max_consecutive_failures, 4);
        assert!(config.output.console);
        assert_eq!(config.output.path, PathBuf::from("tweets.txt"));
    }

    #[test]
    fn test_load_reports_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[stream\nbase_delay_ms = ").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.stream.max_delay_ms = 10;
        assert!(matches!(config.validate(), Err(StreamError::Config(_))));

        let mut config = Config::default();
        config.stream.jitter = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.stream.dedup_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.stream.inactivity_timeout_secs = 0;
        assert!(config.validate().is_err());
    }
}
