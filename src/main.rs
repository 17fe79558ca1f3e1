//! tweetfilter binary.
//!
//! Usage: tweetfilter <search-terms> <output-file> [options]
//!
//! Credentials come from TWITTER_APP_KEY, TWITTER_APP_SECRET,
//! TWITTER_OAUTH_TOKEN and TWITTER_OAUTH_TOKEN_SECRET.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tweetfilter::sinks::notify::notify_bounded;
use tweetfilter::sinks::{ConsoleSink, Dispatcher, FileSink, Notifier, NotifySink};
use tweetfilter::{
    Config, Credentials, DedupCache, FilterEngine, FilterPipeline, HttpTransport, KeywordFilter,
    Overrides, Supervisor, SupervisorSettings,
};

/// Follow a keyword-filtered stream and append matches to a file.
#[derive(Parser, Debug)]
#[command(name = "tweetfilter", version)]
struct Args {
    /// Comma-separated search terms, e.g. "rust, async tokio"
    search_terms: String,

    /// File that matched messages are appended to
    output: PathBuf,

    /// Config file (TOML)
    #[arg(long, env = "TWEETFILTER_CONFIG")]
    config: Option<PathBuf>,

    /// Streaming endpoint URL
    #[arg(long)]
    endpoint: Option<String>,

    /// Give up after this many consecutive connection failures (0 = never)
    #[arg(long)]
    max_failures: Option<u32>,

    /// Number of recent message ids remembered for duplicate suppression
    #[arg(long)]
    dedup_capacity: Option<usize>,

    /// Command run with title and body for each match, e.g. "notify-send".
    /// Split on whitespace; use an array in the config file for quoted arguments.
    #[arg(long)]
    notify_command: Option<String>,

    /// Do not print matches to stdout
    #[arg(long)]
    quiet: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            output: Some(self.output.clone()),
            endpoint: self.endpoint.clone(),
            max_consecutive_failures: self.max_failures,
            dedup_capacity: self.dedup_capacity,
            notify_command: self.notify_command.clone(),
            quiet: self.quiet,
        }
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    config.apply(args.overrides());
    config.validate()?;
    Ok(config)
}

fn build_dispatcher(config: &Config, notifier: Option<Arc<dyn Notifier>>) -> Dispatcher {
    let mut dispatcher = Dispatcher::new().with_sink(Box::new(FileSink::new(&config.output.path)));
    if config.output.console {
        dispatcher.register(Box::new(ConsoleSink::new()));
    }
    if let Some(notifier) = notifier {
        dispatcher.register(Box::new(NotifySink::new(notifier)));
    }
    dispatcher
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config = load_config(&args)?;
    let credentials = Credentials::from_env().context("Missing streaming credentials")?;
    let filter = KeywordFilter::parse(&args.search_terms)?;

    let notifier: Option<Arc<dyn Notifier>> = match &config.output.notify_command {
        Some(command) => Some(Arc::new(command.notifier()?)),
        None => None,
    };

    let mut pipeline = FilterPipeline::new(
        FilterEngine::new(filter.clone(), DedupCache::new(config.stream.dedup_capacity)),
        build_dispatcher(&config, notifier.clone()),
    );
    if let Some(notifier) = &notifier {
        pipeline = pipeline.with_error_notifier(notifier.clone());
    }

    let transport = HttpTransport::new(
        config.stream.endpoint.clone(),
        credentials,
        config.stream.connect_timeout(),
    )?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            signal_token.cancel();
        }
    });

    info!(
        endpoint = %config.stream.endpoint,
        output = %config.output.path.display(),
        console = config.output.console,
        dedup_capacity = config.stream.dedup_capacity,
        "Configuration loaded"
    );
    println!("\nSearching for: {}\n", filter.track_param());

    let mut supervisor = Supervisor::new(
        transport,
        &filter,
        SupervisorSettings::from(&config.stream),
        shutdown,
    );
    let result = supervisor.run(&mut pipeline).await;

    let stream = supervisor.stats();
    let engine = pipeline.engine().stats();
    info!(
        connections = stream.connections,
        messages = stream.messages,
        malformed = stream.malformed,
        accepted = engine.accepted,
        duplicates = engine.duplicates,
        "Stream stopped"
    );

    if let Err(e) = result {
        error!(error = %e, "Stream filter failed");
        if let Some(notifier) = &notifier {
            notify_bounded(notifier.as_ref(), "tweetfilter", "Stream filter failed!").await;
        }
        return Err(e.into());
    }

    Ok(())
}
