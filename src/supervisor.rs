//! Connection lifecycle: connect, consume, back off, reconnect.
//!
//! The supervisor owns one connection at a time. Every record is decoded,
//! handed to the [`MessageHandler`], and finished before the next read, so
//! a slow handler slows ingestion instead of growing a buffer.
//!
//! Any transport error, clean close, disconnect notice, or inactivity
//! timeout (including a connect that never gets response headers) counts
//! as one consecutive failure and triggers a reconnect after the next
//! backoff delay. The failure count and backoff both reset on the first
//! message decoded from a connection. Authentication errors stop the
//! loop immediately; otherwise it stops once the failure ceiling is hit.

use crate::backoff::Backoff;
use crate::config::StreamConfig;
use crate::decoder::{self, LineDecoder};
use crate::error::{StreamError, StreamResult};
use crate::filter::KeywordFilter;
use crate::message::{Notice, Record};
use crate::pipeline::MessageHandler;
use crate::transport::Transport;
use futures::StreamExt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: f64,
    /// 0 retries forever
    pub max_consecutive_failures: u32,
    pub inactivity_timeout: Duration,
    pub max_record_bytes: usize,
}

impl From<&StreamConfig> for SupervisorSettings {
    fn from(config: &StreamConfig) -> Self {
        Self {
            base_delay: config.base_delay(),
            max_delay: config.max_delay(),
            jitter: config.jitter,
            max_consecutive_failures: config.max_consecutive_failures,
            inactivity_timeout: config.inactivity_timeout(),
            max_record_bytes: config.max_record_bytes,
        }
    }
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self::from(&StreamConfig::default())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub connections: u64,
    pub messages: u64,
    pub keep_alives: u64,
    pub notices: u64,
    pub malformed: u64,
    pub failures: u64,
}

pub struct Supervisor<T> {
    transport: T,
    track: String,
    settings: SupervisorSettings,
    backoff: Backoff,
    consecutive_failures: u32,
    stats: StreamStats,
    shutdown: CancellationToken,
}

impl<T: Transport> Supervisor<T> {
    pub fn new(
        transport: T,
        filter: &KeywordFilter,
        settings: SupervisorSettings,
        shutdown: CancellationToken,
    ) -> Self {
        let backoff =
            Backoff::new(settings.base_delay, settings.max_delay).with_jitter(settings.jitter);
        Self {
            transport,
            track: filter.track_param(),
            settings,
            backoff,
            consecutive_failures: 0,
            stats: StreamStats::default(),
            shutdown,
        }
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    /// Run until shutdown (`Ok`) or a fatal error.
    pub async fn run<H>(&mut self, handler: &mut H) -> StreamResult<()>
    where
        H: MessageHandler + ?Sized,
    {
        loop {
            if self.shutdown.is_cancelled() {
                info!("Shutdown requested, not reconnecting");
                return Ok(());
            }

            let err = match self.connect_and_consume(handler).await {
                Ok(()) => {
                    info!("Shutdown requested, closing stream");
                    return Ok(());
                }
                Err(e) => e,
            };

            self.stats.failures += 1;
            if err.is_fatal() {
                error!(error = %err, "Fatal stream error");
                handler.on_error(&err, None).await;
                return Err(err);
            }

            self.consecutive_failures += 1;
            let ceiling = self.settings.max_consecutive_failures;
            if ceiling > 0 && self.consecutive_failures >= ceiling {
                error!(
                    attempts = self.consecutive_failures,
                    error = %err,
                    "Giving up on stream"
                );
                handler.on_error(&err, None).await;
                return Err(StreamError::RetriesExhausted {
                    attempts: self.consecutive_failures,
                    last: Box::new(err),
                });
            }

            let delay = self.backoff.next_delay();
            warn!(
                error = %err,
                attempt = self.consecutive_failures,
                delay_ms = delay.as_millis() as u64,
                "Stream failed, reconnecting after backoff"
            );
            handler.on_error(&err, Some(delay)).await;

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested during backoff");
                    return Ok(());
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Returns `Ok` only when shutdown interrupted the connection.
    async fn connect_and_consume<H>(&mut self, handler: &mut H) -> StreamResult<()>
    where
        H: MessageHandler + ?Sized,
    {
        self.stats.connections += 1;
        info!(track = %self.track, attempt = self.stats.connections, "Connecting to stream");

        // The watchdog also covers the wait for response headers.
        let inactivity = self.settings.inactivity_timeout;
        let connect = tokio::time::timeout(inactivity, self.transport.connect(&self.track));
        let bytes = tokio::select! {
            _ = self.shutdown.cancelled() => return Ok(()),
            result = connect => result.map_err(|_| StreamError::InactivityTimeout(inactivity))??,
        };
        info!("Stream connected");

        let records = decoder::records(
            bytes,
            LineDecoder::new(self.settings.max_record_bytes),
            self.settings.inactivity_timeout,
        );
        tokio::pin!(records);

        loop {
            let next = tokio::select! {
                _ = self.shutdown.cancelled() => return Ok(()),
                next = records.next() => next,
            };

            let record = match next {
                Some(record) => record?,
                None => return Err(StreamError::Closed),
            };

            match record {
                Record::Message(message) => {
                    self.stats.messages += 1;
                    self.consecutive_failures = 0;
                    self.backoff.reset();
                    handler.on_message(message).await;
                }
                Record::KeepAlive => {
                    self.stats.keep_alives += 1;
                    trace!("Keep-alive");
                }
                Record::Malformed(reason) => {
                    self.stats.malformed += 1;
                    warn!(reason = %reason, "Skipping malformed record");
                }
                Record::Notice(Notice::Disconnect { code, reason }) => {
                    return Err(StreamError::Disconnected { code, reason });
                }
                Record::Notice(notice) => {
                    self.stats.notices += 1;
                    debug!(?notice, "Stream notice");
                }
            }
        }
    }
}
