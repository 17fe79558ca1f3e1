//! tweetfilter: keyword-filtered streaming client.
//!
//! ```text
//! Transport bytes -> LineDecoder -> FilterEngine -> Dispatcher -> sinks
//!        ^                                                   |
//!        |________ Supervisor (backoff, reconnect) __________|
//! ```
//!
//! The [`Supervisor`] holds one connection at a time and drives a
//! [`MessageHandler`]; [`FilterPipeline`] is the handler that filters,
//! deduplicates, and fans messages out to [`sinks`].

pub mod backoff;
pub mod config;
pub mod credentials;
pub mod decoder;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod filter;
pub mod message;
pub mod pipeline;
pub mod sinks;
pub mod supervisor;
pub mod transport;

pub use config::{Config, NotifyCommand, Overrides};
pub use credentials::Credentials;
pub use dedup::DedupCache;
pub use engine::{accept, FilterEngine, Verdict};
pub use error::{StreamError, StreamResult};
pub use filter::KeywordFilter;
pub use message::{Notice, Record, StreamMessage};
pub use pipeline::{FilterPipeline, MessageHandler};
pub use supervisor::{StreamStats, Supervisor, SupervisorSettings};
pub use transport::{HttpTransport, Transport};
