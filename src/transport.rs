use crate::credentials::Credentials;
use crate::error::{StreamError, StreamResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use reqwest::header::AUTHORIZATION;
use std::pin::Pin;
use std::time::Duration;

/// Longest error body kept in an error message.
const MAX_ERROR_BODY: usize = 200;

pub type ByteStream = Pin<Box<dyn Stream<Item = StreamResult<Bytes>> + Send>>;

/// Opens one streaming connection for the given `track` keywords.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, track: &str) -> StreamResult<ByteStream>;
}

pub struct HttpTransport {
    endpoint: String,
    credentials: Credentials,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(
        endpoint: impl Into<String>,
        credentials: Credentials,
        connect_timeout: Duration,
    ) -> StreamResult<Self> {
        // No overall request timeout: the body is meant to stay open.
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(concat!("tweetfilter/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            endpoint: endpoint.into(),
            credentials,
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn connect(&self, track: &str) -> StreamResult<ByteStream> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, self.credentials.authorization_header())
            .form(&[("track", track)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &body));
        }

        Ok(Box::pin(
            response.bytes_stream().map(|chunk| chunk.map_err(StreamError::from)),
        ))
    }
}

/// Map a non-success HTTP status to an error; 401/403 are not retried.
pub fn classify_status(status: u16, body: &str) -> StreamError {
    let body: String = body.trim().chars().take(MAX_ERROR_BODY).collect();
    match status {
        401 | 403 => StreamError::Auth { status, body },
        _ => StreamError::Http { status, body },
    }
}
