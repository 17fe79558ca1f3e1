use crate::error::{StreamError, StreamResult};
use std::fmt;

pub const APP_KEY_VAR: &str = "TWITTER_APP_KEY";
pub const APP_SECRET_VAR: &str = "TWITTER_APP_SECRET";
pub const OAUTH_TOKEN_VAR: &str = "TWITTER_OAUTH_TOKEN";
pub const OAUTH_TOKEN_SECRET_VAR: &str = "TWITTER_OAUTH_TOKEN_SECRET";

/// The four opaque secrets handed to the transport at connect time.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    app_key: String,
    app_secret: String,
    oauth_token: String,
    oauth_token_secret: String,
}

impl Credentials {
    pub fn new(
        app_key: impl Into<String>,
        app_secret: impl Into<String>,
        oauth_token: impl Into<String>,
        oauth_token_secret: impl Into<String>,
    ) -> Self {
        Self {
            app_key: app_key.into(),
            app_secret: app_secret.into(),
            oauth_token: oauth_token.into(),
            oauth_token_secret: oauth_token_secret.into(),
        }
    }

    pub fn from_env() -> StreamResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> StreamResult<Self> {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    StreamError::Config(format!("environment variable {} is not set", name))
                })
        };

        Ok(Self {
            app_key: get(APP_KEY_VAR)?,
            app_secret: get(APP_SECRET_VAR)?,
            oauth_token: get(OAUTH_TOKEN_VAR)?,
            oauth_token_secret: get(OAUTH_TOKEN_SECRET_VAR)?,
        })
    }

    pub fn app_key(&self) -> &str {
        &self.app_key
    }

    pub fn oauth_token(&self) -> &str {
        &self.oauth_token
    }

    /// Consumer secret and token secret, for request signers.
    pub fn secrets(&self) -> (&str, &str) {
        (&self.app_secret, &self.oauth_token_secret)
    }

    /// `Authorization` header value identifying the app and user token.
    pub fn authorization_header(&self) -> String {
        format!(
            "OAuth oauth_consumer_key=\"{}\", oauth_token=\"{}\"",
            self.app_key, self.oauth_token
        )
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("app_key", &self.app_key)
            .field("app_secret", &"<redacted>")
            .field("oauth_token", &"<redacted>")
            .field("oauth_token_secret", &"<redacted>")
            .finish()
    }
}
