//! HTTP fetch capability for chain hops and strategy requests.
//!
//! Thin wrapper over `reqwest` with the connection settings the embed hosts
//! tolerate: HTTP/2 where offered, TLS via rustls, cookie continuity across
//! hops, compression auto-negotiated, and a uniform short timeout. A
//! transient failure is retried once with identical parameters; after that
//! the hop is a dead end, never a crash.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, REFERER, USER_AGENT};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::model::FetchContext;

/// Browser-like User-Agent the embed hosts expect.
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Uniform per-request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Fetch failure after the single retry was exhausted.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("client construction failed: {0}")]
    Build(#[source] reqwest::Error),

    #[error("transport error for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected status {status} for {url}")]
    Status { url: String, status: StatusCode },
}

/// A fetched page body plus the metadata the pipeline needs.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: StatusCode,
    pub body: String,
    /// URL after redirects; becomes the base for relative references.
    pub final_url: String,
}

/// HTTP client shared across one resolver.
pub struct FetchClient {
    client: Client,
}

impl FetchClient {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .http2_adaptive_window(true)
            .use_rustls_tls()
            .brotli(true)
            .zstd(true)
            .gzip(true)
            .deflate(true)
            .cookie_store(true)
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(FetchError::Build)?;
        Ok(Self { client })
    }

    /// Fetch one hop. Transient failures (transport errors and 5xx) are
    /// retried once with identical parameters.
    #[instrument(skip(self, ctx), fields(url = %ctx.url))]
    pub async fn get(&self, ctx: &FetchContext) -> Result<FetchedPage, FetchError> {
        match self.get_once(ctx).await {
            Ok(page) => Ok(page),
            Err(err) if is_transient(&err) => {
                debug!("retrying after transient failure: {err}");
                self.get_once(ctx).await
            }
            Err(err) => Err(err),
        }
    }

    async fn get_once(&self, ctx: &FetchContext) -> Result<FetchedPage, FetchError> {
        let mut headers = HeaderMap::new();
        if let Some(referer) = &ctx.referer {
            if let Ok(value) = HeaderValue::from_str(referer) {
                headers.insert(REFERER, value);
            }
        }
        for (name, value) in &ctx.extra_headers {
            let parsed = (
                name.parse::<HeaderName>(),
                HeaderValue::from_str(value),
            );
            if let (Ok(name), Ok(value)) = parsed {
                headers.insert(name, value);
            } else {
                warn!("skipping unusable header {name:?}");
            }
        }
        // The builder's default UA is overridden per-hop when a caller
        // supplied one explicitly.
        if !headers.contains_key(USER_AGENT) {
            headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
        }

        let response = self
            .client
            .get(&ctx.url)
            .headers(headers)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: ctx.url.clone(),
                source,
            })?;

        let status = response.status();
        let final_url = response.url().to_string();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: ctx.url.clone(),
                status,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|source| FetchError::Transport {
                url: ctx.url.clone(),
                source,
            })?;

        debug!(status = %status, bytes = body.len(), "hop fetched");
        Ok(FetchedPage {
            status,
            body,
            final_url,
        })
    }
}

/// Worth one retry: network-level failures and server-side errors.
fn is_transient(err: &FetchError) -> bool {
    match err {
        FetchError::Transport { .. } => true,
        FetchError::Status { status, .. } => status.is_server_error(),
        FetchError::Build(_) => false,
    }
}
