use log::{debug, warn};
use reqwest::{StatusCode, header::CONTENT_TYPE};
use tracing::{Instrument, Span, field};

use super::{Context, HighlightError, Query, Response, response::WireResponse};

/// Connection to one syntect server.
///
/// Holds only the server address and an HTTP connection pool, so a single
/// client can be cloned or shared between tasks freely.
#[derive(Debug, Clone)]
pub struct Client {
    server: String,
    http: reqwest::Client,
}

impl Client {
    /// `server` is the base address, e.g. `http://localhost:9238`. A trailing
    /// `/` is dropped.
    ///
    /// # Panics
    /// If the TLS backend or resolver cannot be initialized. Use
    /// [`Client::try_new`] to get the error instead.
    pub fn new(server: impl Into<String>) -> Self {
        Self::with_http_client(server, reqwest::Client::new())
    }

    /// Like [`Client::new`] but returns an error if the HTTP client cannot
    /// be built.
    pub fn try_new(server: impl Into<String>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self::with_http_client(server, http))
    }

    /// Like [`Client::new`] but sends requests through `http`.
    pub fn with_http_client(server: impl Into<String>, http: reqwest::Client) -> Self {
        let mut server = server.into();
        if server.ends_with('/') {
            server.pop();
        }
        Self { server, http }
    }

    pub fn address(&self) -> &str {
        &self.server
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.server)
    }

    /// Send `query` to the server.
    ///
    /// Fails with a cancellation error as soon as `ctx` is cancelled or its
    /// deadline passes, dropping the in-flight request.
    pub async fn highlight(
        &self,
        ctx: &Context,
        query: &Query,
    ) -> Result<Response, HighlightError> {
        let span = tracing::info_span!(
            parent: ctx.span(),
            "Highlight",
            server = %self.server,
            filepath = field::Empty,
            theme = field::Empty,
        );
        let request = self.round_trip(query, span.clone()).instrument(span);

        tokio::select! {
            biased;

            _ = ctx.cancel_token().cancelled() => Err(HighlightError::Cancelled {
                server: self.server.clone(),
            }),
            _ = ctx.expired() => Err(HighlightError::DeadlineExceeded {
                server: self.server.clone(),
            }),
            resp = request => resp,
        }
    }

    async fn round_trip(&self, query: &Query, span: Span) -> Result<Response, HighlightError> {
        let url = self.url("/");

        debug!(
            "POST {url} filepath={:?} mode={:?} ({} bytes of code)",
            query.filepath(),
            query.mode(),
            query.code().len()
        );
        let transport = |source: reqwest::Error| HighlightError::Transport {
            server: self.server.clone(),
            url: url.clone(),
            source,
        };

        let resp = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .json(query)
            .send()
            .await
            .map_err(transport)?;

        // 400 is only ever sent for oversized input; the body is not read.
        if resp.status() == StatusCode::BAD_REQUEST {
            warn!("{}: rejected {:?} as too large", self.server, query.filepath());
            return Err(HighlightError::RequestTooLarge {
                server: self.server.clone(),
            });
        }

        // A response exists from here on, so the span can be tagged.
        span.record("filepath", query.filepath());
        span.record("theme", query.theme());

        let bytes = resp.bytes().await.map_err(transport)?;
        let wire: WireResponse =
            serde_json::from_slice(&bytes).map_err(|source| HighlightError::Protocol {
                server: self.server.clone(),
                url: url.clone(),
                source,
            })?;

        wire.into_response(&self.server, query.mode()).inspect_err(|err| {
            warn!("{err}");
        })
    }
}
