use thiserror::Error;

/// Everything that can go wrong while talking to a syntect server.
///
/// Every variant names the server it came from, so failures stay
/// attributable when several backends are in use.
#[derive(Debug, Error)]
pub enum HighlightError {
    /// The server answered HTTP 400; the input is too large to process.
    #[error("{server}: request too large")]
    RequestTooLarge { server: String },

    #[error("{server}: invalid theme")]
    InvalidTheme { server: String },

    /// The grammar engine panicked on this input, most often because of an
    /// unsupported sublime-syntax feature. Skip the file.
    #[error("{server}: syntect panic while highlighting")]
    Panic { server: String },

    /// The server could not route the request. This is a client bug or a
    /// misconfigured base path, never a problem with the input.
    #[error("{server}: internal error: {code}")]
    Internal { server: String, code: String },

    #[error("{server}: unknown error={error:?} code={code:?}")]
    UnknownCode {
        server: String,
        error: String,
        code: String,
    },

    #[error("{server}: decoding JSON response from {url}: {source}")]
    Protocol {
        server: String,
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{server}: making request to {url}: {source}")]
    Transport {
        server: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{server}: request cancelled")]
    Cancelled { server: String },

    #[error("{server}: deadline exceeded")]
    DeadlineExceeded { server: String },
}

impl HighlightError {
    /// Address of the server the failed call was sent to.
    pub fn server(&self) -> &str {
        match self {
            Self::RequestTooLarge { server }
            | Self::InvalidTheme { server }
            | Self::Panic { server }
            | Self::Internal { server, .. }
            | Self::UnknownCode { server, .. }
            | Self::Protocol { server, .. }
            | Self::Transport { server, .. }
            | Self::Cancelled { server }
            | Self::DeadlineExceeded { server } => server,
        }
    }

    /// True when the caller's context stopped the call.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Cancelled { .. } | Self::DeadlineExceeded { .. }
        )
    }

    /// True for failures tied to one particular input, which callers should
    /// skip rather than treat as fatal.
    pub fn is_skippable(&self) -> bool {
        matches!(self, Self::Panic { .. } | Self::RequestTooLarge { .. })
    }

    /// Translate an error reported in the response body.
    pub(crate) fn from_service(server: &str, error: &str, code: &str) -> Self {
        let server = server.to_string();
        match ServiceCode::parse(code) {
            ServiceCode::InvalidTheme => Self::InvalidTheme { server },
            ServiceCode::ResourceNotFound => Self::Internal {
                server,
                code: code.to_string(),
            },
            ServiceCode::Panic => Self::Panic { server },
            ServiceCode::Other(code) => Self::UnknownCode {
                server,
                error: error.to_string(),
                code: code.to_string(),
            },
        }
    }
}

/// Error codes sent by the server. New codes may appear at any time, so
/// anything unrecognised is kept verbatim in `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ServiceCode<'a> {
    InvalidTheme,
    // Sent for a 404. Treated as a client bug by convention; the server
    // does not document this.
    ResourceNotFound,
    Panic,
    Other(&'a str),
}

impl<'a> ServiceCode<'a> {
    /// Exact, case-sensitive match.
    pub(crate) fn parse(code: &'a str) -> Self {
        match code {
            "invalid_theme" => Self::InvalidTheme,
            "resource_not_found" => Self::ResourceNotFound,
            "panic" => Self::Panic,
            other => Self::Other(other),
        }
    }
}
