use serde::{Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("theme is required when not scopifying (e.g. 'InspiredGitHub')")]
    EmptyTheme,
}

/// Which of the two response shapes a query asks the server for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Rendered HTML using a theme.
    Highlight,
    /// Byte regions annotated with grammar scopes.
    Scopify,
}

/// A single highlighting request.
///
/// `filepath` is only used by the server to pick a grammar, so callers
/// should pass the base name of the file rather than a full path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    filepath: String,
    theme: String,
    mode: Mode,
    code: String,
}

/// Body of `POST /`.
#[derive(Debug, Serialize)]
struct WireQuery<'a> {
    extension: &'a str,
    filepath: &'a str,
    theme: &'a str,
    scopify: bool,
    code: &'a str,
}

impl Query {
    /// Request highlighted HTML rendered with `theme`.
    pub fn highlight(
        filepath: impl Into<String>,
        theme: impl Into<String>,
        code: impl Into<String>,
    ) -> Result<Self, QueryError> {
        let theme = theme.into();
        if theme.is_empty() {
            return Err(QueryError::EmptyTheme);
        }

        Ok(Self {
            filepath: filepath.into(),
            theme,
            mode: Mode::Highlight,
            code: code.into(),
        })
    }

    /// Request the scopified regions of `code`. No theme is sent.
    pub fn scopify(filepath: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            filepath: filepath.into(),
            theme: String::new(),
            mode: Mode::Scopify,
            code: code.into(),
        }
    }

    pub fn filepath(&self) -> &str {
        &self.filepath
    }

    pub fn theme(&self) -> &str {
        &self.theme
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_scopify(&self) -> bool {
        self.mode == Mode::Scopify
    }

    pub fn code(&self) -> &str {
        &self.code
    }
}

impl Serialize for Query {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        WireQuery {
            // deprecated by `filepath`, always empty
            extension: "",
            filepath: &self.filepath,
            theme: &self.theme,
            scopify: self.is_scopify(),
            code: &self.code,
        }
        .serialize(serializer)
    }
}
