//! Client side of the syntect_server protocol.
//!
//! This module builds highlighting requests, sends them to a syntect server
//! over HTTP and decodes what comes back into typed responses and errors.
//!
//! # Overview
//!
//! A [`Query`] carries the code, a file name the server uses to pick a
//! grammar, and the [`Mode`]: either highlighted HTML rendered with a theme,
//! or a "scopified" list of byte regions tagged with grammar scopes.
//! [`Client::highlight`] sends the query and returns a [`Response`] whose
//! variant always matches the query's mode.
//!
//! # Wire Format
//!
//! - Request: `POST /` with `Content-Type: application/json` and the body
//!   `{extension, filepath, theme, scopify, code}`. `extension` is a
//!   deprecated alias and is always sent empty.
//! - Success: `{Data, Plaintext, detected_language, scopified_scope_names,
//!   scopified_regions: [{Offset, Length, Scopes}]}`. Fields of the other
//!   mode are absent or zero.
//! - Error: `{Error, Code}` with status 200, or status 400 with no body
//!   contract when the input is too large.
//!
//! Region offsets and lengths are byte positions in the submitted code.
//! Scope indexes refer to positions in `scopified_scope_names`.
//!
//! # Errors
//!
//! Failures are reported as [`HighlightError`]. Service error codes are
//! matched exactly; unknown codes are kept in
//! [`HighlightError::UnknownCode`] rather than rejected, since the server may
//! add new ones.
//!
//! # Cancellation and Tracing
//!
//! Each call takes a [`Context`] carrying a cancellation token, an optional
//! deadline and the parent trace span. Nothing is read from global state.
mod context;
mod error;
mod request;
mod response;
mod transport;

pub use context::Context;
pub use error::HighlightError;
pub use request::{Mode, Query, QueryError};
pub use response::{Highlighted, Response, ScopeNames, Scopified, ScopifiedRegion};
pub use transport::Client;
