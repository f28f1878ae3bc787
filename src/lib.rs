pub mod cli;
pub mod protocol;

pub use protocol::{
    Client, Context, HighlightError, Highlighted, Mode, Query, QueryError, Response, ScopeNames,
    Scopified, ScopifiedRegion,
};
