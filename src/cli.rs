//! Command-line front end for the highlighting client.
//!
//! Parses `[-scopify] <server> <theme?> <file>`, turns the file into a
//! [`Query`], and renders the server's answer as text.
use std::{
    ffi::OsString,
    fs, io,
    path::{Path, PathBuf},
};

use clap::{CommandFactory, Parser, error::ErrorKind};
use log::debug;
use thiserror::Error;

use crate::{
    Client, Context, HighlightError, Highlighted, Query, QueryError, Response, Scopified,
};

const EXAMPLES: &str = "\
Highlight file to HTML:
  syntect_cli <server> <theme> <file>
  syntect_cli http://localhost:9238 'InspiredGitHub' main.rs

Scopify file:
  syntect_cli -scopify <server> <file>
  syntect_cli -scopify http://localhost:9238 main.rs";

#[derive(Debug, Error)]
pub enum CliError {
    #[error("reading {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Highlight(#[from] HighlightError),

    #[error("building HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error("region {offset}+{length} is outside the {code_len} byte input")]
    RegionOutOfBounds {
        offset: usize,
        length: usize,
        code_len: usize,
    },

    #[error("region at {offset} refers to an unknown scope in {scopes:?}")]
    UnknownScope { offset: usize, scopes: Vec<usize> },
}

#[derive(Debug, Parser)]
#[command(
    name = "syntect_cli",
    version,
    about = "Highlight or scopify a file with a syntect server",
    override_usage = "syntect_cli [-scopify] <server> <theme?> <file>",
    after_help = EXAMPLES
)]
pub struct Cli {
    /// Print scopified file regions instead of requesting highlighted HTML
    #[arg(long)]
    pub scopify: bool,

    /// Server address, including the http:// or https:// scheme
    pub server: String,

    /// `<theme> <file>` when highlighting, `<file>` when scopifying
    #[arg(value_name = "ARGS", num_args = 1..=2, required = true)]
    pub args: Vec<String>,
}

/// A validated command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub server: String,
    /// `None` when scopifying.
    pub theme: Option<String>,
    pub file: PathBuf,
}

impl Cli {
    /// Parse and validate `args` (program name first). Accepts the
    /// single-dash `-scopify` as well as `--scopify`.
    pub fn parse_invocation<I, T>(args: I) -> Result<Invocation, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let args = args.into_iter().map(|arg| {
            let arg: OsString = arg.into();
            if arg == "-scopify" {
                OsString::from("--scopify")
            } else {
                arg
            }
        });

        Cli::try_parse_from(args)?.validate()
    }

    pub fn validate(self) -> Result<Invocation, clap::Error> {
        let mut cmd = Cli::command();

        if !self.server.starts_with("http://") && !self.server.starts_with("https://") {
            return Err(cmd.error(
                ErrorKind::InvalidValue,
                "expected server to have http:// or https:// prefix",
            ));
        }

        let mut args = self.args.into_iter();
        match (self.scopify, args.next(), args.next()) {
            (true, Some(file), None) => Ok(Invocation {
                server: self.server,
                theme: None,
                file: file.into(),
            }),
            (false, Some(theme), Some(file)) => {
                if theme.is_empty() {
                    return Err(cmd.error(
                        ErrorKind::InvalidValue,
                        "theme argument is required (e.g. 'InspiredGitHub')",
                    ));
                }
                Ok(Invocation {
                    server: self.server,
                    theme: Some(theme),
                    file: file.into(),
                })
            }
            (true, ..) => Err(cmd.error(
                ErrorKind::WrongNumberOfValues,
                "-scopify expects <server> <file>",
            )),
            (false, ..) => Err(cmd.error(
                ErrorKind::WrongNumberOfValues,
                "expected <server> <theme> <file>",
            )),
        }
    }
}

/// Read the file named by `invocation` into a query. Only the base name of
/// the path is sent.
pub fn load_query(invocation: &Invocation) -> Result<Query, CliError> {
    let code = fs::read_to_string(&invocation.file).map_err(|source| CliError::Read {
        path: invocation.file.clone(),
        source,
    })?;
    let filepath = base_name(&invocation.file);

    let query = match &invocation.theme {
        Some(theme) => Query::highlight(filepath, theme.as_str(), code)?,
        None => Query::scopify(filepath, code),
    };
    Ok(query)
}

fn base_name(path: &Path) -> String {
    match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => path.to_string_lossy().into_owned(),
    }
}

/// Load, send and render. Returns the full output so nothing is printed
/// when any step fails.
pub async fn run(invocation: &Invocation, ctx: &Context) -> Result<String, CliError> {
    let query = load_query(invocation)?;
    let client = Client::try_new(invocation.server.as_str())?;

    debug!("sending {} to {}", query.filepath(), client.address());
    let resp = client.highlight(ctx, &query).await?;
    render(&query, &resp)
}

/// Highlighted HTML verbatim, or one `"<text>" <scope> <scope>...` line per
/// scopified region.
pub fn render(query: &Query, resp: &Response) -> Result<String, CliError> {
    match resp {
        Response::Highlighted(Highlighted { data, .. }) => Ok(format!("{data}\n")),
        Response::Scopified(scopified) => render_regions(query.code(), scopified),
    }
}

fn render_regions(code: &str, scopified: &Scopified) -> Result<String, CliError> {
    let mut out = String::new();

    for region in &scopified.regions {
        let text = Scopified::region_text(code, region).ok_or(CliError::RegionOutOfBounds {
            offset: region.offset,
            length: region.length,
            code_len: code.len(),
        })?;
        let names = scopified
            .scope_names
            .resolve(&region.scopes)
            .ok_or_else(|| CliError::UnknownScope {
                offset: region.offset,
                scopes: region.scopes.clone(),
            })?;

        out.push_str(&format!("{text:?}"));
        for name in names {
            out.push(' ');
            out.push_str(name);
        }
        out.push('\n');
    }

    Ok(out)
}
