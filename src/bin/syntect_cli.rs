use std::{
    io::{self, Write},
    process::ExitCode,
};

use log::{error, warn};
use syntect_client::{Context, cli::Cli};
use tokio_util::sync::CancellationToken;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Initialize env_logger; fatal errors are logged at `error`
    env_logger::init();

    let invocation = Cli::parse_invocation(std::env::args_os()).unwrap_or_else(|e| e.exit());

    let cancel = CancellationToken::new();
    let handle = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handle.cancel()) {
        warn!("failed to install Ctrl-C handler: {e}");
    }
    let ctx = Context::background().with_cancel(cancel);

    let out = match syntect_client::cli::run(&invocation, &ctx).await {
        Ok(out) => out,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let mut stdout = io::stdout().lock();
    if let Err(e) = stdout.write_all(out.as_bytes()).and_then(|_| stdout.flush()) {
        error!("writing output: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
