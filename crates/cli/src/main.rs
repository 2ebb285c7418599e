//! Storefront command line client

use std::{io, process, sync::Arc};

use storefront_app::context::AppContext;
use tracing::error;

use crate::{approval::ConsoleApproval, config::CliConfig};

mod approval;
mod commands;
mod config;
mod observability;

/// Storefront CLI entry point
#[tokio::main]
pub async fn main() {
    // Load configuration from .env and CLI arguments
    let config = CliConfig::load().unwrap_or_else(|e| e.exit());

    if let Err(source) = observability::init_subscriber(&config.logging) {
        #[expect(
            clippy::print_stderr,
            reason = "logging failed to initialise, must use eprintln"
        )]
        {
            eprintln!("{source}");
        }

        process::exit(1);
    }

    let context = match AppContext::from_settings(config.app_settings()) {
        Ok(context) => context.with_approval(Arc::new(ConsoleApproval)),
        Err(source) => {
            error!(%source, "failed to initialise storefront");

            process::exit(1);
        }
    };

    let mut out = io::stdout().lock();

    if let Err(source) = config.command.run(&context, &mut out).await {
        #[expect(clippy::print_stderr, reason = "command errors are shown to the user")]
        {
            eprintln!("error: {source}");
        }

        process::exit(1);
    }
}
