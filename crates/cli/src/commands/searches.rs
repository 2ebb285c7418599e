use std::io::Write;

use clap::{Args, Subcommand};
use storefront_app::context::AppContext;

use super::CommandError;

#[derive(Debug, Args)]
pub(crate) struct SearchesCommand {
    #[command(subcommand)]
    command: SearchesSubcommand,
}

#[derive(Debug, Subcommand)]
enum SearchesSubcommand {
    /// Remember a search term
    Record {
        /// The term searched for
        term: String,
    },

    /// List recent terms, newest first
    List,

    /// Forget every term
    Clear,
}

pub(crate) fn run<W: Write>(
    command: SearchesCommand,
    context: &AppContext,
    out: &mut W,
) -> Result<(), CommandError> {
    match command.command {
        SearchesSubcommand::Record { term } => context.searches.record(&term),
        SearchesSubcommand::List => {
            for term in context.searches.terms() {
                writeln!(out, "{term}")?;
            }
        }
        SearchesSubcommand::Clear => context.searches.clear(),
    }

    Ok(())
}
