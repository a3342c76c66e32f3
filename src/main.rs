//! packwright CLI entry point
//!
//! Parses arguments, runs the command and turns fatal errors into a
//! coloured message with a suggestion. The exit status is 1 when the run
//! failed or any component failed to install.

use anyhow::Result;
use clap::Parser;
use packwright::cli;
use packwright::core::error::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(0) => Ok(()),
        Ok(code) => std::process::exit(code),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
