//! Command-line interface.
//!
//! A thin front end over the library: every command loads the project
//! settings, applies its flags on top and hands off to the pipeline.
//!
//! ```text
//! packwright build [--force] [--os linux] [--bits 64] [--no-dfhack]
//! packwright plan
//! packwright status
//! packwright cache clean
//! packwright cache info
//! ```
//!
//! Logging goes to stderr through `tracing`; `-v` enables debug output, `-q`
//! limits it to errors and `RUST_LOG` overrides both.

mod build;
mod cache;
pub mod common;
mod plan;
mod status;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Assemble a pack from independently versioned components.
#[derive(Parser, Debug)]
#[command(name = "packwright", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Show debug output.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only show errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Project directory holding packwright.toml and components.yml.
    #[arg(short = 'C', long, global = true, default_value = ".")]
    project_dir: PathBuf,

    /// Settings file to use instead of <project-dir>/packwright.toml.
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Disable progress bars.
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download, extract and record every outdated component.
    Build(build::BuildCommand),

    /// Show what a build would do, without downloading anything.
    Plan(plan::PlanCommand),

    /// Show installed and latest versions with their age.
    Status(status::StatusCommand),

    /// Manage the artifact cache.
    Cache(cache::CacheCommand),
}

/// Options shared by every command.
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub project_dir: PathBuf,
    pub settings: Option<PathBuf>,
    pub show_progress: bool,
    pub verbose: bool,
}

impl Cli {
    /// Run the selected command and return the process exit status.
    pub async fn execute(self) -> Result<i32> {
        init_logging(self.verbose, self.quiet);

        let global = GlobalOptions {
            project_dir: self.project_dir,
            settings: self.settings,
            show_progress: !self.no_progress && !self.quiet,
            verbose: self.verbose,
        };

        match self.command {
            Commands::Build(cmd) => cmd.execute(&global).await,
            Commands::Plan(cmd) => cmd.execute(&global).await,
            Commands::Status(cmd) => cmd.execute(&global).await,
            Commands::Cache(cmd) => cmd.execute(&global).await,
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_build_flags() {
        let cli = Cli::try_parse_from([
            "packwright",
            "-C",
            "/pack",
            "build",
            "--force",
            "--os",
            "mac",
            "--bits",
            "32",
            "--no-dfhack",
            "--max-parallel",
            "3",
        ])
        .unwrap();

        assert_eq!(cli.project_dir, PathBuf::from("/pack"));
        let Commands::Build(build) = cli.command else {
            panic!("expected build");
        };
        assert!(build.force);
        assert_eq!(build.target.os, Some(crate::core::Os::Osx));
        assert_eq!(build.target.bits, Some(crate::core::Bits::B32));
        assert!(build.target.no_dfhack);
        assert_eq!(build.target.max_parallel, Some(3));
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["packwright", "-v", "-q", "status"]).is_err());
    }
}
