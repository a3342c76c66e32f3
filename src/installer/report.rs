//! End-of-run report.

use colored::Colorize;
use std::fmt;

/// Pipeline stage a component failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolve,
    Download,
    Extract,
    /// Installed, but the state file could not be updated.
    Record,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Resolve => "resolve",
            Self::Download => "download",
            Self::Extract => "extract",
            Self::Record => "record",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedComponent {
    pub name: String,
    pub stage: Stage,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatedComponent {
    pub name: String,
    pub from: String,
    pub to: String,
}

/// What happened to every component in a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// `(name, version)` of first-time installs.
    pub installed: Vec<(String, String)>,
    pub updated: Vec<UpdatedComponent>,
    pub skipped: Vec<String>,
    pub failed: Vec<FailedComponent>,
    /// `(name, reason)` of components not eligible for the target.
    pub excluded: Vec<(String, String)>,
    pub warnings: Vec<String>,
}

impl RunReport {
    pub fn fail(&mut self, name: &str, stage: Stage, reason: impl Into<String>) {
        self.failed.push(FailedComponent {
            name: name.to_string(),
            stage,
            reason: reason.into(),
        });
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Process exit status for this run.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(self.has_failures())
    }

    #[must_use]
    pub fn failure(&self, name: &str) -> Option<&FailedComponent> {
        self.failed.iter().find(|f| f.name == name)
    }

    /// Print the report to stdout.
    pub fn print(&self, verbose: bool) {
        for (name, version) in &self.installed {
            println!("  {} {} {}", "+".green(), name.bold(), version.dimmed());
        }
        for update in &self.updated {
            println!(
                "  {} {} {} -> {}",
                "↑".cyan(),
                update.name.bold(),
                update.from.dimmed(),
                update.to
            );
        }
        if verbose {
            for name in &self.skipped {
                println!("  {} {} (up to date)", "=".dimmed(), name);
            }
            for (name, reason) in &self.excluded {
                println!("  {} {} ({})", "-".dimmed(), name, reason);
            }
        }
        for warning in &self.warnings {
            println!("{} {}", "warning:".yellow(), warning);
        }
        for failure in &self.failed {
            println!(
                "  {} {} [{}] {}",
                "✗".red(),
                failure.name.bold(),
                failure.stage,
                failure.reason
            );
        }

        println!();
        let summary = format!(
            "{} installed, {} updated, {} up to date, {} failed",
            self.installed.len(),
            self.updated.len(),
            self.skipped.len(),
            self.failed.len()
        );
        if self.has_failures() {
            println!("{}", summary.red().bold());
        } else {
            println!("{}", summary.green().bold());
        }
    }
}
