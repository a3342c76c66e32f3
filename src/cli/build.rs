//! `packwright build`

use super::GlobalOptions;
use super::common::{Project, TargetArgs};
use crate::lockfile::LockfileStore;
use anyhow::Result;
use clap::Args;
use colored::Colorize;

#[derive(Args, Debug)]
pub struct BuildCommand {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Reinstall every component, even when already up to date.
    #[arg(long)]
    pub force: bool,
}

impl BuildCommand {
    pub async fn execute(self, global: &GlobalOptions) -> Result<i32> {
        let project = Project::load(global, &self.target)?;
        let mut state = LockfileStore::open(&project.config.state_file)?;
        let pipeline = project.pipeline(self.force, global.show_progress)?;

        println!(
            "{} {} component(s) for {}",
            "Building".cyan().bold(),
            project.registry.len(),
            project.config.target
        );
        let report = pipeline.run(&project.registry, &mut state).await?;
        report.print(global.verbose);
        Ok(report.exit_code())
    }
}
