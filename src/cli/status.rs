//! `packwright status`

use super::GlobalOptions;
use super::common::{Project, TargetArgs};
use crate::lockfile::{InstallState, LockfileStore};
use crate::planner::Action;
use anyhow::Result;
use chrono::Utc;
use clap::Args;
use colored::Colorize;

#[derive(Args, Debug)]
pub struct StatusCommand {
    #[command(flatten)]
    pub target: TargetArgs,
}

impl StatusCommand {
    pub async fn execute(self, global: &GlobalOptions) -> Result<i32> {
        let project = Project::load(global, &self.target)?;
        let state = LockfileStore::open(&project.config.state_file)?;
        let pipeline = project.pipeline(false, false)?;
        let plan = pipeline.plan(&project.registry, &state).await?;

        println!(
            "{:>5}  {:<28} {:<20} {}",
            "days".bold(),
            "component".bold(),
            "version".bold(),
            "file".bold()
        );
        for row in plan.status_report(Utc::now()) {
            let marker = match row.action {
                Action::Skip => " ".normal(),
                Action::Install | Action::Update => "*".yellow(),
                Action::Failed => "!".red(),
            };
            println!(
                "{:>5}{} {:<28} {:<20} {}",
                row.age_days, marker, row.name, row.version, row.filename
            );
        }

        let installed = state.snapshot().components.len();
        println!(
            "\n{} of {} component(s) recorded as installed; * outdated, ! unresolved",
            installed,
            plan.entries.len()
        );
        Ok(0)
    }
}
