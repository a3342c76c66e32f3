//! `packwright plan`

use super::GlobalOptions;
use super::common::{Project, TargetArgs};
use crate::lockfile::LockfileStore;
use crate::planner::Action;
use anyhow::Result;
use clap::Args;
use colored::Colorize;

#[derive(Args, Debug)]
pub struct PlanCommand {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Plan as if every component had to be reinstalled.
    #[arg(long)]
    pub force: bool,
}

impl PlanCommand {
    pub async fn execute(self, global: &GlobalOptions) -> Result<i32> {
        let project = Project::load(global, &self.target)?;
        let state = LockfileStore::open(&project.config.state_file)?;
        let pipeline = project.pipeline(self.force, false)?;
        let (plan, excluded) = pipeline.plan_with_excluded(&project.registry, &state).await?;

        for (position, entry) in plan.entries.iter().enumerate() {
            let action = match entry.action {
                Action::Skip => entry.action.to_string().dimmed(),
                Action::Install => entry.action.to_string().green(),
                Action::Update => entry.action.to_string().cyan(),
                Action::Failed => entry.action.to_string().red(),
            };
            let detail = match (&entry.resolved, &entry.installed_version) {
                (Err(e), _) => e.to_string(),
                (Ok(r), Some(installed)) if *installed != r.version => {
                    format!("{installed} -> {}", r.version)
                }
                (Ok(r), _) => r.version.clone(),
            };
            println!("{:>3}. {:<8} {} {}", position + 1, action, entry.name().bold(), detail);
            if global.verbose {
                println!("     {:<8} {}", "", entry.component.forum_url().dimmed());
            }
        }

        if global.verbose {
            for (name, reason) in &excluded {
                println!("     {:<8} {} ({})", "excluded".dimmed(), name, reason);
            }
        }

        let failed = plan.count(Action::Failed);
        println!(
            "\n{} to install, {} to update, {} up to date, {} unresolved",
            plan.count(Action::Install),
            plan.count(Action::Update),
            plan.count(Action::Skip),
            failed
        );
        Ok(i32::from(failed > 0))
    }
}
