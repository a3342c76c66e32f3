//! `packwright cache`

use super::GlobalOptions;
use crate::cache::ArtifactCache;
use crate::config::ProjectConfig;
use crate::lockfile::{InstallState, LockfileStore};
use crate::utils::http::{HttpClient, RetryPolicy};
use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;

#[derive(Args, Debug)]
pub struct CacheCommand {
    #[command(subcommand)]
    command: CacheSubcommand,
}

#[derive(Subcommand, Debug)]
enum CacheSubcommand {
    /// Remove artifacts of versions no longer recorded as installed.
    Clean,

    /// Show the cache location and size.
    Info,
}

impl CacheCommand {
    pub async fn execute(self, global: &GlobalOptions) -> Result<i32> {
        let config = ProjectConfig::load(&global.project_dir, global.settings.as_deref())?;
        let cache = ArtifactCache::new(
            config.cache_dir.clone(),
            HttpClient::new(None, RetryPolicy::default())?,
        );

        match self.command {
            CacheSubcommand::Clean => {
                let state = LockfileStore::open(&config.state_file)?;
                let snapshot = state.snapshot();
                let removed = cache.clean(&snapshot.referenced_versions()).await?;
                println!("{} {} unreferenced artifact version(s)", "Removed".green(), removed);
            }
            CacheSubcommand::Info => {
                let size = cache.size().await?;
                println!("Cache: {}", cache.root().display());
                println!("Size:  {:.1} MiB", size as f64 / (1024.0 * 1024.0));
            }
        }
        Ok(0)
    }
}
