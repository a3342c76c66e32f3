//! Pieces shared by the commands: loading a project and wiring the pipeline.

use super::GlobalOptions;
use crate::cache::ArtifactCache;
use crate::config::ProjectConfig;
use crate::constants::METADATA_CACHE_FILE;
use crate::core::{Bits, Os};
use crate::extractor::Extractor;
use crate::installer::{Pipeline, PipelineOptions};
use crate::registry::{Registry, loader};
use crate::resolver::{MetadataCache, VersionResolver};
use crate::utils::http::{HttpClient, RetryPolicy};
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use tracing::debug;

/// Flags that override the target platform and run settings.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Operating system to build for (win, linux, osx).
    #[arg(long)]
    pub os: Option<Os>,

    /// Bit-width to build for (32 or 64).
    #[arg(long)]
    pub bits: Option<Bits>,

    /// Leave DFHack and everything needing it out of this run.
    #[arg(long)]
    pub no_dfhack: bool,

    /// Maximum concurrent network operations.
    #[arg(long)]
    pub max_parallel: Option<usize>,

    /// Components file to use instead of the configured one.
    #[arg(long)]
    pub components: Option<PathBuf>,
}

impl TargetArgs {
    pub fn apply(&self, config: &mut ProjectConfig) {
        if let Some(os) = self.os {
            config.target.os = os;
        }
        if let Some(bits) = self.bits {
            config.target.bits = bits;
        }
        if self.no_dfhack {
            config.target.dfhack = false;
        }
        if let Some(max_parallel) = self.max_parallel {
            config.max_parallel = max_parallel.max(1);
        }
        if let Some(components) = &self.components {
            config.components_file.clone_from(components);
        }
    }
}

/// A loaded project: settings plus the component registry.
#[derive(Debug)]
pub struct Project {
    pub config: ProjectConfig,
    pub registry: Registry,
}

impl Project {
    pub fn load(global: &GlobalOptions, args: &TargetArgs) -> Result<Self> {
        let mut config = ProjectConfig::load(&global.project_dir, global.settings.as_deref())?;
        args.apply(&mut config);
        debug!("Building for {} with {} parallel operations", config.target, config.max_parallel);

        let registry =
            loader::load(&config.components_file, config.target.bits, &config.layout)?;
        Ok(Self {
            config,
            registry,
        })
    }

    /// Wire resolver, cache and extractor for this project.
    pub fn pipeline(&self, force: bool, show_progress: bool) -> Result<Pipeline> {
        let config = &self.config;
        let http = HttpClient::new(config.github_token.clone(), RetryPolicy::default())?;
        let metadata = MetadataCache::load(
            &config.cache_dir.join(METADATA_CACHE_FILE),
            config.metadata_ttl_secs,
        );
        let resolver =
            VersionResolver::new(http.clone(), metadata, config.endpoints.clone(), config.target)
                .with_prereleases(config.include_prereleases)
                .with_max_parallel(config.max_parallel);
        let extractor = Extractor::new(config.build_dir.clone(), config.target.os)
            .with_roots(config.roots.clone());

        Ok(Pipeline::new(
            resolver,
            ArtifactCache::new(config.cache_dir.clone(), http),
            extractor,
            PipelineOptions {
                target: config.target,
                game_version: config.game_version.clone(),
                force,
                max_parallel: config.max_parallel,
                timeout: config.timeout,
                show_progress,
                manifest_path: config.manifest_path.clone(),
                utilities_dir: config.layout.utilities.clone(),
            },
        ))
    }
}
