//! Sub-bundle host CLI.
//!
//! # Responsibility
//! - Validate bundle catalogs before they ship.
//! - Drive a catalog through a simulated host: open one container per
//!   bundle, dispatch them concurrently, reload once, dispatch again.

mod engine;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use engine::DirectoryEngine;
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use subbundle_core::{
    default_log_level, init_logging, reload_runtime, AttachOutcome, BundleCatalog,
    ContainerError, HostContainer, RuntimeBridge, ScriptHost,
};

/// Load independently packaged script bundles into a shared runtime
#[derive(Parser, Debug)]
#[command(name = "subbundle")]
#[command(version = subbundle_core::core_version())]
#[command(about = "Sub-bundle host tooling", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Validate a bundle catalog
    Check {
        /// Catalog JSON file
        #[arg(value_name = "CATALOG")]
        catalog: PathBuf,
    },

    /// Load and attach every bundle of a catalog against a simulated runtime
    Simulate {
        /// Catalog JSON file
        #[arg(value_name = "CATALOG")]
        catalog: PathBuf,

        /// Directory bundle assets are read from
        #[arg(long, value_name = "DIR")]
        assets_dir: Option<PathBuf>,

        /// Write rolling logs into this directory
        #[arg(long, value_name = "DIR")]
        log_dir: Option<PathBuf>,

        /// Log level (trace, debug, info, warn, error)
        #[arg(long, default_value_t = default_log_level().to_string())]
        level: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Commands::Version => {
            println!("subbundle_core version={}", subbundle_core::core_version());
        }
        Commands::Check { catalog } => {
            let loaded = load_catalog(&catalog)?;
            let timeout = match loaded.loader_options().load_timeout {
                Some(timeout) => format!("{}ms", timeout.as_millis()),
                None => "none".to_string(),
            };
            println!(
                "catalog ok bundles={} load_timeout={}",
                loaded.bundles.len(),
                timeout
            );
            for entry in &loaded.bundles {
                println!("  {} asset={} component={}", entry.name, entry.asset, entry.component);
            }
        }
        Commands::Simulate {
            catalog,
            assets_dir,
            log_dir,
            level,
        } => {
            if let Some(dir) = log_dir {
                init_logging(&level, &dir.to_string_lossy())
                    .with_context(|| format!("Failed to start logging in {}", dir.display()))?;
            }
            let loaded = load_catalog(&catalog)?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to start async runtime")?;
            runtime.block_on(simulate(loaded, assets_dir))?;
        }
    }

    Ok(())
}

fn load_catalog(path: &Path) -> Result<BundleCatalog> {
    BundleCatalog::from_path(path)
        .with_context(|| format!("Invalid catalog: {}", path.display()))
}

async fn simulate(catalog: BundleCatalog, assets_dir: Option<PathBuf>) -> Result<()> {
    let engine = Arc::new(DirectoryEngine::new(assets_dir));
    let host = ScriptHost::new(engine.clone()).context("Failed to start script host")?;
    let bridge = RuntimeBridge::from_host(Arc::new(host.clone()));
    let options = catalog.loader_options();

    let mut containers = Vec::with_capacity(catalog.bundles.len());
    for entry in &catalog.bundles {
        let container = HostContainer::new(entry.container_config(), bridge.clone(), options)
            .with_context(|| format!("Failed to open container `{}`", entry.name))?;
        containers.push((entry.name.clone(), Arc::new(container)));
    }

    println!("-- initial dispatch");
    dispatch_all(&containers).await;
    host.on_host_resume();

    let generation = reload_runtime(&bridge)
        .await
        .context("Runtime reload failed")?;
    info!(
        "event=simulate_reload module=cli status=ok generation={}",
        generation.id()
    );
    println!("-- reloaded into generation {}", generation.id());
    dispatch_all(&containers).await;

    for (generation, source_url, bytes) in engine.evaluated() {
        println!("evaluated generation={generation} source={source_url} bytes={bytes}");
    }
    println!("attached_surfaces={}", engine.attached_surfaces());

    for (_, container) in &containers {
        container.close();
    }
    host.on_host_destroy();
    Ok(())
}

async fn dispatch_all(containers: &[(String, Arc<HostContainer>)]) {
    let handles: Vec<_> = containers
        .iter()
        .map(|(name, container)| {
            let container = Arc::clone(container);
            let name = name.clone();
            tokio::spawn(async move { (name, container.dispatch().await) })
        })
        .collect();

    for handle in handles {
        match handle.await {
            Ok((name, result)) => print_outcome(&name, result),
            Err(err) => println!("  dispatch task failed: {err}"),
        }
    }
}

fn print_outcome(name: &str, result: std::result::Result<AttachOutcome, ContainerError>) {
    match result {
        Ok(outcome) => {
            info!(
                "event=simulate_dispatch module=cli status={} bundle={name} generation={}",
                outcome.as_str(),
                outcome.generation()
            );
            println!(
                "  {name}: {} generation={}",
                outcome.as_str(),
                outcome.generation()
            );
        }
        Err(err) => {
            warn!("event=simulate_dispatch module=cli status=error bundle={name} error={err}");
            println!("  {name}: error {err}");
        }
    }
}
