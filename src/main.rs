// Quince - Multi-Tenant Broker Admission, Placement and Scaling Engine
// Main daemon entry point

use anyhow::Result;
use clap::Parser;
use quince::namespace::Engine;
use quince::scaling::InMemoryLifecycleManager;
use quince::identity::{IdentityProvider, NoopIdentityProvider};
use quince::{cli, config, observability, signals};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    match args.command {
        cli::Commands::Start { config, foreground, verbose: _verbose } => {
            observability::init()?;

            cli::print_banner();

            run_daemon(config, foreground).await
        }
        other => cli::commands::execute(other).await,
    }
}

/// Run the Quince engine daemon
async fn run_daemon(config_path: String, _foreground: bool) -> Result<()> {
    info!("Initializing admission and placement daemon...");

    // Load configuration
    let quince_config = config::QuinceConfig::load(&config_path)?;
    info!("✓ Configuration loaded and validated");

    // Set up graceful shutdown signal handlers
    let shutdown_signal = signals::create_shutdown_listener()?;
    info!("✓ Signal handlers installed (SIGTERM, SIGINT)");

    // Plan registry, optionally preloaded from a catalog file
    let registry = Arc::new(quince::plans::PlanRegistry::new());
    if let Some(catalog) = &quince_config.plans.file {
        cli::commands::load_plan_catalog(&registry, catalog)?;
        info!(file = %catalog, "✓ Plan catalog loaded");
    } else {
        info!("✓ Plan registry initialized (empty)");
    }

    // Standalone mode collaborators. A fleet deployment substitutes real
    // lifecycle and identity integrations here.
    let lifecycle = Arc::new(InMemoryLifecycleManager::new());
    let identity: Arc<dyn IdentityProvider> = Arc::new(NoopIdentityProvider);
    if quince_config.identity.enabled {
        info!("Identity provisioning enabled without an external provider, using noop");
    }

    let engine = Arc::new(Engine::new(
        registry,
        lifecycle,
        identity,
        quince_config.engine_settings(),
    ));
    info!("✓ Engine initialized");

    // Start the background reconcile loop
    engine.start();
    info!(
        "✓ Reconcile loop started ({}s interval)",
        quince_config.engine.reconcile_interval_secs
    );

    println!();
    cli::success("Quince engine is ready");
    println!();
    cli::info("Press Ctrl+C for graceful shutdown");
    println!();

    // Wait for shutdown signal
    let signal = shutdown_signal.await;

    info!(
        signal = signals::signal_name(signal),
        "Initiating graceful shutdown"
    );

    engine.stop();

    // Give the in-flight reconciliation pass time to finish
    tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;

    info!("✓ Graceful shutdown complete");
    info!("Quince stopped");

    Ok(())
}
