//! Status Hub Server
//!
//! Main entry point: loads configuration, seeds the status tree, starts the
//! rule engine and serves the HTTP API until Ctrl-C.

use anyhow::{Context, Result};
use hub_api::AppState;
use hub_automation::RuleEngine;
use hub_config::HubConfig;
use hub_core::Revision;
use hub_status::Status;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// The running hub: one status tree and the rules attached to it
pub struct StatusHub {
    /// Shared status tree
    pub status: Status,
    /// Rule engine following the tree
    pub rules: RuleEngine,
}

impl StatusHub {
    /// Build the hub from configuration
    ///
    /// Must run inside a tokio runtime since rules are spawned as tasks.
    pub fn new(config: &HubConfig) -> Result<Self> {
        let status = Status::with_scheme(config.status.scheme.as_str());

        if let Some(initial) = &config.status.initial {
            let root = status.root_url().to_string();
            status
                .set(&root, initial.clone(), Revision::Unchecked)
                .context("failed to write initial status")?;
            info!(revision = status.revision(), "Seeded status tree");
        }

        let rules = RuleEngine::new(status.clone());
        for rule in &config.rules {
            rules
                .add(rule.clone().into())
                .with_context(|| format!("failed to start rule '{}'", rule.name))?;
        }

        Ok(Self { status, rules })
    }
}

fn load_config() -> Result<HubConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            info!(path = %path, "Loading configuration");
            HubConfig::load(&path).with_context(|| format!("failed to load {}", path))
        }
        None => {
            warn!("No configuration file given, using defaults");
            Ok(HubConfig::default())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("Starting status hub");

    let config = load_config()?;
    let hub = StatusHub::new(&config)?;
    info!(
        scheme = hub.status.scheme(),
        rules = config.rules.len(),
        "Status hub initialized"
    );

    let state = AppState::new(hub.status.clone(), config.http.long_poll_timeout());
    let bind = config.http.bind.clone();
    let server = tokio::spawn(async move { hub_api::start_server(state, &bind).await });

    tokio::select! {
        result = server => {
            result
                .context("API server task panicked")?
                .context("API server failed")?;
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Shutting down...");
        }
    }

    hub.rules.stop();
    Ok(())
}
