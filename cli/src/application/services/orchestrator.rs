//! `start` and `stop` use-cases.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use anyhow::Result;
use tracing::info;

use crate::application::ports::{CommandRunner, ComputeApi, NetworkProbe, ProgressReporter};
use crate::application::services::address::find_public_address;
use crate::application::services::instance::{create_instance, delete_instance};
use crate::application::services::tunnel::{Tunnel, open_secure_tunnel};
use crate::domain::Settings;

/// How `start` obtained its instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// The instance already existed.
    Reused { address: String },
    /// The instance was created by this run.
    Created { address: String },
}

impl StartOutcome {
    #[must_use]
    pub fn address(&self) -> &str {
        match self {
            Self::Reused { address } | Self::Created { address } => address,
        }
    }
}

/// Result of a successful `start`.
#[derive(Debug)]
pub struct Started {
    pub outcome: StartOutcome,
    pub tunnel: Tunnel,
}

/// Get or create the configured instance, then tunnel to its Docker port.
///
/// # Errors
///
/// Returns the first failure of lookup, creation or tunnel setup. Nothing is
/// rolled back.
pub async fn start(
    api: &impl ComputeApi,
    runner: &impl CommandRunner,
    probe: &impl NetworkProbe,
    reporter: &impl ProgressReporter,
    settings: &Settings,
) -> Result<Started> {
    let name = settings.instance_name.as_str();
    let zone = settings.zone.as_str();

    reporter.step(&format!("looking up instance '{name}'..."));
    let outcome = match find_public_address(api, name, zone).await? {
        Some(address) => {
            info!(instance = name, %address, "reusing existing instance");
            reporter.success(&format!("found instance '{name}' at {address}"));
            StartOutcome::Reused { address }
        }
        None => {
            let address = create_instance(api, probe, reporter, settings, name, zone).await?;
            StartOutcome::Created { address }
        }
    };

    reporter.step(&format!(
        "opening tunnel localhost:{} -> {}:{}...",
        settings.tunnel_port,
        outcome.address(),
        settings.docker_port
    ));
    let tunnel = open_secure_tunnel(
        api,
        runner,
        probe,
        settings,
        name,
        zone,
        settings.tunnel_port,
        settings.docker_port,
    )
    .await?;
    reporter.success(&format!("tunnel open on localhost:{}", settings.tunnel_port));

    Ok(Started { outcome, tunnel })
}

/// Delete the configured instance. The root disk survives.
///
/// # Errors
///
/// Returns an error if the instance does not exist or the delete fails.
pub async fn stop(
    api: &impl ComputeApi,
    reporter: &impl ProgressReporter,
    settings: &Settings,
) -> Result<()> {
    let name = settings.instance_name.as_str();
    reporter.step(&format!("deleting instance '{name}'..."));
    delete_instance(api, name, &settings.zone, &settings.poll).await?;
    reporter.success(&format!("instance '{name}' deleted"));
    Ok(())
}
