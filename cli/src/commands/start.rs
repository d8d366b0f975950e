//! `docker-cloud start`: get or create the instance and hold the tunnel open.

use std::process::ExitCode;

use anyhow::Result;

use crate::app::AppContext;
use crate::application::services::orchestrator::{self, StartOutcome, Started};
use crate::commands::{INTERRUPTED, shutdown_signal};
use crate::domain::TunnelError;

/// Run `docker-cloud start`.
///
/// Blocks until interrupted or until the tunnel process exits. An interrupt
/// while provisioning abandons the in-flight wait; an interrupt while the
/// tunnel is up kills `ssh`.
///
/// # Errors
///
/// Returns an error if provisioning or the tunnel fails, or the tunnel
/// process dies on its own.
pub async fn run(app: &AppContext) -> Result<ExitCode> {
    let ctx = &app.output;
    let settings = &app.settings;
    let reporter = app.reporter();

    let started = tokio::select! {
        result = orchestrator::start(
            &app.compute,
            &app.runner,
            &app.probe,
            &reporter,
            settings,
        ) => result?,
        () = shutdown_signal() => {
            drop(reporter);
            ctx.warn("Interrupted. Provider operations already issued keep running.");
            return Ok(ExitCode::from(INTERRUPTED));
        }
    };
    drop(reporter);
    let Started { outcome, mut tunnel } = started;

    match &outcome {
        StartOutcome::Reused { address } => {
            ctx.success(&format!(
                "Using existing instance '{}' at {address}",
                settings.instance_name
            ));
        }
        StartOutcome::Created { address } => {
            ctx.success(&format!(
                "Created instance '{}' at {address}",
                settings.instance_name
            ));
        }
    }
    ctx.kv("DOCKER_HOST", &format!("tcp://localhost:{}", tunnel.local_port));
    ctx.info(&format!(
        "Run: export DOCKER_HOST=tcp://localhost:{}",
        tunnel.local_port
    ));
    ctx.info("Press Ctrl-C to close the tunnel.");

    let exited = tokio::select! {
        status = tunnel.wait() => Some(status?),
        () = shutdown_signal() => None,
    };

    match exited {
        Some(status) => Err(TunnelError::Exited {
            host: tunnel.host.clone(),
            status: status.to_string(),
        }
        .into()),
        None => {
            tunnel.shutdown().await?;
            ctx.success("Tunnel closed.");
            ctx.info("The instance keeps running. Delete it with: docker-cloud stop");
            Ok(ExitCode::SUCCESS)
        }
    }
}
