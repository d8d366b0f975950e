//! `docker-cloud stop`: delete the instance, keeping its root disk.

use std::process::ExitCode;

use anyhow::Result;

use crate::app::AppContext;
use crate::application::services::orchestrator;
use crate::commands::{INTERRUPTED, shutdown_signal};

/// Run `docker-cloud stop`.
///
/// # Errors
///
/// Returns an error if the instance does not exist or cannot be deleted.
pub async fn run(app: &AppContext) -> Result<ExitCode> {
    let ctx = &app.output;
    let reporter = app.reporter();

    tokio::select! {
        result = orchestrator::stop(&app.compute, &reporter, &app.settings) => result?,
        () = shutdown_signal() => {
            drop(reporter);
            ctx.warn("Interrupted. The delete operation may still complete.");
            return Ok(ExitCode::from(INTERRUPTED));
        }
    }
    drop(reporter);

    ctx.info(&format!(
        "Root disk '{}' was kept; the next start reuses it.",
        app.settings.disk_name
    ));
    Ok(ExitCode::SUCCESS)
}
