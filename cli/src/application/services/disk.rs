//! Root disk lookup-or-create.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::application::ports::ComputeApi;
use crate::application::services::operation::wait_for_operation;
use crate::domain::{ComputeError, DiskSpec, PollPolicy};

/// Return the self-link of the root disk, creating it from
/// `spec.source_image` when it does not exist.
///
/// Only a `NotFound` lookup leads to creation. Any other lookup failure is
/// returned as-is so an outage is never mistaken for a missing disk.
///
/// # Errors
///
/// Returns an error if the lookup fails for a reason other than absence, if
/// the insert is rejected, or if the create operation does not succeed.
pub async fn get_or_create_root_disk(
    api: &impl ComputeApi,
    spec: &DiskSpec,
    zone: &str,
    policy: &PollPolicy,
) -> Result<String> {
    match api.get_disk(zone, &spec.name).await {
        Ok(disk) => {
            info!(disk = %spec.name, "found existing root disk");
            if disk.self_link.is_empty() {
                return Ok(spec.self_link(api.project(), zone));
            }
            return Ok(disk.self_link);
        }
        Err(ComputeError::NotFound(_)) => {
            info!(disk = %spec.name, zone, "root disk not found, creating it");
        }
        Err(err) => {
            warn!(disk = %spec.name, error = %err, "looking up root disk failed");
            return Err(err).with_context(|| format!("looking up disk '{}'", spec.name));
        }
    }

    let operation = api
        .insert_disk(zone, spec)
        .await
        .inspect_err(|err| warn!(disk = %spec.name, error = %err, "disk insert rejected"))
        .with_context(|| format!("creating disk '{}'", spec.name))?;
    wait_for_operation(api, &operation, zone, policy)
        .await
        .with_context(|| format!("creating disk '{}'", spec.name))?;
    info!(disk = %spec.name, size_gb = %spec.size_gb, "root disk created");

    Ok(operation
        .target_link
        .filter(|link| !link.is_empty())
        .unwrap_or_else(|| spec.self_link(api.project(), zone)))
}
