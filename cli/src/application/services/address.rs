//! Public address lookup.

use anyhow::{Context, Result};

use crate::application::ports::ComputeApi;
use crate::domain::{ComputeError, Instance, InstanceError};

/// External address of instance `name`.
///
/// # Errors
///
/// Returns an error if the instance cannot be fetched or carries no external
/// address.
pub async fn public_address(api: &impl ComputeApi, name: &str, zone: &str) -> Result<String> {
    let instance = api
        .get_instance(zone, name)
        .await
        .with_context(|| format!("looking up instance '{name}'"))?;
    address_of(&instance, name)
}

/// Like [`public_address`], but `Ok(None)` when the instance does not exist.
///
/// # Errors
///
/// Returns an error for any lookup failure other than absence, or when the
/// instance exists without an external address.
pub async fn find_public_address(
    api: &impl ComputeApi,
    name: &str,
    zone: &str,
) -> Result<Option<String>> {
    let instance = match api.get_instance(zone, name).await {
        Ok(instance) => instance,
        Err(ComputeError::NotFound(_)) => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("looking up instance '{name}'"));
        }
    };
    address_of(&instance, name).map(Some)
}

/// A stopped instance keeps its interfaces but loses its ephemeral NAT IP,
/// so the status goes into the error.
fn address_of(instance: &Instance, name: &str) -> Result<String> {
    instance
        .public_address()
        .map(str::to_owned)
        .ok_or_else(|| {
            InstanceError::NoPublicAddress {
                name: name.to_string(),
                status: instance.status.clone(),
            }
            .into()
        })
}
