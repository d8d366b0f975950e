//! Instance creation and deletion.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::application::ports::{ComputeApi, NetworkProbe, ProgressReporter};
use crate::application::services::address::public_address;
use crate::application::services::disk::get_or_create_root_disk;
use crate::application::services::operation::wait_for_operation;
use crate::domain::compute::DescriptorParams;
use crate::domain::{
    DiskSpec, InstanceDescriptor, InstanceError, PollPolicy, ReadinessPolicy, Settings, startup,
};

const PROBE_INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const PROBE_MAX_BACKOFF: Duration = Duration::from_secs(16);

/// Create instance `name` running Docker and return its public address.
///
/// The root disk is looked up or created first; the instance boots from it
/// and runs the startup script that installs Docker. After the insert
/// completes, waits according to `plan.readiness`, then asks the provider
/// for the address it assigned.
///
/// # Errors
///
/// Returns an error if the root disk cannot be prepared, the insert or its
/// operation fails, the instance never becomes ready, or it has no public
/// address.
pub async fn create_instance(
    api: &impl ComputeApi,
    probe: &impl NetworkProbe,
    reporter: &impl ProgressReporter,
    plan: &Settings,
    name: &str,
    zone: &str,
) -> Result<String> {
    reporter.step("preparing root disk...");
    let disk_spec = DiskSpec::new(&plan.disk_name, plan.disk_size_gb, &plan.image);
    let boot_disk = get_or_create_root_disk(api, &disk_spec, zone, &plan.poll)
        .await
        .context("preparing root disk")?;

    let script = startup::render(plan.docker_port, plan.mtu);
    let descriptor = InstanceDescriptor::build(&DescriptorParams {
        project: api.project(),
        zone,
        name,
        machine_type: &plan.machine_type,
        boot_disk: &boot_disk,
        startup_script: &script,
        nat_ip: plan.nat_ip.as_deref(),
    });

    reporter.step(&format!("creating instance '{name}'..."));
    info!(instance = name, zone, machine_type = %plan.machine_type, "creating instance");
    let operation = api
        .insert_instance(zone, &descriptor)
        .await
        .inspect_err(|err| warn!(instance = name, error = %err, "instance insert rejected"))
        .with_context(|| format!("creating instance '{name}'"))?;
    wait_for_operation(api, &operation, zone, &plan.poll)
        .await
        .with_context(|| format!("creating instance '{name}'"))?;
    reporter.success(&format!("instance '{name}' created"));

    wait_until_ready(api, probe, reporter, &plan.readiness, name, zone).await?;

    let address = public_address(api, name, zone).await?;
    info!(instance = name, %address, "instance ready");
    Ok(address)
}

/// Delete instance `name` and wait for the operation to finish.
///
/// The root disk is left untouched.
///
/// # Errors
///
/// Returns an error if the instance does not exist, the delete is rejected,
/// or its operation fails.
pub async fn delete_instance(
    api: &impl ComputeApi,
    name: &str,
    zone: &str,
    policy: &PollPolicy,
) -> Result<()> {
    info!(instance = name, zone, "deleting instance");
    let operation = api
        .delete_instance(zone, name)
        .await
        .inspect_err(|err| warn!(instance = name, error = %err, "instance delete rejected"))
        .with_context(|| format!("deleting instance '{name}'"))?;
    wait_for_operation(api, &operation, zone, policy)
        .await
        .with_context(|| format!("deleting instance '{name}'"))?;
    info!(instance = name, "instance deleted");
    Ok(())
}

async fn wait_until_ready(
    api: &impl ComputeApi,
    probe: &impl NetworkProbe,
    reporter: &impl ProgressReporter,
    readiness: &ReadinessPolicy,
    name: &str,
    zone: &str,
) -> Result<()> {
    match *readiness {
        ReadinessPolicy::Delay(delay) => {
            reporter.step(&format!(
                "waiting {}s for docker to come up...",
                delay.as_secs()
            ));
            sleep(delay).await;
            Ok(())
        }
        ReadinessPolicy::Probe { port, timeout } => {
            let address = public_address(api, name, zone).await?;
            reporter.step(&format!("waiting for {address}:{port} to accept connections..."));
            let deadline = Instant::now() + timeout;
            let mut backoff = PROBE_INITIAL_BACKOFF;
            loop {
                match probe.check_tcp_connectivity(&address, port).await {
                    Ok(true) => {
                        reporter.success(&format!("instance '{name}' is reachable"));
                        return Ok(());
                    }
                    Ok(false) => debug!(%address, port, "instance not reachable yet"),
                    Err(err) => debug!(%address, port, error = %err, "probe failed"),
                }
                let now = Instant::now();
                if now >= deadline {
                    return Err(InstanceError::NotReady {
                        name: name.to_string(),
                        address,
                        port,
                        secs: timeout.as_secs(),
                    }
                    .into());
                }
                sleep(backoff.min(deadline - now)).await;
                backoff = (backoff * 2).min(PROBE_MAX_BACKOFF);
            }
        }
    }
}
