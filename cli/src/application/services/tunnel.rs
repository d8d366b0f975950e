//! SSH tunnel from a local port to the Docker daemon on the instance.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::process::ExitStatus;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::process::Child;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::application::ports::{CommandRunner, ComputeApi, NetworkProbe};
use crate::application::services::address::public_address;
use crate::domain::ssh::ForwardSpec;
use crate::domain::{Settings, TunnelError};

const VERIFY_INTERVAL: Duration = Duration::from_millis(250);
const LOOPBACK: &str = "127.0.0.1";

/// A running `ssh` port-forward. Dropping it kills the process.
#[derive(Debug)]
pub struct Tunnel {
    pub host: String,
    pub local_port: u16,
    pub remote_port: u16,
    child: Child,
}

impl Tunnel {
    /// OS process id of the `ssh` child, if still running.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait for the `ssh` process to exit on its own.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting on the child fails.
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        self.child.wait().await.context("waiting for ssh tunnel")
    }

    /// Kill the `ssh` process and reap it.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be signalled.
    pub async fn shutdown(mut self) -> Result<()> {
        if self.child.try_wait()?.is_some() {
            return Ok(());
        }
        self.child.kill().await.context("stopping ssh tunnel")
    }
}

/// Forward `127.0.0.1:<local_port>` to `localhost:<remote_port>` on
/// instance `name` over SSH.
///
/// Waits up to `ssh.verify_timeout` for the local port to accept connections;
/// a zero timeout returns as soon as the process is spawned.
///
/// # Errors
///
/// Returns an error if the address cannot be resolved or the local port is
/// already taken (nothing is spawned in either case), or if `ssh` cannot be
/// started, exits early, or never opens the local port.
#[allow(clippy::too_many_arguments)]
pub async fn open_secure_tunnel(
    api: &impl ComputeApi,
    runner: &impl CommandRunner,
    probe: &impl NetworkProbe,
    ssh: &Settings,
    name: &str,
    zone: &str,
    local_port: u16,
    remote_port: u16,
) -> Result<Tunnel> {
    let host = public_address(api, name, zone).await?;
    // An existing listener would pass the verification checks itself.
    if probe
        .check_tcp_connectivity(LOOPBACK, local_port)
        .await
        .unwrap_or(false)
    {
        warn!(local_port, "local tunnel port already in use");
        return Err(TunnelError::PortInUse { local_port }.into());
    }
    let spec = ForwardSpec {
        user: ssh.ssh_user.clone(),
        host: host.clone(),
        ssh_port: ssh.ssh_port,
        identity_file: ssh.identity_file.clone(),
        local_port,
        remote_port,
    };
    let args = spec.args();
    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
    info!(%host, forward = %spec.forward(), "opening ssh tunnel");
    let child = runner
        .spawn_inherited("ssh", &arg_refs)
        .context("failed to spawn ssh")?;

    let mut tunnel = Tunnel {
        host,
        local_port,
        remote_port,
        child,
    };
    if !ssh.verify_timeout.is_zero() {
        verify(&mut tunnel, probe, ssh.verify_timeout).await?;
    }
    Ok(tunnel)
}

/// Poll the local end until it accepts connections or the child exits.
async fn verify(tunnel: &mut Tunnel, probe: &impl NetworkProbe, timeout: Duration) -> Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = tunnel.child.try_wait()? {
            return Err(exited(tunnel, status).into());
        }
        if probe
            .check_tcp_connectivity(LOOPBACK, tunnel.local_port)
            .await
            .unwrap_or(false)
        {
            debug!(local_port = tunnel.local_port, "tunnel accepting connections");
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(TunnelError::NotReachable {
                host: tunnel.host.clone(),
                local_port: tunnel.local_port,
                secs: timeout.as_secs(),
            }
            .into());
        }
        sleep(VERIFY_INTERVAL).await;
    }
}

fn exited(tunnel: &Tunnel, status: ExitStatus) -> TunnelError {
    TunnelError::Exited {
        host: tunnel.host.clone(),
        status: status.to_string(),
    }
}
