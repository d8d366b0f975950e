//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`, never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::path::PathBuf;
use std::process::Output;
use std::time::Duration;

use anyhow::Result;

use crate::domain::{
    ComputeError, Disk, DiskSpec, DockerCloudConfig, Instance, InstanceDescriptor, Operation,
};

// ── Compute Port ──────────────────────────────────────────────────────────────

/// The Compute Engine calls the lifecycle services issue.
///
/// Every call is scoped to the implementation's project. Errors are
/// classified so callers can tell absence apart from failure.
#[allow(async_fn_in_trait)]
pub trait ComputeApi {
    /// Project every call is issued against.
    fn project(&self) -> &str;
    /// Look up an instance by name.
    async fn get_instance(&self, zone: &str, name: &str) -> Result<Instance, ComputeError>;
    /// Look up a disk by name.
    async fn get_disk(&self, zone: &str, name: &str) -> Result<Disk, ComputeError>;
    /// Create a disk from `spec.source_image`.
    async fn insert_disk(&self, zone: &str, spec: &DiskSpec) -> Result<Operation, ComputeError>;
    /// Create an instance.
    async fn insert_instance(
        &self,
        zone: &str,
        descriptor: &InstanceDescriptor,
    ) -> Result<Operation, ComputeError>;
    /// Delete an instance. Attached disks with `autoDelete = false` survive.
    async fn delete_instance(&self, zone: &str, name: &str) -> Result<Operation, ComputeError>;
    /// Re-fetch a zonal operation.
    async fn get_operation(&self, zone: &str, name: &str) -> Result<Operation, ComputeError>;
}

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output.
    ///
    /// Implementations should delegate to `run_with_timeout` using the
    /// instance's configured default timeout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output>;
    /// Spawn a long-lived program whose stdout/stderr go to ours.
    ///
    /// The child is killed when the returned handle is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned.
    fn spawn_inherited(&self, program: &str, args: &[&str]) -> Result<tokio::process::Child>;
}

// ── Network Probe Port ────────────────────────────────────────────────────────

/// Abstracts network connectivity checks so application services can be tested
/// without real network access.
#[allow(async_fn_in_trait)]
pub trait NetworkProbe {
    /// Check TCP connectivity to the given host and port.
    async fn check_tcp_connectivity(&self, host: &str, port: u16) -> Result<bool>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}

// ── Credentials Port ──────────────────────────────────────────────────────────

/// Produces an OAuth2 bearer token for the Compute API.
#[allow(async_fn_in_trait)]
pub trait AccessTokenSource {
    /// Return a currently valid access token, refreshing if needed.
    async fn access_token(&self) -> Result<String>;
}

// ── Config Port ───────────────────────────────────────────────────────────────

/// Abstracts where the configuration file lives and how it is read.
pub trait ConfigStore {
    /// Load the configuration, returning defaults when no file exists.
    fn load(&self) -> Result<DockerCloudConfig>;
    /// Path of the configuration file.
    fn path(&self) -> Result<PathBuf>;
}
