//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use thiserror::Error;

// ── Provider errors ───────────────────────────────────────────────────────────

/// Failure of a single Compute API call, classified by what the caller may
/// conclude from it.
///
/// Only `NotFound` means the resource is absent. `Transient` and `Fatal`
/// must never be read as absence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComputeError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("transient provider error: {0}")]
    Transient(String),

    #[error("provider error: {0}")]
    Fatal(String),
}

impl ComputeError {
    /// Returns `true` for the lookup-miss signal.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Returns `true` when `err` wraps a [`ComputeError::NotFound`] anywhere in
/// its context chain.
#[must_use]
pub fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<ComputeError>())
        .any(ComputeError::is_not_found)
}

// ── Operation errors ──────────────────────────────────────────────────────────

/// Outcomes of waiting on a long-running operation that are not success.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    #[error("Bad operation {name}: status {status}{}", describe(.description))]
    BadStatus {
        name: String,
        status: String,
        description: Option<String>,
    },

    #[error("Operation {name} failed: {message}")]
    Failed { name: String, message: String },

    #[error("Operation {name} did not finish within {secs}s")]
    TimedOut { name: String, secs: u64 },
}

fn describe(description: &Option<String>) -> String {
    description
        .as_deref()
        .map(|d| format!(" ({d})"))
        .unwrap_or_default()
}

// ── Instance errors ───────────────────────────────────────────────────────────

/// Errors about the state of the compute instance itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstanceError {
    #[error("Instance '{name}' has no public address (status {status}).")]
    NoPublicAddress { name: String, status: String },

    #[error("Instance '{name}' was not reachable on {address}:{port} after {secs}s.")]
    NotReady {
        name: String,
        address: String,
        port: u16,
        secs: u64,
    },
}

// ── Tunnel errors ─────────────────────────────────────────────────────────────

/// Errors raised while establishing the SSH port-forward.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TunnelError {
    #[error(
        "Local port {local_port} is already in use. Stop whatever listens there or pass another --tunnel-port."
    )]
    PortInUse { local_port: u16 },

    #[error("ssh tunnel to {host} exited early ({status})")]
    Exited { host: String, status: String },

    #[error("ssh tunnel to {host} did not open local port {local_port} within {secs}s")]
    NotReachable {
        host: String,
        local_port: u16,
        secs: u64,
    },
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to configuration validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("No project configured. Pass --project or set DOCKER_CLOUD_PROJECT.")]
    MissingProject,

    #[error("Invalid {kind} name '{name}': must match ^[a-z]([-a-z0-9]{{0,61}}[a-z0-9])?$")]
    InvalidName { kind: &'static str, name: String },

    #[error("Invalid zone '{0}': expected a zone such as us-central1-a")]
    InvalidZone(String),

    #[error("Invalid {kind} port: {port}")]
    InvalidPort { kind: &'static str, port: u16 },

    #[error("Invalid disk size: {0} GB")]
    InvalidDiskSize(u64),

    #[error("Invalid operation poll interval: {0}s")]
    InvalidPollInterval(u64),
}

// ── Credential errors ─────────────────────────────────────────────────────────

/// Errors raised while obtaining an access token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialsError {
    #[error("No credentials found. Run 'gcloud auth login' or set GOOGLE_OAUTH_ACCESS_TOKEN.")]
    NoSource,

    #[error("Malformed credentials cache {path}: {reason}")]
    MalformedCache { path: String, reason: String },

    #[error("Refreshing access token failed: {0}")]
    Refresh(String),
}
