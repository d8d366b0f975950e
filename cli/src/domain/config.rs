//! Domain types and validators for docker-cloud configuration.
//!
//! Pure functions only: no I/O and no async.

use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;

// ── Constants ────────────────────────────────────────────────────────────────

pub const DEFAULT_ZONE: &str = "us-central1-a";
pub const DEFAULT_INSTANCE_NAME: &str = "docker-instance";
pub const DEFAULT_MACHINE_TYPE: &str = "n1-standard-1";
pub const DEFAULT_IMAGE: &str = "projects/debian-cloud/global/images/family/debian-12";
pub const DEFAULT_DISK_NAME: &str = "docker-root";
pub const DEFAULT_DISK_SIZE_GB: u64 = 100;
pub const DEFAULT_DOCKER_PORT: u16 = 8000;
pub const DEFAULT_TUNNEL_PORT: u16 = 8001;
/// MTU of the GCE VPC network.
pub const DEFAULT_MTU: u32 = 1460;

#[allow(clippy::expect_used)] // literal pattern
static RESOURCE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]([-a-z0-9]{0,61}[a-z0-9])?$").expect("valid regex"));

#[allow(clippy::expect_used)] // literal pattern
static ZONE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]+-[a-z]+[0-9]+-[a-z]$").expect("valid regex"));

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration stored in `~/.docker-cloud/config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerCloudConfig {
    /// Google Cloud project id.
    pub project: Option<String>,
    /// Zone the instance and disk live in.
    pub zone: String,
    pub instance: InstanceConfig,
    pub docker: DockerConfig,
    pub tunnel: TunnelConfig,
    pub operations: OperationConfig,
    pub readiness: ReadinessConfig,
    pub credentials: CredentialsConfig,
}

impl Default for DockerCloudConfig {
    fn default() -> Self {
        Self {
            project: None,
            zone: DEFAULT_ZONE.to_string(),
            instance: InstanceConfig::default(),
            docker: DockerConfig::default(),
            tunnel: TunnelConfig::default(),
            operations: OperationConfig::default(),
            readiness: ReadinessConfig::default(),
            credentials: CredentialsConfig::default(),
        }
    }
}

/// Instance and root disk settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    pub name: String,
    pub machine_type: String,
    /// Source image of the root disk.
    pub image: String,
    pub disk_name: String,
    pub disk_size_gb: u64,
    /// Reserved static external address, if any.
    pub nat_ip: Option<String>,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_INSTANCE_NAME.to_string(),
            machine_type: DEFAULT_MACHINE_TYPE.to_string(),
            image: DEFAULT_IMAGE.to_string(),
            disk_name: DEFAULT_DISK_NAME.to_string(),
            disk_size_gb: DEFAULT_DISK_SIZE_GB,
            nat_ip: None,
        }
    }
}

/// Docker daemon settings baked into the startup script.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerConfig {
    /// Port dockerd listens on inside the VM.
    pub port: u16,
    pub mtu: u32,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_DOCKER_PORT,
            mtu: DEFAULT_MTU,
        }
    }
}

/// SSH tunnel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelConfig {
    /// Local port forwarded to the docker port.
    pub local_port: u16,
    /// Remote login; defaults to `$USER`.
    pub user: Option<String>,
    /// Private key; defaults to `~/.ssh/google_compute_engine`.
    pub identity_file: Option<PathBuf>,
    pub ssh_port: u16,
    /// How long to wait for the local port to accept connections. `0`
    /// disables the check.
    pub verify_timeout_secs: u64,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            local_port: DEFAULT_TUNNEL_PORT,
            user: None,
            identity_file: None,
            ssh_port: 22,
            verify_timeout_secs: 10,
        }
    }
}

/// Long-running operation polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationConfig {
    pub poll_interval_secs: u64,
    /// Upper bound on a single wait; unbounded when absent.
    pub max_wait_secs: Option<u64>,
}

impl Default for OperationConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            max_wait_secs: None,
        }
    }
}

/// How `start` decides a freshly created instance is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessMode {
    /// Sleep for a fixed delay.
    #[default]
    Delay,
    /// Probe the SSH port until it accepts connections.
    Probe,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    pub mode: ReadinessMode,
    pub delay_secs: u64,
    pub timeout_secs: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            mode: ReadinessMode::Delay,
            delay_secs: 60,
            timeout_secs: 300,
        }
    }
}

/// Where the access token comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CredentialsSource {
    /// Environment variable, then credentials cache, then the gcloud CLI.
    #[default]
    Auto,
    Env,
    Cache,
    Gcloud,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CredentialsConfig {
    pub source: CredentialsSource,
    /// gcloud credentials cache; defaults to `~/.config/gcloud/credentials`.
    pub cache_path: Option<PathBuf>,
}

// ── Overrides ────────────────────────────────────────────────────────────────

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub project: Option<String>,
    pub zone: Option<String>,
    pub instance_name: Option<String>,
    pub instance_type: Option<String>,
    pub image: Option<String>,
    pub disk_name: Option<String>,
    pub disk_size_gb: Option<u64>,
    pub docker_port: Option<u16>,
    pub tunnel_port: Option<u16>,
    pub credentials: Option<PathBuf>,
}

impl Overrides {
    /// Apply every set override onto `config`.
    pub fn apply(self, config: &mut DockerCloudConfig) {
        if let Some(v) = self.project {
            config.project = Some(v);
        }
        if let Some(v) = self.zone {
            config.zone = v;
        }
        if let Some(v) = self.instance_name {
            config.instance.name = v;
        }
        if let Some(v) = self.instance_type {
            config.instance.machine_type = v;
        }
        if let Some(v) = self.image {
            config.instance.image = v;
        }
        if let Some(v) = self.disk_name {
            config.instance.disk_name = v;
        }
        if let Some(v) = self.disk_size_gb {
            config.instance.disk_size_gb = v;
        }
        if let Some(v) = self.docker_port {
            config.docker.port = v;
        }
        if let Some(v) = self.tunnel_port {
            config.tunnel.local_port = v;
        }
        if let Some(v) = self.credentials {
            config.credentials.cache_path = Some(v);
            if config.credentials.source == CredentialsSource::Auto {
                config.credentials.source = CredentialsSource::Cache;
            }
        }
    }
}

// ── Resolved settings ────────────────────────────────────────────────────────

/// Polling behaviour for long-running operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_wait: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_wait: None,
        }
    }
}

/// Readiness wait after an instance is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessPolicy {
    Delay(Duration),
    Probe { port: u16, timeout: Duration },
}

/// Facts about the local machine needed to fill in defaults.
#[derive(Debug, Clone, Default)]
pub struct HostEnv {
    pub user: Option<String>,
    pub home: Option<PathBuf>,
}

/// Validated, immutable settings read by the application services.
#[derive(Debug, Clone)]
pub struct Settings {
    pub project: String,
    pub zone: String,
    pub instance_name: String,
    pub machine_type: String,
    pub image: String,
    pub disk_name: String,
    pub disk_size_gb: u64,
    pub nat_ip: Option<String>,
    pub docker_port: u16,
    pub mtu: u32,
    pub tunnel_port: u16,
    pub ssh_user: String,
    pub ssh_port: u16,
    pub identity_file: PathBuf,
    pub verify_timeout: Duration,
    pub poll: PollPolicy,
    pub readiness: ReadinessPolicy,
    pub credentials: CredentialsConfig,
}

impl Settings {
    /// Validate `config` and fill in host-dependent defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the project is missing or any name,
    /// zone, port, size or poll interval is invalid.
    pub fn resolve(config: DockerCloudConfig, host: &HostEnv) -> Result<Self> {
        let project = config
            .project
            .filter(|p| !p.trim().is_empty())
            .ok_or(ConfigError::MissingProject)?;
        validate_zone(&config.zone)?;
        validate_resource_name("instance", &config.instance.name)?;
        validate_resource_name("disk", &config.instance.disk_name)?;
        validate_port("docker", config.docker.port)?;
        validate_port("tunnel", config.tunnel.local_port)?;
        validate_port("ssh", config.tunnel.ssh_port)?;
        if config.instance.disk_size_gb == 0 {
            return Err(ConfigError::InvalidDiskSize(0).into());
        }
        if config.operations.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidPollInterval(0).into());
        }

        let home = host.home.clone().unwrap_or_default();
        let identity_file = config
            .tunnel
            .identity_file
            .unwrap_or_else(|| home.join(".ssh").join("google_compute_engine"));
        let ssh_user = config
            .tunnel
            .user
            .or_else(|| host.user.clone())
            .unwrap_or_else(|| "root".to_string());

        let readiness = match config.readiness.mode {
            ReadinessMode::Delay => {
                ReadinessPolicy::Delay(Duration::from_secs(config.readiness.delay_secs))
            }
            ReadinessMode::Probe => ReadinessPolicy::Probe {
                port: config.tunnel.ssh_port,
                timeout: Duration::from_secs(config.readiness.timeout_secs),
            },
        };

        Ok(Self {
            project,
            zone: config.zone,
            instance_name: config.instance.name,
            machine_type: config.instance.machine_type,
            image: config.instance.image,
            disk_name: config.instance.disk_name,
            disk_size_gb: config.instance.disk_size_gb,
            nat_ip: config.instance.nat_ip,
            docker_port: config.docker.port,
            mtu: config.docker.mtu,
            tunnel_port: config.tunnel.local_port,
            ssh_user,
            ssh_port: config.tunnel.ssh_port,
            identity_file,
            verify_timeout: Duration::from_secs(config.tunnel.verify_timeout_secs),
            poll: PollPolicy {
                interval: Duration::from_secs(config.operations.poll_interval_secs),
                max_wait: config.operations.max_wait_secs.map(Duration::from_secs),
            },
            readiness,
            credentials: config.credentials,
        })
    }
}

// ── Validators ───────────────────────────────────────────────────────────────

/// Validates a Compute Engine resource name (RFC 1035 label).
///
/// # Errors
///
/// Returns an error if the name does not match the provider's naming rule.
pub fn validate_resource_name(kind: &'static str, name: &str) -> Result<()> {
    if !RESOURCE_NAME.is_match(name) {
        return Err(ConfigError::InvalidName {
            kind,
            name: name.to_string(),
        }
        .into());
    }
    Ok(())
}

/// Validates a zone name such as `us-central1-a`.
///
/// # Errors
///
/// Returns an error if the zone is malformed.
pub fn validate_zone(zone: &str) -> Result<()> {
    if !ZONE_NAME.is_match(zone) {
        return Err(ConfigError::InvalidZone(zone.to_string()).into());
    }
    Ok(())
}

/// Validates a TCP port.
///
/// # Errors
///
/// Returns an error for port 0.
pub fn validate_port(kind: &'static str, port: u16) -> Result<()> {
    if port == 0 {
        return Err(ConfigError::InvalidPort { kind, port }.into());
    }
    Ok(())
}

// ── Unit tests ───────────────────────────────────────────────────────────────
