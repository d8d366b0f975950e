//! Compute Engine resource models and the instance descriptor builder.
//!
//! These are the JSON shapes exchanged with the Compute API, trimmed to the
//! fields this tool reads or writes. Pure data, no I/O.

use serde::{Deserialize, Serialize};

/// Base URL prefix for fully-qualified Compute resource links.
pub const COMPUTE_LINK_PREFIX: &str = "https://www.googleapis.com/compute/v1/projects";

/// Metadata key GCE executes at first boot.
pub const STARTUP_SCRIPT_KEY: &str = "startup-script";

// ── Instances ─────────────────────────────────────────────────────────────────

/// A compute instance as returned by `instances.get`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub self_link: Option<String>,
    #[serde(default)]
    pub network_interfaces: Vec<NetworkInterface>,
}

impl Instance {
    /// External address of the first access config of the first interface.
    ///
    /// Instances created by this tool carry exactly one interface with one
    /// access config. Returns `None` when either is missing or the address is
    /// not yet assigned.
    #[must_use]
    pub fn public_address(&self) -> Option<&str> {
        self.network_interfaces
            .first()
            .and_then(|ni| ni.access_configs.first())
            .and_then(|ac| ac.nat_ip.as_deref())
            .filter(|ip| !ip.is_empty())
    }
}

/// Network interface of an instance.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default)]
    pub access_configs: Vec<AccessConfig>,
}

/// External NAT mapping on a network interface.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessConfig {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "natIP", default, skip_serializing_if = "Option::is_none")]
    pub nat_ip: Option<String>,
}

/// Request body for `instances.insert`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceDescriptor {
    pub name: String,
    pub description: String,
    pub machine_type: String,
    pub disks: Vec<AttachedDisk>,
    pub network_interfaces: Vec<NetworkInterface>,
    pub metadata: Metadata,
}

/// Disk attachment in an instance descriptor.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedDisk {
    pub boot: bool,
    #[serde(rename = "type")]
    pub kind: String,
    pub mode: String,
    pub source: String,
    pub auto_delete: bool,
}

/// Instance metadata block.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Metadata {
    pub items: Vec<MetadataItem>,
}

/// One metadata key/value pair.
#[derive(Debug, Clone, Serialize)]
pub struct MetadataItem {
    pub key: String,
    pub value: String,
}

/// Inputs for [`InstanceDescriptor::build`].
#[derive(Debug, Clone)]
pub struct DescriptorParams<'a> {
    pub project: &'a str,
    pub zone: &'a str,
    pub name: &'a str,
    pub machine_type: &'a str,
    pub boot_disk: &'a str,
    pub startup_script: &'a str,
    pub nat_ip: Option<&'a str>,
}

impl InstanceDescriptor {
    /// Build the insert request for a Docker host.
    ///
    /// The boot disk is attached with `autoDelete = false` so deleting the
    /// instance leaves the disk for the next `start`.
    #[must_use]
    pub fn build(params: &DescriptorParams<'_>) -> Self {
        let prefix = format!("{COMPUTE_LINK_PREFIX}/{}", params.project);
        Self {
            name: params.name.to_string(),
            description: "Docker on GCE".to_string(),
            machine_type: format!(
                "{prefix}/zones/{}/machineTypes/{}",
                params.zone, params.machine_type
            ),
            disks: vec![AttachedDisk {
                boot: true,
                kind: "PERSISTENT".to_string(),
                mode: "READ_WRITE".to_string(),
                source: params.boot_disk.to_string(),
                auto_delete: false,
            }],
            network_interfaces: vec![NetworkInterface {
                network: Some(format!("{prefix}/global/networks/default")),
                access_configs: vec![AccessConfig {
                    kind: "ONE_TO_ONE_NAT".to_string(),
                    name: Some("External NAT".to_string()),
                    nat_ip: params.nat_ip.map(str::to_owned),
                }],
            }],
            metadata: Metadata {
                items: vec![MetadataItem {
                    key: STARTUP_SCRIPT_KEY.to_string(),
                    value: params.startup_script.to_string(),
                }],
            },
        }
    }
}

// ── Disks ─────────────────────────────────────────────────────────────────────

/// A persistent disk as returned by `disks.get`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Disk {
    pub name: String,
    #[serde(default)]
    pub self_link: String,
    #[serde(default)]
    pub size_gb: Option<String>,
}

/// Request body for `disks.insert`. The source image travels as a query
/// parameter, see [`DiskSpec::source_image`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskSpec {
    pub name: String,
    pub size_gb: String,
    #[serde(skip)]
    pub source_image: String,
}

impl DiskSpec {
    #[must_use]
    pub fn new(name: &str, size_gb: u64, source_image: &str) -> Self {
        Self {
            name: name.to_string(),
            size_gb: size_gb.to_string(),
            source_image: source_image.to_string(),
        }
    }

    /// Self-link the provider assigns to this disk once created.
    #[must_use]
    pub fn self_link(&self, project: &str, zone: &str) -> String {
        format!("{COMPUTE_LINK_PREFIX}/{project}/zones/{zone}/disks/{}", self.name)
    }
}

// ── Operations ────────────────────────────────────────────────────────────────

/// A zonal long-running operation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub target_link: Option<String>,
    #[serde(default)]
    pub status_message: Option<String>,
    #[serde(default)]
    pub http_error_message: Option<String>,
    #[serde(default)]
    pub error: Option<OperationErrorBody>,
}

/// `error` payload of a finished-but-failed operation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OperationErrorBody {
    #[serde(default)]
    pub errors: Vec<OperationErrorItem>,
}

/// One entry of [`OperationErrorBody`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OperationErrorItem {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Observed state of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Pending,
    Running,
    Done,
    /// Anything else the provider reports; an error state.
    Other(String),
}

impl OperationStatus {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "PENDING" => Self::Pending,
            "RUNNING" => Self::Running,
            "DONE" => Self::Done,
            other => Self::Other(other.to_string()),
        }
    }
}

impl Operation {
    #[must_use]
    pub fn status(&self) -> OperationStatus {
        OperationStatus::parse(&self.status)
    }

    /// Human-readable description of why the operation is where it is.
    #[must_use]
    pub fn description(&self) -> Option<String> {
        self.http_error_message
            .clone()
            .or_else(|| self.status_message.clone())
    }

    /// Joined error messages when the operation finished with an error.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        let body = self.error.as_ref()?;
        if body.errors.is_empty() {
            return Some("unspecified error".to_string());
        }
        Some(
            body.errors
                .iter()
                .map(|e| format!("{}: {}", e.code, e.message))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}
