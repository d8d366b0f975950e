//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod compute;
pub mod config;
pub mod error;
pub mod ssh;
pub mod startup;

pub use compute::{Disk, DiskSpec, Instance, InstanceDescriptor, Operation, OperationStatus};
pub use config::{DockerCloudConfig, HostEnv, Overrides, PollPolicy, ReadinessPolicy, Settings};
pub use error::{
    ComputeError, ConfigError, CredentialsError, InstanceError, OperationError, TunnelError,
    is_not_found,
};
