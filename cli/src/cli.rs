//! CLI argument parsing with clap derive

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, AppFlags, OutputFlags};
use crate::commands;
use crate::domain::Overrides;

/// Run Docker on a Compute Engine VM, reached through an SSH tunnel
#[derive(Parser)]
#[command(
    name = "docker-cloud",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Config file [default: ~/.docker-cloud/config.yaml]
    #[arg(long, global = true, env = "DOCKER_CLOUD_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Google Cloud project id
    #[arg(long, global = true, env = "DOCKER_CLOUD_PROJECT")]
    pub project: Option<String>,

    /// Zone of the instance and its disk [default: us-central1-a]
    #[arg(long, global = true)]
    pub zone: Option<String>,

    /// Instance name [default: docker-instance]
    #[arg(long, global = true)]
    pub instance_name: Option<String>,

    /// Machine type [default: n1-standard-1]
    #[arg(long, global = true)]
    pub instance_type: Option<String>,

    /// Source image of the root disk
    #[arg(long, global = true)]
    pub image: Option<String>,

    /// Root disk name [default: docker-root]
    #[arg(long, global = true)]
    pub disk_name: Option<String>,

    /// Root disk size in GB [default: 100]
    #[arg(long, global = true, value_name = "GB")]
    pub disk_size: Option<u64>,

    /// Port dockerd listens on inside the VM [default: 8000]
    #[arg(long, global = true)]
    pub docker_port: Option<u16>,

    /// Local port forwarded to the Docker port [default: 8001]
    #[arg(long, global = true)]
    pub tunnel_port: Option<u16>,

    /// gcloud credentials cache [default: ~/.config/gcloud/credentials]
    #[arg(long, global = true, value_name = "PATH")]
    pub credentials: Option<PathBuf>,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the instance if needed and open the Docker tunnel
    Start,

    /// Delete the instance (the root disk is kept)
    Stop,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration, credentials or the command fail.
    pub async fn run(self) -> Result<ExitCode> {
        let Cli {
            config,
            project,
            zone,
            instance_name,
            instance_type,
            image,
            disk_name,
            disk_size,
            docker_port,
            tunnel_port,
            credentials,
            quiet,
            no_color,
            command,
        } = self;

        let flags = AppFlags {
            output: OutputFlags { no_color, quiet },
            config_path: config,
            overrides: Overrides {
                project,
                zone,
                instance_name,
                instance_type,
                image,
                disk_name,
                disk_size_gb: disk_size,
                docker_port,
                tunnel_port,
                credentials,
            },
        };
        let app = AppContext::new(flags).await?;

        match command {
            Command::Start => commands::start::run(&app).await,
            Command::Stop => commands::stop::run(&app).await,
        }
    }
}
