//! Application context: unified state passed to every command handler.
//!
//! `AppContext` is built once in `Cli::run()`: it loads and validates the
//! configuration, resolves credentials, and wires the infrastructure
//! adapters the services run against.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::application::ports::ConfigStore;
use crate::domain::{HostEnv, Overrides, Settings};
use crate::infra::auth::{TOKEN_ENV, resolve_access_token};
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::config::YamlConfigStore;
use crate::infra::gce::GceClient;
use crate::infra::network::TokioNetworkProbe;
use crate::output::{OutputContext, TerminalReporter};

/// Output rendering flags.
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
}

/// Flags passed from the top-level CLI to `AppContext::new`.
pub struct AppFlags {
    /// Output rendering options.
    pub output: OutputFlags,
    /// Explicit config file, overriding the default location.
    pub config_path: Option<PathBuf>,
    /// Command-line values that win over the config file.
    pub overrides: Overrides,
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Validated settings.
    pub settings: Settings,
    /// Compute API client for the configured project.
    pub compute: GceClient,
    /// Process runner used for `ssh`.
    pub runner: TokioCommandRunner,
    /// TCP reachability checks.
    pub probe: TokioNetworkProbe,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    ///
    /// Configuration errors surface before any credential lookup, and
    /// credential errors before any provider call.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file is unreadable or invalid, or no
    /// access token can be obtained.
    pub async fn new(flags: AppFlags) -> Result<Self> {
        let store = YamlConfigStore::new(flags.config_path);
        let mut config = store.load()?;
        flags.overrides.apply(&mut config);

        let host = host_env();
        let settings = Settings::resolve(config, &host)?;

        let runner = TokioCommandRunner::default();
        let token = resolve_access_token(
            &settings.credentials,
            std::env::var(TOKEN_ENV).ok(),
            host.home.as_deref(),
            &runner,
        )
        .await
        .context("obtaining Compute API credentials")?;
        let compute = GceClient::new(settings.project.clone(), token)?;

        Ok(Self {
            output: OutputContext::new(flags.output.no_color, flags.output.quiet),
            settings,
            compute,
            runner,
            probe: TokioNetworkProbe,
        })
    }

    /// Progress reporter writing to this context's terminal.
    #[must_use]
    pub fn reporter(&self) -> TerminalReporter<'_> {
        TerminalReporter::new(&self.output)
    }
}

fn host_env() -> HostEnv {
    HostEnv {
        user: std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .ok()
            .filter(|u| !u.is_empty()),
        home: dirs::home_dir(),
    }
}
