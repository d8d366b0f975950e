//! SSH port-forward argument construction.

use std::path::PathBuf;

/// Everything needed to invoke `ssh` for a port-forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardSpec {
    pub user: String,
    pub host: String,
    pub ssh_port: u16,
    pub identity_file: PathBuf,
    pub local_port: u16,
    pub remote_port: u16,
}

impl ForwardSpec {
    /// The `-L` forward specification: `<local>:localhost:<remote>`.
    #[must_use]
    pub fn forward(&self) -> String {
        format!("{}:localhost:{}", self.local_port, self.remote_port)
    }

    /// Arguments for an authenticated, forwarding-only connection.
    ///
    /// Host keys are not verified: the instance is recreated freely and gets
    /// a fresh host key each time. `-N` requests no remote command. The
    /// process stays attached so the caller owns its lifetime.
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        vec![
            "-o".into(),
            "LogLevel=quiet".into(),
            "-o".into(),
            "UserKnownHostsFile=/dev/null".into(),
            "-o".into(),
            "CheckHostIP=no".into(),
            "-o".into(),
            "StrictHostKeyChecking=no".into(),
            "-o".into(),
            "ExitOnForwardFailure=yes".into(),
            "-i".into(),
            self.identity_file.to_string_lossy().into_owned(),
            "-A".into(),
            "-p".into(),
            self.ssh_port.to_string(),
            format!("{}@{}", self.user, self.host),
            "-N".into(),
            "-L".into(),
            self.forward(),
        ]
    }
}
