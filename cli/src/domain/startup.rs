//! Startup script run by GCE at the instance's first boot.

/// Render the startup script for a Docker daemon on `docker_port`.
///
/// The daemon listens on the loopback interface only; it is reached through
/// the SSH tunnel, which forwards to `localhost:<docker_port>` on the VM.
#[must_use]
pub fn render(docker_port: u16, mtu: u32) -> String {
    format!(
        r#"#!/bin/bash
set -e
sysctl -w net.ipv4.ip_forward=1
curl -fsSL https://get.docker.com | sh
mkdir -p /etc/systemd/system/docker.service.d
cat > /etc/systemd/system/docker.service.d/docker-cloud.conf <<'EOF'
[Service]
ExecStart=
ExecStart=/usr/bin/dockerd -H fd:// -H tcp://127.0.0.1:{docker_port} --mtu {mtu} --containerd=/run/containerd/containerd.sock
EOF
systemctl daemon-reload
systemctl restart docker && echo "docker restarted on port :{docker_port}"
"#
    )
}
