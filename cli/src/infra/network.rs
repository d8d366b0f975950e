//! Network infrastructure: implements `NetworkProbe` with tokio sockets.

use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::application::ports::NetworkProbe;

/// Per-attempt connect timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Production implementation that performs real TCP connects.
pub struct TokioNetworkProbe;

impl NetworkProbe for TokioNetworkProbe {
    async fn check_tcp_connectivity(&self, host: &str, port: u16) -> Result<bool> {
        Ok(matches!(
            timeout(CONNECT_TIMEOUT, TcpStream::connect((host, port))).await,
            Ok(Ok(_))
        ))
    }
}
