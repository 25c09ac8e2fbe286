// ─── Network Probe ───
// Cheap TCP reachability checks against the game server. The result feeds
// the error registry: unreachable flips NETWORK_OFFLINE on (retryable),
// and the first successful probe clears it again.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpStream;
use tracing::{info, warn};

use crate::core::registry::{ErrorCode, ErrorRegistry, ErrorReport, ReportOptions};

pub const GAME_SERVER_HOST: &str = "mc.frostdev.io";
pub const GAME_SERVER_PORT: u16 = 25565;
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of one reachability check.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectivityReport {
    pub endpoint: String,
    pub reachable: bool,
    pub latency_ms: Option<f64>,
    pub checked_at: DateTime<Utc>,
}

/// TCP connect probe. Returns the measured latency when the endpoint
/// accepted the connection within `timeout`, `None` otherwise.
pub async fn probe(host: &str, port: u16, timeout: Duration) -> Option<f64> {
    let addr = format!("{}:{}", host, port);
    let start = Instant::now();

    match tokio::time::timeout(timeout, TcpStream::connect(&addr)).await {
        Ok(Ok(_)) => Some(start.elapsed().as_secs_f64() * 1000.0),
        Ok(Err(_)) => None,
        Err(_) => None,
    }
}

/// Probe an endpoint and reconcile the registry's NETWORK_OFFLINE entry
/// with the outcome.
pub async fn check_connectivity(
    host: &str,
    port: u16,
    registry: &ErrorRegistry,
) -> ConnectivityReport {
    let latency_ms = probe(host, port, DEFAULT_PROBE_TIMEOUT).await;
    let endpoint = format!("{}:{}", host, port);
    let reachable = latency_ms.is_some();

    if reachable {
        info!(
            "Game server {} reachable ({:.1} ms)",
            endpoint,
            latency_ms.unwrap_or_default()
        );
        registry.clear(ErrorCode::NetworkOffline);
    } else {
        warn!("Game server {} unreachable", endpoint);
        registry.record(ErrorReport::with_options(
            ErrorCode::NetworkOffline,
            format!("Cannot reach the game server at {}", endpoint),
            ReportOptions { retryable: true },
        ));
    }

    ConnectivityReport {
        endpoint,
        reachable,
        latency_ms,
        checked_at: Utc::now(),
    }
}
