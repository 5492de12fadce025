//! TCP keepalive configuration for Kubernetes API connections.

use std::io;
use std::os::fd::AsFd;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use socket2::{SockRef, TcpKeepalive};

/// Configuration for keepalive probes in a TCP stream.
///
/// The properties map to the TCP keepalive options exposed by socket2:
/// `SO_KEEPALIVE` plus `TCP_KEEPIDLE`, `TCP_KEEPINTVL` and `TCP_KEEPCNT` on
/// Linux. A property left as `None` keeps the kernel default for that option.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct TcpKeepaliveConfig {
    /// Seconds a connection stays idle before the first probe is sent.
    pub time_secs: Option<u64>,
    /// Seconds between individual probes.
    pub interval_secs: Option<u64>,
    /// Number of unacknowledged probes before the connection is dropped.
    pub retries: Option<u32>,
}

impl TcpKeepaliveConfig {
    /// Keepalive profile applied to Kubernetes API server connections.
    ///
    /// The API server sits behind load balancers often enough that idle
    /// watch connections get dropped silently; probing after two idle
    /// minutes keeps the pool honest.
    pub const KUBE_API_DEFAULTS: Self = Self {
        time_secs: Some(120),
        interval_secs: Some(30),
        retries: Some(6),
    };

    /// Idle time before the first probe.
    pub fn time(&self) -> Option<Duration> {
        self.time_secs.map(Duration::from_secs)
    }

    /// Interval between probes.
    pub fn interval(&self) -> Option<Duration> {
        self.interval_secs.map(Duration::from_secs)
    }

    /// Renders this config as the socket-level parameter set.
    pub fn as_socket_config(&self) -> TcpKeepalive {
        let mut keepalive = TcpKeepalive::new();
        if let Some(time) = self.time() {
            keepalive = keepalive.with_time(time);
        }
        #[cfg(all(unix, not(target_os = "openbsd")))]
        {
            if let Some(interval) = self.interval() {
                keepalive = keepalive.with_interval(interval);
            }
            if let Some(retries) = self.retries {
                keepalive = keepalive.with_retries(retries);
            }
        }
        keepalive
    }
}

impl Default for TcpKeepaliveConfig {
    fn default() -> Self {
        Self::KUBE_API_DEFAULTS
    }
}

/// Enables keepalive probes on a connected socket.
///
/// This is the equivalent of setting `SO_KEEPALIVE` and the associated
/// `TCP_KEEP*` options directly. Setting the same configuration twice is a
/// no-op rather than an accumulation, so repeat application is safe.
///
/// # Errors
///
/// If there is an error applying the keepalive options on the given socket,
/// an error variant will be returned explaining the underlying I/O error.
pub fn set_keepalive<S>(socket: &S, config: &TcpKeepaliveConfig) -> io::Result<()>
where
    S: AsFd,
{
    SockRef::from(socket).set_tcp_keepalive(&config.as_socket_config())
}
