//! Ambient process settings.
//!
//! Settings are grouped into namespaced sections; this crate consumes the
//! `[kubernetes]` section. Values left out of the settings file keep their
//! defaults, notably `verify_ssl = true`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

use crate::tcp::TcpKeepaliveConfig;

/// Errors raised while loading settings.
#[derive(Debug, Snafu)]
pub enum SettingsError {
    /// The settings file could not be read.
    #[snafu(display("Could not read settings file {:?}: {}", path, source))]
    ReadFile {
        /// The file that failed to read.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },
    /// The settings text was not valid TOML or carried unknown keys.
    #[snafu(display("Could not parse settings: {}", source))]
    Parse {
        /// The underlying error.
        source: toml::de::Error,
    },
}

/// Process-wide settings, one section per namespace.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Settings {
    /// The `[kubernetes]` section.
    pub kubernetes: KubernetesSettings,
}

impl Settings {
    /// Loads settings from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).with_context(|_| ReadFileSnafu { path })?;
        Self::from_toml(&text)
    }

    /// Parses settings from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, SettingsError> {
        toml::from_str(text).context(ParseSnafu)
    }
}

/// Settings consumed under the `kubernetes` namespace.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct KubernetesSettings {
    /// Load credentials from the pod environment instead of a kubeconfig
    /// file.
    pub in_cluster: bool,
    /// Explicit kubeconfig path. When unset, `$KUBECONFIG` and then
    /// `~/.kube/config` are tried.
    pub config_file: Option<PathBuf>,
    /// Kubeconfig context to use instead of the file's `current-context`.
    pub cluster_context: Option<String>,
    /// Whether to verify the API server TLS certificate.
    pub verify_ssl: bool,
    /// Keepalive profile applied to API server connection pools.
    pub tcp_keepalive: TcpKeepaliveConfig,
}

impl Default for KubernetesSettings {
    fn default() -> Self {
        Self {
            in_cluster: false,
            config_file: None,
            cluster_context: None,
            verify_ssl: true,
            tcp_keepalive: TcpKeepaliveConfig::KUBE_API_DEFAULTS,
        }
    }
}
