//! Everything related to building in-cluster configuration.

use http::Uri;
use snafu::{ResultExt, Snafu};

use super::Config;
use crate::tls::TlsOptions;

/// Environment variable carrying the API server host inside a pod.
const HOST_ENV: &str = "KUBERNETES_SERVICE_HOST";

/// Environment variable carrying the API server port inside a pod.
const PORT_ENV: &str = "KUBERNETES_SERVICE_PORT";

/// Mounted service-account credentials.
const TOKEN_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
const ROOT_CA_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";
const NAMESPACE_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

impl Config {
    /// Prepares a config suitable for use when running inside a pod.
    ///
    /// The API server address comes from the `KUBERNETES_SERVICE_*`
    /// environment variables, credentials from the mounted service-account
    /// files. The mounted namespace is used as the default namespace when
    /// present.
    pub fn in_cluster() -> Result<Self, Error> {
        let host = std::env::var(HOST_ENV).context(NotInClusterSnafu { missing: HOST_ENV })?;
        let port = std::env::var(PORT_ENV).context(NotInClusterSnafu { missing: PORT_ENV })?;

        let authority = join_host_port(host.as_str(), port.as_str());
        let base = Uri::builder()
            .scheme("https")
            .authority(authority.as_str())
            .path_and_query("/")
            .build()
            .context(InvalidUrlSnafu)?;

        // Token files are written with a trailing newline.
        let token = std::fs::read_to_string(TOKEN_FILE)
            .map(|token| token.trim_end().to_owned())
            .context(TokenSnafu)?;

        let default_namespace = std::fs::read_to_string(NAMESPACE_FILE)
            .map(|namespace| namespace.trim_end().to_owned())
            .unwrap_or_else(|_| "default".to_owned());

        let tls_options = TlsOptions {
            ca_file: Some(ROOT_CA_FILE.into()),
            ..Default::default()
        };

        Ok(Self {
            base,
            token: Some(token),
            tls_options,
            default_namespace,
        })
    }
}

/// An error returned when building an in-cluster configuration.
#[derive(Debug, Snafu)]
pub enum Error {
    /// The in-cluster configuration was requested while executing outside a
    /// cluster environment.
    #[snafu(display(
        "unable to load in-cluster configuration, {} and {} must be defined",
        HOST_ENV,
        PORT_ENV
    ))]
    NotInCluster {
        /// The underlying error.
        source: std::env::VarError,

        /// The environment variable that's missing.
        missing: &'static str,
    },

    /// The service-account token file could not be read.
    #[snafu(display("unable to read the token file"))]
    Token {
        /// The underlying error.
        source: std::io::Error,
    },

    /// The configuration resulted in an invalid URL.
    #[snafu(display("unable to construct a proper API server URL"))]
    InvalidUrl {
        /// The underlying error.
        source: http::Error,
    },
}

/// Joins a host and port the way Go's `net.JoinHostPort` does, since that is
/// what the reference in-cluster implementation in client-go relies on.
/// IPv6 hosts get the bracketed notation.
fn join_host_port(host: &str, port: &str) -> String {
    if host.contains(':') {
        return format!("[{}]:{}", host, port);
    }
    format!("{}:{}", host, port)
}
