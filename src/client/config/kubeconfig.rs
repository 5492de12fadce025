//! Kubeconfig-file configuration loading.
//!
//! Supports the subset of the kubeconfig schema needed to reach a cluster:
//! bearer-token or client-certificate credentials, CA bundles either inline
//! (base64 `*-data` fields) or as file paths, and context selection. Exec
//! credential plugins and auth providers are not handled here.

use std::path::{Path, PathBuf};

use base64::prelude::{Engine as _, BASE64_STANDARD};
use http::Uri;
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt, Snafu};

use super::Config;
use crate::tls::TlsOptions;

/// Environment variable naming the kubeconfig file, as kubectl uses it.
const KUBECONFIG_ENV: &str = "KUBECONFIG";

/// An error returned when building a configuration from a kubeconfig file.
#[derive(Debug, Snafu)]
pub enum Error {
    /// No kubeconfig file could be located.
    #[snafu(display(
        "unable to locate a kubeconfig file; set `config_file`, ${}, or create ~/.kube/config",
        KUBECONFIG_ENV
    ))]
    NotFound,

    /// The kubeconfig file could not be read.
    #[snafu(display("unable to read kubeconfig file {:?}: {}", path, source))]
    ReadFile {
        /// The file that failed to read.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// The kubeconfig file was not valid YAML.
    #[snafu(display("unable to parse kubeconfig file {:?}: {}", path, source))]
    ParseFile {
        /// The file that failed to parse.
        path: PathBuf,
        /// The underlying error.
        source: serde_yaml::Error,
    },

    /// Neither a requested context nor `current-context` was available.
    #[snafu(display("kubeconfig names no current context and none was requested"))]
    NoCurrentContext,

    /// The requested context is not defined in the file.
    #[snafu(display("context {:?} not found in kubeconfig", name))]
    UnknownContext {
        /// The context that was requested.
        name: String,
    },

    /// The context references a cluster the file does not define.
    #[snafu(display("cluster {:?} referenced by the context is not defined", name))]
    UnknownCluster {
        /// The cluster the context referenced.
        name: String,
    },

    /// The context references a user the file does not define.
    #[snafu(display("user {:?} referenced by the context is not defined", name))]
    UnknownUser {
        /// The user the context referenced.
        name: String,
    },

    /// The cluster's server field did not parse as a URI.
    #[snafu(display("cluster server {:?} is not a valid URI: {}", server, source))]
    InvalidServer {
        /// The server value from the file.
        server: String,
        /// The underlying error.
        source: http::uri::InvalidUri,
    },

    /// The user's token file could not be read.
    #[snafu(display("unable to read token file {:?}: {}", path, source))]
    ReadTokenFile {
        /// The file that failed to read.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// An inline `*-data` field was not valid base64.
    #[snafu(display("unable to decode inline certificate data: {}", source))]
    DecodeData {
        /// The underlying error.
        source: base64::DecodeError,
    },

    /// An inline `*-data` field did not decode to PEM text.
    #[snafu(display("inline certificate data is not valid UTF-8: {}", source))]
    NonUtf8Data {
        /// The underlying error.
        source: std::string::FromUtf8Error,
    },
}

/// A kubeconfig document.
///
/// Unknown fields are ignored on purpose; real kubeconfig files carry plenty
/// of stanzas this crate has no use for.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Kubeconfig {
    /// Document kind, `Config` when present.
    pub kind: Option<String>,
    /// Document API version.
    #[serde(rename = "apiVersion")]
    pub api_version: Option<String>,
    /// The context used when the caller doesn't request one.
    #[serde(default, rename = "current-context")]
    pub current_context: Option<String>,
    /// Named cluster endpoints.
    #[serde(default)]
    pub clusters: Vec<NamedCluster>,
    /// Named (cluster, user) pairings.
    #[serde(default)]
    pub contexts: Vec<NamedContext>,
    /// Named credential sets.
    #[serde(default)]
    pub users: Vec<NamedAuthInfo>,
}

/// Associates a name with a cluster.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NamedCluster {
    /// The cluster's name.
    pub name: String,
    /// The cluster itself.
    pub cluster: Cluster,
}

/// Information needed to reach a cluster.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Cluster {
    /// Address of the API server.
    pub server: String,
    /// Skip TLS certificate verification for this cluster.
    #[serde(default, rename = "insecure-skip-tls-verify")]
    pub insecure_skip_tls_verify: Option<bool>,
    /// Path to the CA bundle used to verify the API server.
    #[serde(default, rename = "certificate-authority")]
    pub certificate_authority: Option<String>,
    /// Inline base64 CA bundle.
    #[serde(default, rename = "certificate-authority-data")]
    pub certificate_authority_data: Option<String>,
}

/// Associates a name with a context.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NamedContext {
    /// The context's name.
    pub name: String,
    /// The context itself.
    pub context: Context,
}

/// A (cluster, user) pairing with an optional namespace.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Context {
    /// Name of the cluster to connect to.
    pub cluster: String,
    /// Name of the credentials to connect with.
    pub user: String,
    /// Namespace used when the caller doesn't name one.
    #[serde(default)]
    pub namespace: Option<String>,
}

/// Associates a name with a credential set.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NamedAuthInfo {
    /// The user's name.
    pub name: String,
    /// The credentials themselves.
    pub user: AuthInfo,
}

/// Credentials used to authenticate against a cluster.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct AuthInfo {
    /// Bearer token.
    #[serde(default)]
    pub token: Option<String>,
    /// Path to a file holding a bearer token.
    #[serde(default, rename = "tokenFile")]
    pub token_file: Option<String>,
    /// Path to a client certificate.
    #[serde(default, rename = "client-certificate")]
    pub client_certificate: Option<String>,
    /// Inline base64 client certificate.
    #[serde(default, rename = "client-certificate-data")]
    pub client_certificate_data: Option<String>,
    /// Path to the client certificate's private key.
    #[serde(default, rename = "client-key")]
    pub client_key: Option<String>,
    /// Inline base64 private key.
    #[serde(default, rename = "client-key-data")]
    pub client_key_data: Option<String>,
}

impl Kubeconfig {
    /// Reads and parses a kubeconfig file.
    pub fn read_from(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).with_context(|_| ReadFileSnafu { path })?;
        serde_yaml::from_str(&text).with_context(|_| ParseFileSnafu { path })
    }
}

impl Config {
    /// Prepares a config from a kubeconfig file.
    ///
    /// The file is the explicit `path` when given, then `$KUBECONFIG`, then
    /// `~/.kube/config`. The context is the explicit `context` when given,
    /// the file's `current-context` otherwise.
    pub fn from_kubeconfig(path: Option<&Path>, context: Option<&str>) -> Result<Self, Error> {
        let path = resolve_path(path)?;
        debug!(message = "Reading kubeconfig file.", path = %path.display());
        let kubeconfig = Kubeconfig::read_from(&path)?;
        Self::from_kubeconfig_document(&kubeconfig, context)
    }

    /// Prepares a config from an already-parsed kubeconfig document.
    pub fn from_kubeconfig_document(
        kubeconfig: &Kubeconfig,
        context: Option<&str>,
    ) -> Result<Self, Error> {
        let context_name = context
            .map(ToOwned::to_owned)
            .or_else(|| {
                kubeconfig
                    .current_context
                    .clone()
                    .filter(|name| !name.is_empty())
            })
            .context(NoCurrentContextSnafu)?;

        let context = &kubeconfig
            .contexts
            .iter()
            .find(|candidate| candidate.name == context_name)
            .with_context(|| UnknownContextSnafu { name: context_name })?
            .context;

        let cluster = &kubeconfig
            .clusters
            .iter()
            .find(|candidate| candidate.name == context.cluster)
            .with_context(|| UnknownClusterSnafu {
                name: context.cluster.clone(),
            })?
            .cluster;

        let user = &kubeconfig
            .users
            .iter()
            .find(|candidate| candidate.name == context.user)
            .with_context(|| UnknownUserSnafu {
                name: context.user.clone(),
            })?
            .user;

        let base: Uri = cluster.server.parse().with_context(|_| InvalidServerSnafu {
            server: cluster.server.clone(),
        })?;

        let mut tls_options = TlsOptions {
            ca_file: data_or_file(
                &cluster.certificate_authority_data,
                &cluster.certificate_authority,
            )?,
            crt_file: data_or_file(&user.client_certificate_data, &user.client_certificate)?,
            key_file: data_or_file(&user.client_key_data, &user.client_key)?,
            ..Default::default()
        };
        if cluster.insecure_skip_tls_verify == Some(true) {
            tls_options.verify_certificate = Some(false);
        }

        let token = match (&user.token, &user.token_file) {
            (Some(token), _) => Some(token.clone()),
            (None, Some(file)) => Some(
                std::fs::read_to_string(file)
                    .map(|token| token.trim_end().to_owned())
                    .with_context(|_| ReadTokenFileSnafu { path: file })?,
            ),
            (None, None) => None,
        };

        let default_namespace = context
            .namespace
            .clone()
            .unwrap_or_else(|| "default".to_owned());

        Ok(Self {
            base,
            token,
            tls_options,
            default_namespace,
        })
    }
}

/// Locates the kubeconfig file to read.
fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf, Error> {
    if let Some(path) = explicit {
        return Ok(path.to_owned());
    }

    if let Ok(path) = std::env::var(KUBECONFIG_ENV) {
        if !path.is_empty() {
            return Ok(path.into());
        }
    }

    dirs_next::home_dir()
        .map(|home| home.join(".kube").join("config"))
        .filter(|path| path.exists())
        .context(NotFoundSnafu)
}

/// Renders an inline base64 `*-data` field or a file-path field as a
/// [`TlsOptions`] path value. Inline data decodes to PEM text, which the TLS
/// layer accepts in place of a file name.
fn data_or_file(data: &Option<String>, file: &Option<String>) -> Result<Option<PathBuf>, Error> {
    match (data, file) {
        (Some(data), _) => {
            let bytes = BASE64_STANDARD.decode(data.trim()).context(DecodeDataSnafu)?;
            let pem = String::from_utf8(bytes).context(NonUtf8DataSnafu)?;
            Ok(Some(pem.into()))
        }
        (None, Some(file)) => Ok(Some(file.into())),
        (None, None) => Ok(None),
    }
}
