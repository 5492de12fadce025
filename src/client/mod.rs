//! A lightweight client for the Kubernetes API server.

#![deny(missing_docs)]

pub mod config;

use http::header::{HeaderValue, AUTHORIZATION};
use http::uri::{self, PathAndQuery, Scheme};
use http::{Request, Uri};
use hyper::Body;
use snafu::{ResultExt, Snafu};

pub use config::Config;

use crate::http::{HttpClient, HttpError};
use crate::settings::KubernetesSettings;
use crate::tcp::TcpKeepaliveConfig;
use crate::tls::{TlsError, TlsSettings};

/// Builds a client for in-cluster or out-of-cluster access.
///
/// When `in_cluster` is true the configuration comes from the pod
/// environment, otherwise from the kubeconfig file named by the settings.
/// The ambient `verify_ssl` setting decides whether the client verifies the
/// API server certificate, and TCP keepalive is always enabled on the
/// client's connection pool.
pub fn get_kube_client(
    in_cluster: bool,
    settings: &KubernetesSettings,
) -> crate::Result<Client> {
    let config = Config::load(in_cluster, settings)?;
    let client = Client::new(config, &settings.tcp_keepalive)?;
    Ok(client)
}

/// An error returned when constructing a [`Client`].
#[derive(Debug, Snafu)]
pub enum BuildError {
    /// The TLS settings could not be built from the configured options.
    #[snafu(display("TLS settings construction errored: {}", source))]
    Tls {
        /// The underlying error.
        source: TlsError,
    },
    /// The HTTP client could not be built.
    #[snafu(display("HTTP client construction errored: {}", source))]
    Http {
        /// The underlying error.
        source: HttpError,
    },
    /// The configured bearer token is not a valid header value.
    #[snafu(display("Authorization token is invalid: {}", source))]
    InvalidToken {
        /// The underlying error.
        source: http::header::InvalidHeaderValue,
    },
}

/// An error returned when issuing a request.
#[derive(Debug, Snafu)]
pub enum RequestError {
    /// The request URI could not be rebased onto the API server.
    #[snafu(display("Uri is invalid: {}", source))]
    InvalidUriParts {
        /// The underlying error.
        source: uri::InvalidUriParts,
    },
    /// The request failed in transit.
    #[snafu(display("Request failed: {}", source))]
    Request {
        /// The underlying error.
        source: HttpError,
    },
}

/// A client for the Kubernetes API server.
///
/// Owns its own HTTP(S) connection pool, configured at construction with the
/// TLS policy from the [`Config`] and a TCP keepalive profile. Requests are
/// rebased onto the configured API server and authorized with the bearer
/// token when one was loaded.
#[derive(Debug)]
pub struct Client {
    inner: HttpClient,
    base: Uri,
    token: Option<HeaderValue>,
    default_namespace: String,
}

impl Client {
    /// Builds a client from the given configuration.
    pub fn new(config: Config, keepalive: &TcpKeepaliveConfig) -> Result<Self, BuildError> {
        let Config {
            base,
            token,
            tls_options,
            default_namespace,
        } = config;

        let tls_settings = TlsSettings::from_options(&Some(tls_options)).context(TlsSnafu)?;
        let inner = HttpClient::new(&tls_settings, keepalive).context(HttpSnafu)?;

        let token = token
            .map(|token| {
                HeaderValue::from_str(&format!("Bearer {}", token)).map(|mut value| {
                    value.set_sensitive(true);
                    value
                })
            })
            .transpose()
            .context(InvalidTokenSnafu)?;

        Ok(Self {
            inner,
            base,
            token,
            default_namespace,
        })
    }

    /// The namespace requests fall back to when the caller doesn't name one.
    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    /// The API server base URL this client talks to.
    pub fn base(&self) -> &Uri {
        &self.base
    }

    /// Sends a request to the API server.
    ///
    /// The request keeps its path and query; scheme and authority are
    /// replaced with the configured API server's.
    pub async fn send(
        &self,
        mut request: Request<Body>,
    ) -> Result<http::Response<Body>, RequestError> {
        self.authorize(&mut request);
        self.fill_uri(&mut request)?;
        self.inner.send(request).await.context(RequestSnafu)
    }

    fn authorize(&self, request: &mut Request<Body>) {
        if let Some(token) = &self.token {
            request.headers_mut().insert(AUTHORIZATION, token.clone());
        }
    }

    fn fill_uri(&self, request: &mut Request<Body>) -> Result<(), RequestError> {
        let base = self.base.clone().into_parts();
        let mut parts = request.uri().clone().into_parts();
        parts.scheme = base.scheme.or(Some(Scheme::HTTPS));
        parts.authority = base.authority;
        if parts.path_and_query.is_none() {
            parts.path_and_query = Some(PathAndQuery::from_static("/"));
        }
        *request.uri_mut() = Uri::from_parts(parts).context(InvalidUriPartsSnafu)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::TlsOptions;

    fn test_config() -> Config {
        Config {
            base: Uri::from_static("https://10.0.0.1:6443"),
            token: Some("sekret".to_owned()),
            tls_options: TlsOptions::default(),
            default_namespace: "workloads".to_owned(),
        }
    }

    #[test]
    fn builds_from_config() {
        let client = Client::new(test_config(), &TcpKeepaliveConfig::KUBE_API_DEFAULTS)
            .expect("Failed to build client");
        assert_eq!(client.default_namespace(), "workloads");
        assert_eq!(client.base(), &Uri::from_static("https://10.0.0.1:6443"));
    }

    #[test]
    fn requests_are_authorized_and_rebased() {
        let client = Client::new(test_config(), &TcpKeepaliveConfig::KUBE_API_DEFAULTS).unwrap();

        let mut request = Request::builder()
            .uri("/api/v1/pods?watch=1")
            .body(Body::empty())
            .unwrap();
        client.authorize(&mut request);
        client.fill_uri(&mut request).unwrap();

        assert_eq!(
            request.uri().to_string(),
            "https://10.0.0.1:6443/api/v1/pods?watch=1"
        );
        assert_eq!(request.headers()[AUTHORIZATION], "Bearer sekret");
    }

    #[test]
    fn token_is_optional() {
        let config = Config {
            token: None,
            ..test_config()
        };
        let client = Client::new(config, &TcpKeepaliveConfig::KUBE_API_DEFAULTS).unwrap();

        let mut request = Request::builder()
            .uri("/version")
            .body(Body::empty())
            .unwrap();
        client.authorize(&mut request);
        client.fill_uri(&mut request).unwrap();

        assert!(!request.headers().contains_key(AUTHORIZATION));
    }

    #[test]
    fn rejects_token_with_control_characters() {
        let config = Config {
            token: Some("bad\ntoken".to_owned()),
            ..test_config()
        };
        let error = Client::new(config, &TcpKeepaliveConfig::KUBE_API_DEFAULTS)
            .expect_err("control characters must be rejected");
        assert!(matches!(error, BuildError::InvalidToken { .. }));
    }
}
