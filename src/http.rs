//! Pooled HTTP(S) client used to reach the Kubernetes API server.

use std::fmt;

use futures::future::BoxFuture;
use http::header::{HeaderValue, USER_AGENT};
use http::Request;
use hyper::body::{Body, HttpBody};
use hyper::client::{Client, HttpConnector};
use hyper_openssl::HttpsConnector;
use snafu::{ResultExt, Snafu};
use tracing::{Instrument, Span};

use crate::tcp::TcpKeepaliveConfig;
use crate::tls::{tls_connector_builder, TlsError, TlsSettings};

/// Errors raised while building the client or issuing requests.
#[derive(Debug, Snafu)]
pub enum HttpError {
    /// The TLS connector could not be built from the given settings.
    #[snafu(display("Failed to build TLS connector: {}", source))]
    BuildTlsConnector {
        /// The underlying error.
        source: TlsError,
    },
    /// The HTTPS connector could not be assembled.
    #[snafu(display("Failed to build HTTPS connector: {}", source))]
    MakeHttpsConnector {
        /// The underlying error.
        source: openssl::error::ErrorStack,
    },
    /// The request failed in transit.
    #[snafu(display("Failed to make HTTP(S) request: {}", source))]
    CallRequest {
        /// The underlying error.
        source: hyper::Error,
    },
}

/// A client for sending HTTP(S) requests to the Kubernetes API server.
///
/// Every instance owns its own hyper connection pool. TCP keepalive is
/// configured on the pool's connector at construction, so all connections the
/// pool ever opens carry the keepalive options; building a second client
/// cannot affect the sockets of the first.
pub struct HttpClient<B = Body> {
    client: Client<HttpsConnector<HttpConnector>, B>,
    user_agent: HeaderValue,
    span: Span,
}

impl<B> HttpClient<B>
where
    B: fmt::Debug + HttpBody + Send + 'static,
    B::Data: Send,
    B::Error: Into<crate::Error>,
{
    /// Builds a client over a keepalive-enabled HTTPS connector.
    pub fn new(
        tls_settings: &TlsSettings,
        keepalive: &TcpKeepaliveConfig,
    ) -> Result<HttpClient<B>, HttpError> {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_keepalive(keepalive.time());
        http.set_keepalive_interval(keepalive.interval());
        http.set_keepalive_retries(keepalive.retries);

        let tls = tls_connector_builder(tls_settings).context(BuildTlsConnectorSnafu)?;
        let mut https = HttpsConnector::with_connector(http, tls).context(MakeHttpsConnectorSnafu)?;

        let settings = tls_settings.clone();
        https.set_callback(move |config, _uri| {
            settings.apply_connect_configuration(config);
            Ok(())
        });

        let client = Client::builder().build(https);

        let user_agent = HeaderValue::from_str(concat!("k8s-client/", env!("CARGO_PKG_VERSION")))
            .expect("Invalid header value for user agent!");

        let span = tracing::info_span!("http");

        Ok(HttpClient {
            client,
            user_agent,
            span,
        })
    }

    /// Sends the request, filling in the default user agent when the caller
    /// didn't set one.
    pub fn send(
        &self,
        mut request: Request<B>,
    ) -> BoxFuture<'static, Result<http::Response<Body>, HttpError>> {
        let _enter = self.span.enter();

        if !request.headers().contains_key(USER_AGENT) {
            request
                .headers_mut()
                .insert(USER_AGENT, self.user_agent.clone());
        }

        debug!(
            message = "Sending HTTP request.",
            uri = %request.uri(),
            method = %request.method(),
        );

        let response = self.client.request(request);

        let fut = async move {
            let response = response.await.context(CallRequestSnafu)?;
            debug!(
                message = "HTTP response.",
                status = %response.status(),
                version = ?response.version(),
            );
            Ok(response)
        }
        .instrument(self.span.clone());

        Box::pin(fut)
    }
}

impl<B> fmt::Debug for HttpClient<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_default_tls() {
        let tls_settings = TlsSettings::from_options(&None).unwrap();
        let client: HttpClient =
            HttpClient::new(&tls_settings, &TcpKeepaliveConfig::KUBE_API_DEFAULTS)
                .expect("Failed to build HTTP client");
        let _ = format!("{:?}", client);
    }

    #[test]
    fn builds_with_verification_disabled() {
        let options = crate::tls::TlsOptions {
            verify_certificate: Some(false),
            ..Default::default()
        };
        let tls_settings = TlsSettings::from_options(&Some(options)).unwrap();
        let client = HttpClient::<Body>::new(&tls_settings, &TcpKeepaliveConfig::KUBE_API_DEFAULTS);
        assert!(client.is_ok());
    }
}
