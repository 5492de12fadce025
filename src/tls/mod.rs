//! TLS configuration for Kubernetes API connections.

mod settings;

use openssl::error::ErrorStack;
use openssl::ssl::{SslConnector, SslConnectorBuilder, SslMethod};
use snafu::{ResultExt, Snafu};
use std::path::PathBuf;

pub use settings::{TlsOptions, TlsSettings};

/// Errors raised while loading or applying TLS settings.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TlsError {
    /// A certificate or key file could not be opened.
    #[snafu(display("Could not open {} file {:?}: {}", note, filename, source))]
    FileOpenFailed {
        /// What kind of file was being opened.
        note: &'static str,
        /// The file that failed to open.
        filename: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },
    /// A certificate or key file could not be read.
    #[snafu(display("Could not read {} file {:?}: {}", note, filename, source))]
    FileReadFailed {
        /// What kind of file was being read.
        note: &'static str,
        /// The file that failed to read.
        filename: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },
    /// A PEM certificate failed to parse.
    #[snafu(display("Could not parse certificate in {:?}: {}", filename, source))]
    CertificateParseError {
        /// The file the certificate came from.
        filename: PathBuf,
        /// The underlying error.
        source: ErrorStack,
    },
    /// A PEM private key failed to parse.
    #[snafu(display("Could not parse private key in {:?}: {}", filename, source))]
    PrivateKeyParseError {
        /// The file the key came from.
        filename: PathBuf,
        /// The underlying error.
        source: ErrorStack,
    },
    /// A client key was given without the matching certificate.
    #[snafu(display("Must specify both TLS key_file and crt_file"))]
    MissingCrtKeyFile,
    /// A client certificate was given without the matching key.
    #[snafu(display("Must specify the TLS key_file alongside crt_file"))]
    MissingKey,
    /// The openssl connector builder could not be created.
    #[snafu(display("Could not create the TLS connector builder: {}", source))]
    CreateBuilder {
        /// The underlying error.
        source: ErrorStack,
    },
    /// The certificate store builder could not be created.
    #[snafu(display("Could not create the certificate store: {}", source))]
    NewStoreBuilder {
        /// The underlying error.
        source: ErrorStack,
    },
    /// A CA certificate could not be added to the store.
    #[snafu(display("Could not add the certificate to the store: {}", source))]
    AddCertToStore {
        /// The underlying error.
        source: ErrorStack,
    },
    /// The verification store could not be installed into the context.
    #[snafu(display("Could not set the certificate verification store: {}", source))]
    SetVerifyCert {
        /// The underlying error.
        source: ErrorStack,
    },
    /// The client certificate could not be installed into the context.
    #[snafu(display("Could not set the TLS client certificate: {}", source))]
    SetCertificate {
        /// The underlying error.
        source: ErrorStack,
    },
    /// The client private key could not be installed into the context.
    #[snafu(display("Could not set the TLS client private key: {}", source))]
    SetPrivateKey {
        /// The underlying error.
        source: ErrorStack,
    },
}

/// Result alias for TLS operations.
pub type Result<T> = std::result::Result<T, TlsError>;

/// Builds an openssl connector builder with the given settings applied.
pub fn tls_connector_builder(settings: &TlsSettings) -> Result<SslConnectorBuilder> {
    let mut builder = SslConnector::builder(SslMethod::tls()).context(CreateBuilderSnafu)?;
    settings.apply_context(&mut builder)?;
    Ok(builder)
}
