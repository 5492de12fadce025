//! Kubernetes API client bootstrap.
//!
//! This crate prepares connections to the Kubernetes API server: it selects
//! between in-cluster and kubeconfig-file authentication, applies the TLS
//! certificate verification policy from the ambient `[kubernetes]` settings,
//! and enables TCP keepalive on the HTTP(S) connection pools used by the
//! clients it builds.
//!
//! The usual entry point is [`get_kube_client`]:
//!
//! ```no_run
//! # fn main() -> Result<(), k8s_client::Error> {
//! let settings = k8s_client::Settings::default().kubernetes;
//! let client = k8s_client::get_kube_client(settings.in_cluster, &settings)?;
//! # drop(client);
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate tracing;

pub mod client;
pub mod http;
pub mod settings;
pub mod tcp;
pub mod tls;

pub use client::{config::Config, get_kube_client, Client};
pub use settings::{KubernetesSettings, Settings};

/// Generic catch-all error type.
pub type Error = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type with the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
