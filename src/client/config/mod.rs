//! Client configuration.
//!
//! [`Config::load`] is the policy entry point: it routes to exactly one of
//! the two loaders (the in-cluster environment or a kubeconfig file) and
//! applies the ambient TLS verification setting to whatever came back.

pub mod in_cluster;
pub mod kubeconfig;

use http::Uri;

use crate::settings::KubernetesSettings;
use crate::tls::TlsOptions;

/// Configuration required to connect to the Kubernetes API server.
///
/// Built once and passed by reference into client construction. Nothing here
/// is process-global; concurrent loads each get their own value and cannot
/// observe each other's mutations.
#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL of the API server.
    pub base: Uri,
    /// Bearer token presented on every request, if any.
    pub token: Option<String>,
    /// TLS options applied to the connection pool.
    pub tls_options: TlsOptions,
    /// Namespace used when the caller doesn't name one.
    pub default_namespace: String,
}

impl Config {
    /// Loads the configuration for in-cluster or out-of-cluster access.
    ///
    /// Exactly one loader runs: [`Config::in_cluster`] when `in_cluster` is
    /// true, [`Config::from_kubeconfig`] otherwise. Loader errors propagate
    /// unchanged; there is no fallback from one loader to the other.
    pub fn load(in_cluster: bool, settings: &KubernetesSettings) -> crate::Result<Self> {
        let mut config = if in_cluster {
            debug!("Loading in-cluster Kubernetes configuration.");
            Self::in_cluster()?
        } else {
            debug!("Loading Kubernetes configuration from kubeconfig file.");
            Self::from_kubeconfig(
                settings.config_file.as_deref(),
                settings.cluster_context.as_deref(),
            )?
        };

        if !settings.verify_ssl {
            config.disable_tls_verification();
        }

        Ok(config)
    }

    /// Disables TLS certificate verification for clients built from this
    /// config. Only the certificate check is affected; every other option
    /// keeps its value.
    pub fn disable_tls_verification(&mut self) {
        warn!(
            message = "TLS certificate verification is disabled for the Kubernetes API client."
        );
        self.tls_options.verify_certificate = Some(false);
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use indoc::indoc;

    use super::*;

    const KUBECONFIG: &str = indoc! {r#"
        apiVersion: v1
        kind: Config
        current-context: test
        clusters:
        - name: test
          cluster:
            server: https://10.0.0.1:6443
        contexts:
        - name: test
          context:
            cluster: test
            user: test
        users:
        - name: test
          user:
            token: sekret
    "#};

    fn settings_for(file: &std::path::Path) -> KubernetesSettings {
        KubernetesSettings {
            config_file: Some(file.to_owned()),
            ..Default::default()
        }
    }

    fn write_kubeconfig() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(KUBECONFIG.as_bytes()).unwrap();
        file
    }

    #[test]
    fn load_routes_to_kubeconfig() {
        let file = write_kubeconfig();
        let config = Config::load(false, &settings_for(file.path())).unwrap();
        assert_eq!(
            config.base.authority().map(|authority| authority.as_str()),
            Some("10.0.0.1:6443")
        );
        assert_eq!(config.token.as_deref(), Some("sekret"));
    }

    #[test]
    fn load_routes_to_in_cluster() {
        std::env::remove_var("KUBERNETES_SERVICE_HOST");
        std::env::remove_var("KUBERNETES_SERVICE_PORT");

        // A kubeconfig is on disk, but with `in_cluster` requested the file
        // loader must not run; outside a pod that means a NotInCluster error.
        let file = write_kubeconfig();
        let error = Config::load(true, &settings_for(file.path()))
            .expect_err("in-cluster load must fail outside a pod");
        assert!(error
            .downcast_ref::<in_cluster::Error>()
            .map(|error| matches!(error, in_cluster::Error::NotInCluster { .. }))
            .unwrap_or(false));
    }

    #[test]
    fn verify_ssl_disabled_flows_into_tls_options() {
        let file = write_kubeconfig();
        let settings = KubernetesSettings {
            verify_ssl: false,
            ..settings_for(file.path())
        };
        let config = Config::load(false, &settings).unwrap();
        assert_eq!(config.tls_options.verify_certificate, Some(false));
    }

    #[test]
    fn verify_ssl_enabled_leaves_tls_options_alone() {
        let file = write_kubeconfig();
        let config = Config::load(false, &settings_for(file.path())).unwrap();
        assert_eq!(config.tls_options.verify_certificate, None);
    }

    #[test]
    fn disable_tls_verification_flips_only_the_certificate_check() {
        let file = write_kubeconfig();
        let mut config = Config::load(false, &settings_for(file.path())).unwrap();
        let before = config.clone();

        config.disable_tls_verification();

        assert_eq!(config.tls_options.verify_certificate, Some(false));
        assert_eq!(config.tls_options.verify_hostname, before.tls_options.verify_hostname);
        assert_eq!(config.tls_options.ca_file, before.tls_options.ca_file);
        assert_eq!(config.tls_options.crt_file, before.tls_options.crt_file);
        assert_eq!(config.tls_options.key_file, before.tls_options.key_file);
        assert_eq!(config.tls_options.key_pass, before.tls_options.key_pass);
        assert_eq!(config.base, before.base);
        assert_eq!(config.token, before.token);
        assert_eq!(config.default_namespace, before.default_namespace);
    }
}
