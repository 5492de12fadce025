use std::fmt::{self, Debug, Formatter};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use openssl::pkey::{PKey, Private};
use openssl::ssl::{ConnectConfiguration, SslContextBuilder, SslVerifyMode};
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::X509;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use super::{
    AddCertToStoreSnafu, CertificateParseSnafu, FileOpenFailedSnafu, FileReadFailedSnafu,
    NewStoreBuilderSnafu, PrivateKeyParseSnafu, Result, SetCertificateSnafu, SetPrivateKeySnafu,
    SetVerifyCertSnafu, TlsError,
};

const PEM_START_MARKER: &str = "-----BEGIN ";

/// Standard TLS options for an API server connection.
///
/// The `*_file` fields name files on disk, but a value whose contents carry a
/// PEM start marker is used directly as inline PEM text. Kubeconfig
/// `*-data` fields are routed through this inline form.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TlsOptions {
    /// Whether to verify the peer certificate chain. Defaults to `true`.
    pub verify_certificate: Option<bool>,
    /// Whether to verify that the peer certificate matches the hostname.
    /// Defaults to `true`.
    pub verify_hostname: Option<bool>,
    /// Certificate authority used to verify the API server.
    #[serde(alias = "ca_path")]
    pub ca_file: Option<PathBuf>,
    /// Client certificate presented to the API server.
    #[serde(alias = "crt_path")]
    pub crt_file: Option<PathBuf>,
    /// Private key matching `crt_file`.
    #[serde(alias = "key_path")]
    pub key_file: Option<PathBuf>,
    /// Passphrase protecting `key_file`, if any.
    pub key_pass: Option<String>,
}

/// Directly usable settings for TLS connectors.
#[derive(Clone, Default)]
pub struct TlsSettings {
    verify_certificate: bool,
    verify_hostname: bool,
    authorities: Vec<X509>,
    identity: Option<TlsIdentity>,
}

#[derive(Clone)]
struct TlsIdentity {
    crt: X509,
    key: PKey<Private>,
}

impl TlsSettings {
    /// Generate a filled out settings struct from the given optional option
    /// set, interpreted as client options. If `options` is `None`, the result
    /// is set to defaults (system roots, verification enabled).
    pub fn from_options(options: &Option<TlsOptions>) -> Result<Self> {
        let default = TlsOptions::default();
        let options = options.as_ref().unwrap_or(&default);

        if options.verify_certificate == Some(false) {
            warn!("`verify_certificate` is DISABLED, this may lead to security vulnerabilities");
        }
        if options.verify_hostname == Some(false) {
            warn!("`verify_hostname` is DISABLED, this may lead to security vulnerabilities");
        }

        Ok(Self {
            verify_certificate: options.verify_certificate.unwrap_or(true),
            verify_hostname: options.verify_hostname.unwrap_or(true),
            authorities: options.load_authorities()?,
            identity: options.load_identity()?,
        })
    }

    /// Whether peer certificate verification is enabled.
    pub fn verify_certificate(&self) -> bool {
        self.verify_certificate
    }

    /// Whether hostname verification is enabled.
    pub fn verify_hostname(&self) -> bool {
        self.verify_hostname
    }

    pub(crate) fn apply_context(&self, context: &mut SslContextBuilder) -> Result<()> {
        context.set_verify(if self.verify_certificate {
            SslVerifyMode::PEER | SslVerifyMode::FAIL_IF_NO_PEER_CERT
        } else {
            SslVerifyMode::NONE
        });

        if let Some(identity) = &self.identity {
            context
                .set_certificate(&identity.crt)
                .context(SetCertificateSnafu)?;
            context
                .set_private_key(&identity.key)
                .context(SetPrivateKeySnafu)?;
        }

        if self.authorities.is_empty() {
            debug!("Using system root certificates.");
        } else {
            let mut store = X509StoreBuilder::new().context(NewStoreBuilderSnafu)?;
            for authority in &self.authorities {
                store
                    .add_cert(authority.clone())
                    .context(AddCertToStoreSnafu)?;
            }
            context
                .set_verify_cert_store(store.build())
                .context(SetVerifyCertSnafu)?;
        }

        Ok(())
    }

    pub(crate) fn apply_connect_configuration(&self, connection: &mut ConnectConfiguration) {
        connection.set_verify_hostname(self.verify_hostname);
    }
}

impl TlsOptions {
    fn load_authorities(&self) -> Result<Vec<X509>> {
        match &self.ca_file {
            None => Ok(vec![]),
            Some(filename) => {
                let (data, filename) = open_read(filename, "certificate")?;
                X509::stack_from_pem(&data).with_context(|_| CertificateParseSnafu { filename })
            }
        }
    }

    fn load_identity(&self) -> Result<Option<TlsIdentity>> {
        match (&self.crt_file, &self.key_file) {
            (None, None) => Ok(None),
            (None, Some(_)) => Err(TlsError::MissingCrtKeyFile),
            (Some(_), None) => Err(TlsError::MissingKey),
            (Some(crt_file), Some(key_file)) => {
                let (crt_data, crt_filename) = open_read(crt_file, "certificate")?;
                let crt = X509::from_pem(&crt_data).with_context(|_| CertificateParseSnafu {
                    filename: crt_filename,
                })?;

                let (key_data, key_filename) = open_read(key_file, "key")?;
                let key = match &self.key_pass {
                    None => PKey::private_key_from_pem(&key_data),
                    Some(phrase) => {
                        PKey::private_key_from_pem_passphrase(&key_data, phrase.as_bytes())
                    }
                }
                .with_context(|_| PrivateKeyParseSnafu {
                    filename: key_filename,
                })?;

                Ok(Some(TlsIdentity { crt, key }))
            }
        }
    }
}

/// Open the named file and read its entire contents into memory. If the file
/// "name" contains a PEM start marker, it is assumed to contain inline data
/// and is used directly instead of opening a file.
fn open_read(filename: &Path, note: &'static str) -> Result<(Vec<u8>, PathBuf)> {
    if let Some(filename) = filename.to_str() {
        if filename.contains(PEM_START_MARKER) {
            return Ok((Vec::from(filename), "inline text".into()));
        }
    }

    let mut text = Vec::<u8>::new();

    File::open(filename)
        .with_context(|_| FileOpenFailedSnafu { note, filename })?
        .read_to_end(&mut text)
        .with_context(|_| FileReadFailedSnafu { note, filename })?;

    Ok((text, filename.into()))
}

impl Debug for TlsSettings {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("TlsSettings")
            .field("verify_certificate", &self.verify_certificate)
            .field("verify_hostname", &self.verify_hostname)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use openssl::asn1::Asn1Time;
    use openssl::bn::BigNum;
    use openssl::hash::MessageDigest;
    use openssl::rsa::Rsa;
    use openssl::x509::X509NameBuilder;

    use super::*;

    fn test_identity() -> (String, String) {
        let rsa = Rsa::generate(2048).unwrap();
        let key = PKey::from_rsa(rsa).unwrap();

        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_text("CN", "localhost").unwrap();
        let name = name.build();

        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
        builder.set_serial_number(&serial).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(&key).unwrap();
        builder
            .set_not_before(&Asn1Time::days_from_now(0).unwrap())
            .unwrap();
        builder
            .set_not_after(&Asn1Time::days_from_now(365).unwrap())
            .unwrap();
        builder.sign(&key, MessageDigest::sha256()).unwrap();
        let crt = builder.build();

        (
            String::from_utf8(crt.to_pem().unwrap()).unwrap(),
            String::from_utf8(key.private_key_to_pem_pkcs8().unwrap()).unwrap(),
        )
    }

    #[test]
    fn from_options_none() {
        let settings = TlsSettings::from_options(&None).expect("Failed to generate null settings");
        assert!(settings.verify_certificate());
        assert!(settings.verify_hostname());
        assert!(settings.identity.is_none());
        assert_eq!(settings.authorities.len(), 0);
    }

    #[test]
    fn from_options_verification_disabled() {
        let options = TlsOptions {
            verify_certificate: Some(false),
            ..Default::default()
        };
        let settings = TlsSettings::from_options(&Some(options)).unwrap();
        assert!(!settings.verify_certificate());
        assert!(settings.verify_hostname());
    }

    #[test]
    fn from_options_inline_ca() {
        let (ca, _) = test_identity();
        let options = TlsOptions {
            ca_file: Some(ca.into()),
            ..Default::default()
        };
        let settings = TlsSettings::from_options(&Some(options))
            .expect("Failed to load authority certificate");
        assert!(settings.identity.is_none());
        assert_eq!(settings.authorities.len(), 1);
    }

    #[test]
    fn from_options_inline_identity() {
        let (crt, key) = test_identity();
        let options = TlsOptions {
            crt_file: Some(crt.into()),
            key_file: Some(key.into()),
            ..Default::default()
        };
        let settings =
            TlsSettings::from_options(&Some(options)).expect("Failed to load PEM identity");
        assert!(settings.identity.is_some());
        assert_eq!(settings.authorities.len(), 0);
    }

    #[test]
    fn from_options_key_without_certificate() {
        let (_, key) = test_identity();
        let options = TlsOptions {
            key_file: Some(key.into()),
            ..Default::default()
        };
        let error = TlsSettings::from_options(&Some(options))
            .expect_err("from_options failed to check certificate");
        assert!(matches!(error, TlsError::MissingCrtKeyFile));
    }

    #[test]
    fn from_options_certificate_without_key() {
        let (crt, _) = test_identity();
        let options = TlsOptions {
            crt_file: Some(crt.into()),
            ..Default::default()
        };
        let error = TlsSettings::from_options(&Some(options))
            .expect_err("from_options failed to check key");
        assert!(matches!(error, TlsError::MissingKey));
    }

    #[test]
    fn connector_builder_with_verification_disabled() {
        let options = TlsOptions {
            verify_certificate: Some(false),
            ..Default::default()
        };
        let settings = TlsSettings::from_options(&Some(options)).unwrap();
        let builder = super::super::tls_connector_builder(&settings)
            .expect("Failed to build TLS connector");
        assert_eq!(builder.verify_mode(), SslVerifyMode::NONE);
    }
}
