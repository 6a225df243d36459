//! Client-certificate login credentials.
//!
//! The TLS layer has already verified the chain. This module only reads the
//! leaf certificate's subject so the realm can map it to a user.

use rustls_pki_types::CertificateDer;
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::error::Error;

/// Realm name client-certificate logins are performed against.
pub const CERTIFICATE_REALM: &str = "certificate";

/// A verified client chain and the subject of its leaf certificate.
#[derive(Debug, Clone)]
pub struct CertificateCredentials {
    subject: String,
    common_name: Option<String>,
    chain: Vec<CertificateDer<'static>>,
}

impl CertificateCredentials {
    /// Reads the subject of `chain[0]` and keeps an owned copy of the chain.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedCertificate`] for an empty chain or a leaf
    /// that is not a DER-encoded X.509 certificate.
    pub fn from_chain(chain: &[CertificateDer<'_>]) -> Result<Self, Error> {
        let leaf = chain
            .first()
            .ok_or_else(|| Error::MalformedCertificate("empty certificate chain".to_string()))?;
        let (_, parsed) = X509Certificate::from_der(leaf.as_ref())
            .map_err(|e| Error::MalformedCertificate(e.to_string()))?;

        let subject = parsed.subject().to_string();
        let common_name = parsed
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .map(str::to_string);

        Ok(Self {
            subject,
            common_name,
            chain: chain.iter().map(|cert| cert.clone().into_owned()).collect(),
        })
    }

    /// Distinguished name of the leaf certificate's subject.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// First common name in the subject, if any.
    pub fn common_name(&self) -> Option<&str> {
        self.common_name.as_deref()
    }

    /// The chain, leaf first.
    pub fn chain(&self) -> &[CertificateDer<'static>] {
        &self.chain
    }

    pub(crate) fn into_chain(self) -> Vec<CertificateDer<'static>> {
        self.chain
    }
}
