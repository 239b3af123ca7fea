use std::fmt::{Display, Formatter};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use convergent_core::{AppError, AppResult};
use sha1::{Digest, Sha1};

const BEGIN_CERTIFICATE: &str = "-----BEGIN CERTIFICATE-----";
const END_CERTIFICATE: &str = "-----END CERTIFICATE-----";

/// SHA-1 digest of a certificate's DER bytes, the directory's content identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Thumbprint([u8; 20]);

impl Thumbprint {
    /// Computes the thumbprint of DER-encoded certificate bytes.
    #[must_use]
    pub fn of(der: &[u8]) -> Self {
        Self(Sha1::digest(der).into())
    }

    /// Returns the raw digest.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the uppercase hex digest.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }
}

impl Display for Thumbprint {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.to_hex().as_str())
    }
}

/// First certificate of a PEM document, decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificatePem {
    der: Vec<u8>,
    thumbprint: Thumbprint,
}

impl CertificatePem {
    /// Extracts and decodes the first certificate block of a PEM document.
    pub fn parse(pem: &str) -> AppResult<Self> {
        let Some(begin) = pem.find(BEGIN_CERTIFICATE) else {
            return Err(missing_markers());
        };
        let body_start = begin + BEGIN_CERTIFICATE.len();
        let Some(body_len) = pem[body_start..].find(END_CERTIFICATE) else {
            return Err(missing_markers());
        };

        let body: String = pem[body_start..body_start + body_len]
            .chars()
            .filter(|character| !character.is_ascii_whitespace())
            .collect();
        if body.is_empty() {
            return Err(AppError::MalformedInput(
                "certificate PEM block is empty".to_owned(),
            ));
        }

        let der = STANDARD.decode(body.as_bytes()).map_err(|error| {
            AppError::MalformedInput(format!("certificate PEM body is not valid base64: {error}"))
        })?;
        let thumbprint = Thumbprint::of(der.as_slice());

        Ok(Self { der, thumbprint })
    }

    /// Returns the DER bytes of the certificate.
    #[must_use]
    pub fn der(&self) -> &[u8] {
        self.der.as_slice()
    }

    /// Returns the certificate thumbprint.
    #[must_use]
    pub fn thumbprint(&self) -> &Thumbprint {
        &self.thumbprint
    }
}

fn missing_markers() -> AppError {
    AppError::MalformedInput(
        "invalid certificate PEM contents, make sure BEGIN CERTIFICATE and END CERTIFICATE markers are present"
            .to_owned(),
    )
}

/// Appends a trailing newline when a PEM document lacks one.
#[must_use]
pub fn ensure_trailing_newline(pem: &str) -> String {
    if pem.ends_with('\n') {
        pem.to_owned()
    } else {
        format!("{pem}\n")
    }
}
