use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::certificate::{CertificatePem, Thumbprint};
use crate::permission::RequiredResourceAccess;

/// Credential type of a key credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCredentialType {
    /// X.509 certificate holding only the public key.
    AsymmetricX509Cert,
    /// Password protected X.509 certificate.
    X509CertAndPassword,
}

/// Usage of a key credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCredentialUsage {
    /// Used to verify client assertions.
    Verify,
    /// Used to sign tokens.
    Sign,
}

/// Certificate-backed authentication credential of an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyCredential {
    key_id: Uuid,
    custom_key_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    start_date_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    end_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    key: Option<String>,
    #[serde(rename = "type")]
    credential_type: KeyCredentialType,
    usage: KeyCredentialUsage,
}

impl KeyCredential {
    /// Builds a verify-only credential for a certificate under a fresh random key id.
    #[must_use]
    pub fn for_certificate(certificate: &CertificatePem) -> Self {
        Self {
            key_id: Uuid::new_v4(),
            custom_key_identifier: Some(certificate.thumbprint().to_hex()),
            display_name: None,
            start_date_time: None,
            end_date_time: None,
            key: Some(STANDARD.encode(certificate.der())),
            credential_type: KeyCredentialType::AsymmetricX509Cert,
            usage: KeyCredentialUsage::Verify,
        }
    }

    /// Returns the opaque credential id.
    #[must_use]
    pub fn key_id(&self) -> Uuid {
        self.key_id
    }

    /// Returns the content identity of the credential, when known.
    #[must_use]
    pub fn custom_key_identifier(&self) -> Option<&str> {
        self.custom_key_identifier.as_deref()
    }

    /// Returns the credential display name.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Returns the end of the validity window.
    #[must_use]
    pub fn end_date_time(&self) -> Option<DateTime<Utc>> {
        self.end_date_time
    }

    /// Returns the credential type.
    #[must_use]
    pub fn credential_type(&self) -> KeyCredentialType {
        self.credential_type
    }

    /// Returns the credential usage.
    #[must_use]
    pub fn usage(&self) -> KeyCredentialUsage {
        self.usage
    }

    /// Returns whether the credential was registered for the given certificate.
    ///
    /// The directory echoes identifiers either as the hex thumbprint they were
    /// written with or as base64 of the raw digest, so both forms are accepted.
    #[must_use]
    pub fn matches_thumbprint(&self, thumbprint: &Thumbprint) -> bool {
        let Some(identifier) = self.custom_key_identifier.as_deref() else {
            return false;
        };

        if identifier.eq_ignore_ascii_case(thumbprint.to_hex().as_str()) {
            return true;
        }

        STANDARD
            .decode(identifier)
            .map(|bytes| bytes.as_slice() == thumbprint.as_bytes())
            .unwrap_or(false)
    }
}

/// Directory-registered identity definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    id: Uuid,
    app_id: Uuid,
    display_name: String,
    #[serde(default)]
    key_credentials: Vec<KeyCredential>,
    #[serde(default)]
    required_resource_access: Vec<RequiredResourceAccess>,
}

impl Application {
    /// Creates an application snapshot.
    #[must_use]
    pub fn new(
        id: Uuid,
        app_id: Uuid,
        display_name: impl Into<String>,
        key_credentials: Vec<KeyCredential>,
        required_resource_access: Vec<RequiredResourceAccess>,
    ) -> Self {
        Self {
            id,
            app_id,
            display_name: display_name.into(),
            key_credentials,
            required_resource_access,
        }
    }

    /// Returns the directory object id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the client id.
    #[must_use]
    pub fn app_id(&self) -> Uuid {
        self.app_id
    }

    /// Returns the display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_str()
    }

    /// Returns registered key credentials in directory order.
    #[must_use]
    pub fn key_credentials(&self) -> &[KeyCredential] {
        self.key_credentials.as_slice()
    }

    /// Returns the declared required permissions.
    #[must_use]
    pub fn required_resource_access(&self) -> &[RequiredResourceAccess] {
        self.required_resource_access.as_slice()
    }

    /// Finds the credential registered for a certificate thumbprint.
    #[must_use]
    pub fn find_key_credential(&self, thumbprint: &Thumbprint) -> Option<&KeyCredential> {
        self.key_credentials
            .iter()
            .find(|credential| credential.matches_thumbprint(thumbprint))
    }

    /// Returns the credential list with one credential appended.
    #[must_use]
    pub fn key_credentials_with(&self, credential: KeyCredential) -> Vec<KeyCredential> {
        let mut credentials = self.key_credentials.clone();
        credentials.push(credential);
        credentials
    }
}
