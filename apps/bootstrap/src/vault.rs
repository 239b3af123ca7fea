use std::sync::Arc;

use convergent_application::{
    BootstrapEventSink, BootstrapOutcome, BootstrapperIdentity, RoleAssignmentRepository,
    RoleAssignmentService, SecretStore, TransientRetry, VaultSecretService,
};
use convergent_core::{AppError, AppResult, SubscriptionId};
use convergent_domain::ensure_trailing_newline;
use convergent_infrastructure::{
    AccessTokenProvider, ClientCertificateTokenProvider, ManagedIdentityTokenProvider, cached,
};
use serde::Serialize;
use uuid::Uuid;

use crate::config::VaultConfig;

/// Built-in "Key Vault Administrator" role definition.
pub(crate) const KEY_VAULT_ADMINISTRATOR_ROLE_DEFINITION_ID: Uuid =
    Uuid::from_u128(0x0048_2a5a_887f_4fb3_b363_3b7f_e8e7_4483);

/// Credentials the pipeline later reads back from the vault.
#[derive(Debug, Serialize)]
pub(crate) struct StoredPipelineConfig {
    auth: StoredAuth,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum StoredAuth {
    #[serde(rename = "sp")]
    ServicePrincipal {
        #[serde(rename = "tenantId")]
        tenant_id: Uuid,
        #[serde(rename = "clientId")]
        client_id: Uuid,
        #[serde(rename = "keyPEM")]
        key_pem: String,
        #[serde(rename = "certPEM")]
        cert_pem: String,
    },
    #[serde(rename = "msi")]
    ManagedIdentity {
        #[serde(rename = "clientId")]
        client_id: Uuid,
        #[serde(rename = "resourceId")]
        resource_id: String,
    },
}

impl StoredPipelineConfig {
    pub(crate) fn service_principal(
        tenant_id: Uuid,
        client_id: Uuid,
        key_pem: &str,
        cert_pem: &str,
    ) -> Self {
        Self {
            auth: StoredAuth::ServicePrincipal {
                tenant_id,
                client_id,
                key_pem: ensure_trailing_newline(key_pem),
                cert_pem: ensure_trailing_newline(cert_pem),
            },
        }
    }

    pub(crate) fn managed_identity(client_id: Uuid, resource_id: &str) -> Self {
        Self {
            auth: StoredAuth::ManagedIdentity {
                client_id,
                resource_id: resource_id.to_owned(),
            },
        }
    }

    pub(crate) fn to_secret_value(&self) -> AppResult<String> {
        serde_json::to_string(self).map_err(|error| {
            AppError::Internal(format!("failed to encode stored pipeline config: {error}"))
        })
    }
}

/// Bootstrapper principal that is granted vault access and then calls the vault.
#[derive(Clone)]
pub(crate) struct VaultCaller {
    principal_id: Uuid,
    credential: CallerCredential,
}

#[derive(Clone)]
enum CallerCredential {
    ClientCertificate {
        tenant_id: Uuid,
        client_id: Uuid,
        certificate_pem: String,
        private_key_pem: String,
    },
    ManagedIdentity {
        client_id: Uuid,
    },
}

impl VaultCaller {
    /// Resolves the converged bootstrapper as vault caller.
    ///
    /// Certificate bootstrappers authenticate with their certificate and need
    /// the private key; managed identities use the metadata endpoint.
    pub(crate) fn for_bootstrapper(
        tenant_id: Uuid,
        bootstrapper: &BootstrapperIdentity,
        outcome: &BootstrapOutcome,
        private_key_pem: Option<&str>,
    ) -> AppResult<Self> {
        let credential = match bootstrapper {
            BootstrapperIdentity::Certificate(certificate) => {
                let Some(private_key_pem) = private_key_pem else {
                    return Err(AppError::Validation(
                        "BOOTSTRAPPER_KEY_PATH is required for vault access as a certificate bootstrapper"
                            .to_owned(),
                    ));
                };
                CallerCredential::ClientCertificate {
                    tenant_id,
                    client_id: outcome.client_id,
                    certificate_pem: certificate.certificate_pem.clone(),
                    private_key_pem: private_key_pem.to_owned(),
                }
            }
            BootstrapperIdentity::ManagedIdentity(_) => CallerCredential::ManagedIdentity {
                client_id: outcome.client_id,
            },
        };

        Ok(Self {
            principal_id: outcome.principal_id,
            credential,
        })
    }

    pub(crate) fn principal_id(&self) -> Uuid {
        self.principal_id
    }

    pub(crate) fn client_id(&self) -> Uuid {
        match &self.credential {
            CallerCredential::ClientCertificate { client_id, .. }
            | CallerCredential::ManagedIdentity { client_id } => *client_id,
        }
    }

    /// Builds tokens issued to this caller, never to the operator.
    pub(crate) fn token_provider(
        &self,
        http_client: reqwest::Client,
        authority_host: &str,
    ) -> AppResult<Arc<dyn AccessTokenProvider>> {
        let inner: Arc<dyn AccessTokenProvider> = match &self.credential {
            CallerCredential::ClientCertificate {
                tenant_id,
                client_id,
                certificate_pem,
                private_key_pem,
            } => Arc::new(ClientCertificateTokenProvider::with_authority(
                http_client,
                authority_host,
                *tenant_id,
                *client_id,
                certificate_pem.as_str(),
                private_key_pem.as_str(),
            )?),
            CallerCredential::ManagedIdentity { client_id } => Arc::new(
                ManagedIdentityTokenProvider::new(http_client, Some(client_id.to_string())),
            ),
        };

        Ok(cached(inner))
    }
}

/// Grants the bootstrapper vault access, then converges the key and secret.
pub(crate) struct VaultBootstrap {
    config: VaultConfig,
    subscription_id: SubscriptionId,
    role_assignments: RoleAssignmentService,
    secrets: VaultSecretService,
    retry: TransientRetry,
}

impl VaultBootstrap {
    pub(crate) fn new(
        config: VaultConfig,
        subscription_id: SubscriptionId,
        role_assignments: Arc<dyn RoleAssignmentRepository>,
        store: Arc<dyn SecretStore>,
        retry: TransientRetry,
        events: Arc<dyn BootstrapEventSink>,
    ) -> Self {
        Self {
            config,
            subscription_id,
            role_assignments: RoleAssignmentService::new(role_assignments, events.clone()),
            secrets: VaultSecretService::new(store, retry.clone(), events),
            retry,
        }
    }

    /// Grants `caller` access, then converges the key and secret through a
    /// store authenticated as that same caller.
    pub(crate) async fn run(
        &self,
        caller: &VaultCaller,
        stored_config: Option<&StoredPipelineConfig>,
    ) -> AppResult<()> {
        let principal_id = caller.principal_id();
        if let Some(resource_id) = self.config.resource_id.as_deref() {
            let role_definition_id = self
                .subscription_id
                .role_definition_id(KEY_VAULT_ADMINISTRATOR_ROLE_DEFINITION_ID);
            self.retry
                .run("grant vault administrator", || {
                    self.role_assignments.upsert(
                        resource_id,
                        role_definition_id.as_str(),
                        principal_id,
                    )
                })
                .await?;
        }

        if let Some(key_name) = self.config.key_name.as_deref() {
            let key = self.secrets.ensure_key(key_name, self.config.key_bits).await?;
            tracing::info!(key_id = %key.value.key_id, "state encryption key ready");
        }

        if let (Some(secret_name), Some(stored_config)) =
            (self.config.secret_name.as_deref(), stored_config)
        {
            let value = stored_config.to_secret_value()?;
            self.secrets.upsert_secret(secret_name, value.as_str()).await?;
        }

        Ok(())
    }
}
