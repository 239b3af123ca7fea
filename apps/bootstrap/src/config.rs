use std::env;
use std::path::PathBuf;
use std::time::Duration;

use convergent_application::{
    BootstrapSettings, BootstrapperKind, ManagedIdentityBootstrapper, OWNER_ROLE_DEFINITION_ID,
    PluginSpec, RetryPolicy,
};
use convergent_core::{AppError, AppResult, CredentialSource, NonEmptyString, SubscriptionId};
use convergent_domain::RequiredResourceAccess;
use convergent_infrastructure::{
    DEFAULT_ARM_BASE_URL, DEFAULT_AUTHORITY_HOST, DEFAULT_GRAPH_BASE_URL, DEFAULT_PLUGIN_PROGRAM,
};
use uuid::Uuid;

/// Bootstrapper as configured, before the certificate file is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BootstrapperSource {
    Certificate {
        display_name: NonEmptyString,
        certificate_path: PathBuf,
        private_key_path: Option<PathBuf>,
        required_resource_access: Vec<RequiredResourceAccess>,
    },
    ManagedIdentity(ManagedIdentityBootstrapper),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct VaultConfig {
    pub(crate) url: String,
    pub(crate) resource_id: Option<String>,
    pub(crate) secret_name: Option<String>,
    pub(crate) key_name: Option<String>,
    pub(crate) key_bits: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct BootstrapConfig {
    pub(crate) tenant_id: Uuid,
    pub(crate) subscription_id: SubscriptionId,
    pub(crate) credential_source: CredentialSource,
    pub(crate) bootstrapper: BootstrapperSource,
    pub(crate) role_definition_id: Uuid,
    pub(crate) credential_wait: Duration,
    pub(crate) permission_wait: Duration,
    pub(crate) retry_policy: RetryPolicy,
    pub(crate) graph_base_url: String,
    pub(crate) arm_base_url: String,
    pub(crate) authority_host: String,
    pub(crate) vault: Option<VaultConfig>,
    pub(crate) plugins: Vec<PluginSpec>,
    pub(crate) plugin_program: String,
    pub(crate) dry_run: bool,
}

impl BootstrapConfig {
    pub(crate) fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let vars = EnvReader { lookup };

        let tenant_id = vars.required_uuid("AZURE_TENANT_ID")?;
        let subscription_id = SubscriptionId::parse(vars.required("AZURE_SUBSCRIPTION_ID")?.as_str())?;
        let credential_source = credential_source(&vars, tenant_id)?;
        let bootstrapper = bootstrapper_source(&vars)?;
        let role_definition_id = vars
            .optional_uuid("BOOTSTRAPPER_ROLE_DEFINITION_ID")?
            .unwrap_or(OWNER_ROLE_DEFINITION_ID);

        let credential_wait =
            Duration::from_secs(vars.parse_or("BOOTSTRAP_CREDENTIAL_WAIT_SECONDS", 120_u64)?);
        let permission_wait =
            Duration::from_secs(vars.parse_or("BOOTSTRAP_PERMISSION_WAIT_SECONDS", 60_u64)?);
        let retry_interval = vars.parse_or("BOOTSTRAP_TRANSIENT_RETRY_SECONDS", 10_u64)?;
        let retry_attempts = vars.parse_or("BOOTSTRAP_TRANSIENT_RETRY_MAX_ATTEMPTS", 360_u32)?;
        if retry_interval == 0 {
            return Err(AppError::Validation(
                "BOOTSTRAP_TRANSIENT_RETRY_SECONDS must be greater than zero".to_owned(),
            ));
        }
        let retry_policy = RetryPolicy::new(Duration::from_secs(retry_interval), retry_attempts)
            .map_err(|_| {
                AppError::Validation(
                    "BOOTSTRAP_TRANSIENT_RETRY_MAX_ATTEMPTS must be greater than zero".to_owned(),
                )
            })?;

        let graph_base_url = vars
            .optional("GRAPH_BASE_URL")
            .unwrap_or_else(|| DEFAULT_GRAPH_BASE_URL.to_owned());
        let arm_base_url = vars
            .optional("ARM_BASE_URL")
            .unwrap_or_else(|| DEFAULT_ARM_BASE_URL.to_owned());
        let authority_host = vars
            .optional("AZURE_AUTHORITY_HOST")
            .unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_owned());

        let vault = vault_config(&vars)?;
        if let (Some(_), BootstrapperSource::Certificate { private_key_path, .. }) =
            (vault.as_ref(), &bootstrapper)
            && private_key_path.is_none()
        {
            return Err(AppError::Validation(
                "BOOTSTRAPPER_KEY_PATH is required for vault access as a certificate bootstrapper"
                    .to_owned(),
            ));
        }

        let plugins = vars
            .optional("BOOTSTRAP_PLUGINS")
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(PluginSpec::parse)
                    .collect::<AppResult<Vec<_>>>()
            })
            .transpose()?
            .unwrap_or_default();
        let plugin_program = vars
            .optional("BOOTSTRAP_PLUGIN_PROGRAM")
            .unwrap_or_else(|| DEFAULT_PLUGIN_PROGRAM.to_owned());
        let dry_run = vars.parse_or("BOOTSTRAP_DRY_RUN", false)?;

        Ok(Self {
            tenant_id,
            subscription_id,
            credential_source,
            bootstrapper,
            role_definition_id,
            credential_wait,
            permission_wait,
            retry_policy,
            graph_base_url,
            arm_base_url,
            authority_host,
            vault,
            plugins,
            plugin_program,
            dry_run,
        })
    }

    /// Dry runs keep every wait at zero since nothing propagates in memory.
    pub(crate) fn bootstrap_settings(&self) -> BootstrapSettings {
        let mut settings = BootstrapSettings::new(self.subscription_id);
        settings.role_definition_id = self.role_definition_id;
        settings.retry_policy = self.retry_policy;
        if self.dry_run {
            settings.credential_wait = Duration::ZERO;
            settings.permission_wait = Duration::ZERO;
        } else {
            settings.credential_wait = self.credential_wait;
            settings.permission_wait = self.permission_wait;
        }
        settings
    }
}

fn credential_source<F>(vars: &EnvReader<F>, tenant_id: Uuid) -> AppResult<CredentialSource>
where
    F: Fn(&str) -> Option<String>,
{
    let source = vars
        .optional("BOOTSTRAP_CREDENTIAL_SOURCE")
        .unwrap_or_else(|| "azure_cli".to_owned());

    match source.as_str() {
        "azure_cli" => Ok(CredentialSource::AzureCli {
            tenant_id: Some(tenant_id.to_string()),
        }),
        "managed_identity" => Ok(CredentialSource::ManagedIdentity {
            client_id: vars.optional("BOOTSTRAP_MSI_CLIENT_ID"),
        }),
        "static" => Ok(CredentialSource::StaticToken {
            token: vars.required("BOOTSTRAP_STATIC_TOKEN")?,
        }),
        other => Err(AppError::Validation(format!(
            "BOOTSTRAP_CREDENTIAL_SOURCE must be azure_cli, managed_identity or static, got '{other}'"
        ))),
    }
}

fn bootstrapper_source<F>(vars: &EnvReader<F>) -> AppResult<BootstrapperSource>
where
    F: Fn(&str) -> Option<String>,
{
    let kind: BootstrapperKind = vars.required("BOOTSTRAPPER_KIND")?.parse()?;

    match kind {
        BootstrapperKind::Certificate => {
            let display_name = NonEmptyString::new(vars.required("BOOTSTRAPPER_DISPLAY_NAME")?)?;
            let certificate_path = PathBuf::from(vars.required("BOOTSTRAPPER_CERT_PATH")?);
            let private_key_path = vars.optional("BOOTSTRAPPER_KEY_PATH").map(PathBuf::from);
            let required_resource_access = vars
                .optional("BOOTSTRAPPER_REQUIRED_PERMISSIONS")
                .map(|value| {
                    serde_json::from_str::<Vec<RequiredResourceAccess>>(value.as_str()).map_err(
                        |error| {
                            AppError::Validation(format!(
                                "invalid BOOTSTRAPPER_REQUIRED_PERMISSIONS: {error}"
                            ))
                        },
                    )
                })
                .transpose()?
                .unwrap_or_default();

            Ok(BootstrapperSource::Certificate {
                display_name,
                certificate_path,
                private_key_path,
                required_resource_access,
            })
        }
        BootstrapperKind::ManagedIdentity => Ok(BootstrapperSource::ManagedIdentity(
            ManagedIdentityBootstrapper {
                client_id: vars.required_uuid("BOOTSTRAPPER_CLIENT_ID")?,
                principal_id: vars.required_uuid("BOOTSTRAPPER_PRINCIPAL_ID")?,
                resource_id: vars.required("BOOTSTRAPPER_RESOURCE_ID")?,
            },
        )),
    }
}

fn vault_config<F>(vars: &EnvReader<F>) -> AppResult<Option<VaultConfig>>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(url) = vars.optional("BOOTSTRAP_VAULT_URL") else {
        return Ok(None);
    };

    let key_bits = vars.parse_or("BOOTSTRAP_VAULT_KEY_BITS", 4096_u32)?;
    if !matches!(key_bits, 2048 | 3072 | 4096) {
        return Err(AppError::Validation(format!(
            "BOOTSTRAP_VAULT_KEY_BITS must be 2048, 3072 or 4096, got {key_bits}"
        )));
    }

    Ok(Some(VaultConfig {
        url: url.trim_end_matches('/').to_owned(),
        resource_id: vars.optional("BOOTSTRAP_VAULT_RESOURCE_ID"),
        secret_name: vars.optional("BOOTSTRAP_VAULT_SECRET_NAME"),
        key_name: vars.optional("BOOTSTRAP_VAULT_KEY_NAME"),
        key_bits,
    }))
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, name: &str) -> AppResult<String> {
        self.optional(name)
            .ok_or_else(|| AppError::Validation(format!("{name} is required")))
    }

    fn required_uuid(&self, name: &str) -> AppResult<Uuid> {
        let value = self.required(name)?;
        parse_uuid(name, value.as_str())
    }

    fn optional_uuid(&self, name: &str) -> AppResult<Option<Uuid>> {
        self.optional(name)
            .map(|value| parse_uuid(name, value.as_str()))
            .transpose()
    }

    fn parse_or<T>(&self, name: &str, default: T) -> AppResult<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(name) {
            Some(value) => value.parse::<T>().map_err(|error| {
                AppError::Validation(format!("invalid {name} value '{value}': {error}"))
            }),
            None => Ok(default),
        }
    }
}

fn parse_uuid(name: &str, value: &str) -> AppResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|error| AppError::Validation(format!("invalid {name} value '{value}': {error}")))
}
