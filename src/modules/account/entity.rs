// Copyright © 2025 mailblast.dev
// Licensed under MailBlast License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::LazyLock;

use dashmap::DashMap;
use poem_openapi::{Enum, Object, Union};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::modules::account::payload::AccountCreateRequest;
use crate::modules::error::code::ErrorCode;
use crate::modules::error::MailBlastResult;
use crate::{id, raise_error, utc_now, validate_email};

/// In-memory registry of sending accounts.
///
/// Account records are owned by the account-management collaborator; the
/// dispatch engine only ever reads them. Persistence is that collaborator's
/// concern, not ours.
static ACCOUNTS: LazyLock<DashMap<u64, SendingAccount>> = LazyLock::new(DashMap::new);

/// A credentialed outbound channel (SMTP login, webhook endpoint, or MTA API)
/// usable to dispatch email.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize, Object)]
pub struct SendingAccount {
    /// Unique account identifier
    pub id: u64,
    /// Short operator-facing label (e.g., "gmail-pool-3")
    pub label: String,
    /// Email address this account sends as
    pub email: String,
    /// Provider transport and its configuration
    pub provider: ProviderConfig,
    /// Per-account sending limits
    pub limits: RateLimitConfig,
    /// Inactive accounts are skipped by the preparer's rotation
    pub enabled: bool,
    /// Timestamp (Unix epoch milliseconds) when the account was created.
    pub created_at: i64,
}

/// Connection encryption method for SMTP transports.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize, Enum)]
pub enum Encryption {
    /// Implicit TLS from the first byte (usually port 465)
    Ssl,
    /// Plaintext connection upgraded via STARTTLS (usually port 587)
    #[default]
    StartTls,
    /// No transport encryption (usually port 25)
    None,
}

/// Provider-specific configuration, one variant per transport.
///
/// Modeled as a tagged union rather than a loose key-value bag so each
/// variant carries exactly the fields its transport needs and can be
/// validated when the account is created, not when the first send fails.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize, Union)]
#[serde(tag = "type")]
#[oai(discriminator_name = "type")]
pub enum ProviderConfig {
    Smtp(SmtpConfig),
    ScriptWebhook(ScriptWebhookConfig),
    MtaApi(MtaApiConfig),
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize, Object)]
pub struct SmtpConfig {
    /// Hostname or IP address of the SMTP server.
    #[oai(validator(max_length = 253, pattern = r"^[a-zA-Z0-9\-\.]+$"))]
    pub host: String,
    /// Port number on which the SMTP server listens.
    #[oai(validator(minimum(value = "1"), maximum(value = "65535")))]
    pub port: u16,
    /// Connection encryption method
    pub encryption: Encryption,
    /// Login name used for AUTH; also available to templates as `[login]`.
    pub username: String,
    /// Password used for AUTH.
    pub password: String,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize, Object)]
pub struct ScriptWebhookConfig {
    /// Deployed web-app endpoint that performs the actual send, one POST per recipient.
    pub endpoint_url: String,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize, Object)]
pub struct MtaApiConfig {
    /// Submission API endpoint of the MTA.
    pub endpoint_url: String,
    /// Username for API authentication.
    pub username: String,
    /// Password for API authentication.
    pub password: String,
    /// Virtual MTA name the submission should be routed through.
    pub virtual_mta: Option<String>,
    /// Job pool carried as campaign metadata for the MTA's internal routing.
    pub job_pool: Option<String>,
}

/// Rolling-window sending limits for one account. `None` means unlimited.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize, Object)]
pub struct RateLimitConfig {
    /// Maximum emails per rolling hour window.
    pub max_per_hour: Option<u32>,
    /// Maximum emails per rolling day window.
    pub max_per_day: Option<u32>,
    /// Minimum spacing between two sends from this account, in seconds.
    pub min_send_interval_secs: Option<u64>,
}

impl ProviderConfig {
    pub fn validate(&self) -> MailBlastResult<()> {
        match self {
            ProviderConfig::Smtp(smtp) => {
                if smtp.host.is_empty() {
                    return Err(raise_error!(
                        "SMTP host must not be empty.".into(),
                        ErrorCode::InvalidParameter
                    ));
                }
                if smtp.port == 0 {
                    return Err(raise_error!(
                        "SMTP port must not be zero.".into(),
                        ErrorCode::InvalidParameter
                    ));
                }
                Ok(())
            }
            ProviderConfig::ScriptWebhook(webhook) => validate_endpoint(&webhook.endpoint_url),
            ProviderConfig::MtaApi(mta) => {
                validate_endpoint(&mta.endpoint_url)?;
                if mta.username.is_empty() {
                    return Err(raise_error!(
                        "MTA API username must not be empty.".into(),
                        ErrorCode::InvalidParameter
                    ));
                }
                Ok(())
            }
        }
    }

    /// Login identity of the account, used for the `[login]` template tag.
    pub fn login_name(&self) -> &str {
        match self {
            ProviderConfig::Smtp(smtp) => &smtp.username,
            ProviderConfig::ScriptWebhook(_) => "",
            ProviderConfig::MtaApi(mta) => &mta.username,
        }
    }
}

fn validate_endpoint(endpoint_url: &str) -> MailBlastResult<()> {
    Url::parse(endpoint_url).map_err(|e| {
        raise_error!(
            format!("Invalid endpoint URL '{}': {}", endpoint_url, e),
            ErrorCode::InvalidParameter
        )
    })?;
    Ok(())
}

impl SendingAccount {
    pub fn new(request: AccountCreateRequest) -> MailBlastResult<Self> {
        validate_email!(&request.email)?;
        request.provider.validate()?;
        Ok(Self {
            id: id!(64),
            label: request.label,
            email: request.email,
            provider: request.provider,
            limits: request.limits.unwrap_or_default(),
            enabled: request.enabled.unwrap_or(true),
            created_at: utc_now!(),
        })
    }

    pub fn get(id: u64) -> MailBlastResult<SendingAccount> {
        ACCOUNTS.get(&id).map(|a| a.clone()).ok_or_else(|| {
            raise_error!(
                format!("Sending account with id '{}' not found.", id),
                ErrorCode::ResourceNotFound
            )
        })
    }

    pub fn save(self) -> MailBlastResult<SendingAccount> {
        ACCOUNTS.insert(self.id, self.clone());
        Ok(self)
    }

    pub fn list_all() -> Vec<SendingAccount> {
        let mut accounts: Vec<SendingAccount> =
            ACCOUNTS.iter().map(|entry| entry.clone()).collect();
        accounts.sort_by_key(|a| (a.created_at, a.id));
        accounts
    }
}
