// Copyright © 2025 mailblast.dev
// Licensed under MailBlast License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::LazyLock;
use std::time::Duration;

use crate::mailblast_version;
use crate::modules::account::entity::{MtaApiConfig, SendingAccount};
use crate::modules::error::code::ErrorCode;
use crate::modules::error::MailBlastResult;
use crate::modules::job::entity::PreparedJob;
use crate::raise_error;

static CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::ClientBuilder::new()
        .user_agent(format!("MailBlast/{}", mailblast_version!()))
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .expect("Failed to build MTA API HTTP client")
});

/// Submits one message to a commercial MTA's HTTP submission API using basic
/// auth. `virtual_mta` and `job_pool` ride along as routing metadata when the
/// account configures them.
pub async fn send_email(
    account: &SendingAccount,
    config: &MtaApiConfig,
    job: &PreparedJob,
) -> MailBlastResult<()> {
    let payload = build_payload(account, config, job);
    let response = CLIENT
        .post(&config.endpoint_url)
        .basic_auth(&config.username, Some(&config.password))
        .json(&payload)
        .send()
        .await
        .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::MtaApiCallFailed))?;

    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = response.text().await.unwrap_or_default();
    let detail: String = body.chars().take(256).collect();
    Err(raise_error!(
        format!("MTA API returned HTTP {}: {}", status, detail),
        ErrorCode::HttpResponseError
    ))
}

fn build_payload(
    account: &SendingAccount,
    config: &MtaApiConfig,
    job: &PreparedJob,
) -> serde_json::Value {
    let mut payload = serde_json::json!({
        "from": {
            "email": account.email,
            "name": job.from_name,
        },
        "to": job.recipient,
        "subject": job.subject,
        "html": job.html,
        "text": job.text,
        "campaign_id": job.campaign_id.to_string(),
    });
    if let Some(virtual_mta) = &config.virtual_mta {
        payload["virtual_mta"] = serde_json::json!(virtual_mta);
    }
    if let Some(job_pool) = &config.job_pool {
        payload["job_pool"] = serde_json::json!(job_pool);
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::account::entity::{ProviderConfig, RateLimitConfig};
    use crate::modules::job::entity::JobStatus;

    #[test]
    fn routing_metadata_is_included_only_when_configured() {
        let config = MtaApiConfig {
            endpoint_url: "https://mta.example/api/send".into(),
            username: "api".into(),
            password: "secret".into(),
            virtual_mta: Some("vmta-7".into()),
            job_pool: None,
        };
        let account = SendingAccount {
            id: 1,
            label: "mta".into(),
            email: "sender@example.com".into(),
            provider: ProviderConfig::MtaApi(config.clone()),
            limits: RateLimitConfig::default(),
            enabled: true,
            created_at: 0,
        };
        let job = PreparedJob {
            id: 2,
            campaign_id: 9,
            position: 0,
            recipient: "to@example.com".into(),
            account_id: 1,
            subject: "Hi".into(),
            html: None,
            text: Some("plain".into()),
            from_name: None,
            priority: 0,
            status: JobStatus::Pending,
            retry_count: 0,
            error: None,
            created_at: 0,
            sent_at: None,
        };

        let payload = build_payload(&account, &config, &job);
        assert_eq!(payload["virtual_mta"], "vmta-7");
        assert!(payload.get("job_pool").is_none());
        assert_eq!(payload["campaign_id"], "9");
        assert_eq!(payload["from"]["email"], "sender@example.com");
    }
}
