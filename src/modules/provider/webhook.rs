// Copyright © 2025 mailblast.dev
// Licensed under MailBlast License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::LazyLock;
use std::time::Duration;

use crate::mailblast_version;
use crate::modules::account::entity::{ScriptWebhookConfig, SendingAccount};
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
        .expect("Failed to build webhook HTTP client")
});

/// One POST per recipient to the deployed script endpoint. The script replies
/// with a JSON envelope; delivery counts as accepted only when the HTTP status
/// is 2xx and the envelope's `status` field is `success`.
pub async fn send_email(
    account: &SendingAccount,
    config: &ScriptWebhookConfig,
    job: &PreparedJob,
) -> MailBlastResult<()> {
    let payload = build_payload(account, job);
    let response = CLIENT
        .post(&config.endpoint_url)
        .json(&payload)
        .send()
        .await
        .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::WebhookCallFailed))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::WebhookCallFailed))?;

    if !status.is_success() {
        return Err(raise_error!(
            format!("Script endpoint returned HTTP {}: {}", status, truncate(&body)),
            ErrorCode::HttpResponseError
        ));
    }

    let envelope: serde_json::Value = serde_json::from_str(&body).map_err(|_| {
        raise_error!(
            format!("Script endpoint returned non-JSON body: {}", truncate(&body)),
            ErrorCode::WebhookCallFailed
        )
    })?;

    if envelope["status"] == "success" {
        return Ok(());
    }

    // Scripts report their own quota exhaustion in the envelope; surface it.
    let mut message = format!(
        "Script endpoint rejected the send: {}",
        envelope["message"].as_str().unwrap_or("no message")
    );
    if let Some(quota) = envelope["remainingDailyQuota"].as_i64() {
        message.push_str(&format!(" (remaining daily quota: {})", quota));
    }
    Err(raise_error!(message, ErrorCode::WebhookCallFailed))
}

fn build_payload(account: &SendingAccount, job: &PreparedJob) -> serde_json::Value {
    serde_json::json!({
        "to": job.recipient,
        "subject": job.subject,
        "htmlBody": job.html,
        "plainBody": job.text,
        "fromName": job.from_name,
        "fromAddress": account.email,
    })
}

fn truncate(body: &str) -> &str {
    body.char_indices()
        .nth(256)
        .map(|(i, _)| &body[..i])
        .unwrap_or(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::account::entity::{ProviderConfig, RateLimitConfig};
    use crate::modules::job::entity::JobStatus;

    #[test]
    fn payload_uses_script_field_names() {
        let account = SendingAccount {
            id: 1,
            label: "wh".into(),
            email: "sender@example.com".into(),
            provider: ProviderConfig::ScriptWebhook(ScriptWebhookConfig {
                endpoint_url: "https://script.example/exec".into(),
            }),
            limits: RateLimitConfig::default(),
            enabled: true,
            created_at: 0,
        };
        let job = PreparedJob {
            id: 2,
            campaign_id: 3,
            position: 0,
            recipient: "to@example.com".into(),
            account_id: 1,
            subject: "Hi".into(),
            html: Some("<p>Hi</p>".into()),
            text: None,
            from_name: Some("Sender".into()),
            priority: 0,
            status: JobStatus::Pending,
            retry_count: 0,
            error: None,
            created_at: 0,
            sent_at: None,
        };

        let payload = build_payload(&account, &job);
        assert_eq!(payload["to"], "to@example.com");
        assert_eq!(payload["htmlBody"], "<p>Hi</p>");
        assert_eq!(payload["plainBody"], serde_json::Value::Null);
        assert_eq!(payload["fromName"], "Sender");
        assert_eq!(payload["fromAddress"], "sender@example.com");
    }
}
