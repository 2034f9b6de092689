// Copyright © 2025 mailblast.dev
// Licensed under MailBlast License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::future::Future;
use std::time::Duration;

use crate::modules::account::entity::{ProviderConfig, SendingAccount};
use crate::modules::job::entity::PreparedJob;
use crate::modules::settings::cli::SETTINGS;

pub mod mta;
pub mod smtp;
pub mod webhook;

/// Terminal result of one delivery attempt.
///
/// Adapters never raise: every transport failure, non-2xx response, or
/// timeout is folded into `Failed` so the scheduler can treat the outcome
/// uniformly and record it on the job.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SendOutcome {
    Delivered,
    Failed { error: String },
}

/// Seam between the scheduler and the provider transports, so scheduling
/// behavior is testable without sockets.
pub trait EmailSender: Sync {
    fn send(
        &self,
        account: SendingAccount,
        job: PreparedJob,
    ) -> impl Future<Output = SendOutcome> + Send;
}

/// Production sender: routes by the account's provider variant and bounds
/// every attempt with the configured send timeout.
pub struct LiveSender;

impl EmailSender for LiveSender {
    async fn send(&self, account: SendingAccount, job: PreparedJob) -> SendOutcome {
        let timeout = Duration::from_secs(SETTINGS.mailblast_send_timeout_seconds);
        let attempt = tokio::time::timeout(timeout, async {
            match &account.provider {
                ProviderConfig::Smtp(config) => smtp::send_email(&account, config, &job).await,
                ProviderConfig::ScriptWebhook(config) => {
                    webhook::send_email(&account, config, &job).await
                }
                ProviderConfig::MtaApi(config) => mta::send_email(&account, config, &job).await,
            }
        })
        .await;

        match attempt {
            Ok(Ok(())) => SendOutcome::Delivered,
            Ok(Err(error)) => SendOutcome::Failed {
                error: error.to_string(),
            },
            Err(_) => SendOutcome::Failed {
                error: format!(
                    "send to '{}' timed out after {}s",
                    job.recipient, SETTINGS.mailblast_send_timeout_seconds
                ),
            },
        }
    }
}
