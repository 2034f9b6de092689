// Copyright © 2025 mailblast.dev
// Licensed under MailBlast License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::modules::account::entity::SendingAccount;
use crate::modules::campaign::entity::{Campaign, CampaignStatus};
use crate::modules::campaign::payload::DispatchCampaignRequest;
use crate::modules::dispatch::entity::{QueueStatus, SendingQueue};
use crate::modules::error::code::ErrorCode;
use crate::modules::error::MailBlastResult;
use crate::modules::job::entity::{JobStatus, PreparedJob};
use crate::modules::limiter::{Admission, RATE_LIMITER};
use crate::modules::metrics::{
    FAILURE, MAILBLAST_EMAIL_SENT_TOTAL, MAILBLAST_SEND_ATTEMPTS_TOTAL, RATE_LIMITED, SUCCESS,
};
use crate::modules::provider::{EmailSender, LiveSender, SendOutcome};
use crate::modules::settings::cli::SETTINGS;
use crate::{raise_error, utc_now};

/// Creates a sending queue for a prepared campaign and spawns its runner.
pub fn launch_dispatch(
    campaign_id: u64,
    request: DispatchCampaignRequest,
) -> MailBlastResult<SendingQueue> {
    let campaign = Campaign::get(campaign_id)?;
    if campaign.status != CampaignStatus::Prepared {
        return Err(raise_error!(
            format!(
                "Campaign '{}' must be prepared before dispatch (current status: {:?}).",
                campaign.name, campaign.status
            ),
            ErrorCode::InvalidParameter
        ));
    }
    if PreparedJob::list_by_campaign(campaign_id).is_empty() {
        return Err(raise_error!(
            "Campaign has no prepared jobs to dispatch.".into(),
            ErrorCode::InvalidParameter
        ));
    }

    let queue = SendingQueue::new(
        campaign_id,
        request
            .max_concurrent_sends
            .unwrap_or(SETTINGS.mailblast_max_concurrent_sends),
        request.max_retries.unwrap_or(0),
    )
    .save()?;

    let queue_id = queue.id;
    tokio::spawn(async move {
        if let Err(error) = run_queue(queue_id, &LiveSender).await {
            warn!(queue_id, %error, "queue runner exited with an error");
        }
    });

    Ok(queue)
}

/// Drives a queue to completion: one scheduling pass, then a fixed inter-batch
/// pause, until every job is terminal. A paused queue keeps the runner alive
/// and idle so a later resume picks up where it left off.
pub async fn run_queue<S: EmailSender>(queue_id: u64, sender: &S) -> MailBlastResult<()> {
    let queue = SendingQueue::get(queue_id)?;
    if queue.status == QueueStatus::Completed {
        return Ok(());
    }
    Campaign::set_status(queue.campaign_id, CampaignStatus::Sending)?;
    info!(
        queue_id,
        campaign_id = queue.campaign_id,
        max_concurrent = queue.max_concurrent_sends,
        "queue runner started"
    );

    let pause = Duration::from_secs(SETTINGS.mailblast_batch_interval_seconds);
    loop {
        let queue = SendingQueue::get(queue_id)?;
        match queue.status {
            QueueStatus::Completed => return Ok(()),
            QueueStatus::Paused => {
                tokio::time::sleep(pause.max(Duration::from_millis(100))).await;
                continue;
            }
            QueueStatus::Running => {}
        }

        run_pass(&queue, sender).await?;

        if unfinished_jobs(queue.campaign_id) == 0 {
            finalize(&queue)?;
            return Ok(());
        }
        tokio::time::sleep(pause).await;
    }
}

/// One scheduling pass: claim up to the concurrency cap, work the claimed
/// jobs to a decision (parallel across accounts, sequential within one), then
/// refresh the queue counters.
pub async fn run_pass<S: EmailSender>(
    queue: &SendingQueue,
    sender: &S,
) -> MailBlastResult<usize> {
    let claimed = PreparedJob::claim_pending(queue.campaign_id, queue.max_concurrent_sends);
    if claimed.is_empty() {
        return Ok(0);
    }
    let count = claimed.len();

    // Jobs for the same account run back to back inside one future, so every
    // admission sees the sends that already landed on that account and the
    // pacing delay actually spaces them out. Interleaving them would let a
    // whole batch pass the pure admit check before any record_send lands and
    // blow through the account's quota. Distinct accounts still fan out in
    // parallel.
    let mut by_account: Vec<(u64, Vec<PreparedJob>)> = Vec::new();
    for job in claimed {
        match by_account.iter_mut().find(|(id, _)| *id == job.account_id) {
            Some((_, jobs)) => jobs.push(job),
            None => by_account.push((job.account_id, vec![job])),
        }
    }

    join_all(by_account.into_iter().map(|(_, jobs)| async move {
        for job in jobs {
            process_job(queue, sender, job).await;
        }
    }))
    .await;

    SendingQueue::update_counters(
        queue.id,
        PreparedJob::count_by_status(queue.campaign_id, JobStatus::Sent) as u64,
        PreparedJob::count_by_status(queue.campaign_id, JobStatus::Failed) as u64,
    )?;
    Ok(count)
}

async fn process_job<S: EmailSender>(queue: &SendingQueue, sender: &S, job: PreparedJob) {
    let account = match SendingAccount::get(job.account_id) {
        Ok(account) => account,
        Err(error) => {
            PreparedJob::mark_failed(job.id, error.to_string());
            MAILBLAST_SEND_ATTEMPTS_TOTAL
                .with_label_values(&[FAILURE])
                .inc();
            return;
        }
    };

    match RATE_LIMITER.admit(&account, utc_now!()) {
        Admission::Denied { reason } => {
            // Flow control: back to pending, retry budget untouched, and the
            // provider adapter is never invoked.
            debug!(job_id = job.id, account_id = account.id, %reason, "send deferred");
            PreparedJob::revert_to_pending(job.id);
            MAILBLAST_SEND_ATTEMPTS_TOTAL
                .with_label_values(&[RATE_LIMITED])
                .inc();
            return;
        }
        Admission::Allowed => {}
    }

    // Pacing sleeps inside this job's own future, so one slow account does
    // not hold up the rest of the batch.
    if let Some(delay) = RATE_LIMITER.pacing_delay(&account, utc_now!()) {
        tokio::time::sleep(delay).await;
    }

    match sender.send(account.clone(), job.clone()).await {
        SendOutcome::Delivered => {
            RATE_LIMITER.record_send(account.id, utc_now!());
            PreparedJob::mark_sent(job.id);
            if let Err(error) = Campaign::increment_sent_count(job.campaign_id) {
                warn!(job_id = job.id, %error, "failed to bump campaign sent count");
            }
            MAILBLAST_SEND_ATTEMPTS_TOTAL
                .with_label_values(&[SUCCESS])
                .inc();
            MAILBLAST_EMAIL_SENT_TOTAL
                .with_label_values(&[SUCCESS])
                .inc();
        }
        SendOutcome::Failed { error } => {
            warn!(
                job_id = job.id,
                account_id = account.id,
                recipient = %job.recipient,
                %error,
                "send failed"
            );
            PreparedJob::mark_failed(job.id, error);
            MAILBLAST_SEND_ATTEMPTS_TOTAL
                .with_label_values(&[FAILURE])
                .inc();
            MAILBLAST_EMAIL_SENT_TOTAL
                .with_label_values(&[FAILURE])
                .inc();

            if let Some(updated) = PreparedJob::get(job.id) {
                if updated.retry_count <= queue.max_retries {
                    PreparedJob::resubmit_for_retry(job.id);
                }
            }
        }
    }
}

fn unfinished_jobs(campaign_id: u64) -> usize {
    PreparedJob::count_by_status(campaign_id, JobStatus::Pending)
        + PreparedJob::count_by_status(campaign_id, JobStatus::Sending)
        + PreparedJob::count_by_status(campaign_id, JobStatus::Retry)
}

fn finalize(queue: &SendingQueue) -> MailBlastResult<()> {
    SendingQueue::set_status(queue.id, QueueStatus::Completed)?;
    let sent = PreparedJob::count_by_status(queue.campaign_id, JobStatus::Sent);
    let status = if sent > 0 {
        CampaignStatus::Sent
    } else {
        CampaignStatus::Failed
    };
    Campaign::set_status(queue.campaign_id, status)?;
    info!(
        queue_id = queue.id,
        campaign_id = queue.campaign_id,
        sent,
        failed = PreparedJob::count_by_status(queue.campaign_id, JobStatus::Failed),
        "queue completed"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use super::*;
    use crate::id;
    use crate::modules::account::entity::{
        ProviderConfig, RateLimitConfig, ScriptWebhookConfig,
    };
    use crate::modules::campaign::payload::CampaignCreateRequest;
    use crate::modules::campaign::preparer::prepare_campaign;

    /// Records every adapter invocation; fails the recipients it is told to.
    struct MockSender {
        calls: Mutex<Vec<String>>,
        always_fail: HashSet<String>,
        fail_once: Mutex<HashSet<String>>,
    }

    impl MockSender {
        fn ok() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                always_fail: HashSet::new(),
                fail_once: Mutex::new(HashSet::new()),
            }
        }

        fn failing(recipients: &[&str]) -> Self {
            let mut sender = Self::ok();
            sender.always_fail = recipients.iter().map(|r| r.to_string()).collect();
            sender
        }

        fn flaky(recipients: &[&str]) -> Self {
            let sender = Self::ok();
            *sender.fail_once.lock().unwrap() =
                recipients.iter().map(|r| r.to_string()).collect();
            sender
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl EmailSender for MockSender {
        async fn send(
            &self,
            _account: SendingAccount,
            job: PreparedJob,
        ) -> SendOutcome {
            // Suspend once, the way a real transport would on network I/O,
            // so sibling jobs in the batch get a chance to interleave.
            tokio::task::yield_now().await;
            self.calls.lock().unwrap().push(job.recipient.clone());
            if self.always_fail.contains(&job.recipient) {
                return SendOutcome::Failed {
                    error: "mock permanent failure".into(),
                };
            }
            if self.fail_once.lock().unwrap().remove(&job.recipient) {
                return SendOutcome::Failed {
                    error: "mock transient failure".into(),
                };
            }
            SendOutcome::Delivered
        }
    }

    fn seed_account(limits: RateLimitConfig) -> SendingAccount {
        SendingAccount {
            id: id!(64),
            label: "runner-test".into(),
            email: "sender@example.com".into(),
            provider: ProviderConfig::ScriptWebhook(ScriptWebhookConfig {
                endpoint_url: "https://script.example/exec".into(),
            }),
            limits,
            enabled: true,
            created_at: utc_now!(),
        }
        .save()
        .unwrap()
    }

    fn seed_prepared(recipients: &str, account_ids: &[u64]) -> Campaign {
        let campaign = Campaign::new(CampaignCreateRequest {
            name: "runner".into(),
            subject: "Hi [to]".into(),
            html_body: None,
            text_body: Some("Body for [to]".into()),
            from_name: None,
            recipients: recipients.into(),
            rotation: None,
        })
        .unwrap()
        .save()
        .unwrap();
        prepare_campaign(campaign.id, account_ids).unwrap();
        Campaign::get(campaign.id).unwrap()
    }

    #[tokio::test]
    async fn runs_a_campaign_to_completion() {
        let a = seed_account(RateLimitConfig::default());
        let b = seed_account(RateLimitConfig::default());
        let campaign = seed_prepared("r1@x.com, r2@x.com, r3@x.com", &[a.id, b.id]);

        let queue = SendingQueue::new(campaign.id, 10, 0).save().unwrap();
        let sender = MockSender::ok();
        run_queue(queue.id, &sender).await.unwrap();

        assert_eq!(sender.call_count(), 3);
        let queue = SendingQueue::get(queue.id).unwrap();
        assert_eq!(queue.status, QueueStatus::Completed);
        assert_eq!(queue.completed_count, 3);
        assert_eq!(queue.failed_count, 0);

        let campaign = Campaign::get(campaign.id).unwrap();
        assert_eq!(campaign.status, CampaignStatus::Sent);
        assert_eq!(campaign.sent_count, 3);
        assert!(PreparedJob::list_by_campaign(campaign.id)
            .iter()
            .all(|j| j.status == JobStatus::Sent && j.sent_at.is_some()));
    }

    #[tokio::test]
    async fn rate_limited_jobs_stay_pending_without_adapter_calls() {
        let throttled = seed_account(RateLimitConfig {
            max_per_hour: Some(0),
            ..Default::default()
        });
        let campaign = seed_prepared("r1@x.com, r2@x.com", &[throttled.id]);

        let queue = SendingQueue::new(campaign.id, 10, 0).save().unwrap();
        let sender = MockSender::ok();
        let claimed = run_pass(&queue, &sender).await.unwrap();

        assert_eq!(claimed, 2);
        assert_eq!(sender.call_count(), 0);
        let jobs = PreparedJob::list_by_campaign(campaign.id);
        assert!(jobs
            .iter()
            .all(|j| j.status == JobStatus::Pending && j.retry_count == 0));
    }

    #[tokio::test]
    async fn one_pass_cannot_exceed_an_account_hourly_quota() {
        let throttled = seed_account(RateLimitConfig {
            max_per_hour: Some(1),
            ..Default::default()
        });
        let campaign = seed_prepared("r1@x.com, r2@x.com, r3@x.com", &[throttled.id]);

        // All three jobs are claimed in a single pass; only one may reach the
        // adapter, however the concurrent sends interleave.
        let queue = SendingQueue::new(campaign.id, 10, 0).save().unwrap();
        let sender = MockSender::ok();
        let claimed = run_pass(&queue, &sender).await.unwrap();

        assert_eq!(claimed, 3);
        assert_eq!(sender.call_count(), 1);
        let jobs = PreparedJob::list_by_campaign(campaign.id);
        assert_eq!(
            jobs.iter().filter(|j| j.status == JobStatus::Sent).count(),
            1
        );
        assert_eq!(
            jobs.iter()
                .filter(|j| j.status == JobStatus::Pending && j.retry_count == 0)
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn a_completed_queue_never_reopens_its_campaign() {
        let a = seed_account(RateLimitConfig::default());
        let campaign = seed_prepared("r@x.com", &[a.id]);

        let queue = SendingQueue::new(campaign.id, 10, 0).save().unwrap();
        let sender = MockSender::ok();
        run_queue(queue.id, &sender).await.unwrap();
        assert_eq!(
            Campaign::get(campaign.id).unwrap().status,
            CampaignStatus::Sent
        );

        // Re-running a finished queue is a no-op and must not flip the
        // campaign back to Sending.
        run_queue(queue.id, &sender).await.unwrap();
        assert_eq!(
            Campaign::get(campaign.id).unwrap().status,
            CampaignStatus::Sent
        );
        assert_eq!(sender.call_count(), 1);
    }

    #[tokio::test]
    async fn permanent_failure_is_isolated_and_counted() {
        let a = seed_account(RateLimitConfig::default());
        let campaign = seed_prepared("ok1@x.com, bad@x.com, ok2@x.com", &[a.id]);

        let queue = SendingQueue::new(campaign.id, 10, 0).save().unwrap();
        let sender = MockSender::failing(&["bad@x.com"]);
        run_queue(queue.id, &sender).await.unwrap();

        let queue = SendingQueue::get(queue.id).unwrap();
        assert_eq!(queue.completed_count, 2);
        assert_eq!(queue.failed_count, 1);

        let jobs = PreparedJob::list_by_campaign(campaign.id);
        let failed = jobs.iter().find(|j| j.recipient == "bad@x.com").unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.retry_count, 1);
        assert!(failed.error.as_deref().unwrap().contains("permanent"));

        // One failure does not poison the campaign.
        let campaign = Campaign::get(campaign.id).unwrap();
        assert_eq!(campaign.status, CampaignStatus::Sent);
        assert_eq!(campaign.sent_count, 2);
    }

    #[tokio::test]
    async fn transient_failure_is_retried_within_budget() {
        let a = seed_account(RateLimitConfig::default());
        let campaign = seed_prepared("flaky@x.com, ok@x.com", &[a.id]);

        let queue = SendingQueue::new(campaign.id, 10, 1).save().unwrap();
        let sender = MockSender::flaky(&["flaky@x.com"]);
        run_queue(queue.id, &sender).await.unwrap();

        // flaky@x.com is attempted twice, ok@x.com once.
        assert_eq!(sender.call_count(), 3);
        let jobs = PreparedJob::list_by_campaign(campaign.id);
        let retried = jobs.iter().find(|j| j.recipient == "flaky@x.com").unwrap();
        assert_eq!(retried.status, JobStatus::Sent);
        assert_eq!(retried.retry_count, 1);

        let queue = SendingQueue::get(queue.id).unwrap();
        assert_eq!(queue.completed_count, 2);
        assert_eq!(queue.failed_count, 0);
    }

    #[tokio::test]
    async fn exhausted_retry_budget_leaves_the_job_failed() {
        let a = seed_account(RateLimitConfig::default());
        let campaign = seed_prepared("bad@x.com", &[a.id]);

        let queue = SendingQueue::new(campaign.id, 10, 2).save().unwrap();
        let sender = MockSender::failing(&["bad@x.com"]);
        run_queue(queue.id, &sender).await.unwrap();

        // Initial attempt plus two resubmissions.
        assert_eq!(sender.call_count(), 3);
        let job = &PreparedJob::list_by_campaign(campaign.id)[0];
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.retry_count, 3);

        let campaign = Campaign::get(campaign.id).unwrap();
        assert_eq!(campaign.status, CampaignStatus::Failed);
    }

    #[tokio::test]
    async fn dispatch_requires_a_prepared_campaign() {
        let campaign = Campaign::new(CampaignCreateRequest {
            name: "draft".into(),
            subject: "Hi".into(),
            html_body: None,
            text_body: Some("body".into()),
            from_name: None,
            recipients: "r@x.com".into(),
            rotation: None,
        })
        .unwrap()
        .save()
        .unwrap();

        assert!(launch_dispatch(campaign.id, DispatchCampaignRequest {
            max_concurrent_sends: None,
            max_retries: None,
        })
        .is_err());
    }

    #[test]
    fn pause_and_resume_enforce_their_preconditions() {
        let queue = SendingQueue::new(1, 10, 0).save().unwrap();
        assert!(SendingQueue::resume(queue.id).is_err());
        SendingQueue::pause(queue.id).unwrap();
        assert!(SendingQueue::pause(queue.id).is_err());
        SendingQueue::resume(queue.id).unwrap();
        assert_eq!(
            SendingQueue::get(queue.id).unwrap().status,
            QueueStatus::Running
        );
    }
}
