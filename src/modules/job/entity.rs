// Copyright © 2025 mailblast.dev
// Licensed under MailBlast License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::LazyLock;

use dashmap::DashMap;
use poem_openapi::{Enum, Object};
use serde::{Deserialize, Serialize};

use crate::utc_now;

static JOBS: LazyLock<DashMap<u64, PreparedJob>> = LazyLock::new(DashMap::new);

/// One fully resolved, per-recipient unit of work derived from a campaign.
///
/// Content is resolved eagerly at preparation time (rotation, tag expansion,
/// tracking injection), so a retry re-sends byte-identical content. Jobs are
/// never deleted during a run; they transition independently of each other
/// and reach a terminal status at most once.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize, Object)]
pub struct PreparedJob {
    /// Unique job identifier
    pub id: u64,
    /// Campaign this job was expanded from
    pub campaign_id: u64,
    /// Position of this job within the campaign's prepared set; with equal
    /// priority and creation time it keeps claim ordering deterministic.
    pub position: u64,
    /// Recipient address
    pub recipient: String,
    /// Sending account assigned by round-robin at preparation time
    pub account_id: u64,
    /// Resolved subject (after rotation and tag expansion)
    pub subject: String,
    /// Resolved HTML body, tracking already injected
    pub html: Option<String>,
    /// Resolved plain-text body
    pub text: Option<String>,
    /// Resolved from display name
    pub from_name: Option<String>,
    /// Claim priority; higher claims first
    pub priority: i32,
    /// Current lifecycle status
    pub status: JobStatus,
    /// Number of provider-level failures so far; rate-limit denials do not count
    pub retry_count: u32,
    /// Human-readable message from the last provider failure
    pub error: Option<String>,
    /// Timestamp (Unix epoch milliseconds) when the job was created.
    pub created_at: i64,
    /// Timestamp (Unix epoch milliseconds) when the job reached `sent`.
    pub sent_at: Option<i64>,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize, Serialize, Enum)]
pub enum JobStatus {
    /// Waiting to be claimed by a scheduling pass.
    #[default]
    Pending,
    /// Claimed and currently in flight.
    Sending,
    /// Provider accepted the message. Terminal.
    Sent,
    /// Provider-level failure recorded. Terminal unless the queue's retry
    /// budget resubmits it.
    Failed,
    /// Failed but scheduled for another attempt on a later pass.
    Retry,
}

impl PreparedJob {
    pub fn get(id: u64) -> Option<PreparedJob> {
        JOBS.get(&id).map(|j| j.clone())
    }

    /// Replaces the campaign's job set: removes any jobs from an earlier
    /// preparation run, then stores the new set.
    pub fn replace_for_campaign(campaign_id: u64, jobs: Vec<PreparedJob>) {
        JOBS.retain(|_, job| job.campaign_id != campaign_id);
        for job in jobs {
            JOBS.insert(job.id, job);
        }
    }

    pub fn list_by_campaign(campaign_id: u64) -> Vec<PreparedJob> {
        let mut jobs: Vec<PreparedJob> = JOBS
            .iter()
            .filter(|entry| entry.campaign_id == campaign_id)
            .map(|entry| entry.clone())
            .collect();
        jobs.sort_by_key(|job| job.position);
        jobs
    }

    /// Claims up to `limit` pending jobs for a campaign and marks them
    /// `sending`. Ordering is priority descending, then oldest first, then
    /// prepared position, so claims are stable and testable.
    pub fn claim_pending(campaign_id: u64, limit: usize) -> Vec<PreparedJob> {
        let mut pending: Vec<PreparedJob> = JOBS
            .iter()
            .filter(|entry| {
                entry.campaign_id == campaign_id && entry.status == JobStatus::Pending
            })
            .map(|entry| entry.clone())
            .collect();
        pending.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.position.cmp(&b.position))
        });
        pending.truncate(limit);

        for job in &mut pending {
            job.status = JobStatus::Sending;
            if let Some(mut stored) = JOBS.get_mut(&job.id) {
                stored.status = JobStatus::Sending;
            }
        }
        pending
    }

    pub fn count_by_status(campaign_id: u64, status: JobStatus) -> usize {
        JOBS.iter()
            .filter(|entry| entry.campaign_id == campaign_id && entry.status == status)
            .count()
    }

    pub fn mark_sent(id: u64) {
        if let Some(mut job) = JOBS.get_mut(&id) {
            job.status = JobStatus::Sent;
            job.sent_at = Some(utc_now!());
            job.error = None;
        }
    }

    /// Records a provider-level failure. This is the only transition that
    /// consumes a retry.
    pub fn mark_failed(id: u64, error: String) {
        if let Some(mut job) = JOBS.get_mut(&id) {
            job.status = JobStatus::Failed;
            job.retry_count += 1;
            job.error = Some(error);
        }
    }

    /// Returns a claimed job to the pending pool without touching its retry
    /// count; used when admission is denied by the rate limiter.
    pub fn revert_to_pending(id: u64) {
        if let Some(mut job) = JOBS.get_mut(&id) {
            job.status = JobStatus::Pending;
        }
    }

    /// Resubmits a failed job under the queue's retry budget: records the
    /// intermediate `retry` status for audit, then re-enters the pending pool.
    pub fn resubmit_for_retry(id: u64) {
        if let Some(mut job) = JOBS.get_mut(&id) {
            if job.status == JobStatus::Failed {
                job.status = JobStatus::Retry;
            }
        }
        if let Some(mut job) = JOBS.get_mut(&id) {
            if job.status == JobStatus::Retry {
                job.status = JobStatus::Pending;
            }
        }
    }
}
