// Copyright © 2025 mailblast.dev
// Licensed under MailBlast License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::LazyLock;

use dashmap::DashMap;
use poem_openapi::{Enum, Object};
use serde::{Deserialize, Serialize};

use crate::modules::error::code::ErrorCode;
use crate::modules::error::MailBlastResult;
use crate::{id, raise_error, utc_now};

static QUEUES: LazyLock<DashMap<u64, SendingQueue>> = LazyLock::new(DashMap::new);

/// One dispatch run over a prepared campaign. Owns the pacing and concurrency
/// knobs for that run and the aggregate completion counters the operator
/// watches.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize, Object)]
pub struct SendingQueue {
    /// Unique queue identifier
    pub id: u64,
    /// Campaign whose jobs this queue works
    pub campaign_id: u64,
    /// Run state; paused queues stop claiming but leave in-flight sends alone
    pub status: QueueStatus,
    /// Cap on jobs claimed per scheduling pass
    pub max_concurrent_sends: usize,
    /// Automatic resubmissions allowed per failed job; 0 disables retries
    pub max_retries: u32,
    /// Jobs that reached `sent`
    pub completed_count: u64,
    /// Jobs that reached `failed` and exhausted their retries
    pub failed_count: u64,
    /// Timestamp (Unix epoch milliseconds) when the queue was created.
    pub created_at: i64,
    /// Timestamp (Unix epoch milliseconds) of the last counter update.
    pub updated_at: i64,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize, Enum)]
pub enum QueueStatus {
    /// Actively claiming and sending.
    #[default]
    Running,
    /// Claiming suspended by the operator; resumable.
    Paused,
    /// Every job reached a terminal status. Final.
    Completed,
}

impl SendingQueue {
    pub fn new(campaign_id: u64, max_concurrent_sends: usize, max_retries: u32) -> Self {
        Self {
            id: id!(64),
            campaign_id,
            status: QueueStatus::Running,
            max_concurrent_sends,
            max_retries,
            completed_count: 0,
            failed_count: 0,
            created_at: utc_now!(),
            updated_at: utc_now!(),
        }
    }

    pub fn get(id: u64) -> MailBlastResult<SendingQueue> {
        QUEUES.get(&id).map(|q| q.clone()).ok_or_else(|| {
            raise_error!(
                format!("Sending queue with id '{}' not found.", id),
                ErrorCode::ResourceNotFound
            )
        })
    }

    pub fn save(self) -> MailBlastResult<SendingQueue> {
        QUEUES.insert(self.id, self.clone());
        Ok(self)
    }

    pub fn set_status(id: u64, status: QueueStatus) -> MailBlastResult<()> {
        let mut queue = QUEUES.get_mut(&id).ok_or_else(|| {
            raise_error!(
                format!("Sending queue with id '{}' not found.", id),
                ErrorCode::ResourceNotFound
            )
        })?;
        queue.status = status;
        queue.updated_at = utc_now!();
        Ok(())
    }

    pub fn update_counters(id: u64, completed: u64, failed: u64) -> MailBlastResult<()> {
        let mut queue = QUEUES.get_mut(&id).ok_or_else(|| {
            raise_error!(
                format!("Sending queue with id '{}' not found.", id),
                ErrorCode::ResourceNotFound
            )
        })?;
        queue.completed_count = completed;
        queue.failed_count = failed;
        queue.updated_at = utc_now!();
        Ok(())
    }

    /// Suspends claiming. Only a running queue can be paused.
    pub fn pause(id: u64) -> MailBlastResult<()> {
        let queue = Self::get(id)?;
        if queue.status != QueueStatus::Running {
            return Err(raise_error!(
                format!("Queue '{}' is not running and cannot be paused.", id),
                ErrorCode::InvalidParameter
            ));
        }
        Self::set_status(id, QueueStatus::Paused)
    }

    /// Resumes a paused queue.
    pub fn resume(id: u64) -> MailBlastResult<()> {
        let queue = Self::get(id)?;
        if queue.status != QueueStatus::Paused {
            return Err(raise_error!(
                format!("Queue '{}' is not paused and cannot be resumed.", id),
                ErrorCode::InvalidParameter
            ));
        }
        Self::set_status(id, QueueStatus::Running)
    }
}
