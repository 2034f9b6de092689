// Copyright © 2025 mailblast.dev
// Licensed under MailBlast License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::LazyLock;

use dashmap::DashMap;
use poem_openapi::{Enum, Object};
use serde::{Deserialize, Serialize};

use crate::modules::campaign::payload::CampaignCreateRequest;
use crate::modules::error::code::ErrorCode;
use crate::modules::error::MailBlastResult;
use crate::{id, raise_error, utc_now};

static CAMPAIGNS: LazyLock<DashMap<u64, Campaign>> = LazyLock::new(DashMap::new);

/// A single bulk-email send request with one subject/body template and a
/// recipient list. Created by the campaign-editing collaborator; only the
/// preparer and the queue runner mutate it afterwards.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize, Object)]
pub struct Campaign {
    /// Unique campaign identifier
    pub id: u64,
    /// Operator-facing campaign name
    pub name: String,
    /// Subject template; used for every job unless subject rotation is on
    pub subject: String,
    /// HTML body template
    pub html_body: Option<String>,
    /// Plain-text body template
    pub text_body: Option<String>,
    /// From display name; used for every job unless from-name rotation is on
    pub from_name: Option<String>,
    /// Raw recipient specification as entered upstream (delimited text)
    pub raw_recipients: String,
    /// Subject/from-name rotation configuration
    pub rotation: RotationConfig,
    /// Lifecycle status
    pub status: CampaignStatus,
    /// Running count of jobs that reached `sent`
    pub sent_count: u64,
    /// Timestamp (Unix epoch milliseconds) when the campaign was created.
    pub created_at: i64,
    /// Timestamp (Unix epoch milliseconds) when the campaign was last updated.
    pub updated_at: i64,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize, Enum)]
pub enum CampaignStatus {
    /// Editable; no jobs exist yet.
    #[default]
    Draft,
    /// Jobs are materialized and waiting for a queue runner.
    Prepared,
    /// A queue runner is actively working the job set.
    Sending,
    /// Every job reached a terminal status and at least one was sent.
    Sent,
    /// Every job reached a terminal status and none were sent.
    Failed,
}

/// Cycling subject lines or from-names across recipients to vary message
/// presentation. Each list advances independently, wrapping modulo its length.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize, Object)]
pub struct RotationConfig {
    /// Rotate over `subjects` instead of the fixed campaign subject.
    pub rotate_subjects: bool,
    /// Candidate subjects; empty entries are ignored.
    pub subjects: Vec<String>,
    /// Rotate over `from_names` instead of the fixed campaign from-name.
    pub rotate_from_names: bool,
    /// Candidate from-names; empty entries are ignored.
    pub from_names: Vec<String>,
}

impl Campaign {
    pub fn new(request: CampaignCreateRequest) -> MailBlastResult<Self> {
        if request.subject.is_empty() {
            return Err(raise_error!(
                "Campaign subject must not be empty.".into(),
                ErrorCode::InvalidParameter
            ));
        }
        if request.html_body.is_none() && request.text_body.is_none() {
            return Err(raise_error!(
                "Campaign needs at least one of html_body or text_body.".into(),
                ErrorCode::InvalidParameter
            ));
        }
        Ok(Self {
            id: id!(64),
            name: request.name,
            subject: request.subject,
            html_body: request.html_body,
            text_body: request.text_body,
            from_name: request.from_name,
            raw_recipients: request.recipients,
            rotation: request.rotation.unwrap_or_default(),
            status: CampaignStatus::Draft,
            sent_count: 0,
            created_at: utc_now!(),
            updated_at: utc_now!(),
        })
    }

    pub fn get(id: u64) -> MailBlastResult<Campaign> {
        CAMPAIGNS.get(&id).map(|c| c.clone()).ok_or_else(|| {
            raise_error!(
                format!("Campaign with id '{}' not found.", id),
                ErrorCode::ResourceNotFound
            )
        })
    }

    pub fn save(self) -> MailBlastResult<Campaign> {
        CAMPAIGNS.insert(self.id, self.clone());
        Ok(self)
    }

    pub fn set_status(id: u64, status: CampaignStatus) -> MailBlastResult<()> {
        let mut campaign = CAMPAIGNS.get_mut(&id).ok_or_else(|| {
            raise_error!(
                format!("Campaign with id '{}' not found.", id),
                ErrorCode::ResourceNotFound
            )
        })?;
        campaign.status = status;
        campaign.updated_at = utc_now!();
        Ok(())
    }

    /// Bumps the running sent counter. Serialized through the map's
    /// per-entry lock so concurrent job completions cannot undercount.
    pub fn increment_sent_count(id: u64) -> MailBlastResult<()> {
        let mut campaign = CAMPAIGNS.get_mut(&id).ok_or_else(|| {
            raise_error!(
                format!("Campaign with id '{}' not found.", id),
                ErrorCode::ResourceNotFound
            )
        })?;
        campaign.sent_count += 1;
        campaign.updated_at = utc_now!();
        Ok(())
    }
}
