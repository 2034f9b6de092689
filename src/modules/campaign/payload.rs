// Copyright © 2025 mailblast.dev
// Licensed under MailBlast License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use poem_openapi::Object;
use serde::{Deserialize, Serialize};

use crate::modules::campaign::entity::RotationConfig;

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize, Object)]
pub struct CampaignCreateRequest {
    /// Operator-facing campaign name.
    #[oai(validator(min_length = 1, max_length = 256))]
    pub name: String,
    /// Subject template.
    pub subject: String,
    /// HTML body template.
    pub html_body: Option<String>,
    /// Plain-text body template.
    pub text_body: Option<String>,
    /// From display name.
    pub from_name: Option<String>,
    /// Raw recipient list: comma-delimited, with newline and semicolon fallbacks.
    pub recipients: String,
    /// Optional subject/from-name rotation configuration.
    pub rotation: Option<RotationConfig>,
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize, Object)]
pub struct PrepareCampaignRequest {
    /// Sending accounts to rotate over, in the order rotation should follow.
    pub account_ids: Vec<u64>,
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize, Object)]
pub struct DispatchCampaignRequest {
    /// Cap on jobs claimed per scheduling pass; defaults to the server setting.
    pub max_concurrent_sends: Option<usize>,
    /// Automatic bounded-retry ceiling for failed jobs; 0 disables resubmission.
    pub max_retries: Option<u32>,
}
