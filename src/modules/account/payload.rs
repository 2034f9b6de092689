// Copyright © 2025 mailblast.dev
// Licensed under MailBlast License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use poem_openapi::Object;
use serde::{Deserialize, Serialize};

use crate::modules::account::entity::{ProviderConfig, RateLimitConfig};

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize, Object)]
pub struct AccountCreateRequest {
    /// Short operator-facing label for the account.
    #[oai(validator(min_length = 1, max_length = 128))]
    pub label: String,
    /// Email address this account sends as.
    pub email: String,
    /// Provider transport and its configuration.
    pub provider: ProviderConfig,
    /// Per-account sending limits; omitted fields mean unlimited.
    pub limits: Option<RateLimitConfig>,
    /// Whether the account participates in rotation (default true).
    pub enabled: Option<bool>,
}
