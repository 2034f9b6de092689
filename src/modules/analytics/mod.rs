// Copyright © 2025 mailblast.dev
// Licensed under MailBlast License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::LazyLock;

use dashmap::DashMap;
use poem_openapi::{Enum, Object};
use serde::{Deserialize, Serialize};

use crate::modules::metrics::{MAILBLAST_EMAIL_CLICKS_TOTAL, MAILBLAST_EMAIL_OPENS_TOTAL};
use crate::{id, utc_now};

static EVENTS: LazyLock<DashMap<u64, CampaignEvent>> = LazyLock::new(DashMap::new);

/// One recorded engagement signal: a pixel load or a click-redirect hit.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize, Object)]
pub struct CampaignEvent {
    pub id: u64,
    pub campaign_id: u64,
    pub recipient: String,
    pub kind: EventKind,
    /// Destination URL, for click events only.
    pub url: Option<String>,
    pub remote_ip: Option<String>,
    pub user_agent: Option<String>,
    /// Timestamp (Unix epoch milliseconds) when the hit was received.
    pub occurred_at: i64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize, Enum)]
pub enum EventKind {
    Open,
    Click,
}

impl CampaignEvent {
    pub fn record(
        campaign_id: u64,
        recipient: String,
        kind: EventKind,
        url: Option<String>,
        remote_ip: Option<String>,
        user_agent: Option<String>,
    ) -> CampaignEvent {
        match kind {
            EventKind::Open => MAILBLAST_EMAIL_OPENS_TOTAL.inc(),
            EventKind::Click => MAILBLAST_EMAIL_CLICKS_TOTAL.inc(),
        }
        let event = CampaignEvent {
            id: id!(64),
            campaign_id,
            recipient,
            kind,
            url,
            remote_ip,
            user_agent,
            occurred_at: utc_now!(),
        };
        EVENTS.insert(event.id, event.clone());
        event
    }

    pub fn list_by_campaign(campaign_id: u64) -> Vec<CampaignEvent> {
        let mut events: Vec<CampaignEvent> = EVENTS
            .iter()
            .filter(|entry| entry.campaign_id == campaign_id)
            .map(|entry| entry.clone())
            .collect();
        events.sort_by_key(|e| (e.occurred_at, e.id));
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_recorded_and_listed_in_order() {
        let campaign_id = 987_654;
        CampaignEvent::record(
            campaign_id,
            "a@example.com".into(),
            EventKind::Open,
            None,
            Some("203.0.113.9".into()),
            Some("Mozilla/5.0".into()),
        );
        CampaignEvent::record(
            campaign_id,
            "a@example.com".into(),
            EventKind::Click,
            Some("https://example.com/promo".into()),
            None,
            None,
        );

        let events = CampaignEvent::list_by_campaign(campaign_id);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::Open);
        assert_eq!(events[1].url.as_deref(), Some("https://example.com/promo"));
        assert!(CampaignEvent::list_by_campaign(campaign_id + 1).is_empty());
    }
}
