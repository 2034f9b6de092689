// Copyright © 2025 mailblast.dev
// Licensed under MailBlast License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use tracing::info;

use crate::modules::account::entity::SendingAccount;
use crate::modules::campaign::entity::{Campaign, CampaignStatus};
use crate::modules::campaign::recipients::parse_recipients;
use crate::modules::campaign::render::RenderContext;
use crate::modules::error::code::ErrorCode;
use crate::modules::error::MailBlastResult;
use crate::modules::job::entity::{JobStatus, PreparedJob};
use crate::modules::metrics::MAILBLAST_JOBS_PREPARED_TOTAL;
use crate::modules::track::TrackingInjector;
use crate::{id, raise_error, utc_now};

/// Expands a campaign into per-recipient jobs: parses the recipient list,
/// assigns accounts round-robin, resolves rotation, renders templates, and
/// injects tracking. All content is frozen here so later sends and retries
/// are byte-identical.
///
/// Validation happens before any job is stored, so a failed preparation
/// leaves earlier jobs intact. A successful re-preparation atomically
/// replaces the campaign's previous job set.
pub fn prepare_campaign(campaign_id: u64, account_ids: &[u64]) -> MailBlastResult<Vec<PreparedJob>> {
    let campaign = Campaign::get(campaign_id)?;
    if campaign.status == CampaignStatus::Sending {
        return Err(raise_error!(
            format!(
                "Campaign '{}' is currently sending and cannot be re-prepared.",
                campaign.name
            ),
            ErrorCode::InvalidParameter
        ));
    }

    let recipients = parse_recipients(&campaign.raw_recipients);
    if recipients.is_empty() {
        return Err(raise_error!(
            "Campaign has no recipients after parsing.".into(),
            ErrorCode::InvalidParameter
        ));
    }

    let accounts = resolve_active_accounts(account_ids)?;

    let subjects = rotation_pool(
        campaign.rotation.rotate_subjects,
        &campaign.rotation.subjects,
        &campaign.subject,
    );
    let from_names = rotation_pool(
        campaign.rotation.rotate_from_names,
        &campaign.rotation.from_names,
        campaign.from_name.as_deref().unwrap_or_default(),
    );

    let mut jobs = Vec::with_capacity(recipients.len());
    for (index, recipient) in recipients.iter().enumerate() {
        let account = &accounts[index % accounts.len()];
        // Rotation cursors advance per recipient, independent of account
        // assignment, wrapping modulo each pool's length.
        let subject_template = &subjects[index % subjects.len()];
        let from_name_template = &from_names[index % from_names.len()];

        let context = RenderContext {
            to: recipient,
            from: &account.email,
            from_name: from_name_template,
            subject: subject_template,
            login: account.provider.login_name(),
        };

        let subject = context.render(subject_template);
        let from_name = context.render(from_name_template);
        let text = campaign.text_body.as_deref().map(|t| context.render(t));
        let html = campaign.html_body.as_deref().map(|template| {
            let mut injector = TrackingInjector::new(campaign_id, recipient.clone());
            injector.set_html(context.render(template));
            injector.track_links();
            injector.append_tracking_pixel();
            injector.get_html().to_string()
        });

        jobs.push(PreparedJob {
            id: id!(64),
            campaign_id,
            position: index as u64,
            recipient: recipient.clone(),
            account_id: account.id,
            subject,
            html,
            text,
            from_name: (!from_name.is_empty()).then_some(from_name),
            priority: 0,
            status: JobStatus::Pending,
            retry_count: 0,
            error: None,
            created_at: utc_now!(),
            sent_at: None,
        });
    }

    PreparedJob::replace_for_campaign(campaign_id, jobs.clone());

    let mut campaign = campaign;
    campaign.status = CampaignStatus::Prepared;
    campaign.sent_count = 0;
    campaign.updated_at = utc_now!();
    campaign.save()?;

    MAILBLAST_JOBS_PREPARED_TOTAL.inc_by(jobs.len() as u64);
    info!(
        campaign_id,
        jobs = jobs.len(),
        accounts = accounts.len(),
        "campaign prepared"
    );
    Ok(jobs)
}

fn resolve_active_accounts(account_ids: &[u64]) -> MailBlastResult<Vec<SendingAccount>> {
    if account_ids.is_empty() {
        return Err(raise_error!(
            "At least one sending account is required.".into(),
            ErrorCode::InvalidParameter
        ));
    }
    let mut accounts = Vec::with_capacity(account_ids.len());
    for id in account_ids {
        let account = SendingAccount::get(*id)?;
        if account.enabled {
            accounts.push(account);
        }
    }
    if accounts.is_empty() {
        return Err(raise_error!(
            "None of the selected sending accounts are active.".into(),
            ErrorCode::InvalidParameter
        ));
    }
    Ok(accounts)
}

/// The list a rotation cursor walks: the configured candidates (minus empty
/// entries) when rotation is on, otherwise the single fixed value.
fn rotation_pool(rotate: bool, candidates: &[String], fixed: &str) -> Vec<String> {
    if rotate {
        let pool: Vec<String> = candidates
            .iter()
            .filter(|s| !s.trim().is_empty())
            .cloned()
            .collect();
        if !pool.is_empty() {
            return pool;
        }
    }
    vec![fixed.to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::account::entity::{
        ProviderConfig, RateLimitConfig, ScriptWebhookConfig, SmtpConfig,
    };
    use crate::modules::campaign::entity::RotationConfig;
    use crate::modules::campaign::payload::CampaignCreateRequest;

    fn seed_account(label: &str, email: &str, enabled: bool) -> SendingAccount {
        SendingAccount {
            id: id!(64),
            label: label.into(),
            email: email.into(),
            provider: ProviderConfig::ScriptWebhook(ScriptWebhookConfig {
                endpoint_url: "https://script.example/exec".into(),
            }),
            limits: RateLimitConfig::default(),
            enabled,
            created_at: utc_now!(),
        }
        .save()
        .unwrap()
    }

    fn seed_campaign(recipients: &str, rotation: Option<RotationConfig>) -> Campaign {
        Campaign::new(CampaignCreateRequest {
            name: "test".into(),
            subject: "Hello [to]".into(),
            html_body: Some(
                r#"<html><body><a href="https://example.com/promo">Go</a></body></html>"#.into(),
            ),
            text_body: Some("Plain for [to]".into()),
            from_name: Some("Fixed Name".into()),
            recipients: recipients.into(),
            rotation,
        })
        .unwrap()
        .save()
        .unwrap()
    }

    #[test]
    fn three_recipients_two_accounts_round_robin() {
        let a = seed_account("a", "a@example.com", true);
        let b = seed_account("b", "b@example.com", true);
        let campaign = seed_campaign("r1@x.com, r2@x.com, r3@x.com", None);

        let jobs = prepare_campaign(campaign.id, &[a.id, b.id]).unwrap();
        assert_eq!(jobs.len(), 3);
        assert_eq!(
            jobs.iter().map(|j| j.account_id).collect::<Vec<_>>(),
            vec![a.id, b.id, a.id]
        );
        assert!(jobs.iter().all(|j| j.status == JobStatus::Pending));
        assert_eq!(
            Campaign::get(campaign.id).unwrap().status,
            CampaignStatus::Prepared
        );
    }

    #[test]
    fn content_is_rendered_and_tracked_eagerly() {
        let a = seed_account("c", "sender@example.com", true);
        let campaign = seed_campaign("alice@x.com", None);

        let jobs = prepare_campaign(campaign.id, &[a.id]).unwrap();
        let job = &jobs[0];
        assert_eq!(job.subject, "Hello alice@x.com");
        assert_eq!(job.text.as_deref(), Some("Plain for alice@x.com"));
        let html = job.html.as_deref().unwrap();
        assert!(html.contains("/track/click?campaign="));
        assert!(html.contains("/track/open?campaign="));
        assert_eq!(job.from_name.as_deref(), Some("Fixed Name"));
    }

    #[test]
    fn rotation_cursors_cycle_independently() {
        let a = seed_account("d", "d@example.com", true);
        let rotation = RotationConfig {
            rotate_subjects: true,
            subjects: vec!["S1".into(), "S2".into()],
            rotate_from_names: true,
            from_names: vec!["N1".into(), "N2".into(), "N3".into()],
        };
        let campaign = seed_campaign(
            "r1@x.com, r2@x.com, r3@x.com, r4@x.com, r5@x.com, r6@x.com",
            Some(rotation),
        );

        let jobs = prepare_campaign(campaign.id, &[a.id]).unwrap();
        assert_eq!(
            jobs.iter().map(|j| j.subject.as_str()).collect::<Vec<_>>(),
            vec!["S1", "S2", "S1", "S2", "S1", "S2"]
        );
        assert_eq!(
            jobs.iter()
                .map(|j| j.from_name.as_deref().unwrap())
                .collect::<Vec<_>>(),
            vec!["N1", "N2", "N3", "N1", "N2", "N3"]
        );
    }

    #[test]
    fn disabled_accounts_are_skipped() {
        let active = seed_account("e", "e@example.com", true);
        let disabled = seed_account("f", "f@example.com", false);
        let campaign = seed_campaign("r1@x.com, r2@x.com", None);

        let jobs = prepare_campaign(campaign.id, &[disabled.id, active.id]).unwrap();
        assert!(jobs.iter().all(|j| j.account_id == active.id));
    }

    #[test]
    fn empty_recipient_list_is_rejected() {
        let a = seed_account("g", "g@example.com", true);
        let campaign = seed_campaign("  ,  , ", None);
        assert!(prepare_campaign(campaign.id, &[a.id]).is_err());
    }

    #[test]
    fn only_disabled_accounts_is_rejected() {
        let disabled = seed_account("h", "h@example.com", false);
        let campaign = seed_campaign("r1@x.com", None);
        assert!(prepare_campaign(campaign.id, &[disabled.id]).is_err());
    }

    #[test]
    fn re_preparation_replaces_the_previous_job_set() {
        let a = seed_account("i", "i@example.com", true);
        let campaign = seed_campaign("r1@x.com, r2@x.com", None);

        let first = prepare_campaign(campaign.id, &[a.id]).unwrap();
        let second = prepare_campaign(campaign.id, &[a.id]).unwrap();

        let stored = PreparedJob::list_by_campaign(campaign.id);
        assert_eq!(stored.len(), 2);
        let second_ids: Vec<u64> = second.iter().map(|j| j.id).collect();
        assert!(stored.iter().all(|j| second_ids.contains(&j.id)));
        assert!(stored.iter().all(|j| !first.iter().any(|f| f.id == j.id)));
    }

    #[test]
    fn smtp_login_feeds_the_login_tag() {
        let account = SendingAccount {
            id: id!(64),
            label: "smtp".into(),
            email: "smtp@example.com".into(),
            provider: ProviderConfig::Smtp(SmtpConfig {
                host: "smtp.example.com".into(),
                port: 587,
                encryption: Default::default(),
                username: "login01".into(),
                password: "secret".into(),
            }),
            limits: RateLimitConfig::default(),
            enabled: true,
            created_at: utc_now!(),
        }
        .save()
        .unwrap();

        let campaign = Campaign::new(CampaignCreateRequest {
            name: "login".into(),
            subject: "From [login]".into(),
            html_body: None,
            text_body: Some("body".into()),
            from_name: None,
            recipients: "r@x.com".into(),
            rotation: None,
        })
        .unwrap()
        .save()
        .unwrap();

        let jobs = prepare_campaign(campaign.id, &[account.id]).unwrap();
        assert_eq!(jobs[0].subject, "From login01");
        assert_eq!(jobs[0].html, None);
        assert_eq!(jobs[0].from_name, None);
    }
}
