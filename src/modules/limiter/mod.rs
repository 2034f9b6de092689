// Copyright © 2025 mailblast.dev
// Licensed under MailBlast License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::LazyLock;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::modules::account::entity::SendingAccount;

pub static RATE_LIMITER: LazyLock<AccountRateLimiter> = LazyLock::new(AccountRateLimiter::new);

const HOUR_MS: i64 = 3_600_000;
const DAY_MS: i64 = 86_400_000;

/// Rolling hour/day counters for one sending account. Created lazily on the
/// first recorded send; reset when wall-clock crosses a window boundary.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct RateWindow {
    pub emails_sent_hour: u32,
    pub emails_sent_day: u32,
    pub hour_window_start: i64,
    pub day_window_start: i64,
    pub last_send_at: i64,
}

/// The limiter's allow/deny decision for a prospective send.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Admission {
    Allowed,
    /// Flow control, not a failure: the job goes back to pending without
    /// consuming a retry.
    Denied { reason: String },
}

/// Tracks per-account send counts against the account's configured hour/day
/// ceilings.
///
/// `admit` is a pure check: it computes what the counters would be after a
/// notional window rollover but persists nothing, so inspection and denials
/// leave stored state untouched. Only `record_send` mutates, and it does so
/// under the map's per-entry lock so concurrent jobs on the same account
/// cannot undercount and silently blow through the ceiling.
pub struct AccountRateLimiter {
    windows: DashMap<u64, RateWindow>,
}

impl AccountRateLimiter {
    pub fn new() -> Self {
        AccountRateLimiter {
            windows: DashMap::new(),
        }
    }

    pub fn admit(&self, account: &SendingAccount, now: i64) -> Admission {
        let window = self
            .windows
            .get(&account.id)
            .map(|w| *w)
            .unwrap_or_default();

        let hour_count = if now - window.hour_window_start >= HOUR_MS {
            0
        } else {
            window.emails_sent_hour
        };
        let day_count = if now - window.day_window_start >= DAY_MS {
            0
        } else {
            window.emails_sent_day
        };

        if let Some(max_per_hour) = account.limits.max_per_hour {
            if hour_count >= max_per_hour {
                return Admission::Denied {
                    reason: format!(
                        "account '{}' reached its hourly limit of {}",
                        account.label, max_per_hour
                    ),
                };
            }
        }
        if let Some(max_per_day) = account.limits.max_per_day {
            if day_count >= max_per_day {
                return Admission::Denied {
                    reason: format!(
                        "account '{}' reached its daily limit of {}",
                        account.label, max_per_day
                    ),
                };
            }
        }
        Admission::Allowed
    }

    /// Records one successful send: rolls any expired window, increments both
    /// counters, and stamps `last_send_at`.
    pub fn record_send(&self, account_id: u64, now: i64) {
        let mut entry = self.windows.entry(account_id).or_insert_with(|| RateWindow {
            hour_window_start: start_of_window(now, HOUR_MS),
            day_window_start: start_of_window(now, DAY_MS),
            ..Default::default()
        });

        if now - entry.hour_window_start >= HOUR_MS {
            entry.emails_sent_hour = 0;
            entry.hour_window_start = start_of_window(now, HOUR_MS);
        }
        if now - entry.day_window_start >= DAY_MS {
            entry.emails_sent_day = 0;
            entry.day_window_start = start_of_window(now, DAY_MS);
        }

        entry.emails_sent_hour += 1;
        entry.emails_sent_day += 1;
        entry.last_send_at = now;
    }

    /// Remaining wait before this account may send again under its configured
    /// inter-send spacing. The caller sleeps inside its own job future, so
    /// pacing one account never blocks sibling jobs.
    pub fn pacing_delay(&self, account: &SendingAccount, now: i64) -> Option<Duration> {
        let interval_ms = account.limits.min_send_interval_secs? as i64 * 1000;
        let last_send_at = self.windows.get(&account.id).map(|w| w.last_send_at)?;
        if last_send_at == 0 {
            return None;
        }
        let elapsed = now - last_send_at;
        if elapsed >= interval_ms {
            None
        } else {
            Some(Duration::from_millis((interval_ms - elapsed) as u64))
        }
    }

    /// Current stored window for an account, if one exists yet.
    pub fn snapshot(&self, account_id: u64) -> Option<RateWindow> {
        self.windows.get(&account_id).map(|w| *w)
    }
}

fn start_of_window(now: i64, window_ms: i64) -> i64 {
    now - now.rem_euclid(window_ms)
}
