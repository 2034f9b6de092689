// Copyright © 2025 mailblast.dev
// Licensed under MailBlast License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::LazyLock;

use crate::mailblast_version;
use crate::utc_now;
use prometheus::{
    register_gauge, register_gauge_vec, register_int_counter, register_int_counter_vec, Gauge,
    GaugeVec, IntCounter, IntCounterVec,
};

pub mod endpoint;

pub const SUCCESS: &str = "success";
pub const FAILURE: &str = "failure";
pub const RATE_LIMITED: &str = "rate_limited";

// Metric name constants
pub const METRIC_BUILD_INFO: &str = "mailblast_build_info";
pub const METRIC_START_TIMESTAMP: &str = "mailblast_start_timestamp";
pub const METRIC_EMAIL_SENT_TOTAL: &str = "mailblast_email_sent_total";
pub const METRIC_SEND_ATTEMPTS_TOTAL: &str = "mailblast_send_attempts_total";
pub const METRIC_JOBS_PREPARED_TOTAL: &str = "mailblast_jobs_prepared_total";
pub const METRIC_EMAIL_OPENS_TOTAL: &str = "mailblast_email_opens_total";
pub const METRIC_EMAIL_CLICKS_TOTAL: &str = "mailblast_email_clicks_total";

pub static MAILBLAST_BUILD_INFO: LazyLock<GaugeVec> = LazyLock::new(|| {
    register_gauge_vec!(
        METRIC_BUILD_INFO,
        "Build information including version and commit hash",
        &["version", "commit"]
    )
    .expect("Failed to register mailblast_build_info")
});

pub static MAILBLAST_START_TIMESTAMP: LazyLock<Gauge> = LazyLock::new(|| {
    register_gauge!(
        METRIC_START_TIMESTAMP,
        "Unix timestamp when MailBlast started"
    )
    .expect("Failed to register mailblast_start_timestamp")
});

pub static MAILBLAST_EMAIL_SENT_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        METRIC_EMAIL_SENT_TOTAL,
        "Total number of campaign emails handed to a provider adapter, labeled by outcome",
        &["status"]
    )
    .expect("Failed to register mailblast_email_sent_total")
});

pub static MAILBLAST_SEND_ATTEMPTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        METRIC_SEND_ATTEMPTS_TOTAL,
        "Scheduler decisions per claimed job, labeled by outcome (success, failure, rate_limited)",
        &["status"]
    )
    .expect("Failed to register mailblast_send_attempts_total")
});

pub static MAILBLAST_JOBS_PREPARED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        METRIC_JOBS_PREPARED_TOTAL,
        "Total number of per-recipient jobs materialized by the campaign preparer"
    )
    .expect("Failed to register mailblast_jobs_prepared_total")
});

pub static MAILBLAST_EMAIL_OPENS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        METRIC_EMAIL_OPENS_TOTAL,
        "Total number of open-tracking beacon hits"
    )
    .expect("Failed to register mailblast_email_opens_total")
});

pub static MAILBLAST_EMAIL_CLICKS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        METRIC_EMAIL_CLICKS_TOTAL,
        "Total number of click-redirect hits"
    )
    .expect("Failed to register mailblast_email_clicks_total")
});

pub fn initialize_metrics() {
    MAILBLAST_BUILD_INFO
        .with_label_values(&[mailblast_version!(), env!("GIT_HASH")])
        .set(1.0);
    MAILBLAST_START_TIMESTAMP.set(utc_now!() as f64 / 1000.0);
}
