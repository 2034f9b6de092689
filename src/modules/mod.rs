// Copyright © 2025 mailblast.dev
// Licensed under MailBlast License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

pub mod account;
pub mod analytics;
pub mod campaign;
pub mod dispatch;
pub mod error;
pub mod job;
pub mod limiter;
pub mod logger;
pub mod metrics;
pub mod provider;
pub mod rest;
pub mod settings;
pub mod track;
pub mod utils;
