// Copyright © 2025 mailblast.dev
// Licensed under MailBlast License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use poem::{handler, web::Json, IntoResponse};
use serde::Serialize;

use crate::{mailblast_version, utc_now};

#[derive(Serialize)]
pub struct MailBlastStatus {
    pub version: &'static str,
    pub commit: &'static str,
    pub timestamp: i64,
}

#[handler]
pub async fn get_status() -> impl IntoResponse {
    Json(MailBlastStatus {
        version: mailblast_version!(),
        commit: env!("GIT_HASH"),
        timestamp: utc_now!(),
    })
}
