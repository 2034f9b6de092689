// Copyright © 2025 mailblast.dev
// Licensed under MailBlast License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use account::AccountApi;
use campaign::CampaignApi;
use poem_openapi::{OpenApiService, Tags};
use queue::QueueApi;

use crate::mailblast_version;

pub mod account;
pub mod campaign;
pub mod queue;

#[derive(Tags)]
pub enum ApiTags {
    Account,
    Campaign,
    Queue,
}

type MailBlastOpenApi = (AccountApi, CampaignApi, QueueApi);

pub fn create_openapi_service() -> OpenApiService<MailBlastOpenApi, ()> {
    OpenApiService::new(
        (AccountApi, CampaignApi, QueueApi),
        "MailBlastApi",
        mailblast_version!(),
    )
}
