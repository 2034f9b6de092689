// Copyright © 2025 mailblast.dev
// Licensed under MailBlast License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use poem::web::Path;
use poem_openapi::payload::Json;
use poem_openapi::OpenApi;

use crate::modules::analytics::CampaignEvent;
use crate::modules::campaign::entity::Campaign;
use crate::modules::campaign::payload::{
    CampaignCreateRequest, DispatchCampaignRequest, PrepareCampaignRequest,
};
use crate::modules::campaign::preparer::prepare_campaign;
use crate::modules::dispatch::entity::SendingQueue;
use crate::modules::dispatch::runner::launch_dispatch;
use crate::modules::job::entity::PreparedJob;
use crate::modules::rest::api::ApiTags;
use crate::modules::rest::ApiResult;

pub struct CampaignApi;

#[OpenApi(prefix_path = "/api/v1", tag = "ApiTags::Campaign")]
impl CampaignApi {
    /// Creates a new draft campaign.
    #[oai(path = "/campaigns", method = "post", operation_id = "create_campaign")]
    async fn create_campaign(
        &self,
        /// The campaign creation request payload.
        request: Json<CampaignCreateRequest>,
    ) -> ApiResult<Json<Campaign>> {
        let campaign = Campaign::new(request.0)?;
        Ok(Json(campaign.save()?))
    }

    /// Retrieves a campaign by its identifier.
    #[oai(path = "/campaigns/:id", method = "get", operation_id = "get_campaign")]
    async fn get_campaign(
        &self,
        /// The unique identifier of the campaign.
        id: Path<u64>,
    ) -> ApiResult<Json<Campaign>> {
        Ok(Json(Campaign::get(id.0)?))
    }

    /// Expands the campaign into per-recipient jobs over the given sending
    /// accounts and returns how many jobs were materialized. Re-preparing
    /// replaces any earlier job set.
    #[oai(
        path = "/campaigns/:id/prepare",
        method = "post",
        operation_id = "prepare_campaign"
    )]
    async fn prepare(
        &self,
        /// The unique identifier of the campaign to prepare.
        id: Path<u64>,
        /// The accounts to rotate sends over.
        request: Json<PrepareCampaignRequest>,
    ) -> ApiResult<Json<u64>> {
        let jobs = prepare_campaign(id.0, &request.0.account_ids)?;
        Ok(Json(jobs.len() as u64))
    }

    /// Creates a sending queue for a prepared campaign and starts its runner.
    #[oai(
        path = "/campaigns/:id/dispatch",
        method = "post",
        operation_id = "dispatch_campaign"
    )]
    async fn dispatch(
        &self,
        /// The unique identifier of the campaign to dispatch.
        id: Path<u64>,
        /// Optional concurrency and retry overrides for this run.
        request: Json<DispatchCampaignRequest>,
    ) -> ApiResult<Json<SendingQueue>> {
        Ok(Json(launch_dispatch(id.0, request.0)?))
    }

    /// Lists the campaign's prepared jobs in their prepared order.
    #[oai(
        path = "/campaigns/:id/jobs",
        method = "get",
        operation_id = "list_campaign_jobs"
    )]
    async fn list_jobs(
        &self,
        /// The unique identifier of the campaign.
        id: Path<u64>,
    ) -> ApiResult<Json<Vec<PreparedJob>>> {
        Campaign::get(id.0)?;
        Ok(Json(PreparedJob::list_by_campaign(id.0)))
    }

    /// Lists recorded open and click events for the campaign, oldest first.
    #[oai(
        path = "/campaigns/:id/events",
        method = "get",
        operation_id = "list_campaign_events"
    )]
    async fn list_events(
        &self,
        /// The unique identifier of the campaign.
        id: Path<u64>,
    ) -> ApiResult<Json<Vec<CampaignEvent>>> {
        Campaign::get(id.0)?;
        Ok(Json(CampaignEvent::list_by_campaign(id.0)))
    }
}
