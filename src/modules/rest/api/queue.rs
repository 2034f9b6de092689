// Copyright © 2025 mailblast.dev
// Licensed under MailBlast License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use poem::web::Path;
use poem_openapi::payload::Json;
use poem_openapi::OpenApi;

use crate::modules::dispatch::entity::SendingQueue;
use crate::modules::rest::api::ApiTags;
use crate::modules::rest::ApiResult;

pub struct QueueApi;

#[OpenApi(prefix_path = "/api/v1", tag = "ApiTags::Queue")]
impl QueueApi {
    /// Retrieves a sending queue with its live completion counters.
    #[oai(path = "/queues/:id", method = "get", operation_id = "get_queue")]
    async fn get_queue(
        &self,
        /// The unique identifier of the queue.
        id: Path<u64>,
    ) -> ApiResult<Json<SendingQueue>> {
        Ok(Json(SendingQueue::get(id.0)?))
    }

    /// Pauses a running queue. In-flight sends finish; no new jobs are
    /// claimed until the queue is resumed.
    #[oai(path = "/queues/:id/pause", method = "post", operation_id = "pause_queue")]
    async fn pause_queue(
        &self,
        /// The unique identifier of the queue to pause.
        id: Path<u64>,
    ) -> ApiResult<()> {
        Ok(SendingQueue::pause(id.0)?)
    }

    /// Resumes a paused queue.
    #[oai(
        path = "/queues/:id/resume",
        method = "post",
        operation_id = "resume_queue"
    )]
    async fn resume_queue(
        &self,
        /// The unique identifier of the queue to resume.
        id: Path<u64>,
    ) -> ApiResult<()> {
        Ok(SendingQueue::resume(id.0)?)
    }
}
