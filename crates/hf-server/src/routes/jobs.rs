//! Job submission, inspection and cancellation.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use hf_core::JobId;
use hf_jobs::{Job, JobFilter, SubmitRequest};

use crate::context::AppContext;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeRequest {
    /// Playlist URL of the HLS source.
    pub url: String,
    pub device_id: Option<String>,
    pub item_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OptimizeResponse {
    pub id: JobId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListJobsQuery {
    pub device_id: Option<String>,
}

/// Ids that do not parse can never name a job.
fn parse_job_id(raw: &str) -> Option<JobId> {
    raw.parse().ok()
}

/// POST /optimize-version
pub async fn optimize_version(
    State(ctx): State<AppContext>,
    Json(body): Json<OptimizeRequest>,
) -> Result<Json<OptimizeResponse>, AppError> {
    let request = SubmitRequest {
        input_url: body.url,
        device_id: body.device_id,
        item_id: body.item_id,
    };
    let id = ctx.orchestrator.submit(request)?;
    Ok(Json(OptimizeResponse { id }))
}

/// GET /job-status/{id}
pub async fn job_status(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<Job>, AppError> {
    parse_job_id(&id)
        .and_then(|job_id| ctx.orchestrator.status(job_id))
        .map(Json)
        .ok_or_else(|| hf_core::Error::not_found("job", &id).into())
}

/// DELETE /cancel-job/{id}
///
/// Always answers 200; the message says whether anything was cancelled.
pub async fn cancel_job(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Json<MessageResponse> {
    let cancelled = parse_job_id(&id).is_some_and(|job_id| ctx.orchestrator.cancel(job_id));

    let message = if cancelled {
        "Job cancelled"
    } else {
        "Job not found or already completed"
    };
    Json(MessageResponse {
        message: message.to_string(),
    })
}

/// GET /all-jobs?deviceId=
pub async fn all_jobs(
    State(ctx): State<AppContext>,
    Query(query): Query<ListJobsQuery>,
) -> Json<Vec<Job>> {
    let filter = JobFilter {
        device_id: query.device_id.filter(|d| !d.is_empty()),
        ..JobFilter::default()
    };
    Json(ctx.orchestrator.list(&filter))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_is_camel_case() {
        let body: OptimizeRequest = serde_json::from_str(
            r#"{"url":"http://jf/master.m3u8","deviceId":"tv","itemId":"42"}"#,
        )
        .unwrap();
        assert_eq!(body.url, "http://jf/master.m3u8");
        assert_eq!(body.device_id.as_deref(), Some("tv"));
        assert_eq!(body.item_id.as_deref(), Some("42"));
    }

    #[test]
    fn correlation_fields_are_optional() {
        let body: OptimizeRequest = serde_json::from_str(r#"{"url":"x"}"#).unwrap();
        assert!(body.device_id.is_none() && body.item_id.is_none());
    }

    #[test]
    fn garbage_ids_do_not_parse() {
        assert!(parse_job_id("not-a-uuid").is_none());
        assert!(parse_job_id(&JobId::new().to_string()).is_some());
    }
}
