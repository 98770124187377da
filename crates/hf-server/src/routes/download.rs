//! Artifact download.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio_util::io::ReaderStream;

use hf_core::JobId;

use crate::context::AppContext;
use crate::error::AppError;

/// Read buffer for streamed artifacts.
const CHUNK_SIZE: usize = 64 * 1024;

/// GET /download/{id}
///
/// Streams a completed job's artifact. The file and the job are left in
/// place; the retention sweep removes them later.
pub async fn download(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let job_id: JobId = id
        .parse()
        .map_err(|_| hf_core::Error::not_found("job", &id))?;
    let path = ctx.orchestrator.artifact_path(job_id)?;

    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|_| hf_core::Error::not_found("artifact", path.display()))?;
    let size = file.metadata().await.map_err(hf_core::Error::from)?.len();

    tracing::info!(job_id = %job_id, size_bytes = size, "Serving artifact");

    let body = Body::from_stream(ReaderStream::with_capacity(file, CHUNK_SIZE));
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "video/mp4".to_string()),
            (header::CONTENT_LENGTH, size.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{job_id}.mp4\""),
            ),
        ],
        body,
    )
        .into_response())
}
