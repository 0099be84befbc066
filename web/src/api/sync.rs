use actix_web::{get, post, web, HttpResponse};
use serde::Serialize;

use dump::{DumpSettings, Exporter};

use crate::state::AppState;
use crate::web_error::{WResult, WebError};

#[derive(Serialize)]
struct SyncStartReply {
    #[serde(rename = "Id")]
    id: i64,
}

#[derive(Serialize)]
struct SyncStatusReply {
    #[serde(rename = "Id")]
    id: i64,
    #[serde(rename = "Status")]
    status: String,
    #[serde(rename = "Error")]
    error: Option<String>,
}

/// Starts a dump as a detached task and returns its id immediately; progress is
/// polled via `GET /sync/{id}` rather than held open on this request (§6).
#[post("/sync/start")]
pub async fn start(state: web::Data<AppState>, body: web::Json<DumpSettings>) -> WResult<HttpResponse> {
    let settings = body.into_inner();
    let task_id = state.next_task_id();
    let exporter = Exporter::new(settings, task_id, state.store.clone());

    tokio::spawn(async move {
        if let Err(err) = exporter.run().await {
            tracing::error!(task_id, error = %err, "dump task ended with an error");
        }
    });

    Ok(HttpResponse::Ok().json(SyncStartReply { id: task_id }))
}

#[get("/sync/{id}")]
pub async fn status(state: web::Data<AppState>, path: web::Path<i64>) -> WResult<HttpResponse> {
    let id = path.into_inner();
    let record = state.store.get_status(id).map_err(WebError::from)?;

    match record {
        Some(record) => Ok(HttpResponse::Ok().json(SyncStatusReply { id: record.id, status: record.status, error: record.error_text })),
        None => Err(WebError::NotFound(format!("no sync task with id {}", id))),
    }
}
