use actix_web::{delete, get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};

use proxy::TargetDbSettings;

use crate::state::AppState;
use crate::web_error::WResult;

/// Body of `POST /proxy/start` (§6). Field names are PascalCase to match the
/// contract the dump engine's own exporter already calls against this route.
#[derive(Debug, Deserialize)]
pub struct ProxyStartBody {
    #[serde(rename = "DbHost")]
    db_host: String,
    #[serde(rename = "DbPort")]
    db_port: u16,
    #[serde(rename = "DbName")]
    db_name: String,
    #[serde(rename = "DbUser")]
    db_user: String,
    #[serde(rename = "DbPassword")]
    db_password: String,
    #[serde(rename = "Count")]
    count: usize,
    #[serde(rename = "MysqlListenAddr")]
    mysql_listen_addr: String,
}

#[derive(Serialize)]
struct ProxyStartReply {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Ports")]
    ports: Vec<u16>,
}

#[derive(Serialize)]
struct ProxyStopReply {
    #[serde(rename = "Ok")]
    ok: String,
}

#[derive(Serialize)]
struct ProxyListEntry {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Ports")]
    ports: Vec<u16>,
    #[serde(rename = "DbName")]
    db_name: String,
}

#[post("/proxy/start")]
pub async fn start(state: web::Data<AppState>, body: web::Json<ProxyStartBody>) -> WResult<HttpResponse> {
    let body = body.into_inner();
    let settings = TargetDbSettings {
        db_user: body.db_user,
        db_password: body.db_password,
        db_host: body.db_host,
        db_port: body.db_port,
        db_name: body.db_name,
    };

    let info = state.registry.start(settings, body.count, &body.mysql_listen_addr).await?;

    Ok(HttpResponse::Ok().json(ProxyStartReply { id: info.id, ports: info.ports }))
}

#[delete("/proxy/{id}/stop")]
pub async fn stop(state: web::Data<AppState>, path: web::Path<String>) -> WResult<HttpResponse> {
    let id = path.into_inner();
    state.registry.stop(&id).await?;

    Ok(HttpResponse::Ok().json(ProxyStopReply { ok: id }))
}

#[get("/proxy")]
pub async fn list(state: web::Data<AppState>) -> HttpResponse {
    let entries: Vec<ProxyListEntry> = state
        .registry
        .list()
        .await
        .into_iter()
        .map(|p| ProxyListEntry { id: p.id, ports: p.ports, db_name: p.db_name })
        .collect();

    HttpResponse::Ok().json(entries)
}
