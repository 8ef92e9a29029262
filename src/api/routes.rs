//! API route handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::server::SharedState;
use crate::error::Error;
use crate::website::auth::{AuthBasicUpdate, PathAuthUpdate};
use crate::website::lb::WebsiteUpstream;
use crate::website::proxy::{ProxyCacheUpdate, WebsiteProxyConfig};
use crate::website::redirect::WebsiteRedirect;
use crate::website::rewrite::CustomRewrite;
use crate::website::service::{
    CorsConfig, CreateWebsiteRequest, UpdateWebsiteRequest, WebsiteRealIp,
};

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct DeleteDomainRequest {
    pub domain: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct CreateDomainsRequest {
    pub domains: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct FileUpdateRequest {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ContentRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct RewriteUpdateRequest {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct RewriteQuery {
    #[serde(default = "default_rewrite_name")]
    pub name: String,
}

fn default_rewrite_name() -> String {
    "current".to_string()
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

fn respond<T: Serialize>(result: crate::error::Result<T>) -> Response {
    match result {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::ok(data))).into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: Error) -> Response {
    let status = match &err {
        Error::WebsiteNotFound(_) | Error::NotFound(_) | Error::ConfigNotFound => {
            StatusCode::NOT_FOUND
        }
        e if e.is_validation() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ApiResponse::<()>::err(err.to_string()))).into_response()
}

// Health check

pub async fn health() -> impl IntoResponse {
    Json(ApiResponse::ok("healthy"))
}

// Website routes

pub async fn list_websites(State(service): State<SharedState>) -> Response {
    respond(service.store().list())
}

/// Creation touches the firewall and nginx, so it runs detached; the
/// response carries the task id to poll.
pub async fn create_website(
    State(service): State<SharedState>,
    Json(req): Json<CreateWebsiteRequest>,
) -> impl IntoResponse {
    let tasks = service.tasks().clone();
    let id = tasks
        .start(&format!("create website {}", req.primary_domain))
        .await;
    let svc = service.clone();
    tokio::spawn(async move {
        let result = svc.create_website(req).await;
        tasks
            .finish(id, result.map(|w| w.alias).map_err(|e| e.to_string()))
            .await;
    });
    (StatusCode::ACCEPTED, Json(ApiResponse::ok(id)))
}

pub async fn get_website(
    State(service): State<SharedState>,
    Path(alias): Path<String>,
) -> Response {
    respond(service.store().get(&alias))
}

pub async fn update_website(
    State(service): State<SharedState>,
    Path(alias): Path<String>,
    Json(mut req): Json<UpdateWebsiteRequest>,
) -> Response {
    req.alias = alias;
    respond(service.update_website(req).await)
}

pub async fn delete_website(
    State(service): State<SharedState>,
    Path(alias): Path<String>,
) -> Response {
    respond(service.delete_website(&alias).await)
}

pub async fn get_website_config(
    State(service): State<SharedState>,
    Path(alias): Path<String>,
) -> Response {
    respond(service.get_website_config(&alias))
}

pub async fn update_website_config(
    State(service): State<SharedState>,
    Path(alias): Path<String>,
    Json(req): Json<ContentRequest>,
) -> Response {
    respond(service.update_website_config(&alias, &req.content).await)
}

pub async fn get_real_ip_config(
    State(service): State<SharedState>,
    Path(alias): Path<String>,
) -> Response {
    respond(service.get_real_ip_config(&alias))
}

pub async fn set_real_ip_config(
    State(service): State<SharedState>,
    Path(alias): Path<String>,
    Json(req): Json<WebsiteRealIp>,
) -> Response {
    respond(service.set_real_ip_config(&alias, req).await)
}

pub async fn get_cors(State(service): State<SharedState>, Path(alias): Path<String>) -> Response {
    respond(service.get_cors(&alias))
}

pub async fn update_cors(
    State(service): State<SharedState>,
    Path(alias): Path<String>,
    Json(req): Json<CorsConfig>,
) -> Response {
    respond(service.update_cors(&alias, req).await)
}

// Domain routes

pub async fn get_domains(State(service): State<SharedState>, Path(alias): Path<String>) -> Response {
    respond(service.get_website_domains(&alias))
}

pub async fn create_domains(
    State(service): State<SharedState>,
    Path(alias): Path<String>,
    Json(req): Json<CreateDomainsRequest>,
) -> Response {
    respond(service.create_website_domain(&alias, &req.domains).await)
}

pub async fn delete_domain(
    State(service): State<SharedState>,
    Path(alias): Path<String>,
    Json(req): Json<DeleteDomainRequest>,
) -> Response {
    respond(
        service
            .delete_website_domain(&alias, &req.domain, req.port)
            .await,
    )
}

// Proxy routes

pub async fn get_proxies(State(service): State<SharedState>, Path(alias): Path<String>) -> Response {
    respond(service.get_proxies(&alias))
}

pub async fn operate_proxy(
    State(service): State<SharedState>,
    Path(alias): Path<String>,
    Json(req): Json<WebsiteProxyConfig>,
) -> Response {
    respond(service.operate_proxy(&alias, req).await)
}

pub async fn update_proxy_file(
    State(service): State<SharedState>,
    Path(alias): Path<String>,
    Json(req): Json<FileUpdateRequest>,
) -> Response {
    respond(service.update_proxy_file(&alias, &req.name, &req.content).await)
}

pub async fn get_proxy_cache(
    State(service): State<SharedState>,
    Path(alias): Path<String>,
) -> Response {
    respond(service.get_proxy_cache(&alias))
}

pub async fn update_proxy_cache(
    State(service): State<SharedState>,
    Path(alias): Path<String>,
    Json(req): Json<ProxyCacheUpdate>,
) -> Response {
    respond(service.update_proxy_cache(&alias, req).await)
}

pub async fn clear_proxy_cache(
    State(service): State<SharedState>,
    Path(alias): Path<String>,
) -> Response {
    respond(service.clear_proxy_cache(&alias).await)
}

// Upstream routes

pub async fn get_upstreams(
    State(service): State<SharedState>,
    Path(alias): Path<String>,
) -> Response {
    respond(service.get_upstreams(&alias))
}

pub async fn create_upstream(
    State(service): State<SharedState>,
    Path(alias): Path<String>,
    Json(req): Json<WebsiteUpstream>,
) -> Response {
    respond(service.create_upstream(&alias, req).await)
}

pub async fn update_upstream(
    State(service): State<SharedState>,
    Path(alias): Path<String>,
    Json(req): Json<WebsiteUpstream>,
) -> Response {
    respond(service.update_upstream(&alias, req).await)
}

pub async fn delete_upstream(
    State(service): State<SharedState>,
    Path((alias, name)): Path<(String, String)>,
) -> Response {
    respond(service.delete_upstream(&alias, &name).await)
}

// Redirect routes

pub async fn get_redirects(
    State(service): State<SharedState>,
    Path(alias): Path<String>,
) -> Response {
    respond(service.get_redirects(&alias))
}

pub async fn operate_redirect(
    State(service): State<SharedState>,
    Path(alias): Path<String>,
    Json(req): Json<WebsiteRedirect>,
) -> Response {
    respond(service.operate_redirect(&alias, req).await)
}

pub async fn update_redirect_file(
    State(service): State<SharedState>,
    Path(alias): Path<String>,
    Json(req): Json<FileUpdateRequest>,
) -> Response {
    respond(
        service
            .update_redirect_file(&alias, &req.name, &req.content)
            .await,
    )
}

// Auth routes

pub async fn get_auth_basics(
    State(service): State<SharedState>,
    Path(alias): Path<String>,
) -> Response {
    respond(service.get_auth_basics(&alias))
}

pub async fn update_auth_basic(
    State(service): State<SharedState>,
    Path(alias): Path<String>,
    Json(req): Json<AuthBasicUpdate>,
) -> Response {
    respond(service.update_auth_basic(&alias, req).await)
}

pub async fn get_path_auths(
    State(service): State<SharedState>,
    Path(alias): Path<String>,
) -> Response {
    respond(service.get_path_auth_basics(&alias))
}

pub async fn update_path_auth(
    State(service): State<SharedState>,
    Path(alias): Path<String>,
    Json(req): Json<PathAuthUpdate>,
) -> Response {
    respond(service.update_path_auth(&alias, req).await)
}

// Rewrite routes

pub async fn get_rewrite(
    State(service): State<SharedState>,
    Path(alias): Path<String>,
    Query(query): Query<RewriteQuery>,
) -> Response {
    respond(service.get_rewrite_config(&alias, &query.name))
}

pub async fn update_rewrite(
    State(service): State<SharedState>,
    Path(alias): Path<String>,
    Json(req): Json<RewriteUpdateRequest>,
) -> Response {
    respond(
        service
            .update_rewrite_config(&alias, &req.name, &req.content)
            .await,
    )
}

pub async fn list_rewrites(State(service): State<SharedState>) -> Response {
    respond(service.list_rewrites())
}

pub async fn operate_custom_rewrite(
    State(service): State<SharedState>,
    Json(req): Json<CustomRewrite>,
) -> Response {
    respond(service.operate_custom_rewrite(req))
}

// Task routes

pub async fn list_tasks(State(service): State<SharedState>) -> Response {
    (
        StatusCode::OK,
        Json(ApiResponse::ok(service.tasks().list().await)),
    )
        .into_response()
}

pub async fn get_task(State(service): State<SharedState>, Path(id): Path<Uuid>) -> Response {
    match service.tasks().get(id).await {
        Some(record) => (StatusCode::OK, Json(ApiResponse::ok(record))).into_response(),
        None => error_response(Error::NotFound(id.to_string())),
    }
}
