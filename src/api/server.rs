//! HTTP API server

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::docker::DockerClient;
use crate::error::Result;
use crate::task::TaskRegistry;
use crate::website::service::WebsiteService;

use super::routes;

pub type SharedState = Arc<WebsiteService>;

/// Run the HTTP API server
pub async fn run_server(config: Config, host: &str, port: u16) -> Result<()> {
    let docker = match DockerClient::new(&config.docker) {
        Ok(client) => Some(client),
        Err(err) => {
            tracing::warn!("Docker unavailable, nginx reloads disabled: {}", err);
            None
        }
    };
    let service = Arc::new(WebsiteService::new(config, docker, TaskRegistry::new()));

    let app = create_router(service);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the router with all routes
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/api/health", get(routes::health))
        // Website routes
        .route("/api/websites", get(routes::list_websites))
        .route("/api/websites", post(routes::create_website))
        .route("/api/websites/{alias}", get(routes::get_website))
        .route("/api/websites/{alias}", put(routes::update_website))
        .route("/api/websites/{alias}", delete(routes::delete_website))
        .route("/api/websites/{alias}/config", get(routes::get_website_config))
        .route("/api/websites/{alias}/config", put(routes::update_website_config))
        .route("/api/websites/{alias}/real-ip", get(routes::get_real_ip_config))
        .route("/api/websites/{alias}/real-ip", post(routes::set_real_ip_config))
        .route("/api/websites/{alias}/cors", get(routes::get_cors))
        .route("/api/websites/{alias}/cors", post(routes::update_cors))
        // Domain routes
        .route("/api/websites/{alias}/domains", get(routes::get_domains))
        .route("/api/websites/{alias}/domains", post(routes::create_domains))
        .route("/api/websites/{alias}/domains", delete(routes::delete_domain))
        // Proxy routes
        .route("/api/websites/{alias}/proxies", get(routes::get_proxies))
        .route("/api/websites/{alias}/proxies", post(routes::operate_proxy))
        .route("/api/websites/{alias}/proxies/file", put(routes::update_proxy_file))
        .route("/api/websites/{alias}/proxy-cache", get(routes::get_proxy_cache))
        .route("/api/websites/{alias}/proxy-cache", put(routes::update_proxy_cache))
        .route("/api/websites/{alias}/proxy-cache", delete(routes::clear_proxy_cache))
        // Upstream routes
        .route("/api/websites/{alias}/upstreams", get(routes::get_upstreams))
        .route("/api/websites/{alias}/upstreams", post(routes::create_upstream))
        .route("/api/websites/{alias}/upstreams", put(routes::update_upstream))
        .route(
            "/api/websites/{alias}/upstreams/{name}",
            delete(routes::delete_upstream),
        )
        // Redirect routes
        .route("/api/websites/{alias}/redirects", get(routes::get_redirects))
        .route("/api/websites/{alias}/redirects", post(routes::operate_redirect))
        .route(
            "/api/websites/{alias}/redirects/file",
            put(routes::update_redirect_file),
        )
        // Auth routes
        .route("/api/websites/{alias}/auth", get(routes::get_auth_basics))
        .route("/api/websites/{alias}/auth", post(routes::update_auth_basic))
        .route("/api/websites/{alias}/path-auth", get(routes::get_path_auths))
        .route("/api/websites/{alias}/path-auth", post(routes::update_path_auth))
        // Rewrite routes
        .route("/api/websites/{alias}/rewrite", get(routes::get_rewrite))
        .route("/api/websites/{alias}/rewrite", put(routes::update_rewrite))
        .route("/api/rewrites", get(routes::list_rewrites))
        .route("/api/rewrites", post(routes::operate_custom_rewrite))
        // Task routes
        .route("/api/tasks", get(routes::list_tasks))
        .route("/api/tasks/{id}", get(routes::get_task))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
