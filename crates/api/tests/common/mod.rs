#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use sakuya_api::config::ServerConfig;
use sakuya_api::router::build_app_router;
use sakuya_api::state::AppState;
use sakuya_api::templates::Templates;

/// Build a test `ServerConfig` with safe defaults.
///
/// Debug mode is off so error bodies match production.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        debug: false,
        host: "127.0.0.1".to_string(),
        port: 0,
        static_dir: PathBuf::from("static"),
        templates_dir: PathBuf::from("templates"),
        request_timeout_secs: 30,
        log_json: false,
    }
}

/// Build the full application router with all middleware layers, using the
/// given database pool and the built-in templates.
pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with(pool, test_config())
}

pub fn build_test_app_with(pool: PgPool, config: ServerConfig) -> Router {
    let templates = Templates::load(&config.templates_dir).unwrap();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        templates: Arc::new(templates),
    };
    build_app_router(state, &config)
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_string(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
