use axum::extract::State;
use axum::response::Html;
use axum::{routing::get, Router};
use serde_json::json;

use crate::error::AppResult;
use crate::state::AppState;
use crate::templates::ABOUT_US;

/// GET /about_us
async fn about_us(State(state): State<AppState>) -> AppResult<Html<String>> {
    let html = state.templates.render(ABOUT_US, &json!({}))?;
    Ok(Html(html))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/about_us", get(about_us))
}
