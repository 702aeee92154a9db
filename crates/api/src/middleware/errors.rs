//! Error-reporting layer for handler panics.

use std::any::Any;

use axum::body::Body;
use axum::http::{header, Response, StatusCode};
use axum::response::IntoResponse;
use serde_json::json;
use tower_http::catch_panic::{CatchPanicLayer, ResponseForPanic};

/// Builds the 500 response for a caught panic.
///
/// In debug mode the body is a plain-text diagnostic carrying the panic
/// message. Otherwise it is the same sanitized JSON shape `AppError` uses.
#[derive(Debug, Clone, Copy)]
pub struct PanicReporter {
    debug: bool,
}

impl PanicReporter {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }
}

impl ResponseForPanic for PanicReporter {
    type ResponseBody = Body;

    fn response_for_panic(&mut self, err: Box<dyn Any + Send + 'static>) -> Response<Body> {
        let message = panic_message(err.as_ref());
        tracing::error!(panic = %message, "Handler panicked");

        if self.debug {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                format!("Internal Server Error\n\npanic: {message}\n"),
            )
                .into_response()
        } else {
            let body = json!({
                "error": "An internal error occurred",
                "code": "INTERNAL_ERROR",
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response()
        }
    }
}

/// Panic recovery layer wired to [`PanicReporter`].
pub fn catch_panic_layer(debug: bool) -> CatchPanicLayer<PanicReporter> {
    CatchPanicLayer::custom(PanicReporter::new(debug))
}

fn panic_message(err: &(dyn Any + Send)) -> &str {
    if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&'static str>() {
        s
    } else {
        "unknown panic payload"
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::get;
    use axum::Router;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;

    async fn boom() -> &'static str {
        panic!("flux capacitor offline")
    }

    async fn call_panicking_route(debug: bool) -> Response<Body> {
        let app = Router::new()
            .route("/boom", get(boom))
            .layer(catch_panic_layer(debug));
        let request = Request::builder().uri("/boom").body(Body::empty()).unwrap();
        app.oneshot(request).await.unwrap()
    }

    async fn body_text(response: Response<Body>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn debug_mode_reports_the_panic_message() {
        let response = call_panicking_route(true).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
        assert!(body_text(response).await.contains("flux capacitor offline"));
    }

    #[tokio::test]
    async fn production_mode_hides_the_panic_message() {
        let response = call_panicking_route(false).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_text(response).await;
        assert!(!body.contains("flux capacitor"));
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["code"], "INTERNAL_ERROR");
    }

    #[test]
    fn panic_message_handles_both_payload_kinds() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        let other: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "borrowed");
        assert_eq!(panic_message(other.as_ref()), "unknown panic payload");
    }
}
