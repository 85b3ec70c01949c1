use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    BoxError, Json,
};
use serde_json::json;
use tower::timeout::error::Elapsed;

/// Error handler for the request timeout layer. Elapsed deadlines become a
/// 408 in the API's error shape; anything else the stack surfaces is a 500.
pub async fn handle_timeout_error(err: BoxError) -> Response {
    if err.is::<Elapsed>() {
        tracing::warn!("Request exceeded the configured timeout");
        return (
            StatusCode::REQUEST_TIMEOUT,
            Json(json!({
                "success": false,
                "error": "Request timed out",
                "code": "TIMEOUT"
            })),
        )
            .into_response();
    }

    tracing::error!("Unhandled middleware error: {}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "success": false,
            "error": "Internal server error",
            "code": "INTERNAL_ERROR"
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::{body::Body, error_handling::HandleErrorLayer, http::Request, routing::get, Router};
    use http_body_util::BodyExt;
    use tower::{ServiceBuilder, ServiceExt};

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn app(timeout: Duration) -> Router {
        Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "done"
                }),
            )
            .route("/fast", get(|| async { "done" }))
            .layer(
                ServiceBuilder::new()
                    .layer(HandleErrorLayer::new(handle_timeout_error))
                    .timeout(timeout),
            )
    }

    #[tokio::test]
    async fn slow_requests_get_a_408() {
        let app = app(Duration::from_millis(20));

        let response = app
            .clone()
            .oneshot(Request::get("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "TIMEOUT");

        let response = app
            .oneshot(Request::get("/fast").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn other_errors_are_internal() {
        let response = handle_timeout_error("boom".into()).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["code"], "INTERNAL_ERROR");

        let response = handle_timeout_error(Elapsed::new().into()).await;
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }
}
