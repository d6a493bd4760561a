use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

async fn health() -> Response {
    (StatusCode::OK, [(header::CACHE_CONTROL, "no-store")], "ok").into_response()
}
