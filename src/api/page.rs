//! Embedded interaction page

use axum::{Router, http::header, response::Html, response::IntoResponse, routing::get};

const INDEX_HTML: &str = include_str!("../../static/index.html");
const INDEX_JS: &str = include_str!("../../static/index.js");

pub fn router() -> Router {
    Router::new()
        .route("/", get(index))
        .route("/index.js", get(script))
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/javascript; charset=utf-8")],
        INDEX_JS,
    )
}
