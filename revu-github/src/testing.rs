//! Local stand-in for the GitHub REST API

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use octocrab::Octocrab;

/// Serve the router built by `app` on an ephemeral port and return its base URL
///
/// `app` receives the base URL so handlers can emit absolute `Link` headers.
pub async fn serve(app: impl FnOnce(String) -> Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let router = app(base.clone());
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
    base
}

/// Unauthenticated client pointed at `base`
pub fn client(base: &str) -> Octocrab {
    Octocrab::builder().base_uri(base).unwrap().build().unwrap()
}

/// Error body in the shape GitHub returns
pub fn github_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(serde_json::json!({
            "message": message,
            "documentation_url": "https://docs.github.com/rest"
        })),
    )
        .into_response()
}
