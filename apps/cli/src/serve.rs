//! Static file server for previewing a built site.

use std::path::Path;

use axum::Router;
use color_eyre::eyre::{Result, WrapErr};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Router serving every file under `root`; directories answer with their `index.html`.
pub(crate) fn router(root: &Path) -> Router {
    Router::new()
        .fallback_service(ServeDir::new(root).append_index_html_on_directories(true))
        .layer(TraceLayer::new_for_http())
}

/// Serve `root` until interrupted.
pub(crate) async fn serve(root: &Path, bind: &str, port: u16) -> Result<()> {
    let listener = TcpListener::bind((bind, port))
        .await
        .wrap_err_with(|| format!("cannot bind {bind}:{port}"))?;

    info!(root = %root.display(), bind, port, "serving");
    println!("Serving {} on http://{bind}:{port}/ (Ctrl-C to stop)", root.display());

    axum::serve(listener, router(root))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("shutting down");
        })
        .await
        .wrap_err("server error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn get(root: &Path, uri: &str) -> (StatusCode, String) {
        let response = router(root)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    #[tokio::test]
    async fn serves_files_and_directory_indexes() {
        let root = std::env::temp_dir().join(format!("quire-serve-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(root.join("blog")).unwrap();
        std::fs::write(root.join("index.html"), "home").unwrap();
        std::fs::write(root.join("blog/index.html"), "blog").unwrap();
        std::fs::write(root.join("blog/first post.html"), "post").unwrap();

        assert_eq!(get(&root, "/").await, (StatusCode::OK, "home".to_string()));
        assert_eq!(get(&root, "/blog/?page=2").await, (StatusCode::OK, "blog".to_string()));
        assert_eq!(
            get(&root, "/blog/first%20post.html").await,
            (StatusCode::OK, "post".to_string())
        );
        assert_eq!(get(&root, "/missing.html").await.0, StatusCode::NOT_FOUND);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn requests_cannot_climb_out_of_the_root() {
        let base = std::env::temp_dir().join(format!("quire-serve-escape-{}", uuid::Uuid::now_v7()));
        let root = base.join("site");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(base.join("secret.txt"), "secret").unwrap();

        let (status, body) = get(&root, "/../secret.txt").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(!body.contains("secret"));
        let (status, _) = get(&root, "/%2e%2e/secret.txt").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let _ = std::fs::remove_dir_all(&base);
    }
}
