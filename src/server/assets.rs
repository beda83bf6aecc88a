use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use mime_guess::from_path;
use tracing::warn;

use super::{AppState, block};

/// Logo file served next to the block page, at `/<file name>`.
#[derive(Debug)]
pub struct Logo {
    path: PathBuf,
    route: String,
}

impl Logo {
    pub fn new(path: &Path) -> Result<Self> {
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            bail!("logo path {} has no usable file name", path.display());
        };
        let plain = name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_'));
        if !plain || name.starts_with('.') {
            bail!("logo file name {name:?} must be plain ascii letters, digits, '.', '-' or '_'");
        }
        if name == "health" {
            bail!("logo file name must not shadow /health");
        }
        Ok(Self {
            path: path.to_path_buf(),
            route: format!("/{name}"),
        })
    }

    pub fn route(&self) -> &str {
        &self.route
    }
}

/// Serve the logo. A read failure is not an error for the client: the
/// request continues into the block page pipeline.
pub async fn handle_logo(State(state): State<AppState>, headers: HeaderMap, uri: Uri) -> Response {
    match tokio::fs::read(&state.logo.path).await {
        Ok(bytes) => {
            let mime = from_path(&state.logo.path).first_or_octet_stream();
            let content_type = HeaderValue::from_str(mime.as_ref())
                .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, content_type),
                    (header::CACHE_CONTROL, HeaderValue::from_static("public, max-age=86400")),
                ],
                Body::from(bytes),
            )
                .into_response()
        }
        Err(err) => {
            warn!(path = %state.logo.path.display(), error = %err, "failed to read logo");
            block::handle_block(State(state), headers, uri).await
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::*;
    use crate::network::tests::closed_addr;
    use crate::server::router;
    use crate::server::tests::{body_text, test_state};

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

    #[test]
    fn route_uses_file_name() {
        let logo = Logo::new(Path::new("/etc/block-handler/static/netskope-logo.png")).unwrap();
        assert_eq!(logo.route(), "/netskope-logo.png");
    }

    #[test]
    fn rejects_file_names_unfit_for_a_route() {
        for path in ["static/{logo}.png", "static/lo go.png", "static/health", "/"] {
            assert!(Logo::new(Path::new(path)).is_err(), "{path}");
        }
    }

    #[tokio::test]
    async fn serves_logo_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("netskope-logo.png");
        std::fs::write(&path, PNG_MAGIC).unwrap();

        let app = router(test_state(closed_addr().await, path));
        let response = app
            .oneshot(
                Request::get("/netskope-logo.png")
                    .header(header::HOST, "evil.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], PNG_MAGIC);
    }

    #[tokio::test]
    async fn unreadable_logo_falls_through_to_block_page() {
        let app = router(test_state(
            closed_addr().await,
            PathBuf::from("no-such-dir/netskope-logo.png"),
        ));
        let response = app
            .oneshot(
                Request::get("/netskope-logo.png")
                    .header(header::HOST, "evil.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/html; charset=utf-8"
        );
        let html = body_text(response).await;
        assert!(html.contains("URL: https://evil.example/netskope-logo.png"));
    }

    #[tokio::test]
    async fn unreadable_logo_without_host_is_rejected() {
        let app = router(test_state(
            closed_addr().await,
            PathBuf::from("no-such-dir/netskope-logo.png"),
        ));
        let response = app
            .oneshot(Request::get("/netskope-logo.png").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
