use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::path::PathBuf;
use tower_http::{
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, TraceLayer},
};

use crate::handlers;
use crate::security::{download_rate_limit, security_middleware};
use crate::state::AppState;

/// Room for multipart boundaries and the `pin` field on top of the file.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.uploads.max_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    // Public routes (no security)
    let public_routes = Router::new().route("/health", get(handlers::health::health_check));

    // Download attempts count against the per-client budget, probes included
    let download_routes = Router::new()
        .route(
            "/download",
            get(handlers::download::download_handler)
                .head(handlers::download::download_probe_handler),
        )
        .route_layer(middleware::from_fn_with_state(
            state.limiter.clone(),
            download_rate_limit,
        ));

    let mut protected_routes = Router::new()
        .route("/upload", post(handlers::upload::upload_handler))
        .merge(download_routes)
        .layer(DefaultBodyLimit::max(body_limit));

    if let Some(dir) = state.settings.static_dir.as_deref() {
        let dir = PathBuf::from(dir);
        protected_routes = protected_routes
            .route_service("/teacher", ServeFile::new(dir.join("teacher.html")))
            .route_service("/student", ServeFile::new(dir.join("student.html")))
            .fallback_service(ServeDir::new(dir).append_index_html_on_directories(true));
    }

    let protected_routes = protected_routes.layer(middleware::from_fn_with_state(
        state.clone(),
        security_middleware,
    ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        // CORS
        .layer(state.origins.cors_layer())
        // Tracing
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::intake::UploadStore;
    use crate::security::{DownloadLimiter, IpWhitelist, OriginPolicy};
    use axum::{
        body::Body,
        extract::connect_info::MockConnectInfo,
        http::{header, Method, Request, Response, StatusCode},
    };
    use chrono::{TimeDelta, Utc};
    use classcast_registry::{DiskStore, ManualClock, SessionRegistry};
    use serde_json::Value;
    use std::net::SocketAddr;
    use std::path::Path;
    use std::sync::Arc;
    use tower::ServiceExt;

    const BOUNDARY: &str = "classcast-test-boundary";
    const PDF: &[u8] = b"%PDF-1.7 lecture";

    struct Harness {
        app: Router,
        clock: Arc<ManualClock>,
        state: AppState,
        _dir: tempfile::TempDir,
    }

    impl Harness {
        fn new() -> Self {
            Self::with(|_| {})
        }

        fn with(tweak: impl FnOnce(&mut Settings)) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let mut settings = Settings::default();
            settings.storage.upload_dir = dir.path().to_string_lossy().to_string();
            tweak(&mut settings);

            let clock = Arc::new(ManualClock::new(Utc::now()));
            let registry = Arc::new(SessionRegistry::new(
                settings.registry_config().unwrap(),
                clock.clone(),
                Arc::new(DiskStore),
            ));

            let state = AppState {
                uploads: Arc::new(UploadStore::new(&settings.storage)),
                limiter: Arc::new(DownloadLimiter::new(&settings.rate_limit)),
                ip_whitelist: Arc::new(IpWhitelist::new(&settings.security.allowed_ips).unwrap()),
                origins: Arc::new(OriginPolicy::new(
                    vec!["192.168.1.10".parse().unwrap()],
                    settings.server.port,
                    &settings.security.extra_origins,
                )),
                registry,
                settings: Arc::new(settings),
            };

            Self {
                app: build_router(state.clone()),
                clock,
                state,
                _dir: dir,
            }
        }

        fn upload_dir(&self) -> &Path {
            self._dir.path()
        }

        async fn send_from(&self, peer: [u8; 4], request: Request<Body>) -> Response<Body> {
            self.app
                .clone()
                .layer(MockConnectInfo(SocketAddr::from((peer, 50000))))
                .oneshot(request)
                .await
                .unwrap()
        }

        async fn send(&self, request: Request<Body>) -> Response<Body> {
            self.send_from([192, 168, 1, 20], request).await
        }

        async fn upload(&self, name: &str, mime: &str, bytes: &[u8], pin: Option<&str>) -> Response<Body> {
            self.send(upload_request("/upload", Some((name, mime, bytes)), pin)).await
        }

        async fn upload_code(&self, pin: Option<&str>) -> String {
            let response = self.upload("slides.pdf", "application/pdf", PDF, pin).await;
            assert_eq!(response.status(), StatusCode::OK);
            json(response).await["code"].as_str().unwrap().to_string()
        }

        async fn download(&self, method: Method, query: &str) -> Response<Body> {
            let request = Request::builder()
                .method(method)
                .uri(format!("/download?{}", query))
                .body(Body::empty())
                .unwrap();
            self.send(request).await
        }

        fn stored_files(&self) -> usize {
            std::fs::read_dir(self.upload_dir()).unwrap().count()
        }
    }

    fn upload_request(uri: &str, file: Option<(&str, &str, &[u8])>, pin: Option<&str>) -> Request<Body> {
        let mut body: Vec<u8> = Vec::new();

        if let Some((name, mime, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\nContent-Type: {mime}\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        if let Some(pin) = pin {
            body.extend_from_slice(
                format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"pin\"\r\n\r\n{pin}\r\n")
                    .as_bytes(),
            );
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_bytes(response: Response<Body>) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    async fn json(response: Response<Body>) -> Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    #[tokio::test]
    async fn test_upload_probe_and_download() {
        let h = Harness::new();

        let response = h.upload("my slides.pdf", "application/pdf", PDF, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        let code = body["code"].as_str().unwrap().to_string();
        assert_eq!(code.len(), 6);
        assert_eq!(body["expiresIn"], 600);
        assert_eq!(body["file"], "my slides.pdf");
        assert_eq!(body["pinRequired"], false);
        assert_eq!(h.stored_files(), 1);

        let probe = h.download(Method::HEAD, &format!("code={}", code)).await;
        assert_eq!(probe.status(), StatusCode::OK);
        assert_eq!(probe.headers()[header::CONTENT_LENGTH], PDF.len().to_string().as_str());
        let disposition = probe.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
        assert!(disposition.starts_with("attachment; filename=\"my slides.pdf\""));
        assert!(body_bytes(probe).await.is_empty());

        let download = h.download(Method::GET, &format!("code={}", code)).await;
        assert_eq!(download.status(), StatusCode::OK);
        assert_eq!(download.headers()[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(body_bytes(download).await, PDF);

        // Within TTL the code keeps working
        let again = h.download(Method::GET, &format!("code={}", code)).await;
        assert_eq!(again.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_pin_gate_from_form_field() {
        let h = Harness::new();
        let response = h.upload("quiz.pdf", "application/pdf", PDF, Some("1234")).await;
        let body = json(response).await;
        assert_eq!(body["pinRequired"], true);
        let code = body["code"].as_str().unwrap().to_string();

        let missing = h.download(Method::GET, &format!("code={}", code)).await;
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json(missing).await["error"], "Unauthorized");

        let wrong = h.download(Method::HEAD, &format!("code={}&pin=0000", code)).await;
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

        let right = h.download(Method::GET, &format!("code={}&pin=1234", code)).await;
        assert_eq!(right.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_pin_from_query_string() {
        let h = Harness::new();
        let request = upload_request("/upload?pin=4321", Some(("a.png", "image/png", &b"\x89PNG"[..])), None);
        let body = json(h.send(request).await).await;
        assert_eq!(body["pinRequired"], true);
        let code = body["code"].as_str().unwrap().to_string();

        let right = h.download(Method::HEAD, &format!("code={}&pin=4321", code)).await;
        assert_eq!(right.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_empty_pin_means_no_gate() {
        let h = Harness::new();
        let response = h.upload("a.pdf", "application/pdf", PDF, Some("")).await;
        let body = json(response).await;
        assert_eq!(body["pinRequired"], false);

        let code = body["code"].as_str().unwrap().to_string();
        let download = h.download(Method::GET, &format!("code={}", code)).await;
        assert_eq!(download.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_overlong_pin_rejected_and_file_removed() {
        let h = Harness::new();
        let pin = "9".repeat(33);
        let response = h.upload("a.pdf", "application/pdf", PDF, Some(&pin)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(h.stored_files(), 0);
        assert!(h.state.registry.is_empty());
    }

    #[tokio::test]
    async fn test_bad_codes_are_not_found() {
        let h = Harness::new();

        for query in ["", "code=", "code=12345", "code=12a456", "code=1234567"] {
            let response = h.download(Method::GET, query).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "query {:?}", query);
            assert_eq!(json(response).await["message"], "Invalid or missing code.");
        }

        let unknown = h.download(Method::GET, "code=654321").await;
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
        assert_eq!(json(unknown).await["message"], "Code not found or expired.");
    }

    #[tokio::test]
    async fn test_expired_code_is_gone_then_not_found() {
        let h = Harness::new();
        let code = h.upload_code(None).await;

        h.clock.advance(TimeDelta::seconds(601));

        let expired = h.download(Method::GET, &format!("code={}", code)).await;
        assert_eq!(expired.status(), StatusCode::GONE);
        assert_eq!(json(expired).await["message"], "File expired.");
        assert_eq!(h.stored_files(), 0);

        let after = h.download(Method::GET, &format!("code={}", code)).await;
        assert_eq!(after.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_expiry_beats_pin_check() {
        let h = Harness::new();
        let code = h.upload_code(Some("1234")).await;

        h.clock.advance(TimeDelta::seconds(600));

        let probe = h.download(Method::HEAD, &format!("code={}", code)).await;
        assert_eq!(probe.status(), StatusCode::GONE);
    }

    #[tokio::test]
    async fn test_deleted_file_is_gone_then_not_found() {
        let h = Harness::new();
        let code = h.upload_code(None).await;

        for entry in std::fs::read_dir(h.upload_dir()).unwrap() {
            std::fs::remove_file(entry.unwrap().path()).unwrap();
        }

        let gone = h.download(Method::GET, &format!("code={}", code)).await;
        assert_eq!(gone.status(), StatusCode::GONE);
        assert_eq!(json(gone).await["message"], "File deleted before download.");

        let after = h.download(Method::HEAD, &format!("code={}", code)).await;
        assert_eq!(after.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_sweep_removes_expired_upload() {
        let h = Harness::new();
        let code = h.upload_code(None).await;

        h.clock.advance(TimeDelta::seconds(601));
        assert_eq!(h.state.registry.sweep_expired(h.state.registry.now()), 1);
        assert_eq!(h.stored_files(), 0);

        let after = h.download(Method::GET, &format!("code={}", code)).await;
        assert_eq!(after.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_upload_rejections() {
        let h = Harness::new();

        let bad_type = h.upload("run.exe", "application/x-msdownload", b"MZ", None).await;
        assert_eq!(bad_type.status(), StatusCode::BAD_REQUEST);

        let empty = h.upload("empty.pdf", "application/pdf", b"", None).await;
        assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(empty).await["message"], "Cannot upload zero-byte file.");

        let no_file = h.send(upload_request("/upload", None, Some("1234"))).await;
        assert_eq!(no_file.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(no_file).await["message"], "No file uploaded.");

        assert_eq!(h.stored_files(), 0);
        assert!(h.state.registry.is_empty());
    }

    #[tokio::test]
    async fn test_oversize_upload_is_413() {
        let h = Harness::with(|s| s.storage.max_upload_bytes = 8);

        let response = h.upload("big.pdf", "application/pdf", PDF, None).await;

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(h.stored_files(), 0);
    }

    #[tokio::test]
    async fn test_download_rate_limit_counts_probes() {
        let h = Harness::new();

        for _ in 0..10 {
            let response = h.download(Method::HEAD, "code=000000").await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }

        let limited = h.download(Method::GET, "code=000000").await;
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(json(limited).await["error"], "TooManyRequests");

        // Another client still has its own budget
        let request = Request::builder()
            .uri("/download?code=000000")
            .body(Body::empty())
            .unwrap();
        let other = h.send_from([192, 168, 1, 21], request).await;
        assert_eq!(other.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_public_peer_is_forbidden() {
        let h = Harness::new();
        let request = Request::builder()
            .uri("/download?code=123456")
            .body(Body::empty())
            .unwrap();

        let response = h.send_from([8, 8, 8, 8], request).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_forwarded_for_trusted_only_from_loopback() {
        let h = Harness::new();

        let proxied = Request::builder()
            .uri("/download?code=123456")
            .header("x-forwarded-for", "203.0.113.9")
            .body(Body::empty())
            .unwrap();
        let response = h.send_from([127, 0, 0, 1], proxied).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let spoofed = Request::builder()
            .uri("/download?code=123456")
            .header("x-forwarded-for", "203.0.113.9")
            .body(Body::empty())
            .unwrap();
        let response = h.send(spoofed).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_origin_policy() {
        let h = Harness::new();

        let foreign = Request::builder()
            .uri("/download?code=123456")
            .header(header::ORIGIN, "http://evil.example")
            .body(Body::empty())
            .unwrap();
        let response = h.send(foreign).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let lan = Request::builder()
            .uri("/download?code=123456")
            .header(header::ORIGIN, "http://192.168.1.10:3000")
            .body(Body::empty())
            .unwrap();
        let response = h.send(lan).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://192.168.1.10:3000"
        );
    }

    #[tokio::test]
    async fn test_health_reports_sessions() {
        let h = Harness::new();
        h.upload_code(None).await;

        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = h.send_from([8, 8, 8, 8], request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["active_sessions"], 1);
        assert_eq!(body["stored_bytes"], PDF.len() as u64);
        assert_eq!(body["counters"]["created_total"], 1);
    }

    #[tokio::test]
    async fn test_static_pages_served_when_configured() {
        let pages = tempfile::tempdir().unwrap();
        std::fs::write(pages.path().join("teacher.html"), "<h1>Teacher</h1>").unwrap();
        std::fs::write(pages.path().join("style.css"), "body{}").unwrap();
        let dir = pages.path().to_string_lossy().to_string();
        let h = Harness::with(move |s| s.static_dir = Some(dir));

        let request = Request::builder().uri("/teacher").body(Body::empty()).unwrap();
        let response = h.send(request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"<h1>Teacher</h1>");

        let request = Request::builder().uri("/style.css").body(Body::empty()).unwrap();
        assert_eq!(h.send(request).await.status(), StatusCode::OK);

        let request = Request::builder().uri("/nope.html").body(Body::empty()).unwrap();
        assert_eq!(h.send(request).await.status(), StatusCode::NOT_FOUND);
    }
}
