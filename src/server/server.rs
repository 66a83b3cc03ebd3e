//! # Poll Server - HTTP and WebSocket Surface
//!
//! Wires the [`Dispatcher`] into an axum router:
//!
//! | Route          | Purpose                                   |
//! |----------------|-------------------------------------------|
//! | `GET /ws`      | realtime channel, `?role=...&token=...`   |
//! | `GET /qr`      | placeholder                               |
//! | `/api/health`  | liveness                                  |
//! | `/api/stats`   | current stats snapshot                    |
//! | `/sound/*`     | sound assets                              |
//! | `/video/*`     | video assets                              |
//! | anything else  | public front-end assets                   |

use anyhow::Result;
use axum::{
    extract::{ws::WebSocketUpgrade, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use log::{info, warn};
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::server::access::{AccessPolicy, AssertedRole};
use crate::server::config::ServerConfig;
use crate::server::connection::handle_socket;
use crate::server::coordinator::PollCoordinator;
use crate::server::dispatcher::{Dispatcher, DispatcherHandle};

#[derive(Clone)]
struct AppState {
    dispatcher: DispatcherHandle,
    policy: AccessPolicy,
}

pub struct PollServer {
    config: ServerConfig,
    state: AppState,
}

impl PollServer {
    /// Create the server and start its dispatcher task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: ServerConfig) -> Self {
        let policy = AccessPolicy::from_token(config.poll.admin_token.clone());
        let coordinator = PollCoordinator::new(config.poll.dedup_votes);
        let dispatcher = Dispatcher::spawn(coordinator, policy.clone());

        Self {
            config,
            state: AppState { dispatcher, policy },
        }
    }

    pub fn dispatcher(&self) -> DispatcherHandle {
        self.state.dispatcher.clone()
    }

    pub fn router(&self) -> Router {
        let assets = &self.config.assets;

        Router::new()
            .route("/ws", get(ws_handler))
            .route("/qr", get(qr_placeholder))
            .route("/api/health", get(health_check))
            .route("/api/stats", get(stats_snapshot))
            .nest_service("/sound", ServeDir::new(&assets.sound_dir))
            .nest_service("/video", ServeDir::new(&assets.video_dir))
            .fallback_service(ServeDir::new(&assets.public_dir))
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Bind the configured address and serve until Ctrl-C.
    pub async fn run(self) -> Result<()> {
        let addr = self.config.listen_address();
        let listener = TcpListener::bind(&addr).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let local = listener.local_addr()?;
        info!("🌐 Poll server listening on http://{}", local);
        info!("📡 Realtime endpoint: ws://{}/ws", local);
        if self.state.policy.is_open() {
            warn!("No admin token configured: any connection may issue admin commands");
        }

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Poll server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(asserted): Query<AssertedRole>,
    State(state): State<AppState>,
) -> Response {
    match state.policy.grant(&asserted) {
        Ok(role) => {
            let dispatcher = state.dispatcher.clone();
            ws.on_upgrade(move |socket| handle_socket(socket, role, dispatcher))
        }
        Err(denied) => {
            warn!("Refusing connection claiming role admin: {}", denied);
            (StatusCode::UNAUTHORIZED, denied.to_string()).into_response()
        }
    }
}

async fn qr_placeholder() -> &'static str {
    "QR Endpoint"
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "audience-vote",
    }))
}

async fn stats_snapshot(State(state): State<AppState>) -> Response {
    match state.dispatcher.snapshot().await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    async fn get_body(router: Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_qr_placeholder() {
        let server = PollServer::new(ServerConfig::default());
        let (status, body) = get_body(server.router(), "/qr").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "QR Endpoint");
    }

    #[tokio::test]
    async fn test_stats_endpoint_reports_initial_state() {
        let server = PollServer::new(ServerConfig::default());
        let (status, body) = get_body(server.router(), "/api/stats").await;
        assert_eq!(status, StatusCode::OK);
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"connected": 0, "yes": 0, "no": 0, "step": "WAITING"})
        );
    }

    #[tokio::test]
    async fn test_static_asset_roots() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::default();
        config.assets.public_dir = dir.path().join("public");
        config.assets.sound_dir = dir.path().join("sound");
        config.assets.video_dir = dir.path().join("video");
        for sub in ["public", "sound", "video"] {
            std::fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        std::fs::write(dir.path().join("public/index.html"), "<h1>vote</h1>").unwrap();
        std::fs::write(dir.path().join("sound/drumroll.txt"), "brrrr").unwrap();

        let router = PollServer::new(config).router();

        let (status, body) = get_body(router.clone(), "/index.html").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<h1>vote</h1>");

        let (status, body) = get_body(router.clone(), "/sound/drumroll.txt").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "brrrr");

        let (status, _) = get_body(router, "/video/missing.mp4").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
