//! Server bootstrap and route registration
//!
//! Two listeners, as the embedded original runs two httpd instances: the
//! control plane (index page, snapshot button, QR status JSON) is an axum
//! router; the stream plane owns its TCP sockets directly so the session
//! loop observes every chunk-write failure on the multipart connection.

use crate::camera::{normalize, FrameSource};
use crate::config::Config;
use crate::encode::JpegEncoder;
use crate::qr::QrState;
use crate::snapshot::DirStore;
use crate::stream::{StreamSession, StreamTelemetry, WriteSink, STREAM_CONTENT_TYPE};
use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

const INDEX_HTML: &str = include_str!("../../assets/index.html");

const MAX_REQUEST_HEAD: usize = 4096;

/// Shared handler state; cloning is cheap (all arcs).
pub struct AppState<C, E> {
    pub camera: Arc<Mutex<C>>,
    pub encoder: Arc<E>,
    pub telemetry: Arc<StreamTelemetry>,
    pub qr: Arc<QrState>,
    pub store: Arc<DirStore>,
    pub config: Arc<Config>,
}

impl<C, E> Clone for AppState<C, E> {
    fn clone(&self) -> Self {
        Self {
            camera: Arc::clone(&self.camera),
            encoder: Arc::clone(&self.encoder),
            telemetry: Arc::clone(&self.telemetry),
            qr: Arc::clone(&self.qr),
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
        }
    }
}

/// Builds the control-plane router: index page, snapshot, QR status.
pub fn control_router<C, E>(state: AppState<C, E>) -> Router
where
    C: FrameSource + 'static,
    E: JpegEncoder + Send + Sync + 'static,
{
    Router::new()
        .route("/", get(index_handler))
        .route("/button", post(snapshot_handler))
        .route("/qr_status", get(qr_status_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves the control plane on an already-bound listener.
pub async fn serve_control<C, E>(listener: TcpListener, state: AppState<C, E>) -> Result<()>
where
    C: FrameSource + 'static,
    E: JpegEncoder + Send + Sync + 'static,
{
    info!(addr = %listener.local_addr()?, "Control server listening");
    axum::serve(listener, control_router(state)).await?;
    Ok(())
}

async fn index_handler<C, E>(State(state): State<AppState<C, E>>) -> Html<String>
where
    C: FrameSource + 'static,
    E: JpegEncoder + Send + Sync + 'static,
{
    let html = INDEX_HTML.replace(
        "STREAM_PORT_PLACEHOLDER",
        &state.config.server.stream_port().to_string(),
    );
    Html(html)
}

#[derive(Serialize)]
struct SnapshotResponse {
    path: String,
}

async fn snapshot_handler<C, E>(
    State(state): State<AppState<C, E>>,
) -> Result<Json<SnapshotResponse>, StatusCode>
where
    C: FrameSource + 'static,
    E: JpegEncoder + Send + Sync + 'static,
{
    let mut camera = state.camera.lock().await;

    let frame = camera.acquire().await.map_err(|e| {
        error!(error = %e, "Snapshot capture failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let jpeg = match normalize(frame, &mut *camera, state.encoder.as_ref()) {
        Ok(jpeg) => jpeg,
        Err(e) => {
            error!(error = %e, "Snapshot encode failed");
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let persisted = state.store.persist(jpeg.bytes()).await;
    jpeg.release(&mut *camera);

    match persisted {
        Ok(path) => Ok(Json(SnapshotResponse {
            path: path.display().to_string(),
        })),
        Err(e) => {
            error!(error = %e, "Snapshot write failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn qr_status_handler<C, E>(State(state): State<AppState<C, E>>) -> Json<crate::qr::QrStatus>
where
    C: FrameSource + 'static,
    E: JpegEncoder + Send + Sync + 'static,
{
    Json(state.qr.snapshot())
}

/// Serves the stream plane: each accepted connection gets its own session
/// task, and a failed session never affects the accept loop.
pub async fn serve_stream<C, E>(listener: TcpListener, state: AppState<C, E>) -> Result<()>
where
    C: FrameSource + 'static,
    E: JpegEncoder + Send + Sync + 'static,
{
    info!(addr = %listener.local_addr()?, "Stream server listening");

    let session_counter = Arc::new(AtomicU32::new(0));

    loop {
        let (socket, peer) = listener.accept().await?;
        let session_id = session_counter.fetch_add(1, Ordering::SeqCst);
        let state = state.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_stream_client(socket, state, session_id).await {
                warn!(session_id, peer = %peer, error = %e, "Stream connection error");
            }
        });
    }
}

async fn handle_stream_client<C, E>(
    mut socket: TcpStream,
    state: AppState<C, E>,
    session_id: u32,
) -> Result<()>
where
    C: FrameSource + 'static,
    E: JpegEncoder + Send + Sync + 'static,
{
    let (method, path) = read_request_line(&mut socket).await?;

    if method != "GET" || path != "/stream" {
        socket
            .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
            .await?;
        return Ok(());
    }

    let head = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nAccess-Control-Allow-Origin: *\r\nX-Framerate: 60\r\n\r\n",
        &*STREAM_CONTENT_TYPE
    );
    socket.write_all(head.as_bytes()).await?;

    info!(session_id, "Stream session started");

    let session = StreamSession::new(
        Arc::clone(&state.camera),
        Arc::clone(&state.encoder),
        Arc::clone(&state.telemetry),
    );

    let mut sink = WriteSink(socket);
    let err = session.run(&mut sink).await;

    info!(session_id, error = %err, "Stream session ended");
    Ok(())
}

/// Reads the request head and returns (method, path), query stripped.
async fn read_request_line(socket: &mut TcpStream) -> Result<(String, String)> {
    let mut buf = Vec::with_capacity(512);
    let mut chunk = [0u8; 512];

    loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            anyhow::bail!("connection closed before request head");
        }
        buf.extend_from_slice(&chunk[..n]);

        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
        if buf.len() > MAX_REQUEST_HEAD {
            anyhow::bail!("request head too large");
        }
    }

    let head = String::from_utf8_lossy(&buf);
    let request_line = head.lines().next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();

    let method = parts
        .next()
        .ok_or_else(|| anyhow::anyhow!("malformed request line"))?
        .to_string();
    let target = parts
        .next()
        .ok_or_else(|| anyhow::anyhow!("malformed request line"))?;
    let path = target.split('?').next().unwrap_or(target).to_string();

    Ok((method, path))
}
