//! Actix Web surface: MJPEG stream, latest prediction, deposit endpoint,
//! and Prometheus metrics.
//!
//! The server runs on a dedicated thread so the capture loop never touches
//! the Actix runtime. Handlers only ever read the shared snapshot; slow
//! stream clients simply skip frames because every tick re-reads "latest".

use std::{sync::Arc, time::Duration};

use actix_web::{
    http::{header, Method},
    web::{self, Bytes},
    App, HttpResponse, HttpServer,
};
use anyhow::{Context, Result};
use async_stream::stream;
use tokio::sync::oneshot;
use tracing::error;

use crate::service::{
    data::{self, SharedSnapshot},
    deposit,
    payout::TokenTransfer,
    persist::DepositStore,
    telemetry,
};

const STREAM_BOUNDARY: &str = "frame";
const STREAM_TICK: Duration = Duration::from_millis(33);

/// Shared state backing HTTP handlers.
#[derive(Clone)]
pub(crate) struct ServerState {
    pub(crate) snapshot: SharedSnapshot,
    pub(crate) payer: Arc<dyn TokenTransfer>,
    pub(crate) store: Arc<dyn DepositStore>,
}

#[derive(Default)]
/// Handle for the HTTP server thread.
pub(crate) struct HttpHandle {
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl HttpHandle {
    /// Signal the server to stop and block until the thread exits.
    pub(crate) fn stop(self) {
        if let Some(tx) = self.shutdown {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle {
            let _ = handle.join();
        }
    }
}

/// Spawn the HTTP server thread and return a handle that can stop it.
pub(crate) fn spawn_http_server(state: ServerState, port: u16) -> Result<HttpHandle> {
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let handle = std::thread::Builder::new()
        .name("greenseed-http".into())
        .spawn(move || {
            if let Err(err) = actix_web::rt::System::new().block_on(async move {
                let server = HttpServer::new(move || {
                    App::new()
                        .app_data(web::Data::new(state.clone()))
                        .route("/video_feed", web::get().to(stream_handler))
                        .route("/predict", web::get().to(predict_handler))
                        .route("/deposit", web::post().to(deposit::deposit_handler))
                        .route("/deposit", web::method(Method::OPTIONS).to(deposit::deposit_preflight))
                        .route("/metrics", web::get().to(metrics_handler))
                })
                .bind(("0.0.0.0", port))?
                .run();

                let srv_handle = server.handle();
                actix_web::rt::spawn(async move {
                    let _ = shutdown_rx.await;
                    srv_handle.stop(true).await;
                });

                server.await
            }) {
                error!("HTTP server error: {err}");
            }
        })
        .context("Failed to spawn HTTP server thread")?;
    Ok(HttpHandle {
        shutdown: Some(shutdown_tx),
        handle: Some(handle),
    })
}

/// Frame one packet as a multipart chunk.
fn multipart_chunk(packet: &data::FramePacket) -> Vec<u8> {
    let mut payload = Vec::with_capacity(packet.jpeg.len() + 96);
    payload.extend_from_slice(format!("--{STREAM_BOUNDARY}\r\n").as_bytes());
    payload.extend_from_slice(format!("X-Sequence: {}\r\n", packet.frame_number).as_bytes());
    payload.extend_from_slice(format!("X-Timestamp: {}\r\n", packet.timestamp_ms).as_bytes());
    payload.extend_from_slice(b"Content-Type: image/jpeg\r\n\r\n");
    payload.extend_from_slice(&packet.jpeg);
    payload.extend_from_slice(b"\r\n");
    payload
}

/// Stream the annotated feed over a multipart response.
async fn stream_handler(state: web::Data<ServerState>) -> HttpResponse {
    let state = state.clone();
    let stream = stream! {
        let mut interval = actix_web::rt::time::interval(STREAM_TICK);
        loop {
            interval.tick().await;
            if let Some(packet) = data::latest_frame(&state.snapshot) {
                yield Ok::<Bytes, actix_web::Error>(Bytes::from(multipart_chunk(&packet)));
            }
        }
    };

    HttpResponse::Ok()
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .insert_header((header::ACCESS_CONTROL_ALLOW_METHODS, "GET"))
        .append_header(("Cache-Control", "no-cache"))
        .append_header((
            "Content-Type",
            format!("multipart/x-mixed-replace; boundary={STREAM_BOUNDARY}"),
        ))
        .streaming(stream)
}

/// Return the latest prediction as JSON (nulls when nothing is detected).
async fn predict_handler(state: web::Data<ServerState>) -> HttpResponse {
    HttpResponse::Ok()
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .json(data::latest_prediction(&state.snapshot))
}

/// Render process metrics for Prometheus scrapes.
async fn metrics_handler() -> HttpResponse {
    match telemetry::prometheus_handle() {
        Some(handle) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(handle.render()),
        None => HttpResponse::ServiceUnavailable().finish(),
    }
}

#[cfg(test)]
mod tests {
    use actix_web::test;
    use serde_json::{json, Value};

    use super::*;
    use crate::service::{
        data::{FramePacket, Prediction},
        persist::DepositRecord,
    };

    struct NoopPayer;

    impl TokenTransfer for NoopPayer {
        fn transfer(&self, _to: &str, _amount: f64) -> anyhow::Result<String> {
            Ok("0x0".to_string())
        }
    }

    struct NoopStore;

    impl DepositStore for NoopStore {
        fn insert(&self, _record: &DepositRecord) -> anyhow::Result<Value> {
            Ok(Value::Null)
        }
    }

    fn test_state() -> ServerState {
        ServerState {
            snapshot: data::new_shared(),
            payer: Arc::new(NoopPayer),
            store: Arc::new(NoopStore),
        }
    }

    #[actix_web::test]
    async fn multipart_chunk_is_framed_correctly() {
        let chunk = multipart_chunk(&FramePacket {
            jpeg: vec![0xFF, 0xD8, 0xFF, 0xD9],
            timestamp_ms: 42,
            frame_number: 7,
        });
        let header = b"--frame\r\nX-Sequence: 7\r\nX-Timestamp: 42\r\nContent-Type: image/jpeg\r\n\r\n";
        assert!(chunk.starts_with(header));
        assert!(chunk.ends_with(&[0xFF, 0xD9, b'\r', b'\n']));
    }

    #[actix_web::test]
    async fn predict_returns_nulls_before_first_frame() {
        let state = test_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/predict", web::get().to(predict_handler)),
        )
        .await;
        let req = test::TestRequest::get().uri("/predict").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!({"material": null, "confidence": null}));
    }

    #[actix_web::test]
    async fn predict_returns_the_published_prediction() {
        let state = test_state();
        data::publish(
            &state.snapshot,
            FramePacket {
                jpeg: vec![0xFF, 0xD8],
                timestamp_ms: 1,
                frame_number: 1,
            },
            Prediction::detected("Aluminio", 0.91),
        );
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/predict", web::get().to(predict_handler)),
        )
        .await;
        let req = test::TestRequest::get().uri("/predict").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["material"], json!("Aluminio"));
        assert_eq!(body["confidence"], json!(0.91f32));
    }
}
