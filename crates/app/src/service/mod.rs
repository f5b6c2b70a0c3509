//! Recycling deposit service: capture → classify → serve → reward.
//!
//! The module is split into focused submodules:
//! - `config`: CLI flags and environment credentials.
//! - `capture`: Frame loop pulling from the camera and the inference service.
//! - `annotate`: Bounding-box drawing and JPEG encoding.
//! - `data`: Shared snapshot passed between the capture loop and handlers.
//! - `server`: Actix Web endpoints (stream, prediction, deposit, metrics).
//! - `deposit`: Classify → pay → persist request flow.
//! - `rewards`: Static material → GSEED reward table.
//! - `payout`: Token-transfer signer client.
//! - `persist`: Supabase row-insert client.
//! - `watchdog`: Capture staleness monitoring.
//! - `telemetry`: Tracing and Prometheus wiring.

pub use config::{Credentials, ServiceConfig};

mod annotate;
mod capture;
mod config;
mod data;
mod deposit;
mod payout;
mod persist;
mod rewards;
mod server;
pub(crate) mod telemetry;
mod watchdog;

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Once,
    },
    thread,
    time::Duration,
};

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::service::{
    payout::SignerClient,
    persist::SupabaseStore,
    server::{spawn_http_server, ServerState},
};

/// Run the deposit service, restarting the capture loop on recoverable
/// faults. Returns once a shutdown signal has been observed.
pub fn run(config: ServiceConfig, credentials: Credentials) -> Result<()> {
    static CTRL_HANDLER: Once = Once::new();

    let _ = telemetry::init_metrics_recorder();

    let shutdown = Arc::new(AtomicBool::new(false));
    let handler_shutdown = shutdown.clone();
    CTRL_HANDLER.call_once(move || {
        if let Err(err) = ctrlc::set_handler({
            let handler_shutdown = handler_shutdown.clone();
            move || {
                handler_shutdown.store(true, Ordering::SeqCst);
            }
        }) {
            warn!("Failed to install Ctrl+C handler: {err}");
        }
    });

    let shared = data::new_shared();
    let state = ServerState {
        snapshot: shared.clone(),
        payer: Arc::new(SignerClient::new(
            &credentials.signer_url,
            &credentials.signer_token,
        )),
        store: Arc::new(SupabaseStore::new(
            &credentials.supabase_url,
            &credentials.supabase_service_key,
        )),
    };
    let server = spawn_http_server(state, config.http_port)
        .context("Failed to start HTTP server")?;
    info!(
        "HTTP service available at http://0.0.0.0:{}/video_feed, /predict, /deposit",
        config.http_port
    );

    let mut attempt: u32 = 0;
    let mut frame_counter: u64 = 0;
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        match capture::run_once(
            &config,
            &credentials,
            shared.clone(),
            shutdown.clone(),
            &mut frame_counter,
        ) {
            Ok(capture::CaptureOutcome::Graceful) => break,
            Ok(capture::CaptureOutcome::Restart(reason)) => {
                attempt = attempt.saturating_add(1);
                warn!("Capture loop restarting (reason: {reason}), attempt #{attempt}");
                thread::sleep(Duration::from_secs(1));
            }
            Err(err) => {
                error!("Capture loop error: {err:?}");
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                attempt = attempt.saturating_add(1);
                thread::sleep(Duration::from_secs(1));
            }
        }
    }

    server.stop();
    Ok(())
}
