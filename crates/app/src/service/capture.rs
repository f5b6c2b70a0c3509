//! Capture loop: frames in, predictions out.
//!
//! One background producer pulls frames from the camera channel, runs the
//! inference call, picks the highest-confidence detection, and replaces the
//! shared snapshot. A watchdog restarts the loop when the camera stops
//! delivering frames.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use crossbeam_channel::RecvTimeoutError;
use detect_client::{best_detection, DetectorClient};
use tracing::{debug, error, warn};
use video_ingest::Frame;

use crate::service::{
    annotate,
    config::{Credentials, ServiceConfig},
    data::{self, FramePacket, Prediction, SharedSnapshot},
    rewards,
    watchdog::{self, CaptureHealth, WatchdogState},
};

/// Result of a single capture-loop run.
pub(crate) enum CaptureOutcome {
    Graceful,
    Restart(&'static str),
}

/// Run the capture loop until shutdown, a capture fault, or a watchdog
/// trigger. `frame_counter` lives with the caller so frame numbers keep
/// advancing across restarts.
pub(crate) fn run_once(
    config: &ServiceConfig,
    credentials: &Credentials,
    shared: SharedSnapshot,
    shutdown: Arc<AtomicBool>,
    frame_counter: &mut u64,
) -> Result<CaptureOutcome> {
    if shutdown.load(Ordering::SeqCst) {
        return Ok(CaptureOutcome::Graceful);
    }

    let detector = DetectorClient::new(&credentials.detector_url, rewards::material_labels())
        .with_confidence_threshold(config.confidence_threshold);

    let target_size = (config.width, config.height);
    let receiver = video_ingest::spawn_camera_reader(&config.camera_uri, target_size)
        .context("Failed to start camera capture")?;

    let health = Arc::new(CaptureHealth::new());
    let running = Arc::new(AtomicBool::new(true));
    let watchdog_state = Arc::new(WatchdogState::new());
    let watchdog_handle = watchdog::spawn_watchdog(
        health.clone(),
        running.clone(),
        shutdown.clone(),
        watchdog_state.clone(),
    );

    let poll_interval = Duration::from_millis(config.poll_interval_ms);
    let mut smoothed_fps: f32 = 0.0;
    let mut last_instant = Instant::now();
    let mut restart_reason: Option<&'static str> = None;

    while running.load(Ordering::Relaxed) {
        if shutdown.load(Ordering::Relaxed) {
            running.store(false, Ordering::SeqCst);
            break;
        }

        match receiver.recv_timeout(poll_interval) {
            Ok(Ok(frame)) => {
                let frame_number = next_frame_number(frame_counter);
                health.beat();

                let now = Instant::now();
                let elapsed = now.duration_since(last_instant).as_secs_f32();
                last_instant = now;
                if elapsed > 0.0 {
                    let instant = 1.0 / elapsed;
                    smoothed_fps = if smoothed_fps == 0.0 {
                        instant
                    } else {
                        0.9 * smoothed_fps + 0.1 * instant
                    };
                }
                metrics::gauge!("greenseed_capture_fps").set(smoothed_fps as f64);

                if config.verbose && frame_number % 30 == 0 {
                    debug!(
                        "Capture heartbeat: frame #{}, {:.1} fps, ts={}",
                        frame_number, smoothed_fps, frame.timestamp_ms
                    );
                }

                if let Err(err) = process_frame(&detector, &frame, frame_number, config, &shared)
                {
                    warn!("frame #{frame_number}: inference failed: {err:#}");
                    metrics::counter!("greenseed_inference_errors_total").increment(1);
                }
            }
            Ok(Err(err)) => {
                error!("Capture error: {err}");
                restart_reason = Some("capture error");
                running.store(false, Ordering::SeqCst);
                break;
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                error!("Frame channel closed");
                restart_reason = Some("capture channel closed");
                running.store(false, Ordering::SeqCst);
                break;
            }
        }
    }

    running.store(false, Ordering::SeqCst);
    let _ = watchdog_handle.join();

    if watchdog_state.is_triggered() {
        return Ok(CaptureOutcome::Restart("capture stalled"));
    }
    if let Some(reason) = restart_reason {
        return Ok(CaptureOutcome::Restart(reason));
    }
    Ok(CaptureOutcome::Graceful)
}

/// Advance the caller-owned frame counter and return the new number, so
/// `X-Sequence` stays monotonic across restarted capture runs.
fn next_frame_number(counter: &mut u64) -> u64 {
    *counter = counter.wrapping_add(1);
    *counter
}

/// Classify a frame and replace the shared snapshot.
fn process_frame(
    detector: &DetectorClient,
    frame: &Frame,
    frame_number: u64,
    config: &ServiceConfig,
    shared: &SharedSnapshot,
) -> Result<()> {
    let raw_jpeg = annotate::encode_frame_jpeg(frame, config.jpeg_quality)?;

    let infer_start = Instant::now();
    let detections = detector.infer(&raw_jpeg)?;
    metrics::histogram!("greenseed_inference_seconds")
        .record(infer_start.elapsed().as_secs_f64());

    let prediction = match best_detection(&detections) {
        Some(best) => match detector.label(best.class_id) {
            Some(material) => Prediction::detected(material, best.score),
            None => {
                debug!(
                    "frame #{frame_number}: detection with unknown class id {}",
                    best.class_id
                );
                Prediction::none()
            }
        },
        None => Prediction::none(),
    };

    let jpeg = if detections.is_empty() {
        raw_jpeg
    } else {
        annotate::annotate_frame(frame, &detections, config.jpeg_quality)?
    };

    data::publish(
        shared,
        FramePacket {
            jpeg,
            timestamp_ms: frame.timestamp_ms,
            frame_number,
        },
        prediction,
    );
    metrics::counter!("greenseed_frames_total").increment(1);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_numbers_continue_across_runs() {
        let mut counter: u64 = 0;
        assert_eq!(next_frame_number(&mut counter), 1);
        assert_eq!(next_frame_number(&mut counter), 2);

        // A restarted loop receives the same counter, not a fresh zero.
        let resumed = &mut counter;
        assert_eq!(next_frame_number(resumed), 3);
    }
}
