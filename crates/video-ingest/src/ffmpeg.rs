//! FFmpeg-subprocess frame readers.
//!
//! Each reader launches `ffmpeg` decoding the source to raw BGR24 on stdout
//! and forwards fixed-size frames over a bounded channel from a background
//! thread. The small buffer backpressures the decoder when the consumer
//! falls behind.

use std::{
    io::Read,
    process::{Child, Command, Stdio},
    thread,
};

use anyhow::anyhow;
use chrono::Utc;
use crossbeam_channel::{bounded, Receiver, Sender};

use crate::types::{CaptureError, Frame, FrameFormat};

/// Spawn a reader for a local V4L2 camera (`0`, `3`, or `/dev/video0`).
pub fn spawn_device_reader(
    uri: &str,
    target_size: (i32, i32),
) -> Result<Receiver<Result<Frame, CaptureError>>, CaptureError> {
    let device = match parse_device_index(uri) {
        Some(index) => format!("/dev/video{index}"),
        None => uri.to_string(),
    };

    let mut cmd = Command::new("ffmpeg");
    cmd.arg("-hide_banner")
        .arg("-loglevel")
        .arg("error")
        .arg("-f")
        .arg("video4linux2")
        .arg("-i")
        .arg(&device);
    append_output_args(&mut cmd, target_size);

    spawn_reader(cmd, uri, target_size, 2)
}

/// Spawn a reader for an RTSP source.
pub fn spawn_rtsp_reader(
    uri: &str,
    target_size: (i32, i32),
) -> Result<Receiver<Result<Frame, CaptureError>>, CaptureError> {
    let mut cmd = Command::new("ffmpeg");
    cmd.arg("-hide_banner")
        .arg("-loglevel")
        .arg("error")
        .arg("-rtsp_transport")
        .arg("tcp")
        .arg("-fflags")
        .arg("nobuffer")
        .arg("-flags")
        .arg("low_delay")
        .arg("-i")
        .arg(uri);
    append_output_args(&mut cmd, target_size);

    spawn_reader(cmd, uri, target_size, 3)
}

fn append_output_args(cmd: &mut Command, target_size: (i32, i32)) {
    cmd.arg("-an")
        .arg("-vf")
        .arg(format!("scale={}:{}", target_size.0, target_size.1))
        .arg("-pix_fmt")
        .arg("bgr24")
        .arg("-f")
        .arg("rawvideo")
        .arg("-");
}

/// Parse a `/dev/videoX` style URI or bare index.
pub(crate) fn parse_device_index(uri: &str) -> Option<i32> {
    if let Ok(index) = uri.parse::<i32>() {
        return Some(index);
    }
    if let Some(stripped) = uri.strip_prefix("/dev/video") {
        if !stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_digit()) {
            return stripped.parse::<i32>().ok();
        }
    }
    None
}

fn spawn_reader(
    mut cmd: Command,
    uri: &str,
    target_size: (i32, i32),
    queue_size: usize,
) -> Result<Receiver<Result<Frame, CaptureError>>, CaptureError> {
    let (tx, rx) = bounded(queue_size);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit());

    let mut child = cmd.spawn().map_err(|_| CaptureError::Open {
        uri: uri.to_string(),
    })?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| CaptureError::Other(anyhow!("failed to capture ffmpeg stdout")))?;

    thread::spawn(move || {
        if let Err(err) = read_loop(stdout, child, target_size, &tx) {
            let _ = tx.send(Err(err));
        }
    });

    Ok(rx)
}

fn read_loop(
    mut stdout: impl Read,
    mut child: Child,
    target_size: (i32, i32),
    tx: &Sender<Result<Frame, CaptureError>>,
) -> Result<(), CaptureError> {
    let frame_bytes = (target_size.0 as usize) * (target_size.1 as usize) * 3;
    let mut buffer = vec![0u8; frame_bytes];
    let mut result = Ok(());

    loop {
        match stdout.read_exact(&mut buffer) {
            Ok(()) => {
                let frame = Frame {
                    data: buffer.clone(),
                    width: target_size.0,
                    height: target_size.1,
                    timestamp_ms: Utc::now().timestamp_millis(),
                    format: FrameFormat::Bgr8,
                };
                if tx.send(Ok(frame)).is_err() {
                    break;
                }
            }
            Err(err) => {
                result = Err(CaptureError::Other(err.into()));
                break;
            }
        }
    }

    let _ = child.kill();
    result
}
