//! Camera and stream capture via FFmpeg subprocesses.
//!
//! The crate exposes a single entry point, [`spawn_camera_reader`], which
//! picks the right FFmpeg invocation for the source URI and returns a
//! receiver of decoded BGR24 frames.

mod ffmpeg;
mod types;

pub use types::{CaptureError, Frame, FrameFormat};

use crossbeam_channel::Receiver;

/// Spawn a background capture thread for `uri`, decoding to `target_size`.
///
/// RTSP URIs get the network reader; everything else is treated as a local
/// V4L2 device or file path.
pub fn spawn_camera_reader(
    uri: &str,
    target_size: (i32, i32),
) -> Result<Receiver<Result<Frame, CaptureError>>, CaptureError> {
    if is_network_source(uri) {
        ffmpeg::spawn_rtsp_reader(uri, target_size)
    } else {
        ffmpeg::spawn_device_reader(uri, target_size)
    }
}

fn is_network_source(uri: &str) -> bool {
    uri.starts_with("rtsp://") || uri.starts_with("rtsps://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rtsp_uris_take_the_network_path() {
        assert!(is_network_source("rtsp://cam.local/stream"));
        assert!(is_network_source("rtsps://cam.local/stream"));
    }

    #[test]
    fn devices_and_files_take_the_local_path() {
        assert!(!is_network_source("0"));
        assert!(!is_network_source("/dev/video2"));
        assert!(!is_network_source("http://cam.local/stream"));
    }
}
