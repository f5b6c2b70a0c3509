use anyhow::Error;
use thiserror::Error;

/// One decoded frame off the FFmpeg pipe: packed pixel bytes
/// (`width * height * 3` for BGR24) plus the wall-clock capture time.
pub struct Frame {
    pub data: Vec<u8>,
    pub width: i32,
    pub height: i32,
    pub timestamp_ms: i64,
    pub format: FrameFormat,
}

/// Pixel layout of [`Frame::data`].
#[derive(Clone, Copy)]
pub enum FrameFormat {
    /// Interleaved blue-green-red, one byte per channel (FFmpeg `bgr24`).
    Bgr8,
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to open video source {uri:?}")]
    Open { uri: String },
    #[error(transparent)]
    Other(#[from] Error),
}
