//! Bounding-box drawing and JPEG encoding for captured frames.

use anyhow::{anyhow, Result};
use detect_client::Detection;
use image::{codecs::jpeg::JpegEncoder, ImageBuffer, Rgb};
use video_ingest::Frame;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const BAR_COLOR: Rgb<u8> = Rgb([0, 200, 0]);
const BAR_HEIGHT: i32 = 4;

type RgbImage = ImageBuffer<Rgb<u8>, Vec<u8>>;

/// Encode the raw frame as-is, without annotations. Used as the wire format
/// for the inference service.
pub(crate) fn encode_frame_jpeg(frame: &Frame, jpeg_quality: i32) -> Result<Vec<u8>> {
    let image = frame_to_rgb(frame)?;
    encode_jpeg(&image, jpeg_quality)
}

/// Draw each detection (box outline plus a confidence bar along the top
/// edge) and encode the result.
pub(crate) fn annotate_frame(
    frame: &Frame,
    detections: &[Detection],
    jpeg_quality: i32,
) -> Result<Vec<u8>> {
    let mut image = frame_to_rgb(frame)?;
    let height = frame.height;

    for det in detections {
        let left = det.bbox[0].round() as i32;
        let top = det.bbox[1].round() as i32;
        let right = det.bbox[2].round() as i32;
        let bottom = det.bbox[3].round() as i32;
        draw_rectangle(&mut image, left, top, right, bottom, BOX_COLOR);

        let bar_span = ((right - left) as f32 * det.score.clamp(0.0, 1.0)) as i32;
        if bar_span > 0 {
            fill_rect(
                &mut image,
                left,
                (top - BAR_HEIGHT).max(0),
                left + bar_span,
                top.min(height - 1),
                BAR_COLOR,
            );
        }
    }

    encode_jpeg(&image, jpeg_quality)
}

fn frame_to_rgb(frame: &Frame) -> Result<RgbImage> {
    let rgb = bgr_to_rgb(&frame.data);
    ImageBuffer::from_vec(frame.width as u32, frame.height as u32, rgb)
        .ok_or_else(|| anyhow!("failed to convert frame into image buffer"))
}

fn encode_jpeg(image: &RgbImage, jpeg_quality: i32) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let quality = jpeg_quality.clamp(1, 100) as u8;
    JpegEncoder::new_with_quality(&mut buffer, quality)
        .encode_image(image)
        .map_err(|err| anyhow!("JPEG encode failed: {err}"))?;
    Ok(buffer)
}

fn bgr_to_rgb(input: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(input.len());
    for chunk in input.chunks_exact(3) {
        output.push(chunk[2]);
        output.push(chunk[1]);
        output.push(chunk[0]);
    }
    output
}

fn draw_rectangle(image: &mut RgbImage, left: i32, top: i32, right: i32, bottom: i32, color: Rgb<u8>) {
    let width = image.width() as i32;
    let height = image.height() as i32;
    let left = left.clamp(0, width.saturating_sub(1));
    let right = right.clamp(0, width.saturating_sub(1));
    let top = top.clamp(0, height.saturating_sub(1));
    let bottom = bottom.clamp(0, height.saturating_sub(1));

    for x in left..=right {
        *image.get_pixel_mut(x as u32, top as u32) = color;
        *image.get_pixel_mut(x as u32, bottom as u32) = color;
    }
    for y in top..=bottom {
        *image.get_pixel_mut(left as u32, y as u32) = color;
        *image.get_pixel_mut(right as u32, y as u32) = color;
    }
}

fn fill_rect(image: &mut RgbImage, left: i32, top: i32, right: i32, bottom: i32, color: Rgb<u8>) {
    let width = image.width() as i32;
    let height = image.height() as i32;
    let left = left.clamp(0, width.saturating_sub(1));
    let right = right.clamp(0, width.saturating_sub(1));
    let top = top.clamp(0, height.saturating_sub(1));
    let bottom = bottom.clamp(0, height.saturating_sub(1));

    for y in top..=bottom {
        for x in left..=right {
            *image.get_pixel_mut(x as u32, y as u32) = color;
        }
    }
}

#[cfg(test)]
mod tests {
    use video_ingest::FrameFormat;

    use super::*;

    fn frame(width: i32, height: i32) -> Frame {
        Frame {
            data: vec![127u8; (width * height * 3) as usize],
            width,
            height,
            timestamp_ms: 0,
            format: FrameFormat::Bgr8,
        }
    }

    #[test]
    fn encoded_frame_is_jpeg() {
        let jpeg = encode_frame_jpeg(&frame(16, 16), 85).unwrap();
        assert!(jpeg.starts_with(&[0xFF, 0xD8]));
    }

    #[test]
    fn annotation_handles_out_of_bounds_boxes() {
        let detections = vec![Detection {
            bbox: [-10.0, -10.0, 500.0, 500.0],
            score: 0.9,
            class_id: 0,
        }];
        let jpeg = annotate_frame(&frame(32, 32), &detections, 85).unwrap();
        assert!(jpeg.starts_with(&[0xFF, 0xD8]));
    }

    #[test]
    fn annotation_without_detections_matches_plain_encode() {
        let frame = frame(16, 16);
        let plain = encode_frame_jpeg(&frame, 85).unwrap();
        let annotated = annotate_frame(&frame, &[], 85).unwrap();
        assert_eq!(plain, annotated);
    }
}
