//! Client for the external detection-inference service.
//!
//! The service accepts a JPEG frame and returns bounding boxes with class
//! ids and confidence scores. This crate owns the wire types, the class-id →
//! label mapping, confidence filtering, and argmax selection; everything
//! model-related stays on the other side of the HTTP call.

use serde::Deserialize;
use thiserror::Error;

const MAX_DETECTIONS: usize = 512;

/// Single detection returned by the inference service.
#[derive(Debug, Clone, Default)]
pub struct Detection {
    /// Corner-format box in frame pixels: `[x1, y1, x2, y2]`.
    pub bbox: [f32; 4],
    pub score: f32,
    pub class_id: i64,
}

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("inference request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("inference service returned status {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Deserialize)]
struct InferResponse {
    detections: Vec<WireDetection>,
}

#[derive(Deserialize)]
struct WireDetection {
    class_id: i64,
    score: f32,
    bbox: [f32; 4],
}

/// HTTP-backed detector handle.
pub struct DetectorClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    labels: Vec<String>,
    confidence_threshold: f32,
}

impl DetectorClient {
    pub fn new(base_url: &str, labels: Vec<String>) -> Self {
        Self {
            http: reqwest::blocking::Client::new(),
            endpoint: format!("{}/infer", base_url.trim_end_matches('/')),
            labels,
            confidence_threshold: 0.25,
        }
    }

    /// Override the confidence threshold used for filtering detections.
    pub fn with_confidence_threshold(mut self, confidence: f32) -> Self {
        self.confidence_threshold = confidence;
        self
    }

    /// Submit a JPEG frame and return the filtered detections.
    pub fn infer(&self, jpeg: &[u8]) -> Result<Vec<Detection>, DetectError> {
        let response = self
            .http
            .post(&self.endpoint)
            .header("Content-Type", "image/jpeg")
            .body(jpeg.to_vec())
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(DetectError::Status {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }

        let parsed: InferResponse = response.json()?;
        Ok(self.filter(parsed.detections))
    }

    fn filter(&self, wire: Vec<WireDetection>) -> Vec<Detection> {
        wire.into_iter()
            .filter(|det| det.score >= self.confidence_threshold)
            .take(MAX_DETECTIONS)
            .map(|det| Detection {
                bbox: det.bbox,
                score: det.score,
                class_id: det.class_id,
            })
            .collect()
    }

    /// Label for a class id, if the id is within the model's label set.
    pub fn label(&self, class_id: i64) -> Option<&str> {
        usize::try_from(class_id)
            .ok()
            .and_then(|idx| self.labels.get(idx))
            .map(String::as_str)
    }
}

/// Pick the highest-confidence detection, if any.
pub fn best_detection(detections: &[Detection]) -> Option<&Detection> {
    detections
        .iter()
        .max_by(|a, b| a.score.total_cmp(&b.score))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(class_id: i64, score: f32) -> Detection {
        Detection {
            bbox: [0.0, 0.0, 10.0, 10.0],
            score,
            class_id,
        }
    }

    fn client() -> DetectorClient {
        DetectorClient::new(
            "http://localhost:9000/",
            vec!["Vidrio".to_string(), "Aluminio".to_string()],
        )
    }

    #[test]
    fn best_detection_is_argmax() {
        let dets = vec![det(0, 0.41), det(1, 0.93), det(0, 0.52)];
        let best = best_detection(&dets).unwrap();
        assert_eq!(best.class_id, 1);
        assert_eq!(best.score, 0.93);
    }

    #[test]
    fn best_detection_empty_is_none() {
        assert!(best_detection(&[]).is_none());
    }

    #[test]
    fn labels_resolve_only_known_class_ids() {
        let client = client();
        assert_eq!(client.label(0), Some("Vidrio"));
        assert_eq!(client.label(1), Some("Aluminio"));
        assert_eq!(client.label(2), None);
        assert_eq!(client.label(-1), None);
    }

    #[test]
    fn filter_drops_low_confidence() {
        let client = client().with_confidence_threshold(0.5);
        let wire = vec![
            WireDetection {
                class_id: 0,
                score: 0.49,
                bbox: [0.0; 4],
            },
            WireDetection {
                class_id: 1,
                score: 0.51,
                bbox: [0.0; 4],
            },
        ];
        let kept = client.filter(wire);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].class_id, 1);
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        assert_eq!(client().endpoint, "http://localhost:9000/infer");
    }
}
