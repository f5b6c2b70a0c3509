use std::sync::{Arc, Mutex};

use serde::Serialize;

/// Latest annotated frame, ready to serve.
#[derive(Clone)]
pub(crate) struct FramePacket {
    pub(crate) jpeg: Vec<u8>,
    pub(crate) timestamp_ms: i64,
    pub(crate) frame_number: u64,
}

/// Classification of the most recent frame. Both fields are set together or
/// absent together; the pair is replaced wholesale on every capture
/// iteration.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub(crate) struct Prediction {
    pub(crate) material: Option<String>,
    pub(crate) confidence: Option<f32>,
}

impl Prediction {
    pub(crate) fn detected(material: impl Into<String>, confidence: f32) -> Self {
        Self {
            material: Some(material.into()),
            confidence: Some(confidence.clamp(0.0, 1.0)),
        }
    }

    pub(crate) fn none() -> Self {
        Self::default()
    }
}

/// The single shared mutable region: latest frame and latest prediction,
/// guarded together by one lock.
#[derive(Default)]
pub(crate) struct Snapshot {
    pub(crate) frame: Option<FramePacket>,
    pub(crate) prediction: Prediction,
}

pub(crate) type SharedSnapshot = Arc<Mutex<Snapshot>>;

pub(crate) fn new_shared() -> SharedSnapshot {
    Arc::new(Mutex::new(Snapshot::default()))
}

/// Replace both fields atomically.
pub(crate) fn publish(shared: &SharedSnapshot, frame: FramePacket, prediction: Prediction) {
    if let Ok(mut guard) = shared.lock() {
        guard.frame = Some(frame);
        guard.prediction = prediction;
    }
}

pub(crate) fn latest_frame(shared: &SharedSnapshot) -> Option<FramePacket> {
    match shared.lock() {
        Ok(guard) => guard.frame.clone(),
        Err(_) => None,
    }
}

pub(crate) fn latest_prediction(shared: &SharedSnapshot) -> Prediction {
    match shared.lock() {
        Ok(guard) => guard.prediction.clone(),
        Err(_) => Prediction::none(),
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn packet(frame_number: u64) -> FramePacket {
        FramePacket {
            jpeg: vec![0xFF, 0xD8],
            timestamp_ms: 0,
            frame_number,
        }
    }

    #[test]
    fn confidence_is_clamped_to_unit_interval() {
        assert_eq!(Prediction::detected("Vidrio", 1.7).confidence, Some(1.0));
        assert_eq!(Prediction::detected("Vidrio", -0.2).confidence, Some(0.0));
        assert_eq!(Prediction::detected("Vidrio", 0.42).confidence, Some(0.42));
    }

    #[test]
    fn empty_prediction_serialises_as_nulls() {
        let json = serde_json::to_value(Prediction::none()).unwrap();
        assert_eq!(json, serde_json::json!({"material": null, "confidence": null}));
    }

    #[test]
    fn publish_replaces_both_fields() {
        let shared = new_shared();
        publish(&shared, packet(1), Prediction::detected("Aluminio", 0.9));
        publish(&shared, packet(2), Prediction::none());

        let guard = shared.lock().unwrap();
        assert_eq!(guard.frame.as_ref().unwrap().frame_number, 2);
        assert_eq!(guard.prediction, Prediction::none());
    }

    #[test]
    fn concurrent_reads_never_observe_torn_predictions() {
        let shared = new_shared();
        let writer_shared = shared.clone();
        let writer = thread::spawn(move || {
            for i in 0..2_000u64 {
                let prediction = if i % 2 == 0 {
                    Prediction::detected("Papel", 0.8)
                } else {
                    Prediction::none()
                };
                publish(&writer_shared, packet(i), prediction);
            }
        });

        for _ in 0..2_000 {
            let prediction = latest_prediction(&shared);
            assert_eq!(prediction.material.is_some(), prediction.confidence.is_some());
        }
        writer.join().unwrap();
    }
}
