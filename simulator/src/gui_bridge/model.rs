use mmwcore::DecodedFrame;
use serde::{Deserialize, Serialize};

/// Immutable copy of the latest frame, shared with display consumers.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VisualizationModel {
    pub frames_seen: usize,
    pub status: String,
    pub latest: Option<DecodedFrame>,
}

impl VisualizationModel {
    pub fn with_frame(&self, frame: &DecodedFrame) -> Self {
        Self {
            frames_seen: self.frames_seen + 1,
            status: self.status.clone(),
            latest: Some(frame.clone()),
        }
    }
}
