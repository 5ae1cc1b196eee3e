pub mod ffmpeg;
pub mod mimetype;
pub mod probe;

use std::time::Duration;

use anyhow::Result;
use image::DynamicImage;

use crate::error::{PipelineError, PipelineResult};

/// Stream properties the sampler needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoMetadata {
    pub fps: f64,
    pub duration: Duration,
    pub width: u32,
    pub height: u32,
}

impl VideoMetadata {
    pub fn new(fps: f64, duration_secs: f64, width: u32, height: u32) -> PipelineResult<Self> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(PipelineError::InvalidMetadata(format!("frame rate {fps} is not usable")));
        }
        let duration = Duration::try_from_secs_f64(duration_secs)
            .ok()
            .filter(|d| !d.is_zero())
            .ok_or_else(|| PipelineError::InvalidMetadata(format!("duration {duration_secs}s is not usable")))?;
        Ok(Self {
            fps,
            duration,
            width,
            height,
        })
    }
}

/// A finite, seekable, read-only sequence of images.
pub trait VideoSource {
    fn metadata(&self) -> &VideoMetadata;

    /// Decodes the frame shown at `timestamp`.
    fn frame_at(&self, timestamp: Duration) -> Result<DynamicImage>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_validation() {
        assert!(VideoMetadata::new(30.0, 5.0, 640, 480).is_ok());
        assert!(matches!(
            VideoMetadata::new(0.0, 5.0, 640, 480),
            Err(PipelineError::InvalidMetadata(_))
        ));
        assert!(matches!(
            VideoMetadata::new(30.0, f64::NAN, 640, 480),
            Err(PipelineError::InvalidMetadata(_))
        ));
        assert!(matches!(
            VideoMetadata::new(30.0, 0.0, 640, 480),
            Err(PipelineError::InvalidMetadata(_))
        ));
        assert!(matches!(
            VideoMetadata::new(30.0, 1e30, 640, 480),
            Err(PipelineError::InvalidMetadata(_))
        ));
        assert!(matches!(
            VideoMetadata::new(30.0, 1e-12, 640, 480),
            Err(PipelineError::InvalidMetadata(_))
        ));
    }
}
