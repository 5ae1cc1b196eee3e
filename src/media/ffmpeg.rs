use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use image::DynamicImage;

use crate::error::PipelineResult;
use crate::media::{probe, VideoMetadata, VideoSource};

/// A video file decoded through the ffmpeg CLI, one seek per requested frame.
pub struct FfmpegSource {
    path: PathBuf,
    metadata: VideoMetadata,
}

impl FfmpegSource {
    /// Fails with `SourceUnavailable` or `InvalidMetadata` before any frame is read.
    pub fn open(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = probe::probe_video(&path)?;
        Ok(Self { path, metadata })
    }
}

impl VideoSource for FfmpegSource {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn frame_at(&self, timestamp: Duration) -> Result<DynamicImage> {
        let output = Command::new("ffmpeg")
            .args(["-v", "error", "-ss"])
            .arg(format!("{:.3}", timestamp.as_secs_f64()))
            .arg("-i")
            .arg(&self.path)
            .args(["-frames:v", "1", "-f", "image2pipe", "-c:v", "png", "-"])
            .stdin(Stdio::null())
            .output()
            .context("Failed to spawn ffmpeg command")?;

        if !output.status.success() {
            return Err(anyhow!(
                "ffmpeg exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        if output.stdout.is_empty() {
            return Err(anyhow!("ffmpeg produced no frame at {:?}", timestamp));
        }

        image::load_from_memory(&output.stdout).context("Failed to decode ffmpeg frame")
    }
}
