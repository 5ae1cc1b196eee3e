//! Batch mode: write sampled frames to a directory for later analysis.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::imageops::FilterType;
use indicatif::ProgressBar;
use tracing::{error, info};

use crate::ingest::sampler::FrameSampler;
use crate::media::VideoSource;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractSummary {
    pub written: u64,
    pub write_failures: u64,
    pub skipped: u64,
}

/// File name for the frame at sample index `index`; numbering starts at 1.
pub fn frame_file_name(index: u64) -> String {
    format!("frame_{:04}.jpg", index + 1)
}

/// Inverse of `frame_file_name`: the sample index encoded in a name of the
/// exact form `frame_NNNN` or `snapshot_NNNN` (four or more digits).
pub fn frame_index_from_name(path: &Path) -> Option<u64> {
    let stem = path.file_stem()?.to_str()?;
    let digits = ["frame_", "snapshot_"]
        .iter()
        .find_map(|prefix| stem.strip_prefix(*prefix))?;
    if digits.len() < 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u64>().ok()?.checked_sub(1)
}

pub fn extract_frames<S: VideoSource>(
    sampler: &FrameSampler<S>,
    out_dir: &Path,
    resize: Option<(u32, u32)>,
    progress: &ProgressBar,
) -> Result<ExtractSummary> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output directory {:?}", out_dir))?;

    progress.set_length(sampler.frame_count());
    let mut summary = ExtractSummary::default();
    let mut frames = sampler.frames();

    for frame in frames.by_ref() {
        let image = match resize {
            Some((w, h)) => frame.image.resize_exact(w, h, FilterType::Lanczos3),
            None => frame.image,
        };

        let path: PathBuf = out_dir.join(frame_file_name(frame.index));
        match image.to_rgb8().save(&path) {
            Ok(()) => {
                info!("Saved {:?} ({:?})", path, frame.timestamp);
                summary.written += 1;
            }
            Err(e) => {
                error!("Failed to save {:?}: {}", path, e);
                summary.write_failures += 1;
            }
        }
        progress.set_position(frame.index + 1);
    }

    summary.skipped = frames.skipped();
    progress.finish_and_clear();
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::VideoMetadata;
    use image::{DynamicImage, GenericImageView, RgbImage};
    use std::time::Duration;

    struct Gray(VideoMetadata);

    impl VideoSource for Gray {
        fn metadata(&self) -> &VideoMetadata {
            &self.0
        }

        fn frame_at(&self, _timestamp: Duration) -> anyhow::Result<DynamicImage> {
            Ok(DynamicImage::ImageRgb8(RgbImage::new(32, 16)))
        }
    }

    #[test]
    fn test_frame_file_names_round_trip() {
        assert_eq!(frame_file_name(0), "frame_0001.jpg");
        assert_eq!(frame_file_name(41), "frame_0042.jpg");
        assert_eq!(frame_index_from_name(Path::new("out/frame_0042.jpg")), Some(41));
        assert_eq!(frame_index_from_name(Path::new("snapshot_0001.jpg")), Some(0));
        assert_eq!(frame_index_from_name(Path::new("cover.jpg")), None);
        assert_eq!(frame_index_from_name(Path::new("frame_0000.jpg")), None);
        assert_eq!(frame_index_from_name(Path::new("frame_12345.jpg")), Some(12344));
        assert_eq!(frame_index_from_name(Path::new("frame_001.jpg")), None);
        assert_eq!(frame_index_from_name(Path::new("frame_00-01-00.jpg")), None);
        assert_eq!(frame_index_from_name(Path::new("keyframe_0001.jpg")), None);
        assert_eq!(frame_index_from_name(Path::new("frame_0001_b.jpg")), None);
    }

    #[test]
    fn test_extract_writes_sequential_resized_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let source = Gray(VideoMetadata {
            fps: 30.0,
            duration: Duration::from_secs(3),
            width: 32,
            height: 16,
        });
        let sampler = FrameSampler::new(source, Duration::from_secs(1))?;

        let summary = extract_frames(&sampler, dir.path(), Some((8, 8)), &ProgressBar::hidden())?;
        assert_eq!(summary, ExtractSummary { written: 3, write_failures: 0, skipped: 0 });

        for name in ["frame_0001.jpg", "frame_0002.jpg", "frame_0003.jpg"] {
            let img = image::open(dir.path().join(name))?;
            assert_eq!(img.dimensions(), (8, 8));
        }
        assert!(!dir.path().join("frame_0004.jpg").exists());
        Ok(())
    }
}
