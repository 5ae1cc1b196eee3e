//! ffprobe-backed metadata lookup.

use std::path::Path;
use std::process::{Command, Stdio};

use serde::Deserialize;

use crate::error::{PipelineError, PipelineResult};
use crate::media::VideoMetadata;

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

pub fn probe_video(path: &Path) -> PipelineResult<VideoMetadata> {
    if !path.is_file() {
        return Err(PipelineError::source_unavailable(path, "file not found"));
    }

    let output = Command::new("ffprobe")
        .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| PipelineError::source_unavailable(path, format!("failed to run ffprobe: {e}")))?;

    if !output.status.success() {
        return Err(PipelineError::source_unavailable(
            path,
            format!(
                "ffprobe exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        ));
    }

    parse_probe_output(&output.stdout)
}

fn parse_probe_output(json: &[u8]) -> PipelineResult<VideoMetadata> {
    let probe: FfprobeOutput = serde_json::from_slice(json)
        .map_err(|e| PipelineError::InvalidMetadata(format!("unreadable ffprobe output: {e}")))?;

    let stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| PipelineError::InvalidMetadata("no video stream".to_string()))?;

    // Prefer the container duration; some muxers only report it per stream.
    let duration = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or(stream.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| PipelineError::InvalidMetadata("duration not reported".to_string()))?;

    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .ok_or_else(|| PipelineError::InvalidMetadata("frame rate not reported".to_string()))?;

    VideoMetadata::new(fps, duration, stream.width.unwrap_or(0), stream.height.unwrap_or(0))
}

/// Parses "30000/1001" or "29.97". A zero rate (ffprobe's "0/0") is `None`.
fn parse_frame_rate(s: &str) -> Option<f64> {
    let rate = match s.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => s.trim().parse().ok()?,
    };
    (rate > 0.0).then_some(rate)
}
