use std::path::Path;
use std::sync::Arc;

use image::DynamicImage;
use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::ml::encode::EncodedImage;
use crate::ml::remote::{VisionClient, VisionRequest};

/// Stored in place of a description when a frame could not be analysed.
pub const ANALYSIS_FAILED: &str = "Analysis failed";

pub const DESCRIBE_INSTRUCTION: &str = "Analyze objects, people, actions, and text in the given image.";
pub const DESCRIBE_PROMPT: &str = "Analyze this image and describe its contents.";

/// The two ways a frame reaches the analyzer.
#[derive(Debug, Clone, Copy)]
pub enum FrameInput<'a> {
    /// Decoded in memory; never written to disk.
    Image(&'a DynamicImage),
    /// Previously extracted to an image file.
    File(&'a Path),
}

impl FrameInput<'_> {
    pub fn encode(&self) -> PipelineResult<EncodedImage> {
        match self {
            FrameInput::Image(image) => EncodedImage::from_image(image),
            FrameInput::File(path) => EncodedImage::from_file(path),
        }
    }
}

#[derive(Clone)]
pub struct FrameAnalyzer {
    client: Arc<dyn VisionClient>,
}

impl FrameAnalyzer {
    pub fn new(client: Arc<dyn VisionClient>) -> Self {
        Self { client }
    }

    /// Describes one frame. No retries are attempted.
    pub fn analyze(&self, input: FrameInput<'_>) -> PipelineResult<String> {
        let image = input.encode()?;
        debug!("Encoded frame as {} ({} base64 bytes)", image.mime_type, image.base64.len());

        let request = VisionRequest {
            instruction: DESCRIBE_INSTRUCTION,
            prompt: DESCRIBE_PROMPT,
            image: &image,
        };
        self.client
            .describe(&request)
            .map_err(PipelineError::AnalysisUnavailable)
    }

    /// `analyze`, with any failure replaced by [`ANALYSIS_FAILED`].
    pub fn describe_or_sentinel(&self, input: FrameInput<'_>) -> String {
        match self.analyze(input) {
            Ok(description) => description,
            Err(e) => {
                warn!("Frame analysis failed: {}", e);
                ANALYSIS_FAILED.to_string()
            }
        }
    }
}
