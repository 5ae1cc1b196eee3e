use std::sync::Arc;

use tracing::{error, info};

use crate::error::{PipelineError, PipelineResult};
use crate::ml::remote::{ChatPrompt, RemoteError, TextGenerator};
use crate::query::context::ContextAssembler;

pub const SYSTEM_INSTRUCTION: &str = "You are a helpful AI assistant that analyzes video frames. \
     Answer questions about the video using the timestamped frame descriptions you are given.";

pub const NO_DATA_MESSAGE: &str = "No video data available.";
pub const MISSING_KEY_MESSAGE: &str = "OpenAI API key is missing!";
pub const ANSWER_FAILED_MESSAGE: &str = "Failed to get a response from OpenAI.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    Answered(Answer),
    /// Nothing has been stored for the video yet.
    NoContext,
}

/// Fixed user-facing text for a failed `answer` call.
pub fn failure_message(err: &PipelineError) -> &'static str {
    match err {
        PipelineError::AnswererUnavailable(RemoteError::MissingCredential) => MISSING_KEY_MESSAGE,
        PipelineError::AnswererUnavailable(_) => ANSWER_FAILED_MESSAGE,
        _ => NO_DATA_MESSAGE,
    }
}

pub struct QueryAnswerer {
    assembler: ContextAssembler,
    generator: Arc<dyn TextGenerator>,
}

impl QueryAnswerer {
    pub fn new(assembler: ContextAssembler, generator: Arc<dyn TextGenerator>) -> Self {
        Self { assembler, generator }
    }

    /// Answers `question` from the current frame descriptions of `video_id`.
    ///
    /// The remote model is only contacted when there is context to send.
    pub fn answer(&self, video_id: &str, question: &str) -> PipelineResult<QueryOutcome> {
        let Some(context) = self.assembler.try_assemble(video_id)? else {
            info!("No frames stored for video {}; not querying the model", video_id);
            return Ok(QueryOutcome::NoContext);
        };

        info!(
            "Answering question over {} frame descriptions of video {}",
            context.frame_count(),
            video_id
        );
        let prompt = ChatPrompt {
            system: SYSTEM_INSTRUCTION,
            context: context.as_str(),
            question,
        };

        match self.generator.generate(&prompt) {
            Ok(text) => Ok(QueryOutcome::Answered(Answer { text })),
            Err(e) => {
                error!("Text generation failed (retryable: {}): {}", e.is_retryable(), e);
                Err(PipelineError::AnswererUnavailable(e))
            }
        }
    }
}
