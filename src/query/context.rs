use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::database::repo::{AnalysisStore, FrameRecord};
use crate::error::PipelineResult;

/// Frame descriptions of one video, rendered as ordered
/// `At {seconds} sec: {description}` lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisContext {
    text: String,
    frames: usize,
}

impl AnalysisContext {
    /// Renders `records` in the order given. Returns `None` for an empty slice.
    pub fn render(records: &[FrameRecord]) -> Option<Self> {
        if records.is_empty() {
            return None;
        }
        let text = records
            .iter()
            .map(|r| format!("At {} sec: {}", r.seconds_label(), r.description))
            .collect::<Vec<_>>()
            .join("\n");
        Some(Self {
            text,
            frames: records.len(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn frame_count(&self) -> usize {
        self.frames
    }
}

impl fmt::Display for AnalysisContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Builds a fresh context from the store on every call.
#[derive(Clone)]
pub struct ContextAssembler {
    store: Arc<AnalysisStore>,
}

impl ContextAssembler {
    pub fn new(store: Arc<AnalysisStore>) -> Self {
        Self { store }
    }

    /// `Ok(None)` means the video has no records; `Err` means the store is down.
    pub fn try_assemble(&self, video_id: &str) -> PipelineResult<Option<AnalysisContext>> {
        let records = self.store.list_all(video_id)?;
        Ok(AnalysisContext::render(&records))
    }

    /// Like `try_assemble`, but treats an unavailable store as "no context".
    pub fn assemble(&self, video_id: &str) -> Option<AnalysisContext> {
        match self.try_assemble(video_id) {
            Ok(context) => context,
            Err(e) => {
                warn!("No context for video {}: {}", video_id, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::pool::PoolConfig;
    use crate::database::repo::CaseSensitivity;
    use std::time::Duration;

    #[test]
    fn test_render_lines_in_given_order() {
        let records = vec![
            FrameRecord::new(Duration::ZERO, "a kitchen"),
            FrameRecord::new(Duration::from_millis(500), "a kettle"),
            FrameRecord::new(Duration::from_millis(500), "a kettle"),
            FrameRecord::new(Duration::from_secs(12), "steam"),
        ];
        let context = AnalysisContext::render(&records).unwrap();

        assert_eq!(
            context.as_str(),
            "At 0 sec: a kitchen\nAt 0.5 sec: a kettle\nAt 0.5 sec: a kettle\nAt 12 sec: steam"
        );
        assert_eq!(context.frame_count(), 4);
    }

    #[test]
    fn test_render_empty_is_none() {
        assert_eq!(AnalysisContext::render(&[]), None);
    }

    #[test]
    fn test_assemble_empty_store_is_none() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = AnalysisStore::open(PoolConfig::new(dir.path().join("f.db")), CaseSensitivity::Insensitive);
        let assembler = ContextAssembler::new(Arc::new(store));

        assert!(assembler.try_assemble("v1")?.is_none());
        assert!(assembler.assemble("v1").is_none());
        Ok(())
    }

    #[test]
    fn test_assemble_unavailable_store_is_none() {
        let store = AnalysisStore::open(PoolConfig::new("/no/such/dir/f.db"), CaseSensitivity::Insensitive);
        let assembler = ContextAssembler::new(Arc::new(store));

        assert!(assembler.try_assemble("v1").is_err());
        assert!(assembler.assemble("v1").is_none());
    }

    #[test]
    fn test_assemble_reads_store_order() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = Arc::new(AnalysisStore::open(
            PoolConfig::new(dir.path().join("f.db")),
            CaseSensitivity::Insensitive,
        ));
        store.append("v1", Duration::from_secs(2), "later")?;
        store.append("v1", Duration::from_secs(1), "earlier")?;

        let context = ContextAssembler::new(Arc::clone(&store)).assemble("v1").unwrap();
        assert_eq!(context.to_string(), "At 1 sec: earlier\nAt 2 sec: later");
        Ok(())
    }
}
