//! Fixed-cadence frame sampling.
//!
//! Frame `i` of a run is taken at `i * interval`, for every `i` with
//! `i * interval < duration` rounded down, i.e. `floor(duration / interval)`
//! frames. The arithmetic is done on integer nanoseconds so that intervals
//! like 100ms don't lose a frame to float rounding.

use std::time::Duration;

use image::DynamicImage;
use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::media::VideoSource;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct SampledFrame {
    pub index: u64,
    pub timestamp: Duration,
    pub image: DynamicImage,
}

pub struct FrameSampler<S> {
    source: S,
    interval: Duration,
}

impl<S: VideoSource> FrameSampler<S> {
    pub fn new(source: S, interval: Duration) -> PipelineResult<Self> {
        if interval.is_zero() {
            return Err(PipelineError::InvalidInterval(interval));
        }
        Ok(Self { source, interval })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn frame_count(&self) -> u64 {
        let count = self.source.metadata().duration.as_nanos() / self.interval.as_nanos();
        u64::try_from(count).unwrap_or(u64::MAX)
    }

    pub fn timestamp_of(&self, index: u64) -> Duration {
        let nanos = self.interval.as_nanos() * u128::from(index);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// Starts a fresh pass over the video. Each call restarts from frame 0.
    pub fn frames(&self) -> SampledFrames<'_, S> {
        SampledFrames {
            sampler: self,
            next: 0,
            total: self.frame_count(),
            skipped: 0,
        }
    }
}

/// Lazy iterator over sampled frames; undecodable frames are logged and skipped.
pub struct SampledFrames<'a, S> {
    sampler: &'a FrameSampler<S>,
    next: u64,
    total: u64,
    skipped: u64,
}

impl<S> SampledFrames<'_, S> {
    /// Frames skipped so far because they failed to decode.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl<S: VideoSource> Iterator for SampledFrames<'_, S> {
    type Item = SampledFrame;

    fn next(&mut self) -> Option<SampledFrame> {
        while self.next < self.total {
            let index = self.next;
            self.next += 1;
            let timestamp = self.sampler.timestamp_of(index);

            match self.sampler.source.frame_at(timestamp) {
                Ok(image) => {
                    debug!("Sampled frame {} at {:?}", index, timestamp);
                    return Some(SampledFrame { index, timestamp, image });
                }
                Err(e) => {
                    warn!("Skipping frame {} at {:?}: {:#}", index, timestamp, e);
                    self.skipped += 1;
                }
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.total - self.next).ok();
        (0, remaining)
    }
}
