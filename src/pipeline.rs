//! The write path: frames in, analysed records out.
//!
//! Streaming mode (frames sampled straight from the video) and batch mode
//! (frames previously extracted to files) both feed `FrameJob`s into the same
//! `Pipeline::run`, so they share encoding, prompting and storage.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::bounded;
use image::DynamicImage;
use indicatif::ProgressBar;
use tracing::{error, info, warn};

use crate::database::repo::{AnalysisStore, FrameRecord};
use crate::ingest::sampler::SampledFrame;
use crate::ingest::scanner::FrameFile;
use crate::ml::analyzer::{FrameAnalyzer, FrameInput, ANALYSIS_FAILED};

pub enum FramePayload {
    Image(DynamicImage),
    File(PathBuf),
}

pub struct FrameJob {
    pub timestamp: Duration,
    pub payload: FramePayload,
}

impl FrameJob {
    fn input(&self) -> FrameInput<'_> {
        match &self.payload {
            FramePayload::Image(image) => FrameInput::Image(image),
            FramePayload::File(path) => FrameInput::File(path),
        }
    }

    fn source_name(&self) -> Option<String> {
        match &self.payload {
            FramePayload::Image(_) => None,
            FramePayload::File(path) => path.file_name().map(|n| n.to_string_lossy().into_owned()),
        }
    }
}

impl From<SampledFrame> for FrameJob {
    fn from(frame: SampledFrame) -> Self {
        Self {
            timestamp: frame.timestamp,
            payload: FramePayload::Image(frame.image),
        }
    }
}

impl From<FrameFile> for FrameJob {
    fn from(file: FrameFile) -> Self {
        Self {
            timestamp: file.timestamp,
            payload: FramePayload::File(file.path),
        }
    }
}

/// Caller-driven stop signal. Records committed before the stop stay stored.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub stored: u64,
    pub analysis_failures: u64,
    pub store_failures: u64,
    pub stopped_early: bool,
}

impl RunSummary {
    pub fn is_clean(&self) -> bool {
        self.analysis_failures == 0 && self.store_failures == 0
    }
}

#[derive(Default)]
struct Tally {
    frames: AtomicU64,
    stored: AtomicU64,
    analysis_failures: AtomicU64,
    store_failures: AtomicU64,
}

impl Tally {
    fn summary(&self, stopped_early: bool) -> RunSummary {
        RunSummary {
            frames: self.frames.load(Ordering::Relaxed),
            stored: self.stored.load(Ordering::Relaxed),
            analysis_failures: self.analysis_failures.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
            stopped_early,
        }
    }
}

pub struct Pipeline {
    analyzer: FrameAnalyzer,
    store: Arc<AnalysisStore>,
    workers: usize,
    stop: StopFlag,
    progress: ProgressBar,
}

impl Pipeline {
    pub fn new(analyzer: FrameAnalyzer, store: Arc<AnalysisStore>) -> Self {
        Self {
            analyzer,
            store,
            workers: 1,
            stop: StopFlag::default(),
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_stop_flag(mut self, stop: StopFlag) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Analyses and stores every job. A failing frame is stored with the
    /// sentinel description and the run carries on.
    pub fn run<I>(&self, video_id: &str, jobs: I) -> RunSummary
    where
        I: IntoIterator<Item = FrameJob>,
    {
        let jobs = jobs.into_iter();
        if let Some(total) = jobs.size_hint().1 {
            self.progress.set_length(total as u64);
        }

        let tally = Tally::default();
        let stopped_early = if self.workers <= 1 {
            self.run_sequential(video_id, jobs, &tally)
        } else {
            self.run_parallel(video_id, jobs, &tally)
        };
        self.progress.finish_and_clear();

        let summary = tally.summary(stopped_early);
        info!(
            "Run finished for video {}: {} frames, {} stored, {} analysis failures, {} store failures{}",
            video_id,
            summary.frames,
            summary.stored,
            summary.analysis_failures,
            summary.store_failures,
            if stopped_early { " (stopped early)" } else { "" }
        );
        summary
    }

    fn run_sequential(&self, video_id: &str, jobs: impl Iterator<Item = FrameJob>, tally: &Tally) -> bool {
        for job in jobs {
            if self.stop.is_stopped() {
                return true;
            }
            self.process(video_id, &job, tally);
        }
        self.stop.is_stopped()
    }

    /// Jobs are produced on the calling thread and analysed by `workers`
    /// threads; each worker appends its own records.
    fn run_parallel(&self, video_id: &str, jobs: impl Iterator<Item = FrameJob>, tally: &Tally) -> bool {
        let (tx, rx) = bounded::<FrameJob>(self.workers * 2);
        let mut stopped = false;

        std::thread::scope(|scope| {
            for i in 0..self.workers {
                let rx = rx.clone();
                scope.spawn(move || {
                    info!("Analysis worker {} started", i);
                    for job in rx {
                        if self.stop.is_stopped() {
                            continue;
                        }
                        self.process(video_id, &job, tally);
                    }
                    info!("Analysis worker {} finished", i);
                });
            }
            drop(rx);

            for job in jobs {
                if self.stop.is_stopped() {
                    stopped = true;
                    break;
                }
                if tx.send(job).is_err() {
                    break;
                }
            }
            drop(tx);
        });

        stopped || self.stop.is_stopped()
    }

    fn process(&self, video_id: &str, job: &FrameJob, tally: &Tally) {
        tally.frames.fetch_add(1, Ordering::Relaxed);
        info!("Processing frame at {:?}", job.timestamp);

        let description = match self.analyzer.analyze(job.input()) {
            Ok(description) => description,
            Err(e) => {
                warn!("Analysis failed for frame at {:?}: {}", job.timestamp, e);
                tally.analysis_failures.fetch_add(1, Ordering::Relaxed);
                ANALYSIS_FAILED.to_string()
            }
        };

        let mut record = FrameRecord::new(job.timestamp, description);
        record.source = job.source_name();

        match self.store.append_record(video_id, &record) {
            Ok(_) => {
                info!("Frame at {}s: {}", record.seconds_label(), record.description);
                tally.stored.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                error!("Failed to store frame at {:?}: {}", job.timestamp, e);
                tally.store_failures.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.progress.inc(1);
    }
}
