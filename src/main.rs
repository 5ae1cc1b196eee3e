use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use video_query::api::{self, AppState};
use video_query::database::pool::PoolConfig;
use video_query::database::repo::{AnalysisStore, CaseSensitivity};
use video_query::ingest::extract::extract_frames;
use video_query::ingest::hasher;
use video_query::ingest::sampler::FrameSampler;
use video_query::ingest::scanner::scan_frames;
use video_query::media::ffmpeg::FfmpegSource;
use video_query::media::VideoSource;
use video_query::ml::analyzer::{FrameAnalyzer, FrameInput};
use video_query::ml::openai::OpenAiClient;
use video_query::pipeline::{FrameJob, Pipeline, RunSummary, StopFlag};
use video_query::query::answerer::{failure_message, QueryAnswerer, QueryOutcome, NO_DATA_MESSAGE};
use video_query::query::context::ContextAssembler;
use video_query::query::search::{SearchOutcome, SearchService};
use video_query::utils::config::{parse_dimensions, parse_interval, Settings};

#[derive(Parser, Debug)]
#[command(author, version, about = "Analyse video frames and ask questions about them", long_about = None)]
struct Cli {
    /// SQLite database holding frame analyses
    #[arg(long, global = true, env = "DATABASE_PATH")]
    db_path: Option<PathBuf>,

    /// Video the command reads or writes
    #[arg(long, global = true, env = "VIDEO_ID")]
    video_id: Option<String>,

    /// Make keyword search case-sensitive
    #[arg(long, global = true)]
    case_sensitive: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sample frames from a video into numbered image files
    Extract {
        video: PathBuf,
        #[arg(short, long)]
        out: PathBuf,
        /// Seconds between samples
        #[arg(long, value_parser = parse_interval)]
        interval: Option<Duration>,
        /// Resize every frame, e.g. 640x640
        #[arg(long, value_parser = parse_dimensions)]
        resize: Option<(u32, u32)>,
    },
    /// Sample, describe and store frames straight from a video
    Analyze {
        video: PathBuf,
        #[arg(long, value_parser = parse_interval)]
        interval: Option<Duration>,
        #[arg(short, long, default_value_t = 1)]
        workers: usize,
        /// Type `q` and Enter to stop early
        #[arg(long)]
        interactive: bool,
        /// Use a content fingerprint of the video as its id
        #[arg(long)]
        fingerprint_id: bool,
    },
    /// Describe and store previously extracted frame files
    AnalyzeDir {
        dir: PathBuf,
        #[arg(long, value_parser = parse_interval)]
        interval: Option<Duration>,
        #[arg(short, long, default_value_t = 1)]
        workers: usize,
    },
    /// Describe a single image without storing it
    Describe { image: PathBuf },
    /// Answer a question from the stored descriptions
    Ask { question: String },
    /// Check whether a keyword appears in any stored description
    Search { keyword: String },
    /// Print the stored descriptions in time order
    Frames,
    /// Print the content fingerprint of a video
    Fingerprint { video: PathBuf },
    /// Serve the query endpoints over HTTP
    Serve {
        #[arg(long, env = "BIND_ADDR")]
        bind: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut settings = Settings::load()?;
    let cli = Cli::parse();

    if let Some(path) = cli.db_path {
        settings.database_path = path;
    }
    if let Some(id) = cli.video_id {
        settings.video_id = id;
    }
    if cli.case_sensitive {
        settings.case_sensitivity = CaseSensitivity::Sensitive;
    }

    match cli.command {
        Command::Extract {
            video,
            out,
            interval,
            resize,
        } => extract(&video, &out, interval.unwrap_or(settings.interval), resize),
        Command::Analyze {
            video,
            interval,
            workers,
            interactive,
            fingerprint_id,
        } => {
            let interval = interval.unwrap_or(settings.interval);
            analyze(&settings, &video, interval, workers, interactive, fingerprint_id)
        }
        Command::AnalyzeDir { dir, interval, workers } => {
            analyze_dir(&settings, &dir, interval.unwrap_or(settings.interval), workers)
        }
        Command::Describe { image } => describe(&settings, &image),
        Command::Ask { question } => ask(&settings, &question),
        Command::Search { keyword } => search(&settings, &keyword),
        Command::Frames => frames(&settings),
        Command::Fingerprint { video } => {
            println!("{}", hasher::fingerprint(&video)?);
            Ok(())
        }
        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| settings.bind_addr.clone());
            serve(&settings, &bind)
        }
    }
}

fn open_store(settings: &Settings) -> Arc<AnalysisStore> {
    Arc::new(AnalysisStore::open(
        PoolConfig::new(&settings.database_path),
        settings.case_sensitivity,
    ))
}

fn openai_client(settings: &Settings) -> Result<Arc<OpenAiClient>> {
    let client = OpenAiClient::new(settings.openai.clone()).context("Failed to build OpenAI client")?;
    if !client.has_credential() {
        warn!("OPENAI_API_KEY is not set; remote calls will fail");
    }
    Ok(Arc::new(client))
}

fn progress_bar() -> Result<ProgressBar> {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} frames")
            .context("Invalid progress template")?,
    );
    Ok(bar)
}

fn open_sampler(video: &Path, interval: Duration) -> Result<FrameSampler<FfmpegSource>> {
    let source = FfmpegSource::open(video).with_context(|| format!("Cannot read video {:?}", video))?;
    info!("Opened {:?}: {:?}", video, source.metadata());
    Ok(FrameSampler::new(source, interval)?)
}

fn extract(video: &Path, out: &Path, interval: Duration, resize: Option<(u32, u32)>) -> Result<()> {
    let sampler = open_sampler(video, interval)?;
    let summary = extract_frames(&sampler, out, resize, &progress_bar()?)?;
    println!(
        "Wrote {} frames to {:?} ({} write failures, {} unreadable)",
        summary.written, out, summary.write_failures, summary.skipped
    );
    Ok(())
}

fn analyze(
    settings: &Settings,
    video: &Path,
    interval: Duration,
    workers: usize,
    interactive: bool,
    fingerprint_id: bool,
) -> Result<()> {
    let sampler = open_sampler(video, interval)?;
    let video_id = if fingerprint_id {
        hasher::video_id_for(video)?
    } else {
        settings.video_id.clone()
    };
    info!("Analysing {:?} as video {}", video, video_id);

    let stop = StopFlag::default();
    if interactive {
        spawn_stop_listener(stop.clone());
    }

    let pipeline = Pipeline::new(FrameAnalyzer::new(openai_client(settings)?), open_store(settings))
        .with_workers(workers)
        .with_stop_flag(stop)
        .with_progress(progress_bar()?);

    let mut frames = sampler.frames();
    let summary = pipeline.run(&video_id, frames.by_ref().map(FrameJob::from));
    print_summary(&video_id, &summary);
    if frames.skipped() > 0 {
        println!("{} frames could not be decoded", frames.skipped());
    }
    Ok(())
}

fn analyze_dir(settings: &Settings, dir: &Path, interval: Duration, workers: usize) -> Result<()> {
    let files = scan_frames(dir, interval).with_context(|| format!("Failed to scan {:?}", dir))?;
    if files.is_empty() {
        bail!("No image files found in {:?}", dir);
    }
    info!("Found {} frame files in {:?}", files.len(), dir);

    let pipeline = Pipeline::new(FrameAnalyzer::new(openai_client(settings)?), open_store(settings))
        .with_workers(workers)
        .with_progress(progress_bar()?);
    let summary = pipeline.run(&settings.video_id, files.into_iter().map(FrameJob::from));
    print_summary(&settings.video_id, &summary);
    Ok(())
}

fn spawn_stop_listener(stop: StopFlag) {
    println!("Press q then Enter to stop.");
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) if line.trim().eq_ignore_ascii_case("q") => {
                    info!("Stop requested");
                    stop.stop();
                    break;
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
    });
}

fn print_summary(video_id: &str, summary: &RunSummary) {
    println!(
        "Video {}: {} of {} frames stored, {} analysis failures, {} store failures{}",
        video_id,
        summary.stored,
        summary.frames,
        summary.analysis_failures,
        summary.store_failures,
        if summary.stopped_early { ", stopped early" } else { "" }
    );
}

fn describe(settings: &Settings, image: &Path) -> Result<()> {
    let analyzer = FrameAnalyzer::new(openai_client(settings)?);
    println!("{}", analyzer.describe_or_sentinel(FrameInput::File(image)));
    Ok(())
}

fn ask(settings: &Settings, question: &str) -> Result<()> {
    let answerer = QueryAnswerer::new(ContextAssembler::new(open_store(settings)), openai_client(settings)?);
    match answerer.answer(&settings.video_id, question) {
        Ok(QueryOutcome::Answered(answer)) => {
            println!("{}", answer.text);
            Ok(())
        }
        Ok(QueryOutcome::NoContext) => bail!(NO_DATA_MESSAGE),
        Err(e) => {
            warn!("Answering failed: {}", e);
            bail!(failure_message(&e))
        }
    }
}

fn search(settings: &Settings, keyword: &str) -> Result<()> {
    let outcome = SearchService::new(open_store(settings)).search(&settings.video_id, keyword);
    let message = outcome.message(keyword);
    if matches!(outcome, SearchOutcome::StoreUnavailable) {
        bail!(message);
    }
    println!("{}", message);
    Ok(())
}

fn frames(settings: &Settings) -> Result<()> {
    let records = open_store(settings)
        .list_all(&settings.video_id)
        .with_context(|| format!("Failed to read {:?}", settings.database_path))?;
    if records.is_empty() {
        println!("{}", NO_DATA_MESSAGE);
    }
    for record in records {
        match &record.source {
            Some(source) => println!("At {} sec ({}): {}", record.seconds_label(), source, record.description),
            None => println!("At {} sec: {}", record.seconds_label(), record.description),
        }
    }
    Ok(())
}

fn serve(settings: &Settings, bind: &str) -> Result<()> {
    let store = open_store(settings);
    // The blocking HTTP client must be built and dropped outside the async runtime.
    let state = AppState {
        answerer: Arc::new(QueryAnswerer::new(
            ContextAssembler::new(Arc::clone(&store)),
            openai_client(settings)?,
        )),
        search: SearchService::new(store),
        video_id: Arc::from(settings.video_id.as_str()),
    };

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let served = runtime.block_on(api::serve(state.clone(), bind));
    drop(runtime);
    drop(state);
    served
}
