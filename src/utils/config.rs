use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tracing::info;

use crate::database::repo::CaseSensitivity;
use crate::ingest::sampler::DEFAULT_INTERVAL;
use crate::ml::openai::{OpenAiConfig, DEFAULT_BASE_URL};

pub const DEFAULT_DATABASE_PATH: &str = "video_query.db";
pub const DEFAULT_VIDEO_ID: &str = "default";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";

#[derive(Clone)]
pub struct Settings {
    pub openai: OpenAiConfig,
    pub database_path: PathBuf,
    pub video_id: String,
    pub case_sensitivity: CaseSensitivity,
    pub bind_addr: String,
    pub interval: Duration,
}

impl Settings {
    /// Loads `.env` (if present) and reads settings from the process environment.
    pub fn load() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => info!("Loaded environment from {:?}", path),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e).context("Failed to read .env file"),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = OpenAiConfig::default();

        let openai = OpenAiConfig {
            api_key: get("OPENAI_API_KEY"),
            base_url: get("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            vision_model: get("VISION_MODEL").unwrap_or(defaults.vision_model),
            text_model: get("TEXT_MODEL").unwrap_or(defaults.text_model),
            vision_max_tokens: parse_or("VISION_MAX_TOKENS", get("VISION_MAX_TOKENS"), defaults.vision_max_tokens)?,
            temperature: parse_or("TEXT_TEMPERATURE", get("TEXT_TEMPERATURE"), defaults.temperature)?,
            timeout: match get("REQUEST_TIMEOUT_SECS") {
                Some(v) => parse_interval(&v).context("REQUEST_TIMEOUT_SECS")?,
                None => defaults.timeout,
            },
        };

        let case_sensitivity = match get("SEARCH_CASE_SENSITIVE") {
            Some(v) if parse_bool(&v).context("SEARCH_CASE_SENSITIVE")? => CaseSensitivity::Sensitive,
            _ => CaseSensitivity::Insensitive,
        };

        let interval = match get("SAMPLE_INTERVAL_SECS") {
            Some(v) => parse_interval(&v).context("SAMPLE_INTERVAL_SECS")?,
            None => DEFAULT_INTERVAL,
        };

        Ok(Self {
            openai,
            database_path: get("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH)),
            video_id: get("VIDEO_ID").unwrap_or_else(|| DEFAULT_VIDEO_ID.to_string()),
            case_sensitivity,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            interval,
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, value: Option<String>, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match value {
        Some(v) => v.parse().map_err(|e| anyhow!("{key}: invalid value '{v}': {e}")),
        None => Ok(default),
    }
}

/// Parses a positive number of seconds ("1", "0.5").
pub fn parse_interval(s: &str) -> Result<Duration> {
    let secs: f64 = s
        .trim()
        .parse()
        .with_context(|| format!("'{s}' is not a number of seconds"))?;
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|d| !d.is_zero())
        .ok_or_else(|| anyhow!("interval must be a positive number of seconds, got {s}"))
}

/// Parses "WIDTHxHEIGHT" ("640x640").
pub fn parse_dimensions(s: &str) -> Result<(u32, u32)> {
    let (w, h) = s
        .split_once(&['x', 'X'][..])
        .ok_or_else(|| anyhow!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let w: u32 = w.trim().parse().with_context(|| format!("bad width in '{s}'"))?;
    let h: u32 = h.trim().parse().with_context(|| format!("bad height in '{s}'"))?;
    if w == 0 || h == 0 {
        return Err(anyhow!("dimensions must be non-zero, got '{s}'"));
    }
    Ok((w, h))
}

fn parse_bool(s: &str) -> Result<bool> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow!("expected a boolean, got '{s}'")),
    }
}
