use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use teamsight_core::color::DEFAULT_SATURATION_THRESHOLD;
use teamsight_core::geometry::DEFAULT_CONFIDENCE_THRESHOLD;
use teamsight_core::presence::DEFAULT_ABSENCE_THRESHOLD;
use teamsight_core::quantizer::DEFAULT_CLUSTERS;

const DEFAULT_DEVICE_ID: &str = "999";
const DEFAULT_MAX_FRAMES: u64 = 5000;

/// Daemon configuration: optional TOML file, overridden by `TEAMSIGHT_*`
/// environment variables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the SQLite session database.
    pub db_path: PathBuf,
    /// Identifier of this camera, stored on every session.
    pub device_id: String,
    /// JSON-lines replay manifest.
    pub feed_path: PathBuf,
    /// Arrival notification endpoint; `None` disables notifications.
    pub notify_url: Option<String>,
    /// Minimum detector confidence for a face to count.
    pub confidence_threshold: f32,
    /// Saturation below which a color is gray.
    pub saturation_threshold: f32,
    /// Consecutive empty frames before an absence is settled.
    pub absence_threshold: u32,
    /// Stop after this many frames; 0 runs until the feed ends.
    pub max_frames: u64,
    /// Dominant colors extracted per shirt region.
    pub clusters: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: teamsight_store::default_db_path(),
            device_id: DEFAULT_DEVICE_ID.to_string(),
            feed_path: PathBuf::from("frames.jsonl"),
            notify_url: None,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            saturation_threshold: DEFAULT_SATURATION_THRESHOLD,
            absence_threshold: DEFAULT_ABSENCE_THRESHOLD,
            max_frames: DEFAULT_MAX_FRAMES,
            clusters: DEFAULT_CLUSTERS,
        }
    }
}

impl Config {
    /// Load `$TEAMSIGHT_CONFIG` (if set), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let base = match std::env::var("TEAMSIGHT_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        Ok(base.with_overrides(|key| std::env::var(key).ok()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Apply `TEAMSIGHT_*` overrides from `lookup`. Unparseable values are
    /// ignored with a warning.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = lookup("TEAMSIGHT_DB_PATH") {
            self.db_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("TEAMSIGHT_DEVICE_ID") {
            self.device_id = v;
        }
        if let Some(v) = lookup("TEAMSIGHT_FEED") {
            self.feed_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("TEAMSIGHT_NOTIFY_URL") {
            self.notify_url = (!v.is_empty()).then_some(v);
        }
        override_parsed(&lookup, "TEAMSIGHT_CONFIDENCE_THRESHOLD", &mut self.confidence_threshold);
        override_parsed(&lookup, "TEAMSIGHT_SATURATION_THRESHOLD", &mut self.saturation_threshold);
        override_parsed(&lookup, "TEAMSIGHT_ABSENCE_THRESHOLD", &mut self.absence_threshold);
        override_parsed(&lookup, "TEAMSIGHT_MAX_FRAMES", &mut self.max_frames);
        override_parsed(&lookup, "TEAMSIGHT_CLUSTERS", &mut self.clusters);
        self
    }

    /// Frame budget, `None` when unbounded.
    pub fn frame_limit(&self) -> Option<u64> {
        (self.max_frames > 0).then_some(self.max_frames)
    }
}

fn override_parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T) {
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.parse() {
        Ok(v) => *slot = v,
        Err(_) => tracing::warn!(key, value = %raw, "ignoring unparseable config override"),
    }
}
