use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use memtrace_core::session::SessionConfig;
use memtrace_core::{CanvasSize, PacingConfig, TextLayout, MAX_TEXT_SCALE};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Installation configuration.
///
/// Resolved in layers: built-in defaults, then an optional TOML file, then
/// `MEMTRACE_*` environment variables, then command-line flags.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Dialogue dataset document (JSON or JSON Lines).
    pub dataset_path: PathBuf,
    /// V4L2 device path.
    pub camera_device: String,
    /// Requested capture resolution; the camera may deliver another.
    pub capture_width: u32,
    pub capture_height: u32,
    /// Number of frames discarded while the camera's auto exposure settles.
    pub warmup_frames: usize,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Faces at or below this detector confidence are ignored.
    pub min_confidence: f32,
    /// Canvas resolution the composite is rendered at.
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Lines per sample set.
    pub lines: usize,
    pub base_interval_ms: u64,
    pub interval_step_ms: u64,
    pub min_interval_ms: u64,
    pub text_top_margin: u32,
    pub text_line_step: u32,
    pub text_scale: u32,
}

impl Default for Config {
    fn default() -> Self {
        let layout = TextLayout::default();
        Self {
            dataset_path: PathBuf::from("dataset.json"),
            camera_device: "/dev/video0".to_string(),
            capture_width: 1280,
            capture_height: 720,
            warmup_frames: 4,
            model_dir: memtrace_vision::default_model_dir(),
            min_confidence: 0.5,
            canvas_width: 1280,
            canvas_height: 720,
            lines: memtrace_core::session::DEFAULT_LINE_COUNT,
            base_interval_ms: 1000,
            interval_step_ms: 200,
            min_interval_ms: 100,
            text_top_margin: layout.top_margin,
            text_line_step: layout.line_step,
            text_scale: layout.scale,
        }
    }
}

impl Config {
    /// Defaults, overlaid with `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&text)?)
    }

    /// Apply `MEMTRACE_*` overrides from `lookup`. Unparseable values are
    /// logged and ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("MEMTRACE_DATASET") {
            self.dataset_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("MEMTRACE_CAMERA_DEVICE") {
            self.camera_device = v;
        }
        if let Some(v) = lookup("MEMTRACE_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        env_parse(&lookup, "MEMTRACE_CAPTURE_WIDTH", &mut self.capture_width);
        env_parse(&lookup, "MEMTRACE_CAPTURE_HEIGHT", &mut self.capture_height);
        env_parse(&lookup, "MEMTRACE_WARMUP_FRAMES", &mut self.warmup_frames);
        env_parse(&lookup, "MEMTRACE_MIN_CONFIDENCE", &mut self.min_confidence);
        env_parse(&lookup, "MEMTRACE_CANVAS_WIDTH", &mut self.canvas_width);
        env_parse(&lookup, "MEMTRACE_CANVAS_HEIGHT", &mut self.canvas_height);
        env_parse(&lookup, "MEMTRACE_LINES", &mut self.lines);
        env_parse(&lookup, "MEMTRACE_BASE_INTERVAL_MS", &mut self.base_interval_ms);
        env_parse(&lookup, "MEMTRACE_INTERVAL_STEP_MS", &mut self.interval_step_ms);
        env_parse(&lookup, "MEMTRACE_MIN_INTERVAL_MS", &mut self.min_interval_ms);
        env_parse(&lookup, "MEMTRACE_TEXT_SCALE", &mut self.text_scale);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.canvas_width == 0 || self.canvas_height == 0 {
            return Err(ConfigError::Invalid("canvas size must be non-zero".into()));
        }
        if self.capture_width == 0 || self.capture_height == 0 {
            return Err(ConfigError::Invalid("capture size must be non-zero".into()));
        }
        if self.lines == 0 {
            return Err(ConfigError::Invalid("lines must be at least 1".into()));
        }
        if self.text_scale == 0 || self.text_scale > MAX_TEXT_SCALE {
            return Err(ConfigError::Invalid(format!(
                "text_scale {} is outside 1..={MAX_TEXT_SCALE}",
                self.text_scale
            )));
        }
        if self.min_interval_ms > self.base_interval_ms {
            return Err(ConfigError::Invalid(format!(
                "min_interval_ms ({}) exceeds base_interval_ms ({})",
                self.min_interval_ms, self.base_interval_ms
            )));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ConfigError::Invalid(format!(
                "min_confidence {} is outside [0, 1]",
                self.min_confidence
            )));
        }
        Ok(())
    }

    pub fn canvas(&self) -> CanvasSize {
        CanvasSize::new(self.canvas_width, self.canvas_height)
    }

    pub fn text_layout(&self) -> TextLayout {
        TextLayout {
            top_margin: self.text_top_margin,
            line_step: self.text_line_step,
            scale: self.text_scale,
        }
    }

    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            line_count: self.lines,
            pacing: PacingConfig {
                base_interval: Duration::from_millis(self.base_interval_ms),
                step: Duration::from_millis(self.interval_step_ms),
                min_interval: Duration::from_millis(self.min_interval_ms),
            },
        }
    }
}

fn env_parse<T, F>(lookup: &F, key: &str, slot: &mut T)
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *slot = value,
        Err(_) => tracing::warn!(key, value = %raw, "ignoring unparseable environment override"),
    }
}
