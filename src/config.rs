// Global configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::engine::elements::{DEFAULT_INSPECTOR, GstInspectRegistry};
use crate::engine::launch::{DEFAULT_LAUNCHER, GstLaunchEngine};
use crate::engine::probe::{DEFAULT_PROBER, FfprobeDiscoverer};
use crate::engine::worker::JobBackends;
use crate::engine::{DEFAULT_FONT, TranscoderSettings, detect_threads};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub presets: PresetsConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub subtitles: SubtitlesConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PresetsConfig {
    /// Extra directories of device files, searched after the built-in one.
    /// Later directories override devices with the same short name.
    #[serde(default)]
    pub search_paths: Vec<PathBuf>,

    /// Device used when the command line names none
    #[serde(default)]
    pub default_device: Option<String>,

    /// Preset used when the command line names none (empty = device default)
    #[serde(default)]
    pub default_preset: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_launcher")]
    pub launcher: String,

    #[serde(default = "default_inspector")]
    pub inspector: String,

    #[serde(default = "default_prober")]
    pub prober: String,

    /// Extra launcher arguments, split like a shell would
    #[serde(default)]
    pub extra_args: String,

    /// Encoder threads, 0 = number of logical CPUs
    #[serde(default)]
    pub threads: usize,

    /// Seconds without progress before end-of-stream is forced
    #[serde(default = "default_stall_timeout_secs")]
    pub stall_timeout_secs: u64,

    /// Default number of concurrent batch jobs
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    #[serde(default = "default_true_config")]
    pub report_progress: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitlesConfig {
    #[serde(default = "default_font")]
    pub font: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Append every pass description to transcast.log
    #[serde(default)]
    pub pipeline_log: bool,
}

fn default_launcher() -> String {
    DEFAULT_LAUNCHER.to_string()
}

fn default_inspector() -> String {
    DEFAULT_INSPECTOR.to_string()
}

fn default_prober() -> String {
    DEFAULT_PROBER.to_string()
}

fn default_stall_timeout_secs() -> u64 {
    5
}

fn default_max_workers() -> usize {
    1
}

fn default_true_config() -> bool {
    true
}

fn default_font() -> String {
    DEFAULT_FONT.to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            launcher: default_launcher(),
            inspector: default_inspector(),
            prober: default_prober(),
            extra_args: String::new(),
            threads: 0,
            stall_timeout_secs: default_stall_timeout_secs(),
            max_workers: default_max_workers(),
            report_progress: true,
        }
    }
}

impl Default for SubtitlesConfig {
    fn default() -> Self {
        Self {
            font: default_font(),
        }
    }
}

impl EngineConfig {
    pub fn extra_args(&self) -> Result<Vec<String>> {
        if self.extra_args.trim().is_empty() {
            return Ok(Vec::new());
        }
        shlex::split(&self.extra_args)
            .with_context(|| format!("Invalid extra_args: {}", self.extra_args))
    }

    pub fn threads(&self) -> usize {
        match self.threads {
            0 => detect_threads(),
            n => n,
        }
    }
}

impl Config {
    /// Get the directory holding config.toml and the user's presets
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "macos") {
            dirs::home_dir()
                .context("Could not determine home directory")?
                .join(".config")
                .join("transcast")
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join("transcast")
        };

        Ok(config_dir)
    }

    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load config from disk, or create default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();

            // Try to save the default config, but don't fail if we can't
            if let Err(e) = config.save() {
                eprintln!("Warning: Could not create default config file: {}", e);
                eprintln!(
                    "Using built-in defaults. Run 'transcast init-config' to create a config file."
                );
            }

            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Check if config file exists
    pub fn exists() -> bool {
        Self::config_path().map(|p| p.exists()).unwrap_or(false)
    }

    /// Directories searched for device files, lowest priority first
    pub fn preset_search_paths(&self) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Ok(dir) = Self::config_dir() {
            paths.push(dir.join("presets"));
        }
        paths.extend(self.presets.search_paths.iter().cloned());
        paths
    }

    pub fn transcoder_settings(&self) -> TranscoderSettings {
        TranscoderSettings {
            threads: self.engine.threads(),
            stall_timeout: Duration::from_secs(self.engine.stall_timeout_secs.max(1)),
            pipeline_log: self.logging.pipeline_log,
        }
    }

    /// The gst-launch, gst-inspect and ffprobe adapters configured here
    pub fn backends(&self) -> Result<JobBackends> {
        Ok(JobBackends {
            engine: Arc::new(GstLaunchEngine::new(
                self.engine.launcher.clone(),
                self.engine.extra_args()?,
            )),
            registry: Arc::new(GstInspectRegistry::new(self.engine.inspector.clone())),
            discoverer: Arc::new(FfprobeDiscoverer::new(self.engine.prober.clone())),
            settings: self.transcoder_settings(),
        })
    }
}
