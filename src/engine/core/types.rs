use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default Pango font description used to render subtitles
pub const DEFAULT_FONT: &str = "Sans Bold 16";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum JobStatus {
    Idle,
    Running,
    Paused,
    Complete,
    Failed(String),
    Stopped,
}

impl JobStatus {
    /// Complete, Failed and Stopped jobs only move again on an explicit restart
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed(_) | Self::Stopped)
    }
}

/// Pass bookkeeping for a single transcode job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PassState {
    pub current_pass: usize,
    pub total_passes: usize,
    pub status: JobStatus,
}

impl PassState {
    pub fn new(total_passes: usize) -> Self {
        Self {
            current_pass: 0,
            total_passes,
            status: JobStatus::Idle,
        }
    }

    pub fn is_final_pass(&self) -> bool {
        self.current_pass + 1 >= self.total_passes
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PixelAspectRatio {
    pub num: u32,
    pub denom: u32,
}

impl PixelAspectRatio {
    pub const SQUARE: Self = Self { num: 1, denom: 1 };

    pub fn new(num: u32, denom: u32) -> Self {
        if num == 0 || denom == 0 {
            Self::SQUARE
        } else {
            Self { num, denom }
        }
    }
}

impl Default for PixelAspectRatio {
    fn default() -> Self {
        Self::SQUARE
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoStreamInfo {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub pixel_aspect_ratio: PixelAspectRatio,
    /// None when the source does not say
    #[serde(default)]
    pub interlaced: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioStreamInfo {
    pub channels: u32,
    pub depth: u32,
    pub sample_rate: u32,
}

/// What discovery found out about an input
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaInfo {
    pub locator: String,
    pub duration: Option<Duration>,
    pub video: Option<VideoStreamInfo>,
    pub audio: Option<AudioStreamInfo>,
}

impl MediaInfo {
    pub fn has_video(&self) -> bool {
        self.video.is_some()
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    /// At least one stream type is required before any graph is built
    pub fn is_usable(&self) -> bool {
        self.has_video() || self.has_audio()
    }
}

/// Pixels removed from each side of the source frame
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Crop {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl Crop {
    pub fn new(top: u32, right: u32, bottom: u32, left: u32) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for Crop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.top, self.right, self.bottom, self.left)
    }
}

impl FromStr for Crop {
    type Err = String;

    /// Parse "top,right,bottom,left"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(format!("expected top,right,bottom,left but got '{}'", s));
        }

        let mut values = [0u32; 4];
        for (slot, part) in values.iter_mut().zip(parts) {
            *slot = part
                .parse()
                .map_err(|_| format!("invalid crop value '{}'", part))?;
        }

        Ok(Self::new(values[0], values[1], values[2], values[3]))
    }
}

/// Options for a single job: input/output locations, subtitles, disc selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscodeOptions {
    pub input: String,
    pub output: PathBuf,
    #[serde(default)]
    pub subtitle_file: Option<PathBuf>,
    #[serde(default)]
    pub subtitle_charset: Option<String>,
    /// Render SSA subtitles embedded in a Matroska input
    #[serde(default)]
    pub ssa: bool,
    pub font: String,
    /// None lets the source decide
    #[serde(default)]
    pub deinterlace: Option<bool>,
    #[serde(default)]
    pub crop: Option<Crop>,
    #[serde(default)]
    pub title: Option<u32>,
    #[serde(default)]
    pub chapter: Option<u32>,
    #[serde(default)]
    pub audio_stream: Option<u32>,
    /// Insert a progress reporting stage so the engine can answer position queries
    #[serde(default = "default_true")]
    pub report_progress: bool,
}

fn default_true() -> bool {
    true
}

impl TranscodeOptions {
    pub fn new(input: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            subtitle_file: None,
            subtitle_charset: None,
            ssa: false,
            font: DEFAULT_FONT.to_string(),
            deinterlace: None,
            crop: None,
            title: None,
            chapter: None,
            audio_stream: None,
            report_progress: true,
        }
    }
}
