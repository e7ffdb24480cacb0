use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use transcast::engine::Crop;

#[derive(Parser)]
#[command(name = "transcast")]
#[command(about = "Preset-driven multi-pass transcoder for GStreamer", long_about = None)]
pub struct Cli {
    /// More output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Extra preset directory (may be repeated, later ones win)
    #[arg(long = "presets", value_name = "DIR", global = true)]
    pub preset_dirs: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Device and preset selection shared by the job commands
#[derive(Args, Clone)]
pub struct PresetArgs {
    /// Device short name (defaults to the configured device)
    #[arg(short, long)]
    pub device: Option<String>,

    /// Preset name (defaults to the device's default preset)
    #[arg(short, long)]
    pub preset: Option<String>,
}

/// Per-job options
#[derive(Args, Clone, Default)]
pub struct JobArgs {
    /// Output file (generated next to the input when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Crop top,right,bottom,left in source pixels
    #[arg(long, value_parser = parse_crop)]
    pub crop: Option<Crop>,

    /// Force deinterlacing
    #[arg(long, conflicts_with = "no_deinterlace")]
    pub deinterlace: bool,

    /// Never deinterlace
    #[arg(long, conflicts_with = "deinterlace")]
    pub no_deinterlace: bool,

    /// External subtitle file to render over the video
    #[arg(long)]
    pub subtitle: Option<PathBuf>,

    /// Character set of the subtitle file
    #[arg(long)]
    pub subtitle_charset: Option<String>,

    /// Render SSA subtitles embedded in a Matroska input
    #[arg(long)]
    pub ssa: bool,

    /// Subtitle font description
    #[arg(long)]
    pub font: Option<String>,

    /// Disc title (searched for the longest title when omitted)
    #[arg(long)]
    pub title: Option<u32>,

    /// Disc chapter
    #[arg(long)]
    pub chapter: Option<u32>,

    /// Disc audio stream
    #[arg(long)]
    pub audio_stream: Option<u32>,
}

impl JobArgs {
    pub fn deinterlace(&self) -> Option<bool> {
        match (self.deinterlace, self.no_deinterlace) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Transcode one input, printing progress
    Transcode {
        /// File path or locator (file://, dvd://device@title:chapter:audio, v4l2://)
        input: String,

        #[command(flatten)]
        preset: PresetArgs,

        #[command(flatten)]
        job: JobArgs,
    },

    /// Show the pipeline of every pass without running it
    DryRun {
        input: String,

        #[command(flatten)]
        preset: PresetArgs,

        #[command(flatten)]
        job: JobArgs,
    },

    /// Transcode several inputs in parallel
    Batch {
        #[arg(required = true)]
        inputs: Vec<String>,

        #[command(flatten)]
        preset: PresetArgs,

        /// Concurrent jobs (defaults to the configured max_workers)
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// List devices and their presets
    Presets,

    /// List elements a preset needs that are not installed
    Check {
        #[command(flatten)]
        preset: PresetArgs,
    },

    /// Show an element's sink capabilities
    Inspect { element: String },

    /// Show what discovery finds in an input
    Probe { input: String },

    /// Show config status and location, or create default config if missing
    InitConfig,
}

fn parse_crop(s: &str) -> Result<Crop, String> {
    s.parse()
}

pub fn parse() -> Cli {
    Cli::parse()
}
