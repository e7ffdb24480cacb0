// Input discovery using ffprobe

use anyhow::{Context, Result, bail};
use std::process::Command;
use std::time::Duration;

use super::{AudioStreamInfo, Discoverer, Locator, MediaInfo, PixelAspectRatio, VideoStreamInfo};

pub const DEFAULT_PROBER: &str = "ffprobe";

/// Discoverer backed by ffprobe's JSON output
#[derive(Debug, Clone)]
pub struct FfprobeDiscoverer {
    prober: String,
}

impl FfprobeDiscoverer {
    pub fn new(prober: impl Into<String>) -> Self {
        Self {
            prober: prober.into(),
        }
    }

    /// Input arguments for a locator
    fn input_args(locator: &Locator) -> Vec<String> {
        match locator {
            Locator::File(path) => vec!["-i".into(), path.to_string_lossy().into_owned()],
            Locator::Uri(uri) => {
                let input = uri.strip_prefix("file://").unwrap_or(uri);
                vec!["-i".into(), input.to_string()]
            }
            Locator::Disc {
                device,
                title,
                chapter,
                ..
            } => {
                let mut args = vec![
                    "-f".to_string(),
                    "dvdvideo".to_string(),
                    "-title".to_string(),
                    title.unwrap_or(1).to_string(),
                ];
                if let Some(chapter) = chapter {
                    args.push("-chapter_start".into());
                    args.push(chapter.to_string());
                }
                args.push("-i".into());
                args.push(device.clone());
                args
            }
            Locator::Capture { uri } => {
                let device = uri.split_once("://").map(|(_, d)| d).unwrap_or(uri);
                vec!["-f".into(), "video4linux2".into(), "-i".into(), device.to_string()]
            }
        }
    }
}

impl Default for FfprobeDiscoverer {
    fn default() -> Self {
        Self::new(DEFAULT_PROBER)
    }
}

impl Discoverer for FfprobeDiscoverer {
    fn discover(&self, locator: &Locator) -> Result<MediaInfo> {
        let output = Command::new(&self.prober)
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .args(Self::input_args(locator))
            .output()
            .with_context(|| format!("Failed to execute {}. Is it installed and in PATH?", self.prober))?;

        if !output.status.success() {
            bail!(
                "{} failed for {}: {}",
                self.prober,
                locator,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        parse_ffprobe_media(&String::from_utf8_lossy(&output.stdout), &locator.to_string())
    }
}

/// Build a `MediaInfo` from ffprobe `-show_format -show_streams` JSON.
///
/// The first video and first audio stream are used.
pub fn parse_ffprobe_media(json: &str, locator: &str) -> Result<MediaInfo> {
    let json: serde_json::Value = serde_json::from_str(json).context("Failed to parse ffprobe JSON")?;

    let streams = json["streams"].as_array().map(Vec::as_slice).unwrap_or_default();

    let video = streams
        .iter()
        .find(|s| s["codec_type"] == "video" && s["disposition"]["attached_pic"] != 1)
        .map(|s| -> Result<VideoStreamInfo> {
            Ok(VideoStreamInfo {
                width: s["width"].as_u64().context("Video stream has no width")? as u32,
                height: s["height"].as_u64().context("Video stream has no height")? as u32,
                pixel_aspect_ratio: s["sample_aspect_ratio"]
                    .as_str()
                    .and_then(parse_ratio)
                    .unwrap_or_default(),
                interlaced: s["field_order"].as_str().and_then(parse_field_order),
            })
        })
        .transpose()?;

    let audio = streams.iter().find(|s| s["codec_type"] == "audio").map(|s| AudioStreamInfo {
        channels: s["channels"].as_u64().unwrap_or(2) as u32,
        depth: number(&s["bits_per_raw_sample"])
            .or_else(|| number(&s["bits_per_sample"]))
            .filter(|d| *d > 0)
            .unwrap_or(16) as u32,
        sample_rate: number(&s["sample_rate"]).unwrap_or(0) as u32,
    });

    let duration = json["format"]["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .map(Duration::from_secs_f64);

    Ok(MediaInfo {
        locator: locator.to_string(),
        duration,
        video,
        audio,
    })
}

/// ffprobe writes most numbers as strings
fn number(value: &serde_json::Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

/// Parse "16:15"; "0:1" means unknown
fn parse_ratio(s: &str) -> Option<PixelAspectRatio> {
    let (num, denom) = s.split_once(':')?;
    let num: u32 = num.parse().ok()?;
    let denom: u32 = denom.parse().ok()?;
    if num == 0 || denom == 0 {
        return None;
    }
    Some(PixelAspectRatio::new(num, denom))
}

fn parse_field_order(s: &str) -> Option<bool> {
    match s {
        "progressive" => Some(false),
        "tt" | "bb" | "tb" | "bt" => Some(true),
        _ => None,
    }
}
