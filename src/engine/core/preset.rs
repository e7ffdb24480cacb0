use super::backend::ElementRegistry;
use super::capability::{CapabilityBound, DimensionBound};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Elements every pipeline may use besides the preset's own encoders and muxer
pub const INTERNAL_ELEMENTS: &[&str] = &[
    "uridecodebin",
    "decodebin",
    "queue",
    "filesink",
    "videoconvert",
    "videorate",
    "videoscale",
    "videobox",
    "audioconvert",
    "audiorate",
    "audioresample",
];

fn default_make() -> String {
    "Generic".to_string()
}

fn default_audio_rate() -> CapabilityBound {
    CapabilityBound::range(8000, 96000)
}

fn default_audio_width() -> CapabilityBound {
    CapabilityBound::range(8, 24)
}

fn default_audio_depth() -> CapabilityBound {
    CapabilityBound::range(8, 24)
}

fn default_audio_channels() -> CapabilityBound {
    CapabilityBound::range(1, 6)
}

fn default_video_rate() -> (Fraction, Fraction) {
    (Fraction::new(1, 1), Fraction::new(60, 1))
}

fn default_video_width() -> DimensionBound {
    DimensionBound::new(2, 1920)
}

fn default_video_height() -> DimensionBound {
    DimensionBound::new(2, 1080)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() && self.email.is_empty() {
            return Ok(());
        }
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// Frame rate, written in preset files as `"30000/1001"`, `"25"` or `25`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fraction {
    pub num: u32,
    pub denom: u32,
}

impl Fraction {
    pub fn new(num: u32, denom: u32) -> Self {
        Self {
            num,
            denom: denom.max(1),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().split_once('/') {
            Some((num, denom)) => Some(Self::new(num.trim().parse().ok()?, denom.trim().parse().ok()?)),
            None => Some(Self::new(s.trim().parse().ok()?, 1)),
        }
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.denom == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.denom)
        }
    }
}

impl Serialize for Fraction {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Fraction {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u32),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(Self::new(n, 1)),
            Raw::Text(s) => Self::parse(&s)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid fraction '{}'", s))),
        }
    }
}

/// Frame rate bound, `[min, max]`
fn deserialize_rate<'de, D>(deserializer: D) -> Result<(Fraction, Fraction), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let rates = Vec::<Fraction>::deserialize(deserializer)?;
    match rates[..] {
        [] => Ok(default_video_rate()),
        [only] => Ok((only, only)),
        [min, max, ..] => Ok((min, max)),
    }
}

fn serialize_rate<S: serde::Serializer>(
    rate: &(Fraction, Fraction),
    serializer: S,
) -> Result<S::Ok, S::Error> {
    [rate.0, rate.1].serialize(serializer)
}

/// Empty lists in preset files mean "use the default bound"
fn bound_or<'de, D>(deserializer: D, default: fn() -> CapabilityBound) -> Result<CapabilityBound, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let bound = CapabilityBound::deserialize(deserializer)?;
    Ok(if bound.is_empty() { default() } else { bound })
}

fn audio_rate<'de, D: serde::Deserializer<'de>>(d: D) -> Result<CapabilityBound, D::Error> {
    bound_or(d, default_audio_rate)
}

fn audio_width<'de, D: serde::Deserializer<'de>>(d: D) -> Result<CapabilityBound, D::Error> {
    bound_or(d, default_audio_width)
}

fn audio_depth<'de, D: serde::Deserializer<'de>>(d: D) -> Result<CapabilityBound, D::Error> {
    bound_or(d, default_audio_depth)
}

fn audio_channels<'de, D: serde::Deserializer<'de>>(d: D) -> Result<CapabilityBound, D::Error> {
    bound_or(d, default_audio_channels)
}

fn dimension_or<'de, D>(deserializer: D, default: fn() -> DimensionBound) -> Result<DimensionBound, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values = Vec::<u32>::deserialize(deserializer)?;
    Ok(match values[..] {
        [min, max] => DimensionBound::new(min, max),
        _ => default(),
    })
}

fn video_width<'de, D: serde::Deserializer<'de>>(d: D) -> Result<DimensionBound, D::Error> {
    dimension_or(d, default_video_width)
}

fn video_height<'de, D: serde::Deserializer<'de>>(d: D) -> Result<DimensionBound, D::Error> {
    dimension_or(d, default_video_height)
}

fn null_as_empty<'de, D: serde::Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioCodec {
    /// Encoder element, empty when the preset carries no audio
    #[serde(default)]
    pub name: String,
    /// Container used when the input has audio only
    #[serde(default)]
    pub container: String,
    #[serde(default = "default_audio_rate", deserialize_with = "audio_rate")]
    pub rate: CapabilityBound,
    #[serde(default)]
    pub passes: Vec<String>,
    #[serde(default = "default_audio_width", deserialize_with = "audio_width")]
    pub width: CapabilityBound,
    #[serde(default = "default_audio_depth", deserialize_with = "audio_depth")]
    pub depth: CapabilityBound,
    #[serde(default = "default_audio_channels", deserialize_with = "audio_channels")]
    pub channels: CapabilityBound,
}

impl Default for AudioCodec {
    fn default() -> Self {
        Self {
            name: String::new(),
            container: String::new(),
            rate: default_audio_rate(),
            passes: Vec::new(),
            width: default_audio_width(),
            depth: default_audio_depth(),
            channels: default_audio_channels(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoCodec {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub container: String,
    #[serde(
        default = "default_video_rate",
        deserialize_with = "deserialize_rate",
        serialize_with = "serialize_rate"
    )]
    pub rate: (Fraction, Fraction),
    #[serde(default)]
    pub passes: Vec<String>,
    #[serde(default = "default_video_width", deserialize_with = "video_width")]
    pub width: DimensionBound,
    #[serde(default = "default_video_height", deserialize_with = "video_height")]
    pub height: DimensionBound,
    /// Extra description inserted before scaling, e.g. a pixel format conversion
    #[serde(default, deserialize_with = "null_as_empty")]
    pub transform: String,
}

impl Default for VideoCodec {
    fn default() -> Self {
        Self {
            name: String::new(),
            container: String::new(),
            rate: default_video_rate(),
            passes: Vec::new(),
            width: default_video_width(),
            height: default_video_height(),
            transform: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preset {
    pub name: String,
    pub description: String,
    pub author: Author,
    pub container: String,
    pub extension: String,
    pub icon: String,
    pub version: String,
    pub acodec: AudioCodec,
    pub vcodec: VideoCodec,
}

impl Preset {
    /// Number of encoder passes; audio only joins the trailing ones
    pub fn pass_count(&self) -> usize {
        self.vcodec.passes.len().max(self.acodec.passes.len())
    }

    /// Filename-safe identifier, `<device>-<preset name>`
    pub fn slug(&self, device_short_name: &str) -> String {
        format!("{}-{}", device_short_name, self.name.to_lowercase())
            .replace(' ', "_")
            .replace(['\'', '/'], "")
    }

    /// Elements this preset needs installed, in a stable order
    pub fn required_elements(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        [
            self.container.as_str(),
            self.acodec.name.as_str(),
            self.vcodec.name.as_str(),
        ]
        .into_iter()
        .chain(INTERNAL_ELEMENTS.iter().copied())
        .filter(|e| !e.is_empty() && seen.insert(*e))
        .map(str::to_string)
        .collect()
    }

    pub fn missing_elements(&self, registry: &dyn ElementRegistry) -> Vec<String> {
        self.required_elements()
            .into_iter()
            .filter(|e| !registry.has_element(e))
            .collect()
    }
}

/// A product and the presets tuned for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawDevice")]
pub struct Device {
    pub make: String,
    pub model: String,
    pub description: String,
    pub author: Author,
    pub version: String,
    pub icon: String,
    pub default: String,
    pub presets: Vec<Preset>,
    /// Stem of the file the device was loaded from
    #[serde(skip)]
    pub short_name: String,
    #[serde(skip)]
    pub filename: Option<PathBuf>,
}

impl Device {
    /// Friendly name; generic devices are known by their model alone
    pub fn name(&self) -> String {
        if self.make == "Generic" {
            self.model.clone()
        } else {
            format!("{} {}", self.make, self.model)
        }
    }

    pub fn preset(&self, name: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.name == name)
    }

    /// Named default if present, otherwise the first preset
    pub fn default_preset(&self) -> Option<&Preset> {
        self.preset(&self.default).or_else(|| self.presets.first())
    }

    pub fn from_json(data: &str) -> anyhow::Result<Self> {
        serde_json::from_str(data).context("Failed to parse device JSON")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read device file: {}", path.display()))?;
        let mut device = Self::from_json(&data)
            .with_context(|| format!("Invalid device file: {}", path.display()))?;
        device.short_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        device.filename = Some(path.to_path_buf());
        Ok(device)
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize device")
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = self
            .filename
            .as_ref()
            .context("Device has no file to save to")?;
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("Failed to write device file: {}", path.display()))
    }
}

#[derive(Deserialize)]
struct RawDevice {
    #[serde(default = "default_make")]
    make: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    author: Author,
    #[serde(default)]
    version: String,
    #[serde(default)]
    icon: String,
    #[serde(default)]
    default: String,
    #[serde(default)]
    presets: Vec<RawPreset>,
}

#[derive(Deserialize)]
struct RawPreset {
    #[serde(default)]
    name: String,
    description: Option<String>,
    author: Option<RawAuthor>,
    #[serde(default)]
    container: String,
    #[serde(default)]
    extension: String,
    icon: Option<String>,
    version: Option<String>,
    #[serde(default)]
    acodec: AudioCodec,
    #[serde(default)]
    vcodec: VideoCodec,
}

#[derive(Deserialize)]
struct RawAuthor {
    name: Option<String>,
    email: Option<String>,
}

impl From<RawDevice> for Device {
    fn from(raw: RawDevice) -> Self {
        let presets = raw
            .presets
            .into_iter()
            .map(|p| {
                let author = match p.author {
                    Some(a) => Author {
                        name: a.name.unwrap_or_else(|| raw.author.name.clone()),
                        email: a.email.unwrap_or_else(|| raw.author.email.clone()),
                    },
                    None => raw.author.clone(),
                };
                Preset {
                    name: p.name,
                    description: p.description.unwrap_or_else(|| raw.description.clone()),
                    author,
                    container: p.container,
                    extension: p.extension,
                    icon: p.icon.unwrap_or_else(|| raw.icon.clone()),
                    version: p.version.unwrap_or_else(|| raw.version.clone()),
                    acodec: p.acodec,
                    vcodec: p.vcodec,
                }
            })
            .collect();

        Self {
            make: raw.make,
            model: raw.model,
            description: raw.description,
            author: raw.author,
            version: raw.version,
            icon: raw.icon,
            default: raw.default,
            presets,
            short_name: String::new(),
            filename: None,
        }
    }
}

/// Build a unique output filename for `input` encoded with `preset`.
///
/// Disc and capture locators contribute only their last path segment. A
/// trailing number is appended, or incremented, until the name collides with
/// neither an existing file nor a path in `to_be_created`.
pub fn generate_output_path(
    input: &str,
    preset: &Preset,
    to_be_created: &[PathBuf],
    device_name: &str,
) -> PathBuf {
    let input = input.strip_prefix("file://").unwrap_or(input);
    let mut name = strip_extension(input).to_string();
    if ["dvd://", "v4l://", "v4l2://"].iter().any(|s| name.starts_with(s)) {
        name = name
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
    }
    if !device_name.is_empty() {
        name.push('-');
        name.push_str(device_name);
    }

    let mut candidate = format!("{}.{}", name, preset.extension);
    let taken = |path: &str| Path::new(path).exists() || to_be_created.iter().any(|p| p == Path::new(path));

    while taken(&candidate) {
        let (stem, ext) = candidate
            .rsplit_once('.')
            .map(|(s, e)| (s.to_string(), e.to_string()))
            .unwrap_or_else(|| (candidate.clone(), String::new()));
        let digits = stem.len() - stem.trim_end_matches(|c: char| c.is_ascii_digit()).len();
        let (base, number) = if digits > 0 {
            let (base, value) = stem.split_at(stem.len() - digits);
            (base.to_string(), value.parse::<u64>().unwrap_or(0) + 1)
        } else {
            (stem, 1)
        };
        candidate = format!("{}{}.{}", base, number, ext);
    }

    PathBuf::from(candidate)
}

/// Strip a trailing extension, leaving dots in directory names alone
fn strip_extension(input: &str) -> &str {
    let file_start = input.rfind('/').map(|i| i + 1).unwrap_or(0);
    match input[file_start..].rfind('.') {
        Some(dot) if dot > 0 => &input[..file_start + dot],
        _ => input,
    }
}
