use super::error::{TranscodeError, TranscodeResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

const DISC_SCHEME: &str = "dvd://";
const CAPTURE_SCHEMES: [&str; 2] = ["v4l://", "v4l2://"];

/// Where a job reads its input from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Locator {
    /// Local file, always absolute
    File(PathBuf),
    /// Anything with a scheme the decoder understands (`file://`, `http://`, ...)
    Uri(String),
    /// Optical disc title selector, `dvd://device@title:chapter:audio`
    Disc {
        device: String,
        title: Option<u32>,
        chapter: Option<u32>,
        audio: Option<u32>,
    },
    /// Live capture device (`v4l://`, `v4l2://`)
    Capture { uri: String },
}

impl Locator {
    /// Parse a locator string. Selectors written as `a` (or left out) mean "pick automatically".
    pub fn parse(input: &str) -> TranscodeResult<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(TranscodeError::construction("no input given"));
        }

        if let Some(rest) = input.strip_prefix(DISC_SCHEME) {
            let (device, selectors) = match rest.split_once('@') {
                Some((device, selectors)) => (device, Some(selectors)),
                None => (rest, None),
            };
            if device.is_empty() {
                return Err(TranscodeError::construction(format!(
                    "disc locator '{}' has no device",
                    input
                )));
            }

            let mut parts = selectors.unwrap_or("").split(':').map(parse_selector);
            return Ok(Self::Disc {
                device: device.to_string(),
                title: parts.next().flatten(),
                chapter: parts.next().flatten(),
                audio: parts.next().flatten(),
            });
        }

        if CAPTURE_SCHEMES.iter().any(|s| input.starts_with(s)) {
            return Ok(Self::Capture {
                uri: input.to_string(),
            });
        }

        if input.contains("://") {
            return Ok(Self::Uri(input.to_string()));
        }

        Ok(Self::File(absolute(Path::new(input))))
    }

    /// Apply explicit selections on top of whatever the locator string carried
    pub fn with_selection(
        mut self,
        title: Option<u32>,
        chapter: Option<u32>,
        audio_stream: Option<u32>,
    ) -> Self {
        if let Self::Disc {
            title: t,
            chapter: c,
            audio: a,
            ..
        } = &mut self
        {
            *t = title.or(*t);
            *c = chapter.or(*c);
            *a = audio_stream.or(*a);
        }
        self
    }

    pub fn is_disc(&self) -> bool {
        matches!(self, Self::Disc { .. })
    }

    /// URI handed to a URI decoder. Discs have none, they use a dedicated source.
    pub fn uri(&self) -> Option<String> {
        match self {
            Self::File(path) => Some(format!("file://{}", path.display())),
            Self::Uri(uri) | Self::Capture { uri } => Some(uri.clone()),
            Self::Disc { .. } => None,
        }
    }

    /// Final path component, used when naming output files
    pub fn basename(&self) -> String {
        match self {
            Self::File(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            Self::Disc { device, .. } => last_segment(device),
            Self::Uri(uri) | Self::Capture { uri } => {
                let path = uri.split_once("://").map(|(_, p)| p).unwrap_or(uri);
                last_segment(path)
            }
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Uri(uri) | Self::Capture { uri } => f.write_str(uri),
            Self::Disc {
                device,
                title,
                chapter,
                audio,
            } => write!(
                f,
                "{}{}@{}:{}:{}",
                DISC_SCHEME,
                device,
                selector(*title),
                selector(*chapter),
                selector(*audio)
            ),
        }
    }
}

fn parse_selector(s: &str) -> Option<u32> {
    s.trim().parse().ok()
}

fn selector(value: Option<u32>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "a".to_string())
}

fn last_segment(path: &str) -> String {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
