//! Turns a discovered input and a resolved preset into the pipeline of one pass.

use super::backend::ElementRegistry;
use super::capability::{reported_bound, resolve};
use super::error::{TranscodeError, TranscodeResult};
use super::geometry::{self, Geometry};
use super::locator::Locator;
use super::passes::{ParameterSet, remove_param_from_passes, substitute_threads};
use super::pipeline::{Chain, Element, PipelineSpec, Stage};
use super::preset::Preset;
use super::types::{AudioStreamInfo, Crop, MediaInfo, TranscodeOptions, VideoStreamInfo};
use tracing::{debug, info, warn};

/// Muxers whose inputs are request pads that must be named explicitly
pub const PAD_NAMED_CONTAINERS: &[&str] = &["qtmux", "webmmux", "avmux_dvd", "matroskamux", "mp4mux"];

/// Legacy AAC encoder that is missing from many installs
pub const LEGACY_AAC_ENCODER: &str = "faac";
pub const FALLBACK_AAC_ENCODER: &str = "avenc_aac";
pub const FALLBACK_AAC_CONTAINER: &str = "mp4mux";
/// Pass parameter the fallback encoder does not understand
pub const FALLBACK_AAC_DROPPED_PARAM: &str = "profile";

const DEMUX: &str = "dmux";
const MUX: &str = "mux";
const SINK: &str = "sink";
const TEXT_OVERLAY: &str = "txt";
pub const PROGRESS_ELEMENT: &str = "progress";

/// Passes needed for this input.
///
/// Only codecs that will actually encode a stream of the input count, so an
/// audio-only file never waits on video statistics passes.
pub fn job_pass_count(preset: &Preset, info: &MediaInfo) -> usize {
    let video = if encodes_video(preset, info) {
        preset.vcodec.passes.len()
    } else {
        0
    };
    let audio = if encodes_audio(preset, info) {
        preset.acodec.passes.len()
    } else {
        0
    };
    video.max(audio).max(1)
}

fn encodes_video(preset: &Preset, info: &MediaInfo) -> bool {
    info.has_video() && !preset.vcodec.name.is_empty()
}

fn encodes_audio(preset: &Preset, info: &MediaInfo) -> bool {
    info.has_audio() && !preset.acodec.name.is_empty()
}

/// Parameters a codec uses in `pass`, or None when it sits the pass out.
///
/// A codec with fewer passes than the job joins for the trailing ones. A codec
/// that declares no passes encodes with defaults in the final pass.
pub fn pass_parameters(passes: &[String], total: usize, pass: usize) -> Option<&str> {
    if passes.is_empty() {
        return (pass + 1 == total).then_some("");
    }
    let offset = total.saturating_sub(passes.len());
    pass.checked_sub(offset)
        .and_then(|i| passes.get(i))
        .map(String::as_str)
}

/// Which branches a pass contains and the encoder parameters for each
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassPlan {
    pub pass: usize,
    pub total: usize,
    pub video: Option<ParameterSet>,
    pub audio: Option<ParameterSet>,
}

impl PassPlan {
    pub fn new(preset: &Preset, info: &MediaInfo, pass: usize, threads: usize) -> TranscodeResult<Self> {
        let total = job_pass_count(preset, info);
        let params = |passes: &[String]| -> TranscodeResult<Option<ParameterSet>> {
            pass_parameters(passes, total, pass)
                .map(|raw| {
                    ParameterSet::parse(&substitute_threads(raw, threads))
                        .map_err(|e| TranscodeError::construction(format!("bad pass {} parameters: {}", pass, e)))
                })
                .transpose()
        };

        let video = if encodes_video(preset, info) {
            params(&preset.vcodec.passes)?
        } else {
            None
        };
        let audio = if encodes_audio(preset, info) {
            params(&preset.acodec.passes)?
        } else {
            None
        };

        Ok(Self {
            pass,
            total,
            video,
            audio,
        })
    }
}

/// Output container: the preset's for audio+video, otherwise the stream's own if it has one
pub fn select_container(preset: &Preset, info: &MediaInfo) -> String {
    let fallback = match (info.has_video(), info.has_audio()) {
        (true, false) => preset.vcodec.container.as_str(),
        (false, true) => preset.acodec.container.as_str(),
        _ => "",
    };
    if fallback.is_empty() {
        preset.container.clone()
    } else {
        fallback.to_string()
    }
}

pub struct GraphBuilder<'a, R: ElementRegistry + ?Sized> {
    registry: &'a R,
    threads: usize,
}

impl<'a, R: ElementRegistry + ?Sized> GraphBuilder<'a, R> {
    pub fn new(registry: &'a R, threads: usize) -> Self {
        Self {
            registry,
            threads: threads.max(1),
        }
    }

    /// Build the pipeline for `pass`.
    ///
    /// `preset` is the job's own copy: resolved capability bounds and the AAC
    /// substitution are written back to it so later passes see them.
    pub fn build(
        &self,
        info: &MediaInfo,
        preset: &mut Preset,
        options: &TranscodeOptions,
        locator: &Locator,
        pass: usize,
    ) -> TranscodeResult<PipelineSpec> {
        if !info.is_usable() {
            return Err(TranscodeError::construction("input has neither audio nor video"));
        }

        if encodes_audio(preset, info) {
            self.ensure_audio_encoder(preset)?;
        }
        if encodes_video(preset, info) && !self.registry.has_element(&preset.vcodec.name) {
            return Err(TranscodeError::construction(format!(
                "video encoder '{}' is not available",
                preset.vcodec.name
            )));
        }

        let plan = PassPlan::new(preset, info, pass, self.threads)?;
        if plan.video.is_none() && plan.audio.is_none() {
            return Err(TranscodeError::construction(format!(
                "nothing to encode in pass {} of {}",
                pass + 1,
                plan.total
            )));
        }

        let container = select_container(preset, info);
        if !container.is_empty() && !self.registry.has_element(&container) {
            return Err(TranscodeError::construction(format!(
                "container '{}' is not available",
                container
            )));
        }

        let mut spec = PipelineSpec::new();
        spec.add_chain(source_chain(locator)?);
        spec.add_chain(output_chain(&container, options));

        let mut progress = options.report_progress;

        if let (Some(params), Some(video)) = (&plan.video, &info.video) {
            self.resolve_video_bounds(preset);
            let geometry = geometry::plan(
                video.width,
                video.height,
                video.pixel_aspect_ratio,
                options.crop.unwrap_or_default(),
                preset.vcodec.width,
                preset.vcodec.height,
            )?;
            let deinterlace = wants_deinterlace(options, locator, video);
            let target = link_target(&container, "video_%u");
            spec.add_chain(video_chain(preset, params, &geometry, deinterlace, options, progress, target));
            for chain in subtitle_chains(options, locator)? {
                spec.add_chain(chain);
            }
            progress = false;
        }

        if let (Some(params), Some(audio)) = (&plan.audio, &info.audio) {
            self.resolve_audio_bounds(preset);
            let target = link_target(&container, "audio_%u");
            spec.add_chain(audio_chain(preset, params, audio, progress, target));
        }

        debug!("Pass {}/{}: {}", pass + 1, plan.total, spec);
        Ok(spec)
    }

    /// Swap the legacy AAC encoder for its replacement when it is missing.
    /// Any other missing audio encoder is fatal.
    fn ensure_audio_encoder(&self, preset: &mut Preset) -> TranscodeResult<()> {
        if self.registry.has_element(&preset.acodec.name) {
            return Ok(());
        }

        if preset.acodec.name == LEGACY_AAC_ENCODER {
            warn!(
                "Audio encoder {} not available, falling back to {}",
                LEGACY_AAC_ENCODER, FALLBACK_AAC_ENCODER
            );
            let acodec = &mut preset.acodec;
            acodec.name = FALLBACK_AAC_ENCODER.to_string();
            acodec.container = FALLBACK_AAC_CONTAINER.to_string();
            match acodec.passes.first_mut() {
                Some(first) => first.push_str(" compliance=experimental"),
                None => acodec.passes.push("compliance=experimental".to_string()),
            }
            remove_param_from_passes(&mut acodec.passes, FALLBACK_AAC_DROPPED_PARAM)
                .map_err(TranscodeError::construction)?;
            for p in acodec.passes.iter_mut() {
                *p = p.trim().to_string();
            }

            if self.registry.has_element(&preset.acodec.name) {
                info!("Using audio encoder {}", preset.acodec.name);
                return Ok(());
            }
        }

        Err(TranscodeError::construction(format!(
            "audio encoder '{}' is not available",
            preset.acodec.name
        )))
    }

    /// Keep the frame size inside what the encoder can take
    fn resolve_video_bounds(&self, preset: &mut Preset) {
        match self.registry.sink_caps(&preset.vcodec.name) {
            Ok(caps) => {
                if let Some(width) = reported_bound(&caps, "width") {
                    preset.vcodec.width = preset.vcodec.width.clamp_to(&width);
                }
                if let Some(height) = reported_bound(&caps, "height") {
                    preset.vcodec.height = preset.vcodec.height.clamp_to(&height);
                }
            }
            Err(e) => debug!("Keeping preset video bounds: {}", e),
        }
    }

    /// Widen rate and channel bounds to everything the encoder accepts
    fn resolve_audio_bounds(&self, preset: &mut Preset) {
        match self.registry.sink_caps(&preset.acodec.name) {
            Ok(caps) => {
                let acodec = &mut preset.acodec;
                acodec.rate = resolve(&acodec.rate, reported_bound(&caps, "rate").as_ref());
                acodec.channels = resolve(&acodec.channels, reported_bound(&caps, "channels").as_ref());
            }
            Err(e) => debug!("Keeping preset audio bounds: {}", e),
        }
    }
}

/// Explicit choice wins, then the stream's own flag, and discs are assumed interlaced
fn wants_deinterlace(options: &TranscodeOptions, locator: &Locator, video: &VideoStreamInfo) -> bool {
    options
        .deinterlace
        .or(video.interlaced)
        .unwrap_or_else(|| locator.is_disc())
}

fn source_chain(locator: &Locator) -> TranscodeResult<Chain> {
    let chain = match locator {
        Locator::Disc {
            device,
            title,
            chapter,
            ..
        } => {
            let mut src = Element::new("dvdreadsrc")
                .quoted_property("device", device)
                .property("title", title.unwrap_or(1));
            if let Some(chapter) = chapter {
                src = src.property("chapter", chapter);
            }
            Chain::new().then(src).then(Element::new("decodebin").named(DEMUX))
        }
        other => {
            let uri = other
                .uri()
                .ok_or_else(|| TranscodeError::construction(format!("no URI for '{}'", other)))?;
            Chain::new().then(
                Element::new("uridecodebin")
                    .quoted_property("uri", &uri)
                    .named(DEMUX),
            )
        }
    };
    Ok(chain)
}

fn output_chain(container: &str, options: &TranscodeOptions) -> Chain {
    let sink = Element::new("filesink")
        .named(SINK)
        .quoted_property("location", &options.output.to_string_lossy());
    if container.is_empty() {
        Chain::new().then(sink)
    } else {
        Chain::new()
            .then(Element::new(container).named(MUX))
            .then(Element::new("queue"))
            .then(sink)
    }
}

/// Branch endpoint: a named muxer pad, the muxer itself, or straight into the sink
fn link_target(container: &str, pad: &str) -> Stage {
    if container.is_empty() {
        Stage::pad(SINK)
    } else if PAD_NAMED_CONTAINERS.contains(&container) {
        Stage::request_pad(MUX, pad)
    } else {
        Stage::pad(MUX)
    }
}

fn progress_element() -> Element {
    Element::new("progressreport")
        .named(PROGRESS_ELEMENT)
        .property("update-freq", 1)
}

fn video_chain(
    preset: &Preset,
    params: &ParameterSet,
    geometry: &Geometry,
    deinterlace: bool,
    options: &TranscodeOptions,
    progress: bool,
    target: Stage,
) -> Chain {
    let mut chain = Chain::new().then(Stage::pad(DEMUX)).then(Element::new("queue"));
    if progress {
        chain.push(progress_element());
    }
    chain.push(Element::new("videoconvert"));
    chain.push(Element::new("videorate"));

    if deinterlace {
        chain.push(Element::new("avdeinterlace"));
    }

    if !geometry.crop.is_empty() {
        chain.push(crop_element(&geometry.crop));
    }

    if !preset.vcodec.transform.trim().is_empty() {
        chain.push(Stage::Fragment(preset.vcodec.transform.clone()));
    }

    if options.subtitle_file.is_some() || options.ssa {
        chain.push(
            Element::new("textoverlay")
                .quoted_property("font-desc", &options.font)
                .named(TEXT_OVERLAY),
        );
    }

    chain.push(Element::new("videoscale"));
    chain.push(Stage::Caps(format!(
        "video/x-raw,width={},height={}",
        geometry.width, geometry.height
    )));

    if geometry.is_padded() {
        let mut vbox = Element::new("videobox");
        if geometry.pad_left + geometry.pad_right > 0 {
            vbox = vbox
                .property("left", -i64::from(geometry.pad_left))
                .property("right", -i64::from(geometry.pad_right));
        }
        if geometry.pad_top + geometry.pad_bottom > 0 {
            vbox = vbox
                .property("top", -i64::from(geometry.pad_top))
                .property("bottom", -i64::from(geometry.pad_bottom));
        }
        chain.push(vbox);
        chain.push(Element::new("videoconvert"));
    }

    chain.push(Element::new(&preset.vcodec.name).with_parameters(params));
    chain.push(Element::new("queue"));
    chain.push(target);
    chain
}

fn crop_element(crop: &Crop) -> Element {
    Element::new("videocrop")
        .property("top", crop.top)
        .property("right", crop.right)
        .property("bottom", crop.bottom)
        .property("left", crop.left)
}

fn subtitle_chains(options: &TranscodeOptions, locator: &Locator) -> TranscodeResult<Vec<Chain>> {
    let mut chains = Vec::new();

    if let Some(subtitle) = &options.subtitle_file {
        let mut parse = Element::new("subparse");
        if let Some(charset) = &options.subtitle_charset {
            parse = parse.quoted_property("subtitle-encoding", charset);
        }
        chains.push(
            Chain::new()
                .then(Element::new("filesrc").quoted_property("location", &subtitle.to_string_lossy()))
                .then(parse)
                .then(Stage::pad(TEXT_OVERLAY)),
        );
    }

    if options.ssa {
        let path = match locator {
            Locator::File(path) => path.to_string_lossy().into_owned(),
            Locator::Uri(uri) if uri.starts_with("file://") => uri["file://".len()..].to_string(),
            other => {
                return Err(TranscodeError::construction(format!(
                    "embedded subtitles need a local Matroska file, not '{}'",
                    other
                )));
            }
        };
        chains.push(
            Chain::new()
                .then(Element::new("filesrc").quoted_property("location", &path))
                .then(Element::new("matroskademux").named("demux"))
                .then(Element::new("ssaparse"))
                .then(Stage::pad(TEXT_OVERLAY)),
        );
    }

    Ok(chains)
}

fn audio_chain(
    preset: &Preset,
    params: &ParameterSet,
    audio: &AudioStreamInfo,
    progress: bool,
    target: Stage,
) -> Chain {
    let channels = preset.acodec.channels.fit(audio.channels);
    let rate = preset.acodec.rate.fit(audio.sample_rate);

    let mut chain = Chain::new().then(Stage::pad(DEMUX)).then(Element::new("queue"));
    if progress {
        chain.push(progress_element());
    }
    chain.push(Element::new("audioconvert"));
    chain.push(Element::new("audiorate").property("tolerance", 100_000_000));
    chain.push(Element::new("audioresample"));
    chain.push(Stage::Caps(format!("audio/x-raw,channels={},rate={}", channels, rate)));
    chain.push(Element::new(&preset.acodec.name).with_parameters(params));
    chain.push(target);
    chain
}
