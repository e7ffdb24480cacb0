mod backend;
mod bus;
mod capability;
mod catalog;
mod discovery;
mod error;
mod geometry;
mod graph;
mod locator;
mod log;
mod passes;
mod pipeline;
mod preset;
mod progress;
mod transcoder;
mod types;

pub use backend::{ElementRegistry, Engine, Pipeline};
pub use bus::{Bus, BusMessage, EngineEvent};
pub use capability::{CapabilityBound, CapsStructure, DimensionBound, reported_bound, resolve};
pub use catalog::Catalog;
pub use discovery::{Discoverer, MAX_DISC_TITLES, find_longest_title};
pub use error::{TranscodeError, TranscodeResult};
pub use geometry::{Geometry, plan};
pub use graph::{
    FALLBACK_AAC_CONTAINER, FALLBACK_AAC_ENCODER, GraphBuilder, LEGACY_AAC_ENCODER,
    PAD_NAMED_CONTAINERS, PROGRESS_ELEMENT, PassPlan, job_pass_count, pass_parameters,
    select_container,
};
pub use locator::Locator;
pub use log::{PIPELINE_LOG, append_log, write_pipeline_log};
pub use passes::{ParameterSet, THREADS_PLACEHOLDER, remove_param_from_passes, substitute_threads};
pub use pipeline::{Chain, Element, PipelineSpec, Stage};
pub use preset::{
    AudioCodec, Author, Device, Fraction, INTERNAL_ELEMENTS, Preset, VideoCodec,
    generate_output_path,
};
pub use progress::{
    DEFAULT_STALL_TIMEOUT, Observation, ProgressTracker, TranscodeStatus, format_friendly_time,
};
pub use transcoder::{Notification, Transcoder, TranscoderSettings, detect_threads};
pub use types::{
    AudioStreamInfo, Crop, DEFAULT_FONT, JobStatus, MediaInfo, PassState, PixelAspectRatio,
    TranscodeOptions, VideoStreamInfo,
};
