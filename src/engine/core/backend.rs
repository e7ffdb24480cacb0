//! Seams to the external multimedia framework.
//!
//! The transcoder never touches the framework directly: it hands a
//! [`PipelineSpec`] to an [`Engine`], drives the returned [`Pipeline`], and asks
//! an [`ElementRegistry`] which elements exist and what they accept.

use super::bus::Bus;
use super::capability::CapsStructure;
use super::error::TranscodeResult;
use super::pipeline::PipelineSpec;
use std::sync::Arc;
use std::time::Duration;

/// A launched pipeline for one pass
pub trait Pipeline: Send {
    fn play(&mut self) -> TranscodeResult<()>;

    fn pause(&mut self) -> TranscodeResult<()>;

    /// Current stream position; fails with `StatusUnavailable` when unknown
    fn position(&self) -> TranscodeResult<Duration>;

    /// Ask the pipeline to finish as if the input had ended. Repeated calls are harmless.
    fn request_eos(&mut self) -> TranscodeResult<()>;

    /// Tear down, releasing every resource. Events posted afterwards are stale.
    fn shutdown(&mut self);
}

pub trait Engine {
    /// Instantiate `spec` without starting it. Status events go to `bus`.
    fn launch(&self, spec: &PipelineSpec, bus: Bus) -> TranscodeResult<Box<dyn Pipeline>>;
}

pub trait ElementRegistry {
    fn has_element(&self, name: &str) -> bool;

    /// Capabilities of the element's sink pad template.
    /// Fails with `CapabilityUnavailable` when they cannot be determined.
    fn sink_caps(&self, name: &str) -> TranscodeResult<Vec<CapsStructure>>;
}

impl<T: ElementRegistry + ?Sized> ElementRegistry for &T {
    fn has_element(&self, name: &str) -> bool {
        (**self).has_element(name)
    }

    fn sink_caps(&self, name: &str) -> TranscodeResult<Vec<CapsStructure>> {
        (**self).sink_caps(name)
    }
}

impl<T: Engine + ?Sized> Engine for &T {
    fn launch(&self, spec: &PipelineSpec, bus: Bus) -> TranscodeResult<Box<dyn Pipeline>> {
        (**self).launch(spec, bus)
    }
}

impl<T: ElementRegistry + ?Sized> ElementRegistry for Arc<T> {
    fn has_element(&self, name: &str) -> bool {
        (**self).has_element(name)
    }

    fn sink_caps(&self, name: &str) -> TranscodeResult<Vec<CapsStructure>> {
        (**self).sink_caps(name)
    }
}

impl<T: Engine + ?Sized> Engine for Arc<T> {
    fn launch(&self, spec: &PipelineSpec, bus: Bus) -> TranscodeResult<Box<dyn Pipeline>> {
        (**self).launch(spec, bus)
    }
}
