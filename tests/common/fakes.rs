//! In-memory stand-ins for the multimedia framework

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use transcast::engine::{
    Bus, CapsStructure, Discoverer, ElementRegistry, Engine, EngineEvent, Locator, MediaInfo,
    Pipeline, PipelineSpec, TranscodeError, TranscodeResult,
};

/// Registry that knows exactly the elements it was given
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    elements: HashSet<String>,
    caps: HashMap<String, Vec<CapsStructure>>,
}

impl MemoryRegistry {
    pub fn with(elements: &[&str]) -> Self {
        Self {
            elements: elements.iter().map(|e| e.to_string()).collect(),
            caps: HashMap::new(),
        }
    }

    pub fn add(mut self, element: &str) -> Self {
        self.elements.insert(element.to_string());
        self
    }

    pub fn remove(mut self, element: &str) -> Self {
        self.elements.remove(element);
        self
    }

    pub fn with_caps(mut self, element: &str, caps: Vec<CapsStructure>) -> Self {
        self.elements.insert(element.to_string());
        self.caps.insert(element.to_string(), caps);
        self
    }
}

impl ElementRegistry for MemoryRegistry {
    fn has_element(&self, name: &str) -> bool {
        self.elements.contains(name)
    }

    fn sink_caps(&self, name: &str) -> TranscodeResult<Vec<CapsStructure>> {
        self.caps
            .get(name)
            .cloned()
            .ok_or_else(|| TranscodeError::CapabilityUnavailable {
                element: name.to_string(),
            })
    }
}

#[derive(Debug, Default)]
struct EngineLog {
    specs: Vec<PipelineSpec>,
    buses: Vec<Bus>,
    calls: Vec<String>,
    position: Option<Duration>,
    eos_requests: usize,
    finish_on_play: bool,
}

/// Engine that records every launch and lets the test post bus events
#[derive(Debug, Clone, Default)]
pub struct RecordingEngine {
    log: Arc<Mutex<EngineLog>>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every pipeline reports end-of-stream as soon as it starts playing
    pub fn finishing() -> Self {
        let engine = Self::default();
        engine.log.lock().unwrap().finish_on_play = true;
        engine
    }

    pub fn launched(&self) -> usize {
        self.log.lock().unwrap().specs.len()
    }

    pub fn spec(&self, index: usize) -> PipelineSpec {
        self.log.lock().unwrap().specs[index].clone()
    }

    pub fn latest_spec(&self) -> PipelineSpec {
        let log = self.log.lock().unwrap();
        log.specs.last().cloned().expect("nothing launched")
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().calls.clone()
    }

    pub fn eos_requests(&self) -> usize {
        self.log.lock().unwrap().eos_requests
    }

    pub fn set_position(&self, position: Duration) {
        self.log.lock().unwrap().position = Some(position);
    }

    /// Post on the bus of the `index`th launched pipeline
    pub fn post(&self, index: usize, event: EngineEvent) {
        let bus = self.log.lock().unwrap().buses[index].clone();
        bus.post(event).unwrap();
    }

    pub fn post_latest(&self, event: EngineEvent) {
        let index = self.launched() - 1;
        self.post(index, event);
    }
}

impl Engine for RecordingEngine {
    fn launch(&self, spec: &PipelineSpec, bus: Bus) -> TranscodeResult<Box<dyn Pipeline>> {
        let mut log = self.log.lock().unwrap();
        let index = log.specs.len();
        log.specs.push(spec.clone());
        log.buses.push(bus.clone());
        log.calls.push(format!("launch {}", index));
        Ok(Box::new(RecordingPipeline {
            index,
            bus,
            log: self.log.clone(),
            finished: false,
        }))
    }
}

struct RecordingPipeline {
    index: usize,
    bus: Bus,
    log: Arc<Mutex<EngineLog>>,
    finished: bool,
}

impl RecordingPipeline {
    fn record(&self, call: &str) {
        self.log
            .lock()
            .unwrap()
            .calls
            .push(format!("{} {}", call, self.index));
    }
}

impl Pipeline for RecordingPipeline {
    fn play(&mut self) -> TranscodeResult<()> {
        self.record("play");
        let finish = self.log.lock().unwrap().finish_on_play;
        if finish && !self.finished {
            self.finished = true;
            let _ = self.bus.post(EngineEvent::EndOfStream);
        }
        Ok(())
    }

    fn pause(&mut self) -> TranscodeResult<()> {
        self.record("pause");
        Ok(())
    }

    fn position(&self) -> TranscodeResult<Duration> {
        self.log
            .lock()
            .unwrap()
            .position
            .ok_or_else(|| TranscodeError::status("no position yet"))
    }

    fn request_eos(&mut self) -> TranscodeResult<()> {
        self.record("eos");
        self.log.lock().unwrap().eos_requests += 1;
        Ok(())
    }

    fn shutdown(&mut self) {
        self.record("shutdown");
    }
}

/// Discoverer answering from a table keyed by the locator's display form
#[derive(Debug, Clone, Default)]
pub struct TableDiscoverer {
    entries: HashMap<String, MediaInfo>,
    fallback: Option<MediaInfo>,
}

impl TableDiscoverer {
    /// Every locator discovers as `info`
    pub fn always(info: MediaInfo) -> Self {
        Self {
            entries: HashMap::new(),
            fallback: Some(info),
        }
    }

    pub fn entry(mut self, locator: &str, info: MediaInfo) -> Self {
        self.entries.insert(locator.to_string(), info);
        self
    }
}

impl Discoverer for TableDiscoverer {
    fn discover(&self, locator: &Locator) -> anyhow::Result<MediaInfo> {
        let key = locator.to_string();
        match self.entries.get(&key).or(self.fallback.as_ref()) {
            Some(info) => Ok(MediaInfo {
                locator: key,
                ..info.clone()
            }),
            None => anyhow::bail!("cannot open {}", key),
        }
    }
}
