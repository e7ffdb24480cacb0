//! One transcode job: discovery, per-pass graph construction and the pass state machine.

use super::backend::{ElementRegistry, Engine, Pipeline};
use super::bus::{Bus, BusMessage, EngineEvent};
use super::discovery::{Discoverer, MAX_DISC_TITLES, find_longest_title};
use super::error::{TranscodeError, TranscodeResult};
use super::graph::{GraphBuilder, job_pass_count};
use super::locator::Locator;
use super::log::write_pipeline_log;
use super::pipeline::PipelineSpec;
use super::preset::Preset;
use super::progress::{DEFAULT_STALL_TIMEOUT, ProgressTracker, TranscodeStatus};
use super::types::{JobStatus, MediaInfo, PassState, TranscodeOptions};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::{Duration, Instant};
use sysinfo::System;
use tracing::{debug, info, warn};

/// What a job reports to whoever drives it
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Discovered { info: MediaInfo, is_media: bool },
    PassSetup { pass: usize, total: usize },
    PassComplete { pass: usize, total: usize },
    /// Every engine event, after the job has reacted to it
    Message(EngineEvent),
    Complete,
    Error(String),
}

#[derive(Debug, Clone)]
pub struct TranscoderSettings {
    /// Substituted for `%(threads)s` in encoder passes
    pub threads: usize,
    pub stall_timeout: Duration,
    /// Append each pass description to transcast.log
    pub pipeline_log: bool,
}

impl Default for TranscoderSettings {
    fn default() -> Self {
        Self {
            threads: detect_threads(),
            stall_timeout: DEFAULT_STALL_TIMEOUT,
            pipeline_log: false,
        }
    }
}

/// Logical CPU count, 2 when it cannot be determined
pub fn detect_threads() -> usize {
    let mut sys = System::new();
    sys.refresh_cpu();
    match sys.cpus().len() {
        0 => 2,
        n => n,
    }
}

pub struct Transcoder<E: Engine, R: ElementRegistry> {
    engine: E,
    registry: R,
    settings: TranscoderSettings,
    options: TranscodeOptions,
    locator: Locator,
    /// The job's own copy; resolved bounds never leak back into the catalog
    preset: Preset,
    info: Option<MediaInfo>,
    state: PassState,
    pipeline: Option<Box<dyn Pipeline>>,
    spec: Option<PipelineSpec>,
    generation: u64,
    bus_tx: Sender<BusMessage>,
    bus_rx: Receiver<BusMessage>,
    notifier: Sender<Notification>,
    started_at: Option<Instant>,
    tracker: ProgressTracker,
}

impl<E: Engine, R: ElementRegistry> Transcoder<E, R> {
    pub fn new(
        engine: E,
        registry: R,
        preset: &Preset,
        options: TranscodeOptions,
        settings: TranscoderSettings,
        notifier: Sender<Notification>,
    ) -> TranscodeResult<Self> {
        let locator = Locator::parse(&options.input)?.with_selection(
            options.title,
            options.chapter,
            options.audio_stream,
        );
        let (bus_tx, bus_rx) = mpsc::channel();
        let tracker = ProgressTracker::new(settings.stall_timeout);

        Ok(Self {
            engine,
            registry,
            settings,
            options,
            locator,
            preset: preset.clone(),
            info: None,
            state: PassState::new(preset.pass_count().max(1)),
            pipeline: None,
            spec: None,
            generation: 0,
            bus_tx,
            bus_rx,
            notifier,
            started_at: None,
            tracker,
        })
    }

    pub fn pass_state(&self) -> &PassState {
        &self.state
    }

    pub fn status_kind(&self) -> &JobStatus {
        &self.state.status
    }

    pub fn preset(&self) -> &Preset {
        &self.preset
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn info(&self) -> Option<&MediaInfo> {
        self.info.as_ref()
    }

    /// Description of the active pass, if one has been built
    pub fn pipeline_spec(&self) -> Option<&PipelineSpec> {
        self.spec.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.state.status.is_terminal()
    }

    /// Discover the input and start the first pass.
    ///
    /// Discs without an explicit title are searched for their longest title first.
    pub fn discover_and_start(&mut self, discoverer: &dyn Discoverer) -> TranscodeResult<()> {
        let title_search = match &self.locator {
            Locator::Disc {
                device,
                title: None,
                chapter,
                audio,
            } => Some((device.clone(), *chapter, *audio)),
            _ => None,
        };

        let discovered = match title_search {
            Some((device, chapter, audio)) => {
                find_longest_title(discoverer, &device, chapter, audio, MAX_DISC_TITLES).map(
                    |(title, info)| {
                        self.locator = self.locator.clone().with_selection(Some(title), None, None);
                        info
                    },
                )
            }
            None => discoverer.discover(&self.locator),
        };

        match discovered {
            Ok(info) => self.discovered(info),
            Err(e) => Err(self.fail(TranscodeError::Discovery(format!("{:#}", e)))),
        }
    }

    /// Accept discovery results; usable media is set up and started right away
    pub fn discovered(&mut self, info: MediaInfo) -> TranscodeResult<()> {
        let is_media = info.is_usable();
        self.notify(Notification::Discovered {
            info: info.clone(),
            is_media,
        });

        if !is_media {
            self.info = Some(info);
            return Err(self.fail(TranscodeError::construction("input has neither audio nor video")));
        }

        self.state = PassState::new(job_pass_count(&self.preset, &info));
        self.info = Some(info);
        self.setup_pass(0)?;
        self.start()
    }

    /// Build and launch the pipeline for `pass`, replacing any previous one
    fn setup_pass(&mut self, pass: usize) -> TranscodeResult<()> {
        self.teardown();
        self.generation += 1;
        self.state.current_pass = pass;
        self.tracker.reset();

        let Some(info) = self.info.as_ref() else {
            return Err(self.fail(TranscodeError::construction("input has not been discovered")));
        };

        let builder = GraphBuilder::new(&self.registry, self.settings.threads);
        let built = builder.build(info, &mut self.preset, &self.options, &self.locator, pass);
        let spec = match built {
            Ok(spec) => spec,
            Err(e) => return Err(self.fail(e)),
        };

        if self.settings.pipeline_log {
            if let Err(e) = write_pipeline_log(&spec.to_string()) {
                warn!("Failed to write pipeline log: {}", e);
            }
        }

        let bus = Bus::new(self.generation, self.bus_tx.clone());
        match self.engine.launch(&spec, bus) {
            Ok(pipeline) => self.pipeline = Some(pipeline),
            Err(e) => return Err(self.fail(e)),
        }
        self.spec = Some(spec);

        info!("Set up pass {}/{}", pass + 1, self.state.total_passes);
        self.notify(Notification::PassSetup {
            pass,
            total: self.state.total_passes,
        });
        Ok(())
    }

    /// Idle/Paused -> Running. The elapsed-time origin is set on the first start only.
    pub fn start(&mut self) -> TranscodeResult<()> {
        if self.state.status.is_terminal() {
            debug!("Ignoring start of a {:?} job", self.state.status);
            return Ok(());
        }
        let Some(pipeline) = self.pipeline.as_mut() else {
            return Err(TranscodeError::status("no pipeline has been set up"));
        };
        if let Err(e) = pipeline.play() {
            return Err(self.fail(e));
        }
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
        if self.state.status == JobStatus::Paused {
            self.tracker.reset();
        }
        self.state.status = JobStatus::Running;
        Ok(())
    }

    pub fn pause(&mut self) -> TranscodeResult<()> {
        if self.state.status != JobStatus::Running {
            return Ok(());
        }
        if let Some(pipeline) = self.pipeline.as_mut() {
            if let Err(e) = pipeline.pause() {
                return Err(self.fail(e));
            }
        }
        // Time spent paused is not a stall
        self.tracker.reset();
        self.state.status = JobStatus::Paused;
        Ok(())
    }

    /// Tear down the active pipeline; the job stays stopped until restarted
    pub fn stop(&mut self) {
        self.teardown();
        // Events still in flight belong to the old generation
        self.generation += 1;
        self.state.status = JobStatus::Stopped;
        info!("Job stopped");
    }

    /// Start over from the first pass; partial passes are never resumed
    pub fn restart(&mut self) -> TranscodeResult<()> {
        self.teardown();
        let total = match &self.info {
            Some(info) => job_pass_count(&self.preset, info),
            None => return Err(TranscodeError::construction("input has not been discovered")),
        };
        self.state = PassState::new(total);
        self.started_at = None;
        self.setup_pass(0)?;
        self.start()
    }

    /// React to one bus message
    pub fn handle_message(&mut self, message: BusMessage) -> TranscodeResult<()> {
        if message.generation != self.generation {
            debug!(
                "Dropping {:?} from stale pipeline generation {}",
                message.event, message.generation
            );
            return Ok(());
        }
        if self.state.status.is_terminal() {
            debug!("Dropping {:?} after the job ended", message.event);
            return Ok(());
        }

        let result = match &message.event {
            EngineEvent::EndOfStream => self.pass_finished(),
            EngineEvent::Error(reason) => {
                self.teardown();
                Err(self.fail(TranscodeError::EngineRuntime(reason.clone())))
            }
            EngineEvent::StateChanged(state) => {
                debug!("Pipeline state: {}", state);
                Ok(())
            }
        };

        self.notify(Notification::Message(message.event));
        result
    }

    fn pass_finished(&mut self) -> TranscodeResult<()> {
        if !matches!(self.state.status, JobStatus::Running | JobStatus::Paused) {
            return Ok(());
        }

        self.teardown();
        let pass = self.state.current_pass;
        let total = self.state.total_passes;
        self.notify(Notification::PassComplete { pass, total });

        if self.state.is_final_pass() {
            self.state.status = JobStatus::Complete;
            info!("Transcode complete after {} pass(es)", total);
            self.notify(Notification::Complete);
            return Ok(());
        }

        self.setup_pass(pass + 1)?;
        self.start()
    }

    /// Handle whatever is queued without blocking. Returns true once the job is finished.
    pub fn pump(&mut self) -> TranscodeResult<bool> {
        loop {
            match self.bus_rx.try_recv() {
                Ok(message) => self.handle_message(message)?,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        Ok(self.is_finished())
    }

    /// Drive the job to a terminal state, calling `on_tick` whenever `tick` passes quietly
    pub fn run<F>(&mut self, tick: Duration, mut on_tick: F) -> TranscodeResult<JobStatus>
    where
        F: FnMut(&mut Self),
    {
        while !self.is_finished() {
            match self.bus_rx.recv_timeout(tick) {
                Ok(message) => self.handle_message(message)?,
                Err(RecvTimeoutError::Timeout) => on_tick(self),
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        Ok(self.state.status.clone())
    }

    pub fn status(&mut self) -> TranscodeResult<TranscodeStatus> {
        self.status_at(Instant::now())
    }

    /// Progress of the active pass as of `now`.
    ///
    /// A running pass whose progress has not moved for longer than the stall
    /// timeout is asked to finish. Paused jobs are never finished this way.
    pub fn status_at(&mut self, now: Instant) -> TranscodeResult<TranscodeStatus> {
        let duration = self.info.as_ref().and_then(|i| i.duration);
        let Some(pipeline) = self.pipeline.as_mut() else {
            return Err(TranscodeError::status("no pipeline to query"));
        };
        let position = pipeline.position()?;
        let elapsed = self
            .started_at
            .map(|t| now.saturating_duration_since(t))
            .unwrap_or_default();

        let observation = self.tracker.observe(position, duration, elapsed, now)?;
        if observation.stalled && self.state.status == JobStatus::Running {
            warn!(
                "No progress at {:.1}% for {:?}, finishing pass",
                observation.status.percent(),
                self.settings.stall_timeout
            );
            if let Err(e) = pipeline.request_eos() {
                warn!("End-of-stream request failed: {}", e);
            }
        }
        Ok(observation.status)
    }

    fn teardown(&mut self) {
        if let Some(mut pipeline) = self.pipeline.take() {
            pipeline.shutdown();
        }
    }

    /// Record a failure and report it once
    fn fail(&mut self, error: TranscodeError) -> TranscodeError {
        self.teardown();
        let reason = error.to_string();
        warn!("Transcode failed: {}", reason);
        self.state.status = JobStatus::Failed(reason.clone());
        self.notify(Notification::Error(reason));
        error
    }

    fn notify(&self, notification: Notification) {
        let _ = self.notifier.send(notification);
    }
}

impl<E: Engine, R: ElementRegistry> Drop for Transcoder<E, R> {
    fn drop(&mut self) {
        self.teardown();
    }
}
