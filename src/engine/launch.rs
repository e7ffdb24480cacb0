//! Runs pipelines with gst-launch as a child process.
//!
//! gst-launch is started with `-e` so an interrupt turns into an end-of-stream
//! instead of an abort. Pause and resume use SIGSTOP/SIGCONT. Positions come
//! from the `progressreport` stage the graph builder inserts.

use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::{Bus, Engine, EngineEvent, Pipeline, PipelineSpec, TranscodeError, TranscodeResult};

pub const DEFAULT_LAUNCHER: &str = "gst-launch-1.0";

/// How long a finished launcher gets to exit on its own before it is killed
const EXIT_GRACE: Duration = Duration::from_secs(2);

/// What a single line of launcher output means
#[derive(Debug, Clone, PartialEq)]
pub enum LaunchLine {
    Event(EngineEvent),
    Position(Duration),
}

/// Interpret one line of gst-launch output
pub fn parse_launch_line(line: &str) -> Option<LaunchLine> {
    let line = line.trim();

    if line.starts_with("Got EOS from element") {
        return Some(LaunchLine::Event(EngineEvent::EndOfStream));
    }
    if let Some(reason) = line.strip_prefix("ERROR: ") {
        return Some(LaunchLine::Event(EngineEvent::Error(reason.to_string())));
    }
    if let Some(reason) = line.strip_prefix("WARNING: erroneous pipeline: ") {
        return Some(LaunchLine::Event(EngineEvent::Error(reason.to_string())));
    }
    if let Some(rest) = line.strip_prefix("Setting pipeline to ") {
        let state = rest.split_whitespace().next().unwrap_or(rest);
        return Some(LaunchLine::Event(EngineEvent::StateChanged(state.to_string())));
    }

    // progress (00:00:05): 5 / 120 seconds ( 4.2 %)
    let (_, report) = line.split_once("): ")?;
    if !report.contains("seconds") {
        return None;
    }
    let seconds: f64 = report.split_whitespace().next()?.parse().ok()?;
    Some(LaunchLine::Position(Duration::from_secs_f64(seconds.max(0.0))))
}

/// Engine that hands each pass to a gst-launch process
#[derive(Debug, Clone)]
pub struct GstLaunchEngine {
    launcher: String,
    extra_args: Vec<String>,
}

impl GstLaunchEngine {
    pub fn new(launcher: impl Into<String>, extra_args: Vec<String>) -> Self {
        Self {
            launcher: launcher.into(),
            extra_args,
        }
    }
}

impl Default for GstLaunchEngine {
    fn default() -> Self {
        Self::new(DEFAULT_LAUNCHER, Vec::new())
    }
}

impl Engine for GstLaunchEngine {
    fn launch(&self, spec: &PipelineSpec, bus: Bus) -> TranscodeResult<Box<dyn Pipeline>> {
        let mut args = vec!["-e".to_string()];
        args.extend(self.extra_args.iter().cloned());
        args.extend(spec.to_args()?);

        Ok(Box::new(LaunchedPipeline {
            launcher: self.launcher.clone(),
            args,
            bus,
            child: None,
            paused: false,
            eos_requested: false,
            shared: Arc::new(Shared::default()),
        }))
    }
}

#[derive(Debug, Default)]
struct Shared {
    position: Mutex<Option<Duration>>,
    /// EOS or an error has been posted, so a silent exit is expected
    finished: AtomicBool,
    shutting_down: AtomicBool,
}

struct LaunchedPipeline {
    launcher: String,
    args: Vec<String>,
    bus: Bus,
    child: Option<Child>,
    paused: bool,
    eos_requested: bool,
    shared: Arc<Shared>,
}

impl LaunchedPipeline {
    fn spawn(&mut self) -> TranscodeResult<()> {
        debug!("{} {}", self.launcher, self.args.join(" "));
        let mut child = Command::new(&self.launcher)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                TranscodeError::construction(format!("failed to run {}: {}", self.launcher, e))
            })?;

        if let Some(stdout) = child.stdout.take() {
            let bus = self.bus.clone();
            let shared = self.shared.clone();
            // stdout closing means the launcher is gone
            thread::spawn(move || {
                read_output(stdout, &bus, &shared);
                if !shared.finished.load(Ordering::SeqCst) && !shared.shutting_down.load(Ordering::SeqCst) {
                    let _ = bus.post(EngineEvent::Error("pipeline exited without finishing".to_string()));
                }
            });
        }
        if let Some(stderr) = child.stderr.take() {
            let bus = self.bus.clone();
            let shared = self.shared.clone();
            thread::spawn(move || read_output(stderr, &bus, &shared));
        }

        self.child = Some(child);
        Ok(())
    }

    fn signal(&self, sig: i32) -> TranscodeResult<()> {
        let Some(child) = self.child.as_ref() else {
            return Ok(());
        };
        send_signal(child.id(), sig)
    }
}

fn read_output<R: Read>(stream: R, bus: &Bus, shared: &Shared) {
    for line in BufReader::new(stream).lines() {
        let Ok(line) = line else { break };
        match parse_launch_line(&line) {
            Some(LaunchLine::Position(position)) => {
                if let Ok(mut slot) = shared.position.lock() {
                    *slot = Some(position);
                }
            }
            Some(LaunchLine::Event(event)) => {
                let terminal = matches!(event, EngineEvent::EndOfStream | EngineEvent::Error(_));
                // Only the first terminal event of a pipeline counts
                if terminal && shared.finished.swap(true, Ordering::SeqCst) {
                    continue;
                }
                let _ = bus.post(event);
            }
            None => {}
        }
    }
}

#[cfg(unix)]
fn send_signal(pid: u32, sig: i32) -> TranscodeResult<()> {
    // SAFETY: kill only sends a signal to the child we spawned
    let rc = unsafe { libc::kill(pid as libc::pid_t, sig) };
    if rc == 0 {
        Ok(())
    } else {
        Err(TranscodeError::EngineRuntime(format!(
            "failed to signal pipeline process {}: {}",
            pid,
            std::io::Error::last_os_error()
        )))
    }
}

#[cfg(not(unix))]
fn send_signal(_pid: u32, _sig: i32) -> TranscodeResult<()> {
    Err(TranscodeError::EngineRuntime(
        "pipeline signals are only supported on unix".to_string(),
    ))
}

#[cfg(unix)]
const SIGSTOP: i32 = libc::SIGSTOP;
#[cfg(unix)]
const SIGCONT: i32 = libc::SIGCONT;
#[cfg(unix)]
const SIGINT: i32 = libc::SIGINT;
#[cfg(not(unix))]
const SIGSTOP: i32 = 19;
#[cfg(not(unix))]
const SIGCONT: i32 = 18;
#[cfg(not(unix))]
const SIGINT: i32 = 2;

impl Pipeline for LaunchedPipeline {
    fn play(&mut self) -> TranscodeResult<()> {
        if self.child.is_none() {
            return self.spawn();
        }
        if self.paused {
            self.signal(SIGCONT)?;
            self.paused = false;
        }
        Ok(())
    }

    fn pause(&mut self) -> TranscodeResult<()> {
        if self.child.is_some() && !self.paused {
            self.signal(SIGSTOP)?;
            self.paused = true;
        }
        Ok(())
    }

    fn position(&self) -> TranscodeResult<Duration> {
        self.shared
            .position
            .lock()
            .ok()
            .and_then(|p| *p)
            .ok_or_else(|| TranscodeError::status("position not reported yet"))
    }

    fn request_eos(&mut self) -> TranscodeResult<()> {
        if self.eos_requested || self.child.is_none() {
            return Ok(());
        }
        if self.paused {
            self.signal(SIGCONT)?;
            self.paused = false;
        }
        self.signal(SIGINT)?;
        self.eos_requested = true;
        Ok(())
    }

    fn shutdown(&mut self) {
        self.shared.shutting_down.store(true, Ordering::SeqCst);
        let Some(mut child) = self.child.take() else {
            return;
        };
        if self.paused {
            let _ = send_signal(child.id(), SIGCONT);
        }

        let deadline = Instant::now() + EXIT_GRACE;
        loop {
            match child.try_wait() {
                Ok(Some(_)) => return,
                Ok(None) if Instant::now() < deadline => thread::sleep(Duration::from_millis(50)),
                _ => break,
            }
        }
        if let Err(e) = child.kill() {
            warn!("Failed to kill pipeline process: {}", e);
        }
        let _ = child.wait();
    }
}

impl Drop for LaunchedPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}
