use super::error::{TranscodeError, TranscodeResult};
use std::time::{Duration, Instant};

/// Default time a fraction may stay unchanged before the pass is finished early
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Progress of the current pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranscodeStatus {
    /// Position over duration, within [0, 1]
    pub fraction: f64,
    /// None until any progress has been made
    pub remaining: Option<Duration>,
}

impl TranscodeStatus {
    pub fn percent(&self) -> f64 {
        self.fraction * 100.0
    }

    /// `M:SS`, or "Unknown" before the first progress
    pub fn human_remaining(&self) -> String {
        match self.remaining {
            Some(remaining) => {
                let secs = remaining.as_secs();
                format!("{}:{:02}", secs / 60, secs % 60)
            }
            None => "Unknown".to_string(),
        }
    }
}

/// Result of one progress observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub status: TranscodeStatus,
    /// The caller should request end-of-stream: the fraction has not moved for too long
    pub stalled: bool,
}

/// Turns position samples into a status and spots encodes that stopped moving.
///
/// A stall is reported once per stuck fraction value. Any change of the
/// fraction re-arms detection.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    stall_timeout: Duration,
    last_fraction: Option<f64>,
    last_change: Option<Instant>,
    stall_reported: bool,
}

impl ProgressTracker {
    pub fn new(stall_timeout: Duration) -> Self {
        Self {
            stall_timeout,
            last_fraction: None,
            last_change: None,
            stall_reported: false,
        }
    }

    /// Forget the previous samples, used when a new pass starts
    pub fn reset(&mut self) {
        self.last_fraction = None;
        self.last_change = None;
        self.stall_reported = false;
    }

    /// `elapsed` is the time since the job first started, across passes
    pub fn observe(
        &mut self,
        position: Duration,
        duration: Option<Duration>,
        elapsed: Duration,
        now: Instant,
    ) -> TranscodeResult<Observation> {
        let duration = duration
            .filter(|d| !d.is_zero())
            .ok_or_else(|| TranscodeError::status("duration unknown"))?;

        let fraction = (position.as_secs_f64() / duration.as_secs_f64()).clamp(0.0, 1.0);

        if fraction <= 0.0 {
            return Ok(Observation {
                status: TranscodeStatus {
                    fraction: 0.0,
                    remaining: None,
                },
                stalled: false,
            });
        }

        let mut stalled = false;
        match (self.last_fraction, self.last_change) {
            (Some(last), Some(since)) if last == fraction => {
                if !self.stall_reported && now.saturating_duration_since(since) > self.stall_timeout {
                    self.stall_reported = true;
                    stalled = true;
                }
            }
            _ => {
                self.last_fraction = Some(fraction);
                self.last_change = Some(now);
                self.stall_reported = false;
            }
        }

        let total = elapsed.as_secs_f64() / fraction;
        let remaining = Duration::from_secs_f64((total - elapsed.as_secs_f64()).max(0.0));

        Ok(Observation {
            status: TranscodeStatus {
                fraction,
                remaining: Some(remaining),
            },
            stalled,
        })
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(DEFAULT_STALL_TIMEOUT)
    }
}

/// `HH:MM:SS`
pub fn format_friendly_time(seconds: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}
