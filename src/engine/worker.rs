// Worker pool for running independent transcode jobs in parallel

use anyhow::{Result, bail};
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;
use uuid::Uuid;

use super::{
    Discoverer, ElementRegistry, Engine, JobStatus, Notification, Preset, TranscodeOptions,
    Transcoder, TranscoderSettings,
};

/// How often a running job reports progress
pub const PROGRESS_TICK: Duration = Duration::from_secs(1);

/// A queued transcode: input/output options plus its own copy of the preset
#[derive(Debug, Clone)]
pub struct TranscodeJob {
    pub id: Uuid,
    pub options: TranscodeOptions,
    pub preset: Preset,
}

impl TranscodeJob {
    pub fn new(options: TranscodeOptions, preset: Preset) -> Self {
        Self {
            id: Uuid::new_v4(),
            options,
            preset,
        }
    }
}

/// The external collaborators a job runs against, shared read-only between workers
#[derive(Clone)]
pub struct JobBackends {
    pub engine: Arc<dyn Engine + Send + Sync>,
    pub registry: Arc<dyn ElementRegistry + Send + Sync>,
    pub discoverer: Arc<dyn Discoverer + Send + Sync>,
    pub settings: TranscoderSettings,
}

/// Message from worker to main thread
#[derive(Debug, Clone)]
pub enum WorkerMessage {
    /// Job started (discovery is about to run)
    JobStarted { job_id: Uuid },

    /// Forwarded from the job's transcoder
    Notification {
        job_id: Uuid,
        notification: Notification,
    },

    /// Periodic progress of the running pass
    Progress {
        job_id: Uuid,
        pass: usize,
        total_passes: usize,
        fraction: f64,
        remaining: String,
    },

    /// Job completed successfully
    JobCompleted { job_id: Uuid },

    /// Job failed with error
    JobFailed { job_id: Uuid, error: String },

    /// Worker is idle (waiting for work)
    WorkerIdle { worker_id: usize },
}

/// Run one job to completion on the calling thread
pub fn run_job(job: &TranscodeJob, backends: &JobBackends, on_message: &mut dyn FnMut(WorkerMessage)) -> Result<()> {
    let job_id = job.id;
    let (ntx, nrx) = mpsc::channel();
    let mut transcoder = Transcoder::new(
        backends.engine.clone(),
        backends.registry.clone(),
        &job.preset,
        job.options.clone(),
        backends.settings.clone(),
        ntx,
    )?;

    let forward = |nrx: &Receiver<Notification>, on_message: &mut dyn FnMut(WorkerMessage)| {
        for notification in nrx.try_iter() {
            on_message(WorkerMessage::Notification {
                job_id,
                notification,
            });
        }
    };

    let started = transcoder.discover_and_start(backends.discoverer.as_ref());
    forward(&nrx, &mut *on_message);
    started?;

    let status = transcoder.run(PROGRESS_TICK, |t| {
        forward(&nrx, &mut *on_message);
        if let Ok(status) = t.status() {
            on_message(WorkerMessage::Progress {
                job_id,
                pass: t.pass_state().current_pass,
                total_passes: t.pass_state().total_passes,
                fraction: status.fraction,
                remaining: status.human_remaining(),
            });
        }
    });
    forward(&nrx, &mut *on_message);

    match status? {
        JobStatus::Complete => Ok(()),
        JobStatus::Failed(reason) => bail!(reason),
        other => bail!("Job ended as {:?}", other),
    }
}

/// Releases a worker's place in the pool when its thread ends, even by panic
struct WorkerSlot {
    worker_id: usize,
    job_id: Uuid,
    tx: Sender<WorkerMessage>,
    active: Arc<Mutex<usize>>,
    /// The job's outcome has been sent
    reported: bool,
}

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        if !self.reported {
            let _ = self.tx.send(WorkerMessage::JobFailed {
                job_id: self.job_id,
                error: "Worker panicked".to_string(),
            });
        }

        {
            let mut count = self.active.lock().unwrap_or_else(PoisonError::into_inner);
            *count = count.saturating_sub(1);
        }

        let _ = self.tx.send(WorkerMessage::WorkerIdle {
            worker_id: self.worker_id,
        });
    }
}

/// Worker pool for managing parallel transcode jobs
pub struct WorkerPool {
    max_workers: Arc<Mutex<usize>>,
    tx: Sender<WorkerMessage>,
    rx: Receiver<WorkerMessage>,
    active_workers: Arc<Mutex<usize>>,
}

impl WorkerPool {
    pub fn new(max_workers: usize) -> Self {
        let (tx, rx) = mpsc::channel();

        Self {
            max_workers: Arc::new(Mutex::new(max_workers.max(1))),
            tx,
            rx,
            active_workers: Arc::new(Mutex::new(0)),
        }
    }

    /// Get the receiver for worker messages
    pub fn receiver(&self) -> &Receiver<WorkerMessage> {
        &self.rx
    }

    /// Spawn a worker thread for one job
    pub fn spawn_worker(&self, worker_id: usize, job: TranscodeJob, backends: JobBackends) {
        let tx = self.tx.clone();
        let active = self.active_workers.clone();

        // Count before spawning so can_spawn is accurate right away
        *active.lock().unwrap() += 1;

        thread::spawn(move || {
            let mut slot = WorkerSlot {
                worker_id,
                job_id: job.id,
                tx: tx.clone(),
                active,
                reported: false,
            };
            let _ = tx.send(WorkerMessage::JobStarted { job_id: job.id });

            let tx_job = tx.clone();
            let result = run_job(&job, &backends, &mut |message| {
                let _ = tx_job.send(message);
            });

            match result {
                Ok(()) => {
                    let _ = tx.send(WorkerMessage::JobCompleted { job_id: job.id });
                }
                Err(e) => {
                    let _ = tx.send(WorkerMessage::JobFailed {
                        job_id: job.id,
                        error: format!("{:#}", e),
                    });
                }
            }
            slot.reported = true;
        });
    }

    /// Run every job, at most `max_workers` at a time, passing each message to `on_message`.
    /// Returns the outcome of each job in queue order.
    pub fn run_queue<F>(&self, jobs: Vec<TranscodeJob>, backends: &JobBackends, mut on_message: F) -> Vec<(Uuid, Result<(), String>)>
    where
        F: FnMut(&WorkerMessage),
    {
        let order: Vec<Uuid> = jobs.iter().map(|j| j.id).collect();
        let mut pending: VecDeque<TranscodeJob> = jobs.into();
        let mut outcomes: Vec<(Uuid, Result<(), String>)> = Vec::new();
        let mut next_worker = 0;

        while self.can_spawn() {
            let Some(job) = pending.pop_front() else { break };
            self.spawn_worker(next_worker, job, backends.clone());
            next_worker += 1;
        }

        while outcomes.len() < order.len() {
            let Ok(message) = self.rx.recv() else { break };
            on_message(&message);
            match message {
                WorkerMessage::JobCompleted { job_id } => outcomes.push((job_id, Ok(()))),
                WorkerMessage::JobFailed { job_id, error } => outcomes.push((job_id, Err(error))),
                WorkerMessage::WorkerIdle { worker_id } => {
                    if let Some(job) = pending.pop_front() {
                        self.spawn_worker(worker_id, job, backends.clone());
                    }
                }
                _ => {}
            }
        }

        outcomes.sort_by_key(|(id, _)| order.iter().position(|o| o == id));
        outcomes
    }

    pub fn active_count(&self) -> usize {
        *self.active_workers.lock().unwrap()
    }

    pub fn max_workers(&self) -> usize {
        *self.max_workers.lock().unwrap()
    }

    pub fn set_max_workers(&self, max: usize) {
        *self.max_workers.lock().unwrap() = max.max(1);
    }

    pub fn can_spawn(&self) -> bool {
        self.active_count() < self.max_workers()
    }
}
