//! Job Tracker
//!
//! Owns the in-flight jobs of one engine and polls them to completion.
//!
//! # State Flow
//!
//! ```text
//! Running ──┬──> Completed
//!           ├──> Failed
//!           └──> Canceled
//! ```
//!
//! Transitions are only ever entered by observing the engine. A job leaves
//! the table on the same pass that observes its terminal state, so the
//! table never holds a terminal job between passes.

use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::control_plane::ControlPlane;
use crate::error::{Result, VdbError};
use crate::types::{JobHandle, JobState};

/// A job issued on one engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub engine: String,
    pub handle: JobHandle,
    pub state: JobState,
}

/// Errors that can occur when applying an observed state
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobTransitionError {
    /// The job already reached a terminal state
    #[error("job {job} is already {from} and cannot become {to}")]
    FromTerminalState {
        job: JobHandle,
        from: JobState,
        to: JobState,
    },
}

impl Job {
    /// A freshly issued job, always RUNNING
    pub fn new(engine: impl Into<String>, handle: JobHandle) -> Self {
        Self {
            engine: engine.into(),
            handle,
            state: JobState::Running,
        }
    }

    /// Apply a state reported by the engine
    pub fn observe(&mut self, state: JobState) -> std::result::Result<(), JobTransitionError> {
        if !self.state.can_transition_to(state) {
            return Err(JobTransitionError::FromTerminalState {
                job: self.handle.clone(),
                from: self.state,
                to: state,
            });
        }
        self.state = state;
        Ok(())
    }

    /// FAILED becomes `JobFailed`, CANCELED becomes the non-fatal `Canceled`
    pub fn check(&self) -> Result<()> {
        match self.state {
            JobState::Failed => Err(VdbError::JobFailed {
                engine: self.engine.clone(),
                job: self.handle.clone(),
            }),
            JobState::Canceled => Err(VdbError::Canceled {
                engine: self.engine.clone(),
                job: self.handle.clone(),
            }),
            JobState::Running | JobState::Completed => Ok(()),
        }
    }
}

/// In-flight jobs of one engine, keyed by handle
#[derive(Debug)]
pub struct JobTracker {
    engine: String,
    jobs: BTreeMap<JobHandle, Job>,
    finished: Vec<Job>,
}

impl JobTracker {
    pub fn new(engine: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
            jobs: BTreeMap::new(),
            finished: Vec::new(),
        }
    }

    /// Start tracking a job the engine just issued
    pub fn track(&mut self, handle: JobHandle) -> Job {
        let job = Job::new(self.engine.clone(), handle.clone());
        debug!("{}: tracking {}", self.engine, handle);
        self.jobs.insert(handle, job.clone());
        job
    }

    /// Enroll every job still running on the engine that is not already
    /// tracked. Returns how many were added.
    pub fn adopt_recent(&mut self, session: &dyn ControlPlane) -> Result<usize> {
        let recent = session.recent_jobs().map_err(|e| {
            VdbError::unexpected(format!("{}: listing recent jobs", self.engine), e)
        })?;

        let mut adopted = 0;
        for (handle, state) in recent {
            if state.is_terminal() || self.jobs.contains_key(&handle) {
                continue;
            }
            debug!(
                "{}: Waiting for {} (currently: {}) to finish running",
                self.engine, handle, state
            );
            self.track(handle);
            adopted += 1;
        }
        Ok(adopted)
    }

    /// Number of jobs still RUNNING
    pub fn running(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_idle(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn contains(&self, handle: &JobHandle) -> bool {
        self.jobs.contains_key(handle)
    }

    /// Jobs that reached a terminal state, in the order they were observed
    pub fn finished(&self) -> &[Job] {
        &self.finished
    }

    /// Fetch the state of every tracked job once.
    ///
    /// Terminal jobs are removed and appended to `finished`. Returns the
    /// number of jobs still running.
    pub fn poll_once(&mut self, session: &dyn ControlPlane) -> Result<usize> {
        let handles: Vec<JobHandle> = self.jobs.keys().cloned().collect();

        for handle in handles {
            let state = session.job_state(&handle).map_err(|e| {
                VdbError::unexpected(format!("{}: polling job {}", self.engine, handle), e)
            })?;
            info!("{}: {}: {}", self.engine, handle, state);

            let observed = match self.jobs.get_mut(&handle) {
                Some(job) => job.observe(state),
                None => continue,
            };
            observed.map_err(|e| {
                VdbError::unexpected(format!("{}: polling job {}", self.engine, handle), e)
            })?;

            if state.is_terminal() {
                if let Some(job) = self.jobs.remove(&handle) {
                    self.finished.push(job);
                }
            }
        }

        let running = self.jobs.len();
        info!("{}: {} jobs running.", self.engine, running);
        Ok(running)
    }

    /// Poll until no job is running, sleeping `interval` between passes.
    ///
    /// There is no timeout: a job the engine never finishes keeps this
    /// unit waiting until the process is stopped.
    pub fn wait_until_idle(
        &mut self,
        session: &dyn ControlPlane,
        interval: Duration,
    ) -> Result<()> {
        loop {
            let running = self.poll_once(session)?;
            if running == 0 {
                return Ok(());
            }
            thread::sleep(interval);
        }
    }

    /// Summarize the finished jobs: the first FAILED job fails the unit,
    /// CANCELED jobs are only reported.
    pub fn into_outcome(self) -> Result<Vec<Job>> {
        for job in &self.finished {
            match job.check() {
                Ok(()) => {}
                Err(e) if !e.is_fatal() => warn!("{}", e),
                Err(e) => return Err(e),
            }
        }
        Ok(self.finished)
    }
}
