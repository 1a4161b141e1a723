//! Concurrency Coordinator
//!
//! Runs one request against many engines at once. Every selected engine
//! gets its own OS thread (an execution unit) that owns its session and
//! job tracker outright; units share nothing mutable. The coordinator
//! keeps the join handles and waits for all of them before returning, so
//! no result is released until every unit has finished.
//!
//! # Unit Flow
//!
//! ```text
//! open session ──> dispatch ──> [adopt recent jobs] ──> wait until idle ──> drop session
//!                     │
//!                     └── LIST returns its rows straight away
//! ```
//!
//! Any failure inside a unit is caught at the unit boundary, logged with
//! the engine's hostname and returned in that unit's report. A panicking
//! unit is reported as `Unexpected`.

use std::any::Any;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::control_plane::SessionProvider;
use crate::dispatcher::{DatabaseSummary, DispatchOutcome, OperationRequest, dispatch};
use crate::error::{Result, VdbError};
use crate::job_tracker::{Job, JobTracker};
use crate::registry::EngineDescriptor;
use crate::types::Verb;

/// Per-unit settings, identical for every engine
#[derive(Debug, Clone)]
pub struct UnitOptions {
    /// Pause between job polls
    pub poll_interval: Duration,
    /// Also wait for jobs already running on the engine
    pub wait_for_recent: bool,
}

impl Default for UnitOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            wait_for_recent: false,
        }
    }
}

/// What a unit produced when it finished cleanly
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitSuccess {
    /// Jobs that reached a terminal state (COMPLETED or CANCELED)
    Jobs(Vec<Job>),
    /// LIST rows
    Listing(Vec<DatabaseSummary>),
}

/// Final outcome of one execution unit
#[derive(Debug)]
pub struct UnitReport {
    pub engine: String,
    pub outcome: Result<UnitSuccess>,
}

enum UnitHandle {
    Running(JoinHandle<Result<UnitSuccess>>),
    NotStarted(VdbError),
}

/// A spawned unit the coordinator has not joined yet
pub struct PendingUnit {
    engine: String,
    handle: UnitHandle,
}

impl PendingUnit {
    pub fn engine(&self) -> &str {
        &self.engine
    }

    /// Block until the unit finishes
    pub fn join(self) -> UnitReport {
        let outcome = match self.handle {
            UnitHandle::Running(handle) => handle.join().unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                error!("{}: execution unit panicked: {}", self.engine, message);
                Err(VdbError::unexpected(
                    format!("{}: execution unit panicked", self.engine),
                    message,
                ))
            }),
            UnitHandle::NotStarted(e) => Err(e),
        };
        UnitReport {
            engine: self.engine,
            outcome,
        }
    }
}

/// Log line for a failed unit. Every `VdbError` already names its engine.
fn failure_message(verb: Verb, error: &VdbError) -> String {
    match error {
        VdbError::Authentication { .. } => format!("Connection failed: {}", error),
        VdbError::JobFailed { .. } => format!("A {} job failed: {}", verb, error),
        _ => format!("{} failed: {}", verb, error),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Aggregate of every unit, in selection order
#[derive(Debug)]
pub struct RunSummary {
    pub reports: Vec<UnitReport>,
    pub elapsed: Duration,
}

impl RunSummary {
    /// Units that failed, with their engine
    pub fn failures(&self) -> impl Iterator<Item = (&str, &VdbError)> {
        self.reports
            .iter()
            .filter_map(|r| r.outcome.as_ref().err().map(|e| (r.engine.as_str(), e)))
    }

    /// LIST rows per engine
    pub fn listings(&self) -> impl Iterator<Item = (&str, &[DatabaseSummary])> {
        self.reports.iter().filter_map(|r| match &r.outcome {
            Ok(UnitSuccess::Listing(rows)) => Some((r.engine.as_str(), rows.as_slice())),
            _ => None,
        })
    }

    /// The failure that decides the exit code; the earliest one wins ties
    pub fn most_severe(&self) -> Option<&VdbError> {
        self.failures()
            .map(|(_, e)| e)
            .fold(None, |worst: Option<&VdbError>, e| match worst {
                Some(w) if w.severity() >= e.severity() => Some(w),
                _ => Some(e),
            })
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Process exit code: authentication (2) over job failure (3) over
    /// anything else (1); 0 when every unit succeeded.
    pub fn exit_code(&self) -> i32 {
        self.most_severe().map_or(0, VdbError::exit_code)
    }
}

/// Fans a request out to one thread per engine
pub struct Coordinator<P> {
    provider: Arc<P>,
    request: Arc<OperationRequest>,
    options: UnitOptions,
}

impl<P: SessionProvider + 'static> Coordinator<P> {
    pub fn new(provider: P, request: OperationRequest, options: UnitOptions) -> Self {
        Self {
            provider: Arc::new(provider),
            request: Arc::new(request),
            options,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Start the execution unit for one engine
    pub fn spawn(&self, engine: EngineDescriptor) -> PendingUnit {
        let hostname = engine.hostname.clone();
        let provider = Arc::clone(&self.provider);
        let request = Arc::clone(&self.request);
        let options = self.options.clone();

        let spawned = thread::Builder::new()
            .name(format!("unit-{}", hostname))
            .spawn(move || {
                let outcome = run_unit(provider.as_ref(), &engine, &request, &options);
                if let Err(e) = &outcome {
                    error!("{}", failure_message(request.verb(), e));
                }
                outcome
            });

        let handle = match spawned {
            Ok(handle) => UnitHandle::Running(handle),
            Err(e) => {
                error!("{}: could not start execution unit: {}", hostname, e);
                UnitHandle::NotStarted(VdbError::unexpected(
                    format!("{}: starting execution unit", hostname),
                    e,
                ))
            }
        };

        PendingUnit {
            engine: hostname,
            handle,
        }
    }

    /// Run the request against every engine and wait for all of them
    pub fn run(&self, engines: Vec<EngineDescriptor>) -> RunSummary {
        let started = Instant::now();

        let pending: Vec<PendingUnit> = engines.into_iter().map(|e| self.spawn(e)).collect();
        info!("Started {} execution unit(s)", pending.len());

        let reports: Vec<UnitReport> = pending
            .into_iter()
            .map(|unit| {
                debug!("Waiting for {}", unit.engine());
                unit.join()
            })
            .collect();

        RunSummary {
            reports,
            elapsed: started.elapsed(),
        }
    }
}

/// Everything one engine does for one request
fn run_unit(
    provider: &dyn SessionProvider,
    engine: &EngineDescriptor,
    request: &OperationRequest,
    options: &UnitOptions,
) -> Result<UnitSuccess> {
    let session = provider
        .open(engine)
        .map_err(|source| VdbError::Authentication {
            engine: engine.hostname.clone(),
            source,
        })?;
    debug!("{}: session established", engine.hostname);

    let mut tracker = JobTracker::new(engine.hostname.clone());
    match dispatch(session.as_ref(), &mut tracker, request)? {
        DispatchOutcome::Listing(rows) => return Ok(UnitSuccess::Listing(rows)),
        DispatchOutcome::Job(job) => debug!("{}: dispatched {}", engine.hostname, job.handle),
    }

    if options.wait_for_recent {
        let adopted = tracker.adopt_recent(session.as_ref())?;
        if adopted > 0 {
            info!("{}: also waiting for {} running job(s)", engine.hostname, adopted);
        }
    }

    tracker.wait_until_idle(session.as_ref(), options.poll_interval)?;
    tracker.into_outcome().map(UnitSuccess::Jobs)
}
