//! Scripted in-process engines.
//!
//! Each engine is described by an `EngineScript`: the objects it exposes,
//! the sequence of states its jobs go through (one per poll, the last one
//! repeating) and which calls should fail. Every call made against any
//! session is recorded so callers can check what was issued.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use super::{ControlPlane, RemoteObject, SessionProvider};
use crate::error::ControlPlaneError;
use crate::registry::EngineDescriptor;
use crate::types::{JobHandle, JobState, ObjectClass, ObjectReference, Verb};

/// Behaviour of one scripted engine
#[derive(Debug, Clone, Default)]
pub struct EngineScript {
    pub databases: Vec<RemoteObject>,
    pub sources: Vec<RemoteObject>,
    /// Observed states of every job the engine issues; empty means
    /// immediately COMPLETED
    pub job_states: Vec<JobState>,
    /// Jobs already on the engine when a session opens
    pub recent_jobs: Vec<(String, Vec<JobState>)>,
    pub reject_login: bool,
    pub reject_actions: bool,
    pub fail_listing: bool,
}

impl EngineScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose a VDB both as a database container and as its source
    pub fn with_vdb(mut self, name: &str) -> Self {
        let index = self.databases.len() + 1;
        self.databases.push(RemoteObject {
            name: name.to_string(),
            reference: format!("DB_CONTAINER-{}", index),
            current_timeflow: Some(format!("TIMEFLOW-{}", index)),
            provision_container: Some("DB_CONTAINER-0".to_string()),
            processor: None,
        });
        self.sources.push(RemoteObject::new(name, format!("SOURCE-{}", index)));
        self
    }

    /// Expose a dSource: a database with no provision container
    pub fn with_dsource(mut self, name: &str) -> Self {
        let index = self.databases.len() + 1;
        self.databases.push(RemoteObject {
            name: name.to_string(),
            reference: format!("DB_CONTAINER-{}", index),
            current_timeflow: Some(format!("TIMEFLOW-{}", index)),
            provision_container: None,
            processor: None,
        });
        self.sources.push(RemoteObject::new(name, format!("SOURCE-{}", index)));
        self
    }

    pub fn with_job_states(mut self, states: &[JobState]) -> Self {
        self.job_states = states.to_vec();
        self
    }

    pub fn with_recent_job(mut self, reference: &str, states: &[JobState]) -> Self {
        self.recent_jobs.push((reference.to_string(), states.to_vec()));
        self
    }

    pub fn rejecting_login(mut self) -> Self {
        self.reject_login = true;
        self
    }

    pub fn rejecting_actions(mut self) -> Self {
        self.reject_actions = true;
        self
    }

    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }
}

/// A call made against a scripted engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open { engine: String },
    List { engine: String, class: ObjectClass },
    Mutate { engine: String, verb: Verb, reference: String },
    Poll { engine: String, job: String },
    RecentJobs { engine: String },
}

/// Provider for scripted engines, keyed by hostname
#[derive(Debug, Clone, Default)]
pub struct MemorySessionProvider {
    engines: HashMap<String, EngineScript>,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl MemorySessionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engine(mut self, hostname: &str, script: EngineScript) -> Self {
        self.engines.insert(hostname.to_string(), script);
        self
    }

    /// Every call recorded so far, across all sessions
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of recorded calls matching `predicate`
    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| predicate(c)).count()
    }
}

fn record(calls: &Arc<Mutex<Vec<Call>>>, call: Call) {
    if let Ok(mut calls) = calls.lock() {
        calls.push(call);
    }
}

impl SessionProvider for MemorySessionProvider {
    fn open(&self, engine: &EngineDescriptor) -> Result<Box<dyn ControlPlane>, ControlPlaneError> {
        record(
            &self.calls,
            Call::Open {
                engine: engine.hostname.clone(),
            },
        );

        let script = self.engines.get(&engine.hostname).ok_or_else(|| {
            ControlPlaneError::api(
                "exception.webservices.connection.failed",
                format!("cannot connect to {}", engine.address),
            )
        })?;
        if script.reject_login {
            return Err(ControlPlaneError::api(
                "exception.webservices.login.failed",
                "Invalid username or password.",
            ));
        }

        let jobs: HashMap<JobHandle, VecDeque<JobState>> = script
            .recent_jobs
            .iter()
            .map(|(reference, states)| {
                (
                    JobHandle::new(reference.clone()),
                    states.iter().copied().collect(),
                )
            })
            .collect();

        Ok(Box::new(MemorySession {
            engine: engine.hostname.clone(),
            script: script.clone(),
            jobs: RefCell::new(jobs),
            next_job: Cell::new(1),
            calls: Arc::clone(&self.calls),
        }))
    }
}

struct MemorySession {
    engine: String,
    script: EngineScript,
    jobs: RefCell<HashMap<JobHandle, VecDeque<JobState>>>,
    next_job: Cell<u64>,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl ControlPlane for MemorySession {
    fn engine(&self) -> &str {
        &self.engine
    }

    fn list_objects(&self, class: ObjectClass) -> Result<Vec<RemoteObject>, ControlPlaneError> {
        record(
            &self.calls,
            Call::List {
                engine: self.engine.clone(),
                class,
            },
        );
        if self.script.fail_listing {
            return Err(ControlPlaneError::api(
                "exception.executor.listing",
                format!("cannot list {}", class.resource()),
            ));
        }
        Ok(match class {
            ObjectClass::Database => self.script.databases.clone(),
            ObjectClass::Source => self.script.sources.clone(),
        })
    }

    fn mutate(
        &self,
        verb: Verb,
        reference: &ObjectReference,
    ) -> Result<JobHandle, ControlPlaneError> {
        record(
            &self.calls,
            Call::Mutate {
                engine: self.engine.clone(),
                verb,
                reference: reference.to_string(),
            },
        );
        if !verb.is_mutating() {
            return Err(ControlPlaneError::Unsupported(verb));
        }
        if self.script.reject_actions {
            return Err(ControlPlaneError::api(
                "exception.executor.source.action",
                format!("cannot {} {}", verb, reference),
            ));
        }
        if !self.script.sources.iter().any(|s| s.reference == reference.as_str()) {
            return Err(ControlPlaneError::api(
                "exception.executor.object.missing",
                format!("no object {}", reference),
            ));
        }

        let id = self.next_job.get();
        self.next_job.set(id + 1);
        let handle = JobHandle::new(format!("JOB-{}", id));
        let states = if self.script.job_states.is_empty() {
            VecDeque::from([JobState::Completed])
        } else {
            self.script.job_states.iter().copied().collect()
        };
        self.jobs.borrow_mut().insert(handle.clone(), states);
        Ok(handle)
    }

    fn job_state(&self, handle: &JobHandle) -> Result<JobState, ControlPlaneError> {
        record(
            &self.calls,
            Call::Poll {
                engine: self.engine.clone(),
                job: handle.to_string(),
            },
        );
        let mut jobs = self.jobs.borrow_mut();
        let states = jobs.get_mut(handle).ok_or_else(|| {
            ControlPlaneError::api(
                "exception.executor.object.missing",
                format!("no job {}", handle),
            )
        })?;
        let state = if states.len() > 1 {
            states.pop_front()
        } else {
            states.front().copied()
        };
        state.ok_or_else(|| ControlPlaneError::malformed(format!("job {} has no state", handle)))
    }

    fn recent_jobs(&self) -> Result<Vec<(JobHandle, JobState)>, ControlPlaneError> {
        record(
            &self.calls,
            Call::RecentJobs {
                engine: self.engine.clone(),
            },
        );
        let jobs = self.jobs.borrow();
        let mut recent: Vec<(JobHandle, JobState)> = jobs
            .iter()
            .filter_map(|(handle, states)| states.front().map(|s| (handle.clone(), *s)))
            .collect();
        recent.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(recent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(hostname: &str) -> EngineDescriptor {
        EngineDescriptor {
            hostname: hostname.to_string(),
            address: "10.0.0.1".to_string(),
            username: "admin".to_string(),
            password: None,
            is_default: true,
            use_https: false,
            port: None,
        }
    }

    #[test]
    fn test_unknown_engine_cannot_open() {
        let provider = MemorySessionProvider::new();
        assert!(provider.open(&descriptor("ghost")).is_err());
        assert_eq!(provider.count(|c| matches!(c, Call::Open { .. })), 1);
    }

    #[test]
    fn test_job_states_advance_then_repeat() {
        let provider = MemorySessionProvider::new().with_engine(
            "e1",
            EngineScript::new()
                .with_vdb("vdb1")
                .with_job_states(&[JobState::Running, JobState::Completed]),
        );
        let session = provider.open(&descriptor("e1")).unwrap();
        let job = session.mutate(Verb::Start, &ObjectReference::new("SOURCE-1")).unwrap();
        assert_eq!(session.job_state(&job).unwrap(), JobState::Running);
        assert_eq!(session.job_state(&job).unwrap(), JobState::Completed);
        assert_eq!(session.job_state(&job).unwrap(), JobState::Completed);
    }

    #[test]
    fn test_mutating_unknown_reference_fails() {
        let provider = MemorySessionProvider::new().with_engine("e1", EngineScript::new());
        let session = provider.open(&descriptor("e1")).unwrap();
        assert!(session.mutate(Verb::Stop, &ObjectReference::new("SOURCE-9")).is_err());
    }

    #[test]
    fn test_recent_jobs_are_visible() {
        let provider = MemorySessionProvider::new().with_engine(
            "e1",
            EngineScript::new().with_recent_job("JOB-77", &[JobState::Running]),
        );
        let session = provider.open(&descriptor("e1")).unwrap();
        let recent = session.recent_jobs().unwrap();
        assert_eq!(recent, vec![(JobHandle::new("JOB-77"), JobState::Running)]);
    }
}
