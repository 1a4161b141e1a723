//! Control-plane seam.
//!
//! Everything vdbctl needs from an engine goes through two traits:
//! `SessionProvider` opens an authenticated session for a descriptor, and
//! the `ControlPlane` session it returns lists objects, issues lifecycle
//! actions and reports job states. `http` talks to a real engine; `memory`
//! is a scripted in-process engine.

pub mod http;
#[cfg(any(test, feature = "__test_helper"))]
pub mod memory;

use serde::{Deserialize, Serialize};

use crate::error::ControlPlaneError;
use crate::registry::EngineDescriptor;
use crate::types::{JobHandle, JobState, ObjectClass, ObjectReference, Verb};

/// An engine object as returned by a class listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    pub name: String,
    pub reference: String,
    #[serde(default)]
    pub current_timeflow: Option<String>,
    #[serde(default)]
    pub provision_container: Option<String>,
    #[serde(default)]
    pub processor: Option<String>,
}

impl RemoteObject {
    pub fn new(name: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reference: reference.into(),
            current_timeflow: None,
            provision_container: None,
            processor: None,
        }
    }
}

/// An authenticated session against one engine.
///
/// A session is owned by the thread that opened it and is never shared.
pub trait ControlPlane {
    /// Hostname of the engine this session is bound to
    fn engine(&self) -> &str;

    /// Every object of `class` visible to the session
    fn list_objects(&self, class: ObjectClass) -> Result<Vec<RemoteObject>, ControlPlaneError>;

    /// Issue a lifecycle action and return the job it started
    fn mutate(
        &self,
        verb: Verb,
        reference: &ObjectReference,
    ) -> Result<JobHandle, ControlPlaneError>;

    /// Current state of one job
    fn job_state(&self, handle: &JobHandle) -> Result<JobState, ControlPlaneError>;

    /// Recent jobs on the engine with their states
    fn recent_jobs(&self) -> Result<Vec<(JobHandle, JobState)>, ControlPlaneError>;
}

/// Opens sessions. Shared read-only by every execution unit.
pub trait SessionProvider: Send + Sync {
    /// One authenticated connection per call; never retried.
    fn open(&self, engine: &EngineDescriptor) -> Result<Box<dyn ControlPlane>, ControlPlaneError>;
}
