//! Operation dispatch: one verb, one control-plane call.

use serde::Serialize;
use tracing::{debug, info};

use crate::control_plane::ControlPlane;
use crate::error::{Result, VdbError};
use crate::job_tracker::{Job, JobTracker};
use crate::resolver::resolve;
use crate::types::{ObjectClass, Verb};

/// Shown in place of a missing provision container; only dSources have none
pub const DSOURCE_LABEL: &str = "dSource";

/// What the user asked for. Built once, shared read-only by every unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRequest {
    verb: Verb,
    target: Option<String>,
}

impl OperationRequest {
    /// Mutating verbs need a target name; LIST must not have one.
    pub fn new(verb: Verb, target: Option<String>) -> Result<Self> {
        let target = target
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        if let (false, Some(name)) = (verb.is_mutating(), &target) {
            return Err(VdbError::invalid_request(format!(
                "{} does not take a VDB name (got \"{}\")",
                verb, name
            )));
        }
        if verb.is_mutating() && target.is_none() {
            return Err(VdbError::invalid_request(format!(
                "{} requires a VDB name",
                verb
            )));
        }
        Ok(Self { verb, target })
    }

    pub fn list() -> Self {
        Self {
            verb: Verb::List,
            target: None,
        }
    }

    pub fn verb(&self) -> Verb {
        self.verb
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }
}

/// One row of a LIST result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseSummary {
    pub name: String,
    pub current_timeflow: String,
    pub provision_container: String,
    pub processor: String,
}

impl std::fmt::Display for DatabaseSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "name = {}", self.name)?;
        writeln!(f, "current timeflow = {}", self.current_timeflow)?;
        writeln!(f, "provision container = {}", self.provision_container)?;
        write!(f, "processor = {}", self.processor)
    }
}

/// Result of dispatching one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A mutating verb started this job; it is now in the tracker
    Job(Job),
    /// LIST rows, produced synchronously
    Listing(Vec<DatabaseSummary>),
}

/// Issue `request` on `session`.
///
/// Mutating verbs resolve the target among sources, issue the action and
/// record the returned job in `tracker`. LIST never touches the tracker.
pub fn dispatch(
    session: &dyn ControlPlane,
    tracker: &mut JobTracker,
    request: &OperationRequest,
) -> Result<DispatchOutcome> {
    let verb = request.verb();
    match request.target() {
        Some(target) if verb.is_mutating() => {
            debug!("{}: Searching for {} reference.", session.engine(), target);
            let reference = resolve(session, ObjectClass::Source, target)?;

            let handle = session
                .mutate(verb, &reference)
                .map_err(|source| VdbError::Operation {
                    engine: session.engine().to_string(),
                    verb,
                    target: target.to_string(),
                    source,
                })?;
            info!("{}: {} {} issued as {}", session.engine(), verb, target, handle);

            Ok(DispatchOutcome::Job(tracker.track(handle)))
        }
        None if !verb.is_mutating() => list_databases(session).map(DispatchOutcome::Listing),
        _ => Err(VdbError::invalid_request(format!(
            "{} cannot be dispatched with target {:?}",
            verb,
            request.target()
        ))),
    }
}

/// Every database visible to the session
pub fn list_databases(session: &dyn ControlPlane) -> Result<Vec<DatabaseSummary>> {
    let databases = session
        .list_objects(ObjectClass::Database)
        .map_err(|source| VdbError::Operation {
            engine: session.engine().to_string(),
            verb: Verb::List,
            target: "databases".to_string(),
            source,
        })?;

    Ok(databases
        .into_iter()
        .map(|db| DatabaseSummary {
            name: db.name,
            current_timeflow: db.current_timeflow.unwrap_or_else(|| "None".to_string()),
            provision_container: db
                .provision_container
                .unwrap_or_else(|| DSOURCE_LABEL.to_string()),
            processor: db.processor.unwrap_or_else(|| "None".to_string()),
        })
        .collect())
}
