//! vdbctl Library
//!
//! Drives lifecycle operations on virtual databases across one or more
//! virtualization engines, one thread per engine, and tracks the jobs they
//! start until every one of them finishes.

pub mod cli;
pub mod config_file;
pub mod control_plane;
pub mod coordinator;
pub mod dispatcher;
pub mod error;
pub mod job_tracker;
pub mod registry;
pub mod resolver;
pub mod shutdown;
pub mod types;

// Re-export main types for convenience
pub use config_file::EngineConfigFile;
pub use control_plane::http::HttpSessionProvider;
pub use control_plane::{ControlPlane, RemoteObject, SessionProvider};
pub use coordinator::{Coordinator, PendingUnit, RunSummary, UnitOptions, UnitReport, UnitSuccess};
pub use dispatcher::{DatabaseSummary, DispatchOutcome, OperationRequest, dispatch};
pub use error::{ControlPlaneError, VdbError};
pub use job_tracker::{Job, JobTracker};
pub use registry::{EngineDescriptor, EngineRegistry, EngineSelector};
pub use resolver::resolve;
pub use types::{JobHandle, JobState, ObjectClass, ObjectReference, Verb};
