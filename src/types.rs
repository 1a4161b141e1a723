//! Type-safe domain values for vdbctl
//!
//! Verbs, job states and object classes are enums with strum conversions so
//! the CLI, the wire format and the logs all agree on one spelling.

use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumIter, EnumString};

/// Lifecycle operation requested against a virtual database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Verb {
    Start,
    Stop,
    Enable,
    Disable,
    List,
}

impl Verb {
    /// Returns true for verbs that produce a job on the engine
    #[inline]
    pub const fn is_mutating(self) -> bool {
        !matches!(self, Self::List)
    }

    /// Path segment of the source action endpoint (`source/{ref}/{action}`)
    pub const fn action(self) -> Option<&'static str> {
        match self {
            Self::Start => Some("start"),
            Self::Stop => Some("stop"),
            Self::Enable => Some("enable"),
            Self::Disable => Some("disable"),
            Self::List => None,
        }
    }

    /// `type` discriminator of the request body sent with the action
    pub const fn parameters_type(self) -> Option<&'static str> {
        match self {
            Self::Start => Some("StartParameters"),
            Self::Stop => Some("StopParameters"),
            Self::Enable => Some("EnableParameters"),
            Self::Disable => Some("DisableParameters"),
            Self::List => None,
        }
    }
}

/// State of an engine job as observed by the tracker.
///
/// `Running` is the only non-terminal state. The engine reports a few more
/// in-progress states (`SUSPENDED`, `WAITING`, ...) which all collapse to
/// `Running` here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "UPPERCASE")]
pub enum JobState {
    Running,
    Completed,
    Failed,
    Canceled,
}

impl JobState {
    /// Returns true if this is a terminal state (Completed, Failed or Canceled)
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }

    /// Only Running may move, and it may move anywhere (including itself).
    #[inline]
    pub fn can_transition_to(self, next: Self) -> bool {
        !self.is_terminal() || self == next
    }

    /// Map the engine's `jobState` string onto a tracker state.
    pub fn from_remote(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "COMPLETED" => Self::Completed,
            "FAILED" => Self::Failed,
            "CANCELED" | "CANCELLED" => Self::Canceled,
            _ => Self::Running,
        }
    }
}

/// Class of engine objects the resolver can search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum ObjectClass {
    /// Database containers, as shown by `--list`
    Database,
    /// Sources linked to containers; lifecycle actions target these
    Source,
}

impl ObjectClass {
    /// Resource collection name in the engine API
    pub const fn resource(self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::Source => "source",
        }
    }
}

/// Opaque reference to an engine object, valid only on the session that
/// produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectReference(String);

impl ObjectReference {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque job reference issued by the engine (e.g. `JOB-1234`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_verb_parse_and_display() {
        assert_eq!("start".parse::<Verb>().unwrap(), Verb::Start);
        assert_eq!(Verb::Disable.to_string(), "disable");
        assert!("reboot".parse::<Verb>().is_err());
    }

    #[test]
    fn test_only_list_is_not_mutating() {
        for verb in Verb::iter() {
            assert_eq!(verb.is_mutating(), verb != Verb::List);
            assert_eq!(verb.action().is_some(), verb.is_mutating());
            assert_eq!(verb.parameters_type().is_some(), verb.is_mutating());
        }
    }

    #[test]
    fn test_job_state_terminal() {
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::Canceled.is_terminal());
    }

    #[test]
    fn test_job_state_from_remote() {
        assert_eq!(JobState::from_remote("COMPLETED"), JobState::Completed);
        assert_eq!(JobState::from_remote("failed"), JobState::Failed);
        assert_eq!(JobState::from_remote("CANCELED"), JobState::Canceled);
        assert_eq!(JobState::from_remote("SUSPENDED"), JobState::Running);
        assert_eq!(JobState::from_remote("WAITING"), JobState::Running);
        assert_eq!(JobState::from_remote(""), JobState::Running);
    }

    #[test]
    fn test_no_transition_out_of_terminal() {
        for from in JobState::iter().filter(|s| s.is_terminal()) {
            for to in JobState::iter().filter(|&s| s != from) {
                assert!(!from.can_transition_to(to), "{from} -> {to} must be rejected");
            }
        }
        for to in JobState::iter() {
            assert!(JobState::Running.can_transition_to(to));
        }
    }
}
