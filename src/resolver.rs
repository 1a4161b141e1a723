//! Object lookup by name.

use tracing::debug;

use crate::control_plane::ControlPlane;
use crate::error::{Result, VdbError};
use crate::types::{ObjectClass, ObjectReference};

/// Find the object of `class` named exactly `name` and return its reference.
///
/// The first match in listing order wins; engines may hold several objects
/// with the same name and they are not told apart. A listing failure is
/// reported as not-found with the cause attached.
pub fn resolve(
    session: &dyn ControlPlane,
    class: ObjectClass,
    name: &str,
) -> Result<ObjectReference> {
    debug!(
        "{}: Searching objects in the {} class for one named \"{}\"",
        session.engine(),
        class,
        name
    );

    let objects = session
        .list_objects(class)
        .map_err(|e| VdbError::ObjectNotFound {
            engine: session.engine().to_string(),
            class,
            name: name.to_string(),
            cause: Some(e),
        })?;

    let mut matches = objects.into_iter().filter(|o| o.name == name);
    let found = matches.next().ok_or_else(|| VdbError::ObjectNotFound {
        engine: session.engine().to_string(),
        class,
        name: name.to_string(),
        cause: None,
    })?;

    let others = matches.count();
    if others > 0 {
        debug!(
            "{}: {} other object(s) named \"{}\"; using the first",
            session.engine(),
            others,
            name
        );
    }
    debug!("{}: Found a match {}", session.engine(), found.reference);

    Ok(ObjectReference::new(found.reference))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_plane::memory::{EngineScript, MemorySessionProvider};
    use crate::control_plane::{RemoteObject, SessionProvider};
    use crate::registry::EngineDescriptor;

    fn open(script: EngineScript) -> Box<dyn ControlPlane> {
        let provider = MemorySessionProvider::new().with_engine("e1", script);
        provider
            .open(&EngineDescriptor {
                hostname: "e1".into(),
                address: "10.0.0.1".into(),
                username: "admin".into(),
                password: None,
                is_default: true,
                use_https: false,
                port: None,
            })
            .unwrap()
    }

    #[test]
    fn test_resolve_exact_name() {
        let session = open(EngineScript::new().with_vdb("alpha").with_vdb("beta"));
        let reference = resolve(session.as_ref(), ObjectClass::Source, "beta").unwrap();
        assert_eq!(reference.as_str(), "SOURCE-2");
    }

    #[test]
    fn test_resolve_is_case_sensitive() {
        let session = open(EngineScript::new().with_vdb("Alpha"));
        assert!(resolve(session.as_ref(), ObjectClass::Source, "alpha").is_err());
    }

    #[test]
    fn test_resolve_missing() {
        let session = open(EngineScript::new().with_vdb("alpha"));
        let err = resolve(session.as_ref(), ObjectClass::Database, "gamma").unwrap_err();
        assert!(matches!(
            err,
            VdbError::ObjectNotFound { ref name, cause: None, .. } if name == "gamma"
        ));
    }

    #[test]
    fn test_resolve_first_duplicate_wins() {
        let mut script = EngineScript::new();
        script.sources = vec![
            RemoteObject::new("dup", "SOURCE-A"),
            RemoteObject::new("dup", "SOURCE-B"),
        ];
        let session = open(script);
        let reference = resolve(session.as_ref(), ObjectClass::Source, "dup").unwrap();
        assert_eq!(reference.as_str(), "SOURCE-A");
    }

    #[test]
    fn test_listing_failure_is_not_found_with_cause() {
        let session = open(EngineScript::new().with_vdb("alpha").failing_listing());
        let err = resolve(session.as_ref(), ObjectClass::Source, "alpha").unwrap_err();
        assert!(matches!(err, VdbError::ObjectNotFound { cause: Some(_), .. }));
    }
}
