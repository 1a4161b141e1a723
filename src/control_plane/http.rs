//! HTTP client for the engine's JSON API.
//!
//! Every response is wrapped in an envelope:
//!
//! ```text
//! {"type": "OKResult",   "status": "OK",    "result": ..., "job": "JOB-12"}
//! {"type": "ListResult", "status": "OK",    "result": [...]}
//! {"type": "ErrorResult","status": "ERROR", "error": {"id": ..., "details": ...}}
//! ```
//!
//! Authentication is cookie based: create an API session, then log in on
//! the same client.

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use super::{ControlPlane, RemoteObject, SessionProvider};
use crate::error::ControlPlaneError;
use crate::registry::EngineDescriptor;
use crate::types::{JobHandle, JobState, ObjectClass, ObjectReference, Verb};

/// API version negotiated at session creation
const API_VERSION: (u32, u32, u32) = (1, 6, 0);

/// Login namespace for engine users
const LOGIN_TARGET: &str = "DOMAIN";

/// Longest slice of an unreadable body kept in an error
const BODY_EXCERPT: usize = 200;

/// Opens cookie-authenticated sessions over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpSessionProvider {
    request_timeout: Duration,
}

impl HttpSessionProvider {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

impl Default for HttpSessionProvider {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl SessionProvider for HttpSessionProvider {
    fn open(&self, engine: &EngineDescriptor) -> Result<Box<dyn ControlPlane>, ControlPlaneError> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(self.request_timeout)
            .build()?;

        let session = HttpSession {
            engine: engine.hostname.clone(),
            base_url: engine.base_url(),
            client,
        };

        let (major, minor, micro) = API_VERSION;
        session.post(
            "session",
            &json!({
                "type": "APISession",
                "version": {
                    "type": "APIVersion",
                    "major": major,
                    "minor": minor,
                    "micro": micro,
                },
            }),
        )?;
        session.post(
            "login",
            &json!({
                "type": "LoginRequest",
                "username": engine.username,
                "password": engine.password,
                "target": LOGIN_TARGET,
            }),
        )?;
        debug!("{}: logged in as {}", engine.hostname, engine.username);

        Ok(Box::new(session))
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    job: Option<String>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    details: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobRecord {
    reference: String,
    job_state: String,
}

/// A logged-in session against one engine
pub struct HttpSession {
    engine: String,
    base_url: String,
    client: Client,
}

impl HttpSession {
    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn get(&self, path: &str) -> Result<Envelope, ControlPlaneError> {
        debug!("{}: GET {}", self.engine, path);
        let response = self.client.get(self.url(path)).send()?;
        Self::read_envelope(response)
    }

    fn post(&self, path: &str, body: &Value) -> Result<Envelope, ControlPlaneError> {
        debug!("{}: POST {}", self.engine, path);
        let response = self.client.post(self.url(path)).json(body).send()?;
        Self::read_envelope(response)
    }

    fn read_envelope(response: reqwest::blocking::Response) -> Result<Envelope, ControlPlaneError> {
        let status = response.status();
        let body = response.text()?;

        let envelope: Envelope = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(ControlPlaneError::Status {
                    status: status.as_u16(),
                    body: body.chars().take(BODY_EXCERPT).collect(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        if envelope.status != "OK" {
            let (id, details) = match &envelope.error {
                Some(error) => (
                    error.id.clone().unwrap_or_else(|| "unknown".to_string()),
                    match &error.details {
                        Value::String(text) => text.clone(),
                        other => other.to_string(),
                    },
                ),
                None => ("unknown".to_string(), format!("status {}", envelope.status)),
            };
            return Err(ControlPlaneError::api(id, details));
        }

        Ok(envelope)
    }
}

impl ControlPlane for HttpSession {
    fn engine(&self) -> &str {
        &self.engine
    }

    fn list_objects(&self, class: ObjectClass) -> Result<Vec<RemoteObject>, ControlPlaneError> {
        let envelope = self.get(class.resource())?;
        Ok(serde_json::from_value(envelope.result)?)
    }

    fn mutate(
        &self,
        verb: Verb,
        reference: &ObjectReference,
    ) -> Result<JobHandle, ControlPlaneError> {
        let (action, parameters) = verb
            .action()
            .zip(verb.parameters_type())
            .ok_or(ControlPlaneError::Unsupported(verb))?;

        let path = format!("source/{}/{}", reference, action);
        let envelope = self.post(&path, &json!({ "type": parameters }))?;
        envelope
            .job
            .map(JobHandle::new)
            .ok_or_else(|| ControlPlaneError::malformed(format!("{} returned no job", path)))
    }

    fn job_state(&self, handle: &JobHandle) -> Result<JobState, ControlPlaneError> {
        let envelope = self.get(&format!("job/{}", handle))?;
        let record: JobRecord = serde_json::from_value(envelope.result)?;
        Ok(JobState::from_remote(&record.job_state))
    }

    fn recent_jobs(&self) -> Result<Vec<(JobHandle, JobState)>, ControlPlaneError> {
        let envelope = self.get("job")?;
        let records: Vec<JobRecord> = serde_json::from_value(envelope.result)?;
        Ok(records
            .into_iter()
            .map(|r| (JobHandle::new(r.reference), JobState::from_remote(&r.job_state)))
            .collect())
    }
}
