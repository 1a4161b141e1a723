// HTTP control-plane integration tests
//
// Runs the coordinator with the real HTTP session provider against a mock
// engine API and checks the exit codes the binary would report.

use mockito::{Mock, Server, ServerGuard};
use std::time::Duration;

use vdbctl::{
    Coordinator, EngineDescriptor, HttpSessionProvider, JobState, OperationRequest, UnitOptions,
    UnitSuccess, VdbError, Verb,
};

const API: &str = "/resources/json/delphix";
const OK_EMPTY: &str = r#"{"type":"OKResult","status":"OK","result":"","job":null}"#;

fn engine(server: &ServerGuard) -> EngineDescriptor {
    let address = server.socket_address();
    EngineDescriptor {
        hostname: "landshark".to_string(),
        address: address.ip().to_string(),
        username: "delphix_admin".to_string(),
        password: Some("delphix".to_string()),
        is_default: true,
        use_https: false,
        port: Some(address.port()),
    }
}

fn coordinator(verb: Verb) -> Coordinator<HttpSessionProvider> {
    let request = OperationRequest::new(verb, Some("testvdb".into())).unwrap();
    let options = UnitOptions {
        poll_interval: Duration::from_millis(10),
        wait_for_recent: false,
    };
    Coordinator::new(HttpSessionProvider::new(Duration::from_secs(5)), request, options)
}

fn ok_json(server: &mut ServerGuard, method: &str, path: &str, body: &str) -> Mock {
    server
        .mock(method, format!("{}/{}", API, path).as_str())
        .with_header("content-type", "application/json")
        .with_body(body)
        .create()
}

/// Session, login and a source listing holding `testvdb`
fn engine_with_testvdb(server: &mut ServerGuard) -> Vec<Mock> {
    vec![
        ok_json(server, "POST", "session", OK_EMPTY),
        ok_json(server, "POST", "login", OK_EMPTY),
        ok_json(
            server,
            "GET",
            "source",
            r#"{"type":"ListResult","status":"OK","result":[
                {"type":"OracleVirtualSource","name":"testvdb","reference":"ORACLE_SOURCE-4"}]}"#,
        ),
    ]
}

#[test]
fn test_stop_over_http_completes() {
    let mut server = Server::new();
    let _engine = engine_with_testvdb(&mut server);
    let stop = ok_json(
        &mut server,
        "POST",
        "source/ORACLE_SOURCE-4/stop",
        r#"{"type":"OKResult","status":"OK","result":"","job":"JOB-118"}"#,
    );
    let poll = ok_json(
        &mut server,
        "GET",
        "job/JOB-118",
        r#"{"type":"OKResult","status":"OK","result":{
            "type":"Job","reference":"JOB-118","jobState":"COMPLETED"}}"#,
    );

    let summary = coordinator(Verb::Stop).run(vec![engine(&server)]);

    match &summary.reports[0].outcome {
        Ok(UnitSuccess::Jobs(jobs)) => {
            assert_eq!(jobs.len(), 1);
            assert_eq!(jobs[0].handle.as_str(), "JOB-118");
            assert_eq!(jobs[0].state, JobState::Completed);
        }
        other => panic!("Expected a completed job, got {:?}", other),
    }
    assert_eq!(summary.exit_code(), 0);
    stop.assert();
    poll.assert();
}

#[test]
fn test_failed_job_over_http_exits_with_job_code() {
    let mut server = Server::new();
    let _engine = engine_with_testvdb(&mut server);
    let _start = ok_json(
        &mut server,
        "POST",
        "source/ORACLE_SOURCE-4/start",
        r#"{"type":"OKResult","status":"OK","result":"","job":"JOB-5"}"#,
    );
    let _poll = ok_json(
        &mut server,
        "GET",
        "job/JOB-5",
        r#"{"type":"OKResult","status":"OK","result":{
            "type":"Job","reference":"JOB-5","jobState":"FAILED"}}"#,
    );

    let summary = coordinator(Verb::Start).run(vec![engine(&server)]);

    assert!(matches!(
        summary.reports[0].outcome,
        Err(VdbError::JobFailed { .. })
    ));
    assert_eq!(summary.exit_code(), 3);
}

#[test]
fn test_action_without_job_is_operation_error() {
    let mut server = Server::new();
    let _engine = engine_with_testvdb(&mut server);
    let _disable = ok_json(&mut server, "POST", "source/ORACLE_SOURCE-4/disable", OK_EMPTY);

    let summary = coordinator(Verb::Disable).run(vec![engine(&server)]);

    assert!(matches!(
        summary.reports[0].outcome,
        Err(VdbError::Operation { verb: Verb::Disable, ref target, .. }) if target == "testvdb"
    ));
    assert_eq!(summary.exit_code(), 1);
}

#[test]
fn test_rejected_login_exits_with_authentication_code() {
    let mut server = Server::new();
    let _session = ok_json(&mut server, "POST", "session", OK_EMPTY);
    let _login = server
        .mock("POST", format!("{}/login", API).as_str())
        .with_status(401)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"type":"ErrorResult","status":"ERROR","error":{"type":"APIError",
                "details":"Invalid username or password.",
                "id":"exception.webservices.login.failed"}}"#,
        )
        .create();
    let source = server
        .mock("GET", format!("{}/source", API).as_str())
        .expect(0)
        .create();

    let summary = coordinator(Verb::Start).run(vec![engine(&server)]);

    assert!(matches!(
        summary.reports[0].outcome,
        Err(VdbError::Authentication { ref engine, .. }) if engine == "landshark"
    ));
    assert_eq!(summary.exit_code(), 2);
    source.assert();
}
