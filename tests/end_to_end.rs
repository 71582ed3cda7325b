//! End-to-end tests driving the public API against a local HTTP server.

mod common;

use std::time::Duration;

use fetch_runner::{
    Event, FailureKind, JobStatus, SubmitOptions, TaskRunner, TaskState,
};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{durable_config, start_runner, test_config};

#[tokio::test]
async fn e2e_submit_loads_url_via_http_probe() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let runner = start_runner().await;
    let url = format!("{}/a.png", server.uri());

    let handle = runner
        .submit(url.as_str(), url.as_str(), SubmitOptions::default())
        .await
        .expect("submit should be accepted");

    let state = tokio::time::timeout(Duration::from_secs(5), handle.await_terminal())
        .await
        .expect("terminal state within the timeout window");
    assert_eq!(state, TaskState::Succeeded { value: url });
}

#[tokio::test]
async fn e2e_unreachable_host_reports_network_failure() {
    let runner = start_runner().await;

    // Port 1 on localhost is almost certainly closed
    let handle = runner
        .submit(
            "http://127.0.0.1:1/a.png",
            "http://127.0.0.1:1/a.png",
            SubmitOptions::default(),
        )
        .await
        .expect("submit should be accepted");

    match handle.await_terminal().await {
        TaskState::Failed { kind, message } => {
            assert_eq!(kind, FailureKind::Network);
            assert!(!message.is_empty());
        }
        other => panic!("expected Failed(Network), got: {other:?}"),
    }
}

#[tokio::test]
async fn e2e_concurrent_submitters_share_one_probe() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(100)))
        .expect(1)
        .mount(&server)
        .await;

    let runner = start_runner().await;
    let url = format!("{}/shared.png", server.uri());

    let first = runner
        .submit(url.as_str(), url.as_str(), SubmitOptions::default())
        .await
        .expect("first submit accepted");
    let second = runner
        .submit(url.as_str(), url.as_str(), SubmitOptions::default())
        .await
        .expect("second submit accepted");

    assert_eq!(first.id(), second.id());

    let (a, b) = tokio::join!(first.await_terminal(), second.await_terminal());
    assert_eq!(a, TaskState::Succeeded { value: url.clone() });
    assert_eq!(b, TaskState::Succeeded { value: url });

    // MockServer verifies expect(1) on drop: exactly one HEAD was issued
}

#[tokio::test]
async fn e2e_closed_gate_blocks_probe_entirely() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let runner = start_runner().await;
    runner.connectivity().set_reachable(false);

    let url = format!("{}/blocked.png", server.uri());
    let handle = runner
        .submit(url.as_str(), url.as_str(), SubmitOptions::default())
        .await
        .expect("submit itself is accepted; the task fails fast");

    match handle.await_terminal().await {
        TaskState::Failed { kind, .. } => assert_eq!(kind, FailureKind::Unavailable),
        other => panic!("expected Failed(Unavailable), got: {other:?}"),
    }
}

#[tokio::test]
async fn e2e_deadline_beats_slow_server() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let runner = start_runner().await;
    let url = format!("{}/slow.png", server.uri());

    let handle = runner
        .submit(
            url.as_str(),
            url.as_str(),
            SubmitOptions {
                durable: false,
                timeout: Some(Duration::from_millis(50)),
            },
        )
        .await
        .expect("submit accepted");

    match handle.await_terminal().await {
        TaskState::Failed { kind, .. } => assert_eq!(kind, FailureKind::Timeout),
        other => panic!("expected Failed(Timeout), got: {other:?}"),
    }

    // The slow response must not overwrite the recorded timeout
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(matches!(
        handle.state(),
        TaskState::Failed {
            kind: FailureKind::Timeout,
            ..
        }
    ));
}

#[tokio::test]
async fn e2e_every_subscriber_sees_the_lifecycle() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let runner = start_runner().await;
    let mut ui_events = runner.subscribe();
    let mut log_events = runner.subscribe();

    let url = format!("{}/a.png", server.uri());
    let handle = runner
        .submit(url.as_str(), url.as_str(), SubmitOptions::default())
        .await
        .expect("submit accepted");
    handle.await_terminal().await;

    for events in [&mut ui_events, &mut log_events] {
        let queued = events.recv().await.expect("queued event");
        assert!(matches!(queued, Event::Queued { .. }));
        let started = events.recv().await.expect("started event");
        assert!(matches!(started, Event::Started { .. }));
        let succeeded = events.recv().await.expect("succeeded event");
        assert!(matches!(succeeded, Event::Succeeded { .. }));
    }
}

#[tokio::test]
async fn e2e_durable_job_survives_runner_restart() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("jobs.db");
    let url = format!("{}/durable.png", server.uri());

    // First process: accept the job, then die while the probe is stuck
    let first = TaskRunner::new(durable_config(&db_path))
        .await
        .expect("first runner");
    let handle = first
        .submit(
            url.as_str(),
            url.as_str(),
            SubmitOptions {
                durable: true,
                timeout: None,
            },
        )
        .await
        .expect("durable submit accepted");
    let id = handle.id();
    first.shutdown().await.expect("shutdown");

    // Second process: the server answers promptly now
    server.reset().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let second = TaskRunner::new(durable_config(&db_path))
        .await
        .expect("second runner");

    // The restored job is re-run and its result lands in the store
    let mut job = None;
    for _ in 0..200 {
        if let Some(record) = second.durable_job(id).await.expect("query")
            && JobStatus::from_i32(record.status).is_terminal()
        {
            job = Some(record);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let job = job.expect("restored job should reach a terminal state");
    assert_eq!(JobStatus::from_i32(job.status), JobStatus::Succeeded);
    assert_eq!(job.result.as_deref(), Some(url.as_str()));
}

#[tokio::test]
async fn e2e_status_loop_runs_and_stops_with_the_runner() {
    let runner = TaskRunner::new(test_config()).await.expect("runner");
    let status_handle = runner.spawn_status_loop();

    tokio::time::sleep(Duration::from_millis(50)).await;
    runner.shutdown().await.expect("shutdown");

    tokio::time::timeout(Duration::from_secs(1), status_handle)
        .await
        .expect("status loop must exit promptly after shutdown")
        .expect("status loop task must not panic");
}
