//! Rebuild cycle sequencing with in-memory fakes.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use reload::config::Settings;
use reload::lifecycle::startup::cleanup;
use reload::observability::notifications::Notifier;
use reload::Orchestrator;

mod common;
use common::{call_log, CallLog, MockBuilder, MockGateway, MockSupervisor};

#[derive(Default)]
struct RecordingNotifier {
    pushed: Mutex<Vec<(String, String)>>,
}

impl Notifier for RecordingNotifier {
    fn push(&self, title: &str, body: &str) {
        self.pushed
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
    }
}

struct Harness {
    log: CallLog,
    builder: Arc<MockBuilder>,
    supervisor: Arc<MockSupervisor>,
    gateway: MockGateway,
}

fn harness() -> Harness {
    let log = call_log();
    Harness {
        builder: Arc::new(MockBuilder::new(log.clone())),
        supervisor: Arc::new(MockSupervisor::new(log.clone())),
        gateway: MockGateway::default(),
        log,
    }
}

fn orchestrator(h: &Harness, settings: Settings) -> Orchestrator {
    Orchestrator::from_parts(
        settings,
        h.builder.clone(),
        h.supervisor.clone(),
        Box::new(h.gateway.clone()),
    )
}

fn calls(log: &CallLog) -> Vec<&'static str> {
    log.lock().unwrap().clone()
}

#[tokio::test]
async fn rebuild_kills_builds_then_runs_when_immediate() {
    let h = harness();
    let settings = Settings {
        immediate: true,
        ..Settings::default()
    };

    orchestrator(&h, settings).rebuild().await.unwrap();

    assert_eq!(calls(&h.log), vec!["kill", "build", "run"]);
}

#[tokio::test]
async fn rebuild_leaves_start_to_the_gateway_by_default() {
    let h = harness();

    orchestrator(&h, Settings::default()).rebuild().await.unwrap();

    assert_eq!(calls(&h.log), vec!["kill", "build"]);
    assert!(!h.supervisor.did_run());
}

#[tokio::test]
async fn failed_build_is_not_run_and_is_announced() {
    let h = harness();
    h.builder
        .fail_with(Some("# example.com/app\n./main.go:9:2: undefined: x\n"));
    let notifier = Arc::new(RecordingNotifier::default());
    let settings = Settings {
        immediate: true,
        ..Settings::default()
    };

    let result = orchestrator(&h, settings)
        .with_notifier(Some(notifier.clone()))
        .build_and_run()
        .await;

    assert!(result.is_err());
    assert_eq!(calls(&h.log), vec!["build"]);
    let pushed = notifier.pushed.lock().unwrap().clone();
    assert_eq!(
        pushed,
        vec![
            ("Build Started".to_string(), "Building mock-bin...".to_string()),
            (
                "Build Failed".to_string(),
                "./main.go:9:2: undefined: x".to_string()
            ),
        ]
    );
}

#[tokio::test]
async fn successful_build_is_announced() {
    let h = harness();
    let notifier = Arc::new(RecordingNotifier::default());

    orchestrator(&h, Settings::default())
        .with_notifier(Some(notifier.clone()))
        .build_and_run()
        .await
        .unwrap();

    let titles: Vec<String> = notifier
        .pushed
        .lock()
        .unwrap()
        .iter()
        .map(|(title, _)| title.clone())
        .collect();
    assert_eq!(titles, vec!["Build Started", "Build Succeeded"]);
}

#[tokio::test]
async fn cleanup_kills_and_removes_the_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = dir.path().join("app");
    std::fs::write(&artifact, "binary").unwrap();
    let supervisor = MockSupervisor::with_artifact(call_log(), &artifact);

    cleanup(&supervisor).await;

    assert_eq!(supervisor.kills(), 1);
    assert!(!artifact.exists());
}

#[tokio::test]
async fn run_builds_on_start_and_on_change_until_shutdown() {
    let h = harness();
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    let settings = Settings {
        watch_path: root.clone(),
        ..Settings::default()
    };

    let orchestrator = orchestrator(&h, settings).with_watch_window(Duration::ZERO);
    let shutdown = orchestrator.shutdown();
    let task = tokio::spawn(orchestrator.run());

    let builder = h.builder.clone();
    let wait_for_builds = |count: usize| {
        let builder = builder.clone();
        async move {
            tokio::time::timeout(Duration::from_secs(5), async {
                while builder.builds() < count {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
            })
            .await
            .is_ok()
        }
    };

    assert!(wait_for_builds(1).await, "initial build did not happen");
    assert!(h.gateway.started.load(Ordering::SeqCst));

    // Give the watcher time to register the tree.
    tokio::time::sleep(Duration::from_millis(300)).await;
    std::fs::write(root.join("main.go"), "package main\n").unwrap();
    assert!(wait_for_builds(2).await, "change did not trigger a rebuild");
    assert!(h.supervisor.kills() >= 1);

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("orchestrator stops")
        .unwrap()
        .unwrap();
    assert!(h.gateway.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn shutdown_during_initial_build_cancels_it_before_cleanup() {
    let log = call_log();
    let dir = tempfile::tempdir().unwrap();
    let artifact = dir.path().join("app");
    std::fs::write(&artifact, "binary").unwrap();

    let builder = Arc::new(MockBuilder::new(log.clone()));
    builder.slow(Duration::from_secs(3));
    let supervisor = Arc::new(MockSupervisor::with_artifact(log.clone(), &artifact));
    let gateway = MockGateway::default();
    let settings = Settings {
        immediate: true,
        watch_path: dir.path().to_path_buf(),
        ..Settings::default()
    };

    let orchestrator = Orchestrator::from_parts(
        settings,
        builder.clone(),
        supervisor.clone(),
        Box::new(gateway.clone()),
    );
    let shutdown = orchestrator.shutdown();
    let started = Instant::now();
    let task = tokio::spawn(orchestrator.run());

    tokio::time::sleep(Duration::from_millis(300)).await;
    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("shutdown does not wait for the build")
        .unwrap()
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(calls(&log), vec!["build", "kill"]);
    assert!(!supervisor.did_run());
    assert!(!artifact.exists());
    assert!(gateway.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn shutdown_kills_and_removes_the_artifact_after_the_loop_stops() {
    let h = harness();
    let dir = tempfile::tempdir().unwrap();
    let artifact = dir.path().join("app");
    std::fs::write(&artifact, "binary").unwrap();
    let supervisor = Arc::new(MockSupervisor::with_artifact(h.log.clone(), &artifact));
    let settings = Settings {
        watch_path: dir.path().to_path_buf(),
        ..Settings::default()
    };

    let orchestrator = Orchestrator::from_parts(
        settings,
        h.builder.clone(),
        supervisor.clone(),
        Box::new(h.gateway.clone()),
    );
    let shutdown = orchestrator.shutdown();
    let task = tokio::spawn(orchestrator.run());

    tokio::time::timeout(Duration::from_secs(5), async {
        while h.builder.builds() < 1 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();
    shutdown.trigger();
    task.await.unwrap().unwrap();

    assert_eq!(calls(&h.log), vec!["build", "kill"]);
    assert!(!artifact.exists());
}
