// tests/executor_process.rs
//
// Exercises the real process runner against a temporary directory: scratch
// staging, atomic publication, log capture and failure reporting.

use std::sync::Arc;

use tokio::sync::mpsc;

use magpipe::catalog::StageDef;
use magpipe::dag::{NodeOutcome, ScheduledNode};
use magpipe::engine::RuntimeEvent;
use magpipe::exec::spawn_executor;

use magpipe_test_utils::builders::config_with_root;
use magpipe_test_utils::{init_tracing, with_timeout};

fn scheduled(root: &std::path::Path, stage: StageDef, outputs: &[&str]) -> ScheduledNode {
    ScheduledNode {
        id: 0,
        stage,
        sample: "s1".to_string(),
        inputs: Vec::new(),
        outputs: outputs.iter().map(|o| root.join(o)).collect(),
        cost: 1,
    }
}

async fn run_one(node: ScheduledNode, root: &std::path::Path) -> RuntimeEvent {
    let cfg = Arc::new(config_with_root(root.to_str().unwrap()));
    let (rt_tx, mut rt_rx) = mpsc::channel::<RuntimeEvent>(8);

    let node_tx = spawn_executor(rt_tx, cfg);
    node_tx.send(node).await.unwrap();

    with_timeout(rt_rx.recv()).await.unwrap()
}

#[tokio::test]
async fn successful_command_publishes_declared_output() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();

    let stage = StageDef::new("write", &[], &["{root}/out/{sample}.txt"], "printf hello > {output.0}", 1);
    let node = scheduled(dir.path(), stage, &["out/s1.txt"]);

    let event = run_one(node, dir.path()).await;
    match event {
        RuntimeEvent::NodeCompleted { outcome, .. } => {
            assert_eq!(outcome, NodeOutcome::Success);
        }
        other => panic!("unexpected event {other:?}"),
    }

    let published = std::fs::read_to_string(dir.path().join("out/s1.txt")).unwrap();
    assert_eq!(published, "hello");

    // The scratch directory was cleaned up; only outputs and logs remain.
    let leftovers: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(".magpipe-"))
        .collect();
    assert!(leftovers.is_empty(), "scratch left behind: {leftovers:?}");

    // stdout/stderr were captured to the logs folder.
    assert!(dir.path().join("logs/write_s1.stdout").is_file());
    assert!(dir.path().join("logs/write_s1.stderr").is_file());
}

#[tokio::test]
async fn failing_command_reports_exit_code_and_stderr_tail() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();

    let stage = StageDef::new("boom", &[], &["{root}/out/{sample}.txt"], "echo kaput >&2; exit 3", 1);
    let node = scheduled(dir.path(), stage, &["out/s1.txt"]);

    let event = run_one(node, dir.path()).await;
    match event {
        RuntimeEvent::NodeCompleted {
            outcome,
            stderr_tail,
            ..
        } => {
            assert_eq!(outcome, NodeOutcome::Failed(3));
            assert!(stderr_tail.unwrap().contains("kaput"));
        }
        other => panic!("unexpected event {other:?}"),
    }

    // Nothing was published for the failed node.
    assert!(!dir.path().join("out/s1.txt").exists());
}

#[tokio::test]
async fn missing_declared_output_fails_the_node() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();

    // Exits 0 but never writes its declared output.
    let stage = StageDef::new("noop", &[], &["{root}/out/{sample}.txt"], "true", 1);
    let node = scheduled(dir.path(), stage, &["out/s1.txt"]);

    let event = run_one(node, dir.path()).await;
    match event {
        RuntimeEvent::NodeCompleted {
            outcome,
            stderr_tail,
            ..
        } => {
            assert_eq!(outcome, NodeOutcome::Failed(-1));
            assert!(stderr_tail
                .unwrap()
                .contains("did not write declared output"));
        }
        other => panic!("unexpected event {other:?}"),
    }

    assert!(!dir.path().join("out/s1.txt").exists());
}

#[tokio::test]
async fn command_runs_inside_its_scratch_directory() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();

    // Relative writes land in scratch; only the declared output survives.
    let stage = StageDef::new(
        "tmpfiles",
        &[],
        &["{root}/out/{sample}.txt"],
        "echo intermediate > working.tmp && cp working.tmp {output.0}",
        1,
    );
    let node = scheduled(dir.path(), stage, &["out/s1.txt"]);

    let event = run_one(node, dir.path()).await;
    match event {
        RuntimeEvent::NodeCompleted { outcome, .. } => {
            assert_eq!(outcome, NodeOutcome::Success);
        }
        other => panic!("unexpected event {other:?}"),
    }

    assert!(dir.path().join("out/s1.txt").is_file());
    assert!(!dir.path().join("working.tmp").exists());
}
