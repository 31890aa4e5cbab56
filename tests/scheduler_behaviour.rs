// tests/scheduler_behaviour.rs
//
// Drives the scheduler step by step (no runtime, no processes) and asserts
// on dispatch order, budget accounting, staleness skips and failure
// propagation.

use std::collections::VecDeque;

use magpipe::dag::{
    FailurePolicy, NodeOutcome, NodeState, PipelineGraph, ScheduledNode, Scheduler,
};
use magpipe::fs::MockFileSystem;

use magpipe_test_utils::builders::{chain_catalog, config_with_root, CatalogBuilder};
use magpipe_test_utils::init_tracing;

fn fs_with_sources(samples: &[&str]) -> MockFileSystem {
    let fs = MockFileSystem::new();
    for s in samples {
        fs.add_file(format!("/data/src/{s}.txt"), 1);
    }
    fs
}

fn samples(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

fn labels(nodes: &[ScheduledNode]) -> Vec<String> {
    nodes.iter().map(ScheduledNode::label).collect()
}

fn chain_scheduler(
    sample_ids: &[&str],
    jobs: u32,
    policy: FailurePolicy,
    fs: &MockFileSystem,
) -> Scheduler {
    let cfg = config_with_root("/data");
    let catalog = chain_catalog();
    let graph = PipelineGraph::build(
        &catalog,
        &samples(sample_ids),
        &["bin".to_string()],
        &cfg,
        fs,
    )
    .unwrap();
    Scheduler::new(graph, catalog, jobs, policy)
}

/// Complete every dispatched node successfully, in dispatch order, and return
/// the full dispatch sequence.
fn drive_to_completion(scheduler: &mut Scheduler, fs: &MockFileSystem) -> Vec<String> {
    let mut dispatched = Vec::new();
    let mut queue: VecDeque<ScheduledNode> = VecDeque::new();

    let step = scheduler.start(fs);
    dispatched.extend(labels(&step.newly_scheduled));
    queue.extend(step.newly_scheduled);

    while let Some(node) = queue.pop_front() {
        let step = scheduler.handle_completion(node.id, NodeOutcome::Success, fs);
        dispatched.extend(labels(&step.newly_scheduled));
        queue.extend(step.newly_scheduled);
    }

    assert!(scheduler.is_finished());
    dispatched
}

#[test]
fn producers_always_dispatch_before_their_consumers() {
    init_tracing();
    let fs = fs_with_sources(&["s1", "s2"]);
    let mut scheduler = chain_scheduler(&["s1", "s2"], 32, FailurePolicy::KeepGoing, &fs);

    let dispatched = drive_to_completion(&mut scheduler, &fs);

    assert_eq!(dispatched.len(), 6);
    for s in ["s1", "s2"] {
        let pos = |label: &str| dispatched.iter().position(|l| l == label).unwrap();
        assert!(pos(&format!("fetch({s})")) < pos(&format!("assemble({s})")));
        assert!(pos(&format!("assemble({s})")) < pos(&format!("bin({s})")));
    }
    assert!(!scheduler.run_failed());
}

#[test]
fn ready_nodes_dispatch_in_priority_then_sample_order() {
    init_tracing();
    let fs = fs_with_sources(&["s2", "s1"]);
    let mut scheduler = chain_scheduler(&["s2", "s1"], 32, FailurePolicy::KeepGoing, &fs);

    let step = scheduler.start(&fs);
    assert_eq!(labels(&step.newly_scheduled), vec!["fetch(s1)", "fetch(s2)"]);
}

#[test]
fn dispatch_respects_the_cost_budget() {
    init_tracing();
    let fs = fs_with_sources(&["s1", "s2", "s3"]);
    let cfg = config_with_root("/data");
    let catalog = CatalogBuilder::new()
        .stage_with_cost(
            "fetch",
            &["{root}/src/{sample}.txt"],
            &["{root}/fetch/{sample}.out"],
            4,
        )
        .build();
    let graph = PipelineGraph::build(
        &catalog,
        &samples(&["s1", "s2", "s3"]),
        &["fetch".to_string()],
        &cfg,
        &fs,
    )
    .unwrap();
    let mut scheduler = Scheduler::new(graph, catalog, 4, FailurePolicy::KeepGoing);

    // Budget of 4 slots fits exactly one cost-4 node at a time.
    let step = scheduler.start(&fs);
    assert_eq!(labels(&step.newly_scheduled), vec!["fetch(s1)"]);

    let step = scheduler.handle_completion(step.newly_scheduled[0].id, NodeOutcome::Success, &fs);
    assert_eq!(labels(&step.newly_scheduled), vec!["fetch(s2)"]);

    let step = scheduler.handle_completion(step.newly_scheduled[0].id, NodeOutcome::Success, &fs);
    assert_eq!(labels(&step.newly_scheduled), vec!["fetch(s3)"]);

    let step = scheduler.handle_completion(step.newly_scheduled[0].id, NodeOutcome::Success, &fs);
    assert!(step.run_finished);
}

#[test]
fn oversized_node_is_clamped_instead_of_deadlocking() {
    init_tracing();
    let fs = fs_with_sources(&["s1", "s2"]);
    let cfg = config_with_root("/data");
    let catalog = CatalogBuilder::new()
        .stage_with_cost(
            "fetch",
            &["{root}/src/{sample}.txt"],
            &["{root}/fetch/{sample}.out"],
            16,
        )
        .build();
    let graph = PipelineGraph::build(
        &catalog,
        &samples(&["s1", "s2"]),
        &["fetch".to_string()],
        &cfg,
        &fs,
    )
    .unwrap();
    let mut scheduler = Scheduler::new(graph, catalog, 2, FailurePolicy::KeepGoing);

    // Cost 16 exceeds the whole budget of 2; the node still runs, alone.
    let step = scheduler.start(&fs);
    assert_eq!(labels(&step.newly_scheduled), vec!["fetch(s1)"]);

    let step = scheduler.handle_completion(step.newly_scheduled[0].id, NodeOutcome::Success, &fs);
    assert_eq!(labels(&step.newly_scheduled), vec!["fetch(s2)"]);
}

#[test]
fn fully_fresh_chain_skips_everything_without_dispatch() {
    init_tracing();
    let fs = fs_with_sources(&["s1"]);
    // Each stage's output is newer than its input.
    fs.add_file("/data/fetch/s1.out", 2);
    fs.add_file("/data/assemble/s1.out", 3);
    fs.add_file("/data/bin/s1.out", 4);

    let mut scheduler = chain_scheduler(&["s1"], 8, FailurePolicy::KeepGoing, &fs);

    let step = scheduler.start(&fs);
    assert!(step.newly_scheduled.is_empty());
    assert_eq!(step.newly_skipped.len(), 3);
    assert!(step.run_finished);
    assert!(!scheduler.run_failed());
}

#[test]
fn output_older_than_input_is_stale_and_reruns() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("/data/src/s1.txt", 10); // source touched after the output
    fs.add_file("/data/fetch/s1.out", 2);

    let mut scheduler = chain_scheduler(&["s1"], 8, FailurePolicy::KeepGoing, &fs);

    let step = scheduler.start(&fs);
    assert_eq!(labels(&step.newly_scheduled), vec!["fetch(s1)"]);
    assert!(step.newly_skipped.is_empty());
}

#[test]
fn failure_fails_transitive_consumers_but_not_siblings() {
    init_tracing();
    let fs = fs_with_sources(&["s1", "s2"]);
    let mut scheduler = chain_scheduler(&["s1", "s2"], 32, FailurePolicy::KeepGoing, &fs);

    let step = scheduler.start(&fs);
    let fetch_s1 = step
        .newly_scheduled
        .iter()
        .find(|n| n.label() == "fetch(s1)")
        .unwrap()
        .id;
    let fetch_s2 = step
        .newly_scheduled
        .iter()
        .find(|n| n.label() == "fetch(s2)")
        .unwrap()
        .id;

    let step = scheduler.handle_completion(fetch_s1, NodeOutcome::Failed(2), &fs);
    let mut failed = step.newly_failed.clone();
    failed.sort();
    assert_eq!(failed, vec!["assemble(s1)", "bin(s1)", "fetch(s1)"]);

    // The s2 chain keeps going to completion.
    let mut queue: VecDeque<ScheduledNode> = step.newly_scheduled.into();
    let mut done = Vec::new();
    queue.push_back(
        scheduler
            .handle_completion(fetch_s2, NodeOutcome::Success, &fs)
            .newly_scheduled
            .remove(0),
    );
    while let Some(node) = queue.pop_front() {
        done.push(node.label());
        let step = scheduler.handle_completion(node.id, NodeOutcome::Success, &fs);
        queue.extend(step.newly_scheduled);
    }

    assert!(done.contains(&"bin(s2)".to_string()));
    assert!(scheduler.is_finished());
    assert!(scheduler.run_failed());

    let bin_s1 = scheduler
        .graph()
        .nodes()
        .iter()
        .find(|n| n.label() == "bin(s1)")
        .unwrap();
    assert_eq!(bin_s1.state, NodeState::Failed);
    // The failed node keeps its real exit code; propagated failures have none.
    let fetch_s1_node = scheduler.graph().node(fetch_s1);
    assert_eq!(fetch_s1_node.exit_code, Some(2));
    assert_eq!(bin_s1.exit_code, None);
}

#[test]
fn stop_on_error_halts_all_further_dispatch() {
    init_tracing();
    let fs = fs_with_sources(&["s1", "s2"]);
    let mut scheduler = chain_scheduler(&["s1", "s2"], 32, FailurePolicy::StopOnError, &fs);

    let step = scheduler.start(&fs);
    assert_eq!(step.newly_scheduled.len(), 2);
    let fetch_s1 = step.newly_scheduled[0].id;
    let fetch_s2 = step.newly_scheduled[1].id;

    let step = scheduler.handle_completion(fetch_s1, NodeOutcome::Failed(1), &fs);
    assert!(scheduler.is_aborted());
    assert!(step.newly_scheduled.is_empty());
    assert!(!step.run_finished); // fetch(s2) is still running

    // The in-flight node finishes normally; nothing new is dispatched.
    let step = scheduler.handle_completion(fetch_s2, NodeOutcome::Success, &fs);
    assert!(step.newly_scheduled.is_empty());
    assert!(step.run_finished);
    assert!(scheduler.run_failed());
}
