// tests/property_graph.rs
//
// Property test: any catalog whose stages only consume outputs of earlier
// stages builds into a graph whose plan order is a valid topological order.

use proptest::prelude::*;

use magpipe::catalog::{StageCatalog, StageDef};
use magpipe::dag::PipelineGraph;
use magpipe::fs::MockFileSystem;

use magpipe_test_utils::builders::config_with_root;

/// Generate stage dependency lists where stage `i` may only depend on
/// stages `0..i`, which keeps the catalog acyclic by construction.
fn deps_strategy(max_stages: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..=max_stages).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..n), n).prop_map(
            move |raw| {
                raw.into_iter()
                    .enumerate()
                    .map(|(i, potential)| {
                        let mut deps: Vec<usize> = potential
                            .into_iter()
                            .filter(|_| i > 0)
                            .map(|d| d % i)
                            .collect();
                        deps.sort();
                        deps.dedup();
                        deps
                    })
                    .collect()
            },
        )
    })
}

fn catalog_from_deps(deps: &[Vec<usize>]) -> StageCatalog {
    let stages = deps
        .iter()
        .enumerate()
        .map(|(i, stage_deps)| {
            let inputs: Vec<String> = if stage_deps.is_empty() {
                vec!["{root}/src/{sample}.txt".to_string()]
            } else {
                stage_deps
                    .iter()
                    .map(|d| format!("{{root}}/st{d}/{{sample}}.out"))
                    .collect()
            };
            let input_refs: Vec<&str> = inputs.iter().map(String::as_str).collect();
            let output = format!("{{root}}/st{i}/{{sample}}.out");
            StageDef::new(&format!("st{i}"), &input_refs, &[&output], "true", 1)
        })
        .collect();
    StageCatalog::new(stages)
}

proptest! {
    #[test]
    fn plan_order_is_always_topological(deps in deps_strategy(8)) {
        let cfg = config_with_root("/data");
        let fs = MockFileSystem::new();
        fs.add_file("/data/src/s1.txt", 1);
        fs.add_file("/data/src/s2.txt", 1);

        let catalog = catalog_from_deps(&deps);
        let last = format!("st{}", deps.len() - 1);
        let graph = PipelineGraph::build(
            &catalog,
            &["s1".to_string(), "s2".to_string()],
            &[last],
            &cfg,
            &fs,
        )
        .unwrap();

        let order = graph.plan_order();
        prop_assert_eq!(order.len(), graph.len());

        let mut position = vec![0usize; graph.len()];
        for (pos, &id) in order.iter().enumerate() {
            position[id] = pos;
        }
        for node in graph.nodes() {
            for &producer in &node.producers {
                prop_assert!(
                    position[producer] < position[node.id],
                    "{} planned before its producer {}",
                    graph.node(node.id).label(),
                    graph.node(producer).label()
                );
            }
        }
    }
}
