mod common;
use crate::common::{doc, document_pass};

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;

use passdag::dag::{GraphBuilder, PassGraph, PassIdGenerator};
use passdag::editor::EditorHandle;
use passdag::pass::{PassMeta, SubmittedPass};
use passdag::progress::{ProgressToken, RoundState};
use passdag::sim::{EventKind, Journal, SimEditor, SimHost, SimPass};
use passdag::types::{EditorId, PassId};
use passdag_test_utils::TestHarness;

/// One declared pass: its predecessors as `(index, is_starting_edge)` pairs,
/// all pointing at earlier passes, plus a collect time.
#[derive(Debug, Clone)]
struct PassShape {
    deps: Vec<(usize, bool)>,
    collect_ms: u64,
}

// Acyclic by construction: pass N may only depend on passes 0..N-1.
fn dag_strategy(max_passes: usize) -> impl Strategy<Value = Vec<PassShape>> {
    (1..=max_passes).prop_flat_map(|num_passes| {
        proptest::collection::vec(
            (
                proptest::collection::vec((any::<usize>(), any::<bool>()), 0..3),
                0..4u64,
            ),
            num_passes,
        )
        .prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, (potential, collect_ms))| {
                    let mut seen = BTreeSet::new();
                    let deps = potential
                        .into_iter()
                        .filter(|_| i > 0)
                        .map(|(dep, starting)| (dep % i, starting))
                        .filter(|(dep, _)| seen.insert(*dep))
                        .collect();
                    PassShape { deps, collect_ms }
                })
                .collect()
        })
    })
}

fn pass_name(i: usize) -> String {
    format!("p{i}")
}

/// Rank of pass `i` among the round's collect starts.
fn collect_order(graph: &PassGraph, editor: EditorId, i: usize) -> u64 {
    let idx = graph
        .find(editor, PassId(i as u32 + 1))
        .expect("pass is in the graph");
    graph.node(idx).collect_order().expect("collect started")
}

fn submitted(editor: &EditorHandle, journal: &Journal, shapes: &[PassShape]) -> Vec<SubmittedPass> {
    shapes
        .iter()
        .enumerate()
        .map(|(i, shape)| {
            let mut meta = PassMeta::new(i as u32 + 1);
            for &(dep, starting) in &shape.deps {
                meta = if starting {
                    meta.starting_after(dep as u32 + 1)
                } else {
                    meta.after(dep as u32 + 1)
                };
            }
            let work = SimPass::new(pass_name(i), editor.id(), journal.clone())
                .collect_for(Duration::from_millis(shape.collect_ms))
                .boxed();
            document_pass(editor, meta, work)
        })
        .collect()
}

proptest! {
    #[test]
    fn built_graph_is_complete_and_consistent(
        editors in proptest::collection::vec(dag_strategy(12), 1..4),
        legacy_tail in 0..3usize,
    ) {
        let host = Arc::new(SimHost::new(Journal::new()));
        let ids = PassIdGenerator::default();

        let mut expected = 0;
        let batch: Vec<_> = editors
            .iter()
            .enumerate()
            .map(|(e, shapes)| {
                let handle = SimEditor::new(e as u64 + 1, format!("f{e}.rs"), Some(doc(e as u64 + 1)))
                    .into_handle();
                host.add_editor(handle.clone());
                let mut passes = submitted(&handle, host.journal(), shapes);
                for l in 0..legacy_tail {
                    passes.push(SubmittedPass::legacy(
                        SimPass::new(format!("legacy{l}"), handle.id(), host.journal().clone()).boxed(),
                    ));
                }
                expected += shapes.len() + legacy_tail;
                (handle, passes)
            })
            .collect();

        let graph = GraphBuilder::new(host.as_ref(), &ids).build(batch);

        // P5: one node per distinct (editor, pass id).
        prop_assert_eq!(graph.len(), expected);
        let keys: BTreeSet<_> = graph
            .nodes()
            .iter()
            .map(|node| (node.editor().id(), node.pass_id()))
            .collect();
        prop_assert_eq!(keys.len(), expected);
        prop_assert_eq!(graph.free_nodes().len() + graph.dependent_nodes().len(), expected);
        prop_assert!(graph.check_consistency().is_ok());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn random_dags_run_in_dependency_order(shapes in dag_strategy(8)) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .expect("runtime");

        runtime.block_on(async {
            let h = TestHarness::new();
            let editor = h.editor(1, "main.rs", Some(1));
            let batch = vec![(editor.clone(), submitted(&editor, &h.journal, &shapes))];

            let round = h
                .executor
                .submit_passes(batch, ProgressToken::new())
                .expect("consistent graph");
            assert_eq!(round.graph().len(), shapes.len());

            let state = tokio::time::timeout(Duration::from_secs(10), round.finished())
                .await
                .expect("round timed out");
            assert_eq!(state, RoundState::Completed);

            let journal = &h.journal;
            for (i, shape) in shapes.iter().enumerate() {
                let name = pass_name(i);
                // P1: every node ran exactly once.
                assert_eq!(journal.count(editor.id(), &name, EventKind::CollectStarted), 1);
                assert_eq!(journal.count(editor.id(), &name, EventKind::ApplyFinished), 1);
                assert!(h.host.is_up_to_date(doc(1), PassId(i as u32 + 1)));

                // P2: completion predecessors applied and starting
                // predecessors collecting before this collect.
                let started = journal
                    .position(editor.id(), &name, EventKind::CollectStarted)
                    .expect("collect started");
                let own_order = collect_order(round.graph(), editor.id(), i);
                for &(dep, starting) in &shape.deps {
                    if starting {
                        let dep_order = collect_order(round.graph(), editor.id(), dep);
                        assert!(
                            dep_order < own_order,
                            "{name} started collecting before p{dep} did"
                        );
                    } else {
                        let applied = journal
                            .position(editor.id(), &pass_name(dep), EventKind::ApplyFinished)
                            .expect("predecessor applied");
                        assert!(applied < started, "{name} collected before p{dep} applied");
                    }
                }
            }

            // P3: applies never overlap.
            assert_eq!(journal.max_concurrent_applies(), 1);

            h.shutdown().await;
        });
    }
}
