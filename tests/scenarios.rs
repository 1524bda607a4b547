mod common;
use crate::common::{assert_before, doc, document_pass, drain_ui, init_tracing, with_timeout};

use std::error::Error;
use std::time::Duration;

use passdag::editor::FileEditor;
use passdag::pass::{PassMeta, SubmittedPass};
use passdag::progress::{ProgressToken, RoundState};
use passdag::sim::{EventKind, SimEditor, intentions_pass_name};
use passdag::types::PassId;
use passdag_test_utils::TestHarness;

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn completion_predecessor_applies_before_successor_collects() -> TestResult {
    init_tracing();
    let h = TestHarness::new();
    let editor = h.editor(1, "main.rs", Some(1));

    let a = h.pass("A", editor.id()).collect_for(Duration::from_millis(20)).boxed();
    let b = h.pass("B", editor.id()).boxed();
    let batch = vec![(
        editor.clone(),
        vec![
            document_pass(&editor, PassMeta::new(1), a),
            document_pass(&editor, PassMeta::new(2).after(1), b),
        ],
    )];

    let round = h.executor.submit_passes(batch, ProgressToken::new())?;
    assert_eq!(round.graph().len(), 2);
    assert_eq!(round.graph().free_nodes().len(), 1);
    assert_eq!(round.graph().dependent_nodes().len(), 1);

    let state = with_timeout(round.finished()).await;
    assert_eq!(state, RoundState::Completed);

    assert_before(
        &h.journal,
        (editor.id(), "A", EventKind::ApplyFinished),
        (editor.id(), "B", EventKind::CollectStarted),
    );
    assert!(h.host.is_up_to_date(doc(1), PassId(1)));
    assert!(h.host.is_up_to_date(doc(1), PassId(2)));
    assert_eq!(round.remaining(), 0);
    assert!(round.progress().saved_error().is_none());

    h.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn intentions_pass_follows_its_trigger() -> TestResult {
    init_tracing();
    let h = TestHarness::new();
    let editor = h.editor(1, "main.rs", Some(1));

    let a = h.pass("A", editor.id()).boxed();
    let batch = vec![(
        editor.clone(),
        vec![document_pass(
            &editor,
            PassMeta::new(1).run_intention_pass_after(true),
            a,
        )],
    )];

    let round = h.executor.submit_passes(batch, ProgressToken::new())?;
    let graph = round.graph();
    assert_eq!(graph.len(), 2);

    let intentions = graph
        .find(editor.id(), PassId(101))
        .expect("intentions node with a generated id");
    assert_eq!(
        graph.node(intentions).meta().completion_predecessors,
        vec![PassId(1)]
    );

    assert_eq!(with_timeout(round.finished()).await, RoundState::Completed);

    let name = intentions_pass_name(editor.id());
    assert_before(
        &h.journal,
        (editor.id(), "A", EventKind::ApplyFinished),
        (editor.id(), name.as_str(), EventKind::CollectStarted),
    );
    assert!(h.host.is_up_to_date(doc(1), PassId(101)));

    h.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn intentions_pass_skipped_for_non_text_editor() -> TestResult {
    init_tracing();
    let h = TestHarness::new();
    let editor = h.editor_from(SimEditor::new(1, "diagram.svg", Some(doc(1))).text(false));

    let a = h.pass("A", editor.id()).boxed();
    let batch = vec![(
        editor.clone(),
        vec![document_pass(
            &editor,
            PassMeta::new(1).run_intention_pass_after(true),
            a,
        )],
    )];

    let round = h.executor.submit_passes(batch, ProgressToken::new())?;
    assert_eq!(round.graph().len(), 1);
    assert_eq!(with_timeout(round.finished()).await, RoundState::Completed);

    h.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn legacy_passes_on_shared_document_are_split_per_editor() -> TestResult {
    init_tracing();
    let h = TestHarness::new();
    let left = h.editor(1, "lib.rs", Some(1));
    let right = h.editor(2, "lib.rs", Some(1));
    h.host.select(doc(1), right.id());

    let batch = vec![
        (
            left.clone(),
            vec![SubmittedPass::legacy(h.pass("left-legacy", left.id()).boxed())],
        ),
        (
            right.clone(),
            vec![SubmittedPass::legacy(h.pass("right-legacy", right.id()).boxed())],
        ),
    ];

    let round = h.executor.submit_passes(batch, ProgressToken::new())?;
    let graph = round.graph();
    assert_eq!(graph.len(), 2);
    assert_eq!(graph.free_nodes().len(), 2);

    let left_node = graph.find(left.id(), PassId(101)).expect("left legacy node");
    let right_node = graph.find(right.id(), PassId(102)).expect("right legacy node");
    assert_ne!(
        graph.node(left_node).pass_id(),
        graph.node(right_node).pass_id()
    );

    assert_eq!(with_timeout(round.finished()).await, RoundState::Completed);

    assert_eq!(h.journal.count(left.id(), "left-legacy", EventKind::ApplyFinished), 1);
    assert_eq!(h.journal.count(right.id(), "right-legacy", EventKind::ApplyFinished), 1);

    // Legacy applies repaint every editor showing the document.
    assert_eq!(h.host.repaint_count(left.id()), 2);
    assert_eq!(h.host.repaint_count(right.id()), 2);

    h.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn document_bound_passes_run_once_per_document() -> TestResult {
    init_tracing();
    let h = TestHarness::new();
    let first = h.editor(1, "lib.rs", Some(1));
    let second = h.editor(2, "lib.rs", Some(1));

    let batch = vec![
        (
            first.clone(),
            vec![document_pass(&first, PassMeta::new(1), h.pass("general", first.id()).boxed())],
        ),
        (
            second.clone(),
            vec![document_pass(&second, PassMeta::new(1), h.pass("general", second.id()).boxed())],
        ),
    ];

    let round = h.executor.submit_passes(batch, ProgressToken::new())?;
    assert_eq!(round.graph().len(), 1);
    // No selection: the first editor seen wins.
    assert!(round.graph().find(first.id(), PassId(1)).is_some());

    assert_eq!(with_timeout(round.finished()).await, RoundState::Completed);
    assert_eq!(h.journal.count(first.id(), "general", EventKind::ApplyFinished), 1);
    assert_eq!(h.journal.count(second.id(), "general", EventKind::CollectStarted), 0);

    h.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn editor_bound_passes_get_fresh_ids_per_editor() -> TestResult {
    init_tracing();
    let h = TestHarness::new();
    let first = h.editor(1, "lib.rs", Some(1));
    let second = h.editor(2, "lib.rs", Some(1));
    h.host.select(doc(1), first.id());

    let batch = vec![
        (
            first.clone(),
            vec![
                document_pass(&first, PassMeta::new(1), h.pass("general", first.id()).boxed()),
                SubmittedPass::editor(
                    PassMeta::new(5).after(1),
                    h.pass("overlay", first.id()).boxed(),
                ),
            ],
        ),
        (
            second.clone(),
            vec![
                document_pass(&second, PassMeta::new(1), h.pass("general", second.id()).boxed()),
                SubmittedPass::editor(
                    PassMeta::new(5).after(1),
                    h.pass("overlay", second.id()).boxed(),
                ),
            ],
        ),
    ];

    let round = h.executor.submit_passes(batch, ProgressToken::new())?;
    let graph = round.graph();
    // first: general + overlay; second: overlay plus the general pass it
    // waits on, which is pulled in for that editor only.
    assert_eq!(graph.len(), 4);
    assert!(graph.find(first.id(), PassId(101)).is_some());
    assert!(graph.find(second.id(), PassId(102)).is_some());
    assert!(graph.find(second.id(), PassId(1)).is_some());
    assert!(graph.find(first.id(), PassId(5)).is_none());

    assert_eq!(with_timeout(round.finished()).await, RoundState::Completed);
    assert_before(
        &h.journal,
        (second.id(), "general", EventKind::ApplyFinished),
        (second.id(), "overlay", EventKind::CollectStarted),
    );

    h.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn legacy_passes_of_one_editor_run_in_sequence() -> TestResult {
    init_tracing();
    let h = TestHarness::new();
    let editor = h.editor(1, "main.rs", Some(1));

    let batch = vec![(
        editor.clone(),
        vec![
            SubmittedPass::legacy(h.pass("first", editor.id()).collect_for(Duration::from_millis(15)).boxed()),
            SubmittedPass::legacy(h.pass("second", editor.id()).boxed()),
            SubmittedPass::legacy(h.pass("third", editor.id()).boxed()),
        ],
    )];

    let round = h.executor.submit_passes(batch, ProgressToken::new())?;
    assert_eq!(round.graph().free_nodes().len(), 1);
    assert_eq!(round.graph().dependent_nodes().len(), 2);

    assert_eq!(with_timeout(round.finished()).await, RoundState::Completed);
    assert_before(
        &h.journal,
        (editor.id(), "first", EventKind::ApplyFinished),
        (editor.id(), "second", EventKind::CollectStarted),
    );
    assert_before(
        &h.journal,
        (editor.id(), "second", EventKind::ApplyFinished),
        (editor.id(), "third", EventKind::CollectStarted),
    );

    h.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn starting_successor_runs_alongside_its_predecessor() -> TestResult {
    init_tracing();
    let h = TestHarness::new();
    let editor = h.editor(1, "main.rs", Some(1));

    let batch = vec![(
        editor.clone(),
        vec![
            document_pass(
                &editor,
                PassMeta::new(1),
                h.pass("slow", editor.id()).collect_for(Duration::from_millis(150)).boxed(),
            ),
            document_pass(
                &editor,
                PassMeta::new(2).starting_after(1),
                h.pass("eager", editor.id()).boxed(),
            ),
        ],
    )];

    let round = h.executor.submit_passes(batch, ProgressToken::new())?;
    assert_eq!(with_timeout(round.finished()).await, RoundState::Completed);

    // The successor does not wait for the slow collect to end.
    assert_before(
        &h.journal,
        (editor.id(), "eager", EventKind::CollectFinished),
        (editor.id(), "slow", EventKind::CollectFinished),
    );
    let order = |id| {
        let idx = round.graph().find(editor.id(), PassId(id)).expect("node");
        round.graph().node(idx).collect_order()
    };
    assert_eq!(order(1), Some(1));
    assert_eq!(order(2), Some(2));

    h.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn passes_without_document_still_run() -> TestResult {
    init_tracing();
    let h = TestHarness::new();
    let editor = h.editor(1, "scratch", None);

    let batch = vec![(
        editor.clone(),
        vec![
            SubmittedPass::document(PassMeta::new(1), h.pass("A", editor.id()).boxed()),
            SubmittedPass::document(PassMeta::new(2).after(1), h.pass("B", editor.id()).boxed()),
        ],
    )];

    let round = h.executor.submit_passes(batch, ProgressToken::new())?;
    assert_eq!(round.graph().len(), 2);
    assert_eq!(with_timeout(round.finished()).await, RoundState::Completed);

    // Nothing to mark without a document.
    assert!(h.host.up_to_date_marks().is_empty());
    assert_eq!(h.journal.applied().len(), 2);

    h.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn document_pass_defaults_to_its_editors_document() -> TestResult {
    init_tracing();
    let h = TestHarness::new();
    let editor = h.editor(1, "main.rs", Some(1));

    // No `PassMeta::document` here.
    let batch = vec![(
        editor.clone(),
        vec![
            SubmittedPass::document(PassMeta::new(1), h.pass("A", editor.id()).boxed()),
            SubmittedPass::document(PassMeta::new(2).after(1), h.pass("B", editor.id()).boxed()),
        ],
    )];

    let round = h.executor.submit_passes(batch, ProgressToken::new())?;
    assert!(round.graph().nodes().iter().all(|node| node.document() == Some(doc(1))));
    assert_eq!(with_timeout(round.finished()).await, RoundState::Completed);

    assert!(h.host.is_up_to_date(doc(1), PassId(1)));
    assert!(h.host.is_up_to_date(doc(1), PassId(2)));

    h.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn invalid_editor_skips_apply_without_failing() -> TestResult {
    init_tracing();
    let h = TestHarness::new();
    let editor = SimEditor::new(1, "main.rs", Some(doc(1)));
    editor.set_valid(false);
    let editor = h.editor_from(editor);
    assert!(!editor.is_valid());

    let batch = vec![(
        editor.clone(),
        vec![
            document_pass(&editor, PassMeta::new(1), h.pass("A", editor.id()).boxed()),
            document_pass(&editor, PassMeta::new(2).after(1), h.pass("B", editor.id()).boxed()),
        ],
    )];

    let round = h.executor.submit_passes(batch, ProgressToken::new())?;
    assert_eq!(with_timeout(round.finished()).await, RoundState::Completed);

    assert_eq!(h.journal.count(editor.id(), "B", EventKind::CollectFinished), 1);
    assert!(h.journal.applied().is_empty());
    assert!(h.host.up_to_date_marks().is_empty());
    assert!(round.progress().saved_error().is_none());

    h.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pass_that_cannot_apply_is_skipped() -> TestResult {
    init_tracing();
    let h = TestHarness::new();
    let editor = h.editor(1, "main.rs", Some(1));

    let batch = vec![(
        editor.clone(),
        vec![document_pass(
            &editor,
            PassMeta::new(1),
            h.pass("A", editor.id()).can_apply(false).boxed(),
        )],
    )];

    let round = h.executor.submit_passes(batch, ProgressToken::new())?;
    assert_eq!(with_timeout(round.finished()).await, RoundState::Completed);
    assert_eq!(h.journal.count(editor.id(), "A", EventKind::ApplyStarted), 0);
    assert!(!h.host.is_up_to_date(doc(1), PassId(1)));

    h.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dumb_mode_skips_collect_of_unaware_passes() -> TestResult {
    init_tracing();
    let h = TestHarness::new();
    h.host.set_dumb(true);
    let editor = h.editor(1, "main.rs", Some(1));

    let batch = vec![(
        editor.clone(),
        vec![
            document_pass(&editor, PassMeta::new(1), h.pass("smart", editor.id()).boxed()),
            document_pass(
                &editor,
                PassMeta::new(2),
                h.pass("aware", editor.id()).dumb_aware(true).boxed(),
            ),
        ],
    )];

    let round = h.executor.submit_passes(batch, ProgressToken::new())?;
    assert_eq!(with_timeout(round.finished()).await, RoundState::Completed);

    assert_eq!(h.journal.count(editor.id(), "smart", EventKind::CollectStarted), 0);
    assert_eq!(h.journal.count(editor.id(), "aware", EventKind::CollectStarted), 1);
    assert_eq!(h.journal.count(editor.id(), "smart", EventKind::ApplyFinished), 1);

    h.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn applies_run_on_the_ui_thread() -> TestResult {
    init_tracing();
    let h = TestHarness::new();
    let editor = h.editor(1, "main.rs", Some(1));

    let passes = (1..=6)
        .map(|id| {
            document_pass(
                &editor,
                PassMeta::new(id),
                h.pass(&format!("p{id}"), editor.id())
                    .collect_for(Duration::from_millis(5))
                    .boxed(),
            )
        })
        .collect();

    let round = h.executor.submit_passes(vec![(editor.clone(), passes)], ProgressToken::new())?;
    assert_eq!(with_timeout(round.finished()).await, RoundState::Completed);
    drain_ui(&h.queue).await;

    let events = h.journal.events();
    let applies: Vec<_> = events
        .iter()
        .filter(|event| event.kind == EventKind::ApplyStarted)
        .collect();
    assert_eq!(applies.len(), 6);
    assert!(
        applies
            .iter()
            .all(|event| event.thread.as_deref() == Some("passdag-ui"))
    );
    assert_eq!(h.journal.max_concurrent_applies(), 1);

    h.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn empty_batch_completes_immediately() -> TestResult {
    init_tracing();
    let h = TestHarness::new();

    let round = h.executor.submit_passes(vec![], ProgressToken::new())?;
    assert!(round.graph().is_empty());
    assert_eq!(with_timeout(round.finished()).await, RoundState::Completed);

    h.shutdown().await;
    Ok(())
}
