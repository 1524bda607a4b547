#![allow(dead_code)]

use std::time::Duration;

use passdag::editor::EditorHandle;
use passdag::exec::{UiDispatch, UiQueue};
use passdag::pass::{HighlightingPass, PassMeta, SubmittedPass};
use passdag::sim::{EventKind, Journal};
use passdag::types::{DocumentId, EditorId, ModalityState};
use tokio::sync::oneshot;

pub use passdag_test_utils::{init_tracing, with_timeout, TestHarness};

/// Document-bound pass on `editor`'s document.
pub fn document_pass(
    editor: &EditorHandle,
    meta: PassMeta,
    work: Box<dyn HighlightingPass>,
) -> SubmittedPass {
    let meta = match editor.document() {
        Some(document) => meta.document(document),
        None => meta,
    };
    SubmittedPass::document(meta, work)
}

/// Wait until `pass` on `editor` journals `kind`.
pub async fn wait_for_event(journal: &Journal, editor: EditorId, pass: &str, kind: EventKind) {
    with_timeout(async {
        while journal.position(editor, pass, kind).is_none() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
}

/// Resolve once every UI task posted before this call has run.
pub async fn drain_ui(queue: &UiQueue) {
    let (tx, rx) = oneshot::channel();
    let posted = queue.dispatch(
        ModalityState::NonModal,
        Box::new(move || {
            let _ = tx.send(());
            Ok(())
        }),
    );
    assert!(posted, "ui executor already stopped");
    with_timeout(rx).await.expect("ui thread stopped");
}

/// `first` happened strictly before `second` in the journal.
pub fn assert_before(
    journal: &Journal,
    first: (EditorId, &str, EventKind),
    second: (EditorId, &str, EventKind),
) {
    let a = journal
        .position(first.0, first.1, first.2)
        .unwrap_or_else(|| panic!("missing event {first:?}"));
    let b = journal
        .position(second.0, second.1, second.2)
        .unwrap_or_else(|| panic!("missing event {second:?}"));
    assert!(a < b, "expected {first:?} before {second:?} in {:#?}", journal.events());
}

pub fn doc(id: u64) -> DocumentId {
    DocumentId(id)
}
