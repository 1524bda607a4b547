use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use passdag::editor::EditorHandle;
use passdag::exec::{ExecutorOptions, PassExecutor, UiExecutor, UiQueue};
use passdag::sim::{Journal, SimEditor, SimHost, SimPass};
use passdag::types::{DocumentId, EditorId};
use tokio::runtime::Handle;

/// Options tuned for tests: consistency check on, short polls.
pub fn test_options() -> ExecutorOptions {
    ExecutorOptions {
        check_consistency: true,
        cancel_poll_interval: Duration::from_millis(10),
        cancel_wait_limit: Some(Duration::from_secs(3)),
        dispose_quiescence: Duration::from_secs(1),
        generated_pass_id_base: 100,
    }
}

/// A `PassExecutor` wired to a `SimHost` and a real UI thread.
///
/// Must be created inside a multi-thread tokio runtime.
pub struct TestHarness {
    pub host: Arc<SimHost>,
    pub journal: Journal,
    pub executor: PassExecutor,
    pub queue: UiQueue,
    ui: Option<UiExecutor>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_options(test_options())
    }

    pub fn with_options(options: ExecutorOptions) -> Self {
        Self::try_with_options(options).expect("failed to build test harness")
    }

    pub fn try_with_options(options: ExecutorOptions) -> anyhow::Result<Self> {
        let journal = Journal::new();
        let host = Arc::new(SimHost::new(journal.clone()));
        let ui = UiExecutor::spawn("passdag-ui").context("spawning ui thread")?;
        let queue = ui.queue();
        let executor = PassExecutor::new(
            host.clone(),
            Arc::new(queue.clone()),
            Handle::current(),
            options,
        );
        Ok(Self {
            host,
            journal,
            executor,
            queue,
            ui: Some(ui),
        })
    }

    /// Register a text editor showing `document` with the host.
    pub fn editor(&self, id: u64, name: &str, document: Option<u64>) -> EditorHandle {
        self.editor_from(SimEditor::new(id, name, document.map(DocumentId)))
    }

    /// Register a custom editor, e.g. one whose validity a test flips.
    pub fn editor_from(&self, editor: SimEditor) -> EditorHandle {
        let handle = editor.into_handle();
        self.host.add_editor(handle.clone());
        handle
    }

    /// Simulated pass journaling into this harness.
    pub fn pass(&self, name: &str, editor: EditorId) -> SimPass {
        SimPass::new(name, editor, self.journal.clone())
    }

    /// Drain and join the UI thread while the executor stays alive.
    /// Later dispatches through `queue` are rejected.
    pub async fn stop_ui(&mut self) -> anyhow::Result<()> {
        if let Some(ui) = self.ui.take() {
            tokio::task::spawn_blocking(move || ui.shutdown())
                .await
                .context("joining ui thread")?;
        }
        Ok(())
    }

    /// Dispose the executor and join the UI thread after it drained.
    pub async fn shutdown(mut self) {
        self.executor.dispose().await;
        self.stop_ui().await.expect("ui shutdown panicked");
    }
}
