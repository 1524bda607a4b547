// src/sim/host.rs

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::editor::{EditorHandle, FileEditor, PassHost};
use crate::pass::HighlightingPass;
use crate::sim::journal::Journal;
use crate::sim::pass::SimPass;
use crate::types::{DocumentId, EditorId, PassId};

/// In-memory editor whose validity can be flipped while a round runs.
#[derive(Debug)]
pub struct SimEditor {
    id: EditorId,
    name: String,
    document: Option<DocumentId>,
    text: bool,
    valid: AtomicBool,
    displayable: AtomicBool,
}

impl SimEditor {
    pub fn new(id: u64, name: impl Into<String>, document: Option<DocumentId>) -> Self {
        Self {
            id: EditorId(id),
            name: name.into(),
            document,
            text: true,
            valid: AtomicBool::new(true),
            displayable: AtomicBool::new(true),
        }
    }

    pub fn text(mut self, value: bool) -> Self {
        self.text = value;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_valid(&self, value: bool) {
        self.valid.store(value, Ordering::Release);
    }

    pub fn set_displayable(&self, value: bool) {
        self.displayable.store(value, Ordering::Release);
    }

    pub fn into_handle(self) -> EditorHandle {
        Arc::new(self)
    }
}

impl FileEditor for SimEditor {
    fn id(&self) -> EditorId {
        self.id
    }

    fn document(&self) -> Option<DocumentId> {
        self.document
    }

    fn is_text_editor(&self) -> bool {
        self.text
    }

    fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    fn is_displayable(&self) -> bool {
        self.is_valid() && self.displayable.load(Ordering::Acquire)
    }

    fn file_type(&self) -> Option<String> {
        self.name
            .rsplit_once('.')
            .map(|(_, extension)| extension.to_string())
    }
}

#[derive(Debug, Default)]
struct HostRecords {
    up_to_date: Vec<(DocumentId, PassId)>,
    repaints: HashMap<EditorId, usize>,
}

/// Host that records what the scheduler asks of it.
#[derive(Debug)]
pub struct SimHost {
    journal: Journal,
    editors: Mutex<Vec<EditorHandle>>,
    selected: Mutex<HashMap<DocumentId, EditorId>>,
    dumb: AtomicBool,
    disposed: AtomicBool,
    intentions: AtomicBool,
    records: Mutex<HostRecords>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimHost {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            editors: Mutex::new(Vec::new()),
            selected: Mutex::new(HashMap::new()),
            dumb: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            intentions: AtomicBool::new(true),
            records: Mutex::new(HostRecords::default()),
        }
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn add_editor(&self, editor: EditorHandle) {
        lock(&self.editors).push(editor);
    }

    pub fn select(&self, document: DocumentId, editor: EditorId) {
        lock(&self.selected).insert(document, editor);
    }

    pub fn set_dumb(&self, value: bool) {
        self.dumb.store(value, Ordering::Release);
    }

    pub fn set_disposed(&self, value: bool) {
        self.disposed.store(value, Ordering::Release);
    }

    /// Whether `intentions_pass` hands out a pass.
    pub fn set_intentions(&self, value: bool) {
        self.intentions.store(value, Ordering::Release);
    }

    /// Every `mark_up_to_date` call, in order.
    pub fn up_to_date_marks(&self) -> Vec<(DocumentId, PassId)> {
        lock(&self.records).up_to_date.clone()
    }

    pub fn is_up_to_date(&self, document: DocumentId, pass: PassId) -> bool {
        lock(&self.records).up_to_date.contains(&(document, pass))
    }

    pub fn repaint_count(&self, editor: EditorId) -> usize {
        lock(&self.records)
            .repaints
            .get(&editor)
            .copied()
            .unwrap_or(0)
    }
}

/// Name of the intentions pass synthesized for `editor`.
pub fn intentions_pass_name(editor: EditorId) -> String {
    format!("intentions@{editor}")
}

impl PassHost for SimHost {
    fn selected_editor(&self, document: DocumentId) -> Option<EditorId> {
        lock(&self.selected).get(&document).copied()
    }

    fn editors_for_document(&self, document: DocumentId) -> Vec<EditorHandle> {
        lock(&self.editors)
            .iter()
            .filter(|editor| editor.document() == Some(document))
            .cloned()
            .collect()
    }

    fn is_dumb(&self) -> bool {
        self.dumb.load(Ordering::Acquire)
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn mark_up_to_date(&self, document: DocumentId, pass: PassId) {
        lock(&self.records).up_to_date.push((document, pass));
    }

    fn repaint(&self, editor: &dyn FileEditor) {
        *lock(&self.records).repaints.entry(editor.id()).or_default() += 1;
    }

    fn intentions_pass(&self, editor: &EditorHandle) -> Option<Box<dyn HighlightingPass>> {
        if !self.intentions.load(Ordering::Acquire) {
            return None;
        }
        let pass = SimPass::new(intentions_pass_name(editor.id()), editor.id(), self.journal.clone())
            .dumb_aware(true);
        Some(pass.boxed())
    }
}
