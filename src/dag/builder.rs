// src/dag/builder.rs

//! Turns the caller's `(editor, passes)` batch into a wired [`PassGraph`].
//!
//! Build order:
//! 1. classify every pass (document-bound, editor-bound, wrapped legacy) and
//!    group document-bound passes by document;
//! 2. for each document, wire the preferred editor's document-bound passes in
//!    ascending ID order;
//! 3. wire editor-bound passes per editor;
//! 4. wire passes that have no document at all.
//!
//! Nodes are deduplicated by `(editor, pass id)`. Predecessors that are not
//! wired yet are created recursively; predecessors that do not exist are
//! dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use tracing::debug;

use crate::dag::graph::PassGraph;
use crate::dag::node::{NodeIdx, ScheduledNode};
use crate::editor::{EditorHandle, PassHost};
use crate::pass::{LegacyPass, PassMeta, PassOrigin, SubmittedPass, TextPass};
use crate::types::{DocumentId, EditorId, PassId};

/// Source of fresh pass IDs for wrapped, editor-bound and synthesized passes.
///
/// Shared across rounds so IDs never repeat within one executor.
#[derive(Debug)]
pub struct PassIdGenerator {
    last: AtomicU32,
}

impl PassIdGenerator {
    /// IDs handed out start at `base + 1`.
    pub fn starting_after(base: u32) -> Self {
        Self {
            last: AtomicU32::new(base),
        }
    }

    pub fn next(&self) -> PassId {
        PassId(self.last.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

impl Default for PassIdGenerator {
    fn default() -> Self {
        Self::starting_after(100)
    }
}

/// Binding of a pass inside its editor's pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Binding {
    Document,
    Editor,
}

/// Which of an editor's passes a predecessor ID may resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    DocumentBound,
    All,
    Nothing,
}

impl Scope {
    fn admits(self, binding: Binding) -> bool {
        match self {
            Scope::DocumentBound => binding == Binding::Document,
            Scope::All => true,
            Scope::Nothing => false,
        }
    }
}

#[derive(Debug)]
struct PoolEntry {
    binding: Binding,
    id: PassId,
    /// Taken when the node is created.
    pass: Option<TextPass>,
}

#[derive(Debug)]
struct EditorEntry {
    handle: EditorHandle,
    pool: Vec<PoolEntry>,
}

#[derive(Debug)]
struct NodeDraft {
    editor_idx: usize,
    pass: TextPass,
    predecessors: usize,
    on_completion: Vec<NodeIdx>,
    on_submit: Vec<NodeIdx>,
}

/// One-shot builder for a round's dependency graph.
pub struct GraphBuilder<'a> {
    host: &'a dyn PassHost,
    ids: &'a PassIdGenerator,
    editors: Vec<EditorEntry>,
    drafts: Vec<NodeDraft>,
    keys: HashMap<(EditorId, PassId), NodeIdx>,
    free: Vec<NodeIdx>,
    dependent: Vec<NodeIdx>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(host: &'a dyn PassHost, ids: &'a PassIdGenerator) -> Self {
        Self {
            host,
            ids,
            editors: Vec::new(),
            drafts: Vec::new(),
            keys: HashMap::new(),
            free: Vec::new(),
            dependent: Vec::new(),
        }
    }

    /// Build the graph for one round.
    pub fn build(mut self, batch: Vec<(EditorHandle, Vec<SubmittedPass>)>) -> PassGraph {
        let (documents, no_document) = self.classify(batch);

        for (document, editor_indices) in &documents {
            let preferred = self.preferred_editor(*document, editor_indices);
            self.demote_legacy_passes(*document, preferred, editor_indices);

            let mut ids: Vec<PassId> = self.editors[preferred]
                .pool
                .iter()
                .filter(|entry| entry.binding == Binding::Document)
                .map(|entry| entry.id)
                .collect();
            // ID order approximates declaration order; edges are explicit.
            ids.sort_unstable();

            for id in ids {
                self.create_listed(preferred, id, Scope::DocumentBound);
            }
        }

        for editor_idx in 0..self.editors.len() {
            let ids: Vec<PassId> = self.editors[editor_idx]
                .pool
                .iter()
                .filter(|entry| entry.binding == Binding::Editor)
                .map(|entry| entry.id)
                .collect();
            for id in ids {
                self.create_listed(editor_idx, id, Scope::All);
            }
        }

        for (editor_idx, id) in no_document {
            self.create_listed(editor_idx, id, Scope::Nothing);
        }

        self.finish()
    }

    /// Assign IDs, wrap legacy passes and fill per-editor pools.
    ///
    /// Returns documents (in first-seen order) with the editors showing them,
    /// plus the document-less passes.
    #[allow(clippy::type_complexity)]
    fn classify(
        &mut self,
        batch: Vec<(EditorHandle, Vec<SubmittedPass>)>,
    ) -> (Vec<(DocumentId, Vec<usize>)>, Vec<(usize, PassId)>) {
        let mut documents: Vec<(DocumentId, Vec<usize>)> = Vec::new();
        let mut document_pos: HashMap<DocumentId, usize> = HashMap::new();
        let mut no_document = Vec::new();

        for (handle, passes) in batch {
            let editor_idx = self.editors.len();
            let mut document = handle.document();
            let mut previous: Option<PassId> = None;
            let mut pool = Vec::with_capacity(passes.len());

            for submitted in passes {
                let pass = match submitted {
                    SubmittedPass::EditorBound(mut pass) => {
                        // Unique per invocation: several editors may show the
                        // same document with the same editor-bound pass.
                        pass.meta.id = self.ids.next();
                        pool.push(PoolEntry {
                            binding: Binding::Editor,
                            id: pass.meta.id,
                            pass: Some(pass),
                        });
                        continue;
                    }
                    SubmittedPass::DocumentBound(mut pass) => {
                        if pass.meta.document.is_none() {
                            pass.meta.document = handle.document();
                        }
                        pass
                    }
                    SubmittedPass::Legacy(legacy) => self.wrap_legacy(legacy, document, previous),
                };

                document = pass.meta.document;
                previous = Some(pass.meta.id);

                match document {
                    Some(doc) => {
                        let pos = *document_pos.entry(doc).or_insert_with(|| {
                            documents.push((doc, Vec::new()));
                            documents.len() - 1
                        });
                        let editors = &mut documents[pos].1;
                        if !editors.contains(&editor_idx) {
                            editors.push(editor_idx);
                        }
                    }
                    None => no_document.push((editor_idx, pass.meta.id)),
                }

                pool.push(PoolEntry {
                    binding: Binding::Document,
                    id: pass.meta.id,
                    pass: Some(pass),
                });
            }

            self.editors.push(EditorEntry { handle, pool });
        }

        (documents, no_document)
    }

    /// Untyped passes run strictly in sequence: each waits for the previous
    /// pass of the same editor to apply.
    fn wrap_legacy(
        &self,
        legacy: LegacyPass,
        document: Option<DocumentId>,
        previous: Option<PassId>,
    ) -> TextPass {
        let meta = PassMeta {
            id: self.ids.next(),
            completion_predecessors: previous.into_iter().collect(),
            starting_predecessors: Vec::new(),
            document,
            run_intention_pass_after: false,
        };
        TextPass::new(meta, legacy.0).with_origin(PassOrigin::Legacy)
    }

    /// The editor selected for `document`, else the first one seen.
    fn preferred_editor(&self, document: DocumentId, editor_indices: &[usize]) -> usize {
        let selected = self.host.selected_editor(document);
        editor_indices
            .iter()
            .copied()
            .find(|&idx| Some(self.editors[idx].handle.id()) == selected)
            .unwrap_or(editor_indices[0])
    }

    /// Wrapped legacy passes of non-preferred editors are scheduled on their
    /// own, as editor-bound passes. Typed document-bound passes of those
    /// editors stay unscheduled (unless an editor-bound pass needs them).
    fn demote_legacy_passes(&mut self, document: DocumentId, preferred: usize, editor_indices: &[usize]) {
        for &idx in editor_indices.iter().filter(|&&idx| idx != preferred) {
            for entry in &mut self.editors[idx].pool {
                let demote = matches!(
                    &entry.pass,
                    Some(pass) if pass.origin == PassOrigin::Legacy && pass.meta.document == Some(document)
                );
                if demote {
                    entry.binding = Binding::Editor;
                }
            }
        }
    }

    /// Create the node for a pass listed in the editor's own pool.
    fn create_listed(&mut self, editor_idx: usize, id: PassId, scope: Scope) -> Option<NodeIdx> {
        let key = (self.editors[editor_idx].handle.id(), id);
        if let Some(&existing) = self.keys.get(&key) {
            return Some(existing);
        }
        let pass = self.editors[editor_idx]
            .pool
            .iter_mut()
            .find(|entry| entry.id == id && entry.pass.is_some())
            .and_then(|entry| entry.pass.take())?;
        Some(self.create_node(editor_idx, pass, scope))
    }

    fn find_or_create_predecessor(
        &mut self,
        editor_idx: usize,
        id: PassId,
        scope: Scope,
    ) -> Option<NodeIdx> {
        let key = (self.editors[editor_idx].handle.id(), id);
        if let Some(&existing) = self.keys.get(&key) {
            return Some(existing);
        }
        let pass = self.editors[editor_idx]
            .pool
            .iter_mut()
            .find(|entry| entry.id == id && scope.admits(entry.binding) && entry.pass.is_some())
            .and_then(|entry| entry.pass.take())?;
        Some(self.create_node(editor_idx, pass, scope))
    }

    fn create_node(&mut self, editor_idx: usize, pass: TextPass, scope: Scope) -> NodeIdx {
        let editor = self.editors[editor_idx].handle.clone();
        let id = pass.meta.id;
        let completion = pass.meta.completion_predecessors.clone();
        let starting = pass.meta.starting_predecessors.clone();
        let run_intentions = pass.meta.run_intention_pass_after;

        let idx = self.drafts.len();
        self.drafts.push(NodeDraft {
            editor_idx,
            pass,
            predecessors: 0,
            on_completion: Vec::new(),
            on_submit: Vec::new(),
        });
        self.keys.insert((editor.id(), id), idx);

        for predecessor_id in completion {
            match self.find_or_create_predecessor(editor_idx, predecessor_id, scope) {
                Some(predecessor) => {
                    self.drafts[predecessor].on_completion.push(idx);
                    self.drafts[idx].predecessors += 1;
                }
                None => debug!(
                    editor = %editor.id(),
                    pass_id = %id,
                    predecessor = %predecessor_id,
                    "completion predecessor not found; ignoring"
                ),
            }
        }

        for predecessor_id in starting {
            match self.find_or_create_predecessor(editor_idx, predecessor_id, scope) {
                Some(predecessor) => {
                    self.drafts[predecessor].on_submit.push(idx);
                    self.drafts[idx].predecessors += 1;
                }
                None => debug!(
                    editor = %editor.id(),
                    pass_id = %id,
                    predecessor = %predecessor_id,
                    "starting predecessor not found; ignoring"
                ),
            }
        }

        if self.drafts[idx].predecessors == 0 {
            self.free.push(idx);
        } else {
            self.dependent.push(idx);
        }

        if run_intentions && editor.is_text_editor() {
            if let Some(work) = self.host.intentions_pass(&editor) {
                let meta = PassMeta {
                    id: self.ids.next(),
                    completion_predecessors: vec![id],
                    starting_predecessors: Vec::new(),
                    document: editor.document(),
                    run_intention_pass_after: false,
                };
                let intentions = TextPass::new(meta, work).with_origin(PassOrigin::Intentions);
                self.create_node(editor_idx, intentions, scope);
            }
        }

        idx
    }

    fn finish(self) -> PassGraph {
        let editors = self.editors;
        let nodes = self
            .drafts
            .into_iter()
            .map(|draft| {
                ScheduledNode::new(
                    editors[draft.editor_idx].handle.clone(),
                    draft.pass,
                    draft.predecessors,
                    draft.on_completion,
                    draft.on_submit,
                )
            })
            .collect();
        PassGraph::new(nodes, self.free, self.dependent, self.keys)
    }
}
