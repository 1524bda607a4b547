// src/dag/graph.rs

use std::collections::HashMap;
use std::fmt;

use petgraph::algo::toposort;
use petgraph::dot::Dot;
use petgraph::graph::{Graph, NodeIndex};
use petgraph::graphmap::DiGraphMap;

use crate::dag::node::{NodeIdx, ScheduledNode};
use crate::errors::Result;
use crate::types::{EditorId, PassId};

/// Kind of a predecessor edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Successor waits for the predecessor's apply phase.
    Completion,
    /// Successor waits for the predecessor's collect phase to start.
    Submit,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeKind::Completion => f.write_str("completion"),
            EdgeKind::Submit => f.write_str("submit"),
        }
    }
}

/// The wired dependency graph of one round.
///
/// Built by [`crate::dag::GraphBuilder`]; immutable apart from the per-node
/// counters and phases.
#[derive(Debug)]
pub struct PassGraph {
    nodes: Vec<ScheduledNode>,
    free: Vec<NodeIdx>,
    dependent: Vec<NodeIdx>,
    keys: HashMap<(EditorId, PassId), NodeIdx>,
}

impl PassGraph {
    pub(crate) fn new(
        nodes: Vec<ScheduledNode>,
        free: Vec<NodeIdx>,
        dependent: Vec<NodeIdx>,
        keys: HashMap<(EditorId, PassId), NodeIdx>,
    ) -> Self {
        Self {
            nodes,
            free,
            dependent,
            keys,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[ScheduledNode] {
        &self.nodes
    }

    pub fn node(&self, idx: NodeIdx) -> &ScheduledNode {
        &self.nodes[idx]
    }

    /// Nodes with no predecessors; submitted as soon as the round starts.
    pub fn free_nodes(&self) -> &[NodeIdx] {
        &self.free
    }

    /// Nodes waiting on at least one predecessor.
    pub fn dependent_nodes(&self) -> &[NodeIdx] {
        &self.dependent
    }

    pub fn find(&self, editor: EditorId, pass: PassId) -> Option<NodeIdx> {
        self.keys.get(&(editor, pass)).copied()
    }

    /// Assert every node becomes ready exactly once when the graph is run.
    ///
    /// Only meaningful before the round starts.
    pub fn check_consistency(&self) -> Result<()> {
        crate::dag::consistency::check_consistency(self)
    }

    /// All predecessor edges as `(predecessor, successor, kind)`.
    pub fn edges(&self) -> impl Iterator<Item = (NodeIdx, NodeIdx, EdgeKind)> + '_ {
        self.nodes.iter().enumerate().flat_map(|(idx, node)| {
            node.successors_on_completion()
                .iter()
                .map(move |&succ| (idx, succ, EdgeKind::Completion))
                .chain(
                    node.successors_on_submit()
                        .iter()
                        .map(move |&succ| (idx, succ, EdgeKind::Submit)),
                )
        })
    }

    /// A node that sits on a predecessor cycle, if there is one.
    pub fn find_cycle(&self) -> Option<NodeIdx> {
        let mut graph: DiGraphMap<NodeIdx, EdgeKind> = DiGraphMap::new();
        for idx in 0..self.nodes.len() {
            graph.add_node(idx);
        }
        for (from, to, kind) in self.edges() {
            graph.add_edge(from, to, kind);
        }
        toposort(&graph, None).err().map(|cycle| cycle.node_id())
    }

    /// Graphviz rendering, used by `--dry-run`.
    pub fn to_dot(&self) -> String {
        let mut graph: Graph<String, EdgeKind> = Graph::with_capacity(self.nodes.len(), 0);
        for node in &self.nodes {
            graph.add_node(format!("{} {} {}", node.editor().id(), node.pass_id(), node.name()));
        }
        for (from, to, kind) in self.edges() {
            graph.add_edge(NodeIndex::new(from), NodeIndex::new(to), kind);
        }
        let node_style = |_, (idx, _): (NodeIndex, &String)| {
            let style = if self.free.contains(&idx.index()) { "bold" } else { "solid" };
            format!("style={style}")
        };
        Dot::with_attr_getters(&graph, &[], &|_, _| String::new(), &node_style).to_string()
    }
}
