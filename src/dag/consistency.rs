// src/dag/consistency.rs

//! Shadow run of a freshly built graph.
//!
//! Starting from the free nodes, every successor edge releases one shadow
//! predecessor; a node whose shadow counter hits zero is walked in turn.
//! A well-formed graph ends with every node visited and every counter at
//! zero. The walk is keyed by node index, so it does not care how pass IDs
//! of different editors or generated passes interleave.

use std::collections::HashMap;

use crate::dag::graph::PassGraph;
use crate::dag::node::NodeIdx;
use crate::errors::{PassdagError, Result};

pub fn check_consistency(graph: &PassGraph) -> Result<()> {
    let total = graph.len();
    let listed = graph.free_nodes().len() + graph.dependent_nodes().len();
    if listed != total {
        return Err(inconsistent(format!(
            "{listed} nodes classified as free/dependent but {total} created"
        )));
    }

    let mut remaining: HashMap<NodeIdx, usize> = HashMap::with_capacity(total);
    let mut stack: Vec<NodeIdx> = Vec::new();

    for &idx in graph.free_nodes() {
        let node = graph.node(idx);
        if node.predecessor_count() != 0 {
            return Err(inconsistent(format!(
                "free node {node} has {} predecessors",
                node.predecessor_count()
            )));
        }
        if remaining.insert(idx, 0).is_some() {
            return Err(inconsistent(format!("node {node} listed as free twice")));
        }
        stack.push(idx);
    }

    while let Some(idx) = stack.pop() {
        let node = graph.node(idx);
        for &succ in node
            .successors_on_completion()
            .iter()
            .chain(node.successors_on_submit())
        {
            let left = remaining
                .entry(succ)
                .or_insert_with(|| graph.node(succ).predecessor_count());
            if *left == 0 {
                return Err(inconsistent(format!(
                    "{} is released more often than it has predecessors (by {node})",
                    graph.node(succ)
                )));
            }
            *left -= 1;
            if *left == 0 {
                stack.push(succ);
            }
        }
    }

    if let Some((&idx, &left)) = remaining.iter().find(|&(_, &left)| left != 0) {
        return Err(stuck(graph, idx, left));
    }

    if remaining.len() != total {
        let unreachable = (0..total)
            .find(|idx| !remaining.contains_key(idx))
            .map(|idx| graph.node(idx).to_string())
            .unwrap_or_default();
        return Err(inconsistent(with_cycle(
            graph,
            format!(
                "{} of {total} nodes are unreachable from the free set (e.g. {unreachable})",
                total - remaining.len()
            ),
        )));
    }

    Ok(())
}

fn stuck(graph: &PassGraph, idx: NodeIdx, left: usize) -> PassdagError {
    inconsistent(with_cycle(
        graph,
        format!(
            "{} never becomes ready ({left} predecessors never release it)",
            graph.node(idx)
        ),
    ))
}

fn with_cycle(graph: &PassGraph, message: String) -> String {
    match graph.find_cycle() {
        Some(idx) => format!("{message}; cycle through {}", graph.node(idx)),
        None => message,
    }
}

fn inconsistent(message: String) -> PassdagError {
    PassdagError::InconsistentGraph(message)
}
