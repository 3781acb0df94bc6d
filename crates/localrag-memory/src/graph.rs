use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use localrag_core::traits::GraphStore;
use localrag_core::types::{GraphEdge, GraphNode, GraphSnapshot, NodeId, NodeMembership, PassageId};

/// Adjacency-indexed graph of nodes, typed edges and passage memberships.
#[derive(Debug, Clone, Default)]
pub struct MemoryGraph {
    nodes: BTreeMap<NodeId, GraphNode>,
    edges: Vec<GraphEdge>,
    outgoing: BTreeMap<NodeId, BTreeSet<NodeId>>,
    passages_by_node: BTreeMap<NodeId, BTreeSet<PassageId>>,
    nodes_by_passage: BTreeMap<PassageId, BTreeSet<NodeId>>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: GraphSnapshot) -> Self {
        let mut graph = Self::new();
        for node in snapshot.nodes {
            graph.add_node(node);
        }
        for edge in snapshot.edges {
            graph.add_edge(edge);
        }
        for m in snapshot.memberships {
            graph.add_membership(&m.node_id, &m.passage_id);
        }
        graph
    }

    pub fn to_snapshot(&self) -> GraphSnapshot {
        let memberships = self
            .passages_by_node
            .iter()
            .flat_map(|(node, passages)| {
                passages.iter().map(move |p| NodeMembership { node_id: node.clone(), passage_id: p.clone() })
            })
            .collect();
        GraphSnapshot { nodes: self.nodes.values().cloned().collect(), edges: self.edges.clone(), memberships }
    }

    /// Read a JSON snapshot. A missing file yields an empty graph.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "graph file not found; graph expansion will add nothing");
            return Ok(Self::new());
        }
        let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let snapshot: GraphSnapshot =
            serde_json::from_str(&raw).with_context(|| format!("parsing graph snapshot {}", path.display()))?;
        let graph = Self::from_snapshot(snapshot);
        tracing::info!(nodes = graph.node_count(), edges = graph.edges.len(), "graph loaded");
        Ok(graph)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.to_snapshot())?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    pub fn add_node(&mut self, node: GraphNode) {
        self.nodes.insert(node.id.clone(), node);
    }

    pub fn add_edge(&mut self, edge: GraphEdge) {
        self.outgoing.entry(edge.from.clone()).or_default().insert(edge.to.clone());
        self.edges.push(edge);
    }

    pub fn add_membership(&mut self, node_id: &str, passage_id: &str) {
        self.passages_by_node.entry(node_id.to_string()).or_default().insert(passage_id.to_string());
        self.nodes_by_passage.entry(passage_id.to_string()).or_default().insert(node_id.to_string());
    }

    /// Drop every membership of `passage_id`.
    pub fn remove_passage(&mut self, passage_id: &str) {
        if let Some(nodes) = self.nodes_by_passage.remove(passage_id) {
            for node in nodes {
                if let Some(set) = self.passages_by_node.get_mut(&node) {
                    set.remove(passage_id);
                }
            }
        }
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes_of(&self, passage_ids: &[PassageId]) -> Vec<NodeId> {
        let set: BTreeSet<&NodeId> =
            passage_ids.iter().filter_map(|p| self.nodes_by_passage.get(p)).flatten().collect();
        set.into_iter().cloned().collect()
    }

    pub fn neighbors_of(&self, node_ids: &[NodeId]) -> Vec<NodeId> {
        let set: BTreeSet<&NodeId> = node_ids.iter().filter_map(|n| self.outgoing.get(n)).flatten().collect();
        set.into_iter().cloned().collect()
    }

    pub fn passages_of(&self, node_ids: &[NodeId], exclude: &[PassageId], limit: usize) -> Vec<PassageId> {
        let exclude: BTreeSet<&PassageId> = exclude.iter().collect();
        let set: BTreeSet<&PassageId> = node_ids
            .iter()
            .filter_map(|n| self.passages_by_node.get(n))
            .flatten()
            .filter(|p| !exclude.contains(p))
            .collect();
        set.into_iter().take(limit).cloned().collect()
    }
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn nodes_for_passages(&self, passage_ids: &[PassageId]) -> Result<Vec<NodeId>> {
        Ok(self.nodes_of(passage_ids))
    }

    async fn outgoing_neighbors(&self, node_ids: &[NodeId]) -> Result<Vec<NodeId>> {
        Ok(self.neighbors_of(node_ids))
    }

    async fn passages_for_nodes(&self, node_ids: &[NodeId], exclude: &[PassageId], limit: usize) -> Result<Vec<PassageId>> {
        Ok(self.passages_of(node_ids, exclude, limit))
    }
}
