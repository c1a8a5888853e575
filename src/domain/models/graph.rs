//! Pipeline graph model.
//!
//! Nodes are placed agent instances kept in an arena keyed by id; edges are
//! directed data dependencies whose ports are validated against the agent
//! catalog. Cycles are allowed structurally and reported through
//! [`Graph::find_cycle`] / [`Graph::topological_order`].

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::agent::AgentCatalog;
use crate::domain::errors::{GraphError, PortDirection};

/// Canvas position of a node. Opaque to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A placed instance of an agent definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    pub agent_ref: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Directed arc from an output port to an input port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub id: String,
    pub source_node_id: String,
    pub source_port: String,
    pub target_node_id: String,
    pub target_port: String,
}

impl GraphEdge {
    fn same_endpoints(&self, other: &Self) -> bool {
        self.source_node_id == other.source_node_id
            && self.source_port == other.source_port
            && self.target_node_id == other.target_node_id
            && self.target_port == other.target_port
    }

    fn touches(&self, node_id: &str) -> bool {
        self.source_node_id == node_id || self.target_node_id == node_id
    }
}

/// Serialized form of a graph: nodes in placement order plus edges.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphDocument {
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}

/// A pipeline under construction.
#[derive(Debug, Clone)]
pub struct Graph {
    catalog: Arc<AgentCatalog>,
    nodes: HashMap<String, GraphNode>,
    /// Node ids in placement order; drives deterministic traversal.
    order: Vec<String>,
    edges: Vec<GraphEdge>,
    next_node: u64,
    next_edge: u64,
}

impl Graph {
    pub fn new(catalog: Arc<AgentCatalog>) -> Self {
        Self {
            catalog,
            nodes: HashMap::new(),
            order: Vec::new(),
            edges: Vec::new(),
            next_node: 1,
            next_edge: 1,
        }
    }

    /// Rebuild a graph from its document, re-validating every node and edge
    /// against the catalog.
    pub fn from_document(doc: GraphDocument, catalog: Arc<AgentCatalog>) -> Result<Self, GraphError> {
        let mut graph = Self::new(catalog);
        for node in doc.nodes {
            if graph.catalog.agent(&node.agent_ref).is_none() {
                return Err(GraphError::AgentNotFound(node.agent_ref));
            }
            if graph.nodes.contains_key(&node.id) {
                return Err(GraphError::DuplicateNode(node.id));
            }
            graph.order.push(node.id.clone());
            graph.nodes.insert(node.id.clone(), node);
        }
        for edge in doc.edges {
            graph.validate_edge(&edge)?;
            graph.edges.push(edge);
        }
        Ok(graph)
    }

    pub fn to_document(&self) -> GraphDocument {
        GraphDocument {
            nodes: self.nodes().cloned().collect(),
            edges: self.edges.clone(),
        }
    }

    pub fn catalog(&self) -> &AgentCatalog {
        &self.catalog
    }

    /// Nodes in placement order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn node_count(&self) -> usize {
        self.order.len()
    }

    pub fn add_node(&mut self, agent_ref: &str, position: Position) -> Result<GraphNode, GraphError> {
        if self.catalog.agent(agent_ref).is_none() {
            return Err(GraphError::AgentNotFound(agent_ref.to_string()));
        }

        let id = loop {
            let candidate = format!("node-{}", self.next_node);
            self.next_node += 1;
            if !self.nodes.contains_key(&candidate) {
                break candidate;
            }
        };

        let node = GraphNode {
            id: id.clone(),
            agent_ref: agent_ref.to_string(),
            position,
            label: None,
            description: None,
        };
        self.order.push(id.clone());
        self.nodes.insert(id, node.clone());
        tracing::debug!(node_id = %node.id, agent = agent_ref, "node added");
        Ok(node)
    }

    /// Remove a node and every edge touching it.
    pub fn remove_node(&mut self, id: &str) -> Result<GraphNode, GraphError> {
        let node = self
            .nodes
            .remove(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;
        self.order.retain(|n| n != id);
        let before = self.edges.len();
        self.edges.retain(|e| !e.touches(id));
        tracing::debug!(
            node_id = id,
            edges_removed = before - self.edges.len(),
            "node removed"
        );
        Ok(node)
    }

    pub fn set_label(&mut self, id: &str, label: Option<String>) -> Result<(), GraphError> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;
        node.label = label;
        Ok(())
    }

    pub fn set_description(&mut self, id: &str, description: Option<String>) -> Result<(), GraphError> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;
        node.description = description;
        Ok(())
    }

    pub fn connect(
        &mut self,
        source_node_id: &str,
        source_port: &str,
        target_node_id: &str,
        target_port: &str,
    ) -> Result<GraphEdge, GraphError> {
        let mut edge = GraphEdge {
            id: String::new(),
            source_node_id: source_node_id.to_string(),
            source_port: source_port.to_string(),
            target_node_id: target_node_id.to_string(),
            target_port: target_port.to_string(),
        };
        self.validate_edge(&edge)?;

        edge.id = loop {
            let candidate = format!("edge-{}", self.next_edge);
            self.next_edge += 1;
            if !self.edges.iter().any(|e| e.id == candidate) {
                break candidate;
            }
        };
        self.edges.push(edge.clone());
        tracing::debug!(
            edge_id = %edge.id,
            from = %format!("{}.{}", source_node_id, source_port),
            to = %format!("{}.{}", target_node_id, target_port),
            "nodes connected"
        );
        Ok(edge)
    }

    pub fn disconnect(&mut self, edge_id: &str) -> Result<GraphEdge, GraphError> {
        let idx = self
            .edges
            .iter()
            .position(|e| e.id == edge_id)
            .ok_or_else(|| GraphError::EdgeNotFound(edge_id.to_string()))?;
        Ok(self.edges.remove(idx))
    }

    fn validate_edge(&self, edge: &GraphEdge) -> Result<(), GraphError> {
        if edge.source_node_id == edge.target_node_id {
            return Err(GraphError::SelfLoop(edge.source_node_id.clone()));
        }

        let source = self
            .nodes
            .get(&edge.source_node_id)
            .ok_or_else(|| GraphError::NodeNotFound(edge.source_node_id.clone()))?;
        let target = self
            .nodes
            .get(&edge.target_node_id)
            .ok_or_else(|| GraphError::NodeNotFound(edge.target_node_id.clone()))?;

        let source_def = self
            .catalog
            .agent(&source.agent_ref)
            .ok_or_else(|| GraphError::AgentNotFound(source.agent_ref.clone()))?;
        if !source_def.has_output(&edge.source_port) {
            return Err(GraphError::InvalidPort {
                node_id: source.id.clone(),
                port: edge.source_port.clone(),
                direction: PortDirection::Output,
            });
        }

        let target_def = self
            .catalog
            .agent(&target.agent_ref)
            .ok_or_else(|| GraphError::AgentNotFound(target.agent_ref.clone()))?;
        if !target_def.has_input(&edge.target_port) {
            return Err(GraphError::InvalidPort {
                node_id: target.id.clone(),
                port: edge.target_port.clone(),
                direction: PortDirection::Input,
            });
        }

        if self.edges.iter().any(|e| e.same_endpoints(edge)) {
            return Err(GraphError::DuplicateEdge {
                source_node_id: edge.source_node_id.clone(),
                source_port: edge.source_port.clone(),
                target_node_id: edge.target_node_id.clone(),
                target_port: edge.target_port.clone(),
            });
        }

        Ok(())
    }

    fn adjacency(&self) -> HashMap<&str, Vec<&str>> {
        let mut graph: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in &self.edges {
            graph
                .entry(edge.source_node_id.as_str())
                .or_default()
                .push(edge.target_node_id.as_str());
        }
        graph
    }

    /// Linearize nodes so every edge points forward.
    ///
    /// Returns `None` when the graph contains a cycle. Ties are broken by
    /// placement order.
    pub fn topological_order(&self) -> Option<Vec<String>> {
        let graph = self.adjacency();
        let mut in_degree: HashMap<&str, usize> =
            self.order.iter().map(|id| (id.as_str(), 0)).collect();
        for edge in &self.edges {
            *in_degree.entry(edge.target_node_id.as_str()).or_insert(0) += 1;
        }

        // Kahn's algorithm
        let mut queue: VecDeque<&str> = self
            .order
            .iter()
            .map(String::as_str)
            .filter(|id| in_degree.get(id) == Some(&0))
            .collect();
        let mut sorted = Vec::with_capacity(self.order.len());

        while let Some(node_id) = queue.pop_front() {
            sorted.push(node_id.to_string());
            if let Some(neighbors) = graph.get(node_id) {
                for &neighbor in neighbors {
                    if let Some(degree) = in_degree.get_mut(neighbor) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(neighbor);
                        }
                    }
                }
            }
        }

        (sorted.len() == self.order.len()).then_some(sorted)
    }

    /// Find one cycle, returned as a closed path (`a -> b -> a`).
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let graph = self.adjacency();
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        for node_id in &self.order {
            if !visited.contains(node_id.as_str())
                && detect_cycle_util(node_id, &graph, &mut visited, &mut rec_stack, &mut path)
            {
                if let Some(first) = path.first().cloned() {
                    path.push(first);
                }
                return Some(path.into_iter().map(str::to_string).collect());
            }
        }
        None
    }

    /// Agent ids in execution order.
    ///
    /// Follows edge direction when the graph is acyclic; a cyclic graph
    /// falls back to placement order. An agent placed more than once runs
    /// once, at its first position.
    pub fn agent_sequence(&self) -> Vec<String> {
        let node_order = self.topological_order().unwrap_or_else(|| {
            tracing::warn!(
                cycle = ?self.find_cycle(),
                "graph has a cycle, executing agents in placement order"
            );
            self.order.clone()
        });

        let mut seen = HashSet::new();
        node_order
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .filter(|node| seen.insert(node.agent_ref.clone()))
            .map(|node| node.agent_ref.clone())
            .collect()
    }
}

fn detect_cycle_util<'a>(
    node: &'a str,
    graph: &HashMap<&'a str, Vec<&'a str>>,
    visited: &mut HashSet<&'a str>,
    rec_stack: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
) -> bool {
    visited.insert(node);
    rec_stack.insert(node);
    path.push(node);

    if let Some(neighbors) = graph.get(node) {
        for &neighbor in neighbors {
            if !visited.contains(neighbor) {
                if detect_cycle_util(neighbor, graph, visited, rec_stack, path) {
                    return true;
                }
            } else if rec_stack.contains(neighbor) {
                if let Some(cycle_start) = path.iter().position(|&id| id == neighbor) {
                    path.drain(0..cycle_start);
                    return true;
                }
            }
        }
    }

    rec_stack.remove(node);
    path.pop();
    false
}
