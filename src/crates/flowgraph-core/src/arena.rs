//! Indexed store of nodes and edges
//!
//! [`GraphArena`] holds every node of a graph hierarchy in one flat map —
//! a node's `parent` field is the subgraph structure — plus the ordered edge
//! list and two adjacency indices keyed by `(node, port)`, so incoming and
//! outgoing lookups are amortized O(1).
//!
//! Edge admission enforces the wiring invariants:
//!
//! - a data input port accepts at most one incoming data edge (control
//!   inputs are activation unions and may be driven by many edges),
//! - an edge's class is the function of its source port, and both endpoint
//!   functions must agree,
//! - both endpoints must resolve to the same subgraph scope. Tunneling
//!   ports have two faces: seen from outside, a tunnel belongs to the
//!   subgraph's parent scope; seen from inside, to the subgraph itself.
//!
//! The traversal helpers walk one producer/consumer hop while relaying
//! transparently through tunnel ports, which is what dependency resolution
//! and value propagation need.

use crate::error::{GraphError, Result};
use crate::node::{Node, NodeId};
use crate::port::{Port, PortDirection, PortFunction};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Class of an edge, inferred from the function of its source port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeClass {
    Data,
    Control,
}

/// Directed connection between two ports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeId,
    pub from_port: String,
    pub to: NodeId,
    pub to_port: String,
    pub class: EdgeClass,
}

/// A `(node, port)` address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRef {
    pub node: NodeId,
    pub port: String,
}

impl PortRef {
    pub fn new(node: impl Into<NodeId>, port: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            port: port.into(),
        }
    }
}

impl std::fmt::Display for PortRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.node, self.port)
    }
}

/// Which bag of a node a port was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PortSide {
    Input,
    Output,
}

/// Indexed collection of nodes and edges for one graph hierarchy.
#[derive(Default)]
pub struct GraphArena {
    nodes: HashMap<NodeId, Node>,
    edges: Vec<Edge>,
    incoming: HashMap<(NodeId, String), Vec<usize>>,
    outgoing: HashMap<(NodeId, String), Vec<usize>>,
}

impl std::fmt::Debug for GraphArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphArena")
            .field("nodes", &self.nodes.len())
            .field("edges", &self.edges.len())
            .finish()
    }
}

impl GraphArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether a node id exists.
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Iterate over all nodes, unordered.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// All node ids, sorted for deterministic iteration.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// The ordered edge list.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Look up a node.
    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Mutable node lookup.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Look up a node, failing with `NotFound`.
    pub fn node(&self, id: &str) -> Result<&Node> {
        self.nodes
            .get(id)
            .ok_or_else(|| GraphError::NotFound(id.to_string()))
    }

    /// Mutable lookup, failing with `NotFound`.
    pub fn node_mut(&mut self, id: &str) -> Result<&mut Node> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| GraphError::NotFound(id.to_string()))
    }

    /// Insert a node. Fails with `DuplicateId` if the id exists and with
    /// `NotFound` if the declared parent does not.
    pub fn insert_node(&mut self, node: Node) -> Result<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::DuplicateId(node.id));
        }
        if let Some(parent) = &node.parent {
            if !self.nodes.contains_key(parent) {
                return Err(GraphError::NotFound(parent.clone()));
            }
        }
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Remove a node, dropping every edge touching it.
    pub fn remove_node(&mut self, id: &str) -> Result<Node> {
        let node = self
            .nodes
            .remove(id)
            .ok_or_else(|| GraphError::NotFound(id.to_string()))?;
        self.edges.retain(|e| e.from != id && e.to != id);
        self.rebuild_indices();
        Ok(node)
    }

    /// Insert an edge, enforcing the wiring invariants.
    pub fn insert_edge(
        &mut self,
        from: &str,
        from_port: &str,
        to: &str,
        to_port: &str,
    ) -> Result<()> {
        let reject = |reason: &str| -> GraphError {
            GraphError::edge_rejected(from, from_port, to, to_port, reason)
        };

        let from_node = self.node(from)?;
        let to_node = self.node(to)?;

        let (source, source_side) = Self::find_port(from_node, from_port)
            .ok_or_else(|| reject("source port does not exist"))?;
        let (sink, sink_side) = Self::find_port(to_node, to_port)
            .ok_or_else(|| reject("target port does not exist"))?;

        // A port drives edges when it is an output, or a tunnel addressed
        // from inside its subgraph; it accepts edges when it is an input,
        // or a tunnel addressed from inside.
        let source_ok = match (source_side, source.direction) {
            (PortSide::Output, PortDirection::Out | PortDirection::InOut) => true,
            (PortSide::Input, PortDirection::InOut) => true,
            _ => false,
        };
        if !source_ok {
            return Err(reject("source port is not an output"));
        }
        let sink_ok = match (sink_side, sink.direction) {
            (PortSide::Input, PortDirection::In | PortDirection::InOut) => true,
            (PortSide::Output, PortDirection::InOut) => true,
            _ => false,
        };
        if !sink_ok {
            return Err(reject("target port is not an input"));
        }

        if source.function != sink.function {
            return Err(reject("port functions disagree"));
        }
        let class = match source.function {
            PortFunction::Data => EdgeClass::Data,
            PortFunction::Control => EdgeClass::Control,
        };

        let source_scope = Self::port_scope(from_node, source, source_side, true);
        let sink_scope = Self::port_scope(to_node, sink, sink_side, false);
        if source_scope != sink_scope {
            return Err(reject("endpoints are in different subgraph scopes"));
        }

        if class == EdgeClass::Data {
            let already_driven = self
                .incoming_indices(to, to_port)
                .iter()
                .any(|&i| self.edges[i].class == EdgeClass::Data);
            if already_driven {
                return Err(reject("data input is already driven"));
            }
        }

        let index = self.edges.len();
        self.edges.push(Edge {
            from: from.to_string(),
            from_port: from_port.to_string(),
            to: to.to_string(),
            to_port: to_port.to_string(),
            class,
        });
        self.outgoing
            .entry((from.to_string(), from_port.to_string()))
            .or_default()
            .push(index);
        self.incoming
            .entry((to.to_string(), to_port.to_string()))
            .or_default()
            .push(index);
        Ok(())
    }

    /// Edges ending at `(node, port)`, in insertion order.
    pub fn edges_incoming(&self, node: &str, port: &str) -> Vec<&Edge> {
        self.incoming_indices(node, port)
            .iter()
            .map(|&i| &self.edges[i])
            .collect()
    }

    /// Edges starting at `(node, port)`, in insertion order.
    pub fn edges_outgoing(&self, node: &str, port: &str) -> Vec<&Edge> {
        self.outgoing_indices(node, port)
            .iter()
            .map(|&i| &self.edges[i])
            .collect()
    }

    /// Absolute path of a node: subgraphs chain with `/`, a leaf is
    /// appended to its parent subgraph with `:`.
    pub fn node_path(&self, id: &str) -> Result<String> {
        let node = self.node(id)?;
        let mut chain = Vec::new();
        let mut current = if node.is_subgraph() {
            Some(node)
        } else {
            match &node.parent {
                Some(parent) => Some(self.node(parent)?),
                None => None,
            }
        };
        let mut seen = HashSet::new();
        while let Some(sub) = current {
            if !seen.insert(sub.id.clone()) {
                return Err(GraphError::invalid_path(id, "parent chain is cyclic"));
            }
            chain.push(sub.name.clone());
            current = match &sub.parent {
                Some(parent) => Some(self.node(parent)?),
                None => None,
            };
        }
        chain.reverse();
        let base = format!("/{}", chain.join("/"));
        if node.is_subgraph() {
            Ok(base)
        } else {
            Ok(format!("{}:{}", base, node.name))
        }
    }

    /// Resolve an absolute path (`/root/sub:leaf`) to a node id.
    pub fn resolve_path(&self, path: &str) -> Result<NodeId> {
        let invalid = |reason: &str| GraphError::invalid_path(path, reason);

        let rest = path
            .strip_prefix('/')
            .ok_or_else(|| invalid("must start with '/'"))?;
        if rest.is_empty() {
            return Err(invalid("empty path"));
        }

        let mut segments: Vec<&str> = rest.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(invalid("empty segment"));
        }
        let last = segments.pop().unwrap_or_default();
        let (last_sub, leaf) = match last.split_once(':') {
            Some((sub, leaf)) => {
                if sub.is_empty() || leaf.is_empty() {
                    return Err(invalid("empty segment around ':'"));
                }
                (sub, Some(leaf))
            }
            None => (last, None),
        };
        segments.push(last_sub);

        let mut current = self
            .root_subgraph_named(segments[0])
            .ok_or_else(|| GraphError::NotFound(segments[0].to_string()))?;
        for segment in &segments[1..] {
            current = self
                .child_by_name(&current, segment, true)
                .ok_or_else(|| GraphError::NotFound((*segment).to_string()))?;
        }
        match leaf {
            Some(name) => self
                .child_by_name(&current, name, false)
                .ok_or_else(|| GraphError::NotFound(name.to_string())),
            None => Ok(current),
        }
    }

    /// Walk upstream from a port, crossing tunnels transparently.
    ///
    /// With `include_tunnel = false` the result holds only terminal leaf
    /// ports; with `true`, intermediate tunnel ports appear as well, in
    /// visit order.
    pub fn upstream_ports(&self, at: &PortRef, include_tunnel: bool) -> Result<Vec<PortRef>> {
        self.node(&at.node)?;
        let mut acc = Vec::new();
        let mut seen = HashSet::new();
        self.walk(at, include_tunnel, true, &mut acc, &mut seen);
        Ok(acc)
    }

    /// Walk downstream from a port, crossing tunnels transparently.
    pub fn downstream_ports(&self, at: &PortRef, include_tunnel: bool) -> Result<Vec<PortRef>> {
        self.node(&at.node)?;
        let mut acc = Vec::new();
        let mut seen = HashSet::new();
        self.walk(at, include_tunnel, false, &mut acc, &mut seen);
        Ok(acc)
    }

    fn walk(
        &self,
        at: &PortRef,
        include_tunnel: bool,
        upstream: bool,
        acc: &mut Vec<PortRef>,
        seen: &mut HashSet<PortRef>,
    ) {
        let indices = if upstream {
            self.incoming_indices(&at.node, &at.port)
        } else {
            self.outgoing_indices(&at.node, &at.port)
        };
        for &i in indices {
            let edge = &self.edges[i];
            let next = if upstream {
                PortRef::new(edge.from.clone(), edge.from_port.clone())
            } else {
                PortRef::new(edge.to.clone(), edge.to_port.clone())
            };
            if !seen.insert(next.clone()) {
                continue;
            }
            let is_tunnel = self
                .get(&next.node)
                .and_then(|n| n.port(&next.port))
                .map(Port::is_tunnel)
                .unwrap_or(false);
            if is_tunnel {
                if include_tunnel {
                    acc.push(next.clone());
                }
                self.walk(&next, include_tunnel, upstream, acc, seen);
            } else {
                acc.push(next);
            }
        }
    }

    fn incoming_indices(&self, node: &str, port: &str) -> &[usize] {
        self.incoming
            .get(&(node.to_string(), port.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn outgoing_indices(&self, node: &str, port: &str) -> &[usize] {
        self.outgoing
            .get(&(node.to_string(), port.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn rebuild_indices(&mut self) {
        self.incoming.clear();
        self.outgoing.clear();
        for (i, edge) in self.edges.iter().enumerate() {
            self.outgoing
                .entry((edge.from.clone(), edge.from_port.clone()))
                .or_default()
                .push(i);
            self.incoming
                .entry((edge.to.clone(), edge.to_port.clone()))
                .or_default()
                .push(i);
        }
    }

    fn find_port<'a>(node: &'a Node, name: &str) -> Option<(&'a Port, PortSide)> {
        if let Some(port) = node.inputs.get(name) {
            return Some((port, PortSide::Input));
        }
        node.outputs.get(name).map(|p| (p, PortSide::Output))
    }

    /// Scope a port endpoint belongs to for edge admission. Tunnels have an
    /// outer face (the parent scope) and an inner face (the subgraph
    /// itself); which face applies depends on the port's bag and the role
    /// it plays in the edge.
    fn port_scope(
        node: &Node,
        port: &Port,
        side: PortSide,
        as_source: bool,
    ) -> Option<NodeId> {
        if port.direction == PortDirection::InOut {
            match (side, as_source) {
                // Tunnel-in driving inner children, or tunnel-out driven by
                // inner children: the inner face.
                (PortSide::Input, true) | (PortSide::Output, false) => Some(node.id.clone()),
                // Tunnel-in driven from outside, or tunnel-out driving
                // outer consumers: the outer face.
                _ => node.parent.clone(),
            }
        } else {
            node.parent.clone()
        }
    }

    fn root_subgraph_named(&self, name: &str) -> Option<NodeId> {
        let mut matches: Vec<&Node> = self
            .nodes
            .values()
            .filter(|n| n.parent.is_none() && n.is_subgraph() && n.name == name)
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        matches.first().map(|n| n.id.clone())
    }

    fn child_by_name(&self, parent: &str, name: &str, subgraph_only: bool) -> Option<NodeId> {
        let mut matches: Vec<&Node> = self
            .nodes
            .values()
            .filter(|n| {
                n.parent.as_deref() == Some(parent)
                    && n.name == name
                    && (!subgraph_only || n.is_subgraph())
            })
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        matches.first().map(|n| n.id.clone())
    }
}
