//! Raw graph storage and read-only transactions.
//!
//! The store holds untyped nodes and relationships tagged with a kind string
//! and a property map, the way a general-purpose graph database would. Typed
//! views are produced by [`super::GraphNode::decode`] and
//! [`super::Relationship::decode`].

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDate;
use tracing::trace;

use super::DecodeError;

/// Dense identifier of a node in the store.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Dense identifier of a relationship in the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct RelationshipId(pub u32);

impl fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A stored property value.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum PropertyValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    Dates(Vec<NaiveDate>),
}

pub type Properties = BTreeMap<String, PropertyValue>;

/// An untyped node: a kind tag plus properties.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RawNode {
    pub kind: String,
    pub properties: Properties,
}

impl RawNode {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            properties: Properties::new(),
        }
    }

    pub fn with(mut self, key: &str, value: PropertyValue) -> Self {
        self.properties.insert(key.to_string(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }
}

/// An untyped directed relationship with a traversal cost in minutes.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RawRelationship {
    pub kind: String,
    pub start: NodeId,
    pub end: NodeId,
    pub cost: u32,
    pub properties: Properties,
}

/// In-memory graph store.
///
/// Mutated only while the graph is built; read through [`GraphTransaction`]s
/// afterwards. Counts raw node reads so callers can observe caching.
#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct GraphStore {
    nodes: Vec<RawNode>,
    relationships: Vec<RawRelationship>,
    outgoing: Vec<Vec<RelationshipId>>,
    #[serde(skip)]
    node_reads: AtomicU64,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node and return its id.
    pub fn create_node(&mut self, node: RawNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        self.outgoing.push(Vec::new());
        id
    }

    /// Add a relationship between two existing nodes.
    pub fn create_relationship(
        &mut self,
        kind: &str,
        start: NodeId,
        end: NodeId,
        cost: u32,
        properties: Properties,
    ) -> Result<RelationshipId, DecodeError> {
        for id in [start, end] {
            if id.0 as usize >= self.nodes.len() {
                return Err(DecodeError::UnknownNode(id));
            }
        }
        let id = RelationshipId(self.relationships.len() as u32);
        self.relationships.push(RawRelationship {
            kind: kind.to_string(),
            start,
            end,
            cost,
            properties,
        });
        self.outgoing[start.0 as usize].push(id);
        Ok(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    /// Number of raw node reads served since the store was created or loaded.
    pub fn node_reads(&self) -> u64 {
        self.node_reads.load(Ordering::Relaxed)
    }

    /// Open a read-only view of the store.
    pub fn begin_read(&self) -> GraphTransaction<'_> {
        trace!(nodes = self.nodes.len(), "opening read transaction");
        GraphTransaction {
            store: self,
            overlay_nodes: Vec::new(),
            overlay_relationships: Vec::new(),
            overlay_outgoing: HashMap::new(),
        }
    }

    fn raw_node(&self, id: NodeId) -> Option<&RawNode> {
        let node = self.nodes.get(id.0 as usize)?;
        self.node_reads.fetch_add(1, Ordering::Relaxed);
        Some(node)
    }
}

/// A read-only view over a [`GraphStore`].
///
/// Per-search synthetic nodes (ad-hoc query positions) and their walk
/// relationships live in an overlay owned by the transaction; the shared
/// store is never modified. Overlay ids follow on from the store's ids and
/// are only meaningful within this transaction.
pub struct GraphTransaction<'a> {
    store: &'a GraphStore,
    overlay_nodes: Vec<RawNode>,
    overlay_relationships: Vec<RawRelationship>,
    overlay_outgoing: HashMap<NodeId, Vec<RelationshipId>>,
}

impl<'a> GraphTransaction<'a> {
    pub fn store(&self) -> &'a GraphStore {
        self.store
    }

    /// True if `id` names a node created in this transaction's overlay.
    pub fn is_overlay(&self, id: NodeId) -> bool {
        id.0 as usize >= self.store.nodes.len()
    }

    /// Read a raw node.
    pub fn node(&self, id: NodeId) -> Result<&RawNode, DecodeError> {
        let found = if self.is_overlay(id) {
            self.overlay_nodes.get(id.0 as usize - self.store.nodes.len())
        } else {
            self.store.raw_node(id)
        };
        found.ok_or(DecodeError::UnknownNode(id))
    }

    /// Read a raw relationship.
    pub fn relationship(&self, id: RelationshipId) -> Result<&RawRelationship, DecodeError> {
        let stored = self.store.relationships.len();
        let found = if (id.0 as usize) < stored {
            self.store.relationships.get(id.0 as usize)
        } else {
            self.overlay_relationships.get(id.0 as usize - stored)
        };
        found.ok_or(DecodeError::UnknownRelationship(id))
    }

    /// Ids of relationships leaving `id`, stored ones first.
    pub fn relationships_from(&self, id: NodeId) -> Vec<RelationshipId> {
        let mut ids = self
            .store
            .outgoing
            .get(id.0 as usize)
            .cloned()
            .unwrap_or_default();
        if let Some(extra) = self.overlay_outgoing.get(&id) {
            ids.extend(extra.iter().copied());
        }
        ids
    }

    /// Add a synthetic node visible only to this transaction.
    pub fn create_overlay_node(&mut self, node: RawNode) -> NodeId {
        let id = NodeId((self.store.nodes.len() + self.overlay_nodes.len()) as u32);
        self.overlay_nodes.push(node);
        id
    }

    /// Add a relationship visible only to this transaction.
    pub fn create_overlay_relationship(
        &mut self,
        kind: &str,
        start: NodeId,
        end: NodeId,
        cost: u32,
    ) -> Result<RelationshipId, DecodeError> {
        let total = self.store.nodes.len() + self.overlay_nodes.len();
        for node in [start, end] {
            if node.0 as usize >= total {
                return Err(DecodeError::UnknownNode(node));
            }
        }
        let id = RelationshipId(
            (self.store.relationships.len() + self.overlay_relationships.len()) as u32,
        );
        self.overlay_relationships.push(RawRelationship {
            kind: kind.to_string(),
            start,
            end,
            cost,
            properties: Properties::new(),
        });
        self.overlay_outgoing.entry(start).or_default().push(id);
        Ok(id)
    }
}

impl Drop for GraphTransaction<'_> {
    fn drop(&mut self) {
        trace!(
            overlay_nodes = self.overlay_nodes.len(),
            "closing read transaction"
        );
    }
}
