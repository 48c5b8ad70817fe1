//! Node content cache.
//!
//! Decoding a node reads the store and allocates its identifiers, and the
//! traversal asks for the same nodes over and over. The cache keeps the
//! decoded value per node id for the lifetime of the serving process.
//!
//! The graph is immutable while serving and decoding is deterministic, so
//! two threads racing to fill the same key store equal values and either
//! write may win. Overlay nodes (per-search query positions) reuse ids
//! between transactions and are never cached.
//!
//! A cache belongs to one built graph; call [`NodeContentCache::clear`]
//! after a rebuild.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use moka::sync::Cache as MokaCache;

use super::{DecodeError, GraphNode, GraphTransaction, NodeId, NodeIdentity};
use crate::domain::{RouteId, TimeOfDay, TripId};

/// Hit and miss counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Shared cache of decoded nodes.
pub struct NodeContentCache {
    nodes: MokaCache<NodeId, Arc<GraphNode>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl NodeContentCache {
    /// Create an empty, unbounded cache.
    pub fn new() -> Self {
        Self {
            nodes: MokaCache::builder().build(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Decoded node for `id`, reading the store only on first access.
    pub fn node_for(
        &self,
        tx: &GraphTransaction<'_>,
        id: NodeId,
    ) -> Result<Arc<GraphNode>, DecodeError> {
        if tx.is_overlay(id) {
            return Ok(Arc::new(GraphNode::decode(tx.node(id)?)?));
        }

        if let Some(node) = self.nodes.get(&id) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(node);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let node = Arc::new(GraphNode::decode(tx.node(id)?)?);
        self.nodes.insert(id, node.clone());
        Ok(node)
    }

    /// Identity of the entity a node stands for.
    pub fn id_for(&self, tx: &GraphTransaction<'_>, id: NodeId) -> Result<NodeIdentity, DecodeError> {
        Ok(self.node_for(tx, id)?.identity())
    }

    /// Route of a route station, boarding point, service or minute node.
    pub fn route_id_for(
        &self,
        tx: &GraphTransaction<'_>,
        id: NodeId,
    ) -> Result<RouteId, DecodeError> {
        let node = self.node_for(tx, id)?;
        node.route().cloned().ok_or(DecodeError::WrongVariant {
            expected: "route-bearing",
            found: node.kind(),
        })
    }

    /// Departure time of a minute node.
    pub fn time_for(
        &self,
        tx: &GraphTransaction<'_>,
        id: NodeId,
    ) -> Result<TimeOfDay, DecodeError> {
        match &*self.node_for(tx, id)? {
            GraphNode::Minute { time, .. } => Ok(*time),
            other => Err(DecodeError::WrongVariant {
                expected: "MINUTE",
                found: other.kind(),
            }),
        }
    }

    /// Trip of a minute node.
    pub fn trip_id_for(
        &self,
        tx: &GraphTransaction<'_>,
        id: NodeId,
    ) -> Result<TripId, DecodeError> {
        match &*self.node_for(tx, id)? {
            GraphNode::Minute { trip, .. } => Ok(trip.clone()),
            other => Err(DecodeError::WrongVariant {
                expected: "MINUTE",
                found: other.kind(),
            }),
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Approximate number of cached nodes.
    pub fn entry_count(&self) -> u64 {
        self.nodes.run_pending_tasks();
        self.nodes.entry_count()
    }

    /// Drop every entry and reset the counters.
    pub fn clear(&self) {
        self.nodes.invalidate_all();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

impl Default for NodeContentCache {
    fn default() -> Self {
        Self::new()
    }
}
