//! The time-expanded transit graph.
//!
//! Stations, routes and every scheduled departure are nodes of one graph.
//! Raw storage lives in [`GraphStore`]; [`GraphNode`] and [`Relationship`]
//! are the typed views searches work with. The graph is built once by
//! [`GraphBuilder`] and is read-only afterwards.

mod builder;
mod content_cache;
mod error;
mod node;
mod relationship;
mod store;

use std::collections::{BTreeMap, HashMap};

pub use builder::{GraphBuilder, GraphConfig};
pub use content_cache::{CacheStats, NodeContentCache};
pub use error::{DecodeError, GraphBuildError};
pub use node::{GraphNode, NodeIdentity, NodeKind};
pub use relationship::{Relationship, RelationshipKind};
pub use store::{
    GraphStore, GraphTransaction, NodeId, Properties, PropertyValue, RawNode, RawRelationship,
    RelationshipId,
};

use crate::domain::{Route, RouteId, Station, StationId, TransitData};
use crate::filter::EntityFilter;
use crate::walkable::WalkableConnections;

/// A built graph together with the catalogue it was built from.
///
/// Only entities that passed the build filter are present.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct TransitGraph {
    store: GraphStore,
    filter: EntityFilter,
    stations: BTreeMap<StationId, Station>,
    routes: HashMap<RouteId, Route>,
    station_nodes: BTreeMap<StationId, NodeId>,
    walk_links: WalkableConnections,
}

impl TransitGraph {
    /// Build a graph; see [`GraphBuilder`].
    pub fn build(
        data: &TransitData,
        filter: EntityFilter,
        config: GraphConfig,
    ) -> Result<Self, GraphBuildError> {
        GraphBuilder::new(data, filter, config).build()
    }

    fn from_parts(
        store: GraphStore,
        filter: EntityFilter,
        stations: BTreeMap<StationId, Station>,
        routes: HashMap<RouteId, Route>,
        station_nodes: BTreeMap<StationId, NodeId>,
        walk_links: WalkableConnections,
    ) -> Self {
        Self {
            store,
            filter,
            stations,
            routes,
            station_nodes,
            walk_links,
        }
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    /// Open a read-only transaction.
    pub fn begin_read(&self) -> GraphTransaction<'_> {
        self.store.begin_read()
    }

    /// The filter the graph was built with.
    pub fn filter(&self) -> &EntityFilter {
        &self.filter
    }

    pub fn station(&self, id: &StationId) -> Option<&Station> {
        self.stations.get(id)
    }

    pub fn stations(&self) -> impl Iterator<Item = &Station> {
        self.stations.values()
    }

    pub fn route(&self, id: &RouteId) -> Option<&Route> {
        self.routes.get(id)
    }

    /// Included routes keyed by id.
    pub fn routes(&self) -> &HashMap<RouteId, Route> {
        &self.routes
    }

    /// Node of a station, if the station is in the graph.
    pub fn station_node(&self, id: &StationId) -> Option<NodeId> {
        self.station_nodes.get(id).copied()
    }

    pub fn walk_links(&self) -> &WalkableConnections {
        &self.walk_links
    }
}

impl GraphTransaction<'_> {
    /// Decoded relationships leaving `node`, in creation order.
    pub fn outgoing(&self, node: NodeId) -> Result<Vec<Relationship>, DecodeError> {
        self.relationships_from(node)
            .into_iter()
            .map(|id| Relationship::decode(id, self.relationship(id)?))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{chain_network, sid};

    #[test]
    fn graph_survives_serde() {
        let graph = TransitGraph::build(
            &chain_network(),
            EntityFilter::include_all(),
            GraphConfig::default(),
        )
        .unwrap();
        let json = serde_json::to_string(&graph).unwrap();
        let loaded: TransitGraph = serde_json::from_str(&json).unwrap();

        assert_eq!(loaded.store().node_count(), graph.store().node_count());
        assert_eq!(loaded.station_node(&sid("X")), graph.station_node(&sid("X")));
        assert_eq!(loaded.routes().len(), 3);

        let x = loaded.station_node(&sid("X")).unwrap();
        let tx = loaded.begin_read();
        assert_eq!(tx.outgoing(x).unwrap(), graph.begin_read().outgoing(x).unwrap());
    }
}
