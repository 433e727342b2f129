use crate::grove_engine::storage_core::GroveGraphStorage;
use crate::grove_engine::storage_core::txn::RoTxn;
use crate::grove_engine::types::{GraphError, gerr};
use crate::utils::items::{Edge, EdgeId, Node, NodeId};

/// Read-side lookup boundary used by the traversal adapters.
pub trait StorageMethods {
	/// Node by its session-stable id (pool slot index).
	fn get_node(&self, txn: &RoTxn, id: NodeId) -> Result<Node, GraphError>;

	fn get_edge(&self, txn: &RoTxn, id: EdgeId) -> Result<Edge, GraphError>;

	fn get_source(&self, txn: &RoTxn, edge: &Edge) -> Result<Node, GraphError>;

	fn get_destination(&self, txn: &RoTxn, edge: &Edge) -> Result<Node, GraphError>;
}

impl StorageMethods for GroveGraphStorage {
	fn get_node(&self, _txn: &RoTxn, id: NodeId) -> Result<Node, GraphError> {
		let pool = &self.pools.node;
		if id >= pool.num_slots {
			return Err(gerr!(InvalidId, "node id {id} beyond pool"));
		}
		self.node_at(pool.offset_of(id))
			.map_err(|_| gerr!(NotFound, "no live node with id {id}"))
	}

	fn get_edge(&self, _txn: &RoTxn, id: EdgeId) -> Result<Edge, GraphError> {
		let pool = &self.pools.edge;
		if id >= pool.num_slots {
			return Err(gerr!(InvalidId, "edge id {id} beyond pool"));
		}
		self.edge_at(pool.offset_of(id))
			.map_err(|_| gerr!(NotFound, "no live edge with id {id}"))
	}

	fn get_source(&self, _txn: &RoTxn, edge: &Edge) -> Result<Node, GraphError> {
		self.node_at(edge.src)
	}

	fn get_destination(&self, _txn: &RoTxn, edge: &Edge) -> Result<Node, GraphError> {
		self.node_at(edge.dst)
	}
}
