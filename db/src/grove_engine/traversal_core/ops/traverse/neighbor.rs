use std::collections::HashSet;

use crate::grove_engine::storage_core::EdgeChainIter;
use crate::grove_engine::storage_core::GroveGraphStorage;
use crate::grove_engine::storage_core::string_table::StringId;
use crate::grove_engine::storage_core::txn::RoTxn;
use crate::grove_engine::traversal_core::ops::traverse::neighbor_of;
use crate::grove_engine::traversal_core::traversal_iter::RoTraversalIterator;
use crate::grove_engine::traversal_core::traversal_value::TraversalValue;
use crate::grove_engine::types::GraphError;
use crate::protocol::predicate::PropertyPredicate;
use crate::utils::items::{Direction, Node, Offset};

/// Immediate neighbors of a node across edges satisfying `(dir, tag)` and
/// every edge predicate. With `unique` a seen-set suppresses duplicates; a
/// caller that can tolerate duplicates skips that bookkeeping.
#[derive(Debug)]
pub struct NeighborIter<'db, 'txn> {
	storage: &'db GroveGraphStorage,
	txn: &'txn RoTxn<'db>,
	node_off: Offset,
	dir: Direction,
	predicates: Vec<PropertyPredicate>,
	seen: Option<HashSet<Offset>>,
	edges: EdgeChainIter<'db>,
}

impl<'db, 'txn> Iterator for NeighborIter<'db, 'txn> {
	type Item = Result<TraversalValue, GraphError>;

	fn next(&mut self) -> Option<Self::Item> {
		'edges: while let Some(res) = self.edges.next() {
			let edge = match res {
				Ok(edge) => edge,
				Err(e) => return Some(Err(e)),
			};
			for pred in &self.predicates {
				match self.storage.check_property(self.txn, edge.item(), pred.key) {
					Ok(Some(value)) => match pred.matches(&value) {
						Ok(true) => {}
						Ok(false) => continue 'edges,
						Err(e) => return Some(Err(e)),
					},
					Ok(None) => continue 'edges,
					Err(e) => return Some(Err(e)),
				}
			}
			let neighbor = neighbor_of(self.node_off, &edge, self.dir);
			if let Some(seen) = &mut self.seen
				&& !seen.insert(neighbor)
			{
				continue;
			}
			return Some(self.storage.node_at(neighbor).map(TraversalValue::Node));
		}
		None
	}
}

/// Neighbors of `node` across edges satisfying `(dir, tag)`.
pub fn get_neighbors<'db, 'txn>(
	storage: &'db GroveGraphStorage,
	txn: &'txn RoTxn<'db>,
	node: &Node,
	dir: Direction,
	tag: StringId,
	unique: bool,
) -> Result<RoTraversalIterator<'db, 'txn, NeighborIter<'db, 'txn>>, GraphError> {
	get_neighbors_filtered(storage, txn, node, dir, tag, Vec::new(), unique)
}

/// Neighbors of `node` where the connecting edge also satisfies every
/// property predicate.
pub fn get_neighbors_filtered<'db, 'txn>(
	storage: &'db GroveGraphStorage,
	txn: &'txn RoTxn<'db>,
	node: &Node,
	dir: Direction,
	tag: StringId,
	predicates: Vec<PropertyPredicate>,
	unique: bool,
) -> Result<RoTraversalIterator<'db, 'txn, NeighborIter<'db, 'txn>>, GraphError> {
	let edges = storage.get_edges(txn, node, dir, tag)?;
	Ok(RoTraversalIterator {
		storage,
		txn,
		inner: NeighborIter {
			storage,
			txn,
			node_off: node.offset(),
			dir,
			predicates,
			seen: unique.then(HashSet::new),
			edges,
		},
	})
}
