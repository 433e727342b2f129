use std::collections::VecDeque;

use crate::grove_engine::storage_core::GroveGraphStorage;
use crate::grove_engine::storage_core::string_table::ANY_TAG;
use crate::grove_engine::storage_core::txn::RoTxn;
use crate::grove_engine::traversal_core::traversal_iter::RoTraversalIterator;
use crate::grove_engine::traversal_core::traversal_value::TraversalValue;
use crate::grove_engine::types::GraphError;
use crate::utils::items::{Direction, Node, Path};

/// Breadth-first enumeration of simple directed paths out of a start node.
///
/// Shorter paths always come out before longer ones, so the first delivered
/// path to a target is a shortest path. With a target set, only paths ending
/// there are delivered; exploration still covers everything shorter.
pub struct PathIterator<'db, 'txn> {
	storage: &'db GroveGraphStorage,
	txn: &'txn RoTxn<'db>,
	target: Option<Node>,
	max_length: Option<usize>,
	queue: VecDeque<Path>,
	pending: VecDeque<Path>,
}

impl<'db, 'txn> Iterator for PathIterator<'db, 'txn> {
	type Item = Result<TraversalValue, GraphError>;

	fn next(&mut self) -> Option<Self::Item> {
		loop {
			if let Some(path) = self.pending.pop_front() {
				return Some(Ok(TraversalValue::Path(path)));
			}
			let path = self.queue.pop_front()?;
			if self.max_length.is_some_and(|max| path.length() >= max) {
				continue;
			}
			let end = path.end_node();
			let edges = match self.storage.get_edges(self.txn, &end, Direction::Outgoing, ANY_TAG) {
				Ok(edges) => edges,
				Err(e) => return Some(Err(e)),
			};
			for res in edges {
				let edge = match res {
					Ok(edge) => edge,
					Err(e) => return Some(Err(e)),
				};
				// Simple paths only: never revisit a node.
				if path.nodes.iter().any(|n| n.offset() == edge.destination_offset()) {
					continue;
				}
				let dst = match self.storage.node_at(edge.destination_offset()) {
					Ok(dst) => dst,
					Err(e) => return Some(Err(e)),
				};
				let mut extended = path.clone();
				extended.nodes.push(dst);
				extended.edges.push(edge);
				let is_result = match &self.target {
					Some(target) => dst.offset() == target.offset(),
					None => true,
				};
				self.queue.push_back(extended.clone());
				if is_result {
					self.pending.push_back(extended);
				}
			}
		}
	}
}

/// All simple paths leaving `start`, shortest first.
pub fn get_paths<'db, 'txn>(
	storage: &'db GroveGraphStorage,
	txn: &'txn RoTxn<'db>,
	start: &Node,
	target: Option<&Node>,
	max_length: Option<usize>,
) -> RoTraversalIterator<'db, 'txn, PathIterator<'db, 'txn>> {
	let seed = Path {
		nodes: vec![*start],
		edges: Vec::new(),
	};
	RoTraversalIterator {
		storage,
		txn,
		inner: PathIterator {
			storage,
			txn,
			target: target.copied(),
			max_length,
			queue: VecDeque::from([seed]),
			pending: VecDeque::new(),
		},
	}
}

pub trait EndNodesAdapter<'db, 'txn>: Iterator<Item = Result<TraversalValue, GraphError>> {
	/// Maps each path on the stream to its end node.
	fn end_nodes(
		self,
	) -> RoTraversalIterator<'db, 'txn, impl Iterator<Item = Result<TraversalValue, GraphError>>>;
}

impl<'db, 'txn, I: Iterator<Item = Result<TraversalValue, GraphError>>> EndNodesAdapter<'db, 'txn>
	for RoTraversalIterator<'db, 'txn, I>
{
	fn end_nodes(
		self,
	) -> RoTraversalIterator<'db, 'txn, impl Iterator<Item = Result<TraversalValue, GraphError>>>
	{
		let iter = self.inner.filter_map(|item| match item {
			Ok(TraversalValue::Path(p)) => Some(Ok(TraversalValue::Node(p.end_node()))),
			Ok(_) => None,
			Err(e) => Some(Err(e)),
		});
		RoTraversalIterator {
			storage: self.storage,
			txn: self.txn,
			inner: iter,
		}
	}
}
