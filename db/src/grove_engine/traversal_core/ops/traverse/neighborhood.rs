use std::collections::{HashSet, VecDeque};

use crate::grove_engine::storage_core::{EdgeChainIter, GroveGraphStorage};
use crate::grove_engine::storage_core::txn::RoTxn;
use crate::grove_engine::traversal_core::ops::traverse::{EdgeConstraint, neighbor_of};
use crate::grove_engine::traversal_core::traversal_value::TraversalValue;
use crate::grove_engine::types::GraphError;
use crate::utils::items::{Node, Offset};

/// Breadth-first walk over all nodes within `constraints.len()` hops of the
/// start node. The constraint for hop `k` applies to the edges crossed from
/// layer `k` to layer `k + 1`. Each reachable node is delivered once, layer
/// by layer; `distance()` reports the layer of the element most recently
/// returned.
pub struct NeighborhoodIterator<'db, 'txn> {
	storage: &'db GroveGraphStorage,
	txn: &'txn RoTxn<'db>,
	constraints: Vec<EdgeConstraint>,
	seen: HashSet<Offset>,
	explore: Vec<VecDeque<Offset>>,
	cur_node: Offset,
	cur_depth: usize,
	edges: Option<EdgeChainIter<'db>>,
	last_distance: u32,
}

impl<'db, 'txn> NeighborhoodIterator<'db, 'txn> {
	/// The BFS layer (1-based hop count) of the last node returned.
	pub fn distance(&self) -> u32 {
		self.last_distance
	}

	fn open_edges(&mut self, node_off: Offset) -> Result<(), GraphError> {
		let node = self.storage.node_at(node_off)?;
		let c = self.constraints[self.cur_depth];
		self.edges = Some(self.storage.get_edges(self.txn, &node, c.dir, c.tag)?);
		self.cur_node = node_off;
		Ok(())
	}
}

impl<'db, 'txn> Iterator for NeighborhoodIterator<'db, 'txn> {
	type Item = Result<TraversalValue, GraphError>;

	fn next(&mut self) -> Option<Self::Item> {
		loop {
			if let Some(edges) = &mut self.edges {
				let dir = self.constraints[self.cur_depth].dir;
				for res in edges.by_ref() {
					let edge = match res {
						Ok(edge) => edge,
						Err(e) => return Some(Err(e)),
					};
					let neighbor = neighbor_of(self.cur_node, &edge, dir);
					if self.seen.insert(neighbor) {
						if self.cur_depth + 1 < self.constraints.len() {
							self.explore[self.cur_depth + 1].push_back(neighbor);
						}
						self.last_distance = self.cur_depth as u32 + 1;
						return Some(self.storage.node_at(neighbor).map(TraversalValue::Node));
					}
				}
			}

			// Current node exhausted: take the next frontier node, moving to
			// the next layer when this one drains.
			if self.explore[self.cur_depth].is_empty() {
				self.cur_depth += 1;
				if self.cur_depth >= self.constraints.len()
					|| self.explore[self.cur_depth].is_empty()
				{
					return None;
				}
			}
			let Some(next) = self.explore[self.cur_depth].pop_front() else {
				return None;
			};
			if let Err(e) = self.open_edges(next) {
				return Some(Err(e));
			}
		}
	}
}

/// All nodes within `constraints.len()` hops, breadth first.
pub fn get_neighborhood<'db, 'txn>(
	storage: &'db GroveGraphStorage,
	txn: &'txn RoTxn<'db>,
	node: &Node,
	constraints: Vec<EdgeConstraint>,
) -> Result<NeighborhoodIterator<'db, 'txn>, GraphError> {
	let max = constraints.len().max(1);
	let mut it = NeighborhoodIterator {
		storage,
		txn,
		constraints,
		seen: HashSet::from([node.offset()]),
		explore: vec![VecDeque::new(); max],
		cur_node: node.offset(),
		cur_depth: 0,
		edges: None,
		last_distance: 0,
	};
	if !it.constraints.is_empty() {
		it.open_edges(node.offset())?;
	}
	Ok(it)
}

/// Nodes at exactly `constraints.len()` hops: the BFS frontier is built
/// eagerly up to the second-to-last hop, then the last hop runs lazily.
pub struct NhopIterator<'db, 'txn> {
	storage: &'db GroveGraphStorage,
	txn: &'txn RoTxn<'db>,
	last: EdgeConstraint,
	seen: HashSet<Offset>,
	explore: VecDeque<Offset>,
	cur_node: Offset,
	edges: Option<EdgeChainIter<'db>>,
}

impl<'db, 'txn> Iterator for NhopIterator<'db, 'txn> {
	type Item = Result<TraversalValue, GraphError>;

	fn next(&mut self) -> Option<Self::Item> {
		loop {
			if let Some(edges) = &mut self.edges {
				for res in edges.by_ref() {
					let edge = match res {
						Ok(edge) => edge,
						Err(e) => return Some(Err(e)),
					};
					let neighbor = neighbor_of(self.cur_node, &edge, self.last.dir);
					if self.seen.insert(neighbor) {
						return Some(self.storage.node_at(neighbor).map(TraversalValue::Node));
					}
				}
			}
			let next = self.explore.pop_front()?;
			let node = match self.storage.node_at(next) {
				Ok(node) => node,
				Err(e) => return Some(Err(e)),
			};
			self.cur_node = next;
			match self.storage.get_edges(self.txn, &node, self.last.dir, self.last.tag) {
				Ok(edges) => self.edges = Some(edges),
				Err(e) => return Some(Err(e)),
			}
		}
	}
}

/// Nodes at exactly `constraints.len()` hops from the start node.
pub fn get_nhop_neighbors<'db, 'txn>(
	storage: &'db GroveGraphStorage,
	txn: &'txn RoTxn<'db>,
	node: &Node,
	constraints: Vec<EdgeConstraint>,
) -> Result<NhopIterator<'db, 'txn>, GraphError> {
	let Some(last) = constraints.last().copied() else {
		return Err(crate::grove_engine::types::gerr!(
			RangeError,
			"n-hop query needs at least one hop constraint"
		));
	};
	let mut seen = HashSet::from([node.offset()]);
	let mut frontier = VecDeque::from([node.offset()]);

	// Walk the first `hops - 1` layers eagerly; their nodes are not results,
	// only launch points for the last hop.
	for c in &constraints[..constraints.len() - 1] {
		let mut next_frontier = VecDeque::new();
		for &off in &frontier {
			let n = storage.node_at(off)?;
			for res in storage.get_edges(txn, &n, c.dir, c.tag)? {
				let edge = res?;
				let neighbor = neighbor_of(off, &edge, c.dir);
				if seen.insert(neighbor) {
					next_frontier.push_back(neighbor);
				}
			}
		}
		frontier = next_frontier;
	}

	Ok(NhopIterator {
		storage,
		txn,
		last,
		seen,
		explore: frontier,
		cur_node: node.offset(),
		edges: None,
	})
}
