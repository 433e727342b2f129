use crate::grove_engine::storage_core::GroveGraphStorage;
use crate::grove_engine::storage_core::txn::RoTxn;
use crate::grove_engine::traversal_core::ops::traverse::JointNeighborConstraint;
use crate::grove_engine::traversal_core::ops::traverse::neighbor::{NeighborIter, get_neighbors};
use crate::grove_engine::traversal_core::traversal_iter::RoTraversalIterator;
use crate::grove_engine::traversal_core::traversal_value::TraversalValue;
use crate::grove_engine::types::{GraphError, gerr};
use crate::utils::items::{Direction, Node};

/// Nodes simultaneously adjacent to every constraint node.
///
/// The first constraint drives iteration (with its direction flipped, since
/// candidates are viewed from the other end of those edges); the remaining
/// constraints are checked per candidate.
#[derive(Debug)]
pub struct JointNeighborIter<'db, 'txn> {
	storage: &'db GroveGraphStorage,
	txn: &'txn RoTxn<'db>,
	driver: NeighborIter<'db, 'txn>,
	rest: Vec<JointNeighborConstraint>,
}

fn flip(dir: Direction) -> Direction {
	match dir {
		Direction::Any => Direction::Any,
		Direction::Outgoing => Direction::Incoming,
		Direction::Incoming => Direction::Outgoing,
	}
}

impl<'db, 'txn> JointNeighborIter<'db, 'txn> {
	fn satisfies_all(&self, candidate: &Node) -> Result<bool, GraphError> {
		'constraints: for jc in &self.rest {
			let edges = self.storage.get_edges(
				self.txn,
				candidate,
				jc.constraint.dir,
				jc.constraint.tag,
			)?;
			for res in edges {
				let edge = res?;
				if edge.source_offset() == jc.node.offset()
					|| edge.destination_offset() == jc.node.offset()
				{
					continue 'constraints;
				}
			}
			return Ok(false);
		}
		Ok(true)
	}
}

impl<'db, 'txn> Iterator for JointNeighborIter<'db, 'txn> {
	type Item = Result<TraversalValue, GraphError>;

	fn next(&mut self) -> Option<Self::Item> {
		loop {
			let candidate = match self.driver.next()? {
				Ok(TraversalValue::Node(n)) => n,
				Ok(_) => continue,
				Err(e) => return Some(Err(e)),
			};
			match self.satisfies_all(&candidate) {
				Ok(true) => return Some(Ok(TraversalValue::Node(candidate))),
				Ok(false) => continue,
				Err(e) => return Some(Err(e)),
			}
		}
	}
}

/// Nodes adjacent to all of the constraint nodes at once. Fails with
/// `RangeError` on an empty constraint list.
pub fn get_joint_neighbors<'db, 'txn>(
	storage: &'db GroveGraphStorage,
	txn: &'txn RoTxn<'db>,
	constraints: Vec<JointNeighborConstraint>,
	unique: bool,
) -> Result<RoTraversalIterator<'db, 'txn, JointNeighborIter<'db, 'txn>>, GraphError> {
	let Some(first) = constraints.first().copied() else {
		return Err(gerr!(RangeError, "joint neighbor query needs at least one constraint"));
	};
	let driver = get_neighbors(
		storage,
		txn,
		&first.node,
		flip(first.constraint.dir),
		first.constraint.tag,
		unique,
	)?
	.inner;
	Ok(RoTraversalIterator {
		storage,
		txn,
		inner: JointNeighborIter {
			storage,
			txn,
			driver,
			rest: constraints[1..].to_vec(),
		},
	})
}
