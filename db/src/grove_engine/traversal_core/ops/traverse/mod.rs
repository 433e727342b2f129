pub mod joint;
pub mod neighbor;
pub mod neighborhood;
pub mod paths;

use crate::grove_engine::storage_core::string_table::StringId;
use crate::utils::items::{Direction, Edge, Node, Offset};

/// Direction and tag an edge must satisfy to be crossed at one hop.
#[derive(Debug, Clone, Copy)]
pub struct EdgeConstraint {
	pub dir: Direction,
	pub tag: StringId,
}

impl EdgeConstraint {
	pub fn any() -> EdgeConstraint {
		EdgeConstraint {
			dir: Direction::Any,
			tag: 0,
		}
	}
}

/// One leg of a joint-neighbor query: the candidate must reach `node`
/// across an edge satisfying the constraint.
#[derive(Debug, Clone, Copy)]
pub struct JointNeighborConstraint {
	pub constraint: EdgeConstraint,
	pub node: Node,
}

/// The endpoint of `edge` that is not `node_off`, honouring direction.
pub(crate) fn neighbor_of(node_off: Offset, edge: &Edge, dir: Direction) -> Offset {
	match dir {
		Direction::Outgoing => edge.destination_offset(),
		Direction::Incoming => edge.source_offset(),
		Direction::Any => {
			if edge.source_offset() == node_off {
				edge.destination_offset()
			} else {
				edge.source_offset()
			}
		}
	}
}
