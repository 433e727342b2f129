use crate::grove_engine::traversal_core::ops::source::scan_all;
use crate::grove_engine::traversal_core::traversal_iter::RoTraversalIterator;
use crate::grove_engine::traversal_core::traversal_value::TraversalValue;
use crate::grove_engine::types::GraphError;
use crate::utils::items::ItemKind;

pub trait NFromAllAdapter<'db, 'txn>:
	Iterator<Item = Result<TraversalValue, GraphError>>
{
	/// Every live node, in pool address order (which is insertion order
	/// until slots get recycled).
	fn n_from_all(
		self,
	) -> RoTraversalIterator<'db, 'txn, impl Iterator<Item = Result<TraversalValue, GraphError>>>;
}

impl<'db, 'txn, I: Iterator<Item = Result<TraversalValue, GraphError>>> NFromAllAdapter<'db, 'txn>
	for RoTraversalIterator<'db, 'txn, I>
{
	fn n_from_all(
		self,
	) -> RoTraversalIterator<'db, 'txn, impl Iterator<Item = Result<TraversalValue, GraphError>>>
	{
		RoTraversalIterator {
			storage: self.storage,
			txn: self.txn,
			inner: scan_all(self.storage, ItemKind::Node),
		}
	}
}
