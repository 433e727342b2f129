use crate::grove_engine::traversal_core::ops::source::scan_tag;
use crate::grove_engine::traversal_core::traversal_iter::RoTraversalIterator;
use crate::grove_engine::traversal_core::traversal_value::TraversalValue;
use crate::grove_engine::types::GraphError;
use crate::utils::items::ItemKind;

pub trait NFromTagAdapter<'db, 'txn>:
	Iterator<Item = Result<TraversalValue, GraphError>>
where
	'db: 'txn,
{
	/// Nodes of one tag via its chunk list; an empty tag means all nodes and
	/// an unknown tag name yields nothing.
	fn n_from_tag(
		self,
		tag: &str,
	) -> RoTraversalIterator<'db, 'txn, impl Iterator<Item = Result<TraversalValue, GraphError>>>;
}

impl<'db, 'txn, I: Iterator<Item = Result<TraversalValue, GraphError>>> NFromTagAdapter<'db, 'txn>
	for RoTraversalIterator<'db, 'txn, I>
where
	'db: 'txn,
{
	fn n_from_tag(
		self,
		tag: &str,
	) -> RoTraversalIterator<'db, 'txn, impl Iterator<Item = Result<TraversalValue, GraphError>>>
	{
		RoTraversalIterator {
			storage: self.storage,
			txn: self.txn,
			inner: scan_tag(self.storage, self.txn, ItemKind::Node, tag),
		}
	}
}
