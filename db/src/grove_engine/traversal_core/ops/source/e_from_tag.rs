use crate::grove_engine::traversal_core::ops::source::scan_tag;
use crate::grove_engine::traversal_core::traversal_iter::RoTraversalIterator;
use crate::grove_engine::traversal_core::traversal_value::TraversalValue;
use crate::grove_engine::types::GraphError;
use crate::utils::items::ItemKind;

pub trait EFromTagAdapter<'db, 'txn>:
	Iterator<Item = Result<TraversalValue, GraphError>>
where
	'db: 'txn,
{
	fn e_from_tag(
		self,
		tag: &str,
	) -> RoTraversalIterator<'db, 'txn, impl Iterator<Item = Result<TraversalValue, GraphError>>>;
}

impl<'db, 'txn, I: Iterator<Item = Result<TraversalValue, GraphError>>> EFromTagAdapter<'db, 'txn>
	for RoTraversalIterator<'db, 'txn, I>
where
	'db: 'txn,
{
	fn e_from_tag(
		self,
		tag: &str,
	) -> RoTraversalIterator<'db, 'txn, impl Iterator<Item = Result<TraversalValue, GraphError>>>
	{
		RoTraversalIterator {
			storage: self.storage,
			txn: self.txn,
			inner: scan_tag(self.storage, self.txn, ItemKind::Edge, tag),
		}
	}
}
