use crate::grove_engine::traversal_core::ops::source::select_items;
use crate::grove_engine::traversal_core::traversal_iter::RoTraversalIterator;
use crate::grove_engine::traversal_core::traversal_value::TraversalValue;
use crate::grove_engine::types::GraphError;
use crate::protocol::predicate::PropertyPredicate;
use crate::utils::items::ItemKind;

pub trait EFromIndexAdapter<'db, 'txn>:
	Iterator<Item = Result<TraversalValue, GraphError>>
where
	'db: 'txn,
{
	/// Edges of `tag` matching the predicate, index-driven when possible.
	fn e_from_index(
		self,
		tag: &str,
		pred: &PropertyPredicate,
	) -> RoTraversalIterator<'db, 'txn, impl Iterator<Item = Result<TraversalValue, GraphError>>>;
}

impl<'db, 'txn, I: Iterator<Item = Result<TraversalValue, GraphError>>> EFromIndexAdapter<'db, 'txn>
	for RoTraversalIterator<'db, 'txn, I>
where
	'db: 'txn,
{
	fn e_from_index(
		self,
		tag: &str,
		pred: &PropertyPredicate,
	) -> RoTraversalIterator<'db, 'txn, impl Iterator<Item = Result<TraversalValue, GraphError>>>
	{
		RoTraversalIterator {
			storage: self.storage,
			txn: self.txn,
			inner: select_items(self.storage, self.txn, ItemKind::Edge, tag, pred, false),
		}
	}
}
