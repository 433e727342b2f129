use crate::grove_engine::traversal_core::ops::source::select_items;
use crate::grove_engine::traversal_core::traversal_iter::RoTraversalIterator;
use crate::grove_engine::traversal_core::traversal_value::TraversalValue;
use crate::grove_engine::types::GraphError;
use crate::protocol::predicate::PropertyPredicate;
use crate::utils::items::ItemKind;

pub trait NFromIndexAdapter<'db, 'txn>:
	Iterator<Item = Result<TraversalValue, GraphError>>
where
	'db: 'txn,
{
	/// Nodes of `tag` matching the predicate. Driven through the matching
	/// AVL index when one exists, otherwise through the tag chunk list (or
	/// the full pool for an empty tag) with the predicate applied in-stream.
	fn n_from_index(
		self,
		tag: &str,
		pred: &PropertyPredicate,
	) -> RoTraversalIterator<'db, 'txn, impl Iterator<Item = Result<TraversalValue, GraphError>>>;

	/// Same selection, delivered in descending key order where an index
	/// drives the iteration.
	fn n_from_index_reverse(
		self,
		tag: &str,
		pred: &PropertyPredicate,
	) -> RoTraversalIterator<'db, 'txn, impl Iterator<Item = Result<TraversalValue, GraphError>>>;
}

impl<'db, 'txn, I: Iterator<Item = Result<TraversalValue, GraphError>>> NFromIndexAdapter<'db, 'txn>
	for RoTraversalIterator<'db, 'txn, I>
where
	'db: 'txn,
{
	fn n_from_index(
		self,
		tag: &str,
		pred: &PropertyPredicate,
	) -> RoTraversalIterator<'db, 'txn, impl Iterator<Item = Result<TraversalValue, GraphError>>>
	{
		RoTraversalIterator {
			storage: self.storage,
			txn: self.txn,
			inner: select_items(self.storage, self.txn, ItemKind::Node, tag, pred, false),
		}
	}

	fn n_from_index_reverse(
		self,
		tag: &str,
		pred: &PropertyPredicate,
	) -> RoTraversalIterator<'db, 'txn, impl Iterator<Item = Result<TraversalValue, GraphError>>>
	{
		RoTraversalIterator {
			storage: self.storage,
			txn: self.txn,
			inner: select_items(self.storage, self.txn, ItemKind::Node, tag, pred, true),
		}
	}
}
