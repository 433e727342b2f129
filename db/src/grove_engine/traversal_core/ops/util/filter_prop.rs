use crate::grove_engine::traversal_core::traversal_iter::RoTraversalIterator;
use crate::grove_engine::traversal_core::traversal_value::TraversalValue;
use crate::grove_engine::types::GraphError;
use crate::protocol::predicate::PropertyPredicate;
use crate::utils::items::Item;

pub trait FilterPropAdapter<'db, 'txn>:
	Iterator<Item = Result<TraversalValue, GraphError>>
where
	'db: 'txn,
{
	/// Keeps the nodes and edges whose property satisfies the predicate.
	/// Objects without the key never pass; other element shapes are dropped.
	fn filter_prop(
		self,
		pred: PropertyPredicate,
	) -> RoTraversalIterator<'db, 'txn, impl Iterator<Item = Result<TraversalValue, GraphError>>>;
}

impl<'db, 'txn, I: Iterator<Item = Result<TraversalValue, GraphError>>> FilterPropAdapter<'db, 'txn>
	for RoTraversalIterator<'db, 'txn, I>
where
	'db: 'txn,
{
	fn filter_prop(
		self,
		pred: PropertyPredicate,
	) -> RoTraversalIterator<'db, 'txn, impl Iterator<Item = Result<TraversalValue, GraphError>>>
	{
		let storage = self.storage;
		let txn = self.txn;
		let iter = self.inner.filter_map(move |res| {
			let item = match res {
				Ok(item) => item,
				Err(e) => return Some(Err(e)),
			};
			let target: Item = match &item {
				TraversalValue::Node(n) => n.item(),
				TraversalValue::Edge(e) => e.item(),
				_ => return None,
			};
			match storage.check_property(txn, target, pred.key) {
				Ok(Some(value)) => match pred.matches(&value) {
					Ok(true) => Some(Ok(item)),
					Ok(false) => None,
					Err(e) => Some(Err(e)),
				},
				Ok(None) => None,
				Err(e) => Some(Err(e)),
			}
		});
		RoTraversalIterator {
			storage: self.storage,
			txn: self.txn,
			inner: iter,
		}
	}
}
