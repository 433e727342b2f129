use crate::grove_engine::traversal_core::traversal_iter::RoTraversalIterator;
use crate::grove_engine::traversal_core::traversal_value::TraversalValue;
use crate::grove_engine::types::GraphError;

pub trait FromNAdapter<'db, 'txn>: Iterator<Item = Result<TraversalValue, GraphError>> {
	/// The source node of each edge on the stream.
	fn from_n(
		self,
	) -> RoTraversalIterator<'db, 'txn, impl Iterator<Item = Result<TraversalValue, GraphError>>>;
}

impl<'db, 'txn, I: Iterator<Item = Result<TraversalValue, GraphError>>> FromNAdapter<'db, 'txn>
	for RoTraversalIterator<'db, 'txn, I>
{
	fn from_n(
		self,
	) -> RoTraversalIterator<'db, 'txn, impl Iterator<Item = Result<TraversalValue, GraphError>>>
	{
		let storage = self.storage;
		let iter = self.inner.filter_map(move |item| match item {
			Ok(TraversalValue::Edge(edge)) => {
				Some(storage.node_at(edge.source_offset()).map(TraversalValue::Node))
			}
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
