use crate::grove_engine::traversal_core::traversal_iter::RoTraversalIterator;
use crate::grove_engine::traversal_core::traversal_value::TraversalValue;
use crate::grove_engine::types::GraphError;

pub trait ToNAdapter<'db, 'txn>: Iterator<Item = Result<TraversalValue, GraphError>> {
	/// The destination node of each edge on the stream.
	fn to_n(
		self,
	) -> RoTraversalIterator<'db, 'txn, impl Iterator<Item = Result<TraversalValue, GraphError>>>;
}

impl<'db, 'txn, I: Iterator<Item = Result<TraversalValue, GraphError>>> ToNAdapter<'db, 'txn>
	for RoTraversalIterator<'db, 'txn, I>
{
	fn to_n(
		self,
	) -> RoTraversalIterator<'db, 'txn, impl Iterator<Item = Result<TraversalValue, GraphError>>>
	{
		let storage = self.storage;
		let iter = self.inner.filter_map(move |item| match item {
			Ok(TraversalValue::Edge(edge)) => {
				Some(storage.node_at(edge.destination_offset()).map(TraversalValue::Node))
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
