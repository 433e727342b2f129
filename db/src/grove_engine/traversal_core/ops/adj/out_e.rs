use crate::grove_engine::traversal_core::ops::adj::edges_of_stream;
use crate::grove_engine::traversal_core::traversal_iter::RoTraversalIterator;
use crate::grove_engine::traversal_core::traversal_value::TraversalValue;
use crate::grove_engine::types::GraphError;
use crate::utils::items::Direction;

pub trait OutEAdapter<'db, 'txn>: Iterator<Item = Result<TraversalValue, GraphError>>
where
	'db: 'txn,
{
	/// Outgoing edges of each node on the stream, optionally tag-filtered.
	fn out_e(
		self,
		tag: &str,
	) -> RoTraversalIterator<'db, 'txn, impl Iterator<Item = Result<TraversalValue, GraphError>>>;
}

impl<'db, 'txn, I: Iterator<Item = Result<TraversalValue, GraphError>>> OutEAdapter<'db, 'txn>
	for RoTraversalIterator<'db, 'txn, I>
where
	'db: 'txn,
{
	fn out_e(
		self,
		tag: &str,
	) -> RoTraversalIterator<'db, 'txn, impl Iterator<Item = Result<TraversalValue, GraphError>>>
	{
		RoTraversalIterator {
			storage: self.storage,
			txn: self.txn,
			inner: edges_of_stream(self.storage, self.txn, self.inner, Direction::Outgoing, tag),
		}
	}
}
