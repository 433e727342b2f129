use std::collections::HashSet;

use crate::grove_engine::traversal_core::traversal_iter::RoTraversalIterator;
use crate::grove_engine::traversal_core::traversal_value::TraversalValue;
use crate::grove_engine::types::GraphError;

pub struct Dedup<I> {
	seen: HashSet<(u8, u64)>,
	iter: I,
}

impl<I> Iterator for Dedup<I>
where
	I: Iterator<Item = Result<TraversalValue, GraphError>>,
{
	type Item = I::Item;

	fn next(&mut self) -> Option<Self::Item> {
		loop {
			match self.iter.next()? {
				Ok(item) => match item.identity() {
					Some(key) => {
						if self.seen.insert(key) {
							return Some(Ok(item));
						}
					}
					None => return Some(Ok(item)),
				},
				err => return Some(err),
			}
		}
	}
}

pub trait DedupAdapter<'db, 'txn>: Iterator<Item = Result<TraversalValue, GraphError>> {
	/// Drops repeated nodes and edges; elements without a storage identity
	/// pass through untouched.
	fn dedup(
		self,
	) -> RoTraversalIterator<'db, 'txn, impl Iterator<Item = Result<TraversalValue, GraphError>>>;
}

impl<'db, 'txn, I: Iterator<Item = Result<TraversalValue, GraphError>>> DedupAdapter<'db, 'txn>
	for RoTraversalIterator<'db, 'txn, I>
{
	fn dedup(
		self,
	) -> RoTraversalIterator<'db, 'txn, impl Iterator<Item = Result<TraversalValue, GraphError>>>
	{
		RoTraversalIterator {
			storage: self.storage,
			txn: self.txn,
			inner: Dedup {
				seen: HashSet::new(),
				iter: self.inner,
			},
		}
	}
}
