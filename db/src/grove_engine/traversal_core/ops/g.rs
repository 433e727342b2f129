use crate::grove_engine::storage_core::GroveGraphStorage;
use crate::grove_engine::storage_core::txn::{RoTxn, RwTxn};
use crate::grove_engine::traversal_core::traversal_iter::{RoTraversalIterator, RwTraversalIterator};
use crate::grove_engine::traversal_core::traversal_value::TraversalValue;
use crate::grove_engine::types::GraphError;

/// Entry point of every traversal: an empty pipeline holding the storage
/// handle and transaction, waiting for a source adapter.
pub struct G;

impl G {
	pub fn new<'db, 'txn>(
		storage: &'db GroveGraphStorage,
		txn: &'txn RoTxn<'db>,
	) -> RoTraversalIterator<'db, 'txn, std::iter::Empty<Result<TraversalValue, GraphError>>> {
		RoTraversalIterator {
			storage,
			txn,
			inner: std::iter::empty(),
		}
	}

	pub fn new_mut<'db, 'txn>(
		storage: &'db GroveGraphStorage,
		txn: &'txn mut RwTxn<'db>,
	) -> RwTraversalIterator<'db, 'txn, std::iter::Empty<Result<TraversalValue, GraphError>>> {
		RwTraversalIterator {
			storage,
			txn,
			inner: std::iter::empty(),
		}
	}
}
