use crate::grove_engine::storage_core::GroveGraphStorage;
use crate::grove_engine::storage_core::txn::RwTxn;
use crate::grove_engine::traversal_core::traversal_iter::RwTraversalIterator;
use crate::grove_engine::traversal_core::traversal_value::TraversalValue;
use crate::grove_engine::types::GraphError;
use crate::protocol::value::Value;

fn add_node_with_props(
	storage: &GroveGraphStorage,
	txn: &mut RwTxn,
	tag: &str,
	props: Option<Vec<(&str, Value)>>,
) -> Result<TraversalValue, GraphError> {
	let node = storage.add_node(txn, tag)?;
	if let Some(props) = props {
		for (key, value) in props {
			let key_id = storage.intern(txn, key)?;
			storage.set_property(txn, node.item(), key_id, value)?;
		}
	}
	Ok(TraversalValue::Node(node))
}

pub trait AddNAdapter<'db, 'txn>: Iterator<Item = Result<TraversalValue, GraphError>> {
	/// Creates one node with optional initial properties and puts it on the
	/// stream. Runs eagerly; the tag and keys are interned as needed.
	fn add_n(
		self,
		tag: &str,
		props: Option<Vec<(&str, Value)>>,
	) -> RwTraversalIterator<'db, 'txn, std::vec::IntoIter<Result<TraversalValue, GraphError>>>;
}

impl<'db, 'txn, I: Iterator<Item = Result<TraversalValue, GraphError>>> AddNAdapter<'db, 'txn>
	for RwTraversalIterator<'db, 'txn, I>
{
	fn add_n(
		self,
		tag: &str,
		props: Option<Vec<(&str, Value)>>,
	) -> RwTraversalIterator<'db, 'txn, std::vec::IntoIter<Result<TraversalValue, GraphError>>> {
		let RwTraversalIterator { storage, txn, .. } = self;
		let result = add_node_with_props(storage, &mut *txn, tag, props);
		RwTraversalIterator {
			storage,
			txn,
			inner: vec![result].into_iter(),
		}
	}
}
