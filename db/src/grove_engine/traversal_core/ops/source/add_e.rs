use crate::grove_engine::storage_core::GroveGraphStorage;
use crate::grove_engine::storage_core::txn::RwTxn;
use crate::grove_engine::traversal_core::traversal_iter::RwTraversalIterator;
use crate::grove_engine::traversal_core::traversal_value::TraversalValue;
use crate::grove_engine::types::GraphError;
use crate::protocol::value::Value;
use crate::utils::items::Node;

fn add_edge_with_props(
	storage: &GroveGraphStorage,
	txn: &mut RwTxn,
	src: &Node,
	dst: &Node,
	tag: &str,
	props: Option<Vec<(&str, Value)>>,
) -> Result<TraversalValue, GraphError> {
	let edge = storage.add_edge(txn, src, dst, tag)?;
	if let Some(props) = props {
		for (key, value) in props {
			let key_id = storage.intern(txn, key)?;
			storage.set_property(txn, edge.item(), key_id, value)?;
		}
	}
	Ok(TraversalValue::Edge(edge))
}

pub trait AddEAdapter<'db, 'txn>: Iterator<Item = Result<TraversalValue, GraphError>> {
	/// Creates one edge from `src` to `dst` with optional initial properties
	/// and puts it on the stream.
	fn add_e(
		self,
		src: &Node,
		dst: &Node,
		tag: &str,
		props: Option<Vec<(&str, Value)>>,
	) -> RwTraversalIterator<'db, 'txn, std::vec::IntoIter<Result<TraversalValue, GraphError>>>;
}

impl<'db, 'txn, I: Iterator<Item = Result<TraversalValue, GraphError>>> AddEAdapter<'db, 'txn>
	for RwTraversalIterator<'db, 'txn, I>
{
	fn add_e(
		self,
		src: &Node,
		dst: &Node,
		tag: &str,
		props: Option<Vec<(&str, Value)>>,
	) -> RwTraversalIterator<'db, 'txn, std::vec::IntoIter<Result<TraversalValue, GraphError>>> {
		let RwTraversalIterator { storage, txn, .. } = self;
		let result = add_edge_with_props(storage, &mut *txn, src, dst, tag, props);
		RwTraversalIterator {
			storage,
			txn,
			inner: vec![result].into_iter(),
		}
	}
}
