pub mod from_n;
pub mod in_e;
pub mod out_e;
pub mod to_n;

use itertools::Either;

use crate::grove_engine::storage_core::GroveGraphStorage;
use crate::grove_engine::storage_core::string_table::{ANY_TAG, StringId};
use crate::grove_engine::storage_core::txn::RoTxn;
use crate::grove_engine::traversal_core::traversal_value::TraversalValue;
use crate::grove_engine::types::GraphError;
use crate::utils::items::Direction;

/// Resolves an edge-tag filter for adapters: `""` means any tag, an unknown
/// name can never match.
pub(crate) fn resolve_tag(
	storage: &GroveGraphStorage,
	txn: &RoTxn,
	tag: &str,
) -> Result<Option<StringId>, GraphError> {
	if tag.is_empty() {
		return Ok(Some(ANY_TAG));
	}
	storage.lookup_string(txn, tag)
}

/// Expands each node on the stream into its adjacent edges.
pub(crate) fn edges_of_stream<'db, 'txn, I>(
	storage: &'db GroveGraphStorage,
	txn: &'txn RoTxn<'db>,
	inner: I,
	dir: Direction,
	tag: &str,
) -> impl Iterator<Item = Result<TraversalValue, GraphError>> + use<'db, 'txn, I>
where
	I: Iterator<Item = Result<TraversalValue, GraphError>>,
	'db: 'txn,
{
	let tag = resolve_tag(storage, txn, tag);
	inner.flat_map(move |item| match (&tag, item) {
		(Ok(Some(tag_id)), Ok(TraversalValue::Node(node))) => {
			match storage.get_edges(txn, &node, dir, *tag_id) {
				Ok(edges) => Either::Left(edges.map(|res| res.map(TraversalValue::Edge))),
				Err(e) => Either::Right(Some(Err(e)).into_iter()),
			}
		}
		(Ok(None), Ok(_)) => Either::Right(None.into_iter()),
		(Ok(Some(_)), Ok(_)) => Either::Right(None.into_iter()),
		(Err(e), _) => Either::Right(Some(Err(e.clone())).into_iter()),
		(_, Err(e)) => Either::Right(Some(Err(e)).into_iter()),
	})
}
