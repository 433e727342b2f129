pub mod add_e;
pub mod add_n;
pub mod e_from_all;
pub mod e_from_tag;
pub mod e_from_index;
pub mod n_from_all;
pub mod n_from_tag;
pub mod n_from_index;

use itertools::Either;

use crate::grove_engine::storage_core::GroveGraphStorage;
use crate::grove_engine::storage_core::index::avl::{AvlTree, IndexKey};
use crate::grove_engine::storage_core::index::chunk_list::ChunkList;
use crate::grove_engine::storage_core::string_table::{ANY_TAG, StringId};
use crate::grove_engine::storage_core::txn::RoTxn;
use crate::grove_engine::traversal_core::traversal_value::TraversalValue;
use crate::grove_engine::types::GraphError;
use crate::protocol::predicate::{PredicateOp, PropertyPredicate};
use crate::utils::items::{Item, ItemKind, Offset};

type BoxedStream<'txn> = Box<dyn Iterator<Item = Result<TraversalValue, GraphError>> + 'txn>;

fn lift(storage: &GroveGraphStorage, kind: ItemKind, off: Offset) -> Result<TraversalValue, GraphError> {
	match kind {
		ItemKind::Node => storage.node_at(off).map(TraversalValue::Node),
		ItemKind::Edge => storage.edge_at(off).map(TraversalValue::Edge),
	}
}

/// Unfiltered scan of the whole pool for one object kind, address order.
pub(crate) fn scan_all<'db>(
	storage: &'db GroveGraphStorage,
	kind: ItemKind,
) -> impl Iterator<Item = Result<TraversalValue, GraphError>> + use<'db> {
	let pool = *storage.pools.for_kind(kind);
	let region = storage.regions.get(pool.region);
	pool.live_slots(region)
		.map(move |slot| lift(storage, kind, pool.offset_of(slot)))
}

/// Walk of one tag's chunk list. An unknown tag name yields nothing.
pub(crate) fn scan_tag<'db, 'txn>(
	storage: &'db GroveGraphStorage,
	txn: &'txn RoTxn<'db>,
	kind: ItemKind,
	tag: &str,
) -> BoxedStream<'txn>
where
	'db: 'txn,
{
	if tag.is_empty() {
		return Box::new(scan_all(storage, kind));
	}
	let tag_id = match storage.lookup_string(txn, tag) {
		Ok(Some(id)) => id,
		Ok(None) => return Box::new(std::iter::empty()),
		Err(e) => return Box::new(std::iter::once(Err(e))),
	};
	scan_tag_id(storage, kind, tag_id)
}

pub(crate) fn scan_tag_id<'db, 'txn>(
	storage: &'db GroveGraphStorage,
	kind: ItemKind,
	tag_id: StringId,
) -> BoxedStream<'txn>
where
	'db: 'txn,
{
	let head = match storage.tag_head(kind, tag_id) {
		Ok(head) => head,
		Err(e) => return Box::new(std::iter::once(Err(e))),
	};
	Box::new(ChunkList::iter(storage, head).map(move |res| res.and_then(|off| lift(storage, kind, off))))
}

fn index_bounds(
	pred: &PropertyPredicate,
) -> (Option<(IndexKey, bool)>, Option<(IndexKey, bool)>) {
	let k1 = IndexKey::from_value(&pred.v1).ok();
	let k2 = IndexKey::from_value(&pred.v2).ok();
	let Some(k1) = k1 else {
		return (None, None);
	};
	let (lo, hi) = match pred.op {
		PredicateOp::Eq => (Some((k1, true)), Some((k1, true))),
		PredicateOp::Lt => (None, Some((k1, false))),
		PredicateOp::Le => (None, Some((k1, true))),
		PredicateOp::Gt => (Some((k1, false)), None),
		PredicateOp::Ge => (Some((k1, true)), None),
		PredicateOp::GeLe => (Some((k1, true)), k2.map(|k| (k, true))),
		PredicateOp::GeLt => (Some((k1, true)), k2.map(|k| (k, false))),
		PredicateOp::GtLe => (Some((k1, false)), k2.map(|k| (k, true))),
		PredicateOp::GtLt => (Some((k1, false)), k2.map(|k| (k, false))),
		PredicateOp::Ne | PredicateOp::DontCare => (None, None),
	};
	// String keys are stored as 16-byte prefixes, so a bucket at an exclusive
	// bound can still hold longer strings inside the range. Widen the bounds
	// to inclusive and let the full-value check make the exact cut.
	if pred.v1.kind() == crate::protocol::value::ValueKind::String {
		return (lo.map(|(k, _)| (k, true)), hi.map(|(k, _)| (k, true)));
	}
	(lo, hi)
}

/// Selection policy behind `get_nodes(tag, predicate)` and its edge twin:
/// a matching `(kind, tag, key)` index drives the iteration; otherwise the
/// tag chunk list does, with the predicate evaluated in-stream; with no tag
/// at all, the object pool is scanned.
///
/// Every candidate is re-verified against the full property value, which
/// also settles `Ne` and prefix-truncated string keys.
pub(crate) fn select_items<'db, 'txn>(
	storage: &'db GroveGraphStorage,
	txn: &'txn RoTxn<'db>,
	kind: ItemKind,
	tag: &str,
	pred: &PropertyPredicate,
	reverse: bool,
) -> BoxedStream<'txn>
where
	'db: 'txn,
{
	let key = pred.key;
	let (lo, hi) = index_bounds(pred);
	let pred = pred.clone();

	let tag_id = if tag.is_empty() {
		ANY_TAG
	} else {
		match storage.lookup_string(txn, tag) {
			Ok(Some(id)) => id,
			Ok(None) => return Box::new(std::iter::empty()),
			Err(e) => return Box::new(std::iter::once(Err(e))),
		}
	};

	let verify = move |storage: &'db GroveGraphStorage,
	                   res: Result<Offset, GraphError>|
	      -> Option<Result<TraversalValue, GraphError>> {
		let off = match res {
			Ok(off) => off,
			Err(e) => return Some(Err(e)),
		};
		let item = Item { kind, off };
		match storage.check_property(txn, item, pred.key) {
			Ok(Some(value)) => match pred.matches(&value) {
				Ok(true) => Some(lift(storage, kind, off)),
				Ok(false) => None,
				Err(e) => Some(Err(e)),
			},
			Ok(None) => None,
			Err(e) => Some(Err(e)),
		}
	};

	if tag_id != ANY_TAG {
		let handle = match storage.find_index(kind, tag_id, key) {
			Ok(handle) => handle,
			Err(e) => return Box::new(std::iter::once(Err(e))),
		};
		if let Some(handle) = handle {
			let root = match AvlTree::root(storage, handle.root_loc()) {
				Ok(root) => root,
				Err(e) => return Box::new(std::iter::once(Err(e))),
			};
			let buckets = AvlTree::range_iter(storage, root, lo, hi, reverse);
			let iter = buckets
				.flat_map(move |res| match res {
					Ok((_key, bucket)) => Either::Left(ChunkList::iter(storage, bucket)),
					Err(e) => Either::Right(std::iter::once(Err(e))),
				})
				.filter_map(move |res| verify(storage, res));
			return Box::new(iter);
		}
		let iter = ChunkList::iter(
			storage,
			match storage.tag_head(kind, tag_id) {
				Ok(head) => head,
				Err(e) => return Box::new(std::iter::once(Err(e))),
			},
		)
		.filter_map(move |res| verify(storage, res));
		return Box::new(iter);
	}

	let pool = *storage.pools.for_kind(kind);
	let region = storage.regions.get(pool.region);
	let iter = pool
		.live_slots(region)
		.map(move |slot| Ok(pool.offset_of(slot)))
		.filter_map(move |res| verify(storage, res));
	Box::new(iter)
}
