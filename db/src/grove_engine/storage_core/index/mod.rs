//! Index manager: the per-tag chunk lists that back unfiltered tag
//! iteration, and the optional typed AVL index per `(kind, tag, key)`.
//!
//! Index entries are weak: they hold object offsets and never own the
//! objects. Every mutation path in the property layer and the graph layer
//! calls back into this module so an index is never out of step with the
//! data it covers.

pub mod avl;
pub mod chunk_list;

use bytemuck::{Pod, Zeroable};
use tracing::debug;

use crate::grove_engine::storage_core::GroveGraphStorage;
use crate::grove_engine::storage_core::index::avl::{AvlTree, IndexKey};
use crate::grove_engine::storage_core::index::chunk_list::ChunkList;
use crate::grove_engine::storage_core::region::{Region, RegionId};
use crate::grove_engine::storage_core::string_table::StringId;
use crate::grove_engine::storage_core::txn::RwTxn;
use crate::grove_engine::types::{GraphError, gerr};
use crate::protocol::value::{Value, ValueKind};
use crate::utils::items::{Item, ItemKind, NULL_OFFSET, Offset};

pub(crate) const MAX_INDICES: u32 = 128;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(crate) struct IndexRootRec {
	pub max_indices: u32,
	pub tag_capacity: u32,
	pub descs_off: u64,
	pub node_tags_off: u64,
	pub edge_tags_off: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(crate) struct IndexDescRec {
	pub used: u8,
	pub kind: u8,
	pub vkind: u8,
	pub _pad: u8,
	pub tag: u16,
	pub key: u16,
	pub root: u64,
}

/// Byte offset of the tree-root pointer inside a descriptor.
const DESC_ROOT_FIELD: u64 = 8;

const DESC_SIZE: u64 = 16;

fn kind_code(kind: ItemKind) -> u8 {
	match kind {
		ItemKind::Node => 0,
		ItemKind::Edge => 1,
	}
}

fn indexable(vkind: ValueKind) -> bool {
	matches!(
		vkind,
		ValueKind::Boolean | ValueKind::I64 | ValueKind::F64 | ValueKind::String | ValueKind::Date
	)
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct IndexHandle {
	pub desc_off: Offset,
	pub vkind: ValueKind,
}

impl IndexHandle {
	pub fn root_loc(&self) -> Offset {
		self.desc_off + DESC_ROOT_FIELD
	}
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct IndexManager {
	root: Offset,
}

impl IndexManager {
	pub fn footprint(tag_capacity: u32) -> u64 {
		size_of::<IndexRootRec>() as u64
			+ MAX_INDICES as u64 * DESC_SIZE
			+ tag_capacity as u64 * 8 * 2
	}

	pub fn layout(root: Offset) -> IndexManager {
		IndexManager { root }
	}

	pub fn init(&self, region: &Region, tag_capacity: u32) -> Result<(), GraphError> {
		let descs_off = self.root + size_of::<IndexRootRec>() as u64;
		let node_tags_off = descs_off + MAX_INDICES as u64 * DESC_SIZE;
		let rec = IndexRootRec {
			max_indices: MAX_INDICES,
			tag_capacity,
			descs_off,
			node_tags_off,
			edge_tags_off: node_tags_off + tag_capacity as u64 * 8,
		};
		region.write_rec_raw(self.root, &rec)
	}

	fn root_rec(&self, storage: &GroveGraphStorage) -> Result<IndexRootRec, GraphError> {
		storage.regions.get(RegionId::Indices).read(self.root)
	}
}

impl GroveGraphStorage {
	/// Location of the chunk-list head for `(kind, tag)`.
	pub(crate) fn tag_head_loc(&self, kind: ItemKind, tag: StringId) -> Result<Offset, GraphError> {
		let rec = self.index_mgr.root_rec(self)?;
		if tag as u32 >= rec.tag_capacity {
			return Err(gerr!(InvalidId, "tag id {tag} beyond table capacity {}", rec.tag_capacity));
		}
		let base = match kind {
			ItemKind::Node => rec.node_tags_off,
			ItemKind::Edge => rec.edge_tags_off,
		};
		Ok(base + tag as u64 * 8)
	}

	pub(crate) fn tag_head(&self, kind: ItemKind, tag: StringId) -> Result<Offset, GraphError> {
		let loc = self.tag_head_loc(kind, tag)?;
		self.regions.get(RegionId::Indices).read(loc)
	}

	pub(crate) fn tag_list_insert(
		&self,
		txn: &mut RwTxn,
		kind: ItemKind,
		tag: StringId,
		off: Offset,
	) -> Result<(), GraphError> {
		let loc = self.tag_head_loc(kind, tag)?;
		ChunkList::insert(txn, loc, off)
	}

	pub(crate) fn tag_list_remove(
		&self,
		txn: &mut RwTxn,
		kind: ItemKind,
		tag: StringId,
		off: Offset,
	) -> Result<(), GraphError> {
		let loc = self.tag_head_loc(kind, tag)?;
		ChunkList::remove(txn, loc, off)?;
		Ok(())
	}

	/// Looks up the index on `(kind, tag, key)`, if one was created.
	pub(crate) fn find_index(
		&self,
		kind: ItemKind,
		tag: StringId,
		key: StringId,
	) -> Result<Option<IndexHandle>, GraphError> {
		let rec = self.index_mgr.root_rec(self)?;
		let region = self.regions.get(RegionId::Indices);
		for i in 0..rec.max_indices as u64 {
			let desc_off = rec.descs_off + i * DESC_SIZE;
			let desc: IndexDescRec = region.read(desc_off)?;
			if desc.used != 0
				&& desc.kind == kind_code(kind)
				&& desc.tag == tag
				&& desc.key == key
			{
				let vkind = ValueKind::from_u8(desc.vkind)
					.ok_or_else(|| gerr!(LayoutCorrupt, "index descriptor with value kind {}", desc.vkind))?;
				return Ok(Some(IndexHandle { desc_off, vkind }));
			}
		}
		Ok(None)
	}

	/// Creates an index over `(kind, tag, key)` with the declared value
	/// type, then populates it from the live objects of that tag.
	pub fn create_index(
		&self,
		txn: &mut RwTxn,
		kind: ItemKind,
		tag: &str,
		key: &str,
		vkind: ValueKind,
	) -> Result<(), GraphError> {
		if !indexable(vkind) {
			return Err(gerr!(PropertyTypeInvalid, "{} is not an indexable type", vkind.name()));
		}
		let tag_id = self.intern(txn, tag)?;
		let key_id = self.intern(txn, key)?;
		if self.find_index(kind, tag_id, key_id)?.is_some() {
			return Err(gerr!(IndexExists, "index on ({tag}, {key}) already exists"));
		}

		// Validate before any index write: every live object of the tag must
		// carry either no value or a value of the declared type.
		let head = self.tag_head(kind, tag_id)?;
		let offsets: Vec<Offset> = ChunkList::iter(self, head).collect::<Result<_, _>>()?;
		let mut seed = Vec::new();
		for off in offsets {
			let item = Item { kind, off };
			if let Some(value) = self.check_property(txn, item, key_id)? {
				if value.kind() != vkind {
					return Err(gerr!(
						TypeMismatch,
						"live {kind:?} of tag {tag} has {} value under {key}",
						value.kind().name()
					));
				}
				seed.push((off, value));
			}
		}

		let rec = self.index_mgr.root_rec(self)?;
		let region = self.regions.get(RegionId::Indices);
		let mut desc_off = None;
		for i in 0..rec.max_indices as u64 {
			let off = rec.descs_off + i * DESC_SIZE;
			let desc: IndexDescRec = region.read(off)?;
			if desc.used == 0 {
				desc_off = Some(off);
				break;
			}
		}
		let desc_off = desc_off
			.ok_or_else(|| gerr!(OutOfSpace, "all {} index descriptors in use", rec.max_indices))?;
		let desc = IndexDescRec {
			used: 1,
			kind: kind_code(kind),
			vkind: vkind.as_u8(),
			_pad: 0,
			tag: tag_id,
			key: key_id,
			root: NULL_OFFSET,
		};
		txn.write_rec(RegionId::Indices, desc_off, &desc)?;

		let handle = IndexHandle { desc_off, vkind };
		let seeded = seed.len();
		for (off, value) in seed {
			AvlTree::insert_entry(txn, handle.root_loc(), &IndexKey::from_value(&value)?, off)?;
		}
		debug!(tag, key, ?vkind, seeded, "index created");
		Ok(())
	}

	/// Property write hook: swaps the `(key, old)` entry for `(key, new)` in
	/// one step so the index never disagrees with the property list.
	pub(crate) fn index_on_set(
		&self,
		txn: &mut RwTxn,
		item: Item,
		tag: StringId,
		key: StringId,
		old: Option<&Value>,
		new: &Value,
	) -> Result<(), GraphError> {
		let Some(handle) = self.find_index(item.kind, tag, key)? else {
			return Ok(());
		};
		if new.kind() != handle.vkind {
			return Err(gerr!(
				TypeMismatch,
				"index expects {}, got {}",
				handle.vkind.name(),
				new.kind().name()
			));
		}
		if let Some(old) = old
			&& old.kind() == handle.vkind
		{
			AvlTree::remove_entry(txn, handle.root_loc(), &IndexKey::from_value(old)?, item.off)?;
		}
		AvlTree::insert_entry(txn, handle.root_loc(), &IndexKey::from_value(new)?, item.off)
	}

	/// Property removal hook.
	pub(crate) fn index_on_remove(
		&self,
		txn: &mut RwTxn,
		item: Item,
		tag: StringId,
		key: StringId,
		old: &Value,
	) -> Result<(), GraphError> {
		let Some(handle) = self.find_index(item.kind, tag, key)? else {
			return Ok(());
		};
		if old.kind() == handle.vkind {
			AvlTree::remove_entry(txn, handle.root_loc(), &IndexKey::from_value(old)?, item.off)?;
		}
		Ok(())
	}

	/// Drops every index entry of an object that is about to be removed.
	pub(crate) fn remove_item_from_indices(
		&self,
		txn: &mut RwTxn,
		item: Item,
		tag: StringId,
	) -> Result<(), GraphError> {
		let props = self.collect_properties(item)?;
		for (key, value) in props {
			self.index_on_remove(txn, item, tag, key, &value)?;
		}
		Ok(())
	}

	/// The typed index handles currently defined, for stats and tests.
	pub(crate) fn all_indices(
		&self,
	) -> Result<Vec<(ItemKind, StringId, StringId, IndexHandle)>, GraphError> {
		let rec = self.index_mgr.root_rec(self)?;
		let region = self.regions.get(RegionId::Indices);
		let mut out = Vec::new();
		for i in 0..rec.max_indices as u64 {
			let desc_off = rec.descs_off + i * DESC_SIZE;
			let desc: IndexDescRec = region.read(desc_off)?;
			if desc.used == 0 {
				continue;
			}
			let kind = if desc.kind == 0 { ItemKind::Node } else { ItemKind::Edge };
			let vkind = ValueKind::from_u8(desc.vkind)
				.ok_or_else(|| gerr!(LayoutCorrupt, "index descriptor with value kind {}", desc.vkind))?;
			out.push((kind, desc.tag, desc.key, IndexHandle { desc_off, vkind }));
		}
		Ok(out)
	}
}
