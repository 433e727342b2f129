//! # Storage Core
//!
//! ## Purpose
//! Persistent graph storage over a set of memory-mapped region files.
//! Handles raw node/edge CRUD, property chunks, the string table, the undo
//! journal and the indexing hooks.
//!
//! ## Mental model
//! The graph lives byte-for-byte inside eight region files. Every persistent
//! reference is a byte offset into one region, so a reopen may land the
//! mappings anywhere. Fixed records (nodes, edges, property chunks, tree
//! nodes, list buckets) come from bitmap pools; variable payloads come from
//! a sharded arena. Every write inside a transaction records its pre-image
//! in the journal first, which is what makes abort and crash recovery work.
//!
//! ## Key types
//! | Type | Description |
//! | --- | --- |
//! | `GroveGraphStorage` | Main entry point for storage operations. |
//! | `RoTxn` / `RwTxn` | Read and write transactions over one open graph. |
//! | `FixedPool` / `VariableArena` | The two allocator families. |
//!
//! ## Invariants
//! - Pre-images are journalled before live bytes change.
//!   - Enforced in: `RwTxn::write`.
//!   - Tested by: `storage_core_tests::test_abort_restores_byte_image`.
//!   - Failure symptom: aborted or crashed transactions leave partial state.
//! - Adjacency chains stay doubly linked and loop-free.
//!   - Enforced in: `GroveGraphStorage::{add_edge, unlink_edge}`.
//!   - Tested by: `storage_core_tests::test_remove_node_removes_incident_edges`.
//!   - Failure symptom: traversal misses or repeats edges after removal.
//! - Indices never disagree with the property lists.
//!   - Enforced in: the `index_on_set` / `index_on_remove` hooks.
//!   - Tested by: `grove_engine::tests::index_tests`.
//!   - Failure symptom: indexed queries return removed or stale objects.
//!
//! ## Concurrency & ordering
//! - One writer at a time; readers share the commit lock's read side.
//! - Allocator shards and index trees have their own short-lived locks.

pub mod allocator;
pub mod index;
pub mod journal;
pub mod props;
pub mod region;
pub mod stats;
pub mod storage_methods;
pub mod string_table;
pub mod txn;


use std::path::Path;

use bytemuck::{Pod, Zeroable};
use tracing::info;

use crate::grove_engine::storage_core::allocator::{FixedPool, PoolId, VariableArena};
use crate::grove_engine::storage_core::index::IndexManager;
use crate::grove_engine::storage_core::journal::Journal;
use crate::grove_engine::storage_core::region::{
	REGION_DATA_OFF, Region, RegionId, RegionMap, VERSION_MAJOR, VERSION_MINOR,
};
use crate::grove_engine::storage_core::string_table::{ANY_TAG, StringId, StringTable};
use crate::grove_engine::storage_core::txn::{RoTxn, RwTxn, TransactionManager};
use crate::grove_engine::traversal_core::config::GraphConfig;
use crate::grove_engine::types::{GraphError, gerr};
use crate::utils::items::{Direction, Edge, EdgeId, Item, ItemKind, NULL_OFFSET, Node, NodeId, Offset};

pub(crate) const NODE_SIZE: u32 = 32;
pub(crate) const EDGE_SIZE: u32 = 64;
pub(crate) const PROP_CHUNK_SIZE: u32 = 80;
pub(crate) const TREE_NODE_SIZE: u32 = 48;
pub(crate) const BUCKET_SIZE: u32 = 80;

const JOURNAL_SLOT_BYTES: u64 = 256 * 1024;

const NODE_PROPS_FIELD: u64 = 8;
const NODE_OUT_FIELD: u64 = 16;
const NODE_IN_FIELD: u64 = 24;
const EDGE_PROPS_FIELD: u64 = 24;
const EDGE_NEXT_OUT_FIELD: u64 = 32;
const EDGE_PREV_OUT_FIELD: u64 = 40;
const EDGE_NEXT_IN_FIELD: u64 = 48;
const EDGE_PREV_IN_FIELD: u64 = 56;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(crate) struct NodeRec {
	pub tag: u16,
	pub _pad: [u8; 6],
	pub props: u64,
	pub out_head: u64,
	pub in_head: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(crate) struct EdgeRec {
	pub tag: u16,
	pub _pad: [u8; 6],
	pub src: u64,
	pub dst: u64,
	pub props: u64,
	pub next_out: u64,
	pub prev_out: u64,
	pub next_in: u64,
	pub prev_in: u64,
}

/// The graph root record at a fixed offset of the meta region. Everything an
/// open needs to find again lives here.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(crate) struct GraphRootRec {
	pub version_major: u16,
	pub version_minor: u16,
	pub flags: u32,
	pub allocator_region_size: u64,
	pub default_region_size: u64,
	pub num_allocators: u32,
	pub max_string_id: u32,
	pub node_pool: u64,
	pub edge_pool: u64,
	pub prop_pool: u64,
	pub tree_pool: u64,
	pub bucket_pool: u64,
	pub string_root: u64,
	pub index_root: u64,
	pub txn_counter: u64,
}

const FLAG_NO_MSYNC: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
	ReadOnly,
	ReadWrite,
	Create,
}

#[derive(Debug)]
pub(crate) struct Pools {
	pub node: FixedPool,
	pub edge: FixedPool,
	pub prop_chunk: FixedPool,
	pub tree_node: FixedPool,
	pub bucket: FixedPool,
}

impl Pools {
	pub fn get(&self, id: PoolId) -> &FixedPool {
		match id {
			PoolId::Node => &self.node,
			PoolId::Edge => &self.edge,
			PoolId::PropChunk => &self.prop_chunk,
			PoolId::TreeNode => &self.tree_node,
			PoolId::Bucket => &self.bucket,
		}
	}

	pub fn for_kind(&self, kind: ItemKind) -> &FixedPool {
		match kind {
			ItemKind::Node => &self.node,
			ItemKind::Edge => &self.edge,
		}
	}
}

/// One open graph: the mapped regions plus the in-memory descriptors needed
/// to address them. Clients share it across threads and talk to it through
/// transactions.
#[derive(Debug)]
pub struct GroveGraphStorage {
	pub(crate) regions: RegionMap,
	pub(crate) journal: Journal,
	pub(crate) txn_mgr: TransactionManager,
	pub(crate) pools: Pools,
	pub(crate) arena: VariableArena,
	pub(crate) strings: StringTable,
	pub(crate) index_mgr: IndexManager,
	pub(crate) read_only: bool,
	pub(crate) msync: bool,
	config: GraphConfig,
}

fn page_align(bytes: u64) -> u64 {
	bytes.next_multiple_of(region::PAGE_SIZE)
}

impl GroveGraphStorage {
	/// Opens or creates the graph directory at `path`.
	pub fn open(
		path: impl AsRef<Path>,
		mode: OpenMode,
		config: Option<GraphConfig>,
	) -> Result<GroveGraphStorage, GraphError> {
		let path = path.as_ref();
		match mode {
			OpenMode::Create => Self::create(path, config.unwrap_or_default()),
			OpenMode::ReadWrite | OpenMode::ReadOnly => {
				Self::open_existing(path, mode == OpenMode::ReadOnly)
			}
		}
	}

	fn create(path: &Path, config: GraphConfig) -> Result<GroveGraphStorage, GraphError> {
		config.validate()?;
		std::fs::create_dir_all(path)?;

		let node_slots = config.default_region_size / NODE_SIZE as u64;
		let edge_slots = config.default_region_size / EDGE_SIZE as u64;
		let chunk_slots = config.default_region_size / PROP_CHUNK_SIZE as u64;
		let tree_slots = config.default_region_size / (2 * TREE_NODE_SIZE as u64);
		let bucket_slots = config.default_region_size / (2 * BUCKET_SIZE as u64);

		let index_root = REGION_DATA_OFF;
		let tree_pool_base =
			(index_root + IndexManager::footprint(config.max_string_id)).next_multiple_of(8);
		let bucket_pool_base =
			(tree_pool_base + FixedPool::footprint(TREE_NODE_SIZE, tree_slots)).next_multiple_of(8);

		let sizes = [
			(RegionId::Meta, page_align(REGION_DATA_OFF + 4096)),
			(
				RegionId::Journal,
				page_align(REGION_DATA_OFF + journal::JOURNAL_SLOTS as u64 * JOURNAL_SLOT_BYTES),
			),
			(
				RegionId::Nodes,
				page_align(REGION_DATA_OFF + FixedPool::footprint(NODE_SIZE, node_slots)),
			),
			(
				RegionId::Edges,
				page_align(REGION_DATA_OFF + FixedPool::footprint(EDGE_SIZE, edge_slots)),
			),
			(
				RegionId::Props,
				page_align(REGION_DATA_OFF + FixedPool::footprint(PROP_CHUNK_SIZE, chunk_slots)),
			),
			(
				RegionId::Arena,
				page_align(
					REGION_DATA_OFF
						+ config.num_allocators as u64 * config.allocator_region_size,
				),
			),
			(
				RegionId::Strings,
				page_align(REGION_DATA_OFF + StringTable::footprint(config.max_string_id)),
			),
			(
				RegionId::Indices,
				page_align(bucket_pool_base + FixedPool::footprint(BUCKET_SIZE, bucket_slots)),
			),
		];

		let map = RegionMap::create(path, &sizes)?;

		let pools = Pools {
			node: FixedPool::layout(PoolId::Node, RegionId::Nodes, REGION_DATA_OFF, NODE_SIZE, node_slots),
			edge: FixedPool::layout(PoolId::Edge, RegionId::Edges, REGION_DATA_OFF, EDGE_SIZE, edge_slots),
			prop_chunk: FixedPool::layout(
				PoolId::PropChunk,
				RegionId::Props,
				REGION_DATA_OFF,
				PROP_CHUNK_SIZE,
				chunk_slots,
			),
			tree_node: FixedPool::layout(
				PoolId::TreeNode,
				RegionId::Indices,
				tree_pool_base,
				TREE_NODE_SIZE,
				tree_slots,
			),
			bucket: FixedPool::layout(
				PoolId::Bucket,
				RegionId::Indices,
				bucket_pool_base,
				BUCKET_SIZE,
				bucket_slots,
			),
		};
		pools.node.init(map.get(RegionId::Nodes))?;
		pools.edge.init(map.get(RegionId::Edges))?;
		pools.prop_chunk.init(map.get(RegionId::Props))?;
		pools.tree_node.init(map.get(RegionId::Indices))?;
		pools.bucket.init(map.get(RegionId::Indices))?;

		let strings = StringTable::layout(REGION_DATA_OFF, config.max_string_id);
		strings.init(map.get(RegionId::Strings))?;

		let index_mgr = IndexManager::layout(index_root);
		index_mgr.init(map.get(RegionId::Indices), config.max_string_id)?;

		let arena = VariableArena::layout(
			REGION_DATA_OFF,
			config.allocator_region_size,
			config.num_allocators,
		);
		arena.init(map.get(RegionId::Arena), config.allocator_region_size)?;

		let root = GraphRootRec {
			version_major: VERSION_MAJOR,
			version_minor: VERSION_MINOR,
			flags: if config.no_msync { FLAG_NO_MSYNC } else { 0 },
			allocator_region_size: config.allocator_region_size,
			default_region_size: config.default_region_size,
			num_allocators: config.num_allocators,
			max_string_id: config.max_string_id,
			node_pool: pools.node.base,
			edge_pool: pools.edge.base,
			prop_pool: pools.prop_chunk.base,
			tree_pool: pools.tree_node.base,
			bucket_pool: pools.bucket.base,
			string_root: REGION_DATA_OFF,
			index_root,
			txn_counter: 1,
		};
		map.get(RegionId::Meta).write_rec_raw(REGION_DATA_OFF, &root)?;
		if !config.no_msync {
			for (id, _) in &sizes {
				map.get(*id).flush_range(0, map.get(*id).len() as usize)?;
			}
		}

		let journal = Journal::new(map.get(RegionId::Journal).len());
		info!(path = %path.display(), "graph created");
		Ok(GroveGraphStorage {
			regions: map,
			journal,
			txn_mgr: TransactionManager::new(),
			pools,
			arena,
			strings,
			index_mgr,
			read_only: false,
			msync: !config.no_msync,
			config,
		})
	}

	fn open_existing(path: &Path, read_only: bool) -> Result<GroveGraphStorage, GraphError> {
		if !path.is_dir() {
			return Err(gerr!(NotFound, "no graph at {}", path.display()));
		}
		// The mapping stays writable even for read-only opens: recovery of an
		// unfinished journal must be able to restore pre-images.
		let map = RegionMap::open(path, true)?;
		let root: GraphRootRec = map.get(RegionId::Meta).read(REGION_DATA_OFF)?;
		if root.version_major != VERSION_MAJOR {
			return Err(gerr!(
				VersionMismatch,
				"graph root is v{}.{}, engine is v{}.{}",
				root.version_major,
				root.version_minor,
				VERSION_MAJOR,
				VERSION_MINOR
			));
		}
		let config = GraphConfig {
			allocator_region_size: root.allocator_region_size,
			num_allocators: root.num_allocators,
			default_region_size: root.default_region_size,
			no_msync: root.flags & FLAG_NO_MSYNC != 0,
			max_string_id: root.max_string_id,
		};
		config.validate()?;

		let journal = Journal::new(map.get(RegionId::Journal).len());
		journal.recover(&map, !config.no_msync)?;

		let pools = Pools {
			node: FixedPool::open(PoolId::Node, RegionId::Nodes, root.node_pool, NODE_SIZE, map.get(RegionId::Nodes))?,
			edge: FixedPool::open(PoolId::Edge, RegionId::Edges, root.edge_pool, EDGE_SIZE, map.get(RegionId::Edges))?,
			prop_chunk: FixedPool::open(
				PoolId::PropChunk,
				RegionId::Props,
				root.prop_pool,
				PROP_CHUNK_SIZE,
				map.get(RegionId::Props),
			)?,
			tree_node: FixedPool::open(
				PoolId::TreeNode,
				RegionId::Indices,
				root.tree_pool,
				TREE_NODE_SIZE,
				map.get(RegionId::Indices),
			)?,
			bucket: FixedPool::open(
				PoolId::Bucket,
				RegionId::Indices,
				root.bucket_pool,
				BUCKET_SIZE,
				map.get(RegionId::Indices),
			)?,
		};
		let strings = StringTable::open(map.get(RegionId::Strings), root.string_root)?;
		let arena = VariableArena::layout(
			REGION_DATA_OFF,
			config.allocator_region_size,
			config.num_allocators,
		);

		info!(path = %path.display(), read_only, "graph opened");
		Ok(GroveGraphStorage {
			regions: map,
			journal,
			txn_mgr: TransactionManager::new(),
			pools,
			arena,
			strings,
			index_mgr: IndexManager::layout(root.index_root),
			read_only,
			msync: !config.no_msync,
			config,
		})
	}

	pub fn config(&self) -> &GraphConfig {
		&self.config
	}

	fn node_region(&self) -> &Region {
		self.regions.get(RegionId::Nodes)
	}

	fn edge_region(&self) -> &Region {
		self.regions.get(RegionId::Edges)
	}

	pub(crate) fn ensure_live(&self, item: Item) -> Result<(), GraphError> {
		let pool = self.pools.for_kind(item.kind);
		let region = self.regions.get(pool.region);
		if !pool.is_live_off(region, item.off) {
			return Err(gerr!(VacantIterator, "{:?} at {} was removed", item.kind, item.off));
		}
		Ok(())
	}

	pub(crate) fn item_tag(&self, item: Item) -> Result<StringId, GraphError> {
		let region = self.regions.get(self.pools.for_kind(item.kind).region);
		region.read::<u16>(item.off)
	}

	pub(crate) fn props_head(&self, item: Item) -> Result<Offset, GraphError> {
		let field = match item.kind {
			ItemKind::Node => NODE_PROPS_FIELD,
			ItemKind::Edge => EDGE_PROPS_FIELD,
		};
		let region = self.regions.get(self.pools.for_kind(item.kind).region);
		region.read(item.off + field)
	}

	pub(crate) fn set_props_head(
		&self,
		txn: &mut RwTxn,
		item: Item,
		head: Offset,
	) -> Result<(), GraphError> {
		let (region, field) = match item.kind {
			ItemKind::Node => (RegionId::Nodes, NODE_PROPS_FIELD),
			ItemKind::Edge => (RegionId::Edges, EDGE_PROPS_FIELD),
		};
		txn.write_u64(region, item.off + field, head)
	}

	pub(crate) fn node_at(&self, off: Offset) -> Result<Node, GraphError> {
		self.ensure_live(Item {
			kind: ItemKind::Node,
			off,
		})?;
		let rec: NodeRec = self.node_region().read(off)?;
		Ok(Node { off, tag: rec.tag })
	}

	pub(crate) fn edge_at(&self, off: Offset) -> Result<Edge, GraphError> {
		self.ensure_live(Item {
			kind: ItemKind::Edge,
			off,
		})?;
		let rec: EdgeRec = self.edge_region().read(off)?;
		Ok(Edge {
			off,
			tag: rec.tag,
			src: rec.src,
			dst: rec.dst,
		})
	}

	/// Adds a node with the given tag name; an empty tag means untagged.
	pub fn add_node(&self, txn: &mut RwTxn, tag: &str) -> Result<Node, GraphError> {
		let tag_id = if tag.is_empty() { ANY_TAG } else { self.intern(txn, tag)? };
		self.add_node_with(txn, tag_id)
	}

	pub fn add_node_with(&self, txn: &mut RwTxn, tag: StringId) -> Result<Node, GraphError> {
		let off = self.pools.node.alloc(txn)?;
		let rec = NodeRec {
			tag,
			_pad: [0; 6],
			props: NULL_OFFSET,
			out_head: NULL_OFFSET,
			in_head: NULL_OFFSET,
		};
		txn.write_rec(RegionId::Nodes, off, &rec)?;
		if tag != ANY_TAG {
			self.tag_list_insert(txn, ItemKind::Node, tag, off)?;
		}
		Ok(Node { off, tag })
	}

	/// Adds a directed edge, threading it onto the source's outgoing chain
	/// and the destination's incoming chain.
	pub fn add_edge(
		&self,
		txn: &mut RwTxn,
		src: &Node,
		dst: &Node,
		tag: &str,
	) -> Result<Edge, GraphError> {
		let tag_id = if tag.is_empty() { ANY_TAG } else { self.intern(txn, tag)? };
		self.add_edge_with(txn, src, dst, tag_id)
	}

	pub fn add_edge_with(
		&self,
		txn: &mut RwTxn,
		src: &Node,
		dst: &Node,
		tag: StringId,
	) -> Result<Edge, GraphError> {
		self.ensure_live(src.item())?;
		self.ensure_live(dst.item())?;
		let out_head: u64 = self.node_region().read(src.off + NODE_OUT_FIELD)?;
		let in_head: u64 = self.node_region().read(dst.off + NODE_IN_FIELD)?;

		let off = self.pools.edge.alloc(txn)?;
		let rec = EdgeRec {
			tag,
			_pad: [0; 6],
			src: src.off,
			dst: dst.off,
			props: NULL_OFFSET,
			next_out: out_head,
			prev_out: NULL_OFFSET,
			next_in: in_head,
			prev_in: NULL_OFFSET,
		};
		txn.write_rec(RegionId::Edges, off, &rec)?;
		if out_head != NULL_OFFSET {
			txn.write_u64(RegionId::Edges, out_head + EDGE_PREV_OUT_FIELD, off)?;
		}
		txn.write_u64(RegionId::Nodes, src.off + NODE_OUT_FIELD, off)?;
		if in_head != NULL_OFFSET {
			txn.write_u64(RegionId::Edges, in_head + EDGE_PREV_IN_FIELD, off)?;
		}
		txn.write_u64(RegionId::Nodes, dst.off + NODE_IN_FIELD, off)?;

		if tag != ANY_TAG {
			self.tag_list_insert(txn, ItemKind::Edge, tag, off)?;
		}
		Ok(Edge {
			off,
			tag,
			src: src.off,
			dst: dst.off,
		})
	}

	fn unlink_edge(&self, txn: &mut RwTxn, rec: &EdgeRec) -> Result<(), GraphError> {
		if rec.prev_out == NULL_OFFSET {
			txn.write_u64(RegionId::Nodes, rec.src + NODE_OUT_FIELD, rec.next_out)?;
		} else {
			txn.write_u64(RegionId::Edges, rec.prev_out + EDGE_NEXT_OUT_FIELD, rec.next_out)?;
		}
		if rec.next_out != NULL_OFFSET {
			txn.write_u64(RegionId::Edges, rec.next_out + EDGE_PREV_OUT_FIELD, rec.prev_out)?;
		}
		if rec.prev_in == NULL_OFFSET {
			txn.write_u64(RegionId::Nodes, rec.dst + NODE_IN_FIELD, rec.next_in)?;
		} else {
			txn.write_u64(RegionId::Edges, rec.prev_in + EDGE_NEXT_IN_FIELD, rec.next_in)?;
		}
		if rec.next_in != NULL_OFFSET {
			txn.write_u64(RegionId::Edges, rec.next_in + EDGE_PREV_IN_FIELD, rec.prev_in)?;
		}
		Ok(())
	}

	fn remove_edge_at(&self, txn: &mut RwTxn, off: Offset) -> Result<(), GraphError> {
		let rec: EdgeRec = self.edge_region().read(off)?;
		let item = Item {
			kind: ItemKind::Edge,
			off,
		};
		self.remove_item_from_indices(txn, item, rec.tag)?;
		if rec.tag != ANY_TAG {
			self.tag_list_remove(txn, ItemKind::Edge, rec.tag, off)?;
		}
		self.unlink_edge(txn, &rec)?;
		self.free_property_list(txn, item)?;
		self.pools.edge.free(txn, off)
	}

	/// Removes an edge: index entries, adjacency links, properties, record.
	pub fn remove_edge(&self, txn: &mut RwTxn, edge: &Edge) -> Result<(), GraphError> {
		self.ensure_live(edge.item())?;
		self.remove_edge_at(txn, edge.off)
	}

	/// Removes a node and all its incident edges atomically.
	pub fn remove_node(&self, txn: &mut RwTxn, node: &Node) -> Result<(), GraphError> {
		self.ensure_live(node.item())?;

		let mut incident = Vec::new();
		let mut cur: u64 = self.node_region().read(node.off + NODE_OUT_FIELD)?;
		while cur != NULL_OFFSET {
			incident.push(cur);
			cur = self.edge_region().read(cur + EDGE_NEXT_OUT_FIELD)?;
		}
		let mut cur: u64 = self.node_region().read(node.off + NODE_IN_FIELD)?;
		while cur != NULL_OFFSET {
			// A self-loop threads both chains but must be removed once.
			if !incident.contains(&cur) {
				incident.push(cur);
			}
			cur = self.edge_region().read(cur + EDGE_NEXT_IN_FIELD)?;
		}
		for edge_off in incident {
			self.remove_edge_at(txn, edge_off)?;
		}

		let item = node.item();
		let tag = self.item_tag(item)?;
		self.remove_item_from_indices(txn, item, tag)?;
		if tag != ANY_TAG {
			self.tag_list_remove(txn, ItemKind::Node, tag, node.off)?;
		}
		self.free_property_list(txn, item)?;
		self.pools.node.free(txn, node.off)
	}

	/// Stable-for-session id of a node: its slot index in the node pool.
	pub fn get_node_id(&self, node: &Node) -> NodeId {
		self.pools.node.slot_of(node.off)
	}

	pub fn get_edge_id(&self, edge: &Edge) -> EdgeId {
		self.pools.edge.slot_of(edge.off)
	}

	/// Walks one or both adjacency chains of a node. Tag 0 accepts all tags.
	pub fn get_edges<'db>(
		&'db self,
		_txn: &RoTxn,
		node: &Node,
		dir: Direction,
		tag: StringId,
	) -> Result<EdgeChainIter<'db>, GraphError> {
		self.ensure_live(node.item())?;
		let out_head: u64 = self.node_region().read(node.off + NODE_OUT_FIELD)?;
		let in_head: u64 = self.node_region().read(node.off + NODE_IN_FIELD)?;
		let (cur, in_chain, second) = match dir {
			Direction::Outgoing => (out_head, false, None),
			Direction::Incoming => (in_head, true, None),
			Direction::Any => (out_head, false, Some(in_head)),
		};
		Ok(EdgeChainIter {
			storage: self,
			cur,
			in_chain,
			second_chain: second,
			second_pass: false,
			tag,
		})
	}
}

/// Lazy walk over a node's adjacency. For `Direction::Any` the outgoing
/// chain runs first, then the incoming one with self-loops skipped so each
/// edge appears once.
#[derive(Debug)]
pub struct EdgeChainIter<'db> {
	storage: &'db GroveGraphStorage,
	cur: Offset,
	in_chain: bool,
	second_chain: Option<Offset>,
	second_pass: bool,
	tag: StringId,
}

impl Iterator for EdgeChainIter<'_> {
	type Item = Result<Edge, GraphError>;

	fn next(&mut self) -> Option<Self::Item> {
		loop {
			if self.cur == NULL_OFFSET {
				match self.second_chain.take() {
					Some(head) => {
						self.cur = head;
						self.in_chain = true;
						self.second_pass = true;
						continue;
					}
					None => return None,
				}
			}
			let off = self.cur;
			let rec: EdgeRec = match self.storage.edge_region().read(off) {
				Ok(rec) => rec,
				Err(e) => {
					self.cur = NULL_OFFSET;
					self.second_chain = None;
					return Some(Err(e));
				}
			};
			self.cur = if self.in_chain { rec.next_in } else { rec.next_out };

			if self.tag != ANY_TAG && rec.tag != self.tag {
				continue;
			}
			// Second pass of an Any walk: self-loops already came up once.
			if self.second_pass && rec.src == rec.dst {
				continue;
			}
			return Some(Ok(Edge {
				off,
				tag: rec.tag,
				src: rec.src,
				dst: rec.dst,
			}));
		}
	}
}
