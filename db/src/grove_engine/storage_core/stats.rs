use indexmap::IndexMap;

use crate::grove_engine::storage_core::GroveGraphStorage;
use crate::grove_engine::storage_core::index::avl::AvlTree;
use crate::grove_engine::storage_core::txn::RoTxn;
use crate::grove_engine::types::GraphError;
use crate::protocol::value::ValueKind;
use crate::utils::items::ItemKind;

/// Occupancy and health of one fixed pool or arena shard.
///
/// `health_factor` is the share of live objects among the slots the pool has
/// ever handed out; freed-but-unreclaimed slots drag it down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AllocatorStats {
	pub object_size: u64,
	pub num_objects: u64,
	pub total_allocated_bytes: u64,
	pub region_size: u64,
	pub occupancy: f64,
	pub health_factor: f64,
}

#[derive(Debug, Clone)]
pub struct IndexStats {
	pub kind: ItemKind,
	pub tag: String,
	pub key: String,
	pub value_kind: ValueKind,
	pub unique_keys: u64,
	pub total_entries: u64,
	pub height: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphStats {
	pub num_nodes: u64,
	pub num_edges: u64,
	pub num_strings: u32,
}

impl GroveGraphStorage {
	/// Per-allocator occupancy, keyed by a stable human-readable name.
	pub fn allocator_stats(
		&self,
		_txn: &RoTxn,
	) -> Result<IndexMap<String, AllocatorStats>, GraphError> {
		let mut out = IndexMap::new();
		for pool in [
			&self.pools.node,
			&self.pools.edge,
			&self.pools.prop_chunk,
			&self.pools.tree_node,
			&self.pools.bucket,
		] {
			let region = self.regions.get(pool.region);
			out.insert(format!("{:?}", pool.id).to_lowercase(), pool.stats(region)?);
		}
		let arena_region = self.regions.get(crate::grove_engine::storage_core::region::RegionId::Arena);
		for (i, stats) in self.arena.stats(arena_region)?.into_iter().enumerate() {
			out.insert(format!("arena{i}"), stats);
		}
		Ok(out)
	}

	/// Shape of every typed index: key cardinality, entry count, height.
	pub fn index_stats(&self, txn: &RoTxn) -> Result<Vec<IndexStats>, GraphError> {
		let mut out = Vec::new();
		for (kind, tag, key, handle) in self.all_indices()? {
			let root = AvlTree::root(self, handle.root_loc())?;
			let (height, unique_keys, total_entries) = AvlTree::check_invariants(self, root)?;
			out.push(IndexStats {
				kind,
				tag: self.string_name(txn, tag)?,
				key: self.string_name(txn, key)?,
				value_kind: handle.vkind,
				unique_keys,
				total_entries,
				height,
			});
		}
		Ok(out)
	}

	pub fn graph_stats(&self, _txn: &RoTxn) -> Result<GraphStats, GraphError> {
		let nodes = self.pools.node.stats(self.regions.get(self.pools.node.region))?;
		let edges = self.pools.edge.stats(self.regions.get(self.pools.edge.region))?;
		Ok(GraphStats {
			num_nodes: nodes.num_objects,
			num_edges: edges.num_objects,
			num_strings: self.strings.count(self)?,
		})
	}
}
