use tempfile::TempDir;

use crate::grove_engine::storage_core::{GroveGraphStorage, OpenMode};
use crate::grove_engine::traversal_core::config::GraphConfig;

pub fn small_config() -> GraphConfig {
	GraphConfig {
		allocator_region_size: 1024 * 1024,
		num_allocators: 2,
		default_region_size: 2 * 1024 * 1024,
		no_msync: false,
		max_string_id: 1024,
	}
}

pub fn setup_graph() -> (TempDir, GroveGraphStorage) {
	let dir = TempDir::new().unwrap();
	let storage = GroveGraphStorage::open(
		dir.path().join("graph"),
		OpenMode::Create,
		Some(small_config()),
	)
	.unwrap();
	(dir, storage)
}
