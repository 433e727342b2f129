//! # Traversal Core
//!
//! ## Purpose
//! The query layer: lazy iterator pipelines over nodes, edges, properties
//! and paths, with predicate dispatch into the indices.
//!
//! ## Mental model
//! A traversal starts from a source adapter (`n_from_tag`, `n_from_index`,
//! …) and flows through adapter traits, one per op file under `ops/`. Each
//! adapter consumes the pipeline and returns a new one wrapping its own
//! iterator, so nothing runs until the caller drains the stream.
//!
//! ## Key types
//! | Type | Description |
//! | --- | --- |
//! | `GroveGraphEngine` | Owns the shared storage handle. |
//! | `TraversalValue` | A node, edge, path or property value in flight. |
//! | `RoTraversalIterator` / `RwTraversalIterator` | The pipeline wrappers. |
//!
//! ## Invariants
//! - Filters never reorder the stream; delivery order is the source's.
//! - Index-driven and scan-driven selection agree on their result sets.
//!   - Tested by: `grove_engine::tests::index_tests::test_all_predicate_ops_agree_with_scan`.

pub mod config;
pub mod ops;
pub mod traversal_iter;
pub mod traversal_value;

use std::path::Path;
use std::sync::Arc;

use crate::grove_engine::storage_core::{GroveGraphStorage, OpenMode};
use crate::grove_engine::traversal_core::config::GraphConfig;
use crate::grove_engine::types::GraphError;

pub struct GroveGraphEngine {
	pub storage: Arc<GroveGraphStorage>,
}

#[derive(Default, Clone)]
pub struct GroveGraphEngineOpts {
	pub path: String,
	pub config: Option<GraphConfig>,
}

impl GroveGraphEngine {
	pub fn new(opts: GroveGraphEngineOpts, mode: OpenMode) -> Result<GroveGraphEngine, GraphError> {
		let storage = GroveGraphStorage::open(Path::new(&opts.path), mode, opts.config)?;
		Ok(GroveGraphEngine {
			storage: Arc::new(storage),
		})
	}
}
