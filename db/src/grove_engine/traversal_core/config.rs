use serde::{Deserialize, Serialize};

use crate::grove_engine::types::{GraphError, gerr};

const MIB: u64 = 1024 * 1024;

fn default_allocator_region_size() -> u64 {
	16 * MIB
}

fn default_num_allocators() -> u32 {
	4
}

fn default_region_size() -> u64 {
	16 * MIB
}

fn default_max_string_id() -> u32 {
	4096
}

/// Creation-time sizing knobs. Persisted into the graph root, so reopening
/// ignores whatever is passed and uses what the graph was built with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GraphConfig {
	/// Per-shard size of the variable arena.
	pub allocator_region_size: u64,
	/// Number of arena shards; a power of two spreads contention best.
	pub num_allocators: u32,
	/// Starting size for each fixed-object pool.
	pub default_region_size: u64,
	/// Skip synchronous persistence barriers (benchmark mode).
	pub no_msync: bool,
	/// Cap on interned strings, tag table width included.
	pub max_string_id: u32,
}

impl Default for GraphConfig {
	fn default() -> Self {
		GraphConfig {
			allocator_region_size: default_allocator_region_size(),
			num_allocators: default_num_allocators(),
			default_region_size: default_region_size(),
			no_msync: false,
			max_string_id: default_max_string_id(),
		}
	}
}

impl GraphConfig {
	/// Parses a JSON configuration blob.
	pub fn from_json(text: &str) -> Result<GraphConfig, GraphError> {
		let config: GraphConfig = sonic_rs::from_str(text)
			.map_err(|e| gerr!(LoaderParseError, "bad graph config: {e}"))?;
		config.validate()?;
		Ok(config)
	}

	pub(crate) fn validate(&self) -> Result<(), GraphError> {
		if self.num_allocators == 0 {
			return Err(gerr!(RangeError, "num_allocators must be at least 1"));
		}
		if self.allocator_region_size < MIB || self.default_region_size < MIB {
			return Err(gerr!(RangeError, "region sizes below 1 MiB are not usable"));
		}
		if self.max_string_id < 16 || self.max_string_id > u16::MAX as u32 {
			return Err(gerr!(RangeError, "max_string_id must be in 16..=65535"));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::GraphConfig;
	use crate::grove_engine::types::ErrorKind;

	#[test]
	fn test_defaults_validate() {
		GraphConfig::default().validate().unwrap();
	}

	#[test]
	fn test_json_roundtrip_and_partial() {
		let cfg = GraphConfig::from_json(r#"{"num_allocators": 2, "no_msync": true}"#).unwrap();
		assert_eq!(cfg.num_allocators, 2);
		assert!(cfg.no_msync);
		assert_eq!(cfg.max_string_id, GraphConfig::default().max_string_id);
	}

	#[test]
	fn test_bad_json_is_loader_parse_error() {
		let err = GraphConfig::from_json("{nope").unwrap_err();
		assert_eq!(err.kind, ErrorKind::LoaderParseError);
	}

	#[test]
	fn test_zero_allocators_rejected() {
		let err = GraphConfig::from_json(r#"{"num_allocators": 0}"#).unwrap_err();
		assert_eq!(err.kind, ErrorKind::RangeError);
	}
}
