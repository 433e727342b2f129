use tempfile::TempDir;

use crate::grove_engine::storage_core::{GroveGraphStorage, OpenMode};
use crate::grove_engine::tests::test_utils::small_config;
use crate::grove_engine::traversal_core::ops::g::G;
use crate::grove_engine::traversal_core::ops::source::n_from_tag::NFromTagAdapter;
use crate::protocol::value::Value;

const REGION_FILES: [&str; 8] =
	["meta", "journal", "nodes", "edges", "props", "arena", "strings", "indices"];

fn graph_image(dir: &TempDir) -> Vec<Vec<u8>> {
	REGION_FILES
		.iter()
		.map(|name| std::fs::read(dir.path().join("graph").join(name)).unwrap())
		.collect()
}

/// A process death mid-transaction: the write transaction is leaked so no
/// abort runs, the handle is dropped, and the next open must roll back.
#[test]
fn test_crash_before_commit_rolls_back() {
	let dir = TempDir::new().unwrap();
	let path = dir.path().join("graph");

	let key;
	{
		let storage =
			GroveGraphStorage::open(&path, OpenMode::Create, Some(small_config())).unwrap();
		let mut txn = storage.write_txn().unwrap();
		key = storage.intern(&mut txn, "id").unwrap();
		for id in 1..=3i64 {
			let node = storage.add_node(&mut txn, "Person").unwrap();
			storage.set_property(&mut txn, node.item(), key, Value::I64(id)).unwrap();
		}
		txn.commit().unwrap();

		let mut txn = storage.write_txn().unwrap();
		let d = storage.add_node(&mut txn, "Person").unwrap();
		storage.set_property(&mut txn, d.item(), key, Value::I64(4)).unwrap();
		// Simulated crash: no commit, no abort.
		std::mem::forget(txn);
	}

	let storage = GroveGraphStorage::open(&path, OpenMode::ReadOnly, None).unwrap();
	let txn = storage.read_txn().unwrap();
	let nodes = G::new(&storage, &txn).n_from_tag("Person").collect_nodes().unwrap();
	assert_eq!(nodes.len(), 3);
	let mut ids: Vec<i64> = nodes
		.iter()
		.map(|n| storage.get_property(&txn, n.item(), key).unwrap().int_value().unwrap())
		.collect();
	ids.sort_unstable();
	assert_eq!(ids, vec![1, 2, 3]);
}

#[test]
fn test_recovery_is_idempotent() {
	let dir = TempDir::new().unwrap();
	let path = dir.path().join("graph");
	{
		let storage =
			GroveGraphStorage::open(&path, OpenMode::Create, Some(small_config())).unwrap();
		let mut txn = storage.write_txn().unwrap();
		let a = storage.add_node(&mut txn, "Person").unwrap();
		let b = storage.add_node(&mut txn, "Person").unwrap();
		storage.add_edge(&mut txn, &a, &b, "knows").unwrap();
		txn.commit().unwrap();

		let mut txn = storage.write_txn().unwrap();
		storage.remove_node(&mut txn, &a).unwrap();
		std::mem::forget(txn);
	}

	{
		GroveGraphStorage::open(&path, OpenMode::ReadWrite, None).unwrap();
	}
	let first = graph_image(&dir);
	{
		GroveGraphStorage::open(&path, OpenMode::ReadWrite, None).unwrap();
	}
	let second = graph_image(&dir);
	assert_eq!(first, second);

	let storage = GroveGraphStorage::open(&path, OpenMode::ReadOnly, None).unwrap();
	let txn = storage.read_txn().unwrap();
	assert_eq!(storage.graph_stats(&txn).unwrap().num_nodes, 2);
	assert_eq!(storage.graph_stats(&txn).unwrap().num_edges, 1);
}

#[test]
fn test_committed_state_survives_reopen() {
	let dir = TempDir::new().unwrap();
	let path = dir.path().join("graph");
	let (a_off, key) = {
		let storage =
			GroveGraphStorage::open(&path, OpenMode::Create, Some(small_config())).unwrap();
		let mut txn = storage.write_txn().unwrap();
		let a = storage.add_node(&mut txn, "Person").unwrap();
		let key = storage.intern(&mut txn, "name").unwrap();
		let long_name = "a name long enough to spill into the variable arena region".repeat(2);
		storage
			.set_property(&mut txn, a.item(), key, Value::from(long_name.as_str()))
			.unwrap();
		txn.commit().unwrap();
		(a.offset(), key)
	};

	let storage = GroveGraphStorage::open(&path, OpenMode::ReadWrite, None).unwrap();
	let txn = storage.read_txn().unwrap();
	let node = storage.node_at(a_off).unwrap();
	let name = storage.get_property(&txn, node.item(), key).unwrap();
	assert_eq!(
		name.string_value().unwrap(),
		"a name long enough to spill into the variable arena region".repeat(2)
	);
	assert_eq!(storage.string_name(&txn, key).unwrap(), "name");
}
