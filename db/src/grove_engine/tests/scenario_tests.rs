use std::collections::HashMap;

use crate::grove_engine::tests::test_utils::setup_graph;
use crate::grove_engine::traversal_core::ops::traverse::joint::get_joint_neighbors;
use crate::grove_engine::traversal_core::ops::traverse::neighbor::{
	get_neighbors, get_neighbors_filtered,
};
use crate::grove_engine::traversal_core::ops::traverse::neighborhood::{
	get_neighborhood, get_nhop_neighbors,
};
use crate::grove_engine::traversal_core::ops::traverse::paths::get_paths;
use crate::grove_engine::traversal_core::ops::traverse::{EdgeConstraint, JointNeighborConstraint};
use crate::grove_engine::traversal_core::traversal_value::TraversalValue;
use crate::protocol::predicate::{PredicateOp, PropertyPredicate};
use crate::protocol::value::Value;
use crate::utils::items::{Direction, Node};

/// Interning the same identifier in three separate transactions returns the
/// same id every time, and the reverse lookup returns the original bytes.
#[test]
fn test_intern_stable_across_transactions() {
	let (_dir, storage) = setup_graph();
	let mut ids = Vec::new();
	for _ in 0..3 {
		let mut txn = storage.write_txn().unwrap();
		ids.push(storage.intern(&mut txn, "Person").unwrap());
		txn.commit().unwrap();
	}
	assert_eq!(ids[0], ids[1]);
	assert_eq!(ids[1], ids[2]);
	let txn = storage.read_txn().unwrap();
	assert_eq!(storage.string_name(&txn, ids[0]).unwrap(), "Person");
}

/// The message graph of the joint-neighbor scenario: persons Ann, Bob,
/// Carl, Don and seven messages; message `m` points at its sender with a
/// `From` edge and at each recipient with a `To` edge.
fn build_message_graph(
	storage: &crate::grove_engine::storage_core::GroveGraphStorage,
) -> (HashMap<&'static str, Node>, Vec<Node>) {
	let mut txn = storage.write_txn().unwrap();
	let mut persons = HashMap::new();
	for name in ["Ann", "Bob", "Carl", "Don"] {
		persons.insert(name, storage.add_node(&mut txn, "Person").unwrap());
	}
	let id_key = storage.intern(&mut txn, "id").unwrap();
	let sends: [(&str, &[&str]); 7] = [
		("Ann", &["Bob"]),
		("Bob", &["Ann"]),
		("Ann", &["Bob", "Carl"]),
		("Bob", &["Carl"]),
		("Bob", &["Don"]),
		("Carl", &["Bob", "Don"]),
		("Bob", &["Carl", "Don"]),
	];
	let mut messages = Vec::new();
	for (i, (from, tos)) in sends.iter().enumerate() {
		let message = storage.add_node(&mut txn, "Message").unwrap();
		storage
			.set_property(&mut txn, message.item(), id_key, Value::I64(i as i64 + 1))
			.unwrap();
		storage.add_edge(&mut txn, &message, &persons[from], "From").unwrap();
		for to in *tos {
			storage.add_edge(&mut txn, &message, &persons[to], "To").unwrap();
		}
		messages.push(message);
	}
	txn.commit().unwrap();
	(persons, messages)
}

/// "Messages from Ann to both Bob and Carl" is exactly message 3.
#[test]
fn test_joint_neighbors_finds_the_common_message() {
	let (_dir, storage) = setup_graph();
	let (persons, _messages) = build_message_graph(&storage);

	let txn = storage.read_txn().unwrap();
	let from = storage.lookup_string(&txn, "From").unwrap().unwrap();
	let to = storage.lookup_string(&txn, "To").unwrap().unwrap();
	let id_key = storage.lookup_string(&txn, "id").unwrap().unwrap();

	let constraints = vec![
		JointNeighborConstraint {
			constraint: EdgeConstraint {
				dir: Direction::Outgoing,
				tag: from,
			},
			node: persons["Ann"],
		},
		JointNeighborConstraint {
			constraint: EdgeConstraint {
				dir: Direction::Outgoing,
				tag: to,
			},
			node: persons["Bob"],
		},
		JointNeighborConstraint {
			constraint: EdgeConstraint {
				dir: Direction::Outgoing,
				tag: to,
			},
			node: persons["Carl"],
		},
	];
	let hits = get_joint_neighbors(&storage, &txn, constraints, true)
		.unwrap()
		.collect_nodes()
		.unwrap();
	assert_eq!(hits.len(), 1);
	let id = storage.get_property(&txn, hits[0].item(), id_key).unwrap();
	assert_eq!(id, Value::I64(3));
}

#[test]
fn test_joint_neighbors_rejects_empty_constraints() {
	let (_dir, storage) = setup_graph();
	let txn = storage.read_txn().unwrap();
	let err = get_joint_neighbors(&storage, &txn, Vec::new(), true).unwrap_err();
	assert_eq!(err.kind, crate::grove_engine::types::ErrorKind::RangeError);
}

/// Ann has two `From` edges carrying order 0 and order 2: an order >= 1
/// filter keeps one neighbor, an order == 0 filter keeps the other.
#[test]
fn test_neighbor_edge_predicates() {
	let (_dir, storage) = setup_graph();
	let mut txn = storage.write_txn().unwrap();
	let ann = storage.add_node(&mut txn, "Person").unwrap();
	let m1 = storage.add_node(&mut txn, "Message").unwrap();
	let m2 = storage.add_node(&mut txn, "Message").unwrap();
	let order = storage.intern(&mut txn, "order").unwrap();
	let e1 = storage.add_edge(&mut txn, &m1, &ann, "From").unwrap();
	let e2 = storage.add_edge(&mut txn, &m2, &ann, "From").unwrap();
	storage.set_property(&mut txn, e1.item(), order, Value::I64(0)).unwrap();
	storage.set_property(&mut txn, e2.item(), order, Value::I64(2)).unwrap();
	let from = storage.intern(&mut txn, "From").unwrap();
	txn.commit().unwrap();

	let txn = storage.read_txn().unwrap();
	let at_least_one = PropertyPredicate::new(order, PredicateOp::Ge, 1i64);
	let hits = get_neighbors_filtered(
		&storage,
		&txn,
		&ann,
		Direction::Any,
		from,
		vec![at_least_one],
		true,
	)
	.unwrap()
	.collect_nodes()
	.unwrap();
	assert_eq!(hits.len(), 1);
	assert_eq!(hits[0].offset(), m2.offset());

	let zero = PropertyPredicate::new(order, PredicateOp::Eq, 0i64);
	let hits = get_neighbors_filtered(
		&storage,
		&txn,
		&ann,
		Direction::Any,
		from,
		vec![zero],
		true,
	)
	.unwrap()
	.collect_nodes()
	.unwrap();
	assert_eq!(hits.len(), 1);
	assert_eq!(hits[0].offset(), m1.offset());
}

#[test]
fn test_neighbors_unique_flag_suppresses_duplicates() {
	let (_dir, storage) = setup_graph();
	let mut txn = storage.write_txn().unwrap();
	let a = storage.add_node(&mut txn, "Person").unwrap();
	let b = storage.add_node(&mut txn, "Person").unwrap();
	storage.add_edge(&mut txn, &a, &b, "knows").unwrap();
	storage.add_edge(&mut txn, &b, &a, "knows").unwrap();
	txn.commit().unwrap();

	let txn = storage.read_txn().unwrap();
	let unique = get_neighbors(&storage, &txn, &a, Direction::Any, 0, true)
		.unwrap()
		.collect_nodes()
		.unwrap();
	assert_eq!(unique.len(), 1);
	let cheap = get_neighbors(&storage, &txn, &a, Direction::Any, 0, false)
		.unwrap()
		.collect_nodes()
		.unwrap();
	assert_eq!(cheap.len(), 2);
}

/// A two-level tree plus a cross edge; breadth-first layers and the
/// distance inspector must agree with hand-computed shortest paths.
fn build_bfs_graph(
	storage: &crate::grove_engine::storage_core::GroveGraphStorage,
) -> Vec<Node> {
	let mut txn = storage.write_txn().unwrap();
	let nodes: Vec<Node> = (0..7).map(|_| storage.add_node(&mut txn, "N").unwrap()).collect();
	// 0 -> 1, 0 -> 2, 1 -> 3, 2 -> 4, 3 -> 5, 4 -> 5, 5 -> 6, and 6 -> 0.
	for (s, d) in [(0, 1), (0, 2), (1, 3), (2, 4), (3, 5), (4, 5), (5, 6), (6, 0)] {
		storage.add_edge(&mut txn, &nodes[s], &nodes[d], "link").unwrap();
	}
	txn.commit().unwrap();
	nodes
}

#[test]
fn test_neighborhood_layers_and_distances() {
	let (_dir, storage) = setup_graph();
	let nodes = build_bfs_graph(&storage);
	let txn = storage.read_txn().unwrap();

	let mut it =
		get_neighborhood(&storage, &txn, &nodes[0], vec![EdgeConstraint::any(); 3]).unwrap();
	let mut got: Vec<(u64, u32)> = Vec::new();
	while let Some(res) = it.next() {
		let TraversalValue::Node(n) = res.unwrap() else {
			panic!("neighborhood yields nodes");
		};
		got.push((n.offset(), it.distance()));
	}
	// Any-direction BFS: the 6 -> 0 edge puts 6 in the first layer and 5 in
	// the second (via 5 -> 6).
	let expect: HashMap<u64, u32> = [
		(nodes[1].offset(), 1),
		(nodes[2].offset(), 1),
		(nodes[6].offset(), 1),
		(nodes[3].offset(), 2),
		(nodes[4].offset(), 2),
		(nodes[5].offset(), 2),
	]
	.into();
	assert_eq!(got.len(), expect.len(), "each reachable node exactly once");
	for (off, distance) in got {
		assert_eq!(expect[&off], distance);
	}
}

#[test]
fn test_nhop_returns_exactly_the_last_layer() {
	let (_dir, storage) = setup_graph();
	let nodes = build_bfs_graph(&storage);
	let txn = storage.read_txn().unwrap();

	let hits = get_nhop_neighbors(&storage, &txn, &nodes[0], vec![EdgeConstraint::any(); 2])
		.unwrap()
		.map(|res| res.unwrap())
		.filter_map(|v| v.as_node().map(|n| n.offset()))
		.collect::<Vec<_>>();
	let mut hits = hits;
	hits.sort_unstable();
	let mut want = vec![nodes[3].offset(), nodes[4].offset(), nodes[5].offset()];
	want.sort_unstable();
	assert_eq!(hits, want);
}

#[test]
fn test_paths_shortest_first() {
	let (_dir, storage) = setup_graph();
	let nodes = build_bfs_graph(&storage);
	let txn = storage.read_txn().unwrap();

	let paths: Vec<_> = get_paths(&storage, &txn, &nodes[0], Some(&nodes[5]), None)
		.inner
		.map(|res| match res.unwrap() {
			TraversalValue::Path(p) => p,
			other => panic!("expected path, got {other:?}"),
		})
		.collect();
	// Two shortest paths of length 3 (via 1-3 and via 2-4), nothing shorter.
	assert_eq!(paths.len(), 2);
	assert!(paths.iter().all(|p| p.length() == 3));
	assert!(paths.iter().all(|p| p.end_node().offset() == nodes[5].offset()));
	assert!(paths.iter().all(|p| p.start_node().offset() == nodes[0].offset()));

	let bounded: Vec<_> = get_paths(&storage, &txn, &nodes[0], None, Some(1))
		.inner
		.collect::<Result<Vec<_>, _>>()
		.unwrap();
	assert_eq!(bounded.len(), 2); // 0->1 and 0->2
}
