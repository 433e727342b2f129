use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::grove_engine::storage_core::index::avl::AvlTree;
use crate::grove_engine::tests::test_utils::setup_graph;
use crate::grove_engine::traversal_core::ops::g::G;
use crate::grove_engine::traversal_core::ops::source::n_from_index::NFromIndexAdapter;
use crate::grove_engine::traversal_core::ops::source::n_from_tag::NFromTagAdapter;
use crate::grove_engine::types::ErrorKind;
use crate::protocol::predicate::{PredicateOp, PropertyPredicate};
use crate::protocol::value::{Value, ValueKind};
use crate::utils::items::ItemKind;

#[test]
fn test_create_index_twice_fails() {
	let (_dir, storage) = setup_graph();
	let mut txn = storage.write_txn().unwrap();
	storage
		.create_index(&mut txn, ItemKind::Node, "Message", "Size", ValueKind::I64)
		.unwrap();
	let err = storage
		.create_index(&mut txn, ItemKind::Node, "Message", "Size", ValueKind::I64)
		.unwrap_err();
	assert_eq!(err.kind, ErrorKind::IndexExists);
	txn.commit().unwrap();
}

#[test]
fn test_create_index_rejects_mismatched_existing_values() {
	let (_dir, storage) = setup_graph();
	let mut txn = storage.write_txn().unwrap();
	let node = storage.add_node(&mut txn, "Message").unwrap();
	let key = storage.intern(&mut txn, "Size").unwrap();
	storage
		.set_property(&mut txn, node.item(), key, Value::from("big"))
		.unwrap();
	let err = storage
		.create_index(&mut txn, ItemKind::Node, "Message", "Size", ValueKind::I64)
		.unwrap_err();
	assert_eq!(err.kind, ErrorKind::TypeMismatch);
	txn.commit().unwrap();
}

#[test]
fn test_set_on_indexed_key_rejects_wrong_kind() {
	let (_dir, storage) = setup_graph();
	let mut txn = storage.write_txn().unwrap();
	storage
		.create_index(&mut txn, ItemKind::Node, "Message", "Size", ValueKind::I64)
		.unwrap();
	let node = storage.add_node(&mut txn, "Message").unwrap();
	let key = storage.intern(&mut txn, "Size").unwrap();
	let err = storage
		.set_property(&mut txn, node.item(), key, Value::F64(1.0))
		.unwrap_err();
	assert_eq!(err.kind, ErrorKind::TypeMismatch);
	// Nothing was written: the key is still absent.
	assert_eq!(storage.check_property(&txn, node.item(), key).unwrap(), None);
	txn.commit().unwrap();
}

/// Sizes drawn like the message-size benchmark: 127 nodes uniform in
/// [1 KiB, 20 KiB], then a band query checked against a linear scan.
#[test]
fn test_range_query_matches_linear_scan() {
	let (_dir, storage) = setup_graph();
	let mut txn = storage.write_txn().unwrap();
	storage
		.create_index(&mut txn, ItemKind::Node, "Message", "Size", ValueKind::I64)
		.unwrap();
	let key = storage.intern(&mut txn, "Size").unwrap();

	let mut rng = StdRng::seed_from_u64(0x5eed);
	let mut ground_truth = 0u64;
	for _ in 0..127 {
		let size = rng.random_range(1024i64..=20 * 1024);
		let node = storage.add_node(&mut txn, "Message").unwrap();
		storage.set_property(&mut txn, node.item(), key, Value::I64(size)).unwrap();
		if (10000..=11000).contains(&size) {
			ground_truth += 1;
		}
	}
	txn.commit().unwrap();

	let txn = storage.read_txn().unwrap();
	let pred = PropertyPredicate::new_range(key, PredicateOp::GeLe, 10000i64, 11000i64);
	let nodes = G::new(&storage, &txn)
		.n_from_index("Message", &pred)
		.collect_nodes()
		.unwrap();
	assert_eq!(nodes.len() as u64, ground_truth);
	for node in nodes {
		let size = storage.get_property(&txn, node.item(), key).unwrap();
		let size = size.int_value().unwrap();
		assert!((10000..=11000).contains(&size));
	}
}

#[test]
fn test_all_predicate_ops_agree_with_scan() {
	let (_dir, storage) = setup_graph();
	let mut txn = storage.write_txn().unwrap();
	storage
		.create_index(&mut txn, ItemKind::Node, "tag1", "id1", ValueKind::I64)
		.unwrap();
	let key = storage.intern(&mut txn, "id1").unwrap();
	// Values 201..=206 plus a duplicate 203, as in the range iterator test
	// of the original engine.
	for v in [201i64, 202, 203, 204, 205, 206, 203] {
		let node = storage.add_node(&mut txn, "tag1").unwrap();
		storage.set_property(&mut txn, node.item(), key, Value::I64(v)).unwrap();
	}
	txn.commit().unwrap();

	let txn = storage.read_txn().unwrap();
	let preds = [
		PropertyPredicate::dont_care(key),
		PropertyPredicate::new(key, PredicateOp::Eq, 203i64),
		PropertyPredicate::new(key, PredicateOp::Ne, 203i64),
		PropertyPredicate::new(key, PredicateOp::Lt, 204i64),
		PropertyPredicate::new(key, PredicateOp::Le, 204i64),
		PropertyPredicate::new(key, PredicateOp::Gt, 204i64),
		PropertyPredicate::new(key, PredicateOp::Ge, 204i64),
		PropertyPredicate::new_range(key, PredicateOp::GeLe, 202i64, 205i64),
		PropertyPredicate::new_range(key, PredicateOp::GeLt, 202i64, 205i64),
		PropertyPredicate::new_range(key, PredicateOp::GtLe, 202i64, 205i64),
		PropertyPredicate::new_range(key, PredicateOp::GtLt, 202i64, 205i64),
	];
	for pred in preds {
		let via_index: Vec<_> = G::new(&storage, &txn)
			.n_from_index("tag1", &pred)
			.collect_nodes()
			.unwrap();

		let mut via_scan = Vec::new();
		for node in G::new(&storage, &txn).n_from_tag("tag1").collect_nodes().unwrap() {
			if let Some(v) = storage.check_property(&txn, node.item(), key).unwrap()
				&& pred.matches(&v).unwrap()
			{
				via_scan.push(node);
			}
		}
		let mut a: Vec<_> = via_index.iter().map(|n| n.offset()).collect();
		let mut b: Vec<_> = via_scan.iter().map(|n| n.offset()).collect();
		a.sort_unstable();
		b.sort_unstable();
		assert_eq!(a, b, "divergence for {:?}", pred.op);
	}
}

#[test]
fn test_reverse_index_iteration_is_descending() {
	let (_dir, storage) = setup_graph();
	let mut txn = storage.write_txn().unwrap();
	storage
		.create_index(&mut txn, ItemKind::Node, "tag1", "id1", ValueKind::I64)
		.unwrap();
	let key = storage.intern(&mut txn, "id1").unwrap();
	for v in [5i64, 1, 4, 2, 3] {
		let node = storage.add_node(&mut txn, "tag1").unwrap();
		storage.set_property(&mut txn, node.item(), key, Value::I64(v)).unwrap();
	}
	txn.commit().unwrap();

	let txn = storage.read_txn().unwrap();
	let pred = PropertyPredicate::dont_care(key);
	let forward: Vec<i64> = G::new(&storage, &txn)
		.n_from_index("tag1", &pred)
		.collect_nodes()
		.unwrap()
		.iter()
		.map(|n| storage.get_property(&txn, n.item(), key).unwrap().int_value().unwrap())
		.collect();
	let backward: Vec<i64> = G::new(&storage, &txn)
		.n_from_index_reverse("tag1", &pred)
		.collect_nodes()
		.unwrap()
		.iter()
		.map(|n| storage.get_property(&txn, n.item(), key).unwrap().int_value().unwrap())
		.collect();
	assert_eq!(forward, vec![1, 2, 3, 4, 5]);
	assert_eq!(backward, vec![5, 4, 3, 2, 1]);
}

/// Two Persons share id 5, one has id 6; removing one of the duplicates
/// must leave exactly one node under each key.
#[test]
fn test_remove_propagates_to_index() {
	let (_dir, storage) = setup_graph();
	let mut txn = storage.write_txn().unwrap();
	storage
		.create_index(&mut txn, ItemKind::Node, "Person", "id", ValueKind::I64)
		.unwrap();
	let key = storage.intern(&mut txn, "id").unwrap();
	let p1 = storage.add_node(&mut txn, "Person").unwrap();
	let p2 = storage.add_node(&mut txn, "Person").unwrap();
	let p3 = storage.add_node(&mut txn, "Person").unwrap();
	storage.set_property(&mut txn, p1.item(), key, Value::I64(5)).unwrap();
	storage.set_property(&mut txn, p2.item(), key, Value::I64(5)).unwrap();
	storage.set_property(&mut txn, p3.item(), key, Value::I64(6)).unwrap();
	txn.commit().unwrap();

	let mut txn = storage.write_txn().unwrap();
	storage.remove_node(&mut txn, &p2).unwrap();
	txn.commit().unwrap();

	let txn = storage.read_txn().unwrap();
	let eq5 = PropertyPredicate::new(key, PredicateOp::Eq, 5i64);
	let eq6 = PropertyPredicate::new(key, PredicateOp::Eq, 6i64);
	let hits5 = G::new(&storage, &txn).n_from_index("Person", &eq5).collect_nodes().unwrap();
	let hits6 = G::new(&storage, &txn).n_from_index("Person", &eq6).collect_nodes().unwrap();
	assert_eq!(hits5.len(), 1);
	assert_eq!(hits5[0].offset(), p1.offset());
	assert_eq!(hits6.len(), 1);
}

#[test]
fn test_avl_stays_balanced_under_churn() {
	let (_dir, storage) = setup_graph();
	let mut txn = storage.write_txn().unwrap();
	storage
		.create_index(&mut txn, ItemKind::Node, "Item", "rank", ValueKind::I64)
		.unwrap();
	let key = storage.intern(&mut txn, "rank").unwrap();

	let mut rng = StdRng::seed_from_u64(7);
	let mut nodes = Vec::new();
	for _ in 0..300 {
		let node = storage.add_node(&mut txn, "Item").unwrap();
		storage
			.set_property(&mut txn, node.item(), key, Value::I64(rng.random_range(0i64..100)))
			.unwrap();
		nodes.push(node);
	}
	for node in nodes.iter().step_by(3) {
		storage.remove_node(&mut txn, node).unwrap();
	}
	txn.commit().unwrap();

	let handle = storage.find_index(ItemKind::Node, nodes[1].tag, key).unwrap().unwrap();
	let root = AvlTree::root(&storage, handle.root_loc()).unwrap();
	let (height, keys, entries) = AvlTree::check_invariants(&storage, root).unwrap();
	assert!(keys <= 100);
	assert_eq!(entries, 200);
	// Height of an AVL tree with k keys is under 1.45 log2(k + 2).
	assert!(height as f64 <= 1.45 * ((keys + 2) as f64).log2());

	let txn = storage.read_txn().unwrap();
	let pred = PropertyPredicate::dont_care(key);
	assert_eq!(
		G::new(&storage, &txn).n_from_index("Item", &pred).count_all().unwrap(),
		200
	);
}

#[test]
fn test_string_index_beyond_prefix_width() {
	let (_dir, storage) = setup_graph();
	let mut txn = storage.write_txn().unwrap();
	storage
		.create_index(&mut txn, ItemKind::Node, "Doc", "title", ValueKind::String)
		.unwrap();
	let key = storage.intern(&mut txn, "title").unwrap();
	// Identical 16-byte prefixes, different tails: the index buckets them
	// together and the full-value check must tell them apart.
	let titles = [
		"a shared prefix!-one",
		"a shared prefix!-two",
		"a shared prefix!-three",
		"unrelated",
	];
	for title in titles {
		let node = storage.add_node(&mut txn, "Doc").unwrap();
		storage
			.set_property(&mut txn, node.item(), key, Value::from(title))
			.unwrap();
	}
	txn.commit().unwrap();

	let txn = storage.read_txn().unwrap();
	let eq = PropertyPredicate::new(key, PredicateOp::Eq, "a shared prefix!-two");
	let hits = G::new(&storage, &txn).n_from_index("Doc", &eq).collect_nodes().unwrap();
	assert_eq!(hits.len(), 1);

	let ne = PropertyPredicate::new(key, PredicateOp::Ne, "a shared prefix!-two");
	let misses = G::new(&storage, &txn).n_from_index("Doc", &ne).collect_nodes().unwrap();
	assert_eq!(misses.len(), 3);
}
