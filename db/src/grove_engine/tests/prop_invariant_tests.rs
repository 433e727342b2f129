use proptest::prelude::*;

use crate::grove_engine::storage_core::index::avl::AvlTree;
use crate::grove_engine::tests::test_utils::setup_graph;
use crate::grove_engine::traversal_core::ops::g::G;
use crate::grove_engine::traversal_core::ops::source::n_from_index::NFromIndexAdapter;
use crate::protocol::date::Date;
use crate::protocol::predicate::{PredicateOp, PropertyPredicate};
use crate::protocol::value::{Value, ValueKind};
use crate::utils::items::ItemKind;

fn value_strategy() -> impl Strategy<Value = Value> {
	prop_oneof![
		Just(Value::Empty),
		any::<bool>().prop_map(Value::Boolean),
		any::<i64>().prop_map(Value::I64),
		any::<f64>().prop_map(Value::F64),
		"[a-zA-Z0-9 ]{0,120}".prop_map(Value::String),
		(any::<i64>(), -56i8..=56).prop_map(|(us, tz)| Value::Date(Date::from_utc_epoch_us(us, tz))),
		proptest::collection::vec(any::<u8>(), 0..200).prop_map(Value::Blob),
	]
}

proptest! {
	#![proptest_config(ProptestConfig::with_cases(16))]

	/// Setting then reading any representable value returns it unchanged,
	/// NaN floats and arena-spilled payloads included.
	#[test]
	fn prop_set_get_roundtrip(values in proptest::collection::vec(value_strategy(), 1..12)) {
		let (_dir, storage) = setup_graph();
		let mut txn = storage.write_txn().unwrap();
		let node = storage.add_node(&mut txn, "Thing").unwrap();
		let mut keys = Vec::new();
		for (i, value) in values.iter().enumerate() {
			let key = storage.intern(&mut txn, &format!("k{i}")).unwrap();
			storage.set_property(&mut txn, node.item(), key, value.clone()).unwrap();
			keys.push(key);
		}
		txn.commit().unwrap();

		let txn = storage.read_txn().unwrap();
		for (key, want) in keys.iter().zip(&values) {
			let got = storage.get_property(&txn, node.item(), *key).unwrap();
			prop_assert_eq!(&got, want);
		}
	}

	/// Aborting any mutation batch leaves the persistent image identical to
	/// the bytes before the transaction began.
	#[test]
	fn prop_abort_is_invisible(values in proptest::collection::vec(value_strategy(), 1..8)) {
		let (dir, storage) = setup_graph();
		let mut txn = storage.write_txn().unwrap();
		let anchor = storage.add_node(&mut txn, "Person").unwrap();
		let key = storage.intern(&mut txn, "seed").unwrap();
		storage.set_property(&mut txn, anchor.item(), key, Value::I64(1)).unwrap();
		txn.commit().unwrap();

		let files = ["meta", "nodes", "edges", "props", "arena", "strings", "indices"];
		let image = |name: &str| std::fs::read(dir.path().join("graph").join(name)).unwrap();
		let before: Vec<_> = files.iter().map(|f| image(f)).collect();

		let mut txn = storage.write_txn().unwrap();
		let mut prev = anchor;
		for (i, value) in values.iter().enumerate() {
			let node = storage.add_node(&mut txn, "Person").unwrap();
			storage.add_edge(&mut txn, &prev, &node, "next").unwrap();
			let key = storage.intern(&mut txn, &format!("p{i}")).unwrap();
			storage.set_property(&mut txn, node.item(), key, value.clone()).unwrap();
			prev = node;
		}
		storage.remove_node(&mut txn, &anchor).unwrap();
		drop(txn); // abort

		let after: Vec<_> = files.iter().map(|f| image(f)).collect();
		prop_assert_eq!(before, after);
	}

	/// Every tree node stays within the AVL balance bound and the in-order
	/// walk matches the inserted multiset, through inserts and removals.
	#[test]
	fn prop_avl_balance_under_churn(ranks in proptest::collection::vec(-500i64..500, 1..80)) {
		let (_dir, storage) = setup_graph();
		let mut txn = storage.write_txn().unwrap();
		storage.create_index(&mut txn, ItemKind::Node, "Item", "rank", ValueKind::I64).unwrap();
		let key = storage.intern(&mut txn, "rank").unwrap();
		let mut nodes = Vec::new();
		for rank in &ranks {
			let node = storage.add_node(&mut txn, "Item").unwrap();
			storage.set_property(&mut txn, node.item(), key, Value::I64(*rank)).unwrap();
			nodes.push(node);
		}
		txn.commit().unwrap();

		let tag = storage.find_index(ItemKind::Node, nodes[0].tag, key).unwrap().unwrap();
		let root = AvlTree::root(&storage, tag.root_loc()).unwrap();
		let (_, _, entries) = AvlTree::check_invariants(&storage, root).unwrap();
		prop_assert_eq!(entries, ranks.len() as u64);

		let mut txn = storage.write_txn().unwrap();
		for node in nodes.iter().step_by(2) {
			storage.remove_node(&mut txn, node).unwrap();
		}
		txn.commit().unwrap();

		let root = AvlTree::root(&storage, tag.root_loc()).unwrap();
		let (_, _, entries) = AvlTree::check_invariants(&storage, root).unwrap();
		prop_assert_eq!(entries, (ranks.len() - ranks.len().div_ceil(2)) as u64);
	}

	/// `GeLe` and friends include or exclude their endpoints exactly.
	#[test]
	fn prop_range_closedness(
		ranks in proptest::collection::vec(-100i64..100, 1..50),
		a in -100i64..100,
		b in -100i64..100,
	) {
		let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
		let (_dir, storage) = setup_graph();
		let mut txn = storage.write_txn().unwrap();
		storage.create_index(&mut txn, ItemKind::Node, "Item", "rank", ValueKind::I64).unwrap();
		let key = storage.intern(&mut txn, "rank").unwrap();
		for rank in &ranks {
			let node = storage.add_node(&mut txn, "Item").unwrap();
			storage.set_property(&mut txn, node.item(), key, Value::I64(*rank)).unwrap();
		}
		txn.commit().unwrap();

		let txn = storage.read_txn().unwrap();
		let cases: [(PredicateOp, Box<dyn Fn(i64) -> bool>); 4] = [
			(PredicateOp::GeLe, Box::new(|v| lo <= v && v <= hi)),
			(PredicateOp::GeLt, Box::new(|v| lo <= v && v < hi)),
			(PredicateOp::GtLe, Box::new(|v| lo < v && v <= hi)),
			(PredicateOp::GtLt, Box::new(|v| lo < v && v < hi)),
		];
		for (op, keep) in cases {
			let pred = PropertyPredicate::new_range(key, op, lo, hi);
			let got = G::new(&storage, &txn)
				.n_from_index("Item", &pred)
				.count_all()
				.unwrap();
			let want = ranks.iter().filter(|v| keep(**v)).count() as u64;
			prop_assert_eq!(got, want, "op {:?} over [{}, {}]", op, lo, hi);
		}
	}
}
