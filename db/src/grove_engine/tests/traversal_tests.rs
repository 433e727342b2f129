use crate::grove_engine::tests::test_utils::setup_graph;
use crate::grove_engine::traversal_core::ops::adj::from_n::FromNAdapter;
use crate::grove_engine::traversal_core::ops::adj::in_e::InEAdapter;
use crate::grove_engine::traversal_core::ops::adj::out_e::OutEAdapter;
use crate::grove_engine::traversal_core::ops::adj::to_n::ToNAdapter;
use crate::grove_engine::traversal_core::ops::g::G;
use crate::grove_engine::traversal_core::ops::source::add_e::AddEAdapter;
use crate::grove_engine::traversal_core::ops::source::add_n::AddNAdapter;
use crate::grove_engine::traversal_core::ops::source::e_from_all::EFromAllAdapter;
use crate::grove_engine::traversal_core::ops::source::e_from_index::EFromIndexAdapter;
use crate::grove_engine::traversal_core::ops::source::e_from_tag::EFromTagAdapter;
use crate::grove_engine::traversal_core::ops::source::n_from_all::NFromAllAdapter;
use crate::grove_engine::traversal_core::ops::source::n_from_tag::NFromTagAdapter;
use crate::grove_engine::traversal_core::ops::util::dedup::DedupAdapter;
use crate::grove_engine::traversal_core::ops::util::filter_prop::FilterPropAdapter;
use crate::grove_engine::traversal_core::traversal_iter::Disposition;
use crate::grove_engine::traversal_core::traversal_value::TraversalValue;
use crate::grove_engine::types::ErrorKind;
use crate::protocol::predicate::{PredicateOp, PropertyPredicate};
use crate::protocol::value::Value;

#[test]
fn test_add_n_add_e_pipeline() {
	let (_dir, storage) = setup_graph();
	let mut txn = storage.write_txn().unwrap();

	let ann = G::new_mut(&storage, &mut txn)
		.add_n("Person", Some(vec![("age", Value::I64(25))]))
		.collect_to_obj()
		.unwrap();
	let bob = G::new_mut(&storage, &mut txn)
		.add_n("Person", Some(vec![("age", Value::I64(30))]))
		.collect_to_obj()
		.unwrap();
	let (ann, bob) = (*ann.as_node().unwrap(), *bob.as_node().unwrap());
	G::new_mut(&storage, &mut txn)
		.add_e(&ann, &bob, "knows", None)
		.collect_to_obj()
		.unwrap();
	txn.commit().unwrap();

	let txn = storage.read_txn().unwrap();
	let edges = G::new(&storage, &txn)
		.n_from_tag("Person")
		.out_e("knows")
		.collect_edges()
		.unwrap();
	assert_eq!(edges.len(), 1);
	assert_eq!(edges[0].source_offset(), ann.offset());
	assert_eq!(edges[0].destination_offset(), bob.offset());
}

#[test]
fn test_from_n_to_n_round_the_edge() {
	let (_dir, storage) = setup_graph();
	let mut txn = storage.write_txn().unwrap();
	let a = storage.add_node(&mut txn, "Person").unwrap();
	let b = storage.add_node(&mut txn, "Person").unwrap();
	storage.add_edge(&mut txn, &a, &b, "knows").unwrap();
	txn.commit().unwrap();

	let txn = storage.read_txn().unwrap();
	let sources = G::new(&storage, &txn)
		.n_from_tag("Person")
		.out_e("")
		.from_n()
		.collect_nodes()
		.unwrap();
	assert_eq!(sources.len(), 1);
	assert_eq!(sources[0].offset(), a.offset());

	let sinks = G::new(&storage, &txn)
		.n_from_tag("Person")
		.out_e("")
		.to_n()
		.collect_nodes()
		.unwrap();
	assert_eq!(sinks[0].offset(), b.offset());
}

#[test]
fn test_filter_by_disposition_stops_early() {
	let (_dir, storage) = setup_graph();
	let mut txn = storage.write_txn().unwrap();
	let key = storage.intern(&mut txn, "n").unwrap();
	for i in 0..10i64 {
		let node = storage.add_node(&mut txn, "Item").unwrap();
		storage.set_property(&mut txn, node.item(), key, Value::I64(i)).unwrap();
	}
	txn.commit().unwrap();

	let txn = storage.read_txn().unwrap();
	let mut seen = 0;
	let taken = G::new(&storage, &txn)
		.n_from_tag("Item")
		.filter_by(|_| {
			seen += 1;
			if seen < 3 { Disposition::Pass } else { Disposition::PassStop }
		})
		.count_all()
		.unwrap();
	assert_eq!(taken, 3);
	assert_eq!(seen, 3);

	let none = G::new(&storage, &txn)
		.n_from_tag("Item")
		.filter_by(|_| Disposition::DontPassStop)
		.count_all()
		.unwrap();
	assert_eq!(none, 0);
}

#[test]
fn test_process_counts_elements() {
	let (_dir, storage) = setup_graph();
	let mut txn = storage.write_txn().unwrap();
	for _ in 0..4 {
		storage.add_node(&mut txn, "Item").unwrap();
	}
	txn.commit().unwrap();

	let txn = storage.read_txn().unwrap();
	let mut tags = Vec::new();
	let n = G::new(&storage, &txn)
		.n_from_all()
		.process(|v| {
			if let TraversalValue::Node(node) = v {
				tags.push(node.tag);
			}
		})
		.unwrap();
	assert_eq!(n, 4);
	assert_eq!(tags.len(), 4);
}

#[test]
fn test_dedup_drops_repeats() {
	let (_dir, storage) = setup_graph();
	let mut txn = storage.write_txn().unwrap();
	let a = storage.add_node(&mut txn, "Person").unwrap();
	let b = storage.add_node(&mut txn, "Person").unwrap();
	let c = storage.add_node(&mut txn, "Person").unwrap();
	storage.add_edge(&mut txn, &a, &c, "knows").unwrap();
	storage.add_edge(&mut txn, &b, &c, "knows").unwrap();
	txn.commit().unwrap();

	let txn = storage.read_txn().unwrap();
	let plain = G::new(&storage, &txn)
		.n_from_tag("Person")
		.out_e("knows")
		.to_n()
		.collect_nodes()
		.unwrap();
	assert_eq!(plain.len(), 2);
	let unique = G::new(&storage, &txn)
		.n_from_tag("Person")
		.out_e("knows")
		.to_n()
		.dedup()
		.collect_nodes()
		.unwrap();
	assert_eq!(unique.len(), 1);
	assert_eq!(unique[0].offset(), c.offset());
}

#[test]
fn test_filter_prop_in_stream() {
	let (_dir, storage) = setup_graph();
	let mut txn = storage.write_txn().unwrap();
	let key = storage.intern(&mut txn, "age").unwrap();
	for age in [25i64, 30, 35] {
		let node = storage.add_node(&mut txn, "Person").unwrap();
		storage.set_property(&mut txn, node.item(), key, Value::I64(age)).unwrap();
	}
	// One person with no age at all.
	storage.add_node(&mut txn, "Person").unwrap();
	txn.commit().unwrap();

	let txn = storage.read_txn().unwrap();
	let over_27 = PropertyPredicate::new(key, PredicateOp::Gt, 27i64);
	let hits = G::new(&storage, &txn)
		.n_from_tag("Person")
		.filter_prop(over_27)
		.count_all()
		.unwrap();
	assert_eq!(hits, 2);
}

#[test]
fn test_edge_selection_and_incoming() {
	let (_dir, storage) = setup_graph();
	let mut txn = storage.write_txn().unwrap();
	storage
		.create_index(
			&mut txn,
			crate::utils::items::ItemKind::Edge,
			"knows",
			"weight",
			crate::protocol::value::ValueKind::I64,
		)
		.unwrap();
	let weight = storage.intern(&mut txn, "weight").unwrap();
	let a = storage.add_node(&mut txn, "Person").unwrap();
	let b = storage.add_node(&mut txn, "Person").unwrap();
	let e1 = storage.add_edge(&mut txn, &a, &b, "knows").unwrap();
	let e2 = storage.add_edge(&mut txn, &b, &a, "knows").unwrap();
	storage.add_edge(&mut txn, &a, &b, "likes").unwrap();
	storage.set_property(&mut txn, e1.item(), weight, Value::I64(1)).unwrap();
	storage.set_property(&mut txn, e2.item(), weight, Value::I64(2)).unwrap();
	txn.commit().unwrap();

	let txn = storage.read_txn().unwrap();
	assert_eq!(G::new(&storage, &txn).e_from_all().count_all().unwrap(), 3);
	assert_eq!(G::new(&storage, &txn).e_from_tag("knows").count_all().unwrap(), 2);

	let incoming = G::new(&storage, &txn)
		.n_from_tag("Person")
		.in_e("knows")
		.collect_edges()
		.unwrap();
	assert_eq!(incoming.len(), 2);

	let heavy = PropertyPredicate::new(weight, PredicateOp::Ge, 2i64);
	let hits = G::new(&storage, &txn)
		.e_from_index("knows", &heavy)
		.collect_edges()
		.unwrap();
	assert_eq!(hits.len(), 1);
	assert_eq!(hits[0].offset(), e2.offset());
}

#[test]
fn test_unknown_tag_yields_nothing() {
	let (_dir, storage) = setup_graph();
	let mut txn = storage.write_txn().unwrap();
	storage.add_node(&mut txn, "Person").unwrap();
	txn.commit().unwrap();

	let txn = storage.read_txn().unwrap();
	assert_eq!(
		G::new(&storage, &txn).n_from_tag("Martian").count_all().unwrap(),
		0
	);
}

#[test]
fn test_empty_traversal_is_null_iterator() {
	let (_dir, storage) = setup_graph();
	let txn = storage.read_txn().unwrap();
	let err = G::new(&storage, &txn).n_from_all().collect_to_obj().unwrap_err();
	assert_eq!(err.kind, ErrorKind::NullIterator);
}

#[test]
fn test_stale_reference_is_vacant() {
	let (_dir, storage) = setup_graph();
	let mut txn = storage.write_txn().unwrap();
	let node = storage.add_node(&mut txn, "Person").unwrap();
	let key = storage.intern(&mut txn, "age").unwrap();
	storage.set_property(&mut txn, node.item(), key, Value::I64(1)).unwrap();
	txn.commit().unwrap();

	let mut txn = storage.write_txn().unwrap();
	storage.remove_node(&mut txn, &node).unwrap();
	let err = storage.get_property(&txn, node.item(), key).unwrap_err();
	assert_eq!(err.kind, ErrorKind::VacantIterator);
	txn.commit().unwrap();
}

#[test]
fn test_property_iteration_invalidated_by_write() {
	let (_dir, storage) = setup_graph();
	let mut txn = storage.write_txn().unwrap();
	let node = storage.add_node(&mut txn, "Person").unwrap();
	let age = storage.intern(&mut txn, "age").unwrap();
	let name = storage.intern(&mut txn, "name").unwrap();
	storage.set_property(&mut txn, node.item(), age, Value::I64(1)).unwrap();
	storage.set_property(&mut txn, node.item(), name, Value::from("Ann")).unwrap();
	txn.commit().unwrap();

	let mut txn = storage.write_txn().unwrap();
	let mut props = storage.get_properties(&txn, node.item()).unwrap();
	props.next().unwrap().unwrap();
	// Writing under a live iterator from the same transaction poisons it.
	storage.set_property(&mut txn, node.item(), age, Value::I64(2)).unwrap();
	let err = props.next().unwrap().unwrap_err();
	assert_eq!(err.kind, ErrorKind::IteratorInvalidated);
	drop(props);
	txn.commit().unwrap();
}
