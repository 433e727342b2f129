use crate::grove_engine::storage_core::GroveGraphStorage;
use crate::grove_engine::storage_core::txn::{RoTxn, RwTxn};
use crate::grove_engine::traversal_core::traversal_value::TraversalValue;
use crate::grove_engine::types::GraphError;
use crate::utils::items::{Edge, Node};

/// What a filter callback decided about the current element, and whether
/// iteration should continue afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
	Pass,
	DontPass,
	PassStop,
	DontPassStop,
}

/// Read-only traversal pipeline: a lazy stream of results threaded together
/// with the storage handle and transaction the adapters need.
#[derive(Debug)]
pub struct RoTraversalIterator<'db, 'txn, I> {
	pub storage: &'db GroveGraphStorage,
	pub txn: &'txn RoTxn<'db>,
	pub inner: I,
}

impl<'db, 'txn, I> Iterator for RoTraversalIterator<'db, 'txn, I>
where
	I: Iterator<Item = Result<TraversalValue, GraphError>>,
{
	type Item = Result<TraversalValue, GraphError>;

	fn next(&mut self) -> Option<Self::Item> {
		self.inner.next()
	}
}

impl<'db, 'txn, I: Iterator<Item = Result<TraversalValue, GraphError>>>
	RoTraversalIterator<'db, 'txn, I>
{
	/// Filters with early-termination control: `PassStop` delivers the
	/// current element and then ends the stream, `DontPassStop` just ends it.
	pub fn filter_by(
		self,
		f: impl FnMut(&TraversalValue) -> Disposition,
	) -> RoTraversalIterator<'db, 'txn, FilterBy<I, impl FnMut(&TraversalValue) -> Disposition>> {
		RoTraversalIterator {
			storage: self.storage,
			txn: self.txn,
			inner: FilterBy {
				iter: self.inner,
				f,
				stopped: false,
			},
		}
	}

	/// Consumes the stream, invoking `f` for every element; returns how many
	/// elements were seen. The first failure ends the traversal.
	pub fn process(self, mut f: impl FnMut(&TraversalValue)) -> Result<u64, GraphError> {
		let mut n = 0;
		for item in self.inner {
			f(&item?);
			n += 1;
		}
		Ok(n)
	}

	pub fn count_all(self) -> Result<u64, GraphError> {
		let mut n = 0;
		for item in self.inner {
			item?;
			n += 1;
		}
		Ok(n)
	}

	/// Collects the nodes in the stream, ignoring elements of other shapes.
	pub fn collect_nodes(self) -> Result<Vec<Node>, GraphError> {
		let mut out = Vec::new();
		for item in self.inner {
			if let TraversalValue::Node(n) = item? {
				out.push(n);
			}
		}
		Ok(out)
	}

	pub fn collect_edges(self) -> Result<Vec<Edge>, GraphError> {
		let mut out = Vec::new();
		for item in self.inner {
			if let TraversalValue::Edge(e) = item? {
				out.push(e);
			}
		}
		Ok(out)
	}

	/// First element of the stream, or `NullIterator`.
	pub fn collect_to_obj(mut self) -> Result<TraversalValue, GraphError> {
		self.inner.next().unwrap_or(Err(crate::grove_engine::types::gerr!(
			NullIterator,
			"traversal produced no elements"
		)))
	}
}

/// Write-enabled traversal pipeline. Mutating adapters run eagerly and put
/// their results back on the stream.
pub struct RwTraversalIterator<'db, 'txn, I> {
	pub storage: &'db GroveGraphStorage,
	pub txn: &'txn mut RwTxn<'db>,
	pub inner: I,
}

impl<'db, 'txn, I> Iterator for RwTraversalIterator<'db, 'txn, I>
where
	I: Iterator<Item = Result<TraversalValue, GraphError>>,
{
	type Item = Result<TraversalValue, GraphError>;

	fn next(&mut self) -> Option<Self::Item> {
		self.inner.next()
	}
}

impl<'db, 'txn, I: Iterator<Item = Result<TraversalValue, GraphError>>>
	RwTraversalIterator<'db, 'txn, I>
{
	pub fn collect_to_obj(mut self) -> Result<TraversalValue, GraphError> {
		self.inner.next().unwrap_or(Err(crate::grove_engine::types::gerr!(
			NullIterator,
			"traversal produced no elements"
		)))
	}

	pub fn collect_nodes(self) -> Result<Vec<Node>, GraphError> {
		let mut out = Vec::new();
		for item in self.inner {
			if let TraversalValue::Node(n) = item? {
				out.push(n);
			}
		}
		Ok(out)
	}

	pub fn collect_edges(self) -> Result<Vec<Edge>, GraphError> {
		let mut out = Vec::new();
		for item in self.inner {
			if let TraversalValue::Edge(e) = item? {
				out.push(e);
			}
		}
		Ok(out)
	}
}

pub struct FilterBy<I, F> {
	iter: I,
	f: F,
	stopped: bool,
}

impl<I, F> Iterator for FilterBy<I, F>
where
	I: Iterator<Item = Result<TraversalValue, GraphError>>,
	F: FnMut(&TraversalValue) -> Disposition,
{
	type Item = Result<TraversalValue, GraphError>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.stopped {
			return None;
		}
		loop {
			let item = match self.iter.next()? {
				Ok(item) => item,
				Err(e) => {
					self.stopped = true;
					return Some(Err(e));
				}
			};
			match (self.f)(&item) {
				Disposition::Pass => return Some(Ok(item)),
				Disposition::DontPass => continue,
				Disposition::PassStop => {
					self.stopped = true;
					return Some(Ok(item));
				}
				Disposition::DontPassStop => {
					self.stopped = true;
					return None;
				}
			}
		}
	}
}
