use std::cmp::Ordering;

use bytemuck::{Pod, Zeroable};

use crate::grove_engine::storage_core::GroveGraphStorage;
use crate::grove_engine::storage_core::allocator::PoolId;
use crate::grove_engine::storage_core::index::chunk_list::ChunkList;
use crate::grove_engine::storage_core::region::RegionId;
use crate::grove_engine::storage_core::txn::RwTxn;
use crate::grove_engine::types::{GraphError, gerr};
use crate::protocol::value::{Value, ValueKind};
use crate::utils::items::{NULL_OFFSET, Offset};

/// Fixed-width comparable form of an indexed property value.
///
/// Strings keep only their first 16 bytes; two strings sharing a prefix
/// share a tree node and are told apart by re-checking the full property
/// value during iteration.
#[derive(Debug, Clone, Copy)]
pub(crate) struct IndexKey {
	pub kind: u8,
	pub len: u8,
	pub bytes: [u8; 16],
}

impl IndexKey {
	pub fn from_value(value: &Value) -> Result<IndexKey, GraphError> {
		let mut bytes = [0u8; 16];
		let len = match value {
			Value::Boolean(b) => {
				bytes[0] = *b as u8;
				1
			}
			Value::I64(v) => {
				bytes[..8].copy_from_slice(&v.to_le_bytes());
				8
			}
			Value::F64(v) => {
				bytes[..8].copy_from_slice(&v.to_bits().to_le_bytes());
				8
			}
			Value::String(s) => {
				let take = s.len().min(16);
				bytes[..take].copy_from_slice(&s.as_bytes()[..take]);
				take
			}
			Value::Date(d) => {
				bytes[..8].copy_from_slice(&d.utc_epoch_us().to_le_bytes());
				bytes[8] = d.tz_quarter_hours() as u8;
				9
			}
			Value::Empty | Value::Blob(_) => {
				return Err(gerr!(
					PropertyTypeInvalid,
					"{} values cannot be index keys",
					value.kind().name()
				));
			}
		};
		Ok(IndexKey {
			kind: value.kind().as_u8(),
			len: len as u8,
			bytes,
		})
	}

	pub fn compare(&self, other: &IndexKey) -> Ordering {
		if self.kind != other.kind {
			return self.kind.cmp(&other.kind);
		}
		match ValueKind::from_u8(self.kind) {
			Some(ValueKind::Boolean) => self.bytes[0].cmp(&other.bytes[0]),
			Some(ValueKind::I64) => self.as_i64().cmp(&other.as_i64()),
			Some(ValueKind::F64) => {
				f64::from_bits(self.as_i64() as u64).total_cmp(&f64::from_bits(other.as_i64() as u64))
			}
			Some(ValueKind::String) => {
				self.bytes[..self.len as usize].cmp(&other.bytes[..other.len as usize])
			}
			Some(ValueKind::Date) => (self.as_i64(), self.bytes[8] as i8)
				.cmp(&(other.as_i64(), other.bytes[8] as i8)),
			_ => Ordering::Equal,
		}
	}

	fn as_i64(&self) -> i64 {
		let mut buf = [0u8; 8];
		buf.copy_from_slice(&self.bytes[..8]);
		i64::from_le_bytes(buf)
	}
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(crate) struct TreeNodeRec {
	pub left: u64,
	pub right: u64,
	pub bucket: u64,
	pub kbytes: [u8; 16],
	pub klen: u8,
	pub kkind: u8,
	pub height: u8,
	pub _pad: [u8; 5],
}

/// Byte offset of the `bucket` field inside a tree node; chunk-list calls
/// anchor the per-key bucket there.
const TREE_BUCKET_FIELD: u64 = 16;

fn key_of(rec: &TreeNodeRec) -> IndexKey {
	IndexKey {
		kind: rec.kkind,
		len: rec.klen,
		bytes: rec.kbytes,
	}
}

fn read_node(storage: &GroveGraphStorage, off: Offset) -> Result<TreeNodeRec, GraphError> {
	storage.regions.get(RegionId::Indices).read(off)
}

fn height(storage: &GroveGraphStorage, off: Offset) -> Result<u8, GraphError> {
	if off == NULL_OFFSET {
		Ok(0)
	} else {
		Ok(read_node(storage, off)?.height)
	}
}

fn write_node(txn: &mut RwTxn, off: Offset, rec: &TreeNodeRec) -> Result<(), GraphError> {
	txn.write_rec(RegionId::Indices, off, rec)
}

fn rotate_right(txn: &mut RwTxn, y_off: Offset) -> Result<Offset, GraphError> {
	let storage = txn.storage();
	let mut y = read_node(storage, y_off)?;
	let x_off = y.left;
	let mut x = read_node(storage, x_off)?;
	y.left = x.right;
	y.height = 1 + height(storage, y.left)?.max(height(storage, y.right)?);
	x.right = y_off;
	x.height = 1 + height(storage, x.left)?.max(y.height);
	write_node(txn, y_off, &y)?;
	write_node(txn, x_off, &x)?;
	Ok(x_off)
}

fn rotate_left(txn: &mut RwTxn, x_off: Offset) -> Result<Offset, GraphError> {
	let storage = txn.storage();
	let mut x = read_node(storage, x_off)?;
	let y_off = x.right;
	let mut y = read_node(storage, y_off)?;
	x.right = y.left;
	x.height = 1 + height(storage, x.left)?.max(height(storage, x.right)?);
	y.left = x_off;
	y.height = 1 + x.height.max(height(storage, y.right)?);
	write_node(txn, x_off, &x)?;
	write_node(txn, y_off, &y)?;
	Ok(y_off)
}

/// Restores the ±1 balance invariant at `off` and returns the offset of the
/// (possibly new) subtree root.
fn rebalance(txn: &mut RwTxn, off: Offset) -> Result<Offset, GraphError> {
	let storage = txn.storage();
	let mut n = read_node(storage, off)?;
	let hl = height(storage, n.left)?;
	let hr = height(storage, n.right)?;

	if hl > hr + 1 {
		let l = read_node(storage, n.left)?;
		if height(storage, l.left)? < height(storage, l.right)? {
			n.left = rotate_left(txn, n.left)?;
			write_node(txn, off, &n)?;
		}
		return rotate_right(txn, off);
	}
	if hr > hl + 1 {
		let r = read_node(storage, n.right)?;
		if height(storage, r.right)? < height(storage, r.left)? {
			n.right = rotate_right(txn, n.right)?;
			write_node(txn, off, &n)?;
		}
		return rotate_left(txn, off);
	}

	let h = 1 + hl.max(hr);
	if h != n.height {
		n.height = h;
		write_node(txn, off, &n)?;
	}
	Ok(off)
}

fn insert_at(
	txn: &mut RwTxn,
	off: Offset,
	key: &IndexKey,
	entity: Offset,
) -> Result<Offset, GraphError> {
	if off == NULL_OFFSET {
		let storage = txn.storage();
		let node_off = storage.pools.get(PoolId::TreeNode).alloc(txn)?;
		let rec = TreeNodeRec {
			left: NULL_OFFSET,
			right: NULL_OFFSET,
			bucket: NULL_OFFSET,
			kbytes: key.bytes,
			klen: key.len,
			kkind: key.kind,
			height: 1,
			_pad: [0; 5],
		};
		write_node(txn, node_off, &rec)?;
		ChunkList::insert(txn, node_off + TREE_BUCKET_FIELD, entity)?;
		return Ok(node_off);
	}

	let n = read_node(txn.storage(), off)?;
	match key.compare(&key_of(&n)) {
		Ordering::Equal => {
			ChunkList::insert(txn, off + TREE_BUCKET_FIELD, entity)?;
			Ok(off)
		}
		Ordering::Less => {
			let new_left = insert_at(txn, n.left, key, entity)?;
			if new_left != n.left {
				let mut n = read_node(txn.storage(), off)?;
				n.left = new_left;
				write_node(txn, off, &n)?;
			}
			rebalance(txn, off)
		}
		Ordering::Greater => {
			let new_right = insert_at(txn, n.right, key, entity)?;
			if new_right != n.right {
				let mut n = read_node(txn.storage(), off)?;
				n.right = new_right;
				write_node(txn, off, &n)?;
			}
			rebalance(txn, off)
		}
	}
}

/// Unlinks the smallest node of the subtree without touching its bucket.
/// Returns `(new_subtree_root, detached_node)`.
fn detach_min(txn: &mut RwTxn, off: Offset) -> Result<(Offset, Offset), GraphError> {
	let n = read_node(txn.storage(), off)?;
	if n.left == NULL_OFFSET {
		return Ok((n.right, off));
	}
	let (new_left, detached) = detach_min(txn, n.left)?;
	if new_left != n.left {
		let mut n = read_node(txn.storage(), off)?;
		n.left = new_left;
		write_node(txn, off, &n)?;
	}
	Ok((rebalance(txn, off)?, detached))
}

fn remove_at(
	txn: &mut RwTxn,
	off: Offset,
	key: &IndexKey,
	entity: Offset,
	removed: &mut bool,
) -> Result<Offset, GraphError> {
	if off == NULL_OFFSET {
		return Ok(NULL_OFFSET);
	}
	let n = read_node(txn.storage(), off)?;
	match key.compare(&key_of(&n)) {
		Ordering::Less => {
			let new_left = remove_at(txn, n.left, key, entity, removed)?;
			if new_left != n.left {
				let mut n = read_node(txn.storage(), off)?;
				n.left = new_left;
				write_node(txn, off, &n)?;
			}
			rebalance(txn, off)
		}
		Ordering::Greater => {
			let new_right = remove_at(txn, n.right, key, entity, removed)?;
			if new_right != n.right {
				let mut n = read_node(txn.storage(), off)?;
				n.right = new_right;
				write_node(txn, off, &n)?;
			}
			rebalance(txn, off)
		}
		Ordering::Equal => {
			*removed = ChunkList::remove(txn, off + TREE_BUCKET_FIELD, entity)?;
			let n = read_node(txn.storage(), off)?;
			if n.bucket != NULL_OFFSET {
				return Ok(off);
			}
			// Last entry under this key: the tree node goes too.
			let storage = txn.storage();
			if n.left == NULL_OFFSET || n.right == NULL_OFFSET {
				let child = if n.left == NULL_OFFSET { n.right } else { n.left };
				storage.pools.get(PoolId::TreeNode).free(txn, off)?;
				return Ok(child);
			}
			let (new_right, succ_off) = detach_min(txn, n.right)?;
			let succ = read_node(txn.storage(), succ_off)?;
			let mut n = read_node(txn.storage(), off)?;
			n.kbytes = succ.kbytes;
			n.klen = succ.klen;
			n.kkind = succ.kkind;
			n.bucket = succ.bucket;
			n.right = new_right;
			write_node(txn, off, &n)?;
			txn.storage().pools.get(PoolId::TreeNode).free(txn, succ_off)?;
			rebalance(txn, off)
		}
	}
}

/// On-media AVL index keyed by a property value; each tree node anchors a
/// chunk list of entity offsets sharing the key. `root_loc` is the offset of
/// the u64 root pointer inside the index descriptor.
pub(crate) struct AvlTree;

impl AvlTree {
	pub fn insert_entry(
		txn: &mut RwTxn,
		root_loc: Offset,
		key: &IndexKey,
		entity: Offset,
	) -> Result<(), GraphError> {
		let root: u64 = txn.storage().regions.get(RegionId::Indices).read(root_loc)?;
		let new_root = insert_at(txn, root, key, entity)?;
		if new_root != root {
			txn.write_u64(RegionId::Indices, root_loc, new_root)?;
		}
		Ok(())
	}

	pub fn remove_entry(
		txn: &mut RwTxn,
		root_loc: Offset,
		key: &IndexKey,
		entity: Offset,
	) -> Result<bool, GraphError> {
		let root: u64 = txn.storage().regions.get(RegionId::Indices).read(root_loc)?;
		let mut removed = false;
		let new_root = remove_at(txn, root, key, entity, &mut removed)?;
		if new_root != root {
			txn.write_u64(RegionId::Indices, root_loc, new_root)?;
		}
		Ok(removed)
	}

	pub fn root(storage: &GroveGraphStorage, root_loc: Offset) -> Result<Offset, GraphError> {
		storage.regions.get(RegionId::Indices).read(root_loc)
	}

	/// In-order (or reverse) walk between optional bounds; each item is a
	/// key plus the head of its bucket.
	pub fn range_iter(
		storage: &GroveGraphStorage,
		root: Offset,
		lo: Option<(IndexKey, bool)>,
		hi: Option<(IndexKey, bool)>,
		reverse: bool,
	) -> AvlRangeIter<'_> {
		let mut iter = AvlRangeIter {
			storage,
			stack: Vec::new(),
			lo,
			hi,
			reverse,
			expected_version: storage.txn_mgr.write_version(),
			failed: false,
			pending_error: None,
		};
		if let Err(e) = iter.descend(root) {
			iter.stack.clear();
			iter.pending_error = Some(e);
		}
		iter
	}

	/// Walks the whole tree verifying the balance and ordering invariants.
	/// Returns `(height, distinct_keys, total_entries)`.
	pub fn check_invariants(
		storage: &GroveGraphStorage,
		root: Offset,
	) -> Result<(u8, u64, u64), GraphError> {
		fn walk(
			storage: &GroveGraphStorage,
			off: Offset,
			lo: Option<&IndexKey>,
			hi: Option<&IndexKey>,
		) -> Result<(u8, u64, u64), GraphError> {
			if off == NULL_OFFSET {
				return Ok((0, 0, 0));
			}
			let n = read_node(storage, off)?;
			let k = key_of(&n);
			if let Some(lo) = lo
				&& k.compare(lo) != Ordering::Greater
			{
				return Err(gerr!(LayoutCorrupt, "tree order violated at {off}"));
			}
			if let Some(hi) = hi
				&& k.compare(hi) != Ordering::Less
			{
				return Err(gerr!(LayoutCorrupt, "tree order violated at {off}"));
			}
			if n.bucket == NULL_OFFSET {
				return Err(gerr!(LayoutCorrupt, "empty bucket at tree node {off}"));
			}
			let (hl, kl, el) = walk(storage, n.left, lo, Some(&k))?;
			let (hr, kr, er) = walk(storage, n.right, Some(&k), hi)?;
			if hl.abs_diff(hr) > 1 {
				return Err(gerr!(LayoutCorrupt, "balance factor out of range at {off}"));
			}
			if n.height != 1 + hl.max(hr) {
				return Err(gerr!(LayoutCorrupt, "stale height at {off}"));
			}
			let entries = ChunkList::len(storage, n.bucket)?;
			Ok((n.height, kl + kr + 1, el + er + entries))
		}
		walk(storage, root, None, None)
	}
}

pub(crate) struct AvlRangeIter<'db> {
	storage: &'db GroveGraphStorage,
	stack: Vec<Offset>,
	lo: Option<(IndexKey, bool)>,
	hi: Option<(IndexKey, bool)>,
	reverse: bool,
	expected_version: u64,
	failed: bool,
	pending_error: Option<GraphError>,
}

impl AvlRangeIter<'_> {
	fn below_lo(&self, key: &IndexKey) -> bool {
		match &self.lo {
			Some((bound, inclusive)) => match key.compare(bound) {
				Ordering::Less => true,
				Ordering::Equal => !inclusive,
				Ordering::Greater => false,
			},
			None => false,
		}
	}

	fn above_hi(&self, key: &IndexKey) -> bool {
		match &self.hi {
			Some((bound, inclusive)) => match key.compare(bound) {
				Ordering::Greater => true,
				Ordering::Equal => !inclusive,
				Ordering::Less => false,
			},
			None => false,
		}
	}

	fn descend(&mut self, mut off: Offset) -> Result<(), GraphError> {
		while off != NULL_OFFSET {
			let n = read_node(self.storage, off)?;
			let k = key_of(&n);
			if !self.reverse {
				if self.below_lo(&k) {
					off = n.right;
					continue;
				}
				self.stack.push(off);
				off = n.left;
			} else {
				if self.above_hi(&k) {
					off = n.left;
					continue;
				}
				self.stack.push(off);
				off = n.right;
			}
		}
		Ok(())
	}
}

impl Iterator for AvlRangeIter<'_> {
	type Item = Result<(IndexKey, Offset), GraphError>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.failed {
			return None;
		}
		if let Some(e) = self.pending_error.take() {
			self.failed = true;
			return Some(Err(e));
		}
		if self.storage.txn_mgr.write_version() != self.expected_version {
			self.failed = true;
			return Some(Err(gerr!(IteratorInvalidated, "index changed under iteration")));
		}
		let off = self.stack.pop()?;
		let n = match read_node(self.storage, off) {
			Ok(n) => n,
			Err(e) => {
				self.failed = true;
				return Some(Err(e));
			}
		};
		let k = key_of(&n);
		let out_of_bounds = if self.reverse { self.below_lo(&k) } else { self.above_hi(&k) };
		if out_of_bounds {
			self.stack.clear();
			return None;
		}
		let next = if self.reverse { n.left } else { n.right };
		if let Err(e) = self.descend(next) {
			self.failed = true;
			return Some(Err(e));
		}
		Some(Ok((k, n.bucket)))
	}
}
