use bytemuck::{Pod, Zeroable};

use crate::grove_engine::storage_core::GroveGraphStorage;
use crate::grove_engine::storage_core::allocator::PoolId;
use crate::grove_engine::storage_core::region::RegionId;
use crate::grove_engine::storage_core::txn::RwTxn;
use crate::grove_engine::types::{GraphError, gerr};
use crate::utils::items::{NULL_OFFSET, Offset};

pub(crate) const BUCKET_CAP: usize = 8;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(crate) struct BucketRec {
	pub next: u64,
	pub count: u32,
	pub _pad: u32,
	pub slots: [u64; 8],
}

/// Singly linked list of fixed-capacity buckets of object offsets.
///
/// New elements append to the tail bucket, so across-bucket order is
/// insertion order; removal swaps the last element of a bucket into the
/// hole, so order inside one bucket is unspecified. Buckets always live in
/// the indices region. All operations act through a "head location": the
/// offset of the u64 that anchors the list (a tag-table entry or an AVL
/// node's bucket field).
pub(crate) struct ChunkList;

impl ChunkList {
	pub fn insert(txn: &mut RwTxn, head_loc: Offset, value: Offset) -> Result<(), GraphError> {
		let storage = txn.storage();
		let region = storage.regions.get(RegionId::Indices);
		let head: u64 = region.read(head_loc)?;

		if head == NULL_OFFSET {
			let bucket_off = Self::new_bucket(txn, value)?;
			return txn.write_u64(RegionId::Indices, head_loc, bucket_off);
		}

		let mut cur = head;
		loop {
			let rec: BucketRec = region.read(cur)?;
			if rec.next == NULL_OFFSET {
				if (rec.count as usize) < BUCKET_CAP {
					let mut rec = rec;
					rec.slots[rec.count as usize] = value;
					rec.count += 1;
					return txn.write_rec(RegionId::Indices, cur, &rec);
				}
				let bucket_off = Self::new_bucket(txn, value)?;
				let mut rec = rec;
				rec.next = bucket_off;
				return txn.write_rec(RegionId::Indices, cur, &rec);
			}
			cur = rec.next;
		}
	}

	fn new_bucket(txn: &mut RwTxn, value: Offset) -> Result<Offset, GraphError> {
		let storage = txn.storage();
		let bucket_off = storage.pools.get(PoolId::Bucket).alloc(txn)?;
		let mut rec = BucketRec::zeroed();
		rec.count = 1;
		rec.slots[0] = value;
		txn.write_rec(RegionId::Indices, bucket_off, &rec)?;
		Ok(bucket_off)
	}

	/// Removes one occurrence of `value`. Empty buckets are spliced out and
	/// returned to the pool.
	pub fn remove(txn: &mut RwTxn, head_loc: Offset, value: Offset) -> Result<bool, GraphError> {
		let storage = txn.storage();
		let region = storage.regions.get(RegionId::Indices);
		let mut prev = NULL_OFFSET;
		let mut cur: u64 = region.read(head_loc)?;

		while cur != NULL_OFFSET {
			let mut rec: BucketRec = region.read(cur)?;
			if let Some(idx) = rec.slots[..rec.count as usize].iter().position(|s| *s == value) {
				rec.count -= 1;
				rec.slots[idx] = rec.slots[rec.count as usize];
				rec.slots[rec.count as usize] = 0;
				if rec.count == 0 {
					if prev == NULL_OFFSET {
						txn.write_u64(RegionId::Indices, head_loc, rec.next)?;
					} else {
						let mut prev_rec: BucketRec = region.read(prev)?;
						prev_rec.next = rec.next;
						txn.write_rec(RegionId::Indices, prev, &prev_rec)?;
					}
					storage.pools.get(PoolId::Bucket).free(txn, cur)?;
				} else {
					txn.write_rec(RegionId::Indices, cur, &rec)?;
				}
				return Ok(true);
			}
			prev = cur;
			cur = rec.next;
		}
		Ok(false)
	}

	pub fn len(storage: &GroveGraphStorage, head: Offset) -> Result<u64, GraphError> {
		let region = storage.regions.get(RegionId::Indices);
		let mut total = 0u64;
		let mut cur = head;
		while cur != NULL_OFFSET {
			let rec: BucketRec = region.read(cur)?;
			total += rec.count as u64;
			cur = rec.next;
		}
		Ok(total)
	}

	pub fn iter(storage: &GroveGraphStorage, head: Offset) -> ChunkListIter<'_> {
		ChunkListIter {
			storage,
			bucket: head,
			idx: 0,
			expected_version: storage.txn_mgr.write_version(),
			failed: false,
		}
	}
}

/// Lazy walk over a chunk list. Advancing after a write from the same
/// transaction fails with `IteratorInvalidated`.
pub(crate) struct ChunkListIter<'db> {
	storage: &'db GroveGraphStorage,
	bucket: Offset,
	idx: usize,
	expected_version: u64,
	failed: bool,
}

impl Iterator for ChunkListIter<'_> {
	type Item = Result<Offset, GraphError>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.failed || self.bucket == NULL_OFFSET {
			return None;
		}
		if self.storage.txn_mgr.write_version() != self.expected_version {
			self.failed = true;
			return Some(Err(gerr!(IteratorInvalidated, "chunk list changed under iteration")));
		}
		let region = self.storage.regions.get(RegionId::Indices);
		loop {
			let rec: BucketRec = match region.read(self.bucket) {
				Ok(rec) => rec,
				Err(e) => {
					self.failed = true;
					return Some(Err(e));
				}
			};
			if self.idx < rec.count as usize {
				let value = rec.slots[self.idx];
				self.idx += 1;
				return Some(Ok(value));
			}
			self.bucket = rec.next;
			self.idx = 0;
			if self.bucket == NULL_OFFSET {
				return None;
			}
		}
	}
}
