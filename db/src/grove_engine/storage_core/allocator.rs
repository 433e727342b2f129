use std::sync::atomic::{AtomicUsize, Ordering};

use bytemuck::{Pod, Zeroable};
use parking_lot::Mutex;

use crate::grove_engine::storage_core::region::{Region, RegionId};
use crate::grove_engine::storage_core::stats::AllocatorStats;
use crate::grove_engine::storage_core::txn::RwTxn;
use crate::grove_engine::types::{GraphError, gerr};
use crate::utils::items::{NULL_OFFSET, Offset};

/// The fixed-object pools, in registry order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolId {
	Node = 0,
	Edge = 1,
	PropChunk = 2,
	TreeNode = 3,
	Bucket = 4,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(crate) struct PoolHeaderRec {
	pub slot_size: u32,
	pub _pad: u32,
	pub num_slots: u64,
	pub bump: u64,
	pub free_count: u64,
}

const POOL_HEADER_SIZE: u64 = 32;

/// A fixed-size slab: header, free-bitmap, then `num_slots` slots.
/// Allocation prefers the lowest free slot; the bitmap has one live bit per
/// slot and every mutation of it is journalled.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FixedPool {
	pub id: PoolId,
	pub region: RegionId,
	pub base: Offset,
	pub slot_size: u32,
	pub num_slots: u64,
	bitmap_off: Offset,
	data_off: Offset,
}

impl FixedPool {
	fn bitmap_words(num_slots: u64) -> u64 {
		num_slots.div_ceil(64)
	}

	/// Bytes the pool occupies in its region, header and bitmap included.
	pub fn footprint(slot_size: u32, num_slots: u64) -> u64 {
		POOL_HEADER_SIZE + Self::bitmap_words(num_slots) * 8 + num_slots * slot_size as u64
	}

	pub fn layout(id: PoolId, region: RegionId, base: Offset, slot_size: u32, num_slots: u64) -> FixedPool {
		let bitmap_off = base + POOL_HEADER_SIZE;
		let data_off = bitmap_off + Self::bitmap_words(num_slots) * 8;
		FixedPool {
			id,
			region,
			base,
			slot_size,
			num_slots,
			bitmap_off,
			data_off,
		}
	}

	/// Writes the initial header at graph creation time.
	pub fn init(&self, region: &Region) -> Result<(), GraphError> {
		let header = PoolHeaderRec {
			slot_size: self.slot_size,
			_pad: 0,
			num_slots: self.num_slots,
			bump: 0,
			free_count: 0,
		};
		region.write_rec_raw(self.base, &header)
	}

	/// Re-derives the descriptor from a persisted header, verifying shape.
	pub fn open(
		id: PoolId,
		region: RegionId,
		base: Offset,
		slot_size: u32,
		mapped: &Region,
	) -> Result<FixedPool, GraphError> {
		let header: PoolHeaderRec = mapped.read(base)?;
		if header.slot_size != slot_size || header.bump > header.num_slots {
			return Err(gerr!(
				LayoutCorrupt,
				"pool {id:?} header slot_size {} bump {} num_slots {}",
				header.slot_size,
				header.bump,
				header.num_slots
			));
		}
		Ok(Self::layout(id, region, base, slot_size, header.num_slots))
	}

	pub fn offset_of(&self, slot: u64) -> Offset {
		self.data_off + slot * self.slot_size as u64
	}

	pub fn slot_of(&self, off: Offset) -> u64 {
		(off - self.data_off) / self.slot_size as u64
	}

	fn word_off(&self, slot: u64) -> Offset {
		self.bitmap_off + (slot / 64) * 8
	}

	pub fn is_live(&self, region: &Region, slot: u64) -> bool {
		if slot >= self.num_slots {
			return false;
		}
		match region.read::<u64>(self.word_off(slot)) {
			Ok(word) => word & (1u64 << (slot % 64)) != 0,
			Err(_) => false,
		}
	}

	pub fn is_live_off(&self, region: &Region, off: Offset) -> bool {
		off >= self.data_off
			&& (off - self.data_off) % self.slot_size as u64 == 0
			&& self.is_live(region, self.slot_of(off))
	}

	/// Allocates the lowest free slot and returns its offset.
	pub fn alloc(&self, txn: &mut RwTxn) -> Result<Offset, GraphError> {
		let storage = txn.storage();
		let region = storage.regions.get(self.region);
		let mut header: PoolHeaderRec = region.read(self.base)?;

		let slot = if header.free_count > 0 {
			let mut found = None;
			for word_idx in 0..Self::bitmap_words(header.bump) {
				let word: u64 = region.read(self.bitmap_off + word_idx * 8)?;
				if word != u64::MAX {
					let bit = word.trailing_ones() as u64;
					let slot = word_idx * 64 + bit;
					if slot < header.bump {
						found = Some(slot);
						break;
					}
				}
			}
			match found {
				Some(slot) => {
					header.free_count -= 1;
					slot
				}
				None => {
					return Err(gerr!(
						LayoutCorrupt,
						"pool {:?} free_count {} but bitmap full",
						self.id,
						header.free_count
					));
				}
			}
		} else if header.bump < header.num_slots {
			let slot = header.bump;
			header.bump += 1;
			slot
		} else {
			return Err(gerr!(OutOfSpace, "pool {:?} exhausted at {} slots", self.id, self.num_slots));
		};

		let word_off = self.word_off(slot);
		let word: u64 = region.read(word_off)?;
		txn.write_u64(self.region, word_off, word | (1u64 << (slot % 64)))?;
		txn.write_rec(self.region, self.base, &header)?;
		Ok(self.offset_of(slot))
	}

	/// Clears the live bit so the object disappears from scans at once, and
	/// schedules the slot to re-enter the freelist at commit. An abort
	/// restores the bit from the journal and the object stays live.
	pub(crate) fn free(&self, txn: &mut RwTxn, off: Offset) -> Result<(), GraphError> {
		let storage = txn.storage();
		let region = storage.regions.get(self.region);
		let slot = self.slot_of(off);
		let word_off = self.word_off(slot);
		let word: u64 = region.read(word_off)?;
		if word & (1u64 << (slot % 64)) == 0 {
			return Err(gerr!(InvalidId, "double free of slot {slot} in pool {:?}", self.id));
		}
		txn.write_u64(self.region, word_off, word & !(1u64 << (slot % 64)))?;
		txn.defer_free_slot(self.id, off);
		Ok(())
	}

	/// Commit-time half of [`FixedPool::free`]: bumps the freelist counter
	/// that makes the cleared slot findable by future allocations.
	pub(crate) fn free_now(&self, txn: &mut RwTxn, _off: Offset) -> Result<(), GraphError> {
		let storage = txn.storage();
		let region = storage.regions.get(self.region);
		let mut header: PoolHeaderRec = region.read(self.base)?;
		header.free_count += 1;
		txn.write_rec(self.region, self.base, &header)?;
		Ok(())
	}

	/// Live slot indices in address order.
	pub fn live_slots<'r>(&self, region: &'r Region) -> impl Iterator<Item = u64> + use<'r> {
		let pool = *self;
		let bump = region
			.read::<PoolHeaderRec>(pool.base)
			.map(|h| h.bump)
			.unwrap_or(0);
		(0..bump).filter(move |slot| pool.is_live(region, *slot))
	}

	pub fn stats(&self, region: &Region) -> Result<AllocatorStats, GraphError> {
		let header: PoolHeaderRec = region.read(self.base)?;
		let live = header.bump - header.free_count;
		let health = if header.bump == 0 {
			100.0
		} else {
			live as f64 * 100.0 / header.bump as f64
		};
		let region_size = Self::footprint(self.slot_size, self.num_slots);
		Ok(AllocatorStats {
			object_size: self.slot_size as u64,
			num_objects: live,
			total_allocated_bytes: live * self.slot_size as u64,
			region_size,
			occupancy: live as f64 * self.slot_size as f64 * 100.0 / region_size as f64,
			health_factor: health,
		})
	}
}

const ARENA_CLASSES: [u64; 9] = [16, 32, 64, 128, 256, 512, 1024, 2048, 4096];
const ARENA_HEADER: u64 = 8;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(crate) struct ArenaShardRec {
	pub bump: u64,
	pub end: u64,
	pub allocated: u64,
	pub class_heads: [u64; 9],
	pub exact_head: u64,
}

pub(crate) const ARENA_SHARD_HEADER: u64 = 104;

/// Variable-size arena for long strings, blobs and other spill values.
///
/// Blocks carry an 8-byte capacity header. Freed blocks go to a
/// power-of-two size-class freelist up to 4 KiB and to an exact-fit list
/// beyond that. The arena is sharded to keep allocation contention off the
/// single writer's critical path.
#[derive(Debug)]
pub(crate) struct VariableArena {
	shards: Vec<ArenaShard>,
	next_shard: AtomicUsize,
}

#[derive(Debug)]
struct ArenaShard {
	base: Offset,
	lock: Mutex<()>,
}

fn class_of(block: u64) -> Option<usize> {
	ARENA_CLASSES.iter().position(|c| *c == block)
}

fn block_size_for(payload_len: u64) -> u64 {
	let need = payload_len + ARENA_HEADER;
	match ARENA_CLASSES.iter().find(|c| **c >= need) {
		Some(class) => *class,
		None => need.next_multiple_of(8),
	}
}

impl VariableArena {
	pub fn layout(base: Offset, shard_size: u64, num_shards: u32) -> VariableArena {
		let shards = (0..num_shards as u64)
			.map(|i| ArenaShard {
				base: base + i * shard_size,
				lock: Mutex::new(()),
			})
			.collect();
		VariableArena {
			shards,
			next_shard: AtomicUsize::new(0),
		}
	}

	pub fn shard_size(&self) -> u64 {
		if self.shards.len() > 1 {
			self.shards[1].base - self.shards[0].base
		} else {
			0
		}
	}

	pub fn init(&self, region: &Region, shard_size: u64) -> Result<(), GraphError> {
		for shard in &self.shards {
			let rec = ArenaShardRec {
				bump: shard.base + ARENA_SHARD_HEADER,
				end: shard.base + shard_size,
				allocated: 0,
				class_heads: [NULL_OFFSET; 9],
				exact_head: NULL_OFFSET,
			};
			region.write_rec_raw(shard.base, &rec)?;
		}
		Ok(())
	}

	/// Allocates `len` payload bytes and returns the payload offset.
	pub fn alloc(&self, txn: &mut RwTxn, len: u64) -> Result<Offset, GraphError> {
		let start = self.next_shard.fetch_add(1, Ordering::Relaxed);
		for i in 0..self.shards.len() {
			let shard = &self.shards[(start + i) % self.shards.len()];
			if let Some(off) = self.alloc_in_shard(txn, shard, len)? {
				return Ok(off);
			}
		}
		Err(gerr!(OutOfSpace, "variable arena exhausted for {len} byte allocation"))
	}

	fn alloc_in_shard(
		&self,
		txn: &mut RwTxn,
		shard: &ArenaShard,
		len: u64,
	) -> Result<Option<Offset>, GraphError> {
		let _guard = shard.lock.lock();
		let storage = txn.storage();
		let region = storage.regions.get(RegionId::Arena);
		let mut rec: ArenaShardRec = region.read(shard.base)?;
		let block = block_size_for(len);

		// Freelist first: size class, or exact fit above the class ceiling.
		if let Some(class) = class_of(block) {
			let head = rec.class_heads[class];
			if head != NULL_OFFSET {
				let next: u64 = region.read(head + ARENA_HEADER)?;
				rec.class_heads[class] = next;
				rec.allocated += block;
				txn.write_rec(RegionId::Arena, shard.base, &rec)?;
				return Ok(Some(head + ARENA_HEADER));
			}
		} else {
			let mut prev = NULL_OFFSET;
			let mut cur = rec.exact_head;
			while cur != NULL_OFFSET {
				let cap: u64 = region.read(cur)?;
				let next: u64 = region.read(cur + ARENA_HEADER)?;
				if cap == block {
					if prev == NULL_OFFSET {
						rec.exact_head = next;
					} else {
						txn.write_u64(RegionId::Arena, prev + ARENA_HEADER, next)?;
					}
					rec.allocated += block;
					txn.write_rec(RegionId::Arena, shard.base, &rec)?;
					return Ok(Some(cur + ARENA_HEADER));
				}
				prev = cur;
				cur = next;
			}
		}

		if rec.bump + block > rec.end {
			return Ok(None);
		}
		let off = rec.bump;
		rec.bump += block;
		rec.allocated += block;
		txn.write_u64(RegionId::Arena, off, block)?;
		txn.write_rec(RegionId::Arena, shard.base, &rec)?;
		Ok(Some(off + ARENA_HEADER))
	}

	fn shard_for(&self, payload_off: Offset) -> Result<&ArenaShard, GraphError> {
		self.shards
			.iter()
			.rev()
			.find(|s| payload_off > s.base)
			.ok_or_else(|| gerr!(InvalidId, "offset {payload_off} outside arena shards"))
	}

	/// Returns a block to its shard's freelist. Runs at commit via
	/// `RwTxn::defer_free_arena`.
	pub(crate) fn free_now(&self, txn: &mut RwTxn, payload_off: Offset) -> Result<(), GraphError> {
		let shard = self.shard_for(payload_off)?;
		let _guard = shard.lock.lock();
		let storage = txn.storage();
		let region = storage.regions.get(RegionId::Arena);
		let mut rec: ArenaShardRec = region.read(shard.base)?;
		let block_off = payload_off - ARENA_HEADER;
		let cap: u64 = region.read(block_off)?;

		match class_of(cap) {
			Some(class) => {
				txn.write_u64(RegionId::Arena, payload_off, rec.class_heads[class])?;
				rec.class_heads[class] = block_off;
			}
			None => {
				txn.write_u64(RegionId::Arena, payload_off, rec.exact_head)?;
				rec.exact_head = block_off;
			}
		}
		rec.allocated = rec.allocated.saturating_sub(cap);
		txn.write_rec(RegionId::Arena, shard.base, &rec)?;
		Ok(())
	}

	pub fn stats(&self, region: &Region) -> Result<Vec<AllocatorStats>, GraphError> {
		let shard_span = self.shard_size();
		self.shards
			.iter()
			.map(|shard| {
				let rec: ArenaShardRec = region.read(shard.base)?;
				let span = if shard_span == 0 {
					rec.end - shard.base
				} else {
					shard_span
				};
				let used = rec.bump - shard.base - ARENA_SHARD_HEADER;
				let health = if used == 0 {
					100.0
				} else {
					rec.allocated as f64 * 100.0 / used as f64
				};
				Ok(AllocatorStats {
					object_size: 0,
					num_objects: 0,
					total_allocated_bytes: rec.allocated,
					region_size: span,
					occupancy: rec.allocated as f64 * 100.0 / span as f64,
					health_factor: health,
				})
			})
			.collect()
	}
}
