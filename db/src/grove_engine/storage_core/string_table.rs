use bytemuck::{Pod, Zeroable};
use twox_hash::XxHash64;

use crate::grove_engine::storage_core::GroveGraphStorage;
use crate::grove_engine::storage_core::region::{Region, RegionId};
use crate::grove_engine::storage_core::txn::{RoTxn, RwTxn};
use crate::grove_engine::types::{GraphError, gerr};
use crate::utils::items::Offset;

/// Dense handle for an interned string. Stable for the lifetime of the
/// graph; id 0 is the reserved "any tag" wildcard and never names a string.
pub type StringId = u16;

pub const ANY_TAG: StringId = 0;

/// Interned strings are short identifiers, not payload data.
pub const MAX_STRING_LEN: usize = 16;

const HASH_SEED: u64 = 0x67726f76;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(crate) struct StringRootRec {
	pub capacity: u32,
	pub count: u32,
	pub slots_off: u64,
	pub rev_off: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct StringSlotRec {
	id: u16,
	len: u8,
	bytes: [u8; 16],
	_pad: [u8; 5],
}

const SLOT_SIZE: u64 = 24;

/// Content-addressed intern table: open addressing with linear probing over
/// the exact bytes of the string, plus a reverse id-to-slot table. Entries
/// are never deleted, so probe chains never break.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StringTable {
	root: Offset,
	capacity: u32,
}

impl StringTable {
	pub fn footprint(capacity: u32) -> u64 {
		size_of::<StringRootRec>() as u64 + capacity as u64 * (SLOT_SIZE + 8)
	}

	pub fn layout(root: Offset, capacity: u32) -> StringTable {
		StringTable { root, capacity }
	}

	pub fn init(&self, region: &Region) -> Result<(), GraphError> {
		let slots_off = self.root + size_of::<StringRootRec>() as u64;
		let rec = StringRootRec {
			capacity: self.capacity,
			count: 0,
			slots_off,
			rev_off: slots_off + self.capacity as u64 * SLOT_SIZE,
		};
		region.write_rec_raw(self.root, &rec)
	}

	pub fn open(region: &Region, root: Offset) -> Result<StringTable, GraphError> {
		let rec: StringRootRec = region.read(root)?;
		if rec.count > rec.capacity || rec.capacity == 0 {
			return Err(gerr!(LayoutCorrupt, "string table count {} cap {}", rec.count, rec.capacity));
		}
		Ok(StringTable {
			root,
			capacity: rec.capacity,
		})
	}

	fn check_name(name: &str) -> Result<&[u8], GraphError> {
		let bytes = name.as_bytes();
		if bytes.is_empty() || bytes.len() > MAX_STRING_LEN {
			return Err(gerr!(InvalidId, "string id must be 1..={MAX_STRING_LEN} bytes, got {}", bytes.len()));
		}
		Ok(bytes)
	}

	/// Probes for `bytes`. Returns the id when present, otherwise the offset
	/// of the empty slot where it belongs.
	fn probe(&self, region: &Region, bytes: &[u8]) -> Result<Result<StringId, Offset>, GraphError> {
		let rec: StringRootRec = region.read(self.root)?;
		let mut idx = (XxHash64::oneshot(HASH_SEED, bytes) % self.capacity as u64) as u32;
		loop {
			let slot_off = rec.slots_off + idx as u64 * SLOT_SIZE;
			let slot: StringSlotRec = region.read(slot_off)?;
			if slot.len == 0 {
				return Ok(Err(slot_off));
			}
			if slot.len as usize == bytes.len() && &slot.bytes[..slot.len as usize] == bytes {
				return Ok(Ok(slot.id));
			}
			idx = (idx + 1) % self.capacity;
		}
	}

	/// Resolves without mutating.
	pub fn lookup(
		&self,
		storage: &GroveGraphStorage,
		name: &str,
	) -> Result<Option<StringId>, GraphError> {
		let bytes = Self::check_name(name)?;
		let region = storage.regions.get(RegionId::Strings);
		Ok(self.probe(region, bytes)?.ok())
	}

	/// Interns inside a write transaction, adding the string when absent.
	pub fn intern(
		&self,
		txn: &mut RwTxn,
		name: &str,
	) -> Result<StringId, GraphError> {
		let bytes = Self::check_name(name)?;
		let storage = txn.storage();
		let region = storage.regions.get(RegionId::Strings);
		let slot_off = match self.probe(region, bytes)? {
			Ok(id) => return Ok(id),
			Err(slot_off) => slot_off,
		};

		let mut rec: StringRootRec = region.read(self.root)?;
		// Dense ids start at 1; leave one slot empty so probes terminate.
		if rec.count + 1 >= self.capacity || rec.count as u64 + 1 > u16::MAX as u64 {
			return Err(gerr!(OutOfSpace, "string table full at {} entries", rec.count));
		}
		let id = (rec.count + 1) as StringId;
		let mut slot = StringSlotRec::zeroed();
		slot.id = id;
		slot.len = bytes.len() as u8;
		slot.bytes[..bytes.len()].copy_from_slice(bytes);
		txn.write_rec(RegionId::Strings, slot_off, &slot)?;
		txn.write_u64(RegionId::Strings, rec.rev_off + id as u64 * 8, slot_off)?;
		rec.count += 1;
		txn.write_rec(RegionId::Strings, self.root, &rec)?;
		Ok(id)
	}

	/// Read-only interning: resolves an existing string or fails with
	/// `ReadOnly`, since adding would mutate the table.
	pub fn intern_ro(
		&self,
		storage: &GroveGraphStorage,
		name: &str,
	) -> Result<StringId, GraphError> {
		match self.lookup(storage, name)? {
			Some(id) => Ok(id),
			None => Err(gerr!(ReadOnly, "string {name:?} not interned and transaction is read-only")),
		}
	}

	/// Reverse lookup of an id.
	pub fn name(
		&self,
		storage: &GroveGraphStorage,
		id: StringId,
	) -> Result<String, GraphError> {
		if id == ANY_TAG {
			return Ok(String::new());
		}
		let region = storage.regions.get(RegionId::Strings);
		let rec: StringRootRec = region.read(self.root)?;
		if id as u32 > rec.count {
			return Err(gerr!(InvalidId, "string id {id} was never assigned"));
		}
		let slot_off: u64 = region.read(rec.rev_off + id as u64 * 8)?;
		let slot: StringSlotRec = region.read(slot_off)?;
		String::from_utf8(slot.bytes[..slot.len as usize].to_vec())
			.map_err(|_| gerr!(LayoutCorrupt, "string id {id} holds invalid utf-8"))
	}

	pub fn count(&self, storage: &GroveGraphStorage) -> Result<u32, GraphError> {
		let region = storage.regions.get(RegionId::Strings);
		let rec: StringRootRec = region.read(self.root)?;
		Ok(rec.count)
	}
}

impl GroveGraphStorage {
	/// Interns `name`, adding it when the transaction can write.
	pub fn intern(&self, txn: &mut RwTxn, name: &str) -> Result<StringId, GraphError> {
		self.strings.intern(txn, name)
	}

	/// Resolves `name` inside a read-only transaction; fails with `ReadOnly`
	/// if the string is not yet known.
	pub fn intern_ro(&self, _txn: &RoTxn, name: &str) -> Result<StringId, GraphError> {
		self.strings.intern_ro(self, name)
	}

	/// Resolves `name` without mutating, `None` when unknown.
	pub fn lookup_string(&self, _txn: &RoTxn, name: &str) -> Result<Option<StringId>, GraphError> {
		self.strings.lookup(self, name)
	}

	/// The string behind an id; empty for the wildcard id 0.
	pub fn string_name(&self, _txn: &RoTxn, id: StringId) -> Result<String, GraphError> {
		self.strings.name(self, id)
	}
}
