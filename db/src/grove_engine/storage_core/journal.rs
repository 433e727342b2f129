use bytemuck::{Pod, Zeroable};
use tracing::{debug, warn};

use crate::grove_engine::storage_core::region::{REGION_DATA_OFF, RegionId, RegionMap};
use crate::grove_engine::types::{GraphError, gerr};
use crate::utils::items::Offset;

/// Number of commit slots. Each active transaction owns one slot for its
/// pre-image records; the slot is cleared on commit and on rollback.
pub(crate) const JOURNAL_SLOTS: u32 = 64;

pub(crate) const SLOT_STATE_EMPTY: u8 = 0;
pub(crate) const SLOT_STATE_ACTIVE: u8 = 1;
pub(crate) const SLOT_STATE_COMMITTED: u8 = 2;

/// Wire size of a record header: `{u32 region_id, u64 offset, u32 length}`,
/// packed little-endian with no padding.
const RECORD_HEADER: u64 = 16;

const DESC_SIZE: u64 = 16;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(crate) struct TxnDescRec {
	pub state: u8,
	pub _pad: [u8; 3],
	pub used: u32,
	pub txn_id: u64,
}

fn encode_record_header(region: RegionId, offset: Offset, length: u32) -> [u8; 16] {
	let mut buf = [0u8; 16];
	buf[0..4].copy_from_slice(&(region as u32).to_le_bytes());
	buf[4..12].copy_from_slice(&offset.to_le_bytes());
	buf[12..16].copy_from_slice(&length.to_le_bytes());
	buf
}

fn decode_record_header(buf: &[u8]) -> Result<(u32, Offset, u32), GraphError> {
	if buf.len() < 16 {
		return Err(gerr!(LayoutCorrupt, "truncated journal record header"));
	}
	let region = u32::from_le_bytes(buf[0..4].try_into().expect("sized above"));
	let offset = u64::from_le_bytes(buf[4..12].try_into().expect("sized above"));
	let length = u32::from_le_bytes(buf[12..16].try_into().expect("sized above"));
	Ok((region, offset, length))
}

/// The undo journal: a fixed array of commit slots inside the journal
/// region. Every slot holds a transaction descriptor followed by pre-image
/// records; rollback restores the pre-images in reverse order.
#[derive(Debug)]
pub(crate) struct Journal {
	slot_size: u64,
}

impl Journal {
	pub fn new(region_len: u64) -> Journal {
		Journal {
			slot_size: (region_len - REGION_DATA_OFF) / JOURNAL_SLOTS as u64,
		}
	}

	fn slot_off(&self, slot: u32) -> Offset {
		REGION_DATA_OFF + slot as u64 * self.slot_size
	}

	pub fn begin(
		&self,
		map: &RegionMap,
		slot: u32,
		txn_id: u64,
		msync: bool,
	) -> Result<(), GraphError> {
		let desc = TxnDescRec {
			state: SLOT_STATE_ACTIVE,
			_pad: [0; 3],
			used: 0,
			txn_id,
		};
		let journal = map.get(RegionId::Journal);
		let off = self.slot_off(slot);
		journal.write_rec_raw(off, &desc)?;
		if msync {
			journal.flush_range(off, DESC_SIZE as usize)?;
		}
		Ok(())
	}

	/// Appends one pre-image record to the slot. With msync enabled the
	/// record is durable before the caller overwrites the live bytes.
	pub fn append(
		&self,
		map: &RegionMap,
		slot: u32,
		target: RegionId,
		offset: Offset,
		pre_image: &[u8],
		msync: bool,
	) -> Result<(), GraphError> {
		let journal = map.get(RegionId::Journal);
		let slot_off = self.slot_off(slot);
		let mut desc: TxnDescRec = journal.read(slot_off)?;
		let record_len = RECORD_HEADER + pre_image.len() as u64;
		if DESC_SIZE + desc.used as u64 + record_len > self.slot_size {
			return Err(gerr!(
				OutOfSpace,
				"journal slot {slot} full at {} bytes",
				desc.used
			));
		}
		let rec_off = slot_off + DESC_SIZE + desc.used as u64;
		journal.write_raw(
			rec_off,
			&encode_record_header(target, offset, pre_image.len() as u32),
		)?;
		journal.write_raw(rec_off + RECORD_HEADER, pre_image)?;
		desc.used += record_len as u32;
		journal.write_rec_raw(slot_off, &desc)?;
		if msync {
			journal.flush_range(slot_off, (DESC_SIZE + desc.used as u64) as usize)?;
		}
		Ok(())
	}

	pub fn mark_committed(&self, map: &RegionMap, slot: u32, msync: bool) -> Result<(), GraphError> {
		let journal = map.get(RegionId::Journal);
		let off = self.slot_off(slot);
		let mut desc: TxnDescRec = journal.read(off)?;
		desc.state = SLOT_STATE_COMMITTED;
		journal.write_rec_raw(off, &desc)?;
		if msync {
			journal.flush_range(off, DESC_SIZE as usize)?;
		}
		Ok(())
	}

	pub fn clear(&self, map: &RegionMap, slot: u32, msync: bool) -> Result<(), GraphError> {
		let journal = map.get(RegionId::Journal);
		let off = self.slot_off(slot);
		journal.write_rec_raw(off, &TxnDescRec::zeroed())?;
		if msync {
			journal.flush_range(off, DESC_SIZE as usize)?;
		}
		Ok(())
	}

	/// Restores every pre-image of the slot in reverse record order.
	pub fn rollback(&self, map: &RegionMap, slot: u32) -> Result<u32, GraphError> {
		let journal = map.get(RegionId::Journal);
		let slot_off = self.slot_off(slot);
		let desc: TxnDescRec = journal.read(slot_off)?;

		let mut records = Vec::new();
		let mut pos = 0u64;
		while pos < desc.used as u64 {
			let rec_off = slot_off + DESC_SIZE + pos;
			let header = journal.slice(rec_off, RECORD_HEADER as usize)?;
			let (region_id, offset, length) = decode_record_header(header)?;
			records.push((region_id, offset, length, rec_off + RECORD_HEADER));
			pos += RECORD_HEADER + length as u64;
		}
		if pos != desc.used as u64 {
			return Err(gerr!(LayoutCorrupt, "journal slot {slot} record stream misaligned"));
		}

		let restored = records.len() as u32;
		for (region_id, offset, length, image_off) in records.into_iter().rev() {
			let region_id = RegionId::from_u32(region_id)
				.ok_or_else(|| gerr!(LayoutCorrupt, "journal names unknown region {region_id}"))?;
			let image = journal.slice(image_off, length as usize)?.to_vec();
			map.get(region_id).write_raw(offset, &image)?;
		}
		Ok(restored)
	}

	/// Rolls back every slot left active by a crash. Committed-but-uncleared
	/// slots are simply cleared. Safe to run any number of times.
	pub fn recover(&self, map: &RegionMap, msync: bool) -> Result<(), GraphError> {
		for slot in 0..JOURNAL_SLOTS {
			let desc: TxnDescRec = map.get(RegionId::Journal).read(self.slot_off(slot))?;
			match desc.state {
				SLOT_STATE_EMPTY => {}
				SLOT_STATE_ACTIVE => {
					let restored = self.rollback(map, slot)?;
					warn!(slot, txn_id = desc.txn_id, restored, "rolled back unfinished transaction");
					self.clear(map, slot, msync)?;
				}
				SLOT_STATE_COMMITTED => {
					debug!(slot, txn_id = desc.txn_id, "clearing committed journal slot");
					self.clear(map, slot, msync)?;
				}
				other => {
					return Err(gerr!(LayoutCorrupt, "journal slot {slot} in state {other}"));
				}
			}
		}
		Ok(())
	}
}
