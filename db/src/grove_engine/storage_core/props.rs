use bytemuck::{Pod, Zeroable};

use crate::grove_engine::storage_core::GroveGraphStorage;
use crate::grove_engine::storage_core::allocator::PoolId;
use crate::grove_engine::storage_core::region::RegionId;
use crate::grove_engine::storage_core::string_table::StringId;
use crate::grove_engine::storage_core::txn::{RoTxn, RwTxn};
use crate::grove_engine::types::{GraphError, gerr};
use crate::protocol::date::Date;
use crate::protocol::value::{Value, ValueKind};
use crate::utils::items::{Item, NULL_OFFSET, Offset};

pub(crate) const CHUNK_PAYLOAD: usize = 64;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(crate) struct PropChunkRec {
	pub next: u64,
	pub free: u8,
	pub _pad: [u8; 7],
	pub payload: [u8; 64],
}

/// Cell header: `{key u16, type u8, payload_len u8}`, then the payload.
const CELL_HDR: usize = 4;
const INLINE_MAX: usize = CHUNK_PAYLOAD - CELL_HDR;
const TOMBSTONE_KEY: u16 = 0xFFFF;
/// Set on the type byte when the payload is `{arena_offset u64, len u32}`
/// instead of the value bytes themselves.
const EXTERNAL_FLAG: u8 = 0x80;

const EXTERNAL_PAYLOAD: usize = 12;

struct CellLoc {
	chunk_off: Offset,
	pos: usize,
	ty: u8,
	len: usize,
}

enum Encoded {
	Inline(Vec<u8>),
	External(Vec<u8>),
}

fn encode(value: &Value) -> Encoded {
	match value {
		Value::Empty => Encoded::Inline(Vec::new()),
		Value::Boolean(b) => Encoded::Inline(vec![*b as u8]),
		Value::I64(v) => Encoded::Inline(v.to_le_bytes().to_vec()),
		Value::F64(v) => Encoded::Inline(v.to_bits().to_le_bytes().to_vec()),
		Value::Date(d) => {
			let mut buf = Vec::with_capacity(9);
			buf.extend_from_slice(&d.utc_epoch_us().to_le_bytes());
			buf.push(d.tz_quarter_hours() as u8);
			Encoded::Inline(buf)
		}
		Value::String(s) if s.len() <= INLINE_MAX => Encoded::Inline(s.as_bytes().to_vec()),
		Value::String(s) => Encoded::External(s.as_bytes().to_vec()),
		Value::Blob(b) if b.len() <= INLINE_MAX => Encoded::Inline(b.clone()),
		Value::Blob(b) => Encoded::External(b.clone()),
	}
}

impl GroveGraphStorage {
	fn decode_cell(&self, ty: u8, payload: &[u8]) -> Result<Value, GraphError> {
		let kind = ValueKind::from_u8(ty & !EXTERNAL_FLAG)
			.ok_or_else(|| gerr!(PropertyTypeInvalid, "cell carries unknown type {ty}"))?;
		let bytes;
		let data: &[u8] = if ty & EXTERNAL_FLAG != 0 {
			if payload.len() != EXTERNAL_PAYLOAD {
				return Err(gerr!(LayoutCorrupt, "external cell with {} payload bytes", payload.len()));
			}
			let off = u64::from_le_bytes(payload[..8].try_into().expect("sized above"));
			let len = u32::from_le_bytes(payload[8..12].try_into().expect("sized above"));
			bytes = self.regions.get(RegionId::Arena).slice(off, len as usize)?;
			bytes
		} else {
			payload
		};
		match kind {
			ValueKind::Empty => Ok(Value::Empty),
			ValueKind::Boolean => Ok(Value::Boolean(data.first().copied().unwrap_or(0) != 0)),
			ValueKind::I64 => {
				if data.len() != 8 {
					return Err(gerr!(LayoutCorrupt, "integer cell of {} bytes", data.len()));
				}
				Ok(Value::I64(i64::from_le_bytes(data.try_into().expect("sized above"))))
			}
			ValueKind::F64 => {
				if data.len() != 8 {
					return Err(gerr!(LayoutCorrupt, "float cell of {} bytes", data.len()));
				}
				Ok(Value::F64(f64::from_bits(u64::from_le_bytes(
					data.try_into().expect("sized above"),
				))))
			}
			ValueKind::Date => {
				if data.len() != 9 {
					return Err(gerr!(LayoutCorrupt, "time cell of {} bytes", data.len()));
				}
				let epoch = i64::from_le_bytes(data[..8].try_into().expect("sized above"));
				Ok(Value::Date(Date::from_utc_epoch_us(epoch, data[8] as i8)))
			}
			ValueKind::String => String::from_utf8(data.to_vec())
				.map(Value::String)
				.map_err(|_| gerr!(LayoutCorrupt, "string cell holds invalid utf-8")),
			ValueKind::Blob => Ok(Value::Blob(data.to_vec())),
		}
	}

	fn find_cell(&self, head: Offset, key: StringId) -> Result<Option<CellLoc>, GraphError> {
		let region = self.regions.get(RegionId::Props);
		let mut chunk_off = head;
		while chunk_off != NULL_OFFSET {
			let rec: PropChunkRec = region.read(chunk_off)?;
			let used = CHUNK_PAYLOAD - rec.free as usize;
			let mut pos = 0;
			while pos + CELL_HDR <= used {
				let cell_key = u16::from_le_bytes([rec.payload[pos], rec.payload[pos + 1]]);
				let ty = rec.payload[pos + 2];
				let len = rec.payload[pos + 3] as usize;
				if cell_key == key {
					return Ok(Some(CellLoc {
						chunk_off,
						pos,
						ty,
						len,
					}));
				}
				pos += CELL_HDR + len;
			}
			chunk_off = rec.next;
		}
		Ok(None)
	}

	/// The property under `key`, or `PropertyNotFound`.
	pub fn get_property(
		&self,
		txn: &RoTxn,
		item: Item,
		key: StringId,
	) -> Result<Value, GraphError> {
		self.check_property(txn, item, key)?
			.ok_or_else(|| gerr!(PropertyNotFound, "no property {key} on {:?} at {}", item.kind, item.off))
	}

	/// Non-failing lookup: `None` when the key is absent.
	pub fn check_property(
		&self,
		_txn: &RoTxn,
		item: Item,
		key: StringId,
	) -> Result<Option<Value>, GraphError> {
		self.ensure_live(item)?;
		let head = self.props_head(item)?;
		let Some(cell) = self.find_cell(head, key)? else {
			return Ok(None);
		};
		let region = self.regions.get(RegionId::Props);
		let rec: PropChunkRec = region.read(cell.chunk_off)?;
		let payload = &rec.payload[cell.pos + CELL_HDR..cell.pos + CELL_HDR + cell.len];
		Ok(Some(self.decode_cell(cell.ty, payload)?))
	}

	/// Sets `key` to `value`, overwriting in place when the encoded size
	/// matches, and keeps any matching index in step.
	pub fn set_property(
		&self,
		txn: &mut RwTxn,
		item: Item,
		key: StringId,
		value: Value,
	) -> Result<(), GraphError> {
		if key == 0 || key == TOMBSTONE_KEY {
			return Err(gerr!(InvalidId, "property key id {key} is reserved"));
		}
		self.ensure_live(item)?;
		let tag = self.item_tag(item)?;
		let old = self.check_property(txn, item, key)?;

		// Fail a typed-index mismatch before mutating anything.
		if let Some(handle) = self.find_index(item.kind, tag, key)?
			&& value.kind() != handle.vkind
		{
			return Err(gerr!(
				TypeMismatch,
				"index on ({tag}, {key}) expects {}, got {}",
				handle.vkind.name(),
				value.kind().name()
			));
		}

		let head = self.props_head(item)?;
		let encoded = encode(&value);
		let region = self.regions.get(RegionId::Props);

		match self.find_cell(head, key)? {
			Some(cell) => {
				let existing_external = cell.ty & EXTERNAL_FLAG != 0;
				match &encoded {
					Encoded::Inline(bytes) if !existing_external && bytes.len() == cell.len => {
						let mut cellbuf = Vec::with_capacity(2 + bytes.len());
						cellbuf.push(value.kind().as_u8());
						cellbuf.push(bytes.len() as u8);
						cellbuf.extend_from_slice(bytes);
						txn.write(RegionId::Props, cell.chunk_off + 16 + cell.pos as u64 + 2, &cellbuf)?;
					}
					Encoded::External(bytes) if existing_external => {
						// External payloads are a fixed 12 bytes: swap blocks in place.
						let rec: PropChunkRec = region.read(cell.chunk_off)?;
						let p = cell.pos + CELL_HDR;
						let old_off =
							u64::from_le_bytes(rec.payload[p..p + 8].try_into().expect("sized above"));
						let new_off = self.arena.alloc(txn, bytes.len() as u64)?;
						txn.write(RegionId::Arena, new_off, bytes)?;
						let mut payload = [0u8; EXTERNAL_PAYLOAD + 2];
						payload[0] = value.kind().as_u8() | EXTERNAL_FLAG;
						payload[1] = EXTERNAL_PAYLOAD as u8;
						payload[2..10].copy_from_slice(&new_off.to_le_bytes());
						payload[10..14].copy_from_slice(&(bytes.len() as u32).to_le_bytes());
						txn.write(RegionId::Props, cell.chunk_off + 16 + cell.pos as u64 + 2, &payload)?;
						txn.defer_free_arena(old_off);
					}
					_ => {
						self.tombstone_cell(txn, item, &cell)?;
						self.insert_cell(txn, item, key, &value, &encoded)?;
					}
				}
			}
			None => self.insert_cell(txn, item, key, &value, &encoded)?,
		}

		self.index_on_set(txn, item, tag, key, old.as_ref(), &value)
	}

	/// Removes `key`, tombstoning its cell. A chunk whose cells are all
	/// tombstones is spliced out and returned to the pool.
	pub fn remove_property(
		&self,
		txn: &mut RwTxn,
		item: Item,
		key: StringId,
	) -> Result<(), GraphError> {
		self.ensure_live(item)?;
		let tag = self.item_tag(item)?;
		let old = self
			.check_property(txn, item, key)?
			.ok_or_else(|| gerr!(PropertyNotFound, "no property {key} on {:?} at {}", item.kind, item.off))?;
		let head = self.props_head(item)?;
		let cell = self
			.find_cell(head, key)?
			.ok_or_else(|| gerr!(PropertyNotFound, "no property {key}"))?;
		self.tombstone_cell(txn, item, &cell)?;
		self.index_on_remove(txn, item, tag, key, &old)
	}

	fn tombstone_cell(&self, txn: &mut RwTxn, item: Item, cell: &CellLoc) -> Result<(), GraphError> {
		let region = self.regions.get(RegionId::Props);
		if cell.ty & EXTERNAL_FLAG != 0 {
			let rec: PropChunkRec = region.read(cell.chunk_off)?;
			let p = cell.pos + CELL_HDR;
			let off = u64::from_le_bytes(rec.payload[p..p + 8].try_into().expect("sized above"));
			txn.defer_free_arena(off);
		}
		let payload_off = cell.chunk_off + 16;
		txn.write(RegionId::Props, payload_off + cell.pos as u64, &TOMBSTONE_KEY.to_le_bytes())?;

		// Chunk emptied of live cells: splice and reclaim it.
		let rec: PropChunkRec = region.read(cell.chunk_off)?;
		if !Self::chunk_has_live_cell(&rec) {
			self.unlink_chunk(txn, item, cell.chunk_off, rec.next)?;
			self.pools.get(PoolId::PropChunk).free(txn, cell.chunk_off)?;
		}
		Ok(())
	}

	fn chunk_has_live_cell(rec: &PropChunkRec) -> bool {
		let used = CHUNK_PAYLOAD - rec.free as usize;
		let mut pos = 0;
		while pos + CELL_HDR <= used {
			let key = u16::from_le_bytes([rec.payload[pos], rec.payload[pos + 1]]);
			let len = rec.payload[pos + 3] as usize;
			if key != TOMBSTONE_KEY {
				return true;
			}
			pos += CELL_HDR + len;
		}
		false
	}

	fn unlink_chunk(
		&self,
		txn: &mut RwTxn,
		item: Item,
		chunk_off: Offset,
		next: Offset,
	) -> Result<(), GraphError> {
		let head = self.props_head(item)?;
		if head == chunk_off {
			return self.set_props_head(txn, item, next);
		}
		let region = self.regions.get(RegionId::Props);
		let mut cur = head;
		while cur != NULL_OFFSET {
			let rec: PropChunkRec = region.read(cur)?;
			if rec.next == chunk_off {
				return txn.write_u64(RegionId::Props, cur, next);
			}
			cur = rec.next;
		}
		Err(gerr!(LayoutCorrupt, "chunk {chunk_off} not on its owner's list"))
	}

	fn insert_cell(
		&self,
		txn: &mut RwTxn,
		item: Item,
		key: StringId,
		value: &Value,
		encoded: &Encoded,
	) -> Result<(), GraphError> {
		let (ty, payload) = match encoded {
			Encoded::Inline(bytes) => (value.kind().as_u8(), bytes.clone()),
			Encoded::External(bytes) => {
				let off = self.arena.alloc(txn, bytes.len() as u64)?;
				txn.write(RegionId::Arena, off, bytes)?;
				let mut p = Vec::with_capacity(EXTERNAL_PAYLOAD);
				p.extend_from_slice(&off.to_le_bytes());
				p.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
				(value.kind().as_u8() | EXTERNAL_FLAG, p)
			}
		};
		let need = CELL_HDR + payload.len();
		let mut cell = Vec::with_capacity(need);
		cell.extend_from_slice(&key.to_le_bytes());
		cell.push(ty);
		cell.push(payload.len() as u8);
		cell.extend_from_slice(&payload);

		let head = self.props_head(item)?;
		let region = self.regions.get(RegionId::Props);
		let mut chunk_off = head;
		while chunk_off != NULL_OFFSET {
			let rec: PropChunkRec = region.read(chunk_off)?;
			if rec.free as usize >= need {
				let pos = CHUNK_PAYLOAD - rec.free as usize;
				txn.write(RegionId::Props, chunk_off + 16 + pos as u64, &cell)?;
				txn.write(RegionId::Props, chunk_off + 8, &[rec.free - need as u8])?;
				return Ok(());
			}
			chunk_off = rec.next;
		}

		// No space anywhere: prepend a fresh chunk.
		let new_off = self.pools.get(PoolId::PropChunk).alloc(txn)?;
		let mut rec = PropChunkRec {
			next: head,
			free: (CHUNK_PAYLOAD - need) as u8,
			_pad: [0; 7],
			payload: [0; 64],
		};
		rec.payload[..need].copy_from_slice(&cell);
		txn.write_rec(RegionId::Props, new_off, &rec)?;
		self.set_props_head(txn, item, new_off)
	}

	/// Internal: all live `(key, value)` pairs of an item, eagerly decoded.
	pub(crate) fn collect_properties(&self, item: Item) -> Result<Vec<(StringId, Value)>, GraphError> {
		let head = self.props_head(item)?;
		let region = self.regions.get(RegionId::Props);
		let mut out = Vec::new();
		let mut chunk_off = head;
		while chunk_off != NULL_OFFSET {
			let rec: PropChunkRec = region.read(chunk_off)?;
			let used = CHUNK_PAYLOAD - rec.free as usize;
			let mut pos = 0;
			while pos + CELL_HDR <= used {
				let key = u16::from_le_bytes([rec.payload[pos], rec.payload[pos + 1]]);
				let ty = rec.payload[pos + 2];
				let len = rec.payload[pos + 3] as usize;
				if key != TOMBSTONE_KEY {
					let payload = &rec.payload[pos + CELL_HDR..pos + CELL_HDR + len];
					out.push((key, self.decode_cell(ty, payload)?));
				}
				pos += CELL_HDR + len;
			}
			chunk_off = rec.next;
		}
		Ok(out)
	}

	/// Frees an item's whole property list, external values included. Used
	/// by node and edge removal after index entries are gone.
	pub(crate) fn free_property_list(&self, txn: &mut RwTxn, item: Item) -> Result<(), GraphError> {
		let head = self.props_head(item)?;
		let region = self.regions.get(RegionId::Props);
		let mut chunk_off = head;
		while chunk_off != NULL_OFFSET {
			let rec: PropChunkRec = region.read(chunk_off)?;
			let used = CHUNK_PAYLOAD - rec.free as usize;
			let mut pos = 0;
			while pos + CELL_HDR <= used {
				let key = u16::from_le_bytes([rec.payload[pos], rec.payload[pos + 1]]);
				let ty = rec.payload[pos + 2];
				let len = rec.payload[pos + 3] as usize;
				if key != TOMBSTONE_KEY && ty & EXTERNAL_FLAG != 0 {
					let p = pos + CELL_HDR;
					let off =
						u64::from_le_bytes(rec.payload[p..p + 8].try_into().expect("sized above"));
					txn.defer_free_arena(off);
				}
				pos += CELL_HDR + len;
			}
			self.pools.get(PoolId::PropChunk).free(txn, chunk_off)?;
			chunk_off = rec.next;
		}
		self.set_props_head(txn, item, NULL_OFFSET)
	}

	/// Lazy walk over an item's properties in storage order. Any write from
	/// the same transaction invalidates the iterator.
	pub fn get_properties<'db>(
		&'db self,
		_txn: &RoTxn,
		item: Item,
	) -> Result<PropertyIter<'db>, GraphError> {
		self.ensure_live(item)?;
		Ok(PropertyIter {
			storage: self,
			chunk_off: self.props_head(item)?,
			pos: 0,
			expected_version: self.txn_mgr.write_version(),
			failed: false,
		})
	}
}

pub struct PropertyIter<'db> {
	storage: &'db GroveGraphStorage,
	chunk_off: Offset,
	pos: usize,
	expected_version: u64,
	failed: bool,
}

impl Iterator for PropertyIter<'_> {
	type Item = Result<(StringId, Value), GraphError>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.failed || self.chunk_off == NULL_OFFSET {
			return None;
		}
		if self.storage.txn_mgr.write_version() != self.expected_version {
			self.failed = true;
			return Some(Err(gerr!(IteratorInvalidated, "property list changed under iteration")));
		}
		let region = self.storage.regions.get(RegionId::Props);
		loop {
			let rec: PropChunkRec = match region.read(self.chunk_off) {
				Ok(rec) => rec,
				Err(e) => {
					self.failed = true;
					return Some(Err(e));
				}
			};
			let used = CHUNK_PAYLOAD - rec.free as usize;
			while self.pos + CELL_HDR <= used {
				let pos = self.pos;
				let key = u16::from_le_bytes([rec.payload[pos], rec.payload[pos + 1]]);
				let ty = rec.payload[pos + 2];
				let len = rec.payload[pos + 3] as usize;
				self.pos += CELL_HDR + len;
				if key != TOMBSTONE_KEY {
					let payload = &rec.payload[pos + CELL_HDR..pos + CELL_HDR + len];
					return Some(self.storage.decode_cell(ty, payload).map(|v| (key, v)));
				}
			}
			self.chunk_off = rec.next;
			self.pos = 0;
			if self.chunk_off == NULL_OFFSET {
				return None;
			}
		}
	}
}
