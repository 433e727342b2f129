use std::collections::HashSet;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use crate::grove_engine::storage_core::GroveGraphStorage;
use crate::grove_engine::storage_core::allocator::PoolId;
use crate::grove_engine::storage_core::journal::JOURNAL_SLOTS;
use crate::grove_engine::storage_core::region::RegionId;
use crate::grove_engine::types::{GraphError, gerr};
use crate::utils::items::Offset;

/// Kind of a transaction.
///
/// `Independent` is a sibling of the transaction already running on the
/// current thread rather than a nested child: it journals into its own
/// commit slot and commits or aborts on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
	ReadOnly,
	ReadWrite,
	Independent,
}

#[derive(Debug)]
struct WriterState {
	thread: Option<ThreadId>,
	depth: u32,
}

/// Commit-state synchronisation: many concurrent readers or exactly one
/// writer. Allocator shards and index trees have their own small locks; this
/// one only serialises transaction lifetimes.
#[derive(Debug)]
pub(crate) struct TransactionManager {
	commit_lock: RwLock<()>,
	writer: Mutex<WriterState>,
	free_slots: Mutex<Vec<u32>>,
	txn_counter: AtomicU64,
	write_version: AtomicU64,
}

impl TransactionManager {
	pub fn new() -> TransactionManager {
		TransactionManager {
			commit_lock: RwLock::new(()),
			writer: Mutex::new(WriterState {
				thread: None,
				depth: 0,
			}),
			free_slots: Mutex::new((0..JOURNAL_SLOTS).rev().collect()),
			txn_counter: AtomicU64::new(1),
			write_version: AtomicU64::new(1),
		}
	}

	pub fn write_version(&self) -> u64 {
		self.write_version.load(Ordering::Acquire)
	}

	fn bump_version(&self) {
		self.write_version.fetch_add(1, Ordering::AcqRel);
	}

	fn current_thread_is_writer(&self) -> bool {
		self.writer.lock().thread == Some(thread::current().id())
	}
}

/// A read transaction. Reads see the state committed before `begin`; the
/// handle pins the commit lock's read side unless it is nested under the
/// writer thread, where the exclusive lock already protects it.
#[derive(Debug)]
pub struct RoTxn<'db> {
	pub(crate) storage: &'db GroveGraphStorage,
	_guard: Option<RwLockReadGuard<'db, ()>>,
}

/// A write transaction. Dropping it without `commit` rolls every journalled
/// write back.
#[derive(Debug)]
pub struct RwTxn<'db> {
	ro: RoTxn<'db>,
	_guard: Option<RwLockWriteGuard<'db, ()>>,
	slot: u32,
	txn_id: u64,
	dirty: HashSet<(u32, Offset, u32)>,
	pending_free_slots: Vec<(PoolId, Offset)>,
	pending_free_arena: Vec<Offset>,
	committed: bool,
}

impl<'db> Deref for RwTxn<'db> {
	type Target = RoTxn<'db>;

	fn deref(&self) -> &RoTxn<'db> {
		&self.ro
	}
}

impl GroveGraphStorage {
	/// Begins a `ReadOnly` transaction.
	pub fn read_txn(&self) -> Result<RoTxn<'_>, GraphError> {
		let guard = if self.txn_mgr.current_thread_is_writer() {
			None
		} else {
			Some(self.txn_mgr.commit_lock.read())
		};
		Ok(RoTxn {
			storage: self,
			_guard: guard,
		})
	}

	/// Begins a `ReadWrite` transaction. At most one thread writes at a
	/// time; a second `ReadWrite` on the thread that already holds the write
	/// lock fails with `NotImplemented` (use `independent_txn` instead).
	pub fn write_txn(&self) -> Result<RwTxn<'_>, GraphError> {
		self.begin_write(TransactionKind::ReadWrite)
	}

	/// Begins an `Independent` transaction: a sibling of the transaction
	/// already open on this thread, with its own commit slot.
	pub fn independent_txn(&self) -> Result<RwTxn<'_>, GraphError> {
		self.begin_write(TransactionKind::Independent)
	}

	fn begin_write(&self, kind: TransactionKind) -> Result<RwTxn<'_>, GraphError> {
		if self.read_only {
			return Err(gerr!(ReadOnly, "graph was opened read-only"));
		}
		let me = thread::current().id();
		let nested = {
			let mut writer = self.txn_mgr.writer.lock();
			if writer.thread == Some(me) {
				if kind == TransactionKind::ReadWrite {
					return Err(gerr!(
						NotImplemented,
						"nested ReadWrite transaction; use an Independent transaction"
					));
				}
				writer.depth += 1;
				true
			} else {
				false
			}
		};

		let guard = if nested {
			None
		} else {
			let guard = self.txn_mgr.commit_lock.write();
			let mut writer = self.txn_mgr.writer.lock();
			writer.thread = Some(me);
			writer.depth = 1;
			Some(guard)
		};

		let slot = match self.txn_mgr.free_slots.lock().pop() {
			Some(slot) => slot,
			None => {
				self.release_writer();
				return Err(gerr!(OutOfSpace, "all journal slots in use"));
			}
		};
		let txn_id = self.txn_mgr.txn_counter.fetch_add(1, Ordering::Relaxed);
		if let Err(e) = self.journal.begin(&self.regions, slot, txn_id, self.msync) {
			self.txn_mgr.free_slots.lock().push(slot);
			self.release_writer();
			return Err(e);
		}
		debug!(txn_id, slot, ?kind, "transaction begun");
		Ok(RwTxn {
			ro: RoTxn {
				storage: self,
				_guard: None,
			},
			_guard: guard,
			slot,
			txn_id,
			dirty: HashSet::new(),
			pending_free_slots: Vec::new(),
			pending_free_arena: Vec::new(),
			committed: false,
		})
	}

	fn release_writer(&self) {
		let mut writer = self.txn_mgr.writer.lock();
		writer.depth -= 1;
		if writer.depth == 0 {
			writer.thread = None;
		}
	}
}

impl<'db> RwTxn<'db> {
	pub(crate) fn storage(&self) -> &'db GroveGraphStorage {
		self.ro.storage
	}

	/// Journalled write: captures the pre-image once per `(region, offset,
	/// length)`, then overwrites the live bytes.
	pub(crate) fn write(
		&mut self,
		region: RegionId,
		off: Offset,
		bytes: &[u8],
	) -> Result<(), GraphError> {
		debug_assert_ne!(region, RegionId::Journal);
		let storage = self.ro.storage;
		let key = (region as u32, off, bytes.len() as u32);
		if !self.dirty.contains(&key) {
			let pre = storage.regions.get(region).slice(off, bytes.len())?;
			storage
				.journal
				.append(&storage.regions, self.slot, region, off, pre, storage.msync)?;
			self.dirty.insert(key);
		}
		storage.regions.get(region).write_raw(off, bytes)?;
		storage.txn_mgr.bump_version();
		Ok(())
	}

	pub(crate) fn write_rec<T: bytemuck::NoUninit>(
		&mut self,
		region: RegionId,
		off: Offset,
		rec: &T,
	) -> Result<(), GraphError> {
		self.write(region, off, bytemuck::bytes_of(rec))
	}

	pub(crate) fn write_u64(
		&mut self,
		region: RegionId,
		off: Offset,
		value: u64,
	) -> Result<(), GraphError> {
		self.write(region, off, &value.to_le_bytes())
	}

	/// Schedules a fixed-pool slot to return to its freelist at commit. An
	/// abort discards the request and the object stays live.
	pub(crate) fn defer_free_slot(&mut self, pool: PoolId, off: Offset) {
		self.pending_free_slots.push((pool, off));
	}

	pub(crate) fn defer_free_arena(&mut self, off: Offset) {
		self.pending_free_arena.push(off);
	}

	/// Commits: applies deferred frees, flushes everything this transaction
	/// touched, persists the commit marker, then releases the slot.
	pub fn commit(mut self) -> Result<(), GraphError> {
		let storage = self.ro.storage;

		for (pool, off) in std::mem::take(&mut self.pending_free_slots) {
			storage.pools.get(pool).free_now(&mut self, off)?;
		}
		for off in std::mem::take(&mut self.pending_free_arena) {
			storage.arena.free_now(&mut self, off)?;
		}

		if storage.msync {
			for (region, off, len) in &self.dirty {
				let region = RegionId::from_u32(*region)
					.ok_or_else(|| gerr!(LayoutCorrupt, "dirty set names unknown region"))?;
				storage.regions.get(region).flush_range(*off, *len as usize)?;
			}
		}
		storage.journal.mark_committed(&storage.regions, self.slot, storage.msync)?;
		storage.journal.clear(&storage.regions, self.slot, storage.msync)?;
		debug!(txn_id = self.txn_id, writes = self.dirty.len(), "transaction committed");
		self.committed = true;
		Ok(())
	}

	fn abort_internal(&mut self) {
		let storage = self.ro.storage;
		if let Err(e) = storage.journal.rollback(&storage.regions, self.slot) {
			tracing::error!(txn_id = self.txn_id, error = %e, "rollback failed");
		}
		if let Err(e) = storage.journal.clear(&storage.regions, self.slot, storage.msync) {
			tracing::error!(txn_id = self.txn_id, error = %e, "journal slot clear failed");
		}
		storage.txn_mgr.bump_version();
		debug!(txn_id = self.txn_id, "transaction aborted");
	}
}

impl Drop for RwTxn<'_> {
	fn drop(&mut self) {
		if !self.committed {
			self.abort_internal();
		}
		let storage = self.ro.storage;
		storage.txn_mgr.free_slots.lock().push(self.slot);
		storage.release_writer();
	}
}
