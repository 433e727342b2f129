use std::fs::{File, OpenOptions};
use std::path::Path;

use bytemuck::{AnyBitPattern, NoUninit, Pod, Zeroable};
use memmap2::{MmapMut, MmapOptions};

use crate::grove_engine::types::{GraphError, gerr};
use crate::utils::items::Offset;

/// `"GROVEDB1"`, little-endian.
pub(crate) const REGION_MAGIC: u64 = 0x3142_4445_564f_5247;

pub(crate) const VERSION_MAJOR: u16 = 1;
pub(crate) const VERSION_MINOR: u16 = 0;

/// Every region file reserves one page for its header; persistent offsets
/// are displacements from the file start, so offset 0 always falls inside
/// the header and can serve as the null link.
pub(crate) const REGION_DATA_OFF: Offset = 4096;

pub(crate) const PAGE_SIZE: u64 = 4096;

/// The named regions of a graph, in file order. The discriminants are
/// written into region headers and journal records and must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum RegionId {
	Meta = 0,
	Journal = 1,
	Nodes = 2,
	Edges = 3,
	Props = 4,
	Arena = 5,
	Strings = 6,
	Indices = 7,
}

pub(crate) const ALL_REGIONS: [RegionId; 8] = [
	RegionId::Meta,
	RegionId::Journal,
	RegionId::Nodes,
	RegionId::Edges,
	RegionId::Props,
	RegionId::Arena,
	RegionId::Strings,
	RegionId::Indices,
];

impl RegionId {
	pub(crate) fn file_name(self) -> &'static str {
		match self {
			RegionId::Meta => "meta",
			RegionId::Journal => "journal",
			RegionId::Nodes => "nodes",
			RegionId::Edges => "edges",
			RegionId::Props => "props",
			RegionId::Arena => "arena",
			RegionId::Strings => "strings",
			RegionId::Indices => "indices",
		}
	}

	pub(crate) fn from_u32(id: u32) -> Option<RegionId> {
		ALL_REGIONS.into_iter().find(|r| *r as u32 == id)
	}
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(crate) struct RegionHeaderRec {
	pub magic: u64,
	pub version_major: u16,
	pub version_minor: u16,
	pub region_id: u32,
	pub logical_size: u64,
	pub reserved: [u8; 40],
}

/// One memory-mapped region file.
///
/// Reads and writes go through a raw pointer into the mapping. The
/// transaction manager guarantees that at most one thread mutates the
/// mapping at a time (the holder of the commit write lock) and that readers
/// hold the read side for the duration of their transaction, which is what
/// makes the `Sync` claim below sound.
#[derive(Debug)]
pub(crate) struct Region {
	pub id: RegionId,
	ptr: *mut u8,
	len: usize,
	mmap: MmapMut,
	_file: File,
}

unsafe impl Send for Region {}
unsafe impl Sync for Region {}

impl Region {
	fn map(id: RegionId, file: File) -> Result<Region, GraphError> {
		let len = file.metadata()?.len() as usize;
		let mut mmap = unsafe { MmapOptions::new().map_mut(&file)? };
		let ptr = mmap.as_mut_ptr();
		Ok(Region {
			id,
			ptr,
			len,
			mmap,
			_file: file,
		})
	}

	/// Creates and maps a fresh region file of `size` bytes with its header
	/// written. Fails with `AlreadyExists` if the file is present.
	pub fn create(dir: &Path, id: RegionId, size: u64) -> Result<Region, GraphError> {
		let path = dir.join(id.file_name());
		let file = OpenOptions::new()
			.read(true)
			.write(true)
			.create_new(true)
			.open(&path)
			.map_err(|e| {
				if e.kind() == std::io::ErrorKind::AlreadyExists {
					gerr!(AlreadyExists, "region file {} exists", path.display())
				} else {
					GraphError::from(e)
				}
			})?;
		file.set_len(size)?;
		let region = Region::map(id, file)?;
		let header = RegionHeaderRec {
			magic: REGION_MAGIC,
			version_major: VERSION_MAJOR,
			version_minor: VERSION_MINOR,
			region_id: id as u32,
			logical_size: size,
			reserved: [0; 40],
		};
		region.write_raw(0, bytemuck::bytes_of(&header))?;
		Ok(region)
	}

	/// Opens and maps an existing region file, verifying its header.
	pub fn open(dir: &Path, id: RegionId, writable: bool) -> Result<Region, GraphError> {
		let path = dir.join(id.file_name());
		let file = OpenOptions::new()
			.read(true)
			.write(writable)
			.open(&path)
			.map_err(|e| {
				if e.kind() == std::io::ErrorKind::NotFound {
					gerr!(NotFound, "region file {} missing", path.display())
				} else {
					GraphError::from(e)
				}
			})?;
		let region = Region::map(id, file)?;
		let header: RegionHeaderRec = region.read(0)?;
		if header.magic != REGION_MAGIC {
			return Err(gerr!(LayoutCorrupt, "bad magic in {}", path.display()));
		}
		if header.version_major != VERSION_MAJOR {
			return Err(gerr!(
				VersionMismatch,
				"region {} is v{}.{}, engine is v{}.{}",
				path.display(),
				header.version_major,
				header.version_minor,
				VERSION_MAJOR,
				VERSION_MINOR
			));
		}
		if header.region_id != id as u32 || header.logical_size > region.len as u64 {
			return Err(gerr!(LayoutCorrupt, "inconsistent header in {}", path.display()));
		}
		Ok(region)
	}

	pub fn len(&self) -> u64 {
		self.len as u64
	}

	fn check(&self, off: Offset, len: usize) -> Result<(), GraphError> {
		if (off as usize).checked_add(len).is_none_or(|end| end > self.len) {
			return Err(gerr!(
				LayoutCorrupt,
				"access [{off}, +{len}) outside region {:?} of {} bytes",
				self.id,
				self.len
			));
		}
		Ok(())
	}

	/// Copies a fixed record out of the mapping.
	pub fn read<T: AnyBitPattern>(&self, off: Offset) -> Result<T, GraphError> {
		self.check(off, size_of::<T>())?;
		Ok(unsafe { std::ptr::read_unaligned(self.ptr.add(off as usize) as *const T) })
	}

	/// Borrows raw bytes from the mapping. The slice is only stable while the
	/// enclosing transaction holds the commit lock.
	pub fn slice(&self, off: Offset, len: usize) -> Result<&[u8], GraphError> {
		self.check(off, len)?;
		Ok(unsafe { std::slice::from_raw_parts(self.ptr.add(off as usize), len) })
	}

	/// Writes bytes without journalling. Reserved for region creation, the
	/// journal itself, and recovery replay; everything else goes through
	/// `RwTxn::write` so the pre-image is captured first.
	pub fn write_raw(&self, off: Offset, bytes: &[u8]) -> Result<(), GraphError> {
		self.check(off, bytes.len())?;
		unsafe {
			std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.ptr.add(off as usize), bytes.len());
		}
		Ok(())
	}

	pub fn write_rec_raw<T: NoUninit>(&self, off: Offset, rec: &T) -> Result<(), GraphError> {
		self.write_raw(off, bytemuck::bytes_of(rec))
	}

	/// Synchronous persistence barrier over a byte range.
	pub fn flush_range(&self, off: Offset, len: usize) -> Result<(), GraphError> {
		self.check(off, len)?;
		self.mmap.flush_range(off as usize, len)?;
		Ok(())
	}
}

/// The full set of mapped regions for one open graph.
#[derive(Debug)]
pub(crate) struct RegionMap {
	regions: Vec<Region>,
}

impl RegionMap {
	pub fn create(dir: &Path, sizes: &[(RegionId, u64)]) -> Result<RegionMap, GraphError> {
		let mut regions = Vec::with_capacity(sizes.len());
		for (id, size) in sizes {
			regions.push(Region::create(dir, *id, *size)?);
		}
		Ok(RegionMap { regions })
	}

	pub fn open(dir: &Path, writable: bool) -> Result<RegionMap, GraphError> {
		let mut regions = Vec::with_capacity(ALL_REGIONS.len());
		for id in ALL_REGIONS {
			regions.push(Region::open(dir, id, writable)?);
		}
		Ok(RegionMap { regions })
	}

	pub fn get(&self, id: RegionId) -> &Region {
		&self.regions[id as usize]
	}
}

#[cfg(test)]
mod tests {
	use tempfile::TempDir;

	use super::{PAGE_SIZE, Region, RegionHeaderRec, RegionId, RegionMap};
	use crate::grove_engine::types::ErrorKind;

	#[test]
	fn test_header_layout() {
		assert_eq!(size_of::<RegionHeaderRec>(), 64);
	}

	#[test]
	fn test_create_then_open_roundtrip() {
		let dir = TempDir::new().unwrap();
		let sizes = [(RegionId::Meta, 16 * PAGE_SIZE), (RegionId::Nodes, 64 * PAGE_SIZE)];
		{
			let map = RegionMap::create(dir.path(), &sizes).unwrap();
			map.get(RegionId::Nodes)
				.write_raw(8192, b"persisted")
				.unwrap();
			map.get(RegionId::Nodes).flush_range(8192, 9).unwrap();
		}
		let nodes = Region::open(dir.path(), RegionId::Nodes, true).unwrap();
		assert_eq!(nodes.slice(8192, 9).unwrap(), b"persisted");
	}

	#[test]
	fn test_open_missing_region_is_not_found() {
		let dir = TempDir::new().unwrap();
		let err = Region::open(dir.path(), RegionId::Edges, true).unwrap_err();
		assert_eq!(err.kind, ErrorKind::NotFound);
	}

	#[test]
	fn test_create_twice_is_already_exists() {
		let dir = TempDir::new().unwrap();
		Region::create(dir.path(), RegionId::Meta, 16 * PAGE_SIZE).unwrap();
		let err = Region::create(dir.path(), RegionId::Meta, 16 * PAGE_SIZE).unwrap_err();
		assert_eq!(err.kind, ErrorKind::AlreadyExists);
	}

	#[test]
	fn test_corrupt_magic_is_layout_corrupt() {
		let dir = TempDir::new().unwrap();
		Region::create(dir.path(), RegionId::Meta, 16 * PAGE_SIZE).unwrap();
		std::fs::write(
			dir.path().join("meta"),
			[0u8; 64],
		)
		.unwrap();
		let err = Region::open(dir.path(), RegionId::Meta, true).unwrap_err();
		assert_eq!(err.kind, ErrorKind::LayoutCorrupt);
	}

	#[test]
	fn test_out_of_bounds_access_is_rejected() {
		let dir = TempDir::new().unwrap();
		let region = Region::create(dir.path(), RegionId::Meta, 16 * PAGE_SIZE).unwrap();
		let err = region.slice(16 * PAGE_SIZE - 4, 8).unwrap_err();
		assert_eq!(err.kind, ErrorKind::LayoutCorrupt);
	}
}
