//! The region file itself.
//!
//! # Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ sector 0   offset table: 1024 x u32 BE                       │
//! │            (sector_start << 8) | sector_count, 0 = absent    │
//! ├──────────────────────────────────────────────────────────────┤
//! │ sector 1   timestamp table: 1024 x u32 BE (unix seconds)     │
//! ├──────────────────────────────────────────────────────────────┤
//! │ sector 2.. records:                                          │
//! │            u32 BE length L (format byte + payload)           │
//! │            u8 format (1 = gzip, 2 = zlib)                    │
//! │            L - 1 bytes compressed payload, zero padded       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both tables are indexed by `(cx & 31) + (cz & 31) * 32`.
//!
//! The free-sector map is never stored; it is derived from the offset table
//! every time the file is opened. Header entries are written through and synced
//! on every mutation, and the file handle is reopened per operation. A record
//! is written before the map or header hands its sectors over.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use tracing::{debug, trace, warn};

use crate::compression::CompressionFormat;
use crate::error::{RegionError, RegionResult};
use crate::nbt::{CoordinateProbe, NbtCoordinateProbe};
use crate::pos::{ChunkPos, RegionPos, SLOTS};
use crate::repair::{RepairIter, RepairReport};

/// Size of one allocation unit in bytes.
pub const SECTOR_SIZE: usize = 4096;

/// Sectors taken by the offset and timestamp tables.
pub const HEADER_SECTORS: usize = 2;

/// Largest record we accept, in sectors. A record needing 256 sectors does
/// not fit in the 8-bit count field and is rejected outright.
pub const MAX_RECORD_SECTORS: usize = 255;

/// Length prefix plus format byte.
const RECORD_HEADER: usize = 5;

/// Options for opening a region file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegionOptions {
    /// Refuse every mutation. Repair still runs, but only in memory.
    pub readonly: bool,
    /// zlib level used for new records (0-9).
    pub compression_level: u32,
}

impl Default for RegionOptions {
    fn default() -> Self {
        Self {
            readonly: false,
            compression_level: 6,
        }
    }
}

/// A run of sectors referenced by one offset table entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Allocation {
    pub start: usize,
    pub count: usize,
}

impl Allocation {
    /// Decode an offset table entry; `0` means absent.
    #[inline]
    #[must_use]
    pub const fn from_entry(entry: u32) -> Option<Self> {
        if entry == 0 {
            return None;
        }
        Some(Self {
            start: (entry >> 8) as usize,
            count: (entry & 0xff) as usize,
        })
    }

    #[inline]
    #[must_use]
    pub const fn to_entry(self) -> u32 {
        ((self.start as u32) << 8) | (self.count as u32 & 0xff)
    }

    /// One past the last sector.
    #[inline]
    #[must_use]
    pub const fn end(self) -> usize {
        self.start + self.count
    }

    #[inline]
    #[must_use]
    pub const fn overlaps(self, other: Self) -> bool {
        self.start < other.end() && other.start < self.end()
    }

    /// Whether the run lies entirely in the record area of a file with
    /// `sector_count` sectors.
    #[inline]
    #[must_use]
    pub const fn is_valid_for(self, sector_count: usize) -> bool {
        self.count > 0 && self.start >= HEADER_SECTORS && self.end() <= sector_count
    }
}

/// A region file: up to 1024 compressed chunk records keyed by position.
#[derive(Debug)]
pub struct RegionFile {
    pub(crate) path: PathBuf,
    pub(crate) region: Option<RegionPos>,
    pub(crate) options: RegionOptions,
    pub(crate) offsets: Vec<u32>,
    pub(crate) timestamps: Vec<u32>,
    /// One flag per sector, `true` = free.
    pub(crate) free: Vec<bool>,
    pub(crate) needs_repair: bool,
}

impl RegionFile {
    /// Open (or, when writable, create) a region file.
    ///
    /// If the offset table references sectors outside the file or two
    /// entries overlap, the file is repaired before this returns.
    pub fn open(path: impl AsRef<Path>, options: RegionOptions) -> RegionResult<Self> {
        let path = path.as_ref().to_path_buf();
        let region = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(RegionPos::from_file_name);

        let mut file = if options.readonly {
            File::open(&path)?
        } else {
            OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&path)?
        };

        let mut len = file.metadata()?.len();
        if !options.readonly {
            let min = (HEADER_SECTORS * SECTOR_SIZE) as u64;
            let padded = len.max(min).div_ceil(SECTOR_SIZE as u64) * SECTOR_SIZE as u64;
            if padded != len {
                debug!(path = %path.display(), from = len, to = padded, "padding region file");
                file.set_len(padded)?;
                len = padded;
            }
        }

        let mut header = vec![0u8; HEADER_SECTORS * SECTOR_SIZE];
        let available = (len as usize).min(header.len());
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut header[..available])?;
        drop(file);

        let (offset_bytes, timestamp_bytes) = header.split_at(SECTOR_SIZE);
        let offsets = offset_bytes
            .chunks_exact(4)
            .map(BigEndian::read_u32)
            .collect();
        let timestamps = timestamp_bytes
            .chunks_exact(4)
            .map(BigEndian::read_u32)
            .collect();

        let sector_count = (len.div_ceil(SECTOR_SIZE as u64) as usize).max(HEADER_SECTORS);
        let mut this = Self {
            path,
            region,
            options,
            offsets,
            timestamps,
            free: vec![true; sector_count],
            needs_repair: false,
        };

        this.needs_repair = !this.rebuild_free_map();
        if this.needs_repair {
            warn!(path = %this.path.display(), "region offset table is inconsistent, repairing");
            this.repair();
        }

        Ok(this)
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Region coordinates, if the file name is canonical.
    #[must_use]
    pub const fn region(&self) -> Option<RegionPos> {
        self.region
    }

    #[must_use]
    pub const fn is_readonly(&self) -> bool {
        self.options.readonly
    }

    /// Number of sectors the file spans (including the header).
    #[must_use]
    pub fn sector_count(&self) -> usize {
        self.free.len()
    }

    /// Whether the last open or repair left overlapping entries behind.
    #[must_use]
    pub const fn needs_repair(&self) -> bool {
        self.needs_repair
    }

    #[must_use]
    pub fn contains_chunk(&self, cx: i32, cz: i32) -> bool {
        self.offsets[ChunkPos::new(cx, cz).local_index()] != 0
    }

    /// Number of chunks with an offset entry.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.offsets.iter().filter(|&&entry| entry != 0).count()
    }

    /// Absolute positions of every stored chunk.
    ///
    /// Files without a canonical name report positions relative to region
    /// `(0, 0)`.
    #[must_use]
    pub fn chunk_positions(&self) -> Vec<ChunkPos> {
        let region = self.region.unwrap_or(RegionPos::new(0, 0));
        self.offsets
            .iter()
            .enumerate()
            .filter(|&(_, &entry)| entry != 0)
            .map(|(slot, _)| region.chunk_at_slot(slot))
            .collect()
    }

    /// Every live allocation with the slot it belongs to.
    #[must_use]
    pub fn allocations(&self) -> Vec<(usize, Allocation)> {
        self.offsets
            .iter()
            .enumerate()
            .filter_map(|(slot, &entry)| Allocation::from_entry(entry).map(|a| (slot, a)))
            .collect()
    }

    /// Last-write timestamp of a chunk, in unix seconds.
    #[must_use]
    pub fn timestamp(&self, cx: i32, cz: i32) -> Option<u32> {
        let slot = ChunkPos::new(cx, cz).local_index();
        (self.offsets[slot] != 0).then(|| self.timestamps[slot])
    }

    /// Read and decompress a chunk record.
    pub fn read_chunk(&self, cx: i32, cz: i32) -> RegionResult<Vec<u8>> {
        let slot = ChunkPos::new(cx, cz).local_index();
        let Some(alloc) = Allocation::from_entry(self.offsets[slot]) else {
            return Err(RegionError::ChunkNotPresent { cx, cz });
        };
        if !alloc.is_valid_for(self.sector_count()) {
            return Err(RegionError::Format(format!(
                "chunk ({cx}, {cz}) references sectors {}..{} of {}",
                alloc.start,
                alloc.end(),
                self.sector_count()
            )));
        }
        self.read_record(alloc)
    }

    /// Compress and store a chunk record.
    ///
    /// The existing allocation is reused in place when it is large enough;
    /// otherwise the first free run that fits is taken, or the file grows.
    pub fn write_chunk(&mut self, cx: i32, cz: i32, data: &[u8]) -> RegionResult<()> {
        if self.options.readonly {
            return Err(RegionError::ReadOnly);
        }

        let format = CompressionFormat::Zlib;
        let compressed = format.compress(data, self.options.compression_level)?;
        let needed = (compressed.len() + RECORD_HEADER).div_ceil(SECTOR_SIZE);
        if needed > MAX_RECORD_SECTORS {
            return Err(RegionError::ChunkTooLarge { sectors: needed });
        }

        let slot = ChunkPos::new(cx, cz).local_index();
        let old = Allocation::from_entry(self.offsets[slot])
            .filter(|a| a.is_valid_for(self.sector_count()));

        let alloc = match old {
            Some(old) if old.count >= needed => {
                trace!(cx, cz, start = old.start, count = needed, "reusing allocation in place");
                Allocation {
                    start: old.start,
                    count: needed,
                }
            }
            _ => {
                let start = self
                    .find_free_run(needed)
                    .unwrap_or_else(|| self.free.len());
                trace!(cx, cz, start, count = needed, "allocated sectors");
                Allocation {
                    start,
                    count: needed,
                }
            }
        };

        let mut record = Vec::with_capacity(needed * SECTOR_SIZE);
        record.write_u32::<BigEndian>((compressed.len() + 1) as u32)?;
        record.push(format.as_byte());
        record.extend_from_slice(&compressed);
        record.resize(needed * SECTOR_SIZE, 0);

        let mut file = self.open_for_write()?;
        file.seek(SeekFrom::Start((alloc.start * SECTOR_SIZE) as u64))?;
        file.write_all(&record)?;
        drop(file);

        // The free map only changes once the record is on disk.
        if alloc.end() > self.free.len() {
            self.free.resize(alloc.end(), true);
        }
        self.mark(alloc, false);

        let previous = (self.offsets[slot], self.timestamps[slot]);
        self.offsets[slot] = alloc.to_entry();
        self.timestamps[slot] = unix_now();
        if let Err(e) = self.write_header_entry(slot) {
            // The header on disk may name either run, so both stay reserved.
            (self.offsets[slot], self.timestamps[slot]) = previous;
            return Err(e);
        }

        if let Some(old) = old {
            self.mark(old, true);
            self.mark(alloc, false);
        }
        Ok(())
    }

    /// Remove a chunk record. Returns `false` if nothing was stored.
    pub fn delete_chunk(&mut self, cx: i32, cz: i32) -> RegionResult<bool> {
        if self.options.readonly {
            return Err(RegionError::ReadOnly);
        }

        let slot = ChunkPos::new(cx, cz).local_index();
        let Some(alloc) = Allocation::from_entry(self.offsets[slot]) else {
            return Ok(false);
        };
        self.mark(alloc, true);
        self.offsets[slot] = 0;
        self.timestamps[slot] = 0;
        self.write_header_entry(slot)?;
        trace!(cx, cz, start = alloc.start, count = alloc.count, "freed chunk sectors");
        Ok(true)
    }

    /// Validate every entry, discarding or relocating bad ones.
    ///
    /// Never fails: whatever cannot be recovered is dropped and logged.
    pub fn repair(&mut self) -> RepairReport {
        self.repair_with(NbtCoordinateProbe)
    }

    /// [`repair`](Self::repair) with a caller-supplied coordinate probe.
    pub fn repair_with<P: CoordinateProbe>(&mut self, probe: P) -> RepairReport {
        let mut iter = self.repair_iter_with(probe);
        iter.by_ref().for_each(drop);
        iter.report()
    }

    /// Progress-iterator form of [`repair`](Self::repair), one item per
    /// occupied header slot.
    pub fn repair_iter(&mut self) -> RepairIter<'_, NbtCoordinateProbe> {
        RepairIter::new(self, NbtCoordinateProbe)
    }

    pub fn repair_iter_with<P: CoordinateProbe>(&mut self, probe: P) -> RepairIter<'_, P> {
        RepairIter::new(self, probe)
    }

    /// Read and parse the record stored in `alloc`.
    pub(crate) fn read_record(&self, alloc: Allocation) -> RegionResult<Vec<u8>> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start((alloc.start * SECTOR_SIZE) as u64))?;
        let mut bytes = Vec::with_capacity(alloc.count * SECTOR_SIZE);
        file.take((alloc.count * SECTOR_SIZE) as u64)
            .read_to_end(&mut bytes)?;
        parse_record(&bytes)
    }

    /// Recompute the free map from the offset table.
    ///
    /// Returns `false` if any entry is out of range or overlaps another;
    /// such entries are left out of the map.
    pub(crate) fn rebuild_free_map(&mut self) -> bool {
        let sector_count = self.free.len();
        self.free = vec![true; sector_count];
        for sector in self.free.iter_mut().take(HEADER_SECTORS) {
            *sector = false;
        }

        let mut consistent = true;
        for slot in 0..SLOTS {
            let Some(alloc) = Allocation::from_entry(self.offsets[slot]) else {
                continue;
            };
            if !alloc.is_valid_for(sector_count) {
                consistent = false;
                continue;
            }
            if self.free[alloc.start..alloc.end()].iter().any(|free| !free) {
                consistent = false;
                continue;
            }
            self.mark(alloc, false);
        }
        consistent
    }

    /// Set the free flag for every sector of `alloc` inside the file.
    /// Header sectors are always kept used.
    pub(crate) fn mark(&mut self, alloc: Allocation, free: bool) {
        let end = alloc.end().min(self.free.len());
        for sector in alloc.start.max(HEADER_SECTORS)..end {
            self.free[sector] = free;
        }
    }

    /// First run of `count` free sectors, scanning from the front.
    fn find_free_run(&self, count: usize) -> Option<usize> {
        let mut run_start = 0;
        let mut run_len = 0;
        for (sector, &free) in self.free.iter().enumerate() {
            if free {
                if run_len == 0 {
                    run_start = sector;
                }
                run_len += 1;
                if run_len == count {
                    return Some(run_start);
                }
            } else {
                run_len = 0;
            }
        }
        None
    }

    fn open_for_write(&self) -> RegionResult<File> {
        Ok(OpenOptions::new().write(true).open(&self.path)?)
    }

    /// Persist the offset and timestamp entries of one slot.
    pub(crate) fn write_header_entry(&self, slot: usize) -> RegionResult<()> {
        let mut file = self.open_for_write()?;
        file.seek(SeekFrom::Start((slot * 4) as u64))?;
        file.write_u32::<BigEndian>(self.offsets[slot])?;
        file.seek(SeekFrom::Start((SECTOR_SIZE + slot * 4) as u64))?;
        file.write_u32::<BigEndian>(self.timestamps[slot])?;
        file.sync_data()?;
        Ok(())
    }

    /// Size of the backing file in bytes.
    pub fn file_len(&self) -> RegionResult<u64> {
        Ok(fs::metadata(&self.path)?.len())
    }
}

/// Split a raw sector run into format byte and payload, then inflate.
fn parse_record(bytes: &[u8]) -> RegionResult<Vec<u8>> {
    if bytes.len() < RECORD_HEADER {
        return Err(RegionError::Format(format!(
            "record truncated to {} bytes",
            bytes.len()
        )));
    }
    let len = BigEndian::read_u32(&bytes[..4]) as usize;
    if len == 0 {
        return Err(RegionError::Format("zero-length record".into()));
    }
    if len + 4 > bytes.len() {
        return Err(RegionError::Format(format!(
            "record length {len} exceeds {} allocated bytes",
            bytes.len() - 4
        )));
    }
    let format = CompressionFormat::from_byte(bytes[4])?;
    format.decompress(&bytes[RECORD_HEADER..4 + len])
}

fn unix_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}
