//! Crash repair for region files.
//!
//! Every occupied header slot is checked in order:
//!
//! 1. the allocation must lie inside the file and must not overlap a run
//!    already accepted earlier in the pass;
//! 2. the record must parse and inflate;
//! 3. the coordinates the record reports (via [`CoordinateProbe`]) must
//!    match the slot.
//!
//! A record failing (1) or (2) is discarded. A record failing (3) whose true
//! slot is empty in this region is moved there ("lost and found"); otherwise
//! it is discarded. Changes to a slot are written through before the
//! iterator yields.

use tracing::{info, warn};

use crate::nbt::CoordinateProbe;
use crate::pos::{ChunkPos, SLOTS};
use crate::progress::Progress;
use crate::region::{Allocation, HEADER_SECTORS, RegionFile};

/// Outcome of a repair pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Entries zeroed because they could not be recovered.
    pub discarded: usize,
    /// Misplaced entries moved to their correct slot.
    pub recovered: usize,
}

impl RepairReport {
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.discarded == 0 && self.recovered == 0
    }
}

enum Verdict {
    Keep(Allocation),
    Relocate { alloc: Allocation, to: usize },
    Discard(String),
}

/// Pull-based repair pass. One item per occupied slot.
///
/// Dropping the iterator early leaves the slots checked so far repaired and
/// recomputes the free map from the current table.
pub struct RepairIter<'r, P> {
    region: &'r mut RegionFile,
    probe: P,
    slot: usize,
    /// Sectors claimed by entries accepted so far.
    used: Vec<bool>,
    /// Slots whose entry has already been accepted.
    settled: Vec<bool>,
    report: RepairReport,
    finished: bool,
}

impl<'r, P: CoordinateProbe> RepairIter<'r, P> {
    pub(crate) fn new(region: &'r mut RegionFile, probe: P) -> Self {
        let mut used = vec![false; region.sector_count()];
        for sector in used.iter_mut().take(HEADER_SECTORS) {
            *sector = true;
        }
        Self {
            region,
            probe,
            slot: 0,
            used,
            settled: vec![false; SLOTS],
            report: RepairReport::default(),
            finished: false,
        }
    }

    /// Counts so far; final once the iterator is exhausted.
    #[must_use]
    pub const fn report(&self) -> RepairReport {
        self.report
    }

    fn judge(&self, slot: usize) -> Verdict {
        let entry = self.region.offsets[slot];
        let Some(alloc) = Allocation::from_entry(entry)
            .filter(|a| a.is_valid_for(self.region.sector_count()))
        else {
            return Verdict::Discard(format!("entry {entry:#010x} is out of range"));
        };
        if self.used[alloc.start..alloc.end()].iter().any(|&used| used) {
            return Verdict::Discard(format!(
                "sectors {}..{} overlap another chunk",
                alloc.start,
                alloc.end()
            ));
        }

        let record = match self.region.read_record(alloc) {
            Ok(record) => record,
            Err(e) => return Verdict::Discard(e.to_string()),
        };
        let Some(actual) = self.probe.probe(&record) else {
            return Verdict::Keep(alloc);
        };

        let (belongs_here, target) = match self.region.region {
            Some(region) => (
                region.chunk_at_slot(slot) == actual,
                region.contains(actual).then(|| actual.local_index()),
            ),
            None => (actual.local_index() == slot, Some(actual.local_index())),
        };
        if belongs_here {
            return Verdict::Keep(alloc);
        }
        match target {
            Some(to) if self.region.offsets[to] == 0 => Verdict::Relocate { alloc, to },
            _ => Verdict::Discard(format!("record reports position {actual}")),
        }
    }

    fn accept(&mut self, alloc: Allocation, slot: usize) {
        for sector in alloc.start..alloc.end() {
            self.used[sector] = true;
        }
        self.settled[slot] = true;
    }

    fn persist(&self, slot: usize) {
        if self.region.is_readonly() {
            return;
        }
        if let Err(e) = self.region.write_header_entry(slot) {
            warn!(path = %self.region.path().display(), slot, "failed to persist repaired entry: {e}");
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        self.region.free = self.used.iter().map(|&used| !used).collect();
        self.region.needs_repair = false;

        let path = self.region.path().display();
        if self.report.is_clean() {
            info!(%path, "region repair found nothing to fix");
        } else {
            warn!(
                %path,
                discarded = self.report.discarded,
                recovered = self.report.recovered,
                "region repaired"
            );
        }
    }
}

impl<P: CoordinateProbe> Iterator for RepairIter<'_, P> {
    type Item = Progress;

    fn next(&mut self) -> Option<Progress> {
        if self.finished {
            return None;
        }

        while self.slot < SLOTS {
            let slot = self.slot;
            self.slot += 1;
            if self.settled[slot] || self.region.offsets[slot] == 0 {
                continue;
            }

            match self.judge(slot) {
                Verdict::Keep(alloc) => self.accept(alloc, slot),
                Verdict::Relocate { alloc, to } => {
                    let from = ChunkPos::new((slot % 32) as i32, (slot / 32) as i32);
                    let into = ChunkPos::new((to % 32) as i32, (to / 32) as i32);
                    info!(
                        path = %self.region.path().display(),
                        "moving misplaced chunk from slot {from} to {into}"
                    );
                    self.region.offsets[to] = self.region.offsets[slot];
                    self.region.timestamps[to] = self.region.timestamps[slot];
                    self.region.offsets[slot] = 0;
                    self.region.timestamps[slot] = 0;
                    self.persist(to);
                    self.persist(slot);
                    self.accept(alloc, to);
                    self.report.recovered += 1;
                }
                Verdict::Discard(reason) => {
                    warn!(path = %self.region.path().display(), slot, "discarding chunk: {reason}");
                    self.region.offsets[slot] = 0;
                    self.region.timestamps[slot] = 0;
                    self.persist(slot);
                    self.report.discarded += 1;
                }
            }
            return Some(Progress::new(slot + 1, SLOTS, "Checking region entries"));
        }

        self.finish();
        None
    }
}

impl<P> Drop for RepairIter<'_, P> {
    fn drop(&mut self) {
        if !self.finished {
            self.region.needs_repair = !self.region.rebuild_free_map();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::{Seek, SeekFrom, Write};

    use byteorder::{BigEndian, WriteBytesExt};

    use super::*;
    use crate::nbt::chunk_stub;
    use crate::pos::RegionPos;
    use crate::region::{RegionOptions, SECTOR_SIZE};

    fn set_entry(path: &std::path::Path, slot: usize, entry: u32) {
        let mut file = fs::OpenOptions::new().write(true).open(path).unwrap();
        file.seek(SeekFrom::Start((slot * 4) as u64)).unwrap();
        file.write_u32::<BigEndian>(entry).unwrap();
    }

    #[test]
    fn test_relocates_misplaced_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.1.0.mca");
        let right = ChunkPos::new(35, 2);
        let wrong = ChunkPos::new(40, 9);

        let mut region = RegionFile::open(&path, RegionOptions::default()).unwrap();
        // A correctly placed neighbour must survive untouched.
        let neighbour = chunk_stub(ChunkPos::new(32, 0), b"stay");
        region.write_chunk(32, 0, &neighbour).unwrap();
        // Store `right`'s record under `wrong`'s slot.
        region
            .write_chunk(wrong.x, wrong.z, &chunk_stub(right, b"lost"))
            .unwrap();
        drop(region);

        let mut region = RegionFile::open(&path, RegionOptions::default()).unwrap();
        let report = region.repair();
        assert_eq!(
            report,
            RepairReport {
                discarded: 0,
                recovered: 1
            }
        );
        assert!(!region.contains_chunk(wrong.x, wrong.z));
        assert_eq!(
            region.read_chunk(right.x, right.z).unwrap(),
            chunk_stub(right, b"lost")
        );
        assert_eq!(region.read_chunk(32, 0).unwrap(), neighbour);

        // The move was persisted.
        let reopened = RegionFile::open(&path, RegionOptions::default()).unwrap();
        assert!(reopened.contains_chunk(right.x, right.z));
        assert!(!reopened.contains_chunk(wrong.x, wrong.z));
    }

    #[test]
    fn test_misplaced_chunk_with_occupied_target_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.0.0.mca");
        let mut region = RegionFile::open(&path, RegionOptions::default()).unwrap();
        region
            .write_chunk(1, 1, &chunk_stub(ChunkPos::new(1, 1), b"a"))
            .unwrap();
        region
            .write_chunk(2, 2, &chunk_stub(ChunkPos::new(1, 1), b"b"))
            .unwrap();

        let report = region.repair();
        assert_eq!(report.discarded, 1);
        assert_eq!(report.recovered, 0);
        assert_eq!(
            region.read_chunk(1, 1).unwrap(),
            chunk_stub(ChunkPos::new(1, 1), b"a")
        );
        assert!(!region.contains_chunk(2, 2));
    }

    #[test]
    fn test_chunk_from_other_region_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.0.0.mca");
        let mut region = RegionFile::open(&path, RegionOptions::default()).unwrap();
        region
            .write_chunk(3, 3, &chunk_stub(ChunkPos::new(99, 3), b"x"))
            .unwrap();
        assert_eq!(region.repair().discarded, 1);
        assert_eq!(region.chunk_count(), 0);
    }

    #[test]
    fn test_open_repairs_overlap_and_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.0.0.mca");
        {
            let mut region = RegionFile::open(&path, RegionOptions::default()).unwrap();
            region.write_chunk(0, 0, b"first").unwrap();
        }
        // Slot 1 points at the same sector as slot 0, slot 2 past EOF.
        set_entry(&path, 1, (2 << 8) | 1);
        set_entry(&path, 2, (500 << 8) | 1);

        let region = RegionFile::open(&path, RegionOptions::default()).unwrap();
        assert!(!region.needs_repair());
        assert_eq!(region.chunk_positions(), vec![RegionPos::new(0, 0).chunk_at_slot(0)]);
        assert_eq!(region.read_chunk(0, 0).unwrap(), b"first");
    }

    #[test]
    fn test_corrupt_record_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.0.0.mca");
        let mut region = RegionFile::open(&path, RegionOptions::default()).unwrap();
        region.write_chunk(0, 0, b"fine").unwrap();
        region.write_chunk(1, 0, b"doomed").unwrap();

        let (_, doomed) = region
            .allocations()
            .into_iter()
            .find(|&(slot, _)| slot == 1)
            .unwrap();
        let mut file = fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.seek(SeekFrom::Start((doomed.start * SECTOR_SIZE + 5) as u64))
            .unwrap();
        file.write_all(&[0xff; 16]).unwrap();
        drop(file);

        let report = region.repair();
        assert_eq!(report.discarded, 1);
        assert!(region.read_chunk(1, 0).unwrap_err().is_not_present());
        assert_eq!(region.read_chunk(0, 0).unwrap(), b"fine");
        // Freed sectors are available again.
        assert!(region.free[doomed.start]);
    }

    #[test]
    fn test_iterator_yields_per_occupied_slot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.0.0.mca");
        let mut region = RegionFile::open(&path, RegionOptions::default()).unwrap();
        for x in 0..4 {
            region.write_chunk(x, 0, b"payload").unwrap();
        }

        let mut iter = region.repair_iter();
        let steps: Vec<_> = iter.by_ref().collect();
        assert_eq!(steps.len(), 4);
        assert!(steps.iter().all(|p| p.max == SLOTS));
        assert!(iter.report().is_clean());
    }
}
