//! Integration tests for mc-region

use std::collections::HashMap;

use mc_region::{Allocation, ChunkPos, HEADER_SECTORS, RegionFile, RegionOptions, SECTOR_SIZE};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_payload(rng: &mut StdRng, max_len: usize) -> Vec<u8> {
    let len = rng.gen_range(1..=max_len);
    let mut data = vec![0u8; len];
    // Half the payloads compress well, half do not.
    if rng.gen_bool(0.5) {
        rng.fill(&mut data[..]);
    } else {
        let byte = rng.gen_range(0..=255u8);
        data.fill(byte);
    }
    data
}

fn assert_no_overlap(region: &RegionFile) {
    let allocations: Vec<Allocation> = region.allocations().into_iter().map(|(_, a)| a).collect();
    for (i, a) in allocations.iter().enumerate() {
        assert!(a.start >= HEADER_SECTORS, "allocation {a:?} touches the header");
        assert!(a.end() <= region.sector_count(), "allocation {a:?} past EOF");
        for b in &allocations[i + 1..] {
            assert!(!a.overlaps(*b), "{a:?} overlaps {b:?}");
        }
    }
}

// ============================================================================
// Round-trip
// ============================================================================

#[test]
fn test_random_payloads_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let mut region =
        RegionFile::open(dir.path().join("r.-2.5.mca"), RegionOptions::default()).unwrap();
    let mut rng = StdRng::seed_from_u64(7);
    let mut expected = HashMap::new();

    for _ in 0..60 {
        let pos = ChunkPos::new(-64 + rng.gen_range(0..32), 160 + rng.gen_range(0..32));
        let payload = random_payload(&mut rng, 40_000);
        region.write_chunk(pos.x, pos.z, &payload).unwrap();
        expected.insert(pos, payload);
    }

    for (pos, payload) in &expected {
        assert_eq!(&region.read_chunk(pos.x, pos.z).unwrap(), payload);
    }

    // Reopen from disk and check again.
    let path = region.path().to_path_buf();
    drop(region);
    let region = RegionFile::open(path, RegionOptions::default()).unwrap();
    assert_eq!(region.chunk_count(), expected.len());
    for (pos, payload) in &expected {
        assert_eq!(&region.read_chunk(pos.x, pos.z).unwrap(), payload);
    }
}

#[test]
fn test_empty_payload_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let mut region =
        RegionFile::open(dir.path().join("r.0.0.mca"), RegionOptions::default()).unwrap();
    region.write_chunk(4, 4, &[]).unwrap();
    assert!(region.read_chunk(4, 4).unwrap().is_empty());
}

// ============================================================================
// Allocation
// ============================================================================

#[test]
fn test_no_overlap_after_mixed_operations() {
    let dir = tempfile::tempdir().unwrap();
    let mut region =
        RegionFile::open(dir.path().join("r.0.0.mca"), RegionOptions::default()).unwrap();
    let mut rng = StdRng::seed_from_u64(42);
    let mut live = HashMap::new();

    for _ in 0..400 {
        let pos = ChunkPos::new(rng.gen_range(0..8), rng.gen_range(0..8));
        if rng.gen_bool(0.25) {
            let removed = region.delete_chunk(pos.x, pos.z).unwrap();
            assert_eq!(removed, live.remove(&pos).is_some());
        } else {
            let payload = random_payload(&mut rng, 3 * SECTOR_SIZE);
            region.write_chunk(pos.x, pos.z, &payload).unwrap();
            live.insert(pos, payload);
        }
        assert_no_overlap(&region);
    }

    for (pos, payload) in &live {
        assert_eq!(&region.read_chunk(pos.x, pos.z).unwrap(), payload);
    }
}

#[test]
fn test_rewriting_smaller_never_grows_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut region =
        RegionFile::open(dir.path().join("r.0.0.mca"), RegionOptions::default()).unwrap();
    let mut rng = StdRng::seed_from_u64(3);

    let mut big = vec![0u8; 20_000];
    rng.fill(&mut big[..]);
    region.write_chunk(0, 0, &big).unwrap();
    region.write_chunk(1, 0, b"neighbour").unwrap();
    let size = region.file_len().unwrap();

    for len in [20_000, 12_000, 5_000, 100, 1] {
        region.write_chunk(0, 0, &big[..len]).unwrap();
        assert_eq!(region.file_len().unwrap(), size);
        assert_eq!(region.read_chunk(0, 0).unwrap(), &big[..len]);
    }
    assert_eq!(region.read_chunk(1, 0).unwrap(), b"neighbour");
}

#[test]
fn test_delete_then_read_is_not_present() {
    let dir = tempfile::tempdir().unwrap();
    let mut region =
        RegionFile::open(dir.path().join("r.0.0.mca"), RegionOptions::default()).unwrap();
    region.write_chunk(9, 9, b"gone soon").unwrap();
    assert!(region.delete_chunk(9, 9).unwrap());
    assert!(!region.delete_chunk(9, 9).unwrap());
    assert!(region.read_chunk(9, 9).unwrap_err().is_not_present());
    assert_eq!(region.chunk_count(), 0);
}
