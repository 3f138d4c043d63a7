//! Chunk and region coordinates.

use core::fmt;

/// Number of chunks along one edge of a region.
pub const REGION_WIDTH: i32 = 32;

/// Number of header slots in a region (`32 * 32`).
pub const SLOTS: usize = 1024;

/// Absolute chunk coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    #[inline]
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// The region containing this chunk.
    ///
    /// Arithmetic shift floors toward negative infinity, so `-1` lands in
    /// region `-1` rather than `0`.
    #[inline]
    #[must_use]
    pub const fn region(self) -> RegionPos {
        RegionPos::new(self.x >> 5, self.z >> 5)
    }

    /// Header slot index: `(x & 31) + (z & 31) * 32`.
    #[inline]
    #[must_use]
    pub const fn local_index(self) -> usize {
        ((self.x & 31) + (self.z & 31) * REGION_WIDTH) as usize
    }
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Region coordinates (a 32x32 block of chunks).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegionPos {
    pub x: i32,
    pub z: i32,
}

impl RegionPos {
    #[inline]
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// The absolute position of the chunk stored in `slot`.
    ///
    /// Only meaningful for regions that are [in range](Self::is_in_range).
    #[inline]
    #[must_use]
    pub const fn chunk_at_slot(self, slot: usize) -> ChunkPos {
        let local_x = (slot % 32) as i32;
        let local_z = (slot / 32) as i32;
        ChunkPos::new(
            self.x * REGION_WIDTH + local_x,
            self.z * REGION_WIDTH + local_z,
        )
    }

    /// Whether every chunk of this region has `i32` coordinates.
    #[inline]
    #[must_use]
    pub const fn is_in_range(self) -> bool {
        const MIN: i32 = i32::MIN >> 5;
        const MAX: i32 = i32::MAX >> 5;
        self.x >= MIN && self.x <= MAX && self.z >= MIN && self.z <= MAX
    }

    /// Whether `chunk` falls inside this region.
    #[inline]
    #[must_use]
    pub const fn contains(self, chunk: ChunkPos) -> bool {
        let region = chunk.region();
        region.x == self.x && region.z == self.z
    }

    /// Canonical file name, `r.<x>.<z>.mca`.
    #[must_use]
    pub fn file_name(self) -> String {
        format!("r.{}.{}.mca", self.x, self.z)
    }

    /// Parse a canonical region file name.
    ///
    /// Returns `None` for anything that is not exactly `r.<x>.<z>.mca`, and
    /// for regions whose chunks would fall outside `i32`.
    #[must_use]
    pub fn from_file_name(name: &str) -> Option<Self> {
        let rest = name.strip_prefix("r.")?.strip_suffix(".mca")?;
        let (x, z) = rest.split_once('.')?;
        Some(Self::new(x.parse().ok()?, z.parse().ok()?)).filter(|region| region.is_in_range())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_chunks_floor_into_region() {
        assert_eq!(ChunkPos::new(-1, -1).region(), RegionPos::new(-1, -1));
        assert_eq!(ChunkPos::new(-32, 0).region(), RegionPos::new(-1, 0));
        assert_eq!(ChunkPos::new(-33, 31).region(), RegionPos::new(-2, 0));
        assert_eq!(ChunkPos::new(32, 64).region(), RegionPos::new(1, 2));
    }

    #[test]
    fn test_local_index_matches_slot() {
        for pos in [
            ChunkPos::new(0, 0),
            ChunkPos::new(5, 7),
            ChunkPos::new(-1, -1),
            ChunkPos::new(-40, 77),
        ] {
            let region = pos.region();
            assert_eq!(region.chunk_at_slot(pos.local_index()), pos);
        }
        assert_eq!(ChunkPos::new(-1, -1).local_index(), 1023);
    }

    #[test]
    fn test_file_name_parsing() {
        let region = RegionPos::new(-3, 12);
        assert_eq!(region.file_name(), "r.-3.12.mca");
        assert_eq!(RegionPos::from_file_name("r.-3.12.mca"), Some(region));
        assert_eq!(RegionPos::from_file_name("r.1.mca"), None);
        assert_eq!(RegionPos::from_file_name("r.a.b.mca"), None);
        assert_eq!(RegionPos::from_file_name("r.0.0.mcr"), None);
    }

    #[test]
    fn test_out_of_range_region_names_rejected() {
        assert_eq!(RegionPos::from_file_name("r.99999999.0.mca"), None);
        assert_eq!(RegionPos::from_file_name("r.0.-67108865.mca"), None);

        let edge = RegionPos::from_file_name("r.67108863.-67108864.mca").unwrap();
        assert_eq!(edge.chunk_at_slot(1023), ChunkPos::new(i32::MAX, i32::MIN + 31));
        assert_eq!(edge.chunk_at_slot(0), ChunkPos::new(i32::MAX - 31, i32::MIN));
    }
}
