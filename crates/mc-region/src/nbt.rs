//! Coordinate probing for stored records.
//!
//! The container treats records as opaque bytes, but repair needs to know
//! where a record *thinks* it belongs. [`CoordinateProbe`] answers that
//! question; [`NbtCoordinateProbe`] does so for Anvil chunk compounds by
//! scanning for the `xPos`/`zPos` int tags at the root or inside `Level`.

use byteorder::{BigEndian, ReadBytesExt};

use crate::pos::ChunkPos;

/// NBT tag type IDs
mod tag_type {
    pub const END: u8 = 0;
    pub const BYTE: u8 = 1;
    pub const SHORT: u8 = 2;
    pub const INT: u8 = 3;
    pub const LONG: u8 = 4;
    pub const FLOAT: u8 = 5;
    pub const DOUBLE: u8 = 6;
    pub const BYTE_ARRAY: u8 = 7;
    pub const STRING: u8 = 8;
    pub const LIST: u8 = 9;
    pub const COMPOUND: u8 = 10;
    pub const INT_ARRAY: u8 = 11;
    pub const LONG_ARRAY: u8 = 12;
}

const MAX_DEPTH: usize = 64;

/// Extracts the coordinates a record reports for itself.
pub trait CoordinateProbe {
    /// Returns `None` when the record carries no recognizable coordinates.
    fn probe(&self, record: &[u8]) -> Option<ChunkPos>;
}

impl<F> CoordinateProbe for F
where
    F: Fn(&[u8]) -> Option<ChunkPos>,
{
    fn probe(&self, record: &[u8]) -> Option<ChunkPos> {
        self(record)
    }
}

/// Probe for Anvil chunk NBT.
#[derive(Clone, Copy, Debug, Default)]
pub struct NbtCoordinateProbe;

impl CoordinateProbe for NbtCoordinateProbe {
    fn probe(&self, record: &[u8]) -> Option<ChunkPos> {
        let mut reader = Reader { buf: record };
        if reader.u8()? != tag_type::COMPOUND {
            return None;
        }
        reader.skip_string()?;

        let mut found = Found::default();
        reader.scan_compound(&mut found, true)?;
        Some(ChunkPos::new(found.x?, found.z?))
    }
}

#[derive(Default)]
struct Found {
    x: Option<i32>,
    z: Option<i32>,
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn u8(&mut self) -> Option<u8> {
        self.buf.read_u8().ok()
    }

    fn i16(&mut self) -> Option<i16> {
        self.buf.read_i16::<BigEndian>().ok()
    }

    fn i32(&mut self) -> Option<i32> {
        self.buf.read_i32::<BigEndian>().ok()
    }

    fn skip(&mut self, n: usize) -> Option<()> {
        if n > self.buf.len() {
            return None;
        }
        self.buf = &self.buf[n..];
        Some(())
    }

    fn string(&mut self) -> Option<&'a [u8]> {
        let len = self.i16()? as u16 as usize;
        if len > self.buf.len() {
            return None;
        }
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Some(head)
    }

    fn skip_string(&mut self) -> Option<()> {
        self.string().map(|_| ())
    }

    fn count(&mut self) -> Option<usize> {
        usize::try_from(self.i32()?).ok()
    }

    /// Walk a compound body. When `descend` is set, a `Level` child
    /// compound is searched too (pre-1.18 layout).
    fn scan_compound(&mut self, found: &mut Found, descend: bool) -> Option<()> {
        loop {
            let tag = self.u8()?;
            if tag == tag_type::END {
                return Some(());
            }
            let name = self.string()?;
            match (tag, name) {
                (tag_type::INT, b"xPos") => found.x = Some(self.i32()?),
                (tag_type::INT, b"zPos") => found.z = Some(self.i32()?),
                (tag_type::COMPOUND, b"Level") if descend => self.scan_compound(found, false)?,
                _ => self.skip_payload(tag, 0)?,
            }
        }
    }

    fn skip_payload(&mut self, tag: u8, depth: usize) -> Option<()> {
        if depth > MAX_DEPTH {
            return None;
        }
        match tag {
            tag_type::BYTE => self.skip(1),
            tag_type::SHORT => self.skip(2),
            tag_type::INT | tag_type::FLOAT => self.skip(4),
            tag_type::LONG | tag_type::DOUBLE => self.skip(8),
            tag_type::BYTE_ARRAY => {
                let n = self.count()?;
                self.skip(n)
            }
            tag_type::INT_ARRAY => {
                let n = self.count()?;
                self.skip(n.checked_mul(4)?)
            }
            tag_type::LONG_ARRAY => {
                let n = self.count()?;
                self.skip(n.checked_mul(8)?)
            }
            tag_type::STRING => self.skip_string(),
            tag_type::LIST => {
                let element = self.u8()?;
                let n = self.count()?;
                for _ in 0..n {
                    self.skip_payload(element, depth + 1)?;
                }
                Some(())
            }
            tag_type::COMPOUND => loop {
                let child = self.u8()?;
                if child == tag_type::END {
                    return Some(());
                }
                self.skip_string()?;
                self.skip_payload(child, depth + 1)?;
            },
            _ => None,
        }
    }
}

#[cfg(test)]
pub(crate) fn chunk_stub(pos: ChunkPos, filler: &[u8]) -> Vec<u8> {
    use byteorder::WriteBytesExt;

    fn name(buf: &mut Vec<u8>, name: &str) {
        buf.write_u16::<BigEndian>(name.len() as u16).unwrap();
        buf.extend_from_slice(name.as_bytes());
    }

    let mut buf = vec![tag_type::COMPOUND];
    name(&mut buf, "");
    buf.push(tag_type::BYTE_ARRAY);
    name(&mut buf, "Filler");
    buf.write_i32::<BigEndian>(filler.len() as i32).unwrap();
    buf.extend_from_slice(filler);
    buf.push(tag_type::INT);
    name(&mut buf, "xPos");
    buf.write_i32::<BigEndian>(pos.x).unwrap();
    buf.push(tag_type::INT);
    name(&mut buf, "zPos");
    buf.write_i32::<BigEndian>(pos.z).unwrap();
    buf.push(tag_type::END);
    buf
}

#[cfg(test)]
mod tests {
    use byteorder::WriteBytesExt;

    use super::*;

    #[test]
    fn test_probe_root_coordinates() {
        let record = chunk_stub(ChunkPos::new(-7, 40), &[1, 2, 3]);
        assert_eq!(
            NbtCoordinateProbe.probe(&record),
            Some(ChunkPos::new(-7, 40))
        );
    }

    #[test]
    fn test_probe_level_compound() {
        // {"": {Level: {xPos: 3, zPos: 4}, Tag: [L; 1]}}
        let mut buf = vec![tag_type::COMPOUND, 0, 0];
        buf.push(tag_type::LIST);
        buf.extend_from_slice(&[0, 3]);
        buf.extend_from_slice(b"Tag");
        buf.push(tag_type::LONG);
        buf.write_i32::<BigEndian>(1).unwrap();
        buf.write_i64::<BigEndian>(99).unwrap();
        buf.push(tag_type::COMPOUND);
        buf.extend_from_slice(&[0, 5]);
        buf.extend_from_slice(b"Level");
        for (name, value) in [("xPos", 3), ("zPos", 4)] {
            buf.push(tag_type::INT);
            buf.extend_from_slice(&[0, 4]);
            buf.extend_from_slice(name.as_bytes());
            buf.write_i32::<BigEndian>(value).unwrap();
        }
        buf.push(tag_type::END);
        buf.push(tag_type::END);

        assert_eq!(NbtCoordinateProbe.probe(&buf), Some(ChunkPos::new(3, 4)));
    }

    #[test]
    fn test_probe_rejects_opaque_bytes() {
        assert_eq!(NbtCoordinateProbe.probe(b"hello world"), None);
        assert_eq!(NbtCoordinateProbe.probe(&[]), None);
        // Truncated compound
        let record = chunk_stub(ChunkPos::new(1, 1), &[0; 16]);
        assert_eq!(NbtCoordinateProbe.probe(&record[..record.len() - 6]), None);
    }
}
