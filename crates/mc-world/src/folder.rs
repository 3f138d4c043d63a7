//! A world stored as a directory of region files and plain files.
//!
//! ```text
//! <root>/
//!   level.dat                 plain file
//!   playerdata/<uuid>.dat     plain file
//!   region/r.<x>.<z>.mca      chunks of dimension ""
//!   DIM-1/region/r.*.mca      chunks of dimension "DIM-1"
//!   session.lock              owned by SessionLock, hidden from file APIs
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use mc_region::{ChunkPos, RegionError, RegionFile, RegionOptions, RegionPos};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::backend::StorageBackend;
use crate::error::{WorldError, WorldResult};
use crate::lock::SESSION_LOCK;
use crate::lru::LruMap;

/// Name of the chunk folder inside each dimension directory.
pub const REGION_DIR: &str = "region";

/// Options for opening a world folder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorldOptions {
    pub readonly: bool,
    /// zlib level for new chunk records (0-9).
    pub compression_level: u32,
    /// Number of region files whose header tables stay in memory.
    pub region_cache_size: usize,
}

impl Default for WorldOptions {
    fn default() -> Self {
        Self {
            readonly: false,
            compression_level: 6,
            region_cache_size: 64,
        }
    }
}

type RegionKey = (String, RegionPos);

/// Directory-backed [`StorageBackend`].
pub struct WorldFolder {
    root: PathBuf,
    options: WorldOptions,
    regions: Mutex<LruMap<RegionKey, RegionFile>>,
}

impl WorldFolder {
    /// Open a world folder, creating the directory if writable.
    pub fn open(root: impl AsRef<Path>, options: WorldOptions) -> WorldResult<Self> {
        let root = root.as_ref().to_path_buf();
        if options.readonly {
            if !root.is_dir() {
                return Err(WorldError::Io(std::io::Error::new(
                    ErrorKind::NotFound,
                    format!("world folder {} does not exist", root.display()),
                )));
            }
        } else {
            fs::create_dir_all(&root)?;
        }

        // Region files write through, so eviction only has to drop the tables.
        let regions = LruMap::new(
            options.region_cache_size,
            |(dim, pos): RegionKey, region: RegionFile| {
                trace!(dim = %dim, x = pos.x, z = pos.z, path = %region.path().display(), "evicting region");
            },
        );

        Ok(Self {
            root,
            options,
            regions: Mutex::new(regions),
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub const fn options(&self) -> WorldOptions {
        self.options
    }

    fn region_options(&self) -> RegionOptions {
        RegionOptions {
            readonly: self.options.readonly,
            compression_level: self.options.compression_level,
        }
    }

    fn check_writable(&self) -> WorldResult<()> {
        if self.options.readonly {
            Err(WorldError::ReadOnly)
        } else {
            Ok(())
        }
    }

    fn region_dir(&self, dim: &str) -> WorldResult<PathBuf> {
        if dim.is_empty() {
            return Ok(self.root.join(REGION_DIR));
        }
        Ok(self.root.join(relative(dim)?).join(REGION_DIR))
    }

    /// Run `f` against the cached region file, opening it on a miss.
    ///
    /// Returns `None` when the file does not exist and `create` is unset.
    fn with_region<T>(
        &self,
        dim: &str,
        region: RegionPos,
        create: bool,
        f: impl FnOnce(&mut RegionFile) -> WorldResult<T>,
    ) -> WorldResult<Option<T>> {
        let dir = self.region_dir(dim)?;
        let path = dir.join(region.file_name());
        let key = (dim.to_owned(), region);

        let mut regions = self.regions.lock();
        if !regions.contains_key(&key) && !path.is_file() {
            if !create {
                return Ok(None);
            }
            fs::create_dir_all(&dir)?;
        }

        let options = self.region_options();
        let file = regions.get_or_try_insert_with(&key, || RegionFile::open(&path, options))?;
        f(file).map(Some)
    }

    /// Regions present on disk for `dim`.
    fn region_positions(&self, dim: &str) -> WorldResult<Vec<RegionPos>> {
        let dir = self.region_dir(dim)?;
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut regions = Vec::new();
        for entry in entries {
            let entry = entry?;
            if let Some(pos) = entry.file_name().to_str().and_then(RegionPos::from_file_name) {
                regions.push(pos);
            }
        }
        regions.sort_unstable();
        Ok(regions)
    }
}

impl StorageBackend for WorldFolder {
    fn list_dimensions(&self) -> WorldResult<Vec<String>> {
        let mut dims = Vec::new();
        if self.root.join(REGION_DIR).is_dir() {
            dims.push(String::new());
        }
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() || !entry.path().join(REGION_DIR).is_dir() {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                if name != REGION_DIR {
                    dims.push(name);
                }
            }
        }
        dims.sort();
        Ok(dims)
    }

    fn chunk_positions(&self, dim: &str) -> WorldResult<Vec<ChunkPos>> {
        let mut positions = Vec::new();
        for region in self.region_positions(dim)? {
            if let Some(chunks) = self.with_region(dim, region, false, |file| Ok(file.chunk_positions()))? {
                positions.extend(chunks);
            }
        }
        Ok(positions)
    }

    fn contains_chunk(&self, cx: i32, cz: i32, dim: &str) -> WorldResult<bool> {
        let region = ChunkPos::new(cx, cz).region();
        Ok(self
            .with_region(dim, region, false, |file| Ok(file.contains_chunk(cx, cz)))?
            .unwrap_or(false))
    }

    fn read_chunk_bytes(&self, cx: i32, cz: i32, dim: &str) -> WorldResult<Vec<u8>> {
        let not_present = || WorldError::ChunkNotPresent {
            cx,
            cz,
            dim: dim.to_owned(),
        };
        let region = ChunkPos::new(cx, cz).region();

        let data = self.with_region(dim, region, false, |file| {
            let result = match file.read_chunk(cx, cz) {
                Err(e) if e.is_corruption() => {
                    warn!(cx, cz, dim, "corrupt chunk record ({e}), repairing region");
                    let report = file.repair();
                    debug!(discarded = report.discarded, recovered = report.recovered, "region repaired");
                    file.read_chunk(cx, cz)
                }
                other => other,
            };
            result.map_err(|e| match e {
                RegionError::ChunkNotPresent { .. } => not_present(),
                other => other.into(),
            })
        })?;

        data.ok_or_else(not_present)
    }

    fn write_chunk_bytes(&mut self, cx: i32, cz: i32, dim: &str, data: &[u8]) -> WorldResult<()> {
        self.check_writable()?;
        let region = ChunkPos::new(cx, cz).region();
        self.with_region(dim, region, true, |file| Ok(file.write_chunk(cx, cz, data)?))?;
        Ok(())
    }

    fn delete_chunk(&mut self, cx: i32, cz: i32, dim: &str) -> WorldResult<()> {
        self.check_writable()?;
        let region = ChunkPos::new(cx, cz).region();
        let removed = self.with_region(dim, region, false, |file| Ok(file.delete_chunk(cx, cz)?))?;
        if removed == Some(true) {
            Ok(())
        } else {
            Err(WorldError::ChunkNotPresent {
                cx,
                cz,
                dim: dim.to_owned(),
            })
        }
    }

    fn contains_file(&self, path: &str) -> bool {
        !is_reserved(path) && relative(path).is_ok_and(|rel| self.root.join(rel).is_file())
    }

    fn list_folder(&self, path: &str) -> WorldResult<Vec<String>> {
        let dir = if path.is_empty() {
            self.root.clone()
        } else {
            self.root.join(relative(path)?)
        };
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let rel = join(path, &name);
            if is_reserved(&rel) || (name == REGION_DIR && entry.file_type()?.is_dir()) {
                continue;
            }
            names.push(rel);
        }
        names.sort();
        Ok(names)
    }

    fn list_all_files(&self) -> WorldResult<Vec<String>> {
        let mut files = Vec::new();
        collect_files(&self.root, "", 0, &mut files)?;
        files.sort();
        Ok(files)
    }

    fn read_file(&self, path: &str) -> WorldResult<Vec<u8>> {
        if is_reserved(path) {
            return Err(WorldError::InvalidPath(path.to_owned()));
        }
        match fs::read(self.root.join(relative(path)?)) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(WorldError::FileNotPresent(path.to_owned())),
            Err(e) => Err(e.into()),
        }
    }

    fn write_file(&mut self, path: &str, data: &[u8]) -> WorldResult<()> {
        self.check_writable()?;
        if is_reserved(path) {
            return Err(WorldError::InvalidPath(path.to_owned()));
        }
        let full = self.root.join(relative(path)?);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(full, data)?;
        Ok(())
    }

    fn delete_file(&mut self, path: &str) -> WorldResult<()> {
        self.check_writable()?;
        if is_reserved(path) {
            return Err(WorldError::InvalidPath(path.to_owned()));
        }
        match fs::remove_file(self.root.join(relative(path)?)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(WorldError::FileNotPresent(path.to_owned())),
            Err(e) => Err(e.into()),
        }
    }

    fn file_path(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

/// Validate a `/`-separated relative path.
fn relative(path: &str) -> WorldResult<PathBuf> {
    let rel = Path::new(path);
    let normal = !path.is_empty() && rel.components().all(|c| matches!(c, Component::Normal(_)));
    if normal {
        Ok(rel.to_path_buf())
    } else {
        Err(WorldError::InvalidPath(path.to_owned()))
    }
}

/// Walk `dir`, skipping the region folders of dimensions.
fn collect_files(dir: &Path, prefix: &str, depth: usize, out: &mut Vec<String>) -> WorldResult<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    for entry in entries {
        let entry = entry?;
        let Ok(name) = entry.file_name().into_string() else {
            warn!(path = %entry.path().display(), "skipping non UTF-8 file name");
            continue;
        };
        let rel = join(prefix, &name);
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if depth <= 1 && name == REGION_DIR {
                continue;
            }
            collect_files(&entry.path(), &rel, depth + 1, out)?;
        } else if !is_reserved(&rel) {
            out.push(rel);
        }
    }
    Ok(())
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_owned()
    } else {
        format!("{prefix}/{name}")
    }
}

/// Paths the file API never exposes: the lock and region files.
fn is_reserved(path: &str) -> bool {
    if path == SESSION_LOCK {
        return true;
    }
    let mut parts = path.rsplit('/');
    let file = parts.next().unwrap_or_default();
    let parent = parts.next();
    parent == Some(REGION_DIR) && RegionPos::from_file_name(file).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(dir: &tempfile::TempDir) -> WorldFolder {
        WorldFolder::open(dir.path(), WorldOptions::default()).unwrap()
    }

    #[test]
    fn test_chunks_per_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let mut world = open(&dir);

        world.write_chunk_bytes(0, 0, "", b"overworld").unwrap();
        world.write_chunk_bytes(-40, 70, "", b"far").unwrap();
        world.write_chunk_bytes(0, 0, "DIM-1", b"nether").unwrap();

        assert_eq!(world.list_dimensions().unwrap(), vec!["", "DIM-1"]);
        assert_eq!(world.read_chunk_bytes(0, 0, "").unwrap(), b"overworld");
        assert_eq!(world.read_chunk_bytes(0, 0, "DIM-1").unwrap(), b"nether");
        assert_eq!(world.chunk_count("").unwrap(), 2);
        assert!(world.contains_chunk(-40, 70, "").unwrap());
        assert!(!world.contains_chunk(-40, 70, "DIM-1").unwrap());
        assert!(dir.path().join("region/r.-2.2.mca").is_file());
    }

    #[test]
    fn test_missing_chunk_is_not_present() {
        let dir = tempfile::tempdir().unwrap();
        let mut world = open(&dir);
        assert!(world.read_chunk_bytes(5, 5, "").unwrap_err().is_not_present());
        assert!(world.delete_chunk(5, 5, "").unwrap_err().is_not_present());

        world.write_chunk_bytes(5, 5, "", b"x").unwrap();
        world.delete_chunk(5, 5, "").unwrap();
        assert!(world.read_chunk_bytes(5, 5, "").unwrap_err().is_not_present());
    }

    #[test]
    fn test_files_hide_chunk_storage_and_lock() {
        let dir = tempfile::tempdir().unwrap();
        let mut world = open(&dir);
        world.write_chunk_bytes(0, 0, "", b"chunk").unwrap();
        world.write_chunk_bytes(0, 0, "DIM1", b"chunk").unwrap();
        world.write_file("level.dat", b"level").unwrap();
        world.write_file("playerdata/abc.dat", b"player").unwrap();
        fs::write(dir.path().join(SESSION_LOCK), [0u8; 8]).unwrap();

        assert_eq!(
            world.list_all_files().unwrap(),
            vec!["level.dat", "playerdata/abc.dat"]
        );
        assert_eq!(
            world.list_folder("").unwrap(),
            vec!["DIM1", "level.dat", "playerdata"]
        );
        assert_eq!(
            world.list_folder("playerdata").unwrap(),
            vec!["playerdata/abc.dat"]
        );
        assert!(!world.contains_file(SESSION_LOCK));
        assert!(!world.contains_file("region/r.0.0.mca"));
        assert!(world.contains_file("playerdata/abc.dat"));
    }

    #[test]
    fn test_file_crud() {
        let dir = tempfile::tempdir().unwrap();
        let mut world = open(&dir);

        world.write_file("data/villages.dat", b"v1").unwrap();
        assert_eq!(world.read_file("data/villages.dat").unwrap(), b"v1");
        world.write_file("data/villages.dat", b"v2").unwrap();
        assert_eq!(world.read_file("data/villages.dat").unwrap(), b"v2");
        world.delete_file("data/villages.dat").unwrap();
        assert!(world.read_file("data/villages.dat").unwrap_err().is_not_present());
        assert!(world.delete_file("data/villages.dat").unwrap_err().is_not_present());
        assert_eq!(world.file_path("level.dat"), dir.path().join("level.dat"));
    }

    #[test]
    fn test_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut world = open(&dir);
        for bad in ["../outside", "/etc/passwd", "", "a/../../b"] {
            assert!(matches!(
                world.write_file(bad, b"x"),
                Err(WorldError::InvalidPath(_))
            ));
        }
        assert!(matches!(
            world.write_file("region/r.0.0.mca", b"x"),
            Err(WorldError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_readonly_folder() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut world = open(&dir);
            world.write_chunk_bytes(1, 2, "", b"kept").unwrap();
        }
        let mut world = WorldFolder::open(
            dir.path(),
            WorldOptions {
                readonly: true,
                ..WorldOptions::default()
            },
        )
        .unwrap();
        assert_eq!(world.read_chunk_bytes(1, 2, "").unwrap(), b"kept");
        assert!(matches!(
            world.write_chunk_bytes(1, 2, "", b"no"),
            Err(WorldError::ReadOnly)
        ));
        assert!(matches!(
            world.write_file("level.dat", b"no"),
            Err(WorldError::ReadOnly)
        ));
    }

    #[test]
    fn test_small_cache_still_serves_every_region() {
        let dir = tempfile::tempdir().unwrap();
        let mut world = WorldFolder::open(
            dir.path(),
            WorldOptions {
                region_cache_size: 1,
                ..WorldOptions::default()
            },
        )
        .unwrap();
        for i in 0..4 {
            world.write_chunk_bytes(i * 32, 0, "", &i.to_le_bytes()).unwrap();
        }
        for i in 0..4 {
            assert_eq!(world.read_chunk_bytes(i * 32, 0, "").unwrap(), i.to_le_bytes());
        }
        assert_eq!(world.chunk_positions("").unwrap().len(), 4);
    }
}
