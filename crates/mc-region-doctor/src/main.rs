//! Region file doctor
//!
//! Commands:
//! - `info <file.mca>` - header summary and one line per stored chunk
//! - `repair <file.mca>` - rebuild the offset table, reporting progress
//! - `dump <file.mca> <cx> <cz> [out]` - write a decompressed record to `out`
//!   (stdout by default)
//! - `world <dir>` - chunk counts per dimension and loose files

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use eyre::{WrapErr, bail};
use mc_region::{RegionFile, RegionOptions};
use mc_world::{StorageBackend, WorldFolder, WorldOptions};
use tracing::{info, warn};

const USAGE: &str = "usage: mc-region-doctor <info|repair|dump|world> <path> [args]";

enum Command {
    Info(PathBuf),
    Repair(PathBuf),
    Dump {
        path: PathBuf,
        cx: i32,
        cz: i32,
        out: Option<PathBuf>,
    },
    World(PathBuf),
}

fn parse_args(args: &[String]) -> eyre::Result<Command> {
    let Some(path) = args.get(2).map(PathBuf::from) else {
        bail!(USAGE);
    };
    match args.get(1).map(String::as_str) {
        Some("info") => Ok(Command::Info(path)),
        Some("repair") => Ok(Command::Repair(path)),
        Some("dump") => {
            let (Some(cx), Some(cz)) = (args.get(3), args.get(4)) else {
                bail!("usage: mc-region-doctor dump <file.mca> <cx> <cz> [out]");
            };
            Ok(Command::Dump {
                path,
                cx: cx.parse().wrap_err_with(|| format!("bad chunk x: {cx}"))?,
                cz: cz.parse().wrap_err_with(|| format!("bad chunk z: {cz}"))?,
                out: args.get(5).map(PathBuf::from),
            })
        }
        Some("world") => Ok(Command::World(path)),
        _ => bail!(USAGE),
    }
}

fn readonly() -> RegionOptions {
    RegionOptions {
        readonly: true,
        ..RegionOptions::default()
    }
}

fn info(path: PathBuf) -> eyre::Result<()> {
    let region = RegionFile::open(&path, readonly())?;
    let mut out = io::stdout().lock();

    writeln!(out, "file:     {}", path.display())?;
    match region.region() {
        Some(pos) => writeln!(out, "region:   ({}, {})", pos.x, pos.z)?,
        None => writeln!(out, "region:   (non-canonical name)")?,
    }
    writeln!(out, "sectors:  {}", region.sector_count())?;
    writeln!(out, "chunks:   {}", region.chunk_count())?;
    writeln!(out, "repair:   {}", if region.needs_repair() { "needed" } else { "clean" })?;

    let allocations = region.allocations();
    for ((slot, alloc), pos) in allocations.iter().zip(region.chunk_positions()) {
        let stamp = region.timestamp(pos.x, pos.z).unwrap_or(0);
        writeln!(
            out,
            "  slot {slot:4} {pos} sectors {:5}..{:5} stamp {stamp}",
            alloc.start,
            alloc.end()
        )?;
    }
    Ok(())
}

fn repair(path: PathBuf) -> eyre::Result<()> {
    let mut region = RegionFile::open(&path, RegionOptions::default())?;
    let mut iter = region.repair_iter();
    for progress in iter.by_ref() {
        if progress.current % 128 == 0 || progress.current == progress.max {
            info!("{progress}");
        }
    }
    let report = iter.report();
    drop(iter);

    if report.is_clean() {
        info!(path = %path.display(), "region is clean");
    } else {
        warn!(
            path = %path.display(),
            discarded = report.discarded,
            recovered = report.recovered,
            "repaired region"
        );
    }
    writeln!(
        io::stdout().lock(),
        "discarded {} recovered {}",
        report.discarded,
        report.recovered
    )?;
    Ok(())
}

fn dump(path: PathBuf, cx: i32, cz: i32, out: Option<PathBuf>) -> eyre::Result<()> {
    let region = RegionFile::open(&path, readonly())?;
    let data = region
        .read_chunk(cx, cz)
        .wrap_err_with(|| format!("reading chunk ({cx}, {cz}) from {}", path.display()))?;
    match out {
        Some(target) => {
            fs::write(&target, &data)?;
            info!(bytes = data.len(), path = %target.display(), "wrote chunk");
        }
        None => io::stdout().lock().write_all(&data)?,
    }
    Ok(())
}

fn world(path: PathBuf) -> eyre::Result<()> {
    let world = WorldFolder::open(
        &path,
        WorldOptions {
            readonly: true,
            ..WorldOptions::default()
        },
    )?;
    let mut out = io::stdout().lock();

    for dim in world.list_dimensions()? {
        let label = if dim.is_empty() { "(overworld)" } else { dim.as_str() };
        writeln!(out, "{label:16} {} chunks", world.chunk_count(&dim)?)?;
    }
    let files = world.list_all_files()?;
    writeln!(out, "{} files", files.len())?;
    for file in files {
        writeln!(out, "  {file}")?;
    }
    Ok(())
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mc_region_doctor=info".parse()?)
                .add_directive("mc_region=warn".parse()?),
        )
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    match parse_args(&args)? {
        Command::Info(path) => info(path),
        Command::Repair(path) => repair(path),
        Command::Dump { path, cx, cz, out } => dump(path, cx, cz, out),
        Command::World(path) => world(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("mc-region-doctor")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_dump() {
        let Command::Dump { path, cx, cz, out } =
            parse_args(&args(&["dump", "r.0.0.mca", "-3", "7"])).unwrap()
        else {
            panic!("expected dump");
        };
        assert_eq!(path, PathBuf::from("r.0.0.mca"));
        assert_eq!((cx, cz), (-3, 7));
        assert!(out.is_none());
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_args(&args(&[])).is_err());
        assert!(parse_args(&args(&["scrub", "r.0.0.mca"])).is_err());
        assert!(parse_args(&args(&["dump", "r.0.0.mca", "x", "0"])).is_err());
        assert!(parse_args(&args(&["dump", "r.0.0.mca", "1"])).is_err());
    }
}
