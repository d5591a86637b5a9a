// ─── Block device abstraction ──────────────────────────────────────────────────

use alloc::vec;
use alloc::vec::Vec;

use crate::SECTOR_SIZE;

/// Raw sector I/O consumed by the volume.
///
/// Sectors are `SECTOR_SIZE` bytes. `read`/`write` return `false` when the
/// sector is out of range or the medium fails; the volume never retries.
pub trait BlockDev {
    fn read(&mut self, sector: u64, buf: &mut [u8; SECTOR_SIZE]) -> bool;
    fn write(&mut self, sector: u64, buf: &[u8; SECTOR_SIZE]) -> bool;
    /// Total addressable sectors.
    fn capacity(&self) -> u64;
}

impl<D: BlockDev + ?Sized> BlockDev for &mut D {
    fn read(&mut self, sector: u64, buf: &mut [u8; SECTOR_SIZE]) -> bool {
        (**self).read(sector, buf)
    }
    fn write(&mut self, sector: u64, buf: &[u8; SECTOR_SIZE]) -> bool {
        (**self).write(sector, buf)
    }
    fn capacity(&self) -> u64 {
        (**self).capacity()
    }
}

// ─── In-memory device ──────────────────────────────────────────────────────────

/// Block device backed by a `Vec<u8>`.
///
/// Individual sectors can be made to fail on read or write, which is how the
/// device-error paths are exercised.
pub struct MemDisk {
    data:       Vec<u8>,
    fail_read:  Option<u64>,
    fail_write: Option<u64>,
    writes:     usize,
}

impl MemDisk {
    /// A zero-filled (unformatted) device of `sectors` sectors.
    pub fn new(sectors: u64) -> Self {
        Self {
            data: vec![0u8; sectors as usize * SECTOR_SIZE],
            fail_read: None,
            fail_write: None,
            writes: 0,
        }
    }

    pub fn fail_reads_at(&mut self, sector: u64)  { self.fail_read = Some(sector); }
    pub fn fail_writes_at(&mut self, sector: u64) { self.fail_write = Some(sector); }

    /// Clear any injected failure.
    pub fn heal(&mut self) {
        self.fail_read = None;
        self.fail_write = None;
    }

    pub fn bytes(&self) -> &[u8] { &self.data }

    pub fn sector(&self, sector: u64) -> &[u8] {
        let off = sector as usize * SECTOR_SIZE;
        &self.data[off..off + SECTOR_SIZE]
    }

    /// Number of successful sector writes so far.
    pub fn writes(&self) -> usize { self.writes }

    fn range(&self, sector: u64) -> Option<core::ops::Range<usize>> {
        let off = (sector as usize).checked_mul(SECTOR_SIZE)?;
        if off + SECTOR_SIZE > self.data.len() { return None; }
        Some(off..off + SECTOR_SIZE)
    }
}

impl BlockDev for MemDisk {
    fn read(&mut self, sector: u64, buf: &mut [u8; SECTOR_SIZE]) -> bool {
        if self.fail_read == Some(sector) { return false; }
        match self.range(sector) {
            Some(r) => { buf.copy_from_slice(&self.data[r]); true }
            None => false,
        }
    }

    fn write(&mut self, sector: u64, buf: &[u8; SECTOR_SIZE]) -> bool {
        if self.fail_write == Some(sector) { return false; }
        match self.range(sector) {
            Some(r) => {
                self.data[r].copy_from_slice(buf);
                self.writes += 1;
                true
            }
            None => false,
        }
    }

    fn capacity(&self) -> u64 {
        (self.data.len() / SECTOR_SIZE) as u64
    }
}

// ─── Image-file device ─────────────────────────────────────────────────────────

#[cfg(feature = "std")]
pub use file_disk::FileDisk;

#[cfg(feature = "std")]
mod file_disk {
    use std::fs::{File, OpenOptions};
    use std::io::{self, Read, Seek, SeekFrom, Write};
    use std::path::Path;

    use super::BlockDev;
    use crate::SECTOR_SIZE;

    /// Block device over a host disk image.
    pub struct FileDisk {
        file:    File,
        sectors: u64,
    }

    impl FileDisk {
        /// Create (or truncate) an image of `sectors` zeroed sectors.
        pub fn create(path: impl AsRef<Path>, sectors: u64) -> io::Result<Self> {
            let file = OpenOptions::new()
                .read(true).write(true).create(true).truncate(true)
                .open(path)?;
            file.set_len(sectors * SECTOR_SIZE as u64)?;
            Ok(Self { file, sectors })
        }

        /// Open an existing image. Trailing bytes short of a full sector are ignored.
        pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
            let file = OpenOptions::new().read(true).write(true).open(path)?;
            let sectors = file.metadata()?.len() / SECTOR_SIZE as u64;
            Ok(Self { file, sectors })
        }

        fn seek_to(&mut self, sector: u64) -> io::Result<()> {
            if sector >= self.sectors {
                return Err(io::ErrorKind::UnexpectedEof.into());
            }
            self.file.seek(SeekFrom::Start(sector * SECTOR_SIZE as u64)).map(|_| ())
        }
    }

    impl BlockDev for FileDisk {
        fn read(&mut self, sector: u64, buf: &mut [u8; SECTOR_SIZE]) -> bool {
            self.seek_to(sector).and_then(|_| self.file.read_exact(buf)).is_ok()
        }

        fn write(&mut self, sector: u64, buf: &[u8; SECTOR_SIZE]) -> bool {
            self.seek_to(sector).and_then(|_| self.file.write_all(buf)).is_ok()
        }

        fn capacity(&self) -> u64 { self.sectors }
    }
}

// ─── Unit tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_disk_read_write() {
        let mut d = MemDisk::new(4);
        let mut sec = [0u8; SECTOR_SIZE];
        sec[0] = 0xAB;
        sec[SECTOR_SIZE - 1] = 0xCD;
        assert!(d.write(2, &sec));
        let mut out = [0u8; SECTOR_SIZE];
        assert!(d.read(2, &mut out));
        assert_eq!(out[0], 0xAB);
        assert_eq!(out[SECTOR_SIZE - 1], 0xCD);
        assert_eq!(d.writes(), 1);
    }

    #[test]
    fn mem_disk_out_of_range() {
        let mut d = MemDisk::new(4);
        let mut sec = [0u8; SECTOR_SIZE];
        assert_eq!(d.capacity(), 4);
        assert!(!d.read(4, &mut sec));
        assert!(!d.write(4, &sec));
    }

    #[test]
    fn mem_disk_injected_failures() {
        let mut d = MemDisk::new(4);
        let mut sec = [0u8; SECTOR_SIZE];
        d.fail_reads_at(1);
        d.fail_writes_at(3);
        assert!(!d.read(1, &mut sec));
        assert!(d.read(0, &mut sec));
        assert!(!d.write(3, &sec));
        d.heal();
        assert!(d.read(1, &mut sec));
        assert!(d.write(3, &sec));
    }

    #[test]
    fn borrowed_device_forwards() {
        let mut d = MemDisk::new(2);
        {
            let mut r = &mut d;
            let sec = [7u8; SECTOR_SIZE];
            assert!(BlockDev::write(&mut r, 1, &sec));
            assert_eq!(BlockDev::capacity(&r), 2);
        }
        assert_eq!(d.sector(1)[100], 7);
    }

    #[cfg(feature = "std")]
    #[test]
    fn file_disk_roundtrip() {
        let path = std::env::temp_dir().join(format!("rsfs-disk-{}.img", std::process::id()));
        {
            let mut d = FileDisk::create(&path, 3).unwrap();
            assert_eq!(d.capacity(), 3);
            let sec = [0x5Au8; SECTOR_SIZE];
            assert!(d.write(2, &sec));
            assert!(!d.write(3, &sec));
        }
        let mut d = FileDisk::open(&path).unwrap();
        let mut out = [0u8; SECTOR_SIZE];
        assert!(d.read(2, &mut out));
        assert_eq!(out[10], 0x5A);
        std::fs::remove_file(&path).unwrap();
    }
}
