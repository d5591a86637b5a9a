//! Flat directory table.
//!
//! `MAX_FILES` fixed slots serialized into the single directory sector, 32
//! bytes each:
//!
//! | bytes  | field                          |
//! |--------|--------------------------------|
//! | 0      | used (0 / 1)                   |
//! | 1..26  | name, NUL padded               |
//! | 26..28 | first cluster, u16 LE          |
//! | 28..32 | size in bytes, u32 LE          |

use alloc::vec::Vec;
use rsfs_api_types::{DIR_ENTRY_SIZE, DIR_SECTOR, MAX_FILES, NAME_FIELD_LEN};

use crate::error::{read_sector, write_sector};
use crate::{BlockDev, Error, Result, MAX_NAME_LEN, SECTOR_SIZE};

pub type FileName = heapless::String<MAX_NAME_LEN>;

const USED_OFF:  usize = 0;
const NAME_OFF:  usize = 1;
const FIRST_OFF: usize = NAME_OFF + NAME_FIELD_LEN;
const SIZE_OFF:  usize = FIRST_OFF + 2;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub name:        FileName,
    pub first_block: u16,
    pub size:        u32,
}

impl DirEntry {
    fn encode(&self, raw: &mut [u8]) {
        raw.fill(0);
        raw[USED_OFF] = 1;
        raw[NAME_OFF..NAME_OFF + self.name.len()].copy_from_slice(self.name.as_bytes());
        raw[FIRST_OFF..FIRST_OFF + 2].copy_from_slice(&self.first_block.to_le_bytes());
        raw[SIZE_OFF..SIZE_OFF + 4].copy_from_slice(&self.size.to_le_bytes());
    }

    fn decode(raw: &[u8]) -> Result<Option<Self>> {
        match raw[USED_OFF] {
            0 => return Ok(None),
            1 => {}
            _ => return Err(Error::Corrupted),
        }
        let field = &raw[NAME_OFF..NAME_OFF + NAME_FIELD_LEN];
        let len = field.iter().position(|&b| b == 0).ok_or(Error::Corrupted)?;
        let name = core::str::from_utf8(&field[..len]).map_err(|_| Error::Corrupted)?;
        let name = FileName::try_from(name).map_err(|_| Error::Corrupted)?;
        if name.is_empty() { return Err(Error::Corrupted); }
        Ok(Some(DirEntry {
            name,
            first_block: u16::from_le_bytes([raw[FIRST_OFF], raw[FIRST_OFF + 1]]),
            size: u32::from_le_bytes([raw[SIZE_OFF], raw[SIZE_OFF + 1], raw[SIZE_OFF + 2], raw[SIZE_OFF + 3]]),
        }))
    }
}

/// Check a caller-supplied name and convert it to its stored form.
pub fn file_name(name: &str) -> Result<FileName> {
    if name.is_empty() || name.contains('\0') {
        return Err(Error::InvalidName);
    }
    FileName::try_from(name).map_err(|_| Error::NameTooLong)
}

pub struct Directory {
    slots: Vec<Option<DirEntry>>,
}

impl Directory {
    pub fn new() -> Self {
        Self { slots: (0..MAX_FILES).map(|_| None).collect() }
    }

    pub fn reset(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
    }

    /// Slot index of the used entry called `name`.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.as_ref().is_some_and(|e| e.name.as_str() == name))
    }

    pub fn get(&self, idx: usize) -> Option<&DirEntry> {
        self.slots.get(idx)?.as_ref()
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut DirEntry> {
        self.slots.get_mut(idx)?.as_mut()
    }

    pub fn has_free_slot(&self) -> bool {
        self.slots.iter().any(Option::is_none)
    }

    /// Place `entry` in the lowest unused slot.
    pub fn insert(&mut self, entry: DirEntry) -> Option<usize> {
        let idx = self.slots.iter().position(Option::is_none)?;
        self.slots[idx] = Some(entry);
        Some(idx)
    }

    pub fn clear(&mut self, idx: usize) -> Option<DirEntry> {
        self.slots.get_mut(idx)?.take()
    }

    /// Put `entry` back into slot `idx`, e.g. after a failed persist.
    pub fn restore(&mut self, idx: usize, entry: DirEntry) {
        if let Some(slot) = self.slots.get_mut(idx) {
            *slot = Some(entry);
        }
    }

    /// Used entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &DirEntry)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, s)| s.as_ref().map(|e| (i, e)))
    }

    // ─── Persistence ───────────────────────────────────────────────────────────

    pub fn load<D: BlockDev>(&mut self, disk: &mut D) -> Result<()> {
        let mut sec = [0u8; SECTOR_SIZE];
        read_sector(disk, DIR_SECTOR as u64, &mut sec)?;
        let mut slots = Vec::with_capacity(MAX_FILES);
        for raw in sec.chunks_exact(DIR_ENTRY_SIZE) {
            slots.push(DirEntry::decode(raw)?);
        }
        self.slots = slots;
        Ok(())
    }

    pub fn store<D: BlockDev>(&self, disk: &mut D) -> Result<()> {
        let mut sec = [0u8; SECTOR_SIZE];
        for (raw, slot) in sec.chunks_exact_mut(DIR_ENTRY_SIZE).zip(&self.slots) {
            if let Some(e) = slot { e.encode(raw); }
        }
        write_sector(disk, DIR_SECTOR as u64, &sec)
    }
}

impl Default for Directory {
    fn default() -> Self { Self::new() }
}

// ─── Unit tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemDisk;

    fn entry(name: &str, first_block: u16, size: u32) -> DirEntry {
        DirEntry { name: file_name(name).unwrap(), first_block, size }
    }

    // ── names ────────────────────────────────────────────────────────────────

    #[test]
    fn name_limit() {
        assert!(file_name("a23456789012345678901234").is_ok());
        assert_eq!(file_name("a234567890123456789012345"), Err(Error::NameTooLong));
    }

    #[test]
    fn empty_or_nul_name_rejected() {
        assert_eq!(file_name(""), Err(Error::InvalidName));
        assert_eq!(file_name("a\0b"), Err(Error::InvalidName));
    }

    // ── table ────────────────────────────────────────────────────────────────

    #[test]
    fn insert_uses_lowest_free_slot() {
        let mut dir = Directory::new();
        assert_eq!(dir.insert(entry("a", 33, 0)), Some(0));
        assert_eq!(dir.insert(entry("b", 34, 0)), Some(1));
        dir.clear(0);
        assert_eq!(dir.insert(entry("c", 35, 0)), Some(0));
        assert_eq!(dir.find("c"), Some(0));
        assert_eq!(dir.find("a"), None);
    }

    #[test]
    fn restore_refills_cleared_slot() {
        let mut dir = Directory::new();
        dir.insert(entry("a", 33, 0));
        dir.insert(entry("b", 34, 5));
        let b = dir.clear(1).unwrap();
        dir.restore(1, b);
        assert_eq!(dir.find("b"), Some(1));
        assert_eq!(dir.get(1).map(|e| e.size), Some(5));
    }

    #[test]
    fn full_directory() {
        let mut dir = Directory::new();
        for i in 0..MAX_FILES {
            let name = std::format!("f{i}");
            assert!(dir.insert(entry(&name, 33 + i as u16, 0)).is_some());
        }
        assert!(!dir.has_free_slot());
        assert_eq!(dir.insert(entry("extra", 200, 0)), None);
    }

    #[test]
    fn iter_is_slot_ordered() {
        let mut dir = Directory::new();
        dir.insert(entry("x", 33, 1));
        dir.insert(entry("y", 34, 2));
        dir.insert(entry("z", 35, 3));
        dir.clear(1);
        let names: std::vec::Vec<_> = dir.iter().map(|(i, e)| (i, e.name.as_str())).collect();
        assert_eq!(names, [(0, "x"), (2, "z")]);
    }

    #[test]
    fn names_are_case_sensitive() {
        let mut dir = Directory::new();
        dir.insert(entry("Readme", 33, 0));
        assert_eq!(dir.find("readme"), None);
        assert_eq!(dir.find("Readme"), Some(0));
    }

    // ── persistence ──────────────────────────────────────────────────────────

    #[test]
    fn store_layout() {
        let mut disk = MemDisk::new(40);
        let mut dir = Directory::new();
        dir.insert(entry("hello.txt", 0x1234, 0x0102_0304));
        dir.store(&mut disk).unwrap();
        let sec = disk.sector(DIR_SECTOR as u64);
        assert_eq!(sec[0], 1);
        assert_eq!(&sec[1..10], b"hello.txt");
        assert_eq!(sec[10], 0);
        assert_eq!(&sec[26..28], &[0x34, 0x12]);
        assert_eq!(&sec[28..32], &[0x04, 0x03, 0x02, 0x01]);
        assert!(sec[32..].iter().all(|&b| b == 0));
    }

    #[test]
    fn store_then_load() {
        let mut disk = MemDisk::new(40);
        let mut dir = Directory::new();
        dir.insert(entry("one", 33, 10));
        dir.insert(entry("two", 34, 4096));
        dir.clear(0);
        dir.store(&mut disk).unwrap();

        let mut loaded = Directory::new();
        loaded.load(&mut disk).unwrap();
        assert_eq!(loaded.get(0), None);
        assert_eq!(loaded.get(1), Some(&entry("two", 34, 4096)));
    }

    #[test]
    fn load_rejects_bad_used_flag() {
        let mut disk = MemDisk::new(40);
        let mut sec = [0u8; SECTOR_SIZE];
        sec[32] = 9;
        assert!(disk.write(DIR_SECTOR as u64, &sec));
        assert_eq!(Directory::new().load(&mut disk), Err(Error::Corrupted));
    }

    #[test]
    fn load_rejects_unterminated_name() {
        let mut disk = MemDisk::new(40);
        let mut sec = [0u8; SECTOR_SIZE];
        sec[0] = 1;
        sec[1..26].fill(b'a');
        assert!(disk.write(DIR_SECTOR as u64, &sec));
        assert_eq!(Directory::new().load(&mut disk), Err(Error::Corrupted));
    }
}
