#![no_std]

#[cfg(test)]
extern crate std;

pub mod fs;

// ─── Volume geometry ───────────────────────────────────────────────────────────

/// Bytes per device sector. One cluster is exactly one sector.
pub const SECTOR_SIZE:  usize = 4096;
pub const CLUSTER_SIZE: usize = SECTOR_SIZE;

/// Number of allocation-table entries (the whole 16-bit cluster space).
pub const FAT_ENTRIES: usize = 65536;
/// Width of one serialized allocation-table entry.
pub const FAT_ENTRY_SIZE: usize = 2;
/// Sectors `0..FAT_SECTORS` hold the allocation-table image.
pub const FAT_SECTORS: usize = FAT_ENTRIES * FAT_ENTRY_SIZE / SECTOR_SIZE;

/// The directory image lives in the single sector after the table.
pub const DIR_SECTOR: usize = FAT_SECTORS;
pub const DIR_SECTORS: usize = 1;

/// First cluster that may ever hold file data.
pub const FIRST_DATA_CLUSTER: usize = DIR_SECTOR + DIR_SECTORS;

pub const MAX_FILES:      usize = 128;
pub const MAX_OPEN_FILES: usize = 128;

/// Width of one serialized directory entry.
pub const DIR_ENTRY_SIZE: usize = 32;
/// On-disk name field, NUL terminated, so one byte is lost to the terminator.
pub const NAME_FIELD_LEN: usize = 25;
pub const MAX_NAME_LEN:   usize = NAME_FIELD_LEN - 1;

const _: () = assert!(MAX_FILES * DIR_ENTRY_SIZE == DIR_SECTORS * SECTOR_SIZE);
const _: () = assert!(FAT_SECTORS == 32);
