//! Open file table.
//!
//! A descriptor names a slot and the slot's generation. Slots are reused
//! lowest-first once released; the generation tells the old descriptor apart
//! from the new one.

use alloc::boxed::Box;
use alloc::vec::Vec;
use rsfs_api_types::MAX_OPEN_FILES;

use crate::{Error, OpenMode, Result, CLUSTER_SIZE};

/// Descriptor of an open file.
///
/// A slot index plus the generation the slot had when the descriptor was
/// issued. Releasing a slot bumps its generation, so a descriptor outlives
/// neither a `close` nor the removal of its file, even once the slot is reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Fd {
    slot:       usize,
    generation: u32,
}

impl Fd {
    /// Decode the wire form produced by [`Fd::raw`]: generation in the high
    /// 32 bits, slot in the low 32.
    pub fn from_raw(raw: u64) -> Self {
        Fd { slot: (raw & 0xFFFF_FFFF) as usize, generation: (raw >> 32) as u32 }
    }

    pub fn raw(self) -> u64 {
        (self.generation as u64) << 32 | self.slot as u64
    }

    /// Open-table slot, which is reused once the descriptor is released.
    pub fn slot(self) -> usize { self.slot }
}

/// Transient state of one open file.
pub(crate) struct OpenFile {
    /// Directory slot of the file.
    pub dir_index: usize,
    pub mode:      OpenMode,
    /// Cluster whose contents `buf` mirrors.
    pub current:   u16,
    pub buf:       Box<[u8; CLUSTER_SIZE]>,
    /// Reading: next byte of `buf` to hand out. Writing: bytes of `buf` filled.
    pub buf_pos:   usize,
    /// Writing: `buf` holds bytes not yet on the device.
    pub dirty:     bool,
    /// Bytes moved since open. Never decreases.
    pub cursor:    u32,
}

impl OpenFile {
    pub fn new(dir_index: usize, mode: OpenMode, first_block: u16) -> Self {
        Self {
            dir_index,
            mode,
            current: first_block,
            buf: Box::new([0u8; CLUSTER_SIZE]),
            buf_pos: 0,
            dirty: false,
            cursor: 0,
        }
    }
}

struct Slot {
    generation: u32,
    file:       Option<OpenFile>,
}

impl Slot {
    fn release(&mut self) -> Option<OpenFile> {
        let file = self.file.take();
        if file.is_some() {
            self.generation = self.generation.wrapping_add(1);
        }
        file
    }
}

pub(crate) struct OpenFileTable {
    slots: Vec<Slot>,
}

impl OpenFileTable {
    pub fn new() -> Self {
        Self { slots: (0..MAX_OPEN_FILES).map(|_| Slot { generation: 0, file: None }).collect() }
    }

    /// Drop every handle without flushing.
    pub fn reset(&mut self) {
        self.slots.iter_mut().for_each(|s| { s.release(); });
    }

    pub fn has_free_slot(&self) -> bool {
        self.slots.iter().any(|s| s.file.is_none())
    }

    pub fn insert(&mut self, file: OpenFile) -> Result<Fd> {
        let idx = self.slots.iter().position(|s| s.file.is_none()).ok_or(Error::TooManyOpenFiles)?;
        let slot = &mut self.slots[idx];
        slot.file = Some(file);
        Ok(Fd { slot: idx, generation: slot.generation })
    }

    /// The handle behind `fd`, which must be open in `mode`.
    pub fn get_mut(&mut self, fd: Fd, mode: OpenMode) -> Result<&mut OpenFile> {
        match self.live(fd)?.file.as_mut() {
            Some(f) if f.mode == mode => Ok(f),
            _ => Err(Error::InvalidDescriptor),
        }
    }

    /// Release `fd`, handing back its state.
    pub fn take(&mut self, fd: Fd) -> Result<OpenFile> {
        self.live(fd)?.release().ok_or(Error::InvalidDescriptor)
    }

    /// Release every handle on directory slot `dir_index`. Returns how many.
    pub fn release_dir(&mut self, dir_index: usize) -> usize {
        let mut n = 0;
        for slot in &mut self.slots {
            if slot.file.as_ref().is_some_and(|f| f.dir_index == dir_index) {
                slot.release();
                n += 1;
            }
        }
        n
    }

    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|s| s.file.is_some()).count()
    }

    fn live(&mut self, fd: Fd) -> Result<&mut Slot> {
        match self.slots.get_mut(fd.slot) {
            Some(s) if s.generation == fd.generation && s.file.is_some() => Ok(s),
            _ => Err(Error::InvalidDescriptor),
        }
    }
}

// ─── Unit tests ────────────────────────────────────────────────────────────────
