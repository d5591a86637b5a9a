//! Allocation table.
//!
//! One 16-bit entry per cluster, 65536 entries, serialized little-endian into
//! sectors `0..FAT_SECTORS`. Small values are markers; anything at or above
//! `FIRST_DATA_CLUSTER` links to the next cluster of a chain. Reserved
//! clusters are below that bound, so the two ranges never collide.

use alloc::vec;
use alloc::vec::Vec;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use rsfs_api_types::{FAT_ENTRIES, FAT_ENTRY_SIZE, FAT_SECTORS, FIRST_DATA_CLUSTER, DIR_SECTOR};

use crate::error::{read_sector, write_sector};
use crate::{BlockDev, Error, Result, SECTOR_SIZE};

const ENTRIES_PER_SECTOR: usize = SECTOR_SIZE / FAT_ENTRY_SIZE;

/// State of one cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cluster {
    Free,
    ReservedForTable,
    ReservedForDirectory,
    EndOfChain,
    Next(u16),
}

#[repr(u16)]
#[derive(TryFromPrimitive, IntoPrimitive)]
enum Marker {
    Free       = 1,
    EndOfChain = 2,
    Table      = 3,
    Directory  = 4,
}

impl Cluster {
    pub fn encode(self) -> u16 {
        match self {
            Cluster::Free                 => Marker::Free.into(),
            Cluster::EndOfChain           => Marker::EndOfChain.into(),
            Cluster::ReservedForTable     => Marker::Table.into(),
            Cluster::ReservedForDirectory => Marker::Directory.into(),
            Cluster::Next(n)              => n,
        }
    }

    /// `None` for values that are neither a marker nor a data cluster.
    pub fn decode(raw: u16) -> Option<Self> {
        match Marker::try_from(raw) {
            Ok(Marker::Free)       => Some(Cluster::Free),
            Ok(Marker::EndOfChain) => Some(Cluster::EndOfChain),
            Ok(Marker::Table)      => Some(Cluster::ReservedForTable),
            Ok(Marker::Directory)  => Some(Cluster::ReservedForDirectory),
            Err(_) if raw as usize >= FIRST_DATA_CLUSTER => Some(Cluster::Next(raw)),
            Err(_) => None,
        }
    }
}

pub struct Fat {
    entries:  Vec<Cluster>,
    /// Clusters actually backed by the device; never above `FAT_ENTRIES`.
    clusters: usize,
}

impl Fat {
    /// An empty table for a device of `capacity` sectors. Not formatted until
    /// `reset` or `load` succeeds.
    pub fn new(capacity: u64) -> Self {
        Self {
            entries: vec![Cluster::Free; FAT_ENTRIES],
            clusters: capacity.min(FAT_ENTRIES as u64) as usize,
        }
    }

    /// Device-backed cluster count, reserved region included.
    pub fn clusters(&self) -> usize { self.clusters }

    /// Mark the reserved regions and free everything else.
    pub fn reset(&mut self) {
        for (i, e) in self.entries.iter_mut().enumerate() {
            *e = match i {
                i if i < FAT_SECTORS => Cluster::ReservedForTable,
                DIR_SECTOR           => Cluster::ReservedForDirectory,
                _                    => Cluster::Free,
            };
        }
    }

    pub fn get(&self, cluster: u16) -> Cluster {
        self.entries[cluster as usize]
    }

    pub fn set(&mut self, cluster: u16, value: Cluster) {
        self.entries[cluster as usize] = value;
    }

    pub fn is_data_cluster(&self, cluster: u16) -> bool {
        let c = cluster as usize;
        c >= FIRST_DATA_CLUSTER && c < self.clusters
    }

    pub fn free_clusters(&self) -> usize {
        self.data_range().filter(|&c| self.entries[c] == Cluster::Free).count()
    }

    /// Take the lowest free data cluster and mark it `EndOfChain`.
    pub fn alloc(&mut self) -> Option<u16> {
        let c = self.data_range().find(|&c| self.entries[c] == Cluster::Free)? as u16;
        self.set(c, Cluster::EndOfChain);
        Some(c)
    }

    /// Allocate a cluster and link it after `last`, which must end its chain.
    pub fn extend(&mut self, last: u16) -> Option<u16> {
        debug_assert_eq!(self.get(last), Cluster::EndOfChain);
        let next = self.alloc()?;
        self.set(last, Cluster::Next(next));
        Some(next)
    }

    /// Successor of `cluster` in its chain, `None` at the end.
    pub fn next(&self, cluster: u16) -> Result<Option<u16>> {
        match self.get(cluster) {
            Cluster::EndOfChain => Ok(None),
            Cluster::Next(n) if self.is_data_cluster(n) => Ok(Some(n)),
            _ => Err(Error::Corrupted),
        }
    }

    /// Every cluster of the chain starting at `first`, in order.
    ///
    /// Fails with `Corrupted` on a broken link or a walk longer than the
    /// volume (a cycle).
    pub fn chain(&self, first: u16) -> Result<Vec<u16>> {
        if !self.is_data_cluster(first) { return Err(Error::Corrupted); }
        let mut out = vec![first];
        let mut cur = first;
        while let Some(n) = self.next(cur)? {
            if out.len() >= self.clusters { return Err(Error::Corrupted); }
            out.push(n);
            cur = n;
        }
        Ok(out)
    }

    /// Return a whole chain to the free pool. Returns the number of clusters freed.
    /// Nothing is modified when the chain is broken.
    pub fn free_chain(&mut self, first: u16) -> Result<usize> {
        let chain = self.chain(first)?;
        for &c in &chain {
            self.set(c, Cluster::Free);
        }
        Ok(chain.len())
    }

    /// Re-link `chain` in order, ending it with `EndOfChain`. Undoes a
    /// `free_chain` whose result could not be persisted.
    pub fn relink(&mut self, chain: &[u16]) {
        for pair in chain.windows(2) {
            self.set(pair[0], Cluster::Next(pair[1]));
        }
        if let Some(&last) = chain.last() {
            self.set(last, Cluster::EndOfChain);
        }
    }

    /// Undo an `extend(last)` that returned `next`.
    pub fn unextend(&mut self, last: u16, next: u16) {
        self.set(next, Cluster::Free);
        self.set(last, Cluster::EndOfChain);
    }

    fn data_range(&self) -> core::ops::Range<usize> {
        FIRST_DATA_CLUSTER.min(self.clusters)..self.clusters
    }

    // ─── Persistence ───────────────────────────────────────────────────────────

    /// Load the table image. `NotFormatted` if the table region does not mark
    /// itself reserved, `Corrupted` on any other undecodable entry.
    pub fn load<D: BlockDev>(&mut self, disk: &mut D) -> Result<()> {
        let mut raw = vec![0u16; FAT_ENTRIES];
        let mut sec = [0u8; SECTOR_SIZE];
        for s in 0..FAT_SECTORS {
            read_sector(disk, s as u64, &mut sec)?;
            let base = s * ENTRIES_PER_SECTOR;
            for (i, pair) in sec.chunks_exact(FAT_ENTRY_SIZE).enumerate() {
                raw[base + i] = u16::from_le_bytes([pair[0], pair[1]]);
            }
            // The marker check only needs the first sector; fail before
            // reading the rest of a blank device.
            if s == 0 && !raw[..FAT_SECTORS].iter().all(|&v| v == Cluster::ReservedForTable.encode()) {
                return Err(Error::NotFormatted);
            }
        }

        let mut entries = Vec::with_capacity(FAT_ENTRIES);
        for &v in &raw {
            entries.push(Cluster::decode(v).ok_or(Error::Corrupted)?);
        }
        if entries[DIR_SECTOR] != Cluster::ReservedForDirectory {
            return Err(Error::Corrupted);
        }
        self.entries = entries;
        Ok(())
    }

    /// Write the whole table image.
    pub fn store<D: BlockDev>(&self, disk: &mut D) -> Result<()> {
        let mut sec = [0u8; SECTOR_SIZE];
        for s in 0..FAT_SECTORS {
            self.encode_sector(s, &mut sec);
            write_sector(disk, s as u64, &sec)?;
        }
        Ok(())
    }

    fn encode_sector(&self, s: usize, sec: &mut [u8; SECTOR_SIZE]) {
        let entries = &self.entries[s * ENTRIES_PER_SECTOR..(s + 1) * ENTRIES_PER_SECTOR];
        for (pair, e) in sec.chunks_exact_mut(FAT_ENTRY_SIZE).zip(entries) {
            pair.copy_from_slice(&e.encode().to_le_bytes());
        }
    }
}

// ─── Unit tests ────────────────────────────────────────────────────────────────
