//! Volume manager: owns the tables and keeps the device in step with them.

use alloc::vec;
use rsfs_api_types::FIRST_DATA_CLUSTER;

use crate::dir::{file_name, DirEntry, Directory, FileName};
use crate::fat::{Cluster, Fat};
use crate::handle::OpenFileTable;
use crate::{BlockDev, Error, Result, CLUSTER_SIZE};

/// One listed file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileInfo<'a> {
    pub name: &'a str,
    pub size: u32,
}

pub struct Volume<D> {
    pub(crate) disk:  D,
    pub(crate) fat:   Fat,
    pub(crate) dir:   Directory,
    pub(crate) files: OpenFileTable,
    mounted: bool,
}

impl<D: BlockDev> Volume<D> {
    /// Wrap a device. Nothing is read until `mount` or `format`.
    pub fn new(disk: D) -> Self {
        let fat = Fat::new(disk.capacity());
        Self { disk, fat, dir: Directory::new(), files: OpenFileTable::new(), mounted: false }
    }

    /// Load both tables from the device and drop every open handle.
    ///
    /// `NotFormatted` when the table region is not marked reserved; the
    /// volume then stays unmounted until `format` succeeds.
    pub fn mount(&mut self) -> Result<()> {
        self.unmount();

        let mut fat = Fat::new(self.disk.capacity());
        if let Err(e) = fat.load(&mut self.disk) {
            if e == Error::NotFormatted {
                log::warn!("rsfs: device is not formatted");
            }
            return Err(e);
        }
        let mut dir = Directory::new();
        dir.load(&mut self.disk)?;
        check_consistency(&fat, &dir)?;

        self.fat = fat;
        self.dir = dir;
        self.mounted = true;
        log::info!("rsfs: mounted, {} files, {} bytes free", self.dir.iter().count(), self.free_space());
        Ok(())
    }

    /// Lay down empty tables and persist them. Existing data is lost.
    pub fn format(&mut self) -> Result<()> {
        self.unmount();
        if self.fat.clusters() < FIRST_DATA_CLUSTER {
            log::error!("rsfs: {} sectors cannot hold the metadata region", self.disk.capacity());
            return Err(Error::NoSpace);
        }
        self.fat.reset();
        self.dir.reset();
        self.fat.store(&mut self.disk)?;
        self.dir.store(&mut self.disk)?;
        self.mounted = true;
        log::info!("rsfs: formatted {} clusters, {} bytes free", self.fat.clusters(), self.free_space());
        Ok(())
    }

    pub fn is_mounted(&self) -> bool { self.mounted }

    /// Free data clusters, in bytes. Zero while unmounted.
    pub fn free_space(&self) -> u64 {
        if !self.mounted { return 0; }
        self.fat.free_clusters() as u64 * CLUSTER_SIZE as u64
    }

    /// Device-backed clusters, metadata region included.
    pub fn capacity_clusters(&self) -> usize { self.fat.clusters() }

    /// Name and size of every file, in directory-slot order.
    ///
    /// Sizes of files open for writing are the ones recorded at their last
    /// close.
    pub fn list_files(&self) -> impl Iterator<Item = FileInfo<'_>> + '_ {
        let dir = self.mounted.then_some(&self.dir);
        dir.into_iter()
            .flat_map(|d| d.iter())
            .map(|(_, e)| FileInfo { name: e.name.as_str(), size: e.size })
    }

    pub fn file_size(&self, name: &str) -> Result<u32> {
        self.ensure_mounted()?;
        let idx = self.dir.find(name).ok_or(Error::NotFound)?;
        self.dir.get(idx).map(|e| e.size).ok_or(Error::NotFound)
    }

    /// Create an empty file. It owns one cluster from the start.
    pub fn create_file(&mut self, name: &str) -> Result<()> {
        self.ensure_mounted()?;
        let name = file_name(name)?;
        self.create_entry(name).map(|_| ())
    }

    /// Delete a file and free its whole chain. Open handles on it are released.
    ///
    /// If the directory cannot be persisted nothing changes. If only the
    /// table write fails the file is gone but its clusters stay allocated.
    pub fn remove_file(&mut self, name: &str) -> Result<()> {
        self.ensure_mounted()?;
        let idx = self.dir.find(name).ok_or(Error::NotFound)?;
        let first = self.dir.get(idx).map(|e| e.first_block).ok_or(Error::NotFound)?;

        let chain = self.fat.chain(first)?;
        self.fat.free_chain(first)?;
        let entry = self.dir.clear(idx).ok_or(Error::NotFound)?;

        // Directory first: a crash in between leaks clusters but never
        // leaves an entry pointing at free space.
        if let Err(e) = self.dir.store(&mut self.disk) {
            self.dir.restore(idx, entry);
            self.fat.relink(&chain);
            return Err(e);
        }
        let dropped = self.files.release_dir(idx);
        log::debug!("rsfs: removed {} ({} clusters, {} handles dropped)", name, chain.len(), dropped);

        if let Err(e) = self.fat.store(&mut self.disk) {
            self.fat.relink(&chain);
            return Err(e);
        }
        Ok(())
    }

    /// Number of open descriptors.
    pub fn open_count(&self) -> usize { self.files.open_count() }

    pub fn disk(&self) -> &D { &self.disk }

    /// Give the device back. Unflushed write handles are discarded.
    pub fn into_disk(self) -> D { self.disk }

    // ─── Internals ─────────────────────────────────────────────────────────────

    pub(crate) fn ensure_mounted(&self) -> Result<()> {
        if self.mounted { Ok(()) } else { Err(Error::NotFormatted) }
    }

    /// Allocate a slot and a first cluster for `name`, persist both tables,
    /// and return the slot index. On a failed persist both are released
    /// again in memory.
    pub(crate) fn create_entry(&mut self, name: FileName) -> Result<usize> {
        if self.dir.find(&name).is_some() {
            return Err(Error::AlreadyExists);
        }
        if !self.dir.has_free_slot() {
            return Err(Error::NoSpace);
        }
        let first_block = self.fat.alloc().ok_or(Error::NoSpace)?;
        log::debug!("rsfs: create {} at cluster {}", name, first_block);
        let idx = self.dir.insert(DirEntry { name, first_block, size: 0 }).ok_or(Error::NoSpace)?;

        let stored = self.fat.store(&mut self.disk).and_then(|_| self.dir.store(&mut self.disk));
        if let Err(e) = stored {
            self.dir.clear(idx);
            self.fat.set(first_block, Cluster::Free);
            return Err(e);
        }
        Ok(idx)
    }

    fn unmount(&mut self) {
        self.mounted = false;
        self.files.reset();
        self.fat = Fat::new(self.disk.capacity());
        self.dir.reset();
    }
}

/// Reject directory entries whose chain cannot be walked, cannot hold the
/// recorded size, or overlaps another chain, and names used twice.
fn check_consistency(fat: &Fat, dir: &Directory) -> Result<()> {
    let mut owned = vec![false; fat.clusters()];
    for (idx, e) in dir.iter() {
        if dir.find(&e.name) != Some(idx) {
            log::error!("rsfs: entry {} repeats the name {}", idx, e.name);
            return Err(Error::Corrupted);
        }
        let chain = fat.chain(e.first_block).inspect_err(|_| {
            log::error!("rsfs: entry {} ({}) has a broken chain", idx, e.name);
        })?;
        if e.size as u64 > (chain.len() * CLUSTER_SIZE) as u64 {
            log::error!("rsfs: entry {} ({}) is larger than its chain", idx, e.name);
            return Err(Error::Corrupted);
        }
        for c in chain {
            if core::mem::replace(&mut owned[c as usize], true) {
                log::error!("rsfs: cluster {} is shared by entry {} ({})", c, idx, e.name);
                return Err(Error::Corrupted);
            }
        }
    }
    Ok(())
}

// ─── Unit tests ────────────────────────────────────────────────────────────────
