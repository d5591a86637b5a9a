//! RSFS: a really simple single-volume file system.
//!
//! The volume sits directly on a sector-addressed block device. Sectors
//! `0..32` hold the allocation table, sector 32 holds the flat directory,
//! and every following sector is a data cluster with the same index.
//!
//! A [`Volume`] owns the allocation table, the directory and the open file
//! table. Every metadata mutation is written through to the device before the
//! call returns. Files are streamed: a read handle walks the cluster chain
//! forward, a write handle only appends, and there is no seek.
//!
//! No_std (with `alloc`) unless testing or built with the `std` feature.
#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

pub mod block_dev;
pub mod dir;
pub mod error;
pub mod fat;
pub mod handle;
mod stream;
pub mod volume;

pub use block_dev::{BlockDev, MemDisk};
#[cfg(feature = "std")]
pub use block_dev::FileDisk;
pub use error::{Error, Result};
pub use handle::Fd;
pub use rsfs_api_types::fs::{FsResult, OpenMode};
pub use rsfs_api_types::{CLUSTER_SIZE, MAX_FILES, MAX_NAME_LEN, MAX_OPEN_FILES, SECTOR_SIZE};
pub use volume::{FileInfo, Volume};

/// A volume behind one lock, for hosts that drive it from several threads.
///
/// The engine itself does no locking; every API call must run under the lock.
pub type SharedVolume<D> = spin::Mutex<Volume<D>>;
