//! Sequential file streams.
//!
//! A read handle walks its file's chain forward one cluster at a time. A
//! write handle starts from an empty file and only appends: a cluster is
//! written once, when its buffer fills (or at close for the last one), and a
//! new cluster is linked only when more bytes arrive. There is no seek.

use crate::dir::file_name;
use crate::error::{read_sector, write_sector};
use crate::handle::OpenFile;
use crate::{BlockDev, Error, Fd, OpenMode, Result, Volume, CLUSTER_SIZE};

impl<D: BlockDev> Volume<D> {
    /// Open `name` for reading, or for writing.
    ///
    /// Opening for writing always starts from an empty file: an existing file
    /// is removed and recreated under the same name, a missing one is created.
    pub fn open(&mut self, name: &str, mode: OpenMode) -> Result<Fd> {
        self.ensure_mounted()?;
        let fd = match mode {
            OpenMode::ReadOnly => {
                let idx = self.dir.find(name).ok_or(Error::NotFound)?;
                if !self.files.has_free_slot() {
                    return Err(Error::TooManyOpenFiles);
                }
                let first = self.dir.get(idx).map(|e| e.first_block).ok_or(Error::NotFound)?;
                let mut file = OpenFile::new(idx, mode, first);
                read_sector(&mut self.disk, first as u64, &mut *file.buf)?;
                self.files.insert(file)?
            }
            OpenMode::WriteOnly => {
                let stored = file_name(name)?;
                // Table full: fail before the old file is removed.
                if !self.files.has_free_slot() {
                    return Err(Error::TooManyOpenFiles);
                }
                if self.dir.find(name).is_some() {
                    self.remove_file(name)?;
                }
                let idx = self.create_entry(stored)?;
                let first = self.dir.get(idx).map(|e| e.first_block).ok_or(Error::Corrupted)?;
                self.files.insert(OpenFile::new(idx, mode, first))?
            }
        };
        log::debug!("rsfs: open {} {:?} -> fd {}", name, mode, fd.slot());
        Ok(fd)
    }

    /// Release `fd`. A write handle first flushes its last cluster and records
    /// the final size.
    ///
    /// The descriptor is released even when the flush fails; the size then
    /// covers only the bytes that reached the device, and the flush error is
    /// returned.
    pub fn close(&mut self, fd: Fd) -> Result<()> {
        let file = self.files.take(fd)?;
        if file.mode == OpenMode::ReadOnly {
            log::debug!("rsfs: close fd {}", fd.slot());
            return Ok(());
        }

        let flushed = if file.dirty {
            write_sector(&mut self.disk, file.current as u64, &*file.buf)
        } else {
            Ok(())
        };
        let size = match flushed {
            Ok(()) => file.cursor,
            Err(_) => file.cursor - file.buf_pos as u32,
        };

        let entry = self.dir.get_mut(file.dir_index).ok_or(Error::Corrupted)?;
        entry.size = size;
        log::debug!("rsfs: close fd {}, {} is {} bytes", fd.slot(), entry.name, size);
        let stored = self.dir.store(&mut self.disk);
        flushed.and(stored)
    }

    /// Copy up to `buf.len()` bytes from the file into `buf`, following the
    /// cluster chain as needed. Returns the number of bytes copied; 0 means
    /// end of file.
    pub fn read(&mut self, fd: Fd, buf: &mut [u8]) -> Result<usize> {
        let file = self.files.get_mut(fd, OpenMode::ReadOnly)?;
        let size = self.dir.get(file.dir_index).map(|e| e.size).ok_or(Error::InvalidDescriptor)?;

        let mut done = 0;
        while done < buf.len() {
            let remaining = size.saturating_sub(file.cursor) as usize;
            if remaining == 0 { break; }

            if file.buf_pos == CLUSTER_SIZE {
                let next = self.fat.next(file.current)?.ok_or(Error::Corrupted)?;
                read_sector(&mut self.disk, next as u64, &mut *file.buf)?;
                file.current = next;
                file.buf_pos = 0;
            }

            let n = (buf.len() - done).min(remaining).min(CLUSTER_SIZE - file.buf_pos);
            buf[done..done + n].copy_from_slice(&file.buf[file.buf_pos..file.buf_pos + n]);
            file.buf_pos += n;
            file.cursor += n as u32;
            done += n;
        }
        Ok(done)
    }

    /// Append `data` to the file. Returns the number of bytes accepted.
    ///
    /// On `NoSpace` the bytes accepted before the failure stay part of the
    /// file and count toward the size recorded at close. A cluster whose
    /// flush failed is written again by the next `write` (or by `close`)
    /// before anything else happens on the handle.
    pub fn write(&mut self, fd: Fd, data: &[u8]) -> Result<usize> {
        let file = self.files.get_mut(fd, OpenMode::WriteOnly)?;

        let mut done = 0;
        while done < data.len() {
            if file.buf_pos == CLUSTER_SIZE {
                // A full buffer still dirty here failed its flush last time.
                if file.dirty {
                    write_sector(&mut self.disk, file.current as u64, &*file.buf)?;
                    file.dirty = false;
                }
                let next = self.fat.extend(file.current).ok_or_else(|| {
                    log::warn!("rsfs: fd {} out of space after {} bytes", fd.slot(), file.cursor);
                    Error::NoSpace
                })?;
                if let Err(e) = self.fat.store(&mut self.disk) {
                    self.fat.unextend(file.current, next);
                    return Err(e);
                }
                log::debug!("rsfs: fd {} linked cluster {} -> {}", fd.slot(), file.current, next);
                file.current = next;
                file.buf_pos = 0;
            }

            let n = (data.len() - done).min(CLUSTER_SIZE - file.buf_pos);
            file.buf[file.buf_pos..file.buf_pos + n].copy_from_slice(&data[done..done + n]);
            file.buf_pos += n;
            file.cursor += n as u32;
            file.dirty = true;
            done += n;

            if file.buf_pos == CLUSTER_SIZE {
                write_sector(&mut self.disk, file.current as u64, &*file.buf)?;
                file.dirty = false;
            }
        }
        Ok(done)
    }
}

// ─── Unit tests ────────────────────────────────────────────────────────────────
