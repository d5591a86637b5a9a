use rsfs_api_types::fs::FsResult;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("device I/O failed at sector {sector}")]
    Device { sector: u64 },
    #[error("volume is not formatted")]
    NotFormatted,
    #[error("file already exists")]
    AlreadyExists,
    #[error("file not found")]
    NotFound,
    #[error("file name is longer than {max} bytes", max = crate::MAX_NAME_LEN)]
    NameTooLong,
    #[error("file name is empty or contains NUL")]
    InvalidName,
    #[error("no free cluster or directory slot")]
    NoSpace,
    #[error("open file table is full")]
    TooManyOpenFiles,
    #[error("descriptor is not open in the required mode")]
    InvalidDescriptor,
    #[error("on-disk structures are inconsistent")]
    Corrupted,
}

pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    /// Numeric code for reporting the error across a message boundary.
    pub fn status(&self) -> FsResult {
        match self {
            Error::Device { .. }     => FsResult::IoError,
            Error::NotFormatted      => FsResult::NotFormatted,
            Error::AlreadyExists     => FsResult::AlreadyExists,
            Error::NotFound          => FsResult::NotFound,
            Error::NameTooLong       => FsResult::NameTooLong,
            Error::InvalidName       => FsResult::InvalidName,
            Error::NoSpace           => FsResult::NoSpace,
            Error::TooManyOpenFiles  => FsResult::TooManyOpenFiles,
            Error::InvalidDescriptor => FsResult::InvalidDescriptor,
            Error::Corrupted         => FsResult::Corrupted,
        }
    }
}

/// Read one sector, turning a device failure into `Error::Device`.
pub(crate) fn read_sector<D: crate::BlockDev>(
    disk: &mut D,
    sector: u64,
    buf: &mut [u8; crate::SECTOR_SIZE],
) -> Result<()> {
    if disk.read(sector, buf) {
        Ok(())
    } else {
        log::error!("rsfs: read failed at sector {}", sector);
        Err(Error::Device { sector })
    }
}

/// Write one sector, turning a device failure into `Error::Device`.
pub(crate) fn write_sector<D: crate::BlockDev>(
    disk: &mut D,
    sector: u64,
    buf: &[u8; crate::SECTOR_SIZE],
) -> Result<()> {
    if disk.write(sector, buf) {
        Ok(())
    } else {
        log::error!("rsfs: write failed at sector {}", sector);
        Err(Error::Device { sector })
    }
}
