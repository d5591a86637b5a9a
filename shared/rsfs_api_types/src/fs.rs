use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Access mode requested when opening a file.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
pub enum OpenMode {
    ReadOnly  = 0,
    WriteOnly = 1,
}

/// Result codes a filesystem front-end reports to its clients.
#[repr(u64)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
pub enum FsResult {
    Ok                = 0,
    NotFound          = 1,
    AlreadyExists     = 2,
    NameTooLong       = 3,
    NoSpace           = 4,
    IoError           = 5,
    NotFormatted      = 6,
    TooManyOpenFiles  = 7,
    InvalidDescriptor = 8,
    InvalidName       = 9,
    Corrupted         = 10,
}

impl FsResult {
    /// Unknown codes collapse to `IoError`.
    pub fn from_u64(v: u64) -> Self {
        Self::try_from(v).unwrap_or(FsResult::IoError)
    }
}
