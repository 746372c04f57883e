//! Error taxonomy for RSTS pack access.  Most of the message texts are
//! taken straight from the analogous message text in RSTS itself; where
//! the analogy applies, an equivalent errno value is supplied for use at
//! the FUSE boundary.

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("Device hung or write locked")]
    Diskio,
    #[error("End of file on device")]
    Badblk,
    #[error("Illegal byte count for I/O")]
    Badbuf,
    #[error("Illegal cluster size")]
    Badclu,
    #[error("Illegal file name")]
    Badfn,
    #[error("Bad directory for device")]
    Badlnk,
    #[error("Illegal open mode")]
    Badmode,
    #[error("Illegal switch usage")]
    Badsw,
    #[error("Corrupted file structure")]
    Corrupt,
    #[error("Disk pack needs cleaning")]
    Dirty,
    #[error("Can't find file or account")]
    Nosuch,
    #[error("No room for user on device")]
    Noroom,
    #[error("Disk is read-only")]
    Ropack,
    #[error("Disk cannot be rebuilt")]
    Badpak,
    #[error("Not implemented")]
    Unimplemented,
    #[error("Program lost-Sorry")]
    Internal,
}

impl Error {
    /// The POSIX errno equivalent, for the FUSE adapter.
    pub fn errno(&self) -> i32 {
        match self {
            Error::Diskio => 5,         // EIO
            Error::Badblk => 5,         // EIO
            Error::Badbuf => 22,        // EINVAL
            Error::Badclu => 22,        // EINVAL
            Error::Badfn => 22,         // EINVAL
            Error::Badlnk => 6,         // ENXIO
            Error::Badmode => 22,       // EINVAL
            Error::Badsw => 22,         // EINVAL
            Error::Corrupt => 6,        // ENXIO
            Error::Dirty => 1,          // EPERM
            Error::Nosuch => 2,         // ENOENT
            Error::Noroom => 28,        // ENOSPC
            Error::Ropack => 30,        // EROFS
            Error::Badpak => 6,         // ENXIO
            Error::Unimplemented => 38, // ENOSYS
            Error::Internal => 14,      // EFAULT
        }
    }
}

pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_mapping() {
        assert_eq!(Error::Nosuch.errno(), 2);
        assert_eq!(Error::Noroom.errno(), 28);
        assert_eq!(Error::Ropack.errno(), 30);
        assert_eq!(Error::Internal.errno(), 14);
    }

    #[test]
    fn messages() {
        assert_eq!(Error::Nosuch.to_string(), "Can't find file or account");
        assert_eq!(Error::Internal.to_string(), "Program lost-Sorry");
    }
}
