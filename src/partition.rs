//! Image-level analysis: file system detection, MBR partition table and disk orchestration.

pub mod disk;
pub mod disk_error;
pub mod mbr;
pub mod signature;
