//! File system detection from the first sector of an image.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::disk_error::DiskError;
use crate::filesystem::fat_type::FATType;

/// Offset of the two-byte boot signature.
pub const SIG_OFFSET: usize = 0x1FE;

/// File systems the first sector of an image can be identified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FSKind {
    FAT12,
    FAT16,
    FAT32,
    NTFS,
    /// A whole disk starting with a partition table.
    Raw,
}

/// The text does not name a known file system.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown file system `{0}`. Legal values: fat12, fat16, fat32, ntfs, raw")]
pub struct ParseFSKindError(String);

impl FromStr for FSKind {
    type Err = ParseFSKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fat12" => Ok(FSKind::FAT12),
            "fat16" => Ok(FSKind::FAT16),
            "fat32" => Ok(FSKind::FAT32),
            "ntfs" => Ok(FSKind::NTFS),
            "raw" => Ok(FSKind::Raw),
            _ => Err(ParseFSKindError(s.to_string())),
        }
    }
}

impl fmt::Display for FSKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FSKind::FAT12 => "fat12",
            FSKind::FAT16 => "fat16",
            FSKind::FAT32 => "fat32",
            FSKind::NTFS => "ntfs",
            FSKind::Raw => "raw",
        };
        write!(f, "{s}")
    }
}

impl From<FATType> for FSKind {
    fn from(fat_type: FATType) -> Self {
        match fat_type {
            FATType::FAT12 => FSKind::FAT12,
            FATType::FAT16 => FSKind::FAT16,
            FATType::FAT32 => FSKind::FAT32,
        }
    }
}

impl FSKind {
    /// Identifies the file system from the jump instruction at offset 0.
    ///
    /// Anything that is not a known boot sector jump is taken as a raw disk.
    pub fn detect(sector: &[u8]) -> Self {
        match sector.get(0..3) {
            Some([0xEB, 0x52, 0x90]) => FSKind::NTFS,
            Some([0xEB, 0x58, 0x90]) => FSKind::FAT32,
            Some([0xEB, 0x3C, 0x90]) => FSKind::FAT16,
            Some([0xEB, 0x3F, 0x90]) => FSKind::FAT12,
            _ => FSKind::Raw,
        }
    }

    /// Checks that the detected file system is the declared one.
    ///
    /// # Errors
    /// `DiskError::FSMismatch` when they differ.
    pub fn check_declared(self, detected: FSKind) -> Result<FSKind, DiskError> {
        if self != detected {
            return Err(DiskError::FSMismatch {
                declared: self,
                detected,
            });
        }
        Ok(detected)
    }
}

/// Checks the 0x55AA signature closing the first sector.
///
/// # Errors
/// `DiskError::InvalidSignature` with the value found.
pub fn check_boot_signature(sector: &[u8]) -> Result<(), DiskError> {
    let sig = match sector.get(SIG_OFFSET..SIG_OFFSET + 2) {
        Some(bytes) => u16::from_be_bytes([bytes[0], bytes[1]]),
        None => 0,
    };

    if sig != 0x55AA {
        return Err(DiskError::InvalidSignature(sig));
    }
    Ok(())
}
