//! Error types for disk and partition operations.
//!
//! This module provides error handling for image-level operations: I/O errors,
//! boot signature verification, file system detection and partition decoding.

use std::io;
use thiserror;

use super::signature::FSKind;
use crate::filesystem::fat_error::FATError;

/// Represents errors that can occur while analyzing a disk image.
#[derive(thiserror::Error, Debug)]
pub enum DiskError {
    /// Wraps an I/O error that occurred during disk operations.
    #[error("I/O error: {0}")]
    Io(io::Error),
    /// Indicates that the boot signature is not valid.
    /// Contains the invalid signature value that was found.
    #[error("Invalid signature: 0x{0:04X}. Expected signature: 0x55AA")]
    InvalidSignature(u16),
    /// The file system found on the image is not the declared one.
    #[error("File system mismatch: declared `{declared}` but detected `{detected}`")]
    FSMismatch { declared: FSKind, detected: FSKind },
    /// The file system is recognized but cannot be analyzed.
    #[error("Unsupported file system: {0}")]
    UnsupportedFSType(String),
    /// Parsing error
    #[error("Parsing error: {0}")]
    ParsingError(String),
    /// Error raised while decoding the FAT volume of the image.
    #[error("{0}")]
    FATError(FATError),
}

/// Converts standard I/O errors into DiskError.
impl From<io::Error> for DiskError {
    fn from(err: io::Error) -> Self {
        DiskError::Io(err)
    }
}

/// Converts FAT volume errors into DiskError.
impl From<FATError> for DiskError {
    fn from(err: FATError) -> Self {
        DiskError::FATError(err)
    }
}
