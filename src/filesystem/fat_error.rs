//! Error types for FAT volume decoding and traversal.
//!
//! This module defines errors that can occur while parsing and validating the boot sector,
//! loading the allocation tables and resolving cluster chains.

use std::io;
use thiserror::Error;

/// Errors that can occur on a FAT volume.
#[derive(Error, Debug)]
pub enum FATError {
    /// Bytes per sector must be 512, 1024, 2048 or 4096.
    /// This value represents the fundamental unit of data transfer for the filesystem.
    #[error("Invalid count of bytes per sector: `{0}`. Legal values: 512, 1024, 2048 or 4096")]
    InvalidBytesPerSec(u16),

    /// Sectors per cluster must be a power of 2: 1, 2, 4, 8, 16, 32, 64, or 128.
    #[error(
        "Invalid number of sector per cluster: `{0}`. Legal values: 1, 2, 4, 8, 16, 32, 64, 128"
    )]
    InvalidSecPerClus(u8),

    /// Total cluster size (bytes per sector × sectors per cluster) must not exceed 32 KiB.
    #[error("Invalid cluster size: `{0}`. Any value greater than 32K is invalid.")]
    InvalidClusSz(u32),

    /// At least one File Allocation Table is required.
    #[error("Invalid number of FATs on this volume: `{0}`.")]
    InvalidNumFat(u8),

    /// The requested operation is not available for this FAT type.
    #[error("Unsupported FAT type: `{0}`")]
    UnsupportedFATType(String),

    /// Clusters 0 and 1 are reserved and never address data.
    #[error("Invalid cluster number: `{0}`. Data clusters start at 2.")]
    InvalidClusterError(u32),

    /// The cluster lies beyond the end of the allocation table.
    #[error("Cluster `{0}` is outside of the allocation table")]
    ClusterOutOfRange(u32),

    /// A chain runs into a cluster marked as bad.
    #[error("Cluster chain reaches a bad cluster after cluster `{0}`")]
    BadCluster(u32),

    /// A chain runs into a free or reserved entry before its end-of-chain marker.
    #[error("Cluster chain is broken: cluster `{0}` points to a free or reserved entry")]
    FreeClusterInChain(u32),

    /// A chain revisits a cluster.
    #[error("Cluster chain loops back to cluster `{0}`")]
    ChainLoop(u32),

    /// The FAT copies described by the boot sector do not fit in the image.
    #[error("FAT copies end at byte {end} but the image is only {image_len} bytes long")]
    FatOutOfBounds { end: u64, image_len: u64 },

    /// The file was not found
    #[error("File not found")]
    FileNotFound,

    /// Underlying I/O errors that occur while reading the volume.
    #[error("IO Error: `{0}`")]
    IOError(io::Error),

    /// Parsing error occured during structure initialization
    #[error("BinRead Error: `{0}`")]
    BinReadError(binread::Error),
}

/// Converts standard I/O errors into FATError.
impl From<io::Error> for FATError {
    fn from(err: io::Error) -> Self {
        FATError::IOError(err)
    }
}

/// Converts BinRead errors into FATError.
impl From<binread::Error> for FATError {
    fn from(err: binread::Error) -> Self {
        FATError::BinReadError(err)
    }
}
