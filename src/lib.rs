//!
//! fat_slack: A read-only library and CLI for inspecting FAT disk images and finding hidden data.
//!
//! This crate provides tools for:
//! - Detecting the file system of an image and parsing its Master Boot Record (MBR)
//! - Decoding and classifying FAT12/16/32 boot sectors
//! - Comparing FAT copies and resolving cluster chains
//! - Walking the directory tree of a FAT32 volume
//! - Scanning file tails and partition gaps for non-zero slack bytes
//!
//! The image is never written to.
//!
//! # Re-exports
//! - [`Disk`]: Disk abstraction with partition and volume management
//! - [`FATVol`]: FAT volume abstraction
//! - [`FSKind`]: File systems an image can be identified as
//! - [`ScanOptions`]: Directory walk and slack scan options

pub mod args;
pub mod filesystem;
pub mod partition;
pub mod slack;
pub mod traits;
pub mod utils;

/// FAT volume abstraction (see [`filesystem::fat::FATVol`]).
pub use crate::filesystem::fat::FATVol;
/// Directory walk and slack scan options (see [`filesystem::walker::ScanOptions`]).
pub use crate::filesystem::walker::ScanOptions;
/// Disk abstraction with partition and volume management (see [`partition::disk::Disk`]).
pub use crate::partition::disk::Disk;
/// File systems an image can be identified as (see [`partition::signature::FSKind`]).
pub use crate::partition::signature::FSKind;
