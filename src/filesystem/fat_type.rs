//! Enum for the different FAT types (FAT12, FAT16, FAT32).
//!
//! This module defines the FATType enum, which is used to distinguish between FAT12, FAT16, and FAT32
//! filesystems based on the number of clusters in the data region.

use std::fmt;

/// Upper bound (exclusive) on the cluster count of a FAT12 volume.
pub const FAT12_MAX_CLUSTERS: u32 = 4085;
/// Upper bound (exclusive) on the cluster count of a FAT16 volume.
pub const FAT16_MAX_CLUSTERS: u32 = 65525;

/// Represents the different types of FAT filesystems.
///
/// # Values
/// - `FAT12`: 12-bit File Allocation Table entries
/// - `FAT16`: 16-bit File Allocation Table entries
/// - `FAT32`: 32-bit File Allocation Table entries (most common on large volumes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FATType {
    FAT12,
    FAT16,
    FAT32,
}

impl FATType {
    /// Classifies a volume from the number of clusters in its data region.
    ///
    /// - `FAT12` if cluster count < 4085
    /// - `FAT16` if 4085 <= cluster count < 65525
    /// - `FAT32` if cluster count >= 65525
    pub fn from_cluster_count(cluster_count: u32) -> Self {
        if cluster_count < FAT12_MAX_CLUSTERS {
            FATType::FAT12
        } else if cluster_count < FAT16_MAX_CLUSTERS {
            FATType::FAT16
        } else {
            FATType::FAT32
        }
    }
}

impl fmt::Display for FATType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FATType::FAT12 => "FAT12",
            FATType::FAT16 => "FAT16",
            FATType::FAT32 => "FAT32",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_boundaries() {
        assert_eq!(FATType::from_cluster_count(0), FATType::FAT12);
        assert_eq!(FATType::from_cluster_count(4084), FATType::FAT12);
        assert_eq!(FATType::from_cluster_count(4085), FATType::FAT16);
        assert_eq!(FATType::from_cluster_count(65524), FATType::FAT16);
        assert_eq!(FATType::from_cluster_count(65525), FATType::FAT32);
        assert_eq!(FATType::from_cluster_count(u32::MAX), FATType::FAT32);
    }
}
