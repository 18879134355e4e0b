//! Volume geometry and cluster arithmetic.
//!
//! The geometry is computed once from a validated boot sector and passed by reference to every
//! component that turns a cluster number into a byte position.

use getset::Getters;

use super::fat_error::FATError;

/// Legal values for the count of bytes per sector.
pub const VALID_BYTES_PER_SEC: [u16; 4] = [512, 1024, 2048, 4096];
/// Largest legal cluster size in bytes.
pub const MAX_CLUSTER_SIZE: u32 = 32 * 1024;

/// Immutable sector and cluster layout of one FAT volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Getters)]
pub struct Geometry {
    /// Number of bytes per sector (512, 1024, 2048, or 4096)
    #[get = "pub"]
    bytes_per_sec: u32,
    /// Number of sectors per cluster (power of 2)
    #[get = "pub"]
    sec_per_clus: u32,
    /// Size in bytes of the reserved area plus every FAT copy, relative to the volume start.
    /// This is where cluster 2 begins.
    #[get = "pub"]
    reserved_and_fats: u64,
    /// Absolute byte offset of the volume inside the image (0 for a single-partition image).
    #[get = "pub"]
    volume_start: u64,
}

impl Geometry {
    /// Builds a geometry after checking the sector and cluster size invariants.
    ///
    /// # Errors
    /// - `FATError::InvalidBytesPerSec`: bytes per sector is not 512, 1024, 2048 or 4096
    /// - `FATError::InvalidSecPerClus`: sectors per cluster is not a power of two
    /// - `FATError::InvalidClusSz`: the cluster size exceeds 32 KiB
    pub fn new(
        bytes_per_sec: u16,
        sec_per_clus: u8,
        reserved_and_fats: u64,
        volume_start: u64,
    ) -> Result<Self, FATError> {
        check_bytes_per_sec(bytes_per_sec)?;
        check_sec_per_clus(bytes_per_sec, sec_per_clus)?;

        Ok(Self {
            bytes_per_sec: bytes_per_sec.into(),
            sec_per_clus: sec_per_clus.into(),
            reserved_and_fats,
            volume_start,
        })
    }

    /// Size of a cluster in bytes.
    pub fn cluster_size(&self) -> u32 {
        self.bytes_per_sec * self.sec_per_clus
    }

    /// Converts a cluster number to its byte offset relative to the start of the volume.
    ///
    /// `(cluster - 2) * sectors_per_cluster * bytes_per_sector + reserved_and_fats`
    ///
    /// # Errors
    /// - `FATError::InvalidClusterError` for the reserved clusters 0 and 1.
    pub fn clus_to_offset(&self, cluster: u32) -> Result<u64, FATError> {
        let index = cluster
            .checked_sub(2)
            .ok_or(FATError::InvalidClusterError(cluster))?;

        Ok(index as u64 * self.cluster_size() as u64 + self.reserved_and_fats)
    }

    /// Converts a cluster number to its absolute byte offset inside the image.
    pub fn clus_to_disk_offset(&self, cluster: u32) -> Result<u64, FATError> {
        Ok(self.volume_start + self.clus_to_offset(cluster)?)
    }
}

/// Checks that the count of bytes per sector is one of the legal powers of two.
pub(super) fn check_bytes_per_sec(bytes_per_sec: u16) -> Result<(), FATError> {
    if !VALID_BYTES_PER_SEC.contains(&bytes_per_sec) {
        return Err(FATError::InvalidBytesPerSec(bytes_per_sec));
    }
    Ok(())
}

/// Checks that sectors per cluster is a power of two and the cluster fits in 32 KiB.
pub(super) fn check_sec_per_clus(bytes_per_sec: u16, sec_per_clus: u8) -> Result<(), FATError> {
    if !sec_per_clus.is_power_of_two() {
        return Err(FATError::InvalidSecPerClus(sec_per_clus));
    }

    let cluster_size = bytes_per_sec as u32 * sec_per_clus as u32;
    if cluster_size > MAX_CLUSTER_SIZE {
        return Err(FATError::InvalidClusSz(cluster_size));
    }
    Ok(())
}
