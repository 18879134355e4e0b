//! FAT boot sector (BIOS Parameter Block) structure.
//!
//! This module implements:
//! - BIOS Parameter Block (Bpb) parsing and validation
//! - FAT type detection (FAT12/16/32)
//! - Decoding of the FAT32 extended fields when the volume is FAT32

use binread::{BinRead, BinReaderExt};
use getset::Getters;
use log::warn;
use std::fmt;
use std::io;
use thiserror::Error;

use super::fat_error::FATError;
use super::fat_type::FATType;
use super::geometry::{self, Geometry};
use crate::utils;

/// Size in bytes of the region holding every boot sector field.
pub const BOOT_SECTOR_SZ: usize = 512;
/// Value of the two bytes closing a boot sector, read big-endian.
pub const BOOT_SIGNATURE: u16 = 0x55AA;

/// Fields located right after the common Bpb on FAT12 and FAT16 volumes.
#[derive(BinRead, Debug, Clone, Getters)]
#[br(little)]
pub struct LegacyExt {
    /// Drive number (0x80 for hard disk)
    #[get = "pub"]
    drv_num: u8,
    /// Reserved (used by Windows NT)
    reserved_1: u8,
    /// Extended boot signature (0x29)
    #[get = "pub"]
    boot_sig: u8,
    /// Volume serial number
    #[get = "pub"]
    vol_id: u32,
    /// Volume label (11 bytes)
    vol_lab: [u8; 11],
    /// Filesystem type label ("FAT16   ")
    fil_sys_type: [u8; 8],
}

/// FAT32-specific fields, overlapping the legacy extension at offset 36.
#[derive(BinRead, Debug, Clone, Getters)]
#[br(little)]
pub struct Fat32Ext {
    /// Sectors per FAT
    #[get = "pub"]
    fat_sz_32: u32,
    /// FAT flags (mirroring, active FAT)
    #[get = "pub"]
    ext_flags: u16,
    /// Filesystem version (should be 0:0)
    #[get = "pub"]
    fs_ver: u16,
    /// First cluster of root directory (typically 2)
    #[get = "pub"]
    root_clus: u32,
    /// Sector number of FSINFO structure
    #[get = "pub"]
    fs_info: u16,
    /// Sector number of backup boot sector
    #[get = "pub"]
    bk_boot_sec: u16,
    /// Reserved for future expansion
    reserved: [u8; 12],
    /// Drive number (0x80 for hard disk)
    #[get = "pub"]
    drv_num: u8,
    /// Reserved (used by Windows NT)
    reserved_1: u8,
    /// Extended boot signature (0x29)
    #[get = "pub"]
    boot_sig: u8,
    /// Volume serial number
    #[get = "pub"]
    vol_id: u32,
    /// Volume label (11 bytes)
    vol_lab: [u8; 11],
    /// Filesystem type label ("FAT32   ")
    fil_sys_type: [u8; 8],
}

/// BIOS Parameter Block structure for FAT filesystems.
///
/// Offsets are relative to the first byte of the volume.
#[derive(BinRead, Debug, Clone, Getters)]
#[br(little)]
pub struct Bpb {
    /// Jump instruction to boot code
    #[get = "pub"]
    jmp: [u8; 3],
    /// OEM identifier (e.g., "MSWIN4.1")
    oem_name: [u8; 8],
    /// Number of bytes per sector (512, 1024, 2048, or 4096)
    #[get = "pub"]
    bytes_per_sec: u16,
    /// Number of sectors per cluster (power of 2: 1, 2, 4, 8, 16, 32, 64, or 128)
    #[get = "pub"]
    sec_per_clus: u8,
    /// Number of reserved sectors from start of volume
    #[get = "pub"]
    rsvd_sec_cnt: u16,
    /// Number of FAT copies (typically 2 for redundancy)
    #[get = "pub"]
    num_fat: u8,
    /// Maximum number of root directory entries (0 for FAT32)
    #[get = "pub"]
    root_ent_cnt: u16,
    /// Total sectors for volumes < 32MB (0 for FAT32)
    #[get = "pub"]
    tot_sec_16: u16,
    /// Media descriptor (0xF8 for fixed disk)
    #[get = "pub"]
    media: u8,
    /// Sectors per FAT for FAT12/FAT16 (0 for FAT32)
    #[get = "pub"]
    fat_sz_16: u16,
    /// Sectors per track
    #[get = "pub"]
    sec_per_trk: u16,
    /// Number of heads
    #[get = "pub"]
    num_heads: u16,
    /// Number of hidden sectors preceding the partition
    #[get = "pub"]
    hidd_sec: u32,
    /// Total sectors for volumes >= 32MB
    #[get = "pub"]
    tot_sec_32: u32,

    #[br(restore_position)]
    #[get = "pub"]
    legacy_ext: LegacyExt,
    fat32_ext: Fat32Ext,

    /// Boot code, outside of the Bpb fields
    #[br(count = 420)]
    boot_code: Vec<u8>,
    /// Boot sector signature (0x55 0xAA)
    sig: [u8; 2],
}

/// Media descriptor byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Fixed,
    Removable,
    Unknown(u8),
}

impl MediaType {
    fn from_byte(byte: u8) -> Self {
        match byte {
            0xF8 => MediaType::Fixed,
            0xF0 => MediaType::Removable,
            other => MediaType::Unknown(other),
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaType::Fixed => write!(f, "Fixed"),
            MediaType::Removable => write!(f, "Removable"),
            MediaType::Unknown(b) => write!(f, "Unknown (0x{b:02X})"),
        }
    }
}

/// Non-fatal inconsistencies found in a boot sector.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BpbWarning {
    /// The root directory has a fixed entry count but the 16-bit FAT size is zero.
    #[error(
        "Conflicting indicators for FAT12/16 and FAT32: {root_ent_cnt} root entries with a zero 16-bit FAT size"
    )]
    ConflictingFatIndicators { root_ent_cnt: u16 },

    /// The media descriptor is neither fixed (0xF8) nor removable (0xF0).
    #[error("Media type 0x{0:02X} could not be identified as removable or fixed")]
    UnknownMediaType(u8),

    /// Both sector count fields hold a value; the 32-bit one is used.
    #[error(
        "Conflicting sector counts: 16-bit field holds {tot_sec_16}, 32-bit field holds {tot_sec_32}. Using the 32-bit count"
    )]
    ConflictingSectorCounts { tot_sec_16: u16, tot_sec_32: u32 },

    /// The boot sector does not end with 0x55AA.
    #[error("Invalid boot sector signature: 0x{0:04X}. Expected signature: 0x55AA")]
    InvalidSignature(u16),
}

impl Bpb {
    /// Reads, validates and classifies the boot sector of the volume starting at `offset`.
    ///
    /// # Parameters
    /// - `reader`: The disk image
    /// - `offset`: Absolute byte offset of the volume (0 for a single-partition image)
    ///
    /// # Errors
    /// - `FATError::IOError` if reading from the image fails
    /// - Any validation error returned by [`Bpb::validate`]
    pub fn from<T: io::Read + io::Seek>(reader: &mut T, offset: u64) -> Result<Bpb, FATError> {
        let mut buf = vec![0; BOOT_SECTOR_SZ];
        utils::read_at(reader, offset, &mut buf)?;

        let bpb = Self::from_bytes(&buf)?.validate()?;
        for warning in bpb.warnings() {
            warn!("Boot sector at offset 0x{offset:X}: {warning}");
        }

        Ok(bpb)
    }

    /// Decodes the raw fields without validating them.
    pub fn from_bytes(buf: &[u8]) -> Result<Bpb, FATError> {
        let mut reader = io::Cursor::new(buf);
        reader.read_le().map_err(FATError::from)
    }

    /// Number of sectors occupied by the fixed FAT12/16 root directory.
    pub fn root_dir_sectors(&self) -> u32 {
        if self.bytes_per_sec == 0 {
            return 0;
        }
        (self.root_ent_cnt as u32 * 32).div_ceil(self.bytes_per_sec as u32)
    }

    /// Total number of sectors. The 32-bit field wins when both are populated.
    pub fn tot_sec(&self) -> u32 {
        if self.tot_sec_32 != 0 {
            self.tot_sec_32
        } else {
            self.tot_sec_16.into()
        }
    }

    /// Size of one FAT in sectors, read from the field matching the FAT type.
    pub fn fat_sz(&self) -> u32 {
        match self.fat_type() {
            FATType::FAT32 => self.fat32_ext.fat_sz_32,
            _ => self.fat_sz_16.into(),
        }
    }

    /// Determines the number of clusters in the data section.
    ///
    /// Only the 16-bit FAT size at offset 22 is subtracted, so a FAT32 volume (where that
    /// field is 0) is classified before its extended fields are trusted.
    /// Corrupted fields that would make the data region negative yield 0.
    pub fn cluster_count(&self) -> u32 {
        if self.sec_per_clus == 0 {
            return 0;
        }

        let meta_sec = self.rsvd_sec_cnt as u64
            + self.num_fat as u64 * self.fat_sz_16 as u64
            + self.root_dir_sectors() as u64;
        let data_sec = (self.tot_sec() as u64).saturating_sub(meta_sec);

        (data_sec / self.sec_per_clus as u64) as u32
    }

    /// Determines the FAT type based on the number of clusters in the filesystem.
    pub fn fat_type(&self) -> FATType {
        FATType::from_cluster_count(self.cluster_count())
    }

    /// The FAT32 extended fields, only present on a FAT32 volume.
    pub fn fat32_ext(&self) -> Option<&Fat32Ext> {
        match self.fat_type() {
            FATType::FAT32 => Some(&self.fat32_ext),
            _ => None,
        }
    }

    /// First cluster of the root directory (FAT32 only).
    pub fn root_clus(&self) -> Option<u32> {
        self.fat32_ext().map(|ext| ext.root_clus)
    }

    /// Byte offset of the data region relative to the volume start:
    /// reserved area + every FAT copy.
    pub fn reserved_and_fats(&self) -> u64 {
        let bps = self.bytes_per_sec as u64;
        self.rsvd_sec_cnt as u64 * bps + self.fat_sz() as u64 * bps * self.num_fat as u64
    }

    /// Builds the immutable geometry of the volume located at `volume_start`.
    pub fn geometry(&self, volume_start: u64) -> Result<Geometry, FATError> {
        Geometry::new(
            self.bytes_per_sec,
            self.sec_per_clus,
            self.reserved_and_fats(),
            volume_start,
        )
    }

    pub fn media_type(&self) -> MediaType {
        MediaType::from_byte(self.media)
    }

    pub fn oem_name(&self) -> String {
        utils::trimmed_label(&self.oem_name)
    }

    /// Volume serial number from the extension matching the FAT type.
    pub fn volume_serial(&self) -> u32 {
        match self.fat32_ext() {
            Some(ext) => ext.vol_id,
            None => self.legacy_ext.vol_id,
        }
    }

    /// Volume label from the extension matching the FAT type.
    pub fn volume_label(&self) -> String {
        match self.fat32_ext() {
            Some(ext) => utils::trimmed_label(&ext.vol_lab),
            None => utils::trimmed_label(&self.legacy_ext.vol_lab),
        }
    }

    /// File system type label from the extension matching the FAT type.
    pub fn fs_type_label(&self) -> String {
        match self.fat32_ext() {
            Some(ext) => utils::trimmed_label(&ext.fil_sys_type),
            None => utils::trimmed_label(&self.legacy_ext.fil_sys_type),
        }
    }

    /// Boot sector signature as read from the disk (0x55AA when valid).
    pub fn signature(&self) -> u16 {
        u16::from_be_bytes(self.sig)
    }

    /// Validates the fields every later computation depends on.
    ///
    /// # Returns
    /// - `Ok(Self)`: If all validation checks pass
    /// - `Err(FATError)`: If any validation check fails
    ///
    /// # Errors
    /// - `FATError::InvalidBytesPerSec`: If bytes per sector is not a valid value
    /// - `FATError::InvalidSecPerClus`: If sectors per cluster is not a power of two
    /// - `FATError::InvalidClusSz`: If cluster size exceeds 32 KiB
    /// - `FATError::InvalidNumFat`: If there is no FAT
    pub fn validate(self) -> Result<Self, FATError> {
        geometry::check_bytes_per_sec(self.bytes_per_sec)?;
        geometry::check_sec_per_clus(self.bytes_per_sec, self.sec_per_clus)?;

        if self.num_fat == 0 {
            return Err(FATError::InvalidNumFat(self.num_fat));
        }

        Ok(self)
    }

    /// Lists the non-fatal inconsistencies of the boot sector.
    pub fn warnings(&self) -> Vec<BpbWarning> {
        let mut warnings = vec![];

        if self.root_ent_cnt != 0 && self.fat_sz_16 == 0 {
            warnings.push(BpbWarning::ConflictingFatIndicators {
                root_ent_cnt: self.root_ent_cnt,
            });
        }

        if let MediaType::Unknown(byte) = self.media_type() {
            warnings.push(BpbWarning::UnknownMediaType(byte));
        }

        if self.tot_sec_16 != 0 && self.tot_sec_32 != 0 {
            warnings.push(BpbWarning::ConflictingSectorCounts {
                tot_sec_16: self.tot_sec_16,
                tot_sec_32: self.tot_sec_32,
            });
        }

        if self.signature() != BOOT_SIGNATURE {
            warnings.push(BpbWarning::InvalidSignature(self.signature()));
        }

        warnings
    }
}

/// Implements the Display trait for Bpb
impl fmt::Display for Bpb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        macro_rules! field {
            ($name:expr, $val:expr) => {
                writeln!(f, "  {:<38} {}", $name, $val)?
            };
        }

        writeln!(f, "FAT File System Information:")?;

        field!("File System Type", self.fat_type());
        field!("Media Type", self.media_type());
        field!("OEM Name", self.oem_name());
        field!("Volume Serial", format!("0x{:X}", self.volume_serial()));
        field!("Volume Label", self.volume_label());
        field!("File System Label", self.fs_type_label());
        field!("Bytes per sector", self.bytes_per_sec);
        field!("Sectors per cluster", self.sec_per_clus);
        field!("Size of Reserved Area (in sectors)", self.rsvd_sec_cnt);
        field!("Number of FATs", self.num_fat);
        field!("Number of sectors", self.tot_sec());
        field!("Sectors before start of partition", self.hidd_sec);
        field!("FAT size in sectors", self.fat_sz());

        match self.fat32_ext() {
            Some(ext) => {
                field!("Root Dir Cluster", ext.root_clus);
                field!("FSINFO sector", ext.fs_info);
                field!("Backup boot sector", ext.bk_boot_sec);
            }
            None => field!("Maximum number of files in Root Dir", self.root_ent_cnt),
        }

        Ok(())
    }
}
