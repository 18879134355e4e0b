//! This module provides functionality for parsing and handling the partition table
//! of a Master Boot Record (MBR).
//!
//! It defines structures and methods to interpret partition table entries,
//! validate the partition table, and extract relevant metadata from disk images.
use getset::Getters;
use log::{info, warn};
use std::fmt::Write;
use std::fmt::{self, Display};
use std::io;

use super::disk_error::DiskError;
use crate::traits::LayoutDisplay;
use crate::utils;

/// The number of primary partitions supported by MBR.
pub const PART_CNT: usize = 4;
/// Size of the MBR sector; partition LBAs are expressed in this unit.
pub const MBR_SECTOR_SZ: usize = 512;
/// Offset of the first partition table entry.
const PT_OFFSET: usize = 0x1BE;
const PT_ENTRY_SZ: usize = 16;

/// Represents the type of a partition table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PTType {
    Empty,
    FAT12,
    FAT16Chs,
    FAT16BChs,
    FAT16Lba,
    FAT32Chs,
    FAT32Lba,
    ExtendedChs,
    ExtendedLba,
    ExtendedLinux,
    NTFS,
    HiddenNTFS,
    HiddenFAT16(u8),
    HiddenFAT32(u8),
    LinuxSwap,
    Linux,
    /// Any other type, encapsulating the raw type byte.
    Other(u8),
}

impl Display for PTType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PTType::Empty => write!(f, "EMPTY"),
            PTType::FAT12 => write!(f, "FAT12"),
            PTType::FAT16Chs => write!(f, "FAT16 (CHS)"),
            PTType::FAT16BChs => write!(f, "FAT16B (CHS)"),
            PTType::FAT16Lba => write!(f, "FAT16 (LBA)"),
            PTType::FAT32Chs => write!(f, "FAT32 (CHS)"),
            PTType::FAT32Lba => write!(f, "FAT32 (LBA)"),
            PTType::ExtendedChs => write!(f, "EXTENDED (CHS)"),
            PTType::ExtendedLba => write!(f, "EXTENDED (LBA)"),
            PTType::ExtendedLinux => write!(f, "EXTENDED (Linux)"),
            PTType::NTFS => write!(f, "NTFS"),
            PTType::HiddenNTFS => write!(f, "Hidden NTFS"),
            PTType::HiddenFAT16(_) => write!(f, "Hidden FAT16"),
            PTType::HiddenFAT32(_) => write!(f, "Hidden FAT32"),
            PTType::LinuxSwap => write!(f, "Linux Swap"),
            PTType::Linux => write!(f, "Linux"),
            PTType::Other(_) => write!(f, "????"),
        }
    }
}

impl PTType {
    /// Creates a `PTType` instance from a raw byte.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => PTType::Empty,
            0x01 => PTType::FAT12,
            0x04 => PTType::FAT16Chs,
            0x05 => PTType::ExtendedChs,
            0x06 => PTType::FAT16BChs,
            0x07 => PTType::NTFS,
            0x0B => PTType::FAT32Chs,
            0x0C => PTType::FAT32Lba,
            0x0E => PTType::FAT16Lba,
            0x0F => PTType::ExtendedLba,
            0x11 => PTType::HiddenNTFS,
            0x14 | 0x16 | 0x1E => PTType::HiddenFAT16(byte),
            0x1B | 0x1C => PTType::HiddenFAT32(byte),
            0x82 => PTType::LinuxSwap,
            0x83 => PTType::Linux,
            0x85 => PTType::ExtendedLinux,
            other => PTType::Other(other),
        }
    }

    /// The raw type byte.
    pub fn code(&self) -> u8 {
        match self {
            PTType::Empty => 0x00,
            PTType::FAT12 => 0x01,
            PTType::FAT16Chs => 0x04,
            PTType::ExtendedChs => 0x05,
            PTType::FAT16BChs => 0x06,
            PTType::NTFS => 0x07,
            PTType::FAT32Chs => 0x0B,
            PTType::FAT32Lba => 0x0C,
            PTType::FAT16Lba => 0x0E,
            PTType::ExtendedLba => 0x0F,
            PTType::HiddenNTFS => 0x11,
            PTType::HiddenFAT16(b) | PTType::HiddenFAT32(b) | PTType::Other(b) => *b,
            PTType::LinuxSwap => 0x82,
            PTType::Linux => 0x83,
            PTType::ExtendedLinux => 0x85,
        }
    }

    /// Partition types holding a FAT volume, hidden ones included.
    pub fn is_fat(&self) -> bool {
        matches!(
            self,
            PTType::FAT12
                | PTType::FAT16Chs
                | PTType::FAT16BChs
                | PTType::FAT16Lba
                | PTType::FAT32Chs
                | PTType::FAT32Lba
                | PTType::HiddenFAT16(_)
                | PTType::HiddenFAT32(_)
        )
    }

    pub fn is_extended(&self) -> bool {
        matches!(
            self,
            PTType::ExtendedChs | PTType::ExtendedLba | PTType::ExtendedLinux
        )
    }
}

/// Represents a single partition table entry.
#[derive(Debug, Clone, Getters)]
pub struct PTEntry {
    /// Position of the entry in the table, from 1 to 4.
    #[get = "pub"]
    slot: u8,
    /// Boot indicator (0x80 = active).
    #[get = "pub"]
    bootable: bool,
    /// The type of the partition.
    #[get = "pub"]
    pt_type: PTType,
    /// The starting Logical Block Address (LBA) of the partition.
    #[get = "pub"]
    lba_start: u32,
    /// The number of sectors in the partition.
    #[get = "pub"]
    sector_cnt: u32,
}

impl PTEntry {
    fn from_bytes(slot: u8, raw: &[u8]) -> Self {
        PTEntry {
            slot,
            bootable: utils::u8_at(raw, 0x00) == 0x80,
            pt_type: PTType::from_byte(utils::u8_at(raw, 0x04)),
            lba_start: utils::u32_at(raw, 0x08),
            sector_cnt: utils::u32_at(raw, 0x0C),
        }
    }

    /// Absolute byte offset of the first sector.
    pub fn start_byte(&self) -> u64 {
        self.lba_start as u64 * MBR_SECTOR_SZ as u64
    }

    /// Absolute byte offset right after the last sector.
    pub fn end_byte(&self) -> u64 {
        self.start_byte() + self.sector_cnt as u64 * MBR_SECTOR_SZ as u64
    }

    /// Last sector of the partition (inclusive).
    pub fn end_sector(&self) -> u64 {
        (self.lba_start as u64 + self.sector_cnt as u64).saturating_sub(1)
    }

    pub fn is_extended(&self) -> bool {
        self.pt_type.is_extended()
    }

    pub fn is_fat(&self) -> bool {
        self.pt_type.is_fat()
    }
}

/// Represents the boot signature of a Master Boot Record (MBR).
#[derive(Debug)]
enum BootSignature {
    /// Standard MBR boot signature (0x55AA).
    Mbr(u16),
    /// Unsupported boot signature, encapsulating the raw value.
    Unsupported(u16),
}

impl BootSignature {
    /// Creates a `BootSignature` instance from the two bytes at offset 0x1FE.
    pub fn from_bytes(bytes: [u8; 2]) -> BootSignature {
        match u16::from_be_bytes(bytes) {
            0x55AA => BootSignature::Mbr(0x55AA),
            other => BootSignature::Unsupported(other),
        }
    }
}

/// Implements the trait Display for BootSignature by displaying its hex value.
impl fmt::Display for BootSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootSignature::Mbr(sig) => write!(f, "0x{:04X}", sig),
            BootSignature::Unsupported(sig) => write!(f, "0x{:04X}", sig),
        }
    }
}

/// Represents a Master Boot Record (MBR), including partition table entries
/// and the boot signature.
#[derive(Debug)]
pub struct Mbr {
    /// The partition table entries in the MBR.
    pt_entries: [PTEntry; PART_CNT],
    /// The boot signature of the MBR.
    boot_signature: BootSignature,
    /// Size of the image in 512-byte sectors.
    sector_cnt: u64,
}

impl Mbr {
    /// Reads and parses the MBR of an image.
    ///
    /// # Errors
    /// - `DiskError::Io` if the first sector cannot be read
    /// - `DiskError::InvalidSignature` if the signature is not 0x55AA
    pub fn from<T: io::Read + io::Seek>(reader: &mut T) -> Result<Mbr, DiskError> {
        let image_len = utils::stream_len(reader)?;
        let mut buffer = vec![];
        utils::read_sector(reader, 0, MBR_SECTOR_SZ, &mut buffer)?;

        Self::from_bytes(&buffer, image_len)
    }

    /// Parses an MBR from the first sector of an image of `image_len` bytes.
    ///
    /// # Errors
    /// - `DiskError::ParsingError` if `buffer` is shorter than a sector
    /// - `DiskError::InvalidSignature` if the signature is not 0x55AA
    pub fn from_bytes(buffer: &[u8], image_len: u64) -> Result<Mbr, DiskError> {
        if buffer.len() < MBR_SECTOR_SZ {
            return Err(DiskError::ParsingError(format!(
                "MBR sector holds {} bytes, expected {MBR_SECTOR_SZ}",
                buffer.len()
            )));
        }

        let pt_entries: [PTEntry; PART_CNT] = core::array::from_fn(|i| {
            let offset = PT_OFFSET + i * PT_ENTRY_SZ;
            PTEntry::from_bytes(i as u8 + 1, &buffer[offset..offset + PT_ENTRY_SZ])
        });

        let mbr = Mbr {
            pt_entries,
            boot_signature: BootSignature::from_bytes([buffer[510], buffer[511]]),
            sector_cnt: image_len / MBR_SECTOR_SZ as u64,
        };

        mbr.validate()
    }

    /// Returns a vector of references to non-empty partition table entries.
    ///
    /// This method filters the partition table entries to exclude any entries
    /// with a sector count of zero or an empty type, as these entries are considered unused.
    pub fn pt_entries(&self) -> Vec<&PTEntry> {
        self.pt_entries
            .iter()
            .filter(|entry| entry.sector_cnt != 0 && entry.pt_type != PTType::Empty)
            .collect()
    }

    /// Size of the image in 512-byte sectors.
    pub fn sector_cnt(&self) -> u64 {
        self.sector_cnt
    }

    /// Validates the MBR by checking the boot signature, then reports a partition table
    /// that is unsorted, overlapping or extended.
    fn validate(self) -> Result<Self, DiskError> {
        let mbr = self.check_signature()?;

        mbr.check_partition_table_sorted();
        mbr.check_partitions_non_overlapping();
        mbr.check_extended_partitions();

        Ok(mbr)
    }

    /// Checks if the boot signature is valid.
    ///
    /// # Errors
    /// `DiskError::InvalidSignature` if the boot signature is unsupported.
    fn check_signature(self) -> Result<Self, DiskError> {
        match self.boot_signature {
            BootSignature::Unsupported(sig) => Err(DiskError::InvalidSignature(sig)),
            _ => Ok(self),
        }
    }

    fn check_partition_table_sorted(&self) {
        if !self
            .pt_entries()
            .windows(2)
            .all(|pair| pair[0].lba_start <= pair[1].lba_start)
        {
            info!("Partition table entries are not sorted by start sector");
        }
    }

    /// Warns about every pair of overlapping partitions.
    fn check_partitions_non_overlapping(&self) {
        let entries = self.pt_entries();

        for (i, a) in entries.iter().enumerate() {
            for b in entries.iter().skip(i + 1) {
                if a.start_byte() < b.end_byte() && b.start_byte() < a.end_byte() {
                    warn!("Partitions #{} and #{} are overlapping", a.slot, b.slot);
                }
            }
        }
    }

    fn check_extended_partitions(&self) {
        for entry in self.pt_entries().iter().filter(|e| e.is_extended()) {
            info!(
                "Partition #{} is an extended partition ({}); logical partitions are not traversed",
                entry.slot, entry.pt_type
            );
        }
    }
}

/// Prints the partition table of the Master Boot Record (MBR).
///
/// Every non-empty entry is listed with its boot flag, start and end sectors, size and type.
/// Unallocated ranges between partitions are listed as well.
impl LayoutDisplay for Mbr {
    fn display_layout(&self, indent: u8) -> Result<String, fmt::Error> {
        let mut out = String::from("");
        let indent = " ".repeat(indent.into());

        let mut last_end = 1;
        let disk_end = self.sector_cnt;

        writeln!(out, "{}┌{:─^77}┐", indent, " Master Boot Record Layout ")?;
        writeln!(out, "{}├{:<67}{:>10}┤", indent, "Disk Size (sectors)", disk_end)?;
        writeln!(
            out,
            "{}├{:<67}{:>10}┤",
            indent,
            "Boot Signature",
            self.boot_signature.to_string()
        )?;
        writeln!(out, "{}├{:─^77}┤", indent, "")?;

        writeln!(
            out,
            "{}├{:^8}┬{:^6}┬{:^12}┬{:^12}┬{:^12}┬{:^6}┬{:^16}┤",
            indent, "Entry", "Boot", "Start", "End", "Sectors", "Type", "Description"
        )?;
        writeln!(
            out,
            "{}├{:─<8}┼{:─<6}┼{:─<12}┼{:─<12}┼{:─<12}┼{:─<6}┼{:─<16}┤",
            indent, "", "", "", "", "", "", ""
        )?;

        let mut entries = self.pt_entries();
        entries.sort_by_key(|entry| entry.lba_start);

        for entry in entries {
            let start = u64::from(entry.lba_start);

            if start > last_end {
                writeln!(
                    out,
                    "{}│{:^8}│{:^6}│{:>12}│{:>12}│{:>12}│{:^6}│{:^16}│",
                    indent,
                    "",
                    "",
                    last_end,
                    start - 1,
                    start - last_end,
                    "",
                    "Unallocated"
                )?;
            }

            writeln!(
                out,
                "{}│{:^8}│{:^6}│{:>12}│{:>12}│{:>12}│{:^6}│{:^16}│",
                indent,
                format!("#{}", entry.slot),
                if entry.bootable { "*" } else { "" },
                start,
                entry.end_sector(),
                entry.sector_cnt,
                format!("0x{:02X}", entry.pt_type.code()),
                entry.pt_type.to_string()
            )?;

            last_end = last_end.max(start + u64::from(entry.sector_cnt));
        }

        if last_end < disk_end {
            writeln!(
                out,
                "{}│{:^8}│{:^6}│{:>12}│{:>12}│{:>12}│{:^6}│{:^16}│",
                indent,
                "",
                "",
                last_end,
                disk_end - 1,
                disk_end - last_end,
                "",
                "Unallocated"
            )?;
        }

        writeln!(
            out,
            "{}└{:─<8}┴{:─<6}┴{:─<12}┴{:─<12}┴{:─<12}┴{:─<6}┴{:─<16}┘",
            indent, "", "", "", "", "", "", ""
        )?;

        Ok(out)
    }
}
