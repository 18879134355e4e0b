//! FAT directory entry structure and parsing.
//!
//! This module implements the FAT directory entry structure which contains metadata
//! about files and directories stored in the filesystem. Each directory entry is 32 bytes
//! and contains information such as filename, attributes, timestamps, and cluster allocation.

use binread::{BinRead, BinReaderExt};
use getset::Getters;
use std::fmt;
use std::io;

use crate::filesystem::fat_error::FATError;

/// Size in bytes of one directory slot.
pub const DIR_ENTRY_SZ: usize = 32;

pub const ATTR_READ_ONLY: u8 = 0x01;
pub const ATTR_HIDDEN: u8 = 0x02;
pub const ATTR_SYSTEM: u8 = 0x04;
pub const ATTR_VOLUME_ID: u8 = 0x08;
pub const ATTR_DIRECTORY: u8 = 0x10;
pub const ATTR_ARCHIVE: u8 = 0x20;
/// Attribute value of a long file name slot.
pub const ATTR_LONG_NAME: u8 = 0x0F;

/// First name byte marking the end of the directory.
const END_MARKER: u8 = 0x00;
/// First name byte of a deleted entry.
const UNALLOCATED_MARKER: u8 = 0xE5;

/// Date and time decoded from the packed FAT representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FatTimestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl FatTimestamp {
    /// Decodes a FAT date (bits 15-9 year since 1980, 8-5 month, 4-0 day)
    /// and time (bits 15-11 hours, 10-5 minutes, 4-0 seconds / 2).
    pub fn from_fat(date: u16, time: u16) -> Self {
        Self {
            year: 1980 + (date >> 9),
            month: ((date >> 5) & 0x0F) as u8,
            day: (date & 0x1F) as u8,
            hour: (time >> 11) as u8,
            minute: ((time >> 5) & 0x3F) as u8,
            second: ((time & 0x1F) * 2) as u8,
        }
    }
}

impl fmt::Display for FatTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// FAT directory entry structure.
///
/// Each directory entry is exactly 32 bytes and contains metadata about a file or directory.
/// The structure follows Microsoft's FAT specification for directory entries.
///
/// # Notes
/// - The name field uses the legacy 8.3 format with space padding
/// - Long file name slots share the same 32-byte layout but only the attribute byte is meaningful
#[derive(BinRead, Debug, Clone, Getters)]
#[br(little)]
pub struct DirEntry {
    /// Filename in 8.3 format (8 characters name + 3 characters extension)
    #[get = "pub"]
    name: [u8; 11],
    /// File attributes byte
    #[get = "pub"]
    attr: u8,
    /// NT reserved (unused)
    _n_t_res: u8,
    /// Creation time in 10ms units
    #[get = "pub"]
    crt_time_tenth: u8,
    /// Creation time
    crt_time: u16,
    /// Creation date
    crt_date: u16,
    /// Last access date
    lst_acc_date: u16,
    /// High 16 bits of first cluster number
    fst_clus_hi: u16,
    /// Last write time
    wrt_time: u16,
    /// Last write date
    wrt_date: u16,
    /// Low 16 bits of first cluster number
    fst_clus_lo: u16,
    /// File size in bytes (0 for directories)
    #[get = "pub"]
    file_size: u32,
}

impl DirEntry {
    /// Creates a directory entry from a byte slice holding at least 32 bytes.
    pub fn from_slice(buf: &[u8]) -> Result<Self, FATError> {
        let mut reader = io::Cursor::new(buf);
        reader.read_le().map_err(FATError::from)
    }

    /// `true` for the slot terminating the directory.
    pub fn is_end(&self) -> bool {
        self.name[0] == END_MARKER
    }

    /// `true` for a deleted entry.
    pub fn is_unallocated(&self) -> bool {
        self.name[0] == UNALLOCATED_MARKER
    }

    /// `true` for a long file name slot.
    pub fn is_lfn(&self) -> bool {
        self.attr == ATTR_LONG_NAME
    }

    /// `true` for the `.` and `..` self and parent references.
    pub fn is_dot(&self) -> bool {
        &self.name == b".          " || &self.name == b"..         "
    }

    /// Checks if the directory attribute bit (0x10) is set.
    pub fn is_dir(&self) -> bool {
        self.attr & ATTR_DIRECTORY != 0
    }

    /// `true` for the volume label entry of the root directory.
    pub fn is_volume_label(&self) -> bool {
        !self.is_lfn() && self.attr & ATTR_VOLUME_ID != 0
    }

    /// Returns the complete first cluster number for this entry.
    ///
    /// Combines `fst_clus_hi` and `fst_clus_lo`: `(fst_clus_hi << 16) | fst_clus_lo`
    pub fn cluster_number(&self) -> u32 {
        ((self.fst_clus_hi as u32) << 16) | self.fst_clus_lo as u32
    }

    pub fn created(&self) -> FatTimestamp {
        FatTimestamp::from_fat(self.crt_date, self.crt_time)
    }

    pub fn modified(&self) -> FatTimestamp {
        FatTimestamp::from_fat(self.wrt_date, self.wrt_time)
    }

    /// Last access carries no time of day.
    pub fn accessed(&self) -> FatTimestamp {
        FatTimestamp::from_fat(self.lst_acc_date, 0)
    }

    /// Decodes the 8.3 name into `NAME.EXT` form.
    ///
    /// Volume labels are returned as the 11 characters joined without a dot.
    pub fn short_name(&self) -> String {
        let decode = |raw: &[u8]| -> String {
            raw.iter()
                .map(|b| if b.is_ascii() { *b as char } else { '?' })
                .collect::<String>()
                .trim_end()
                .to_string()
        };

        if self.is_volume_label() {
            return decode(&self.name);
        }

        let name = decode(&self.name[0..8]);
        let ext = decode(&self.name[8..11]);

        if ext.is_empty() {
            name
        } else {
            format!("{name}.{ext}")
        }
    }
}

impl fmt::Display for DirEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" {}B", self.short_name(), self.file_size)
    }
}
