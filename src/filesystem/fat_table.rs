//! In-memory File Allocation Table.
//!
//! Both on-disk copies are loaded as raw bytes and compared; the primary copy is then decoded
//! into an [`AllocationTable`] of 16-bit or 32-bit entries used to resolve cluster chains.

use getset::Getters;
use log::{debug, warn};
use std::fmt;
use std::io;

use super::bpb::Bpb;
use super::fat_error::FATError;
use super::fat_type::FATType;
use crate::utils;

pub const FAT16_BAD: u32 = 0xFFF7;
pub const FAT16_EOF: u32 = 0xFFF8;
pub const FAT32_BAD: u32 = 0x0FFF_FFF7;
pub const FAT32_EOF: u32 = 0x0FFF_FFF8;
/// The upper 4 bits of a FAT32 entry are reserved.
pub const FAT32_MASK: u32 = 0x0FFF_FFFF;

/// Maximum number of individual discrepancies kept by [`FatDiff`].
pub const MAX_DIFF_SAMPLES: usize = 10;

/// Decoded value of one allocation table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatEntry {
    /// The cluster is not allocated.
    Free,
    /// Value 1, never used for data.
    Reserved,
    /// The chain continues with this cluster.
    Next(u32),
    /// The cluster is marked as bad.
    Bad,
    /// Last cluster of the chain.
    Eof,
}

impl FatEntry {
    fn from_raw(value: u32, bad: u32, eof: u32) -> Self {
        match value {
            0 => FatEntry::Free,
            1 => FatEntry::Reserved,
            v if v >= eof => FatEntry::Eof,
            v if v == bad => FatEntry::Bad,
            v => FatEntry::Next(v),
        }
    }
}

/// One copy of the FAT, interpreted with the entry width of the volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocationTable {
    Fat16(Vec<u16>),
    Fat32(Vec<u32>),
}

impl AllocationTable {
    /// Interprets raw FAT bytes as 16-bit or 32-bit little-endian entries.
    ///
    /// # Errors
    /// - `FATError::UnsupportedFATType` for FAT12, whose packed 12-bit entries are not decoded.
    pub fn from_bytes(fat_type: FATType, bytes: &[u8]) -> Result<Self, FATError> {
        match fat_type {
            FATType::FAT12 => Err(FATError::UnsupportedFATType(format!(
                "Decoding the allocation table of a {fat_type} volume is not supported."
            ))),
            FATType::FAT16 => Ok(AllocationTable::Fat16(
                bytes
                    .chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]]))
                    .collect(),
            )),
            FATType::FAT32 => Ok(AllocationTable::Fat32(
                bytes
                    .chunks_exact(4)
                    .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            )),
        }
    }

    pub fn fat_type(&self) -> FATType {
        match self {
            AllocationTable::Fat16(_) => FATType::FAT16,
            AllocationTable::Fat32(_) => FATType::FAT32,
        }
    }

    /// Number of entries in the table.
    pub fn len(&self) -> usize {
        match self {
            AllocationTable::Fat16(entries) => entries.len(),
            AllocationTable::Fat32(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw value of the entry for `cluster` (FAT32 values are masked to 28 bits).
    pub fn raw_entry(&self, cluster: u32) -> Option<u32> {
        match self {
            AllocationTable::Fat16(entries) => entries.get(cluster as usize).map(|v| *v as u32),
            AllocationTable::Fat32(entries) => {
                entries.get(cluster as usize).map(|v| *v & FAT32_MASK)
            }
        }
    }

    /// Resolves the successor of `cluster`.
    ///
    /// Returns `None` when the cluster lies beyond the end of the table.
    pub fn resolve(&self, cluster: u32) -> Option<FatEntry> {
        let value = self.raw_entry(cluster)?;

        Some(match self {
            AllocationTable::Fat16(_) => FatEntry::from_raw(value, FAT16_BAD, FAT16_EOF),
            AllocationTable::Fat32(_) => FatEntry::from_raw(value, FAT32_BAD, FAT32_EOF),
        })
    }
}

/// Verbose dump of the table: 8 entries per row, runs of empty rows collapsed.
impl fmt::Display for AllocationTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const PER_ROW: usize = 8;

        let width = match self {
            AllocationTable::Fat16(_) => 4,
            AllocationTable::Fat32(_) => 8,
        };
        let row_len = 13 + PER_ROW * (width + 5);
        let dash = "-".repeat(row_len);

        writeln!(f, "{dash}")?;
        writeln!(f, "{:^row_len$}", format!("FAT 1 ({})", self.fat_type()))?;
        writeln!(f, "{dash}")?;

        let len = self.len();
        let mut in_empty_block = false;

        for start in (0..len).step_by(PER_ROW) {
            let end = (start + PER_ROW).min(len);
            let values: Vec<u32> = (start..end)
                .filter_map(|i| self.raw_entry(i as u32))
                .collect();

            if values.iter().all(|v| *v == 0) {
                if !in_empty_block {
                    writeln!(f, " 0x{start:08x} | <Block of Empty/Zero FAT Entries>")?;
                    in_empty_block = true;
                }
                continue;
            }
            in_empty_block = false;

            write!(f, " 0x{start:08x} |")?;
            for value in values {
                write!(f, " 0x{value:0width$x} |")?;
            }
            writeln!(f)?;
        }

        writeln!(f, "{dash}")?;
        writeln!(f, " 0x{len:08x} | End of FAT")?;
        writeln!(f, "{dash}")
    }
}

/// One byte that differs between the primary and the secondary FAT copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatDiscrepancy {
    /// Offset of the byte inside the table.
    pub index: u64,
    /// Absolute offset of the byte in the primary copy.
    pub primary_offset: u64,
    /// Absolute offset of the byte in the secondary copy.
    pub secondary_offset: u64,
}

/// Summary of the byte-wise comparison of two FAT copies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Getters)]
pub struct FatDiff {
    /// Total number of differing bytes.
    #[get = "pub"]
    total: u64,
    /// The first differing bytes, at most [`MAX_DIFF_SAMPLES`].
    #[get = "pub"]
    samples: Vec<FatDiscrepancy>,
}

impl FatDiff {
    /// Compares two FAT copies byte by byte.
    ///
    /// `primary_start` and `secondary_start` are the absolute offsets of both copies and
    /// are only used to report where the differing bytes live.
    pub fn compare(primary: &[u8], secondary: &[u8], primary_start: u64, secondary_start: u64) -> Self {
        let mut diff = FatDiff::default();

        for (i, (a, b)) in primary.iter().zip(secondary.iter()).enumerate() {
            if a == b {
                continue;
            }

            diff.total += 1;
            if diff.samples.len() < MAX_DIFF_SAMPLES {
                diff.samples.push(FatDiscrepancy {
                    index: i as u64,
                    primary_offset: primary_start + i as u64,
                    secondary_offset: secondary_start + i as u64,
                });
            }
        }

        diff
    }

    pub fn is_clean(&self) -> bool {
        self.total == 0
    }
}

impl fmt::Display for FatDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            return writeln!(f, "FAT1 and FAT2 are identical.");
        }

        for sample in &self.samples {
            writeln!(
                f,
                "Detected discrepancy between FAT1 and FAT2 at the following offsets. FAT1: 0x{:X}, FAT2: 0x{:X}",
                sample.primary_offset, sample.secondary_offset
            )?;
        }
        if self.total > MAX_DIFF_SAMPLES as u64 {
            writeln!(
                f,
                "More than {MAX_DIFF_SAMPLES} discrepancies between FAT1 and FAT2 detected. Individual discrepancies are no longer listed."
            )?;
        }
        writeln!(
            f,
            "Total # of discrepancies identified between FAT1 and FAT2: {}",
            self.total
        )
    }
}

/// Raw bytes of the first two FAT copies of a volume.
#[derive(Debug, Getters)]
pub struct FatCopies {
    #[get = "pub"]
    primary: Vec<u8>,
    /// Absent on volumes with a single FAT.
    #[get = "pub"]
    secondary: Option<Vec<u8>>,
    /// Absolute offset of the primary copy.
    #[get = "pub"]
    primary_start: u64,
}

impl FatCopies {
    /// Loads the primary and, when present, the secondary FAT copy into memory.
    ///
    /// # Errors
    /// - `FATError::FatOutOfBounds` if the copies extend past the end of the image
    /// - `FATError::IOError` if reading from the image fails
    pub fn load<T: io::Read + io::Seek>(
        reader: &mut T,
        bpb: &Bpb,
        volume_start: u64,
    ) -> Result<Self, FATError> {
        let bps = *bpb.bytes_per_sec() as u64;
        let fat_bytes = bpb.fat_sz() as u64 * bps;
        let primary_start = volume_start + *bpb.rsvd_sec_cnt() as u64 * bps;
        let copies = (*bpb.num_fat()).min(2) as u64;

        let end = primary_start + copies * fat_bytes;
        let image_len = utils::stream_len(reader)?;
        if end > image_len {
            return Err(FATError::FatOutOfBounds { end, image_len });
        }

        let mut primary = vec![0; fat_bytes as usize];
        utils::read_at(reader, primary_start, &mut primary)?;

        let secondary = if copies > 1 {
            let mut secondary = vec![0; fat_bytes as usize];
            utils::read_at(reader, primary_start + fat_bytes, &mut secondary)?;
            Some(secondary)
        } else {
            warn!("Only one FAT on the volume: skipping the FAT1/FAT2 comparison");
            None
        };

        debug!(
            "Loaded {copies} FAT copies of {fat_bytes} bytes starting at 0x{primary_start:X}"
        );

        Ok(Self {
            primary,
            secondary,
            primary_start,
        })
    }

    /// Compares the two copies, `None` if the volume has a single FAT.
    pub fn diff(&self) -> Option<FatDiff> {
        let secondary = self.secondary.as_ref()?;
        let secondary_start = self.primary_start + self.primary.len() as u64;

        let diff = FatDiff::compare(&self.primary, secondary, self.primary_start, secondary_start);
        if !diff.is_clean() {
            warn!(
                "{} bytes differ between FAT1 and FAT2; FAT1 is used for chain resolution",
                diff.total
            );
        }
        Some(diff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fat32_bytes(entries: &[u32]) -> Vec<u8> {
        entries.iter().flat_map(|e| e.to_le_bytes()).collect()
    }

    #[test]
    fn test_fat32_resolve() {
        let table = AllocationTable::from_bytes(
            FATType::FAT32,
            &fat32_bytes(&[0x0FFFFFF8, 0xFFFFFFFF, 3, 0x0FFFFFFF, 0, FAT32_BAD, 1, 0xF0000007]),
        )
        .unwrap();

        assert_eq!(table.len(), 8);
        assert_eq!(table.resolve(2), Some(FatEntry::Next(3)));
        assert_eq!(table.resolve(3), Some(FatEntry::Eof));
        assert_eq!(table.resolve(4), Some(FatEntry::Free));
        assert_eq!(table.resolve(5), Some(FatEntry::Bad));
        assert_eq!(table.resolve(6), Some(FatEntry::Reserved));
        // upper 4 bits are ignored
        assert_eq!(table.resolve(7), Some(FatEntry::Next(7)));
        assert_eq!(table.resolve(8), None);
    }

    #[test]
    fn test_fat16_resolve() {
        let bytes: Vec<u8> = [0xFFF8u16, 0xFFFF, 3, 0xFFF8, 0xFFF7, 0xFFFF]
            .iter()
            .flat_map(|e| e.to_le_bytes())
            .collect();
        let table = AllocationTable::from_bytes(FATType::FAT16, &bytes).unwrap();

        assert_eq!(table.fat_type(), FATType::FAT16);
        assert_eq!(table.resolve(2), Some(FatEntry::Next(3)));
        assert_eq!(table.resolve(3), Some(FatEntry::Eof));
        assert_eq!(table.resolve(4), Some(FatEntry::Bad));
        assert_eq!(table.resolve(5), Some(FatEntry::Eof));
        assert_eq!(table.resolve(6), None);
    }

    #[test]
    fn test_fat12_not_decoded() {
        let err = AllocationTable::from_bytes(FATType::FAT12, &[0; 12]).unwrap_err();
        assert!(matches!(err, FATError::UnsupportedFATType(_)));
    }

    #[test]
    fn test_identical_copies() {
        let fat = vec![0xAB; 4096];
        let diff = FatDiff::compare(&fat, &fat, 0x4000, 0x5000);

        assert!(diff.is_clean());
        assert_eq!(*diff.total(), 0);
        assert!(diff.samples().is_empty());
    }

    #[test]
    fn test_differing_copies() {
        let primary = vec![0u8; 4096];
        let mut secondary = primary.clone();
        secondary[5] = 1;
        secondary[10] = 1;
        secondary[4000] = 1;

        let diff = FatDiff::compare(&primary, &secondary, 0x4000, 0x5000);
        assert_eq!(*diff.total(), 3);

        let indexes: Vec<u64> = diff.samples().iter().map(|s| s.index).collect();
        assert_eq!(indexes, vec![5, 10, 4000]);
        assert_eq!(diff.samples()[2].primary_offset, 0x4000 + 4000);
        assert_eq!(diff.samples()[2].secondary_offset, 0x5000 + 4000);
    }

    #[test]
    fn test_diff_samples_capped() {
        let primary = vec![0u8; 64];
        let secondary = vec![0xFFu8; 64];

        let diff = FatDiff::compare(&primary, &secondary, 0, 64);
        assert_eq!(*diff.total(), 64);
        assert_eq!(diff.samples().len(), MAX_DIFF_SAMPLES);
        assert!(diff.to_string().contains("More than 10"));
    }

    #[test]
    fn test_dump_collapses_empty_rows() {
        let mut entries = vec![0u32; 64];
        entries[0] = 0x0FFFFFF8;
        entries[1] = 0x0FFFFFFF;
        entries[2] = 0x0FFFFFFF;
        entries[40] = 0x0FFFFFFF;
        let table = AllocationTable::from_bytes(FATType::FAT32, &fat32_bytes(&entries)).unwrap();

        let out = table.to_string();
        assert!(out.contains(" 0x00000000 | 0x0ffffff8 |"));
        assert_eq!(out.matches("<Block of Empty/Zero FAT Entries>").count(), 2);
        assert!(out.contains(" 0x00000028 |"));
        assert!(out.contains("End of FAT"));
    }

    #[test]
    fn test_load_copies() {
        use crate::filesystem::bpb::tests::{BootSectorFields, make_boot_sector};
        use std::io::Cursor;

        let mut image = make_boot_sector(&BootSectorFields {
            rsvd_sec_cnt: 1,
            ..Default::default()
        });
        image.extend(vec![0x11; 512]);
        let mut fat2 = vec![0x11; 512];
        fat2[7] = 0x22;
        image.extend(fat2);

        let bpb = Bpb::from_bytes(&image[..512]).unwrap();
        let copies = FatCopies::load(&mut Cursor::new(image), &bpb, 0).unwrap();
        let diff = copies.diff().unwrap();

        assert_eq!(copies.primary().len(), 512);
        assert_eq!(*copies.primary_start(), 512);
        assert_eq!(*diff.total(), 1);
        assert_eq!(diff.samples()[0].primary_offset, 512 + 7);
        assert_eq!(diff.samples()[0].secondary_offset, 1024 + 7);
    }

    #[test]
    fn test_load_copies_out_of_bounds() {
        use crate::filesystem::bpb::tests::{BootSectorFields, make_boot_sector};
        use std::io::Cursor;

        let image = make_boot_sector(&BootSectorFields::default());
        let bpb = Bpb::from_bytes(&image).unwrap();

        let err = FatCopies::load(&mut Cursor::new(image), &bpb, 0).unwrap_err();
        assert!(matches!(err, FATError::FatOutOfBounds { .. }));
    }
}
