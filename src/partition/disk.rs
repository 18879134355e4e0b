//! Disk image parsing and analysis.
//!
//! This module provides functionality for:
//! - Opening a disk image read-only and identifying its file system
//! - Decoding the MBR of a raw disk and the FAT volumes it holds
//! - Scanning the gaps between partitions for hidden data
//! - Displaying disk layout information

use getset::Getters;
use log::{info, warn};
use std::fs::File;
use std::io;
use std::path::Path;

use super::disk_error::DiskError;
use super::mbr::{MBR_SECTOR_SZ, Mbr};
use super::signature::{self, FSKind};
use crate::filesystem::fat::FATVol;
use crate::filesystem::walker::ScanOptions;
use crate::slack::{self, SlackFinding};
use crate::traits::{LayoutDisplay, TreeDisplay};
use crate::utils;

/// Represents a disk image with its partition table and volumes.
#[derive(Debug, Getters)]
pub struct Disk {
    /// File system identified from the first sector.
    #[get = "pub"]
    fs_kind: FSKind,
    /// Size of the image in bytes.
    #[get = "pub"]
    image_len: u64,
    /// The partition table found on a raw disk.
    #[get = "pub"]
    part_table: Option<Mbr>,
    /// FAT volumes found on the disk.
    #[get = "pub"]
    volumes: Vec<FATVol>,
    /// Hidden data found between partitions.
    #[get = "pub"]
    gap_findings: Vec<SlackFinding>,
}

impl Disk {
    /// Opens a disk image read-only and analyzes it.
    ///
    /// # Errors
    /// - `DiskError::Io` if the image cannot be opened
    /// - Any error returned by [`Disk::analyze`]
    pub fn open(path: &Path, declared: FSKind, options: ScanOptions) -> Result<Self, DiskError> {
        let mut f = File::open(path)?;
        info!("Opened {}", path.display());

        Self::analyze(&mut f, declared, options)
    }

    /// Analyzes an image: checks the boot signature and the declared file system, then decodes
    /// the FAT volume or the partition table.
    ///
    /// # Parameters
    /// - `reader`: The disk image
    /// - `declared`: File system the image is expected to hold
    /// - `options`: Directory walk and slack scan options
    ///
    /// # Errors
    /// - `DiskError::Io` if the first sector cannot be read
    /// - `DiskError::InvalidSignature` if the first sector does not end with 0x55AA
    /// - `DiskError::FSMismatch` if the detected file system is not the declared one
    /// - `DiskError::UnsupportedFSType` for an NTFS volume
    /// - `DiskError::FATError` if the FAT volume of a partition-less image cannot be decoded
    /// - `DiskError::ParsingError` if the FAT volume of a partition cannot be decoded
    pub fn analyze<T: io::Read + io::Seek>(
        reader: &mut T,
        declared: FSKind,
        options: ScanOptions,
    ) -> Result<Self, DiskError> {
        let image_len = utils::stream_len(reader)?;
        let mut sector = vec![];
        utils::read_sector(reader, 0, MBR_SECTOR_SZ, &mut sector)?;

        signature::check_boot_signature(&sector)?;
        let fs_kind = declared.check_declared(FSKind::detect(&sector))?;
        info!("Detected file system: {fs_kind}");

        let mut disk = Disk {
            fs_kind,
            image_len,
            part_table: None,
            volumes: vec![],
            gap_findings: vec![],
        };

        match fs_kind {
            FSKind::NTFS => {
                return Err(DiskError::UnsupportedFSType(
                    "NTFS volumes are detected but not decoded".to_string(),
                ));
            }
            FSKind::Raw => disk.analyze_partitions(reader, options)?,
            kind => {
                let vol = FATVol::from_reader(reader, 0, image_len, options)?;
                if FSKind::from(vol.fat_type()) != kind {
                    warn!(
                        "Boot sector jump identifies {kind} but the cluster count classifies the volume as {}",
                        vol.fat_type()
                    );
                }
                disk.volumes.push(vol);
            }
        }

        Ok(disk)
    }

    fn analyze_partitions<T: io::Read + io::Seek>(
        &mut self,
        reader: &mut T,
        options: ScanOptions,
    ) -> Result<(), DiskError> {
        let mbr = Mbr::from(reader)?;

        for pt_entry in mbr.pt_entries() {
            info!(
                "Partition #{}: {} at sector {}, {} sectors",
                pt_entry.slot(),
                pt_entry.pt_type(),
                pt_entry.lba_start(),
                pt_entry.sector_cnt()
            );
            if !pt_entry.is_fat() {
                continue;
            }

            match FATVol::from_reader(
                reader,
                pt_entry.start_byte(),
                pt_entry.end_byte() - pt_entry.start_byte(),
                options,
            ) {
                Ok(fat_vol) => self.volumes.push(fat_vol),
                Err(error) => {
                    return Err(DiskError::ParsingError(format!(
                        "Error while reading partition #{}: {error}",
                        pt_entry.slot()
                    )));
                }
            }
        }

        if options.scan_hidden {
            self.gap_findings = slack::scan_partition_gaps(reader, &mbr.pt_entries())?;
        }
        self.part_table = Some(mbr);

        Ok(())
    }

    /// Every finding of the run: partition gaps first, then file slack volume by volume.
    pub fn findings(&self) -> impl Iterator<Item = &SlackFinding> {
        self.gap_findings
            .iter()
            .chain(self.volumes.iter().flat_map(|vol| vol.findings().iter()))
    }

    /// `true` if any scanned region holds non-zero bytes.
    pub fn hidden_data_found(&self) -> bool {
        self.findings().next().is_some()
    }

    /// Renders a hierarchical layout of the disk structure: the partition table, if any,
    /// followed by the layout of each volume.
    pub fn layout(&self, indent: u8) -> Result<String, std::fmt::Error> {
        let mut out = String::new();

        if let Some(mbr) = &self.part_table {
            out.push_str(&mbr.display_layout(indent)?);
        }
        for vol in self.volumes.iter() {
            out.push('\n');
            out.push_str(&vol.display_layout(indent + 3)?);
        }

        Ok(out)
    }

    /// Renders the directory tree of every volume.
    pub fn tree(&self) -> Result<String, std::fmt::Error> {
        let mut out = String::new();

        for vol in self.volumes.iter() {
            out.push_str(&vol.display_tree()?);
        }

        Ok(out)
    }
}
