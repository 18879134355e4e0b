//! FAT volume structure and operations.
//!
//! This module implements the core functions to inspect a FAT volume, including:
//! - Reading and validating the BPB
//! - Loading and comparing the FAT copies
//! - Walking the directory tree and scanning file slack
//! - Displaying the volume layout

use getset::Getters;
use log::{info, warn};
use std::fmt::Write as FmtWrite;
use std::io;

use super::bpb::Bpb;
use super::fat_error::FATError;
use super::fat_table::{AllocationTable, FatCopies, FatDiff};
use super::fat_type::FATType;
use super::geometry::Geometry;
use super::tree::DirNode;
use super::walker::{ScanOptions, TreeWalker, WalkReport};
use crate::slack::SlackFinding;
use crate::traits::{LayoutDisplay, TreeDisplay};

/// Structure for a FAT volume.
///
/// Essentially, it is a wrapper around the Bpb with the data decoded from it.
#[derive(Debug, Getters)]
pub struct FATVol {
    #[get = "pub"]
    bpb: Bpb,
    #[get = "pub"]
    geometry: Geometry,
    /// Absolute byte offset of the volume.
    #[get = "pub"]
    start: u64,
    /// Absolute byte offset right after the volume.
    #[get = "pub"]
    end: u64,
    /// Comparison of the first two FAT copies, absent with a single FAT.
    #[get = "pub"]
    fat_diff: Option<FatDiff>,
    /// Primary FAT copy, absent on FAT12 volumes.
    #[get = "pub"]
    table: Option<AllocationTable>,
    /// Directory tree and file slack findings, absent when the volume cannot be walked.
    #[get = "pub"]
    report: Option<WalkReport>,
}

impl FATVol {
    /// Decodes the volume located at `start` and walks its directory tree.
    ///
    /// # Parameters
    /// - `reader`: The disk image
    /// - `start`: Absolute byte offset of the volume
    /// - `len`: Length of the volume in bytes
    /// - `options`: Directory walk and slack scan options
    ///
    /// # Errors
    /// - Any boot sector validation error
    /// - `FATError::FatOutOfBounds` if the FAT copies do not fit in the image
    /// - `FATError::IOError` if reading from the image fails
    pub fn from_reader<T: io::Read + io::Seek>(
        reader: &mut T,
        start: u64,
        len: u64,
        options: ScanOptions,
    ) -> Result<FATVol, FATError> {
        let bpb = Bpb::from(reader, start)?;
        let geometry = bpb.geometry(start)?;
        let fat_type = bpb.fat_type();
        info!(
            "{fat_type} volume at 0x{start:X}: {} clusters of {} bytes",
            bpb.cluster_count(),
            geometry.cluster_size()
        );

        let copies = FatCopies::load(reader, &bpb, start)?;
        let fat_diff = copies.diff();

        let table = match AllocationTable::from_bytes(fat_type, copies.primary()) {
            Ok(table) => Some(table),
            Err(FATError::UnsupportedFATType(msg)) => {
                warn!("{msg}");
                None
            }
            Err(err) => return Err(err),
        };

        let mut vol = Self {
            bpb,
            geometry,
            start,
            end: start + len,
            fat_diff,
            table,
            report: None,
        };

        match vol.walk(reader, options) {
            Ok(report) => vol.report = Some(report),
            Err(FATError::UnsupportedFATType(msg)) => warn!("{msg}"),
            Err(err) => return Err(err),
        }

        Ok(vol)
    }

    /// Walks the directory tree from the root directory.
    ///
    /// # Errors
    /// - `FATError::UnsupportedFATType` for FAT12 and FAT16 volumes, whose root directory is a
    ///   fixed region outside of the cluster heap
    /// - Any error returned by [`TreeWalker::walk`]
    pub fn walk<T: io::Read + io::Seek>(
        &self,
        reader: &mut T,
        options: ScanOptions,
    ) -> Result<WalkReport, FATError> {
        let fat_type = self.bpb.fat_type();
        let (Some(root_clus), Some(table)) = (self.bpb.root_clus(), self.table.as_ref()) else {
            return Err(FATError::UnsupportedFATType(format!(
                "Walking the directory tree of a {fat_type} volume is not supported."
            )));
        };

        TreeWalker::new(reader, &self.geometry, table, options).walk(root_clus)
    }

    /// Finds a file or directory of the walked tree by its absolute path.
    ///
    /// Components are matched case-insensitively against the 8.3 names.
    ///
    /// # Errors
    /// - `FATError::UnsupportedFATType` if the volume was not walked
    /// - `FATError::FileNotFound` if no entry matches `path`
    pub fn find_file(&self, path: &str) -> Result<&DirNode, FATError> {
        let Some(report) = &self.report else {
            return Err(FATError::UnsupportedFATType(format!(
                "Looking files up on a {} volume is not supported.",
                self.fat_type()
            )));
        };

        let tree = report.tree();
        tree.find(path)
            .and_then(|id| tree.node(id))
            .ok_or(FATError::FileNotFound)
    }

    pub fn fat_type(&self) -> FATType {
        self.bpb.fat_type()
    }

    /// File slack findings of the last walk.
    pub fn findings(&self) -> &[SlackFinding] {
        match &self.report {
            Some(report) => report.findings(),
            None => &[],
        }
    }

    fn bytes_per_sec(&self) -> u64 {
        *self.geometry.bytes_per_sec() as u64
    }

    /// Returns the starting sector of the volume.
    fn start_sector(&self) -> u64 {
        self.start / self.bytes_per_sec()
    }

    /// Returns the starting sector of the first FAT.
    fn fat_start(&self) -> u64 {
        self.start_sector() + u64::from(*self.bpb.rsvd_sec_cnt())
    }

    /// Returns the starting sector of the root directory region.
    fn root_start(&self) -> u64 {
        self.fat_start() + self.bpb.fat_sz() as u64 * *self.bpb.num_fat() as u64
    }

    /// Returns the starting sector of the data region.
    fn data_start(&self) -> u64 {
        self.root_start() + self.bpb.root_dir_sectors() as u64
    }

    /// Returns the ending sector of the data region.
    fn data_end(&self) -> u64 {
        self.data_start() + self.bpb.cluster_count() as u64 * *self.geometry.sec_per_clus() as u64
    }

    fn end_sector(&self) -> u64 {
        self.end / self.bytes_per_sec()
    }
}

/// Implements the LayoutDisplay trait for FATVol
impl LayoutDisplay for FATVol {
    fn display_layout(&self, indent: u8) -> Result<String, std::fmt::Error> {
        let mut out = String::from("");
        let indent = " ".repeat(indent.into());
        let title = format!(" {} Volume Layout ", self.fat_type());

        writeln!(out, "{}┌{:─^55}┐", indent, title)?;
        writeln!(
            out,
            "{}├{:^12}┬{:^12}┬{:^12}┬{:^16}┤",
            indent, "Region", "Start", "End", "Description"
        )?;
        writeln!(
            out,
            "{}├{:─<12}┼{:─<12}┼{:─<12}┼{:─<16}┤",
            indent, "", "", "", ""
        )?;

        writeln!(
            out,
            "{}│{:<12}│{:<12}│{:<12}│{:<16}│",
            indent,
            "Reserved",
            self.start_sector(),
            self.fat_start(),
            "Boot + Reserved"
        )?;
        for i in 0..*self.bpb.num_fat() as u64 {
            let fat_i_start = self.fat_start() + i * self.bpb.fat_sz() as u64;
            let fat_i_end = fat_i_start + self.bpb.fat_sz() as u64;
            writeln!(
                out,
                "{}│{:<12}│{:<12}│{:<12}│{:<16}│",
                indent,
                format!("FAT #{}", i + 1),
                fat_i_start,
                fat_i_end,
                "FAT Tables"
            )?;
        }
        if self.fat_type() != FATType::FAT32 {
            writeln!(
                out,
                "{}│{:<12}│{:<12}│{:<12}│{:<16}│",
                indent,
                "Root Dir",
                self.root_start(),
                self.data_start(),
                "Root Directory"
            )?;
        }
        writeln!(
            out,
            "{}│{:<12}│{:<12}│{:<12}│{:<16}│",
            indent,
            "Data",
            self.data_start(),
            self.data_end(),
            "Cluster Data"
        )?;
        if self.data_end() < self.end_sector() {
            writeln!(
                out,
                "{}│{:<12}│{:<12}│{:<12}│{:<16}│",
                indent,
                "",
                self.data_end(),
                self.end_sector(),
                "Volume Slack"
            )?;
        }

        writeln!(
            out,
            "{}└{:─<12}┴{:─<12}┴{:─<12}┴{:─<16}┘",
            indent, "", "", "", ""
        )?;

        Ok(out)
    }
}

impl TreeDisplay for FATVol {
    fn display_tree(&self) -> Result<String, std::fmt::Error> {
        match &self.report {
            Some(report) => report.tree().display_tree(),
            None => Ok(format!(
                "Displaying the directory tree of a {} volume is not supported.\n",
                self.fat_type()
            )),
        }
    }
}
