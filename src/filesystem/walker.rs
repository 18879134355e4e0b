//! Recursive directory walker.
//!
//! Builds the [`DirTree`] of a FAT32 volume from its root directory and, when asked, scans the
//! slack of every regular file met on the way.

use getset::Getters;
use log::{debug, info, trace, warn};
use std::collections::HashSet;
use std::io;

use super::chain::ClusterChain;
use super::dir_entry::{DIR_ENTRY_SZ, DirEntry};
use super::fat_error::FATError;
use super::fat_table::AllocationTable;
use super::geometry::Geometry;
use super::reader::ClusterReader;
use super::tree::{DirNode, DirTree, NodeId};
use crate::slack::{self, SlackFinding};

/// Default bound on the directory nesting depth.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Options of a volume scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    /// Scan the slack of every regular file and of the partition gaps.
    pub scan_hidden: bool,
    /// Deepest directory level descended into; the root is level 0.
    pub max_depth: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            scan_hidden: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Outcome of a walk: the directory tree and the file slack findings.
#[derive(Debug, Clone, Getters)]
pub struct WalkReport {
    #[get = "pub"]
    tree: DirTree,
    #[get = "pub"]
    findings: Vec<SlackFinding>,
}

/// Walks the directories of one volume.
pub struct TreeWalker<'a, T: io::Read + io::Seek> {
    image: &'a mut T,
    geometry: &'a Geometry,
    table: &'a AllocationTable,
    options: ScanOptions,
}

impl<'a, T: io::Read + io::Seek> TreeWalker<'a, T> {
    pub fn new(
        image: &'a mut T,
        geometry: &'a Geometry,
        table: &'a AllocationTable,
        options: ScanOptions,
    ) -> Self {
        Self {
            image,
            geometry,
            table,
            options,
        }
    }

    /// Walks the hierarchy rooted at the directory starting at `root_cluster`.
    ///
    /// # Errors
    /// - Any chain error on the root directory
    /// - `FATError::IOError` if a directory or a file tail cannot be read
    ///
    /// Chain errors of a subdirectory or a file are logged and the entry is kept without
    /// descending into it or scanning it.
    pub fn walk(mut self, root_cluster: u32) -> Result<WalkReport, FATError> {
        let root_chain = ClusterChain::resolve(self.table, root_cluster)?;

        let mut report = WalkReport {
            tree: DirTree::new(root_cluster),
            findings: vec![],
        };
        let root = report.tree.root();
        if let Some(last) = root_chain.last() {
            report.tree.set_last_cluster(root, last);
        }
        let mut ancestors = HashSet::from([root_cluster]);

        self.walk_dir(&mut report, root, &root_chain, &mut ancestors)?;

        info!(
            "Walked {} entries ({} files, {} directories)",
            report.tree.len() - 1,
            report.tree.files().count(),
            report.tree.directories().count()
        );
        Ok(report)
    }

    fn walk_dir(
        &mut self,
        report: &mut WalkReport,
        dir: NodeId,
        chain: &ClusterChain,
        ancestors: &mut HashSet<u32>,
    ) -> Result<(), FATError> {
        let data = ClusterReader::new(self.geometry, chain).read_all(self.image)?;
        debug!(
            "Scanning {} ({} bytes)",
            report.tree.path(dir),
            data.len()
        );

        for slot in data.chunks_exact(DIR_ENTRY_SZ) {
            let entry = DirEntry::from_slice(slot)?;

            if entry.is_lfn() || entry.is_end() || entry.is_unallocated() || entry.is_dot() {
                continue;
            }

            trace!("{entry} at cluster {}", entry.cluster_number());
            let node = report.tree.append(dir, DirNode::from_entry(&entry));

            if entry.is_volume_label() {
                continue;
            } else if entry.is_dir() {
                self.descend(report, node, &entry, ancestors)?;
            } else {
                self.visit_file(report, node, &entry)?;
            }
        }

        Ok(())
    }

    /// Resolves the chain of `node` and records its last cluster.
    ///
    /// Chain errors are logged and yield `None`.
    fn resolve_chain(
        &self,
        report: &mut WalkReport,
        node: NodeId,
        cluster: u32,
    ) -> Option<ClusterChain> {
        match ClusterChain::resolve(self.table, cluster) {
            Ok(chain) => {
                if let Some(last) = chain.last() {
                    report.tree.set_last_cluster(node, last);
                }
                Some(chain)
            }
            Err(err) => {
                warn!("{}: {err}", report.tree.path(node));
                None
            }
        }
    }

    fn descend(
        &mut self,
        report: &mut WalkReport,
        node: NodeId,
        entry: &DirEntry,
        ancestors: &mut HashSet<u32>,
    ) -> Result<(), FATError> {
        let cluster = entry.cluster_number();
        let Some(chain) = self.resolve_chain(report, node, cluster) else {
            return Ok(());
        };
        let path = report.tree.path(node);

        if ancestors.contains(&cluster) {
            warn!("{path}: cluster {cluster} is already used by a parent directory, not descending");
            return Ok(());
        }
        if report.tree.depth(node) > self.options.max_depth {
            warn!(
                "{path}: maximum depth of {} reached, not descending",
                self.options.max_depth
            );
            return Ok(());
        }

        ancestors.insert(cluster);
        let result = self.walk_dir(report, node, &chain, ancestors);
        ancestors.remove(&cluster);

        result
    }

    /// Records the last cluster of a regular file and scans its tail when asked.
    fn visit_file(
        &mut self,
        report: &mut WalkReport,
        node: NodeId,
        entry: &DirEntry,
    ) -> Result<(), FATError> {
        let cluster = entry.cluster_number();

        if cluster < 2 {
            debug!("{}: no cluster allocated", report.tree.path(node));
            return Ok(());
        }

        let Some(chain) = self.resolve_chain(report, node, cluster) else {
            return Ok(());
        };
        if !self.options.scan_hidden {
            return Ok(());
        }

        let path = report.tree.path(node);
        let finding =
            slack::scan_file_tail(self.image, self.geometry, &chain, *entry.file_size(), &path)?;
        if let Some(finding) = finding {
            warn!("{finding}");
            report.findings.push(finding);
        }

        Ok(())
    }
}
