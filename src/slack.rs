//! Hidden data detection in unused regions of the image.
//!
//! Two kinds of regions are scanned: the gaps left between the MBR partitions and the tail of
//! the last cluster of every file. Any non-zero byte inside such a region is reported as a
//! [`SlackFinding`]; nothing found there is ever fatal.

use getset::Getters;
use log::{debug, warn};
use std::fmt;
use std::io;

use crate::filesystem::chain::ClusterChain;
use crate::filesystem::fat_error::FATError;
use crate::filesystem::geometry::Geometry;
use crate::partition::mbr::{MBR_SECTOR_SZ, PTEntry};
use crate::utils;

/// Where a finding was located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlackRegion {
    /// Space not covered by any partition. `after` and `before` are the slots of the
    /// neighbouring partitions; `None` stands for the MBR sector or the end of the image.
    PartitionGap {
        after: Option<u8>,
        before: Option<u8>,
    },
    /// Bytes between the logical end of a file and the end of its last cluster.
    FileTail { path: String, last_cluster: u32 },
}

impl fmt::Display for SlackRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlackRegion::PartitionGap { after, before } => {
                match after {
                    Some(slot) => write!(f, "gap after partition #{slot}")?,
                    None => write!(f, "gap after the MBR")?,
                }
                match before {
                    Some(slot) => write!(f, " and before partition #{slot}"),
                    None => write!(f, " up to the end of the image"),
                }
            }
            SlackRegion::FileTail { path, last_cluster } => {
                write!(f, "slack of {path} (last cluster {last_cluster})")
            }
        }
    }
}

/// A region holding at least one non-zero byte.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct SlackFinding {
    #[get = "pub"]
    region: SlackRegion,
    /// Absolute byte offset of the region in the image.
    #[get = "pub"]
    offset: u64,
    /// Length in bytes of the scanned region.
    #[get = "pub"]
    length: u64,
    /// Number of non-zero bytes in the region.
    #[get = "pub"]
    nonzero_bytes: u64,
}

impl fmt::Display for SlackFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Hidden data found in the {}: {} non-zero bytes in 0x{:X}..0x{:X}",
            self.region,
            self.nonzero_bytes,
            self.offset,
            self.offset + self.length
        )
    }
}

/// Byte range of the image outside of every partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    pub offset: u64,
    pub length: u64,
    pub after: Option<u8>,
    pub before: Option<u8>,
}

/// Scans `length` bytes at `offset` and reports them if any is non-zero.
pub fn scan_region<T: io::Read + io::Seek>(
    image: &mut T,
    region: SlackRegion,
    offset: u64,
    length: u64,
) -> io::Result<Option<SlackFinding>> {
    if length == 0 {
        return Ok(None);
    }

    let nonzero_bytes = utils::count_nonzero_at(image, offset, length)?;
    debug!("Scanned {length} bytes at 0x{offset:X} ({region}): {nonzero_bytes} non-zero");

    Ok((nonzero_bytes > 0).then_some(SlackFinding {
        region,
        offset,
        length,
        nonzero_bytes,
    }))
}

/// Offset inside the last cluster where the slack of a file starts.
///
/// A non-empty file filling its last cluster exactly has no slack: the returned offset is
/// then `cluster_size`, an empty range.
pub fn file_slack_start(file_size: u32, cluster_size: u32) -> u32 {
    match file_size % cluster_size {
        0 if file_size > 0 => cluster_size,
        rest => rest,
    }
}

/// Scans the tail of the last cluster of a file.
///
/// # Parameters
/// - `image`: The disk image
/// - `geometry`: Geometry of the volume holding the file
/// - `chain`: Cluster chain of the file
/// - `file_size`: Logical size of the file in bytes
/// - `path`: Full path of the file, used to name the finding
pub fn scan_file_tail<T: io::Read + io::Seek>(
    image: &mut T,
    geometry: &Geometry,
    chain: &ClusterChain,
    file_size: u32,
    path: &str,
) -> Result<Option<SlackFinding>, FATError> {
    let Some(last_cluster) = chain.last() else {
        return Ok(None);
    };

    let cluster_size = geometry.cluster_size();
    let expected = (file_size as u64).div_ceil(cluster_size as u64).max(1);
    if expected != chain.len() as u64 {
        warn!(
            "{path}: size {file_size}B needs {expected} clusters but its chain holds {}",
            chain.len()
        );
    }

    let slack_start = file_slack_start(file_size, cluster_size);
    let offset = geometry.clus_to_disk_offset(last_cluster)? + slack_start as u64;
    let region = SlackRegion::FileTail {
        path: path.to_string(),
        last_cluster,
    };

    Ok(scan_region(
        image,
        region,
        offset,
        (cluster_size - slack_start) as u64,
    )?)
}

/// Computes the regions of the image covered by no partition.
///
/// Partitions are sorted by start. The regions are: from the end of the MBR sector to the first
/// partition, between consecutive partitions, and from the last partition to the end of the
/// image. Every region is clamped to `image_len`.
pub fn partition_gaps(entries: &[&PTEntry], image_len: u64) -> Vec<Gap> {
    let mut sorted: Vec<&PTEntry> = entries.to_vec();
    sorted.sort_by_key(|entry| *entry.lba_start());

    let mut gaps = vec![];
    let mut cursor = MBR_SECTOR_SZ as u64;
    let mut after = None;

    for entry in sorted {
        let start = entry.start_byte().min(image_len);
        if start > cursor {
            gaps.push(Gap {
                offset: cursor,
                length: start - cursor,
                after,
                before: Some(*entry.slot()),
            });
        }

        let end = entry.end_byte().min(image_len);
        if end > cursor {
            cursor = end;
            after = Some(*entry.slot());
        }
    }

    if image_len > cursor {
        gaps.push(Gap {
            offset: cursor,
            length: image_len - cursor,
            after,
            before: None,
        });
    }

    gaps
}

/// Scans every inter-partition gap of the image.
pub fn scan_partition_gaps<T: io::Read + io::Seek>(
    image: &mut T,
    entries: &[&PTEntry],
) -> io::Result<Vec<SlackFinding>> {
    let image_len = utils::stream_len(image)?;
    let mut findings = vec![];

    for gap in partition_gaps(entries, image_len) {
        let region = SlackRegion::PartitionGap {
            after: gap.after,
            before: gap.before,
        };
        if let Some(finding) = scan_region(image, region, gap.offset, gap.length)? {
            warn!("{finding}");
            findings.push(finding);
        }
    }

    Ok(findings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::mbr::tests::{make_mbr_bytes, parse_entries};
    use std::io::Cursor;

    #[test]
    fn test_slack_start() {
        assert_eq!(file_slack_start(1000, 512), 488);
        assert_eq!(file_slack_start(512, 512), 512);
        assert_eq!(file_slack_start(4096, 512), 512);
        assert_eq!(file_slack_start(0, 512), 0);
        assert_eq!(file_slack_start(1, 4096), 1);
    }

    #[test]
    fn test_file_tail_with_hidden_bytes() {
        let geometry = Geometry::new(512, 1, 1024, 0).unwrap();
        let mut image = vec![0u8; 1024 + 4 * 512];
        // file of 700 bytes in clusters 2 -> 4, hidden byte after the logical end
        let last = 1024 + 2 * 512;
        image[last + 700 - 512 + 3] = 0x41;

        let chain = ClusterChain::from_clusters(vec![2, 4]);
        let finding = scan_file_tail(&mut Cursor::new(image), &geometry, &chain, 700, "/A.TXT")
            .unwrap()
            .unwrap();

        assert_eq!(*finding.offset(), last as u64 + 188);
        assert_eq!(*finding.length(), 512 - 188);
        assert_eq!(*finding.nonzero_bytes(), 1);
        assert_eq!(
            finding.region(),
            &SlackRegion::FileTail {
                path: "/A.TXT".to_string(),
                last_cluster: 4
            }
        );
    }

    #[test]
    fn test_exact_multiple_has_no_slack() {
        let geometry = Geometry::new(512, 1, 0, 0).unwrap();
        // the whole cluster is garbage, but all of it belongs to the file
        let image = vec![0xFFu8; 2048];
        let chain = ClusterChain::from_clusters(vec![3]);

        let finding =
            scan_file_tail(&mut Cursor::new(image), &geometry, &chain, 512, "/FULL.BIN").unwrap();
        assert_eq!(finding, None);
    }

    #[test]
    fn test_clean_tail() {
        let geometry = Geometry::new(512, 1, 0, 0).unwrap();
        let mut image = vec![0u8; 1024];
        image[..100].fill(0x55);
        let chain = ClusterChain::from_clusters(vec![2]);

        let finding =
            scan_file_tail(&mut Cursor::new(image), &geometry, &chain, 100, "/B.TXT").unwrap();
        assert_eq!(finding, None);
    }

    #[test]
    fn test_partition_gaps() {
        // partitions at sectors [4, 8) and [10, 12) on a 16-sector image
        let mbr = make_mbr_bytes(&[(0x0C, 4, 4), (0x0C, 10, 2)]);
        let entries = parse_entries(&mbr);
        let refs: Vec<&PTEntry> = entries.iter().collect();

        let gaps = partition_gaps(&refs, 16 * 512);
        assert_eq!(
            gaps,
            vec![
                Gap {
                    offset: 512,
                    length: 3 * 512,
                    after: None,
                    before: Some(1)
                },
                Gap {
                    offset: 8 * 512,
                    length: 2 * 512,
                    after: Some(1),
                    before: Some(2)
                },
                Gap {
                    offset: 12 * 512,
                    length: 4 * 512,
                    after: Some(2),
                    before: None
                },
            ]
        );
    }

    #[test]
    fn test_gaps_clamped_to_image() {
        let mbr = make_mbr_bytes(&[(0x0C, 2, 100)]);
        let entries = parse_entries(&mbr);
        let refs: Vec<&PTEntry> = entries.iter().collect();

        let gaps = partition_gaps(&refs, 10 * 512);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].offset, 512);
        assert_eq!(gaps[0].length, 512);
    }

    #[test]
    fn test_scan_partition_gaps() {
        let mut image = make_mbr_bytes(&[(0x0C, 4, 4)]);
        image.resize(10 * 512, 0);
        image[2 * 512 + 17] = 0x99;

        let mbr = image[..512].to_vec();
        let entries = parse_entries(&mbr);
        let refs: Vec<&PTEntry> = entries.iter().collect();

        let findings = scan_partition_gaps(&mut Cursor::new(image), &refs).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(*findings[0].offset(), 512);
        assert_eq!(*findings[0].nonzero_bytes(), 1);
        assert!(findings[0].to_string().contains("before partition #1"));
    }
}
