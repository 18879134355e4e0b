//! Cluster chain resolution.

use getset::Getters;
use log::trace;
use std::collections::HashSet;

use super::fat_error::FATError;
use super::fat_table::{AllocationTable, FatEntry};

/// Ordered list of the clusters holding one file or directory.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct ClusterChain {
    /// Clusters in visitation order, starting with the first cluster of the entry.
    #[get = "pub"]
    clusters: Vec<u32>,
}

impl ClusterChain {
    /// Follows the allocation table from `start` until the end-of-chain marker.
    ///
    /// # Errors
    /// - `FATError::InvalidClusterError` if `start` is 0 or 1
    /// - `FATError::ClusterOutOfRange` if a cluster lies past the end of the table
    /// - `FATError::BadCluster` if the chain reaches a bad cluster marker
    /// - `FATError::FreeClusterInChain` if the chain reaches a free or reserved entry
    /// - `FATError::ChainLoop` if a cluster is visited twice
    pub fn resolve(table: &AllocationTable, start: u32) -> Result<Self, FATError> {
        if start < 2 {
            return Err(FATError::InvalidClusterError(start));
        }

        let mut clusters = vec![];
        let mut visited = HashSet::new();
        let mut cluster = start;

        loop {
            if !visited.insert(cluster) {
                return Err(FATError::ChainLoop(cluster));
            }
            clusters.push(cluster);

            match table.resolve(cluster) {
                None => return Err(FATError::ClusterOutOfRange(cluster)),
                Some(FatEntry::Eof) => break,
                Some(FatEntry::Bad) => return Err(FATError::BadCluster(cluster)),
                Some(FatEntry::Free) | Some(FatEntry::Reserved) => {
                    return Err(FATError::FreeClusterInChain(cluster));
                }
                Some(FatEntry::Next(next)) => cluster = next,
            }
        }

        trace!("Chain from cluster {start}: {} clusters", clusters.len());
        Ok(Self { clusters })
    }

    /// Builds a chain from an already known list of clusters.
    pub fn from_clusters(clusters: Vec<u32>) -> Self {
        Self { clusters }
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn first(&self) -> Option<u32> {
        self.clusters.first().copied()
    }

    pub fn last(&self) -> Option<u32> {
        self.clusters.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::fat_type::FATType;

    fn table(entries: &[u32]) -> AllocationTable {
        let bytes: Vec<u8> = entries.iter().flat_map(|e| e.to_le_bytes()).collect();
        AllocationTable::from_bytes(FATType::FAT32, &bytes).unwrap()
    }

    #[test]
    fn test_single_cluster_chain() {
        let fat = table(&[0x0FFFFFF8, 0x0FFFFFFF, 0x0FFFFFFF]);
        let chain = ClusterChain::resolve(&fat, 2).unwrap();

        assert_eq!(chain.len(), 1);
        assert_eq!(chain.first(), Some(2));
        assert_eq!(chain.last(), Some(2));
    }

    #[test]
    fn test_fragmented_chain() {
        let fat = table(&[0x0FFFFFF8, 0x0FFFFFFF, 5, 0x0FFFFFFF, 0, 3]);
        let chain = ClusterChain::resolve(&fat, 2).unwrap();

        assert_eq!(chain.clusters(), &vec![2, 5, 3]);
    }

    #[test]
    fn test_eof_range() {
        // every value from 0x0FFFFFF8 ends the chain
        let fat = table(&[0x0FFFFFF8, 0x0FFFFFFF, 3, 0x0FFFFFFA]);
        assert_eq!(ClusterChain::resolve(&fat, 2).unwrap().len(), 2);
    }

    #[test]
    fn test_loop_detected() {
        let fat = table(&[0x0FFFFFF8, 0x0FFFFFFF, 3, 4, 2]);
        assert!(matches!(
            ClusterChain::resolve(&fat, 2),
            Err(FATError::ChainLoop(2))
        ));
    }

    #[test]
    fn test_malformed_chains() {
        let fat = table(&[0x0FFFFFF8, 0x0FFFFFFF, 3, 0, 0x0FFFFFF7, 40]);

        assert!(matches!(
            ClusterChain::resolve(&fat, 2),
            Err(FATError::FreeClusterInChain(3))
        ));
        assert!(matches!(
            ClusterChain::resolve(&fat, 4),
            Err(FATError::BadCluster(4))
        ));
        assert!(matches!(
            ClusterChain::resolve(&fat, 5),
            Err(FATError::ClusterOutOfRange(40))
        ));
        assert!(matches!(
            ClusterChain::resolve(&fat, 1),
            Err(FATError::InvalidClusterError(1))
        ));
    }
}
