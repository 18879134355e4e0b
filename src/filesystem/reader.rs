//! Logical reads over a cluster chain.
//!
//! A file or directory is a contiguous byte stream only logically: its clusters may be scattered
//! over the data region. [`ClusterReader`] maps a logical offset to physical segments, one per
//! cluster touched.

use log::trace;
use std::io;

use super::chain::ClusterChain;
use super::fat_error::FATError;
use super::geometry::Geometry;
use crate::utils;

/// Reads the logical content of a cluster chain from the image.
pub struct ClusterReader<'a> {
    geometry: &'a Geometry,
    chain: &'a ClusterChain,
}

impl<'a> ClusterReader<'a> {
    pub fn new(geometry: &'a Geometry, chain: &'a ClusterChain) -> Self {
        Self { geometry, chain }
    }

    /// Logical size of the chain in bytes.
    pub fn len(&self) -> u64 {
        self.chain.len() as u64 * self.geometry.cluster_size() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Fills `buf` with the bytes starting at the logical `offset` of the chain.
    ///
    /// The first segment is clipped to what remains of the starting cluster; following segments
    /// span whole clusters. Reading stops when `buf` is full or the chain is exhausted.
    ///
    /// # Returns
    /// The number of bytes read, smaller than `buf.len()` only when the chain ends first.
    pub fn read_at<T: io::Read + io::Seek>(
        &self,
        image: &mut T,
        offset: u64,
        buf: &mut [u8],
    ) -> Result<usize, FATError> {
        let cluster_size = self.geometry.cluster_size() as u64;
        let mut index = (offset / cluster_size) as usize;
        let mut in_cluster = offset % cluster_size;
        let mut done = 0;

        while done < buf.len() {
            let Some(cluster) = self.chain.clusters().get(index) else {
                break;
            };

            let step = ((cluster_size - in_cluster) as usize).min(buf.len() - done);
            let physical = self.geometry.clus_to_disk_offset(*cluster)? + in_cluster;
            trace!("Reading {step} bytes of cluster {cluster} at 0x{physical:X}");

            utils::read_at(image, physical, &mut buf[done..done + step])?;

            done += step;
            index += 1;
            in_cluster = 0;
        }

        Ok(done)
    }

    /// Reads the whole chain, cluster after cluster.
    pub fn read_all<T: io::Read + io::Seek>(&self, image: &mut T) -> Result<Vec<u8>, FATError> {
        let mut buf = vec![0; self.len() as usize];
        let read = self.read_at(image, 0, &mut buf)?;
        buf.truncate(read);
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const DATA_START: u64 = 1024;
    const CLUSTER: u64 = 512;

    /// Image whose data clusters are filled with a pattern depending on the cluster number.
    fn patterned_image(clusters: u32) -> Vec<u8> {
        let mut image = vec![0u8; (DATA_START + clusters as u64 * CLUSTER) as usize];
        for c in 0..clusters {
            let start = (DATA_START + c as u64 * CLUSTER) as usize;
            for (i, b) in image[start..start + CLUSTER as usize].iter_mut().enumerate() {
                *b = (c as usize * 31 + i) as u8;
            }
        }
        image
    }

    fn raw_cluster(image: &[u8], cluster: u32) -> &[u8] {
        let start = (DATA_START + (cluster as u64 - 2) * CLUSTER) as usize;
        &image[start..start + CLUSTER as usize]
    }

    #[test]
    fn test_read_across_cluster_boundary() {
        let image = patterned_image(8);
        let geometry = Geometry::new(512, 1, DATA_START, 0).unwrap();
        let chain = ClusterChain::from_clusters(vec![3, 7]);
        let reader = ClusterReader::new(&geometry, &chain);

        let mut buf = vec![0u8; 40];
        let read = reader
            .read_at(&mut Cursor::new(image.clone()), CLUSTER - 10, &mut buf)
            .unwrap();

        let mut expected = raw_cluster(&image, 3)[CLUSTER as usize - 10..].to_vec();
        expected.extend_from_slice(&raw_cluster(&image, 7)[..30]);

        assert_eq!(read, 40);
        assert_eq!(buf, expected);
    }

    #[test]
    fn test_read_stops_at_chain_end() {
        let image = patterned_image(4);
        let geometry = Geometry::new(512, 1, DATA_START, 0).unwrap();
        let chain = ClusterChain::from_clusters(vec![2, 3]);
        let reader = ClusterReader::new(&geometry, &chain);

        let mut buf = vec![0u8; 4096];
        let read = reader
            .read_at(&mut Cursor::new(image.clone()), 100, &mut buf)
            .unwrap();

        assert_eq!(read, 2 * CLUSTER as usize - 100);
        assert_eq!(&buf[..412], &raw_cluster(&image, 2)[100..]);
        assert_eq!(&buf[412..924], raw_cluster(&image, 3));
    }

    #[test]
    fn test_read_all() {
        let image = patterned_image(4);
        let geometry = Geometry::new(512, 1, DATA_START, 0).unwrap();
        let chain = ClusterChain::from_clusters(vec![5, 2]);
        let reader = ClusterReader::new(&geometry, &chain);

        let data = reader.read_all(&mut Cursor::new(image.clone())).unwrap();
        assert_eq!(reader.len(), 1024);
        assert_eq!(&data[..512], raw_cluster(&image, 5));
        assert_eq!(&data[512..], raw_cluster(&image, 2));
    }

    #[test]
    fn test_offset_past_chain() {
        let image = patterned_image(2);
        let geometry = Geometry::new(512, 1, DATA_START, 0).unwrap();
        let chain = ClusterChain::from_clusters(vec![2]);
        let reader = ClusterReader::new(&geometry, &chain);

        let mut buf = [0u8; 8];
        assert_eq!(
            reader.read_at(&mut Cursor::new(image), 600, &mut buf).unwrap(),
            0
        );
    }
}
