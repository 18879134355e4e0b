//! Synthetic FAT images shared by the integration tests.
#![allow(dead_code)]

pub const BPS: usize = 512;
pub const RSVD_SEC: usize = 32;
pub const NUM_FAT: usize = 2;
/// One FAT sector holds 128 FAT32 entries.
pub const FAT_SECTORS: usize = 1;
pub const DATA_START: usize = (RSVD_SEC + NUM_FAT * FAT_SECTORS) * BPS;
pub const EOC: u32 = 0x0FFF_FFFF;

pub const ATTR_VOLUME_ID: u8 = 0x08;
pub const ATTR_DIRECTORY: u8 = 0x10;
pub const ATTR_ARCHIVE: u8 = 0x20;
pub const ATTR_LONG_NAME: u8 = 0x0F;

/// FAT32 volume with one sector per cluster and the root directory in cluster 2.
pub struct Fat32Image {
    data: Vec<u8>,
}

impl Fat32Image {
    pub fn new(clusters: usize) -> Self {
        let mut data = vec![0u8; DATA_START + clusters * BPS];

        data[0..3].copy_from_slice(&[0xEB, 0x58, 0x90]);
        data[3..11].copy_from_slice(b"MSWIN4.1");
        data[11..13].copy_from_slice(&(BPS as u16).to_le_bytes());
        data[13] = 1;
        data[14..16].copy_from_slice(&(RSVD_SEC as u16).to_le_bytes());
        data[16] = NUM_FAT as u8;
        data[21] = 0xF8;
        // the cluster count must classify the volume as FAT32
        data[32..36].copy_from_slice(&70_000u32.to_le_bytes());
        data[36..40].copy_from_slice(&(FAT_SECTORS as u32).to_le_bytes());
        data[44..48].copy_from_slice(&2u32.to_le_bytes());
        data[66] = 0x29;
        data[71..82].copy_from_slice(b"EVIDENCE   ");
        data[82..90].copy_from_slice(b"FAT32   ");
        data[510] = 0x55;
        data[511] = 0xAA;

        let mut image = Self { data };
        image.set_fat(0, 0x0FFF_FFF8);
        image.set_fat(1, EOC);
        image.set_fat(2, EOC);
        image
    }

    /// Writes the entry of `cluster` in both FAT copies.
    pub fn set_fat(&mut self, cluster: u32, value: u32) {
        for copy in 0..NUM_FAT {
            let offset = (RSVD_SEC + copy * FAT_SECTORS) * BPS + cluster as usize * 4;
            self.data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        }
    }

    /// Overwrites one byte of the secondary FAT copy only.
    pub fn corrupt_fat2(&mut self, index: usize, value: u8) {
        self.data[(RSVD_SEC + FAT_SECTORS) * BPS + index] = value;
    }

    pub fn cluster_offset(cluster: u32) -> usize {
        DATA_START + (cluster as usize - 2) * BPS
    }

    pub fn write_cluster(&mut self, cluster: u32, offset: usize, bytes: &[u8]) {
        let start = Self::cluster_offset(cluster) + offset;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
    }

    /// Writes a directory entry in slot `slot` of the directory cluster `dir_cluster`.
    pub fn add_entry(&mut self, dir_cluster: u32, slot: usize, entry: [u8; 32]) {
        self.write_cluster(dir_cluster, slot * 32, &entry);
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

/// Builds a 32-byte short name entry.
pub fn entry(name: &[u8; 11], attr: u8, cluster: u32, size: u32) -> [u8; 32] {
    let mut raw = [0u8; 32];
    raw[0..11].copy_from_slice(name);
    raw[11] = attr;
    raw[20..22].copy_from_slice(&((cluster >> 16) as u16).to_le_bytes());
    raw[26..28].copy_from_slice(&(cluster as u16).to_le_bytes());
    raw[28..32].copy_from_slice(&size.to_le_bytes());
    raw
}

/// Builds a long file name slot; its first cluster and size fields hold garbage.
pub fn lfn_entry(seq: u8) -> [u8; 32] {
    let mut raw = [0xAAu8; 32];
    raw[0] = seq;
    raw[11] = ATTR_LONG_NAME;
    raw
}

/// Evidence volume used by most tests:
///
/// ```text
/// /            cluster 2
/// ├── EVIDENCE   volume label
/// ├── HELLO.TXT  cluster 3, 100 bytes, clean tail
/// └── DOCS/      cluster 4
///     ├── SECRET.BIN  cluster 5, 512 bytes filling its cluster
///     └── NOTES.TXT   clusters 6 -> 7, 600 bytes, hidden byte in the tail
/// ```
pub fn evidence_volume() -> Fat32Image {
    let mut image = Fat32Image::new(16);

    for cluster in [3, 4, 5, 7] {
        image.set_fat(cluster, EOC);
    }
    image.set_fat(6, 7);

    image.add_entry(2, 0, entry(b"EVIDENCE   ", ATTR_VOLUME_ID, 0, 0));
    image.add_entry(2, 1, lfn_entry(0x41));
    image.add_entry(2, 2, entry(b"HELLO   TXT", ATTR_ARCHIVE, 3, 100));
    image.add_entry(2, 3, entry(b"DOCS       ", ATTR_DIRECTORY, 4, 0));
    let mut deleted = entry(b"XGONE   TXT", ATTR_ARCHIVE, 9, 10);
    deleted[0] = 0xE5;
    image.add_entry(2, 4, deleted);

    image.add_entry(4, 0, entry(b".          ", ATTR_DIRECTORY, 4, 0));
    image.add_entry(4, 1, entry(b"..         ", ATTR_DIRECTORY, 0, 0));
    image.add_entry(4, 2, entry(b"SECRET  BIN", ATTR_ARCHIVE, 5, 512));
    image.add_entry(4, 3, entry(b"NOTES   TXT", ATTR_ARCHIVE, 6, 600));

    image.write_cluster(3, 0, &[b'h'; 100]);
    image.write_cluster(5, 0, &[0xFF; BPS]);
    image.write_cluster(6, 0, &[b'n'; BPS]);
    image.write_cluster(7, 0, &[b'n'; 88]);
    image.write_cluster(7, 98, b"X");

    image
}

/// Offset of the hidden byte written in the tail of NOTES.TXT.
pub fn notes_tail_offset() -> u64 {
    (Fat32Image::cluster_offset(7) + 88) as u64
}

/// Raw disk image: MBR followed by the given `(type, lba_start, volume bytes)` partitions.
pub fn mbr_disk(total_sectors: usize, partitions: &[(u8, u32, &[u8])]) -> Vec<u8> {
    let mut data = vec![0u8; total_sectors * BPS];

    for (i, (pt_type, lba_start, volume)) in partitions.iter().enumerate() {
        let entry = 0x1BE + i * 16;
        let sector_cnt = volume.len().div_ceil(BPS) as u32;

        data[entry + 4] = *pt_type;
        data[entry + 8..entry + 12].copy_from_slice(&lba_start.to_le_bytes());
        data[entry + 12..entry + 16].copy_from_slice(&sector_cnt.to_le_bytes());

        let start = *lba_start as usize * BPS;
        data[start..start + volume.len()].copy_from_slice(volume);
    }

    data[510] = 0x55;
    data[511] = 0xAA;
    data
}
