mod common;

use common::*;
use fat_slack::partition::disk_error::DiskError;
use fat_slack::partition::mbr::PTType;
use fat_slack::slack::SlackRegion;
use fat_slack::{Disk, FSKind, ScanOptions};
use std::io::{Cursor, Write};

fn hidden() -> ScanOptions {
    ScanOptions {
        scan_hidden: true,
        ..Default::default()
    }
}

#[test]
fn test_single_volume_image() {
    let image = evidence_volume().into_bytes();
    let disk = Disk::analyze(&mut Cursor::new(image), FSKind::FAT32, hidden()).unwrap();

    assert_eq!(*disk.fs_kind(), FSKind::FAT32);
    assert!(disk.part_table().is_none());
    assert_eq!(disk.volumes().len(), 1);
    assert_eq!(disk.volumes()[0].bpb().volume_label(), "EVIDENCE");
    assert!(disk.hidden_data_found());
    assert_eq!(disk.findings().count(), 1);
}

#[test]
fn test_declared_type_mismatch_aborts() {
    let image = evidence_volume().into_bytes();
    let err = Disk::analyze(&mut Cursor::new(image), FSKind::FAT16, hidden()).unwrap_err();

    assert!(matches!(
        err,
        DiskError::FSMismatch {
            declared: FSKind::FAT16,
            detected: FSKind::FAT32
        }
    ));
}

#[test]
fn test_invalid_signature_aborts() {
    let mut image = evidence_volume().into_bytes();
    image[510] = 0x00;

    let err = Disk::analyze(&mut Cursor::new(image), FSKind::FAT32, hidden()).unwrap_err();
    assert!(matches!(err, DiskError::InvalidSignature(0x00AA)));
}

#[test]
fn test_ntfs_is_detected_but_not_decoded() {
    let mut image = vec![0u8; 4096];
    image[0..3].copy_from_slice(&[0xEB, 0x52, 0x90]);
    image[510] = 0x55;
    image[511] = 0xAA;

    let err = Disk::analyze(&mut Cursor::new(image), FSKind::NTFS, hidden()).unwrap_err();
    assert!(matches!(err, DiskError::UnsupportedFSType(_)));
}

#[test]
fn test_fat16_volume_is_not_walked() {
    let mut image = vec![0u8; 4096];
    image[0..3].copy_from_slice(&[0xEB, 0x3C, 0x90]);
    image[11..13].copy_from_slice(&512u16.to_le_bytes());
    image[13] = 1;
    image[14..16].copy_from_slice(&1u16.to_le_bytes());
    image[16] = 2;
    image[17..19].copy_from_slice(&512u16.to_le_bytes());
    image[19..21].copy_from_slice(&20_000u16.to_le_bytes());
    image[21] = 0xF8;
    image[22..24].copy_from_slice(&1u16.to_le_bytes());
    image[510] = 0x55;
    image[511] = 0xAA;

    let disk = Disk::analyze(&mut Cursor::new(image), FSKind::FAT16, hidden()).unwrap();
    let vol = &disk.volumes()[0];

    assert!(vol.table().is_some());
    assert!(vol.report().is_none());
    assert!(!disk.hidden_data_found());
    assert!(disk.tree().unwrap().contains("not supported"));
}

#[test]
fn test_raw_disk_from_file() {
    let volume = evidence_volume().into_bytes();
    let linux = vec![0u8; 8 * BPS];
    let vol_sectors = volume.len() / BPS;
    let linux_start = 64 + vol_sectors as u32 + 4;
    let total = linux_start as usize + 8 + 2;

    let mut disk_bytes = mbr_disk(total, &[(0x0C, 64, &volume), (0x83, linux_start, &linux)]);
    // hidden byte between the MBR and the first partition
    disk_bytes[10 * BPS + 3] = 0x7F;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&disk_bytes).unwrap();
    file.flush().unwrap();

    let disk = Disk::open(file.path(), FSKind::Raw, hidden()).unwrap();

    assert_eq!(*disk.fs_kind(), FSKind::Raw);
    let mbr = disk.part_table().as_ref().unwrap();
    assert_eq!(mbr.pt_entries().len(), 2);
    assert_eq!(*mbr.pt_entries()[1].pt_type(), PTType::Linux);

    assert_eq!(disk.volumes().len(), 1);
    let vol = &disk.volumes()[0];
    assert_eq!(*vol.start(), 64 * BPS as u64);
    let tree = vol.report().as_ref().unwrap().tree();
    assert!(tree.find("/DOCS/SECRET.BIN").is_some());

    let gaps: Vec<_> = disk.gap_findings().iter().collect();
    assert_eq!(gaps.len(), 1);
    assert_eq!(*gaps[0].offset(), BPS as u64);
    assert_eq!(
        gaps[0].region(),
        &SlackRegion::PartitionGap {
            after: None,
            before: Some(1)
        }
    );

    // the file tail finding is reported at its absolute position in the disk
    let tails: Vec<_> = vol.findings().iter().collect();
    assert_eq!(tails.len(), 1);
    assert_eq!(*tails[0].offset(), 64 * BPS as u64 + notes_tail_offset());
    assert_eq!(disk.findings().count(), 2);

    let layout = disk.layout(0).unwrap();
    assert!(layout.contains("FAT32 (LBA)"));
    assert!(layout.contains("FAT32 Volume Layout"));
}

#[test]
fn test_broken_fat_partition_aborts() {
    let mut volume = evidence_volume().into_bytes();
    // 3 bytes per sector is never valid
    volume[11] = 3;
    volume[12] = 0;
    let disk_bytes = mbr_disk(200, &[(0x0C, 64, &volume)]);

    let err = Disk::analyze(&mut Cursor::new(disk_bytes), FSKind::Raw, hidden()).unwrap_err();
    assert!(matches!(err, DiskError::ParsingError(_)));
}

#[test]
fn test_wiped_partition_signature_is_not_fatal() {
    let mut volume = evidence_volume().into_bytes();
    volume[510] = 0x00;
    volume[511] = 0x00;
    let mut disk_bytes = mbr_disk(128, &[(0x0C, 64, &volume)]);
    disk_bytes[20 * BPS] = 0x01;

    let disk = Disk::analyze(&mut Cursor::new(disk_bytes), FSKind::Raw, hidden()).unwrap();

    assert_eq!(disk.volumes().len(), 1);
    assert_eq!(disk.volumes()[0].bpb().signature(), 0x0000);
    assert!(disk.volumes()[0].report().is_some());
    assert_eq!(disk.gap_findings().len(), 1);
    assert_eq!(disk.findings().count(), 2);
}

#[test]
fn test_hidden_fat_partition_is_decoded() {
    let volume = evidence_volume().into_bytes();
    let disk_bytes = mbr_disk(128, &[(0x1C, 64, &volume)]);

    let disk = Disk::analyze(&mut Cursor::new(disk_bytes), FSKind::Raw, hidden()).unwrap();

    let mbr = disk.part_table().as_ref().unwrap();
    assert_eq!(*mbr.pt_entries()[0].pt_type(), PTType::HiddenFAT32(0x1C));
    assert_eq!(disk.volumes().len(), 1);
    assert_eq!(disk.volumes()[0].findings().len(), 1);
}
