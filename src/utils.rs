//! Positioned, read-only access to a disk image and little-endian field helpers.

use std::io;
use std::io::{Read, Seek, SeekFrom};

/// Reads exactly `buffer.len()` bytes starting at the absolute byte `offset`.
///
/// # Arguments
///
/// - `reader`: The disk image.
/// - `offset`: The absolute offset in bytes where reading starts.
/// - `buffer`: The destination buffer, filled completely on success.
///
/// # Errors
///
/// Returns an `io::Error` naming the offset if the bytes cannot be read.
pub fn read_at<T: Read + Seek>(reader: &mut T, offset: u64, buffer: &mut [u8]) -> io::Result<()> {
    reader.seek(SeekFrom::Start(offset))?;

    reader.read_exact(buffer).map_err(|err| {
        io::Error::new(
            err.kind(),
            format!(
                "Failed to read {} bytes at offset 0x{:X}: {}",
                buffer.len(),
                offset,
                err
            ),
        )
    })
}

/// Reads a specific sector from a reader into a buffer.
///
/// # Arguments
///
/// - `reader`: The disk image.
/// - `sector`: The sector number to read.
/// - `sector_size`: The size in bytes of a sector.
/// - `buffer`: A mutable reference to a vector where the sector data will be stored.
///
/// The buffer will be resized to match the sector size.
///
/// # Errors
///
/// Returns an `io::Error` if the sector cannot be read.
pub fn read_sector<T: Read + Seek>(
    reader: &mut T,
    sector: u64,
    sector_size: usize,
    buffer: &mut Vec<u8>,
) -> io::Result<()> {
    buffer.resize(sector_size, 0);

    read_at(reader, sector_size as u64 * sector, buffer).map_err(|err| {
        io::Error::new(
            err.kind(),
            format!("Failed to read sector {}: {}", sector, err),
        )
    })
}

/// Returns the total length in bytes of the underlying image.
///
/// The current position of the reader is restored afterwards.
pub fn stream_len<T: Seek>(reader: &mut T) -> io::Result<u64> {
    let pos = reader.stream_position()?;
    let len = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(pos))?;
    Ok(len)
}

/// Counts the non-zero bytes in `len` bytes starting at `offset`.
///
/// The region is read in bounded chunks so arbitrarily large gaps can be scanned.
pub fn count_nonzero_at<T: Read + Seek>(reader: &mut T, offset: u64, len: u64) -> io::Result<u64> {
    const CHUNK: u64 = 64 * 1024;

    let mut buffer = vec![0u8; CHUNK.min(len) as usize];
    let mut nonzero = 0;
    let mut done = 0;

    while done < len {
        let step = CHUNK.min(len - done) as usize;
        read_at(reader, offset + done, &mut buffer[..step])?;
        nonzero += buffer[..step].iter().filter(|b| **b != 0).count() as u64;
        done += step as u64;
    }

    Ok(nonzero)
}

/// Extracts a 32-bit unsigned integer from a buffer at a given offset.
///
/// # Panics
///
/// Panics if the slice does not contain enough bytes starting from the offset.
pub fn u32_at(buffer: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buffer[offset],
        buffer[offset + 1],
        buffer[offset + 2],
        buffer[offset + 3],
    ])
}

/// Extracts a 8-bit unsigned integer from a buffer at a given offset.
///
/// # Panics
///
/// Panics if the offset is out of bounds.
pub fn u8_at(buffer: &[u8], offset: usize) -> u8 {
    buffer[offset]
}

/// Decodes a fixed-width, space or NUL padded on-disk label.
pub fn trimmed_label(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches(['\0', ' '])
        .to_string()
}
