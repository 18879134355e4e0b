//! FAT volume decoding: boot sector, allocation table, cluster chains and directory tree.

pub mod bpb;
pub mod chain;
pub mod dir_entry;
pub mod fat;
pub mod fat_error;
pub mod fat_table;
pub mod fat_type;
pub mod geometry;
pub mod reader;
pub mod tree;
pub mod walker;
