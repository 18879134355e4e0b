//! This module defines the command-line configuration of the tool and its parser.
//!
//! Accepted flags:
//! - `-i <path>`: disk image to inspect (required)
//! - `-f <fat12|fat16|fat32|ntfs|raw>`: file system the image is expected to hold (required)
//! - `-v`: verbose output, including the dump of the FAT
//! - `-h`: scan the slack of files and partition gaps for hidden data
//! - `-d <depth>`: deepest directory level walked

use std::path::PathBuf;
use thiserror::Error;

use crate::filesystem::walker::{DEFAULT_MAX_DEPTH, ScanOptions};
use crate::partition::signature::{FSKind, ParseFSKindError};

/// Usage string printed on argument errors.
pub const USAGE: &str = "Usage: main -i <image> -f <fat12|fat16|fat32|ntfs|raw> [-v] [-h] [-d <depth>]";

/// Errors raised while parsing the command line.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ArgsError {
    #[error("Missing required flag `{0}`")]
    MissingFlag(&'static str),
    #[error("Missing value after `{0}`")]
    MissingValue(String),
    #[error("Unknown argument `{0}`")]
    UnknownArgument(String),
    #[error(transparent)]
    InvalidFileSystem(#[from] ParseFSKindError),
    #[error("Invalid depth `{0}`: expected an unsigned integer")]
    InvalidDepth(String),
}

/// Run configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    pub image_path: PathBuf,
    pub fs_type: FSKind,
    pub verbose: bool,
    pub hidden: bool,
    pub max_depth: usize,
}

impl Args {
    /// Parses the arguments following the program name.
    pub fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Self, ArgsError> {
        let mut image_path = None;
        let mut fs_type = None;
        let mut verbose = false;
        let mut hidden = false;
        let mut max_depth = DEFAULT_MAX_DEPTH;

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-i" => image_path = Some(PathBuf::from(Self::value(&arg, args.next())?)),
                "-f" => fs_type = Some(Self::value(&arg, args.next())?.parse::<FSKind>()?),
                "-v" => verbose = true,
                "-h" => hidden = true,
                "-d" => {
                    let value = Self::value(&arg, args.next())?;
                    max_depth = value
                        .parse::<usize>()
                        .map_err(|_| ArgsError::InvalidDepth(value))?;
                }
                _ => return Err(ArgsError::UnknownArgument(arg)),
            }
        }

        Ok(Self {
            image_path: image_path.ok_or(ArgsError::MissingFlag("-i"))?,
            fs_type: fs_type.ok_or(ArgsError::MissingFlag("-f"))?,
            verbose,
            hidden,
            max_depth,
        })
    }

    fn value(flag: &str, value: Option<String>) -> Result<String, ArgsError> {
        value.ok_or_else(|| ArgsError::MissingValue(flag.to_string()))
    }

    /// Options handed to the analysis.
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            scan_hidden: self.hidden,
            max_depth: self.max_depth,
        }
    }
}
