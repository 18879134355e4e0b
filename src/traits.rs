//! Declaration of traits reused across the code.

use std::fmt;

/// Implementation of the LayoutDisplay trait.
/// It is used to display the layout of a given structure such as a disk or partition.
pub trait LayoutDisplay {
    fn display_layout(&self, indent: u8) -> Result<String, fmt::Error>;
}

/// Renders a directory hierarchy, one entry per line.
pub trait TreeDisplay {
    fn display_tree(&self) -> Result<String, fmt::Error>;
}
