use std::fmt;

use super::packer::PackError;

/// Whole-build failure.
///
/// None of these touch a previously completed sprite sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum AtlasError {
    /// A frame's scaled size exceeds the maximum atlas dimensions.
    DimensionsExceeded {
        frame: usize,
        width: u32,
        height: u32,
        max_width: u32,
        max_height: u32,
    },
    /// A build was requested while another one is in progress.
    AlreadyRunning,
    /// The in-progress build was stopped before completing.
    BuildAborted,
    /// Stepping was requested with no build in progress.
    NotRunning,
    /// A frame's source or setup target is borrowed elsewhere. A step
    /// reporting this leaves the build running and retries the frame next
    /// time; a synchronous `build` fails with it.
    SourceBusy { frame: usize },
}

impl fmt::Display for AtlasError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtlasError::DimensionsExceeded { frame, width, height, max_width, max_height } => write!(
                f,
                "frame {frame} is {width}x{height}, which exceeds the maximum atlas size {max_width}x{max_height}"
            ),
            AtlasError::AlreadyRunning => f.write_str("a build is already running"),
            AtlasError::BuildAborted => f.write_str("the build was aborted"),
            AtlasError::NotRunning => f.write_str("no build is running"),
            AtlasError::SourceBusy { frame } => write!(f, "the source of frame {frame} is borrowed elsewhere"),
        }
    }
}

impl std::error::Error for AtlasError {}

impl From<PackError> for AtlasError {
    fn from(err: PackError) -> Self {
        match err {
            PackError::DimensionsExceeded { item, width, height, max_width, max_height } => {
                AtlasError::DimensionsExceeded { frame: item, width, height, max_width, max_height }
            }
        }
    }
}
