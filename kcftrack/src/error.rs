//! Error types for the tracking library

use thiserror::Error;

/// Result type alias for the tracking library
pub type Result<T> = std::result::Result<T, KcfError>;

/// Recoverable errors raised while configuring the tracker or wrapping frames.
///
/// Tracking itself has no recoverable failure modes: precondition violations
/// (negative initial size, `update` before `init`, mismatched tensor shapes)
/// panic instead.
#[derive(Error, Debug)]
pub enum KcfError {
    #[error("Invalid tracker configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid frame: expected {expected} bytes for {width}x{height}x{channels}, got {actual}")]
    InvalidFrame {
        width: u32,
        height: u32,
        channels: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Unsupported channel count: {0}")]
    UnsupportedChannels(usize),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),
}

impl KcfError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
