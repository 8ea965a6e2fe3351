//! Error types for the dental face scan capture core.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding failed
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Capture metadata could not be serialized
    #[error("Metadata serialization error: {0}")]
    Metadata(#[from] serde_json::Error),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Camera frame could not be decoded into a color image
    #[error("Frame decode error: {0}")]
    FrameDecode(String),

    /// Face/landmark detector failed on a frame
    #[error("Detection error: {0}")]
    Detection(String),

    /// Image quality evaluation failed on a frame
    #[error("Quality evaluation error: {0}")]
    Quality(String),

    /// Still storage operation failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Reconstruction engine reported a processing failure
    #[error("Reconstruction error: {0}")]
    Reconstruction(String),

    /// Too few stills to start a reconstruction
    #[error("Not enough valid photos for reconstruction: {found} found, {required} required")]
    InsufficientImages {
        /// Number of images that were staged
        found: usize,
        /// Minimum number of images the engine needs
        required: usize,
    },

    /// A reconstruction job is already running for this session
    #[error("Reconstruction already in progress")]
    JobInProgress,

    /// Operation was cancelled before completion
    #[error("Operation cancelled")]
    Cancelled,

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
