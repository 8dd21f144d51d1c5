use std::path::PathBuf;
use thiserror::Error;

/// errors raised by the sizing and assembly core
#[derive(Error, Debug)]
pub enum ConvertError {
    /// unrecognized page or image size value
    #[error("Unknown {option} value: {value}")]
    InvalidOption { option: &'static str, value: String },

    /// file could not be opened or decoded as an image
    #[error("Failed to read image {}: {source}", .path.display())]
    ImageRead {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("No input images provided")]
    NoImages,
}

impl ConvertError {
    pub fn invalid_option(option: &'static str, value: impl Into<String>) -> Self {
        ConvertError::InvalidOption {
            option,
            value: value.into(),
        }
    }
}
