use std::path::PathBuf;

use thiserror::Error;

/// Library error type for frame-controller operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration file does not exist at the canonical path.
    #[error("config file not found: {0}")]
    ConfigNotFound(PathBuf),

    /// The configuration file parsed to zero recognized entries.
    #[error("config file is empty: {0}")]
    ConfigEmpty(PathBuf),

    /// The stored display mode is neither `fit` nor `fill`.
    #[error("invalid display mode in config: {0}")]
    InvalidMode(String),

    /// A rotation angle that is not a multiple of 90 degrees.
    #[error("invalid display rotation: {0}")]
    InvalidRotation(i64),

    /// The configured image directory does not exist.
    #[error("image directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    /// A candidate file could not be decoded into pixels.
    #[error("failed to decode image {path}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Rotate was requested before anything was displayed.
    #[error("no active image to operate on")]
    NoActiveImage,

    /// Composing the frame for the panel failed.
    #[error("render error: {0}")]
    Render(String),

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// YAML/serde configuration error.
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Fatal errors are re-raised after the error screen is rendered;
    /// everything else is absorbed by a fallback path.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound(_) | Self::ConfigEmpty(_) | Self::InvalidMode(_) | Self::Yaml(_)
        )
    }
}
