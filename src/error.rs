//! Error types for the rendering pipeline

use thiserror::Error;

use crate::fonts::FontStyle;
use crate::templates::ValidationErrors;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while turning a request into an image
#[derive(Error, Debug)]
pub enum Error {
    /// Template parameters did not satisfy the declared schema
    #[error("Invalid parameters: {0}")]
    ValidationError(ValidationErrors),

    /// A font could not be located for the requested family/weight/style
    #[error("Font not found: {family} {weight} {style}: {reason}")]
    FontNotFoundError {
        family: String,
        weight: u16,
        style: FontStyle,
        reason: String,
    },

    /// No template is registered under the requested name
    #[error("Template \"{name}\" not found. Available templates: {}", available.join(", "))]
    TemplateNotFoundError { name: String, available: Vec<String> },

    /// The layout engine rejected the element tree
    #[error("Layout failed: {0}")]
    RenderError(String),

    /// The rasterizer or the re-encoder rejected the vector output
    #[error("Rasterization failed: {0}")]
    RasterError(String),

    /// Writing or uploading the image failed
    #[error("Delivery failed: {0}")]
    DeliveryError(String),

    /// Network error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ValidationErrors> for Error {
    fn from(errors: ValidationErrors) -> Self {
        Error::ValidationError(errors)
    }
}

#[cfg(feature = "remote")]
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::NetworkError(err.to_string())
    }
}
