//! Error types for spectrogram preparation and mask processing

use thiserror::Error;

/// Errors that can occur while preparing or post-processing spectrograms
#[derive(Debug, Error)]
pub enum SeparationError {
    /// Audio could not be read, decoded or resampled
    #[error("Decoding error: {0}")]
    DecodingError(String),

    /// Invalid input parameters (wrong channel count, too-short signal, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Array shapes disagree where they must match
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Numerical error (degenerate normalization, etc.)
    #[error("Numerical error: {0}")]
    NumericalError(String),

    /// Cache read/write failure, including unreadable cache files
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, SeparationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = SeparationError::InvalidInput("waveform has 1 channel".to_string());
        assert_eq!(err.to_string(), "Invalid input: waveform has 1 channel");

        let err = SeparationError::ShapeMismatch("[2, 3, 4] vs [2, 3, 5]".to_string());
        assert!(err.to_string().starts_with("Shape mismatch"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.npy");
        let err: SeparationError = io.into();
        assert!(matches!(err, SeparationError::Io(_)));
        assert!(err.to_string().contains("missing.npy"));
    }
}
