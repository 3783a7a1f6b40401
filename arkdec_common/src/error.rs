//! Error handling utilities for the arkdec decompiler

use thiserror::Error;

/// The main error type for the decompiler pipeline
#[derive(Error, Debug, Clone)]
pub enum ArkError {
    #[error("Decode error: {message}")]
    DecodeError { message: String },

    #[error("Conversion error: {message}")]
    ConvertError { message: String },

    #[error("Pass error: {message}")]
    PassError { message: String },

    #[error("Verification error: {message}")]
    VerifyError { message: String },
}

/// Result type alias for decompiler operations
pub type ArkResult<T> = Result<T, ArkError>;

impl ArkError {
    pub fn decode_error(message: impl Into<String>) -> Self {
        Self::DecodeError { message: message.into() }
    }

    pub fn convert_error(message: impl Into<String>) -> Self {
        Self::ConvertError { message: message.into() }
    }

    pub fn pass_error(message: impl Into<String>) -> Self {
        Self::PassError { message: message.into() }
    }

    pub fn verify_error(message: impl Into<String>) -> Self {
        Self::VerifyError { message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ArkError::decode_error("truncated stream");
        assert_eq!(error.to_string(), "Decode error: truncated stream");

        let error = ArkError::pass_error("simplify-cfg failed");
        assert!(error.to_string().contains("simplify-cfg"));
    }
}
