//! NGAP Error Types

use thiserror::Error;

/// Errors that can occur during NGAP message processing
#[derive(Error, Debug)]
pub enum NgapError {
    /// Payload could not be decoded into an NGAP-PDU
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Encoding error
    #[error("Encoding error: {0}")]
    EncodingError(String),
}

pub type NgapResult<T> = Result<T, NgapError>;
