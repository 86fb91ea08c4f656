//! NAS Collaborator
//!
//! NGAP hands every uplink NAS container to a [`NasHandler`]. The NAS codec
//! and the GMM state machine live behind it.

use async_trait::async_trait;
use thiserror::Error;

use crate::context::RanUe;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NasError {
    #[error("NAS message decoding failed: {0}")]
    Decode(String),

    #[error("NAS message rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait NasHandler: Send + Sync {
    /// Process one uplink NAS PDU received on `ran_ue`
    async fn handle(&self, ran_ue: &RanUe, nas_pdu: &[u8]) -> Result<(), NasError>;
}

/// NAS stand-in that logs and accepts every container
#[derive(Debug, Default)]
pub struct LoggingNas;

#[async_trait]
impl NasHandler for LoggingNas {
    async fn handle(&self, ran_ue: &RanUe, nas_pdu: &[u8]) -> Result<(), NasError> {
        if nas_pdu.is_empty() {
            return Err(NasError::Decode("empty NAS-PDU".to_string()));
        }
        log::debug!("[{}] NAS-PDU ({} bytes)", ran_ue, nas_pdu.len());
        Ok(())
    }
}
