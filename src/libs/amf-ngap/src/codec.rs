//! NGAP Codec
//!
//! The byte-level encoding of NGAP-PDUs sits behind [`NgapCodec`] so the AMF
//! can run against a PER codec in production and a readable encoding in
//! tests and lab setups.

use bytes::Bytes;

use crate::error::{NgapError, NgapResult};
use crate::pdu::NgapPdu;

/// Encode/decode NGAP-PDUs
pub trait NgapCodec: Send + Sync {
    fn decode(&self, data: &[u8]) -> NgapResult<NgapPdu>;
    fn encode(&self, pdu: &NgapPdu) -> NgapResult<Bytes>;
}

/// JSON encoding of [`NgapPdu`]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl NgapCodec for JsonCodec {
    fn decode(&self, data: &[u8]) -> NgapResult<NgapPdu> {
        if data.is_empty() {
            return Err(NgapError::DecodeError("empty payload".to_string()));
        }
        serde_json::from_slice(data).map_err(|e| NgapError::DecodeError(e.to_string()))
    }

    fn encode(&self, pdu: &NgapPdu) -> NgapResult<Bytes> {
        serde_json::to_vec(pdu)
            .map(Bytes::from)
            .map_err(|e| NgapError::EncodingError(e.to_string()))
    }
}
