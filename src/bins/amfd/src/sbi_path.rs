//! AMF SBI Path - SMF Collaborator
//!
//! The N11 boundary towards the SMF. Every PDU session resource payload the
//! AMF receives over N2 is forwarded here as an SM context update keyed by
//! the opaque SM context reference.

use async_trait::async_trait;
use thiserror::Error;

/// N2 SM information type of an SM context update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SmUpdateKind {
    PduResSetupRsp,
    PduResSetupFail,
    PduResModRsp,
    PduResModFail,
    PduResModInd,
    PduResRelRsp,
    PduResNty,
    PduResNtyRel,
    /// Deactivate the user plane (UE moving to CM-IDLE)
    Deactivate,
    HandoverRequired,
    HandoverRequestAck,
    HandoverResAllocFail,
    HandoverComplete,
    HandoverCancelled,
    PathSwitchRequest,
    PathSwitchSetupFailed,
}

impl SmUpdateKind {
    pub fn name(&self) -> &'static str {
        match self {
            SmUpdateKind::PduResSetupRsp => "PDU_RES_SETUP_RSP",
            SmUpdateKind::PduResSetupFail => "PDU_RES_SETUP_FAIL",
            SmUpdateKind::PduResModRsp => "PDU_RES_MOD_RSP",
            SmUpdateKind::PduResModFail => "PDU_RES_MOD_FAIL",
            SmUpdateKind::PduResModInd => "PDU_RES_MOD_IND",
            SmUpdateKind::PduResRelRsp => "PDU_RES_REL_RSP",
            SmUpdateKind::PduResNty => "PDU_RES_NTY",
            SmUpdateKind::PduResNtyRel => "PDU_RES_NTY_REL",
            SmUpdateKind::Deactivate => "DEACTIVATE",
            SmUpdateKind::HandoverRequired => "HANDOVER_REQUIRED",
            SmUpdateKind::HandoverRequestAck => "HANDOVER_REQ_ACK",
            SmUpdateKind::HandoverResAllocFail => "HANDOVER_RES_ALLOC_FAIL",
            SmUpdateKind::HandoverComplete => "HANDOVER_COMPLETE",
            SmUpdateKind::HandoverCancelled => "HANDOVER_CANCELLED",
            SmUpdateKind::PathSwitchRequest => "PATH_SWITCH_REQ",
            SmUpdateKind::PathSwitchSetupFailed => "PATH_SWITCH_SETUP_FAIL",
        }
    }
}

/// N2 SM information type carried back by the SMF
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum N2InfoType {
    PduResSetupReq,
    PduResModReq,
    PduResModCfm,
    PduResRelCmd,
    HandoverCmd,
    HandoverReqAck,
    PathSwitchReqAck,
}

/// SM context update request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmUpdateRequest {
    pub kind: SmUpdateKind,
    /// Opaque N2 SM information from the RAN
    pub transfer: Vec<u8>,
}

impl SmUpdateRequest {
    pub fn new(kind: SmUpdateKind, transfer: Vec<u8>) -> Self {
        Self { kind, transfer }
    }
}

/// SM context update response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SmUpdateResponse {
    /// N1 SM message for the UE
    pub n1_msg: Option<Vec<u8>>,
    /// N2 SM information for the RAN
    pub n2_info: Option<Vec<u8>>,
    pub n2_info_type: Option<N2InfoType>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SmfError {
    #[error("SM context {0} not found")]
    NotFound(String),

    #[error("SM context {sm_ref} rejected the update: {reason}")]
    Rejected { sm_ref: String, reason: String },

    #[error("SMF unreachable: {0}")]
    Unreachable(String),
}

/// Session management operations the AMF needs from the SMF
#[async_trait]
pub trait SmfClient: Send + Sync {
    async fn update_session(
        &self,
        sm_ref: &str,
        request: SmUpdateRequest,
    ) -> Result<SmUpdateResponse, SmfError>;

    async fn release_session(&self, sm_ref: &str) -> Result<(), SmfError>;
}

/// SMF stand-in that accepts every update and hands the RAN transfer back
/// unchanged as the N2 payload
#[derive(Debug, Default)]
pub struct NullSmf;

#[async_trait]
impl SmfClient for NullSmf {
    async fn update_session(
        &self,
        sm_ref: &str,
        request: SmUpdateRequest,
    ) -> Result<SmUpdateResponse, SmfError> {
        log::debug!(
            "[{}] SM context update {} ({} bytes)",
            sm_ref,
            request.kind.name(),
            request.transfer.len()
        );
        Ok(SmUpdateResponse {
            n1_msg: None,
            n2_info: Some(request.transfer),
            n2_info_type: None,
        })
    }

    async fn release_session(&self, sm_ref: &str) -> Result<(), SmfError> {
        log::debug!("[{}] SM context release", sm_ref);
        Ok(())
    }
}
