//! NGAP Message Sending
//!
//! The outbound path towards one RAN node. [`RanSender`] has one method per
//! message the AMF originates; every method builds the PDU and funnels it
//! through [`RanSender::send_pdu`], the only method an implementation must
//! provide.

use std::sync::Arc;

use amf_ngap::{
    AmfUeNgapId, Cause, CriticalityDiagnostics, DownlinkRanConfigurationTransfer,
    HandoverCommand, HandoverRequest, InitiatingMessage, NgapCodec, NgapError, NgapPdu,
    PathSwitchRequestAcknowledge, PduSessionResourceItem, PduSessionResourceModifyConfirm,
    PduSessionResourceModifyRequest, PduSessionResourceReleaseCommand,
    PduSessionResourceSetupRequest, RanUeNgapId, SuccessfulOutcome, TimeToWait,
    UeAssociatedLogicalNgConnectionItem, UeNgapIds,
};
use async_trait::async_trait;
use thiserror::Error;

use crate::context::{AssociationId, OperatorInfo};
use crate::ngap_build;
use crate::ngap_path::NgapTransport;

#[derive(Error, Debug)]
pub enum SendError {
    #[error("NGAP encoding failed: {0}")]
    Encode(#[from] NgapError),

    #[error("transport error on association {assoc}: {reason}")]
    Transport { assoc: AssociationId, reason: String },
}

/// Outbound NGAP messages towards one RAN node
#[async_trait]
pub trait RanSender: Send + Sync {
    async fn send_pdu(&self, pdu: NgapPdu) -> Result<(), SendError>;

    async fn send_ng_setup_response(&self, operator: &OperatorInfo) -> Result<(), SendError> {
        self.send_pdu(ngap_build::build_ng_setup_response(operator)).await
    }

    async fn send_ng_setup_failure(
        &self,
        cause: Cause,
        time_to_wait: Option<TimeToWait>,
    ) -> Result<(), SendError> {
        self.send_pdu(ngap_build::build_ng_setup_failure(cause, time_to_wait))
            .await
    }

    async fn send_ran_configuration_update_ack(&self) -> Result<(), SendError> {
        self.send_pdu(ngap_build::build_ran_configuration_update_ack())
            .await
    }

    async fn send_ran_configuration_update_failure(
        &self,
        cause: Cause,
        time_to_wait: Option<TimeToWait>,
    ) -> Result<(), SendError> {
        self.send_pdu(ngap_build::build_ran_configuration_update_failure(
            cause,
            time_to_wait,
        ))
        .await
    }

    async fn send_ng_reset_ack(
        &self,
        partial: Option<Vec<UeAssociatedLogicalNgConnectionItem>>,
    ) -> Result<(), SendError> {
        self.send_pdu(ngap_build::build_ng_reset_ack(partial)).await
    }

    async fn send_error_indication(
        &self,
        amf_ue_ngap_id: Option<AmfUeNgapId>,
        ran_ue_ngap_id: Option<RanUeNgapId>,
        cause: Option<Cause>,
        criticality_diagnostics: Option<CriticalityDiagnostics>,
    ) -> Result<(), SendError> {
        self.send_pdu(ngap_build::build_error_indication(
            amf_ue_ngap_id,
            ran_ue_ngap_id,
            cause,
            criticality_diagnostics,
        ))
        .await
    }

    async fn send_ue_context_release_command(
        &self,
        ue_ngap_ids: UeNgapIds,
        cause: Cause,
    ) -> Result<(), SendError> {
        self.send_pdu(ngap_build::build_ue_context_release_command(ue_ngap_ids, cause))
            .await
    }

    async fn send_downlink_nas_transport(
        &self,
        amf_ue_ngap_id: AmfUeNgapId,
        ran_ue_ngap_id: RanUeNgapId,
        nas_pdu: Vec<u8>,
    ) -> Result<(), SendError> {
        self.send_pdu(ngap_build::build_downlink_nas_transport(
            amf_ue_ngap_id,
            ran_ue_ngap_id,
            nas_pdu,
        ))
        .await
    }

    async fn send_handover_request(&self, request: HandoverRequest) -> Result<(), SendError> {
        self.send_pdu(InitiatingMessage::HandoverRequest(request).into())
            .await
    }

    async fn send_handover_command(&self, command: HandoverCommand) -> Result<(), SendError> {
        self.send_pdu(SuccessfulOutcome::HandoverCommand(command).into())
            .await
    }

    async fn send_handover_preparation_failure(
        &self,
        amf_ue_ngap_id: AmfUeNgapId,
        ran_ue_ngap_id: RanUeNgapId,
        cause: Cause,
        criticality_diagnostics: Option<CriticalityDiagnostics>,
    ) -> Result<(), SendError> {
        self.send_pdu(ngap_build::build_handover_preparation_failure(
            amf_ue_ngap_id,
            ran_ue_ngap_id,
            cause,
            criticality_diagnostics,
        ))
        .await
    }

    async fn send_handover_cancel_ack(
        &self,
        amf_ue_ngap_id: AmfUeNgapId,
        ran_ue_ngap_id: RanUeNgapId,
    ) -> Result<(), SendError> {
        self.send_pdu(ngap_build::build_handover_cancel_ack(amf_ue_ngap_id, ran_ue_ngap_id))
            .await
    }

    async fn send_path_switch_request_ack(
        &self,
        ack: PathSwitchRequestAcknowledge,
    ) -> Result<(), SendError> {
        self.send_pdu(SuccessfulOutcome::PathSwitchRequestAcknowledge(ack).into())
            .await
    }

    async fn send_path_switch_request_failure(
        &self,
        amf_ue_ngap_id: AmfUeNgapId,
        ran_ue_ngap_id: RanUeNgapId,
        released: Vec<PduSessionResourceItem>,
        criticality_diagnostics: Option<CriticalityDiagnostics>,
    ) -> Result<(), SendError> {
        self.send_pdu(ngap_build::build_path_switch_request_failure(
            amf_ue_ngap_id,
            ran_ue_ngap_id,
            released,
            criticality_diagnostics,
        ))
        .await
    }

    async fn send_pdu_session_resource_setup_request(
        &self,
        request: PduSessionResourceSetupRequest,
    ) -> Result<(), SendError> {
        self.send_pdu(InitiatingMessage::PduSessionResourceSetupRequest(request).into())
            .await
    }

    async fn send_pdu_session_resource_modify_request(
        &self,
        request: PduSessionResourceModifyRequest,
    ) -> Result<(), SendError> {
        self.send_pdu(InitiatingMessage::PduSessionResourceModifyRequest(request).into())
            .await
    }

    async fn send_pdu_session_resource_modify_confirm(
        &self,
        confirm: PduSessionResourceModifyConfirm,
    ) -> Result<(), SendError> {
        self.send_pdu(SuccessfulOutcome::PduSessionResourceModifyConfirm(confirm).into())
            .await
    }

    async fn send_pdu_session_resource_release_command(
        &self,
        command: PduSessionResourceReleaseCommand,
    ) -> Result<(), SendError> {
        self.send_pdu(InitiatingMessage::PduSessionResourceReleaseCommand(command).into())
            .await
    }

    async fn send_downlink_ran_configuration_transfer(
        &self,
        transfer: DownlinkRanConfigurationTransfer,
    ) -> Result<(), SendError> {
        self.send_pdu(InitiatingMessage::DownlinkRanConfigurationTransfer(transfer).into())
            .await
    }
}

/// Sender bound to one transport association
pub struct NgapSender {
    assoc: AssociationId,
    codec: Arc<dyn NgapCodec>,
    transport: Arc<dyn NgapTransport>,
}

impl NgapSender {
    pub fn new(
        assoc: AssociationId,
        codec: Arc<dyn NgapCodec>,
        transport: Arc<dyn NgapTransport>,
    ) -> Self {
        Self {
            assoc,
            codec,
            transport,
        }
    }
}

#[async_trait]
impl RanSender for NgapSender {
    async fn send_pdu(&self, pdu: NgapPdu) -> Result<(), SendError> {
        let data = self.codec.encode(&pdu)?;
        log::debug!(
            "[assoc:{}] Sending {} ({} bytes)",
            self.assoc,
            pdu.name(),
            data.len()
        );
        self.transport.send(self.assoc, data).await
    }
}

/// Creates the sender for a newly seen association
pub trait SenderFactory: Send + Sync {
    fn sender_for(&self, assoc: AssociationId) -> Arc<dyn RanSender>;
}

/// Factory producing [`NgapSender`]s over one codec and transport
pub struct NgapSenderFactory {
    codec: Arc<dyn NgapCodec>,
    transport: Arc<dyn NgapTransport>,
}

impl NgapSenderFactory {
    pub fn new(codec: Arc<dyn NgapCodec>, transport: Arc<dyn NgapTransport>) -> Self {
        Self { codec, transport }
    }
}

impl SenderFactory for NgapSenderFactory {
    fn sender_for(&self, assoc: AssociationId) -> Arc<dyn RanSender> {
        Arc::new(NgapSender::new(
            assoc,
            self.codec.clone(),
            self.transport.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amf_ngap::{CauseNas, JsonCodec, UnsuccessfulOutcome};
    use bytes::Bytes;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CaptureTransport {
        frames: Mutex<Vec<(AssociationId, Bytes)>>,
    }

    #[async_trait]
    impl NgapTransport for CaptureTransport {
        async fn send(&self, assoc: AssociationId, data: Bytes) -> Result<(), SendError> {
            self.frames.lock().unwrap().push((assoc, data));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_sender_encodes_and_sends() {
        let transport = Arc::new(CaptureTransport::default());
        let factory = NgapSenderFactory::new(Arc::new(JsonCodec), transport.clone());
        let sender = factory.sender_for(42);

        sender
            .send_ue_context_release_command(
                UeNgapIds::Pair {
                    amf_ue_ngap_id: 1,
                    ran_ue_ngap_id: 2,
                },
                CauseNas::NormalRelease.into(),
            )
            .await
            .unwrap();

        let frames = transport.frames.lock().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].0, 42);

        let pdu = JsonCodec.decode(&frames[0].1).unwrap();
        match pdu {
            NgapPdu::InitiatingMessage(InitiatingMessage::UeContextReleaseCommand(cmd)) => {
                assert_eq!(cmd.cause, Cause::Nas(CauseNas::NormalRelease));
            }
            _ => panic!("Expected UE Context Release Command"),
        }
    }

    #[tokio::test]
    async fn test_sender_preparation_failure() {
        let transport = Arc::new(CaptureTransport::default());
        let sender = NgapSender::new(7, Arc::new(JsonCodec), transport.clone());

        sender
            .send_handover_preparation_failure(1, 2, CauseNas::AuthenticationFailure.into(), None)
            .await
            .unwrap();

        let frames = transport.frames.lock().unwrap();
        match JsonCodec.decode(&frames[0].1).unwrap() {
            NgapPdu::UnsuccessfulOutcome(UnsuccessfulOutcome::HandoverPreparationFailure(f)) => {
                assert_eq!(f.amf_ue_ngap_id, 1);
                assert_eq!(f.ran_ue_ngap_id, 2);
            }
            _ => panic!("Expected Handover Preparation Failure"),
        }
    }
}
