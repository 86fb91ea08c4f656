//! PDU Session Resource Relay
//!
//! Carries the per-session N2 SM transfers of Initial Context Setup and the
//! PDU Session Resource procedures between the RAN and the SMF. Items are
//! relayed one at a time; an item whose session is unknown or whose update
//! the SMF rejects is logged and skipped without aborting the message.

use amf_ngap::diagnostics::MissingIes;
use amf_ngap::ie::{Criticality, TriggeringMessage};
use amf_ngap::{
    AmfUeNgapId, CauseRadioNetwork, InitialContextSetupFailure, InitialContextSetupResponse,
    PduSessionId, PduSessionResourceItem, PduSessionResourceModifyConfirm,
    PduSessionResourceModifyIndication, PduSessionResourceModifyItemModReq,
    PduSessionResourceModifyRequest, PduSessionResourceModifyResponse,
    PduSessionResourceNotify, PduSessionResourceReleaseCommand,
    PduSessionResourceReleaseResponse, PduSessionResourceSetupResponse, ProcedureCode,
    ProtocolIeId, RanUeNgapId,
};

use crate::context::{AmfUe, RanNode, RanUe, UeContextReleaseAction};
use crate::ngap_handler::{report_send, NgapHandler};
use crate::sbi_path::{N2InfoType, SmUpdateKind, SmUpdateRequest, SmUpdateResponse, SmfError};

/// SMF answer for one relayed item
struct Relayed {
    pdu_session_id: PduSessionId,
    result: Result<SmUpdateResponse, SmfError>,
}

impl NgapHandler {
    /// Check the UE NGAP IDs and resolve both contexts of a UE-associated
    /// session message. Reports the problem to the RAN and returns `None`
    /// when the procedure cannot go on.
    async fn resolve_session_ue(
        &self,
        ran: &RanNode,
        amf_ue_ngap_id: Option<AmfUeNgapId>,
        ran_ue_ngap_id: Option<RanUeNgapId>,
        procedure_code: ProcedureCode,
        triggering_message: TriggeringMessage,
    ) -> Option<(RanUe, AmfUe, RanUeNgapId)> {
        let mut missing = MissingIes::default();
        let amf_ue_ngap_id = missing.require(amf_ue_ngap_id, ProtocolIeId::AMF_UE_NGAP_ID);
        let ran_ue_ngap_id = missing.require(ran_ue_ngap_id, ProtocolIeId::RAN_UE_NGAP_ID);
        let (Some(amf_ue_ngap_id), Some(ran_ue_ngap_id)) = (amf_ue_ngap_id, ran_ue_ngap_id) else {
            self.report_missing_ies(
                ran,
                missing,
                procedure_code,
                triggering_message,
                Criticality::Reject,
            )
            .await;
            return None;
        };

        let Some(ran_ue) = self.find_ran_ue(ran, Some(amf_ue_ngap_id), Some(ran_ue_ngap_id)) else {
            self.report_unknown_ue(ran, Some(amf_ue_ngap_id), Some(ran_ue_ngap_id))
                .await;
            return None;
        };
        let Some(amf_ue) = self.amf.amf_ue_of(&ran_ue) else {
            log::error!("[{}] procedure {} without AMF UE", ran_ue, procedure_code);
            return None;
        };

        Some((ran_ue, amf_ue, ran_ue_ngap_id))
    }

    /// Forward each item's transfer to the SMF as `kind`
    async fn relay_to_smf(
        &self,
        amf_ue: &AmfUe,
        items: Vec<PduSessionResourceItem>,
        kind: SmUpdateKind,
    ) -> Vec<Relayed> {
        let mut relayed = Vec::with_capacity(items.len());
        for item in items {
            let result = match amf_ue.sm_context_find(item.pdu_session_id) {
                Some(sm) => {
                    let request = SmUpdateRequest::new(kind, item.transfer);
                    self.smf.update_session(&sm.sm_ref, request).await
                }
                None => Err(SmfError::NotFound(format!("PDU session {}", item.pdu_session_id))),
            };

            if let Err(e) = &result {
                log::warn!(
                    "[{}] {} for PDU session {} not relayed: {}",
                    amf_ue.id,
                    kind.name(),
                    item.pdu_session_id,
                    e
                );
            }
            relayed.push(Relayed {
                pdu_session_id: item.pdu_session_id,
                result,
            });
        }
        relayed
    }

    // ------------------------------------------------------------------------
    // Initial Context Setup
    // ------------------------------------------------------------------------

    pub async fn handle_initial_context_setup_response(
        &self,
        ran: &RanNode,
        msg: InitialContextSetupResponse,
    ) {
        let Some((ran_ue, amf_ue, _)) = self
            .resolve_session_ue(
                ran,
                msg.amf_ue_ngap_id,
                msg.ran_ue_ngap_id,
                ProcedureCode::INITIAL_CONTEXT_SETUP,
                TriggeringMessage::SuccessfulOutcome,
            )
            .await
        else {
            return;
        };

        log::info!("[{}] Initial Context Setup Response", ran_ue);
        self.amf
            .ran_ue_modify(ran_ue.amf_ue_ngap_id, |ue| ue.initial_context_setup_done = true);

        let setup = msg.pdu_session_resource_setup_list.unwrap_or_default();
        for relayed in self
            .relay_to_smf(&amf_ue, setup, SmUpdateKind::PduResSetupRsp)
            .await
        {
            if relayed.result.is_ok() {
                amf_ue.sm_context_set_active(relayed.pdu_session_id, true);
            }
        }

        let failed = msg.pdu_session_resource_failed_to_setup_list.unwrap_or_default();
        self.relay_to_smf(&amf_ue, failed, SmUpdateKind::PduResSetupFail)
            .await;

        if let Some(diag) = msg.criticality_diagnostics {
            log::warn!("[{}] Criticality Diagnostics {:?}", ran_ue, diag);
        }
    }

    pub async fn handle_initial_context_setup_failure(
        &self,
        ran: &RanNode,
        msg: InitialContextSetupFailure,
    ) {
        let Some((ran_ue, amf_ue, _)) = self
            .resolve_session_ue(
                ran,
                msg.amf_ue_ngap_id,
                msg.ran_ue_ngap_id,
                ProcedureCode::INITIAL_CONTEXT_SETUP,
                TriggeringMessage::UnsuccessfulOutcome,
            )
            .await
        else {
            return;
        };

        let cause = msg
            .cause
            .unwrap_or_else(|| CauseRadioNetwork::Unspecified.into());
        log::warn!("[{}] Initial Context Setup Failure ({})", ran_ue, cause);

        let failed = msg.pdu_session_resource_failed_to_setup_list.unwrap_or_default();
        self.relay_to_smf(&amf_ue, failed, SmUpdateKind::PduResSetupFail)
            .await;

        self.release_ran_ue(&ran_ue, UeContextReleaseAction::NormalRelease, cause)
            .await;
    }

    // ------------------------------------------------------------------------
    // PDU Session Resource Setup / Modify / Release
    // ------------------------------------------------------------------------

    pub async fn handle_pdu_session_resource_setup_response(
        &self,
        ran: &RanNode,
        msg: PduSessionResourceSetupResponse,
    ) {
        let Some((ran_ue, amf_ue, _)) = self
            .resolve_session_ue(
                ran,
                msg.amf_ue_ngap_id,
                msg.ran_ue_ngap_id,
                ProcedureCode::PDU_SESSION_RESOURCE_SETUP,
                TriggeringMessage::SuccessfulOutcome,
            )
            .await
        else {
            return;
        };
        log::debug!("[{}] PDU Session Resource Setup Response", ran_ue);

        let setup = msg.pdu_session_resource_setup_list.unwrap_or_default();
        for relayed in self
            .relay_to_smf(&amf_ue, setup, SmUpdateKind::PduResSetupRsp)
            .await
        {
            if relayed.result.is_ok() {
                amf_ue.sm_context_set_active(relayed.pdu_session_id, true);
            }
        }

        let failed = msg.pdu_session_resource_failed_to_setup_list.unwrap_or_default();
        self.relay_to_smf(&amf_ue, failed, SmUpdateKind::PduResSetupFail)
            .await;
    }

    pub async fn handle_pdu_session_resource_modify_response(
        &self,
        ran: &RanNode,
        msg: PduSessionResourceModifyResponse,
    ) {
        let Some((ran_ue, amf_ue, _)) = self
            .resolve_session_ue(
                ran,
                msg.amf_ue_ngap_id,
                msg.ran_ue_ngap_id,
                ProcedureCode::PDU_SESSION_RESOURCE_MODIFY,
                TriggeringMessage::SuccessfulOutcome,
            )
            .await
        else {
            return;
        };
        log::debug!("[{}] PDU Session Resource Modify Response", ran_ue);

        if let Some(location) = msg.user_location_information {
            self.update_location(&ran_ue, location);
        }

        let modified = msg.pdu_session_resource_modify_list.unwrap_or_default();
        self.relay_to_smf(&amf_ue, modified, SmUpdateKind::PduResModRsp)
            .await;
        let failed = msg.pdu_session_resource_failed_to_modify_list.unwrap_or_default();
        self.relay_to_smf(&amf_ue, failed, SmUpdateKind::PduResModFail)
            .await;
    }

    pub async fn handle_pdu_session_resource_modify_indication(
        &self,
        ran: &RanNode,
        msg: PduSessionResourceModifyIndication,
    ) {
        let mut missing = MissingIes::default();
        let amf_ue_ngap_id = missing.require(msg.amf_ue_ngap_id, ProtocolIeId::AMF_UE_NGAP_ID);
        let ran_ue_ngap_id = missing.require(msg.ran_ue_ngap_id, ProtocolIeId::RAN_UE_NGAP_ID);
        let list = missing.require(
            msg.pdu_session_resource_modify_list,
            ProtocolIeId::PDU_SESSION_RESOURCE_MODIFY_LIST_MOD_IND,
        );
        let Some(list) = list.filter(|_| missing.is_empty()) else {
            self.report_missing_ies(
                ran,
                missing,
                ProcedureCode::PDU_SESSION_RESOURCE_MODIFY_INDICATION,
                TriggeringMessage::InitiatingMessage,
                Criticality::Reject,
            )
            .await;
            return;
        };

        let Some((ran_ue, amf_ue, ran_ue_ngap_id)) = self
            .resolve_session_ue(
                ran,
                amf_ue_ngap_id,
                ran_ue_ngap_id,
                ProcedureCode::PDU_SESSION_RESOURCE_MODIFY_INDICATION,
                TriggeringMessage::InitiatingMessage,
            )
            .await
        else {
            return;
        };

        let mut confirmed = Vec::new();
        let mut failed = Vec::new();
        for relayed in self
            .relay_to_smf(&amf_ue, list, SmUpdateKind::PduResModInd)
            .await
        {
            match relayed.result {
                Ok(rsp) => confirmed.push(PduSessionResourceItem {
                    pdu_session_id: relayed.pdu_session_id,
                    transfer: rsp.n2_info.unwrap_or_default(),
                }),
                Err(_) => failed.push(PduSessionResourceItem {
                    pdu_session_id: relayed.pdu_session_id,
                    transfer: Vec::new(),
                }),
            }
        }

        let confirm = PduSessionResourceModifyConfirm {
            amf_ue_ngap_id: ran_ue.amf_ue_ngap_id,
            ran_ue_ngap_id,
            pdu_session_resource_modify_list: confirmed,
            pdu_session_resource_failed_to_modify_list: failed,
        };
        log::info!(
            "[{}] PDU Session Resource Modify Confirm ({} confirmed, {} failed)",
            ran_ue,
            confirm.pdu_session_resource_modify_list.len(),
            confirm.pdu_session_resource_failed_to_modify_list.len()
        );
        let result = ran
            .sender()
            .send_pdu_session_resource_modify_confirm(confirm)
            .await;
        report_send(ran, "PDUSessionResourceModifyConfirm", result);
    }

    pub async fn handle_pdu_session_resource_release_response(
        &self,
        ran: &RanNode,
        msg: PduSessionResourceReleaseResponse,
    ) {
        let Some((ran_ue, amf_ue, _)) = self
            .resolve_session_ue(
                ran,
                msg.amf_ue_ngap_id,
                msg.ran_ue_ngap_id,
                ProcedureCode::PDU_SESSION_RESOURCE_RELEASE,
                TriggeringMessage::SuccessfulOutcome,
            )
            .await
        else {
            return;
        };
        log::debug!("[{}] PDU Session Resource Release Response", ran_ue);

        if let Some(location) = msg.user_location_information {
            self.update_location(&ran_ue, location);
        }

        let released = msg.pdu_session_resource_released_list.unwrap_or_default();
        for relayed in self
            .relay_to_smf(&amf_ue, released, SmUpdateKind::PduResRelRsp)
            .await
        {
            if relayed.result.is_ok() {
                amf_ue.sm_context_set_active(relayed.pdu_session_id, false);
            }
        }
    }

    // ------------------------------------------------------------------------
    // PDU Session Resource Notify
    // ------------------------------------------------------------------------

    pub async fn handle_pdu_session_resource_notify(
        &self,
        ran: &RanNode,
        msg: PduSessionResourceNotify,
    ) {
        let Some((ran_ue, amf_ue, ran_ue_ngap_id)) = self
            .resolve_session_ue(
                ran,
                msg.amf_ue_ngap_id,
                msg.ran_ue_ngap_id,
                ProcedureCode::PDU_SESSION_RESOURCE_NOTIFY,
                TriggeringMessage::InitiatingMessage,
            )
            .await
        else {
            return;
        };
        log::debug!("[{}] PDU Session Resource Notify", ran_ue);

        if let Some(location) = msg.user_location_information {
            self.update_location(&ran_ue, location);
        }

        let mut modify_list = Vec::new();
        let notified = msg.pdu_session_resource_notify_list.unwrap_or_default();
        for relayed in self
            .relay_to_smf(&amf_ue, notified, SmUpdateKind::PduResNty)
            .await
        {
            if let Ok(SmUpdateResponse {
                n1_msg,
                n2_info: Some(transfer),
                n2_info_type: Some(N2InfoType::PduResModReq),
            }) = relayed.result
            {
                modify_list.push(PduSessionResourceModifyItemModReq {
                    pdu_session_id: relayed.pdu_session_id,
                    nas_pdu: n1_msg,
                    transfer,
                });
            }
        }

        let mut release_list = Vec::new();
        let mut release_nas_pdu = None;
        let released = msg.pdu_session_resource_released_list.unwrap_or_default();
        for relayed in self
            .relay_to_smf(&amf_ue, released, SmUpdateKind::PduResNtyRel)
            .await
        {
            if let Ok(SmUpdateResponse {
                n1_msg,
                n2_info: Some(transfer),
                n2_info_type: Some(N2InfoType::PduResRelCmd),
            }) = relayed.result
            {
                release_nas_pdu = release_nas_pdu.or(n1_msg);
                release_list.push(PduSessionResourceItem {
                    pdu_session_id: relayed.pdu_session_id,
                    transfer,
                });
            }
        }

        if !modify_list.is_empty() {
            let request = PduSessionResourceModifyRequest {
                amf_ue_ngap_id: ran_ue.amf_ue_ngap_id,
                ran_ue_ngap_id,
                pdu_session_resource_modify_list: modify_list,
            };
            let result = ran
                .sender()
                .send_pdu_session_resource_modify_request(request)
                .await;
            report_send(ran, "PDUSessionResourceModifyRequest", result);
        }

        if !release_list.is_empty() {
            let command = PduSessionResourceReleaseCommand {
                amf_ue_ngap_id: ran_ue.amf_ue_ngap_id,
                ran_ue_ngap_id,
                nas_pdu: release_nas_pdu,
                pdu_session_resource_to_release_list: release_list,
            };
            let result = ran
                .sender()
                .send_pdu_session_resource_release_command(command)
                .await;
            report_send(ran, "PDUSessionResourceReleaseCommand", result);
        }
    }
}
