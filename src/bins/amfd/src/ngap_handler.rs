//! NGAP Message Handling
//!
//! Procedure handlers for RAN-originated NGAP messages that are not part of
//! mobility or PDU session resource management (those live in
//! `ngap_handover` and `pdu_relay`). Every handler receives the RAN node the
//! message arrived on and the decoded message, resolves the UE contexts it
//! needs from the shared [`AmfContext`] and answers through the RAN node's
//! sender.

use std::sync::Arc;

use amf_ngap::diagnostics::MissingIes;
use amf_ngap::ie::{Criticality, TriggeringMessage};
use amf_ngap::{
    AmfUeNgapId, Cause, CauseMisc, CauseProtocol, CauseRadioNetwork, CriticalityDiagnostics,
    DownlinkRanConfigurationTransfer, ErrorIndication, InitialUeMessage,
    NasNonDeliveryIndication, NgReset, NgResetAcknowledge, NgSetupRequest, PduSessionId,
    ProcedureCode, ProtocolIeId, RanConfigurationUpdate, RanUeNgapId, ResetType,
    UeContextModificationFailure, UeContextModificationResponse, UeContextReleaseComplete,
    UeContextReleaseRequest, UeRadioCapabilityInfoIndication, UplinkNasTransport,
    UplinkRanConfigurationTransfer, UserLocationInformation, LocationReport,
};

use crate::context::{
    supported_tai_list, AmfContext, AmfUe, RanNode, RanUe, UeContextReleaseAction,
};
use crate::nas::NasHandler;
use crate::ngap_send::SendError;
use crate::ngap_sm::NgapEvent;
use crate::sbi_path::{SmUpdateKind, SmUpdateRequest, SmfClient};

/// Log a failed send; the procedure itself carries on
pub(crate) fn report_send(ran: &RanNode, what: &str, result: Result<(), SendError>) {
    match result {
        Ok(()) => log::debug!("[RAN:{}] sent {}", ran.id, what),
        Err(e) => log::error!("[RAN:{}] failed to send {}: {}", ran.id, what, e),
    }
}

/// NGAP procedure handlers sharing the AMF context and its collaborators
pub struct NgapHandler {
    pub(crate) amf: Arc<AmfContext>,
    pub(crate) smf: Arc<dyn SmfClient>,
    pub(crate) nas: Arc<dyn NasHandler>,
}

impl NgapHandler {
    pub fn new(amf: Arc<AmfContext>, smf: Arc<dyn SmfClient>, nas: Arc<dyn NasHandler>) -> Self {
        Self { amf, smf, nas }
    }

    pub fn context(&self) -> &Arc<AmfContext> {
        &self.amf
    }

    // ------------------------------------------------------------------------
    // Shared helpers
    // ------------------------------------------------------------------------

    pub(crate) async fn send_error_indication(
        &self,
        ran: &RanNode,
        amf_ue_ngap_id: Option<AmfUeNgapId>,
        ran_ue_ngap_id: Option<RanUeNgapId>,
        cause: Option<Cause>,
        criticality_diagnostics: Option<CriticalityDiagnostics>,
    ) {
        let result = ran
            .sender()
            .send_error_indication(amf_ue_ngap_id, ran_ue_ngap_id, cause, criticality_diagnostics)
            .await;
        report_send(ran, "ErrorIndication", result);
    }

    /// Abort a procedure whose mandatory IEs are missing
    pub(crate) async fn report_missing_ies(
        &self,
        ran: &RanNode,
        missing: MissingIes,
        procedure_code: ProcedureCode,
        triggering_message: TriggeringMessage,
        procedure_criticality: Criticality,
    ) {
        log::error!(
            "[RAN:{}] procedure {} missing mandatory IEs {:?}",
            ran.id,
            procedure_code,
            missing.ie_ids()
        );
        let diagnostics =
            missing.into_diagnostics(procedure_code, triggering_message, procedure_criticality);
        self.send_error_indication(ran, None, None, None, Some(diagnostics))
            .await;
    }

    pub(crate) async fn report_unknown_ue(
        &self,
        ran: &RanNode,
        amf_ue_ngap_id: Option<AmfUeNgapId>,
        ran_ue_ngap_id: Option<RanUeNgapId>,
    ) {
        log::error!(
            "[RAN:{}] no UE context [amf:{:?} ran:{:?}]",
            ran.id,
            amf_ue_ngap_id,
            ran_ue_ngap_id
        );
        self.send_error_indication(
            ran,
            amf_ue_ngap_id,
            ran_ue_ngap_id,
            Some(CauseRadioNetwork::UnknownLocalUeNgapId.into()),
            None,
        )
        .await;
    }

    /// Leg with `amf_ue_ngap_id`, only if it belongs to `ran`
    pub(crate) fn find_ran_ue_on(
        &self,
        ran: &RanNode,
        amf_ue_ngap_id: AmfUeNgapId,
    ) -> Option<RanUe> {
        self.amf
            .ran_ue_find(amf_ue_ngap_id)
            .filter(|ran_ue| ran_ue.ran_node_id == ran.id)
    }

    /// Resolve a RAN UE leg of the receiving RAN node by AMF UE NGAP ID,
    /// falling back to the RAN UE NGAP ID. Legs of other RAN nodes are
    /// never returned.
    pub(crate) fn find_ran_ue(
        &self,
        ran: &RanNode,
        amf_ue_ngap_id: Option<AmfUeNgapId>,
        ran_ue_ngap_id: Option<RanUeNgapId>,
    ) -> Option<RanUe> {
        amf_ue_ngap_id
            .and_then(|id| self.find_ran_ue_on(ran, id))
            .or_else(|| {
                ran_ue_ngap_id.and_then(|id| self.amf.ran_ue_find_by_ran_ue_ngap_id(ran, id))
            })
    }

    pub(crate) fn update_location(&self, ran_ue: &RanUe, location: UserLocationInformation) {
        self.amf
            .ran_ue_modify(ran_ue.amf_ue_ngap_id, |ue| ue.location = Some(location));
        if let Some(amf_ue_id) = ran_ue.amf_ue_id {
            self.amf
                .amf_ue_modify(amf_ue_id, |ue| ue.location = Some(location));
        }
    }

    /// Record the release action and send UE Context Release Command on the
    /// RAN node owning the leg
    pub(crate) async fn release_ran_ue(
        &self,
        ran_ue: &RanUe,
        action: UeContextReleaseAction,
        cause: Cause,
    ) {
        self.amf
            .ran_ue_modify(ran_ue.amf_ue_ngap_id, |ue| ue.release_action = action);

        let Some(ran) = self.amf.ran_find(ran_ue.ran_node_id) else {
            log::warn!("[{}] RAN node gone, removing leg", ran_ue);
            self.amf.ran_ue_remove(ran_ue.amf_ue_ngap_id);
            return;
        };

        log::info!("[{}] UE Context Release Command ({}, {:?})", ran_ue, cause, action);
        let result = ran
            .sender()
            .send_ue_context_release_command(ran_ue.ue_ngap_ids(), cause)
            .await;
        report_send(&ran, "UEContextReleaseCommand", result);
    }

    /// Deactivate the user plane of the listed sessions, or of every active
    /// session when no list is given
    async fn deactivate_sessions(&self, amf_ue: &AmfUe, pdu_session_ids: Option<&[PduSessionId]>) {
        for sm in amf_ue.sm_contexts() {
            let listed = pdu_session_ids.map_or(true, |ids| ids.contains(&sm.pdu_session_id));
            if !sm.active || !listed {
                continue;
            }

            let request = SmUpdateRequest::new(SmUpdateKind::Deactivate, Vec::new());
            match self.smf.update_session(&sm.sm_ref, request).await {
                Ok(_) => amf_ue.sm_context_set_active(sm.pdu_session_id, false),
                Err(e) => log::error!(
                    "[{}] PDU session {} deactivation failed: {}",
                    amf_ue.id,
                    sm.pdu_session_id,
                    e
                ),
            }
        }
    }

    async fn release_sessions(&self, amf_ue: &AmfUe) {
        for sm in amf_ue.sm_contexts() {
            if let Err(e) = self.smf.release_session(&sm.sm_ref).await {
                log::error!(
                    "[{}] PDU session {} release failed: {}",
                    amf_ue.id,
                    sm.pdu_session_id,
                    e
                );
            }
            amf_ue.sm_context_remove(sm.pdu_session_id);
        }
    }

    // ------------------------------------------------------------------------
    // Interface management
    // ------------------------------------------------------------------------

    pub async fn handle_ng_setup_request(&self, ran: &RanNode, msg: NgSetupRequest) {
        let mut missing = MissingIes::default();
        let global_ran_node_id =
            missing.require(msg.global_ran_node_id, ProtocolIeId::GLOBAL_RAN_NODE_ID);
        let supported_ta_list =
            missing.require(msg.supported_ta_list, ProtocolIeId::SUPPORTED_TA_LIST);
        let (Some(global_ran_node_id), Some(supported_ta_list)) =
            (global_ran_node_id, supported_ta_list)
        else {
            self.report_missing_ies(
                ran,
                missing,
                ProcedureCode::NG_SETUP,
                TriggeringMessage::InitiatingMessage,
                Criticality::Reject,
            )
            .await;
            return;
        };

        log::info!("[RAN:{}] NG Setup Request from {}", ran.id, global_ran_node_id);

        let supported = supported_tai_list(&supported_ta_list);
        ran.update_info(|info| {
            info.ran_id = Some(global_ran_node_id);
            if msg.ran_node_name.is_some() {
                info.name = msg.ran_node_name;
            }
            if msg.default_paging_drx.is_some() {
                info.paging_drx = msg.default_paging_drx;
            }
            info.supported_ta_list = supported.clone();
        });

        let operator = self.amf.operator_info();
        let cause: Option<Cause> = if supported.is_empty() {
            log::warn!("[RAN:{}] NG Setup failure: no supported TA", ran.id);
            Some(CauseMisc::Unspecified.into())
        } else if !operator.serves_any(&supported) {
            log::warn!("[RAN:{}] NG Setup failure: no served TAI", ran.id);
            Some(CauseMisc::UnknownPlmnOrSnpn.into())
        } else {
            None
        };

        match cause {
            None => {
                ran.dispatch(NgapEvent::SetupAccepted);
                let result = ran.sender().send_ng_setup_response(&operator).await;
                report_send(ran, "NGSetupResponse", result);
            }
            Some(cause) => {
                ran.dispatch(NgapEvent::SetupRejected);
                let result = ran.sender().send_ng_setup_failure(cause, None).await;
                report_send(ran, "NGSetupFailure", result);
            }
        }
    }

    pub async fn handle_ran_configuration_update(&self, ran: &RanNode, msg: RanConfigurationUpdate) {
        log::info!("[RAN:{}] RAN Configuration Update", ran.id);

        ran.update_info(|info| {
            if msg.ran_node_name.is_some() {
                info.name = msg.ran_node_name.clone();
            }
            if msg.default_paging_drx.is_some() {
                info.paging_drx = msg.default_paging_drx;
            }
            if msg.global_ran_node_id.is_some() {
                info.ran_id = msg.global_ran_node_id;
            }
        });

        let Some(supported_ta_list) = msg.supported_ta_list else {
            let result = ran.sender().send_ran_configuration_update_ack().await;
            report_send(ran, "RANConfigurationUpdateAcknowledge", result);
            return;
        };

        let supported = supported_tai_list(&supported_ta_list);
        ran.set_supported_ta_list(supported.clone());

        let operator = self.amf.operator_info();
        let cause: Option<Cause> = if supported.is_empty() {
            log::warn!("[RAN:{}] RAN Configuration Update failure: no supported TA", ran.id);
            Some(CauseMisc::Unspecified.into())
        } else if !operator.serves_any(&supported) {
            log::warn!("[RAN:{}] RAN Configuration Update failure: no served TAI", ran.id);
            Some(CauseMisc::UnknownPlmnOrSnpn.into())
        } else {
            None
        };

        match cause {
            None => {
                let result = ran.sender().send_ran_configuration_update_ack().await;
                report_send(ran, "RANConfigurationUpdateAcknowledge", result);
            }
            Some(cause) => {
                let result = ran
                    .sender()
                    .send_ran_configuration_update_failure(cause, None)
                    .await;
                report_send(ran, "RANConfigurationUpdateFailure", result);
            }
        }
    }

    pub async fn handle_ng_reset(&self, ran: &RanNode, msg: NgReset) {
        let mut missing = MissingIes::default();
        let cause = missing.require(msg.cause, ProtocolIeId::CAUSE);
        let reset_type = missing.require(msg.reset_type, ProtocolIeId::RESET_TYPE);
        let (Some(cause), Some(reset_type)) = (cause, reset_type) else {
            self.report_missing_ies(
                ran,
                missing,
                ProcedureCode::NG_RESET,
                TriggeringMessage::InitiatingMessage,
                Criticality::Reject,
            )
            .await;
            return;
        };

        log::info!("[RAN:{}] NG Reset ({})", ran.id, cause);

        match reset_type {
            ResetType::NgInterface => {
                let removed = self.amf.ran_remove_all_ue(ran);
                log::info!("[RAN:{}] NG interface reset, {} UE contexts removed", ran.id, removed);
                let result = ran.sender().send_ng_reset_ack(None).await;
                report_send(ran, "NGResetAcknowledge", result);
            }
            ResetType::PartOfNgInterface(items) => {
                for item in &items {
                    match self.find_ran_ue(ran, item.amf_ue_ngap_id, item.ran_ue_ngap_id) {
                        Some(ran_ue) => {
                            self.amf.ran_ue_remove(ran_ue.amf_ue_ngap_id);
                        }
                        None => log::warn!(
                            "[RAN:{}] NG Reset: no UE context [amf:{:?} ran:{:?}]",
                            ran.id,
                            item.amf_ue_ngap_id,
                            item.ran_ue_ngap_id
                        ),
                    }
                }
                let result = ran.sender().send_ng_reset_ack(Some(items)).await;
                report_send(ran, "NGResetAcknowledge", result);
            }
        }
    }

    pub async fn handle_ng_reset_acknowledge(&self, ran: &RanNode, msg: NgResetAcknowledge) {
        let count = msg
            .ue_associated_logical_ng_connection_list
            .map_or(0, |list| list.len());
        log::info!("[RAN:{}] NG Reset Acknowledge ({} connections)", ran.id, count);
    }

    pub async fn handle_error_indication(&self, ran: &RanNode, msg: ErrorIndication) {
        match msg.cause {
            Some(cause) => log::warn!(
                "[RAN:{}] Error Indication [amf:{:?} ran:{:?}] cause {}",
                ran.id,
                msg.amf_ue_ngap_id,
                msg.ran_ue_ngap_id,
                cause
            ),
            None => log::warn!(
                "[RAN:{}] Error Indication [amf:{:?} ran:{:?}]",
                ran.id,
                msg.amf_ue_ngap_id,
                msg.ran_ue_ngap_id
            ),
        }
        if let Some(diag) = msg.criticality_diagnostics {
            log::warn!("[RAN:{}] Criticality Diagnostics {:?}", ran.id, diag);
        }
    }

    /// Forward a SON configuration transfer to the target RAN node
    pub async fn handle_uplink_ran_configuration_transfer(
        &self,
        ran: &RanNode,
        msg: UplinkRanConfigurationTransfer,
    ) {
        let Some(son) = msg.son_configuration_transfer else {
            log::warn!("[RAN:{}] Uplink RAN Configuration Transfer without SON IE", ran.id);
            return;
        };

        let Some(target) = self.amf.ran_find_by_ran_id(&son.target_ran_node_id) else {
            log::warn!(
                "[RAN:{}] unknown SON target {}",
                ran.id,
                son.target_ran_node_id
            );
            return;
        };

        let result = target
            .sender()
            .send_downlink_ran_configuration_transfer(DownlinkRanConfigurationTransfer {
                son_configuration_transfer: son,
            })
            .await;
        report_send(&target, "DownlinkRANConfigurationTransfer", result);
    }

    // ------------------------------------------------------------------------
    // NAS transport
    // ------------------------------------------------------------------------

    pub async fn handle_initial_ue_message(&self, ran: &RanNode, msg: InitialUeMessage) {
        if !ran.is_operational() {
            log::error!(
                "[RAN:{}] Initial UE Message before NG Setup ({:?})",
                ran.id,
                ran.state()
            );
            let diagnostics = MissingIes::default().into_diagnostics(
                ProcedureCode::INITIAL_UE_MESSAGE,
                TriggeringMessage::InitiatingMessage,
                Criticality::Ignore,
            );
            self.send_error_indication(
                ran,
                None,
                None,
                Some(CauseProtocol::MessageNotCompatibleWithReceiverState.into()),
                Some(diagnostics),
            )
            .await;
            return;
        }

        let mut missing = MissingIes::default();
        let ran_ue_ngap_id = missing.require(msg.ran_ue_ngap_id, ProtocolIeId::RAN_UE_NGAP_ID);
        let nas_pdu = missing.require(msg.nas_pdu, ProtocolIeId::NAS_PDU);
        let location = missing.require(
            msg.user_location_information,
            ProtocolIeId::USER_LOCATION_INFORMATION,
        );
        let (Some(ran_ue_ngap_id), Some(nas_pdu), Some(location)) =
            (ran_ue_ngap_id, nas_pdu, location)
        else {
            self.report_missing_ies(
                ran,
                missing,
                ProcedureCode::INITIAL_UE_MESSAGE,
                TriggeringMessage::InitiatingMessage,
                Criticality::Ignore,
            )
            .await;
            return;
        };

        // A leg that never reached an AMF UE is stale
        let mut existing = self.amf.ran_ue_find_by_ran_ue_ngap_id(ran, ran_ue_ngap_id);
        if let Some(stale) = existing.as_ref().filter(|ue| ue.amf_ue_id.is_none()) {
            log::warn!("[{}] removing stale RAN UE without AMF UE", stale);
            self.amf.ran_ue_remove(stale.amf_ue_ngap_id);
            existing = None;
        }

        let ran_ue = match existing {
            Some(ran_ue) => ran_ue,
            None => {
                let ran_ue = match self.amf.ran_ue_add(ran, ran_ue_ngap_id) {
                    Ok(ran_ue) => ran_ue,
                    Err(e) => {
                        log::error!("[RAN:{}] cannot add RAN UE {}: {}", ran.id, ran_ue_ngap_id, e);
                        return;
                    }
                };

                if let Some(s_tmsi) = msg.five_g_s_tmsi {
                    let guti = self.amf.operator_info().guti_from_s_tmsi(
                        s_tmsi.amf_set_id,
                        s_tmsi.amf_pointer,
                        s_tmsi.five_g_tmsi,
                    );
                    match self.amf.amf_ue_find_by_guti(&guti) {
                        Some(amf_ue) => {
                            log::info!("[{}] known UE {}", ran_ue, guti);
                            if let Err(e) =
                                self.amf.amf_ue_attach_ran_ue(amf_ue.id, ran_ue.amf_ue_ngap_id)
                            {
                                log::error!("[{}] attach failed: {}", ran_ue, e);
                            }
                        }
                        None => log::info!("[{}] unknown UE {}", ran_ue, guti),
                    }
                }
                ran_ue
            }
        };

        let ran_ue = self
            .amf
            .ran_ue_modify(ran_ue.amf_ue_ngap_id, |ue| {
                ue.location = Some(location);
                ue.rrc_establishment_cause = msg.rrc_establishment_cause;
                ue.ue_context_requested = msg.ue_context_request.unwrap_or(false);
            })
            .unwrap_or(ran_ue);
        self.update_location(&ran_ue, location);

        if let Err(e) = self.nas.handle(&ran_ue, &nas_pdu).await {
            log::error!("[{}] NAS message handling failed: {}", ran_ue, e);
        }
    }

    pub async fn handle_uplink_nas_transport(&self, ran: &RanNode, msg: UplinkNasTransport) {
        let mut missing = MissingIes::default();
        let amf_ue_ngap_id = missing.require(msg.amf_ue_ngap_id, ProtocolIeId::AMF_UE_NGAP_ID);
        let ran_ue_ngap_id = missing.require(msg.ran_ue_ngap_id, ProtocolIeId::RAN_UE_NGAP_ID);
        let nas_pdu = missing.require(msg.nas_pdu, ProtocolIeId::NAS_PDU);
        let (Some(amf_ue_ngap_id), Some(ran_ue_ngap_id), Some(nas_pdu)) =
            (amf_ue_ngap_id, ran_ue_ngap_id, nas_pdu)
        else {
            self.report_missing_ies(
                ran,
                missing,
                ProcedureCode::UPLINK_NAS_TRANSPORT,
                TriggeringMessage::InitiatingMessage,
                Criticality::Ignore,
            )
            .await;
            return;
        };

        let Some(ran_ue) = self.amf.ran_ue_find_by_ran_ue_ngap_id(ran, ran_ue_ngap_id) else {
            self.report_unknown_ue(ran, Some(amf_ue_ngap_id), Some(ran_ue_ngap_id))
                .await;
            return;
        };
        if ran_ue.amf_ue_ngap_id != amf_ue_ngap_id {
            log::warn!(
                "[{}] Uplink NAS Transport carries AMF UE NGAP ID {}",
                ran_ue,
                amf_ue_ngap_id
            );
        }

        if ran_ue.amf_ue_id.is_none() {
            log::warn!("[{}] no AMF UE, removing RAN UE", ran_ue);
            self.amf.ran_ue_remove(ran_ue.amf_ue_ngap_id);
            return;
        }

        if let Some(location) = msg.user_location_information {
            self.update_location(&ran_ue, location);
        }

        if let Err(e) = self.nas.handle(&ran_ue, &nas_pdu).await {
            log::error!("[{}] NAS message handling failed: {}", ran_ue, e);
        }
    }

    pub async fn handle_nas_non_delivery_indication(
        &self,
        ran: &RanNode,
        msg: NasNonDeliveryIndication,
    ) {
        let mut missing = MissingIes::default();
        let amf_ue_ngap_id = missing.require(msg.amf_ue_ngap_id, ProtocolIeId::AMF_UE_NGAP_ID);
        let ran_ue_ngap_id = missing.require(msg.ran_ue_ngap_id, ProtocolIeId::RAN_UE_NGAP_ID);
        let nas_pdu = missing.require(msg.nas_pdu, ProtocolIeId::NAS_PDU);
        let cause = missing.require(msg.cause, ProtocolIeId::CAUSE);
        let (Some(amf_ue_ngap_id), Some(ran_ue_ngap_id), Some(nas_pdu), Some(cause)) =
            (amf_ue_ngap_id, ran_ue_ngap_id, nas_pdu, cause)
        else {
            self.report_missing_ies(
                ran,
                missing,
                ProcedureCode::NAS_NON_DELIVERY_INDICATION,
                TriggeringMessage::InitiatingMessage,
                Criticality::Ignore,
            )
            .await;
            return;
        };

        match self.find_ran_ue(ran, Some(amf_ue_ngap_id), Some(ran_ue_ngap_id)) {
            Some(ran_ue) => log::warn!(
                "[{}] NAS-PDU not delivered ({} bytes, cause {})",
                ran_ue,
                nas_pdu.len(),
                cause
            ),
            None => {
                self.report_unknown_ue(ran, Some(amf_ue_ngap_id), Some(ran_ue_ngap_id))
                    .await
            }
        }
    }

    // ------------------------------------------------------------------------
    // UE context management
    // ------------------------------------------------------------------------

    pub async fn handle_ue_context_release_request(
        &self,
        ran: &RanNode,
        msg: UeContextReleaseRequest,
    ) {
        let mut missing = MissingIes::default();
        let amf_ue_ngap_id = missing.require(msg.amf_ue_ngap_id, ProtocolIeId::AMF_UE_NGAP_ID);
        let ran_ue_ngap_id = missing.require(msg.ran_ue_ngap_id, ProtocolIeId::RAN_UE_NGAP_ID);
        if !missing.is_empty() {
            self.report_missing_ies(
                ran,
                missing,
                ProcedureCode::UE_CONTEXT_RELEASE_REQUEST,
                TriggeringMessage::InitiatingMessage,
                Criticality::Ignore,
            )
            .await;
            return;
        }

        let Some(ran_ue) = self.find_ran_ue(ran, amf_ue_ngap_id, ran_ue_ngap_id) else {
            self.report_unknown_ue(ran, amf_ue_ngap_id, ran_ue_ngap_id)
                .await;
            return;
        };

        let cause = msg
            .cause
            .unwrap_or_else(|| CauseRadioNetwork::Unspecified.into());
        log::info!("[{}] UE Context Release Request ({})", ran_ue, cause);

        let mut action = UeContextReleaseAction::NormalRelease;
        if let Some(amf_ue) = self.amf.amf_ue_of(&ran_ue) {
            if amf_ue.is_registered() {
                self.deactivate_sessions(&amf_ue, msg.pdu_session_resource_list.as_deref())
                    .await;
            } else {
                self.release_sessions(&amf_ue).await;
                action = UeContextReleaseAction::ReleaseUeContext;
            }
        }

        self.release_ran_ue(&ran_ue, action, cause).await;
    }

    pub async fn handle_ue_context_release_complete(
        &self,
        ran: &RanNode,
        msg: UeContextReleaseComplete,
    ) {
        let mut missing = MissingIes::default();
        let amf_ue_ngap_id = missing.require(msg.amf_ue_ngap_id, ProtocolIeId::AMF_UE_NGAP_ID);
        let ran_ue_ngap_id = missing.require(msg.ran_ue_ngap_id, ProtocolIeId::RAN_UE_NGAP_ID);
        let (Some(amf_ue_ngap_id), Some(ran_ue_ngap_id)) = (amf_ue_ngap_id, ran_ue_ngap_id) else {
            self.report_missing_ies(
                ran,
                missing,
                ProcedureCode::UE_CONTEXT_RELEASE,
                TriggeringMessage::SuccessfulOutcome,
                Criticality::Reject,
            )
            .await;
            return;
        };

        let Some(ran_ue) = self.find_ran_ue_on(ran, amf_ue_ngap_id) else {
            self.report_unknown_ue(ran, Some(amf_ue_ngap_id), Some(ran_ue_ngap_id))
                .await;
            return;
        };

        if let Some(location) = msg.user_location_information {
            self.update_location(&ran_ue, location);
        }

        let action = ran_ue.release_action;
        log::info!("[{}] UE Context Release Complete ({:?})", ran_ue, action);

        let Some(amf_ue) = self.amf.amf_ue_of(&ran_ue) else {
            self.amf.ran_ue_remove(ran_ue.amf_ue_ngap_id);
            return;
        };

        match action {
            UeContextReleaseAction::NormalRelease => {
                if amf_ue.is_registered() {
                    self.deactivate_sessions(&amf_ue, msg.pdu_session_resource_list.as_deref())
                        .await;
                }
                self.amf.ran_ue_remove(ran_ue.amf_ue_ngap_id);
            }
            UeContextReleaseAction::ReleaseUeContext => {
                if amf_ue.is_registered() {
                    self.deactivate_sessions(&amf_ue, msg.pdu_session_resource_list.as_deref())
                        .await;
                }
                self.amf.ran_ue_remove(ran_ue.amf_ue_ngap_id);
                if !amf_ue.security.available {
                    self.amf.amf_ue_remove(amf_ue.id);
                }
            }
            UeContextReleaseAction::NetworkDeregistration => {
                self.amf.ran_ue_remove(ran_ue.amf_ue_ngap_id);
                self.amf.amf_ue_remove(amf_ue.id);
            }
            // Handover legs never carry the UE's sessions away
            UeContextReleaseAction::HandoverComplete
            | UeContextReleaseAction::HandoverCancel
            | UeContextReleaseAction::HandoverFailure => {
                self.amf.ran_ue_remove(ran_ue.amf_ue_ngap_id);
            }
        }
    }

    pub async fn handle_ue_context_modification_response(
        &self,
        ran: &RanNode,
        msg: UeContextModificationResponse,
    ) {
        let mut missing = MissingIes::default();
        let amf_ue_ngap_id = missing.require(msg.amf_ue_ngap_id, ProtocolIeId::AMF_UE_NGAP_ID);
        let ran_ue_ngap_id = missing.require(msg.ran_ue_ngap_id, ProtocolIeId::RAN_UE_NGAP_ID);
        if !missing.is_empty() {
            self.report_missing_ies(
                ran,
                missing,
                ProcedureCode::UE_CONTEXT_MODIFICATION,
                TriggeringMessage::SuccessfulOutcome,
                Criticality::Reject,
            )
            .await;
            return;
        }

        let Some(ran_ue) = self.find_ran_ue(ran, amf_ue_ngap_id, ran_ue_ngap_id) else {
            self.report_unknown_ue(ran, amf_ue_ngap_id, ran_ue_ngap_id)
                .await;
            return;
        };

        if let Some(rrc_state) = msg.rrc_state {
            self.amf
                .ran_ue_modify(ran_ue.amf_ue_ngap_id, |ue| ue.rrc_state = Some(rrc_state));
        }
        if let Some(location) = msg.user_location_information {
            self.update_location(&ran_ue, location);
        }
        log::info!("[{}] UE Context Modification Response", ran_ue);
    }

    pub async fn handle_ue_context_modification_failure(
        &self,
        ran: &RanNode,
        msg: UeContextModificationFailure,
    ) {
        let mut missing = MissingIes::default();
        let amf_ue_ngap_id = missing.require(msg.amf_ue_ngap_id, ProtocolIeId::AMF_UE_NGAP_ID);
        let ran_ue_ngap_id = missing.require(msg.ran_ue_ngap_id, ProtocolIeId::RAN_UE_NGAP_ID);
        let cause = missing.require(msg.cause, ProtocolIeId::CAUSE);
        let Some(cause) = cause.filter(|_| missing.is_empty()) else {
            self.report_missing_ies(
                ran,
                missing,
                ProcedureCode::UE_CONTEXT_MODIFICATION,
                TriggeringMessage::UnsuccessfulOutcome,
                Criticality::Reject,
            )
            .await;
            return;
        };

        match self.find_ran_ue(ran, amf_ue_ngap_id, ran_ue_ngap_id) {
            Some(ran_ue) => log::warn!("[{}] UE Context Modification Failure ({})", ran_ue, cause),
            None => {
                self.report_unknown_ue(ran, amf_ue_ngap_id, ran_ue_ngap_id)
                    .await
            }
        }
    }

    pub async fn handle_ue_radio_capability_info_indication(
        &self,
        ran: &RanNode,
        msg: UeRadioCapabilityInfoIndication,
    ) {
        let mut missing = MissingIes::default();
        let amf_ue_ngap_id = missing.require(msg.amf_ue_ngap_id, ProtocolIeId::AMF_UE_NGAP_ID);
        let ran_ue_ngap_id = missing.require(msg.ran_ue_ngap_id, ProtocolIeId::RAN_UE_NGAP_ID);
        let capability =
            missing.require(msg.ue_radio_capability, ProtocolIeId::UE_RADIO_CAPABILITY);
        let Some(capability) = capability.filter(|_| missing.is_empty()) else {
            self.report_missing_ies(
                ran,
                missing,
                ProcedureCode::UE_RADIO_CAPABILITY_INFO_INDICATION,
                TriggeringMessage::InitiatingMessage,
                Criticality::Ignore,
            )
            .await;
            return;
        };

        let Some(ran_ue) = self.find_ran_ue(ran, amf_ue_ngap_id, ran_ue_ngap_id) else {
            self.report_unknown_ue(ran, amf_ue_ngap_id, ran_ue_ngap_id)
                .await;
            return;
        };

        match ran_ue.amf_ue_id {
            Some(amf_ue_id) => {
                log::debug!("[{}] UE radio capability ({} bytes)", ran_ue, capability.len());
                self.amf
                    .amf_ue_modify(amf_ue_id, |ue| ue.ue_radio_capability = Some(capability));
            }
            None => log::warn!("[{}] UE radio capability without AMF UE", ran_ue),
        }
    }

    pub async fn handle_location_report(&self, ran: &RanNode, msg: LocationReport) {
        let mut missing = MissingIes::default();
        let amf_ue_ngap_id = missing.require(msg.amf_ue_ngap_id, ProtocolIeId::AMF_UE_NGAP_ID);
        let ran_ue_ngap_id = missing.require(msg.ran_ue_ngap_id, ProtocolIeId::RAN_UE_NGAP_ID);
        let location = missing.require(
            msg.user_location_information,
            ProtocolIeId::USER_LOCATION_INFORMATION,
        );
        let Some(location) = location.filter(|_| missing.is_empty()) else {
            self.report_missing_ies(
                ran,
                missing,
                ProcedureCode::LOCATION_REPORT,
                TriggeringMessage::InitiatingMessage,
                Criticality::Ignore,
            )
            .await;
            return;
        };

        match self.find_ran_ue(ran, amf_ue_ngap_id, ran_ue_ngap_id) {
            Some(ran_ue) => {
                log::debug!("[{}] Location Report", ran_ue);
                self.update_location(&ran_ue, location);
            }
            None => {
                self.report_unknown_ue(ran, amf_ue_ngap_id, ran_ue_ngap_id)
                    .await
            }
        }
    }
}
