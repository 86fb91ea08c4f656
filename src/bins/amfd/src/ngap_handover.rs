//! N2 Handover and Path Switch
//!
//! Intra-AMF handover between two RAN nodes: preparation on the source
//! (Handover Required), resource allocation on the target (Handover Request
//! Acknowledge / Handover Failure), completion (Handover Notify) and
//! cancellation, plus the Xn path switch. The source and target legs are
//! tied together by a [`HandoverAttempt`](crate::context::HandoverAttempt)
//! held in the registry; tearing the attempt down clears both links at once.

use amf_ngap::diagnostics::MissingIes;
use amf_ngap::ie::{Criticality, TriggeringMessage};
use amf_ngap::{
    Cause, CauseNas, CauseRadioNetwork, CriticalityDiagnostics, HandoverCancel, PduSessionId,
    HandoverCommand, HandoverFailure, HandoverNotify, HandoverRequest,
    HandoverRequestAcknowledge, HandoverRequired, PathSwitchRequest,
    PathSwitchRequestAcknowledge, PduSessionResourceItem, PduSessionResourceSetupItemHoReq,
    AmfUeNgapId, ProcedureCode, ProtocolIeId, RanUeNgapId, TargetId,
};

use crate::context::{AmfUe, HandoverAttempt, RanNode, RanUe, UeContextReleaseAction};
use crate::ngap_handler::{report_send, NgapHandler};
use crate::sbi_path::{SmUpdateKind, SmUpdateRequest, SmUpdateResponse};

impl NgapHandler {
    async fn send_preparation_failure(
        &self,
        source: &RanUe,
        cause: Cause,
        criticality_diagnostics: Option<CriticalityDiagnostics>,
    ) {
        let (Some(ran), Some(ran_ue_ngap_id)) =
            (self.amf.ran_find(source.ran_node_id), source.ran_ue_ngap_id)
        else {
            log::error!("[{}] source leg unreachable, dropping Preparation Failure", source);
            return;
        };

        log::info!("[{}] Handover Preparation Failure ({})", source, cause);
        let result = ran
            .sender()
            .send_handover_preparation_failure(
                source.amf_ue_ngap_id,
                ran_ue_ngap_id,
                cause,
                criticality_diagnostics,
            )
            .await;
        report_send(&ran, "HandoverPreparationFailure", result);
    }

    /// Tell the SMF that one session does not move, as `kind`
    async fn report_failed_session(
        &self,
        ran_ue: &RanUe,
        amf_ue: &AmfUe,
        pdu_session_id: PduSessionId,
        kind: SmUpdateKind,
        transfer: Vec<u8>,
    ) {
        let Some(sm) = amf_ue.sm_context_find(pdu_session_id) else {
            log::warn!("[{}] no SM context for failed PDU session {}", ran_ue, pdu_session_id);
            return;
        };
        let request = SmUpdateRequest::new(kind, transfer);
        if let Err(e) = self.smf.update_session(&sm.sm_ref, request).await {
            log::error!(
                "[{}] PDU session {} {:?} not delivered: {}",
                ran_ue,
                pdu_session_id,
                kind,
                e
            );
        }
    }

    /// Give up on a target leg whose resources are allocated
    async fn abort_resource_allocation(
        &self,
        attempt: &HandoverAttempt,
        target: &RanUe,
        cause: Cause,
    ) {
        self.amf.handover_detach(attempt.id);
        self.release_ran_ue(target, UeContextReleaseAction::HandoverFailure, cause)
            .await;
    }

    /// Tell the SMF every session of the UE stays on the source side
    async fn cancel_handover_sessions(&self, amf_ue: &AmfUe) {
        for sm in amf_ue.sm_contexts() {
            let request = SmUpdateRequest::new(SmUpdateKind::HandoverCancelled, Vec::new());
            if let Err(e) = self.smf.update_session(&sm.sm_ref, request).await {
                log::error!(
                    "[{}] PDU session {} handover cancel failed: {}",
                    amf_ue.id,
                    sm.pdu_session_id,
                    e
                );
            }
        }
    }

    // ------------------------------------------------------------------------
    // Handover preparation (source side)
    // ------------------------------------------------------------------------

    pub async fn handle_handover_required(&self, ran: &RanNode, msg: HandoverRequired) {
        let mut missing = MissingIes::default();
        let amf_ue_ngap_id = missing.require(msg.amf_ue_ngap_id, ProtocolIeId::AMF_UE_NGAP_ID);
        let ran_ue_ngap_id = missing.require(msg.ran_ue_ngap_id, ProtocolIeId::RAN_UE_NGAP_ID);
        let handover_type = missing.require(msg.handover_type, ProtocolIeId::HANDOVER_TYPE);
        let target_id = missing.require(msg.target_id, ProtocolIeId::TARGET_ID);
        let session_list = missing.require(
            msg.pdu_session_resource_list,
            ProtocolIeId::PDU_SESSION_RESOURCE_LIST_HO_RQD,
        );
        let container = missing.require(
            msg.source_to_target_transparent_container,
            ProtocolIeId::SOURCE_TO_TARGET_TRANSPARENT_CONTAINER,
        );
        let (
            Some(amf_ue_ngap_id),
            Some(ran_ue_ngap_id),
            Some(handover_type),
            Some(target_id),
            Some(session_list),
            Some(container),
        ) = (
            amf_ue_ngap_id,
            ran_ue_ngap_id,
            handover_type,
            target_id,
            session_list,
            container,
        )
        else {
            self.report_missing_ies(
                ran,
                missing,
                ProcedureCode::HANDOVER_PREPARATION,
                TriggeringMessage::InitiatingMessage,
                Criticality::Reject,
            )
            .await;
            return;
        };

        let Some(source) = self.amf.ran_ue_find_by_ran_ue_ngap_id(ran, ran_ue_ngap_id) else {
            self.report_unknown_ue(ran, Some(amf_ue_ngap_id), Some(ran_ue_ngap_id))
                .await;
            return;
        };
        if source.amf_ue_ngap_id != amf_ue_ngap_id {
            log::warn!(
                "[{}] Handover Required carries AMF UE NGAP ID {}",
                source,
                amf_ue_ngap_id
            );
        }

        let Some(amf_ue) = self.amf.amf_ue_of(&source) else {
            log::error!("[{}] Handover Required without AMF UE", source);
            return;
        };

        let global_ran_node_id = match target_id {
            TargetId::TargetRanNodeId {
                global_ran_node_id, ..
            } => global_ran_node_id,
            TargetId::TargetEnbId { enb_id, .. } => {
                log::error!("[{}] handover to eNB {:#x} not supported", source, enb_id);
                return;
            }
        };

        if !amf_ue.security.is_valid() {
            self.send_preparation_failure(&source, CauseNas::AuthenticationFailure.into(), None)
                .await;
            return;
        }

        if source.handover.is_some() {
            log::warn!("[{}] handover already in progress", source);
            self.send_preparation_failure(
                &source,
                CauseRadioNetwork::InteractionWithOtherProcedure.into(),
                None,
            )
            .await;
            return;
        }

        let Some(target_ran) = self.amf.ran_find_by_ran_id(&global_ran_node_id) else {
            log::warn!("[{}] target {} not served by this AMF", source, global_ran_node_id);
            self.send_preparation_failure(&source, CauseRadioNetwork::UnknownTargetId.into(), None)
                .await;
            return;
        };

        let mut setup_list = Vec::new();
        let mut failed = Vec::new();
        for item in session_list {
            let Some(sm) = amf_ue.sm_context_find(item.pdu_session_id) else {
                log::warn!("[{}] no SM context for PDU session {}", source, item.pdu_session_id);
                failed.push(item.pdu_session_id);
                continue;
            };

            let request = SmUpdateRequest::new(SmUpdateKind::HandoverRequired, item.transfer);
            match self.smf.update_session(&sm.sm_ref, request).await {
                Ok(rsp) => match rsp.n2_info {
                    Some(transfer) => setup_list.push(PduSessionResourceSetupItemHoReq {
                        pdu_session_id: item.pdu_session_id,
                        s_nssai: sm.s_nssai,
                        transfer,
                    }),
                    None => {
                        log::warn!("[{}] SMF returned no N2 info for {}", source, item.pdu_session_id);
                        failed.push(item.pdu_session_id);
                    }
                },
                Err(e) => {
                    log::error!(
                        "[{}] PDU session {} handover preparation failed: {}",
                        source,
                        item.pdu_session_id,
                        e
                    );
                    failed.push(item.pdu_session_id);
                }
            }
        }

        if setup_list.is_empty() {
            self.send_preparation_failure(
                &source,
                CauseRadioNetwork::HoFailureInTarget5gcNgranNodeOrTargetSystem.into(),
                None,
            )
            .await;
            return;
        }

        let Some(amf_ue) = self
            .amf
            .amf_ue_modify(amf_ue.id, |ue| ue.security.advance_ncc())
        else {
            log::error!("[{}] AMF UE vanished during handover preparation", source);
            return;
        };

        let target = match self.amf.ran_ue_add_pending(&target_ran) {
            Ok(target) => target,
            Err(e) => {
                log::error!("[RAN:{}] cannot add handover target: {}", target_ran.id, e);
                self.send_preparation_failure(
                    &source,
                    CauseRadioNetwork::HoFailureInTarget5gcNgranNodeOrTargetSystem.into(),
                    None,
                )
                .await;
                return;
            }
        };
        self.amf
            .ran_ue_modify(target.amf_ue_ngap_id, |ue| ue.amf_ue_id = Some(amf_ue.id));

        let attempt = match self.amf.handover_attach(
            source.amf_ue_ngap_id,
            target.amf_ue_ngap_id,
            amf_ue.id,
            handover_type,
            msg.cause,
        ) {
            Ok(attempt) => attempt,
            Err(e) => {
                log::warn!("[{}] handover attach failed: {}", source, e);
                self.amf.ran_ue_remove(target.amf_ue_ngap_id);
                self.send_preparation_failure(
                    &source,
                    CauseRadioNetwork::InteractionWithOtherProcedure.into(),
                    None,
                )
                .await;
                return;
            }
        };
        for pdu_session_id in &failed {
            self.report_failed_session(
                &source,
                &amf_ue,
                *pdu_session_id,
                SmUpdateKind::HandoverResAllocFail,
                Vec::new(),
            )
            .await;
        }
        if !failed.is_empty() {
            self.amf
                .handover_modify(attempt.id, |a| a.failed_pdu_session_ids = failed);
        }

        let operator = self.amf.operator_info();
        let request = HandoverRequest {
            amf_ue_ngap_id: target.amf_ue_ngap_id,
            handover_type,
            cause: msg
                .cause
                .unwrap_or_else(|| CauseRadioNetwork::Unspecified.into()),
            ue_aggregate_maximum_bit_rate: amf_ue.ue_ambr,
            ue_security_capabilities: amf_ue.security.ue_security_capabilities,
            security_context: amf_ue.security.to_ngap(),
            pdu_session_resource_setup_list: setup_list,
            allowed_nssai: operator.allowed_nssai(),
            source_to_target_transparent_container: container,
            guami: operator.guami,
        };

        log::info!(
            "[{}] Handover {} prepared towards RAN:{} target [{}]",
            source,
            attempt.id,
            target_ran.id,
            target
        );
        let result = target_ran.sender().send_handover_request(request).await;
        report_send(&target_ran, "HandoverRequest", result);
    }

    // ------------------------------------------------------------------------
    // Resource allocation (target side)
    // ------------------------------------------------------------------------

    pub async fn handle_handover_request_acknowledge(
        &self,
        ran: &RanNode,
        msg: HandoverRequestAcknowledge,
    ) {
        let mut missing = MissingIes::default();
        let amf_ue_ngap_id = missing.require(msg.amf_ue_ngap_id, ProtocolIeId::AMF_UE_NGAP_ID);
        let ran_ue_ngap_id = missing.require(msg.ran_ue_ngap_id, ProtocolIeId::RAN_UE_NGAP_ID);
        let container = missing.require(
            msg.target_to_source_transparent_container,
            ProtocolIeId::TARGET_TO_SOURCE_TRANSPARENT_CONTAINER,
        );
        let (Some(amf_ue_ngap_id), Some(ran_ue_ngap_id), Some(container)) =
            (amf_ue_ngap_id, ran_ue_ngap_id, container)
        else {
            self.report_missing_ies(
                ran,
                missing,
                ProcedureCode::HANDOVER_RESOURCE_ALLOCATION,
                TriggeringMessage::SuccessfulOutcome,
                Criticality::Reject,
            )
            .await;
            return;
        };

        if let Some(diag) = &msg.criticality_diagnostics {
            log::warn!("[RAN:{}] Criticality Diagnostics {:?}", ran.id, diag);
        }

        // Only a handover target leg of this RAN node may be bound
        let Some(leg) = self.find_ran_ue_on(ran, amf_ue_ngap_id) else {
            self.report_unknown_ue(ran, Some(amf_ue_ngap_id), Some(ran_ue_ngap_id))
                .await;
            return;
        };
        let attempt = self
            .amf
            .handover_of(leg.amf_ue_ngap_id)
            .filter(|a| a.target == leg.amf_ue_ngap_id);
        if attempt.is_none() && leg.ran_ue_ngap_id.is_some() {
            log::error!("[{}] Handover Request Acknowledge for a non-target leg", leg);
            self.report_unknown_ue(ran, Some(amf_ue_ngap_id), Some(ran_ue_ngap_id))
                .await;
            return;
        }

        let target = match self
            .amf
            .ran_ue_set_ran_ue_ngap_id(ran, amf_ue_ngap_id, ran_ue_ngap_id)
        {
            Ok(target) => target,
            Err(e) => {
                log::error!("[RAN:{}] cannot bind target leg {}: {}", ran.id, amf_ue_ngap_id, e);
                return;
            }
        };

        let Some(attempt) = attempt else {
            // Pending leg left behind by a handover torn down meanwhile
            log::warn!("[{}] handover already torn down, releasing target", target);
            self.release_ran_ue(
                &target,
                UeContextReleaseAction::HandoverCancel,
                CauseRadioNetwork::HandoverCancelled.into(),
            )
            .await;
            return;
        };
        let Some(amf_ue) = self.amf.amf_ue_find(attempt.amf_ue_id) else {
            log::error!("[{}] AMF UE {} gone", target, attempt.amf_ue_id);
            return;
        };

        let mut handover_list = Vec::new();
        let mut success_ids = Vec::new();
        let mut failed_ids = attempt.failed_pdu_session_ids.clone();
        // Sessions that failed preparation were reported to the SMF already
        let mut release_list: Vec<PduSessionResourceItem> = failed_ids
            .iter()
            .map(|id| PduSessionResourceItem {
                pdu_session_id: *id,
                transfer: Vec::new(),
            })
            .collect();

        for item in msg.pdu_session_resource_admitted_list.unwrap_or_default() {
            let Some(sm) = amf_ue.sm_context_find(item.pdu_session_id) else {
                log::warn!("[{}] no SM context for PDU session {}", target, item.pdu_session_id);
                failed_ids.push(item.pdu_session_id);
                release_list.push(PduSessionResourceItem {
                    pdu_session_id: item.pdu_session_id,
                    transfer: Vec::new(),
                });
                continue;
            };

            let request = SmUpdateRequest::new(SmUpdateKind::HandoverRequestAck, item.transfer);
            match self.smf.update_session(&sm.sm_ref, request).await {
                Ok(SmUpdateResponse {
                    n2_info: Some(transfer),
                    ..
                }) => {
                    handover_list.push(PduSessionResourceItem {
                        pdu_session_id: item.pdu_session_id,
                        transfer,
                    });
                    success_ids.push(item.pdu_session_id);
                }
                outcome => {
                    match outcome {
                        Ok(_) => log::warn!(
                            "[{}] SMF returned no N2 info for {}",
                            target,
                            item.pdu_session_id
                        ),
                        Err(e) => log::error!(
                            "[{}] PDU session {} handover acknowledge failed: {}",
                            target,
                            item.pdu_session_id,
                            e
                        ),
                    }
                    failed_ids.push(item.pdu_session_id);
                    release_list.push(PduSessionResourceItem {
                        pdu_session_id: item.pdu_session_id,
                        transfer: Vec::new(),
                    });
                    self.report_failed_session(
                        &target,
                        &amf_ue,
                        item.pdu_session_id,
                        SmUpdateKind::HandoverResAllocFail,
                        Vec::new(),
                    )
                    .await;
                }
            }
        }

        for item in msg.pdu_session_resource_failed_to_setup_list.unwrap_or_default() {
            failed_ids.push(item.pdu_session_id);
            release_list.push(PduSessionResourceItem {
                pdu_session_id: item.pdu_session_id,
                transfer: Vec::new(),
            });
            self.report_failed_session(
                &target,
                &amf_ue,
                item.pdu_session_id,
                SmUpdateKind::HandoverResAllocFail,
                item.transfer,
            )
            .await;
        }

        let attempt = self
            .amf
            .handover_modify(attempt.id, |a| {
                a.success_pdu_session_ids = success_ids;
                a.failed_pdu_session_ids = failed_ids;
            })
            .unwrap_or(attempt);

        let cause: Cause = CauseRadioNetwork::HoFailureInTarget5gcNgranNodeOrTargetSystem.into();
        let Some(source) = self.amf.ran_ue_find(attempt.source) else {
            log::error!("[{}] source leg {} gone", target, attempt.source);
            self.abort_resource_allocation(&attempt, &target, cause).await;
            return;
        };

        if handover_list.is_empty() {
            self.send_preparation_failure(&source, cause, None).await;
            self.abort_resource_allocation(&attempt, &target, cause).await;
            return;
        }

        let (Some(source_ran), Some(source_ran_ue_ngap_id)) =
            (self.amf.ran_find(source.ran_node_id), source.ran_ue_ngap_id)
        else {
            log::error!("[{}] source RAN node gone", source);
            self.cancel_handover_sessions(&amf_ue).await;
            self.abort_resource_allocation(&attempt, &target, cause).await;
            return;
        };

        let command = HandoverCommand {
            amf_ue_ngap_id: source.amf_ue_ngap_id,
            ran_ue_ngap_id: source_ran_ue_ngap_id,
            handover_type: attempt.handover_type,
            pdu_session_resource_handover_list: handover_list,
            pdu_session_resource_to_release_list: release_list,
            target_to_source_transparent_container: container,
        };
        log::info!("[{}] Handover Command (handover {})", source, attempt.id);
        let result = source_ran.sender().send_handover_command(command).await;
        report_send(&source_ran, "HandoverCommand", result);
    }

    pub async fn handle_handover_failure(&self, ran: &RanNode, msg: HandoverFailure) {
        let mut missing = MissingIes::default();
        let Some(amf_ue_ngap_id) =
            missing.require(msg.amf_ue_ngap_id, ProtocolIeId::AMF_UE_NGAP_ID)
        else {
            self.report_missing_ies(
                ran,
                missing,
                ProcedureCode::HANDOVER_RESOURCE_ALLOCATION,
                TriggeringMessage::UnsuccessfulOutcome,
                Criticality::Reject,
            )
            .await;
            return;
        };

        let cause = msg.cause.unwrap_or_else(|| {
            CauseRadioNetwork::HoFailureInTarget5gcNgranNodeOrTargetSystem.into()
        });

        let Some(target) = self.find_ran_ue_on(ran, amf_ue_ngap_id) else {
            self.report_unknown_ue(ran, Some(amf_ue_ngap_id), None).await;
            return;
        };
        log::info!("[{}] Handover Failure ({})", target, cause);

        match self
            .amf
            .handover_of(target.amf_ue_ngap_id)
            .filter(|a| a.target == target.amf_ue_ngap_id)
        {
            Some(attempt) => {
                if let Some(amf_ue) = self.amf.amf_ue_find(attempt.amf_ue_id) {
                    self.cancel_handover_sessions(&amf_ue).await;
                }
                match self.amf.ran_ue_find(attempt.source) {
                    Some(source) => {
                        self.send_preparation_failure(
                            &source,
                            cause,
                            msg.criticality_diagnostics,
                        )
                        .await
                    }
                    None => log::error!("[{}] source leg {} gone", target, attempt.source),
                }
                self.amf.handover_detach(attempt.id);
            }
            None => log::error!("[{}] Handover Failure without handover in progress", target),
        }

        self.release_ran_ue(&target, UeContextReleaseAction::HandoverFailure, cause)
            .await;
    }

    // ------------------------------------------------------------------------
    // Completion and cancellation
    // ------------------------------------------------------------------------

    pub async fn handle_handover_notify(&self, ran: &RanNode, msg: HandoverNotify) {
        let mut missing = MissingIes::default();
        let amf_ue_ngap_id = missing.require(msg.amf_ue_ngap_id, ProtocolIeId::AMF_UE_NGAP_ID);
        let ran_ue_ngap_id = missing.require(msg.ran_ue_ngap_id, ProtocolIeId::RAN_UE_NGAP_ID);
        let (Some(amf_ue_ngap_id), Some(ran_ue_ngap_id)) = (amf_ue_ngap_id, ran_ue_ngap_id) else {
            self.report_missing_ies(
                ran,
                missing,
                ProcedureCode::HANDOVER_NOTIFICATION,
                TriggeringMessage::InitiatingMessage,
                Criticality::Ignore,
            )
            .await;
            return;
        };

        let Some(target) = self.amf.ran_ue_find_by_ran_ue_ngap_id(ran, ran_ue_ngap_id) else {
            self.report_unknown_ue(ran, Some(amf_ue_ngap_id), Some(ran_ue_ngap_id))
                .await;
            return;
        };

        if let Some(location) = msg.user_location_information {
            self.update_location(&target, location);
        }

        let Some(amf_ue) = self.amf.amf_ue_of(&target) else {
            log::error!("[{}] Handover Notify without AMF UE", target);
            return;
        };
        let Some(attempt) = self
            .amf
            .handover_of(target.amf_ue_ngap_id)
            .filter(|a| a.target == target.amf_ue_ngap_id)
        else {
            log::error!("[{}] Handover Notify without handover in progress", target);
            return;
        };

        for pdu_session_id in &attempt.success_pdu_session_ids {
            let Some(sm) = amf_ue.sm_context_find(*pdu_session_id) else {
                continue;
            };
            let request = SmUpdateRequest::new(SmUpdateKind::HandoverComplete, Vec::new());
            if let Err(e) = self.smf.update_session(&sm.sm_ref, request).await {
                log::error!(
                    "[{}] PDU session {} handover complete failed: {}",
                    target,
                    pdu_session_id,
                    e
                );
            }
        }

        if let Err(e) = self
            .amf
            .amf_ue_attach_ran_ue(amf_ue.id, target.amf_ue_ngap_id)
        {
            log::error!("[{}] attach to target leg failed: {}", target, e);
        }
        self.amf.handover_detach(attempt.id);
        log::info!("[{}] Handover {} complete", target, attempt.id);

        match self.amf.ran_ue_find(attempt.source) {
            Some(source) => {
                self.release_ran_ue(
                    &source,
                    UeContextReleaseAction::HandoverComplete,
                    CauseNas::NormalRelease.into(),
                )
                .await
            }
            None => log::warn!("[{}] source leg {} already gone", target, attempt.source),
        }
    }

    pub async fn handle_handover_cancel(&self, ran: &RanNode, msg: HandoverCancel) {
        let mut missing = MissingIes::default();
        let amf_ue_ngap_id = missing.require(msg.amf_ue_ngap_id, ProtocolIeId::AMF_UE_NGAP_ID);
        let ran_ue_ngap_id = missing.require(msg.ran_ue_ngap_id, ProtocolIeId::RAN_UE_NGAP_ID);
        let (Some(amf_ue_ngap_id), Some(ran_ue_ngap_id)) = (amf_ue_ngap_id, ran_ue_ngap_id) else {
            self.report_missing_ies(
                ran,
                missing,
                ProcedureCode::HANDOVER_CANCEL,
                TriggeringMessage::InitiatingMessage,
                Criticality::Reject,
            )
            .await;
            return;
        };

        let Some(source) = self.amf.ran_ue_find_by_ran_ue_ngap_id(ran, ran_ue_ngap_id) else {
            self.report_unknown_ue(ran, Some(amf_ue_ngap_id), Some(ran_ue_ngap_id))
                .await;
            return;
        };

        let cause = msg
            .cause
            .unwrap_or_else(|| CauseRadioNetwork::HandoverCancelled.into());
        log::info!("[{}] Handover Cancel ({})", source, cause);

        match self
            .amf
            .handover_of(source.amf_ue_ngap_id)
            .filter(|a| a.source == source.amf_ue_ngap_id)
        {
            Some(attempt) => {
                if let Some(amf_ue) = self.amf.amf_ue_find(attempt.amf_ue_id) {
                    self.cancel_handover_sessions(&amf_ue).await;
                }
                self.amf.handover_detach(attempt.id);
                match self.amf.ran_ue_find(attempt.target) {
                    Some(target) => {
                        self.release_ran_ue(&target, UeContextReleaseAction::HandoverCancel, cause)
                            .await
                    }
                    None => log::warn!("[{}] target leg {} already gone", source, attempt.target),
                }
            }
            None => log::warn!("[{}] Handover Cancel without handover in progress", source),
        }

        let result = ran
            .sender()
            .send_handover_cancel_ack(source.amf_ue_ngap_id, ran_ue_ngap_id)
            .await;
        report_send(ran, "HandoverCancelAcknowledge", result);
    }

    // ------------------------------------------------------------------------
    // Path switch (Xn handover)
    // ------------------------------------------------------------------------

    async fn send_path_switch_failure(
        &self,
        ran: &RanNode,
        amf_ue_ngap_id: AmfUeNgapId,
        ran_ue_ngap_id: RanUeNgapId,
        released: Vec<PduSessionResourceItem>,
    ) {
        log::info!(
            "[RAN:{}] Path Switch Request Failure [{}:{}]",
            ran.id,
            amf_ue_ngap_id,
            ran_ue_ngap_id
        );
        let result = ran
            .sender()
            .send_path_switch_request_failure(amf_ue_ngap_id, ran_ue_ngap_id, released, None)
            .await;
        report_send(ran, "PathSwitchRequestFailure", result);
    }

    pub async fn handle_path_switch_request(&self, ran: &RanNode, msg: PathSwitchRequest) {
        let mut missing = MissingIes::default();
        let ran_ue_ngap_id = missing.require(msg.ran_ue_ngap_id, ProtocolIeId::RAN_UE_NGAP_ID);
        let source_amf_ue_ngap_id =
            missing.require(msg.source_amf_ue_ngap_id, ProtocolIeId::SOURCE_AMF_UE_NGAP_ID);
        let location = missing.require(
            msg.user_location_information,
            ProtocolIeId::USER_LOCATION_INFORMATION,
        );
        let capabilities =
            missing.require(msg.ue_security_capabilities, ProtocolIeId::UE_SECURITY_CAPABILITIES);
        let switch_list = missing.require(
            msg.pdu_session_resource_to_be_switched_dl_list,
            ProtocolIeId::PDU_SESSION_RESOURCE_TO_BE_SWITCHED_DL_LIST,
        );
        let (
            Some(ran_ue_ngap_id),
            Some(source_amf_ue_ngap_id),
            Some(location),
            Some(capabilities),
            Some(switch_list),
        ) = (
            ran_ue_ngap_id,
            source_amf_ue_ngap_id,
            location,
            capabilities,
            switch_list,
        )
        else {
            self.report_missing_ies(
                ran,
                missing,
                ProcedureCode::PATH_SWITCH_REQUEST,
                TriggeringMessage::InitiatingMessage,
                Criticality::Reject,
            )
            .await;
            return;
        };

        let Some(ran_ue) = self.amf.ran_ue_find(source_amf_ue_ngap_id) else {
            log::error!("[RAN:{}] no UE context for source AMF UE NGAP ID {}", ran.id, source_amf_ue_ngap_id);
            self.send_path_switch_failure(ran, source_amf_ue_ngap_id, ran_ue_ngap_id, Vec::new())
                .await;
            return;
        };
        let Some(amf_ue) = self.amf.amf_ue_of(&ran_ue) else {
            log::error!("[{}] Path Switch Request without AMF UE", ran_ue);
            self.send_path_switch_failure(ran, source_amf_ue_ngap_id, ran_ue_ngap_id, Vec::new())
                .await;
            return;
        };
        if !amf_ue.security.is_valid() {
            log::error!("[{}] Path Switch Request without valid security context", ran_ue);
            self.send_path_switch_failure(ran, source_amf_ue_ngap_id, ran_ue_ngap_id, Vec::new())
                .await;
            return;
        }

        let Some(amf_ue) = self.amf.amf_ue_modify(amf_ue.id, |ue| {
            ue.security.advance_ncc();
            ue.security.ue_security_capabilities = capabilities;
        }) else {
            log::error!("[{}] AMF UE vanished during path switch", ran_ue);
            return;
        };
        self.update_location(&ran_ue, location);

        let mut switched = Vec::new();
        let mut released = Vec::new();
        for item in switch_list {
            let Some(sm) = amf_ue.sm_context_find(item.pdu_session_id) else {
                log::warn!("[{}] no SM context for PDU session {}", ran_ue, item.pdu_session_id);
                released.push(PduSessionResourceItem {
                    pdu_session_id: item.pdu_session_id,
                    transfer: Vec::new(),
                });
                continue;
            };

            let request = SmUpdateRequest::new(SmUpdateKind::PathSwitchRequest, item.transfer);
            match self.smf.update_session(&sm.sm_ref, request).await {
                Ok(rsp) => switched.push(PduSessionResourceItem {
                    pdu_session_id: item.pdu_session_id,
                    transfer: rsp.n2_info.unwrap_or_default(),
                }),
                Err(e) => {
                    log::error!(
                        "[{}] PDU session {} path switch failed: {}",
                        ran_ue,
                        item.pdu_session_id,
                        e
                    );
                    self.report_failed_session(
                        &ran_ue,
                        &amf_ue,
                        item.pdu_session_id,
                        SmUpdateKind::PathSwitchSetupFailed,
                        Vec::new(),
                    )
                    .await;
                    released.push(PduSessionResourceItem {
                        pdu_session_id: item.pdu_session_id,
                        transfer: Vec::new(),
                    });
                }
            }
        }

        for item in msg.pdu_session_resource_failed_to_setup_list.unwrap_or_default() {
            if amf_ue.sm_context_find(item.pdu_session_id).is_none() {
                continue;
            }
            self.report_failed_session(
                &ran_ue,
                &amf_ue,
                item.pdu_session_id,
                SmUpdateKind::PathSwitchSetupFailed,
                item.transfer,
            )
            .await;
            released.push(PduSessionResourceItem {
                pdu_session_id: item.pdu_session_id,
                transfer: Vec::new(),
            });
        }

        if switched.is_empty() {
            self.send_path_switch_failure(ran, source_amf_ue_ngap_id, ran_ue_ngap_id, released)
                .await;
            return;
        }

        let ran_ue = match self
            .amf
            .ran_ue_switch_to_ran(ran_ue.amf_ue_ngap_id, ran, ran_ue_ngap_id)
        {
            Ok(ran_ue) => ran_ue,
            Err(e) => {
                log::error!("[{}] switch to RAN:{} failed: {}", ran_ue, ran.id, e);
                self.send_path_switch_failure(ran, source_amf_ue_ngap_id, ran_ue_ngap_id, released)
                    .await;
                return;
            }
        };

        let ack = PathSwitchRequestAcknowledge {
            amf_ue_ngap_id: ran_ue.amf_ue_ngap_id,
            ran_ue_ngap_id,
            ue_security_capabilities: Some(capabilities),
            security_context: amf_ue.security.to_ngap(),
            pdu_session_resource_switched_list: switched,
            pdu_session_resource_released_list: released,
            allowed_nssai: self.amf.operator_info().allowed_nssai(),
        };
        log::info!("[{}] Path Switch Request Acknowledge", ran_ue);
        let result = ran.sender().send_path_switch_request_ack(ack).await;
        report_send(ran, "PathSwitchRequestAcknowledge", result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HandoverRole as Role;
    use crate::test_support::*;
    use amf_ngap::{InitiatingMessage, NgapPdu, SuccessfulOutcome, UnsuccessfulOutcome, UeNgapIds};

    fn handover_required(source: &RanUe, target: u32, sessions: &[u8]) -> HandoverRequired {
        HandoverRequired {
            amf_ue_ngap_id: Some(source.amf_ue_ngap_id),
            ran_ue_ngap_id: source.ran_ue_ngap_id,
            handover_type: Some(amf_ngap::HandoverType::Intra5gs),
            cause: Some(CauseRadioNetwork::HandoverDesirableForRadioReason.into()),
            target_id: Some(TargetId::TargetRanNodeId {
                global_ran_node_id: gnb_id(target),
                selected_tai: tai(1),
            }),
            pdu_session_resource_list: Some(
                sessions
                    .iter()
                    .map(|id| PduSessionResourceItem {
                        pdu_session_id: *id,
                        transfer: vec![*id],
                    })
                    .collect(),
            ),
            source_to_target_transparent_container: Some(vec![0xaa]),
        }
    }

    /// Run Handover Required and return the pending target leg
    async fn prepare(amf: &TestAmf, source_ran: &RanNode, source: &RanUe, target: u32) -> RanUe {
        amf.handler
            .handle_handover_required(source_ran, handover_required(source, target, &[1, 2]))
            .await;
        let attempt = amf.context().handover_of(source.amf_ue_ngap_id).unwrap();
        amf.context().ran_ue_find(attempt.target).unwrap()
    }

    #[tokio::test]
    async fn test_handover_required_sends_request() {
        let amf = TestAmf::new();
        let (source_ran, source_sender) = amf.setup_ran(1, 0x100).await;
        let (_target_ran, target_sender) = amf.setup_ran(2, 0x200).await;
        let (source, amf_ue) = amf.registered_ue(&source_ran, 5, &[1, 2]);

        let target = prepare(&amf, &source_ran, &source, 0x200).await;

        assert!(source_sender.take().is_empty());
        let source = amf.context().ran_ue_find(source.amf_ue_ngap_id).unwrap();
        assert_eq!(source.handover.map(|l| l.role), Some(Role::Source));
        assert_eq!(target.handover.map(|l| l.role), Some(Role::Target));
        assert_eq!(target.ran_ue_ngap_id, None);
        assert_eq!(target.amf_ue_id, Some(amf_ue.id));
        assert_eq!(amf.smf.calls_of(SmUpdateKind::HandoverRequired).len(), 2);

        let ncc = amf.context().amf_ue_find(amf_ue.id).unwrap().security.ncc;
        assert_eq!(ncc, 1);

        match target_sender.take().as_slice() {
            [NgapPdu::InitiatingMessage(InitiatingMessage::HandoverRequest(req))] => {
                assert_eq!(req.amf_ue_ngap_id, target.amf_ue_ngap_id);
                assert_eq!(req.pdu_session_resource_setup_list.len(), 2);
                assert_eq!(req.security_context.next_hop_chaining_count, 1);
                assert_eq!(req.source_to_target_transparent_container, vec![0xaa]);
                assert_eq!(
                    req.cause,
                    Cause::RadioNetwork(CauseRadioNetwork::HandoverDesirableForRadioReason)
                );
            }
            other => panic!("Expected Handover Request, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_handover_required_missing_ies() {
        let amf = TestAmf::new();
        let (ran, sender) = amf.setup_ran(1, 0x100).await;

        let msg = HandoverRequired {
            amf_ue_ngap_id: Some(1),
            ran_ue_ngap_id: Some(5),
            ..Default::default()
        };
        amf.handler.handle_handover_required(&ran, msg).await;

        match sender.take().as_slice() {
            [NgapPdu::InitiatingMessage(InitiatingMessage::ErrorIndication(ei))] => {
                assert!(ei.cause.is_none());
                let diag = ei.criticality_diagnostics.clone().unwrap();
                assert_eq!(diag.procedure_code, Some(ProcedureCode::HANDOVER_PREPARATION));
                assert_eq!(diag.procedure_criticality, Some(Criticality::Reject));
                assert_eq!(diag.ies_criticality_diagnostics.map(|l| l.len()), Some(4));
            }
            other => panic!("Expected Error Indication, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_handover_required_invalid_security() {
        let amf = TestAmf::new();
        let (source_ran, source_sender) = amf.setup_ran(1, 0x100).await;
        amf.setup_ran(2, 0x200).await;
        let (source, amf_ue) = amf.registered_ue(&source_ran, 5, &[1]);
        amf.context()
            .amf_ue_modify(amf_ue.id, |ue| ue.security.mac_failed = true);

        amf.handler
            .handle_handover_required(&source_ran, handover_required(&source, 0x200, &[1]))
            .await;

        assert_eq!(amf.context().handover_count(), 0);
        match source_sender.take().as_slice() {
            [NgapPdu::UnsuccessfulOutcome(UnsuccessfulOutcome::HandoverPreparationFailure(f))] => {
                assert_eq!(f.cause, Cause::Nas(CauseNas::AuthenticationFailure));
                assert_eq!(f.ran_ue_ngap_id, 5);
            }
            other => panic!("Expected Handover Preparation Failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_handover_required_unknown_target() {
        let amf = TestAmf::new();
        let (source_ran, source_sender) = amf.setup_ran(1, 0x100).await;
        let (source, _) = amf.registered_ue(&source_ran, 5, &[1]);

        amf.handler
            .handle_handover_required(&source_ran, handover_required(&source, 0x999, &[1]))
            .await;

        match source_sender.take().as_slice() {
            [NgapPdu::UnsuccessfulOutcome(UnsuccessfulOutcome::HandoverPreparationFailure(f))] => {
                assert_eq!(f.cause, Cause::RadioNetwork(CauseRadioNetwork::UnknownTargetId));
            }
            other => panic!("Expected Handover Preparation Failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_handover_required_all_sessions_rejected() {
        let amf = TestAmf::new();
        let (source_ran, source_sender) = amf.setup_ran(1, 0x100).await;
        let (_target_ran, target_sender) = amf.setup_ran(2, 0x200).await;
        let (source, _) = amf.registered_ue(&source_ran, 5, &[1]);
        amf.smf.fail("sm-1");

        amf.handler
            .handle_handover_required(&source_ran, handover_required(&source, 0x200, &[1]))
            .await;

        assert!(target_sender.take().is_empty());
        assert_eq!(amf.context().handover_count(), 0);
        match source_sender.take().as_slice() {
            [NgapPdu::UnsuccessfulOutcome(UnsuccessfulOutcome::HandoverPreparationFailure(f))] => {
                assert_eq!(
                    f.cause,
                    Cause::RadioNetwork(CauseRadioNetwork::HoFailureInTarget5gcNgranNodeOrTargetSystem)
                );
            }
            other => panic!("Expected Handover Preparation Failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_handover_required_twice_rejected() {
        let amf = TestAmf::new();
        let (source_ran, source_sender) = amf.setup_ran(1, 0x100).await;
        amf.setup_ran(2, 0x200).await;
        let (source, _) = amf.registered_ue(&source_ran, 5, &[1, 2]);

        prepare(&amf, &source_ran, &source, 0x200).await;
        amf.handler
            .handle_handover_required(&source_ran, handover_required(&source, 0x200, &[1]))
            .await;

        assert_eq!(amf.context().handover_count(), 1);
        match source_sender.take().as_slice() {
            [NgapPdu::UnsuccessfulOutcome(UnsuccessfulOutcome::HandoverPreparationFailure(f))] => {
                assert_eq!(
                    f.cause,
                    Cause::RadioNetwork(CauseRadioNetwork::InteractionWithOtherProcedure)
                );
            }
            other => panic!("Expected Handover Preparation Failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_full_handover() {
        let amf = TestAmf::new();
        let (source_ran, source_sender) = amf.setup_ran(1, 0x100).await;
        let (target_ran, target_sender) = amf.setup_ran(2, 0x200).await;
        let (source, amf_ue) = amf.registered_ue(&source_ran, 5, &[1, 2]);

        let target = prepare(&amf, &source_ran, &source, 0x200).await;
        target_sender.take();

        // Target admits session 1 and fails session 2
        let ack = HandoverRequestAcknowledge {
            amf_ue_ngap_id: Some(target.amf_ue_ngap_id),
            ran_ue_ngap_id: Some(70),
            pdu_session_resource_admitted_list: Some(vec![PduSessionResourceItem {
                pdu_session_id: 1,
                transfer: vec![0x11],
            }]),
            pdu_session_resource_failed_to_setup_list: Some(vec![PduSessionResourceItem {
                pdu_session_id: 2,
                transfer: vec![0x22],
            }]),
            target_to_source_transparent_container: Some(vec![0xbb]),
            criticality_diagnostics: None,
        };
        amf.handler
            .handle_handover_request_acknowledge(&target_ran, ack)
            .await;

        assert_eq!(amf.smf.calls_of(SmUpdateKind::HandoverResAllocFail).len(), 1);
        let attempt = amf.context().handover_of(target.amf_ue_ngap_id).unwrap();
        assert_eq!(attempt.success_pdu_session_ids, vec![1]);
        assert_eq!(attempt.failed_pdu_session_ids, vec![2]);
        match source_sender.take().as_slice() {
            [NgapPdu::SuccessfulOutcome(SuccessfulOutcome::HandoverCommand(cmd))] => {
                assert_eq!(cmd.ran_ue_ngap_id, 5);
                assert_eq!(cmd.pdu_session_resource_handover_list.len(), 1);
                assert_eq!(cmd.pdu_session_resource_handover_list[0].transfer, vec![0x11]);
                assert_eq!(cmd.pdu_session_resource_to_release_list[0].pdu_session_id, 2);
                assert_eq!(cmd.target_to_source_transparent_container, vec![0xbb]);
            }
            other => panic!("Expected Handover Command, got {:?}", other),
        }

        let notify = HandoverNotify {
            amf_ue_ngap_id: Some(target.amf_ue_ngap_id),
            ran_ue_ngap_id: Some(70),
            user_location_information: Some(nr_location(2)),
        };
        amf.handler.handle_handover_notify(&target_ran, notify).await;

        assert_eq!(amf.smf.calls_of(SmUpdateKind::HandoverComplete).len(), 1);
        assert_eq!(amf.context().handover_count(), 0);
        let amf_ue = amf.context().amf_ue_find(amf_ue.id).unwrap();
        assert_eq!(amf_ue.ran_ue, Some(target.amf_ue_ngap_id));
        let old = amf.context().ran_ue_find(source.amf_ue_ngap_id).unwrap();
        assert_eq!(old.release_action, UeContextReleaseAction::HandoverComplete);
        assert!(old.handover.is_none());

        match source_sender.take().as_slice() {
            [NgapPdu::InitiatingMessage(InitiatingMessage::UeContextReleaseCommand(cmd))] => {
                assert_eq!(cmd.cause, Cause::Nas(CauseNas::NormalRelease));
                assert_eq!(
                    cmd.ue_ngap_ids,
                    UeNgapIds::Pair {
                        amf_ue_ngap_id: source.amf_ue_ngap_id,
                        ran_ue_ngap_id: 5
                    }
                );
            }
            other => panic!("Expected UE Context Release Command, got {:?}", other),
        }

        // The source release completes and the source leg goes away
        amf.handler
            .handle_ue_context_release_complete(
                &source_ran,
                amf_ngap::UeContextReleaseComplete {
                    amf_ue_ngap_id: Some(source.amf_ue_ngap_id),
                    ran_ue_ngap_id: Some(5),
                    ..Default::default()
                },
            )
            .await;
        assert!(amf.context().ran_ue_find(source.amf_ue_ngap_id).is_none());
        assert_eq!(amf.context().ran_ue_count(), 1);
    }

    #[tokio::test]
    async fn test_handover_ack_nothing_admitted() {
        let amf = TestAmf::new();
        let (source_ran, source_sender) = amf.setup_ran(1, 0x100).await;
        let (target_ran, target_sender) = amf.setup_ran(2, 0x200).await;
        let (source, _) = amf.registered_ue(&source_ran, 5, &[1]);

        let target = prepare(&amf, &source_ran, &source, 0x200).await;
        target_sender.take();

        let ack = HandoverRequestAcknowledge {
            amf_ue_ngap_id: Some(target.amf_ue_ngap_id),
            ran_ue_ngap_id: Some(70),
            pdu_session_resource_admitted_list: Some(Vec::new()),
            target_to_source_transparent_container: Some(vec![0xbb]),
            ..Default::default()
        };
        amf.handler
            .handle_handover_request_acknowledge(&target_ran, ack)
            .await;

        assert_eq!(amf.context().handover_count(), 0);
        match source_sender.take().as_slice() {
            [NgapPdu::UnsuccessfulOutcome(UnsuccessfulOutcome::HandoverPreparationFailure(f))] => {
                assert_eq!(
                    f.cause,
                    Cause::RadioNetwork(CauseRadioNetwork::HoFailureInTarget5gcNgranNodeOrTargetSystem)
                );
            }
            other => panic!("Expected Handover Preparation Failure, got {:?}", other),
        }
        match target_sender.take().as_slice() {
            [NgapPdu::InitiatingMessage(InitiatingMessage::UeContextReleaseCommand(_))] => {}
            other => panic!("Expected UE Context Release Command, got {:?}", other),
        }
        let target = amf.context().ran_ue_find(target.amf_ue_ngap_id).unwrap();
        assert_eq!(target.release_action, UeContextReleaseAction::HandoverFailure);
    }

    #[tokio::test]
    async fn test_handover_ack_missing_container() {
        let amf = TestAmf::new();
        let (target_ran, target_sender) = amf.setup_ran(2, 0x200).await;

        let ack = HandoverRequestAcknowledge {
            amf_ue_ngap_id: Some(1),
            ran_ue_ngap_id: Some(70),
            ..Default::default()
        };
        amf.handler
            .handle_handover_request_acknowledge(&target_ran, ack)
            .await;

        match target_sender.take().as_slice() {
            [NgapPdu::InitiatingMessage(InitiatingMessage::ErrorIndication(ei))] => {
                let diag = ei.criticality_diagnostics.clone().unwrap();
                assert_eq!(
                    diag.procedure_code,
                    Some(ProcedureCode::HANDOVER_RESOURCE_ALLOCATION)
                );
                assert_eq!(diag.triggering_message, Some(TriggeringMessage::SuccessfulOutcome));
            }
            other => panic!("Expected Error Indication, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_handover_failure_from_target() {
        let amf = TestAmf::new();
        let (source_ran, source_sender) = amf.setup_ran(1, 0x100).await;
        let (target_ran, target_sender) = amf.setup_ran(2, 0x200).await;
        let (source, _) = amf.registered_ue(&source_ran, 5, &[1]);

        let target = prepare(&amf, &source_ran, &source, 0x200).await;
        target_sender.take();

        let failure = HandoverFailure {
            amf_ue_ngap_id: Some(target.amf_ue_ngap_id),
            cause: Some(CauseRadioNetwork::NoRadioResourcesAvailableInTargetCell.into()),
            criticality_diagnostics: None,
        };
        amf.handler.handle_handover_failure(&target_ran, failure).await;

        assert_eq!(amf.smf.calls_of(SmUpdateKind::HandoverCancelled).len(), 1);
        assert_eq!(amf.context().handover_count(), 0);
        match source_sender.take().as_slice() {
            [NgapPdu::UnsuccessfulOutcome(UnsuccessfulOutcome::HandoverPreparationFailure(f))] => {
                assert_eq!(
                    f.cause,
                    Cause::RadioNetwork(CauseRadioNetwork::NoRadioResourcesAvailableInTargetCell)
                );
            }
            other => panic!("Expected Handover Preparation Failure, got {:?}", other),
        }
        match target_sender.take().as_slice() {
            [NgapPdu::InitiatingMessage(InitiatingMessage::UeContextReleaseCommand(cmd))] => {
                assert_eq!(
                    cmd.ue_ngap_ids,
                    UeNgapIds::AmfOnly {
                        amf_ue_ngap_id: target.amf_ue_ngap_id
                    }
                );
            }
            other => panic!("Expected UE Context Release Command, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_handover_cancel() {
        let amf = TestAmf::new();
        let (source_ran, source_sender) = amf.setup_ran(1, 0x100).await;
        let (_target_ran, target_sender) = amf.setup_ran(2, 0x200).await;
        let (source, _) = amf.registered_ue(&source_ran, 5, &[1]);

        let target = prepare(&amf, &source_ran, &source, 0x200).await;
        target_sender.take();

        let cancel = HandoverCancel {
            amf_ue_ngap_id: Some(source.amf_ue_ngap_id),
            ran_ue_ngap_id: Some(5),
            cause: None,
        };
        amf.handler.handle_handover_cancel(&source_ran, cancel).await;

        assert_eq!(amf.context().handover_count(), 0);
        assert!(amf
            .context()
            .ran_ue_find(source.amf_ue_ngap_id)
            .unwrap()
            .handover
            .is_none());
        match source_sender.take().as_slice() {
            [NgapPdu::SuccessfulOutcome(SuccessfulOutcome::HandoverCancelAcknowledge(ack))] => {
                assert_eq!(ack.amf_ue_ngap_id, source.amf_ue_ngap_id);
                assert_eq!(ack.ran_ue_ngap_id, 5);
            }
            other => panic!("Expected Handover Cancel Acknowledge, got {:?}", other),
        }
        match target_sender.take().as_slice() {
            [NgapPdu::InitiatingMessage(InitiatingMessage::UeContextReleaseCommand(cmd))] => {
                assert_eq!(cmd.cause, Cause::RadioNetwork(CauseRadioNetwork::HandoverCancelled));
            }
            other => panic!("Expected UE Context Release Command, got {:?}", other),
        }
        let target = amf.context().ran_ue_find(target.amf_ue_ngap_id).unwrap();
        assert_eq!(target.release_action, UeContextReleaseAction::HandoverCancel);
    }

    #[tokio::test]
    async fn test_handover_cancel_without_attempt_still_acks() {
        let amf = TestAmf::new();
        let (source_ran, source_sender) = amf.setup_ran(1, 0x100).await;
        let (source, _) = amf.registered_ue(&source_ran, 5, &[1]);

        let cancel = HandoverCancel {
            amf_ue_ngap_id: Some(source.amf_ue_ngap_id),
            ran_ue_ngap_id: Some(5),
            cause: None,
        };
        amf.handler.handle_handover_cancel(&source_ran, cancel).await;

        match source_sender.take().as_slice() {
            [NgapPdu::SuccessfulOutcome(SuccessfulOutcome::HandoverCancelAcknowledge(_))] => {}
            other => panic!("Expected Handover Cancel Acknowledge, got {:?}", other),
        }
    }

    fn path_switch_request(source: &RanUe, ran_ue_ngap_id: RanUeNgapId, sessions: &[u8]) -> PathSwitchRequest {
        PathSwitchRequest {
            ran_ue_ngap_id: Some(ran_ue_ngap_id),
            source_amf_ue_ngap_id: Some(source.amf_ue_ngap_id),
            user_location_information: Some(nr_location(3)),
            ue_security_capabilities: Some(amf_ngap::UeSecurityCapabilities {
                nr_encryption_algorithms: 0xe000,
                ..Default::default()
            }),
            pdu_session_resource_to_be_switched_dl_list: Some(
                sessions
                    .iter()
                    .map(|id| PduSessionResourceItem {
                        pdu_session_id: *id,
                        transfer: vec![*id],
                    })
                    .collect(),
            ),
            pdu_session_resource_failed_to_setup_list: None,
        }
    }

    #[tokio::test]
    async fn test_path_switch_moves_leg() {
        let amf = TestAmf::new();
        let (old_ran, _) = amf.setup_ran(1, 0x100).await;
        let (new_ran, new_sender) = amf.setup_ran(2, 0x200).await;
        let (ran_ue, amf_ue) = amf.registered_ue(&old_ran, 5, &[1, 2]);
        amf.smf.fail("sm-2");

        amf.handler
            .handle_path_switch_request(&new_ran, path_switch_request(&ran_ue, 40, &[1, 2]))
            .await;

        let moved = amf.context().ran_ue_find(ran_ue.amf_ue_ngap_id).unwrap();
        assert_eq!(moved.ran_node_id, new_ran.id);
        assert_eq!(moved.ran_ue_ngap_id, Some(40));
        assert!(amf.context().ran_ue_find_by_ran_ue_ngap_id(&old_ran, 5).is_none());

        let amf_ue = amf.context().amf_ue_find(amf_ue.id).unwrap();
        assert_eq!(amf_ue.security.ncc, 1);
        assert_eq!(amf_ue.security.ue_security_capabilities.nr_encryption_algorithms, 0xe000);

        match new_sender.take().as_slice() {
            [NgapPdu::SuccessfulOutcome(SuccessfulOutcome::PathSwitchRequestAcknowledge(ack))] => {
                assert_eq!(ack.ran_ue_ngap_id, 40);
                assert_eq!(ack.pdu_session_resource_switched_list.len(), 1);
                assert_eq!(ack.pdu_session_resource_released_list[0].pdu_session_id, 2);
                assert_eq!(ack.security_context.next_hop_chaining_count, 1);
            }
            other => panic!("Expected Path Switch Request Acknowledge, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_path_switch_unknown_source() {
        let amf = TestAmf::new();
        let (new_ran, new_sender) = amf.setup_ran(2, 0x200).await;
        let (old_ran, _) = amf.setup_ran(1, 0x100).await;
        let (ran_ue, _) = amf.registered_ue(&old_ran, 5, &[1]);
        amf.context().ran_ue_remove(ran_ue.amf_ue_ngap_id);

        amf.handler
            .handle_path_switch_request(&new_ran, path_switch_request(&ran_ue, 40, &[1]))
            .await;

        match new_sender.take().as_slice() {
            [NgapPdu::UnsuccessfulOutcome(UnsuccessfulOutcome::PathSwitchRequestFailure(f))] => {
                assert_eq!(f.amf_ue_ngap_id, ran_ue.amf_ue_ngap_id);
                assert_eq!(f.ran_ue_ngap_id, 40);
            }
            other => panic!("Expected Path Switch Request Failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_path_switch_all_sessions_fail() {
        let amf = TestAmf::new();
        let (old_ran, _) = amf.setup_ran(1, 0x100).await;
        let (new_ran, new_sender) = amf.setup_ran(2, 0x200).await;
        let (ran_ue, _) = amf.registered_ue(&old_ran, 5, &[1]);
        amf.smf.fail("sm-1");

        amf.handler
            .handle_path_switch_request(&new_ran, path_switch_request(&ran_ue, 40, &[1]))
            .await;

        let leg = amf.context().ran_ue_find(ran_ue.amf_ue_ngap_id).unwrap();
        assert_eq!(leg.ran_node_id, old_ran.id);
        match new_sender.take().as_slice() {
            [NgapPdu::UnsuccessfulOutcome(UnsuccessfulOutcome::PathSwitchRequestFailure(f))] => {
                assert_eq!(f.pdu_session_resource_released_list.len(), 1);
            }
            other => panic!("Expected Path Switch Request Failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ran_removal_tears_down_handover() {
        let amf = TestAmf::new();
        let (source_ran, _) = amf.setup_ran(1, 0x100).await;
        let (target_ran, _) = amf.setup_ran(2, 0x200).await;
        let (source, _) = amf.registered_ue(&source_ran, 5, &[1]);

        prepare(&amf, &source_ran, &source, 0x200).await;
        amf.context().ran_remove(target_ran.id);

        assert_eq!(amf.context().handover_count(), 0);
        let source = amf.context().ran_ue_find(source.amf_ue_ngap_id).unwrap();
        assert!(source.handover.is_none());
    }

    fn admit_all(
        target: &RanUe,
        ran_ue_ngap_id: RanUeNgapId,
        sessions: &[u8],
    ) -> HandoverRequestAcknowledge {
        HandoverRequestAcknowledge {
            amf_ue_ngap_id: Some(target.amf_ue_ngap_id),
            ran_ue_ngap_id: Some(ran_ue_ngap_id),
            pdu_session_resource_admitted_list: Some(
                sessions
                    .iter()
                    .map(|id| PduSessionResourceItem {
                        pdu_session_id: *id,
                        transfer: vec![0x10 + *id],
                    })
                    .collect(),
            ),
            target_to_source_transparent_container: Some(vec![0xbb]),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_handover_ack_smf_rejects_admitted_session() {
        let amf = TestAmf::new();
        let (source_ran, source_sender) = amf.setup_ran(1, 0x100).await;
        let (target_ran, target_sender) = amf.setup_ran(2, 0x200).await;
        let (source, _) = amf.registered_ue(&source_ran, 5, &[1, 2]);

        let target = prepare(&amf, &source_ran, &source, 0x200).await;
        target_sender.take();
        amf.smf.fail("sm-2");

        amf.handler
            .handle_handover_request_acknowledge(&target_ran, admit_all(&target, 70, &[1, 2]))
            .await;

        assert_eq!(
            amf.smf.calls_of(SmUpdateKind::HandoverResAllocFail),
            vec![("sm-2".to_string(), Vec::new())]
        );
        let attempt = amf.context().handover_of(target.amf_ue_ngap_id).unwrap();
        assert_eq!(attempt.success_pdu_session_ids, vec![1]);
        assert_eq!(attempt.failed_pdu_session_ids, vec![2]);
        match source_sender.take().as_slice() {
            [NgapPdu::SuccessfulOutcome(SuccessfulOutcome::HandoverCommand(cmd))] => {
                assert_eq!(cmd.pdu_session_resource_handover_list.len(), 1);
                assert_eq!(cmd.pdu_session_resource_handover_list[0].pdu_session_id, 1);
                let released: Vec<_> = cmd
                    .pdu_session_resource_to_release_list
                    .iter()
                    .map(|item| item.pdu_session_id)
                    .collect();
                assert_eq!(released, vec![2]);
            }
            other => panic!("Expected Handover Command, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_handover_required_reports_unprepared_session() {
        let amf = TestAmf::new();
        let (source_ran, source_sender) = amf.setup_ran(1, 0x100).await;
        let (target_ran, target_sender) = amf.setup_ran(2, 0x200).await;
        let (source, _) = amf.registered_ue(&source_ran, 5, &[1, 2]);
        amf.smf.fail("sm-2");

        let target = prepare(&amf, &source_ran, &source, 0x200).await;

        assert_eq!(
            amf.smf.calls_of(SmUpdateKind::HandoverResAllocFail),
            vec![("sm-2".to_string(), Vec::new())]
        );
        match target_sender.take().as_slice() {
            [NgapPdu::InitiatingMessage(InitiatingMessage::HandoverRequest(req))] => {
                assert_eq!(req.pdu_session_resource_setup_list.len(), 1);
            }
            other => panic!("Expected Handover Request, got {:?}", other),
        }

        amf.handler
            .handle_handover_request_acknowledge(&target_ran, admit_all(&target, 70, &[1]))
            .await;

        // Reported once, and released on the source side
        assert_eq!(amf.smf.calls_of(SmUpdateKind::HandoverResAllocFail).len(), 1);
        match source_sender.take().as_slice() {
            [NgapPdu::SuccessfulOutcome(SuccessfulOutcome::HandoverCommand(cmd))] => {
                assert_eq!(cmd.pdu_session_resource_handover_list.len(), 1);
                assert_eq!(cmd.pdu_session_resource_to_release_list.len(), 1);
                assert_eq!(cmd.pdu_session_resource_to_release_list[0].pdu_session_id, 2);
            }
            other => panic!("Expected Handover Command, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_handover_ack_from_other_ran_rejected() {
        let amf = TestAmf::new();
        let (ran1, ran1_sender) = amf.setup_ran(1, 0x100).await;
        let (ran2, ran2_sender) = amf.setup_ran(2, 0x200).await;
        let (victim, _) = amf.registered_ue(&ran1, 5, &[1]);

        // RAN2 names a UE it does not own
        amf.handler
            .handle_handover_request_acknowledge(&ran2, admit_all(&victim, 99, &[1]))
            .await;

        let leg = amf.context().ran_ue_find(victim.amf_ue_ngap_id).unwrap();
        assert_eq!(leg.ran_node_id, ran1.id);
        assert_eq!(leg.ran_ue_ngap_id, Some(5));
        assert_eq!(ran1.find_ue(5), Some(victim.amf_ue_ngap_id));
        assert_eq!(ran2.find_ue(99), None);
        assert!(amf.smf.calls_of(SmUpdateKind::HandoverRequestAck).is_empty());
        match ran2_sender.take().as_slice() {
            [NgapPdu::InitiatingMessage(InitiatingMessage::ErrorIndication(ei))] => {
                assert_eq!(
                    ei.cause,
                    Some(Cause::RadioNetwork(CauseRadioNetwork::UnknownLocalUeNgapId))
                );
            }
            other => panic!("Expected Error Indication, got {:?}", other),
        }

        // A pending target leg only binds on its own RAN node
        let (source, _) = amf.registered_ue(&ran1, 6, &[1, 2]);
        let target = prepare(&amf, &ran1, &source, 0x200).await;
        ran1_sender.take();
        amf.handler
            .handle_handover_request_acknowledge(&ran1, admit_all(&target, 71, &[1]))
            .await;

        let target = amf.context().ran_ue_find(target.amf_ue_ngap_id).unwrap();
        assert_eq!(target.ran_node_id, ran2.id);
        assert_eq!(target.ran_ue_ngap_id, None);
        assert_eq!(ran1.find_ue(71), None);
        match ran1_sender.take().as_slice() {
            [NgapPdu::InitiatingMessage(InitiatingMessage::ErrorIndication(_))] => {}
            other => panic!("Expected Error Indication, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_handover_ack_with_source_ran_gone_releases_target() {
        let amf = TestAmf::new();
        let (source_ran, _) = amf.setup_ran(1, 0x100).await;
        let (target_ran, target_sender) = amf.setup_ran(2, 0x200).await;
        let (source, _) = amf.registered_ue(&source_ran, 5, &[1, 2]);

        let target = prepare(&amf, &source_ran, &source, 0x200).await;
        target_sender.take();
        // Source leg points at a RAN node that no longer exists
        amf.context()
            .ran_ue_modify(source.amf_ue_ngap_id, |ue| ue.ran_node_id = 999);

        amf.handler
            .handle_handover_request_acknowledge(&target_ran, admit_all(&target, 70, &[1, 2]))
            .await;

        assert_eq!(amf.context().handover_count(), 0);
        assert_eq!(amf.smf.calls_of(SmUpdateKind::HandoverCancelled).len(), 2);
        let target = amf.context().ran_ue_find(target.amf_ue_ngap_id).unwrap();
        assert!(target.handover.is_none());
        assert_eq!(target.release_action, UeContextReleaseAction::HandoverFailure);
        match target_sender.take().as_slice() {
            [NgapPdu::InitiatingMessage(InitiatingMessage::UeContextReleaseCommand(cmd))] => {
                assert_eq!(
                    cmd.ue_ngap_ids,
                    UeNgapIds::Pair {
                        amf_ue_ngap_id: target.amf_ue_ngap_id,
                        ran_ue_ngap_id: 70
                    }
                );
            }
            other => panic!("Expected UE Context Release Command, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_handover_ack_after_teardown_releases_target() {
        let amf = TestAmf::new();
        let (source_ran, source_sender) = amf.setup_ran(1, 0x100).await;
        let (target_ran, target_sender) = amf.setup_ran(2, 0x200).await;
        let (source, _) = amf.registered_ue(&source_ran, 5, &[1, 2]);

        let target = prepare(&amf, &source_ran, &source, 0x200).await;
        target_sender.take();
        let attempt = amf.context().handover_of(target.amf_ue_ngap_id).unwrap();
        amf.context().handover_detach(attempt.id);

        amf.handler
            .handle_handover_request_acknowledge(&target_ran, admit_all(&target, 70, &[1]))
            .await;

        assert!(source_sender.take().is_empty());
        match target_sender.take().as_slice() {
            [NgapPdu::InitiatingMessage(InitiatingMessage::UeContextReleaseCommand(cmd))] => {
                assert_eq!(cmd.cause, Cause::RadioNetwork(CauseRadioNetwork::HandoverCancelled));
            }
            other => panic!("Expected UE Context Release Command, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_handover_failure_from_other_ran_rejected() {
        let amf = TestAmf::new();
        let (source_ran, source_sender) = amf.setup_ran(1, 0x100).await;
        let (_target_ran, target_sender) = amf.setup_ran(2, 0x200).await;
        let (source, _) = amf.registered_ue(&source_ran, 5, &[1, 2]);

        let target = prepare(&amf, &source_ran, &source, 0x200).await;
        target_sender.take();

        let failure = HandoverFailure {
            amf_ue_ngap_id: Some(target.amf_ue_ngap_id),
            cause: None,
            criticality_diagnostics: None,
        };
        amf.handler.handle_handover_failure(&source_ran, failure).await;

        assert_eq!(amf.context().handover_count(), 1);
        assert!(target_sender.take().is_empty());
        match source_sender.take().as_slice() {
            [NgapPdu::InitiatingMessage(InitiatingMessage::ErrorIndication(_))] => {}
            other => panic!("Expected Error Indication, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_path_switch_reports_failed_sessions_to_smf() {
        let amf = TestAmf::new();
        let (old_ran, _) = amf.setup_ran(1, 0x100).await;
        let (new_ran, new_sender) = amf.setup_ran(2, 0x200).await;
        let (ran_ue, _) = amf.registered_ue(&old_ran, 5, &[1, 2, 3]);
        amf.smf.fail("sm-2");

        let mut msg = path_switch_request(&ran_ue, 40, &[1, 2]);
        msg.pdu_session_resource_failed_to_setup_list = Some(vec![PduSessionResourceItem {
            pdu_session_id: 3,
            transfer: vec![0x33],
        }]);
        amf.handler.handle_path_switch_request(&new_ran, msg).await;

        assert_eq!(
            amf.smf.calls_of(SmUpdateKind::PathSwitchSetupFailed),
            vec![
                ("sm-2".to_string(), Vec::new()),
                ("sm-3".to_string(), vec![0x33]),
            ]
        );
        match new_sender.take().as_slice() {
            [NgapPdu::SuccessfulOutcome(SuccessfulOutcome::PathSwitchRequestAcknowledge(ack))] => {
                assert_eq!(ack.pdu_session_resource_switched_list.len(), 1);
                let released: Vec<_> = ack
                    .pdu_session_resource_released_list
                    .iter()
                    .map(|item| item.pdu_session_id)
                    .collect();
                assert_eq!(released, vec![2, 3]);
            }
            other => panic!("Expected Path Switch Request Acknowledge, got {:?}", other),
        }
    }
}
