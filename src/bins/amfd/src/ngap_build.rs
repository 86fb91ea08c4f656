//! NGAP Message Building
//!
//! Builders for the messages the AMF originates. Each returns a typed
//! [`NgapPdu`]; encoding happens in the sender.

use amf_ngap::{
    AmfUeNgapId, Cause, CriticalityDiagnostics, DownlinkNasTransport, ErrorIndication,
    HandoverCancelAcknowledge, HandoverPreparationFailure, InitiatingMessage, NgResetAcknowledge,
    NgSetupFailure, NgSetupResponse, NgapPdu, PathSwitchRequestFailure, PduSessionResourceItem,
    RanConfigurationUpdateAcknowledge, RanConfigurationUpdateFailure, RanUeNgapId,
    SuccessfulOutcome, TimeToWait, UeAssociatedLogicalNgConnectionItem, UeContextReleaseCommand,
    UeNgapIds, UnsuccessfulOutcome,
};

use crate::context::OperatorInfo;

// ============================================================================
// Interface Management
// ============================================================================

/// Build NG Setup Response from the operator configuration
pub fn build_ng_setup_response(operator: &OperatorInfo) -> NgapPdu {
    SuccessfulOutcome::NgSetupResponse(NgSetupResponse {
        amf_name: operator.amf_name.clone(),
        served_guami_list: vec![operator.guami],
        relative_amf_capacity: operator.relative_capacity,
        plmn_support_list: operator.plmn_support.clone(),
    })
    .into()
}

/// Build NG Setup Failure
pub fn build_ng_setup_failure(cause: Cause, time_to_wait: Option<TimeToWait>) -> NgapPdu {
    UnsuccessfulOutcome::NgSetupFailure(NgSetupFailure {
        cause,
        time_to_wait,
        criticality_diagnostics: None,
    })
    .into()
}

pub fn build_ran_configuration_update_ack() -> NgapPdu {
    SuccessfulOutcome::RanConfigurationUpdateAcknowledge(RanConfigurationUpdateAcknowledge {
        criticality_diagnostics: None,
    })
    .into()
}

pub fn build_ran_configuration_update_failure(
    cause: Cause,
    time_to_wait: Option<TimeToWait>,
) -> NgapPdu {
    UnsuccessfulOutcome::RanConfigurationUpdateFailure(RanConfigurationUpdateFailure {
        cause,
        time_to_wait,
        criticality_diagnostics: None,
    })
    .into()
}

/// Build NG Reset Acknowledge.
///
/// The UE-associated list is echoed only for a partial reset.
pub fn build_ng_reset_ack(
    partial: Option<Vec<UeAssociatedLogicalNgConnectionItem>>,
) -> NgapPdu {
    SuccessfulOutcome::NgResetAcknowledge(NgResetAcknowledge {
        ue_associated_logical_ng_connection_list: partial.filter(|list| !list.is_empty()),
        criticality_diagnostics: None,
    })
    .into()
}

/// Build Error Indication
pub fn build_error_indication(
    amf_ue_ngap_id: Option<AmfUeNgapId>,
    ran_ue_ngap_id: Option<RanUeNgapId>,
    cause: Option<Cause>,
    criticality_diagnostics: Option<CriticalityDiagnostics>,
) -> NgapPdu {
    InitiatingMessage::ErrorIndication(ErrorIndication {
        amf_ue_ngap_id,
        ran_ue_ngap_id,
        cause,
        criticality_diagnostics,
    })
    .into()
}

// ============================================================================
// UE Context / NAS Transport
// ============================================================================

pub fn build_ue_context_release_command(ue_ngap_ids: UeNgapIds, cause: Cause) -> NgapPdu {
    InitiatingMessage::UeContextReleaseCommand(UeContextReleaseCommand { ue_ngap_ids, cause })
        .into()
}

pub fn build_downlink_nas_transport(
    amf_ue_ngap_id: AmfUeNgapId,
    ran_ue_ngap_id: RanUeNgapId,
    nas_pdu: Vec<u8>,
) -> NgapPdu {
    InitiatingMessage::DownlinkNasTransport(DownlinkNasTransport {
        amf_ue_ngap_id,
        ran_ue_ngap_id,
        nas_pdu,
    })
    .into()
}

// ============================================================================
// Mobility
// ============================================================================

pub fn build_handover_preparation_failure(
    amf_ue_ngap_id: AmfUeNgapId,
    ran_ue_ngap_id: RanUeNgapId,
    cause: Cause,
    criticality_diagnostics: Option<CriticalityDiagnostics>,
) -> NgapPdu {
    UnsuccessfulOutcome::HandoverPreparationFailure(HandoverPreparationFailure {
        amf_ue_ngap_id,
        ran_ue_ngap_id,
        cause,
        criticality_diagnostics,
    })
    .into()
}

pub fn build_handover_cancel_ack(
    amf_ue_ngap_id: AmfUeNgapId,
    ran_ue_ngap_id: RanUeNgapId,
) -> NgapPdu {
    SuccessfulOutcome::HandoverCancelAcknowledge(HandoverCancelAcknowledge {
        amf_ue_ngap_id,
        ran_ue_ngap_id,
    })
    .into()
}

pub fn build_path_switch_request_failure(
    amf_ue_ngap_id: AmfUeNgapId,
    ran_ue_ngap_id: RanUeNgapId,
    released: Vec<PduSessionResourceItem>,
    criticality_diagnostics: Option<CriticalityDiagnostics>,
) -> NgapPdu {
    UnsuccessfulOutcome::PathSwitchRequestFailure(PathSwitchRequestFailure {
        amf_ue_ngap_id,
        ran_ue_ngap_id,
        pdu_session_resource_released_list: released,
        criticality_diagnostics,
    })
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use amf_ngap::{CauseMisc, CauseNas, ProcedureCode};

    #[test]
    fn test_build_ng_setup_response() {
        let operator = OperatorInfo::default();
        let pdu = build_ng_setup_response(&operator);

        assert_eq!(pdu.procedure_code(), ProcedureCode::NG_SETUP);
        match pdu {
            NgapPdu::SuccessfulOutcome(SuccessfulOutcome::NgSetupResponse(rsp)) => {
                assert_eq!(rsp.amf_name, operator.amf_name);
                assert_eq!(rsp.served_guami_list, vec![operator.guami]);
                assert_eq!(rsp.relative_amf_capacity, 255);
            }
            _ => panic!("Expected NG Setup Response"),
        }
    }

    #[test]
    fn test_build_ng_setup_failure() {
        let pdu = build_ng_setup_failure(CauseMisc::UnknownPlmnOrSnpn.into(), Some(TimeToWait::V10s));
        match pdu {
            NgapPdu::UnsuccessfulOutcome(UnsuccessfulOutcome::NgSetupFailure(f)) => {
                assert_eq!(f.cause, Cause::Misc(CauseMisc::UnknownPlmnOrSnpn));
                assert_eq!(f.time_to_wait, Some(TimeToWait::V10s));
            }
            _ => panic!("Expected NG Setup Failure"),
        }
    }

    #[test]
    fn test_build_ng_reset_ack_whole_interface() {
        match build_ng_reset_ack(Some(Vec::new())) {
            NgapPdu::SuccessfulOutcome(SuccessfulOutcome::NgResetAcknowledge(ack)) => {
                assert!(ack.ue_associated_logical_ng_connection_list.is_none());
            }
            _ => panic!("Expected NG Reset Acknowledge"),
        }
    }

    #[test]
    fn test_build_ue_context_release_command() {
        let ids = UeNgapIds::AmfOnly { amf_ue_ngap_id: 9 };
        match build_ue_context_release_command(ids, CauseNas::NormalRelease.into()) {
            NgapPdu::InitiatingMessage(InitiatingMessage::UeContextReleaseCommand(cmd)) => {
                assert_eq!(cmd.ue_ngap_ids, ids);
                assert_eq!(cmd.cause, Cause::Nas(CauseNas::NormalRelease));
            }
            _ => panic!("Expected UE Context Release Command"),
        }
    }
}
