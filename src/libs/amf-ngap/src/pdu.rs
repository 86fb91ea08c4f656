//! NGAP PDU
//!
//! The closed set of NGAP messages exchanged with RAN nodes, grouped by the
//! three NGAP-PDU categories. Decoding produces exactly one variant, so the
//! dispatcher routes with an exhaustive `match`.

use serde::{Deserialize, Serialize};

use crate::ie::{ProcedureCode, TriggeringMessage};
use crate::types::*;

/// NGAP-PDU
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NgapPdu {
    InitiatingMessage(InitiatingMessage),
    SuccessfulOutcome(SuccessfulOutcome),
    UnsuccessfulOutcome(UnsuccessfulOutcome),
}

/// Initiating messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InitiatingMessage {
    NgSetupRequest(NgSetupRequest),
    RanConfigurationUpdate(RanConfigurationUpdate),
    NgReset(NgReset),
    ErrorIndication(ErrorIndication),
    InitialUeMessage(InitialUeMessage),
    UplinkNasTransport(UplinkNasTransport),
    DownlinkNasTransport(DownlinkNasTransport),
    NasNonDeliveryIndication(NasNonDeliveryIndication),
    UeContextReleaseRequest(UeContextReleaseRequest),
    UeContextReleaseCommand(UeContextReleaseCommand),
    UeRadioCapabilityInfoIndication(UeRadioCapabilityInfoIndication),
    LocationReport(LocationReport),
    PduSessionResourceSetupRequest(PduSessionResourceSetupRequest),
    PduSessionResourceModifyRequest(PduSessionResourceModifyRequest),
    PduSessionResourceModifyIndication(PduSessionResourceModifyIndication),
    PduSessionResourceReleaseCommand(PduSessionResourceReleaseCommand),
    PduSessionResourceNotify(PduSessionResourceNotify),
    HandoverRequired(HandoverRequired),
    HandoverRequest(HandoverRequest),
    HandoverNotify(HandoverNotify),
    HandoverCancel(HandoverCancel),
    PathSwitchRequest(PathSwitchRequest),
    UplinkRanConfigurationTransfer(UplinkRanConfigurationTransfer),
    DownlinkRanConfigurationTransfer(DownlinkRanConfigurationTransfer),
}

/// Successful outcomes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SuccessfulOutcome {
    NgSetupResponse(NgSetupResponse),
    RanConfigurationUpdateAcknowledge(RanConfigurationUpdateAcknowledge),
    NgResetAcknowledge(NgResetAcknowledge),
    InitialContextSetupResponse(InitialContextSetupResponse),
    UeContextReleaseComplete(UeContextReleaseComplete),
    UeContextModificationResponse(UeContextModificationResponse),
    PduSessionResourceSetupResponse(PduSessionResourceSetupResponse),
    PduSessionResourceModifyResponse(PduSessionResourceModifyResponse),
    PduSessionResourceModifyConfirm(PduSessionResourceModifyConfirm),
    PduSessionResourceReleaseResponse(PduSessionResourceReleaseResponse),
    HandoverRequestAcknowledge(HandoverRequestAcknowledge),
    HandoverCommand(HandoverCommand),
    HandoverCancelAcknowledge(HandoverCancelAcknowledge),
    PathSwitchRequestAcknowledge(PathSwitchRequestAcknowledge),
}

/// Unsuccessful outcomes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UnsuccessfulOutcome {
    NgSetupFailure(NgSetupFailure),
    RanConfigurationUpdateFailure(RanConfigurationUpdateFailure),
    InitialContextSetupFailure(InitialContextSetupFailure),
    UeContextModificationFailure(UeContextModificationFailure),
    HandoverFailure(HandoverFailure),
    HandoverPreparationFailure(HandoverPreparationFailure),
    PathSwitchRequestFailure(PathSwitchRequestFailure),
}

impl NgapPdu {
    /// Message direction of this PDU
    pub fn triggering_message(&self) -> TriggeringMessage {
        match self {
            NgapPdu::InitiatingMessage(_) => TriggeringMessage::InitiatingMessage,
            NgapPdu::SuccessfulOutcome(_) => TriggeringMessage::SuccessfulOutcome,
            NgapPdu::UnsuccessfulOutcome(_) => TriggeringMessage::UnsuccessfulOutcome,
        }
    }

    pub fn procedure_code(&self) -> ProcedureCode {
        match self {
            NgapPdu::InitiatingMessage(m) => m.procedure_code(),
            NgapPdu::SuccessfulOutcome(m) => m.procedure_code(),
            NgapPdu::UnsuccessfulOutcome(m) => m.procedure_code(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NgapPdu::InitiatingMessage(m) => m.name(),
            NgapPdu::SuccessfulOutcome(m) => m.name(),
            NgapPdu::UnsuccessfulOutcome(m) => m.name(),
        }
    }
}

impl InitiatingMessage {
    pub fn procedure_code(&self) -> ProcedureCode {
        match self {
            InitiatingMessage::NgSetupRequest(_) => ProcedureCode::NG_SETUP,
            InitiatingMessage::RanConfigurationUpdate(_) => ProcedureCode::RAN_CONFIGURATION_UPDATE,
            InitiatingMessage::NgReset(_) => ProcedureCode::NG_RESET,
            InitiatingMessage::ErrorIndication(_) => ProcedureCode::ERROR_INDICATION,
            InitiatingMessage::InitialUeMessage(_) => ProcedureCode::INITIAL_UE_MESSAGE,
            InitiatingMessage::UplinkNasTransport(_) => ProcedureCode::UPLINK_NAS_TRANSPORT,
            InitiatingMessage::DownlinkNasTransport(_) => ProcedureCode::DOWNLINK_NAS_TRANSPORT,
            InitiatingMessage::NasNonDeliveryIndication(_) => {
                ProcedureCode::NAS_NON_DELIVERY_INDICATION
            }
            InitiatingMessage::UeContextReleaseRequest(_) => {
                ProcedureCode::UE_CONTEXT_RELEASE_REQUEST
            }
            InitiatingMessage::UeContextReleaseCommand(_) => ProcedureCode::UE_CONTEXT_RELEASE,
            InitiatingMessage::UeRadioCapabilityInfoIndication(_) => {
                ProcedureCode::UE_RADIO_CAPABILITY_INFO_INDICATION
            }
            InitiatingMessage::LocationReport(_) => ProcedureCode::LOCATION_REPORT,
            InitiatingMessage::PduSessionResourceSetupRequest(_) => {
                ProcedureCode::PDU_SESSION_RESOURCE_SETUP
            }
            InitiatingMessage::PduSessionResourceModifyRequest(_) => {
                ProcedureCode::PDU_SESSION_RESOURCE_MODIFY
            }
            InitiatingMessage::PduSessionResourceModifyIndication(_) => {
                ProcedureCode::PDU_SESSION_RESOURCE_MODIFY_INDICATION
            }
            InitiatingMessage::PduSessionResourceReleaseCommand(_) => {
                ProcedureCode::PDU_SESSION_RESOURCE_RELEASE
            }
            InitiatingMessage::PduSessionResourceNotify(_) => {
                ProcedureCode::PDU_SESSION_RESOURCE_NOTIFY
            }
            InitiatingMessage::HandoverRequired(_) => ProcedureCode::HANDOVER_PREPARATION,
            InitiatingMessage::HandoverRequest(_) => ProcedureCode::HANDOVER_RESOURCE_ALLOCATION,
            InitiatingMessage::HandoverNotify(_) => ProcedureCode::HANDOVER_NOTIFICATION,
            InitiatingMessage::HandoverCancel(_) => ProcedureCode::HANDOVER_CANCEL,
            InitiatingMessage::PathSwitchRequest(_) => ProcedureCode::PATH_SWITCH_REQUEST,
            InitiatingMessage::UplinkRanConfigurationTransfer(_) => {
                ProcedureCode::UPLINK_RAN_CONFIGURATION_TRANSFER
            }
            InitiatingMessage::DownlinkRanConfigurationTransfer(_) => {
                ProcedureCode::DOWNLINK_RAN_CONFIGURATION_TRANSFER
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            InitiatingMessage::NgSetupRequest(_) => "NGSetupRequest",
            InitiatingMessage::RanConfigurationUpdate(_) => "RANConfigurationUpdate",
            InitiatingMessage::NgReset(_) => "NGReset",
            InitiatingMessage::ErrorIndication(_) => "ErrorIndication",
            InitiatingMessage::InitialUeMessage(_) => "InitialUEMessage",
            InitiatingMessage::UplinkNasTransport(_) => "UplinkNASTransport",
            InitiatingMessage::DownlinkNasTransport(_) => "DownlinkNASTransport",
            InitiatingMessage::NasNonDeliveryIndication(_) => "NASNonDeliveryIndication",
            InitiatingMessage::UeContextReleaseRequest(_) => "UEContextReleaseRequest",
            InitiatingMessage::UeContextReleaseCommand(_) => "UEContextReleaseCommand",
            InitiatingMessage::UeRadioCapabilityInfoIndication(_) => {
                "UERadioCapabilityInfoIndication"
            }
            InitiatingMessage::LocationReport(_) => "LocationReport",
            InitiatingMessage::PduSessionResourceSetupRequest(_) => {
                "PDUSessionResourceSetupRequest"
            }
            InitiatingMessage::PduSessionResourceModifyRequest(_) => {
                "PDUSessionResourceModifyRequest"
            }
            InitiatingMessage::PduSessionResourceModifyIndication(_) => {
                "PDUSessionResourceModifyIndication"
            }
            InitiatingMessage::PduSessionResourceReleaseCommand(_) => {
                "PDUSessionResourceReleaseCommand"
            }
            InitiatingMessage::PduSessionResourceNotify(_) => "PDUSessionResourceNotify",
            InitiatingMessage::HandoverRequired(_) => "HandoverRequired",
            InitiatingMessage::HandoverRequest(_) => "HandoverRequest",
            InitiatingMessage::HandoverNotify(_) => "HandoverNotify",
            InitiatingMessage::HandoverCancel(_) => "HandoverCancel",
            InitiatingMessage::PathSwitchRequest(_) => "PathSwitchRequest",
            InitiatingMessage::UplinkRanConfigurationTransfer(_) => {
                "UplinkRANConfigurationTransfer"
            }
            InitiatingMessage::DownlinkRanConfigurationTransfer(_) => {
                "DownlinkRANConfigurationTransfer"
            }
        }
    }
}

impl SuccessfulOutcome {
    pub fn procedure_code(&self) -> ProcedureCode {
        match self {
            SuccessfulOutcome::NgSetupResponse(_) => ProcedureCode::NG_SETUP,
            SuccessfulOutcome::RanConfigurationUpdateAcknowledge(_) => {
                ProcedureCode::RAN_CONFIGURATION_UPDATE
            }
            SuccessfulOutcome::NgResetAcknowledge(_) => ProcedureCode::NG_RESET,
            SuccessfulOutcome::InitialContextSetupResponse(_) => {
                ProcedureCode::INITIAL_CONTEXT_SETUP
            }
            SuccessfulOutcome::UeContextReleaseComplete(_) => ProcedureCode::UE_CONTEXT_RELEASE,
            SuccessfulOutcome::UeContextModificationResponse(_) => {
                ProcedureCode::UE_CONTEXT_MODIFICATION
            }
            SuccessfulOutcome::PduSessionResourceSetupResponse(_) => {
                ProcedureCode::PDU_SESSION_RESOURCE_SETUP
            }
            SuccessfulOutcome::PduSessionResourceModifyResponse(_) => {
                ProcedureCode::PDU_SESSION_RESOURCE_MODIFY
            }
            SuccessfulOutcome::PduSessionResourceModifyConfirm(_) => {
                ProcedureCode::PDU_SESSION_RESOURCE_MODIFY_INDICATION
            }
            SuccessfulOutcome::PduSessionResourceReleaseResponse(_) => {
                ProcedureCode::PDU_SESSION_RESOURCE_RELEASE
            }
            SuccessfulOutcome::HandoverRequestAcknowledge(_) => {
                ProcedureCode::HANDOVER_RESOURCE_ALLOCATION
            }
            SuccessfulOutcome::HandoverCommand(_) => ProcedureCode::HANDOVER_PREPARATION,
            SuccessfulOutcome::HandoverCancelAcknowledge(_) => ProcedureCode::HANDOVER_CANCEL,
            SuccessfulOutcome::PathSwitchRequestAcknowledge(_) => {
                ProcedureCode::PATH_SWITCH_REQUEST
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SuccessfulOutcome::NgSetupResponse(_) => "NGSetupResponse",
            SuccessfulOutcome::RanConfigurationUpdateAcknowledge(_) => {
                "RANConfigurationUpdateAcknowledge"
            }
            SuccessfulOutcome::NgResetAcknowledge(_) => "NGResetAcknowledge",
            SuccessfulOutcome::InitialContextSetupResponse(_) => "InitialContextSetupResponse",
            SuccessfulOutcome::UeContextReleaseComplete(_) => "UEContextReleaseComplete",
            SuccessfulOutcome::UeContextModificationResponse(_) => "UEContextModificationResponse",
            SuccessfulOutcome::PduSessionResourceSetupResponse(_) => {
                "PDUSessionResourceSetupResponse"
            }
            SuccessfulOutcome::PduSessionResourceModifyResponse(_) => {
                "PDUSessionResourceModifyResponse"
            }
            SuccessfulOutcome::PduSessionResourceModifyConfirm(_) => {
                "PDUSessionResourceModifyConfirm"
            }
            SuccessfulOutcome::PduSessionResourceReleaseResponse(_) => {
                "PDUSessionResourceReleaseResponse"
            }
            SuccessfulOutcome::HandoverRequestAcknowledge(_) => "HandoverRequestAcknowledge",
            SuccessfulOutcome::HandoverCommand(_) => "HandoverCommand",
            SuccessfulOutcome::HandoverCancelAcknowledge(_) => "HandoverCancelAcknowledge",
            SuccessfulOutcome::PathSwitchRequestAcknowledge(_) => "PathSwitchRequestAcknowledge",
        }
    }
}

impl UnsuccessfulOutcome {
    pub fn procedure_code(&self) -> ProcedureCode {
        match self {
            UnsuccessfulOutcome::NgSetupFailure(_) => ProcedureCode::NG_SETUP,
            UnsuccessfulOutcome::RanConfigurationUpdateFailure(_) => {
                ProcedureCode::RAN_CONFIGURATION_UPDATE
            }
            UnsuccessfulOutcome::InitialContextSetupFailure(_) => {
                ProcedureCode::INITIAL_CONTEXT_SETUP
            }
            UnsuccessfulOutcome::UeContextModificationFailure(_) => {
                ProcedureCode::UE_CONTEXT_MODIFICATION
            }
            UnsuccessfulOutcome::HandoverFailure(_) => ProcedureCode::HANDOVER_RESOURCE_ALLOCATION,
            UnsuccessfulOutcome::HandoverPreparationFailure(_) => {
                ProcedureCode::HANDOVER_PREPARATION
            }
            UnsuccessfulOutcome::PathSwitchRequestFailure(_) => ProcedureCode::PATH_SWITCH_REQUEST,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            UnsuccessfulOutcome::NgSetupFailure(_) => "NGSetupFailure",
            UnsuccessfulOutcome::RanConfigurationUpdateFailure(_) => "RANConfigurationUpdateFailure",
            UnsuccessfulOutcome::InitialContextSetupFailure(_) => "InitialContextSetupFailure",
            UnsuccessfulOutcome::UeContextModificationFailure(_) => "UEContextModificationFailure",
            UnsuccessfulOutcome::HandoverFailure(_) => "HandoverFailure",
            UnsuccessfulOutcome::HandoverPreparationFailure(_) => "HandoverPreparationFailure",
            UnsuccessfulOutcome::PathSwitchRequestFailure(_) => "PathSwitchRequestFailure",
        }
    }
}

impl From<InitiatingMessage> for NgapPdu {
    fn from(m: InitiatingMessage) -> Self {
        NgapPdu::InitiatingMessage(m)
    }
}

impl From<SuccessfulOutcome> for NgapPdu {
    fn from(m: SuccessfulOutcome) -> Self {
        NgapPdu::SuccessfulOutcome(m)
    }
}

impl From<UnsuccessfulOutcome> for NgapPdu {
    fn from(m: UnsuccessfulOutcome) -> Self {
        NgapPdu::UnsuccessfulOutcome(m)
    }
}
