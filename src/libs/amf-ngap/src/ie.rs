//! NGAP Protocol Identifiers
//!
//! Procedure codes, protocol IE identifiers and the criticality enumerations
//! used by the Criticality Diagnostics IE (3GPP TS 38.413 Section 9.3.1.3).

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Procedure Codes (Section 9.4.7)
// ============================================================================

/// NGAP procedure code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProcedureCode(pub u8);

impl ProcedureCode {
    pub const AMF_CONFIGURATION_UPDATE: Self = Self(0);
    pub const DOWNLINK_NAS_TRANSPORT: Self = Self(4);
    pub const DOWNLINK_RAN_CONFIGURATION_TRANSFER: Self = Self(6);
    pub const ERROR_INDICATION: Self = Self(9);
    pub const HANDOVER_CANCEL: Self = Self(10);
    pub const HANDOVER_NOTIFICATION: Self = Self(11);
    pub const HANDOVER_PREPARATION: Self = Self(12);
    pub const HANDOVER_RESOURCE_ALLOCATION: Self = Self(13);
    pub const INITIAL_CONTEXT_SETUP: Self = Self(14);
    pub const INITIAL_UE_MESSAGE: Self = Self(15);
    pub const LOCATION_REPORT: Self = Self(18);
    pub const NAS_NON_DELIVERY_INDICATION: Self = Self(19);
    pub const NG_RESET: Self = Self(20);
    pub const NG_SETUP: Self = Self(21);
    pub const PATH_SWITCH_REQUEST: Self = Self(25);
    pub const PDU_SESSION_RESOURCE_MODIFY: Self = Self(26);
    pub const PDU_SESSION_RESOURCE_MODIFY_INDICATION: Self = Self(27);
    pub const PDU_SESSION_RESOURCE_RELEASE: Self = Self(28);
    pub const PDU_SESSION_RESOURCE_SETUP: Self = Self(29);
    pub const PDU_SESSION_RESOURCE_NOTIFY: Self = Self(30);
    pub const RAN_CONFIGURATION_UPDATE: Self = Self(35);
    pub const UE_CONTEXT_MODIFICATION: Self = Self(40);
    pub const UE_CONTEXT_RELEASE: Self = Self(41);
    pub const UE_CONTEXT_RELEASE_REQUEST: Self = Self(42);
    pub const UE_RADIO_CAPABILITY_INFO_INDICATION: Self = Self(44);
    pub const UPLINK_NAS_TRANSPORT: Self = Self(46);
    pub const UPLINK_RAN_CONFIGURATION_TRANSFER: Self = Self(48);
}

impl fmt::Display for ProcedureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Protocol IE Identifiers (Section 9.4.7)
// ============================================================================

/// NGAP protocol IE identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProtocolIeId(pub u16);

impl ProtocolIeId {
    pub const AMF_UE_NGAP_ID: Self = Self(10);
    pub const CAUSE: Self = Self(15);
    pub const CRITICALITY_DIAGNOSTICS: Self = Self(19);
    pub const DEFAULT_PAGING_DRX: Self = Self(21);
    pub const FIVE_G_S_TMSI: Self = Self(26);
    pub const GLOBAL_RAN_NODE_ID: Self = Self(27);
    pub const HANDOVER_TYPE: Self = Self(29);
    pub const NAS_PDU: Self = Self(38);
    pub const PDU_SESSION_RESOURCE_ADMITTED_LIST: Self = Self(53);
    pub const PDU_SESSION_RESOURCE_FAILED_TO_SETUP_LIST_HO_ACK: Self = Self(56);
    pub const PDU_SESSION_RESOURCE_LIST_HO_RQD: Self = Self(61);
    pub const PDU_SESSION_RESOURCE_MODIFY_LIST_MOD_IND: Self = Self(63);
    pub const PDU_SESSION_RESOURCE_TO_BE_SWITCHED_DL_LIST: Self = Self(76);
    pub const RAN_NODE_NAME: Self = Self(82);
    pub const RAN_UE_NGAP_ID: Self = Self(85);
    pub const RESET_TYPE: Self = Self(88);
    pub const RRC_ESTABLISHMENT_CAUSE: Self = Self(90);
    pub const SON_CONFIGURATION_TRANSFER_UL: Self = Self(99);
    pub const SOURCE_AMF_UE_NGAP_ID: Self = Self(100);
    pub const SOURCE_TO_TARGET_TRANSPARENT_CONTAINER: Self = Self(101);
    pub const SUPPORTED_TA_LIST: Self = Self(102);
    pub const TARGET_ID: Self = Self(105);
    pub const TARGET_TO_SOURCE_TRANSPARENT_CONTAINER: Self = Self(106);
    pub const TIME_TO_WAIT: Self = Self(107);
    pub const UE_CONTEXT_REQUEST: Self = Self(112);
    pub const UE_RADIO_CAPABILITY: Self = Self(117);
    pub const UE_SECURITY_CAPABILITIES: Self = Self(119);
    pub const USER_LOCATION_INFORMATION: Self = Self(121);
}

impl fmt::Display for ProtocolIeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Criticality (Section 9.3.1.3)
// ============================================================================

/// Criticality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Criticality {
    Reject = 0,
    Ignore = 1,
    Notify = 2,
}

/// Triggering message of the procedure that detected the error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TriggeringMessage {
    InitiatingMessage = 0,
    SuccessfulOutcome = 1,
    UnsuccessfulOutcome = 2,
}

/// Type of error reported per IE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TypeOfError {
    NotUnderstood = 0,
    Missing = 1,
}

/// One entry of the IEs Criticality Diagnostics list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticalityDiagnosticsIeItem {
    /// Criticality of the offending IE
    pub ie_criticality: Criticality,
    /// Offending IE
    pub ie_id: ProtocolIeId,
    /// What was wrong with it
    pub type_of_error: TypeOfError,
}

/// Criticality Diagnostics IE
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticalityDiagnostics {
    /// Procedure Code (optional)
    pub procedure_code: Option<ProcedureCode>,
    /// Triggering Message (optional)
    pub triggering_message: Option<TriggeringMessage>,
    /// Procedure Criticality (optional)
    pub procedure_criticality: Option<Criticality>,
    /// IEs Criticality Diagnostics (optional)
    pub ies_criticality_diagnostics: Option<Vec<CriticalityDiagnosticsIeItem>>,
}
