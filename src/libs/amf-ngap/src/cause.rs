//! NGAP Cause Types
//!
//! Cause groups and values from NGAP-IEs (3GPP TS 38.413 Section 9.3.1.2)

use serde::{Deserialize, Serialize};
use std::fmt;

/// CauseRadioNetwork - Radio network layer cause values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CauseRadioNetwork {
    Unspecified = 0,
    TxnrelocoverallExpiry = 1,
    SuccessfulHandover = 2,
    ReleaseDueToNgranGeneratedReason = 3,
    ReleaseDueTo5gcGeneratedReason = 4,
    HandoverCancelled = 5,
    PartialHandover = 6,
    HoFailureInTarget5gcNgranNodeOrTargetSystem = 7,
    HoTargetNotAllowed = 8,
    TngrelocoverallExpiry = 9,
    TngrelocprepExpiry = 10,
    CellNotAvailable = 11,
    UnknownTargetId = 12,
    NoRadioResourcesAvailableInTargetCell = 13,
    UnknownLocalUeNgapId = 14,
    InconsistentRemoteUeNgapId = 15,
    HandoverDesirableForRadioReason = 16,
    TimeCriticalHandover = 17,
    ResourceOptimisationHandover = 18,
    ReduceLoadInServingCell = 19,
    UserInactivity = 20,
    RadioConnectionWithUeLost = 21,
    RadioResourcesNotAvailable = 22,
    InvalidQosCombination = 23,
    FailureInRadioInterfaceProcedure = 24,
    InteractionWithOtherProcedure = 25,
    UnknownPduSessionId = 26,
    UnknownQosFlowId = 27,
    MultiplePduSessionIdInstances = 28,
    MultipleQosFlowIdInstances = 29,
    EncryptionAndOrIntegrityProtectionAlgorithmsNotSupported = 30,
    NgIntraSystemHandoverTriggered = 31,
    NgInterSystemHandoverTriggered = 32,
    XnHandoverTriggered = 33,
    NotSupported5qiValue = 34,
    UeContextTransfer = 35,
    ImsVoiceEpsFallbackOrRatFallbackTriggered = 36,
    UpIntegrityProtectionNotPossible = 37,
    UpConfidentialityProtectionNotPossible = 38,
    SliceNotSupported = 39,
    UeInRrcInactiveStateNotReachable = 40,
    Redirection = 41,
    ResourcesNotAvailableForTheSlice = 42,
    UeMaxIntegrityProtectedDataRateReason = 43,
    ReleaseDueToCnDetectedMobility = 44,
    // Extension values (45+)
    N26InterfaceNotAvailable = 45,
    ReleaseDueToPreEmption = 46,
}

/// CauseTransport - Transport layer cause values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CauseTransport {
    TransportResourceUnavailable = 0,
    Unspecified = 1,
}

/// CauseNas - NAS layer cause values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CauseNas {
    NormalRelease = 0,
    AuthenticationFailure = 1,
    Deregister = 2,
    Unspecified = 3,
    // Extension
    UeNotInPlmnServingArea = 4,
}

/// CauseProtocol - Protocol layer cause values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CauseProtocol {
    TransferSyntaxError = 0,
    AbstractSyntaxErrorReject = 1,
    AbstractSyntaxErrorIgnoreAndNotify = 2,
    MessageNotCompatibleWithReceiverState = 3,
    SemanticError = 4,
    AbstractSyntaxErrorFalselyConstructedMessage = 5,
    Unspecified = 6,
}

/// CauseMisc - Miscellaneous cause values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CauseMisc {
    ControlProcessingOverload = 0,
    NotEnoughUserPlaneProcessingResources = 1,
    HardwareFailure = 2,
    OmIntervention = 3,
    UnknownPlmnOrSnpn = 4,
    Unspecified = 5,
}

/// Cause - CHOICE of the cause groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cause {
    RadioNetwork(CauseRadioNetwork),
    Transport(CauseTransport),
    Nas(CauseNas),
    Protocol(CauseProtocol),
    Misc(CauseMisc),
}

impl Cause {
    /// CHOICE index of the cause group
    pub fn group(&self) -> u8 {
        match self {
            Cause::RadioNetwork(_) => 0,
            Cause::Transport(_) => 1,
            Cause::Nas(_) => 2,
            Cause::Protocol(_) => 3,
            Cause::Misc(_) => 4,
        }
    }

    /// Enumerated value inside the group
    pub fn value(&self) -> u8 {
        match self {
            Cause::RadioNetwork(c) => *c as u8,
            Cause::Transport(c) => *c as u8,
            Cause::Nas(c) => *c as u8,
            Cause::Protocol(c) => *c as u8,
            Cause::Misc(c) => *c as u8,
        }
    }

    fn group_name(&self) -> &'static str {
        match self {
            Cause::RadioNetwork(_) => "RadioNetwork",
            Cause::Transport(_) => "Transport",
            Cause::Nas(_) => "Nas",
            Cause::Protocol(_) => "Protocol",
            Cause::Misc(_) => "Misc",
        }
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cause::RadioNetwork(c) => write!(f, "{}/{:?}", self.group_name(), c),
            Cause::Transport(c) => write!(f, "{}/{:?}", self.group_name(), c),
            Cause::Nas(c) => write!(f, "{}/{:?}", self.group_name(), c),
            Cause::Protocol(c) => write!(f, "{}/{:?}", self.group_name(), c),
            Cause::Misc(c) => write!(f, "{}/{:?}", self.group_name(), c),
        }
    }
}

impl From<CauseRadioNetwork> for Cause {
    fn from(c: CauseRadioNetwork) -> Self {
        Cause::RadioNetwork(c)
    }
}

impl From<CauseNas> for Cause {
    fn from(c: CauseNas) -> Self {
        Cause::Nas(c)
    }
}

impl From<CauseProtocol> for Cause {
    fn from(c: CauseProtocol) -> Self {
        Cause::Protocol(c)
    }
}

impl From<CauseMisc> for Cause {
    fn from(c: CauseMisc) -> Self {
        Cause::Misc(c)
    }
}
