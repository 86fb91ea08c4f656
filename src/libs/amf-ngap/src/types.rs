//! NGAP Message Types
//!
//! Strongly-typed representations of the NGAP messages handled by the AMF
//! (3GPP TS 38.413). Inbound messages carry every IE as an `Option` so that
//! presence is decided once at decode time; handlers match on presence instead
//! of re-checking raw containers. Outbound messages carry their mandatory IEs
//! directly.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::cause::Cause;
use crate::ie::CriticalityDiagnostics;

/// AMF UE NGAP ID (0..2^40-1)
pub type AmfUeNgapId = u64;
/// RAN UE NGAP ID (0..2^32-1)
pub type RanUeNgapId = u32;
/// PDU Session ID (0..255)
pub type PduSessionId = u8;
/// Tracking Area Code (3 octets)
pub type Tac = [u8; 3];

/// Largest AMF UE NGAP ID representable on the wire
pub const MAX_AMF_UE_NGAP_ID: AmfUeNgapId = (1 << 40) - 1;

// ============================================================================
// Common Types (Section 9.3)
// ============================================================================

/// PLMN Identity as MCC/MNC digits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlmnId {
    /// MCC digit 1
    pub mcc1: u8,
    /// MCC digit 2
    pub mcc2: u8,
    /// MCC digit 3
    pub mcc3: u8,
    /// MNC digit 1
    pub mnc1: u8,
    /// MNC digit 2
    pub mnc2: u8,
    /// MNC digit 3 (0xf if 2-digit MNC)
    pub mnc3: u8,
}

impl PlmnId {
    /// Create a PLMN ID from decimal MCC and MNC strings
    pub fn new(mcc: &str, mnc: &str) -> Self {
        let mcc: Vec<u8> = mcc.chars().filter_map(|c| c.to_digit(10).map(|d| d as u8)).collect();
        let mnc: Vec<u8> = mnc.chars().filter_map(|c| c.to_digit(10).map(|d| d as u8)).collect();

        Self {
            mcc1: mcc.first().copied().unwrap_or(0),
            mcc2: mcc.get(1).copied().unwrap_or(0),
            mcc3: mcc.get(2).copied().unwrap_or(0),
            mnc1: mnc.first().copied().unwrap_or(0),
            mnc2: mnc.get(1).copied().unwrap_or(0),
            mnc3: mnc.get(2).copied().unwrap_or(0xf),
        }
    }

    /// TBCD encoding (TS 24.501 Section 9.11.3.8)
    pub fn to_octets(&self) -> [u8; 3] {
        [
            (self.mcc2 << 4) | (self.mcc1 & 0x0f),
            (self.mnc3 << 4) | (self.mcc3 & 0x0f),
            (self.mnc2 << 4) | (self.mnc1 & 0x0f),
        ]
    }

    pub fn from_octets(octets: [u8; 3]) -> Self {
        Self {
            mcc1: octets[0] & 0x0f,
            mcc2: octets[0] >> 4,
            mcc3: octets[1] & 0x0f,
            mnc1: octets[2] & 0x0f,
            mnc2: octets[2] >> 4,
            mnc3: octets[1] >> 4,
        }
    }
}

impl fmt::Display for PlmnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}/{}{}", self.mcc1, self.mcc2, self.mcc3, self.mnc1, self.mnc2)?;
        if self.mnc3 != 0xf {
            write!(f, "{}", self.mnc3)?;
        }
        Ok(())
    }
}

/// Convert a 3-octet TAC to its numeric value
pub fn tac_to_u32(tac: &Tac) -> u32 {
    ((tac[0] as u32) << 16) | ((tac[1] as u32) << 8) | tac[2] as u32
}

/// Convert a numeric TAC (24 bits) to 3 octets
pub fn tac_from_u32(tac: u32) -> Tac {
    [(tac >> 16) as u8, (tac >> 8) as u8, tac as u8]
}

/// S-NSSAI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SNssai {
    /// Slice/Service Type
    pub sst: u8,
    /// Slice Differentiator (optional)
    pub sd: Option<[u8; 3]>,
}

/// GUAMI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Guami {
    /// PLMN Identity
    pub plmn_id: PlmnId,
    /// AMF Region ID (8 bits)
    pub amf_region_id: u8,
    /// AMF Set ID (10 bits)
    pub amf_set_id: u16,
    /// AMF Pointer (6 bits)
    pub amf_pointer: u8,
}

/// Tracking Area Identity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tai {
    pub plmn_id: PlmnId,
    pub tac: Tac,
}

/// NR Cell Global Identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NrCgi {
    pub plmn_id: PlmnId,
    /// NR Cell Identity (36 bits)
    pub nr_cell_identity: u64,
}

/// E-UTRA Cell Global Identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EutraCgi {
    pub plmn_id: PlmnId,
    /// E-UTRA Cell Identity (28 bits)
    pub eutra_cell_identity: u32,
}

/// Global RAN Node ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GlobalRanNodeId {
    /// Global gNB ID
    GlobalGnbId {
        plmn_id: PlmnId,
        /// gNB ID value (22..32 bits)
        gnb_id: u32,
        /// gNB ID bit length
        gnb_id_len: u8,
    },
    /// Global ng-eNB ID
    GlobalNgEnbId { plmn_id: PlmnId, ng_enb_id: u32 },
    /// Global N3IWF ID
    GlobalN3iwfId { plmn_id: PlmnId, n3iwf_id: u16 },
}

impl fmt::Display for GlobalRanNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlobalRanNodeId::GlobalGnbId { plmn_id, gnb_id, .. } => {
                write!(f, "gNB {}:{:#x}", plmn_id, gnb_id)
            }
            GlobalRanNodeId::GlobalNgEnbId { plmn_id, ng_enb_id } => {
                write!(f, "ng-eNB {}:{:#x}", plmn_id, ng_enb_id)
            }
            GlobalRanNodeId::GlobalN3iwfId { plmn_id, n3iwf_id } => {
                write!(f, "N3IWF {}:{:#x}", plmn_id, n3iwf_id)
            }
        }
    }
}

/// Broadcast PLMN Item (in Supported TA List)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastPlmnItem {
    pub plmn_id: PlmnId,
    /// TAI Slice Support List
    #[serde(default)]
    pub tai_slice_support_list: Vec<SNssai>,
}

/// Supported TA Item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedTaItem {
    pub tac: Tac,
    pub broadcast_plmn_list: Vec<BroadcastPlmnItem>,
}

/// PLMN Support Item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlmnSupportItem {
    pub plmn_id: PlmnId,
    pub slice_support_list: Vec<SNssai>,
}

/// Paging DRX
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PagingDrx {
    V32,
    V64,
    V128,
    V256,
}

/// Time to Wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeToWait {
    V1s,
    V2s,
    V5s,
    V10s,
    V20s,
    V60s,
}

impl TimeToWait {
    pub fn seconds(&self) -> u32 {
        match self {
            TimeToWait::V1s => 1,
            TimeToWait::V2s => 2,
            TimeToWait::V5s => 5,
            TimeToWait::V10s => 10,
            TimeToWait::V20s => 20,
            TimeToWait::V60s => 60,
        }
    }
}

/// User Location Information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserLocationInformation {
    Nr {
        nr_cgi: NrCgi,
        tai: Tai,
        /// Time stamp of the last UE activity (NTP seconds)
        time_stamp: Option<u32>,
    },
    Eutra {
        eutra_cgi: EutraCgi,
        tai: Tai,
    },
}

impl UserLocationInformation {
    pub fn tai(&self) -> &Tai {
        match self {
            UserLocationInformation::Nr { tai, .. } => tai,
            UserLocationInformation::Eutra { tai, .. } => tai,
        }
    }
}

/// RRC Establishment Cause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RrcEstablishmentCause {
    Emergency,
    HighPriorityAccess,
    MtAccess,
    MoSignalling,
    MoData,
    MoVoiceCall,
    MoVideoCall,
    MoSms,
    MpsPriorityAccess,
    McsPriorityAccess,
    NotAvailable,
}

/// RRC State
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RrcState {
    Inactive,
    Connected,
}

/// 5G-S-TMSI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiveGSTmsi {
    /// AMF Set ID (10 bits)
    pub amf_set_id: u16,
    /// AMF Pointer (6 bits)
    pub amf_pointer: u8,
    /// 5G-TMSI
    pub five_g_tmsi: u32,
}

/// UE Security Capabilities
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UeSecurityCapabilities {
    /// NR Encryption Algorithms (16-bit bitmap)
    pub nr_encryption_algorithms: u16,
    /// NR Integrity Protection Algorithms (16-bit bitmap)
    pub nr_integrity_protection_algorithms: u16,
    /// E-UTRA Encryption Algorithms (16-bit bitmap)
    pub eutra_encryption_algorithms: u16,
    /// E-UTRA Integrity Protection Algorithms (16-bit bitmap)
    pub eutra_integrity_protection_algorithms: u16,
}

/// UE Aggregate Maximum Bit Rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UeAmbr {
    /// Downlink (bps)
    pub dl: u64,
    /// Uplink (bps)
    pub ul: u64,
}

/// Security Context (NCC + NH)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityContext {
    /// Next Hop Chaining Count (0..7)
    pub next_hop_chaining_count: u8,
    /// Next Hop key
    pub next_hop: [u8; 32],
}

/// Handover Type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandoverType {
    Intra5gs,
    FivegsToEps,
    EpsTo5gs,
}

/// Target ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetId {
    /// Target NG-RAN node
    TargetRanNodeId {
        global_ran_node_id: GlobalRanNodeId,
        selected_tai: Tai,
    },
    /// Target eNB (inter-system)
    TargetEnbId {
        plmn_id: PlmnId,
        enb_id: u32,
        selected_tai: Tai,
    },
}

/// UE NGAP IDs (choice used by UE Context Release Command)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UeNgapIds {
    Pair {
        amf_ue_ngap_id: AmfUeNgapId,
        ran_ue_ngap_id: RanUeNgapId,
    },
    AmfOnly { amf_ue_ngap_id: AmfUeNgapId },
}

/// UE-associated Logical NG-connection Item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UeAssociatedLogicalNgConnectionItem {
    pub amf_ue_ngap_id: Option<AmfUeNgapId>,
    pub ran_ue_ngap_id: Option<RanUeNgapId>,
}

/// Reset Type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResetType {
    /// Reset all UE-associated connections of the interface
    NgInterface,
    /// Reset only the listed UE-associated connections
    PartOfNgInterface(Vec<UeAssociatedLogicalNgConnectionItem>),
}

/// PDU session resource item carrying an opaque SMF transfer
///
/// Shared by every list whose items are `{PDU Session ID, transfer}`:
/// setup/modify/release responses, notify lists, handover admitted and
/// failed lists, path switch lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PduSessionResourceItem {
    pub pdu_session_id: PduSessionId,
    /// Opaque N2 SM information transfer
    #[serde(default)]
    pub transfer: Vec<u8>,
}

/// PDU Session Resource Setup Item (SU Req)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PduSessionResourceSetupItemSuReq {
    pub pdu_session_id: PduSessionId,
    pub nas_pdu: Option<Vec<u8>>,
    pub s_nssai: SNssai,
    pub transfer: Vec<u8>,
}

/// PDU Session Resource Setup Item (HO Req)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PduSessionResourceSetupItemHoReq {
    pub pdu_session_id: PduSessionId,
    pub s_nssai: SNssai,
    pub transfer: Vec<u8>,
}

/// PDU Session Resource Modify Item (Mod Req)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PduSessionResourceModifyItemModReq {
    pub pdu_session_id: PduSessionId,
    pub nas_pdu: Option<Vec<u8>>,
    pub transfer: Vec<u8>,
}

/// SON Configuration Transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SonConfigurationTransfer {
    pub target_ran_node_id: GlobalRanNodeId,
    pub target_tai: Tai,
    pub source_ran_node_id: GlobalRanNodeId,
    pub source_tai: Tai,
    /// SON Information (opaque)
    pub son_information: Vec<u8>,
}

// ============================================================================
// Interface Management (Section 9.2.6)
// ============================================================================

/// NG Setup Request - sent by RAN node to AMF
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NgSetupRequest {
    /// Global RAN Node ID (reject)
    pub global_ran_node_id: Option<GlobalRanNodeId>,
    /// RAN Node Name (ignore)
    pub ran_node_name: Option<String>,
    /// Supported TA List (reject)
    pub supported_ta_list: Option<Vec<SupportedTaItem>>,
    /// Default Paging DRX (ignore)
    pub default_paging_drx: Option<PagingDrx>,
}

/// NG Setup Response - sent by AMF to RAN node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NgSetupResponse {
    pub amf_name: String,
    pub served_guami_list: Vec<Guami>,
    pub relative_amf_capacity: u8,
    pub plmn_support_list: Vec<PlmnSupportItem>,
}

/// NG Setup Failure - sent by AMF to RAN node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NgSetupFailure {
    pub cause: Cause,
    pub time_to_wait: Option<TimeToWait>,
    pub criticality_diagnostics: Option<CriticalityDiagnostics>,
}

/// RAN Configuration Update - sent by RAN node to AMF
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RanConfigurationUpdate {
    pub ran_node_name: Option<String>,
    pub supported_ta_list: Option<Vec<SupportedTaItem>>,
    pub default_paging_drx: Option<PagingDrx>,
    pub global_ran_node_id: Option<GlobalRanNodeId>,
}

/// RAN Configuration Update Acknowledge - sent by AMF to RAN node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RanConfigurationUpdateAcknowledge {
    pub criticality_diagnostics: Option<CriticalityDiagnostics>,
}

/// RAN Configuration Update Failure - sent by AMF to RAN node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RanConfigurationUpdateFailure {
    pub cause: Cause,
    pub time_to_wait: Option<TimeToWait>,
    pub criticality_diagnostics: Option<CriticalityDiagnostics>,
}

/// NG Reset - sent by either side
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NgReset {
    /// Cause (ignore)
    pub cause: Option<Cause>,
    /// Reset Type (reject)
    pub reset_type: Option<ResetType>,
}

/// NG Reset Acknowledge - sent by either side
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NgResetAcknowledge {
    pub ue_associated_logical_ng_connection_list: Option<Vec<UeAssociatedLogicalNgConnectionItem>>,
    pub criticality_diagnostics: Option<CriticalityDiagnostics>,
}

/// Error Indication - sent by either side
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorIndication {
    pub amf_ue_ngap_id: Option<AmfUeNgapId>,
    pub ran_ue_ngap_id: Option<RanUeNgapId>,
    pub cause: Option<Cause>,
    pub criticality_diagnostics: Option<CriticalityDiagnostics>,
}

/// Uplink RAN Configuration Transfer - sent by RAN node to AMF
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UplinkRanConfigurationTransfer {
    pub son_configuration_transfer: Option<SonConfigurationTransfer>,
}

/// Downlink RAN Configuration Transfer - sent by AMF to RAN node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownlinkRanConfigurationTransfer {
    pub son_configuration_transfer: SonConfigurationTransfer,
}

// ============================================================================
// NAS Transport (Section 9.2.5)
// ============================================================================

/// Initial UE Message - sent by RAN node to AMF
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitialUeMessage {
    /// RAN UE NGAP ID (reject)
    pub ran_ue_ngap_id: Option<RanUeNgapId>,
    /// NAS-PDU (reject)
    pub nas_pdu: Option<Vec<u8>>,
    /// User Location Information (reject)
    pub user_location_information: Option<UserLocationInformation>,
    /// RRC Establishment Cause (ignore)
    pub rrc_establishment_cause: Option<RrcEstablishmentCause>,
    /// 5G-S-TMSI (reject, optional)
    pub five_g_s_tmsi: Option<FiveGSTmsi>,
    /// UE Context Request (ignore, optional)
    pub ue_context_request: Option<bool>,
}

/// Uplink NAS Transport - sent by RAN node to AMF
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UplinkNasTransport {
    pub amf_ue_ngap_id: Option<AmfUeNgapId>,
    pub ran_ue_ngap_id: Option<RanUeNgapId>,
    pub nas_pdu: Option<Vec<u8>>,
    pub user_location_information: Option<UserLocationInformation>,
}

/// Downlink NAS Transport - sent by AMF to RAN node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownlinkNasTransport {
    pub amf_ue_ngap_id: AmfUeNgapId,
    pub ran_ue_ngap_id: RanUeNgapId,
    pub nas_pdu: Vec<u8>,
}

/// NAS Non Delivery Indication - sent by RAN node to AMF
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NasNonDeliveryIndication {
    pub amf_ue_ngap_id: Option<AmfUeNgapId>,
    pub ran_ue_ngap_id: Option<RanUeNgapId>,
    pub nas_pdu: Option<Vec<u8>>,
    pub cause: Option<Cause>,
}

// ============================================================================
// UE Context Management (Section 9.2.2)
// ============================================================================

/// Initial Context Setup Response - sent by RAN node to AMF
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitialContextSetupResponse {
    pub amf_ue_ngap_id: Option<AmfUeNgapId>,
    pub ran_ue_ngap_id: Option<RanUeNgapId>,
    pub pdu_session_resource_setup_list: Option<Vec<PduSessionResourceItem>>,
    pub pdu_session_resource_failed_to_setup_list: Option<Vec<PduSessionResourceItem>>,
    pub criticality_diagnostics: Option<CriticalityDiagnostics>,
}

/// Initial Context Setup Failure - sent by RAN node to AMF
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitialContextSetupFailure {
    pub amf_ue_ngap_id: Option<AmfUeNgapId>,
    pub ran_ue_ngap_id: Option<RanUeNgapId>,
    pub pdu_session_resource_failed_to_setup_list: Option<Vec<PduSessionResourceItem>>,
    pub cause: Option<Cause>,
    pub criticality_diagnostics: Option<CriticalityDiagnostics>,
}

/// UE Context Release Request - sent by RAN node to AMF
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UeContextReleaseRequest {
    pub amf_ue_ngap_id: Option<AmfUeNgapId>,
    pub ran_ue_ngap_id: Option<RanUeNgapId>,
    /// PDU Session Resource List Cxt Rel Req (optional)
    pub pdu_session_resource_list: Option<Vec<PduSessionId>>,
    pub cause: Option<Cause>,
}

/// UE Context Release Command - sent by AMF to RAN node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UeContextReleaseCommand {
    pub ue_ngap_ids: UeNgapIds,
    pub cause: Cause,
}

/// UE Context Release Complete - sent by RAN node to AMF
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UeContextReleaseComplete {
    pub amf_ue_ngap_id: Option<AmfUeNgapId>,
    pub ran_ue_ngap_id: Option<RanUeNgapId>,
    pub user_location_information: Option<UserLocationInformation>,
    /// PDU Session Resource List Cxt Rel Cpl (optional)
    pub pdu_session_resource_list: Option<Vec<PduSessionId>>,
    pub criticality_diagnostics: Option<CriticalityDiagnostics>,
}

/// UE Context Modification Response - sent by RAN node to AMF
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UeContextModificationResponse {
    pub amf_ue_ngap_id: Option<AmfUeNgapId>,
    pub ran_ue_ngap_id: Option<RanUeNgapId>,
    pub rrc_state: Option<RrcState>,
    pub user_location_information: Option<UserLocationInformation>,
    pub criticality_diagnostics: Option<CriticalityDiagnostics>,
}

/// UE Context Modification Failure - sent by RAN node to AMF
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UeContextModificationFailure {
    pub amf_ue_ngap_id: Option<AmfUeNgapId>,
    pub ran_ue_ngap_id: Option<RanUeNgapId>,
    pub cause: Option<Cause>,
    pub criticality_diagnostics: Option<CriticalityDiagnostics>,
}

/// UE Radio Capability Info Indication - sent by RAN node to AMF
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UeRadioCapabilityInfoIndication {
    pub amf_ue_ngap_id: Option<AmfUeNgapId>,
    pub ran_ue_ngap_id: Option<RanUeNgapId>,
    pub ue_radio_capability: Option<Vec<u8>>,
    pub ue_radio_capability_for_paging: Option<Vec<u8>>,
}

/// Location Report - sent by RAN node to AMF
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationReport {
    pub amf_ue_ngap_id: Option<AmfUeNgapId>,
    pub ran_ue_ngap_id: Option<RanUeNgapId>,
    pub user_location_information: Option<UserLocationInformation>,
}

// ============================================================================
// PDU Session Management (Section 9.2.1)
// ============================================================================

/// PDU Session Resource Setup Request - sent by AMF to RAN node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PduSessionResourceSetupRequest {
    pub amf_ue_ngap_id: AmfUeNgapId,
    pub ran_ue_ngap_id: RanUeNgapId,
    pub nas_pdu: Option<Vec<u8>>,
    pub pdu_session_resource_setup_list: Vec<PduSessionResourceSetupItemSuReq>,
    pub ue_aggregate_maximum_bit_rate: Option<UeAmbr>,
}

/// PDU Session Resource Setup Response - sent by RAN node to AMF
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PduSessionResourceSetupResponse {
    pub amf_ue_ngap_id: Option<AmfUeNgapId>,
    pub ran_ue_ngap_id: Option<RanUeNgapId>,
    pub pdu_session_resource_setup_list: Option<Vec<PduSessionResourceItem>>,
    pub pdu_session_resource_failed_to_setup_list: Option<Vec<PduSessionResourceItem>>,
    pub criticality_diagnostics: Option<CriticalityDiagnostics>,
}

/// PDU Session Resource Modify Request - sent by AMF to RAN node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PduSessionResourceModifyRequest {
    pub amf_ue_ngap_id: AmfUeNgapId,
    pub ran_ue_ngap_id: RanUeNgapId,
    pub pdu_session_resource_modify_list: Vec<PduSessionResourceModifyItemModReq>,
}

/// PDU Session Resource Modify Response - sent by RAN node to AMF
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PduSessionResourceModifyResponse {
    pub amf_ue_ngap_id: Option<AmfUeNgapId>,
    pub ran_ue_ngap_id: Option<RanUeNgapId>,
    pub pdu_session_resource_modify_list: Option<Vec<PduSessionResourceItem>>,
    pub pdu_session_resource_failed_to_modify_list: Option<Vec<PduSessionResourceItem>>,
    pub user_location_information: Option<UserLocationInformation>,
    pub criticality_diagnostics: Option<CriticalityDiagnostics>,
}

/// PDU Session Resource Modify Indication - sent by RAN node to AMF
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PduSessionResourceModifyIndication {
    pub amf_ue_ngap_id: Option<AmfUeNgapId>,
    pub ran_ue_ngap_id: Option<RanUeNgapId>,
    pub pdu_session_resource_modify_list: Option<Vec<PduSessionResourceItem>>,
}

/// PDU Session Resource Modify Confirm - sent by AMF to RAN node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PduSessionResourceModifyConfirm {
    pub amf_ue_ngap_id: AmfUeNgapId,
    pub ran_ue_ngap_id: RanUeNgapId,
    pub pdu_session_resource_modify_list: Vec<PduSessionResourceItem>,
    pub pdu_session_resource_failed_to_modify_list: Vec<PduSessionResourceItem>,
}

/// PDU Session Resource Release Command - sent by AMF to RAN node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PduSessionResourceReleaseCommand {
    pub amf_ue_ngap_id: AmfUeNgapId,
    pub ran_ue_ngap_id: RanUeNgapId,
    pub nas_pdu: Option<Vec<u8>>,
    pub pdu_session_resource_to_release_list: Vec<PduSessionResourceItem>,
}

/// PDU Session Resource Release Response - sent by RAN node to AMF
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PduSessionResourceReleaseResponse {
    pub amf_ue_ngap_id: Option<AmfUeNgapId>,
    pub ran_ue_ngap_id: Option<RanUeNgapId>,
    pub pdu_session_resource_released_list: Option<Vec<PduSessionResourceItem>>,
    pub user_location_information: Option<UserLocationInformation>,
    pub criticality_diagnostics: Option<CriticalityDiagnostics>,
}

/// PDU Session Resource Notify - sent by RAN node to AMF
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PduSessionResourceNotify {
    pub amf_ue_ngap_id: Option<AmfUeNgapId>,
    pub ran_ue_ngap_id: Option<RanUeNgapId>,
    pub pdu_session_resource_notify_list: Option<Vec<PduSessionResourceItem>>,
    pub pdu_session_resource_released_list: Option<Vec<PduSessionResourceItem>>,
    pub user_location_information: Option<UserLocationInformation>,
}

// ============================================================================
// UE Mobility Management (Section 9.2.3)
// ============================================================================

/// Handover Required - sent by source RAN node to AMF
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandoverRequired {
    pub amf_ue_ngap_id: Option<AmfUeNgapId>,
    pub ran_ue_ngap_id: Option<RanUeNgapId>,
    pub handover_type: Option<HandoverType>,
    pub cause: Option<Cause>,
    pub target_id: Option<TargetId>,
    pub pdu_session_resource_list: Option<Vec<PduSessionResourceItem>>,
    pub source_to_target_transparent_container: Option<Vec<u8>>,
}

/// Handover Request - sent by AMF to target RAN node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoverRequest {
    pub amf_ue_ngap_id: AmfUeNgapId,
    pub handover_type: HandoverType,
    pub cause: Cause,
    pub ue_aggregate_maximum_bit_rate: Option<UeAmbr>,
    pub ue_security_capabilities: UeSecurityCapabilities,
    pub security_context: SecurityContext,
    pub pdu_session_resource_setup_list: Vec<PduSessionResourceSetupItemHoReq>,
    pub allowed_nssai: Vec<SNssai>,
    pub source_to_target_transparent_container: Vec<u8>,
    pub guami: Guami,
}

/// Handover Request Acknowledge - sent by target RAN node to AMF
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandoverRequestAcknowledge {
    pub amf_ue_ngap_id: Option<AmfUeNgapId>,
    pub ran_ue_ngap_id: Option<RanUeNgapId>,
    pub pdu_session_resource_admitted_list: Option<Vec<PduSessionResourceItem>>,
    pub pdu_session_resource_failed_to_setup_list: Option<Vec<PduSessionResourceItem>>,
    pub target_to_source_transparent_container: Option<Vec<u8>>,
    pub criticality_diagnostics: Option<CriticalityDiagnostics>,
}

/// Handover Failure - sent by target RAN node to AMF
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandoverFailure {
    pub amf_ue_ngap_id: Option<AmfUeNgapId>,
    pub cause: Option<Cause>,
    pub criticality_diagnostics: Option<CriticalityDiagnostics>,
}

/// Handover Command - sent by AMF to source RAN node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoverCommand {
    pub amf_ue_ngap_id: AmfUeNgapId,
    pub ran_ue_ngap_id: RanUeNgapId,
    pub handover_type: HandoverType,
    pub pdu_session_resource_handover_list: Vec<PduSessionResourceItem>,
    pub pdu_session_resource_to_release_list: Vec<PduSessionResourceItem>,
    pub target_to_source_transparent_container: Vec<u8>,
}

/// Handover Preparation Failure - sent by AMF to source RAN node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoverPreparationFailure {
    pub amf_ue_ngap_id: AmfUeNgapId,
    pub ran_ue_ngap_id: RanUeNgapId,
    pub cause: Cause,
    pub criticality_diagnostics: Option<CriticalityDiagnostics>,
}

/// Handover Notify - sent by target RAN node to AMF
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandoverNotify {
    pub amf_ue_ngap_id: Option<AmfUeNgapId>,
    pub ran_ue_ngap_id: Option<RanUeNgapId>,
    pub user_location_information: Option<UserLocationInformation>,
}

/// Handover Cancel - sent by source RAN node to AMF
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandoverCancel {
    pub amf_ue_ngap_id: Option<AmfUeNgapId>,
    pub ran_ue_ngap_id: Option<RanUeNgapId>,
    pub cause: Option<Cause>,
}

/// Handover Cancel Acknowledge - sent by AMF to source RAN node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoverCancelAcknowledge {
    pub amf_ue_ngap_id: AmfUeNgapId,
    pub ran_ue_ngap_id: RanUeNgapId,
}

/// Path Switch Request - sent by new RAN node to AMF
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathSwitchRequest {
    /// RAN UE NGAP ID allocated by the new RAN node (reject)
    pub ran_ue_ngap_id: Option<RanUeNgapId>,
    /// Source AMF UE NGAP ID (reject)
    pub source_amf_ue_ngap_id: Option<AmfUeNgapId>,
    pub user_location_information: Option<UserLocationInformation>,
    pub ue_security_capabilities: Option<UeSecurityCapabilities>,
    pub pdu_session_resource_to_be_switched_dl_list: Option<Vec<PduSessionResourceItem>>,
    pub pdu_session_resource_failed_to_setup_list: Option<Vec<PduSessionResourceItem>>,
}

/// Path Switch Request Acknowledge - sent by AMF to new RAN node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSwitchRequestAcknowledge {
    pub amf_ue_ngap_id: AmfUeNgapId,
    pub ran_ue_ngap_id: RanUeNgapId,
    pub ue_security_capabilities: Option<UeSecurityCapabilities>,
    pub security_context: SecurityContext,
    pub pdu_session_resource_switched_list: Vec<PduSessionResourceItem>,
    pub pdu_session_resource_released_list: Vec<PduSessionResourceItem>,
    pub allowed_nssai: Vec<SNssai>,
}

/// Path Switch Request Failure - sent by AMF to new RAN node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSwitchRequestFailure {
    pub amf_ue_ngap_id: AmfUeNgapId,
    pub ran_ue_ngap_id: RanUeNgapId,
    pub pdu_session_resource_released_list: Vec<PduSessionResourceItem>,
    pub criticality_diagnostics: Option<CriticalityDiagnostics>,
}
