//! AMF Context Management
//!
//! In-memory registry of RAN nodes, RAN UE legs, AMF UE contexts and
//! in-flight handover attempts. One `AmfContext` is built at startup and
//! shared as `Arc<AmfContext>` with the dispatcher and the handlers.
//!
//! Lock order (never acquire against it):
//! `ran_list` -> `RanNode::ue_table` -> `ran_ue_list` -> `amf_ue_list`
//! -> `guti_ue_hash`/`supi_hash` -> `handover_list`.
//! Guards are `std::sync` guards and are never held across an `.await`.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use amf_ngap::{
    AmfUeNgapId, Cause, GlobalRanNodeId, Guami, HandoverType, PagingDrx, PduSessionId,
    PlmnId, PlmnSupportItem, RanUeNgapId, RrcEstablishmentCause, RrcState, SNssai,
    SecurityContext, SupportedTaItem, Tai, UeAmbr, UeNgapIds, UeSecurityCapabilities,
    UserLocationInformation, MAX_AMF_UE_NGAP_ID,
};
use thiserror::Error;

use crate::ngap_send::RanSender;
use crate::ngap_sm::{NgapEvent, NgapFsm, NgapState};

// ============================================================================
// Constants
// ============================================================================

/// Default maximum number of RAN nodes
pub const MAX_NUM_OF_RAN: usize = 64;
/// Default maximum number of RAN UE legs across all RAN nodes
pub const MAX_NUM_OF_RAN_UE: usize = 65536;

/// RAN node pool id
pub type RanNodeId = u64;
/// Transport association handle
pub type AssociationId = u64;
/// AMF UE context pool id
pub type AmfUeId = u64;
/// Handover attempt pool id
pub type HandoverId = u64;

// ============================================================================
// Errors
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("RAN node limit reached ({0})")]
    RanNodeLimit(usize),

    #[error("RAN UE NGAP ID {0} already in use on this RAN node")]
    DuplicateRanUeNgapId(RanUeNgapId),

    #[error("AMF UE NGAP ID space exhausted")]
    AmfUeNgapIdExhausted,

    #[error("RAN UE context not found (AMF_UE_NGAP_ID={0})")]
    RanUeNotFound(AmfUeNgapId),

    #[error("AMF UE context not found (id={0})")]
    AmfUeNotFound(AmfUeId),

    #[error("UE context {0} already takes part in a handover")]
    HandoverInProgress(AmfUeNgapId),
}

// ============================================================================
// Basic Types
// ============================================================================

/// AMF ID (Region + Set + Pointer)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct AmfId {
    /// AMF Region ID (8 bits)
    pub region: u8,
    /// AMF Set ID (10 bits)
    pub set: u16,
    /// AMF Pointer (6 bits)
    pub pointer: u8,
}

/// 5G-GUTI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guti5gs {
    pub plmn_id: PlmnId,
    pub amf_id: AmfId,
    /// 5G-TMSI
    pub tmsi: u32,
}

impl fmt::Display for Guti5gs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{:02x}{:03x}{:02x}-{:08x}",
            self.plmn_id, self.amf_id.region, self.amf_id.set, self.amf_id.pointer, self.tmsi
        )
    }
}

/// 5GS TAI (Tracking Area Identity)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Tai5gs {
    pub plmn_id: PlmnId,
    /// TAC (24 bits)
    pub tac: u32,
}

impl Tai5gs {
    pub fn new(plmn_id: PlmnId, tac: u32) -> Self {
        Self { plmn_id, tac }
    }
}

impl From<&Tai> for Tai5gs {
    fn from(tai: &Tai) -> Self {
        Self {
            plmn_id: tai.plmn_id,
            tac: amf_ngap::tac_to_u32(&tai.tac),
        }
    }
}

impl fmt::Display for Tai5gs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:06x}", self.plmn_id, self.tac)
    }
}

/// One tracking area advertised by a RAN node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedTai {
    pub tai: Tai5gs,
    pub s_nssai: Vec<SNssai>,
}

/// Flatten a Supported TA List into one entry per (TAC, broadcast PLMN)
pub fn supported_tai_list(items: &[SupportedTaItem]) -> Vec<SupportedTai> {
    items
        .iter()
        .flat_map(|item| {
            let tac = amf_ngap::tac_to_u32(&item.tac);
            item.broadcast_plmn_list.iter().map(move |bplmn| SupportedTai {
                tai: Tai5gs::new(bplmn.plmn_id, tac),
                s_nssai: bplmn.tai_slice_support_list.clone(),
            })
        })
        .collect()
}

/// Operator configuration served by this AMF
#[derive(Debug, Clone)]
pub struct OperatorInfo {
    pub amf_name: String,
    pub relative_capacity: u8,
    pub guami: Guami,
    /// Tracking areas this AMF serves
    pub tai_list: Vec<Tai5gs>,
    pub plmn_support: Vec<PlmnSupportItem>,
}

impl Default for OperatorInfo {
    fn default() -> Self {
        let plmn_id = PlmnId::new("001", "01");
        Self {
            amf_name: "amf".to_string(),
            relative_capacity: 255,
            guami: Guami {
                plmn_id,
                amf_region_id: 2,
                amf_set_id: 1,
                amf_pointer: 0,
            },
            tai_list: vec![Tai5gs::new(plmn_id, 1)],
            plmn_support: vec![PlmnSupportItem {
                plmn_id,
                slice_support_list: vec![SNssai { sst: 1, sd: None }],
            }],
        }
    }
}

impl OperatorInfo {
    pub fn serves_tai(&self, tai: &Tai5gs) -> bool {
        self.tai_list.contains(tai)
    }

    /// True when any advertised tracking area is served by this AMF
    pub fn serves_any(&self, supported: &[SupportedTai]) -> bool {
        supported.iter().any(|s| self.serves_tai(&s.tai))
    }

    pub fn allowed_nssai(&self) -> Vec<SNssai> {
        let mut nssai: Vec<SNssai> = Vec::new();
        for s in self.plmn_support.iter().flat_map(|p| p.slice_support_list.iter()) {
            if !nssai.contains(s) {
                nssai.push(*s);
            }
        }
        nssai
    }

    /// GUTI that a 5G-S-TMSI maps to when allocated by this AMF region
    pub fn guti_from_s_tmsi(&self, amf_set_id: u16, amf_pointer: u8, tmsi: u32) -> Guti5gs {
        Guti5gs {
            plmn_id: self.guami.plmn_id,
            amf_id: AmfId {
                region: self.guami.amf_region_id,
                set: amf_set_id,
                pointer: amf_pointer,
            },
            tmsi,
        }
    }
}

// ============================================================================
// RAN Node
// ============================================================================

/// Mutable attributes of a RAN node
#[derive(Debug, Clone, Default)]
pub struct RanNodeInfo {
    /// Global RAN Node ID, learned from NG Setup
    pub ran_id: Option<GlobalRanNodeId>,
    pub name: Option<String>,
    pub supported_ta_list: Vec<SupportedTai>,
    pub paging_drx: Option<PagingDrx>,
    pub fsm: NgapFsm,
}

/// One RAN node association
pub struct RanNode {
    pub id: RanNodeId,
    pub assoc: AssociationId,
    sender: Arc<dyn RanSender>,
    info: RwLock<RanNodeInfo>,
    /// RAN UE NGAP ID -> AMF UE NGAP ID
    ue_table: RwLock<HashMap<RanUeNgapId, AmfUeNgapId>>,
}

impl fmt::Debug for RanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RanNode")
            .field("id", &self.id)
            .field("assoc", &self.assoc)
            .field("info", &self.info())
            .finish()
    }
}

impl RanNode {
    fn new(id: RanNodeId, assoc: AssociationId, sender: Arc<dyn RanSender>) -> Self {
        Self {
            id,
            assoc,
            sender,
            info: RwLock::new(RanNodeInfo::default()),
            ue_table: RwLock::new(HashMap::new()),
        }
    }

    /// Outbound path towards this node
    pub fn sender(&self) -> &Arc<dyn RanSender> {
        &self.sender
    }

    pub fn info(&self) -> RanNodeInfo {
        match self.info.read() {
            Ok(info) => info.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Mutate the node attributes under the per-node lock
    pub fn update_info<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut RanNodeInfo) -> R,
    {
        let mut info = self.info.write().ok()?;
        Some(f(&mut info))
    }

    pub fn ran_id(&self) -> Option<GlobalRanNodeId> {
        self.info.read().ok()?.ran_id
    }

    pub fn state(&self) -> NgapState {
        self.info
            .read()
            .map(|info| info.fsm.state())
            .unwrap_or(NgapState::Final)
    }

    pub fn is_operational(&self) -> bool {
        self.state() == NgapState::Operational
    }

    pub fn dispatch(&self, event: NgapEvent) {
        self.update_info(|info| info.fsm.dispatch(event));
    }

    /// Replace the advertised tracking areas wholesale
    pub fn set_supported_ta_list(&self, list: Vec<SupportedTai>) {
        self.update_info(|info| info.supported_ta_list = list);
    }

    /// AMF UE NGAP ID of the leg with this RAN UE NGAP ID
    pub fn find_ue(&self, ran_ue_ngap_id: RanUeNgapId) -> Option<AmfUeNgapId> {
        self.ue_table.read().ok()?.get(&ran_ue_ngap_id).copied()
    }

    pub fn ue_count(&self) -> usize {
        self.ue_table.read().map(|t| t.len()).unwrap_or(0)
    }
}

// ============================================================================
// RAN UE
// ============================================================================

/// What to do once the RAN confirms a UE Context Release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UeContextReleaseAction {
    /// Drop the RAN leg only
    #[default]
    NormalRelease,
    /// Drop the RAN leg; drop the AMF UE too when it has no security context
    ReleaseUeContext,
    /// Drop the RAN leg and the AMF UE
    NetworkDeregistration,
    /// Source leg released after a completed handover
    HandoverComplete,
    /// Target leg released after Handover Cancel
    HandoverCancel,
    /// Target leg released after a failed resource allocation
    HandoverFailure,
}

/// Side of a handover a RAN UE leg plays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoverRole {
    Source,
    Target,
}

/// Back-reference from a RAN UE leg to its handover attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandoverLink {
    pub attempt: HandoverId,
    pub role: HandoverRole,
}

/// One UE's association with one RAN node
#[derive(Debug, Clone)]
pub struct RanUe {
    /// AMF UE NGAP ID (allocated by the AMF, unique across RAN nodes)
    pub amf_ue_ngap_id: AmfUeNgapId,
    /// RAN UE NGAP ID (allocated by the RAN; unknown for a handover target
    /// until Handover Request Acknowledge)
    pub ran_ue_ngap_id: Option<RanUeNgapId>,
    pub ran_node_id: RanNodeId,
    /// Weak link to the AMF UE context
    pub amf_ue_id: Option<AmfUeId>,
    pub handover: Option<HandoverLink>,
    pub release_action: UeContextReleaseAction,
    pub location: Option<UserLocationInformation>,
    pub rrc_establishment_cause: Option<RrcEstablishmentCause>,
    pub rrc_state: Option<RrcState>,
    pub ue_context_requested: bool,
    pub initial_context_setup_done: bool,
}

impl RanUe {
    fn new(
        amf_ue_ngap_id: AmfUeNgapId,
        ran_ue_ngap_id: Option<RanUeNgapId>,
        ran_node_id: RanNodeId,
    ) -> Self {
        Self {
            amf_ue_ngap_id,
            ran_ue_ngap_id,
            ran_node_id,
            amf_ue_id: None,
            handover: None,
            release_action: UeContextReleaseAction::default(),
            location: None,
            rrc_establishment_cause: None,
            rrc_state: None,
            ue_context_requested: false,
            initial_context_setup_done: false,
        }
    }

    /// UE NGAP IDs as carried by UE Context Release Command
    pub fn ue_ngap_ids(&self) -> UeNgapIds {
        match self.ran_ue_ngap_id {
            Some(ran_ue_ngap_id) => UeNgapIds::Pair {
                amf_ue_ngap_id: self.amf_ue_ngap_id,
                ran_ue_ngap_id,
            },
            None => UeNgapIds::AmfOnly {
                amf_ue_ngap_id: self.amf_ue_ngap_id,
            },
        }
    }
}

impl fmt::Display for RanUe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ran_ue_ngap_id {
            Some(id) => write!(f, "{}:{}", self.amf_ue_ngap_id, id),
            None => write!(f, "{}:-", self.amf_ue_ngap_id),
        }
    }
}

// ============================================================================
// AMF UE
// ============================================================================

/// Registration state of an AMF UE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GmmState {
    #[default]
    Deregistered,
    Registered,
}

/// NAS security state relevant to NGAP
#[derive(Debug, Clone, Copy, Default)]
pub struct UeSecurityContext {
    /// A NAS security context has been established
    pub available: bool,
    /// Integrity check of the last NAS message failed
    pub mac_failed: bool,
    /// Next Hop Chaining Count (0..7)
    pub ncc: u8,
    /// Next Hop key, maintained by the NAS layer
    pub nh: [u8; 32],
    pub ue_security_capabilities: UeSecurityCapabilities,
}

impl UeSecurityContext {
    pub fn is_valid(&self) -> bool {
        self.available && !self.mac_failed
    }

    /// Step NCC for a new key chain hop
    pub fn advance_ncc(&mut self) {
        self.ncc = (self.ncc + 1) % 8;
    }

    pub fn to_ngap(&self) -> SecurityContext {
        SecurityContext {
            next_hop_chaining_count: self.ncc,
            next_hop: self.nh,
        }
    }
}

/// SMF session reference for one PDU session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmContext {
    pub pdu_session_id: PduSessionId,
    /// Opaque SM context reference returned by the SMF
    pub sm_ref: String,
    pub s_nssai: SNssai,
    /// User plane currently established
    pub active: bool,
}

/// RAN-independent UE context
#[derive(Debug, Clone)]
pub struct AmfUe {
    pub id: AmfUeId,
    pub supi: Option<String>,
    pub guti: Option<Guti5gs>,
    /// AMF UE NGAP ID of the attached RAN leg
    pub ran_ue: Option<AmfUeNgapId>,
    pub state: GmmState,
    pub security: UeSecurityContext,
    pub ue_ambr: Option<UeAmbr>,
    pub ue_radio_capability: Option<Vec<u8>>,
    pub location: Option<UserLocationInformation>,
    /// Shared across snapshots; guarded by its own lock
    sm_contexts: Arc<RwLock<HashMap<PduSessionId, SmContext>>>,
}

impl AmfUe {
    fn new(id: AmfUeId, supi: Option<String>) -> Self {
        Self {
            id,
            supi,
            guti: None,
            ran_ue: None,
            state: GmmState::default(),
            security: UeSecurityContext::default(),
            ue_ambr: None,
            ue_radio_capability: None,
            location: None,
            sm_contexts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn is_registered(&self) -> bool {
        self.state == GmmState::Registered
    }

    pub fn sm_context_add(&self, sm: SmContext) {
        if let Ok(mut map) = self.sm_contexts.write() {
            map.insert(sm.pdu_session_id, sm);
        }
    }

    pub fn sm_context_find(&self, pdu_session_id: PduSessionId) -> Option<SmContext> {
        self.sm_contexts.read().ok()?.get(&pdu_session_id).cloned()
    }

    pub fn sm_context_remove(&self, pdu_session_id: PduSessionId) -> Option<SmContext> {
        self.sm_contexts.write().ok()?.remove(&pdu_session_id)
    }

    pub fn sm_context_set_active(&self, pdu_session_id: PduSessionId, active: bool) {
        if let Ok(mut map) = self.sm_contexts.write() {
            if let Some(sm) = map.get_mut(&pdu_session_id) {
                sm.active = active;
            }
        }
    }

    /// All sessions, ordered by PDU session ID
    pub fn sm_contexts(&self) -> Vec<SmContext> {
        let mut list: Vec<SmContext> = match self.sm_contexts.read() {
            Ok(map) => map.values().cloned().collect(),
            Err(_) => Vec::new(),
        };
        list.sort_by_key(|sm| sm.pdu_session_id);
        list
    }
}

// ============================================================================
// Handover Attempt
// ============================================================================

/// One N2 handover in flight, linking a source and a target RAN UE leg
#[derive(Debug, Clone)]
pub struct HandoverAttempt {
    pub id: HandoverId,
    /// Source leg AMF UE NGAP ID
    pub source: AmfUeNgapId,
    /// Target leg AMF UE NGAP ID
    pub target: AmfUeNgapId,
    pub amf_ue_id: AmfUeId,
    pub handover_type: HandoverType,
    pub cause: Option<Cause>,
    /// Sessions admitted by the target
    pub success_pdu_session_ids: Vec<PduSessionId>,
    /// Sessions the target failed to set up
    pub failed_pdu_session_ids: Vec<PduSessionId>,
}

// ============================================================================
// AMF Context
// ============================================================================

/// AMF context registry
pub struct AmfContext {
    operator: RwLock<OperatorInfo>,

    ran_list: RwLock<HashMap<RanNodeId, Arc<RanNode>>>,
    ran_assoc_hash: RwLock<HashMap<AssociationId, RanNodeId>>,
    /// Associations whose transport reported an error
    error_assocs: RwLock<HashSet<AssociationId>>,

    /// Global AMF UE NGAP ID index
    ran_ue_list: RwLock<HashMap<AmfUeNgapId, RanUe>>,
    amf_ue_list: RwLock<HashMap<AmfUeId, AmfUe>>,
    guti_ue_hash: RwLock<HashMap<Guti5gs, AmfUeId>>,
    supi_hash: RwLock<HashMap<String, AmfUeId>>,
    handover_list: RwLock<HashMap<HandoverId, HandoverAttempt>>,

    next_ran_id: AtomicU64,
    next_amf_ue_id: AtomicU64,
    next_handover_id: AtomicU64,
    /// Last allocated AMF UE NGAP ID; advanced under `ran_ue_list`
    amf_ue_ngap_id_cursor: AtomicU64,

    max_num_of_ran: usize,
    max_num_of_ran_ue: usize,
}

impl AmfContext {
    pub fn new(operator: OperatorInfo) -> Self {
        Self::with_limits(operator, MAX_NUM_OF_RAN, MAX_NUM_OF_RAN_UE)
    }

    pub fn with_limits(operator: OperatorInfo, max_num_of_ran: usize, max_num_of_ran_ue: usize) -> Self {
        Self {
            operator: RwLock::new(operator),
            ran_list: RwLock::new(HashMap::new()),
            ran_assoc_hash: RwLock::new(HashMap::new()),
            error_assocs: RwLock::new(HashSet::new()),
            ran_ue_list: RwLock::new(HashMap::new()),
            amf_ue_list: RwLock::new(HashMap::new()),
            guti_ue_hash: RwLock::new(HashMap::new()),
            supi_hash: RwLock::new(HashMap::new()),
            handover_list: RwLock::new(HashMap::new()),
            next_ran_id: AtomicU64::new(1),
            next_amf_ue_id: AtomicU64::new(1),
            next_handover_id: AtomicU64::new(1),
            amf_ue_ngap_id_cursor: AtomicU64::new(0),
            max_num_of_ran,
            max_num_of_ran_ue: max_num_of_ran_ue.min(MAX_AMF_UE_NGAP_ID as usize),
        }
    }

    pub fn operator_info(&self) -> OperatorInfo {
        match self.operator.read() {
            Ok(op) => op.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn set_operator_info(&self, operator: OperatorInfo) {
        if let Ok(mut op) = self.operator.write() {
            *op = operator;
        }
    }

    // ------------------------------------------------------------------------
    // RAN node
    // ------------------------------------------------------------------------

    /// Find the RAN node for an association, creating it on first contact
    pub fn ran_find_or_add<F>(&self, assoc: AssociationId, make_sender: F) -> Result<Arc<RanNode>, ContextError>
    where
        F: FnOnce() -> Arc<dyn RanSender>,
    {
        if let Some(ran) = self.ran_find_by_assoc(assoc) {
            return Ok(ran);
        }

        let mut ran_list = self
            .ran_list
            .write()
            .map_err(|_| ContextError::RanNodeLimit(self.max_num_of_ran))?;
        let mut assoc_hash = self
            .ran_assoc_hash
            .write()
            .map_err(|_| ContextError::RanNodeLimit(self.max_num_of_ran))?;

        // Lost a race with another caller for the same association
        if let Some(ran) = assoc_hash.get(&assoc).and_then(|id| ran_list.get(id)) {
            return Ok(ran.clone());
        }

        if ran_list.len() >= self.max_num_of_ran {
            log::error!("Maximum number of RAN nodes reached: {}", self.max_num_of_ran);
            return Err(ContextError::RanNodeLimit(self.max_num_of_ran));
        }

        let id = self.next_ran_id.fetch_add(1, Ordering::SeqCst);
        let ran = Arc::new(RanNode::new(id, assoc, make_sender()));
        ran_list.insert(id, ran.clone());
        assoc_hash.insert(assoc, id);

        log::info!("[RAN:{}] added (assoc={}, total={})", id, assoc, ran_list.len());
        Ok(ran)
    }

    pub fn ran_find(&self, id: RanNodeId) -> Option<Arc<RanNode>> {
        self.ran_list.read().ok()?.get(&id).cloned()
    }

    pub fn ran_find_by_assoc(&self, assoc: AssociationId) -> Option<Arc<RanNode>> {
        let id = *self.ran_assoc_hash.read().ok()?.get(&assoc)?;
        self.ran_find(id)
    }

    pub fn ran_find_by_ran_id(&self, ran_id: &GlobalRanNodeId) -> Option<Arc<RanNode>> {
        let ran_list = self.ran_list.read().ok()?;
        ran_list
            .values()
            .find(|ran| ran.ran_id().as_ref() == Some(ran_id))
            .cloned()
    }

    pub fn ran_count(&self) -> usize {
        self.ran_list.read().map(|l| l.len()).unwrap_or(0)
    }

    /// Remove a RAN node together with every UE leg it owns
    pub fn ran_remove(&self, id: RanNodeId) -> Option<Arc<RanNode>> {
        let ran = {
            let mut ran_list = self.ran_list.write().ok()?;
            let ran = ran_list.remove(&id)?;
            if let Ok(mut assoc_hash) = self.ran_assoc_hash.write() {
                assoc_hash.remove(&ran.assoc);
            }
            ran
        };

        let removed = self.ran_remove_all_ue(&ran);
        ran.dispatch(NgapEvent::Removed);
        if let Ok(mut errors) = self.error_assocs.write() {
            errors.remove(&ran.assoc);
        }

        log::info!("[RAN:{}] removed ({} UE contexts released)", id, removed);
        Some(ran)
    }

    /// Remove every UE leg owned by a RAN node, returning how many went
    pub fn ran_remove_all_ue(&self, ran: &RanNode) -> usize {
        let ids: Vec<AmfUeNgapId> = match self.ran_ue_list.read() {
            Ok(list) => list
                .values()
                .filter(|ue| ue.ran_node_id == ran.id)
                .map(|ue| ue.amf_ue_ngap_id)
                .collect(),
            Err(_) => return 0,
        };

        ids.into_iter()
            .filter(|id| self.ran_ue_remove(*id).is_some())
            .count()
    }

    /// Record that the transport reported an error on an association
    pub fn mark_association_error(&self, assoc: AssociationId) {
        if let Ok(mut errors) = self.error_assocs.write() {
            errors.insert(assoc);
        }
    }

    /// Take the associations recorded in error state
    pub fn take_error_associations(&self) -> Vec<AssociationId> {
        match self.error_assocs.write() {
            Ok(mut errors) => errors.drain().collect(),
            Err(_) => Vec::new(),
        }
    }

    // ------------------------------------------------------------------------
    // RAN UE
    // ------------------------------------------------------------------------

    fn allocate_amf_ue_ngap_id(
        &self,
        list: &HashMap<AmfUeNgapId, RanUe>,
    ) -> Result<AmfUeNgapId, ContextError> {
        if list.len() >= self.max_num_of_ran_ue {
            return Err(ContextError::AmfUeNgapIdExhausted);
        }

        let mut id = self.amf_ue_ngap_id_cursor.load(Ordering::SeqCst);
        loop {
            id = if id >= MAX_AMF_UE_NGAP_ID { 1 } else { id + 1 };
            if !list.contains_key(&id) {
                break;
            }
        }
        self.amf_ue_ngap_id_cursor.store(id, Ordering::SeqCst);
        Ok(id)
    }

    /// Create a RAN UE leg for a RAN UE NGAP ID on a RAN node
    pub fn ran_ue_add(&self, ran: &RanNode, ran_ue_ngap_id: RanUeNgapId) -> Result<RanUe, ContextError> {
        let mut ue_table = ran
            .ue_table
            .write()
            .map_err(|_| ContextError::AmfUeNgapIdExhausted)?;
        if ue_table.contains_key(&ran_ue_ngap_id) {
            return Err(ContextError::DuplicateRanUeNgapId(ran_ue_ngap_id));
        }

        let mut list = self
            .ran_ue_list
            .write()
            .map_err(|_| ContextError::AmfUeNgapIdExhausted)?;
        let amf_ue_ngap_id = self.allocate_amf_ue_ngap_id(&list)?;

        let ran_ue = RanUe::new(amf_ue_ngap_id, Some(ran_ue_ngap_id), ran.id);
        list.insert(amf_ue_ngap_id, ran_ue.clone());
        ue_table.insert(ran_ue_ngap_id, amf_ue_ngap_id);

        log::debug!(
            "[RAN:{}] UE added [{}] (total={})",
            ran.id,
            ran_ue,
            list.len()
        );
        Ok(ran_ue)
    }

    /// Create a RAN UE leg whose RAN UE NGAP ID is not yet known
    pub fn ran_ue_add_pending(&self, ran: &RanNode) -> Result<RanUe, ContextError> {
        let mut list = self
            .ran_ue_list
            .write()
            .map_err(|_| ContextError::AmfUeNgapIdExhausted)?;
        let amf_ue_ngap_id = self.allocate_amf_ue_ngap_id(&list)?;

        let ran_ue = RanUe::new(amf_ue_ngap_id, None, ran.id);
        list.insert(amf_ue_ngap_id, ran_ue.clone());

        log::debug!("[RAN:{}] pending UE added [{}]", ran.id, ran_ue);
        Ok(ran_ue)
    }

    pub fn ran_ue_find(&self, amf_ue_ngap_id: AmfUeNgapId) -> Option<RanUe> {
        self.ran_ue_list.read().ok()?.get(&amf_ue_ngap_id).cloned()
    }

    pub fn ran_ue_find_by_ran_ue_ngap_id(
        &self,
        ran: &RanNode,
        ran_ue_ngap_id: RanUeNgapId,
    ) -> Option<RanUe> {
        let amf_ue_ngap_id = ran.find_ue(ran_ue_ngap_id)?;
        self.ran_ue_find(amf_ue_ngap_id)
    }

    pub fn ran_ue_count(&self) -> usize {
        self.ran_ue_list.read().map(|l| l.len()).unwrap_or(0)
    }

    /// Mutate a RAN UE leg in place, returning the updated snapshot
    pub fn ran_ue_modify<F>(&self, amf_ue_ngap_id: AmfUeNgapId, f: F) -> Option<RanUe>
    where
        F: FnOnce(&mut RanUe),
    {
        let mut list = self.ran_ue_list.write().ok()?;
        let ran_ue = list.get_mut(&amf_ue_ngap_id)?;
        f(ran_ue);
        Some(ran_ue.clone())
    }

    /// Bind a leg to `ran_ue_ngap_id` on `ran`: a pending leg learns its RAN
    /// UE NGAP ID, a bound leg is rebound. When the leg moves off another
    /// RAN node, its entry there is dropped.
    pub fn ran_ue_set_ran_ue_ngap_id(
        &self,
        ran: &RanNode,
        amf_ue_ngap_id: AmfUeNgapId,
        ran_ue_ngap_id: RanUeNgapId,
    ) -> Result<RanUe, ContextError> {
        let (ran_ue, moved_from) = {
            let mut ue_table = ran
                .ue_table
                .write()
                .map_err(|_| ContextError::RanUeNotFound(amf_ue_ngap_id))?;
            if let Some(existing) = ue_table.get(&ran_ue_ngap_id) {
                if *existing != amf_ue_ngap_id {
                    return Err(ContextError::DuplicateRanUeNgapId(ran_ue_ngap_id));
                }
            }

            let mut list = self
                .ran_ue_list
                .write()
                .map_err(|_| ContextError::RanUeNotFound(amf_ue_ngap_id))?;
            let ran_ue = list
                .get_mut(&amf_ue_ngap_id)
                .ok_or(ContextError::RanUeNotFound(amf_ue_ngap_id))?;

            let mut moved_from = None;
            if let Some(old) = ran_ue.ran_ue_ngap_id {
                if ran_ue.ran_node_id != ran.id {
                    moved_from = Some((ran_ue.ran_node_id, old));
                } else if old != ran_ue_ngap_id {
                    ue_table.remove(&old);
                }
            }
            ran_ue.ran_ue_ngap_id = Some(ran_ue_ngap_id);
            ran_ue.ran_node_id = ran.id;
            ue_table.insert(ran_ue_ngap_id, amf_ue_ngap_id);

            (ran_ue.clone(), moved_from)
        };

        if let Some((old_ran_id, old_id)) = moved_from {
            if let Some(old_ran) = self.ran_find(old_ran_id) {
                if let Ok(mut ue_table) = old_ran.ue_table.write() {
                    if ue_table.get(&old_id) == Some(&amf_ue_ngap_id) {
                        ue_table.remove(&old_id);
                    }
                }
            }
        }

        Ok(ran_ue)
    }

    /// Move a RAN UE leg to another RAN node (Xn handover)
    pub fn ran_ue_switch_to_ran(
        &self,
        amf_ue_ngap_id: AmfUeNgapId,
        new_ran: &RanNode,
        new_ran_ue_ngap_id: RanUeNgapId,
    ) -> Result<RanUe, ContextError> {
        let old = self
            .ran_ue_find(amf_ue_ngap_id)
            .ok_or(ContextError::RanUeNotFound(amf_ue_ngap_id))?;

        let ran_ue = self.ran_ue_set_ran_ue_ngap_id(new_ran, amf_ue_ngap_id, new_ran_ue_ngap_id)?;
        log::debug!(
            "[{}] switched RAN node {} -> {}",
            ran_ue,
            old.ran_node_id,
            new_ran.id
        );
        Ok(ran_ue)
    }

    /// Remove a RAN UE leg.
    ///
    /// Detaches it from its RAN node table, from the AMF UE (when it is the
    /// attached leg) and tears down any handover it takes part in. Returns
    /// `None` when the leg was already gone.
    pub fn ran_ue_remove(&self, amf_ue_ngap_id: AmfUeNgapId) -> Option<RanUe> {
        let snapshot = self.ran_ue_find(amf_ue_ngap_id)?;

        if let (Some(ran), Some(ran_ue_ngap_id)) =
            (self.ran_find(snapshot.ran_node_id), snapshot.ran_ue_ngap_id)
        {
            if let Ok(mut ue_table) = ran.ue_table.write() {
                if ue_table.get(&ran_ue_ngap_id) == Some(&amf_ue_ngap_id) {
                    ue_table.remove(&ran_ue_ngap_id);
                }
            }
        }

        let removed = {
            let mut list = self.ran_ue_list.write().ok()?;
            let removed = list.remove(&amf_ue_ngap_id)?;

            if let Some(amf_ue_id) = removed.amf_ue_id {
                if let Ok(mut amf_ues) = self.amf_ue_list.write() {
                    if let Some(amf_ue) = amf_ues.get_mut(&amf_ue_id) {
                        if amf_ue.ran_ue == Some(amf_ue_ngap_id) {
                            amf_ue.ran_ue = None;
                        }
                    }
                }
            }
            removed
        };

        if let Some(link) = removed.handover {
            self.handover_detach(link.attempt);
        }

        log::debug!("[{}] RAN UE removed", removed);
        Some(removed)
    }

    // ------------------------------------------------------------------------
    // AMF UE
    // ------------------------------------------------------------------------

    pub fn amf_ue_add(&self, supi: Option<&str>) -> Option<AmfUe> {
        let id = self.next_amf_ue_id.fetch_add(1, Ordering::SeqCst);
        let amf_ue = AmfUe::new(id, supi.map(str::to_string));

        {
            let mut list = self.amf_ue_list.write().ok()?;
            list.insert(id, amf_ue.clone());
        }
        if let Some(supi) = supi {
            if let Ok(mut hash) = self.supi_hash.write() {
                hash.insert(supi.to_string(), id);
            }
        }

        log::debug!("[{}] AMF UE added (supi={:?})", id, supi);
        Some(amf_ue)
    }

    pub fn amf_ue_find(&self, id: AmfUeId) -> Option<AmfUe> {
        self.amf_ue_list.read().ok()?.get(&id).cloned()
    }

    pub fn amf_ue_find_by_guti(&self, guti: &Guti5gs) -> Option<AmfUe> {
        let id = *self.guti_ue_hash.read().ok()?.get(guti)?;
        self.amf_ue_find(id)
    }

    pub fn amf_ue_find_by_supi(&self, supi: &str) -> Option<AmfUe> {
        let id = *self.supi_hash.read().ok()?.get(supi)?;
        self.amf_ue_find(id)
    }

    /// AMF UE context a RAN UE leg is linked to
    pub fn amf_ue_of(&self, ran_ue: &RanUe) -> Option<AmfUe> {
        self.amf_ue_find(ran_ue.amf_ue_id?)
    }

    pub fn amf_ue_count(&self) -> usize {
        self.amf_ue_list.read().map(|l| l.len()).unwrap_or(0)
    }

    /// Mutate an AMF UE in place, returning the updated snapshot
    pub fn amf_ue_modify<F>(&self, id: AmfUeId, f: F) -> Option<AmfUe>
    where
        F: FnOnce(&mut AmfUe),
    {
        let mut list = self.amf_ue_list.write().ok()?;
        let amf_ue = list.get_mut(&id)?;
        f(amf_ue);
        Some(amf_ue.clone())
    }

    /// Assign a new 5G-GUTI, replacing the previous index entry
    pub fn amf_ue_set_guti(&self, id: AmfUeId, guti: Guti5gs) -> bool {
        let Ok(mut list) = self.amf_ue_list.write() else {
            return false;
        };
        let Some(amf_ue) = list.get_mut(&id) else {
            return false;
        };
        let old = amf_ue.guti.replace(guti);

        if let Ok(mut hash) = self.guti_ue_hash.write() {
            if let Some(old) = old {
                hash.remove(&old);
            }
            hash.insert(guti, id);
        }
        true
    }

    /// Remove an AMF UE context and unlink its RAN leg
    pub fn amf_ue_remove(&self, id: AmfUeId) -> Option<AmfUe> {
        let removed = {
            let mut ran_ues = self.ran_ue_list.write().ok()?;
            let mut list = self.amf_ue_list.write().ok()?;
            let removed = list.remove(&id)?;

            for ran_ue in ran_ues.values_mut() {
                if ran_ue.amf_ue_id == Some(id) {
                    ran_ue.amf_ue_id = None;
                }
            }
            removed
        };

        if let Some(guti) = removed.guti {
            if let Ok(mut hash) = self.guti_ue_hash.write() {
                hash.remove(&guti);
            }
        }
        if let Some(supi) = removed.supi.as_deref() {
            if let Ok(mut hash) = self.supi_hash.write() {
                hash.remove(supi);
            }
        }

        log::debug!("[{}] AMF UE removed", id);
        Some(removed)
    }

    /// Make `amf_ue_ngap_id` the attached RAN leg of an AMF UE.
    ///
    /// A previously attached leg is detached first. This is both the normal
    /// attach and the implicit deregistration of a stale leg.
    pub fn amf_ue_attach_ran_ue(&self, amf_ue_id: AmfUeId, amf_ue_ngap_id: AmfUeNgapId) -> Result<(), ContextError> {
        let mut ran_ues = self
            .ran_ue_list
            .write()
            .map_err(|_| ContextError::RanUeNotFound(amf_ue_ngap_id))?;
        let mut amf_ues = self
            .amf_ue_list
            .write()
            .map_err(|_| ContextError::AmfUeNotFound(amf_ue_id))?;

        if !ran_ues.contains_key(&amf_ue_ngap_id) {
            return Err(ContextError::RanUeNotFound(amf_ue_ngap_id));
        }
        let previous = amf_ues
            .get(&amf_ue_id)
            .ok_or(ContextError::AmfUeNotFound(amf_ue_id))?
            .ran_ue;

        if let Some(old) = previous.filter(|old| *old != amf_ue_ngap_id) {
            if let Some(old_leg) = ran_ues.get_mut(&old) {
                old_leg.amf_ue_id = None;
                log::debug!("[{}] detached old RAN leg [{}]", amf_ue_id, old_leg);
            }
        }

        if let Some(new_leg) = ran_ues.get_mut(&amf_ue_ngap_id) {
            // The leg may still point at another AMF UE
            if let Some(other) = new_leg.amf_ue_id.filter(|other| *other != amf_ue_id) {
                if let Some(other_ue) = amf_ues.get_mut(&other) {
                    if other_ue.ran_ue == Some(amf_ue_ngap_id) {
                        other_ue.ran_ue = None;
                    }
                }
            }
            new_leg.amf_ue_id = Some(amf_ue_id);
        }
        if let Some(amf_ue) = amf_ues.get_mut(&amf_ue_id) {
            amf_ue.ran_ue = Some(amf_ue_ngap_id);
        }

        log::debug!("[{}] attached RAN leg {}", amf_ue_id, amf_ue_ngap_id);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Handover
    // ------------------------------------------------------------------------

    /// Link a source and a target leg into one handover attempt.
    ///
    /// Fails when either leg already takes part in a handover.
    pub fn handover_attach(
        &self,
        source: AmfUeNgapId,
        target: AmfUeNgapId,
        amf_ue_id: AmfUeId,
        handover_type: HandoverType,
        cause: Option<Cause>,
    ) -> Result<HandoverAttempt, ContextError> {
        let mut ran_ues = self
            .ran_ue_list
            .write()
            .map_err(|_| ContextError::RanUeNotFound(source))?;
        let mut attempts = self
            .handover_list
            .write()
            .map_err(|_| ContextError::HandoverInProgress(source))?;

        for leg in [source, target] {
            match ran_ues.get(&leg) {
                None => return Err(ContextError::RanUeNotFound(leg)),
                Some(ue) if ue.handover.is_some() => {
                    return Err(ContextError::HandoverInProgress(leg))
                }
                Some(_) => {}
            }
        }

        let id = self.next_handover_id.fetch_add(1, Ordering::SeqCst);
        let attempt = HandoverAttempt {
            id,
            source,
            target,
            amf_ue_id,
            handover_type,
            cause,
            success_pdu_session_ids: Vec::new(),
            failed_pdu_session_ids: Vec::new(),
        };
        attempts.insert(id, attempt.clone());

        for (leg, role) in [(source, HandoverRole::Source), (target, HandoverRole::Target)] {
            if let Some(ue) = ran_ues.get_mut(&leg) {
                ue.handover = Some(HandoverLink { attempt: id, role });
            }
        }

        log::debug!("Handover {} attached (source={}, target={})", id, source, target);
        Ok(attempt)
    }

    pub fn handover_find(&self, id: HandoverId) -> Option<HandoverAttempt> {
        self.handover_list.read().ok()?.get(&id).cloned()
    }

    /// Handover attempt a RAN UE leg takes part in
    pub fn handover_of(&self, amf_ue_ngap_id: AmfUeNgapId) -> Option<HandoverAttempt> {
        let link = self.ran_ue_find(amf_ue_ngap_id)?.handover?;
        self.handover_find(link.attempt)
    }

    pub fn handover_modify<F>(&self, id: HandoverId, f: F) -> Option<HandoverAttempt>
    where
        F: FnOnce(&mut HandoverAttempt),
    {
        let mut attempts = self.handover_list.write().ok()?;
        let attempt = attempts.get_mut(&id)?;
        f(attempt);
        Some(attempt.clone())
    }

    /// Tear down a handover attempt, clearing both legs' links together
    pub fn handover_detach(&self, id: HandoverId) -> Option<HandoverAttempt> {
        let mut ran_ues = self.ran_ue_list.write().ok()?;
        let mut attempts = self.handover_list.write().ok()?;
        let attempt = attempts.remove(&id)?;

        for leg in [attempt.source, attempt.target] {
            if let Some(ue) = ran_ues.get_mut(&leg) {
                if ue.handover.map(|l| l.attempt) == Some(id) {
                    ue.handover = None;
                }
            }
        }

        log::debug!(
            "Handover {} detached (source={}, target={})",
            id,
            attempt.source,
            attempt.target
        );
        Some(attempt)
    }

    pub fn handover_count(&self) -> usize {
        self.handover_list.read().map(|l| l.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingSender;
    use amf_ngap::BroadcastPlmnItem;

    fn create_test_context() -> AmfContext {
        AmfContext::new(OperatorInfo::default())
    }

    fn add_ran(ctx: &AmfContext, assoc: AssociationId) -> Arc<RanNode> {
        ctx.ran_find_or_add(assoc, || RecordingSender::new() as Arc<dyn RanSender>)
            .unwrap()
    }

    #[test]
    fn test_ran_find_or_add_is_idempotent() {
        let ctx = create_test_context();
        let ran1 = add_ran(&ctx, 7);
        let ran2 = add_ran(&ctx, 7);
        assert_eq!(ran1.id, ran2.id);
        assert_eq!(ctx.ran_count(), 1);
        assert_eq!(ran1.state(), NgapState::Initial);
    }

    #[test]
    fn test_ran_limit() {
        let ctx = AmfContext::with_limits(OperatorInfo::default(), 1, 16);
        add_ran(&ctx, 1);
        let result = ctx.ran_find_or_add(2, || RecordingSender::new() as Arc<dyn RanSender>);
        assert_eq!(result.unwrap_err(), ContextError::RanNodeLimit(1));
    }

    #[test]
    fn test_ran_find_by_ran_id() {
        let ctx = create_test_context();
        let ran = add_ran(&ctx, 1);
        let gnb = GlobalRanNodeId::GlobalGnbId {
            plmn_id: PlmnId::new("001", "01"),
            gnb_id: 0x100,
            gnb_id_len: 22,
        };
        ran.update_info(|info| info.ran_id = Some(gnb));

        assert_eq!(ctx.ran_find_by_ran_id(&gnb).map(|r| r.id), Some(ran.id));
    }

    #[test]
    fn test_ran_ue_add_and_find() {
        let ctx = create_test_context();
        let ran = add_ran(&ctx, 1);

        let ue = ctx.ran_ue_add(&ran, 100).unwrap();
        assert_eq!(ue.ran_ue_ngap_id, Some(100));
        assert_eq!(ran.find_ue(100), Some(ue.amf_ue_ngap_id));
        assert_eq!(
            ctx.ran_ue_find_by_ran_ue_ngap_id(&ran, 100).map(|u| u.amf_ue_ngap_id),
            Some(ue.amf_ue_ngap_id)
        );
        assert!(ctx.ran_ue_find(ue.amf_ue_ngap_id).is_some());
    }

    #[test]
    fn test_ran_ue_add_duplicate() {
        let ctx = create_test_context();
        let ran = add_ran(&ctx, 1);
        ctx.ran_ue_add(&ran, 100).unwrap();
        assert_eq!(
            ctx.ran_ue_add(&ran, 100).unwrap_err(),
            ContextError::DuplicateRanUeNgapId(100)
        );

        // Same RAN UE NGAP ID on another node is fine
        let other = add_ran(&ctx, 2);
        assert!(ctx.ran_ue_add(&other, 100).is_ok());
    }

    #[test]
    fn test_amf_ue_ngap_id_unique_and_exhaustion() {
        let ctx = AmfContext::with_limits(OperatorInfo::default(), 4, 2);
        let ran = add_ran(&ctx, 1);

        let a = ctx.ran_ue_add(&ran, 1).unwrap();
        let b = ctx.ran_ue_add(&ran, 2).unwrap();
        assert_ne!(a.amf_ue_ngap_id, b.amf_ue_ngap_id);
        assert_eq!(
            ctx.ran_ue_add(&ran, 3).unwrap_err(),
            ContextError::AmfUeNgapIdExhausted
        );

        ctx.ran_ue_remove(a.amf_ue_ngap_id);
        let c = ctx.ran_ue_add(&ran, 3).unwrap();
        assert_ne!(c.amf_ue_ngap_id, b.amf_ue_ngap_id);
    }

    #[test]
    fn test_ran_ue_remove_twice() {
        let ctx = create_test_context();
        let ran = add_ran(&ctx, 1);
        let ue = ctx.ran_ue_add(&ran, 5).unwrap();

        assert!(ctx.ran_ue_remove(ue.amf_ue_ngap_id).is_some());
        assert!(ctx.ran_ue_remove(ue.amf_ue_ngap_id).is_none());
        assert_eq!(ran.find_ue(5), None);
        assert_eq!(ctx.ran_ue_count(), 0);
    }

    #[test]
    fn test_ran_ue_remove_detaches_amf_ue() {
        let ctx = create_test_context();
        let ran = add_ran(&ctx, 1);
        let ue = ctx.ran_ue_add(&ran, 5).unwrap();
        let amf_ue = ctx.amf_ue_add(Some("imsi-001010000000001")).unwrap();
        ctx.amf_ue_attach_ran_ue(amf_ue.id, ue.amf_ue_ngap_id).unwrap();

        ctx.ran_ue_remove(ue.amf_ue_ngap_id);
        assert_eq!(ctx.amf_ue_find(amf_ue.id).unwrap().ran_ue, None);
    }

    #[test]
    fn test_attach_replaces_previous_leg() {
        let ctx = create_test_context();
        let ran = add_ran(&ctx, 1);
        let old = ctx.ran_ue_add(&ran, 1).unwrap();
        let new = ctx.ran_ue_add(&ran, 2).unwrap();
        let amf_ue = ctx.amf_ue_add(None).unwrap();

        ctx.amf_ue_attach_ran_ue(amf_ue.id, old.amf_ue_ngap_id).unwrap();
        ctx.amf_ue_attach_ran_ue(amf_ue.id, new.amf_ue_ngap_id).unwrap();

        assert_eq!(ctx.amf_ue_find(amf_ue.id).unwrap().ran_ue, Some(new.amf_ue_ngap_id));
        assert_eq!(ctx.ran_ue_find(old.amf_ue_ngap_id).unwrap().amf_ue_id, None);
        assert_eq!(ctx.ran_ue_find(new.amf_ue_ngap_id).unwrap().amf_ue_id, Some(amf_ue.id));
    }

    #[test]
    fn test_attach_unknown_leg() {
        let ctx = create_test_context();
        let amf_ue = ctx.amf_ue_add(None).unwrap();
        assert_eq!(
            ctx.amf_ue_attach_ran_ue(amf_ue.id, 42).unwrap_err(),
            ContextError::RanUeNotFound(42)
        );
    }

    #[test]
    fn test_guti_index() {
        let ctx = create_test_context();
        let amf_ue = ctx.amf_ue_add(Some("imsi-001010000000002")).unwrap();
        let op = ctx.operator_info();
        let guti = op.guti_from_s_tmsi(1, 0, 0xdeadbeef);

        assert!(ctx.amf_ue_set_guti(amf_ue.id, guti));
        assert_eq!(ctx.amf_ue_find_by_guti(&guti).map(|u| u.id), Some(amf_ue.id));
        assert_eq!(
            ctx.amf_ue_find_by_supi("imsi-001010000000002").map(|u| u.id),
            Some(amf_ue.id)
        );

        let new_guti = op.guti_from_s_tmsi(1, 0, 0x1);
        ctx.amf_ue_set_guti(amf_ue.id, new_guti);
        assert!(ctx.amf_ue_find_by_guti(&guti).is_none());

        ctx.amf_ue_remove(amf_ue.id);
        assert!(ctx.amf_ue_find_by_guti(&new_guti).is_none());
        assert!(ctx.amf_ue_find_by_supi("imsi-001010000000002").is_none());
    }

    #[test]
    fn test_sm_context_shared_between_snapshots() {
        let ctx = create_test_context();
        let amf_ue = ctx.amf_ue_add(None).unwrap();
        amf_ue.sm_context_add(SmContext {
            pdu_session_id: 5,
            sm_ref: "sm-5".to_string(),
            s_nssai: SNssai { sst: 1, sd: None },
            active: true,
        });

        let snapshot = ctx.amf_ue_find(amf_ue.id).unwrap();
        assert_eq!(snapshot.sm_context_find(5).map(|sm| sm.sm_ref), Some("sm-5".to_string()));
        snapshot.sm_context_set_active(5, false);
        assert!(!amf_ue.sm_context_find(5).unwrap().active);
    }

    #[test]
    fn test_handover_attach_and_detach() {
        let ctx = create_test_context();
        let source_ran = add_ran(&ctx, 1);
        let target_ran = add_ran(&ctx, 2);
        let source = ctx.ran_ue_add(&source_ran, 1).unwrap();
        let target = ctx.ran_ue_add_pending(&target_ran).unwrap();
        let amf_ue = ctx.amf_ue_add(None).unwrap();

        let attempt = ctx
            .handover_attach(
                source.amf_ue_ngap_id,
                target.amf_ue_ngap_id,
                amf_ue.id,
                HandoverType::Intra5gs,
                None,
            )
            .unwrap();

        let s = ctx.ran_ue_find(source.amf_ue_ngap_id).unwrap();
        let t = ctx.ran_ue_find(target.amf_ue_ngap_id).unwrap();
        assert_eq!(s.handover, Some(HandoverLink { attempt: attempt.id, role: HandoverRole::Source }));
        assert_eq!(t.handover, Some(HandoverLink { attempt: attempt.id, role: HandoverRole::Target }));

        // A leg may take part in one handover at a time
        let other = ctx.ran_ue_add_pending(&target_ran).unwrap();
        assert_eq!(
            ctx.handover_attach(
                source.amf_ue_ngap_id,
                other.amf_ue_ngap_id,
                amf_ue.id,
                HandoverType::Intra5gs,
                None
            )
            .unwrap_err(),
            ContextError::HandoverInProgress(source.amf_ue_ngap_id)
        );

        assert!(ctx.handover_detach(attempt.id).is_some());
        assert!(ctx.handover_detach(attempt.id).is_none());
        assert!(ctx.ran_ue_find(source.amf_ue_ngap_id).unwrap().handover.is_none());
        assert!(ctx.ran_ue_find(target.amf_ue_ngap_id).unwrap().handover.is_none());
    }

    #[test]
    fn test_removing_leg_tears_down_handover() {
        let ctx = create_test_context();
        let ran = add_ran(&ctx, 1);
        let source = ctx.ran_ue_add(&ran, 1).unwrap();
        let target = ctx.ran_ue_add_pending(&ran).unwrap();
        let amf_ue = ctx.amf_ue_add(None).unwrap();
        ctx.handover_attach(
            source.amf_ue_ngap_id,
            target.amf_ue_ngap_id,
            amf_ue.id,
            HandoverType::Intra5gs,
            None,
        )
        .unwrap();

        ctx.ran_ue_remove(target.amf_ue_ngap_id);
        assert_eq!(ctx.handover_count(), 0);
        assert!(ctx.ran_ue_find(source.amf_ue_ngap_id).unwrap().handover.is_none());
    }

    #[test]
    fn test_set_ran_ue_ngap_id_for_pending_leg() {
        let ctx = create_test_context();
        let ran = add_ran(&ctx, 1);
        let pending = ctx.ran_ue_add_pending(&ran).unwrap();
        assert_eq!(ran.ue_count(), 0);

        let ue = ctx
            .ran_ue_set_ran_ue_ngap_id(&ran, pending.amf_ue_ngap_id, 77)
            .unwrap();
        assert_eq!(ue.ran_ue_ngap_id, Some(77));
        assert_eq!(ran.find_ue(77), Some(pending.amf_ue_ngap_id));
    }

    #[test]
    fn test_rebinding_on_another_ran_drops_old_entry() {
        let ctx = create_test_context();
        let ran1 = add_ran(&ctx, 1);
        let ran2 = add_ran(&ctx, 2);
        let ue = ctx.ran_ue_add(&ran1, 5).unwrap();

        let moved = ctx
            .ran_ue_set_ran_ue_ngap_id(&ran2, ue.amf_ue_ngap_id, 99)
            .unwrap();
        assert_eq!(moved.ran_node_id, ran2.id);
        assert_eq!(ran1.find_ue(5), None);
        assert!(ctx.ran_ue_find_by_ran_ue_ngap_id(&ran1, 5).is_none());
        assert_eq!(ran2.find_ue(99), Some(ue.amf_ue_ngap_id));
    }

    #[test]
    fn test_switch_to_ran() {
        let ctx = create_test_context();
        let old_ran = add_ran(&ctx, 1);
        let new_ran = add_ran(&ctx, 2);
        let ue = ctx.ran_ue_add(&old_ran, 10).unwrap();

        let moved = ctx.ran_ue_switch_to_ran(ue.amf_ue_ngap_id, &new_ran, 20).unwrap();
        assert_eq!(moved.ran_node_id, new_ran.id);
        assert_eq!(moved.ran_ue_ngap_id, Some(20));
        assert_eq!(old_ran.find_ue(10), None);
        assert_eq!(new_ran.find_ue(20), Some(ue.amf_ue_ngap_id));
    }

    #[test]
    fn test_ran_remove_releases_all_ue() {
        let ctx = create_test_context();
        let ran = add_ran(&ctx, 1);
        let other = add_ran(&ctx, 2);
        ctx.ran_ue_add(&ran, 1).unwrap();
        ctx.ran_ue_add(&ran, 2).unwrap();
        ctx.ran_ue_add_pending(&ran).unwrap();
        ctx.ran_ue_add(&other, 1).unwrap();

        let removed = ctx.ran_remove(ran.id).unwrap();
        assert_eq!(removed.state(), NgapState::Final);
        assert_eq!(ctx.ran_ue_count(), 1);
        assert!(ctx.ran_find_by_assoc(1).is_none());
        assert!(ctx.ran_remove(ran.id).is_none());
    }

    #[test]
    fn test_error_associations() {
        let ctx = create_test_context();
        ctx.mark_association_error(3);
        ctx.mark_association_error(4);
        let mut assocs = ctx.take_error_associations();
        assocs.sort();
        assert_eq!(assocs, vec![3, 4]);
        assert!(ctx.take_error_associations().is_empty());
    }

    #[test]
    fn test_supported_tai_list_flattens_broadcast_plmns() {
        let plmn_a = PlmnId::new("001", "01");
        let plmn_b = PlmnId::new("999", "70");
        let items = vec![SupportedTaItem {
            tac: [0, 0, 0x64],
            broadcast_plmn_list: vec![
                BroadcastPlmnItem { plmn_id: plmn_a, tai_slice_support_list: vec![] },
                BroadcastPlmnItem { plmn_id: plmn_b, tai_slice_support_list: vec![] },
            ],
        }];

        let list = supported_tai_list(&items);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].tai, Tai5gs::new(plmn_a, 100));
        assert_eq!(list[1].tai, Tai5gs::new(plmn_b, 100));
    }

    #[test]
    fn test_operator_serves_any() {
        let op = OperatorInfo::default();
        let served = SupportedTai { tai: op.tai_list[0], s_nssai: vec![] };
        let foreign = SupportedTai {
            tai: Tai5gs::new(PlmnId::new("001", "01"), 0x999),
            s_nssai: vec![],
        };
        assert!(op.serves_any(&[foreign.clone(), served]));
        assert!(!op.serves_any(&[foreign]));
        assert!(!op.serves_any(&[]));
    }
}
