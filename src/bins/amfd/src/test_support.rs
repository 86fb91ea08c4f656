//! Shared test fixtures: recording collaborators and canned NGAP messages

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use amf_ngap::{
    AmfUeNgapId, BroadcastPlmnItem, GlobalRanNodeId, InitialUeMessage, NgSetupRequest, NgapPdu,
    NrCgi, PduSessionId, PlmnId, RanUeNgapId, RrcEstablishmentCause, SNssai, SupportedTaItem,
    Tai, UserLocationInformation,
};
use async_trait::async_trait;

use crate::context::{
    AmfContext, AmfUe, AssociationId, GmmState, OperatorInfo, RanNode, RanUe, SmContext,
};
use crate::nas::{NasError, NasHandler};
use crate::ngap_handler::NgapHandler;
use crate::ngap_send::{RanSender, SendError, SenderFactory};
use crate::sbi_path::{SmUpdateKind, SmUpdateRequest, SmUpdateResponse, SmfClient, SmfError};

// ============================================================================
// Collaborators
// ============================================================================

/// RAN sender that keeps every PDU instead of encoding it
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<NgapPdu>>,
}

impl RecordingSender {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Drain the recorded PDUs
    pub fn take(&self) -> Vec<NgapPdu> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }

    pub fn sent(&self) -> Vec<NgapPdu> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl RanSender for RecordingSender {
    async fn send_pdu(&self, pdu: NgapPdu) -> Result<(), SendError> {
        self.sent.lock().unwrap().push(pdu);
        Ok(())
    }
}

/// Hands out one [`RecordingSender`] per association
#[derive(Default)]
pub struct RecordingSenderFactory {
    senders: Mutex<HashMap<AssociationId, Arc<RecordingSender>>>,
}

impl RecordingSenderFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sender(&self, assoc: AssociationId) -> Option<Arc<RecordingSender>> {
        self.senders.lock().unwrap().get(&assoc).cloned()
    }
}

impl SenderFactory for RecordingSenderFactory {
    fn sender_for(&self, assoc: AssociationId) -> Arc<dyn RanSender> {
        self.senders
            .lock()
            .unwrap()
            .entry(assoc)
            .or_insert_with(RecordingSender::new)
            .clone()
    }
}

/// SMF double. By default every update succeeds and the RAN transfer comes
/// back as the N2 payload.
#[derive(Default)]
pub struct FakeSmf {
    calls: Mutex<Vec<(String, SmUpdateKind, Vec<u8>)>>,
    releases: Mutex<Vec<String>>,
    failing: Mutex<Vec<String>>,
    responses: Mutex<HashMap<SmUpdateKind, SmUpdateResponse>>,
}

impl FakeSmf {
    /// Reject every update for `sm_ref`
    pub fn fail(&self, sm_ref: &str) {
        self.failing.lock().unwrap().push(sm_ref.to_string());
    }

    /// Answer every update of `kind` with `response`
    pub fn respond(&self, kind: SmUpdateKind, response: SmUpdateResponse) {
        self.responses.lock().unwrap().insert(kind, response);
    }

    /// `(sm_ref, transfer)` of each update of `kind`, in call order
    pub fn calls_of(&self, kind: SmUpdateKind) -> Vec<(String, Vec<u8>)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(sm_ref, _, transfer)| (sm_ref.clone(), transfer.clone()))
            .collect()
    }

    pub fn releases(&self) -> Vec<String> {
        self.releases.lock().unwrap().clone()
    }
}

#[async_trait]
impl SmfClient for FakeSmf {
    async fn update_session(
        &self,
        sm_ref: &str,
        request: SmUpdateRequest,
    ) -> Result<SmUpdateResponse, SmfError> {
        self.calls
            .lock()
            .unwrap()
            .push((sm_ref.to_string(), request.kind, request.transfer.clone()));

        if self.failing.lock().unwrap().iter().any(|r| r == sm_ref) {
            return Err(SmfError::Rejected {
                sm_ref: sm_ref.to_string(),
                reason: "test".to_string(),
            });
        }
        if let Some(response) = self.responses.lock().unwrap().get(&request.kind) {
            return Ok(response.clone());
        }
        Ok(SmUpdateResponse {
            n1_msg: None,
            n2_info: Some(request.transfer),
            n2_info_type: None,
        })
    }

    async fn release_session(&self, sm_ref: &str) -> Result<(), SmfError> {
        self.releases.lock().unwrap().push(sm_ref.to_string());
        Ok(())
    }
}

/// NAS double recording every delivered container
#[derive(Default)]
pub struct RecordingNas {
    received: Mutex<Vec<(AmfUeNgapId, Vec<u8>)>>,
}

impl RecordingNas {
    pub fn received(&self) -> Vec<(AmfUeNgapId, Vec<u8>)> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl NasHandler for RecordingNas {
    async fn handle(&self, ran_ue: &RanUe, nas_pdu: &[u8]) -> Result<(), NasError> {
        self.received
            .lock()
            .unwrap()
            .push((ran_ue.amf_ue_ngap_id, nas_pdu.to_vec()));
        Ok(())
    }
}

// ============================================================================
// AMF under test
// ============================================================================

pub struct TestAmf {
    pub handler: Arc<NgapHandler>,
    pub smf: Arc<FakeSmf>,
    pub nas: Arc<RecordingNas>,
}

impl TestAmf {
    pub fn new() -> Self {
        let smf = Arc::new(FakeSmf::default());
        let nas = Arc::new(RecordingNas::default());
        let amf = Arc::new(AmfContext::new(OperatorInfo::default()));
        let handler = Arc::new(NgapHandler::new(amf, smf.clone(), nas.clone()));
        Self { handler, smf, nas }
    }

    pub fn context(&self) -> &Arc<AmfContext> {
        self.handler.context()
    }

    /// RAN node in its initial state
    pub fn add_ran(&self, assoc: AssociationId) -> (Arc<RanNode>, Arc<RecordingSender>) {
        let sender = RecordingSender::new();
        let for_ran = sender.clone();
        let ran = self
            .context()
            .ran_find_or_add(assoc, move || for_ran as Arc<dyn RanSender>)
            .unwrap();
        (ran, sender)
    }

    /// Operational RAN node; the NG Setup Response is already drained
    pub async fn setup_ran(
        &self,
        assoc: AssociationId,
        gnb: u32,
    ) -> (Arc<RanNode>, Arc<RecordingSender>) {
        let (ran, sender) = self.add_ran(assoc);
        self.handler
            .handle_ng_setup_request(&ran, ng_setup_request(gnb))
            .await;
        assert!(ran.is_operational());
        sender.take();
        (ran, sender)
    }

    /// Registered UE with a valid security context, attached to a new leg on
    /// `ran` and holding active sessions `sm-<id>` for each id
    pub fn registered_ue(
        &self,
        ran: &RanNode,
        ran_ue_ngap_id: RanUeNgapId,
        sessions: &[PduSessionId],
    ) -> (RanUe, AmfUe) {
        let amf = self.context();
        let leg = amf.ran_ue_add(ran, ran_ue_ngap_id).unwrap();
        let supi = format!("imsi-0010100000{:05}", leg.amf_ue_ngap_id);
        let amf_ue = amf.amf_ue_add(Some(&supi)).unwrap();

        amf.amf_ue_modify(amf_ue.id, |ue| {
            ue.state = GmmState::Registered;
            ue.security.available = true;
        })
        .unwrap();
        amf.amf_ue_attach_ran_ue(amf_ue.id, leg.amf_ue_ngap_id).unwrap();

        for id in sessions {
            amf_ue.sm_context_add(SmContext {
                pdu_session_id: *id,
                sm_ref: format!("sm-{}", id),
                s_nssai: SNssai { sst: 1, sd: None },
                active: true,
            });
        }

        (
            amf.ran_ue_find(leg.amf_ue_ngap_id).unwrap(),
            amf.amf_ue_find(amf_ue.id).unwrap(),
        )
    }
}

// ============================================================================
// Messages
// ============================================================================

pub fn plmn() -> PlmnId {
    PlmnId::new("001", "01")
}

pub fn gnb_id(gnb: u32) -> GlobalRanNodeId {
    GlobalRanNodeId::GlobalGnbId {
        plmn_id: plmn(),
        gnb_id: gnb,
        gnb_id_len: 22,
    }
}

pub fn tai(tac: u8) -> Tai {
    Tai {
        plmn_id: plmn(),
        tac: [0, 0, tac],
    }
}

pub fn supported_ta_item(tac: &[u8; 3]) -> SupportedTaItem {
    SupportedTaItem {
        tac: *tac,
        broadcast_plmn_list: vec![BroadcastPlmnItem {
            plmn_id: plmn(),
            tai_slice_support_list: vec![SNssai { sst: 1, sd: None }],
        }],
    }
}

/// NG Setup Request advertising the served TAC 1
pub fn ng_setup_request(gnb: u32) -> NgSetupRequest {
    NgSetupRequest {
        global_ran_node_id: Some(gnb_id(gnb)),
        ran_node_name: Some(format!("gnb-{:x}", gnb)),
        supported_ta_list: Some(vec![supported_ta_item(&[0, 0, 1])]),
        default_paging_drx: None,
    }
}

/// NR location in cell `cell` of TAI 1
pub fn nr_location(cell: u64) -> UserLocationInformation {
    UserLocationInformation::Nr {
        nr_cgi: NrCgi {
            plmn_id: plmn(),
            nr_cell_identity: cell,
        },
        tai: tai(1),
        time_stamp: None,
    }
}

pub fn initial_ue_message(ran_ue_ngap_id: RanUeNgapId) -> InitialUeMessage {
    InitialUeMessage {
        ran_ue_ngap_id: Some(ran_ue_ngap_id),
        nas_pdu: Some(vec![0x7e, 0x00]),
        user_location_information: Some(nr_location(1)),
        rrc_establishment_cause: Some(RrcEstablishmentCause::MoSignalling),
        ..Default::default()
    }
}
