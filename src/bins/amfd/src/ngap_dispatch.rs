//! NGAP Dispatcher
//!
//! Turns transport events into procedure handler calls: resolves (or
//! creates) the RAN node of the association, decodes the PDU and routes it.
//! Non-UE-associated procedures run inline; UE-associated ones are queued
//! on the per-UE worker pool so that messages of one UE are handled in
//! arrival order. [`AssociationRouter`] gives every association its own
//! dispatch task so that RAN nodes never wait on each other.

use std::collections::HashMap;
use std::sync::Arc;

use amf_ngap::{
    AmfUeNgapId, InitiatingMessage, NgapCodec, NgapPdu, RanUeNgapId, SuccessfulOutcome,
    UnsuccessfulOutcome,
};
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::context::{AssociationId, RanNode, RanUe};
use crate::ngap_handler::NgapHandler;
use crate::ngap_path::{NotificationKind, TransportEvent};
use crate::ngap_send::SenderFactory;
use crate::worker::{UeKey, UeWorkerPool};

/// How a decoded PDU is scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    /// Non-UE-associated procedure
    Node,
    /// UE-associated procedure with the UE NGAP IDs it carries
    Ue(Option<AmfUeNgapId>, Option<RanUeNgapId>),
    /// Message only the AMF originates
    Unexpected,
}

fn classify(pdu: &NgapPdu) -> Route {
    use InitiatingMessage as I;
    use SuccessfulOutcome as S;
    use UnsuccessfulOutcome as U;

    match pdu {
        NgapPdu::InitiatingMessage(m) => match m {
            I::NgSetupRequest(_)
            | I::RanConfigurationUpdate(_)
            | I::NgReset(_)
            | I::ErrorIndication(_)
            | I::UplinkRanConfigurationTransfer(_) => Route::Node,
            I::InitialUeMessage(m) => Route::Ue(None, m.ran_ue_ngap_id),
            I::UplinkNasTransport(m) => Route::Ue(m.amf_ue_ngap_id, m.ran_ue_ngap_id),
            I::NasNonDeliveryIndication(m) => Route::Ue(m.amf_ue_ngap_id, m.ran_ue_ngap_id),
            I::UeContextReleaseRequest(m) => Route::Ue(m.amf_ue_ngap_id, m.ran_ue_ngap_id),
            I::UeRadioCapabilityInfoIndication(m) => {
                Route::Ue(m.amf_ue_ngap_id, m.ran_ue_ngap_id)
            }
            I::LocationReport(m) => Route::Ue(m.amf_ue_ngap_id, m.ran_ue_ngap_id),
            I::PduSessionResourceModifyIndication(m) => {
                Route::Ue(m.amf_ue_ngap_id, m.ran_ue_ngap_id)
            }
            I::PduSessionResourceNotify(m) => Route::Ue(m.amf_ue_ngap_id, m.ran_ue_ngap_id),
            I::HandoverRequired(m) => Route::Ue(m.amf_ue_ngap_id, m.ran_ue_ngap_id),
            I::HandoverNotify(m) => Route::Ue(m.amf_ue_ngap_id, m.ran_ue_ngap_id),
            I::HandoverCancel(m) => Route::Ue(m.amf_ue_ngap_id, m.ran_ue_ngap_id),
            I::PathSwitchRequest(m) => Route::Ue(m.source_amf_ue_ngap_id, m.ran_ue_ngap_id),
            I::DownlinkNasTransport(_)
            | I::UeContextReleaseCommand(_)
            | I::PduSessionResourceSetupRequest(_)
            | I::PduSessionResourceModifyRequest(_)
            | I::PduSessionResourceReleaseCommand(_)
            | I::HandoverRequest(_)
            | I::DownlinkRanConfigurationTransfer(_) => Route::Unexpected,
        },
        NgapPdu::SuccessfulOutcome(m) => match m {
            S::NgResetAcknowledge(_) => Route::Node,
            S::InitialContextSetupResponse(m) => Route::Ue(m.amf_ue_ngap_id, m.ran_ue_ngap_id),
            S::UeContextReleaseComplete(m) => Route::Ue(m.amf_ue_ngap_id, m.ran_ue_ngap_id),
            S::UeContextModificationResponse(m) => Route::Ue(m.amf_ue_ngap_id, m.ran_ue_ngap_id),
            S::PduSessionResourceSetupResponse(m) => {
                Route::Ue(m.amf_ue_ngap_id, m.ran_ue_ngap_id)
            }
            S::PduSessionResourceModifyResponse(m) => {
                Route::Ue(m.amf_ue_ngap_id, m.ran_ue_ngap_id)
            }
            S::PduSessionResourceReleaseResponse(m) => {
                Route::Ue(m.amf_ue_ngap_id, m.ran_ue_ngap_id)
            }
            S::HandoverRequestAcknowledge(m) => Route::Ue(m.amf_ue_ngap_id, m.ran_ue_ngap_id),
            S::NgSetupResponse(_)
            | S::RanConfigurationUpdateAcknowledge(_)
            | S::PduSessionResourceModifyConfirm(_)
            | S::HandoverCommand(_)
            | S::HandoverCancelAcknowledge(_)
            | S::PathSwitchRequestAcknowledge(_) => Route::Unexpected,
        },
        NgapPdu::UnsuccessfulOutcome(m) => match m {
            U::InitialContextSetupFailure(m) => Route::Ue(m.amf_ue_ngap_id, m.ran_ue_ngap_id),
            U::UeContextModificationFailure(m) => Route::Ue(m.amf_ue_ngap_id, m.ran_ue_ngap_id),
            // Keyed like the target leg's other messages once resolved
            U::HandoverFailure(m) => Route::Ue(m.amf_ue_ngap_id, None),
            U::NgSetupFailure(_)
            | U::RanConfigurationUpdateFailure(_)
            | U::HandoverPreparationFailure(_)
            | U::PathSwitchRequestFailure(_) => Route::Unexpected,
        },
    }
}

/// Call the procedure handler for one RAN-originated PDU
async fn route(handler: &NgapHandler, ran: &RanNode, pdu: NgapPdu) {
    use InitiatingMessage as I;
    use SuccessfulOutcome as S;
    use UnsuccessfulOutcome as U;

    match pdu {
        NgapPdu::InitiatingMessage(m) => match m {
            I::NgSetupRequest(m) => handler.handle_ng_setup_request(ran, m).await,
            I::RanConfigurationUpdate(m) => handler.handle_ran_configuration_update(ran, m).await,
            I::NgReset(m) => handler.handle_ng_reset(ran, m).await,
            I::ErrorIndication(m) => handler.handle_error_indication(ran, m).await,
            I::InitialUeMessage(m) => handler.handle_initial_ue_message(ran, m).await,
            I::UplinkNasTransport(m) => handler.handle_uplink_nas_transport(ran, m).await,
            I::NasNonDeliveryIndication(m) => {
                handler.handle_nas_non_delivery_indication(ran, m).await
            }
            I::UeContextReleaseRequest(m) => {
                handler.handle_ue_context_release_request(ran, m).await
            }
            I::UeRadioCapabilityInfoIndication(m) => {
                handler.handle_ue_radio_capability_info_indication(ran, m).await
            }
            I::LocationReport(m) => handler.handle_location_report(ran, m).await,
            I::PduSessionResourceModifyIndication(m) => {
                handler.handle_pdu_session_resource_modify_indication(ran, m).await
            }
            I::PduSessionResourceNotify(m) => {
                handler.handle_pdu_session_resource_notify(ran, m).await
            }
            I::HandoverRequired(m) => handler.handle_handover_required(ran, m).await,
            I::HandoverNotify(m) => handler.handle_handover_notify(ran, m).await,
            I::HandoverCancel(m) => handler.handle_handover_cancel(ran, m).await,
            I::PathSwitchRequest(m) => handler.handle_path_switch_request(ran, m).await,
            I::UplinkRanConfigurationTransfer(m) => {
                handler.handle_uplink_ran_configuration_transfer(ran, m).await
            }
            other => log::warn!(
                "[RAN:{}] unexpected initiating message {}",
                ran.id,
                NgapPdu::from(other).name()
            ),
        },
        NgapPdu::SuccessfulOutcome(m) => match m {
            S::NgResetAcknowledge(m) => handler.handle_ng_reset_acknowledge(ran, m).await,
            S::InitialContextSetupResponse(m) => {
                handler.handle_initial_context_setup_response(ran, m).await
            }
            S::UeContextReleaseComplete(m) => {
                handler.handle_ue_context_release_complete(ran, m).await
            }
            S::UeContextModificationResponse(m) => {
                handler.handle_ue_context_modification_response(ran, m).await
            }
            S::PduSessionResourceSetupResponse(m) => {
                handler.handle_pdu_session_resource_setup_response(ran, m).await
            }
            S::PduSessionResourceModifyResponse(m) => {
                handler.handle_pdu_session_resource_modify_response(ran, m).await
            }
            S::PduSessionResourceReleaseResponse(m) => {
                handler.handle_pdu_session_resource_release_response(ran, m).await
            }
            S::HandoverRequestAcknowledge(m) => {
                handler.handle_handover_request_acknowledge(ran, m).await
            }
            other => log::warn!(
                "[RAN:{}] unexpected successful outcome {}",
                ran.id,
                NgapPdu::from(other).name()
            ),
        },
        NgapPdu::UnsuccessfulOutcome(m) => match m {
            U::InitialContextSetupFailure(m) => {
                handler.handle_initial_context_setup_failure(ran, m).await
            }
            U::UeContextModificationFailure(m) => {
                handler.handle_ue_context_modification_failure(ran, m).await
            }
            U::HandoverFailure(m) => handler.handle_handover_failure(ran, m).await,
            other => log::warn!(
                "[RAN:{}] unexpected unsuccessful outcome {}",
                ran.id,
                NgapPdu::from(other).name()
            ),
        },
    }
}

pub struct NgapDispatcher {
    handler: Arc<NgapHandler>,
    codec: Arc<dyn NgapCodec>,
    senders: Arc<dyn SenderFactory>,
    workers: UeWorkerPool,
}

impl NgapDispatcher {
    pub fn new(
        handler: Arc<NgapHandler>,
        codec: Arc<dyn NgapCodec>,
        senders: Arc<dyn SenderFactory>,
    ) -> Self {
        Self {
            handler,
            codec,
            senders,
            workers: UeWorkerPool::new(),
        }
    }

    pub fn handler(&self) -> &Arc<NgapHandler> {
        &self.handler
    }

    pub async fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Connected { assoc, peer } => {
                log::info!("[assoc:{}] NGAP association up ({})", assoc, peer);
            }
            TransportEvent::Message { assoc, data } => self.handle_message(assoc, data).await,
            TransportEvent::Notification { assoc, kind } => self.handle_notification(assoc, kind),
        }
    }

    async fn handle_message(&self, assoc: AssociationId, data: Bytes) {
        let amf = self.handler.context();

        if data.is_empty() {
            log::warn!("[assoc:{}] empty NGAP payload, removing RAN node", assoc);
            if let Some(ran) = amf.ran_find_by_assoc(assoc) {
                amf.ran_remove(ran.id);
            }
            return;
        }

        let ran = match amf.ran_find_or_add(assoc, || self.senders.sender_for(assoc)) {
            Ok(ran) => ran,
            Err(e) => {
                log::error!("[assoc:{}] cannot accept RAN node: {}", assoc, e);
                return;
            }
        };

        let pdu = match self.codec.decode(&data) {
            Ok(pdu) => pdu,
            Err(e) => {
                log::warn!("[RAN:{}] dropping undecodable NGAP PDU: {}", ran.id, e);
                return;
            }
        };
        log::debug!("[RAN:{}] Received {}", ran.id, pdu.name());

        self.dispatch(ran, pdu).await;
    }

    /// Route a decoded PDU received on `ran`
    pub async fn dispatch(&self, ran: Arc<RanNode>, pdu: NgapPdu) {
        let key = match classify(&pdu) {
            Route::Node => None,
            Route::Ue(_, Some(ran_ue_ngap_id)) => Some(UeKey::Ran {
                ran_id: ran.id,
                ran_ue_ngap_id,
            }),
            Route::Ue(Some(amf_ue_ngap_id), None) => Some(self.amf_key(&ran, amf_ue_ngap_id)),
            // No usable UE id; the handler reports the missing IEs
            Route::Ue(None, None) => None,
            Route::Unexpected => {
                log::warn!("[RAN:{}] unexpected {} from RAN node", ran.id, pdu.name());
                return;
            }
        };

        match key {
            Some(key) => {
                let handler = self.handler.clone();
                self.workers.submit(
                    key,
                    Box::pin(async move {
                        route(&handler, &ran, pdu).await;
                    }),
                );
            }
            None => route(&self.handler, &ran, pdu).await,
        }
    }

    /// Key of a message naming only the AMF UE NGAP ID: the leg's RAN key
    /// when the leg is bound on this RAN node, so that it queues behind the
    /// leg's RAN-keyed messages
    fn amf_key(&self, ran: &RanNode, amf_ue_ngap_id: AmfUeNgapId) -> UeKey {
        match self.handler.context().ran_ue_find(amf_ue_ngap_id) {
            Some(RanUe {
                ran_node_id,
                ran_ue_ngap_id: Some(ran_ue_ngap_id),
                ..
            }) if ran_node_id == ran.id => UeKey::Ran {
                ran_id: ran.id,
                ran_ue_ngap_id,
            },
            _ => UeKey::Amf(amf_ue_ngap_id),
        }
    }

    fn handle_notification(&self, assoc: AssociationId, kind: NotificationKind) {
        let amf = self.handler.context();

        match kind {
            NotificationKind::SendFailed => {
                log::warn!("[assoc:{}] send failure reported", assoc);
                amf.mark_association_error(assoc);
            }
            NotificationKind::PeerAddressChange => {
                log::info!("[assoc:{}] peer address changed", assoc);
            }
            terminal => {
                log::info!("[assoc:{}] association down ({:?})", assoc, terminal);

                for errored in amf.take_error_associations() {
                    if errored == assoc {
                        continue;
                    }
                    if let Some(ran) = amf.ran_find_by_assoc(errored) {
                        log::info!("[assoc:{}] pruning RAN:{} in error state", errored, ran.id);
                        amf.ran_remove(ran.id);
                    }
                }

                if let Some(ran) = amf.ran_find_by_assoc(assoc) {
                    amf.ran_remove(ran.id);
                }
            }
        }
    }

    /// Wait for every queued UE job to finish
    pub async fn shutdown(&self) {
        self.workers.shutdown().await;
    }
}

// ============================================================================
// Per-association dispatch
// ============================================================================

struct AssociationTask {
    events: mpsc::UnboundedSender<TransportEvent>,
    handle: JoinHandle<()>,
}

/// Fans transport events out to one dispatch task per association. Events
/// of one association are handled in arrival order.
pub struct AssociationRouter {
    dispatcher: Arc<NgapDispatcher>,
    associations: HashMap<AssociationId, AssociationTask>,
    closing: Vec<JoinHandle<()>>,
}

impl AssociationRouter {
    pub fn new(dispatcher: Arc<NgapDispatcher>) -> Self {
        Self {
            dispatcher,
            associations: HashMap::new(),
            closing: Vec::new(),
        }
    }

    pub fn num_associations(&self) -> usize {
        self.associations.len()
    }

    /// Queue `event` on its association's task, starting the task if
    /// needed. Must run inside a tokio runtime.
    pub fn route(&mut self, event: TransportEvent) {
        let assoc = event.assoc();
        let terminal = matches!(
            event,
            TransportEvent::Notification { kind, .. } if kind.is_terminal()
        );

        let task = self.associations.entry(assoc).or_insert_with(|| {
            let (events, mut rx) = mpsc::unbounded_channel::<TransportEvent>();
            let dispatcher = self.dispatcher.clone();
            let handle = tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    dispatcher.handle_event(event).await;
                }
                log::debug!("[assoc:{}] dispatcher stopped", assoc);
            });
            AssociationTask { events, handle }
        });

        if task.events.send(event).is_err() {
            log::error!("[assoc:{}] dispatcher is gone, dropping event", assoc);
        }

        if terminal {
            // The task ends once the notification is handled
            if let Some(task) = self.associations.remove(&assoc) {
                self.closing.push(task.handle);
            }
        }
        self.closing.retain(|handle| !handle.is_finished());
    }

    /// Drain every association queue, then the UE worker pool
    pub async fn shutdown(mut self) {
        let handles = self
            .associations
            .drain()
            .map(|(_, task)| task.handle)
            .chain(self.closing.drain(..))
            .collect::<Vec<_>>();
        for handle in handles {
            if let Err(e) = handle.await {
                log::error!("Association dispatcher failed: {}", e);
            }
        }
        self.dispatcher.shutdown().await;
    }
}
