//! Property-Based Tests for the NGAP control plane
//!
//! RAN configuration bookkeeping, missing-IE reporting and per-UE ordering.

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use amf_ngap::{
        HandoverRequired, HandoverType, InitiatingMessage, NgapPdu, PduSessionResourceItem,
        RanConfigurationUpdate, TargetId,
    };
    use proptest::prelude::*;

    use crate::context::Tai5gs;
    use crate::test_support::*;
    use crate::worker::{UeKey, UeWorkerPool};

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    // ========================================================================
    // Strategies for generating test data
    // ========================================================================

    /// One Supported TA List: 1..4 distinct TACs in 1..8
    fn arb_tac_list() -> impl Strategy<Value = Vec<u8>> {
        proptest::collection::btree_set(1u8..8, 1..4).prop_map(|s| s.into_iter().collect())
    }

    /// Presence mask of the six mandatory Handover Required IEs, never all present
    fn arb_ho_required_mask() -> impl Strategy<Value = [bool; 6]> {
        any::<[bool; 6]>().prop_filter("at least one IE missing", |m| m.iter().any(|p| !p))
    }

    /// Jobs as (key index, sequence number) pairs
    fn arb_jobs() -> impl Strategy<Value = Vec<u8>> {
        proptest::collection::vec(0u8..6, 1..60)
    }

    // ========================================================================
    // Property: the latest Supported TA List replaces the previous one
    // ========================================================================

    proptest! {
        #[test]
        fn prop_ran_configuration_update_replaces_tai_list(
            updates in proptest::collection::vec(arb_tac_list(), 1..5)
        ) {
            let rt = runtime();
            rt.block_on(async {
                let amf = TestAmf::new();
                let (ran, _sender) = amf.setup_ran(1, 0x100).await;

                for tacs in &updates {
                    let msg = RanConfigurationUpdate {
                        supported_ta_list: Some(
                            tacs.iter().map(|tac| supported_ta_item(&[0, 0, *tac])).collect(),
                        ),
                        ..Default::default()
                    };
                    amf.handler.handle_ran_configuration_update(&ran, msg).await;
                }

                let last = updates.last().unwrap();
                let stored: Vec<Tai5gs> =
                    ran.info().supported_ta_list.iter().map(|s| s.tai).collect();
                let expected: Vec<Tai5gs> =
                    last.iter().map(|tac| Tai5gs::new(plmn(), *tac as u32)).collect();
                assert_eq!(stored, expected);
            });
        }
    }

    // ========================================================================
    // Property: one diagnostics entry per missing Handover Required IE
    // ========================================================================

    proptest! {
        #[test]
        fn prop_handover_required_reports_each_missing_ie(mask in arb_ho_required_mask()) {
            let rt = runtime();
            let listed = rt.block_on(async {
                let amf = TestAmf::new();
                let (ran, sender) = amf.setup_ran(1, 0x100).await;

                let msg = HandoverRequired {
                    amf_ue_ngap_id: mask[0].then_some(1),
                    ran_ue_ngap_id: mask[1].then_some(5),
                    handover_type: mask[2].then_some(HandoverType::Intra5gs),
                    cause: None,
                    target_id: mask[3].then(|| TargetId::TargetRanNodeId {
                        global_ran_node_id: gnb_id(0x200),
                        selected_tai: tai(1),
                    }),
                    pdu_session_resource_list: mask[4].then(|| {
                        vec![PduSessionResourceItem {
                            pdu_session_id: 1,
                            transfer: vec![0x01],
                        }]
                    }),
                    source_to_target_transparent_container: mask[5].then(|| vec![0xaa]),
                };
                amf.handler.handle_handover_required(&ran, msg).await;

                match sender.take().as_slice() {
                    [NgapPdu::InitiatingMessage(InitiatingMessage::ErrorIndication(ei))] => ei
                        .criticality_diagnostics
                        .clone()
                        .and_then(|d| d.ies_criticality_diagnostics)
                        .map(|l| l.len())
                        .unwrap_or(0),
                    other => panic!("Expected Error Indication, got {:?}", other),
                }
            });

            let absent = mask.iter().filter(|p| !**p).count();
            prop_assert_eq!(listed, absent);
        }
    }

    // ========================================================================
    // Property: jobs sharing a key run in submission order, whatever the
    // number of runtime worker threads
    // ========================================================================

    proptest! {
        #[test]
        fn prop_worker_pool_preserves_per_key_order(
            workers in prop_oneof![Just(1usize), Just(2), Just(4), Just(8)],
            jobs in arb_jobs(),
        ) {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(workers)
                .enable_all()
                .build()
                .unwrap();
            let seen = Arc::new(Mutex::new(Vec::new()));

            rt.block_on(async {
                let pool = UeWorkerPool::new();
                for (seq, key) in jobs.iter().enumerate() {
                    let seen = seen.clone();
                    let key = *key;
                    pool.submit(
                        UeKey::Ran {
                            ran_id: 1,
                            ran_ue_ngap_id: key as u32,
                        },
                        Box::pin(async move {
                            tokio::task::yield_now().await;
                            seen.lock().unwrap().push((key, seq));
                        }),
                    );
                }
                pool.shutdown().await;
            });

            let seen = seen.lock().unwrap();
            prop_assert_eq!(seen.len(), jobs.len());
            for key in 0u8..6 {
                let order: Vec<usize> =
                    seen.iter().filter(|(k, _)| *k == key).map(|(_, s)| *s).collect();
                let mut sorted = order.clone();
                sorted.sort_unstable();
                prop_assert_eq!(order, sorted);
            }
        }
    }
}
