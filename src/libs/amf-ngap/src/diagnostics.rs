//! Criticality Diagnostics Builder
//!
//! Assembles the Criticality Diagnostics IE (TS 38.413 Section 9.3.1.3)
//! reported with Error Indication when mandatory IEs are absent.

use crate::ie::{
    Criticality, CriticalityDiagnostics, CriticalityDiagnosticsIeItem, ProcedureCode,
    ProtocolIeId, TriggeringMessage, TypeOfError,
};

/// Build a Criticality Diagnostics IE.
///
/// An empty `ies` list omits the IEs Criticality Diagnostics list entirely.
pub fn build_criticality_diagnostics(
    procedure_code: ProcedureCode,
    triggering_message: TriggeringMessage,
    procedure_criticality: Criticality,
    ies: Vec<CriticalityDiagnosticsIeItem>,
) -> CriticalityDiagnostics {
    CriticalityDiagnostics {
        procedure_code: Some(procedure_code),
        triggering_message: Some(triggering_message),
        procedure_criticality: Some(procedure_criticality),
        ies_criticality_diagnostics: if ies.is_empty() { None } else { Some(ies) },
    }
}

/// Diagnostics entry for a missing reject-criticality IE
pub fn build_criticality_diagnostics_ie_item(ie_id: ProtocolIeId) -> CriticalityDiagnosticsIeItem {
    CriticalityDiagnosticsIeItem {
        ie_criticality: Criticality::Reject,
        ie_id,
        type_of_error: TypeOfError::Missing,
    }
}

/// Collects the mandatory IEs found missing while validating one message.
///
/// ```
/// use amf_ngap::diagnostics::MissingIes;
/// use amf_ngap::ie::ProtocolIeId;
///
/// let mut missing = MissingIes::default();
/// let id: Option<u64> = missing.require(None, ProtocolIeId::AMF_UE_NGAP_ID);
/// assert!(id.is_none());
/// assert_eq!(missing.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MissingIes {
    items: Vec<CriticalityDiagnosticsIeItem>,
}

impl MissingIes {
    /// Pass `value` through, recording `ie_id` when it is absent
    pub fn require<T>(&mut self, value: Option<T>, ie_id: ProtocolIeId) -> Option<T> {
        if value.is_none() {
            self.items.push(build_criticality_diagnostics_ie_item(ie_id));
        }
        value
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn ie_ids(&self) -> Vec<ProtocolIeId> {
        self.items.iter().map(|item| item.ie_id).collect()
    }

    /// Finish into a diagnostics IE for the given procedure
    pub fn into_diagnostics(
        self,
        procedure_code: ProcedureCode,
        triggering_message: TriggeringMessage,
        procedure_criticality: Criticality,
    ) -> CriticalityDiagnostics {
        build_criticality_diagnostics(
            procedure_code,
            triggering_message,
            procedure_criticality,
            self.items,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_with_items() {
        let diag = build_criticality_diagnostics(
            ProcedureCode::HANDOVER_PREPARATION,
            TriggeringMessage::InitiatingMessage,
            Criticality::Reject,
            vec![
                build_criticality_diagnostics_ie_item(ProtocolIeId::AMF_UE_NGAP_ID),
                build_criticality_diagnostics_ie_item(ProtocolIeId::TARGET_ID),
            ],
        );

        assert_eq!(diag.procedure_code, Some(ProcedureCode::HANDOVER_PREPARATION));
        assert_eq!(diag.triggering_message, Some(TriggeringMessage::InitiatingMessage));
        assert_eq!(diag.procedure_criticality, Some(Criticality::Reject));
        let items = diag.ies_criticality_diagnostics.unwrap();
        assert_eq!(items.len(), 2);
        assert!(items
            .iter()
            .all(|i| i.ie_criticality == Criticality::Reject && i.type_of_error == TypeOfError::Missing));
        assert_eq!(items[1].ie_id, ProtocolIeId::TARGET_ID);
    }

    #[test]
    fn test_build_empty_list_omitted() {
        let diag = build_criticality_diagnostics(
            ProcedureCode::INITIAL_UE_MESSAGE,
            TriggeringMessage::InitiatingMessage,
            Criticality::Ignore,
            Vec::new(),
        );
        assert!(diag.ies_criticality_diagnostics.is_none());
        assert_eq!(diag.procedure_criticality, Some(Criticality::Ignore));
    }

    #[test]
    fn test_missing_ies_collector() {
        let mut missing = MissingIes::default();
        assert_eq!(missing.require(Some(7u32), ProtocolIeId::RAN_UE_NGAP_ID), Some(7));
        assert!(missing.is_empty());

        let _: Option<Vec<u8>> = missing.require(None, ProtocolIeId::NAS_PDU);
        let _: Option<u64> = missing.require(None, ProtocolIeId::AMF_UE_NGAP_ID);
        assert_eq!(
            missing.ie_ids(),
            vec![ProtocolIeId::NAS_PDU, ProtocolIeId::AMF_UE_NGAP_ID]
        );

        let diag = missing.into_diagnostics(
            ProcedureCode::UPLINK_NAS_TRANSPORT,
            TriggeringMessage::InitiatingMessage,
            Criticality::Ignore,
        );
        assert_eq!(diag.ies_criticality_diagnostics.map(|l| l.len()), Some(2));
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_one_entry_per_missing_ie(present in proptest::collection::vec(any::<bool>(), 0..12)) {
                let mut missing = MissingIes::default();
                for (i, p) in present.iter().enumerate() {
                    let value = if *p { Some(i) } else { None };
                    missing.require(value, ProtocolIeId(i as u16));
                }
                let absent = present.iter().filter(|p| !**p).count();
                prop_assert_eq!(missing.len(), absent);

                let diag = missing.into_diagnostics(
                    ProcedureCode::HANDOVER_PREPARATION,
                    TriggeringMessage::InitiatingMessage,
                    Criticality::Reject,
                );
                let listed = diag.ies_criticality_diagnostics.map(|l| l.len()).unwrap_or(0);
                prop_assert_eq!(listed, absent);
            }
        }
    }
}
