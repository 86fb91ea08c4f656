//! AMF daemon library
//!
//! NGAP control plane of the Access and Mobility Management Function: RAN
//! node and UE context store, message dispatch, procedure handlers for
//! interface management, UE context management, PDU session resource relay
//! and handover, with the SMF and NAS layers behind collaborator traits.

pub mod config;
pub mod context;
pub mod nas;
pub mod ngap_build;
pub mod ngap_dispatch;
pub mod ngap_handler;
pub mod ngap_handover;
pub mod ngap_path;
pub mod ngap_send;
pub mod ngap_sm;
pub mod pdu_relay;
pub mod sbi_path;
pub mod worker;

#[cfg(test)]
mod property_tests;
#[cfg(test)]
mod test_support;
