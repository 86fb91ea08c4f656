//! AMF NGAP Protocol Library
//!
//! Typed NGAP (NG Application Protocol, 3GPP TS 38.413) messages for the
//! AMF side of the N2 interface.
//!
//! # Architecture
//!
//! - **Message types** (`types`): one struct per message. Inbound IEs are
//!   `Option`s so presence is decided once when the PDU is decoded
//! - **PDU** (`pdu`): the closed [`NgapPdu`] sum type, one variant per message
//!   grouped into initiating / successful / unsuccessful outcomes
//! - **Causes** (`cause`) and **identifiers** (`ie`): cause taxonomy,
//!   procedure codes, protocol IE ids and criticality enumerations
//! - **Diagnostics** (`diagnostics`): Criticality Diagnostics builder
//! - **Codec** (`codec`): the [`NgapCodec`] seam plus a JSON codec
//!
//! # Supported Procedures
//!
//! - **Interface management**: NG Setup, RAN Configuration Update, NG Reset,
//!   Error Indication, RAN Configuration Transfer (Section 8.7)
//! - **NAS transport**: Initial UE Message, Uplink/Downlink NAS Transport,
//!   NAS Non Delivery Indication (Section 8.6)
//! - **UE context management**: Initial Context Setup, UE Context Release,
//!   UE Context Modification, UE Radio Capability Info (Section 8.3)
//! - **PDU session management**: Setup, Modify, Modify Indication, Release,
//!   Notify (Section 8.2)
//! - **UE mobility management**: Handover Preparation, Resource Allocation,
//!   Notification, Cancel and Path Switch (Section 8.4)

pub mod cause;
pub mod codec;
pub mod diagnostics;
pub mod error;
pub mod ie;
pub mod pdu;
pub mod types;

// Re-export key types for convenience
pub use cause::{Cause, CauseMisc, CauseNas, CauseProtocol, CauseRadioNetwork, CauseTransport};
pub use codec::{JsonCodec, NgapCodec};
pub use error::{NgapError, NgapResult};
pub use ie::{CriticalityDiagnostics, ProcedureCode, ProtocolIeId};
pub use pdu::{InitiatingMessage, NgapPdu, SuccessfulOutcome, UnsuccessfulOutcome};
pub use types::*;
