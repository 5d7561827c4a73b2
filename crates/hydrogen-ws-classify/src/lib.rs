//! WebSocket/transport error classifier (C10): maps transport-layer failures
//! to `{category, severity, recoveryAction}`, grounded on the teacher's
//! `UplinkError` variants in `services/forwarder/src/uplink.rs` (Connect/Ws/
//! Protocol/Serialization/Disconnected), generalized into a category+action
//! table per spec §4.10.

mod classifier;
mod registry;

pub use classifier::{classify, retry_delay, ErrorCategory, ErrorSeverity, RecoveryAction, ClassifiedError};
pub use registry::{register_handler, ClassifierHandler};
