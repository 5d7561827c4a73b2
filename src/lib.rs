//! Hydrogen: device-control middleware for astronomical instrumentation.
//!
//! This crate is a thin facade re-exporting the workspace's component
//! crates, one per module named in the specification:
//!
//! - [`hydrogen_message`] — message model, validator/sanitizer, transformer (C1-C3)
//! - [`hydrogen_transport`] — per-protocol transport communicators (C4)
//! - [`hydrogen_device`] — per-device multi-protocol communicator (C5)
//! - [`hydrogen_correlator`] — client-side correlation/subscription plane (C6)
//! - [`hydrogen_recovery`] — error-recovery engine (C8)
//! - [`hydrogen_fifo`] — named-pipe framing, session, reconnect (C9)
//! - [`hydrogen_ws_classify`] — transport error classifier (C10)
//! - [`hydrogen_observability`] — logger and performance metrics (C11)
//! - [`hydrogen_auth`] — auth/session gate hook surface (C12)
//!
//! The server connection plane (C7) lives in the separate `hydrogen-server`
//! binary crate under `services/`, since it is a deployable service rather
//! than a library consumers link against.

pub use hydrogen_auth as auth;
pub use hydrogen_correlator as correlator;
pub use hydrogen_device as device;
pub use hydrogen_fifo as fifo;
pub use hydrogen_message as message;
pub use hydrogen_observability as observability;
pub use hydrogen_recovery as recovery;
pub use hydrogen_transport as transport;
pub use hydrogen_ws_classify as ws_classify;
