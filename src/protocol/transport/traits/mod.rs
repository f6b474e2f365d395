//! Abstraction traits used by the transport layer (message bus, timer, and
//! synchronous message sink).
pub mod korri_timer;
pub mod msg_sender;
pub mod n2k_bus;
