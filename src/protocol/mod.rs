//! Protocol components of the switch bank: group function handling, message
//! codecs, the transmission scheduler, and the message-level transport.
pub mod group_function;
pub mod messages;
pub mod scheduler;
pub mod transport;
