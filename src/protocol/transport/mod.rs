//! NMEA 2000 transport layer as seen by the application: whole-message bus
//! abstraction, timer, and the outbound queue feeding the bus writer.
//!
//! CAN framing and Fast Packet reassembly stay inside the bus driver.
pub mod outbox;
pub mod traits;
