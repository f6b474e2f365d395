//! Minimal abstraction for an asynchronous NMEA 2000 message bus. The driver
//! behind it owns CAN framing, Fast Packet reassembly and address claiming;
//! the library only sees whole messages.
use crate::core::N2kMsg;
use futures_util::Future;

/// Contract to send and receive complete messages asynchronously.
pub trait N2kBus {
    type Error: core::fmt::Debug;
    /// Emit a message on the bus. `msg.source` is already set by the caller.
    fn send<'a>(
        &'a mut self,
        msg: &'a N2kMsg,
    ) -> impl Future<Output = Result<(), Self::Error>> + 'a;
    /// Retrieve the next available message. Asynchronously waits until data arrives.
    fn recv<'a>(
        &'a mut self,
    ) -> impl core::future::Future<Output = Result<N2kMsg, Self::Error>> + 'a;
}
