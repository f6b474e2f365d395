//! Synchronous outbound sink used by the message handlers.
//!
//! Handlers run to completion without awaiting: they hand every reply to a
//! `MsgSender` and return. The async service later drains whatever the sender
//! buffered (see [`Outbox`](crate::protocol::transport::outbox::Outbox)).
use crate::core::N2kMsg;

/// Accepts a finished outbound message for device `device`.
pub trait MsgSender {
    type Error: core::fmt::Debug;
    fn send_msg(&mut self, msg: &N2kMsg, device: usize) -> Result<(), Self::Error>;
}

impl<S: MsgSender + ?Sized> MsgSender for &mut S {
    type Error = S::Error;

    fn send_msg(&mut self, msg: &N2kMsg, device: usize) -> Result<(), Self::Error> {
        (**self).send_msg(msg, device)
    }
}
