//! Bounded queue of outbound messages between the synchronous handlers and
//! the async bus writer.
//!
//! The queue lives inside the service task; cross-task traffic goes through the
//! command/event channels of the service.
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};

use crate::core::N2kMsg;
use crate::error::OutboxError;
use crate::protocol::transport::traits::msg_sender::MsgSender;

/// A queued message and the device it is sent from.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub device: usize,
    pub msg: N2kMsg,
}

/// Fixed-capacity outbound queue implementing [`MsgSender`].
pub struct Outbox<const N: usize> {
    channel: Channel<CriticalSectionRawMutex, Outbound, N>,
}

impl<const N: usize> Default for Outbox<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Outbox<N> {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Oldest queued message, if any.
    pub fn pop(&self) -> Option<Outbound> {
        self.channel.try_receive().ok()
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    /// Drop every queued message.
    pub fn clear(&self) {
        self.channel.clear();
    }
}

impl<const N: usize> MsgSender for Outbox<N> {
    type Error = OutboxError;

    fn send_msg(&mut self, msg: &N2kMsg, device: usize) -> Result<(), Self::Error> {
        self.channel
            .try_send(Outbound {
                device,
                msg: msg.clone(),
            })
            .map_err(|_| OutboxError::Full)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// Messages come out in queue order and overflow is reported.
    fn test_outbox_fifo_and_full() {
        let mut outbox: Outbox<2> = Outbox::new();
        let first = N2kMsg::new(1, 6, 0xFF);
        let second = N2kMsg::new(2, 6, 0xFF);

        outbox.send_msg(&first, 0).unwrap();
        outbox.send_msg(&second, 1).unwrap();
        assert_eq!(outbox.send_msg(&first, 0), Err(OutboxError::Full));
        assert_eq!(outbox.len(), 2);

        let out = outbox.pop().unwrap();
        assert_eq!((out.device, out.msg.pgn), (0, 1));
        let out = outbox.pop().unwrap();
        assert_eq!((out.device, out.msg.pgn), (1, 2));
        assert!(outbox.pop().is_none());
        assert!(outbox.is_empty());
    }
}
