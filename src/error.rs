//! Error definitions shared across library modules.
//! Group-function decode problems never surface here: they are answered on the
//! bus with acknowledgement codes. These types cover what cannot be answered
//! (a header that cannot be read, a message that cannot be built or sent).
use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Bounds violations on an `N2kMsg` payload.
pub enum MsgError {
    /// Appending would exceed the message capacity.
    #[error("Message buffer full (capacity {capacity})")]
    BufferFull { capacity: usize },
    /// Read or access beyond the populated payload.
    #[error("Attempted to access out of bounds -> index: {index}, len: {len}")]
    OutOfBounds { index: usize, len: usize },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Failures while decoding a PGN 126208 header.
pub enum GroupFunctionError {
    /// The message does not carry PGN 126208.
    #[error("Not a group function message: {pgn}")]
    NotGroupFunction { pgn: u32 },
    /// The function code byte is outside the defined range.
    #[error("Unknown group function code {code}")]
    UnknownFunctionCode { code: u8 },
    /// The header is shorter than its function code requires.
    #[error("Truncated group function header: {0}")]
    Truncated(#[from] MsgError),
}

//==================================================================================HANDLE_ERROR
#[derive(Error, Debug)]
/// Errors raised while answering an inbound message.
pub enum HandleError<E: core::fmt::Debug> {
    /// An outbound message did not fit its buffer.
    #[error("Reply build failed: {0}")]
    Build(#[from] MsgError),
    /// The sender refused an outbound message.
    #[error("Send failed: {0:?}")]
    Send(E),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// The outbound queue has no room left.
pub enum OutboxError {
    #[error("Outbox full")]
    Full,
}

//==================================================================================SERVICE_ERROR
#[derive(Error, Debug)]
/// Errors that stop the switch bank service loop.
pub enum ServiceError<E: core::fmt::Debug> {
    /// The bus failed while waiting for inbound traffic.
    #[error("Bus receive error: {0:?}")]
    Receive(E),
    /// The bus refused an outbound message.
    #[error("Bus send error: {0:?}")]
    Send(E),
    /// A reply could not be built or queued.
    #[error("Handler error: {0}")]
    Handle(#[from] HandleError<OutboxError>),
}

//==================================================================================CONFIG_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Rejected switch bank configuration.
pub enum ConfigError {
    /// `0xFF` is reserved for "no instance".
    #[error("Bank instance {instance} is reserved")]
    ReservedInstance { instance: u8 },
    /// Two banks share an instance.
    #[error("Bank instance {instance} used twice")]
    DuplicateInstance { instance: u8 },
    /// More banks than one status burst can queue.
    #[error("Too many banks: {count} (max {max})")]
    TooManyBanks { count: usize, max: usize },
}
