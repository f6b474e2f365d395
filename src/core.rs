//! Message container shared by every layer of the crate.
//!
//! `N2kMsg` is a whole NMEA 2000 message as the application sees it, after the
//! transport has reassembled any Fast Packet sequence: PGN, priority, addressing,
//! and up to [`MAX_N2K_MSG_LEN`] payload bytes.
use crate::error::MsgError;

/// Maximum payload of a reassembled message (Fast Packet limit).
pub const MAX_N2K_MSG_LEN: usize = 223;

/// Global destination address.
pub const BROADCAST_ADDRESS: u8 = 0xFF;

/// N2K "data not available" marker for single-byte fields.
pub const N2K_NA_U8: u8 = 0xFF;

/// Returns `true` when `address` targets every node on the bus.
#[inline]
pub const fn is_broadcast(address: u8) -> bool {
    address == BROADCAST_ADDRESS
}

//==================================================================================N2K_MSG
/// A complete NMEA 2000 message with a fixed-capacity payload.
///
/// Appends and reads are bounds-checked; multi-byte values are little endian,
/// as everywhere on the bus.
#[derive(Clone, PartialEq, Eq)]
pub struct N2kMsg {
    /// Parameter Group Number.
    pub pgn: u32,
    /// Priority (3 bits, 0 = highest).
    pub priority: u8,
    /// Source address. Filled by the sending service for outbound messages.
    pub source: u8,
    /// Destination address, [`BROADCAST_ADDRESS`] for global messages.
    pub destination: u8,
    len: usize,
    data: [u8; MAX_N2K_MSG_LEN],
}

impl Default for N2kMsg {
    fn default() -> Self {
        Self::new(0, 6, BROADCAST_ADDRESS)
    }
}

impl core::fmt::Debug for N2kMsg {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("N2kMsg")
            .field("pgn", &self.pgn)
            .field("priority", &self.priority)
            .field("source", &self.source)
            .field("destination", &self.destination)
            .field("data", &self.data())
            .finish()
    }
}

impl N2kMsg {
    /// Create an empty message.
    pub const fn new(pgn: u32, priority: u8, destination: u8) -> Self {
        Self {
            pgn,
            priority: priority & 0x07,
            source: BROADCAST_ADDRESS,
            destination,
            len: 0,
            data: [0; MAX_N2K_MSG_LEN],
        }
    }

    /// Build a message from an already received payload.
    pub fn from_payload(
        pgn: u32,
        source: u8,
        destination: u8,
        payload: &[u8],
    ) -> Result<Self, MsgError> {
        if payload.len() > MAX_N2K_MSG_LEN {
            return Err(MsgError::BufferFull {
                capacity: MAX_N2K_MSG_LEN,
            });
        }
        let mut msg = Self::new(pgn, 6, destination);
        msg.source = source;
        msg.data[..payload.len()].copy_from_slice(payload);
        msg.len = payload.len();
        Ok(msg)
    }

    /// Drop the payload and re-target the message.
    pub fn reset(&mut self, pgn: u32, priority: u8, destination: u8) {
        self.pgn = pgn;
        self.priority = priority & 0x07;
        self.destination = destination;
        self.len = 0;
    }

    /// Populated payload bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data[..self.len]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Mutable access to an already written byte.
    pub fn byte_mut(&mut self, index: usize) -> Result<&mut u8, MsgError> {
        let len = self.len;
        self.data[..len]
            .get_mut(index)
            .ok_or(MsgError::OutOfBounds { index, len })
    }

    //==============================================================================WRITE
    fn add_bytes(&mut self, bytes: &[u8]) -> Result<(), MsgError> {
        let end = self.len + bytes.len();
        if end > MAX_N2K_MSG_LEN {
            return Err(MsgError::BufferFull {
                capacity: MAX_N2K_MSG_LEN,
            });
        }
        self.data[self.len..end].copy_from_slice(bytes);
        self.len = end;
        Ok(())
    }

    pub fn add_u8(&mut self, value: u8) -> Result<(), MsgError> {
        self.add_bytes(&[value])
    }

    pub fn add_u16(&mut self, value: u16) -> Result<(), MsgError> {
        self.add_bytes(&value.to_le_bytes())
    }

    /// Append the lower 24 bits of `value` (PGN fields).
    pub fn add_u24(&mut self, value: u32) -> Result<(), MsgError> {
        self.add_bytes(&value.to_le_bytes()[..3])
    }

    pub fn add_u32(&mut self, value: u32) -> Result<(), MsgError> {
        self.add_bytes(&value.to_le_bytes())
    }

    pub fn add_u64(&mut self, value: u64) -> Result<(), MsgError> {
        self.add_bytes(&value.to_le_bytes())
    }

    //==============================================================================READ
    /// Copy `N` bytes starting at `*index` and advance the index.
    fn read_array<const N: usize>(&self, index: &mut usize) -> Result<[u8; N], MsgError> {
        let end = *index + N;
        if end > self.len {
            return Err(MsgError::OutOfBounds {
                index: *index,
                len: self.len,
            });
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[*index..end]);
        *index = end;
        Ok(out)
    }

    pub fn read_u8(&self, index: &mut usize) -> Result<u8, MsgError> {
        self.read_array::<1>(index).map(|b| b[0])
    }

    pub fn read_u16(&self, index: &mut usize) -> Result<u16, MsgError> {
        self.read_array(index).map(u16::from_le_bytes)
    }

    pub fn read_u24(&self, index: &mut usize) -> Result<u32, MsgError> {
        self.read_array::<3>(index)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], 0]))
    }

    pub fn read_u32(&self, index: &mut usize) -> Result<u32, MsgError> {
        self.read_array(index).map(u32::from_le_bytes)
    }

    pub fn read_u64(&self, index: &mut usize) -> Result<u64, MsgError> {
        self.read_array(index).map(u64::from_le_bytes)
    }
}

//==================================================================================TESTS
#[cfg(test)]
#[path = "core_tests.rs"]
mod tests;
