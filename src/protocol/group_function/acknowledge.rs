//! Builders for the two group-function answers: Acknowledge (function code 2)
//! and Write Fields Reply (function code 6), plus a read-only view used to
//! inspect a received acknowledgement.
//!
//! # Acknowledge layout
//!
//! ```text
//! Byte 0      : 2 (Acknowledge)
//! Bytes 1-3   : PGN being acknowledged (24-bit LE)
//! Byte 4      : PGN error code (low nibble) | transmission error code (high nibble)
//! Byte 5      : number of parameter codes
//! Bytes 6-    : parameter codes, two per byte, low nibble first
//! ```
//!
//! An unused high nibble is left at `0xF`.
use crate::core::N2kMsg;
use crate::error::MsgError;
use crate::protocol::group_function::{
    FieldsHeader, GroupFunctionCode, ParameterErrorCode, PgnErrorCode, TransmissionErrorCode,
};
use crate::protocol::messages::PGN_GROUP_FUNCTION;

const ACK_PRIORITY: u8 = 3;
const ACK_CODES_INDEX: usize = 4;
const ACK_PARAMETERS_INDEX: usize = 6;

//==================================================================================ACKNOWLEDGEMENT
/// Acknowledgement under construction.
///
/// The PGN and transmission codes can change until [`finish`](Self::finish);
/// parameter codes are appended in pair order.
#[derive(Debug, Clone)]
pub struct Acknowledgement {
    msg: N2kMsg,
    pgn_code: PgnErrorCode,
    transmission_code: TransmissionErrorCode,
    expected: u8,
    added: u8,
}

impl Acknowledgement {
    /// Start an acknowledgement for `pgn`, addressed to `destination`, announcing
    /// `count` parameter codes.
    pub fn start(
        destination: u8,
        pgn: u32,
        pgn_code: PgnErrorCode,
        transmission_code: TransmissionErrorCode,
        count: u8,
    ) -> Result<Self, MsgError> {
        let mut msg = N2kMsg::new(PGN_GROUP_FUNCTION, ACK_PRIORITY, destination);
        msg.add_u8(GroupFunctionCode::Acknowledge as u8)?;
        msg.add_u24(pgn)?;
        msg.add_u8(0xFF)?;
        msg.add_u8(count)?;
        Ok(Self {
            msg,
            pgn_code,
            transmission_code,
            expected: count,
            added: 0,
        })
    }

    /// Append the code of the next pair. Codes past the announced count are ignored.
    pub fn add_parameter(&mut self, code: ParameterErrorCode) -> Result<(), MsgError> {
        if self.added >= self.expected {
            return Ok(());
        }
        let nibble = code as u8 & 0x0F;
        if self.added % 2 == 0 {
            self.msg.add_u8(0xF0 | nibble)?;
        } else {
            let index = ACK_PARAMETERS_INDEX + (self.added / 2) as usize;
            let byte = self.msg.byte_mut(index)?;
            *byte = (*byte & 0x0F) | (nibble << 4);
        }
        self.added += 1;
        Ok(())
    }

    pub fn set_pgn_code(&mut self, code: PgnErrorCode) {
        self.pgn_code = code;
    }

    pub fn set_transmission_code(&mut self, code: TransmissionErrorCode) {
        self.transmission_code = code;
    }

    pub fn pgn_code(&self) -> PgnErrorCode {
        self.pgn_code
    }

    pub fn transmission_code(&self) -> TransmissionErrorCode {
        self.transmission_code
    }

    /// Number of parameter codes appended so far.
    pub fn parameters_added(&self) -> u8 {
        self.added
    }

    /// Complete the message. Missing parameter codes are filled with
    /// [`ParameterErrorCode::TemporarilyUnableToComply`] so the payload matches
    /// the announced count.
    pub fn finish(mut self) -> Result<N2kMsg, MsgError> {
        while self.added < self.expected {
            self.add_parameter(ParameterErrorCode::TemporarilyUnableToComply)?;
        }
        *self.msg.byte_mut(ACK_CODES_INDEX)? =
            (self.pgn_code as u8 & 0x0F) | ((self.transmission_code as u8 & 0x0F) << 4);
        Ok(self.msg)
    }
}

//==================================================================================ACK_VIEW
/// Read-only view over a received acknowledgement.
#[derive(Debug, Clone, Copy)]
pub struct AcknowledgementView<'a> {
    msg: &'a N2kMsg,
}

impl<'a> AcknowledgementView<'a> {
    /// Wrap `msg` if it is a 126208 acknowledgement with a complete header.
    pub fn parse(msg: &'a N2kMsg) -> Option<Self> {
        let data = msg.data();
        let is_ack = msg.pgn == PGN_GROUP_FUNCTION
            && data.len() >= ACK_PARAMETERS_INDEX
            && data[0] == GroupFunctionCode::Acknowledge as u8;
        is_ack.then_some(Self { msg })
    }

    /// PGN being acknowledged.
    pub fn pgn(&self) -> u32 {
        let mut index = 1;
        self.msg.read_u24(&mut index).unwrap_or(0)
    }

    /// PGN-level code nibble.
    pub fn pgn_code(&self) -> u8 {
        self.msg.data()[ACK_CODES_INDEX] & 0x0F
    }

    /// Transmission-level code nibble.
    pub fn transmission_code(&self) -> u8 {
        self.msg.data()[ACK_CODES_INDEX] >> 4
    }

    /// Announced number of parameter codes.
    pub fn parameter_count(&self) -> u8 {
        self.msg.data()[ACK_PARAMETERS_INDEX - 1]
    }

    /// Code of pair `index`, `None` past the announced count or the payload.
    pub fn parameter_code(&self, index: u8) -> Option<u8> {
        if index >= self.parameter_count() {
            return None;
        }
        let byte = *self
            .msg
            .data()
            .get(ACK_PARAMETERS_INDEX + (index / 2) as usize)?;
        Some(if index % 2 == 0 { byte & 0x0F } else { byte >> 4 })
    }
}

//==================================================================================WRITE_REPLY
/// Write Fields Reply under construction: header mirrored from the request,
/// then the echoed field pairs.
///
/// A reply that outgrows the payload is marked overflowed instead of failing,
/// so the caller can still answer with an acknowledgement.
#[derive(Debug, Clone)]
pub struct WriteReply {
    msg: N2kMsg,
    overflowed: bool,
}

impl WriteReply {
    /// Start a reply to a Write Fields request described by `header`.
    pub fn start(destination: u8, pgn: u32, header: &FieldsHeader) -> Result<Self, MsgError> {
        let mut msg = N2kMsg::new(PGN_GROUP_FUNCTION, ACK_PRIORITY, destination);
        msg.add_u8(GroupFunctionCode::WriteFieldsReply as u8)?;
        msg.add_u24(pgn)?;
        if header.proprietary {
            // Reserved bits 11-12 are sent as ones.
            msg.add_u16(
                (header.manufacturer_code & 0x07FF)
                    | (0x03 << 11)
                    | (((header.industry_group & 0x07) as u16) << 13),
            )?;
        }
        msg.add_u8(header.unique_id)?;
        msg.add_u8(header.selection_pairs)?;
        msg.add_u8(header.parameter_pairs)?;
        Ok(Self {
            msg,
            overflowed: false,
        })
    }

    /// Append one echoed byte (field identifier or value).
    pub fn push(&mut self, byte: u8) {
        if self.overflowed {
            return;
        }
        if self.msg.add_u8(byte).is_err() {
            self.overflowed = true;
        }
    }

    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// The finished reply, `None` when the echoed pairs did not fit.
    pub fn finish(self) -> Option<N2kMsg> {
        (!self.overflowed).then_some(self.msg)
    }
}

//==================================================================================TESTS
#[cfg(test)]
#[path = "acknowledge_tests.rs"]
mod tests;
