//! NMEA 2000 group function (PGN 126208): header decoding, error-code taxonomy,
//! field-pair cursor, and the generic "not supported" answers.
//!
//! # Header layouts
//!
//! ```text
//! Request        : [0, pgn(3), interval u32, offset u16, n_pairs, pairs…]
//! Command        : [1, pgn(3), priority setting, n_pairs, pairs…]
//! Acknowledge    : [2, pgn(3), pgn_code | tx_code << 4, n_pairs, codes…]
//! Read fields    : [3, pgn(3), (mfr/industry u16), unique id, n_sel, n_par, pairs…]
//! Write fields   : [5, pgn(3), (mfr/industry u16), unique id, n_sel, n_par, pairs…]
//! ```
//!
//! The manufacturer/industry word is present only for proprietary PGNs.
//! A pair is a field identifier followed by a value whose width depends on the
//! field, which is why a list cannot be decoded past an unknown identifier.
use crate::core::{is_broadcast, N2kMsg, N2K_NA_U8};
use crate::error::{GroupFunctionError, HandleError};
use crate::protocol::messages::{is_proprietary_pgn, PGN_GROUP_FUNCTION};
use crate::protocol::transport::traits::msg_sender::MsgSender;

pub mod acknowledge;
pub mod binary_status;

use acknowledge::Acknowledgement;

/// Transmission interval meaning "leave unchanged".
pub const TRANSMISSION_INTERVAL_UNCHANGED: u32 = 0xFFFF_FFFF;
/// Transmission interval meaning "restore the default".
pub const TRANSMISSION_INTERVAL_RESTORE_DEFAULT: u32 = 0xFFFF_FFFE;
/// Transmission offset meaning "leave unchanged".
pub const TRANSMISSION_OFFSET_UNCHANGED: u16 = 0xFFFF;
/// Command priority setting meaning "leave unchanged".
pub const PRIORITY_SETTING_UNCHANGED: u8 = 0x08;

const REQUEST_PAIRS_OFFSET: usize = 11;
const FIELDS_PAIRS_OFFSET: usize = 7;
const PROPRIETARY_HEADER_LEN: usize = 2;

//==================================================================================CODES
/// Function code carried in byte 0 of a 126208 message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum GroupFunctionCode {
    Request = 0,
    Command = 1,
    Acknowledge = 2,
    ReadFields = 3,
    ReadFieldsReply = 4,
    WriteFields = 5,
    WriteFieldsReply = 6,
}

impl TryFrom<u8> for GroupFunctionCode {
    type Error = GroupFunctionError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => Self::Request,
            1 => Self::Command,
            2 => Self::Acknowledge,
            3 => Self::ReadFields,
            4 => Self::ReadFieldsReply,
            5 => Self::WriteFields,
            6 => Self::WriteFieldsReply,
            code => return Err(GroupFunctionError::UnknownFunctionCode { code }),
        })
    }
}

/// Whether the addressed PGN can be serviced at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PgnErrorCode {
    Acknowledge = 0,
    PgnNotSupported = 1,
    PgnTemporarilyNotAvailable = 2,
    AccessDenied = 3,
    RequestOrCommandNotSupported = 4,
    DefinerTagNotSupported = 5,
    ReadOrWriteNotSupported = 6,
}

/// Whether the requested interval or priority change can be serviced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum TransmissionErrorCode {
    Acknowledge = 0,
    TransmitIntervalOrPriorityNotSupported = 1,
    TransmitIntervalLessThanMeasurementInterval = 2,
    AccessDenied = 3,
    RequestNotSupported = 4,
}

impl TransmissionErrorCode {
    /// Code for a request carrying `interval`/`offset`: only "leave unchanged"
    /// is serviceable without help from the target.
    pub fn for_request(interval: u32, offset: u16) -> Self {
        if interval == TRANSMISSION_INTERVAL_UNCHANGED && offset == TRANSMISSION_OFFSET_UNCHANGED {
            Self::Acknowledge
        } else {
            Self::TransmitIntervalOrPriorityNotSupported
        }
    }

    /// Code for a command carrying `priority_setting`.
    pub fn for_command(priority_setting: u8) -> Self {
        if priority_setting & 0x0F == PRIORITY_SETTING_UNCHANGED {
            Self::Acknowledge
        } else {
            Self::TransmitIntervalOrPriorityNotSupported
        }
    }
}

/// Outcome for one field pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ParameterErrorCode {
    Acknowledge = 0,
    InvalidRequestOrCommandParameterField = 1,
    TemporarilyUnableToComply = 2,
    RequestOrCommandParameterOutOfRange = 3,
    AccessDenied = 4,
    RequestOrCommandNotSupported = 5,
    ReadOrWriteIsNotSupported = 6,
}

//==================================================================================HEADER
/// Fixed part of a Read Fields / Write Fields message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FieldsHeader {
    /// 11-bit manufacturer code, `0xFFFF` for non-proprietary PGNs.
    pub manufacturer_code: u16,
    /// 3-bit industry group, `0xFF` for non-proprietary PGNs.
    pub industry_group: u8,
    pub unique_id: u8,
    pub selection_pairs: u8,
    pub parameter_pairs: u8,
    /// Whether the manufacturer/industry word is present on the wire.
    pub proprietary: bool,
}

/// Decoded 126208 header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GroupFunction {
    Request {
        pgn: u32,
        transmission_interval: u32,
        transmission_offset: u16,
        pairs: u8,
    },
    Command {
        pgn: u32,
        priority_setting: u8,
        pairs: u8,
    },
    Acknowledge {
        pgn: u32,
    },
    ReadFields {
        pgn: u32,
        header: FieldsHeader,
    },
    ReadFieldsReply {
        pgn: u32,
    },
    WriteFields {
        pgn: u32,
        header: FieldsHeader,
    },
    WriteFieldsReply {
        pgn: u32,
    },
}

impl GroupFunction {
    /// Decode the header of a group function message.
    pub fn parse(msg: &N2kMsg) -> Result<Self, GroupFunctionError> {
        if msg.pgn != PGN_GROUP_FUNCTION {
            return Err(GroupFunctionError::NotGroupFunction { pgn: msg.pgn });
        }
        let mut index = 0;
        let code = GroupFunctionCode::try_from(msg.read_u8(&mut index)?)?;
        let pgn = msg.read_u24(&mut index)?;

        Ok(match code {
            GroupFunctionCode::Request => Self::Request {
                pgn,
                transmission_interval: msg.read_u32(&mut index)?,
                transmission_offset: msg.read_u16(&mut index)?,
                pairs: msg.read_u8(&mut index)?,
            },
            GroupFunctionCode::Command => Self::Command {
                pgn,
                priority_setting: msg.read_u8(&mut index)?,
                pairs: msg.read_u8(&mut index)?,
            },
            GroupFunctionCode::Acknowledge => Self::Acknowledge { pgn },
            GroupFunctionCode::ReadFields => Self::ReadFields {
                pgn,
                header: parse_fields_header(msg, pgn, &mut index)?,
            },
            GroupFunctionCode::ReadFieldsReply => Self::ReadFieldsReply { pgn },
            GroupFunctionCode::WriteFields => Self::WriteFields {
                pgn,
                header: parse_fields_header(msg, pgn, &mut index)?,
            },
            GroupFunctionCode::WriteFieldsReply => Self::WriteFieldsReply { pgn },
        })
    }

    /// PGN the group function is about.
    pub fn pgn(&self) -> u32 {
        match *self {
            Self::Request { pgn, .. }
            | Self::Command { pgn, .. }
            | Self::Acknowledge { pgn }
            | Self::ReadFields { pgn, .. }
            | Self::ReadFieldsReply { pgn }
            | Self::WriteFields { pgn, .. }
            | Self::WriteFieldsReply { pgn } => pgn,
        }
    }
}

fn parse_fields_header(
    msg: &N2kMsg,
    pgn: u32,
    index: &mut usize,
) -> Result<FieldsHeader, GroupFunctionError> {
    let proprietary = is_proprietary_pgn(pgn);
    let (manufacturer_code, industry_group) = if proprietary {
        let word = msg.read_u16(index)?;
        (word & 0x07FF, ((word >> 13) & 0x07) as u8)
    } else {
        (0xFFFF, 0xFF)
    };
    Ok(FieldsHeader {
        manufacturer_code,
        industry_group,
        unique_id: msg.read_u8(index)?,
        selection_pairs: msg.read_u8(index)?,
        parameter_pairs: msg.read_u8(index)?,
        proprietary,
    })
}

//==================================================================================PAIR_CURSOR
/// Read cursor over the field-pair list of a group function message.
///
/// The pair count announced in the header is trusted: reading past the payload
/// yields the N/A marker `0xFF` instead of failing.
pub struct PairCursor<'a> {
    msg: &'a N2kMsg,
    index: usize,
}

impl<'a> PairCursor<'a> {
    /// Cursor on the pairs of a Request.
    pub fn for_request(msg: &'a N2kMsg) -> Self {
        Self {
            msg,
            index: REQUEST_PAIRS_OFFSET,
        }
    }

    /// Cursor on the selection pairs of Read/Write Fields (parameter pairs follow).
    pub fn for_fields(msg: &'a N2kMsg, proprietary: bool) -> Self {
        let extra = if proprietary { PROPRIETARY_HEADER_LEN } else { 0 };
        Self {
            msg,
            index: FIELDS_PAIRS_OFFSET + extra,
        }
    }

    /// Byte at the cursor, then advance.
    pub fn next_byte(&mut self) -> u8 {
        self.msg.read_u8(&mut self.index).unwrap_or(N2K_NA_U8)
    }
}

//==================================================================================DEFAULT_ANSWERS
/// Acknowledge a group function that the target cannot service.
///
/// Every pair gets `parameter_code`. Broadcast requests and response-type
/// functions are never answered.
pub fn acknowledge_unsupported<S: MsgSender>(
    function: &GroupFunction,
    request: &N2kMsg,
    pgn_code: PgnErrorCode,
    parameter_code: ParameterErrorCode,
    device: usize,
    sender: &mut S,
) -> Result<(), HandleError<S::Error>> {
    if is_broadcast(request.destination) {
        return Ok(());
    }
    let (tx_code, pairs) = match *function {
        GroupFunction::Request {
            transmission_interval,
            transmission_offset,
            pairs,
            ..
        } => (
            TransmissionErrorCode::for_request(transmission_interval, transmission_offset),
            pairs,
        ),
        GroupFunction::Command {
            priority_setting,
            pairs,
            ..
        } => (TransmissionErrorCode::for_command(priority_setting), pairs),
        GroupFunction::ReadFields { header, .. } | GroupFunction::WriteFields { header, .. } => {
            (TransmissionErrorCode::Acknowledge, header.selection_pairs)
        }
        GroupFunction::Acknowledge { .. }
        | GroupFunction::ReadFieldsReply { .. }
        | GroupFunction::WriteFieldsReply { .. } => return Ok(()),
    };

    let mut ack = Acknowledgement::start(request.source, function.pgn(), pgn_code, tx_code, pairs)?;
    for _ in 0..pairs {
        ack.add_parameter(parameter_code)?;
    }
    sender
        .send_msg(&ack.finish()?, device)
        .map_err(HandleError::Send)
}

/// Answer a group function addressed to a PGN this node does not implement.
pub fn send_pgn_not_supported<S: MsgSender>(
    function: &GroupFunction,
    request: &N2kMsg,
    device: usize,
    sender: &mut S,
) -> Result<(), HandleError<S::Error>> {
    #[cfg(feature = "defmt")]
    defmt::debug!(
        "Group function for unsupported PGN {} from {}",
        function.pgn(),
        request.source
    );
    acknowledge_unsupported(
        function,
        request,
        PgnErrorCode::PgnNotSupported,
        ParameterErrorCode::Acknowledge,
        device,
        sender,
    )
}
