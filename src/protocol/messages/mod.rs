//! PGNs handled by the switch bank node and their payload codecs.
pub mod binary_status;

use crate::core::N2kMsg;
use crate::error::MsgError;

/// ISO Request.
pub const PGN_ISO_REQUEST: u32 = 59904;
/// Group function (request, command, acknowledge, read/write fields).
pub const PGN_GROUP_FUNCTION: u32 = 126208;
/// Binary Switch Bank Status.
pub const PGN_BINARY_STATUS: u32 = 127501;
/// Switch Bank Control.
pub const PGN_SWITCH_BANK_CONTROL: u32 = 127502;

/// Whether `pgn` falls in one of the proprietary ranges (manufacturer-defined content).
pub const fn is_proprietary_pgn(pgn: u32) -> bool {
    matches!(pgn, 61184 | 126720 | 65280..=65535 | 130816..=131071)
}

/// Extract the PGN requested by an ISO Request (PGN 59904) payload.
pub fn parse_iso_request(msg: &N2kMsg) -> Result<u32, MsgError> {
    let mut index = 0;
    msg.read_u24(&mut index)
}
