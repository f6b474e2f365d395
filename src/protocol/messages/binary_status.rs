//! Bit-packed binary switch bank status (PGN 127501) and switch bank control
//! (PGN 127502).
//!
//! # Payload layout (Little Endian order)
//!
//! ```text
//! Bits  0-7   ( 8 bits) : Bank instance
//! Bits  8-9   ( 2 bits) : Indicator 1
//! Bits 10-11  ( 2 bits) : Indicator 2
//! ...
//! Bits 62-63  ( 2 bits) : Indicator 28
//! ```
//!
//! Both PGNs share this layout. In a control message an indicator set to
//! [`OnOff::Unavailable`] means "leave unchanged".
use crate::core::{N2kMsg, BROADCAST_ADDRESS};
use crate::error::MsgError;
use crate::protocol::messages::{PGN_BINARY_STATUS, PGN_SWITCH_BANK_CONTROL};

/// Number of indicators in one bank.
pub const ITEMS_PER_BANK: u8 = 28;

/// Two-bit indicator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum OnOff {
    Off = 0,
    On = 1,
    Error = 2,
    Unavailable = 3,
}

impl From<u8> for OnOff {
    fn from(bits: u8) -> Self {
        match bits & 0x03 {
            0 => OnOff::Off,
            1 => OnOff::On,
            2 => OnOff::Error,
            _ => OnOff::Unavailable,
        }
    }
}

impl From<bool> for OnOff {
    fn from(on: bool) -> Self {
        if on {
            OnOff::On
        } else {
            OnOff::Off
        }
    }
}

/// Status word of one bank: indicator `n` (1-based) occupies bits `2(n-1)..2(n-1)+2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BinaryStatus(u64);

impl Default for BinaryStatus {
    fn default() -> Self {
        Self::unavailable()
    }
}

impl BinaryStatus {
    /// Every indicator unavailable.
    #[inline]
    pub const fn unavailable() -> Self {
        Self(u64::MAX)
    }

    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(&self) -> u64 {
        self.0
    }

    /// State of indicator `item` (1..=28), `None` outside the bank.
    pub fn item(&self, item: u8) -> Option<OnOff> {
        if !(1..=ITEMS_PER_BANK).contains(&item) {
            return None;
        }
        let shift = 2 * (item as u32 - 1);
        Some(OnOff::from((self.0 >> shift) as u8))
    }

    /// Set indicator `item` (1..=28). Returns `false` when `item` is outside the bank.
    pub fn set_item(&mut self, item: u8, state: OnOff) -> bool {
        if !(1..=ITEMS_PER_BANK).contains(&item) {
            return false;
        }
        let shift = 2 * (item as u32 - 1);
        self.0 = (self.0 & !(0x03u64 << shift)) | ((state as u64) << shift);
        true
    }

    /// Iterate `(item, state)` over the 28 indicators.
    pub fn items(&self) -> impl Iterator<Item = (u8, OnOff)> + '_ {
        (1..=ITEMS_PER_BANK).filter_map(move |n| self.item(n).map(|s| (n, s)))
    }
}

//==================================================================================CODEC
/// Fill `msg` with a Binary Switch Bank Status (PGN 127501) for `instance`.
pub fn set_binary_status(
    msg: &mut N2kMsg,
    instance: u8,
    status: BinaryStatus,
) -> Result<(), MsgError> {
    msg.reset(PGN_BINARY_STATUS, 3, BROADCAST_ADDRESS);
    msg.add_u64((status.raw() << 8) | instance as u64)
}

/// Fill `msg` with a Switch Bank Control (PGN 127502) for `instance`.
pub fn set_switch_bank_control(
    msg: &mut N2kMsg,
    instance: u8,
    status: BinaryStatus,
) -> Result<(), MsgError> {
    msg.reset(PGN_SWITCH_BANK_CONTROL, 3, BROADCAST_ADDRESS);
    msg.add_u64((status.raw() << 8) | instance as u64)
}

fn parse_bank_word(msg: &N2kMsg) -> Result<(u8, BinaryStatus), MsgError> {
    let mut index = 0;
    let word = msg.read_u64(&mut index)?;
    // The 8 bits shifted out by the instance byte read back as "unavailable".
    Ok((word as u8, BinaryStatus((word >> 8) | (0xFF << 56))))
}

/// Decode a Binary Switch Bank Status (PGN 127501) payload.
pub fn parse_binary_status(msg: &N2kMsg) -> Result<(u8, BinaryStatus), MsgError> {
    parse_bank_word(msg)
}

/// Decode a Switch Bank Control (PGN 127502) payload.
pub fn parse_switch_bank_control(msg: &N2kMsg) -> Result<(u8, BinaryStatus), MsgError> {
    parse_bank_word(msg)
}

//==================================================================================TESTS
#[cfg(test)]
#[path = "binary_status_tests.rs"]
mod tests;
