//! Group function handler for Binary Switch Bank Status (PGN 127501).
//!
//! The only selectable field is the bank instance (field 1). A Request picks a
//! bank (or all banks when no instance is given) and triggers status messages;
//! a Write Fields can move a bank to a new instance number. Every other field
//! identifier is refused with the appropriate parameter code.
//!
//! # Pair scan
//!
//! Pairs are decoded left to right. The first instance selector is recorded
//! and checked with [`BinaryStatusTarget::has_instance`]; any further instance
//! selector is out of range. An unknown field stops the scan because its value
//! width is unknown, and every remaining pair is answered with
//! [`ParameterErrorCode::TemporarilyUnableToComply`].
use crate::core::{is_broadcast, N2kMsg, N2K_NA_U8};
use crate::error::HandleError;
use crate::protocol::group_function::acknowledge::{Acknowledgement, WriteReply};
use crate::protocol::group_function::{
    acknowledge_unsupported, FieldsHeader, GroupFunction, PairCursor, ParameterErrorCode,
    PgnErrorCode, TransmissionErrorCode,
};
use crate::protocol::messages::PGN_BINARY_STATUS;
use crate::protocol::transport::traits::msg_sender::MsgSender;

/// Instance value meaning "no instance selected".
pub const INSTANCE_UNSET: u8 = 0xFF;
/// Field identifier of the bank instance in PGN 127501.
pub const FIELD_INSTANCE: u8 = 1;
/// Field identifiers `1..FIELD_LIMIT` are defined for PGN 127501 (instance and 28 indicators).
const FIELD_LIMIT: u8 = 30;

/// Whether `field` is a defined 127501 field (one value byte follows it).
fn is_defined_field(field: u8) -> bool {
    field > 0 && field < FIELD_LIMIT
}

//==================================================================================TARGET
/// Device-side callbacks the handler relies on.
pub trait BinaryStatusTarget {
    /// Whether a bank with `instance` exists.
    fn has_instance(&self, instance: u8) -> bool;

    /// Fill `msg` with the status of a bank.
    ///
    /// With `advance == false`, `*instance` names the bank to report. With
    /// `advance == true`, the bank following `*instance` is reported (the
    /// first one when `*instance` is [`INSTANCE_UNSET`]) and `*instance` is
    /// updated to it. Returns `false` when nothing was produced; when
    /// advancing, `*instance` is then reset to [`INSTANCE_UNSET`].
    fn next_status_message(&mut self, instance: &mut u8, msg: &mut N2kMsg, advance: bool) -> bool;

    /// Whether status can be produced right now.
    fn provides_status(&self) -> bool {
        true
    }

    /// Move bank `old` to instance `new`. Returns `true` on success.
    fn change_instance(&mut self, _old: u8, _new: u8) -> bool {
        false
    }

    /// Apply a transmission interval/offset change for `instance`
    /// ([`INSTANCE_UNSET`] when the request selected no bank).
    fn change_transmission_interval(&mut self, _instance: u8, _interval_ms: u32, _offset_ms: u16) -> bool {
        false
    }
}

//==================================================================================FILTER
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Scanning,
    Aborted,
}

/// Outcome of one selection pair.
#[derive(Debug, Clone, Copy)]
struct Selection {
    code: ParameterErrorCode,
    /// Field identifier read, `None` once the scan is aborted.
    field: Option<u8>,
    /// Value byte read for the field, when its width is known.
    value: Option<u8>,
}

/// Pair filter shared by Request and Write Fields.
#[derive(Debug)]
struct InstanceFilter {
    state: ScanState,
    matched: bool,
    instance: u8,
}

impl InstanceFilter {
    fn new() -> Self {
        Self {
            state: ScanState::Scanning,
            matched: true,
            instance: INSTANCE_UNSET,
        }
    }

    fn scan<T: BinaryStatusTarget + ?Sized>(
        &mut self,
        cursor: &mut PairCursor<'_>,
        target: &T,
    ) -> Selection {
        if self.state == ScanState::Aborted {
            return Selection {
                code: ParameterErrorCode::TemporarilyUnableToComply,
                field: None,
                value: None,
            };
        }

        let field = cursor.next_byte();
        if field != FIELD_INSTANCE {
            self.matched = false;
            self.state = ScanState::Aborted;
            return Selection {
                code: ParameterErrorCode::InvalidRequestOrCommandParameterField,
                field: Some(field),
                value: None,
            };
        }

        let value = cursor.next_byte();
        let accepted = if self.instance == INSTANCE_UNSET {
            // Recorded even when refused, so a later selector cannot win.
            self.instance = value;
            target.has_instance(value)
        } else {
            false
        };
        let code = if accepted {
            ParameterErrorCode::Acknowledge
        } else {
            self.matched = false;
            ParameterErrorCode::RequestOrCommandParameterOutOfRange
        };
        Selection {
            code,
            field: Some(field),
            value: Some(value),
        }
    }
}

//==================================================================================HANDLER
/// Answers group functions about PGN 127501 on behalf of a [`BinaryStatusTarget`].
#[derive(Debug)]
pub struct BinaryStatusGroupFunction<T: BinaryStatusTarget> {
    target: T,
}

impl<T: BinaryStatusTarget> BinaryStatusGroupFunction<T> {
    pub fn new(target: T) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    /// Dispatch a decoded group function. Returns `false` when `function` is
    /// about another PGN, leaving the answer to the caller.
    pub fn handle<S: MsgSender>(
        &mut self,
        function: &GroupFunction,
        msg: &N2kMsg,
        device: usize,
        sender: &mut S,
    ) -> Result<bool, HandleError<S::Error>> {
        if function.pgn() != PGN_BINARY_STATUS {
            return Ok(false);
        }
        match *function {
            GroupFunction::Request {
                transmission_interval,
                transmission_offset,
                pairs,
                ..
            } => self.handle_request(
                msg,
                transmission_interval,
                transmission_offset,
                pairs,
                device,
                sender,
            )?,
            GroupFunction::Command { .. } => acknowledge_unsupported(
                function,
                msg,
                PgnErrorCode::RequestOrCommandNotSupported,
                ParameterErrorCode::RequestOrCommandNotSupported,
                device,
                sender,
            )?,
            GroupFunction::ReadFields { .. } => acknowledge_unsupported(
                function,
                msg,
                PgnErrorCode::ReadOrWriteNotSupported,
                ParameterErrorCode::ReadOrWriteIsNotSupported,
                device,
                sender,
            )?,
            GroupFunction::WriteFields { ref header, .. } => {
                self.handle_write_fields(msg, header, device, sender)?
            }
            GroupFunction::Acknowledge { .. }
            | GroupFunction::ReadFieldsReply { .. }
            | GroupFunction::WriteFieldsReply { .. } => {}
        }
        Ok(true)
    }

    /// Answer a Request group function for PGN 127501.
    pub fn handle_request<S: MsgSender>(
        &mut self,
        msg: &N2kMsg,
        transmission_interval: u32,
        transmission_offset: u16,
        pairs: u8,
        device: usize,
        sender: &mut S,
    ) -> Result<(), HandleError<S::Error>> {
        let broadcast = is_broadcast(msg.destination);
        let mut ack = Acknowledgement::start(
            msg.source,
            PGN_BINARY_STATUS,
            PgnErrorCode::Acknowledge,
            TransmissionErrorCode::for_request(transmission_interval, transmission_offset),
            pairs,
        )?;

        let mut filter = InstanceFilter::new();
        let mut cursor = PairCursor::for_request(msg);
        for _ in 0..pairs {
            // Nobody reads the codes of a refused broadcast.
            if !filter.matched && broadcast {
                break;
            }
            let selection = filter.scan(&mut cursor, &self.target);
            ack.add_parameter(selection.code)?;
        }

        if self.target.change_transmission_interval(
            filter.instance,
            transmission_interval,
            transmission_offset,
        ) {
            ack.set_transmission_code(TransmissionErrorCode::Acknowledge);
        }

        let provides_status = self.target.provides_status();
        let tx_accepted = ack.transmission_code() == TransmissionErrorCode::Acknowledge;
        if (!filter.matched || !tx_accepted || !provides_status) && !broadcast {
            if filter.matched && !provides_status {
                ack.set_pgn_code(PgnErrorCode::PgnTemporarilyNotAvailable);
            }
            sender
                .send_msg(&ack.finish()?, device)
                .map_err(HandleError::Send)?;
        }

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "127501 request from {}: matched={} instance={}",
            msg.source,
            filter.matched,
            filter.instance
        );

        if filter.matched && provides_status {
            self.send_status_messages(msg, filter.instance, device, sender)?;
        }
        Ok(())
    }

    /// Send the status of `instance`, or of every bank when it is [`INSTANCE_UNSET`].
    fn send_status_messages<S: MsgSender>(
        &mut self,
        request: &N2kMsg,
        instance: u8,
        device: usize,
        sender: &mut S,
    ) -> Result<(), HandleError<S::Error>> {
        let advance = instance == INSTANCE_UNSET;
        let destination = if is_broadcast(request.destination) {
            request.destination
        } else {
            request.source
        };

        let mut current = instance;
        let mut first_sent = INSTANCE_UNSET;
        let mut status = N2kMsg::default();
        // At most one message per instance value.
        for _ in 0..INSTANCE_UNSET {
            if !self
                .target
                .next_status_message(&mut current, &mut status, advance)
            {
                break;
            }
            if current == first_sent {
                break;
            }
            status.destination = destination;
            sender
                .send_msg(&status, device)
                .map_err(HandleError::Send)?;
            if current == instance {
                break;
            }
            if first_sent == INSTANCE_UNSET {
                first_sent = current;
            }
        }
        Ok(())
    }

    /// Answer a Write Fields group function for PGN 127501.
    pub fn handle_write_fields<S: MsgSender>(
        &mut self,
        msg: &N2kMsg,
        header: &FieldsHeader,
        device: usize,
        sender: &mut S,
    ) -> Result<(), HandleError<S::Error>> {
        let mut ack = Acknowledgement::start(
            msg.source,
            PGN_BINARY_STATUS,
            PgnErrorCode::Acknowledge,
            TransmissionErrorCode::Acknowledge,
            header.selection_pairs,
        )?;
        let mut reply = WriteReply::start(msg.source, PGN_BINARY_STATUS, header)?;
        let mut cursor = PairCursor::for_fields(msg, header.proprietary);

        //==========================================================================SELECTION
        let mut filter = InstanceFilter::new();
        for _ in 0..header.selection_pairs {
            let selection = filter.scan(&mut cursor, &self.target);
            if let Some(field) = selection.field {
                reply.push(field);
                match selection.value {
                    Some(value) => reply.push(value),
                    None if is_defined_field(field) => reply.push(N2K_NA_U8),
                    None => {}
                }
            }
            ack.add_parameter(selection.code)?;
        }

        if !filter.matched || filter.instance == INSTANCE_UNSET {
            return sender
                .send_msg(&ack.finish()?, device)
                .map_err(HandleError::Send);
        }

        //==========================================================================PARAMETERS
        let current_instance = filter.instance;
        let mut ack = Acknowledgement::start(
            msg.source,
            PGN_BINARY_STATUS,
            PgnErrorCode::Acknowledge,
            TransmissionErrorCode::Acknowledge,
            header.parameter_pairs,
        )?;
        let mut matched = true;
        let mut state = ScanState::Scanning;
        for _ in 0..header.parameter_pairs {
            let code = if state == ScanState::Aborted {
                ParameterErrorCode::TemporarilyUnableToComply
            } else {
                let field = cursor.next_byte();
                reply.push(field);
                match field {
                    FIELD_INSTANCE => {
                        let requested = cursor.next_byte();
                        let echoed = if self.target.change_instance(current_instance, requested) {
                            requested
                        } else {
                            current_instance
                        };
                        reply.push(echoed);
                        ParameterErrorCode::Acknowledge
                    }
                    field if is_defined_field(field) => {
                        // Indicator states are driven through 127502, not written here.
                        cursor.next_byte();
                        reply.push(N2K_NA_U8);
                        matched = false;
                        ParameterErrorCode::ReadOrWriteIsNotSupported
                    }
                    _ => {
                        matched = false;
                        state = ScanState::Aborted;
                        ParameterErrorCode::TemporarilyUnableToComply
                    }
                }
            };
            ack.add_parameter(code)?;
        }

        // An echo too long for one message falls back to the acknowledgement.
        let answer = match reply.finish() {
            Some(reply) if matched => reply,
            _ => ack.finish()?,
        };
        sender.send_msg(&answer, device).map_err(HandleError::Send)
    }
}
