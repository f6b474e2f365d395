//! Switch bank state and message dispatch.
//!
//! [`SwitchBank`] owns `N` banks of 28 indicators, their instance numbers and
//! the status broadcast schedule, and implements [`BinaryStatusTarget`] so the
//! 127501 group function handler can query and reconfigure it.
//! [`SwitchBankNode`] routes inbound traffic:
//!
//! * 126208 group functions go to the 127501 handler; group functions about
//!   other PGNs are refused with "PGN not supported";
//! * 127502 Switch Bank Control updates the indicators it names;
//! * 59904 ISO Request for 127501 triggers a status burst.
//!
//! Switches are also addressed by a flat index across banks: bank
//! `index / 28`, indicator `index % 28 + 1`.
use embassy_time::Instant;

use crate::application::{
    DEFAULT_STATUS_OFFSET_MS, DEFAULT_STATUS_PERIOD_MS, MIN_TRANSMISSION_INTERVAL_MS,
    OUTBOX_CAPACITY,
};
use crate::core::{is_broadcast, N2kMsg, BROADCAST_ADDRESS};
use crate::error::{ConfigError, HandleError};
use crate::protocol::group_function::binary_status::{
    BinaryStatusGroupFunction, BinaryStatusTarget, INSTANCE_UNSET,
};
use crate::protocol::group_function::{
    send_pgn_not_supported, GroupFunction, TRANSMISSION_INTERVAL_RESTORE_DEFAULT,
    TRANSMISSION_INTERVAL_UNCHANGED, TRANSMISSION_OFFSET_UNCHANGED,
};
use crate::protocol::messages::binary_status::{
    parse_switch_bank_control, set_binary_status, BinaryStatus, OnOff, ITEMS_PER_BANK,
};
use crate::protocol::messages::{
    parse_iso_request, PGN_BINARY_STATUS, PGN_GROUP_FUNCTION, PGN_ISO_REQUEST,
    PGN_SWITCH_BANK_CONTROL,
};
use crate::protocol::scheduler::SyncScheduler;
use crate::protocol::transport::traits::msg_sender::MsgSender;

const ITEMS: usize = ITEMS_PER_BANK as usize;

//==================================================================================CONFIG
/// Bank instances and status broadcast timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchBankConfig<const N: usize> {
    pub instances: [u8; N],
    pub period_ms: u32,
    pub offset_ms: u32,
}

impl<const N: usize> Default for SwitchBankConfig<N> {
    fn default() -> Self {
        Self {
            instances: core::array::from_fn(|i| i as u8),
            period_ms: DEFAULT_STATUS_PERIOD_MS,
            offset_ms: DEFAULT_STATUS_OFFSET_MS,
        }
    }
}

impl<const N: usize> SwitchBankConfig<N> {
    /// Instances `0..N`, default period and offset.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instances(mut self, instances: [u8; N]) -> Self {
        self.instances = instances;
        self
    }

    pub fn with_period_ms(mut self, period_ms: u32) -> Self {
        self.period_ms = period_ms;
        self
    }

    pub fn with_offset_ms(mut self, offset_ms: u32) -> Self {
        self.offset_ms = offset_ms;
        self
    }

    /// Check instance uniqueness and bank count.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if N >= OUTBOX_CAPACITY {
            return Err(ConfigError::TooManyBanks {
                count: N,
                max: OUTBOX_CAPACITY - 1,
            });
        }
        for (i, &instance) in self.instances.iter().enumerate() {
            if instance == INSTANCE_UNSET {
                return Err(ConfigError::ReservedInstance { instance });
            }
            if self.instances[..i].contains(&instance) {
                return Err(ConfigError::DuplicateInstance { instance });
            }
        }
        Ok(())
    }
}

//==================================================================================SWITCH_BANK
/// Live state of `N` switch banks.
#[derive(Debug, Clone)]
pub struct SwitchBank<const N: usize> {
    instances: [u8; N],
    status: [BinaryStatus; N],
    /// Indicators changed by bus traffic since the last [`take_changes`](Self::take_changes).
    changed: [u32; N],
    scheduler: SyncScheduler,
    default_period_ms: u32,
    default_offset_ms: u32,
    update_pending: bool,
}

impl<const N: usize> SwitchBank<N> {
    /// Every switch starts off.
    pub fn new(config: SwitchBankConfig<N>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            instances: config.instances,
            status: [BinaryStatus::from_raw(0); N],
            changed: [0; N],
            scheduler: SyncScheduler::new(config.period_ms, config.offset_ms),
            default_period_ms: config.period_ms,
            default_offset_ms: config.offset_ms,
            update_pending: false,
        })
    }

    pub fn instances(&self) -> &[u8; N] {
        &self.instances
    }

    /// Status word of the bank with `instance`.
    pub fn status(&self, instance: u8) -> Option<BinaryStatus> {
        self.bank_index(instance).map(|bank| self.status[bank])
    }

    pub fn scheduler(&self) -> &SyncScheduler {
        &self.scheduler
    }

    /// Whether a change is waiting to be broadcast.
    pub fn update_pending(&self) -> bool {
        self.update_pending
    }

    /// Number of addressable switches.
    pub const fn switch_count(&self) -> usize {
        N * ITEMS
    }

    fn bank_index(&self, instance: u8) -> Option<usize> {
        self.instances.iter().position(|i| *i == instance)
    }

    fn locate(index: usize) -> Option<(usize, u8)> {
        let bank = index / ITEMS;
        (bank < N).then_some((bank, (index % ITEMS) as u8 + 1))
    }

    /// Set switch `index` on or off and schedule a status update. Returns `false`
    /// when `index` is out of range.
    pub fn set_switch(&mut self, index: usize, on: bool) -> bool {
        let Some((bank, item)) = Self::locate(index) else {
            return false;
        };
        self.status[bank].set_item(item, OnOff::from(on));
        self.update_pending = true;
        true
    }

    /// Whether switch `index` is on; `None` when out of range.
    pub fn switch_state(&self, index: usize) -> Option<bool> {
        let (bank, item) = Self::locate(index)?;
        self.status[bank].item(item).map(|state| state == OnOff::On)
    }

    /// Flip switch `index`, returning its new state.
    pub fn toggle_switch(&mut self, index: usize) -> Option<bool> {
        let on = !self.switch_state(index)?;
        self.set_switch(index, on);
        Some(on)
    }

    /// Apply a Switch Bank Control to the bank with `instance`. Indicators set to
    /// [`OnOff::Unavailable`] are left unchanged. Returns `false` for an unknown bank.
    pub fn apply_control(&mut self, instance: u8, control: BinaryStatus) -> bool {
        let Some(bank) = self.bank_index(instance) else {
            return false;
        };
        for (item, state) in control.items() {
            if state == OnOff::Unavailable {
                continue;
            }
            if self.status[bank].item(item) != Some(state) {
                self.changed[bank] |= 1 << (item - 1);
            }
            self.status[bank].set_item(item, state);
            self.update_pending = true;
        }
        true
    }

    /// Drain the switches changed by bus traffic as `(index, on)` pairs.
    pub fn take_changes(&mut self) -> SwitchChanges<N> {
        let changes = SwitchChanges {
            masks: self.changed,
            status: self.status,
            bank: 0,
        };
        self.changed = [0; N];
        changes
    }

    /// Anchor the status broadcast at `now`.
    pub fn start(&mut self, now: Instant) {
        self.scheduler.start(now);
    }

    /// Whether a status burst is due at `now`.
    pub fn status_due(&mut self, now: Instant) -> bool {
        self.update_pending || self.scheduler.is_time(now)
    }

    /// Record a status burst sent at `now`.
    pub fn mark_status_sent(&mut self, now: Instant) {
        self.scheduler.update_next_time(now);
        self.update_pending = false;
    }

    /// Queue one 127501 per bank, in bank order.
    pub fn send_all_status<S: MsgSender>(
        &self,
        destination: u8,
        device: usize,
        sender: &mut S,
    ) -> Result<(), HandleError<S::Error>> {
        let mut msg = N2kMsg::default();
        for (instance, status) in self.instances.iter().zip(self.status.iter()) {
            set_binary_status(&mut msg, *instance, *status)?;
            msg.destination = destination;
            sender.send_msg(&msg, device).map_err(HandleError::Send)?;
        }
        Ok(())
    }
}

impl<const N: usize> BinaryStatusTarget for SwitchBank<N> {
    fn has_instance(&self, instance: u8) -> bool {
        self.bank_index(instance).is_some()
    }

    fn next_status_message(&mut self, instance: &mut u8, msg: &mut N2kMsg, advance: bool) -> bool {
        let bank = match (advance, *instance) {
            (true, INSTANCE_UNSET) => 0,
            (true, current) => match self.bank_index(current) {
                Some(bank) => bank + 1,
                None => {
                    *instance = INSTANCE_UNSET;
                    return false;
                }
            },
            (false, current) => match self.bank_index(current) {
                Some(bank) => bank,
                None => return false,
            },
        };
        let (Some(&found), Some(&status)) = (self.instances.get(bank), self.status.get(bank)) else {
            // Only reachable when advancing past the last bank.
            *instance = INSTANCE_UNSET;
            return false;
        };
        if set_binary_status(msg, found, status).is_err() {
            return false;
        }
        *instance = found;
        true
    }

    fn change_instance(&mut self, old: u8, new: u8) -> bool {
        if new == INSTANCE_UNSET || self.has_instance(new) {
            return false;
        }
        let Some(bank) = self.bank_index(old) else {
            return false;
        };
        self.instances[bank] = new;
        // Announce the bank under its new number.
        self.update_pending = true;
        true
    }

    fn change_transmission_interval(&mut self, instance: u8, interval_ms: u32, offset_ms: u16) -> bool {
        if instance != INSTANCE_UNSET && !self.has_instance(instance) {
            return false;
        }
        let period_ms = match interval_ms {
            TRANSMISSION_INTERVAL_UNCHANGED => self.scheduler.period_ms(),
            TRANSMISSION_INTERVAL_RESTORE_DEFAULT => self.default_period_ms,
            ms if ms != 0 && ms < MIN_TRANSMISSION_INTERVAL_MS => return false,
            ms => ms,
        };
        let offset_ms = match offset_ms {
            TRANSMISSION_OFFSET_UNCHANGED if interval_ms == TRANSMISSION_INTERVAL_RESTORE_DEFAULT => {
                self.default_offset_ms
            }
            TRANSMISSION_OFFSET_UNCHANGED => self.scheduler.offset_ms(),
            ms => ms as u32,
        };
        if period_ms != self.scheduler.period_ms() || offset_ms != self.scheduler.offset_ms() {
            #[cfg(feature = "defmt")]
            defmt::info!("Status period {} ms, offset {} ms", period_ms, offset_ms);
            self.scheduler.set_period_and_offset(period_ms, offset_ms);
        }
        true
    }
}

/// Iterator returned by [`SwitchBank::take_changes`].
#[derive(Debug, Clone)]
pub struct SwitchChanges<const N: usize> {
    masks: [u32; N],
    status: [BinaryStatus; N],
    bank: usize,
}

impl<const N: usize> Iterator for SwitchChanges<N> {
    type Item = (usize, bool);

    fn next(&mut self) -> Option<Self::Item> {
        while self.bank < N {
            let mask = self.masks[self.bank];
            if mask == 0 {
                self.bank += 1;
                continue;
            }
            let bit = mask.trailing_zeros() as usize;
            self.masks[self.bank] &= mask - 1;
            let on = self.status[self.bank].item(bit as u8 + 1) == Some(OnOff::On);
            return Some((self.bank * ITEMS + bit, on));
        }
        None
    }
}

//==================================================================================NODE
/// Switch bank device: routes inbound messages and runs the status broadcast.
#[derive(Debug)]
pub struct SwitchBankNode<const N: usize> {
    group_function: BinaryStatusGroupFunction<SwitchBank<N>>,
}

impl<const N: usize> SwitchBankNode<N> {
    pub fn new(config: SwitchBankConfig<N>) -> Result<Self, ConfigError> {
        Ok(Self::from_bank(SwitchBank::new(config)?))
    }

    pub fn from_bank(bank: SwitchBank<N>) -> Self {
        Self {
            group_function: BinaryStatusGroupFunction::new(bank),
        }
    }

    pub fn bank(&self) -> &SwitchBank<N> {
        self.group_function.target()
    }

    pub fn bank_mut(&mut self) -> &mut SwitchBank<N> {
        self.group_function.target_mut()
    }

    /// Start the periodic status broadcast.
    pub fn start(&mut self, now: Instant) {
        self.bank_mut().start(now);
    }

    /// Handle one inbound message. Messages this node does not care about are ignored.
    pub fn handle_msg<S: MsgSender>(
        &mut self,
        msg: &N2kMsg,
        device: usize,
        sender: &mut S,
    ) -> Result<(), HandleError<S::Error>> {
        match msg.pgn {
            PGN_GROUP_FUNCTION => {
                let function = match GroupFunction::parse(msg) {
                    Ok(function) => function,
                    Err(_err) => {
                        #[cfg(feature = "defmt")]
                        defmt::warn!("Dropping group function from {}: {}", msg.source, _err);
                        return Ok(());
                    }
                };
                if !self.group_function.handle(&function, msg, device, sender)? {
                    send_pgn_not_supported(&function, msg, device, sender)?;
                }
            }
            PGN_SWITCH_BANK_CONTROL => match parse_switch_bank_control(msg) {
                Ok((instance, control)) => {
                    if !self.bank_mut().apply_control(instance, control) {
                        #[cfg(feature = "defmt")]
                        defmt::debug!("Switch bank control for unknown bank {}", instance);
                    }
                }
                Err(_err) => {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("Malformed switch bank control from {}: {}", msg.source, _err);
                }
            },
            PGN_ISO_REQUEST => {
                if parse_iso_request(msg) == Ok(PGN_BINARY_STATUS) {
                    let destination = if is_broadcast(msg.destination) {
                        msg.destination
                    } else {
                        msg.source
                    };
                    self.bank().send_all_status(destination, device, sender)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Broadcast every bank status when a change is pending or the schedule is due.
    /// Returns whether a burst was sent.
    pub fn poll_status<S: MsgSender>(
        &mut self,
        now: Instant,
        device: usize,
        sender: &mut S,
    ) -> Result<bool, HandleError<S::Error>> {
        if !self.bank_mut().status_due(now) {
            return Ok(false);
        }
        self.bank()
            .send_all_status(BROADCAST_ADDRESS, device, sender)?;
        self.bank_mut().mark_status_sent(now);
        Ok(true)
    }
}
