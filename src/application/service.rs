//! Async service driving a [`SwitchBankNode`] on an [`N2kBus`].
//!
//! The node itself is synchronous. The runner owns it and is the only task
//! touching the bank state; other tasks talk to it through optional
//! pre-allocated [`embassy_sync::Channel`] instances:
//!
//! * a command channel (`SwitchHandle`) to set or toggle switches locally;
//! * an event channel (`SwitchEvents`) reporting switches changed by the bus.
//!
//! Each loop iteration drains pending commands, services the status broadcast,
//! then waits for either one inbound message or [`STATUS_POLL_INTERVAL_MS`],
//! dispatches it, and flushes the replies to the bus.

use core::fmt::Debug;

use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex,
    channel::{Channel, Receiver, Sender},
};
use embassy_time::Instant;
use futures_util::{future::select, future::Either, pin_mut};

use crate::application::switch_bank::SwitchBankNode;
use crate::application::{OUTBOX_CAPACITY, STATUS_POLL_INTERVAL_MS};
use crate::error::{HandleError, ServiceError};
use crate::protocol::transport::outbox::Outbox;
use crate::protocol::transport::traits::korri_timer::KorriTimer;
use crate::protocol::transport::traits::n2k_bus::N2kBus;

/// Device index used for every outbound message of the service.
const DEVICE_INDEX: usize = 0;

/// Service assembling the switch bank components.
pub struct SwitchBankService<
    'a,
    B: N2kBus,
    T: KorriTimer,
    const N: usize,
    const CMD_CAP: usize,
    const EVT_CAP: usize,
> where
    B::Error: Debug,
{
    node: SwitchBankNode<N>,
    bus: B,
    timer: T,
    source_address: u8,
    command_channel: Option<&'a Channel<CriticalSectionRawMutex, SwitchCommand, CMD_CAP>>,
    event_channel: Option<&'a Channel<CriticalSectionRawMutex, SwitchEvent, EVT_CAP>>,
}

impl<'a, B, T, const N: usize, const CMD_CAP: usize, const EVT_CAP: usize>
    SwitchBankService<'a, B, T, N, CMD_CAP, EVT_CAP>
where
    B: N2kBus,
    B::Error: Debug,
    T: KorriTimer,
{
    /// Wrap an already-configured node. `source_address` is the claimed bus address.
    pub fn new(
        node: SwitchBankNode<N>,
        bus: B,
        timer: T,
        source_address: u8,
        command_channel: Option<&'a Channel<CriticalSectionRawMutex, SwitchCommand, CMD_CAP>>,
        event_channel: Option<&'a Channel<CriticalSectionRawMutex, SwitchEvent, EVT_CAP>>,
    ) -> Self {
        Self {
            node,
            bus,
            timer,
            source_address,
            command_channel,
            event_channel,
        }
    }

    /// Split into handle/events/runner components.
    pub fn into_parts(self) -> SwitchBankServiceParts<'a, B, T, N, CMD_CAP, EVT_CAP> {
        let handle = self.command_channel.map(|channel| SwitchHandle {
            sender: channel.sender(),
        });
        let events = self.event_channel.map(|channel| SwitchEvents {
            receiver: channel.receiver(),
        });
        SwitchBankServiceParts {
            handle,
            events,
            runner: SwitchBankRunner {
                node: self.node,
                bus: self.bus,
                timer: self.timer,
                source_address: self.source_address,
                command_channel: self.command_channel,
                event_channel: self.event_channel,
            },
        }
    }
}

/// Bundle returned by [`SwitchBankService::into_parts`].
pub struct SwitchBankServiceParts<
    'a,
    B,
    T,
    const N: usize,
    const CMD_CAP: usize,
    const EVT_CAP: usize,
> where
    B: N2kBus,
    B::Error: Debug,
    T: KorriTimer,
{
    pub handle: Option<SwitchHandle<'a, CMD_CAP>>,
    pub events: Option<SwitchEvents<'a, EVT_CAP>>,
    pub runner: SwitchBankRunner<'a, B, T, N, CMD_CAP, EVT_CAP>,
}

//==================================================================================RUNNER
/// Runner that drives the service loop.
pub struct SwitchBankRunner<'a, B, T, const N: usize, const CMD_CAP: usize, const EVT_CAP: usize>
where
    B: N2kBus,
    B::Error: Debug,
    T: KorriTimer,
{
    node: SwitchBankNode<N>,
    bus: B,
    timer: T,
    source_address: u8,
    command_channel: Option<&'a Channel<CriticalSectionRawMutex, SwitchCommand, CMD_CAP>>,
    event_channel: Option<&'a Channel<CriticalSectionRawMutex, SwitchEvent, EVT_CAP>>,
}

impl<'a, B, T, const N: usize, const CMD_CAP: usize, const EVT_CAP: usize>
    SwitchBankRunner<'a, B, T, N, CMD_CAP, EVT_CAP>
where
    B: N2kBus,
    B::Error: Debug,
    T: KorriTimer,
{
    pub fn node(&self) -> &SwitchBankNode<N> {
        &self.node
    }

    fn now(&self) -> Instant {
        Instant::from_millis(self.timer.now_ms())
    }

    pub async fn drive(mut self) -> Result<(), ServiceError<B::Error>> {
        let mut outbox: Outbox<OUTBOX_CAPACITY> = Outbox::new();
        let now = self.now();
        self.node.start(now);

        loop {
            if let Some(cmd_ch) = self.command_channel {
                while let Ok(command) = cmd_ch.try_receive() {
                    self.handle_command(command);
                }
            }

            let now = self.now();
            self.node.poll_status(now, DEVICE_INDEX, &mut outbox)?;
            self.flush(&outbox).await?;

            let received = {
                let recv_future = self.bus.recv();
                let tick_future = self.timer.delay_ms(STATUS_POLL_INTERVAL_MS);
                pin_mut!(recv_future);
                pin_mut!(tick_future);

                match select(recv_future, tick_future).await {
                    Either::Left((result, _pending_tick)) => Some(result),
                    Either::Right(((), _pending_recv)) => None,
                }
            };

            if let Some(result) = received {
                let msg = result.map_err(ServiceError::Receive)?;
                match self.node.handle_msg(&msg, DEVICE_INDEX, &mut outbox) {
                    Ok(()) => {}
                    // An answer that cannot be encoded only costs that answer.
                    Err(HandleError::Build(_err)) => {
                        #[cfg(feature = "defmt")]
                        defmt::warn!("Cannot answer PGN {} from {}: {}", msg.pgn, msg.source, _err);
                    }
                    Err(err) => return Err(err.into()),
                }
                self.publish_changes();
                self.flush(&outbox).await?;
            }
        }
    }

    fn handle_command(&mut self, command: SwitchCommand) {
        let bank = self.node.bank_mut();
        let applied = match command {
            SwitchCommand::Set { index, on } => bank.set_switch(index, on),
            SwitchCommand::Toggle { index } => bank.toggle_switch(index).is_some(),
        };
        if !applied {
            #[cfg(feature = "defmt")]
            defmt::warn!("Ignoring command for unknown switch: {}", command);
        }
    }

    fn publish_changes(&mut self) {
        let changes = self.node.bank_mut().take_changes();
        let Some(evt_ch) = self.event_channel else {
            return;
        };
        for (index, on) in changes {
            if evt_ch.try_send(SwitchEvent::Changed { index, on }).is_err() {
                #[cfg(feature = "defmt")]
                defmt::warn!("Event channel full, dropping change of switch {}", index);
            }
        }
    }

    async fn flush(&mut self, outbox: &Outbox<OUTBOX_CAPACITY>) -> Result<(), ServiceError<B::Error>> {
        while let Some(mut outbound) = outbox.pop() {
            outbound.msg.source = self.source_address;
            self.bus
                .send(&outbound.msg)
                .await
                .map_err(ServiceError::Send)?;
        }
        Ok(())
    }
}

//==================================================================================HANDLE
/// Command handle (optional).
pub struct SwitchHandle<'a, const CMD_CAP: usize> {
    sender: Sender<'a, CriticalSectionRawMutex, SwitchCommand, CMD_CAP>,
}

impl<'a, const CMD_CAP: usize> SwitchHandle<'a, CMD_CAP> {
    pub async fn set(&self, index: usize, on: bool) {
        self.sender.send(SwitchCommand::Set { index, on }).await;
    }

    pub async fn toggle(&self, index: usize) {
        self.sender.send(SwitchCommand::Toggle { index }).await;
    }
}

/// Optional receiver of switch changes made by the bus.
pub struct SwitchEvents<'a, const EVT_CAP: usize> {
    receiver: Receiver<'a, CriticalSectionRawMutex, SwitchEvent, EVT_CAP>,
}

impl<'a, const EVT_CAP: usize> SwitchEvents<'a, EVT_CAP> {
    pub async fn recv(&mut self) -> SwitchEvent {
        self.receiver.receive().await
    }
}

/// Commands queued by producer tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SwitchCommand {
    Set { index: usize, on: bool },
    Toggle { index: usize },
}

/// Changes reported to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SwitchEvent {
    /// A 127502 control changed switch `index`.
    Changed { index: usize, on: bool },
}
