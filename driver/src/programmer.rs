// Licensed under the Apache-2.0 license

//! Register programming sequences for one LLDMA device.
//!
//! Every per-channel operation is "select, then operate": the channel index
//! goes into the bank's shared select register, and the registers behind it
//! apply to that channel. Each sequence runs with the device's register
//! lock held so two channels never interleave on the select register. The
//! drain poll in `stop` re-takes the lock per attempt instead of pinning it
//! for the whole ceiling.

use crate::config::LldmaConfig;
use crate::error::LldmaError;
use crate::DmaDirection;
use log::{debug, warn};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use poll_common::poll_until_with;
use std::sync::Mutex;
use xpcie_registers::{
    Bank, CtrlReg, Mmio, ModeReg, StatReg, BUF_ADDR_HI_OFFSET, BUF_ADDR_LO_OFFSET, BUF_SIZE_OFFSET,
    CHSEL_OFFSET, CTRL_OFFSET, MODE_OFFSET, PEER_ADDR_HI_OFFSET, PEER_ADDR_LO_OFFSET,
    RDHEAD_OFFSET, RING_ADDR_HI_OFFSET, RING_ADDR_LO_OFFSET, RING_SIZE_OFFSET, STAT_OFFSET,
    WRHEAD_OFFSET,
};

/// Device-to-device link flavor, as encoded in the mode register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum D2dMode {
    None = 0,
    HostBuffered = 1,
    Direct = 2,
}

pub(crate) struct RegisterProgrammer<'a, M: Mmio> {
    mmio: &'a Mutex<M>,
    config: &'a LldmaConfig,
}

impl<'a, M: Mmio> RegisterProgrammer<'a, M> {
    pub fn new(mmio: &'a Mutex<M>, config: &'a LldmaConfig) -> Self {
        RegisterProgrammer { mmio, config }
    }

    /// Runs `f` with `chid` selected in `bank`, holding the register lock
    /// for the whole select+operate sequence.
    fn with_channel<R>(&self, bank: Bank, chid: u8, f: impl FnOnce(&mut M, Bank) -> R) -> R {
        let mut mmio = self.mmio.lock().unwrap();
        mmio.write_reg(bank.reg(CHSEL_OFFSET), chid as u32);
        f(&mut *mmio, bank)
    }

    fn enable_bits(direction: DmaDirection) -> CtrlReg {
        let mut ctrl = CtrlReg(0);
        match direction {
            // Host-facing channels run both engine halves.
            DmaDirection::HostToDev | DmaDirection::DevToHost => {
                ctrl.set_ingress_enable(true);
                ctrl.set_egress_enable(true);
            }
            DmaDirection::NetToDev | DmaDirection::D2dRx => ctrl.set_ingress_enable(true),
            DmaDirection::DevToNet | DmaDirection::D2dTx => ctrl.set_egress_enable(true),
        }
        ctrl
    }

    /// Binds the local ring to the channel and starts it. Returns the
    /// hardware head pointers read back after programming, so the caller's
    /// shadows start from what the hardware will actually poll.
    pub fn start(
        &self,
        chid: u8,
        direction: DmaDirection,
        ring_addr: u64,
        depth: u16,
    ) -> (u16, u16) {
        debug!(
            "lldma: start ch {chid} {direction:?} ring {ring_addr:#x} depth {depth}"
        );
        self.with_channel(direction.bank(), chid, |mmio, bank| {
            mmio.write_reg(bank.reg(RING_ADDR_LO_OFFSET), ring_addr as u32);
            mmio.write_reg(bank.reg(RING_ADDR_HI_OFFSET), (ring_addr >> 32) as u32);
            mmio.write_reg(bank.reg(RING_SIZE_OFFSET), depth as u32);
            let rdhead = mmio.read_reg(bank.reg(RDHEAD_OFFSET)) as u16;
            let wrhead = mmio.read_reg(bank.reg(WRHEAD_OFFSET)) as u16;
            mmio.write_reg(bank.reg(CTRL_OFFSET), Self::enable_bits(direction).0);
            (rdhead, wrhead)
        })
    }

    /// Starts a channel whose address registers were programmed by
    /// `program_peer` rather than from a local ring.
    pub fn enable(&self, chid: u8, direction: DmaDirection) -> (u16, u16) {
        debug!("lldma: enable ch {chid} {direction:?}");
        self.with_channel(direction.bank(), chid, |mmio, bank| {
            let rdhead = mmio.read_reg(bank.reg(RDHEAD_OFFSET)) as u16;
            let wrhead = mmio.read_reg(bank.reg(WRHEAD_OFFSET)) as u16;
            mmio.write_reg(bank.reg(CTRL_OFFSET), Self::enable_bits(direction).0);
            (rdhead, wrhead)
        })
    }

    /// Stops the channel and waits for in-flight hardware activity to
    /// cease. Enable bits are cleared up front and stay cleared whether or
    /// not the drain completes.
    pub fn stop(&self, chid: u8, direction: DmaDirection) -> Result<(), LldmaError> {
        let bank = direction.bank();
        debug!("lldma: stop ch {chid} {direction:?}");
        self.with_channel(bank, chid, |mmio, bank| {
            mmio.write_reg(bank.reg(CTRL_OFFSET), 0);
        });

        let drained = poll_until_with(
            self.config.drain_timeout,
            self.config.drain_poll_interval,
            self.config.sleep,
            || {
                let busy = self.with_channel(bank, chid, |mmio, bank| {
                    StatReg(mmio.read_reg(bank.reg(STAT_OFFSET))).busy()
                });
                Ok(busy == 0)
            },
        );

        if drained.is_err() {
            let timeout_ms = self.config.drain_timeout.as_millis() as u64;
            warn!("lldma: ch {chid} {direction:?} still busy after {timeout_ms} ms");
            return Err(LldmaError::HardwareTimeout { chid, timeout_ms });
        }

        self.with_channel(bank, chid, |mmio, bank| {
            let mut stat = StatReg(0);
            stat.set_clear(true);
            mmio.write_reg(bank.reg(STAT_OFFSET), stat.0);
        });
        Ok(())
    }

    /// Points the channel at a peer card instead of a local ring and tags
    /// it with the link mode and the peer's channel id.
    pub fn program_peer(
        &self,
        chid: u8,
        direction: DmaDirection,
        mode: D2dMode,
        peer_addr: u64,
        peer_chid: u8,
    ) {
        debug!(
            "lldma: ch {chid} {direction:?} peer {peer_addr:#x} peer-ch {peer_chid} {mode:?}"
        );
        self.with_channel(direction.bank(), chid, |mmio, bank| {
            mmio.write_reg(bank.reg(PEER_ADDR_LO_OFFSET), peer_addr as u32);
            mmio.write_reg(bank.reg(PEER_ADDR_HI_OFFSET), (peer_addr >> 32) as u32);
            let mut mode_reg = ModeReg(0);
            mode_reg.set_mode(mode.into());
            mode_reg.set_peer_chid(peer_chid);
            mmio.write_reg(bank.reg(MODE_OFFSET), mode_reg.0);
        });
    }

    /// Programs the bank-wide staging buffer used by host-buffered
    /// device-to-device links. These registers are not behind the channel
    /// select.
    pub fn program_buffer(&self, bank: Bank, addr: u64, size: u32) {
        debug!("lldma: {bank:?} staging buffer {addr:#x} size {size:#x}");
        let mut mmio = self.mmio.lock().unwrap();
        mmio.write_reg(bank.reg(BUF_ADDR_LO_OFFSET), addr as u32);
        mmio.write_reg(bank.reg(BUF_ADDR_HI_OFFSET), (addr >> 32) as u32);
        mmio.write_reg(bank.reg(BUF_SIZE_OFFSET), size);
    }
}
