// Licensed under the Apache-2.0 license

//! Behavioral register-level model of the LLDMA block.

use log::warn;
use std::sync::{Arc, Mutex};
use xpcie_registers::{
    Bank, CtrlReg, Mmio, StatReg, AVAIL_DEQ_OFFSET, AVAIL_ENQ_OFFSET, BUF_ADDR_HI_OFFSET,
    BUF_ADDR_LO_OFFSET, BUF_SIZE_OFFSET, CHSEL_OFFSET, CTRL_OFFSET, DEQ_BANK_BASE, ENQ_BANK_BASE,
    MODE_OFFSET, PEER_ADDR_HI_OFFSET, PEER_ADDR_LO_OFFSET, RDHEAD_OFFSET, RING_ADDR_HI_OFFSET,
    RING_ADDR_LO_OFFSET, RING_SIZE_OFFSET, STAT_OFFSET, WRHEAD_OFFSET,
};

/// Model behavior knobs.
#[derive(Debug, Clone, Copy)]
pub struct ModelInitParams {
    /// Capability mask the enqueue-side register reports.
    pub avail_enq_mask: u32,
    /// Capability mask the dequeue-side register reports.
    pub avail_deq_mask: u32,
    /// Busy reads a disabled channel serves before settling to idle.
    pub drain_polls: u32,
    /// Report busy forever, for drain-timeout tests.
    pub always_busy: bool,
}

impl Default for ModelInitParams {
    fn default() -> Self {
        ModelInitParams {
            avail_enq_mask: 0xffff,
            avail_deq_mask: 0xffff,
            drain_polls: 2,
            always_busy: false,
        }
    }
}

#[derive(Default, Clone, Copy)]
struct ChannelState {
    ring_addr_lo: u32,
    ring_addr_hi: u32,
    ring_size: u32,
    rdhead: u32,
    wrhead: u32,
    ctrl: u32,
    mode: u32,
    peer_addr_lo: u32,
    peer_addr_hi: u32,
    drain_reads_left: u32,
    stat_reads: u64,
}

const CHANNELS_PER_BANK: usize = 32;

struct BankState {
    chsel: u32,
    buf_addr_lo: u32,
    buf_addr_hi: u32,
    buf_size: u32,
    channels: [ChannelState; CHANNELS_PER_BANK],
}

impl Default for BankState {
    fn default() -> Self {
        BankState {
            chsel: 0,
            buf_addr_lo: 0,
            buf_addr_hi: 0,
            buf_size: 0,
            channels: [ChannelState::default(); CHANNELS_PER_BANK],
        }
    }
}

impl BankState {
    fn selected(&mut self) -> &mut ChannelState {
        &mut self.channels[self.chsel as usize % CHANNELS_PER_BANK]
    }
}

struct ModelState {
    params: ModelInitParams,
    enq: BankState,
    deq: BankState,
}

/// Point-in-time view of one modeled channel, for test assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSnapshot {
    pub ring_addr: u64,
    pub ring_size: u32,
    pub ctrl: u32,
    pub mode: u32,
    pub peer_addr: u64,
    pub stat_reads: u64,
}

/// Register-level model of the LLDMA block. Clones share the same state,
/// so a test can hand one clone to the device and inspect through another.
#[derive(Clone)]
pub struct LldmaModelEmulated {
    state: Arc<Mutex<ModelState>>,
}

impl Default for LldmaModelEmulated {
    fn default() -> Self {
        Self::new(ModelInitParams::default())
    }
}

impl LldmaModelEmulated {
    pub fn new(params: ModelInitParams) -> Self {
        LldmaModelEmulated {
            state: Arc::new(Mutex::new(ModelState {
                params,
                enq: BankState::default(),
                deq: BankState::default(),
            })),
        }
    }

    pub fn channel(&self, bank: Bank, chid: u8) -> ChannelSnapshot {
        let state = self.state.lock().unwrap();
        let bank_state = match bank {
            Bank::Enqueue => &state.enq,
            Bank::Dequeue => &state.deq,
        };
        let ch = &bank_state.channels[chid as usize % CHANNELS_PER_BANK];
        ChannelSnapshot {
            ring_addr: (ch.ring_addr_hi as u64) << 32 | ch.ring_addr_lo as u64,
            ring_size: ch.ring_size,
            ctrl: ch.ctrl,
            mode: ch.mode,
            peer_addr: (ch.peer_addr_hi as u64) << 32 | ch.peer_addr_lo as u64,
            stat_reads: ch.stat_reads,
        }
    }

    /// Status-register reads served for one channel so far.
    pub fn stat_reads(&self, bank: Bank, chid: u8) -> u64 {
        self.channel(bank, chid).stat_reads
    }

    /// Bank-wide staging buffer as programmed.
    pub fn buffer(&self, bank: Bank) -> (u64, u32) {
        let state = self.state.lock().unwrap();
        let bank_state = match bank {
            Bank::Enqueue => &state.enq,
            Bank::Dequeue => &state.deq,
        };
        (
            (bank_state.buf_addr_hi as u64) << 32 | bank_state.buf_addr_lo as u64,
            bank_state.buf_size,
        )
    }
}

fn decode(offset: u32) -> Option<(Bank, u32)> {
    if (ENQ_BANK_BASE..DEQ_BANK_BASE).contains(&offset) {
        Some((Bank::Enqueue, offset - ENQ_BANK_BASE))
    } else if (DEQ_BANK_BASE..DEQ_BANK_BASE + 0x100).contains(&offset) {
        Some((Bank::Dequeue, offset - DEQ_BANK_BASE))
    } else {
        None
    }
}

impl Mmio for LldmaModelEmulated {
    fn read_reg(&mut self, offset: u32) -> u32 {
        let mut state = self.state.lock().unwrap();
        match offset {
            AVAIL_ENQ_OFFSET => return state.params.avail_enq_mask,
            AVAIL_DEQ_OFFSET => return state.params.avail_deq_mask,
            _ => {}
        }
        let Some((bank, reg)) = decode(offset) else {
            warn!("lldma model: read of unknown register {offset:#x}");
            return 0;
        };
        let always_busy = state.params.always_busy;
        let bank_state = match bank {
            Bank::Enqueue => &mut state.enq,
            Bank::Dequeue => &mut state.deq,
        };
        match reg {
            CHSEL_OFFSET => bank_state.chsel,
            BUF_ADDR_LO_OFFSET => bank_state.buf_addr_lo,
            BUF_ADDR_HI_OFFSET => bank_state.buf_addr_hi,
            BUF_SIZE_OFFSET => bank_state.buf_size,
            _ => {
                let ch = bank_state.selected();
                match reg {
                    RING_ADDR_LO_OFFSET => ch.ring_addr_lo,
                    RING_ADDR_HI_OFFSET => ch.ring_addr_hi,
                    RING_SIZE_OFFSET => ch.ring_size,
                    RDHEAD_OFFSET => ch.rdhead,
                    WRHEAD_OFFSET => ch.wrhead,
                    CTRL_OFFSET => ch.ctrl,
                    STAT_OFFSET => {
                        ch.stat_reads += 1;
                        let enabled = CtrlReg(ch.ctrl).ingress_enable()
                            || CtrlReg(ch.ctrl).egress_enable();
                        let busy = if always_busy || enabled {
                            1
                        } else if ch.drain_reads_left > 0 {
                            ch.drain_reads_left -= 1;
                            1
                        } else {
                            0
                        };
                        let mut stat = StatReg(0);
                        stat.set_busy(busy);
                        stat.0
                    }
                    MODE_OFFSET => ch.mode,
                    PEER_ADDR_LO_OFFSET => ch.peer_addr_lo,
                    PEER_ADDR_HI_OFFSET => ch.peer_addr_hi,
                    _ => {
                        warn!("lldma model: read of unknown register {offset:#x}");
                        0
                    }
                }
            }
        }
    }

    fn write_reg(&mut self, offset: u32, value: u32) {
        let mut state = self.state.lock().unwrap();
        let Some((bank, reg)) = decode(offset) else {
            warn!("lldma model: write of unknown register {offset:#x}");
            return;
        };
        let drain_polls = state.params.drain_polls;
        let bank_state = match bank {
            Bank::Enqueue => &mut state.enq,
            Bank::Dequeue => &mut state.deq,
        };
        match reg {
            CHSEL_OFFSET => bank_state.chsel = value,
            BUF_ADDR_LO_OFFSET => bank_state.buf_addr_lo = value,
            BUF_ADDR_HI_OFFSET => bank_state.buf_addr_hi = value,
            BUF_SIZE_OFFSET => bank_state.buf_size = value,
            _ => {
                let ch = bank_state.selected();
                match reg {
                    RING_ADDR_LO_OFFSET => ch.ring_addr_lo = value,
                    RING_ADDR_HI_OFFSET => ch.ring_addr_hi = value,
                    RING_SIZE_OFFSET => ch.ring_size = value,
                    RDHEAD_OFFSET => ch.rdhead = value,
                    WRHEAD_OFFSET => ch.wrhead = value,
                    CTRL_OFFSET => {
                        let was_enabled = CtrlReg(ch.ctrl).ingress_enable()
                            || CtrlReg(ch.ctrl).egress_enable();
                        let now_enabled = CtrlReg(value).ingress_enable()
                            || CtrlReg(value).egress_enable();
                        // Disabling a running channel starts the drain window.
                        if was_enabled && !now_enabled {
                            ch.drain_reads_left = drain_polls;
                        }
                        ch.ctrl = value;
                    }
                    STAT_OFFSET => {
                        if StatReg(value).clear() {
                            ch.drain_reads_left = 0;
                        }
                    }
                    MODE_OFFSET => ch.mode = value,
                    PEER_ADDR_LO_OFFSET => ch.peer_addr_lo = value,
                    PEER_ADDR_HI_OFFSET => ch.peer_addr_hi = value,
                    _ => warn!("lldma model: write of unknown register {offset:#x}"),
                }
            }
        }
    }
}
