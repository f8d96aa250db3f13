// Licensed under the Apache-2.0 license

//! Register map of the XPCIE LLDMA block.
//!
//! The block exposes two register banks, one per transfer family: the
//! enqueue bank drives the toward-device engines, the dequeue bank the
//! from-device engines. Each bank has a single channel-select register;
//! the per-channel registers that follow it apply to whichever channel the
//! select register currently names. The select register is shared by all
//! channels of its bank, so a select write and the register accesses that
//! depend on it must never be interleaved with another channel's sequence.
//!
//! The buffer registers at the end of each bank are bank-wide (they are not
//! behind the select register): they hold the staging-buffer base used by
//! host-buffered device-to-device links.

use bitfield::bitfield;

/// Word-granular access to the LLDMA register block.
///
/// `offset` is a byte offset from the block base. Implementations are the
/// real BAR mapping and the test models.
pub trait Mmio {
    fn read_reg(&mut self, offset: u32) -> u32;
    fn write_reg(&mut self, offset: u32, value: u32);
}

// Global registers.
pub const AVAIL_ENQ_OFFSET: u32 = 0x0000;
pub const AVAIL_DEQ_OFFSET: u32 = 0x0004;

// Bank bases.
pub const ENQ_BANK_BASE: u32 = 0x0100;
pub const DEQ_BANK_BASE: u32 = 0x0200;

// Per-bank register offsets. CHSEL through PEER_ADDR_HI are per-channel
// (behind CHSEL); BUF_ADDR_LO through BUF_SIZE are bank-wide.
pub const CHSEL_OFFSET: u32 = 0x00;
pub const RING_ADDR_LO_OFFSET: u32 = 0x04;
pub const RING_ADDR_HI_OFFSET: u32 = 0x08;
pub const RING_SIZE_OFFSET: u32 = 0x0c;
pub const RDHEAD_OFFSET: u32 = 0x10;
pub const WRHEAD_OFFSET: u32 = 0x14;
pub const CTRL_OFFSET: u32 = 0x18;
pub const STAT_OFFSET: u32 = 0x1c;
pub const MODE_OFFSET: u32 = 0x20;
pub const PEER_ADDR_LO_OFFSET: u32 = 0x24;
pub const PEER_ADDR_HI_OFFSET: u32 = 0x28;
pub const BUF_ADDR_LO_OFFSET: u32 = 0x2c;
pub const BUF_ADDR_HI_OFFSET: u32 = 0x30;
pub const BUF_SIZE_OFFSET: u32 = 0x34;

/// The two register banks of the block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bank {
    /// Toward-device engines (host/network/peer into the device).
    Enqueue,
    /// From-device engines (device out to host/network/peer).
    Dequeue,
}

impl Bank {
    pub fn base(self) -> u32 {
        match self {
            Bank::Enqueue => ENQ_BANK_BASE,
            Bank::Dequeue => DEQ_BANK_BASE,
        }
    }

    /// Absolute offset of a per-bank register.
    pub fn reg(self, offset: u32) -> u32 {
        self.base() + offset
    }
}

bitfield! {
    /// Per-channel control register.
    #[derive(Clone, Copy)]
    pub struct CtrlReg(u32);
    impl Debug;
    pub ingress_enable, set_ingress_enable: 0;
    pub egress_enable, set_egress_enable: 1;
}

bitfield! {
    /// Per-channel status register. `busy` is the hardware activity field;
    /// writing `clear` finalizes a drained channel.
    #[derive(Clone, Copy)]
    pub struct StatReg(u32);
    impl Debug;
    pub clear, set_clear: 31;
    pub u8, busy, set_busy: 7, 0;
}

bitfield! {
    /// Per-channel mode register. `mode` is the device-to-device tag
    /// (0 = none, 1 = host-buffered, 2 = direct); `peer_chid` names the
    /// channel on the peer card.
    #[derive(Clone, Copy)]
    pub struct ModeReg(u32);
    impl Debug;
    pub u8, peer_chid, set_peer_chid: 23, 16;
    pub u8, mode, set_mode: 1, 0;
}
