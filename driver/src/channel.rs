// Licensed under the Apache-2.0 license

//! Channel slot bookkeeping.
//!
//! One registry per register bank. Slots are created at device init (one
//! ring each) and only ever flip between Free and Used; the device's
//! registry mutex serializes every transition.

use crate::error::LldmaError;
use crate::ring::DescriptorRing;
use crate::DmaDirection;
use xpcie_registers::Bank;

/// Longest accepted connector identifier, bytes.
pub const CONNECTOR_ID_MAX: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Free,
    Used,
}

/// Requested channel id: explicit, or the first free one.
#[derive(Debug, Clone, Copy)]
pub enum ChannelReq {
    Id(u8),
    Auto,
}

pub(crate) struct ChannelSlot {
    pub state: SlotState,
    pub ring: DescriptorRing,
    pub connector_id: String,
    pub direction: Option<DmaDirection>,
    // Software head shadows, resynced from hardware when the channel starts.
    pub rdhead: u16,
    pub wrhead: u16,
}

impl ChannelSlot {
    fn new(ring: DescriptorRing) -> Self {
        ChannelSlot {
            state: SlotState::Free,
            ring,
            connector_id: String::new(),
            direction: None,
            rdhead: 0,
            wrhead: 0,
        }
    }
}

pub(crate) struct ChannelRegistry {
    bank: Bank,
    slots: Vec<ChannelSlot>,
    implemented: u8,
}

impl ChannelRegistry {
    pub fn new(bank: Bank, implemented: u8, rings: Vec<DescriptorRing>) -> Self {
        ChannelRegistry {
            bank,
            slots: rings.into_iter().map(ChannelSlot::new).collect(),
            implemented,
        }
    }

    /// Resolves a channel request to a concrete Free slot id.
    pub fn select_slot(&self, req: ChannelReq) -> Result<u8, LldmaError> {
        match req {
            ChannelReq::Id(chid) => {
                if chid >= self.implemented {
                    return Err(LldmaError::InvalidChannel {
                        chid,
                        implemented: self.implemented,
                    });
                }
                if self.slots[chid as usize].state == SlotState::Used {
                    return Err(LldmaError::Busy(chid));
                }
                Ok(chid)
            }
            ChannelReq::Auto => (0..self.implemented)
                .find(|&chid| self.slots[chid as usize].state == SlotState::Free)
                .ok_or(LldmaError::NoFreeChannel(self.bank)),
        }
    }

    pub fn slot(&self, chid: u8) -> Result<&ChannelSlot, LldmaError> {
        if chid >= self.implemented {
            return Err(LldmaError::InvalidChannel {
                chid,
                implemented: self.implemented,
            });
        }
        Ok(&self.slots[chid as usize])
    }

    pub fn slot_mut(&mut self, chid: u8) -> Result<&mut ChannelSlot, LldmaError> {
        if chid >= self.implemented {
            return Err(LldmaError::InvalidChannel {
                chid,
                implemented: self.implemented,
            });
        }
        Ok(&mut self.slots[chid as usize])
    }

    pub fn mark_used(&mut self, chid: u8, direction: DmaDirection, connector_id: &str) {
        let slot = &mut self.slots[chid as usize];
        slot.state = SlotState::Used;
        slot.direction = Some(direction);
        slot.connector_id.clear();
        slot.connector_id.push_str(connector_id);
    }

    pub fn mark_free(&mut self, chid: u8) {
        let slot = &mut self.slots[chid as usize];
        slot.state = SlotState::Free;
        slot.direction = None;
        slot.connector_id.clear();
    }

    /// Linear scan of Used slots for a connector match.
    pub fn find_by_connector(&self, connector_id: &str) -> Option<(u8, DmaDirection)> {
        self.slots
            .iter()
            .enumerate()
            .find(|(_, slot)| slot.state == SlotState::Used && slot.connector_id == connector_id)
            .and_then(|(chid, slot)| slot.direction.map(|dir| (chid as u8, dir)))
    }

    /// Channels still Used, with their directions. Used at teardown.
    pub fn used_channels(&self) -> Vec<(u8, DmaDirection)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.state == SlotState::Used)
            .filter_map(|(chid, slot)| slot.direction.map(|dir| (chid as u8, dir)))
            .collect()
    }
}
