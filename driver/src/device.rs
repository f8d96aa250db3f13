// Licensed under the Apache-2.0 license

//! Per-device LLDMA state: the channel registries for both banks, the
//! register lock, and the caller-facing acquire/release/find and
//! descriptor-queue operations.

use crate::channel::{ChannelRegistry, ChannelReq, SlotState, CONNECTOR_ID_MAX};
use crate::config::{LldmaConfig, MAX_CHANNEL_PAIRS};
use crate::error::LldmaError;
use crate::programmer::{D2dMode, RegisterProgrammer};
use crate::ring::{Completion, DescriptorRing, TransferRequest};
use crate::DmaDirection;
use log::{debug, info, warn};
use std::sync::Mutex;
use xpcie_registers::{Bank, Mmio, AVAIL_DEQ_OFFSET, AVAIL_ENQ_OFFSET};

struct Registries {
    enq: ChannelRegistry,
    deq: ChannelRegistry,
}

impl Registries {
    fn bank_mut(&mut self, bank: Bank) -> &mut ChannelRegistry {
        match bank {
            Bank::Enqueue => &mut self.enq,
            Bank::Dequeue => &mut self.deq,
        }
    }

    fn bank(&self, bank: Bank) -> &ChannelRegistry {
        match bank {
            Bank::Enqueue => &self.enq,
            Bank::Dequeue => &self.deq,
        }
    }
}

/// One LLDMA device instance.
///
/// The registry mutex serializes slot-state transitions; the register lock
/// (around the mmio handle) serializes select+operate sequences and is
/// strictly narrower: a drain poll re-takes it per attempt so other
/// channels' register traffic keeps flowing during the wait.
pub struct XpcieDevice<M: Mmio> {
    config: LldmaConfig,
    mmio: Mutex<M>,
    registries: Mutex<Registries>,
    implemented: u8,
}

impl<M: Mmio> XpcieDevice<M> {
    /// Initializes the device: queries the capability masks, lays out one
    /// ring per configured slot in both banks, and builds the registries.
    /// Rings live until the device is dropped; acquire/release only reset
    /// them.
    pub fn new(config: LldmaConfig, mut mmio: M) -> Result<Self, LldmaError> {
        let pairs = config.channel_pairs.min(MAX_CHANNEL_PAIRS);

        let avail_rx = mmio.read_reg(AVAIL_ENQ_OFFSET);
        let avail_tx = mmio.read_reg(AVAIL_DEQ_OFFSET);
        let usable = (avail_rx | avail_tx).count_ones() as u8;
        let implemented = usable.min(pairs);
        if usable > pairs {
            warn!(
                "lldma: hardware implements {usable} channel pairs, configured for {pairs}"
            );
        }

        let alloc_rings = |count: u8| -> Result<Vec<DescriptorRing>, LldmaError> {
            (0..count)
                .map(|_| DescriptorRing::new(config.ring_depth))
                .collect()
        };

        let registries = Registries {
            enq: ChannelRegistry::new(Bank::Enqueue, implemented, alloc_rings(pairs)?),
            deq: ChannelRegistry::new(Bank::Dequeue, implemented, alloc_rings(pairs)?),
        };

        info!(
            "lldma: device at {:#x} up, {implemented} channel pairs (rx mask {avail_rx:#010x}, tx mask {avail_tx:#010x})",
            config.base_hw_addr
        );

        Ok(XpcieDevice {
            config,
            mmio: Mutex::new(mmio),
            registries: Mutex::new(registries),
            implemented,
        })
    }

    /// Channel pairs usable on this device, from the capability masks.
    pub fn implemented_channels(&self) -> u8 {
        self.implemented
    }

    /// This card's base address on the fabric, as peers must program it.
    pub fn base_hw_addr(&self) -> u64 {
        self.config.base_hw_addr
    }

    fn programmer(&self) -> RegisterProgrammer<'_, M> {
        RegisterProgrammer::new(&self.mmio, &self.config)
    }

    fn validate_connector(connector_id: &str) -> Result<(), LldmaError> {
        if connector_id.is_empty() || connector_id.len() > CONNECTOR_ID_MAX {
            return Err(LldmaError::InvalidConnectorId);
        }
        Ok(())
    }

    /// Claims a channel and starts it on its local ring. For D2D-tagged
    /// directions the slot is claimed but not started; the D2D connector
    /// programs the peer address and enables it afterwards.
    ///
    /// Returns the channel id and the size a user mapping of its ring must
    /// cover.
    pub fn acquire(
        &self,
        direction: DmaDirection,
        req: ChannelReq,
        connector_id: &str,
    ) -> Result<(u8, usize), LldmaError> {
        Self::validate_connector(connector_id)?;

        let mut regs = self.registries.lock().unwrap();
        let registry = regs.bank_mut(direction.bank());
        let chid = registry.select_slot(req)?;

        let slot = registry.slot_mut(chid)?;
        slot.ring.reset();
        let ring_addr = slot.ring.base_addr();
        let depth = slot.ring.depth();
        let mappable = slot.ring.mappable_size();

        if !direction.is_d2d() {
            let (rdhead, wrhead) = self.programmer().start(chid, direction, ring_addr, depth);
            slot.rdhead = rdhead;
            slot.wrhead = wrhead;
        }
        registry.mark_used(chid, direction, connector_id);

        info!("lldma: acquired ch {chid} {direction:?} for \"{connector_id}\"");
        Ok((chid, mappable))
    }

    /// Stops a channel and returns its slot to the pool.
    ///
    /// Cleanup is best-effort: the slot is freed even when the hardware
    /// drain times out, and the timeout is returned after cleanup so a
    /// stuck engine cannot leak a slot.
    pub fn release(&self, chid: u8, direction: DmaDirection) -> Result<(), LldmaError> {
        let mut regs = self.registries.lock().unwrap();
        let registry = regs.bank_mut(direction.bank());
        if registry.slot(chid)?.state == SlotState::Free {
            debug!("lldma: release of free ch {chid} {direction:?} ignored");
            return Ok(());
        }

        let result = self.programmer().stop(chid, direction);
        registry.mark_free(chid);
        info!("lldma: released ch {chid} {direction:?}");
        result
    }

    /// Finds the Used channel bound to `connector_id` in one bank.
    pub fn find_in_bank(
        &self,
        bank: Bank,
        connector_id: &str,
    ) -> Option<(u8, DmaDirection)> {
        let regs = self.registries.lock().unwrap();
        regs.bank(bank).find_by_connector(connector_id)
    }

    /// Slot state, for callers tracking their own cleanup.
    pub fn slot_state(&self, bank: Bank, chid: u8) -> Result<SlotState, LldmaError> {
        let regs = self.registries.lock().unwrap();
        Ok(regs.bank(bank).slot(chid)?.state)
    }

    /// Points an acquired D2D channel at its peer card.
    pub fn program_peer(
        &self,
        chid: u8,
        direction: DmaDirection,
        mode: D2dMode,
        peer_addr: u64,
        peer_chid: u8,
    ) -> Result<(), LldmaError> {
        if !direction.is_d2d() {
            return Err(LldmaError::InvalidDirection(direction));
        }
        let regs = self.registries.lock().unwrap();
        if regs.bank(direction.bank()).slot(chid)?.state != SlotState::Used {
            return Err(LldmaError::NotAcquired(chid));
        }
        self.programmer()
            .program_peer(chid, direction, mode, peer_addr, peer_chid);
        Ok(())
    }

    /// Programs the bank-wide staging buffer for host-buffered D2D. A zero
    /// buffer address means direct mode and never reaches the registers.
    pub fn program_d2d_buffer(
        &self,
        bank: Bank,
        addr: u64,
        size: u32,
    ) -> Result<(), LldmaError> {
        if addr == 0 {
            debug!("lldma: zero staging buffer, direct mode, skipping write");
            return Ok(());
        }
        self.programmer().program_buffer(bank, addr, size);
        Ok(())
    }

    /// Enables an acquired D2D channel once its peer address is programmed.
    pub fn enable_channel(&self, chid: u8, direction: DmaDirection) -> Result<(), LldmaError> {
        let mut regs = self.registries.lock().unwrap();
        let slot = regs.bank_mut(direction.bank()).slot_mut(chid)?;
        if slot.state != SlotState::Used {
            return Err(LldmaError::NotAcquired(chid));
        }
        let (rdhead, wrhead) = self.programmer().enable(chid, direction);
        slot.rdhead = rdhead;
        slot.wrhead = wrhead;
        Ok(())
    }

    /// Posts a transfer on an acquired channel's ring.
    pub fn enqueue(
        &self,
        chid: u8,
        direction: DmaDirection,
        req: TransferRequest,
    ) -> Result<(), LldmaError> {
        let mut regs = self.registries.lock().unwrap();
        let slot = regs.bank_mut(direction.bank()).slot_mut(chid)?;
        if slot.state != SlotState::Used {
            return Err(LldmaError::NotAcquired(chid));
        }
        slot.ring.push(req)
    }

    /// Reaps one completed descriptor from an acquired channel's ring.
    pub fn dequeue(&self, chid: u8, direction: DmaDirection) -> Result<Completion, LldmaError> {
        let mut regs = self.registries.lock().unwrap();
        let slot = regs.bank_mut(direction.bank()).slot_mut(chid)?;
        if slot.state != SlotState::Used {
            return Err(LldmaError::NotAcquired(chid));
        }
        slot.ring.pop()
    }
}

impl<M: Mmio> Drop for XpcieDevice<M> {
    fn drop(&mut self) {
        // Quiesce anything a caller left running so hardware is not polling
        // rings we are about to free. Best-effort, like release.
        let leftover: Vec<(u8, DmaDirection)> = {
            let regs = self.registries.get_mut().unwrap();
            let mut all = regs.enq.used_channels();
            all.extend(regs.deq.used_channels());
            all
        };
        for (chid, direction) in leftover {
            warn!("lldma: ch {chid} {direction:?} still acquired at teardown");
            if let Err(err) = self.programmer().stop(chid, direction) {
                warn!("lldma: teardown stop of ch {chid} failed: {err}");
            }
            self.registries
                .get_mut()
                .unwrap()
                .bank_mut(direction.bank())
                .mark_free(chid);
        }
    }
}
