// Licensed under the Apache-2.0 license

//! Core driver for the XPCIE LLDMA engine.
//!
//! The LLDMA block multiplexes a bounded pool of physical DMA channels
//! between competing callers. This crate owns the hardware-visible
//! descriptor rings, the per-device channel registry, and the register
//! programming sequences (start, bounded stop/drain, device-to-device peer
//! setup). The userspace API is layered on top by the `liblldma` crate.

use xpcie_registers::Bank;

mod channel;
mod config;
mod device;
mod error;
mod programmer;
mod ring;

pub use channel::{ChannelReq, SlotState, CONNECTOR_ID_MAX};
pub use config::LldmaConfig;
pub use device::XpcieDevice;
pub use error::LldmaError;
pub use programmer::D2dMode;
pub use ring::{
    Completion, Descriptor, DescriptorRing, RingHeader, RingLayout, TransferRequest,
    DESCRIPTOR_SIZE, DESC_STATUS_DONE, RING_HEADER_SIZE,
};
pub use xpcie_registers::Mmio;

/// Direction of one DMA channel.
///
/// Host- and network-facing channels move data between the device and this
/// host or the network ports; the D2D variants are the two ends of a
/// device-to-device link. The direction decides which register bank (and so
/// which slot family) the channel lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaDirection {
    HostToDev,
    DevToHost,
    NetToDev,
    DevToNet,
    D2dRx,
    D2dTx,
}

impl DmaDirection {
    /// The register bank / slot family this direction is served by.
    pub fn bank(self) -> Bank {
        match self {
            DmaDirection::HostToDev | DmaDirection::NetToDev | DmaDirection::D2dRx => Bank::Enqueue,
            DmaDirection::DevToHost | DmaDirection::DevToNet | DmaDirection::D2dTx => Bank::Dequeue,
        }
    }

    pub fn is_host_facing(self) -> bool {
        matches!(self, DmaDirection::HostToDev | DmaDirection::DevToHost)
    }

    pub fn is_d2d(self) -> bool {
        matches!(self, DmaDirection::D2dRx | DmaDirection::D2dTx)
    }
}
