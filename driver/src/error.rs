// Licensed under the Apache-2.0 license

use crate::DmaDirection;
use thiserror::Error;
use xpcie_registers::Bank;

/// Errors surfaced by the LLDMA driver and the userspace API on top of it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LldmaError {
    #[error("channel {0} is already in use")]
    Busy(u8),
    #[error("no free channel in the {0:?} bank")]
    NoFreeChannel(Bank),
    #[error("channel {chid} out of range (device implements {implemented})")]
    InvalidChannel { chid: u8, implemented: u8 },
    #[error("direction {0:?} is not valid for this operation")]
    InvalidDirection(DmaDirection),
    #[error("connector id must be 1..={max} bytes", max = crate::CONNECTOR_ID_MAX)]
    InvalidConnectorId,
    #[error("channel {0} is not acquired")]
    NotAcquired(u8),
    #[error("device-to-device connect requires two distinct devices")]
    SelfConnectRejected,
    #[error("connector \"{0}\" not found")]
    NotFound(String),
    #[error("channel {chid} did not drain within {timeout_ms} ms")]
    HardwareTimeout { chid: u8, timeout_ms: u64 },
    #[error("ring allocation of {size} bytes failed")]
    AllocationFailure { size: usize },
    #[error("ring depth {0} is invalid")]
    InvalidRingDepth(u16),
    #[error("descriptor ring is full")]
    QueueFull,
    #[error("no completed descriptor to dequeue")]
    QueueEmpty,
}
