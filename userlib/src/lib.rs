// Licensed under the Apache-2.0 license

//! Userspace control API for XPCIE LLDMA channels.
//!
//! Callers acquire a channel (explicit id or first-free) under a connector
//! id, hand that id to an unrelated thread or process to rendezvous with
//! the same channel, post and reap descriptors on the mapped ring, and link
//! channels across two cards with the device-to-device connector.
//!
//! Callers are expected to hold the device's region lock (from the
//! reconfiguration reference-count subsystem) around channel use; this
//! crate does not take it.

pub mod binder;
pub mod d2d;

pub use binder::find;
pub use d2d::{connect as d2d_connect, disconnect as d2d_disconnect, D2dRequest};
pub use xpcie_lldma::{
    ChannelReq, Completion, D2dMode, DmaDirection, LldmaConfig, LldmaError, SlotState,
    TransferRequest, XpcieDevice, CONNECTOR_ID_MAX,
};
pub use xpcie_registers::{Bank, Mmio};
