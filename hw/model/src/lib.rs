// Licensed under the Apache-2.0 license

//! Hardware models for the XPCIE LLDMA block.
//!
//! `LldmaModelEmulated` is a register-level behavioral model of the block:
//! it honors the select-register protocol, tracks per-channel control and
//! address state, and emulates the busy/clear drain handshake with a
//! configurable settle schedule (including a never-settling mode for
//! timeout tests). `BusLogger` wraps any register implementation and
//! records the exact access sequence so tests can assert on register
//! traffic, down to "no writes happened at all".

mod bus_logger;
mod model_emulated;

pub use bus_logger::{Access, AccessKind, BusLogger};
pub use model_emulated::{ChannelSnapshot, LldmaModelEmulated, ModelInitParams};
