// Licensed under the Apache-2.0 license

//! Connector rendezvous.
//!
//! A connector id is an opaque caller-chosen string bound to a channel at
//! acquire time. A second caller that only knows the id (not the channel
//! number or even its direction) recovers both here.

use xpcie_lldma::{DmaDirection, LldmaError, Mmio, XpcieDevice};
use xpcie_registers::Bank;

/// Finds the channel bound to `connector_id` on `device`.
///
/// The direction is not known a priori, so the enqueue bank is probed
/// first, then the dequeue bank; not-found is reported only after both.
pub fn find<M: Mmio>(
    device: &XpcieDevice<M>,
    connector_id: &str,
) -> Result<(u8, DmaDirection), LldmaError> {
    device
        .find_in_bank(Bank::Enqueue, connector_id)
        .or_else(|| device.find_in_bank(Bank::Dequeue, connector_id))
        .ok_or_else(|| LldmaError::NotFound(connector_id.to_string()))
}
