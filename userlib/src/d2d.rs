// Licensed under the Apache-2.0 license

//! Device-to-device channel linking.
//!
//! A link occupies one TX channel on the sending card and one RX channel on
//! the receiving card. The host-buffered flavor stages through a
//! host-visible buffer programmed into both cards; the direct flavor moves
//! data card-to-card with no host buffer. Connect is all-or-nothing: a
//! half-built link is torn down before the error is returned.

use log::warn;
use xpcie_lldma::{ChannelReq, D2dMode, DmaDirection, LldmaError, Mmio, XpcieDevice};

/// Parameters of one device-to-device link.
#[derive(Debug, Clone)]
pub struct D2dRequest<'a> {
    pub tx_chid: u8,
    pub rx_chid: u8,
    pub mode: D2dMode,
    /// Staging buffer for `D2dMode::HostBuffered`. Zero means no buffer
    /// (direct mode) and is never written to the buffer registers.
    pub buf_addr: u64,
    pub buf_size: u32,
    pub connector_id: &'a str,
}

fn teardown<M: Mmio>(dev: &XpcieDevice<M>, chid: u8, direction: DmaDirection) {
    if let Err(err) = dev.release(chid, direction) {
        warn!("d2d: teardown of ch {chid} {direction:?} failed: {err}");
    }
}

/// Links `tx_dev`'s TX channel to `rx_dev`'s RX channel.
///
/// The TX side is established first; any later failure unwinds whatever was
/// built, so on error both devices are exactly as before the call.
pub fn connect<M: Mmio>(
    tx_dev: &XpcieDevice<M>,
    rx_dev: &XpcieDevice<M>,
    req: &D2dRequest<'_>,
) -> Result<(), LldmaError> {
    if std::ptr::eq(tx_dev, rx_dev) || tx_dev.base_hw_addr() == rx_dev.base_hw_addr() {
        return Err(LldmaError::SelfConnectRejected);
    }

    let tx_card = tx_dev.base_hw_addr();
    let rx_card = rx_dev.base_hw_addr();

    tx_dev.acquire(
        DmaDirection::D2dTx,
        ChannelReq::Id(req.tx_chid),
        req.connector_id,
    )?;
    if let Err(err) = tx_dev.program_peer(
        req.tx_chid,
        DmaDirection::D2dTx,
        req.mode,
        rx_card,
        req.rx_chid,
    ) {
        teardown(tx_dev, req.tx_chid, DmaDirection::D2dTx);
        return Err(err);
    }

    if let Err(err) = rx_dev.acquire(
        DmaDirection::D2dRx,
        ChannelReq::Id(req.rx_chid),
        req.connector_id,
    ) {
        teardown(tx_dev, req.tx_chid, DmaDirection::D2dTx);
        return Err(err);
    }

    if let Err(err) = finish(tx_dev, rx_dev, req, tx_card) {
        teardown(rx_dev, req.rx_chid, DmaDirection::D2dRx);
        teardown(tx_dev, req.tx_chid, DmaDirection::D2dTx);
        return Err(err);
    }
    Ok(())
}

/// Remaining steps once both slots are held: RX peer setup, the staging
/// buffer for the host-buffered flavor, then enables. The receiver is live
/// before the transmitter starts.
fn finish<M: Mmio>(
    tx_dev: &XpcieDevice<M>,
    rx_dev: &XpcieDevice<M>,
    req: &D2dRequest<'_>,
    tx_card: u64,
) -> Result<(), LldmaError> {
    rx_dev.program_peer(
        req.rx_chid,
        DmaDirection::D2dRx,
        req.mode,
        tx_card,
        req.tx_chid,
    )?;

    if req.mode == D2dMode::HostBuffered {
        tx_dev.program_d2d_buffer(DmaDirection::D2dTx.bank(), req.buf_addr, req.buf_size)?;
        rx_dev.program_d2d_buffer(DmaDirection::D2dRx.bank(), req.buf_addr, req.buf_size)?;
    }

    rx_dev.enable_channel(req.rx_chid, DmaDirection::D2dRx)?;
    tx_dev.enable_channel(req.tx_chid, DmaDirection::D2dTx)?;
    Ok(())
}

/// Tears a link down: RX side first, then TX. The TX teardown is attempted
/// even when the RX side fails, so a half-torn link cannot leak the TX
/// slot. The first error, if any, is returned.
pub fn disconnect<M: Mmio>(
    tx_dev: &XpcieDevice<M>,
    tx_chid: u8,
    rx_dev: &XpcieDevice<M>,
    rx_chid: u8,
) -> Result<(), LldmaError> {
    let rx_result = rx_dev.release(rx_chid, DmaDirection::D2dRx);
    if let Err(ref err) = rx_result {
        warn!("d2d: rx ch {rx_chid} teardown failed, continuing with tx: {err}");
    }
    let tx_result = tx_dev.release(tx_chid, DmaDirection::D2dTx);
    rx_result.and(tx_result)
}
