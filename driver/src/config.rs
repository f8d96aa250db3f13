// Licensed under the Apache-2.0 license

use std::time::Duration;

/// Widest channel pool the register interface can describe: the capability
/// masks are one bit per channel in a 32-bit register.
pub const MAX_CHANNEL_PAIRS: u8 = 32;

/// Configuration of one LLDMA device instance.
///
/// These are the defaults for the shipping card; platform bring-up overrides
/// individual fields.
#[derive(Clone)]
pub struct LldmaConfig {
    /// Base hardware address of this card on the fabric. Peer cards program
    /// it into their address registers for device-to-device links.
    pub base_hw_addr: u64,
    /// Channel pairs laid out at device init. Rings are allocated for all of
    /// them in both families, whether or not the hardware implements them.
    pub channel_pairs: u8,
    /// Descriptors per ring.
    pub ring_depth: u16,
    /// Interval between drain polls while stopping a channel.
    pub drain_poll_interval: Duration,
    /// Ceiling on the whole drain wait.
    pub drain_timeout: Duration,
    /// Sleep used between drain polls. Tests substitute a no-op so the full
    /// poll schedule runs without wall-clock time.
    pub sleep: fn(Duration),
}

impl Default for LldmaConfig {
    fn default() -> Self {
        LldmaConfig {
            base_hw_addr: 0x0,
            channel_pairs: 16,
            ring_depth: 255,
            drain_poll_interval: Duration::from_millis(100),
            drain_timeout: Duration::from_millis(3000),
            sleep: std::thread::sleep,
        }
    }
}
