// Licensed under the Apache-2.0 license

//! Recording wrapper over a register implementation.

use std::sync::{Arc, Mutex};
use xpcie_registers::Mmio;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
}

/// One register access. For reads, `value` is what the read returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    pub kind: AccessKind,
    pub offset: u32,
    pub value: u32,
}

/// Wraps any `Mmio` and records every access in order. The log handle is
/// shared, so tests keep one clone while the device owns the logger.
pub struct BusLogger<M: Mmio> {
    inner: M,
    log: Arc<Mutex<Vec<Access>>>,
}

impl<M: Mmio> BusLogger<M> {
    pub fn new(inner: M) -> Self {
        BusLogger {
            inner,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn log_handle(&self) -> Arc<Mutex<Vec<Access>>> {
        self.log.clone()
    }

    /// The writes recorded so far, in order.
    pub fn writes(log: &Arc<Mutex<Vec<Access>>>) -> Vec<Access> {
        log.lock()
            .unwrap()
            .iter()
            .copied()
            .filter(|access| access.kind == AccessKind::Write)
            .collect()
    }
}

impl<M: Mmio> Mmio for BusLogger<M> {
    fn read_reg(&mut self, offset: u32) -> u32 {
        let value = self.inner.read_reg(offset);
        self.log.lock().unwrap().push(Access {
            kind: AccessKind::Read,
            offset,
            value,
        });
        value
    }

    fn write_reg(&mut self, offset: u32, value: u32) {
        self.log.lock().unwrap().push(Access {
            kind: AccessKind::Write,
            offset,
            value,
        });
        self.inner.write_reg(offset, value);
    }
}
