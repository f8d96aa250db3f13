// Licensed under the Apache-2.0 license

//! Descriptor ring layout and allocation.
//!
//! The ring is the binary contract with the DMA engine: a 64-byte header
//! followed by `size` 64-byte descriptors, page-aligned so the base address
//! programmed into the device registers can also be mapped into a user
//! process unchanged.

use crate::error::LldmaError;
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

pub const DESCRIPTOR_SIZE: usize = 64;
pub const RING_HEADER_SIZE: usize = 64;

/// Completion flag in `Descriptor::status`, set by hardware.
pub const DESC_STATUS_DONE: u8 = 0x01;

/// One in-flight transfer request. Field offsets and the 64-byte footprint
/// are fixed by the hardware.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct Descriptor {
    pub task_id: u16,
    pub op: u8,
    pub status: u8,
    pub len: u32,
    pub addr: u64,
    _reserved: [u8; 48],
}

const _: () = assert!(core::mem::size_of::<Descriptor>() == DESCRIPTOR_SIZE);

impl Descriptor {
    pub fn new(task_id: u16, op: u8, len: u32, addr: u64) -> Self {
        Descriptor {
            task_id,
            op,
            status: 0,
            len,
            addr,
            _reserved: [0; 48],
        }
    }
}

/// Ring header shared with hardware. `readhead`/`writehead` index the
/// descriptor array; each side of the transfer owns one of them.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct RingHeader {
    pub size: u16,
    pub readhead: u16,
    pub writehead: u16,
    _reserved: [u8; 58],
}

const _: () = assert!(core::mem::size_of::<RingHeader>() == RING_HEADER_SIZE);

/// One transfer handed to `enqueue`.
#[derive(Debug, Clone, Copy)]
pub struct TransferRequest {
    pub task_id: u16,
    pub op: u8,
    pub len: u32,
    pub addr: u64,
}

/// A completed descriptor observed by `dequeue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub task_id: u16,
    pub op: u8,
    pub status: u8,
    pub len: u32,
    pub addr: u64,
}

/// Validated allocation shape for a ring of `depth` descriptors: header plus
/// descriptor array, rounded to the cache line and then to the page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingLayout {
    pub align: usize,
    pub size: usize,
}

impl RingLayout {
    pub fn for_depth(depth: u16) -> Result<RingLayout, LldmaError> {
        if depth == 0 {
            return Err(LldmaError::InvalidRingDepth(depth));
        }
        let raw = RING_HEADER_SIZE + depth as usize * DESCRIPTOR_SIZE;
        let cache_aligned = raw.next_multiple_of(DESCRIPTOR_SIZE);
        let page = page_size();
        Ok(RingLayout {
            align: page,
            size: cache_aligned.next_multiple_of(page),
        })
    }
}

fn page_size() -> usize {
    // SAFETY: sysconf is a pure query.
    let sz = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if sz <= 0 {
        4096
    } else {
        sz as usize
    }
}

/// A hardware-visible descriptor ring and the memory backing it.
///
/// Allocated once per channel slot at device init and freed at device
/// teardown; acquire/release only reset its contents.
pub struct DescriptorRing {
    ptr: NonNull<u8>,
    layout: Layout,
    depth: u16,
}

// The backing block is uniquely owned by this value and only reached
// through &self/&mut self.
unsafe impl Send for DescriptorRing {}
unsafe impl Sync for DescriptorRing {}

impl DescriptorRing {
    pub fn new(depth: u16) -> Result<Self, LldmaError> {
        let shape = RingLayout::for_depth(depth)?;
        let layout = Layout::from_size_align(shape.size, shape.align)
            .map_err(|_| LldmaError::AllocationFailure { size: shape.size })?;
        // SAFETY: the layout has non-zero size.
        let ptr = unsafe { alloc_zeroed(layout) };
        let Some(ptr) = NonNull::new(ptr) else {
            return Err(LldmaError::AllocationFailure { size: shape.size });
        };
        let mut ring = DescriptorRing { ptr, layout, depth };
        ring.header_mut().size = depth;
        Ok(ring)
    }

    /// A ring with no backing memory. Dropping it is a no-op; every
    /// operation on it reports an empty/full queue.
    pub fn empty() -> Self {
        DescriptorRing {
            ptr: NonNull::dangling(),
            layout: Layout::new::<u8>(),
            depth: 0,
        }
    }

    pub fn depth(&self) -> u16 {
        self.depth
    }

    /// Base address programmed into the device's ring-address registers.
    pub fn base_addr(&self) -> u64 {
        self.ptr.as_ptr() as u64
    }

    /// Size a user mapping of this ring must cover.
    pub fn mappable_size(&self) -> usize {
        if self.depth == 0 {
            0
        } else {
            self.layout.size()
        }
    }

    pub fn header(&self) -> &RingHeader {
        debug_assert!(self.depth != 0);
        // SAFETY: the header lives at offset 0 of the live allocation.
        unsafe { &*(self.ptr.as_ptr() as *const RingHeader) }
    }

    pub fn header_mut(&mut self) -> &mut RingHeader {
        debug_assert!(self.depth != 0);
        // SAFETY: as above, and &mut self guarantees uniqueness.
        unsafe { &mut *(self.ptr.as_ptr() as *mut RingHeader) }
    }

    fn descriptor_ptr(&self, index: u16) -> *mut Descriptor {
        debug_assert!(index < self.depth);
        // SAFETY: index is within the descriptor array.
        unsafe {
            self.ptr
                .as_ptr()
                .add(RING_HEADER_SIZE)
                .cast::<Descriptor>()
                .add(index as usize)
        }
    }

    pub fn descriptor(&self, index: u16) -> &Descriptor {
        // SAFETY: in-bounds pointer, shared borrow tied to &self.
        unsafe { &*self.descriptor_ptr(index) }
    }

    pub fn descriptor_mut(&mut self, index: u16) -> &mut Descriptor {
        // SAFETY: in-bounds pointer, unique borrow tied to &mut self.
        unsafe { &mut *self.descriptor_ptr(index) }
    }

    /// Zeroes the descriptor area and resets both heads. Called on acquire
    /// so a new owner never sees a previous owner's descriptors.
    pub fn reset(&mut self) {
        if self.depth == 0 {
            return;
        }
        // SAFETY: writes cover exactly the descriptor array.
        unsafe {
            std::ptr::write_bytes(
                self.ptr.as_ptr().add(RING_HEADER_SIZE),
                0,
                self.depth as usize * DESCRIPTOR_SIZE,
            );
        }
        let hdr = self.header_mut();
        hdr.readhead = 0;
        hdr.writehead = 0;
    }

    /// Software producer side: writes a descriptor at `writehead` and
    /// advances it. The entry before `readhead` stays unused so a full ring
    /// is distinguishable from an empty one.
    pub fn push(&mut self, req: TransferRequest) -> Result<(), LldmaError> {
        if self.depth == 0 {
            return Err(LldmaError::QueueFull);
        }
        let hdr = self.header();
        let wr = hdr.writehead;
        let next = (wr + 1) % self.depth;
        if next == hdr.readhead {
            return Err(LldmaError::QueueFull);
        }
        *self.descriptor_mut(wr) = Descriptor::new(req.task_id, req.op, req.len, req.addr);
        self.header_mut().writehead = next;
        Ok(())
    }

    /// Software consumer side: returns the descriptor at `readhead` once
    /// hardware has marked it complete, advancing past it.
    pub fn pop(&mut self) -> Result<Completion, LldmaError> {
        if self.depth == 0 {
            return Err(LldmaError::QueueEmpty);
        }
        let hdr = self.header();
        let rd = hdr.readhead;
        if rd == hdr.writehead {
            return Err(LldmaError::QueueEmpty);
        }
        let desc = *self.descriptor(rd);
        if desc.status & DESC_STATUS_DONE == 0 {
            return Err(LldmaError::QueueEmpty);
        }
        self.header_mut().readhead = (rd + 1) % self.depth;
        Ok(Completion {
            task_id: desc.task_id,
            op: desc.op,
            status: desc.status,
            len: desc.len,
            addr: desc.addr,
        })
    }
}

impl Drop for DescriptorRing {
    fn drop(&mut self) {
        if self.depth == 0 {
            return;
        }
        // SAFETY: allocated in new() with this exact layout.
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
    }
}
