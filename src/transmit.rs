//! Handoff of packed chunks to the USB transmit task.
//!
//! The capture task is the single producer and never waits: a full queue drops the chunk. The
//! consumer side (`TransmitPump`) writes each chunk to a bulk endpoint and counts failures
//! without retrying.

use core::slice::from_raw_parts;

use embedded_hal::blocking::delay::DelayUs;
use heapless::spsc::{Consumer, Producer};

use crate::config::{TransmitQueueDepth, POLL_STEP_US};

/// A ready-to-send chunk in one of the packed output buffers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FrameDescriptor {
    ptr: *const u8,
    len: usize,
}

// The referent is a static packed buffer that is not rewritten until the chunk is consumed.
unsafe impl Send for FrameDescriptor {}

impl FrameDescriptor {
    pub fn new(ptr: *const u8, len: usize) -> Self {
        FrameDescriptor { ptr, len }
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// View the chunk.
    ///
    /// # Safety
    /// The buffer half the descriptor points into must not have been rewritten since the
    /// descriptor was created.
    pub unsafe fn as_slice(&self) -> &[u8] {
        from_raw_parts(self.ptr, self.len)
    }
}

/// Producer end of the transmit queue.
pub type FrameProducer<'a> = Producer<'a, FrameDescriptor, TransmitQueueDepth>;

/// Consumer end of the transmit queue.
pub type FrameConsumer<'a> = Consumer<'a, FrameDescriptor, TransmitQueueDepth>;

/// Offer a chunk to the transmit task without waiting. `false` means it was dropped.
pub fn enqueue_frame(frames: &mut FrameProducer<'_>, desc: FrameDescriptor) -> bool {
    frames.enqueue(desc).is_ok()
}

/// A bulk IN endpoint, or anything else that can take a whole chunk at once.
pub trait BulkWrite {
    type Error;

    fn write_bulk(&mut self, data: &[u8]) -> Result<(), Self::Error>;
}

/// Transmit diagnostics.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TransmitStats {
    pub sent: u32,
    pub failed: u32,
}

/// Consumer side of the handoff: moves queued chunks into a `BulkWrite` sink.
pub struct TransmitPump<'a, W> {
    frames: FrameConsumer<'a>,
    sink: W,
    stats: TransmitStats,
}

impl<'a, W: BulkWrite> TransmitPump<'a, W> {
    pub fn new(frames: FrameConsumer<'a>, sink: W) -> Self {
        TransmitPump {
            frames,
            sink,
            stats: TransmitStats::default(),
        }
    }

    /// Wait as long as it takes for the next chunk.
    pub fn dequeue_blocking<D: DelayUs<u32>>(&mut self, delay: &mut D) -> FrameDescriptor {
        loop {
            if let Some(desc) = self.frames.dequeue() {
                return desc;
            }
            delay.delay_us(POLL_STEP_US);
        }
    }

    /// Write one chunk to the sink. Returns whether the write succeeded.
    pub fn send(&mut self, desc: FrameDescriptor) -> bool {
        // SAFETY: the packer does not revisit this half until DMA has filled its raw twin again,
        // which takes longer than one bulk transfer.
        let data = unsafe { desc.as_slice() };
        match self.sink.write_bulk(data) {
            Ok(()) => {
                self.stats.sent = self.stats.sent.wrapping_add(1);
                true
            }
            Err(_) => {
                self.stats.failed = self.stats.failed.wrapping_add(1);
                false
            }
        }
    }

    /// Send everything currently queued. Returns the number of chunks taken off the queue.
    pub fn service(&mut self) -> usize {
        let mut count = 0;
        while let Some(desc) = self.frames.dequeue() {
            self.send(desc);
            count += 1;
        }
        count
    }

    pub fn stats(&self) -> TransmitStats {
        self.stats
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }
}
