//! Compile-time configuration for the capture pipeline.

use heapless::consts;

/// Number of bytes in one line of a DMA chunk.
pub const CHUNK_WIDTH: usize = 320;

/// Number of lines in one DMA chunk (one half of the ping-pong buffer).
pub const CHUNK_LINES: usize = 30;

/// Bytes written by DMA into each raw half-buffer before it raises transfer complete.
pub const BYTES_PER_HALF: usize = CHUNK_WIDTH * CHUNK_LINES;

/// Length of the synchronization marker written at the start of a frame (one line).
pub const MARKER_LEN: usize = CHUNK_WIDTH;

/// Size of each packed output half-buffer: a full chunk plus room for the marker.
pub const PACKED_HALF_LEN: usize = BYTES_PER_HALF + MARKER_LEN;

/// Depth of the capture configuration request queue.
pub type ConfigQueueDepth = consts::U8;

/// Depth of the sensor management request queue.
pub type ManagementQueueDepth = consts::U8;

/// Depth of the frame descriptor queue feeding the USB transmit task.
pub type TransmitQueueDepth = consts::U4;

/// Longest wait for a buffer-complete signal before servicing requests, in microseconds.
pub const FRAME_WAIT_US: u32 = 10_000;

/// Wait for a configuration request while halted, in microseconds.
pub const HALTED_POLL_US: u32 = 5_000;

/// Granularity of every timed wait, in microseconds.
pub const POLL_STEP_US: u32 = 100;

/// Control bus transaction timeout handed to the blocking I2C driver, in microseconds.
pub const BUS_TIMEOUT_US: u32 = 10_000;

/// What the capture state machine does with `SetSize`/`SetCrop` while capture is running.
///
/// Reprogramming the crop window is only safe between frames, so a caller that wants hard
/// guarantees halts first. The two rules differ only in how they treat a caller that didn't.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GeometryPolicy {
    /// Apply geometry changes as soon as they are dequeued, in any state but halt-pending.
    ApplyImmediately,
    /// Discard geometry changes that arrive while capture is running.
    RequireHalted,
}

/// Runtime tunables of the capture task.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CaptureConfig {
    pub geometry_policy: GeometryPolicy,
    pub frame_wait_us: u32,
    pub halted_poll_us: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        CaptureConfig {
            geometry_policy: GeometryPolicy::ApplyImmediately,
            frame_wait_us: FRAME_WAIT_US,
            halted_poll_us: HALTED_POLL_US,
        }
    }
}
