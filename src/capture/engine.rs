//! Hardware capture engine: the parallel camera interface feeding a ping-pong DMA stream.
//!
//! The register-level implementation lives in `parallel` (STM32F7 DCMI + DMA2). Everything here
//! talks to it through `CaptureHardware`, so the pipeline can run against a simulated
//! peripheral on the host.

use core::cell::UnsafeCell;

use crate::config::{BYTES_PER_HALF, PACKED_HALF_LEN};
use crate::sync::{BinarySemaphore, EventFlag};

/// One half of a ping-pong buffer pair.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Half {
    A,
    B,
}

impl Half {
    /// The other half.
    pub fn other(self) -> Half {
        match self {
            Half::A => Half::B,
            Half::B => Half::A,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Half::A => 0,
            Half::B => 1,
        }
    }
}

/// Crop window in sensor bus clocks (x) and lines (y).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CropWindow {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl CropWindow {
    pub const fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        CropWindow {
            x,
            y,
            width,
            height,
        }
    }

    /// A window with no extent can't be programmed into the peripheral.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of bytes the peripheral captures for one frame through this window.
    pub fn frame_bytes(&self) -> u32 {
        u32::from(self.width) * u32::from(self.height)
    }
}

/// Access to the capture peripheral and its DMA stream.
///
/// Implementations are thin wrappers over registers; none of them may block.
pub trait CaptureHardware {
    /// Program the DMA stream for peripheral-to-memory double-buffer transfers into `targets`,
    /// `bytes_per_half` bytes per half, starting with `targets[0]`, and enable the stream.
    fn arm_dma(&mut self, targets: [*mut u8; 2], bytes_per_half: usize);

    /// Disable the DMA stream.
    fn disarm_dma(&mut self);

    /// Program the crop window registers and enable cropping.
    fn set_crop(&mut self, window: &CropWindow);

    /// Enable the peripheral and set its capture-enable bit.
    fn enable_capture(&mut self);

    /// Clear the capture-enable bit. The peripheral finishes the frame in flight first.
    fn clear_capture(&mut self);

    /// Turn the peripheral off entirely.
    fn disable_interface(&mut self);

    /// Live capture-enable bit. Reads 0 only once the in-flight frame has ended.
    fn capture_enabled(&self) -> bool;

    /// Live DMA current-target bit: the half DMA is writing right now.
    fn dma_target(&self) -> Half;
}

/// The two raw half-buffers written exclusively by DMA.
#[repr(C, align(4))]
pub struct RawCaptureBuffers {
    halves: UnsafeCell<[[u8; BYTES_PER_HALF]; 2]>,
}

// DMA writes one half while software reads the other; `completed` is the only way in.
unsafe impl Sync for RawCaptureBuffers {}

impl RawCaptureBuffers {
    pub const fn new() -> Self {
        RawCaptureBuffers {
            halves: UnsafeCell::new([[0; BYTES_PER_HALF]; 2]),
        }
    }

    /// DMA target addresses for both halves.
    pub fn targets(&self) -> [*mut u8; 2] {
        let base = self.halves.get() as *mut u8;
        [base, base.wrapping_add(BYTES_PER_HALF)]
    }

    /// The half DMA just completed and its contents.
    ///
    /// The index is the complement of the DMA current-target bit read *now*, never a cached
    /// counter: a missed or late signal then costs a chunk instead of shifting every later read
    /// onto the half DMA is filling. Call it in the same loop iteration that took the
    /// buffer-complete signal; the returned half stays stable until DMA finishes the one it is
    /// writing.
    pub fn completed<H: CaptureHardware>(&self, hw: &H) -> (Half, &[u8]) {
        let half = hw.dma_target().other();
        let ptr = self.halves.get() as *const [u8; BYTES_PER_HALF];
        // SAFETY: `half` is not the DMA target, so nothing writes it until the next swap.
        let data = unsafe { &*ptr.add(half.index()) };
        (half, &data[..])
    }
}

/// The two packed output half-buffers: written by the frame packer, read by USB.
#[repr(C, align(4))]
pub struct PackedOutputBuffers {
    halves: UnsafeCell<[[u8; PACKED_HALF_LEN]; 2]>,
}

// The packer writes half N only after DMA has returned to raw half N, by which time the
// descriptor for the previous contents of packed half N has been consumed.
unsafe impl Sync for PackedOutputBuffers {}

impl PackedOutputBuffers {
    pub const fn new() -> Self {
        PackedOutputBuffers {
            halves: UnsafeCell::new([[0; PACKED_HALF_LEN]; 2]),
        }
    }

    /// Mutable view of one packed half.
    ///
    /// # Safety
    /// The caller must be the only writer of `half` and no descriptor into `half` may still be
    /// waiting to be read.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn half_mut(&self, half: Half) -> &mut [u8] {
        let ptr = self.halves.get() as *mut [u8; PACKED_HALF_LEN];
        &mut (&mut (*ptr.add(half.index())))[..]
    }
}

/// Events raised by the capture interrupts.
#[derive(Debug)]
pub struct CaptureEvents {
    buffer_complete: BinarySemaphore,
    frame_start: EventFlag,
}

impl CaptureEvents {
    pub const fn new() -> Self {
        CaptureEvents {
            buffer_complete: BinarySemaphore::new(),
            frame_start: EventFlag::new(),
        }
    }

    /// DMA transfer-complete interrupt body, after the hardware flag is cleared.
    pub fn on_buffer_complete(&self) {
        self.buffer_complete.give();
    }

    /// Frame-start (VSYNC) interrupt body, after the hardware flag is cleared.
    pub fn on_frame_start(&self) {
        self.frame_start.set();
    }

    pub(crate) fn buffer_complete(&self) -> &BinarySemaphore {
        &self.buffer_complete
    }

    pub(crate) fn take_frame_start(&self) -> bool {
        self.frame_start.take()
    }

    /// Forget signals raised before a restart.
    pub(crate) fn reset(&self) {
        self.buffer_complete.reset();
        self.frame_start.clear();
    }
}

/// Engine errors.
#[derive(Debug, Eq, PartialEq)]
pub enum EngineError {
    /// DMA can only be reprogrammed while capture-enable is clear.
    CaptureActive,
}

/// The capture peripheral plus the raw buffers it streams into.
pub struct CaptureEngine<'a, H> {
    hw: H,
    raw: &'a RawCaptureBuffers,
}

impl<'a, H: CaptureHardware> CaptureEngine<'a, H> {
    pub fn new(hw: H, raw: &'a RawCaptureBuffers) -> Self {
        CaptureEngine { hw, raw }
    }

    /// Point DMA at both raw halves and arm the stream.
    pub fn configure(&mut self) -> Result<(), EngineError> {
        if self.hw.capture_enabled() {
            return Err(EngineError::CaptureActive);
        }
        self.hw.arm_dma(self.raw.targets(), BYTES_PER_HALF);
        Ok(())
    }

    /// Set capture-enable. Takes effect at the next frame boundary.
    pub fn start(&mut self) {
        self.hw.enable_capture();
    }

    /// Clear capture-enable. The frame in flight still completes.
    pub fn stop(&mut self) {
        self.hw.clear_capture();
    }

    /// Shut the peripheral and the DMA stream down once capture has actually stopped.
    pub fn shutdown(&mut self) {
        self.hw.disable_interface();
        self.hw.disarm_dma();
    }

    pub fn set_crop(&mut self, window: &CropWindow) {
        self.hw.set_crop(window);
    }

    pub fn capture_enabled(&self) -> bool {
        self.hw.capture_enabled()
    }

    /// See `RawCaptureBuffers::completed`.
    pub fn completed(&self) -> (Half, &'a [u8]) {
        let raw: &'a RawCaptureBuffers = self.raw;
        raw.completed(&self.hw)
    }

    pub fn hardware(&self) -> &H {
        &self.hw
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hw
    }
}
