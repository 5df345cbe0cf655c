//! Capture state machine: owns the capture configuration and the halt/resume protocol, and runs
//! the frame packer while capture is live.
//!
//! ```text
//!   RUNNING ──Halt{true}──> HALT_PENDING ──capture bit reads 0──> HALTED
//!      ▲                                                            │
//!      └──────────────────────────Halt{false}──────────────────────┘
//! ```
//!
//! The capture task is the only code that mutates `CaptureState`. Configuration arrives through
//! a request queue so callers never touch the peripheral while DMA is streaming.

use core::fmt;

use embedded_hal::blocking::delay::DelayUs;
use heapless::spsc::{Consumer, Producer};

use super::engine::{
    CaptureEngine, CaptureEvents, CaptureHardware, CropWindow, EngineError, PackedOutputBuffers,
};
use super::packer;
use crate::config::{
    CaptureConfig, ConfigQueueDepth, GeometryPolicy, TransmitQueueDepth,
};
use crate::sync::{Notify, PollBudget};
use crate::transmit::{enqueue_frame, FrameDescriptor};

/// Completion callback of a halt or resume; the object it points to is its own context.
pub type HaltCallback = &'static (dyn Notify + Sync);

/// A capture configuration change, consumed exactly once by the capture task.
#[derive(Clone, Copy)]
pub enum ConfigRequest {
    /// Sensor output size, in bus clocks by lines.
    SetSize { width: u16, height: u16 },
    /// Crop window origin and extent, in bus clocks by lines.
    SetCrop {
        x: u16,
        y: u16,
        width: u16,
        height: u16,
    },
    /// Pack pairs of 4-bit samples into bytes before transmitting.
    SetPacking { enabled: bool },
    /// Stop (`true`) or restart (`false`) capture. `callback` fires once the requested state
    /// holds: for a halt, after the peripheral has finished its frame.
    Halt {
        enabled: bool,
        callback: Option<HaltCallback>,
    },
}

impl fmt::Debug for ConfigRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ConfigRequest::SetSize { width, height } => f
                .debug_struct("SetSize")
                .field("width", &width)
                .field("height", &height)
                .finish(),
            ConfigRequest::SetCrop {
                x,
                y,
                width,
                height,
            } => f
                .debug_struct("SetCrop")
                .field("x", &x)
                .field("y", &y)
                .field("width", &width)
                .field("height", &height)
                .finish(),
            ConfigRequest::SetPacking { enabled } => f
                .debug_struct("SetPacking")
                .field("enabled", &enabled)
                .finish(),
            // The callback is an opaque object
            ConfigRequest::Halt { enabled, callback } => f
                .debug_struct("Halt")
                .field("enabled", &enabled)
                .field("callback", &callback.map(|_| ".."))
                .finish(),
        }
    }
}

/// Where the capture pipeline is in the halt protocol.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mode {
    Running,
    HaltPending,
    Halted,
}

/// Everything the capture peripheral is set up to receive.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Geometry {
    pub width: u16,
    pub height: u16,
    pub crop: CropWindow,
    pub pack: bool,
}

impl Geometry {
    /// The requests that move a running capture task to this geometry, in the order to queue them.
    pub fn requests(&self) -> [ConfigRequest; 3] {
        [
            ConfigRequest::SetSize {
                width: self.width,
                height: self.height,
            },
            ConfigRequest::SetCrop {
                x: self.crop.x,
                y: self.crop.y,
                width: self.crop.width,
                height: self.crop.height,
            },
            ConfigRequest::SetPacking { enabled: self.pack },
        ]
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Geometry {
            width: 320,
            height: 240,
            crop: CropWindow::new(0, 0, 320, 240),
            pack: false,
        }
    }
}

/// Capture configuration plus halt bookkeeping.
pub struct CaptureState {
    pub width: u16,
    pub height: u16,
    pub crop: CropWindow,
    pub pack: bool,
    /// Payload bytes sent since the last frame marker.
    pub byte_count: u32,
    mode: Mode,
    halt_callback: Option<HaltCallback>,
}

impl CaptureState {
    pub fn new(geometry: Geometry) -> Self {
        CaptureState {
            width: geometry.width,
            height: geometry.height,
            crop: geometry.crop,
            pack: geometry.pack,
            byte_count: 0,
            mode: Mode::Running,
            halt_callback: None,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn halted(&self) -> bool {
        self.mode == Mode::Halted
    }

    pub fn halt_pending(&self) -> bool {
        self.mode == Mode::HaltPending
    }

    /// The crop window clipped to the sensor output size.
    pub fn window(&self) -> CropWindow {
        let max_width = self.width.saturating_sub(self.crop.x);
        let max_height = self.height.saturating_sub(self.crop.y);
        CropWindow::new(
            self.crop.x,
            self.crop.y,
            self.crop.width.min(max_width),
            self.crop.height.min(max_height),
        )
    }
}

/// What happened to the chunk handled in one loop iteration.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChunkOutcome {
    /// A descriptor went to the transmit queue.
    Published,
    /// The transmit queue was full and the chunk was dropped.
    Dropped,
}

/// Pipeline diagnostics.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CaptureStats {
    pub published: u32,
    pub dropped: u32,
    pub wait_timeouts: u32,
    pub markers: u32,
}

/// The capture task: frame packer plus capture state machine.
pub struct CaptureTask<'a, H, D> {
    engine: CaptureEngine<'a, H>,
    packed: &'a PackedOutputBuffers,
    events: &'a CaptureEvents,
    requests: Consumer<'a, ConfigRequest, ConfigQueueDepth>,
    frames: Producer<'a, FrameDescriptor, TransmitQueueDepth>,
    delay: D,
    config: CaptureConfig,
    state: CaptureState,
    stats: CaptureStats,
    dropping: bool,
}

impl<'a, H, D> CaptureTask<'a, H, D>
where
    H: CaptureHardware,
    D: DelayUs<u32>,
{
    /// Program the crop window, arm DMA and start capture with `geometry`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mut engine: CaptureEngine<'a, H>,
        packed: &'a PackedOutputBuffers,
        events: &'a CaptureEvents,
        requests: Consumer<'a, ConfigRequest, ConfigQueueDepth>,
        frames: Producer<'a, FrameDescriptor, TransmitQueueDepth>,
        delay: D,
        config: CaptureConfig,
        geometry: Geometry,
    ) -> Result<Self, EngineError> {
        let state = CaptureState::new(geometry);
        engine.set_crop(&state.window());
        engine.configure()?;
        events.reset();
        engine.start();

        Ok(CaptureTask {
            engine,
            packed,
            events,
            requests,
            frames,
            delay,
            config,
            state,
            stats: CaptureStats::default(),
            dropping: false,
        })
    }

    /// One iteration of the capture loop.
    ///
    /// Unless halted, wait (bounded) for a completed DMA half and pack it. Then, unless a halt is
    /// pending, service at most one configuration request, waiting briefly for one when halted.
    /// Finally promote a pending halt once the peripheral reports capture has stopped.
    pub fn run_once(&mut self) -> Option<ChunkOutcome> {
        let mut outcome = None;

        if self.state.mode != Mode::Halted {
            let timeout = self.config.frame_wait_us;
            if self
                .events
                .buffer_complete()
                .take_timeout(&mut self.delay, timeout)
            {
                outcome = Some(self.pack_completed());
            } else {
                self.stats.wait_timeouts = self.stats.wait_timeouts.wrapping_add(1);
            }
        }

        if self.state.mode != Mode::HaltPending {
            let wait = if self.state.halted() {
                self.config.halted_poll_us
            } else {
                0
            };
            if let Some(req) = self.next_request(wait) {
                self.apply(req);
            }
        }

        self.poll_halt();
        outcome
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats
    }

    pub fn engine(&self) -> &CaptureEngine<'a, H> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut CaptureEngine<'a, H> {
        &mut self.engine
    }

    /// Pack the half DMA just finished and hand it to the transmit queue.
    fn pack_completed(&mut self) -> ChunkOutcome {
        let (half, raw) = self.engine.completed();
        let frame_start = self.events.take_frame_start();

        // SAFETY: packed half N is only rewritten after DMA has filled raw half N again, a full
        // chunk period after its previous descriptor was queued.
        let out = unsafe { self.packed.half_mut(half) };
        let len = packer::pack_chunk(raw, out, self.state.pack, frame_start);

        if frame_start {
            self.stats.markers = self.stats.markers.wrapping_add(1);
            self.state.byte_count = 0;
        }
        self.state.byte_count = self
            .state
            .byte_count
            .wrapping_add(packer::payload_len(self.state.pack) as u32);

        let desc = FrameDescriptor::new(out.as_ptr(), len);
        if enqueue_frame(&mut self.frames, desc) {
            self.stats.published = self.stats.published.wrapping_add(1);
            self.dropping = false;
            ChunkOutcome::Published
        } else {
            self.stats.dropped = self.stats.dropped.wrapping_add(1);
            if !self.dropping {
                log_warn!("transmit queue full, dropping chunks");
                self.dropping = true;
            }
            ChunkOutcome::Dropped
        }
    }

    fn next_request(&mut self, wait_us: u32) -> Option<ConfigRequest> {
        let mut budget = PollBudget::new(wait_us);
        loop {
            if let Some(req) = self.requests.dequeue() {
                return Some(req);
            }
            if budget.exhausted() {
                return None;
            }
            budget.step(&mut self.delay);
        }
    }

    fn geometry_allowed(&self) -> bool {
        match self.config.geometry_policy {
            GeometryPolicy::ApplyImmediately => true,
            GeometryPolicy::RequireHalted => self.state.halted(),
        }
    }

    fn apply(&mut self, req: ConfigRequest) {
        match req {
            ConfigRequest::SetSize { width, height } => {
                if !self.geometry_allowed() {
                    log_warn!("size {}x{} ignored, capture not halted", width, height);
                    return;
                }
                self.state.width = width;
                self.state.height = height;
                self.engine.set_crop(&self.state.window());
                log_info!("capture size {}x{}", width, height);
            }
            ConfigRequest::SetCrop {
                x,
                y,
                width,
                height,
            } => {
                let crop = CropWindow::new(x, y, width, height);
                if crop.is_empty() {
                    log_warn!("empty crop window ignored");
                    return;
                }
                if !self.geometry_allowed() {
                    log_warn!("crop ignored, capture not halted");
                    return;
                }
                self.state.crop = crop;
                self.engine.set_crop(&self.state.window());
                log_info!("capture crop {}x{} at ({}, {})", width, height, x, y);
            }
            ConfigRequest::SetPacking { enabled } => {
                self.state.pack = enabled;
                log_info!("nibble packing {}", if enabled { "on" } else { "off" });
            }
            ConfigRequest::Halt { enabled, callback } => match (enabled, self.state.mode) {
                (true, Mode::Running) => {
                    // The peripheral keeps capturing until the end of the current frame
                    self.engine.stop();
                    self.state.halt_callback = callback;
                    self.state.mode = Mode::HaltPending;
                    log_info!("capture halt pending");
                }
                (false, Mode::Halted) => self.resume(callback),
                // Requests are never dequeued while a halt is pending
                (_, Mode::HaltPending) => {}
                // Already in the requested state
                (true, Mode::Halted) | (false, Mode::Running) => notify(callback),
            },
        }
    }

    fn resume(&mut self, callback: Option<HaltCallback>) {
        self.engine.set_crop(&self.state.window());
        if let Err(e) = self.engine.configure() {
            log_warn!("DMA rearm refused: {:?}", e);
        }
        self.events.reset();
        self.engine.start();

        self.state.byte_count = 0;
        self.state.mode = Mode::Running;
        log_info!("capture resumed");
        notify(callback);
    }

    fn poll_halt(&mut self) {
        if self.state.mode == Mode::HaltPending && !self.engine.capture_enabled() {
            self.engine.shutdown();
            self.state.mode = Mode::Halted;
            log_info!("capture halted");
            notify(self.state.halt_callback.take());
        }
    }
}

fn notify(callback: Option<HaltCallback>) {
    if let Some(cb) = callback {
        cb.notify();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_is_clipped_to_output_size() {
        let mut state = CaptureState::new(Geometry::default());
        assert_eq!(state.window(), CropWindow::new(0, 0, 320, 240));

        state.crop = CropWindow::new(8, 4, 320, 240);
        assert_eq!(state.window(), CropWindow::new(8, 4, 312, 236));

        state.width = 4;
        assert_eq!(state.window().width, 0);
    }

    #[test]
    fn debug_hides_the_callback_object() {
        static DONE: crate::sync::BinarySemaphore = crate::sync::BinarySemaphore::new();

        let req = ConfigRequest::Halt {
            enabled: true,
            callback: Some(&DONE),
        };
        assert_eq!(
            format!("{:?}", req),
            "Halt { enabled: true, callback: Some(\"..\") }"
        );
        let req = ConfigRequest::SetSize {
            width: 160,
            height: 120,
        };
        assert_eq!(format!("{:?}", req), "SetSize { width: 160, height: 120 }");
    }

    #[test]
    fn geometry_requests_carry_every_field() {
        let geometry = Geometry {
            width: 648,
            height: 244,
            crop: CropWindow::new(4, 2, 640, 240),
            pack: true,
        };
        let mut state = CaptureState::new(Geometry::default());
        for req in geometry.requests().iter() {
            match *req {
                ConfigRequest::SetSize { width, height } => {
                    state.width = width;
                    state.height = height;
                }
                ConfigRequest::SetCrop {
                    x,
                    y,
                    width,
                    height,
                } => state.crop = CropWindow::new(x, y, width, height),
                ConfigRequest::SetPacking { enabled } => state.pack = enabled,
                ConfigRequest::Halt { .. } => panic!("geometry never halts"),
            }
        }
        assert_eq!((state.width, state.height), (648, 244));
        assert_eq!(state.window(), CropWindow::new(4, 2, 640, 240));
        assert!(state.pack);
    }

    #[test]
    fn starts_running() {
        let state = CaptureState::new(Geometry::default());
        assert_eq!(state.mode(), Mode::Running);
        assert!(!state.halted());
        assert!(!state.halt_pending());
        assert_eq!(state.byte_count, 0);
    }
}
