//! Simulated capture peripheral and a leaked-static test rig around `CaptureTask`.

#![allow(dead_code)]

use std::cell::Cell;
use std::ptr;

use embedded_hal::blocking::delay::DelayUs;
use heapless::spsc::{Consumer, Producer, Queue};

use lilcam_rs::capture::state::{CaptureTask, ConfigRequest, Geometry};
use lilcam_rs::capture::{
    CaptureEngine, CaptureEvents, CaptureHardware, CropWindow, Half, PackedOutputBuffers,
    RawCaptureBuffers,
};
use lilcam_rs::config::{CaptureConfig, ConfigQueueDepth, TransmitQueueDepth};
use lilcam_rs::sync::{BinarySemaphore, NoDelay};
use lilcam_rs::transmit::FrameDescriptor;

/// DCMI + DMA stand-in. The capture bit keeps reading 1 for `stop_lag` polls after it is cleared,
/// like the real peripheral finishing its frame.
pub struct FakeCaptureHardware {
    pub targets: Option<[*mut u8; 2]>,
    pub bytes_per_half: usize,
    pub target: Half,
    pub interface_on: bool,
    pub crop: Option<CropWindow>,
    pub arm_count: u32,
    pub shutdown_count: u32,
    pub stop_lag: u32,
    capture: Cell<bool>,
    stopping: Cell<bool>,
    lag_left: Cell<u32>,
}

// The raw pointers point into leaked buffers.
unsafe impl Send for FakeCaptureHardware {}

impl FakeCaptureHardware {
    pub fn new(stop_lag: u32) -> Self {
        FakeCaptureHardware {
            targets: None,
            bytes_per_half: 0,
            target: Half::A,
            interface_on: false,
            crop: None,
            arm_count: 0,
            shutdown_count: 0,
            stop_lag,
            capture: Cell::new(false),
            stopping: Cell::new(false),
            lag_left: Cell::new(0),
        }
    }

    pub fn armed(&self) -> bool {
        self.targets.is_some()
    }

    /// Fill the half DMA is targeting with `fill`, switch halves and raise transfer complete.
    pub fn complete_half(&mut self, events: &CaptureEvents, fill: u8) {
        assert!(self.armed(), "DMA completed while disarmed");
        self.write_target(fill);
        self.target = self.target.other();
        events.on_buffer_complete();
    }

    /// DMA writing into the half it is currently targeting, without completing it.
    pub fn write_target(&mut self, fill: u8) {
        let targets = self.targets.expect("DMA not armed");
        unsafe { ptr::write_bytes(targets[self.target.index()], fill, self.bytes_per_half) };
    }
}

impl CaptureHardware for FakeCaptureHardware {
    fn arm_dma(&mut self, targets: [*mut u8; 2], bytes_per_half: usize) {
        self.targets = Some(targets);
        self.bytes_per_half = bytes_per_half;
        self.target = Half::A;
        self.arm_count += 1;
    }

    fn disarm_dma(&mut self) {
        self.targets = None;
    }

    fn set_crop(&mut self, window: &CropWindow) {
        self.crop = Some(*window);
    }

    fn enable_capture(&mut self) {
        self.interface_on = true;
        self.capture.set(true);
        self.stopping.set(false);
    }

    fn clear_capture(&mut self) {
        if self.capture.get() {
            self.stopping.set(true);
            self.lag_left.set(self.stop_lag);
        }
    }

    fn disable_interface(&mut self) {
        self.interface_on = false;
        self.shutdown_count += 1;
    }

    fn capture_enabled(&self) -> bool {
        if self.stopping.get() {
            if self.lag_left.get() == 0 {
                self.capture.set(false);
                self.stopping.set(false);
            } else {
                self.lag_left.set(self.lag_left.get() - 1);
            }
        }
        self.capture.get()
    }

    fn dma_target(&self) -> Half {
        self.target
    }
}

/// Delay that gives the CPU to other threads instead of sleeping.
#[derive(Clone, Copy, Default)]
pub struct YieldDelay;

impl DelayUs<u32> for YieldDelay {
    fn delay_us(&mut self, _us: u32) {
        std::thread::yield_now();
    }
}

pub type Task<D> = CaptureTask<'static, FakeCaptureHardware, D>;

/// A capture task with all of its statics leaked, plus the far ends of its queues.
pub struct Rig<D> {
    pub task: Task<D>,
    pub events: &'static CaptureEvents,
    pub requests: Producer<'static, ConfigRequest, ConfigQueueDepth>,
    pub frames: Consumer<'static, FrameDescriptor, TransmitQueueDepth>,
}

pub fn rig(config: CaptureConfig, geometry: Geometry, stop_lag: u32) -> Rig<NoDelay> {
    rig_with_delay(config, geometry, stop_lag, NoDelay)
}

pub fn rig_with_delay<D: DelayUs<u32>>(
    config: CaptureConfig,
    geometry: Geometry,
    stop_lag: u32,
    delay: D,
) -> Rig<D> {
    let raw: &'static RawCaptureBuffers = Box::leak(Box::new(RawCaptureBuffers::new()));
    let packed: &'static PackedOutputBuffers = Box::leak(Box::new(PackedOutputBuffers::new()));
    let events: &'static CaptureEvents = Box::leak(Box::new(CaptureEvents::new()));
    let config_q: &'static mut Queue<ConfigRequest, ConfigQueueDepth> =
        Box::leak(Box::new(Queue::new()));
    let frame_q: &'static mut Queue<FrameDescriptor, TransmitQueueDepth> =
        Box::leak(Box::new(Queue::new()));
    let (requests, config_c) = config_q.split();
    let (frame_p, frames) = frame_q.split();

    let engine = CaptureEngine::new(FakeCaptureHardware::new(stop_lag), raw);
    let task = CaptureTask::new(
        engine, packed, events, config_c, frame_p, delay, config, geometry,
    )
    .expect("capture bit is clear before start");

    Rig {
        task,
        events,
        requests,
        frames,
    }
}

impl<D: DelayUs<u32>> Rig<D> {
    pub fn hw(&mut self) -> &mut FakeCaptureHardware {
        self.task.engine_mut().hardware_mut()
    }

    /// DMA finishes the half it is writing.
    pub fn dma_chunk(&mut self, fill: u8) {
        let events = self.events;
        self.hw().complete_half(events, fill);
    }

    pub fn frame_start(&self) {
        self.events.on_frame_start();
    }

    pub fn send(&mut self, req: ConfigRequest) {
        self.requests.enqueue(req).expect("config queue full");
    }

    /// Next chunk handed to the transmit task, copied out.
    pub fn recv(&mut self) -> Option<Vec<u8>> {
        self.frames
            .dequeue()
            .map(|desc| unsafe { desc.as_slice() }.to_vec())
    }

    /// Run the loop until `done` holds, giving up after `limit` iterations.
    pub fn run_until(&mut self, limit: usize, mut done: impl FnMut(&Task<D>) -> bool) -> usize {
        for n in 0..limit {
            if done(&self.task) {
                return n;
            }
            self.task.run_once();
        }
        assert!(done(&self.task), "condition not reached in {} iterations", limit);
        limit
    }
}

/// A completion signal that lives forever, for `Halt` callbacks.
pub fn leaked_semaphore() -> &'static BinarySemaphore {
    Box::leak(Box::new(BinarySemaphore::new()))
}
