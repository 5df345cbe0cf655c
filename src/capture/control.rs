//! Caller-side handle for reconfiguring capture.
//!
//! Every call enqueues a `ConfigRequest` for the capture task, waiting for queue space as long as
//! it takes. `halt_capture` and `resume_capture` additionally block until the capture task
//! confirms the transition, so they must not be called from a context that pre-empts it.

use embedded_hal::blocking::delay::DelayUs;
use heapless::spsc::Producer;

use super::state::ConfigRequest;
use crate::config::{ConfigQueueDepth, POLL_STEP_US};
use crate::sync::BinarySemaphore;

/// Producer end of the capture configuration queue.
pub struct CaptureControl<'a, D> {
    requests: Producer<'a, ConfigRequest, ConfigQueueDepth>,
    done: &'static BinarySemaphore,
    delay: D,
}

impl<'a, D: DelayUs<u32>> CaptureControl<'a, D> {
    /// `done` is given by the capture task when a blocking halt or resume has completed; it must
    /// not be shared with another handle.
    pub fn new(
        requests: Producer<'a, ConfigRequest, ConfigQueueDepth>,
        done: &'static BinarySemaphore,
        delay: D,
    ) -> Self {
        CaptureControl {
            requests,
            done,
            delay,
        }
    }

    /// Queue a request if there is room, handing it back otherwise.
    ///
    /// The only enqueue that is safe from the capture task's own context, or from anything that
    /// pre-empts it.
    pub fn try_enqueue_capture_config(
        &mut self,
        req: ConfigRequest,
    ) -> Result<(), ConfigRequest> {
        self.requests.enqueue(req)
    }

    /// Queue a request, waiting for space if the queue is full.
    pub fn enqueue_capture_config(&mut self, mut req: ConfigRequest) {
        loop {
            match self.requests.enqueue(req) {
                Ok(()) => return,
                Err(rejected) => {
                    req = rejected;
                    self.delay.delay_us(POLL_STEP_US);
                }
            }
        }
    }

    pub fn set_capture_size(&mut self, width: u16, height: u16) {
        self.enqueue_capture_config(ConfigRequest::SetSize { width, height });
    }

    pub fn set_capture_crop(&mut self, x: u16, y: u16, width: u16, height: u16) {
        self.enqueue_capture_config(ConfigRequest::SetCrop {
            x,
            y,
            width,
            height,
        });
    }

    pub fn enable_packing(&mut self) {
        self.enqueue_capture_config(ConfigRequest::SetPacking { enabled: true });
    }

    pub fn disable_packing(&mut self) {
        self.enqueue_capture_config(ConfigRequest::SetPacking { enabled: false });
    }

    /// Stop capture and return once the peripheral has finished its frame and DMA is off.
    pub fn halt_capture(&mut self) {
        self.transition(true);
    }

    /// Restart capture and return once DMA is re-armed and the peripheral is capturing.
    pub fn resume_capture(&mut self) {
        self.transition(false);
    }

    fn transition(&mut self, halt: bool) {
        self.done.reset();
        self.enqueue_capture_config(ConfigRequest::Halt {
            enabled: halt,
            callback: Some(self.done),
        });
        self.done.take_blocking(&mut self.delay);
    }
}
