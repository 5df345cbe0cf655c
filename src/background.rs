//! The firmware's thread-mode loop: one capture iteration, then one sensor management step.
//!
//! Both queue consumers run here at the lowest priority. Every producer reachable from this loop
//! or from an interrupt must therefore use the non-blocking enqueues: a blocking enqueue from a
//! context that pre-empts the consumer never returns once the queue is full.

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::i2c;

use crate::capture::control::CaptureControl;
use crate::capture::state::{CaptureTask, ChunkOutcome, ConfigRequest};
use crate::capture::CaptureHardware;
use crate::sensor::{ControlLines, ManagementHandle, Progress, Sensor, SensorManager};

/// Capture requests still to be queued, oldest first.
#[derive(Clone, Copy)]
struct Backlog {
    requests: [ConfigRequest; 3],
    next: usize,
}

/// Capture task, sensor manager and the producer ends of both control queues.
pub struct BackgroundLoop<'a, H, D, I2C, L, CD> {
    capture: CaptureTask<'a, H, D>,
    manager: SensorManager<'a, I2C, L>,
    control: CaptureControl<'a, CD>,
    management: ManagementHandle<'a, CD>,
    sensor: Sensor,
    backlog: Option<Backlog>,
}

impl<'a, H, D, I2C, L, E, CD> BackgroundLoop<'a, H, D, I2C, L, CD>
where
    H: CaptureHardware,
    D: DelayUs<u32>,
    I2C: i2c::Write<Error = E>,
    L: ControlLines,
    CD: DelayUs<u32>,
{
    /// `sensor` is the one whose geometry the capture interface gets once bring-up is over.
    pub fn new(
        capture: CaptureTask<'a, H, D>,
        manager: SensorManager<'a, I2C, L>,
        control: CaptureControl<'a, CD>,
        management: ManagementHandle<'a, CD>,
        sensor: Sensor,
    ) -> Self {
        BackgroundLoop {
            capture,
            manager,
            control,
            management,
            sensor,
            backlog: None,
        }
    }

    /// One pass: a capture iteration, any queued geometry that now fits, and one bring-up write or
    /// management request. Bounded by the capture wait plus one control-bus transaction.
    pub fn step(&mut self) -> Option<ChunkOutcome> {
        let outcome = self.capture.run_once();
        self.flush_backlog();

        if self.manager.poll() == Progress::InitComplete {
            log_info!("applying {:?} capture geometry", self.sensor);
            self.backlog = Some(Backlog {
                requests: self.sensor.geometry().requests(),
                next: 0,
            });
            self.flush_backlog();
        }
        outcome
    }

    /// True while geometry is still waiting for room in the capture queue.
    pub fn geometry_pending(&self) -> bool {
        self.backlog.is_some()
    }

    pub fn capture(&self) -> &CaptureTask<'a, H, D> {
        &self.capture
    }

    pub fn capture_mut(&mut self) -> &mut CaptureTask<'a, H, D> {
        &mut self.capture
    }

    pub fn manager(&self) -> &SensorManager<'a, I2C, L> {
        &self.manager
    }

    /// Capture configuration for a command source running in this loop. Use
    /// `try_enqueue_capture_config`; the blocking calls wait on `step`.
    pub fn control(&mut self) -> &mut CaptureControl<'a, CD> {
        &mut self.control
    }

    /// Sensor requests for a command source running in this loop. Use
    /// `try_enqueue_management_request`; the blocking calls wait on `step`.
    pub fn management(&mut self) -> &mut ManagementHandle<'a, CD> {
        &mut self.management
    }

    fn flush_backlog(&mut self) {
        if let Some(mut backlog) = self.backlog.take() {
            while backlog.next < backlog.requests.len() {
                let req = backlog.requests[backlog.next];
                if self.control.try_enqueue_capture_config(req).is_err() {
                    // Capture queue full, retried on the next step
                    self.backlog = Some(backlog);
                    return;
                }
                backlog.next += 1;
            }
        }
    }
}
