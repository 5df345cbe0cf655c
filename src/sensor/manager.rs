//! Sensor management: every control-bus transaction goes through this task so the capture path
//! never blocks on I2C.
//!
//! At startup the manager resets and programs both sensors, one register write per `poll`, then
//! serves `ManagementRequest`s. A failed write latches the fault indicator and processing carries
//! on with the next write.

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::i2c;
use heapless::spsc::{Consumer, Producer};

use super::regs::{
    RegWrite, HM01B0_ADDRESS, HM01B0_INIT, HM01B0_RESET, HM0360_ADDRESS, HM0360_INIT,
};
use crate::capture::state::Geometry;
use crate::capture::CropWindow;
use crate::config::{ManagementQueueDepth, POLL_STEP_US};

/// The two image sensors sharing the capture bus.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Sensor {
    /// 320 x 240 monochrome, 4-bit data bus.
    Hm01b0,
    /// Monochrome, 8-bit data bus, programmed for QVGA.
    Hm0360,
}

impl Sensor {
    /// The sensor whose geometry capture starts with.
    pub fn startup() -> Sensor {
        if cfg!(feature = "start-hm0360") {
            Sensor::Hm0360
        } else {
            Sensor::Hm01b0
        }
    }

    pub fn bus_address(self) -> u8 {
        match self {
            Sensor::Hm01b0 => HM01B0_ADDRESS,
            Sensor::Hm0360 => HM0360_ADDRESS,
        }
    }

    pub fn init_table(self) -> &'static [RegWrite] {
        match self {
            Sensor::Hm01b0 => HM01B0_INIT,
            Sensor::Hm0360 => HM0360_INIT,
        }
    }

    /// What the capture interface must be set to for this sensor's bring-up table.
    ///
    /// The HM01B0 clocks every pixel out as two 4-bit samples, so its 324 x 244 output is 648 bus
    /// clocks wide. The crop drops the 2-pixel border and the packer folds the sample pairs back
    /// into 320 x 240 bytes.
    pub fn geometry(self) -> Geometry {
        match self {
            Sensor::Hm01b0 => Geometry {
                width: 648,
                height: 244,
                crop: CropWindow::new(4, 2, 640, 240),
                pack: true,
            },
            Sensor::Hm0360 => Geometry {
                width: 320,
                height: 240,
                crop: CropWindow::new(0, 0, 320, 240),
                pack: false,
            },
        }
    }
}

/// A control-bus request, consumed exactly once by the manager.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ManagementRequest {
    /// Write one sensor register. Resolution registers should be changed with capture halted.
    RegisterWrite {
        bus_address: u8,
        register: u16,
        value: u8,
    },
    /// Route the capture bus to `which`. Capture is left alone; halt around the switch if the two
    /// sensors' geometry differs.
    SensorSelect { which: Sensor },
    /// Inter-camera trigger period and role. Accepted and ignored.
    TriggerConfig { period: u32, is_controller: bool },
}

/// Control-bus errors.
#[derive(Debug, Eq, PartialEq)]
pub enum SensorError<E> {
    /// I2C write error.
    BusWrite {
        bus_address: u8,
        register: u16,
        source: E,
    },
}

/// Sticky fault indicator: set by the first failed transaction and never cleared.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FaultLatch {
    latched: bool,
    count: u32,
}

impl FaultLatch {
    /// Record a failure. Returns `true` only for the one that latched it.
    pub fn record(&mut self) -> bool {
        self.count = self.count.wrapping_add(1);
        let first = !self.latched;
        self.latched = true;
        first
    }

    pub fn is_latched(&self) -> bool {
        self.latched
    }

    /// Total failed transactions.
    pub fn count(&self) -> u32 {
        self.count
    }
}

/// Board lines around the sensors.
pub trait ControlLines {
    /// Drive the camera-select line for `sensor`.
    fn select(&mut self, sensor: Sensor);

    /// Take `sensor` out of shutdown and sleep.
    fn power_up(&mut self, sensor: Sensor);

    /// Fault indicator output.
    fn set_fault(&mut self, on: bool);
}

/// One action of the bring-up sequence.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InitStep {
    Select(Sensor),
    PowerUp(Sensor),
    Write(Sensor, RegWrite),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Stage {
    SelectHm01b0,
    ResetHm01b0,
    ProgramHm01b0,
    SelectHm0360,
    PowerHm0360,
    ProgramHm0360,
    Done,
}

/// Bring-up order: reset and program the HM01B0, then select, power and program the HM0360.
#[derive(Clone, Debug)]
pub struct InitSequence {
    stage: Stage,
    index: usize,
}

impl InitSequence {
    pub fn new() -> Self {
        InitSequence {
            stage: Stage::SelectHm01b0,
            index: 0,
        }
    }

    pub fn is_done(&self) -> bool {
        self.stage == Stage::Done
    }

    fn table_step(&mut self, sensor: Sensor, table: &[RegWrite], next: Stage) -> Option<InitStep> {
        let step = table.get(self.index).map(|w| InitStep::Write(sensor, *w));
        self.index += 1;
        if self.index >= table.len() {
            self.stage = next;
            self.index = 0;
        }
        step
    }
}

impl Default for InitSequence {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for InitSequence {
    type Item = InitStep;

    fn next(&mut self) -> Option<InitStep> {
        loop {
            let step = match self.stage {
                Stage::SelectHm01b0 => {
                    self.stage = Stage::ResetHm01b0;
                    Some(InitStep::Select(Sensor::Hm01b0))
                }
                Stage::ResetHm01b0 => {
                    self.table_step(Sensor::Hm01b0, &HM01B0_RESET, Stage::ProgramHm01b0)
                }
                Stage::ProgramHm01b0 => {
                    self.table_step(Sensor::Hm01b0, HM01B0_INIT, Stage::SelectHm0360)
                }
                Stage::SelectHm0360 => {
                    self.stage = Stage::PowerHm0360;
                    Some(InitStep::Select(Sensor::Hm0360))
                }
                Stage::PowerHm0360 => {
                    self.stage = Stage::ProgramHm0360;
                    Some(InitStep::PowerUp(Sensor::Hm0360))
                }
                Stage::ProgramHm0360 => {
                    self.table_step(Sensor::Hm0360, HM0360_INIT, Stage::Done)
                }
                Stage::Done => return None,
            };
            // An empty table yields nothing; move on to the next stage
            if step.is_some() {
                return step;
            }
        }
    }
}

/// What one `poll` did.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Progress {
    /// Ran one bring-up step; more remain.
    Init,
    /// Ran the last bring-up step.
    InitComplete,
    /// Served one request.
    Handled,
    /// Nothing to do.
    Idle,
}

/// The sensor management task.
pub struct SensorManager<'a, I2C, L> {
    i2c: I2C,
    lines: L,
    requests: Consumer<'a, ManagementRequest, ManagementQueueDepth>,
    init: InitSequence,
    fault: FaultLatch,
    active: Sensor,
}

impl<'a, I2C, L, E> SensorManager<'a, I2C, L>
where
    I2C: i2c::Write<Error = E>,
    L: ControlLines,
{
    pub fn new(
        i2c: I2C,
        lines: L,
        requests: Consumer<'a, ManagementRequest, ManagementQueueDepth>,
    ) -> Self {
        SensorManager {
            i2c,
            lines,
            requests,
            init: InitSequence::new(),
            fault: FaultLatch::default(),
            active: Sensor::Hm01b0,
        }
    }

    /// Do one unit of work: the next bring-up write while bring-up is running, otherwise at most
    /// one queued request. Callers yield between polls.
    pub fn poll(&mut self) -> Progress {
        if let Some(step) = self.init.next() {
            self.run_step(step);
            if self.init.is_done() {
                log_info!("sensor bring-up done, {} bus faults", self.fault.count());
                return Progress::InitComplete;
            }
            return Progress::Init;
        }

        match self.requests.dequeue() {
            Some(req) => {
                self.handle(req);
                Progress::Handled
            }
            None => Progress::Idle,
        }
    }

    /// Run whatever is left of bring-up without yielding.
    pub fn run_init(&mut self) {
        while let Some(step) = self.init.next() {
            self.run_step(step);
        }
    }

    pub fn init_done(&self) -> bool {
        self.init.is_done()
    }

    /// The sensor the capture bus is routed to.
    pub fn active(&self) -> Sensor {
        self.active
    }

    pub fn fault(&self) -> FaultLatch {
        self.fault
    }

    pub fn lines(&self) -> &L {
        &self.lines
    }

    pub fn i2c(&self) -> &I2C {
        &self.i2c
    }

    /// Write one register; a failure latches the fault indicator before it is returned.
    pub fn write_register(
        &mut self,
        bus_address: u8,
        register: u16,
        value: u8,
    ) -> Result<(), SensorError<E>> {
        let buf = RegWrite::new(register, value).encode();
        match self.i2c.write(bus_address, &buf) {
            Ok(()) => Ok(()),
            Err(source) => {
                if self.fault.record() {
                    self.lines.set_fault(true);
                }
                log_warn!(
                    "bus write {:#04x}:{:#06x} failed ({} total)",
                    bus_address,
                    register,
                    self.fault.count()
                );
                Err(SensorError::BusWrite {
                    bus_address,
                    register,
                    source,
                })
            }
        }
    }

    fn select(&mut self, sensor: Sensor) {
        self.lines.select(sensor);
        self.active = sensor;
        log_info!("sensor select {:?}", sensor);
    }

    fn run_step(&mut self, step: InitStep) {
        match step {
            InitStep::Select(sensor) => self.select(sensor),
            InitStep::PowerUp(sensor) => self.lines.power_up(sensor),
            InitStep::Write(sensor, w) => {
                // Already recorded; bring-up is best effort
                let _ = self.write_register(sensor.bus_address(), w.register, w.value);
            }
        }
    }

    fn handle(&mut self, req: ManagementRequest) {
        match req {
            ManagementRequest::RegisterWrite {
                bus_address,
                register,
                value,
            } => {
                let _ = self.write_register(bus_address, register, value);
            }
            ManagementRequest::SensorSelect { which } => self.select(which),
            ManagementRequest::TriggerConfig {
                period,
                is_controller,
            } => {
                log_warn!(
                    "trigger config (period {}, controller {}) not supported",
                    period,
                    is_controller
                );
            }
        }
    }
}

/// Producer end of the management queue.
pub struct ManagementHandle<'a, D> {
    requests: Producer<'a, ManagementRequest, ManagementQueueDepth>,
    wake: fn(),
    delay: D,
}

impl<'a, D: DelayUs<u32>> ManagementHandle<'a, D> {
    /// `wake` schedules the manager, e.g. by pending its interrupt.
    pub fn new(
        requests: Producer<'a, ManagementRequest, ManagementQueueDepth>,
        wake: fn(),
        delay: D,
    ) -> Self {
        ManagementHandle {
            requests,
            wake,
            delay,
        }
    }

    /// Queue a request and wake the manager if there is room, handing it back otherwise.
    pub fn try_enqueue_management_request(
        &mut self,
        req: ManagementRequest,
    ) -> Result<(), ManagementRequest> {
        self.requests.enqueue(req)?;
        (self.wake)();
        Ok(())
    }

    /// Queue a request, waiting for space if the queue is full. Must not be called from a context
    /// that pre-empts the manager.
    pub fn enqueue_management_request(&mut self, mut req: ManagementRequest) {
        loop {
            match self.requests.enqueue(req) {
                Ok(()) => break,
                Err(rejected) => {
                    req = rejected;
                    (self.wake)();
                    self.delay.delay_us(POLL_STEP_US);
                }
            }
        }
        (self.wake)();
    }

    pub fn register_write(&mut self, bus_address: u8, register: u16, value: u8) {
        self.enqueue_management_request(ManagementRequest::RegisterWrite {
            bus_address,
            register,
            value,
        });
    }

    pub fn sensor_select(&mut self, which: Sensor) {
        self.enqueue_management_request(ManagementRequest::SensorSelect { which });
    }
}
