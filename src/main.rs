//! Dual image sensor USB capture board.

#![no_main]
#![no_std]

use lilcam_rs::background::BackgroundLoop;
use lilcam_rs::capture::control::CaptureControl;
use lilcam_rs::capture::parallel::{self, Stm32Capture};
use lilcam_rs::capture::state::{CaptureTask, ChunkOutcome, ConfigRequest};
use lilcam_rs::capture::{CaptureEngine, CaptureEvents, PackedOutputBuffers, RawCaptureBuffers};
use lilcam_rs::config::{
    CaptureConfig, ConfigQueueDepth, ManagementQueueDepth, TransmitQueueDepth, BUS_TIMEOUT_US,
};
use lilcam_rs::pins::{pin_config_board, BoardLines};
use lilcam_rs::sensor::{ManagementHandle, ManagementRequest, Sensor, SensorManager};
use lilcam_rs::sync::BinarySemaphore;
use lilcam_rs::transmit::{BulkWrite, FrameDescriptor, TransmitPump};

use core::panic::PanicInfo;
use embedded_hal::blocking::delay::DelayUs;
use heapless::spsc::Queue;
use rtt_target::{rprintln, rtt_init, set_print_channel, UpChannel};
use stm32f7xx_hal::{
    gpio::{gpiob, Alternate, AF4},
    i2c::{BlockingI2c, Mode},
    pac::{Interrupt, I2C1, RCC, TIM2},
    prelude::*,
    rcc::{HSEClock, HSEClockMode},
};

/// SYSCLK in MHz, also the number of core cycles per microsecond.
const SYSCLK_MHZ: u32 = 192;

/// Spare interrupt the transmit task is bound to.
const TRANSMIT_IRQ: Interrupt = Interrupt::EXTI1;

type SensorI2c = BlockingI2c<I2C1, gpiob::PB8<Alternate<AF4>>, gpiob::PB9<Alternate<AF4>>>;

type Background =
    BackgroundLoop<'static, Stm32Capture, CycleDelay, SensorI2c, BoardLines, CycleDelay>;

// Shared between the capture interrupts and the capture task
static RAW: RawCaptureBuffers = RawCaptureBuffers::new();
static PACKED: PackedOutputBuffers = PackedOutputBuffers::new();
static EVENTS: CaptureEvents = CaptureEvents::new();
static HALT_DONE: BinarySemaphore = BinarySemaphore::new();

/// Busy-wait delay on the core clock.
#[derive(Clone, Copy)]
pub struct CycleDelay;

impl DelayUs<u32> for CycleDelay {
    fn delay_us(&mut self, us: u32) {
        cortex_m::asm::delay(us.saturating_mul(SYSCLK_MHZ));
    }
}

/// RTT channel standing in for the USB bulk IN endpoint.
pub struct RttBulk(UpChannel);

impl BulkWrite for RttBulk {
    /// Number of bytes that did fit.
    type Error = usize;

    fn write_bulk(&mut self, data: &[u8]) -> Result<(), usize> {
        match self.0.write(data) {
            n if n == data.len() => Ok(()),
            n => Err(n),
        }
    }
}

#[rtic::app(device = stm32f7xx_hal::pac, peripherals = true)]
const APP: () = {
    struct Resources {
        background: Background,
        pump: TransmitPump<'static, RttBulk>,
    }

    #[init]
    fn init(cx: init::Context) -> init::LateResources {
        static mut CONFIG_Q: Queue<ConfigRequest, ConfigQueueDepth> =
            Queue(heapless::i::Queue::new());
        static mut MANAGEMENT_Q: Queue<ManagementRequest, ManagementQueueDepth> =
            Queue(heapless::i::Queue::new());
        static mut FRAME_Q: Queue<FrameDescriptor, TransmitQueueDepth> =
            Queue(heapless::i::Queue::new());

        // Setup RTT for logging, plus the frame stream
        let channels = rtt_init! {
            up: {
                0: {
                    size: 1024
                    mode: NoBlockSkip
                    name: "Terminal"
                }
                1: {
                    size: 16384
                    mode: NoBlockSkip
                    name: "Frames"
                }
            }
        };
        set_print_channel(channels.up.0);

        let pac_periph = cx.device;

        /********** BEGIN: CLOCK CONFG **********/

        // 12 MHz HSE, SYSCLK 192 MHz leaves the APB1 timers at 96 MHz
        let mut rcc = pac_periph.RCC.constrain();
        let hse_cfg = HSEClock::new(12.mhz(), HSEClockMode::Oscillator);
        let clocks = rcc
            .cfgr
            .hse(hse_cfg)
            .sysclk(SYSCLK_MHZ.mhz())
            .freeze();

        start_sensor_clock();

        /********** END: CLOCK CONFG **********/

        // GPIO configuration
        let (scl, sda, lines) = pin_config_board();

        // I2C1 configuration (sensor control bus)
        let i2c = BlockingI2c::i2c1(
            pac_periph.I2C1,
            (scl, sda),
            Mode::standard(100.khz()),
            clocks,
            &mut rcc.apb1,
            BUS_TIMEOUT_US,
        );

        let (config_p, config_c) = CONFIG_Q.split();
        let (management_p, management_c) = MANAGEMENT_Q.split();
        let (frame_p, frame_c) = FRAME_Q.split();

        // Capture starts RUNNING with the startup sensor's geometry
        let engine = CaptureEngine::new(Stm32Capture::new(pac_periph.DCMI, pac_periph.DMA2), &RAW);
        let capture = CaptureTask::new(
            engine,
            &PACKED,
            &EVENTS,
            config_c,
            frame_p,
            CycleDelay,
            CaptureConfig::default(),
            Sensor::startup().geometry(),
        )
        .unwrap();

        // The manager is polled from idle, so there is nothing to wake
        let mut management = ManagementHandle::new(management_p, || {}, CycleDelay);
        // Bring-up leaves the HM0360 selected; route the bus back once it is done
        management
            .try_enqueue_management_request(ManagementRequest::SensorSelect {
                which: Sensor::startup(),
            })
            .unwrap();

        let background = BackgroundLoop::new(
            capture,
            SensorManager::new(i2c, lines, management_c),
            CaptureControl::new(config_p, &HALT_DONE, CycleDelay),
            management,
            Sensor::startup(),
        );

        rprintln!("lilcam init complete, capture running");

        init::LateResources {
            background,
            pump: TransmitPump::new(frame_c, RttBulk(channels.up.1)),
        }
    }

    // Capture and sensor management share thread mode, one bounded step each per pass
    #[idle(resources = [background])]
    fn idle(cx: idle::Context) -> ! {
        loop {
            if let Some(ChunkOutcome::Published) = cx.resources.background.step() {
                rtic::pend(TRANSMIT_IRQ);
            }
        }
    }

    #[task(binds = DMA2_STREAM7, priority = 3)]
    fn dma2_stream7(_: dma2_stream7::Context) {
        if parallel::clear_transfer_complete() {
            EVENTS.on_buffer_complete();
        }
    }

    #[task(binds = DCMI, priority = 3)]
    fn dcmi(_: dcmi::Context) {
        if parallel::clear_frame_start() {
            EVENTS.on_frame_start();
        }
    }

    #[task(binds = EXTI1, priority = 2, resources = [pump])]
    fn transmit(cx: transmit::Context) {
        let pump = cx.resources.pump;
        let before = pump.stats().failed;
        pump.service();
        if pump.stats().failed != before {
            rprintln!("frame channel full, {} chunks lost", pump.stats().failed);
        }
    }
};

/// Drive HM01B0 MCLK at 12 MHz from TIM2 CH3 (96 MHz timer clock / 8).
fn start_sensor_clock() {
    let rcc_regs = unsafe { &(*RCC::ptr()) };
    let tim2_regs = unsafe { &(*TIM2::ptr()) };

    rcc_regs.apb1enr.modify(|_, w| w.tim2en().set_bit());

    unsafe {
        tim2_regs.psc.write(|w| w.bits(0));
        tim2_regs.arr.write(|w| w.bits(7));
        tim2_regs.ccr3.write(|w| w.bits(4));
        // PWM mode 1 with preload on channel 3
        tim2_regs.ccmr2_output().write(|w| w.bits(0x68));
        tim2_regs.ccer.write(|w| w.bits(1 << 8));
    }
    tim2_regs.cr1.modify(|_, w| w.cen().set_bit());
}

#[inline(never)]
#[panic_handler]
fn panic(_info: &PanicInfo) -> ! {
    rprintln!("Panicked!");
    rprintln!("{:?}", _info);
    loop {}
}
