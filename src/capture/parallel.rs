//! `CaptureHardware` for the STM32F7 DCMI peripheral feeding DMA2 in double-buffer mode.
//! Assumes that GPIO is set up prior to using this module.

use cortex_m::peripheral::NVIC;
use stm32f7xx_hal::pac::{interrupt, DCMI, DMA2, RCC};

use super::engine::{CaptureHardware, CropWindow, Half};

// DMA2-Stream 7-Channel 1 is used to interface with DCMI
const DMA_STREAM: usize = 7;
const DMA_CHANNEL: u8 = 1;

// DCMI data register address
const DCMI_DR_ADDR: u32 = 0x5005_0000 + 0x28;

/// The capture interface and its DMA stream.
pub struct Stm32Capture {
    dcmi: DCMI,
    dma2: DMA2,
}

impl Stm32Capture {
    /// Clock both peripherals and set up sync polarity, continuous mode and the interrupts the
    /// capture task listens to.
    pub fn new(dcmi: DCMI, dma2: DMA2) -> Self {
        let rcc_regs = unsafe { &(*RCC::ptr()) };

        // Enable peripheral clocks
        rcc_regs.ahb1enr.modify(|_, w| w.dma2en().set_bit());
        rcc_regs.ahb2enr.modify(|_, w| w.dcmien().set_bit());

        // VSYNC active high, HSYNC active low, sample on the PCLK rising edge, continuous capture
        dcmi.cr.write(|w| {
            w.vspol()
                .set_bit()
                .hspol()
                .clear_bit()
                .pckpol()
                .set_bit()
                .cm()
                .clear_bit()
        });

        // Frame start is the only DCMI event the capture task needs
        dcmi.ier.write(|w| w.vsync_ie().set_bit());

        Stm32Capture { dcmi, dma2 }
    }

    fn stream_disabled(&self) -> bool {
        self.dma2.st[DMA_STREAM].cr.read().en().bit_is_clear()
    }
}

impl CaptureHardware for Stm32Capture {
    fn arm_dma(&mut self, targets: [*mut u8; 2], bytes_per_half: usize) {
        let stream = &self.dma2.st[DMA_STREAM];

        // The stream only accepts a new configuration once EN reads back 0
        stream.cr.modify(|_, w| w.en().clear_bit());
        while !self.stream_disabled() {}

        unsafe {
            // Clear any stale interrupts
            let dma2_int_status_hi = self.dma2.hisr.read().bits();
            self.dma2.hifcr.write(|w| w.bits(dma2_int_status_hi));

            stream.cr.write(|w| {
                w
                    // Transfer complete interrupt
                    .tcie()
                    .set_bit()
                    // Transfer error interrupt
                    .teie()
                    .set_bit()
                    // Flow controller (0 = DMA, 1 = peripheral)
                    .pfctrl()
                    .clear_bit()
                    // Direction
                    .dir()
                    .peripheral_to_memory()
                    // Circular mode
                    .circ()
                    .set_bit()
                    // Peripheral address increment
                    .pinc()
                    .clear_bit()
                    // Memory address increment
                    .minc()
                    .set_bit()
                    // Peripheral transfer size
                    .psize()
                    .bits32()
                    // Memory transfer size
                    .msize()
                    .bits32()
                    // Priority level
                    .pl()
                    .very_high()
                    // Double buffer mode, starting on memory 0
                    .dbm()
                    .set_bit()
                    .ct()
                    .clear_bit()
                    // Peripheral burst
                    .pburst()
                    .single()
                    // Memory burst
                    .mburst()
                    .single()
                    // Channel
                    .chsel()
                    .bits(DMA_CHANNEL)
            });
        }

        // Configure addresses and size, counted in 32-bit words
        stream
            .ndtr
            .write(|w| w.ndt().bits((bytes_per_half / 4) as u16));
        stream.par.write(|w| w.pa().bits(DCMI_DR_ADDR));
        stream.m0ar.write(|w| w.m0a().bits(targets[0] as u32));
        stream.m1ar.write(|w| w.m1a().bits(targets[1] as u32));

        stream.cr.modify(|_, w| w.en().set_bit());
    }

    fn disarm_dma(&mut self) {
        self.dma2.st[DMA_STREAM].cr.modify(|_, w| w.en().clear_bit());
    }

    fn set_crop(&mut self, window: &CropWindow) {
        let start = (u32::from(window.y) << 16) | u32::from(window.x);
        let size = (u32::from(window.height.saturating_sub(1)) << 16)
            | u32::from(window.width.saturating_sub(1));
        unsafe {
            self.dcmi.cwstrt.write(|w| w.bits(start));
            self.dcmi.cwsize.write(|w| w.bits(size));
        }
        self.dcmi.cr.modify(|_, w| w.crop().set_bit());
    }

    fn enable_capture(&mut self) {
        // Drop a frame start latched while capture was off
        self.dcmi.icr.write(|w| w.vsync_isc().set_bit());

        unsafe {
            NVIC::unmask(interrupt::DCMI);
            NVIC::unmask(interrupt::DMA2_STREAM7);
        }

        // Enable the DCMI peripheral and start capture
        self.dcmi
            .cr
            .modify(|_, w| w.enable().set_bit().capture().set_bit());
    }

    fn clear_capture(&mut self) {
        self.dcmi.cr.modify(|_, w| w.capture().clear_bit());
    }

    fn disable_interface(&mut self) {
        NVIC::mask(interrupt::DCMI);
        NVIC::mask(interrupt::DMA2_STREAM7);

        self.dcmi.cr.modify(|_, w| w.enable().clear_bit());
    }

    fn capture_enabled(&self) -> bool {
        self.dcmi.cr.read().capture().bit_is_set()
    }

    fn dma_target(&self) -> Half {
        if self.dma2.st[DMA_STREAM].cr.read().ct().bit_is_set() {
            Half::B
        } else {
            Half::A
        }
    }
}

/// Acknowledge the DMA transfer-complete interrupt. Returns whether it was pending.
pub fn clear_transfer_complete() -> bool {
    let dma2_regs = unsafe { &(*DMA2::ptr()) };

    let pending = dma2_regs.hisr.read().tcif7().bit_is_set();
    dma2_regs
        .hifcr
        .write(|w| w.ctcif7().set_bit().cteif7().set_bit());
    pending
}

/// Acknowledge the DCMI interrupt. Returns whether it was a frame start.
pub fn clear_frame_start() -> bool {
    let dcmi_regs = unsafe { &(*DCMI::ptr()) };

    let vsync = dcmi_regs.mis.read().vsync_mis().bit_is_set();
    dcmi_regs.icr.write(|w| w.vsync_isc().set_bit());
    vsync
}
