//! GPIO pin configuration for the capture board.

use embedded_hal::digital::v2::OutputPin;
use stm32f7xx_hal::{
    device, gpio,
    gpio::{Alternate, Output, PushPull, Speed, AF4},
    prelude::*,
};

use crate::sensor::{ControlLines, Sensor};

/// Sensor control lines and the fault LED.
pub struct BoardLines {
    camera_select: gpio::gpioe::PE15<Output<PushPull>>,
    hm0360_xshut: gpio::gpiod::PD9<Output<PushPull>>,
    hm0360_xsleep: gpio::gpiod::PD10<Output<PushPull>>,
    fault_led: gpio::gpioc::PC15<Output<PushPull>>,
}

impl ControlLines for BoardLines {
    fn select(&mut self, sensor: Sensor) {
        // High routes the HM01B0 onto the capture bus
        let _ = match sensor {
            Sensor::Hm01b0 => self.camera_select.set_high(),
            Sensor::Hm0360 => self.camera_select.set_low(),
        };
    }

    fn power_up(&mut self, sensor: Sensor) {
        if sensor == Sensor::Hm0360 {
            let _ = self.hm0360_xshut.set_high();
            let _ = self.hm0360_xsleep.set_high();
        }
    }

    fn set_fault(&mut self, on: bool) {
        let _ = if on {
            self.fault_led.set_high()
        } else {
            self.fault_led.set_low()
        };
    }
}

/// Configure GPIOs for alternate functions and return the I2C pins along with the sensor control
/// lines. Note that the peripherals are stolen, so this should only be done during init to be
/// safe.
///
/// Pin configuration:
///
///     I2C1 SCL:   PB8   --> HM01B0/HM0360 SCL
///     I2C1 SDA:   PB9  <--> HM01B0/HM0360 SDA
///     TIM2 CH3:   PA2   --> HM01B0 MCLK
///     DCMI PCLK:  PA6  <--  PCLK
///     DCMI HSYNC: PA4  <--  HSYNC
///     DCMI VSYNC: PB7  <--  VSYNC
///     DCMI D0:    PC6  <--  D0
///     DCMI D1:    PC7  <--  D1
///     DCMI D2:    PC8  <--  D2
///     DCMI D3:    PC9  <--  D3
///     DCMI D4:    PE4  <--  D4 (HM0360 only)
///     DCMI D5:    PD3  <--  D5 (HM0360 only)
///     DCMI D6:    PE5  <--  D6 (HM0360 only)
///     DCMI D7:    PE6  <--  D7 (HM0360 only)
///     GPIO:       PE15  --> camera select (high = HM01B0)
///     GPIO:       PD9   --> HM0360 XSHUT
///     GPIO:       PD10  --> HM0360 XSLEEP
///     GPIO:       PC15  --> fault LED
pub fn pin_config_board() -> (
    gpio::gpiob::PB8<Alternate<AF4>>,
    gpio::gpiob::PB9<Alternate<AF4>>,
    BoardLines,
) {
    let pac_periph = unsafe { device::Peripherals::steal() };
    let gpioa = pac_periph.GPIOA.split();
    let gpiob = pac_periph.GPIOB.split();
    let gpioc = pac_periph.GPIOC.split();
    let gpiod = pac_periph.GPIOD.split();
    let gpioe = pac_periph.GPIOE.split();

    // Configure TIM2 CH3 for HM01B0 MCLK
    let _mclk = gpioa.pa2.into_alternate_af1().set_speed(Speed::VeryHigh);

    // Configure I2C1 for the sensor control bus
    let scl = gpiob
        .pb8
        .into_alternate_af4()
        .internal_pull_up(true)
        .set_open_drain();
    let sda = gpiob
        .pb9
        .into_alternate_af4()
        .internal_pull_up(true)
        .set_open_drain();

    // Configure DCMI for the shared parallel bus
    let _dcmi_pclk = gpioa
        .pa6
        .into_alternate_af13()
        .internal_pull_up(true)
        .set_speed(Speed::VeryHigh);
    let _dcmi_hsync = gpioa
        .pa4
        .into_alternate_af13()
        .internal_pull_up(true)
        .set_speed(Speed::VeryHigh);
    let _dcmi_vsync = gpiob
        .pb7
        .into_alternate_af13()
        .internal_pull_up(true)
        .set_speed(Speed::VeryHigh);
    let _dcmi_d0 = gpioc.pc6.into_alternate_af13().set_speed(Speed::VeryHigh);
    let _dcmi_d1 = gpioc.pc7.into_alternate_af13().set_speed(Speed::VeryHigh);
    let _dcmi_d2 = gpioc.pc8.into_alternate_af13().set_speed(Speed::VeryHigh);
    let _dcmi_d3 = gpioc.pc9.into_alternate_af13().set_speed(Speed::VeryHigh);
    let _dcmi_d4 = gpioe.pe4.into_alternate_af13().set_speed(Speed::VeryHigh);
    let _dcmi_d5 = gpiod.pd3.into_alternate_af13().set_speed(Speed::VeryHigh);
    let _dcmi_d6 = gpioe.pe5.into_alternate_af13().set_speed(Speed::VeryHigh);
    let _dcmi_d7 = gpioe.pe6.into_alternate_af13().set_speed(Speed::VeryHigh);

    // Sensor control lines, HM01B0 selected and HM0360 held in shutdown
    let mut camera_select = gpioe.pe15.into_push_pull_output();
    let mut hm0360_xshut = gpiod.pd9.into_push_pull_output();
    let mut hm0360_xsleep = gpiod.pd10.into_push_pull_output();
    let mut fault_led = gpioc.pc15.into_push_pull_output();
    let _ = camera_select.set_high();
    let _ = hm0360_xshut.set_low();
    let _ = hm0360_xsleep.set_low();
    let _ = fault_led.set_low();

    let lines = BoardLines {
        camera_select,
        hm0360_xshut,
        hm0360_xsleep,
        fault_led,
    };

    (scl, sda, lines)
}
