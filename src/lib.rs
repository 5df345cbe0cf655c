//! Firmware for a dual image sensor (HM01B0 + HM0360) USB capture board.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod macros;

pub mod background;
pub mod config;
pub mod sync;
pub mod transmit;

/// DCMI + DMA capture engine, frame packing and the halt/resume state machine.
pub mod capture {
    mod engine;
    pub use engine::*;

    pub mod control;
    pub mod packer;
    pub mod state;

    #[cfg(feature = "board")]
    pub mod parallel;
}

/// Control bus management for the two image sensors.
pub mod sensor {
    mod manager;
    pub use manager::*;

    pub mod regs;
}

#[cfg(feature = "board")]
pub mod pins;
