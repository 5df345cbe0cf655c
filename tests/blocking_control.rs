//! The blocking halt/resume wrappers against a capture task running on its own thread.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use common::{leaked_semaphore, rig_with_delay, YieldDelay};
use lilcam_rs::capture::control::CaptureControl;
use lilcam_rs::capture::state::{Geometry, Mode};
use lilcam_rs::config::CaptureConfig;

#[test]
fn halt_and_resume_block_until_confirmed() {
    let rig = rig_with_delay(CaptureConfig::default(), Geometry::default(), 20, YieldDelay);
    let common::Rig {
        mut task, requests, ..
    } = rig;

    let mut control = CaptureControl::new(requests, leaked_semaphore(), YieldDelay);
    let stop = Arc::new(AtomicBool::new(false));

    let worker = {
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Acquire) {
                task.run_once();
            }
            task
        })
    };

    control.set_capture_size(160, 120);
    // Returns only once the capture task has seen the frame end
    control.halt_capture();

    control.enable_packing();
    control.resume_capture();

    // Already running: returns without waiting on hardware
    control.resume_capture();

    stop.store(true, Ordering::Release);
    let mut task = worker.join().unwrap();

    let state = task.state();
    assert_eq!(state.mode(), Mode::Running);
    assert_eq!((state.width, state.height), (160, 120));
    assert!(state.pack);
    assert_eq!(state.byte_count, 0);

    let hw = task.engine_mut().hardware_mut();
    assert!(hw.armed());
    assert_eq!(hw.shutdown_count, 1);
    assert_eq!(hw.arm_count, 2);
}
