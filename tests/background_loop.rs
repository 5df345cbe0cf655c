//! The thread-mode loop: capture keeps running through sensor bring-up, and the startup geometry
//! reaches the capture task without ever blocking on its queue.

mod common;

use embedded_hal::blocking::i2c;
use heapless::spsc::Queue;

use common::{leaked_semaphore, rig, FakeCaptureHardware, Rig};
use lilcam_rs::background::BackgroundLoop;
use lilcam_rs::capture::control::CaptureControl;
use lilcam_rs::capture::state::{ConfigRequest, Geometry};
use lilcam_rs::capture::CaptureEvents;
use lilcam_rs::config::{CaptureConfig, ManagementQueueDepth};
use lilcam_rs::sensor::{
    ControlLines, InitSequence, ManagementHandle, ManagementRequest, Sensor, SensorManager,
};
use lilcam_rs::sync::NoDelay;

#[derive(Default)]
struct Bus {
    writes: usize,
}

impl i2c::Write for Bus {
    type Error = ();

    fn write(&mut self, _address: u8, _bytes: &[u8]) -> Result<(), ()> {
        self.writes += 1;
        Ok(())
    }
}

#[derive(Default)]
struct Lines {
    selected: Option<Sensor>,
}

impl ControlLines for Lines {
    fn select(&mut self, sensor: Sensor) {
        self.selected = Some(sensor);
    }
    fn power_up(&mut self, _sensor: Sensor) {}
    fn set_fault(&mut self, _on: bool) {}
}

type Loop = BackgroundLoop<'static, FakeCaptureHardware, NoDelay, Bus, Lines, NoDelay>;

fn background(sensor: Sensor) -> (Loop, &'static CaptureEvents) {
    let Rig {
        task,
        events,
        requests,
        ..
    } = rig(CaptureConfig::default(), Geometry::default(), 0);
    let management_q: &'static mut Queue<ManagementRequest, ManagementQueueDepth> =
        Box::leak(Box::new(Queue::new()));
    let (management_p, management_c) = management_q.split();

    let mut management = ManagementHandle::new(management_p, || {}, NoDelay);
    management
        .try_enqueue_management_request(ManagementRequest::SensorSelect { which: sensor })
        .unwrap();

    let background = BackgroundLoop::new(
        task,
        SensorManager::new(Bus::default(), Lines::default(), management_c),
        CaptureControl::new(requests, leaked_semaphore(), NoDelay),
        management,
        sensor,
    );
    (background, events)
}

fn complete_half(bg: &mut Loop, events: &CaptureEvents, fill: u8) {
    bg.capture_mut()
        .engine_mut()
        .hardware_mut()
        .complete_half(events, fill);
}

#[test]
fn capture_runs_between_bring_up_writes() {
    let (mut bg, events) = background(Sensor::Hm01b0);
    let init_steps = InitSequence::new().count();

    for n in 1..init_steps {
        let writes = bg.manager().i2c().writes;
        if n % 50 == 0 {
            // Nothing drains the transmit queue here, so later chunks are dropped
            complete_half(&mut bg, events, 0x12);
            assert!(bg.step().is_some());
        } else {
            assert_eq!(bg.step(), None);
        }
        // One capture iteration per step, and never more than one bus transaction
        assert!(bg.manager().i2c().writes - writes <= 1);
        assert!(!bg.manager().init_done());
    }

    bg.step();
    assert!(bg.manager().init_done());
    let stats = bg.capture().stats();
    assert!(stats.published > 0);
    assert_eq!(
        stats.published + stats.dropped + stats.wait_timeouts,
        init_steps as u32
    );
}

#[test]
fn startup_geometry_reaches_capture_after_bring_up() {
    let (mut bg, _) = background(Sensor::Hm01b0);
    while !bg.manager().init_done() {
        bg.step();
    }
    // Geometry requests, then the queued sensor select
    for _ in 0..8 {
        bg.step();
    }

    assert!(!bg.geometry_pending());
    let state = bg.capture().state();
    let expected = Sensor::Hm01b0.geometry();
    assert_eq!((state.width, state.height), (expected.width, expected.height));
    assert_eq!(state.crop, expected.crop);
    assert!(state.pack);
    assert_eq!(bg.manager().lines().selected, Some(Sensor::Hm01b0));
    assert_eq!(bg.manager().active(), Sensor::Hm01b0);
}

#[test]
fn full_capture_queue_defers_geometry_without_blocking() {
    let (mut bg, _) = background(Sensor::Hm01b0);
    let init_steps = InitSequence::new().count();
    for _ in 1..init_steps {
        bg.step();
    }

    let filler = ConfigRequest::SetPacking { enabled: false };
    let mut queued = 0;
    while bg.control().try_enqueue_capture_config(filler).is_ok() {
        queued += 1;
        assert!(queued <= 16, "capture queue never filled");
    }

    // Bring-up finishes with the queue still nearly full
    bg.step();
    assert!(bg.manager().init_done());
    assert!(bg.geometry_pending());

    let mut steps = 0;
    while bg.geometry_pending() {
        bg.step();
        steps += 1;
        assert!(steps <= 32, "geometry never queued");
    }
    for _ in 0..8 {
        bg.step();
    }

    let state = bg.capture().state();
    assert_eq!(state.width, Sensor::Hm01b0.geometry().width);
    assert_eq!(state.crop, Sensor::Hm01b0.geometry().crop);
    // Packing was enabled after the fillers that disabled it
    assert!(state.pack);
}

#[test]
fn command_source_can_reach_both_queues() {
    let (mut bg, _) = background(Sensor::Hm0360);
    while !bg.manager().init_done() {
        bg.step();
    }

    bg.management()
        .try_enqueue_management_request(ManagementRequest::RegisterWrite {
            bus_address: 0x35,
            register: 0x0100,
            value: 0x00,
        })
        .unwrap();
    bg.control()
        .try_enqueue_capture_config(ConfigRequest::SetSize {
            width: 160,
            height: 120,
        })
        .unwrap();

    let writes = bg.manager().i2c().writes;
    for _ in 0..8 {
        bg.step();
    }
    assert_eq!(bg.manager().i2c().writes, writes + 1);
    assert_eq!(bg.capture().state().width, 160);
}
