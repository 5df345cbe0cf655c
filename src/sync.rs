//! Interrupt-to-task signaling primitives.
//!
//! Interrupt handlers only ever `give`/`set`; every interpretation of the signal happens in task
//! context. Both primitives are a single atomic word, so they can live in a `static` shared by an
//! ISR and a task without a critical section.

use core::sync::atomic::{AtomicBool, Ordering};
use embedded_hal::blocking::delay::DelayUs;

use crate::config::POLL_STEP_US;

/// Something that can be told an operation has completed.
pub trait Notify {
    fn notify(&self);
}

/// Binary semaphore: any number of gives before a take collapse into one.
#[derive(Debug)]
pub struct BinarySemaphore {
    available: AtomicBool,
}

impl BinarySemaphore {
    pub const fn new() -> Self {
        BinarySemaphore {
            available: AtomicBool::new(false),
        }
    }

    /// Make the semaphore available. Safe to call from interrupt context.
    pub fn give(&self) {
        self.available.store(true, Ordering::Release);
    }

    /// Take the semaphore if it is available, without waiting.
    pub fn try_take(&self) -> bool {
        self.available.swap(false, Ordering::AcqRel)
    }

    /// Take the semaphore, waiting at most `timeout_us`. A zero timeout is a single attempt.
    pub fn take_timeout<D: DelayUs<u32>>(&self, delay: &mut D, timeout_us: u32) -> bool {
        let mut budget = PollBudget::new(timeout_us);
        loop {
            if self.try_take() {
                return true;
            }
            if budget.exhausted() {
                return false;
            }
            budget.step(delay);
        }
    }

    /// Take the semaphore, waiting as long as it takes.
    pub fn take_blocking<D: DelayUs<u32>>(&self, delay: &mut D) {
        while !self.try_take() {
            delay.delay_us(POLL_STEP_US);
        }
    }

    /// Drop a pending give.
    pub fn reset(&self) {
        self.available.store(false, Ordering::Release);
    }
}

impl Notify for BinarySemaphore {
    fn notify(&self) {
        self.give();
    }
}

/// One-shot event flag, set by an interrupt and consumed exactly once by a task.
#[derive(Debug)]
pub struct EventFlag {
    raised: AtomicBool,
}

impl EventFlag {
    pub const fn new() -> Self {
        EventFlag {
            raised: AtomicBool::new(false),
        }
    }

    pub fn set(&self) {
        self.raised.store(true, Ordering::Release);
    }

    /// Read and clear the flag.
    pub fn take(&self) -> bool {
        self.raised.swap(false, Ordering::AcqRel)
    }

    pub fn clear(&self) {
        self.raised.store(false, Ordering::Release);
    }
}

/// Time spent in a polled wait, in `POLL_STEP_US` steps.
///
/// The count saturates, so a limit of `u32::MAX` waits (practically) forever.
#[derive(Clone, Copy, Debug)]
pub struct PollBudget {
    waited: u32,
    limit: u32,
}

impl PollBudget {
    pub fn new(limit_us: u32) -> Self {
        PollBudget {
            waited: 0,
            limit: limit_us,
        }
    }

    pub fn exhausted(&self) -> bool {
        self.waited >= self.limit
    }

    /// Sleep for one poll step.
    pub fn step<D: DelayUs<u32>>(&mut self, delay: &mut D) {
        delay.delay_us(POLL_STEP_US);
        self.waited = self.waited.saturating_add(POLL_STEP_US);
    }
}

/// Delay that returns immediately, for polling without ever sleeping.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoDelay;

impl DelayUs<u32> for NoDelay {
    fn delay_us(&mut self, _us: u32) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Counts how long a caller asked to wait.
    struct CountingDelay(u32);

    impl DelayUs<u32> for CountingDelay {
        fn delay_us(&mut self, us: u32) {
            self.0 += us;
        }
    }

    #[test]
    fn gives_collapse_into_one_take() {
        let sem = BinarySemaphore::new();
        sem.give();
        sem.give();
        assert!(sem.try_take());
        assert!(!sem.try_take());
    }

    #[test]
    fn timed_take_gives_up_after_timeout() {
        let sem = BinarySemaphore::new();
        let mut delay = CountingDelay(0);
        assert!(!sem.take_timeout(&mut delay, 1_000));
        assert_eq!(delay.0, 1_000);
    }

    #[test]
    fn zero_timeout_is_one_attempt() {
        let sem = BinarySemaphore::new();
        let mut delay = CountingDelay(0);
        assert!(!sem.take_timeout(&mut delay, 0));
        assert_eq!(delay.0, 0);

        sem.give();
        assert!(sem.take_timeout(&mut delay, 0));
    }

    #[test]
    fn reset_discards_stale_give() {
        let sem = BinarySemaphore::new();
        sem.give();
        sem.reset();
        assert!(!sem.try_take());
    }

    #[test]
    fn budget_saturates_near_the_top_of_the_range() {
        let mut budget = PollBudget {
            waited: u32::MAX - 10,
            limit: u32::MAX,
        };
        let mut delay = CountingDelay(0);
        assert!(!budget.exhausted());
        budget.step(&mut delay);
        assert!(budget.exhausted());
        budget.step(&mut delay);
        assert!(budget.exhausted());
        assert_eq!(delay.0, 2 * POLL_STEP_US);
    }

    #[test]
    fn flag_is_consumed_once() {
        let flag = EventFlag::new();
        assert!(!flag.take());
        flag.set();
        assert!(flag.take());
        assert!(!flag.take());
    }
}
