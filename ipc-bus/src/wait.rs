//! Interruptible wait between non-blocking polls
//!
//! Channels stay non-blocking; a participant waiting for data spins briefly,
//! then yields, then parks for `idle_sleep` between polls so a waiting
//! participant does not pin a core. An `Interrupt` shared with the owner of
//! the run cancels every wait.

use crate::{Error, Result};
use crossbeam::utils::Backoff;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    /// Create an untripped interrupt
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel every wait observing this interrupt
    pub fn trip(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether `trip` has been called
    pub fn is_tripped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Wait tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitConfig {
    /// Backoff rounds (spin, then yield) before sleeping
    pub spin_limit: u32,

    /// Sleep between polls once spinning is exhausted (microseconds)
    pub idle_sleep_us: u64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            spin_limit: 16,
            idle_sleep_us: 200,
        }
    }
}

impl WaitConfig {
    /// Sleep duration between polls
    pub fn idle_sleep(&self) -> Duration {
        Duration::from_micros(self.idle_sleep_us)
    }
}

/// Suspension point used by the receive primitives
#[derive(Debug)]
pub struct Waiter {
    backoff: Backoff,
    rounds: u32,
    spin_limit: u32,
    idle_sleep: Duration,
    interrupt: Interrupt,
}

impl Waiter {
    /// Create a waiter for one blocking receive
    pub fn new(config: &WaitConfig, interrupt: &Interrupt) -> Self {
        Self {
            backoff: Backoff::new(),
            rounds: 0,
            spin_limit: config.spin_limit,
            idle_sleep: config.idle_sleep(),
            interrupt: interrupt.clone(),
        }
    }

    /// Fail fast if the run was interrupted
    pub fn check(&self) -> Result<()> {
        if self.interrupt.is_tripped() {
            return Err(Error::Interrupted);
        }
        Ok(())
    }

    /// Wait before the next poll
    pub fn wait(&mut self) -> Result<()> {
        self.check()?;

        if self.rounds < self.spin_limit {
            self.rounds += 1;
            self.backoff.snooze();
        } else {
            std::thread::sleep(self.idle_sleep);
        }
        Ok(())
    }

    /// Progress was made; start spinning again on the next wait
    pub fn reset(&mut self) {
        self.rounds = 0;
        self.backoff.reset();
    }
}
