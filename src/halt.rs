//! This module provides a way to
//!   * request termination of the daemon (from a signal handler or from code)
//!   * observe the request at the top of every control loop tick
//!   * sleep in a way that is cut short once termination has been requested
//!
//! The daemon is single-threaded; the only other context touching the flag is the signal
//! handler thread installed by `ctrlc`.

use crate::error::{self, ErrorKind};

use log::info;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Longest uninterrupted sleep slice
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Side that requests termination
#[derive(Clone)]
pub struct Sender {
    halted: Arc<AtomicBool>,
}

impl Sender {
    pub fn send_halt(&self) {
        self.halted.store(true, Ordering::SeqCst);
    }

    /// Hook `SIGINT`, `SIGHUP` and `SIGTERM` so that each of them requests termination
    pub fn hook_termination_signals(&self) -> error::Result<()> {
        let sender = self.clone();
        ctrlc::set_handler(move || {
            info!("Termination signal received");
            sender.send_halt();
        })
        .map_err(|e| ErrorKind::Signal(e.to_string()))?;
        Ok(())
    }
}

/// Side that observes termination
#[derive(Clone)]
pub struct Receiver {
    halted: Arc<AtomicBool>,
}

impl Receiver {
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` unless halted in the meantime.
    /// Returns `true` if the whole duration elapsed.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_halted() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
    }
}

/// Build a halt sender/receiver pair
pub fn make_pair() -> (Sender, Receiver) {
    let halted = Arc::new(AtomicBool::new(false));

    (
        Sender {
            halted: halted.clone(),
        },
        Receiver { halted },
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_halt_is_observed() {
        let (sender, receiver) = make_pair();
        let other = receiver.clone();
        assert!(!receiver.is_halted());
        sender.send_halt();
        assert!(receiver.is_halted());
        assert!(other.is_halted());
        // halting twice is harmless
        sender.clone().send_halt();
        assert!(receiver.is_halted());
    }

    #[test]
    fn test_sleep_completes() {
        let (_sender, receiver) = make_pair();
        let start = Instant::now();
        assert!(receiver.sleep(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert!(receiver.sleep(Duration::from_secs(0)));
    }

    #[test]
    fn test_sleep_interrupted() {
        let (sender, receiver) = make_pair();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            sender.send_halt();
        });
        let start = Instant::now();
        assert!(!receiver.sleep(Duration::from_secs(30)));
        assert!(start.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }
}
