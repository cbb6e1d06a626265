//! Bounded history of temperature samples.

use crate::sensor::Temperature;

use std::collections::VecDeque;

/// FIFO of the most recent samples, oldest first
#[derive(Debug, Clone)]
pub struct ThermalWindow {
    samples: VecDeque<Temperature>,
    capacity: usize,
}

impl ThermalWindow {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 2, "BUG: thermal window needs room for two samples");

        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `sample`, evicting the oldest one when full
    pub fn push(&mut self, sample: Temperature) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Most recent sample. Must not be called before the first `push`.
    pub fn latest(&self) -> Temperature {
        *self.samples.back().expect("BUG: empty thermal window")
    }

    /// Sample recorded just before the latest one
    pub fn previous(&self) -> Option<Temperature> {
        self.samples.iter().rev().nth(1).copied()
    }

    /// Arithmetic mean truncated toward zero
    pub fn mean(&self) -> Temperature {
        assert!(!self.samples.is_empty(), "BUG: empty thermal window");
        let sum: Temperature = self.samples.iter().sum();
        sum / self.samples.len() as Temperature
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Temperature> {
        self.samples.iter()
    }
}
