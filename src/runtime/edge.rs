//! Run-length encoded channel levels

use std::fmt;
use std::ops::Not;

/// Logic level of a digital channel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BitState {
    Low,
    High,
}

impl BitState {
    pub fn is_high(self) -> bool {
        self == BitState::High
    }

    pub fn is_low(self) -> bool {
        self == BitState::Low
    }
}

impl From<bool> for BitState {
    fn from(value: bool) -> Self {
        if value { BitState::High } else { BitState::Low }
    }
}

impl Not for BitState {
    type Output = BitState;

    fn not(self) -> Self::Output {
        match self {
            BitState::Low => BitState::High,
            BitState::High => BitState::Low,
        }
    }
}

/// A channel level starting at a given sample index
///
/// Only transitions are sent: the level holds until the `start_sample` of the
/// next `Edge` on the same channel. The first edge of a stream carries the
/// initial level at sample 0, and the last one extends to the end of the
/// capture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge {
    /// Channel level from `start_sample` onwards
    pub level: BitState,
    /// Sample index at which this level begins
    pub start_sample: u64,
}

impl Edge {
    pub fn new(level: BitState, start_sample: u64) -> Self {
        Self {
            level,
            start_sample,
        }
    }

    pub fn high(start_sample: u64) -> Self {
        Self::new(BitState::High, start_sample)
    }

    pub fn low(start_sample: u64) -> Self {
        Self::new(BitState::Low, start_sample)
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Edge[{:?} @ {}]", self.level, self.start_sample)
    }
}
