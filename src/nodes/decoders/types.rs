//! Sample-domain decoder types

use crate::results::DataLine;
use crate::runtime::BitState;

/// Longest valid transaction: one command byte and a 32 byte payload
pub const MAX_TRANSACTION_BYTES: usize = 33;

/// Clock edge a bit was sampled on
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClockEdge {
    #[default]
    Rising,
    Falling,
}

/// Line levels at the instant one bit was sampled
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitMarker {
    pub sample: u64,
    pub clock: ClockEdge,
    pub mosi: BitState,
    pub miso: BitState,
}

impl Default for BitMarker {
    fn default() -> Self {
        Self {
            sample: 0,
            clock: ClockEdge::Rising,
            mosi: BitState::Low,
            miso: BitState::Low,
        }
    }
}

/// One 8-bit SPI word, MSB first, as seen on both data lines
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampledByte {
    pub mosi: u8,
    pub miso: u8,
    /// Sample of the first bit
    pub start_sample: u64,
    /// Clock position after the trailing edge of the last bit
    pub end_sample: u64,
    pub bits: [BitMarker; 8],
}

impl SampledByte {
    pub fn value(&self, line: DataLine) -> u8 {
        match line {
            DataLine::Mosi => self.mosi,
            DataLine::Miso => self.miso,
        }
    }
}

/// Bytes clocked while CSN was low
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    /// At most `MAX_TRANSACTION_BYTES` bytes, in bus order
    pub bytes: Vec<SampledByte>,
    /// Complete bytes seen on the bus, including those past the cap
    pub observed: usize,
    /// CSN falling edge
    pub select_low: u64,
    /// CSN rising edge
    pub select_high: u64,
}

impl Transaction {
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Bytes were dropped because the transaction ran past the cap
    pub fn is_truncated(&self) -> bool {
        self.observed > self.bytes.len()
    }
}
