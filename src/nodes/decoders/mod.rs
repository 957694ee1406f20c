//! nRF24L01 decoder
//!
//! The decode pipeline runs bottom-up: `sampler` reads bytes edge by edge,
//! `segmenter` groups them into CSN windows, `assembler` turns a window into
//! frames and `Nrf24Analyzer` drives all three as a graph node.

pub mod assembler;
pub mod nrf24_analyzer;
pub mod sampler;
pub mod segmenter;
pub mod types;

pub use types::{BitMarker, ClockEdge, MAX_TRANSACTION_BYTES, SampledByte, Transaction};

pub use assembler::assemble;
pub use nrf24_analyzer::{AnalyzerStats, Nrf24Analyzer};
pub use sampler::sample_byte;
pub use segmenter::next_transaction;
