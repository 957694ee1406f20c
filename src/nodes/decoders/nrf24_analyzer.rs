//! nRF24L01 analyzer node
//!
//! Drives the segmenter, sampler and assembler over the four SPI cursors and
//! hands the resulting frames and markers to a [`FrameSink`]. Every `work()`
//! call decodes exactly one CSN window, so the scheduler can cancel the node
//! between transactions.

use super::assembler::assemble;
use super::segmenter::next_transaction;
use super::types::{ClockEdge, Transaction};
use crate::protocol::Opcode;
use crate::results::{CommandFrame, DataFrame, Frame, FrameSink, Marker, MarkerKind};
use crate::runtime::{BitState, ProcessNode, WorkError, WorkResult};
use crate::settings::ChannelMap;
use crate::trace::{SpiCursors, TraceChannel};
use tracing::{debug, info, warn};

/// Running totals of one decode session
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AnalyzerStats {
    /// CSN windows seen, including empty ones
    pub windows: u64,
    /// Windows that produced frames
    pub transactions: u64,
    pub truncated: u64,
    pub unexpected_data: u64,
    pub undefined_commands: u64,
}

/// nRF24L01 SPI decoder node
///
/// Inputs: CSN, SCK, MOSI and MISO cursors
/// Output: frames and markers appended to the sink
pub struct Nrf24Analyzer<C, S> {
    name: String,
    cursors: SpiCursors<C>,
    channels: ChannelMap,
    sink: S,
    stats: AnalyzerStats,
    exhausted: bool,
}

impl<C: TraceChannel, S: FrameSink> Nrf24Analyzer<C, S> {
    pub fn new(cursors: SpiCursors<C>, channels: ChannelMap, sink: S) -> Self {
        Self {
            name: "nrf24_analyzer".to_string(),
            cursors,
            channels,
            sink,
            stats: AnalyzerStats::default(),
            exhausted: false,
        }
    }

    /// With custom name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn stats(&self) -> AnalyzerStats {
        self.stats
    }

    /// Decode the next CSN window
    ///
    /// Returns `false` once the capture holds no further complete window.
    pub fn decode_next_transaction(&mut self) -> bool {
        if self.exhausted {
            return false;
        }

        let Some(transaction) = next_transaction(&mut self.cursors) else {
            self.exhausted = true;
            info!(
                "[{}] Capture exhausted after {} windows, {} transactions",
                self.name, self.stats.windows, self.stats.transactions
            );
            return false;
        };
        self.stats.windows += 1;

        if transaction.is_truncated() {
            self.stats.truncated += 1;
            warn!(
                "[{}] Transaction at sample {} has {} bytes, only {} decoded",
                self.name,
                transaction.select_low,
                transaction.observed,
                transaction.bytes.len()
            );
        }

        match assemble(
            &transaction.bytes,
            transaction.select_low,
            transaction.select_high,
            &mut self.sink,
        ) {
            Some((command, data)) => {
                self.check_protocol(&command, data.as_ref());
                self.sink.append_frame(Frame::Command(command));
                if let Some(data) = data {
                    self.sink.append_frame(Frame::Data(data));
                }
                self.sink.commit();
                self.emit_markers(&transaction);
                self.stats.transactions += 1;
            }
            None => debug!(
                "[{}] Empty CSN window {}..{}",
                self.name, transaction.select_low, transaction.select_high
            ),
        }

        self.sink.report_progress(self.cursors.sck.sample_number());
        true
    }

    /// Decode until the capture is exhausted or the sink is closed
    pub fn run(&mut self) -> AnalyzerStats {
        while !self.sink.is_closed() && self.decode_next_transaction() {}
        self.stats
    }

    fn check_protocol(&mut self, command: &CommandFrame, data: Option<&DataFrame>) {
        let opcode = Opcode::classify(command.command);
        if opcode == Opcode::Undefined {
            self.stats.undefined_commands += 1;
            warn!(
                "[{}] Undefined command 0x{:02X} at sample {}",
                self.name, command.command, command.start_sample
            );
        }
        if let Some(data) = data
            && data.unexpected
        {
            self.stats.unexpected_data += 1;
            warn!(
                "[{}] {} carried {} unexpected data bytes at sample {}",
                self.name, opcode, data.length, data.start_sample
            );
        }
    }

    fn emit_markers(&mut self, transaction: &Transaction) {
        for byte in &transaction.bytes {
            for bit in &byte.bits {
                let clock = match bit.clock {
                    ClockEdge::Rising => MarkerKind::Rising,
                    ClockEdge::Falling => MarkerKind::Falling,
                };
                self.sink
                    .add_marker(Marker::new(bit.sample, clock, self.channels.sck));
                self.sink.add_marker(Marker::new(
                    bit.sample,
                    level_marker(bit.mosi),
                    self.channels.mosi,
                ));
                self.sink.add_marker(Marker::new(
                    bit.sample,
                    level_marker(bit.miso),
                    self.channels.miso,
                ));
            }
        }

        self.sink.add_marker(Marker::new(
            transaction.select_low,
            MarkerKind::Start,
            self.channels.csn,
        ));
        self.sink.add_marker(Marker::new(
            transaction.select_high,
            MarkerKind::Stop,
            self.channels.csn,
        ));
    }
}

fn level_marker(level: BitState) -> MarkerKind {
    match level {
        BitState::High => MarkerKind::One,
        BitState::Low => MarkerKind::Zero,
    }
}

impl<C, S> ProcessNode for Nrf24Analyzer<C, S>
where
    C: TraceChannel + Send,
    S: FrameSink + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn should_stop(&self) -> bool {
        self.sink.is_closed()
    }

    fn work(&mut self) -> WorkResult<usize> {
        let before = self.stats.transactions;
        if !self.decode_next_transaction() {
            return Err(WorkError::Shutdown);
        }
        Ok((self.stats.transactions - before) as usize)
    }
}
