//! Simulated nRF24L01 bus traffic
//!
//! [`TraceBuilder`] lays out SPI mode 0 words on four lines: CSN idles high,
//! SCK and both data lines idle low. Data bits are set half a clock phase
//! before the rising edge and the clock returns low half a phase later.
//! [`SimulationSource`] streams a built trace like a capture file would.

use super::{EdgeOutputs, EdgeSource};
use crate::runtime::{BitState, Edge, ProcessNode, Receiver, Sender, WorkError, WorkResult};
use crate::settings::ChannelMap;
use crate::trace::{EdgeCursor, SpiCursors};
use crate::{AnalyzerError, Result};
use std::iter;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info};

/// Clock half period of the demo trace
pub const DEMO_HALF_PERIOD_SAMPLES: u64 = 10;

/// Sample rate the demo trace is meant to be read at (1 MHz SPI clock)
pub const DEMO_SAMPLE_RATE_HZ: f64 = 20_000_000.0;

/// Half periods before the first transaction
const LEAD_IN: u64 = 10;
/// Half periods between CSN edges and the first or last word
const SPACE_COMMAND: u64 = 12;
/// Half periods after each demo cycle
const SPACE_CYCLE: u64 = 48;
/// Half periods the bus idles after every word
const SPACE_WORD: u64 = 2;

/// A generated capture of the four SPI lines
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SimulatedTrace {
    pub csn: Vec<Edge>,
    pub sck: Vec<Edge>,
    pub mosi: Vec<Edge>,
    pub miso: Vec<Edge>,
    /// First sample after the generated traffic
    pub end_sample: u64,
}

impl SimulatedTrace {
    pub fn builder(half_period_samples: u64) -> TraceBuilder {
        TraceBuilder::new(half_period_samples)
    }

    /// One cycle of typical radio driver traffic
    pub fn demo() -> Self {
        Self::demo_cycles(1)
    }

    pub fn demo_cycles(cycles: usize) -> Self {
        let mut builder = Self::builder(DEMO_HALF_PERIOD_SAMPLES).idle(LEAD_IN);
        for _ in 0..cycles {
            builder = builder.demo_cycle();
        }
        builder.build()
    }

    /// Pre-filled cursors over the four lines
    pub fn cursors(&self) -> SpiCursors<EdgeCursor> {
        SpiCursors::new(
            EdgeCursor::from_edges("csn", self.csn.iter().copied()),
            EdgeCursor::from_edges("sck", self.sck.iter().copied()),
            EdgeCursor::from_edges("mosi", self.mosi.iter().copied()),
            EdgeCursor::from_edges("miso", self.miso.iter().copied()),
        )
    }

    /// Edges of the line assigned to `probe`
    pub fn probe_edges(&self, channels: &ChannelMap, probe: usize) -> Option<&[Edge]> {
        if probe == channels.csn {
            Some(&self.csn)
        } else if probe == channels.sck {
            Some(&self.sck)
        } else if probe == channels.mosi {
            Some(&self.mosi)
        } else if probe == channels.miso {
            Some(&self.miso)
        } else {
            None
        }
    }
}

/// One line under construction
#[derive(Clone, Debug)]
struct Line {
    edges: Vec<Edge>,
    level: BitState,
}

impl Line {
    fn new(level: BitState) -> Self {
        Self {
            edges: vec![Edge::new(level, 0)],
            level,
        }
    }

    fn set(&mut self, level: BitState, sample: u64) {
        if level != self.level {
            self.level = level;
            self.edges.push(Edge::new(level, sample));
        }
    }
}

/// Chained builder for [`SimulatedTrace`]
#[derive(Clone, Debug)]
pub struct TraceBuilder {
    half_period: u64,
    now: u64,
    csn: Line,
    sck: Line,
    mosi: Line,
    miso: Line,
}

impl TraceBuilder {
    fn new(half_period_samples: u64) -> Self {
        Self {
            half_period: half_period_samples.max(2),
            now: 0,
            csn: Line::new(BitState::High),
            sck: Line::new(BitState::Low),
            mosi: Line::new(BitState::Low),
            miso: Line::new(BitState::Low),
        }
    }

    /// Hold every line for `half_periods` clock half periods
    pub fn idle(mut self, half_periods: u64) -> Self {
        self.now += half_periods * self.half_period;
        self
    }

    /// CSN low
    pub fn select(mut self) -> Self {
        self.csn.set(BitState::Low, self.now);
        self
    }

    /// CSN high
    pub fn deselect(mut self) -> Self {
        self.csn.set(BitState::High, self.now);
        self
    }

    /// Clock out one word, MSB first, on both data lines
    pub fn word(mut self, mosi: u8, miso: u8) -> Self {
        let setup = self.half_period / 2;
        let hold = self.half_period - setup;
        for bit in (0..8).rev() {
            self.mosi.set(BitState::from(mosi >> bit & 1 == 1), self.now);
            self.miso.set(BitState::from(miso >> bit & 1 == 1), self.now);
            self.now += setup;
            self.sck.set(BitState::High, self.now);
            self.now += hold;
            self.sck.set(BitState::Low, self.now);
        }
        self.mosi.set(BitState::Low, self.now);
        self.miso.set(BitState::Low, self.now);
        self.idle(SPACE_WORD)
    }

    /// A complete CSN window around `words`
    pub fn transaction(self, words: &[(u8, u8)]) -> Self {
        let builder = self.select().idle(SPACE_COMMAND);
        words
            .iter()
            .fold(builder, |b, &(mosi, miso)| b.word(mosi, miso))
            .deselect()
            .idle(SPACE_COMMAND)
    }

    /// The demo command sequence; CSN is pulsed high between commands
    pub fn demo_cycle(self) -> Self {
        let mut builder = self.select().idle(SPACE_COMMAND);
        for (i, words) in demo_commands().iter().enumerate() {
            if i > 0 {
                builder = builder.deselect().idle(SPACE_COMMAND).select();
            }
            for &(mosi, miso) in words {
                builder = builder.word(mosi, miso);
            }
        }
        builder.deselect().idle(SPACE_CYCLE)
    }

    pub fn build(self) -> SimulatedTrace {
        SimulatedTrace {
            csn: self.csn.edges,
            sck: self.sck.edges,
            mosi: self.mosi.edges,
            miso: self.miso.edges,
            end_sample: self.now,
        }
    }
}

/// Words of each demo command as `(mosi, miso)`
fn demo_commands() -> Vec<Vec<(u8, u8)>> {
    const STATUS: u8 = 0x0E;
    let write = |command: u8, payload: &[u8]| -> Vec<(u8, u8)> {
        iter::once((command, STATUS))
            .chain(payload.iter().map(|&b| (b, 0x00)))
            .collect()
    };
    let ack: Vec<u8> = (0..12).map(|c| 14 - c).collect();
    let tx: Vec<u8> = (0..10).map(|c| 10 - c).collect();
    let noack: Vec<u8> = (0..6).map(|c| 10 + c).collect();

    vec![
        // The second NOP is data the device does not expect
        vec![(0xFF, STATUS), (0xFF, STATUS)],
        write(0x50, &[0x73]),
        write(0xE2, &[]),
        write(0x2A, &[0xE7, 0xE8, 0xE9, 0xE0, 0xE1]),
        write(0x21, &[0x01]),
        write(0x20, &[0x0F]),
        write(0xA8, &ack),
        vec![(0x60, STATUS), (0x00, 0x08)],
        iter::once((0x61, 0x40))
            .chain((0..8).map(|c| (0x00, c)))
            .collect(),
        write(0x20, &[0x0E]),
        write(0xE1, &[]),
        write(0xA0, &tx),
        write(0xE3, &[]),
        write(0xB0, &noack),
    ]
}

/// Source node that streams a [`SimulatedTrace`]
///
/// Self-threading like the file source: `work()` spawns one thread per
/// subscriber, each sending the edges of its line and closing the stream.
pub struct SimulationSource {
    name: String,
    trace: Arc<SimulatedTrace>,
    channels: ChannelMap,
    outputs: EdgeOutputs,

    shutdown: Arc<AtomicBool>,
    threads_completed: Arc<AtomicUsize>,
    thread_handles: Option<Vec<JoinHandle<()>>>,
    threads_spawned: bool,
    num_threads: usize,
}

impl SimulationSource {
    /// Serve `trace` with its lines on the probes named by `channels`
    pub fn new(trace: SimulatedTrace, channels: ChannelMap) -> Self {
        Self {
            name: "simulation_source".to_string(),
            trace: Arc::new(trace),
            channels,
            outputs: EdgeOutputs::default(),
            shutdown: Arc::new(AtomicBool::new(false)),
            threads_completed: Arc::new(AtomicUsize::new(0)),
            thread_handles: None,
            threads_spawned: false,
            num_threads: 0,
        }
    }

    /// With custom name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn trace(&self) -> &SimulatedTrace {
        &self.trace
    }

    fn line_thread(
        trace: Arc<SimulatedTrace>,
        channels: ChannelMap,
        probe: usize,
        sender: Sender<Edge>,
        shutdown: Arc<AtomicBool>,
        completed: Arc<AtomicUsize>,
    ) {
        let edges = trace.probe_edges(&channels, probe).unwrap_or_default();
        let mut sent = 0usize;
        for edge in edges {
            if shutdown.load(Ordering::Relaxed) {
                debug!("[probe{}] Shutdown after {} edges", probe, sent);
                break;
            }
            if sender.send(*edge).is_err() {
                debug!("[probe{}] Receiver disconnected after {} edges", probe, sent);
                break;
            }
            sent += 1;
        }
        sender.close();
        debug!("[probe{}] Simulated line complete: {} edges", probe, sent);
        completed.fetch_add(1, Ordering::Relaxed);
    }
}

impl EdgeSource for SimulationSource {
    fn subscribe(&mut self, probe: usize, capacity: Option<usize>) -> Result<Receiver<Edge>> {
        if self.trace.probe_edges(&self.channels, probe).is_none() {
            return Err(AnalyzerError::InvalidProbe(probe));
        }
        Ok(self.outputs.subscribe(probe, capacity))
    }
}

impl ProcessNode for SimulationSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn should_stop(&self) -> bool {
        self.threads_spawned && self.threads_completed.load(Ordering::Relaxed) >= self.num_threads
    }

    fn is_self_threading(&self) -> bool {
        true
    }

    fn work(&mut self) -> WorkResult<usize> {
        if self.threads_spawned {
            return Err(WorkError::NodeError(
                "work() called multiple times on self-threading node".to_string(),
            ));
        }
        self.threads_spawned = true;

        let mut handles = Vec::new();
        for (probe, dest, sender) in self.outputs.split() {
            let trace = Arc::clone(&self.trace);
            let channels = self.channels;
            let shutdown = Arc::clone(&self.shutdown);
            let completed = Arc::clone(&self.threads_completed);

            let handle = std::thread::Builder::new()
                .name(format!("sim_probe{}_dest{}", probe, dest))
                .spawn(move || {
                    Self::line_thread(trace, channels, probe, sender, shutdown, completed)
                })
                .map_err(|e| WorkError::NodeError(format!("Failed to spawn line thread: {}", e)))?;
            handles.push(handle);
        }

        self.num_threads = handles.len();
        self.thread_handles = Some(handles);
        info!(
            "Simulation source: {} samples on {} streams ({})",
            self.trace.end_sample,
            self.num_threads,
            self.channels
        );
        Ok(0)
    }
}

impl Drop for SimulationSource {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handles) = self.thread_handles.take() {
            for handle in handles {
                let _ = handle.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::TraceChannel;

    #[test]
    fn test_word_timing() {
        let trace = SimulatedTrace::builder(10).idle(1).word(0x80, 0x01).build();

        // Data set at 10, rising edge 5 samples later, falling 5 after that
        assert_eq!(trace.sck[1], Edge::high(15));
        assert_eq!(trace.sck[2], Edge::low(20));
        assert_eq!(trace.sck.len(), 1 + 16);
        assert_eq!(trace.mosi, vec![Edge::low(0), Edge::high(10), Edge::low(20)]);
        assert_eq!(trace.miso, vec![Edge::low(0), Edge::high(80), Edge::low(90)]);
        assert_eq!(trace.end_sample, 90 + 20);
    }

    #[test]
    fn test_idle_levels() {
        let trace = SimulatedTrace::builder(10).idle(3).build();
        assert_eq!(trace.csn, vec![Edge::high(0)]);
        assert_eq!(trace.sck, vec![Edge::low(0)]);
        assert_eq!(trace.end_sample, 30);
    }

    #[test]
    fn test_transaction_frames_words_with_csn() {
        let trace = SimulatedTrace::builder(10)
            .transaction(&[(0xFF, 0x0E)])
            .build();
        assert_eq!(trace.csn.len(), 3);
        assert_eq!(trace.csn[1], Edge::low(0));
        let first_clock = trace.sck[1].start_sample;
        assert!(first_clock > trace.csn[1].start_sample);
        assert!(trace.sck.last().unwrap().start_sample < trace.csn[2].start_sample);
    }

    #[test]
    fn test_demo_has_one_window_per_command() {
        let trace = SimulatedTrace::demo();
        let windows = trace
            .csn
            .iter()
            .filter(|e| e.level == BitState::Low)
            .count();
        assert_eq!(windows, 14);
        assert_eq!(trace.csn.last().map(|e| e.level), Some(BitState::High));

        let two = SimulatedTrace::demo_cycles(2);
        assert_eq!(
            two.csn.iter().filter(|e| e.level == BitState::Low).count(),
            28
        );
    }

    #[test]
    fn test_cursors_follow_trace() {
        let trace = SimulatedTrace::builder(10).idle(1).word(0xFF, 0x00).build();
        let mut cursors = trace.cursors();
        assert_eq!(cursors.sck.advance_to_next_edge(), Some(15));
        cursors.sync_to_sck();
        assert!(cursors.mosi.bit_state().is_high());
        assert!(cursors.miso.bit_state().is_low());
        assert!(cursors.csn.bit_state().is_high());
    }

    #[test]
    fn test_source_streams_subscribed_probes() {
        let channels = ChannelMap::default();
        let trace = SimulatedTrace::builder(10).transaction(&[(0xA5, 0x5A)]).build();
        let expected = trace.mosi.clone();
        let mut source = SimulationSource::new(trace, channels);

        let mut first = source.subscribe(channels.mosi, Some(2)).unwrap();
        let mut second = source.subscribe(channels.mosi, None).unwrap();
        assert!(matches!(
            source.subscribe(9, None),
            Err(AnalyzerError::InvalidProbe(9))
        ));

        source.work().unwrap();
        assert!(source.work().is_err());

        let mut received = Vec::new();
        while let Ok(edge) = first.recv() {
            received.push(edge);
        }
        assert_eq!(received, expected);
        assert_eq!(second.recv().unwrap(), expected[0]);

        drop(second);
        while !source.should_stop() {
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
    }
}
