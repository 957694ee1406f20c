//! Graph nodes: trace sources and the nRF24L01 decoder
//!
//! Sources stream one run-length encoded [`Edge`] channel per subscribed
//! probe, each fed from its own thread. The decoder consumes four of those
//! channels through [`EdgeCursor`]s.
//!
//! # Example
//!
//! ```no_run
//! use nrf24::nodes::{DslFileSource, spi_cursors};
//! use nrf24::nodes::decoders::Nrf24Analyzer;
//! use nrf24::results::ResultStore;
//! use nrf24::settings::AnalyzerSettings;
//! use nrf24::Scheduler;
//!
//! let channels = AnalyzerSettings::new(0, 1, 2, 3).validate()?;
//! let mut source = DslFileSource::open("capture.dsl")?;
//! let cursors = spi_cursors(&mut source, &channels, Some(4096))?;
//! let analyzer = Nrf24Analyzer::new(cursors, channels, ResultStore::new());
//!
//! let mut scheduler = Scheduler::new();
//! scheduler.start_process(Box::new(source));
//! scheduler.start_process(Box::new(analyzer));
//! scheduler.wait();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod decoders;
mod dsl_file;
mod simulation;

pub use dsl_file::{DslFileSource, DslHeader};
pub use simulation::{
    DEMO_HALF_PERIOD_SAMPLES, DEMO_SAMPLE_RATE_HZ, SimulatedTrace, SimulationSource, TraceBuilder,
};

use crate::Result;
use crate::runtime::{ChannelMessage, Edge, Receiver, Sender};
use crate::settings::ChannelMap;
use crate::trace::{EdgeCursor, SpiCursors};
use crossbeam_channel::{bounded, unbounded};
use std::collections::BTreeMap;

/// A node that can stream the edges of individual capture probes
pub trait EdgeSource {
    /// Open a new edge stream for `probe`
    ///
    /// Must be called before the node is started. `capacity` of `None` gives
    /// an unbounded channel.
    fn subscribe(&mut self, probe: usize, capacity: Option<usize>) -> Result<Receiver<Edge>>;
}

/// Subscribe to the four SPI lines of `channels` and wrap them in cursors
pub fn spi_cursors<S: EdgeSource + ?Sized>(
    source: &mut S,
    channels: &ChannelMap,
    capacity: Option<usize>,
) -> Result<SpiCursors<EdgeCursor>> {
    let mut cursor = |name: &str, probe: usize| -> Result<EdgeCursor> {
        Ok(EdgeCursor::new(name, source.subscribe(probe, capacity)?))
    };
    Ok(SpiCursors::new(
        cursor("csn", channels.csn)?,
        cursor("sck", channels.sck)?,
        cursor("mosi", channels.mosi)?,
        cursor("miso", channels.miso)?,
    ))
}

/// Per-probe broadcast senders of a source node
#[derive(Default)]
struct EdgeOutputs {
    outputs: BTreeMap<usize, Sender<Edge>>,
}

impl EdgeOutputs {
    fn subscribe(&mut self, probe: usize, capacity: Option<usize>) -> Receiver<Edge> {
        let (tx, rx) = match capacity {
            Some(n) => bounded::<ChannelMessage<Edge>>(n),
            None => unbounded::<ChannelMessage<Edge>>(),
        };
        self.outputs
            .entry(probe)
            .or_insert_with(|| Sender::new(Vec::new()))
            .add_destination(tx);
        Receiver::new(rx)
    }

    /// One `(probe, destination index, sender)` per subscriber
    fn split(&self) -> Vec<(usize, usize, Sender<Edge>)> {
        self.outputs
            .iter()
            .flat_map(|(&probe, sender)| {
                sender
                    .split_senders()
                    .into_iter()
                    .enumerate()
                    .map(move |(dest, sender)| (probe, dest, sender))
            })
            .collect()
    }

    fn num_destinations(&self) -> usize {
        self.outputs.values().map(Sender::num_destinations).sum()
    }
}
