//! nRF24L01 SPI bus decoder
//!
//! Decodes the command traffic between a microcontroller and an nRF24L01
//! radio from a four-channel logic capture (CSN, SCK, MOSI, MISO) into
//! command and payload frames, with register-aware text rendering and
//! semicolon separated export.
//!
//! # Architecture
//!
//! - **Sources**: `DslFileSource` streams DSLogic captures, `SimulationSource`
//!   streams generated traffic; both send run-length encoded edges per probe
//! - **Cursors**: `EdgeCursor` walks one edge stream as a `TraceChannel`
//! - **Decoder**: `Nrf24Analyzer` turns CSN windows into frames on a `FrameSink`
//! - **Scheduler**: thread-per-node runtime for the whole graph
//!
//! # Example
//!
//! ```
//! use nrf24::nodes::SimulatedTrace;
//! use nrf24::nodes::decoders::Nrf24Analyzer;
//! use nrf24::results::{DisplayBase, ResultStore, export_store};
//! use nrf24::settings::ChannelMap;
//!
//! let trace = SimulatedTrace::demo();
//! let mut analyzer = Nrf24Analyzer::new(trace.cursors(), ChannelMap::default(), ResultStore::new());
//! analyzer.run();
//!
//! let csv = export_store(analyzer.sink(), Vec::new(), 20e6, 0, DisplayBase::Hexadecimal)?;
//! assert!(String::from_utf8_lossy(&csv).starts_with("Time [s];Status;Command;Data"));
//! # Ok::<(), std::io::Error>(())
//! ```

use thiserror::Error;

pub mod nodes;
pub mod protocol;
pub mod results;
pub mod runtime;
pub mod settings;
pub mod trace;

pub use nodes::decoders::{AnalyzerStats, Nrf24Analyzer};
pub use nodes::{DslFileSource, EdgeSource, SimulatedTrace, SimulationSource, spi_cursors};
pub use protocol::{DecodedCommand, Opcode, Register, decode};
pub use results::{DisplayBase, ExportWriter, FrameSink, PublishingSink, ResultStore};
pub use runtime::{Edge, ProcessNode, Scheduler, WorkError, WorkResult};
pub use settings::{AnalyzerSettings, ChannelMap, SettingsError};
pub use trace::{BitState, EdgeCursor, SpiCursors, TraceChannel};

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Header parsing error: {0}")]
    ParseHeader(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid probe number: {0}")]
    InvalidProbe(usize),

    #[error("Invalid block number: {0}")]
    InvalidBlock(u64),

    #[error("Position out of bounds: {0}")]
    OutOfBounds(u64),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;
