//! Decode nRF24L01 SPI traffic from a DSLogic capture or the built-in demo trace
//!
//! Usage:
//!   nrf24-decode --file capture.dsl --mosi 0 --miso 1 --sck 2 --csn 3 -n 100
//!
//! Demo traffic with export:
//!   nrf24-decode --simulate --export nrf24.txt --base dec

use clap::Parser;
use nrf24::nodes::{
    DEMO_SAMPLE_RATE_HZ, DslFileSource, EdgeSource, SimulatedTrace, SimulationSource, spi_cursors,
};
use nrf24::results::{DisplayBase, ExportWriter, PublishingSink, TransactionRecord, export_row};
use nrf24::runtime::{ProcessNode, Receiver, Scheduler, WorkError, WorkResult, channel};
use nrf24::settings::{AnalyzerSettings, ChannelMap};
use nrf24::Nrf24Analyzer;
use std::fs::File;
use std::io::BufWriter;
use tracing::info;

/// Edge buffer per probe between source and decoder
const EDGE_BUFFER: usize = 65_536;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to DSL file
    #[arg(short, long, required_unless_present = "simulate")]
    file: Option<String>,

    /// Decode the built-in demo traffic instead of a file
    #[arg(long, conflicts_with = "file")]
    simulate: bool,

    /// Demo cycles to generate with --simulate
    #[arg(long, default_value = "1")]
    cycles: usize,

    /// MOSI channel
    #[arg(long)]
    mosi: Option<usize>,

    /// MISO channel
    #[arg(long)]
    miso: Option<usize>,

    /// SCK channel
    #[arg(long)]
    sck: Option<usize>,

    /// CSN channel
    #[arg(long)]
    csn: Option<usize>,

    /// Number display base: hex, dec, bin or ascii
    #[arg(long, default_value = "hex")]
    base: DisplayBase,

    /// Export file path (optional)
    #[arg(long)]
    export: Option<String>,

    /// Number of transactions to decode (0 = unlimited)
    #[arg(short, long, default_value = "0")]
    n: usize,
}

impl Args {
    fn settings(&self) -> AnalyzerSettings {
        let assigned = AnalyzerSettings {
            mosi: self.mosi,
            miso: self.miso,
            sck: self.sck,
            csn: self.csn,
        };
        if self.simulate && assigned == AnalyzerSettings::default() {
            ChannelMap::default().into()
        } else {
            assigned
        }
    }
}

/// Sink that logs transactions and optionally exports them
struct TransactionPrinter {
    input: Receiver<TransactionRecord>,
    export: Option<ExportWriter<BufWriter<File>>>,
    sample_rate_hz: f64,
    base: DisplayBase,
    count: usize,
    max_transactions: usize,
}

impl TransactionPrinter {
    fn new(
        input: Receiver<TransactionRecord>,
        sample_rate_hz: f64,
        base: DisplayBase,
        max_transactions: usize,
    ) -> Self {
        Self {
            input,
            export: None,
            sample_rate_hz,
            base,
            count: 0,
            max_transactions,
        }
    }

    fn with_export(mut self, path: &str) -> std::io::Result<Self> {
        let writer = BufWriter::new(File::create(path)?);
        self.export = Some(ExportWriter::new(writer, self.sample_rate_hz, self.base)?);
        Ok(self)
    }

    fn flush(&mut self) -> WorkResult {
        if let Some(export) = &mut self.export {
            export
                .flush()
                .map_err(|e| WorkError::NodeError(format!("Export flush error: {}", e)))?;
        }
        Ok(())
    }
}

impl ProcessNode for TransactionPrinter {
    fn name(&self) -> &str {
        "transaction_printer"
    }

    fn should_stop(&self) -> bool {
        self.max_transactions > 0 && self.count >= self.max_transactions
    }

    fn work(&mut self) -> WorkResult<usize> {
        let record = match self.input.recv() {
            Ok(record) => record,
            Err(WorkError::Shutdown) => {
                self.flush()?;
                return Err(WorkError::Shutdown);
            }
            Err(e) => return Err(e),
        };

        self.count += 1;
        info!(
            "#{} {}",
            self.count,
            export_row(&record, self.sample_rate_hz, 0, self.base)
        );

        if let Some(export) = &mut self.export {
            export
                .write_record(&record)
                .map_err(|e| WorkError::NodeError(format!("Export write error: {}", e)))?;
        }

        if self.max_transactions > 0 && self.count >= self.max_transactions {
            self.flush()?;
            info!(
                "[TransactionPrinter] Max transactions ({}) reached, shutting down",
                self.max_transactions
            );
            return Err(WorkError::Shutdown);
        }

        Ok(1)
    }
}

impl Drop for TransactionPrinter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let channels = args.settings().validate()?;

    info!("=== nRF24L01 Decode ===");
    info!("Channels: {}", channels);

    let mut source: Box<dyn SourceNode> = match &args.file {
        Some(path) => {
            info!("File: {}", path);
            Box::new(DslFileSource::open(path)?)
        }
        None => {
            info!("Simulating {} demo cycles", args.cycles);
            Box::new(SimulationSource::new(
                SimulatedTrace::demo_cycles(args.cycles),
                channels,
            ))
        }
    };
    let sample_rate_hz = source.sample_rate_hz();

    let cursors = spi_cursors(source.as_mut(), &channels, Some(EDGE_BUFFER))?;
    let (tx, rx) = channel::<TransactionRecord>(Some(1024));
    let analyzer = Nrf24Analyzer::new(cursors, channels, PublishingSink::new(tx));

    let mut printer = TransactionPrinter::new(rx, sample_rate_hz, args.base, args.n);
    if let Some(path) = &args.export {
        info!("Export: {}", path);
        printer = printer.with_export(path)?;
    }

    let mut scheduler = Scheduler::new();
    scheduler.start_process(source.into_node());
    scheduler.start_process(Box::new(analyzer));
    scheduler.start_process(Box::new(printer));

    info!("Running...");
    scheduler.wait();
    info!("Done!");

    Ok(())
}

/// A source the binary can feed into the decoder
trait SourceNode: EdgeSource {
    fn sample_rate_hz(&self) -> f64;

    fn into_node(self: Box<Self>) -> Box<dyn ProcessNode>;
}

impl SourceNode for DslFileSource {
    fn sample_rate_hz(&self) -> f64 {
        DslFileSource::sample_rate_hz(self)
    }

    fn into_node(self: Box<Self>) -> Box<dyn ProcessNode> {
        self
    }
}

impl SourceNode for SimulationSource {
    fn sample_rate_hz(&self) -> f64 {
        DEMO_SAMPLE_RATE_HZ
    }

    fn into_node(self: Box<Self>) -> Box<dyn ProcessNode> {
        self
    }
}
