//! Semicolon separated text export, one row per transaction

use super::format::{DisplayBase, command_texts, data_texts, status_texts};
use super::frame::DataLine;
use super::sink::{ResultStore, TransactionRecord};
use std::io::{self, Write};

pub const EXPORT_HEADER: &str = "Time [s];Status;Command;Data";

/// Incremental writer for the export format
///
/// The time column is the command frame's start relative to the trigger
/// sample, in seconds.
pub struct ExportWriter<W: Write> {
    writer: W,
    sample_rate_hz: f64,
    trigger_sample: u64,
    base: DisplayBase,
    rows: usize,
}

impl<W: Write> ExportWriter<W> {
    /// Create a writer and emit the header line
    pub fn new(mut writer: W, sample_rate_hz: f64, base: DisplayBase) -> io::Result<Self> {
        writeln!(writer, "{}", EXPORT_HEADER)?;
        Ok(Self {
            writer,
            sample_rate_hz,
            trigger_sample: 0,
            base,
            rows: 0,
        })
    }

    pub fn with_trigger_sample(mut self, trigger_sample: u64) -> Self {
        self.trigger_sample = trigger_sample;
        self
    }

    /// Number of transaction rows written
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn write_record(&mut self, record: &TransactionRecord) -> io::Result<()> {
        let row = export_row(record, self.sample_rate_hz, self.trigger_sample, self.base);
        writeln!(self.writer, "{}", row)?;
        self.rows += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Seconds between `trigger_sample` and `sample`, negative before the trigger
pub fn time_text(sample: u64, trigger_sample: u64, sample_rate_hz: f64) -> String {
    let offset = sample as f64 - trigger_sample as f64;
    format!("{:.9}", offset / sample_rate_hz)
}

/// One export row without the line terminator
pub fn export_row(
    record: &TransactionRecord,
    sample_rate_hz: f64,
    trigger_sample: u64,
    base: DisplayBase,
) -> String {
    let decoded = &record.decoded;
    let time = time_text(record.command.start_sample, trigger_sample, sample_rate_hz);
    let status = status_texts(decoded, base);
    let command = command_texts(decoded, base);

    let data = if record.data.is_some() {
        let mosi = data_texts(decoded, DataLine::Mosi, base);
        let texts = if mosi.is_empty() {
            data_texts(decoded, DataLine::Miso, base)
        } else {
            mosi
        };
        texts.first().unwrap_or_default().to_string()
    } else {
        String::new()
    };

    format!(
        "{};{};{};{}",
        time,
        status.first().unwrap_or_default(),
        command.first().unwrap_or_default(),
        data
    )
}

/// Write every committed transaction of `store`
pub fn export_store<W: Write>(
    store: &ResultStore,
    writer: W,
    sample_rate_hz: f64,
    trigger_sample: u64,
    base: DisplayBase,
) -> io::Result<W> {
    let mut export =
        ExportWriter::new(writer, sample_rate_hz, base)?.with_trigger_sample(trigger_sample);
    for record in store.transactions() {
        export.write_record(&record)?;
    }
    export.flush()?;
    Ok(export.into_inner())
}
