//! CSN transaction segmenter

use super::sampler::sample_byte;
use super::types::{MAX_TRANSACTION_BYTES, Transaction};
use crate::trace::{SpiCursors, TraceChannel};
use tracing::debug;

/// Find the next CSN low window and sample every byte clocked inside it
///
/// Bytes past `MAX_TRANSACTION_BYTES` are sampled but not kept. On return all
/// four cursors sit on the CSN rising edge. Returns `None` once the capture
/// holds no further complete window.
pub fn next_transaction<C: TraceChannel>(cursors: &mut SpiCursors<C>) -> Option<Transaction> {
    cursors.csn.advance_to_next_edge()?;
    if cursors.csn.bit_state().is_high() {
        cursors.csn.advance_to_next_edge()?;
    }
    cursors.sync_to_csn();

    let select_low = cursors.csn.sample_number();
    let Some(select_high) = cursors.csn.sample_of_next_edge() else {
        debug!("Capture ended with CSN low since sample {}", select_low);
        return None;
    };

    let mut bytes = Vec::with_capacity(MAX_TRANSACTION_BYTES);
    let mut observed = 0usize;
    while let Some(byte) = sample_byte(cursors, select_high, observed == 0) {
        if bytes.len() < MAX_TRANSACTION_BYTES {
            bytes.push(byte);
        }
        observed += 1;
    }

    if observed > MAX_TRANSACTION_BYTES {
        debug!(
            "Transaction at {} has {} bytes, keeping the first {}",
            select_low, observed, MAX_TRANSACTION_BYTES
        );
    }
    debug!(
        "CSN window {}..{}: {} bytes",
        select_low, select_high, observed
    );

    Some(Transaction {
        bytes,
        observed,
        select_low,
        select_high,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::SimulatedTrace;

    #[test]
    fn test_segments_consecutive_transactions() {
        let trace = SimulatedTrace::builder(10)
            .idle(4)
            .transaction(&[(0x20, 0x0E), (0x0F, 0x00)])
            .transaction(&[(0xFF, 0x0E)])
            .build();
        let mut cursors = trace.cursors();

        let first = next_transaction(&mut cursors).unwrap();
        assert_eq!(first.bytes.len(), 2);
        assert_eq!(first.bytes[0].mosi, 0x20);
        assert_eq!(first.bytes[0].miso, 0x0E);
        assert_eq!(first.bytes[1].mosi, 0x0F);
        assert!(first.select_low < first.bytes[0].start_sample);
        assert!(first.bytes[1].end_sample < first.select_high);
        assert_eq!(cursors.sck.sample_number(), first.select_high);

        let second = next_transaction(&mut cursors).unwrap();
        assert_eq!(second.bytes.len(), 1);
        assert_eq!(second.bytes[0].mosi, 0xFF);
        assert!(second.select_low > first.select_high);

        assert!(next_transaction(&mut cursors).is_none());
    }

    #[test]
    fn test_caps_at_max_transaction_bytes() {
        let words: Vec<(u8, u8)> = (0..34).map(|i| (i as u8, 0)).collect();
        let trace = SimulatedTrace::builder(10).idle(2).transaction(&words).build();
        let mut cursors = trace.cursors();

        let transaction = next_transaction(&mut cursors).unwrap();
        assert_eq!(transaction.bytes.len(), MAX_TRANSACTION_BYTES);
        assert_eq!(transaction.observed, 34);
        assert!(transaction.is_truncated());
        assert_eq!(transaction.bytes[32].mosi, 32);
    }

    #[test]
    fn test_exactly_max_transaction_bytes_kept() {
        let words: Vec<(u8, u8)> = (0..33).map(|i| (i as u8, 0)).collect();
        let trace = SimulatedTrace::builder(10).idle(2).transaction(&words).build();
        let mut cursors = trace.cursors();

        let transaction = next_transaction(&mut cursors).unwrap();
        assert_eq!(transaction.bytes.len(), 33);
        assert!(!transaction.is_truncated());
    }

    #[test]
    fn test_select_without_clock_is_empty() {
        let trace = SimulatedTrace::builder(10)
            .idle(2)
            .select()
            .idle(6)
            .deselect()
            .idle(2)
            .build();
        let mut cursors = trace.cursors();

        let transaction = next_transaction(&mut cursors).unwrap();
        assert!(transaction.is_empty());
        assert_eq!(transaction.observed, 0);
        assert!(next_transaction(&mut cursors).is_none());
    }

    #[test]
    fn test_capture_ending_with_csn_low() {
        let trace = SimulatedTrace::builder(10)
            .idle(2)
            .select()
            .word(0xFF, 0x0E)
            .build();
        let mut cursors = trace.cursors();
        assert!(next_transaction(&mut cursors).is_none());
    }
}
