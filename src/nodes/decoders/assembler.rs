//! Frame assembler: command word plus optional payload frame

use super::types::{MAX_TRANSACTION_BYTES, SampledByte};
use crate::protocol::Opcode;
use crate::results::{
    CommandFrame, DataFrame, DataLine, FrameSink, INLINE_PAYLOAD_BYTES, PayloadStorage,
};

/// Build the frames of one transaction
///
/// Payloads longer than `INLINE_PAYLOAD_BYTES` go to the sink's extended
/// store. Returns `None` for an empty transaction or one longer than
/// `MAX_TRANSACTION_BYTES`.
pub fn assemble<S: FrameSink + ?Sized>(
    bytes: &[SampledByte],
    select_low: u64,
    select_high: u64,
    sink: &mut S,
) -> Option<(CommandFrame, Option<DataFrame>)> {
    let (command_byte, payload) = bytes.split_first()?;
    if bytes.len() > MAX_TRANSACTION_BYTES {
        return None;
    }

    let mut command = CommandFrame {
        command: command_byte.mosi,
        status: command_byte.miso,
        start_sample: select_low,
        end_sample: command_byte.end_sample,
        has_data_frame: false,
    };

    let Some(first_payload) = payload.first() else {
        command.end_sample = select_high;
        return Some((command, None));
    };

    let opcode = Opcode::classify(command_byte.mosi);
    let line = if opcode.is_read() {
        DataLine::Miso
    } else {
        DataLine::Mosi
    };
    let values: Vec<u8> = payload.iter().map(|b| b.value(line)).collect();

    let storage = if values.len() <= INLINE_PAYLOAD_BYTES {
        let mut inline = [0u8; INLINE_PAYLOAD_BYTES];
        inline[..values.len()].copy_from_slice(&values);
        PayloadStorage::Inline(inline)
    } else {
        PayloadStorage::Extended {
            offset: sink.append_extended(&values),
        }
    };

    // Meet halfway between command and payload for continuous rendering
    let middle = command.end_sample.midpoint(first_payload.start_sample);
    command.end_sample = middle;
    command.has_data_frame = true;

    let data = DataFrame {
        length: values.len() as u8,
        line,
        start_sample: middle,
        end_sample: select_high,
        storage,
        unexpected: !opcode.has_data(),
    };

    Some((command, Some(data)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::decoders::types::BitMarker;
    use crate::protocol::decode;
    use crate::results::ResultStore;

    /// Bytes 100 samples apart, each spanning 80 samples
    fn bytes(words: &[(u8, u8)]) -> Vec<SampledByte> {
        words
            .iter()
            .enumerate()
            .map(|(i, &(mosi, miso))| {
                let start = 100 + i as u64 * 100;
                SampledByte {
                    mosi,
                    miso,
                    start_sample: start,
                    end_sample: start + 80,
                    bits: [BitMarker::default(); 8],
                }
            })
            .collect()
    }

    fn payload_transaction(command: u8, payload: &[u8], on_miso: bool) -> Vec<SampledByte> {
        let mut words = vec![(command, 0x0E)];
        words.extend(payload.iter().map(|&b| if on_miso { (0xFF, b) } else { (b, 0x00) }));
        bytes(&words)
    }

    #[test]
    fn test_single_byte_spans_window() {
        let mut store = ResultStore::new();
        let (command, data) = assemble(&bytes(&[(0xFF, 0x0E)]), 50, 400, &mut store).unwrap();
        assert_eq!(command.command, 0xFF);
        assert_eq!(command.status, 0x0E);
        assert_eq!(command.start_sample, 50);
        assert_eq!(command.end_sample, 400);
        assert!(!command.has_data_frame);
        assert!(data.is_none());
    }

    #[test]
    fn test_register_write_inline() {
        let mut store = ResultStore::new();
        let (command, data) =
            assemble(&bytes(&[(0x20, 0x0E), (0x0F, 0x00)]), 50, 300, &mut store).unwrap();
        let data = data.unwrap();

        // Command ends at 180, payload starts at 200
        assert_eq!(command.end_sample, 190);
        assert_eq!(data.start_sample, 190);
        assert_eq!(data.end_sample, 300);
        assert!(command.has_data_frame);
        assert_eq!(data.length, 1);
        assert_eq!(data.line, DataLine::Mosi);
        assert!(!data.unexpected);
        assert!(!data.is_extended());
        assert_eq!(data.payload(store.extended()), Some(&[0x0F][..]));
    }

    #[test]
    fn test_read_payload_uses_miso_and_extended_store() {
        let payload: Vec<u8> = (0..20).map(|i| 0xC0 | i).collect();
        let mut store = ResultStore::new();
        let (command, data) =
            assemble(&payload_transaction(0x61, &payload, true), 0, 5_000, &mut store).unwrap();
        let data = data.unwrap();

        assert_eq!(data.line, DataLine::Miso);
        assert!(data.is_extended());
        assert_eq!(data.length, 20);
        assert_eq!(store.extended().len(), 20);

        let decoded = decode(&command, Some(&data), store.extended());
        assert_eq!(decoded.payload(), payload.as_slice());
    }

    #[test]
    fn test_inline_boundary() {
        let mut store = ResultStore::new();
        let sixteen: Vec<u8> = (1..=16).collect();
        let (_, data) =
            assemble(&payload_transaction(0xA0, &sixteen, false), 0, 5_000, &mut store).unwrap();
        assert!(!data.unwrap().is_extended());
        assert!(store.extended().is_empty());

        let seventeen: Vec<u8> = (1..=17).collect();
        let (_, data) =
            assemble(&payload_transaction(0xA0, &seventeen, false), 0, 5_000, &mut store).unwrap();
        assert!(data.unwrap().is_extended());
        assert_eq!(store.extended().len(), 17);
    }

    #[test]
    fn test_extended_offsets_accumulate() {
        let mut store = ResultStore::new();
        let first: Vec<u8> = vec![0xAA; 20];
        let second: Vec<u8> = vec![0xBB; 32];
        let (_, a) =
            assemble(&payload_transaction(0xA0, &first, false), 0, 9_000, &mut store).unwrap();
        let (_, b) =
            assemble(&payload_transaction(0xA0, &second, false), 0, 9_000, &mut store).unwrap();

        assert_eq!(a.unwrap().storage, PayloadStorage::Extended { offset: 0 });
        assert_eq!(b.unwrap().storage, PayloadStorage::Extended { offset: 20 });
    }

    #[test]
    fn test_unexpected_data_is_flagged() {
        let mut store = ResultStore::new();
        let (command, data) =
            assemble(&payload_transaction(0xE2, &[1, 2, 3], false), 0, 900, &mut store).unwrap();
        let data = data.unwrap();
        assert!(data.unexpected);
        assert_eq!(data.length, 3);
        assert_eq!(data.payload(store.extended()), Some(&[1u8, 2, 3][..]));
        assert!(command.has_data_frame);

        let (_, data) =
            assemble(&payload_transaction(0xA0, &[1], false), 0, 900, &mut store).unwrap();
        assert!(!data.unwrap().unexpected);
    }

    #[test]
    fn test_rejects_empty_and_oversized() {
        let mut store = ResultStore::new();
        assert!(assemble(&[], 0, 10, &mut store).is_none());

        let payload = vec![0u8; 33];
        assert!(assemble(&payload_transaction(0xA0, &payload, false), 0, 9_000, &mut store).is_none());
        assert!(store.extended().is_empty());
    }

    #[test]
    fn test_round_trip_all_lengths() {
        let mut store = ResultStore::new();
        for length in 0..=32u8 {
            let payload: Vec<u8> = (0..length).map(|i| i.wrapping_mul(37) ^ length).collect();
            let (command, data) =
                assemble(&payload_transaction(0xA0, &payload, false), 0, 9_000, &mut store)
                    .unwrap();
            let decoded = decode(&command, data.as_ref(), store.extended());
            assert_eq!(decoded.payload(), payload.as_slice(), "length {}", length);
            assert_eq!(
                decoded,
                decode(&command, data.as_ref(), store.extended()),
                "length {}",
                length
            );
        }
    }
}
