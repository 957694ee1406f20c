//! Frame sinks: where the decoder appends frames and markers

use super::frame::{CommandFrame, DataFrame, ExtendedDataStore, Frame, Marker};
use crate::protocol::{DecodedCommand, decode};
use crate::runtime::Sender;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Destination for decoded frames
///
/// Frames of one transaction are appended in order (command frame first) and
/// become visible on `commit`. Markers belong to the transaction committed
/// just before them.
pub trait FrameSink {
    fn append_frame(&mut self, frame: Frame);

    fn add_marker(&mut self, marker: Marker);

    /// Publish the frames appended since the previous commit
    fn commit(&mut self);

    /// Store an overflow payload and return the offset it starts at
    fn append_extended(&mut self, payload: &[u8]) -> usize;

    /// Decoding has reached `sample`
    fn report_progress(&mut self, _sample: u64) {}

    /// Nobody consumes the results any more
    fn is_closed(&self) -> bool {
        false
    }
}

/// A committed transaction: its frames and their decoded view
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionRecord {
    pub command: CommandFrame,
    pub data: Option<DataFrame>,
    pub decoded: DecodedCommand,
}

/// In-memory, append-only result store
#[derive(Debug, Default)]
pub struct ResultStore {
    frames: Vec<Frame>,
    committed_frames: usize,
    committed_transactions: usize,
    markers: Vec<Marker>,
    extended: ExtendedDataStore,
    progress: u64,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed frames
    pub fn frames(&self) -> &[Frame] {
        &self.frames[..self.committed_frames]
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn extended(&self) -> &ExtendedDataStore {
        &self.extended
    }

    pub fn committed_transactions(&self) -> usize {
        self.committed_transactions
    }

    /// Last sample reported through `report_progress`
    pub fn progress(&self) -> u64 {
        self.progress
    }

    /// Transaction owning the frame at `frame_index`
    ///
    /// Either frame of a command/data pair resolves to the same transaction.
    /// The decoded view is rebuilt on every call.
    pub fn transaction_at(&self, frame_index: usize) -> Option<TransactionRecord> {
        let frames = self.frames();
        let command_index = match frames.get(frame_index)? {
            Frame::Command(_) => frame_index,
            Frame::Data(_) => frame_index.checked_sub(1)?,
        };
        let command = *frames.get(command_index)?.as_command()?;
        let data = if command.has_data_frame {
            frames.get(command_index + 1).and_then(Frame::as_data).copied()
        } else {
            None
        };

        Some(TransactionRecord {
            command,
            data,
            decoded: decode(&command, data.as_ref(), &self.extended),
        })
    }

    /// All committed transactions in bus order
    pub fn transactions(&self) -> impl Iterator<Item = TransactionRecord> + '_ {
        self.frames()
            .iter()
            .enumerate()
            .filter(|(_, frame)| matches!(frame, Frame::Command(_)))
            .filter_map(|(index, _)| self.transaction_at(index))
    }

    fn last_committed(&self) -> Option<TransactionRecord> {
        let index = self
            .frames()
            .iter()
            .rposition(|frame| matches!(frame, Frame::Command(_)))?;
        self.transaction_at(index)
    }
}

impl FrameSink for ResultStore {
    fn append_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    fn add_marker(&mut self, marker: Marker) {
        self.markers.push(marker);
    }

    fn commit(&mut self) {
        if self.committed_frames < self.frames.len() {
            self.committed_frames = self.frames.len();
            self.committed_transactions += 1;
        }
    }

    fn append_extended(&mut self, payload: &[u8]) -> usize {
        self.extended.append(payload)
    }

    fn report_progress(&mut self, sample: u64) {
        self.progress = sample;
    }
}

/// Shared store, written by the decoder thread and read elsewhere
impl FrameSink for Arc<Mutex<ResultStore>> {
    fn append_frame(&mut self, frame: Frame) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .append_frame(frame);
    }

    fn add_marker(&mut self, marker: Marker) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add_marker(marker);
    }

    fn commit(&mut self) {
        self.lock().unwrap_or_else(PoisonError::into_inner).commit();
    }

    fn append_extended(&mut self, payload: &[u8]) -> usize {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .append_extended(payload)
    }

    fn report_progress(&mut self, sample: u64) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .report_progress(sample);
    }
}

/// Result store that streams every committed transaction downstream
pub struct PublishingSink {
    store: ResultStore,
    output: Sender<TransactionRecord>,
    closed: bool,
}

impl PublishingSink {
    pub fn new(output: Sender<TransactionRecord>) -> Self {
        Self {
            store: ResultStore::new(),
            output,
            closed: false,
        }
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }
}

impl FrameSink for PublishingSink {
    fn append_frame(&mut self, frame: Frame) {
        self.store.append_frame(frame);
    }

    fn add_marker(&mut self, marker: Marker) {
        self.store.add_marker(marker);
    }

    fn commit(&mut self) {
        self.store.commit();
        if self.closed {
            return;
        }
        if let Some(record) = self.store.last_committed()
            && self.output.send(record).is_err()
        {
            debug!("All transaction receivers disconnected");
            self.closed = true;
        }
    }

    fn append_extended(&mut self, payload: &[u8]) -> usize {
        self.store.append_extended(payload)
    }

    fn report_progress(&mut self, sample: u64) {
        self.store.report_progress(sample);
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for PublishingSink {
    fn drop(&mut self) {
        self.output.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Opcode;
    use crate::results::{DataLine, INLINE_PAYLOAD_BYTES, PayloadStorage};
    use crate::runtime::{WorkError, channel};

    fn command(byte: u8, has_data_frame: bool) -> CommandFrame {
        CommandFrame {
            command: byte,
            status: 0x0E,
            start_sample: 10,
            end_sample: 20,
            has_data_frame,
        }
    }

    fn data(payload: &[u8]) -> DataFrame {
        let mut bytes = [0u8; INLINE_PAYLOAD_BYTES];
        bytes[..payload.len()].copy_from_slice(payload);
        DataFrame {
            length: payload.len() as u8,
            line: DataLine::Mosi,
            start_sample: 20,
            end_sample: 30,
            storage: PayloadStorage::Inline(bytes),
            unexpected: false,
        }
    }

    #[test]
    fn test_frames_visible_after_commit() {
        let mut store = ResultStore::new();
        store.append_frame(Frame::Command(command(0xA0, true)));
        store.append_frame(Frame::Data(data(&[1, 2])));
        assert!(store.frames().is_empty());

        store.commit();
        assert_eq!(store.frames().len(), 2);
        assert_eq!(store.committed_transactions(), 1);

        // Empty commit changes nothing
        store.commit();
        assert_eq!(store.committed_transactions(), 1);
    }

    #[test]
    fn test_transaction_at_resolves_both_frames() {
        let mut store = ResultStore::new();
        store.append_frame(Frame::Command(command(0xFF, false)));
        store.commit();
        store.append_frame(Frame::Command(command(0xA0, true)));
        store.append_frame(Frame::Data(data(&[7, 8, 9])));
        store.commit();

        let from_command = store.transaction_at(1).unwrap();
        let from_data = store.transaction_at(2).unwrap();
        assert_eq!(from_command, from_data);
        assert_eq!(from_command.decoded.opcode, Opcode::WTxPayload);
        assert_eq!(from_command.decoded.payload(), &[7, 8, 9]);

        let nop = store.transaction_at(0).unwrap();
        assert_eq!(nop.decoded.opcode, Opcode::Nop);
        assert!(nop.data.is_none());
        assert!(store.transaction_at(3).is_none());
    }

    #[test]
    fn test_transactions_iterator() {
        let mut store = ResultStore::new();
        for byte in [0xFF, 0xE1, 0xE3] {
            store.append_frame(Frame::Command(command(byte, false)));
            store.commit();
        }
        let opcodes: Vec<Opcode> = store.transactions().map(|t| t.decoded.opcode).collect();
        assert_eq!(opcodes, vec![Opcode::Nop, Opcode::FlushTx, Opcode::ReuseTxPl]);
    }

    #[test]
    fn test_shared_store_sink() {
        let shared = Arc::new(Mutex::new(ResultStore::new()));
        let mut sink = Arc::clone(&shared);
        sink.append_frame(Frame::Command(command(0xFF, false)));
        sink.commit();
        sink.report_progress(99);
        assert_eq!(sink.append_extended(&[1, 2, 3]), 0);

        let store = shared.lock().unwrap();
        assert_eq!(store.frames().len(), 1);
        assert_eq!(store.progress(), 99);
        assert_eq!(store.extended().len(), 3);
    }

    #[test]
    fn test_publishing_sink_sends_each_commit() {
        let (tx, mut rx) = channel::<TransactionRecord>(None);
        let mut sink = PublishingSink::new(tx);

        sink.append_frame(Frame::Command(command(0xA0, true)));
        sink.append_frame(Frame::Data(data(&[5])));
        sink.commit();
        sink.append_frame(Frame::Command(command(0xFF, false)));
        sink.commit();
        assert_eq!(sink.store().committed_transactions(), 2);
        drop(sink);

        let first = rx.recv().unwrap();
        assert_eq!(first.decoded.payload(), &[5]);
        let second = rx.recv().unwrap();
        assert_eq!(second.decoded.opcode, Opcode::Nop);
        assert!(matches!(rx.recv(), Err(WorkError::Shutdown)));
    }

    #[test]
    fn test_publishing_sink_closes_when_receiver_gone() {
        let (tx, rx) = channel::<TransactionRecord>(None);
        let mut sink = PublishingSink::new(tx);
        drop(rx);

        sink.append_frame(Frame::Command(command(0xFF, false)));
        sink.commit();
        assert!(sink.is_closed());
    }
}
