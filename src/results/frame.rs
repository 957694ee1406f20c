//! Decoded frames, rendering markers and the overflow payload store

use std::fmt;

/// Longest payload an nRF24L01 command can carry
pub const MAX_PAYLOAD_BYTES: usize = 32;

/// Payloads up to this length are stored inside the frame itself
pub const INLINE_PAYLOAD_BYTES: usize = 16;

/// Data line a payload was taken from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataLine {
    /// Host to device
    Mosi,
    /// Device to host
    Miso,
}

impl fmt::Display for DataLine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DataLine::Mosi => write!(f, "MOSI"),
            DataLine::Miso => write!(f, "MISO"),
        }
    }
}

/// Command word of one transaction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandFrame {
    /// Opcode byte shifted in on MOSI
    pub command: u8,
    /// STATUS register shifted out on MISO during the command byte
    pub status: u8,
    pub start_sample: u64,
    pub end_sample: u64,
    /// A `DataFrame` follows this frame in the store
    pub has_data_frame: bool,
}

/// Where the payload bytes of a `DataFrame` live
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayloadStorage {
    /// Up to 16 bytes kept in the frame, in transaction order
    Inline([u8; INLINE_PAYLOAD_BYTES]),
    /// Longer payloads start at `offset` in the session's [`ExtendedDataStore`]
    Extended { offset: usize },
}

/// Payload bytes following the command word
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataFrame {
    /// Number of payload bytes (0..=32)
    pub length: u8,
    /// Line the payload was taken from
    pub line: DataLine,
    pub start_sample: u64,
    pub end_sample: u64,
    pub storage: PayloadStorage,
    /// The opcode takes no data but the transaction carried some
    pub unexpected: bool,
}

impl DataFrame {
    pub fn is_extended(&self) -> bool {
        matches!(self.storage, PayloadStorage::Extended { .. })
    }

    /// The exact payload bytes, or `None` if the extended range is missing
    /// from `store`
    pub fn payload<'a>(&'a self, store: &'a ExtendedDataStore) -> Option<&'a [u8]> {
        let length = usize::from(self.length);
        match &self.storage {
            PayloadStorage::Inline(bytes) => bytes.get(..length),
            PayloadStorage::Extended { offset } => store.get(*offset, length),
        }
    }
}

/// One entry in the frame store
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Frame {
    Command(CommandFrame),
    Data(DataFrame),
}

impl Frame {
    pub fn start_sample(&self) -> u64 {
        match self {
            Frame::Command(cmd) => cmd.start_sample,
            Frame::Data(data) => data.start_sample,
        }
    }

    pub fn end_sample(&self) -> u64 {
        match self {
            Frame::Command(cmd) => cmd.end_sample,
            Frame::Data(data) => data.end_sample,
        }
    }

    pub fn as_command(&self) -> Option<&CommandFrame> {
        match self {
            Frame::Command(cmd) => Some(cmd),
            Frame::Data(_) => None,
        }
    }

    pub fn as_data(&self) -> Option<&DataFrame> {
        match self {
            Frame::Data(data) => Some(data),
            Frame::Command(_) => None,
        }
    }
}

/// Glyph drawn on a channel at a sample
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    /// Clock sampled on its rising edge
    Rising,
    /// Clock sampled on its falling edge
    Falling,
    One,
    Zero,
    /// CSN asserted
    Start,
    /// CSN released
    Stop,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Marker {
    pub sample: u64,
    pub kind: MarkerKind,
    /// Logic analyzer probe the marker belongs to
    pub channel: usize,
}

impl Marker {
    pub fn new(sample: u64, kind: MarkerKind, channel: usize) -> Self {
        Self {
            sample,
            kind,
            channel,
        }
    }
}

/// Append-only byte buffer holding payloads too long to store inline
///
/// Offsets handed out by [`append`](Self::append) stay valid for the lifetime
/// of the store.
#[derive(Clone, Debug, Default)]
pub struct ExtendedDataStore {
    bytes: Vec<u8>,
}

impl ExtendedDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `payload` and return the offset it starts at
    pub fn append(&mut self, payload: &[u8]) -> usize {
        let offset = self.bytes.len();
        self.bytes.extend_from_slice(payload);
        offset
    }

    pub fn get(&self, offset: usize, length: usize) -> Option<&[u8]> {
        let end = offset.checked_add(length)?;
        self.bytes.get(offset..end)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extended_store_offsets_are_monotonic() {
        let mut store = ExtendedDataStore::new();
        assert!(store.is_empty());
        assert_eq!(store.append(&[1, 2, 3]), 0);
        assert_eq!(store.append(&[4, 5]), 3);
        assert_eq!(store.append(&[]), 5);
        assert_eq!(store.len(), 5);

        assert_eq!(store.get(3, 2), Some(&[4u8, 5][..]));
        assert_eq!(store.get(4, 2), None);
        assert_eq!(store.get(usize::MAX, 2), None);
    }

    #[test]
    fn test_inline_payload_is_exact_length() {
        let mut bytes = [0u8; INLINE_PAYLOAD_BYTES];
        bytes[..3].copy_from_slice(&[0xAA, 0xBB, 0xCC]);
        let frame = DataFrame {
            length: 3,
            line: DataLine::Mosi,
            start_sample: 0,
            end_sample: 10,
            storage: PayloadStorage::Inline(bytes),
            unexpected: false,
        };

        let store = ExtendedDataStore::new();
        assert_eq!(frame.payload(&store), Some(&[0xAA, 0xBB, 0xCC][..]));
        assert!(!frame.is_extended());
    }

    #[test]
    fn test_extended_payload_missing_from_store() {
        let frame = DataFrame {
            length: 20,
            line: DataLine::Miso,
            start_sample: 0,
            end_sample: 10,
            storage: PayloadStorage::Extended { offset: 0 },
            unexpected: false,
        };
        assert!(frame.is_extended());
        assert_eq!(frame.payload(&ExtendedDataStore::new()), None);
    }

    #[test]
    fn test_frame_accessors() {
        let cmd = Frame::Command(CommandFrame {
            command: 0xFF,
            status: 0x0E,
            start_sample: 5,
            end_sample: 20,
            has_data_frame: false,
        });
        assert_eq!(cmd.start_sample(), 5);
        assert_eq!(cmd.end_sample(), 20);
        assert!(cmd.as_command().is_some());
        assert!(cmd.as_data().is_none());
    }
}
