//! Decoder output: frames, markers, sinks, text rendering and export

pub mod export;
pub mod format;
pub mod frame;
pub mod sink;

pub use export::{EXPORT_HEADER, ExportWriter, export_row, export_store};
pub use format::{DisplayBase, Texts, command_frame_texts, data_texts, number_text};
pub use frame::{
    CommandFrame, DataFrame, DataLine, ExtendedDataStore, Frame, INLINE_PAYLOAD_BYTES,
    MAX_PAYLOAD_BYTES, Marker, MarkerKind, PayloadStorage,
};
pub use sink::{FrameSink, PublishingSink, ResultStore, TransactionRecord};
