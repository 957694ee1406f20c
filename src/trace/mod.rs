//! Per-channel sample cursors over a captured trace
//!
//! The decoder walks four channels (CSN, SCK, MOSI, MISO) with independent
//! cursors. It depends only on the [`TraceChannel`] contract; [`EdgeCursor`]
//! provides it over a streamed [`Edge`](crate::runtime::Edge) channel.

mod cursor;

pub use crate::runtime::BitState;
pub use cursor::EdgeCursor;

/// Cursor over one digital channel of a capture
///
/// The cursor sits on a sample index and knows the level there. Queries about
/// upcoming edges may block while the capture is still live; `None` means the
/// capture ended without another edge on this channel.
pub trait TraceChannel {
    /// Sample index the cursor currently sits on
    fn sample_number(&self) -> u64;

    /// Level of the channel at the current sample
    fn bit_state(&self) -> BitState;

    /// Move to the next transition and return its sample index
    fn advance_to_next_edge(&mut self) -> Option<u64>;

    /// Move forward to `sample`. Positions behind the cursor are ignored.
    fn advance_to_abs_position(&mut self, sample: u64);

    /// Sample index of the next transition without moving
    fn sample_of_next_edge(&mut self) -> Option<u64>;

    /// Whether another transition exists after the current sample
    fn has_more_edges(&mut self) -> bool {
        self.sample_of_next_edge().is_some()
    }
}

/// The four cursors of one SPI bus, advanced in lock-step by one thread
pub struct SpiCursors<C> {
    pub csn: C,
    pub sck: C,
    pub mosi: C,
    pub miso: C,
}

impl<C: TraceChannel> SpiCursors<C> {
    pub fn new(csn: C, sck: C, mosi: C, miso: C) -> Self {
        Self {
            csn,
            sck,
            mosi,
            miso,
        }
    }

    /// Move all four cursors to `sample`
    pub fn sync_to_sample(&mut self, sample: u64) {
        self.csn.advance_to_abs_position(sample);
        self.miso.advance_to_abs_position(sample);
        self.mosi.advance_to_abs_position(sample);
        self.sck.advance_to_abs_position(sample);
    }

    /// Bring the select and data cursors up to the clock cursor
    pub fn sync_to_sck(&mut self) {
        let sample = self.sck.sample_number();
        self.csn.advance_to_abs_position(sample);
        self.miso.advance_to_abs_position(sample);
        self.mosi.advance_to_abs_position(sample);
    }

    /// Bring the clock and data cursors up to the select cursor
    pub fn sync_to_csn(&mut self) {
        let sample = self.csn.sample_number();
        self.sck.advance_to_abs_position(sample);
        self.miso.advance_to_abs_position(sample);
        self.mosi.advance_to_abs_position(sample);
    }
}
