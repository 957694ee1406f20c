//! Bit and byte sampler
//!
//! Walks the clock cursor edge by edge and reads both data lines at every
//! sampling edge. Bits are normally taken on the rising edge. When the clock
//! is already high as the first byte of a transaction starts, its leading
//! edge was missed, so the first bit is taken on the following falling edge
//! instead and sampling returns to rising edges from the second bit on.
//!
//! Reaching the CSN rising edge while a byte is incomplete ends the
//! transaction: the partial byte is dropped and all four cursors are moved to
//! the CSN edge.

use super::types::{BitMarker, ClockEdge, SampledByte};
use crate::trace::{SpiCursors, TraceChannel};
use tracing::trace;

/// Move the clock to its next edge if it comes before `select_high`
///
/// On failure every cursor lands on `select_high`.
fn advance_sck<C: TraceChannel>(cursors: &mut SpiCursors<C>, select_high: u64) -> Option<u64> {
    match cursors.sck.sample_of_next_edge() {
        Some(next) if next < select_high => cursors.sck.advance_to_next_edge(),
        _ => {
            cursors.sync_to_sample(select_high);
            None
        }
    }
}

/// Sample one byte before the CSN rising edge at `select_high`
///
/// Returns `None` when CSN rises before all eight bits were clocked.
pub fn sample_byte<C: TraceChannel>(
    cursors: &mut SpiCursors<C>,
    select_high: u64,
    is_first_byte: bool,
) -> Option<SampledByte> {
    let mut falling_first = false;
    if cursors.sck.bit_state().is_low() {
        advance_sck(cursors, select_high)?;
    } else if is_first_byte {
        falling_first = true;
    }

    let mut mosi = 0u8;
    let mut miso = 0u8;
    let mut bits = [BitMarker::default(); 8];

    for bit in 0..8 {
        if falling_first {
            advance_sck(cursors, select_high)?;
        }

        cursors.sync_to_sck();

        let marker = BitMarker {
            sample: cursors.sck.sample_number(),
            clock: if falling_first {
                ClockEdge::Falling
            } else {
                ClockEdge::Rising
            },
            mosi: cursors.mosi.bit_state(),
            miso: cursors.miso.bit_state(),
        };
        mosi = (mosi << 1) | u8::from(marker.mosi.is_high());
        miso = (miso << 1) | u8::from(marker.miso.is_high());
        bits[bit] = marker;

        // Trailing edge of this bit
        if !falling_first {
            advance_sck(cursors, select_high)?;
        }

        if bit == 7 {
            break;
        }

        // Leading edge of the next bit
        advance_sck(cursors, select_high)?;
        falling_first = false;
    }

    let byte = SampledByte {
        mosi,
        miso,
        start_sample: bits[0].sample,
        end_sample: cursors.sck.sample_number(),
        bits,
    };
    trace!(
        "Byte MOSI=0x{:02X} MISO=0x{:02X} [{}..{}]",
        byte.mosi, byte.miso, byte.start_sample, byte.end_sample
    );
    Some(byte)
}
