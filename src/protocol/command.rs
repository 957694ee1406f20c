//! Opcode classification and stateless command decoding

use super::registers::RegisterRef;
use crate::results::{CommandFrame, DataFrame, ExtendedDataStore, MAX_PAYLOAD_BYTES};
use std::fmt;
use tracing::warn;

/// nRF24L01 SPI command set
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Opcode {
    RRegister,
    WRegister,
    RRxPayload,
    WTxPayload,
    FlushTx,
    FlushRx,
    Activate,
    ReuseTxPl,
    RRxPlWid,
    /// Acknowledgment payload for RX pipe `pipe` (0..=7)
    WAckPayload { pipe: u8 },
    WTxPayloadNoack,
    Nop,
    Undefined,
}

impl Opcode {
    /// Classify a command byte. Total over all 256 values.
    pub fn classify(byte: u8) -> Self {
        match byte {
            b if b >> 5 == 0 => Opcode::RRegister,
            b if b >> 5 == 1 => Opcode::WRegister,
            0x61 => Opcode::RRxPayload,
            0xA0 => Opcode::WTxPayload,
            0xE1 => Opcode::FlushTx,
            0xE2 => Opcode::FlushRx,
            0xE3 => Opcode::ReuseTxPl,
            0x50 => Opcode::Activate,
            0x60 => Opcode::RRxPlWid,
            b if b >> 3 == 0x15 => Opcode::WAckPayload { pipe: b & 7 },
            0xB0 => Opcode::WTxPayloadNoack,
            0xFF => Opcode::Nop,
            _ => Opcode::Undefined,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Opcode::RRegister => "R_REGISTER",
            Opcode::WRegister => "W_REGISTER",
            Opcode::RRxPayload => "R_RX_PAYLOAD",
            Opcode::WTxPayload => "W_TX_PAYLOAD",
            Opcode::FlushTx => "FLUSH_TX",
            Opcode::FlushRx => "FLUSH_RX",
            Opcode::Activate => "ACTIVATE",
            Opcode::ReuseTxPl => "REUSE_TX_PL",
            Opcode::RRxPlWid => "R_RX_PL_WID",
            Opcode::WAckPayload { .. } => "W_ACK_PAYLOAD",
            Opcode::WTxPayloadNoack => "W_TX_PAYLOAD_NOACK",
            Opcode::Nop => "NOP",
            Opcode::Undefined => "<undef>",
        }
    }

    pub fn is_register(self) -> bool {
        matches!(self, Opcode::RRegister | Opcode::WRegister)
    }

    /// The device answers on MISO
    pub fn is_read(self) -> bool {
        matches!(
            self,
            Opcode::RRegister | Opcode::RRxPayload | Opcode::RRxPlWid
        )
    }

    /// Carries a radio payload
    pub fn has_data_payload(self) -> bool {
        matches!(
            self,
            Opcode::WTxPayload
                | Opcode::RRxPayload
                | Opcode::WAckPayload { .. }
                | Opcode::WTxPayloadNoack
        )
    }

    /// Any bytes may follow the command word
    pub fn has_data(self) -> bool {
        !matches!(
            self,
            Opcode::FlushTx | Opcode::FlushRx | Opcode::ReuseTxPl | Opcode::Nop
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Opcode::WAckPayload { pipe } => write!(f, "{} {}", self.name(), pipe),
            _ => f.write_str(self.name()),
        }
    }
}

/// Semantic view of one transaction
///
/// Built by [`decode`] from the stored frames; holds no reference back to
/// them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodedCommand {
    pub command_byte: u8,
    pub status: u8,
    pub opcode: Opcode,
    /// Set for register-access opcodes only
    pub register: Option<RegisterRef>,
    data: [u8; MAX_PAYLOAD_BYTES],
    data_length: u8,
}

impl DecodedCommand {
    pub fn is_register(&self) -> bool {
        self.opcode.is_register()
    }

    pub fn is_read(&self) -> bool {
        self.opcode.is_read()
    }

    pub fn has_data_payload(&self) -> bool {
        self.opcode.has_data_payload()
    }

    /// Register access to one of the address registers
    pub fn has_address(&self) -> bool {
        matches!(
            self.register,
            Some(RegisterRef::Known(reg)) if reg.holds_address()
        )
    }

    pub fn has_data(&self) -> bool {
        self.opcode.has_data()
    }

    /// The payload bytes, exactly `data_length` long
    pub fn payload(&self) -> &[u8] {
        &self.data[..usize::from(self.data_length)]
    }

    pub fn data_length(&self) -> usize {
        usize::from(self.data_length)
    }

    /// First payload byte, zero when there is none
    pub fn first_byte(&self) -> u8 {
        self.data[0]
    }
}

/// Decode a command frame and its optional data frame
///
/// Payload bytes are copied only for opcodes that take data; the data frame of
/// a no-data opcode is ignored here and flagged at render time instead.
pub fn decode(
    command: &CommandFrame,
    data: Option<&DataFrame>,
    store: &ExtendedDataStore,
) -> DecodedCommand {
    let opcode = Opcode::classify(command.command);
    let register = opcode
        .is_register()
        .then(|| RegisterRef::from_command(command.command));

    let mut decoded = DecodedCommand {
        command_byte: command.command,
        status: command.status,
        opcode,
        register,
        data: [0; MAX_PAYLOAD_BYTES],
        data_length: 0,
    };

    if let Some(frame) = data.filter(|_| opcode.has_data()) {
        match frame.payload(store) {
            Some(bytes) if bytes.len() <= MAX_PAYLOAD_BYTES => {
                decoded.data[..bytes.len()].copy_from_slice(bytes);
                decoded.data_length = frame.length;
            }
            _ => warn!(
                "Payload of {} bytes for 0x{:02X} not available",
                frame.length, command.command
            ),
        }
    }

    decoded
}
