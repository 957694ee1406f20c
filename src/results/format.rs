//! Text rendering of decoded transactions
//!
//! Every renderer returns a [`Texts`] list ordered from the most to the least
//! detailed variant, so a display can pick the first one that fits.

use super::frame::DataLine;
use crate::protocol::{DecodedCommand, Opcode, RegisterRef, register_text, status_bits};
use std::fmt;
use std::str::FromStr;

/// Radix used for numbers in rendered text
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DisplayBase {
    #[default]
    Hexadecimal,
    Decimal,
    Binary,
    Ascii,
}

impl FromStr for DisplayBase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hex" | "hexadecimal" => Ok(DisplayBase::Hexadecimal),
            "dec" | "decimal" => Ok(DisplayBase::Decimal),
            "bin" | "binary" => Ok(DisplayBase::Binary),
            "ascii" => Ok(DisplayBase::Ascii),
            other => Err(format!("unknown display base '{}'", other)),
        }
    }
}

impl fmt::Display for DisplayBase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            DisplayBase::Hexadecimal => "hex",
            DisplayBase::Decimal => "dec",
            DisplayBase::Binary => "bin",
            DisplayBase::Ascii => "ascii",
        };
        f.write_str(name)
    }
}

/// Alternative renderings of one bubble, longest first
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Texts {
    pub texts: Vec<String>,
    /// Rendered as an error (undefined opcode, data where none belongs)
    pub is_error: bool,
}

impl Texts {
    fn new(texts: Vec<String>) -> Self {
        Self {
            texts,
            is_error: false,
        }
    }

    fn error(texts: Vec<String>) -> Self {
        Self {
            texts,
            is_error: true,
        }
    }

    pub fn first(&self) -> Option<&str> {
        self.texts.first().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }
}

/// A byte in the given radix
pub fn number_text(value: u8, base: DisplayBase) -> String {
    match base {
        DisplayBase::Hexadecimal => format!("0x{:02X}", value),
        DisplayBase::Decimal => value.to_string(),
        DisplayBase::Binary => format!("0b{:08b}", value),
        DisplayBase::Ascii if value.is_ascii_graphic() || value == b' ' => {
            char::from(value).to_string()
        }
        DisplayBase::Ascii => format!("0x{:02X}", value),
    }
}

/// Bytes joined into one string. Hex and binary share a single prefix.
pub fn bytes_text(bytes: &[u8], base: DisplayBase) -> String {
    let mut text = String::new();
    for (i, byte) in bytes.iter().enumerate() {
        let number = number_text(*byte, base);
        match base {
            _ if i == 0 => text.push_str(&number),
            DisplayBase::Hexadecimal | DisplayBase::Binary => text.push_str(&number[2..]),
            DisplayBase::Decimal | DisplayBase::Ascii => {
                text.push(' ');
                text.push_str(&number);
            }
        }
    }
    text
}

/// Texts for the command word on MOSI
pub fn command_texts(cmd: &DecodedCommand, base: DisplayBase) -> Texts {
    let byte = number_text(cmd.command_byte, base);
    let mut name = cmd.opcode.name().to_string();
    let mut texts = Vec::new();

    if let Some(register) = cmd.register {
        let register_name = register.name();
        let short_name = &name[..5];
        texts.push(format!("({}) {} {}", byte, name, register_name));
        texts.push(short_name.to_string());
        texts.push(format!("{} {}", short_name, register_name));
    }

    if let Opcode::WAckPayload { pipe } = cmd.opcode {
        name = format!("{} {}", name, number_text(pipe, base));
    }

    texts.push(format!("({}) {}", byte, name));
    texts.push(name);
    texts.push(byte);

    let undefined = cmd.opcode == Opcode::Undefined
        || matches!(cmd.register, Some(RegisterRef::Undefined(_)));
    if undefined {
        Texts::error(texts)
    } else {
        Texts::new(texts)
    }
}

/// Texts for the STATUS byte clocked out on MISO during the command word
pub fn status_texts(cmd: &DecodedCommand, base: DisplayBase) -> Texts {
    let byte = number_text(cmd.status, base);
    let bits = status_bits(cmd.status);
    Texts::new(vec![
        format!("({}) {}", byte, bits),
        bits.clone(),
        format!("STATUS = ({}) {}", byte, bits),
        byte,
    ])
}

/// Texts for the command frame as seen on `line`
pub fn command_frame_texts(cmd: &DecodedCommand, line: DataLine, base: DisplayBase) -> Texts {
    match line {
        DataLine::Mosi => command_texts(cmd, base),
        DataLine::Miso => status_texts(cmd, base),
    }
}

/// Texts for the data frame as seen on `line`
///
/// Only the line carrying the meaningful bytes gets text: MISO for reads,
/// MOSI for everything else.
pub fn data_texts(cmd: &DecodedCommand, line: DataLine, base: DisplayBase) -> Texts {
    if !cmd.has_data() {
        return Texts::error(vec![
            String::new(),
            "err".to_string(),
            "MCU error".to_string(),
            "MCU error. Command has no data".to_string(),
        ]);
    }

    let relevant = if cmd.is_read() {
        DataLine::Miso
    } else {
        DataLine::Mosi
    };
    if line != relevant {
        return Texts::default();
    }

    if cmd.has_data_payload() || cmd.has_address() {
        let data = bytes_text(cmd.payload(), base);
        let length = format!("({})", cmd.data_length());
        return Texts::new(vec![format!("{} {}", data, length), data, length]);
    }

    match cmd.opcode {
        Opcode::Activate | Opcode::RRxPlWid => {
            Texts::new(vec![number_text(cmd.first_byte(), base)])
        }
        _ => match cmd.register {
            Some(register) => {
                let byte = number_text(cmd.first_byte(), base);
                let value = register_text(register, cmd.first_byte());
                Texts::new(vec![format!("({}) {}", byte, value), value, byte])
            }
            None => Texts::default(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::decode;
    use crate::results::{
        CommandFrame, DataFrame, ExtendedDataStore, INLINE_PAYLOAD_BYTES, PayloadStorage,
    };

    fn decoded(command: u8, status: u8, payload: &[u8], line: DataLine) -> DecodedCommand {
        let mut bytes = [0u8; INLINE_PAYLOAD_BYTES];
        bytes[..payload.len()].copy_from_slice(payload);
        let cmd = CommandFrame {
            command,
            status,
            start_sample: 0,
            end_sample: 8,
            has_data_frame: !payload.is_empty(),
        };
        let data = DataFrame {
            length: payload.len() as u8,
            line,
            start_sample: 8,
            end_sample: 16,
            storage: PayloadStorage::Inline(bytes),
            unexpected: false,
        };
        decode(&cmd, Some(&data), &ExtendedDataStore::new())
    }

    #[test]
    fn test_number_text() {
        assert_eq!(number_text(0x0F, DisplayBase::Hexadecimal), "0x0F");
        assert_eq!(number_text(0x0F, DisplayBase::Binary), "0b00001111");
        assert_eq!(number_text(0x0F, DisplayBase::Decimal), "15");
        assert_eq!(number_text(b'A', DisplayBase::Ascii), "A");
        assert_eq!(number_text(0x07, DisplayBase::Ascii), "0x07");
    }

    #[test]
    fn test_bytes_text() {
        let bytes = [0xE7, 0x01];
        assert_eq!(bytes_text(&bytes, DisplayBase::Hexadecimal), "0xE701");
        assert_eq!(
            bytes_text(&bytes, DisplayBase::Binary),
            "0b1110011100000001"
        );
        assert_eq!(bytes_text(&bytes, DisplayBase::Decimal), "231 1");
        assert_eq!(bytes_text(&[], DisplayBase::Decimal), "");
    }

    #[test]
    fn test_register_write_texts() {
        let cmd = decoded(0x20, 0x0E, &[0x0E], DataLine::Mosi);

        let texts = command_texts(&cmd, DisplayBase::Hexadecimal);
        assert_eq!(
            texts.texts,
            vec![
                "(0x20) W_REGISTER CONFIG",
                "W_REG",
                "W_REG CONFIG",
                "(0x20) W_REGISTER",
                "W_REGISTER",
                "0x20",
            ]
        );
        assert!(!texts.is_error);

        let data = data_texts(&cmd, DataLine::Mosi, DisplayBase::Hexadecimal);
        assert_eq!(data.first(), Some("(0x0E) EN_CRC, CRCO, PWR_UP"));
        assert!(data_texts(&cmd, DataLine::Miso, DisplayBase::Hexadecimal).is_empty());
    }

    #[test]
    fn test_status_texts() {
        let cmd = decoded(0xFF, 0x0E, &[], DataLine::Mosi);
        let texts = status_texts(&cmd, DisplayBase::Hexadecimal);
        assert_eq!(
            texts.texts,
            vec![
                "(0x0E) RX_FIFO empty",
                "RX_FIFO empty",
                "STATUS = (0x0E) RX_FIFO empty",
                "0x0E",
            ]
        );
        assert_eq!(
            command_frame_texts(&cmd, DataLine::Miso, DisplayBase::Hexadecimal),
            texts
        );
    }

    #[test]
    fn test_ack_payload_pipe_in_name() {
        let cmd = decoded(0xAD, 0x0E, &[1, 2], DataLine::Mosi);
        let texts = command_texts(&cmd, DisplayBase::Decimal);
        assert_eq!(texts.first(), Some("(173) W_ACK_PAYLOAD 5"));

        let data = data_texts(&cmd, DataLine::Mosi, DisplayBase::Decimal);
        assert_eq!(data.texts, vec!["1 2 (2)", "1 2", "(2)"]);
    }

    #[test]
    fn test_read_payload_on_miso() {
        let cmd = decoded(0x61, 0x40, &[0, 1, 2], DataLine::Miso);
        assert!(data_texts(&cmd, DataLine::Mosi, DisplayBase::Hexadecimal).is_empty());
        assert_eq!(
            data_texts(&cmd, DataLine::Miso, DisplayBase::Hexadecimal).first(),
            Some("0x000102 (3)")
        );
    }

    #[test]
    fn test_no_data_opcode_renders_error() {
        let cmd = decoded(0xE2, 0x0E, &[1, 2, 3], DataLine::Mosi);
        let texts = data_texts(&cmd, DataLine::Mosi, DisplayBase::Hexadecimal);
        assert!(texts.is_error);
        assert_eq!(texts.texts[3], "MCU error. Command has no data");
        assert_eq!(texts.first(), Some(""));
    }

    #[test]
    fn test_undefined_opcode_is_error() {
        let cmd = decoded(0xF0, 0x0E, &[], DataLine::Mosi);
        let texts = command_texts(&cmd, DisplayBase::Hexadecimal);
        assert!(texts.is_error);
        assert_eq!(texts.first(), Some("(0xF0) <undef>"));

        let cmd = decoded(0x1F, 0x0E, &[], DataLine::Mosi);
        let texts = command_texts(&cmd, DisplayBase::Hexadecimal);
        assert!(texts.is_error);
        assert_eq!(texts.first(), Some("(0x1F) R_REGISTER <undef>"));
    }

    #[test]
    fn test_single_value_commands() {
        let cmd = decoded(0x50, 0x0E, &[0x73], DataLine::Mosi);
        assert_eq!(
            data_texts(&cmd, DataLine::Mosi, DisplayBase::Hexadecimal).texts,
            vec!["0x73"]
        );

        let cmd = decoded(0x60, 0x0E, &[0x08], DataLine::Miso);
        assert_eq!(
            data_texts(&cmd, DataLine::Miso, DisplayBase::Decimal).texts,
            vec!["8"]
        );
    }

    #[test]
    fn test_display_base_from_str() {
        assert_eq!("hex".parse::<DisplayBase>(), Ok(DisplayBase::Hexadecimal));
        assert_eq!("Binary".parse::<DisplayBase>(), Ok(DisplayBase::Binary));
        assert!("octal".parse::<DisplayBase>().is_err());
    }
}
