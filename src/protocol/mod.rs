//! nRF24L01 command set
//!
//! Classification of command bytes, the register map and the stateless
//! [`decode`] that turns stored frames into a [`DecodedCommand`].

pub mod command;
pub mod registers;

pub use command::{DecodedCommand, Opcode, decode};
pub use registers::{REGISTER_MASK, Register, RegisterRef, register_text, status_bits};
