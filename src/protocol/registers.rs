//! nRF24L01 register map and per-register value interpretation

use std::fmt;

/// Low bits of a register-access opcode that select the register
pub const REGISTER_MASK: u8 = 0x1F;

/// Addressable configuration and status registers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Register {
    Config = 0x00,
    EnAa = 0x01,
    EnRxaddr = 0x02,
    SetupAw = 0x03,
    SetupRetr = 0x04,
    RfCh = 0x05,
    RfSetup = 0x06,
    Status = 0x07,
    ObserveTx = 0x08,
    Cd = 0x09,
    RxAddrP0 = 0x0A,
    RxAddrP1 = 0x0B,
    RxAddrP2 = 0x0C,
    RxAddrP3 = 0x0D,
    RxAddrP4 = 0x0E,
    RxAddrP5 = 0x0F,
    TxAddr = 0x10,
    RxPwP0 = 0x11,
    RxPwP1 = 0x12,
    RxPwP2 = 0x13,
    RxPwP3 = 0x14,
    RxPwP4 = 0x15,
    RxPwP5 = 0x16,
    FifoStatus = 0x17,
    Dynpd = 0x1C,
    Feature = 0x1D,
}

/// Flag name and its bit position
pub type BitName = (&'static str, u8);

const CONFIG_BITS: &[BitName] = &[
    ("MASK_RX_DR", 6),
    ("MASK_TX_DS", 5),
    ("MASK_MAX_RT", 4),
    ("EN_CRC", 3),
    ("CRCO", 2),
    ("PWR_UP", 1),
    ("PRIM_RX", 0),
];

const EN_AA_BITS: &[BitName] = &[
    ("ENAA_P5", 5),
    ("ENAA_P4", 4),
    ("ENAA_P3", 3),
    ("ENAA_P2", 2),
    ("ENAA_P1", 1),
    ("ENAA_P0", 0),
];

const EN_RXADDR_BITS: &[BitName] = &[
    ("ERX_P5", 5),
    ("ERX_P4", 4),
    ("ERX_P3", 3),
    ("ERX_P2", 2),
    ("ERX_P1", 1),
    ("ERX_P0", 0),
];

const RF_SETUP_BITS: &[BitName] = &[
    ("CONT_WAVE", 7),
    ("RF_DR_LOW", 5),
    ("PLL_LOCK", 4),
    ("RF_DR_HIGH", 3),
    ("LNA_HCURR", 0),
];

const STATUS_BITS: &[BitName] = &[("RX_DR", 6), ("TX_DS", 5), ("MAX_RT", 4), ("TX_FULL", 0)];

const CD_BITS: &[BitName] = &[("CD", 0)];

const FIFO_STATUS_BITS: &[BitName] = &[
    ("TX_REUSE", 6),
    ("TX_FULL", 5),
    ("TX_EMPTY", 4),
    ("RX_FULL", 1),
    ("RX_EMPTY", 0),
];

// Bit 6 is reported as DPL_P5 as well, matching existing decoder output
const DYNPD_BITS: &[BitName] = &[
    ("DPL_P5", 6),
    ("DPL_P5", 5),
    ("DPL_P4", 4),
    ("DPL_P3", 3),
    ("DPL_P2", 2),
    ("DPL_P1", 1),
    ("DPL_P0", 0),
];

const FEATURE_BITS: &[BitName] = &[("EN_DPL", 2), ("EN_ACK_PAY", 1), ("EN_DYN_ACK", 0)];

impl Register {
    pub const ALL: [Register; 26] = [
        Register::Config,
        Register::EnAa,
        Register::EnRxaddr,
        Register::SetupAw,
        Register::SetupRetr,
        Register::RfCh,
        Register::RfSetup,
        Register::Status,
        Register::ObserveTx,
        Register::Cd,
        Register::RxAddrP0,
        Register::RxAddrP1,
        Register::RxAddrP2,
        Register::RxAddrP3,
        Register::RxAddrP4,
        Register::RxAddrP5,
        Register::TxAddr,
        Register::RxPwP0,
        Register::RxPwP1,
        Register::RxPwP2,
        Register::RxPwP3,
        Register::RxPwP4,
        Register::RxPwP5,
        Register::FifoStatus,
        Register::Dynpd,
        Register::Feature,
    ];

    pub fn from_address(address: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|r| r.address() == address)
    }

    pub fn address(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Register::Config => "CONFIG",
            Register::EnAa => "EN_AA",
            Register::EnRxaddr => "EN_RXADDR",
            Register::SetupAw => "SETUP_AW",
            Register::SetupRetr => "SETUP_RETR",
            Register::RfCh => "RF_CH",
            Register::RfSetup => "RF_SETUP",
            Register::Status => "STATUS",
            Register::ObserveTx => "OBSERVE_TX",
            Register::Cd => "CD",
            Register::RxAddrP0 => "RX_ADDR_P0",
            Register::RxAddrP1 => "RX_ADDR_P1",
            Register::RxAddrP2 => "RX_ADDR_P2",
            Register::RxAddrP3 => "RX_ADDR_P3",
            Register::RxAddrP4 => "RX_ADDR_P4",
            Register::RxAddrP5 => "RX_ADDR_P5",
            Register::TxAddr => "TX_ADDR",
            Register::RxPwP0 => "RX_PW_P0",
            Register::RxPwP1 => "RX_PW_P1",
            Register::RxPwP2 => "RX_PW_P2",
            Register::RxPwP3 => "RX_PW_P3",
            Register::RxPwP4 => "RX_PW_P4",
            Register::RxPwP5 => "RX_PW_P5",
            Register::FifoStatus => "FIFO_STATUS",
            Register::Dynpd => "DYNPD",
            Register::Feature => "FEATURE",
        }
    }

    /// RX pipe addresses and the TX address hold multi-byte addresses
    pub fn holds_address(self) -> bool {
        (Register::RxAddrP0.address()..=Register::TxAddr.address()).contains(&self.address())
    }

    pub fn is_payload_width(self) -> bool {
        (Register::RxPwP0.address()..=Register::RxPwP5.address()).contains(&self.address())
    }

    /// Flag table for registers made of named bits
    pub fn bit_names(self) -> Option<&'static [BitName]> {
        match self {
            Register::Config => Some(CONFIG_BITS),
            Register::EnAa => Some(EN_AA_BITS),
            Register::EnRxaddr => Some(EN_RXADDR_BITS),
            Register::RfSetup => Some(RF_SETUP_BITS),
            Register::Status => Some(STATUS_BITS),
            Register::Cd => Some(CD_BITS),
            Register::FifoStatus => Some(FIFO_STATUS_BITS),
            Register::Dynpd => Some(DYNPD_BITS),
            Register::Feature => Some(FEATURE_BITS),
            _ => None,
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Register selected by a register-access opcode
///
/// Five address bits cover more than the defined register space, so holes
/// (0x18..=0x1B, 0x1E, 0x1F) are kept as `Undefined` with their raw address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegisterRef {
    Known(Register),
    Undefined(u8),
}

impl RegisterRef {
    /// Register addressed by the low five bits of `command`
    pub fn from_command(command: u8) -> Self {
        let address = command & REGISTER_MASK;
        Register::from_address(address)
            .map(RegisterRef::Known)
            .unwrap_or(RegisterRef::Undefined(address))
    }

    pub fn address(self) -> u8 {
        match self {
            RegisterRef::Known(reg) => reg.address(),
            RegisterRef::Undefined(address) => address,
        }
    }

    pub fn register(self) -> Option<Register> {
        match self {
            RegisterRef::Known(reg) => Some(reg),
            RegisterRef::Undefined(_) => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RegisterRef::Known(reg) => reg.name(),
            RegisterRef::Undefined(_) => "<undef>",
        }
    }
}

fn add_part(text: &mut String, part: &str) {
    if !text.is_empty() {
        text.push_str(", ");
    }
    text.push_str(part);
}

/// Comma separated names of the set bits, in table order
pub fn high_bits(value: u8, table: &[BitName]) -> String {
    let mut text = String::new();
    for (name, bit) in table {
        if value & (1 << bit) != 0 {
            add_part(&mut text, name);
        }
    }
    text
}

/// STATUS flags plus the RX pipe number of the payload at the head of the FIFO
pub fn status_bits(status: u8) -> String {
    let mut text = high_bits(status, STATUS_BITS);
    let pipe = (status >> 1) & 7;
    if pipe < 7 {
        add_part(&mut text, &format!("RX_P_NO={}", pipe));
    } else {
        add_part(&mut text, "RX_FIFO empty");
    }
    text
}

/// Human readable interpretation of a register value
pub fn register_text(register: RegisterRef, value: u8) -> String {
    let RegisterRef::Known(reg) = register else {
        return "<register error>".to_string();
    };

    match reg {
        Register::SetupAw => match value {
            1 => "AW=3 bytes".to_string(),
            2 => "AW=4 bytes".to_string(),
            3 => "AW=5 bytes".to_string(),
            _ => "<SETUP_AW ERROR>".to_string(),
        },
        Register::SetupRetr => {
            let delay_us = (u32::from(value >> 4) + 1) * 250;
            let count = value & 0x0F;
            if count == 0 {
                format!("ARD={}us, ARC=Disabled", delay_us)
            } else {
                format!("ARD={}us, ARC={} retransmit", delay_us, count)
            }
        }
        Register::RfCh => format!("channel={}", value),
        Register::RfSetup => {
            let mut text = high_bits(value, RF_SETUP_BITS);
            let power = match (value >> 1) & 3 {
                0 => "-18dBm",
                1 => "-12dBm",
                2 => "-6dBm",
                _ => "0dBm",
            };
            add_part(&mut text, &format!("RF_PWR={}", power));
            text
        }
        Register::Status => status_bits(value),
        Register::ObserveTx => format!("PLOS_CNT={} ARC_CNT={}", value >> 4, value & 0x0F),
        reg if reg.is_payload_width() => format!("{}={}", reg.name(), value & 0x3F),
        reg => match reg.bit_names() {
            Some(table) => high_bits(value, table),
            None => "<register error>".to_string(),
        },
    }
}
