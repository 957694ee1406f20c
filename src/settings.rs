//! Channel assignment for the analyzer

use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Please select inputs for all channels.")]
    MissingChannel,

    #[error("Please select different channels for each input.")]
    DuplicateChannel,

    #[error("Malformed settings: {0}")]
    Malformed(String),
}

/// Capture channel of each SPI line, once validated
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChannelMap {
    pub mosi: usize,
    pub miso: usize,
    pub sck: usize,
    pub csn: usize,
}

impl ChannelMap {
    /// Channel ids in the order CSN, SCK, MOSI, MISO
    pub fn probes(&self) -> [usize; 4] {
        [self.csn, self.sck, self.mosi, self.miso]
    }
}

impl Default for ChannelMap {
    fn default() -> Self {
        Self {
            mosi: 0,
            miso: 1,
            sck: 2,
            csn: 3,
        }
    }
}

impl fmt::Display for ChannelMap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "MOSI={} MISO={} SCK={} CSN={}",
            self.mosi, self.miso, self.sck, self.csn
        )
    }
}

/// User-facing channel selection; any line may still be unassigned
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AnalyzerSettings {
    pub mosi: Option<usize>,
    pub miso: Option<usize>,
    pub sck: Option<usize>,
    pub csn: Option<usize>,
}

impl AnalyzerSettings {
    pub fn new(mosi: usize, miso: usize, sck: usize, csn: usize) -> Self {
        Self {
            mosi: Some(mosi),
            miso: Some(miso),
            sck: Some(sck),
            csn: Some(csn),
        }
    }

    /// Check that all four lines are assigned to distinct channels
    pub fn validate(&self) -> Result<ChannelMap, SettingsError> {
        let (Some(mosi), Some(miso), Some(sck), Some(csn)) =
            (self.mosi, self.miso, self.sck, self.csn)
        else {
            return Err(SettingsError::MissingChannel);
        };

        let channels = [mosi, miso, sck, csn];
        for (i, a) in channels.iter().enumerate() {
            if channels[i + 1..].contains(a) {
                return Err(SettingsError::DuplicateChannel);
            }
        }

        Ok(ChannelMap {
            mosi,
            miso,
            sck,
            csn,
        })
    }

    /// Serialize as `MOSI MISO SCK CSN`, `-` marking an unassigned line
    pub fn save(&self) -> String {
        [self.mosi, self.miso, self.sck, self.csn]
            .iter()
            .map(|channel| match channel {
                Some(c) => c.to_string(),
                None => "-".to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Read back what `save` wrote
    pub fn load(text: &str) -> Result<Self, SettingsError> {
        let fields: Vec<&str> = text.split_whitespace().collect();
        if fields.len() != 4 {
            return Err(SettingsError::Malformed(format!(
                "expected 4 channels, found {}",
                fields.len()
            )));
        }

        let mut channels = [None; 4];
        for (slot, field) in channels.iter_mut().zip(&fields) {
            *slot = match *field {
                "-" => None,
                value => Some(value.parse::<usize>().map_err(|e| {
                    SettingsError::Malformed(format!("channel '{}': {}", value, e))
                })?),
            };
        }

        let [mosi, miso, sck, csn] = channels;
        Ok(Self {
            mosi,
            miso,
            sck,
            csn,
        })
    }
}

impl From<ChannelMap> for AnalyzerSettings {
    fn from(map: ChannelMap) -> Self {
        Self::new(map.mosi, map.miso, map.sck, map.csn)
    }
}
