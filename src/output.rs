//! Match log: every verified hit is appended to a JSON-lines file so an
//! interrupted search never loses results.

use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::compile::{MinerOptions, StateInitVariant};
use crate::error::SaltmineError;

#[derive(Serialize, Clone)]
pub struct SpecialRecord {
    pub tick: bool,
    pub tock: bool,
}

#[derive(Serialize, Clone)]
pub struct StateInitRecord {
    /// Code cell serialized as a single-cell BoC, base64url.
    pub code: String,
    #[serde(rename = "fixedPrefixLength")]
    pub fixed_prefix_length: u8,
    pub special: Option<SpecialRecord>,
}

#[derive(Serialize, Clone)]
pub struct ConfigRecord {
    pub owner: String,
    pub start: Option<String>,
    pub end: Option<String>,
    pub masterchain: bool,
    pub non_bounceable: bool,
    pub testnet: bool,
    pub case_sensitive: bool,
    pub only_one: bool,
}

#[derive(Serialize, Clone)]
pub struct MatchRecord {
    pub address: String,
    /// First hash byte after the free-bit rewrite.
    pub hash0: u8,
    pub init: StateInitRecord,
    pub config: ConfigRecord,
    pub timestamp: f64,
}

impl MatchRecord {
    pub fn new(
        address: String,
        hash0: u8,
        boc: &[u8],
        variant: &StateInitVariant,
        options: &MinerOptions,
    ) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        Self {
            address,
            hash0,
            init: StateInitRecord {
                code: encode_base64url(boc),
                fixed_prefix_length: variant.fixed_prefix_length.unwrap_or(0),
                special: variant.special.map(|(tick, tock)| SpecialRecord { tick, tock }),
            },
            config: ConfigRecord {
                owner: options.owner.clone(),
                start: options.start.clone(),
                end: options.end.clone(),
                masterchain: options.masterchain,
                non_bounceable: options.non_bounceable,
                testnet: options.testnet,
                case_sensitive: options.case_sensitive,
                only_one: options.only_one,
            },
            timestamp,
        }
    }
}

/// Base64url without padding, for BoC payloads of any length.
fn encode_base64url(bytes: &[u8]) -> String {
    const ALPHABET: &[u8; 64] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";
    let mut out = String::with_capacity(bytes.len().div_ceil(3) * 4);
    for chunk in bytes.chunks(3) {
        let mut acc = (chunk[0] as u32) << 16;
        if chunk.len() > 1 {
            acc |= (chunk[1] as u32) << 8;
        }
        if chunk.len() > 2 {
            acc |= chunk[2] as u32;
        }
        let digits = chunk.len() + 1;
        for k in 0..digits {
            out.push(ALPHABET[((acc >> (18 - 6 * k)) & 0x3f) as usize] as char);
        }
    }
    out
}

/// Append-only writer for the match log. Each record is flushed as soon
/// as it is written.
pub struct MatchLog {
    file: File,
}

impl MatchLog {
    pub fn open(path: &Path) -> Result<Self, SaltmineError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file })
    }

    pub fn append(&mut self, record: &MatchRecord) -> Result<(), SaltmineError> {
        let line = serde_json::to_string(record)
            .map_err(|e| SaltmineError::Internal(format!("serializing match record: {e}")))?;
        self.file.write_all(line.as_bytes())?;
        self.file.write_all(b"\n")?;
        self.file.flush()?;
        Ok(())
    }
}
