//! Constraint compiler.
//!
//! Translates the user's pattern into the tables the search kernel runs
//! on: per-byte mask/value pairs over the 36-byte address representation,
//! case-alternative records for case-insensitive letters, the admissible
//! first-hash-byte values for the free-bit rewrite, and the StateInit
//! variant set. All base64 and CRC reasoning happens here, off the hot
//! path; the kernel only enforces what this module emits.

use crate::address::{self, AddressTag, ADDRESS_CHARS, REPR_BITS, REPR_BYTES};
use crate::cell;
use crate::crc16;
use crate::error::SaltmineError;
use crate::sha256;

/// First bit of the account hash inside the representation.
pub const HASH_BIT_START: usize = 16;
/// One past the last hash bit; bits beyond this are the CRC.
pub const HASH_BIT_END: usize = HASH_BIT_START + 256;

/// User-facing search specification.
#[derive(Debug, Clone, Default)]
pub struct MinerOptions {
    /// Base64url owner address baked into the vanity contract.
    pub owner: String,
    /// Desired address prefix.
    pub start: Option<String>,
    /// Desired address suffix.
    pub end: Option<String>,
    pub case_sensitive: bool,
    pub masterchain: bool,
    pub non_bounceable: bool,
    pub testnet: bool,
    /// Stop after the first verified hit.
    pub only_one: bool,
    /// Pin the contract fixedPrefixLength instead of the default ladder.
    pub fixed_prefix_length: Option<u8>,
}

/// One case-insensitive character constraint. The 6-bit field starting at
/// `bit` must equal one of the two alternatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaseCheck {
    pub bit: u16,
    pub alt0: u8,
    pub alt1: u8,
}

/// One admissible StateInit shape.
#[derive(Debug, Clone)]
pub struct StateInitVariant {
    pub fixed_prefix_length: Option<u8>,
    pub special: Option<(bool, bool)>,
    /// Prefix bytes preceding the code hash in the hashed message.
    pub prefix: Vec<u8>,
    /// The same prefix packed into big-endian message words.
    pub prefix_w: [u32; 16],
}

/// Everything the kernel needs, fixed for one search session.
#[derive(Debug, Clone)]
pub struct KernelConfig {
    pub flags_hi: u8,
    pub flags_lo: u8,
    /// First-byte bits the chain lets the miner choose freely.
    pub free_window_mask: u8,
    /// Free-window bits forced by the pattern, and their values.
    pub free_hash_mask: u8,
    pub free_hash_val: u8,
    pub prefix_mask: [u8; REPR_BYTES],
    pub prefix_val: [u8; REPR_BYTES],
    /// Masked indices in 3..=33, checkable before any CRC work.
    pub prefix_pos_nocrc: Vec<u8>,
    /// Masked CRC indices (34, 35).
    pub prefix_pos_crc: Vec<u8>,
    /// Admissible free-window settings for the first hash byte.
    pub hash0_values: Vec<u8>,
    /// Case checks whose window lies entirely in bytes 3..=33.
    pub case_const: Vec<CaseCheck>,
    /// Case checks touching the first hash byte or the CRC.
    pub case_var: Vec<CaseCheck>,
    pub need_crc: bool,
    /// Whether stage 3 sweeps `hash0_values` instead of emitting the
    /// single canonical rewrite.
    pub sweep_hash0: bool,
    pub variants: Vec<StateInitVariant>,
    /// Owner-dependent first 64 bytes of the code cell and the SHA-256
    /// state after absorbing them.
    pub code_prefix: [u8; 64],
    pub code_state_base: [u32; 8],
    pub crc16_table: [u16; 256],
    pub crc16_delta_pos2: [u16; 256],
    /// Character position where the start pattern was placed.
    pub start_digit_base: usize,
    pub owner_raw: Vec<u8>,
}

impl KernelConfig {
    /// Canonical first-byte rewrite: pattern-forced free bits substituted,
    /// every other bit kept from the hash.
    pub fn rewrite_hash0(&self, h0: u8) -> u8 {
        (h0 & !self.free_hash_mask) | self.free_hash_val
    }
}

/// Evaluate one case constraint against a full representation buffer.
pub fn case_matches(repr: &[u8; REPR_BYTES], check: &CaseCheck) -> bool {
    let bit = check.bit as usize;
    let byte = bit / 8;
    let off = bit % 8;
    let hi = repr[byte] as u16;
    let lo = if byte + 1 < REPR_BYTES {
        repr[byte + 1] as u16
    } else {
        0
    };
    let field = ((((hi << 8) | lo) >> (10 - off)) & 0x3f) as u8;
    field == check.alt0 || field == check.alt1
}

struct PatternTables {
    prefix_mask: [u8; REPR_BYTES],
    prefix_val: [u8; REPR_BYTES],
    free_mask: u8,
    free_val: u8,
    case: Vec<CaseCheck>,
}

impl PatternTables {
    fn new() -> Self {
        Self {
            prefix_mask: [0; REPR_BYTES],
            prefix_val: [0; REPR_BYTES],
            free_mask: 0,
            free_val: 0,
            case: Vec::new(),
        }
    }
}

pub fn compile(options: &MinerOptions) -> Result<KernelConfig, SaltmineError> {
    let start = options.start.as_deref().filter(|s| !s.is_empty());
    let end = options.end.as_deref().filter(|s| !s.is_empty());
    if start.is_none() && end.is_none() {
        return Err(SaltmineError::Spec(
            "at least one of start or end is required".into(),
        ));
    }
    for (name, pattern) in [("start", start), ("end", end)] {
        if let Some(p) = pattern {
            if !address::is_base64url(p) {
                return Err(SaltmineError::Spec(format!(
                    "{name} pattern must contain only base64url characters"
                )));
            }
            if p.len() > ADDRESS_CHARS {
                return Err(SaltmineError::Spec(format!(
                    "{name} pattern is longer than the address"
                )));
            }
        }
    }
    if let Some(f) = options.fixed_prefix_length {
        if f >= 32 {
            return Err(SaltmineError::Spec(
                "fixed prefix length must be 0..32".into(),
            ));
        }
    }

    let owner_raw = address::decode_owner(&options.owner)?;
    let tag = AddressTag {
        masterchain: options.masterchain,
        non_bounceable: options.non_bounceable,
        testnet: options.testnet,
    };
    let (flags_hi, flags_lo) = tag.flag_bytes();
    let prefix_bits = tag.prefix_bits();

    // Variant ladder and the rewrite window it implies. A start pattern
    // needs the whole first byte free; otherwise the window exists only
    // when the user pins a prefix length.
    let fpls: Vec<Option<u8>> = match (options.fixed_prefix_length, start) {
        (Some(f), _) => vec![Some(f)],
        (None, Some(_)) => vec![Some(8)],
        (None, None) => std::iter::once(None).chain((0..=8).map(Some)).collect(),
    };
    let free_window_mask = match (options.fixed_prefix_length, start) {
        (Some(f), _) => window_mask(f.min(8)),
        (None, Some(_)) => 0xff,
        (None, None) => 0x00,
    };

    let mut tables = PatternTables::new();
    let mut start_digit_base = 0usize;

    if let Some(start) = start {
        let opts = char_options(start, options.case_sensitive)?;
        let (base, filtered) = choose_start_alignment(&opts, &prefix_bits)?;
        start_digit_base = base;
        constrain(&mut tables, &filtered, base, free_window_mask)?;
    }
    if let Some(end) = end {
        let opts = char_options(end, options.case_sensitive)?;
        let base = ADDRESS_CHARS - end.len();
        let filtered = filter_at_offset(&opts, base, &prefix_bits).ok_or_else(|| {
            SaltmineError::Spec("end pattern contradicts the address flag bits".into())
        })?;
        constrain(&mut tables, &filtered, base, free_window_mask)?;
    }

    // Byte-2 constraints never land in the mask table; they are folded
    // into the free-window machinery instead.
    debug_assert_eq!(tables.prefix_mask[2], 0);

    let mut case_const = Vec::new();
    let mut case_var = Vec::new();
    for check in tables.case {
        let bit = check.bit as usize;
        if bit >= HASH_BIT_START + 8 && bit + 6 <= HASH_BIT_END {
            case_const.push(check);
        } else {
            case_var.push(check);
        }
    }

    let need_crc = tables.prefix_mask[34] != 0
        || tables.prefix_mask[35] != 0
        || case_var.iter().any(|c| c.bit as usize + 6 > HASH_BIT_END);
    let case_var_touches_hash0 = case_var.iter().any(|c| {
        let bit = c.bit as usize;
        bit < HASH_BIT_START + 8 && bit + 6 > HASH_BIT_START
    });
    let sweep_hash0 = need_crc || case_var_touches_hash0;
    debug_assert!(sweep_hash0 || case_var.is_empty());

    let prefix_pos_nocrc: Vec<u8> = (3..=33)
        .filter(|&i| tables.prefix_mask[i] != 0)
        .map(|i| i as u8)
        .collect();
    let prefix_pos_crc: Vec<u8> = [34usize, 35]
        .into_iter()
        .filter(|&i| tables.prefix_mask[i] != 0)
        .map(|i| i as u8)
        .collect();

    let hash0_values: Vec<u8> = if free_window_mask == 0 {
        vec![0]
    } else {
        (0u16..256)
            .map(|w| w as u8)
            .filter(|w| w & !free_window_mask == 0)
            .filter(|w| w & tables.free_mask == tables.free_val)
            .collect()
    };

    let specials = [
        None,
        Some((false, false)),
        Some((false, true)),
        Some((true, false)),
        Some((true, true)),
    ];
    let mut variants = Vec::with_capacity(fpls.len() * specials.len());
    for &fpl in &fpls {
        for &special in &specials {
            let prefix = cell::stateinit_prefix(fpl, special)?;
            let prefix_w = cell::pack_prefix_words(&prefix);
            variants.push(StateInitVariant {
                fixed_prefix_length: fpl,
                special,
                prefix,
                prefix_w,
            });
        }
    }

    let zero_cell = cell::build_code_cell(&owner_raw, &[0u8; cell::SALT_BYTES])?;
    let mut code_prefix = [0u8; 64];
    code_prefix.copy_from_slice(&zero_cell[..64]);
    let code_state_base = sha256::midstate(&code_prefix);

    Ok(KernelConfig {
        flags_hi,
        flags_lo,
        free_window_mask,
        free_hash_mask: tables.free_mask,
        free_hash_val: tables.free_val,
        prefix_mask: tables.prefix_mask,
        prefix_val: tables.prefix_val,
        prefix_pos_nocrc,
        prefix_pos_crc,
        hash0_values,
        case_const,
        case_var,
        need_crc,
        sweep_hash0,
        variants,
        code_prefix,
        code_state_base,
        crc16_table: *crc16::table(),
        crc16_delta_pos2: crc16::delta_pos2(),
        start_digit_base,
        owner_raw,
    })
}

fn window_mask(bits: u8) -> u8 {
    if bits == 0 {
        0
    } else {
        0xffu8 << (8 - bits as u32)
    }
}

/// Allowed 6-bit values for each pattern character.
fn char_options(pattern: &str, case_sensitive: bool) -> Result<Vec<Vec<u8>>, SaltmineError> {
    pattern
        .chars()
        .map(|ch| {
            if case_sensitive || !ch.is_ascii_alphabetic() {
                Ok(vec![address::base64url_value(ch)?])
            } else {
                Ok(vec![
                    address::base64url_value(ch.to_ascii_lowercase())?,
                    address::base64url_value(ch.to_ascii_uppercase())?,
                ])
            }
        })
        .collect()
}

/// Drop character alternatives that contradict the fixed flag/workchain
/// bits at the given placement. `None` means no alternative survives for
/// some character.
fn filter_at_offset(
    char_opts: &[Vec<u8>],
    digit_base: usize,
    prefix_bits: &[u8; 16],
) -> Option<Vec<Vec<u8>>> {
    let mut filtered = Vec::with_capacity(char_opts.len());
    for (ci, variants) in char_opts.iter().enumerate() {
        let bit_base = (digit_base + ci) * 6;
        let valid: Vec<u8> = variants
            .iter()
            .copied()
            .filter(|&v| {
                (0..6).all(|b| {
                    let idx = bit_base + b;
                    idx >= HASH_BIT_START || (v >> (5 - b)) & 1 == prefix_bits[idx]
                })
            })
            .collect();
        if valid.is_empty() {
            return None;
        }
        filtered.push(valid);
    }
    Some(filtered)
}

/// Earliest digit offset where the start pattern fits without
/// contradicting the flag bits.
fn choose_start_alignment(
    char_opts: &[Vec<u8>],
    prefix_bits: &[u8; 16],
) -> Result<(usize, Vec<Vec<u8>>), SaltmineError> {
    let len_bits = char_opts.len() * 6;
    let max_offset = (REPR_BITS - len_bits) / 6;
    for offset in 0..=max_offset {
        if let Some(filtered) = filter_at_offset(char_opts, offset, prefix_bits) {
            return Ok((offset, filtered));
        }
    }
    Err(SaltmineError::Spec(
        "start pattern cannot be aligned with the address flag bits".into(),
    ))
}

fn set_mask_bit(mask: &mut [u8; REPR_BYTES], val: &mut [u8; REPR_BYTES], bit_index: usize, bit: u8) {
    let byte = bit_index / 8;
    let m = 0x80u8 >> (bit_index % 8);
    mask[byte] |= m;
    if bit != 0 {
        val[byte] |= m;
    }
}

/// Fold one placed pattern into the tables: a case record per ambiguous
/// character, free-window bits for byte 2, mask bits for everything else.
fn constrain(
    tables: &mut PatternTables,
    filtered: &[Vec<u8>],
    digit_base: usize,
    window: u8,
) -> Result<(), SaltmineError> {
    for (ci, variants) in filtered.iter().enumerate() {
        let bit_base = (digit_base + ci) * 6;
        if variants.len() == 2 && variants[0] != variants[1] {
            tables.case.push(CaseCheck {
                bit: bit_base as u16,
                alt0: variants[0].min(variants[1]),
                alt1: variants[0].max(variants[1]),
            });
        }
        for b in 0..6 {
            let idx = bit_base + b;
            if idx < HASH_BIT_START {
                continue; // satisfied by the flag bits, checked above
            }
            let first = (variants[0] >> (5 - b)) & 1;
            if variants.iter().any(|v| (v >> (5 - b)) & 1 != first) {
                continue; // ambiguous bit, covered by the case record
            }
            if idx < HASH_BIT_START + 8 {
                let m = 0x80u8 >> (idx - HASH_BIT_START);
                if window & m == 0 {
                    return Err(SaltmineError::Spec(
                        "pattern forces first-byte hash bits outside the free prefix window"
                            .into(),
                    ));
                }
                tables.free_mask |= m;
                if first != 0 {
                    tables.free_val |= m;
                }
            } else {
                set_mask_bit(&mut tables.prefix_mask, &mut tables.prefix_val, idx, first);
            }
        }
    }
    Ok(())
}
