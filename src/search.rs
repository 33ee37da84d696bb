//! Portable search kernel.
//!
//! Runs the same per-candidate algorithm as the OpenCL kernel: one
//! compression for the salted code cell against the owner midstate, one
//! compression per StateInit variant, then the staged constraint filters.
//! Used directly by the CPU backend and as the fallback path of the GPU
//! backend, so both produce the same multiset of hits for a given salt.

use bytemuck::{Pod, Zeroable};
use rayon::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::compile::{CaseCheck, KernelConfig};
use crate::sha256;

/// Bounded result buffer: 1024 slots of 4 words each.
pub const RES_SLOTS: usize = 1024;
pub const RES_SLOT_WORDS: usize = 4;

/// Per-launch work shape.
#[derive(Debug, Clone, Copy)]
pub struct LaunchParams {
    pub global_size: usize,
    pub local_size: Option<usize>,
    pub iterations: u32,
}

/// One emitted match, identifying the candidate by its enumeration
/// coordinates plus the chosen first hash byte.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct HitRecord {
    pub iter: u32,
    pub global_id: u32,
    pub variant: u32,
    pub hash0: u32,
}

/// Result of one launch. `found` counts every passing candidate; `hits`
/// holds at most [`RES_SLOTS`] of them, in unspecified order.
#[derive(Debug, Clone)]
pub struct LaunchOutcome {
    pub found: u32,
    pub hits: Vec<HitRecord>,
}

impl LaunchOutcome {
    pub fn overflowed(&self) -> bool {
        self.found as usize > RES_SLOTS
    }
}

/// Run `global_size * iterations` work items over every variant.
pub fn run_launch(cfg: &KernelConfig, base_salt: [u32; 4], params: &LaunchParams) -> LaunchOutcome {
    let counter = AtomicU32::new(0);
    let hits: Vec<HitRecord> = (0..params.global_size as u32)
        .into_par_iter()
        .flat_map_iter(|gid| {
            let mut local = Vec::new();
            for t in 0..params.iterations {
                search_work_item(cfg, base_salt, t, gid, &mut |hit| {
                    let slot = counter.fetch_add(1, Ordering::Relaxed);
                    if (slot as usize) < RES_SLOTS {
                        local.push(hit);
                    }
                });
            }
            local.into_iter()
        })
        .collect();
    LaunchOutcome {
        found: counter.load(Ordering::Relaxed),
        hits,
    }
}

#[inline(always)]
fn hash_byte(hash: &[u32; 8], i: usize) -> u8 {
    (hash[i / 4] >> (24 - 8 * (i % 4))) as u8
}

#[inline]
fn case_field(cfg: &KernelConfig, hash: &[u32; 8], hash0: u8, crc: u16, check: &CaseCheck) -> u8 {
    let bit = check.bit as usize;
    let byte = bit / 8;
    let repr_byte = |i: usize| -> u8 {
        match i {
            0 => cfg.flags_hi,
            1 => cfg.flags_lo,
            2 => hash0,
            3..=33 => hash_byte(hash, i - 2),
            34 => (crc >> 8) as u8,
            _ => crc as u8,
        }
    };
    let hi = repr_byte(byte) as u16;
    let lo = if byte + 1 < 36 {
        repr_byte(byte + 1) as u16
    } else {
        0
    };
    ((((hi << 8) | lo) >> (10 - bit % 8)) & 0x3f) as u8
}

/// One work item: hash the effective salt, then test every StateInit
/// variant against the staged constraints.
pub fn search_work_item(
    cfg: &KernelConfig,
    base_salt: [u32; 4],
    t: u32,
    gid: u32,
    emit: &mut impl FnMut(HitRecord),
) {
    // Code cell block: 16 salt bytes, padding bit, bit length 640.
    let mut w = [0u32; 16];
    w[0] = (base_salt[0] ^ t).swap_bytes();
    w[1] = (base_salt[1] ^ gid).swap_bytes();
    w[2] = base_salt[2].swap_bytes();
    w[3] = base_salt[3].swap_bytes();
    w[4] = 0x8000_0000;
    w[15] = (cell_bits()) as u32;
    let mut code_hash = cfg.code_state_base;
    sha256::compress(&mut code_hash, &w);

    for (vi, variant) in cfg.variants.iter().enumerate() {
        let lv = variant.prefix.len();
        let mut w = variant.prefix_w;
        sha256::insert_hash_be(&mut w, &code_hash, lv);
        let total = lv + 32;
        w[total / 4] |= 0x80u32 << (24 - 8 * (total % 4));
        w[15] = (total * 8) as u32;
        let mut hash = sha256::IV;
        sha256::compress(&mut hash, &w);

        // Stage 1: byte filters independent of hash0 and CRC.
        if !cfg
            .prefix_pos_nocrc
            .iter()
            .all(|&i| hash_byte(&hash, i as usize - 2) & cfg.prefix_mask[i as usize] == cfg.prefix_val[i as usize])
        {
            continue;
        }

        // Stage 2: case checks confined to bytes 3..=33.
        if !cfg
            .case_const
            .iter()
            .all(|c| field_ok(case_field(cfg, &hash, 0, 0, c), c))
        {
            continue;
        }

        let h0_raw = hash_byte(&hash, 0);

        if !cfg.sweep_hash0 {
            // Stage 3A: single canonical rewrite. No variable case checks
            // exist on this path.
            let hash0 = cfg.rewrite_hash0(h0_raw);
            emit(HitRecord {
                iter: t,
                global_id: gid,
                variant: vi as u32,
                hash0: hash0 as u32,
            });
            continue;
        }

        // Stage 3B: sweep the admissible first-byte settings, patching the
        // CRC per candidate through the byte-2 delta table.
        let residual = h0_raw & !cfg.free_window_mask;
        let crc_base = if cfg.need_crc {
            let mut buf = [0u8; 34];
            buf[0] = cfg.flags_hi;
            buf[1] = cfg.flags_lo;
            for i in 1..32 {
                buf[2 + i] = hash_byte(&hash, i);
            }
            crc16_with(&cfg.crc16_table, &buf)
        } else {
            0
        };

        for &window_bits in &cfg.hash0_values {
            let hash0 = window_bits | residual;
            let crc = if cfg.need_crc {
                let crc = crc_base ^ cfg.crc16_delta_pos2[hash0 as usize];
                if (crc >> 8) as u8 & cfg.prefix_mask[34] != cfg.prefix_val[34] {
                    continue;
                }
                if crc as u8 & cfg.prefix_mask[35] != cfg.prefix_val[35] {
                    continue;
                }
                crc
            } else {
                0
            };
            if cfg
                .case_var
                .iter()
                .all(|c| field_ok(case_field(cfg, &hash, hash0, crc, c), c))
            {
                emit(HitRecord {
                    iter: t,
                    global_id: gid,
                    variant: vi as u32,
                    hash0: hash0 as u32,
                });
            }
        }
    }
}

#[inline(always)]
fn field_ok(field: u8, check: &CaseCheck) -> bool {
    field == check.alt0 || field == check.alt1
}

#[inline(always)]
fn cell_bits() -> usize {
    crate::cell::CODE_CELL_BYTES * 8
}

fn crc16_with(table: &[u16; 256], data: &[u8]) -> u16 {
    let mut crc = 0u16;
    for &b in data {
        crc = (crc << 8) ^ table[(((crc >> 8) ^ b as u16) & 0xff) as usize];
    }
    crc
}

/// Reconstruct the effective salt bytes of one work item.
pub fn effective_salt(base_salt: [u32; 4], t: u32, gid: u32) -> [u8; 16] {
    let words = [
        base_salt[0] ^ t,
        base_salt[1] ^ gid,
        base_salt[2],
        base_salt[3],
    ];
    let mut out = [0u8; 16];
    for (i, w) in words.iter().enumerate() {
        out[i * 4..i * 4 + 4].copy_from_slice(&w.to_le_bytes());
    }
    out
}
