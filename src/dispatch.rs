//! Host dispatcher.
//!
//! Owns the launch loop: compiles the constraint tables, self-tests the
//! hasher, rotates the base salt between launches, drains the result
//! buffer, re-derives every reported hit from scratch and appends the
//! verified matches to the output log. A hit that fails re-derivation is
//! fatal, because it means the compiled tables and the kernel disagree.

use rand::Rng;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::address;
use crate::cell;
use crate::compile::{self, case_matches, KernelConfig, MinerOptions};
use crate::crc16;
use crate::error::SaltmineError;
use crate::gpu::GpuSaltMiner;
use crate::output::{MatchLog, MatchRecord};
use crate::search::{self, HitRecord};
use crate::stats::{Reporter, SearchStats};

pub const OUTPUT_FILE: &str = "addresses.jsonl";

/// Run a search session until interrupted, or until the first verified
/// hit when `only_one` is set.
pub fn run(options: &MinerOptions, stats_csv: Option<PathBuf>) -> Result<(), SaltmineError> {
    let cfg = compile::compile(options)?;
    crate::sha256::self_test()?;

    let mut engine = GpuSaltMiner::new(&cfg)?;
    let mut params = engine.launch_params();
    eprintln!("Using device: {}", engine.device_name());
    eprintln!(
        "Launch shape: {} work items x {} iterations x {} variants",
        params.global_size,
        params.iterations,
        cfg.variants.len()
    );

    let mut log = MatchLog::open(Path::new(OUTPUT_FILE))?;
    let stats = Arc::new(Mutex::new(SearchStats::new(cfg.variants.len())));
    let stop = Arc::new(AtomicBool::new(false));
    let reporter = Reporter::spawn(stats.clone(), stop.clone(), stats_csv)?;

    let mut rng = rand::thread_rng();
    let result = loop {
        let base_salt: [u32; 4] = rng.gen();
        let started = Instant::now();
        let outcome = match engine.run_launch(base_salt, &params) {
            Ok(outcome) => outcome,
            Err(e) => break Err(e),
        };

        let mut done = false;
        let mut failed = None;
        for hit in &outcome.hits {
            match verify_hit(&cfg, options, base_salt, hit) {
                Ok(record) => {
                    eprintln!("\r\x1b[Kfound: {}", record.address);
                    if let Err(e) = log.append(&record) {
                        failed = Some(e);
                        break;
                    }
                    stats.lock().unwrap().found += 1;
                    if options.only_one {
                        done = true;
                        break;
                    }
                }
                Err(e) => {
                    failed = Some(e);
                    break;
                }
            }
        }
        if let Some(e) = failed {
            break Err(e);
        }

        stats.lock().unwrap().record_launch(
            params.global_size,
            params.iterations,
            started.elapsed().as_secs_f64(),
        );

        if outcome.overflowed() {
            // Shrink the launch so the next batch fits the result buffer.
            params.iterations = (params.iterations / 2).max(1);
            eprintln!(
                "\r\x1b[Kresult buffer overflow ({} hits), iterations reduced to {}",
                outcome.found, params.iterations
            );
        }

        if done {
            break Ok(());
        }
    };

    stop.store(true, Ordering::Relaxed);
    reporter.join();
    result
}

/// Re-derive one reported hit from first principles and build its match
/// record. Uses the `sha2` crate rather than the kernel's compression so
/// the check is independent of the code being checked.
pub fn verify_hit(
    cfg: &KernelConfig,
    options: &MinerOptions,
    base_salt: [u32; 4],
    hit: &HitRecord,
) -> Result<MatchRecord, SaltmineError> {
    let variant = cfg
        .variants
        .get(hit.variant as usize)
        .ok_or_else(|| SaltmineError::Hash(format!("variant index {} out of range", hit.variant)))?;
    if hit.hash0 > 0xff {
        return Err(SaltmineError::Hash(format!(
            "hash0 {} out of range",
            hit.hash0
        )));
    }
    let hash0 = hit.hash0 as u8;

    let salt = search::effective_salt(base_salt, hit.iter, hit.global_id);
    let code = cell::build_code_cell(&cfg.owner_raw, &salt)?;
    if code[..64] != cfg.code_prefix {
        return Err(SaltmineError::Hash(
            "code cell prefix diverged from the compiled midstate input".into(),
        ));
    }
    let code_hash: [u8; 32] = Sha256::digest(code).into();
    let mut stateinit = variant.prefix.clone();
    stateinit.extend_from_slice(&code_hash);
    let main_hash: [u8; 32] = Sha256::digest(&stateinit).into();

    // The emitted first byte must agree with the hash outside the free
    // window and with the pattern inside it.
    if hash0 & !cfg.free_window_mask != main_hash[0] & !cfg.free_window_mask {
        return Err(SaltmineError::Hash("free-bit rewrite mismatch".into()));
    }
    if hash0 & cfg.free_hash_mask != cfg.free_hash_val {
        return Err(SaltmineError::Hash(
            "hash0 violates the forced free bits".into(),
        ));
    }

    let mut rewritten = main_hash;
    rewritten[0] = hash0;
    let repr = address::assemble_repr(cfg.flags_hi, cfg.flags_lo, &rewritten);
    debug_assert_eq!(
        crc16::crc16(&repr[..34]),
        (repr[34] as u16) << 8 | repr[35] as u16
    );

    for i in 0..repr.len() {
        if repr[i] & cfg.prefix_mask[i] != cfg.prefix_val[i] {
            return Err(SaltmineError::Hash(format!(
                "prefix mask mismatch at byte {i}"
            )));
        }
    }
    for check in cfg.case_const.iter().chain(&cfg.case_var) {
        if !case_matches(&repr, check) {
            return Err(SaltmineError::Hash(format!(
                "case constraint mismatch at bit {}",
                check.bit
            )));
        }
    }

    let addr = address::encode36(&repr);
    if let Some(start) = options.start.as_deref().filter(|s| !s.is_empty()) {
        let got = &addr[cfg.start_digit_base..cfg.start_digit_base + start.len()];
        let matches = if options.case_sensitive {
            got == start
        } else {
            got.eq_ignore_ascii_case(start)
        };
        if !matches {
            return Err(SaltmineError::Hash(format!(
                "start mismatch: {got:?} vs {start:?}"
            )));
        }
    }
    if let Some(end) = options.end.as_deref().filter(|s| !s.is_empty()) {
        let got = &addr[addr.len() - end.len()..];
        let matches = if options.case_sensitive {
            got == end
        } else {
            got.eq_ignore_ascii_case(end)
        };
        if !matches {
            return Err(SaltmineError::Hash(format!(
                "end mismatch: {got:?} vs {end:?}"
            )));
        }
    }

    let boc = cell::to_boc_single_cell(&code);
    Ok(MatchRecord::new(addr, hash0, &boc, variant, options))
}
