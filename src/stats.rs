//! Search statistics and the status reporter.
//!
//! The dispatcher updates a shared snapshot after every launch; a
//! background reporter prints a smoothed rate line once per second and can
//! optionally append snapshots to a CSV file for later charting.

use csv::Writer;
use std::fs::File;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::SaltmineError;

/// Rolling snapshot of one search session.
#[derive(Debug, Clone, Default)]
pub struct SearchStats {
    /// Salts per second, millions.
    pub speed_raw: f64,
    /// Candidate addresses per second, millions (salts times variants).
    pub speed_eff: f64,
    /// Wall time of the last launch in seconds.
    pub batch_time: f64,
    pub found: u64,
    pub launches: u64,
    pub global_size: usize,
    pub iterations: u32,
    pub variants: usize,
}

impl SearchStats {
    pub fn new(variants: usize) -> Self {
        Self {
            variants,
            ..Self::default()
        }
    }

    /// Fold one finished launch into the snapshot.
    pub fn record_launch(&mut self, global_size: usize, iterations: u32, elapsed: f64) {
        self.global_size = global_size;
        self.iterations = iterations;
        self.batch_time = elapsed;
        self.launches += 1;
        if elapsed > 0.0 {
            self.speed_raw = global_size as f64 * iterations as f64 / elapsed / 1e6;
            self.speed_eff = self.speed_raw * self.variants.max(1) as f64;
        }
    }
}

/// Format a rate in candidates per second with k/M/B/T units.
pub fn fmt_rate(per_second: f64) -> String {
    const UNITS: [(f64, &str); 4] = [(1e12, "T"), (1e9, "B"), (1e6, "M"), (1e3, "k")];
    for (factor, label) in UNITS {
        if per_second >= factor {
            return format!("{:.2}{label}", per_second / factor);
        }
    }
    format!("{per_second:.2}")
}

/// Thousands-separated integer formatting for counters.
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

const PRINT_INTERVAL: Duration = Duration::from_secs(1);
const HISTORY_WINDOW: Duration = Duration::from_secs(20);

/// Background status printer. Stops when the shared flag is raised.
pub struct Reporter {
    handle: JoinHandle<()>,
}

impl Reporter {
    pub fn spawn(
        stats: Arc<Mutex<SearchStats>>,
        stop: Arc<AtomicBool>,
        csv_path: Option<PathBuf>,
    ) -> Result<Self, SaltmineError> {
        let mut csv = match csv_path {
            Some(path) => {
                let mut writer = Writer::from_writer(File::create(path)?);
                writer
                    .write_record(["seconds", "found", "eff_per_sec"])
                    .map_err(|e| SaltmineError::Internal(format!("csv header: {e}")))?;
                Some(writer)
            }
            None => None,
        };
        let started = Instant::now();
        let handle = thread::spawn(move || {
            let mut history: Vec<(Instant, f64, u64)> = Vec::new();
            while !stop.load(Ordering::Relaxed) {
                thread::sleep(PRINT_INTERVAL);
                let snap = stats.lock().unwrap().clone();
                if snap.launches == 0 {
                    continue;
                }
                let now = Instant::now();
                history.push((now, snap.speed_eff * 1e6, snap.found));
                history.retain(|(at, _, _)| now.duration_since(*at) <= HISTORY_WINDOW);

                let eff_avg =
                    history.iter().map(|(_, e, _)| e).sum::<f64>() / history.len() as f64;
                let found_rate = match (history.first(), history.last()) {
                    (Some((t0, _, f0)), Some((t1, _, f1))) if t1 > t0 => {
                        (*f1 - *f0) as f64 / t1.duration_since(*t0).as_secs_f64()
                    }
                    _ => 0.0,
                };
                let rate_part = if found_rate > 1.0 {
                    format!(" ({found_rate:.2}/s)")
                } else {
                    String::new()
                };
                eprint!(
                    "\r\x1b[K  found {}{} | {} addr/s | batch {:.2}s",
                    format_count(snap.found),
                    rate_part,
                    fmt_rate(eff_avg),
                    snap.batch_time,
                );
                if let Some(writer) = csv.as_mut() {
                    let _ = writer.write_record([
                        format!("{:.3}", started.elapsed().as_secs_f64()),
                        snap.found.to_string(),
                        format!("{eff_avg:.0}"),
                    ]);
                    let _ = writer.flush();
                }
            }
            eprintln!();
        });
        Ok(Self { handle })
    }

    pub fn join(self) {
        let _ = self.handle.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_units() {
        assert_eq!(fmt_rate(0.5), "0.50");
        assert_eq!(fmt_rate(1_500.0), "1.50k");
        assert_eq!(fmt_rate(2_500_000.0), "2.50M");
        assert_eq!(fmt_rate(3.2e9), "3.20B");
        assert_eq!(fmt_rate(1.0e12), "1.00T");
    }

    #[test]
    fn count_grouping() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(1234567), "1,234,567");
    }

    #[test]
    fn record_launch_updates_speeds() {
        let mut stats = SearchStats::new(5);
        stats.record_launch(1_000_000, 2, 1.0);
        assert!((stats.speed_raw - 2.0).abs() < 1e-9);
        assert!((stats.speed_eff - 10.0).abs() < 1e-9);
        assert_eq!(stats.launches, 1);
    }
}
