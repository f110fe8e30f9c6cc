//! Fast-path counters, summed over CPUs.

use std::fmt;
use std::ops::Index;

use log::{info, warn};
use upf_xdp_common::counters::{self, NAMES, NUM_COUNTERS};

const LEN: usize = NUM_COUNTERS as usize;

/// Counters that should stay at zero on a healthy access link.
const WARN_COUNTERS: [u32; 3] = [counters::MALFORMED, counters::UNSUPPORTED, counters::PDR_MISS];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counters([u64; LEN]);

impl Counters {
    /// Sums per-CPU values of one counter into the snapshot.
    pub fn add(&mut self, index: u32, per_cpu: impl IntoIterator<Item = u64>) {
        if let Some(slot) = self.0.get_mut(index as usize) {
            *slot = per_cpu.into_iter().fold(*slot, u64::wrapping_add);
        }
    }

    pub fn get(&self, index: u32) -> u64 {
        self.0.get(index as usize).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        NAMES.iter().copied().zip(self.0.iter().copied())
    }
}

impl Index<u32> for Counters {
    type Output = u64;

    fn index(&self, index: u32) -> &u64 {
        &self.0[index as usize]
    }
}

impl fmt::Display for Counters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

/// Logs counters when they move: traffic at info, drops worth a look at
/// warn.
#[derive(Debug, Default)]
pub struct StatsLogger {
    last: Counters,
}

impl StatsLogger {
    /// Returns true if anything was logged.
    pub fn log(&mut self, now: &Counters) -> bool {
        let mut logged = false;

        if now[counters::RX] != self.last[counters::RX]
            || now[counters::CORE_RX] != self.last[counters::CORE_RX]
        {
            info!("{now}");
            logged = true;
        }

        for idx in WARN_COUNTERS {
            let delta = now[idx].wrapping_sub(self.last[idx]);
            if delta != 0 {
                warn!("{} +{delta} (total {})", NAMES[idx as usize], now[idx]);
                logged = true;
            }
        }

        self.last = *now;
        logged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_cpu_values_are_summed() {
        let mut c = Counters::default();
        c.add(counters::RX, [1, 2, 3]);
        c.add(counters::RX, [4]);
        c.add(NUM_COUNTERS, [100]);
        assert_eq!(c.get(counters::RX), 10);
        assert_eq!(c.get(NUM_COUNTERS), 0);
    }

    #[test]
    fn display_names_every_counter() {
        let mut c = Counters::default();
        c.add(counters::PDR_HIT, [7]);
        let s = c.to_string();
        assert!(s.starts_with("rx=0 "));
        assert!(s.contains("pdr_hit=7"));
        assert!(s.ends_with("core_rx=0"));
    }

    #[test]
    fn quiet_when_nothing_moves() {
        let mut logger = StatsLogger::default();
        assert!(!logger.log(&Counters::default()));

        let mut c = Counters::default();
        c.add(counters::RX, [5]);
        c.add(counters::PASS, [5]);
        assert!(logger.log(&c));
        assert!(!logger.log(&c));

        c.add(counters::MALFORMED, [1]);
        assert!(logger.log(&c));
    }
}
