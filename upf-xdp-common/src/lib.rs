//! Types and parsing shared by the UPF XDP programs and the userspace loader.
//!
//! Everything here has to build for `bpfel-unknown-none`, so the crate is
//! `no_std` unless a host-only feature is enabled:
//!
//! - `user` adds `aya::Pod` impls so the types can be used as map keys,
//!   values and globals from userspace.
//! - `test-util` adds [`testing`], a frame builder for host tests.

#![cfg_attr(not(any(test, feature = "user", feature = "test-util")), no_std)]

pub mod classify;
pub mod headers;
pub mod parse;
pub mod pdr;
pub mod view;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use classify::{classify_access, Disposition, Outcome, PassReason, PdrLookup};
pub use parse::{EthernetEnvelope, GtpTunnel, InnerFlow, Malformed, Unsupported, UdpSegment};
pub use pdr::{PdrKey, PdrValue};
pub use view::{PacketView, SliceView};

/// Maximum number of rules held by the PDR map.
pub const PDR_LIST_MAX_SIZE: u32 = 10_000;

/// Name of the PDR map inside the eBPF object.
pub const PDR_LIST_MAP: &str = "PDR_LIST";
/// Name of the per-CPU counters map inside the eBPF object.
pub const STATS_MAP: &str = "STATS";
/// Name of the read-only configuration global inside the eBPF object.
pub const UPF_CONFIG_GLOBAL: &str = "UPF_CONFIG";

/// XDP program attached to the access (N3) port.
pub const ACCESS_PROGRAM: &str = "upf_main_access";
/// XDP program attached to the core (N6) port.
pub const CORE_PROGRAM: &str = "upf_main_core";

pub const LOG_LEVEL_OFF: u8 = 0;
pub const LOG_LEVEL_ERR: u8 = 1;
pub const LOG_LEVEL_WARNING: u8 = 2;
pub const LOG_LEVEL_NOTICE: u8 = 3;
pub const LOG_LEVEL_INFO: u8 = 4;
pub const LOG_LEVEL_DEBUG: u8 = 5;

/// What the access program does with a GTP-U packet that matches no PDR.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MissAction {
    #[default]
    Drop,
    /// Hand the packet to the kernel stack (slow path).
    Pass,
}

impl MissAction {
    pub const fn as_u8(self) -> u8 {
        match self {
            MissAction::Drop => 0,
            MissAction::Pass => 1,
        }
    }

    pub const fn from_u8(v: u8) -> Self {
        match v {
            1 => MissAction::Pass,
            _ => MissAction::Drop,
        }
    }
}

/// Runtime configuration patched into the eBPF object before load.
///
/// Kept as plain bytes so that any value userspace writes is valid.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpfConfig {
    pub log_level: u8,
    pub miss_action: u8,
}

impl UpfConfig {
    pub const DEFAULT: UpfConfig = UpfConfig {
        log_level: LOG_LEVEL_ERR,
        miss_action: 0,
    };

    pub const fn new(log_level: u8, miss_action: MissAction) -> Self {
        UpfConfig {
            log_level,
            miss_action: miss_action.as_u8(),
        }
    }

    #[inline(always)]
    pub fn log_enabled(&self, level: u8) -> bool {
        level != LOG_LEVEL_OFF && self.log_level >= level
    }

    #[inline(always)]
    pub fn miss_action(&self) -> MissAction {
        MissAction::from_u8(self.miss_action)
    }
}

impl Default for UpfConfig {
    fn default() -> Self {
        UpfConfig::DEFAULT
    }
}

/// Indices into the `STATS` per-CPU array.
pub mod counters {
    pub const RX: u32 = 0;
    pub const PASS: u32 = 1;
    pub const DROP: u32 = 2;
    pub const MALFORMED: u32 = 3;
    pub const UNSUPPORTED: u32 = 4;
    pub const PASS_THROUGH: u32 = 5;
    pub const PDR_HIT: u32 = 6;
    pub const PDR_MISS: u32 = 7;
    pub const CORE_RX: u32 = 8;

    pub const NUM_COUNTERS: u32 = 9;

    pub const NAMES: [&str; NUM_COUNTERS as usize] = [
        "rx",
        "pass",
        "drop",
        "malformed",
        "unsupported",
        "pass_through",
        "pdr_hit",
        "pdr_miss",
        "core_rx",
    ];
}

#[cfg(feature = "user")]
unsafe impl aya::Pod for UpfConfig {}

#[cfg(feature = "user")]
unsafe impl aya::Pod for PdrKey {}

#[cfg(feature = "user")]
unsafe impl aya::Pod for PdrValue {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_gate() {
        let cfg = UpfConfig::new(LOG_LEVEL_INFO, MissAction::Drop);
        assert!(cfg.log_enabled(LOG_LEVEL_ERR));
        assert!(cfg.log_enabled(LOG_LEVEL_INFO));
        assert!(!cfg.log_enabled(LOG_LEVEL_DEBUG));

        let off = UpfConfig::new(LOG_LEVEL_OFF, MissAction::Drop);
        assert!(!off.log_enabled(LOG_LEVEL_ERR));
        assert!(!off.log_enabled(LOG_LEVEL_OFF));
    }

    #[test]
    fn miss_action_survives_raw_byte() {
        assert_eq!(UpfConfig::new(0, MissAction::Pass).miss_action(), MissAction::Pass);
        assert_eq!(UpfConfig::DEFAULT.miss_action(), MissAction::Drop);
        // Unknown values fall back to the safe default.
        let cfg = UpfConfig {
            log_level: 0,
            miss_action: 7,
        };
        assert_eq!(cfg.miss_action(), MissAction::Drop);
    }
}
